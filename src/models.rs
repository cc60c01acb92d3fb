use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rest used when a routine entry does not specify one.
pub const DEFAULT_REST_SECONDS: u32 = 90;

/// One planned entry of a routine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedExercise {
    pub exercise_id: String,
    pub exercise_name: String,
    pub planned_sets: u32,
    pub planned_reps: u32,
    #[serde(default)]
    pub planned_weight: Option<f64>,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    pub order: u32,
}

impl PlannedExercise {
    /// Planned rest between sets, falling back to `fallback` when unspecified.
    pub fn rest_or(&self, fallback: u32) -> u32 {
        match self.rest_seconds {
            Some(r) if r > 0 => r,
            _ => fallback,
        }
    }
}

/// A routine as handed out by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutinePlan {
    pub id: String,
    pub name: String,
    pub exercises: Vec<PlannedExercise>,
}

/// Immutable copy of the routine a session was started from.
pub type RoutineSnapshot = RoutinePlan;

/// A set the user actually performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformedSet {
    pub set_number: u32,
    pub reps: u32,
    pub weight: f64,
    pub rest_time_taken_seconds: u32,
    pub completed: bool,
}

impl PerformedSet {
    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }
}

/// Logged work for one exercise within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformedExercise {
    pub exercise_id: String,
    pub exercise_name: String,
    pub sets: Vec<PerformedSet>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Between-set rest. Exactly one variant is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RestMode {
    #[default]
    None,
    /// Countdown. `elapsed_seconds` is the rest actually served so far.
    #[serde(rename_all = "camelCase")]
    Fixed {
        remaining_seconds: u32,
        #[serde(default)]
        elapsed_seconds: u32,
    },
    /// Open-ended rest, ended only by an explicit exit.
    #[serde(rename_all = "camelCase")]
    Infinite { started_at: DateTime<Utc> },
}

impl RestMode {
    pub fn fixed(seconds: u32) -> Self {
        RestMode::Fixed {
            remaining_seconds: seconds,
            elapsed_seconds: 0,
        }
    }

    pub fn is_resting(&self) -> bool {
        !matches!(self, RestMode::None)
    }

    /// Variant name, used to decide whether a change is worth a checkpoint.
    pub fn kind(&self) -> &'static str {
        match self {
            RestMode::None => "none",
            RestMode::Fixed { .. } => "fixed",
            RestMode::Infinite { .. } => "infinite",
        }
    }
}

/// The persisted in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWorkoutSession {
    pub id: String,
    pub owner_profile_id: String,
    pub routine_snapshot: RoutineSnapshot,
    pub started_at: DateTime<Utc>,
    pub current_exercise_index: usize,
    pub logged_exercises: Vec<PerformedExercise>,
    pub current_set_index: usize,
    pub rest_mode: RestMode,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub exercise_complete: bool,
    #[serde(default)]
    pub pending_rest_seconds: Option<u32>,
}

impl ActiveWorkoutSession {
    /// Builds a session with one empty `PerformedExercise` per routine entry.
    pub fn new(
        id: String,
        owner_profile_id: String,
        routine: RoutinePlan,
        now: DateTime<Utc>,
    ) -> Self {
        let logged_exercises = routine
            .exercises
            .iter()
            .map(|e| PerformedExercise {
                exercise_id: e.exercise_id.clone(),
                exercise_name: e.exercise_name.clone(),
                sets: Vec::new(),
                notes: None,
            })
            .collect();

        Self {
            id,
            owner_profile_id,
            routine_snapshot: routine,
            started_at: now,
            current_exercise_index: 0,
            logged_exercises,
            current_set_index: 0,
            rest_mode: RestMode::None,
            last_activity_at: now,
            exercise_complete: false,
            pending_rest_seconds: None,
        }
    }

    pub fn current_plan(&self) -> Option<&PlannedExercise> {
        self.routine_snapshot
            .exercises
            .get(self.current_exercise_index)
    }

    pub fn current_exercise(&self) -> Option<&PerformedExercise> {
        self.logged_exercises.get(self.current_exercise_index)
    }

    pub fn is_last_exercise(&self) -> bool {
        self.current_exercise_index + 1 >= self.routine_snapshot.exercises.len()
    }

    pub fn total_sets(&self) -> usize {
        self.logged_exercises.iter().map(|e| e.sets.len()).sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.logged_exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(PerformedSet::volume)
            .sum()
    }

    pub fn exercises_with_sets(&self) -> usize {
        self.logged_exercises
            .iter()
            .filter(|e| !e.sets.is_empty())
            .count()
    }
}

/// Merge-patch for the stored session; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub current_exercise_index: Option<usize>,
    pub current_set_index: Option<usize>,
    pub logged_exercises: Option<Vec<PerformedExercise>>,
    pub rest_mode: Option<RestMode>,
    pub exercise_complete: Option<bool>,
    pub pending_rest_seconds: Option<Option<u32>>,
}

impl SessionPatch {
    /// Patch carrying every field the state machine may mutate.
    pub fn from_session(session: &ActiveWorkoutSession) -> Self {
        Self {
            current_exercise_index: Some(session.current_exercise_index),
            current_set_index: Some(session.current_set_index),
            logged_exercises: Some(session.logged_exercises.clone()),
            rest_mode: Some(session.rest_mode),
            exercise_complete: Some(session.exercise_complete),
            pending_rest_seconds: Some(session.pending_rest_seconds),
        }
    }

    pub fn apply_to(self, session: &mut ActiveWorkoutSession) {
        if let Some(i) = self.current_exercise_index {
            session.current_exercise_index = i;
        }
        if let Some(i) = self.current_set_index {
            session.current_set_index = i;
        }
        if let Some(l) = self.logged_exercises {
            session.logged_exercises = l;
        }
        if let Some(r) = self.rest_mode {
            session.rest_mode = r;
        }
        if let Some(c) = self.exercise_complete {
            session.exercise_complete = c;
        }
        if let Some(p) = self.pending_rest_seconds {
            session.pending_rest_seconds = p;
        }
    }
}

/// Output artifact handed to the workout archive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedWorkout {
    pub id: String,
    pub profile_id: String,
    pub date: DateTime<Utc>,
    pub routine_id: String,
    pub routine_name: String,
    pub exercises: Vec<PerformedExercise>,
    pub duration_minutes: i64,
    pub notes: Option<String>,
}

impl FinishedWorkout {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    pub fn total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(PerformedSet::volume)
            .sum()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_survives_json_round_trip() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let mut s = ActiveWorkoutSession::new("s1".into(), "p1".into(), fixtures::routine(3), now);
        s.logged_exercises[0].sets.push(PerformedSet {
            set_number: 1,
            reps: 8,
            weight: 60.0,
            rest_time_taken_seconds: 0,
            completed: true,
        });
        s.current_set_index = 1;
        s.current_exercise_index = 1;
        s.rest_mode = RestMode::Infinite { started_at: now };

        let json = serde_json::to_string(&s).unwrap();
        let back: ActiveWorkoutSession = serde_json::from_str(&json).unwrap();

        assert_eq!(back.current_exercise_index, 1);
        assert_eq!(back.current_set_index, 1);
        assert_eq!(back.logged_exercises, s.logged_exercises);
        assert_eq!(back, s);
    }

    #[test]
    fn persisted_shape_uses_camel_case_and_iso_timestamps() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let mut s = ActiveWorkoutSession::new("s1".into(), "p1".into(), fixtures::routine(3), now);
        s.rest_mode = RestMode::fixed(90);

        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["ownerProfileId"], "p1");
        assert_eq!(v["startedAt"], "2025-03-01T10:00:00Z");
        assert_eq!(v["restMode"]["kind"], "fixed");
        assert_eq!(v["restMode"]["remainingSeconds"], 90);
    }

    #[test]
    fn older_records_without_support_fields_still_load() {
        let json = r#"{
            "id": "s1", "ownerProfileId": "p1",
            "routineSnapshot": {"id": "r", "name": "R", "exercises": []},
            "startedAt": "2025-03-01T10:00:00Z",
            "currentExerciseIndex": 0, "loggedExercises": [],
            "currentSetIndex": 0, "restMode": {"kind": "none"},
            "lastActivityAt": "2025-03-01T10:00:00Z"
        }"#;
        let s: ActiveWorkoutSession = serde_json::from_str(json).unwrap();
        assert!(!s.exercise_complete);
        assert_eq!(s.pending_rest_seconds, None);
    }

    #[test]
    fn planned_rest_falls_back_when_missing_or_zero() {
        let r = fixtures::routine(3);
        assert_eq!(r.exercises[0].rest_or(DEFAULT_REST_SECONDS), 120);
        assert_eq!(r.exercises[1].rest_or(DEFAULT_REST_SECONDS), 90);
    }
}
