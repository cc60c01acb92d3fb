//! Set logging and rest state machine.
//!
//! [`apply`] is a pure function: it takes the current session, an event and
//! the current time, and returns the next session plus the side effects the
//! host has to carry out. It never touches storage or timers.
//!
//! ```text
//!            log_set (more sets planned)
//!   Logging ─────────────────────────────▶ RestingFixed ──tick→0 / skip──▶ Logging
//!      │  ▲                                    │
//!      │  └──────── exit_infinite_rest ────────┼──── RestingInfinite
//!      │                                       └─ enter_infinite_rest ─▶
//!      │ log_set (planned sets reached)
//!      ▼
//!   ExerciseComplete ──advance──▶ Logging (next exercise)
//!                    ──repeat───▶ RestingFixed (same exercise)
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    clock::seconds_between,
    error::{EngineError, Result},
    models::{ActiveWorkoutSession, DEFAULT_REST_SECONDS, PerformedSet, RestMode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Logging,
    RestingFixed,
    RestingInfinite,
    ExerciseComplete,
}

impl EngineState {
    pub fn of(session: &ActiveWorkoutSession) -> Self {
        match session.rest_mode {
            RestMode::Fixed { .. } => Self::RestingFixed,
            RestMode::Infinite { .. } => Self::RestingInfinite,
            RestMode::None if session.exercise_complete => Self::ExerciseComplete,
            RestMode::None => Self::Logging,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Logging => "logging sets",
            Self::RestingFixed => "in a timed rest",
            Self::RestingInfinite => "in an open rest",
            Self::ExerciseComplete => "at the end of an exercise",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LogSet { weight: f64, reps: u32 },
    AdvanceExercise,
    RepeatSet,
    Tick,
    Skip,
    Adjust { delta_seconds: i64 },
    EnterInfiniteRest,
    ExitInfiniteRest,
    MoveToExercise { index: usize },
    Annotate { notes: Option<String> },
}

impl Event {
    fn action(&self) -> &'static str {
        match self {
            Self::LogSet { .. } => "log a set",
            Self::AdvanceExercise => "advance to the next exercise",
            Self::RepeatSet => "add an extra set",
            Self::Tick => "tick",
            Self::Skip => "skip rest",
            Self::Adjust { .. } => "adjust rest",
            Self::EnterInfiniteRest => "start an open rest",
            Self::ExitInfiniteRest => "end an open rest",
            Self::MoveToExercise { .. } => "change exercise",
            Self::Annotate { .. } => "annotate",
        }
    }
}

/// Work the host must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Checkpoint the session.
    Persist,
    /// A fixed rest ran out; the host should buzz, beep or vibrate.
    NotifyRestFinished,
    /// The current exercise changed; refresh the pre-filled weight/reps.
    SeedDefaults,
    /// The last exercise is done; continue with the completion gate.
    ReadyForCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestPolicy {
    /// Rest used when the routine entry has none.
    pub default_rest_seconds: u32,
    /// Rest recorded for a set with no preceding rest episode.
    pub first_set_rest_seconds: u32,
}

impl Default for RestPolicy {
    fn default() -> Self {
        Self {
            default_rest_seconds: DEFAULT_REST_SECONDS,
            first_set_rest_seconds: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub session: ActiveWorkoutSession,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(session: &ActiveWorkoutSession) -> Self {
        Self {
            session: session.clone(),
            effects: Vec::new(),
        }
    }

    pub fn has(&self, effect: Effect) -> bool {
        self.effects.contains(&effect)
    }
}

pub fn apply(
    session: &ActiveWorkoutSession,
    event: Event,
    now: DateTime<Utc>,
    policy: &RestPolicy,
) -> Result<Transition> {
    let state = EngineState::of(session);
    let reject = |event: &Event| EngineError::InvalidTransition {
        event: event.action(),
        state: state.describe(),
    };

    let mut next = session.clone();
    let idx = next.current_exercise_index;
    let plan = next
        .routine_snapshot
        .exercises
        .get(idx)
        .cloned()
        .ok_or_else(|| EngineError::Storage(format!("session has no exercise at index {idx}")))?;
    let planned_rest = plan.rest_or(policy.default_rest_seconds);

    let effects = match event {
        Event::LogSet { weight, reps } => {
            if state != EngineState::Logging {
                return Err(reject(&event));
            }
            if !weight.is_finite() || weight <= 0.0 {
                return Err(EngineError::Validation(
                    "weight must be greater than zero".into(),
                ));
            }
            if reps == 0 {
                return Err(EngineError::Validation(
                    "reps must be greater than zero".into(),
                ));
            }

            let rest = next
                .pending_rest_seconds
                .take()
                .unwrap_or(policy.first_set_rest_seconds);
            let performed = next
                .logged_exercises
                .get_mut(idx)
                .ok_or_else(|| EngineError::Storage(format!("no logged exercise at index {idx}")))?;
            performed.sets.push(PerformedSet {
                set_number: performed.sets.len() as u32 + 1,
                reps,
                weight,
                rest_time_taken_seconds: rest,
                completed: true,
            });
            let logged = performed.sets.len();
            next.current_set_index = logged;

            if logged >= plan.planned_sets as usize {
                next.exercise_complete = true;
                next.rest_mode = RestMode::None;
            } else {
                next.rest_mode = RestMode::fixed(planned_rest);
            }
            vec![Effect::Persist]
        }

        Event::AdvanceExercise => {
            if state != EngineState::ExerciseComplete {
                return Err(reject(&event));
            }
            if next.is_last_exercise() {
                return Ok(Transition {
                    session: next,
                    effects: vec![Effect::ReadyForCompletion],
                });
            }
            enter_exercise(&mut next, idx + 1);
            vec![Effect::Persist, Effect::SeedDefaults]
        }

        Event::RepeatSet => {
            if state != EngineState::ExerciseComplete {
                return Err(reject(&event));
            }
            next.exercise_complete = false;
            next.rest_mode = RestMode::fixed(planned_rest);
            vec![Effect::Persist]
        }

        Event::Tick => match next.rest_mode {
            RestMode::Fixed {
                remaining_seconds,
                elapsed_seconds,
            } => {
                // An adjusted-away rest ends without crediting another second.
                let (remaining, elapsed) = match remaining_seconds {
                    0 => (0, elapsed_seconds),
                    n => (n - 1, elapsed_seconds.saturating_add(1)),
                };
                if remaining == 0 {
                    next.rest_mode = RestMode::None;
                    next.pending_rest_seconds = Some(elapsed);
                    vec![Effect::Persist, Effect::NotifyRestFinished]
                } else {
                    next.rest_mode = RestMode::Fixed {
                        remaining_seconds: remaining,
                        elapsed_seconds: elapsed,
                    };
                    Vec::new()
                }
            }
            _ => return Ok(Transition::unchanged(session)),
        },

        Event::Skip => {
            let RestMode::Fixed {
                elapsed_seconds, ..
            } = next.rest_mode
            else {
                return Err(reject(&event));
            };
            next.rest_mode = RestMode::None;
            next.pending_rest_seconds = Some(elapsed_seconds);
            vec![Effect::Persist]
        }

        Event::Adjust { delta_seconds } => {
            let RestMode::Fixed {
                remaining_seconds,
                elapsed_seconds,
            } = next.rest_mode
            else {
                return Err(reject(&event));
            };
            let remaining = (remaining_seconds as i64)
                .saturating_add(delta_seconds)
                .clamp(0, u32::MAX as i64);
            next.rest_mode = RestMode::Fixed {
                remaining_seconds: remaining as u32,
                elapsed_seconds,
            };
            Vec::new()
        }

        Event::EnterInfiniteRest => {
            if !matches!(state, EngineState::Logging | EngineState::RestingFixed) {
                return Err(reject(&event));
            }
            next.rest_mode = RestMode::Infinite { started_at: now };
            next.pending_rest_seconds = None;
            vec![Effect::Persist]
        }

        Event::ExitInfiniteRest => {
            let RestMode::Infinite { started_at } = next.rest_mode else {
                return Err(reject(&event));
            };
            next.rest_mode = RestMode::None;
            next.pending_rest_seconds = Some(seconds_between(started_at, now));
            vec![Effect::Persist]
        }

        Event::MoveToExercise { index } => {
            if state == EngineState::ExerciseComplete {
                return Err(reject(&event));
            }
            if index >= next.routine_snapshot.exercises.len() {
                return Ok(Transition::unchanged(session));
            }
            enter_exercise(&mut next, index);
            vec![Effect::Persist, Effect::SeedDefaults]
        }

        Event::Annotate { notes } => {
            let notes = notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty());
            if let Some(performed) = next.logged_exercises.get_mut(idx) {
                performed.notes = notes;
            }
            vec![Effect::Persist]
        }
    };

    Ok(Transition {
        session: next,
        effects,
    })
}

/// Points the session at `index` without touching anything already logged.
fn enter_exercise(session: &mut ActiveWorkoutSession, index: usize) {
    session.current_exercise_index = index;
    session.current_set_index = session
        .logged_exercises
        .get(index)
        .map_or(0, |e| e.sets.len());
    session.rest_mode = RestMode::None;
    session.exercise_complete = false;
    session.pending_rest_seconds = None;
}
