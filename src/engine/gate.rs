//! Quality checks a session must pass before it becomes a finished workout.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ActiveWorkoutSession, FinishedWorkout};

pub const MIN_DURATION_MINUTES: i64 = 2;
pub const MIN_TOTAL_SETS: usize = 3;
pub const MIN_TOTAL_VOLUME: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    TooShort,
    NoExercisesCompleted,
    TooFewSets,
    LowVolume,
}

impl BlockReason {
    /// Hard blocks can never be overridden.
    pub fn overridable(&self) -> bool {
        matches!(self, Self::TooFewSets | Self::LowVolume)
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::TooShort => "the workout lasted less than 2 minutes",
            Self::NoExercisesCompleted => "no exercise has a logged set",
            Self::TooFewSets => "fewer than 3 sets were logged",
            Self::LowVolume => "total volume is below 100",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum CompletionVerdict {
    Proceed,
    HardBlock(BlockReason),
    SoftBlock(BlockReason),
}

impl CompletionVerdict {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    /// Whether finalizing is allowed, given the caller's override choice.
    pub fn permits(&self, override_soft: bool) -> bool {
        match self {
            Self::Proceed => true,
            Self::SoftBlock(_) => override_soft,
            Self::HardBlock(_) => false,
        }
    }
}

/// Whole minutes between start and `now`.
pub fn duration_minutes(session: &ActiveWorkoutSession, now: DateTime<Utc>) -> i64 {
    (now - session.started_at).num_minutes().max(0)
}

/// Checks run in priority order; the first failing one wins.
pub fn evaluate(session: &ActiveWorkoutSession, now: DateTime<Utc>) -> CompletionVerdict {
    if duration_minutes(session, now) < MIN_DURATION_MINUTES {
        return CompletionVerdict::HardBlock(BlockReason::TooShort);
    }
    if session.exercises_with_sets() == 0 {
        return CompletionVerdict::HardBlock(BlockReason::NoExercisesCompleted);
    }
    if session.total_sets() < MIN_TOTAL_SETS {
        return CompletionVerdict::SoftBlock(BlockReason::TooFewSets);
    }
    if session.total_volume() < MIN_TOTAL_VOLUME {
        return CompletionVerdict::SoftBlock(BlockReason::LowVolume);
    }
    CompletionVerdict::Proceed
}

/// Builds the archive artifact. Exercises with no sets are dropped.
pub fn finalize(
    session: &ActiveWorkoutSession,
    now: DateTime<Utc>,
    notes: Option<String>,
) -> FinishedWorkout {
    FinishedWorkout {
        id: Uuid::new_v4().to_string(),
        profile_id: session.owner_profile_id.clone(),
        date: now,
        routine_id: session.routine_snapshot.id.clone(),
        routine_name: session.routine_snapshot.name.clone(),
        exercises: session
            .logged_exercises
            .iter()
            .filter(|e| !e.sets.is_empty())
            .cloned()
            .collect(),
        duration_minutes: duration_minutes(session, now),
        notes: notes.filter(|n| !n.trim().is_empty()),
    }
}
