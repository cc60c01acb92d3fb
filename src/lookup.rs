//! Prior-performance lookup and the weight/reps defaults derived from it.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::{error::Result, models::PlannedExercise};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LastPerformance {
    pub weight: f64,
    pub reps: u32,
}

#[async_trait]
pub trait PerformanceLookup: Send + Sync {
    async fn last_performance(&self, exercise_id: &str) -> Result<Option<LastPerformance>>;
}

/// Lookup with no history; every exercise falls through to the plan.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

#[async_trait]
impl PerformanceLookup for NoHistory {
    async fn last_performance(&self, _exercise_id: &str) -> Result<Option<LastPerformance>> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultSource {
    History,
    Plan,
    Fallback,
}

/// Pre-filled input values for the next set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SetDefaults {
    pub weight: f64,
    pub reps: u32,
    pub weight_from: DefaultSource,
    pub reps_from: DefaultSource,
}

/// Safe values used when neither history nor plan say anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeDefaults {
    pub weight: f64,
    pub reps: u32,
}

impl Default for SafeDefaults {
    fn default() -> Self {
        Self {
            weight: 20.0,
            reps: 10,
        }
    }
}

/// history -> plan -> safe default, resolved per field.
pub fn resolve_defaults(
    history: Option<LastPerformance>,
    plan: &PlannedExercise,
    safe: SafeDefaults,
) -> SetDefaults {
    let history = history.filter(|h| h.weight > 0.0 && h.reps > 0);

    let (weight, weight_from) = match (history, plan.planned_weight) {
        (Some(h), _) => (h.weight, DefaultSource::History),
        (None, Some(w)) if w > 0.0 => (w, DefaultSource::Plan),
        _ => (safe.weight, DefaultSource::Fallback),
    };

    let (reps, reps_from) = match history {
        Some(h) => (h.reps, DefaultSource::History),
        None if plan.planned_reps > 0 => (plan.planned_reps, DefaultSource::Plan),
        None => (safe.reps, DefaultSource::Fallback),
    };

    SetDefaults {
        weight,
        reps,
        weight_from,
        reps_from,
    }
}

/// Asks `lookup` for history and resolves defaults. A failed lookup is
/// logged and treated as no history.
pub async fn seed_defaults(
    lookup: &dyn PerformanceLookup,
    plan: &PlannedExercise,
    safe: SafeDefaults,
) -> SetDefaults {
    let history = match lookup.last_performance(&plan.exercise_id).await {
        Ok(h) => h,
        Err(e) => {
            warn!(exercise_id = %plan.exercise_id, error = %e, "performance lookup failed");
            None
        }
    };
    resolve_defaults(history, plan, safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::EngineError, models::fixtures};

    struct Broken;

    #[async_trait]
    impl PerformanceLookup for Broken {
        async fn last_performance(&self, _: &str) -> Result<Option<LastPerformance>> {
            Err(EngineError::Storage("disk on fire".into()))
        }
    }

    #[test]
    fn history_wins_over_plan() {
        let plan = &fixtures::routine(3).exercises[0];
        let d = resolve_defaults(
            Some(LastPerformance {
                weight: 72.5,
                reps: 6,
            }),
            plan,
            SafeDefaults::default(),
        );
        assert_eq!((d.weight, d.reps), (72.5, 6));
        assert_eq!(d.weight_from, DefaultSource::History);
    }

    #[test]
    fn plan_then_fallback_per_field() {
        let routine = fixtures::routine(3);
        let d = resolve_defaults(None, &routine.exercises[0], SafeDefaults::default());
        assert_eq!((d.weight, d.reps), (60.0, 8));

        // No planned weight: weight falls back, reps still come from the plan.
        let d = resolve_defaults(None, &routine.exercises[1], SafeDefaults::default());
        assert_eq!((d.weight, d.reps), (20.0, 10));
        assert_eq!(d.weight_from, DefaultSource::Fallback);
        assert_eq!(d.reps_from, DefaultSource::Plan);
    }

    #[tokio::test]
    async fn failed_lookup_falls_through_to_plan() {
        let plan = &fixtures::routine(3).exercises[0];
        let d = seed_defaults(&Broken, plan, SafeDefaults::default()).await;
        assert_eq!(d.weight_from, DefaultSource::Plan);
    }
}
