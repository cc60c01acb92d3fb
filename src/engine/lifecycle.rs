//! Creating, resuming and discarding sessions.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clock::seconds_between,
    error::{EngineError, Result},
    models::{ActiveWorkoutSession, PerformedExercise, RestMode, RoutinePlan, SessionPatch},
    storage::{Fetched, SessionStore},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Initialized {
    Resumed(ActiveWorkoutSession),
    Fresh(ActiveWorkoutSession),
}

impl Initialized {
    pub fn is_resumed(&self) -> bool {
        matches!(self, Initialized::Resumed(_))
    }

    pub fn session(&self) -> &ActiveWorkoutSession {
        match self {
            Initialized::Resumed(s) | Initialized::Fresh(s) => s,
        }
    }

    pub fn into_session(self) -> ActiveWorkoutSession {
        match self {
            Initialized::Resumed(s) | Initialized::Fresh(s) => s,
        }
    }
}

/// Charges time spent suspended against a running fixed rest, so that a
/// countdown keeps running while the process is gone. A countdown that ran
/// out while suspended ends the rest.
pub fn catch_up(session: &ActiveWorkoutSession, now: DateTime<Utc>) -> ActiveWorkoutSession {
    let mut s = session.clone();
    if let RestMode::Fixed {
        remaining_seconds,
        elapsed_seconds,
    } = s.rest_mode
    {
        let served = seconds_between(s.last_activity_at, now).min(remaining_seconds);
        let remaining = remaining_seconds - served;
        let elapsed = elapsed_seconds.saturating_add(served);
        if remaining == 0 {
            s.rest_mode = RestMode::None;
            s.pending_rest_seconds = Some(elapsed);
        } else {
            s.rest_mode = RestMode::Fixed {
                remaining_seconds: remaining,
                elapsed_seconds: elapsed,
            };
        }
    }
    s
}

/// Repairs index/shape drift in a record read back from storage. Logged sets
/// are never dropped.
fn normalize(mut s: ActiveWorkoutSession) -> Result<ActiveWorkoutSession> {
    let planned = &s.routine_snapshot.exercises;
    if planned.is_empty() {
        return Err(EngineError::EmptyRoutine(s.routine_snapshot.name.clone()));
    }

    for plan in planned.iter().skip(s.logged_exercises.len()) {
        s.logged_exercises.push(PerformedExercise {
            exercise_id: plan.exercise_id.clone(),
            exercise_name: plan.exercise_name.clone(),
            sets: Vec::new(),
            notes: None,
        });
    }

    if s.current_exercise_index >= planned.len() {
        warn!(session_id = %s.id, index = s.current_exercise_index, "exercise index out of range, clamping");
        s.current_exercise_index = planned.len() - 1;
    }
    s.current_set_index = s.logged_exercises[s.current_exercise_index].sets.len();
    Ok(s)
}

#[derive(Clone)]
pub struct LifecycleManager {
    store: SessionStore,
}

impl LifecycleManager {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resumes the stored session for `routine` if `owner` may have it,
    /// otherwise starts and persists a fresh one.
    pub async fn initialize(&self, routine: RoutinePlan, owner: &str) -> Result<Initialized> {
        if routine.exercises.is_empty() {
            return Err(EngineError::EmptyRoutine(routine.name));
        }

        match self.store.fetch(owner).await? {
            Fetched::Found(stored) if stored.routine_snapshot.id == routine.id => {
                let session = self.resume(stored).await?;
                return Ok(Initialized::Resumed(session));
            }
            Fetched::Found(stored) => {
                info!(
                    session_id = %stored.id,
                    routine = %stored.routine_snapshot.name,
                    "replacing session for a different routine"
                );
            }
            Fetched::Empty | Fetched::Discarded(_) => {}
        }

        Ok(Initialized::Fresh(self.start_fresh(routine, owner).await))
    }

    /// Resumes whatever session `owner` has in the slot.
    pub async fn resume_active(&self, owner: &str) -> Result<Option<ActiveWorkoutSession>> {
        match self.store.fetch(owner).await? {
            Fetched::Found(stored) => Ok(Some(self.resume(stored).await?)),
            _ => Ok(None),
        }
    }

    /// Ignores any resumable session and starts over.
    pub async fn discard_and_restart(
        &self,
        routine: RoutinePlan,
        owner: &str,
    ) -> Result<ActiveWorkoutSession> {
        if routine.exercises.is_empty() {
            return Err(EngineError::EmptyRoutine(routine.name));
        }
        self.store.clear().await?;
        info!(owner = %owner, routine = %routine.name, "discarded stored session on request");
        Ok(self.start_fresh(routine, owner).await)
    }

    /// Writes the mutable part of `session`. Falls back to a full save when
    /// the slot was emptied underneath us.
    pub async fn checkpoint(&self, session: &mut ActiveWorkoutSession) -> Result<()> {
        match self.store.update(SessionPatch::from_session(session)).await? {
            Some(stored) if stored.id == session.id => {
                session.last_activity_at = stored.last_activity_at;
                Ok(())
            }
            _ => self.store.save(session).await,
        }
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }

    async fn resume(&self, stored: ActiveWorkoutSession) -> Result<ActiveWorkoutSession> {
        let mut session = catch_up(&normalize(stored)?, self.store.now());
        if let Err(e) = self.store.save(&mut session).await {
            warn!(session_id = %session.id, error = %e, "failed to checkpoint resumed session");
        }
        info!(
            session_id = %session.id,
            exercise = session.current_exercise_index,
            rest = session.rest_mode.kind(),
            "session resumed"
        );
        Ok(session)
    }

    async fn start_fresh(&self, routine: RoutinePlan, owner: &str) -> ActiveWorkoutSession {
        let mut session = ActiveWorkoutSession::new(
            Uuid::new_v4().to_string(),
            owner.to_string(),
            routine,
            self.store.now(),
        );
        if let Err(e) = self.store.save(&mut session).await {
            warn!(session_id = %session.id, error = %e, "failed to persist new session");
        }
        info!(session_id = %session.id, routine = %session.routine_snapshot.name, "session started");
        session
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        kv::MemoryKv,
        models::{PerformedSet, fixtures},
    };
    use chrono::{Duration, TimeZone};

    fn setup() -> (LifecycleManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 7, 1, 7, 0, 0).unwrap(),
        ));
        let store = SessionStore::new(Arc::new(MemoryKv::new()), clock.clone());
        (LifecycleManager::new(store), clock)
    }

    #[test]
    fn catch_up_charges_the_gap_against_fixed_rest() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 7, 0, 0).unwrap();
        let mut s = ActiveWorkoutSession::new("s".into(), "p".into(), fixtures::routine(3), now);
        s.rest_mode = RestMode::fixed(60);
        s.last_activity_at = now - Duration::seconds(20);

        let resumed = catch_up(&s, now);
        assert_eq!(
            resumed.rest_mode,
            RestMode::Fixed {
                remaining_seconds: 40,
                elapsed_seconds: 20
            }
        );
    }

    #[test]
    fn catch_up_never_goes_negative_and_ends_the_rest() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 7, 0, 0).unwrap();
        let mut s = ActiveWorkoutSession::new("s".into(), "p".into(), fixtures::routine(3), now);
        s.rest_mode = RestMode::fixed(60);
        s.last_activity_at = now - Duration::minutes(10);

        let resumed = catch_up(&s, now);
        assert_eq!(resumed.rest_mode, RestMode::None);
        assert_eq!(resumed.pending_rest_seconds, Some(60));
    }

    #[test]
    fn catch_up_leaves_infinite_rest_alone() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 7, 0, 0).unwrap();
        let mut s = ActiveWorkoutSession::new("s".into(), "p".into(), fixtures::routine(3), now);
        s.rest_mode = RestMode::Infinite {
            started_at: now - Duration::seconds(90),
        };
        s.last_activity_at = now - Duration::seconds(60);
        assert_eq!(catch_up(&s, now).rest_mode, s.rest_mode);
    }

    #[tokio::test]
    async fn fresh_session_is_persisted_immediately() {
        let (lm, _) = setup();
        let init = lm.initialize(fixtures::routine(3), "alice").await.unwrap();
        assert!(!init.is_resumed());

        let stored = lm.store().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.id, init.session().id);
        assert_eq!(stored.logged_exercises.len(), 2);
        assert_eq!(stored.total_sets(), 0);
    }

    #[tokio::test]
    async fn same_routine_resumes_with_rest_catch_up() {
        let (lm, clock) = setup();
        let mut s = lm
            .initialize(fixtures::routine(3), "alice")
            .await
            .unwrap()
            .into_session();
        s.rest_mode = RestMode::fixed(60);
        lm.checkpoint(&mut s).await.unwrap();

        clock.advance_secs(20);
        let init = lm.initialize(fixtures::routine(3), "alice").await.unwrap();
        assert!(init.is_resumed());
        assert_eq!(init.session().id, s.id);
        assert_eq!(
            init.session().rest_mode,
            RestMode::Fixed {
                remaining_seconds: 40,
                elapsed_seconds: 20
            }
        );
        assert_eq!(init.session().last_activity_at, clock.now());
    }

    #[tokio::test]
    async fn other_profile_or_routine_gets_a_fresh_session() {
        let (lm, _) = setup();
        let first = lm
            .initialize(fixtures::routine(3), "alice")
            .await
            .unwrap()
            .into_session();

        let bob = lm.initialize(fixtures::routine(3), "bob").await.unwrap();
        assert!(!bob.is_resumed());
        assert_ne!(bob.session().id, first.id);

        let mut other = fixtures::routine(3);
        other.id = "pull-a".into();
        let again = lm.initialize(other, "bob").await.unwrap();
        assert!(!again.is_resumed());
    }

    #[tokio::test]
    async fn stale_session_is_never_resumed() {
        let (lm, clock) = setup();
        lm.initialize(fixtures::routine(3), "alice").await.unwrap();
        clock.advance(Duration::hours(25));
        assert!(lm.resume_active("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn discard_and_restart_starts_over() {
        let (lm, _) = setup();
        let mut s = lm
            .initialize(fixtures::routine(3), "alice")
            .await
            .unwrap()
            .into_session();
        s.logged_exercises[0].sets.push(PerformedSet {
            set_number: 1,
            reps: 5,
            weight: 100.0,
            rest_time_taken_seconds: 0,
            completed: true,
        });
        lm.checkpoint(&mut s).await.unwrap();

        let fresh = lm.discard_and_restart(fixtures::routine(3), "alice").await.unwrap();
        assert_ne!(fresh.id, s.id);
        assert_eq!(lm.store().get("alice").await.unwrap().unwrap().total_sets(), 0);
    }

    #[tokio::test]
    async fn empty_routine_is_rejected() {
        let (lm, _) = setup();
        let mut r = fixtures::routine(3);
        r.exercises.clear();
        assert!(matches!(
            lm.initialize(r, "alice").await,
            Err(EngineError::EmptyRoutine(_))
        ));
    }

    #[tokio::test]
    async fn checkpoint_recreates_an_evicted_slot() {
        let (lm, _) = setup();
        let mut s = lm
            .initialize(fixtures::routine(3), "alice")
            .await
            .unwrap()
            .into_session();
        lm.clear().await.unwrap();

        s.current_exercise_index = 1;
        lm.checkpoint(&mut s).await.unwrap();
        let stored = lm.store().get("alice").await.unwrap().unwrap();
        assert_eq!(stored.current_exercise_index, 1);
    }

    #[tokio::test]
    async fn resume_repairs_out_of_range_index() {
        let (lm, clock) = setup();
        let mut s = ActiveWorkoutSession::new("s".into(), "alice".into(), fixtures::routine(3), clock.now());
        s.current_exercise_index = 7;
        s.logged_exercises.truncate(1);
        lm.store().save(&mut s).await.unwrap();

        let resumed = lm.resume_active("alice").await.unwrap().unwrap();
        assert_eq!(resumed.current_exercise_index, 1);
        assert_eq!(resumed.logged_exercises.len(), 2);
    }
}
