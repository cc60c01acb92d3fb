//! Session store adapter: one active-session record under a well-known key,
//! guarded by an ownership check and a staleness window on every read.

use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::{
    clock::Clock,
    error::Result,
    kv::KeyValueStore,
    models::{ActiveWorkoutSession, SessionPatch},
};

pub const SESSION_KEY: &str = "active_workout_session";

/// Idle time after which a stored session is discarded on the next read.
pub const DEFAULT_STALE_AFTER_HOURS: i64 = 24;

/// Why a stored session was evicted instead of returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    OwnershipMismatch,
    Stale,
    Corrupt,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OwnershipMismatch => "belongs to another profile",
            Self::Stale => "idle for too long",
            Self::Corrupt => "unreadable",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Found(ActiveWorkoutSession),
    Empty,
    Discarded(DiscardReason),
}

impl Fetched {
    pub fn into_session(self) -> Option<ActiveWorkoutSession> {
        match self {
            Fetched::Found(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    stale_after: Duration,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            clock,
            stale_after: Duration::hours(DEFAULT_STALE_AFTER_HOURS),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Returns the reason `session` may not be resumed by `owner`, if any.
    pub fn check(
        &self,
        session: &ActiveWorkoutSession,
        owner: &str,
        now: DateTime<Utc>,
    ) -> Option<DiscardReason> {
        if session.owner_profile_id != owner {
            Some(DiscardReason::OwnershipMismatch)
        } else if now - session.last_activity_at > self.stale_after {
            Some(DiscardReason::Stale)
        } else {
            None
        }
    }

    /// Reads the slot, evicting whatever `owner` may not resume.
    pub async fn fetch(&self, owner: &str) -> Result<Fetched> {
        let Some(raw) = self.kv.get(SESSION_KEY).await? else {
            return Ok(Fetched::Empty);
        };

        let session: ActiveWorkoutSession = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "discarding unreadable stored session");
                self.kv.remove(SESSION_KEY).await?;
                return Ok(Fetched::Discarded(DiscardReason::Corrupt));
            }
        };

        match self.check(&session, owner, self.clock.now()) {
            None => Ok(Fetched::Found(session)),
            Some(reason) => {
                info!(
                    session_id = %session.id,
                    owner = %session.owner_profile_id,
                    requested_by = %owner,
                    reason = %reason,
                    "evicting stored session"
                );
                self.kv.remove(SESSION_KEY).await?;
                Ok(Fetched::Discarded(reason))
            }
        }
    }

    pub async fn get(&self, owner: &str) -> Result<Option<ActiveWorkoutSession>> {
        Ok(self.fetch(owner).await?.into_session())
    }

    /// Full replace. Stamps `last_activity_at` on the caller's copy too.
    pub async fn save(&self, session: &mut ActiveWorkoutSession) -> Result<()> {
        session.last_activity_at = session.last_activity_at.max(self.clock.now());
        let raw = serde_json::to_string(session)?;
        self.kv.set(SESSION_KEY, &raw).await?;
        debug!(session_id = %session.id, "session saved");
        Ok(())
    }

    /// Merge-patch onto the stored record. Returns the merged record, or
    /// `None` when the slot is empty or unreadable.
    pub async fn update(&self, patch: SessionPatch) -> Result<Option<ActiveWorkoutSession>> {
        let Some(raw) = self.kv.get(SESSION_KEY).await? else {
            return Ok(None);
        };
        let Ok(mut session) = serde_json::from_str::<ActiveWorkoutSession>(&raw) else {
            return Ok(None);
        };

        patch.apply_to(&mut session);
        session.last_activity_at = session.last_activity_at.max(self.clock.now());
        self.kv
            .set(SESSION_KEY, &serde_json::to_string(&session)?)
            .await?;
        debug!(session_id = %session.id, "session updated");
        Ok(Some(session))
    }

    pub async fn clear(&self) -> Result<()> {
        self.kv.remove(SESSION_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        kv::MemoryKv,
        models::{RestMode, fixtures},
    };
    use chrono::TimeZone;

    fn setup() -> (SessionStore, Arc<ManualClock>, Arc<MemoryKv>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
        ));
        let kv = Arc::new(MemoryKv::new());
        let store = SessionStore::new(kv.clone(), clock.clone());
        (store, clock, kv)
    }

    fn session(owner: &str, now: DateTime<Utc>) -> ActiveWorkoutSession {
        ActiveWorkoutSession::new("s1".into(), owner.into(), fixtures::routine(3), now)
    }

    #[tokio::test]
    async fn save_then_get_for_owner() {
        let (store, clock, _) = setup();
        let mut s = session("alice", clock.now());
        store.save(&mut s).await.unwrap();

        let got = store.get("alice").await.unwrap().unwrap();
        assert_eq!(got.id, "s1");
    }

    #[tokio::test]
    async fn other_profile_never_sees_the_session_and_it_is_evicted() {
        let (store, clock, kv) = setup();
        let mut s = session("alice", clock.now());
        store.save(&mut s).await.unwrap();

        assert_eq!(
            store.fetch("bob").await.unwrap(),
            Fetched::Discarded(DiscardReason::OwnershipMismatch)
        );
        assert_eq!(kv.get(SESSION_KEY).await.unwrap(), None);
        assert_eq!(store.get("alice").await.unwrap(), None);
    }

    #[tokio::test]
    async fn staleness_window_is_inclusive() {
        let (store, clock, _) = setup();
        let mut s = session("alice", clock.now());
        store.save(&mut s).await.unwrap();

        clock.advance(Duration::hours(24));
        assert!(store.get("alice").await.unwrap().is_some());

        clock.advance_secs(1);
        assert_eq!(
            store.fetch("alice").await.unwrap(),
            Fetched::Discarded(DiscardReason::Stale)
        );
        assert_eq!(store.fetch("alice").await.unwrap(), Fetched::Empty);
    }

    #[tokio::test]
    async fn corrupt_record_is_discarded() {
        let (store, _, kv) = setup();
        kv.set(SESSION_KEY, "{not json").await.unwrap();

        assert_eq!(
            store.fetch("alice").await.unwrap(),
            Fetched::Discarded(DiscardReason::Corrupt)
        );
        assert_eq!(kv.get(SESSION_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_and_update_stamp_last_activity() {
        let (store, clock, _) = setup();
        let mut s = session("alice", clock.now());
        store.save(&mut s).await.unwrap();

        clock.advance_secs(30);
        let merged = store
            .update(SessionPatch {
                rest_mode: Some(RestMode::fixed(60)),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(merged.last_activity_at, clock.now());
        assert_eq!(merged.rest_mode, RestMode::fixed(60));
        assert_eq!(merged.current_exercise_index, 0);
    }

    #[tokio::test]
    async fn update_on_empty_slot_reports_none() {
        let (store, _, _) = setup();
        let merged = store.update(SessionPatch::default()).await.unwrap();
        assert!(merged.is_none());
    }

    #[tokio::test]
    async fn clear_is_unconditional() {
        let (store, clock, _) = setup();
        let mut s = session("alice", clock.now());
        store.save(&mut s).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.fetch("alice").await.unwrap(), Fetched::Empty);
    }
}
