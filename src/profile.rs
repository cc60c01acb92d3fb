//! Active profile. Switching profiles purges any session the new profile
//! does not own, instead of waiting for the next read to evict it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::{
    error::{EngineError, Result},
    kv::KeyValueStore,
    storage::{DiscardReason, Fetched, SessionStore},
};

pub const PROFILE_KEY: &str = "active_profile_id";

#[async_trait]
pub trait ProfileContext: Send + Sync {
    async fn current_profile_id(&self) -> Result<String>;
}

#[derive(Clone)]
pub struct KvProfile {
    kv: Arc<dyn KeyValueStore>,
    fallback: String,
}

impl KvProfile {
    /// `fallback` is used until a profile has been chosen explicitly.
    pub fn new(kv: Arc<dyn KeyValueStore>, fallback: impl Into<String>) -> Self {
        Self {
            kv,
            fallback: fallback.into(),
        }
    }

    /// Makes `profile_id` active. Returns why the stored session was
    /// purged, if one was.
    pub async fn switch(
        &self,
        profile_id: &str,
        store: &SessionStore,
    ) -> Result<Option<DiscardReason>> {
        let profile_id = profile_id.trim();
        if profile_id.is_empty() || profile_id.chars().any(char::is_control) {
            return Err(EngineError::Validation(
                "profile id must be non-empty printable text".into(),
            ));
        }

        let previous = self.current_profile_id().await?;
        self.kv.set(PROFILE_KEY, profile_id).await?;
        info!(from = %previous, to = %profile_id, "active profile switched");

        match store.fetch(profile_id).await? {
            Fetched::Discarded(reason) => Ok(Some(reason)),
            Fetched::Found(_) | Fetched::Empty => Ok(None),
        }
    }
}

#[async_trait]
impl ProfileContext for KvProfile {
    async fn current_profile_id(&self) -> Result<String> {
        Ok(self
            .kv
            .get(PROFILE_KEY)
            .await?
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{Clock, ManualClock},
        kv::MemoryKv,
        models::{ActiveWorkoutSession, fixtures},
    };
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn switch_purges_sessions_of_other_profiles() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 2, 2, 9, 0, 0).unwrap(),
        ));
        let kv = Arc::new(MemoryKv::new());
        let store = SessionStore::new(kv.clone(), clock.clone());
        let profiles = KvProfile::new(kv.clone(), "default");

        assert_eq!(profiles.current_profile_id().await.unwrap(), "default");

        let mut s = ActiveWorkoutSession::new("s".into(), "default".into(), fixtures::routine(3), clock.now());
        store.save(&mut s).await.unwrap();

        let purged = profiles.switch("bea", &store).await.unwrap();
        assert_eq!(purged, Some(DiscardReason::OwnershipMismatch));
        assert_eq!(profiles.current_profile_id().await.unwrap(), "bea");

        // Switching back does not bring it back.
        assert_eq!(profiles.switch("default", &store).await.unwrap(), None);
        assert!(store.get("default").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_profile_is_rejected() {
        let kv = Arc::new(MemoryKv::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SessionStore::new(kv.clone(), clock);
        let profiles = KvProfile::new(kv, "default");
        assert!(matches!(
            profiles.switch("   ", &store).await,
            Err(EngineError::Validation(_))
        ));
    }
}
