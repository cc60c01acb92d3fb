use std::sync::Arc;

use anyhow::{Context, Result};
use liftlog::{
    archive::SqliteArchive,
    catalog::SqliteCatalog,
    clock::SystemClock,
    db::{self, DB},
    engine::{EngineContext, EngineSettings, LifecycleManager},
    kv::SqliteKv,
    profile::{KvProfile, ProfileContext},
    storage::SessionStore,
};
use tracing::debug;

use crate::types::{Config, OutputFmt};

pub mod config;
pub mod history;
pub mod profile;
pub mod routine;
pub mod session;

/// Everything a command needs, wired once per invocation.
pub struct App {
    pub store: SessionStore,
    pub catalog: SqliteCatalog,
    pub archive: SqliteArchive,
    pub profiles: KvProfile,
    pub settings: EngineSettings,
    pub fmt: OutputFmt,
}

impl App {
    pub async fn open(cfg: &Config, fmt: OutputFmt) -> Result<Self> {
        let db_path = cfg.db_path();
        debug!(path = %db_path.display(), "opening database");
        let pool: DB = db::open(&db_path)
            .await
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        let kv = Arc::new(SqliteKv::new(pool.clone()));
        let store = SessionStore::new(kv.clone(), Arc::new(SystemClock))
            .with_stale_after(cfg.stale_after());

        Ok(Self {
            store,
            catalog: SqliteCatalog::new(pool.clone()),
            archive: SqliteArchive::new(pool),
            profiles: KvProfile::new(kv, cfg.default_profile()),
            settings: cfg.engine_settings(),
            fmt,
        })
    }

    pub async fn profile(&self) -> Result<String> {
        Ok(self.profiles.current_profile_id().await?)
    }

    /// Engine context for `profile`, with defaults drawn from its history.
    pub fn context(&self, profile: &str) -> EngineContext {
        EngineContext {
            lifecycle: LifecycleManager::new(self.store.clone()),
            lookup: Arc::new(self.archive.history_for(profile)),
            settings: self.settings,
        }
    }
}
