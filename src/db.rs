use std::{path::Path, str::FromStr};

use anyhow::{Context, Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub type DB = SqlitePool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS routines (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS routine_exercises (
    routine_id     TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
    order_index    INTEGER NOT NULL,
    exercise_id    TEXT NOT NULL,
    exercise_name  TEXT NOT NULL,
    sets           INTEGER NOT NULL,
    reps           INTEGER NOT NULL,
    weight         REAL,
    rest_seconds   INTEGER,
    PRIMARY KEY (routine_id, order_index)
);

CREATE TABLE IF NOT EXISTS workouts (
    id               TEXT PRIMARY KEY,
    profile_id       TEXT NOT NULL,
    date             TEXT NOT NULL,
    routine_id       TEXT NOT NULL,
    routine_name     TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    notes            TEXT
);

CREATE TABLE IF NOT EXISTS workout_exercises (
    workout_id    TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
    order_index   INTEGER NOT NULL,
    exercise_id   TEXT NOT NULL,
    exercise_name TEXT NOT NULL,
    notes         TEXT,
    PRIMARY KEY (workout_id, order_index)
);

CREATE TABLE IF NOT EXISTS workout_sets (
    workout_id   TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
    order_index  INTEGER NOT NULL,
    set_number   INTEGER NOT NULL,
    weight       REAL NOT NULL,
    reps         INTEGER NOT NULL,
    rest_seconds INTEGER NOT NULL,
    PRIMARY KEY (workout_id, order_index, set_number)
);

CREATE INDEX IF NOT EXISTS idx_workout_exercises_exercise
    ON workout_exercises(exercise_id);
"#;

pub async fn open(path: &Path) -> Result<DB> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {}", parent.display()))?;
        }
    }

    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database, mostly for tests.
pub async fn open_in_memory() -> Result<DB> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    // The database lives as long as its one connection.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &DB) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("Failed to apply database schema")?;
    Ok(())
}
