//! Finished-workout archive. The same tables answer "what did I lift last
//! time" for the default-seeding lookup.

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    error::Result,
    lookup::{LastPerformance, PerformanceLookup},
    models::FinishedWorkout,
};

#[async_trait]
pub trait WorkoutArchive: Send + Sync {
    async fn append(&self, workout: &FinishedWorkout) -> Result<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutSummary {
    pub id: String,
    pub date: String,
    pub routine_name: String,
    pub duration_minutes: i64,
    pub sets: i64,
    pub volume: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SqliteArchive {
    pool: SqlitePool,
}

impl SqliteArchive {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Performance lookup scoped to one profile's history.
    pub fn history_for(&self, profile_id: &str) -> ProfileHistory {
        ProfileHistory {
            pool: self.pool.clone(),
            profile_id: profile_id.to_string(),
        }
    }

    /// Most recent workouts first.
    pub async fn recent(&self, profile_id: &str, limit: i64) -> Result<Vec<WorkoutSummary>> {
        let rows = sqlx::query_as::<_, (String, String, String, i64, Option<String>, i64, f64)>(
            r#"
            SELECT w.id, w.date, w.routine_name, w.duration_minutes, w.notes,
                   COUNT(s.set_number),
                   COALESCE(SUM(s.weight * s.reps), 0.0)
            FROM workouts w
            LEFT JOIN workout_sets s ON s.workout_id = w.id
            WHERE w.profile_id = ?
            GROUP BY w.id
            ORDER BY w.date DESC
            LIMIT ?
            "#,
        )
        .bind(profile_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, date, routine_name, duration_minutes, notes, sets, volume)| WorkoutSummary {
                    id,
                    date,
                    routine_name,
                    duration_minutes,
                    sets,
                    volume,
                    notes,
                },
            )
            .collect())
    }
}

#[async_trait]
impl WorkoutArchive for SqliteArchive {
    async fn append(&self, workout: &FinishedWorkout) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workouts (id, profile_id, date, routine_id, routine_name, duration_minutes, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&workout.id)
        .bind(&workout.profile_id)
        .bind(workout.date.to_rfc3339_opts(SecondsFormat::Secs, true))
        .bind(&workout.routine_id)
        .bind(&workout.routine_name)
        .bind(workout.duration_minutes)
        .bind(workout.notes.as_deref())
        .execute(&mut *tx)
        .await?;

        for (i, ex) in workout.exercises.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO workout_exercises (workout_id, order_index, exercise_id, exercise_name, notes)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&workout.id)
            .bind(i as i64)
            .bind(&ex.exercise_id)
            .bind(&ex.exercise_name)
            .bind(ex.notes.as_deref())
            .execute(&mut *tx)
            .await?;

            for set in &ex.sets {
                sqlx::query(
                    r#"
                    INSERT INTO workout_sets (workout_id, order_index, set_number, weight, reps, rest_seconds)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&workout.id)
                .bind(i as i64)
                .bind(set.set_number as i64)
                .bind(set.weight)
                .bind(set.reps as i64)
                .bind(set.rest_time_taken_seconds as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(workout_id = %workout.id, routine = %workout.routine_name, "workout archived");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ProfileHistory {
    pool: SqlitePool,
    profile_id: String,
}

#[async_trait]
impl PerformanceLookup for ProfileHistory {
    async fn last_performance(&self, exercise_id: &str) -> Result<Option<LastPerformance>> {
        let row: Option<(f64, i64)> = sqlx::query_as(
            r#"
            SELECT s.weight, s.reps
            FROM workout_sets s
            JOIN workout_exercises we
              ON we.workout_id = s.workout_id AND we.order_index = s.order_index
            JOIN workouts w ON w.id = s.workout_id
            WHERE we.exercise_id = ? AND w.profile_id = ?
            ORDER BY w.date DESC, s.set_number DESC
            LIMIT 1
            "#,
        )
        .bind(exercise_id)
        .bind(&self.profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(weight, reps)| LastPerformance {
            weight,
            reps: reps.max(0) as u32,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        models::{PerformedExercise, PerformedSet},
    };
    use chrono::{Duration, TimeZone, Utc};

    fn workout(id: &str, profile: &str, days_ago: i64, weight: f64) -> FinishedWorkout {
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
        let set = |n: u32, w: f64| PerformedSet {
            set_number: n,
            reps: 5,
            weight: w,
            rest_time_taken_seconds: 90,
            completed: true,
        };
        FinishedWorkout {
            id: id.into(),
            profile_id: profile.into(),
            date: base - Duration::days(days_ago),
            routine_id: "push-a".into(),
            routine_name: "Push A".into(),
            exercises: vec![PerformedExercise {
                exercise_id: "bench".into(),
                exercise_name: "Bench Press".into(),
                sets: vec![set(1, weight - 10.0), set(2, weight)],
                notes: None,
            }],
            duration_minutes: 45,
            notes: Some("ok".into()),
        }
    }

    #[tokio::test]
    async fn last_performance_is_latest_set_of_latest_workout() {
        let archive = SqliteArchive::new(db::open_in_memory().await.unwrap());
        archive.append(&workout("w1", "alice", 7, 80.0)).await.unwrap();
        archive.append(&workout("w2", "alice", 1, 90.0)).await.unwrap();
        archive.append(&workout("w3", "bob", 0, 200.0)).await.unwrap();

        let last = archive
            .history_for("alice")
            .last_performance("bench")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last, LastPerformance { weight: 90.0, reps: 5 });

        let none = archive.history_for("alice").last_performance("squat").await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn recent_summarizes_per_profile() {
        let archive = SqliteArchive::new(db::open_in_memory().await.unwrap());
        archive.append(&workout("w1", "alice", 7, 80.0)).await.unwrap();
        archive.append(&workout("w2", "alice", 1, 90.0)).await.unwrap();
        archive.append(&workout("w3", "bob", 0, 200.0)).await.unwrap();

        let recent = archive.recent("alice", 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "w2");
        assert_eq!(recent[0].sets, 2);
        assert_eq!(recent[0].volume, 80.0 * 5.0 + 90.0 * 5.0);
    }
}
