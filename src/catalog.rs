//! Routine catalog. Sessions only ever see snapshots taken from here.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    error::{EngineError, Result},
    models::{PlannedExercise, RoutinePlan},
};

#[async_trait]
pub trait RoutineCatalog: Send + Sync {
    async fn get_routine(&self, id: &str) -> Result<Option<RoutinePlan>>;

    /// Like `get_routine`, but a missing id is an error.
    async fn require_routine(&self, id: &str) -> Result<RoutinePlan> {
        self.get_routine(id)
            .await?
            .ok_or_else(|| EngineError::RoutineNotFound(id.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutineRow {
    pub idx: i64,
    pub id: String,
    pub name: String,
    pub exercises: i64,
}

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores `routine`. Returns `false` if the id or name is already taken.
    pub async fn insert(&self, routine: &RoutinePlan) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query("INSERT INTO routines (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&routine.id)
            .bind(&routine.name)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await;

        match res {
            Ok(_) => {}
            // 2067 = SQLITE_CONSTRAINT_UNIQUE, 1555 = SQLITE_CONSTRAINT_PRIMARYKEY
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.code().as_deref(), Some("2067") | Some("1555")) =>
            {
                tx.rollback().await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }

        for ex in &routine.exercises {
            sqlx::query(
                r#"
                INSERT INTO routine_exercises
                    (routine_id, order_index, exercise_id, exercise_name, sets, reps, weight, rest_seconds)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&routine.id)
            .bind(ex.order as i64)
            .bind(&ex.exercise_id)
            .bind(&ex.exercise_name)
            .bind(ex.planned_sets as i64)
            .bind(ex.planned_reps as i64)
            .bind(ex.planned_weight)
            .bind(ex.rest_seconds.map(|r| r as i64))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn list(&self) -> Result<Vec<RoutineRow>> {
        let rows = sqlx::query_as::<_, (i64, String, String, i64)>(
            r#"
            SELECT ROW_NUMBER() OVER (ORDER BY r.name), r.id, r.name,
                   (SELECT COUNT(*) FROM routine_exercises re WHERE re.routine_id = r.id)
            FROM routines r
            ORDER BY r.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(idx, id, name, exercises)| RoutineRow {
                idx,
                id,
                name,
                exercises,
            })
            .collect())
    }

    /// Resolves a list index (from `list`), an id, or a case-insensitive name.
    pub async fn find(&self, query: &str) -> Result<Option<RoutinePlan>> {
        let id: Option<String> = if let Ok(idx) = query.parse::<i64>() {
            sqlx::query_scalar(
                r#"
                SELECT id FROM (
                    SELECT id, ROW_NUMBER() OVER (ORDER BY name) AS rn FROM routines
                ) t
                WHERE t.rn = ?
                "#,
            )
            .bind(idx)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT id FROM routines WHERE id = ? OR lower(name) = lower(?)")
                .bind(query)
                .bind(query)
                .fetch_optional(&self.pool)
                .await?
        };

        match id {
            // The id was just resolved, so a missing row means it was deleted underneath us.
            Some(id) => self.require_routine(&id).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM routines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn names(&self) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar("SELECT name FROM routines ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl RoutineCatalog for SqliteCatalog {
    async fn get_routine(&self, id: &str) -> Result<Option<RoutinePlan>> {
        let Some(name) = sqlx::query_scalar::<_, String>("SELECT name FROM routines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, (i64, String, String, i64, i64, Option<f64>, Option<i64>)>(
            r#"
            SELECT order_index, exercise_id, exercise_name, sets, reps, weight, rest_seconds
            FROM routine_exercises
            WHERE routine_id = ?
            ORDER BY order_index
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let exercises = rows
            .into_iter()
            .map(
                |(order, exercise_id, exercise_name, sets, reps, weight, rest)| PlannedExercise {
                    exercise_id,
                    exercise_name,
                    planned_sets: sets.max(0) as u32,
                    planned_reps: reps.max(0) as u32,
                    planned_weight: weight,
                    rest_seconds: rest.map(|r| r.max(0) as u32),
                    order: order.max(0) as u32,
                },
            )
            .collect();

        Ok(Some(RoutinePlan {
            id: id.to_string(),
            name,
            exercises,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn routine(id: &str, name: &str) -> RoutinePlan {
        RoutinePlan {
            id: id.into(),
            name: name.into(),
            exercises: vec![PlannedExercise {
                exercise_id: "squat".into(),
                exercise_name: "Back Squat".into(),
                planned_sets: 5,
                planned_reps: 5,
                planned_weight: Some(100.0),
                rest_seconds: None,
                order: 0,
            }],
        }
    }

    #[tokio::test]
    async fn insert_get_and_reject_duplicates() {
        let catalog = SqliteCatalog::new(db::open_in_memory().await.unwrap());
        assert!(catalog.insert(&routine("legs", "Legs")).await.unwrap());
        assert!(!catalog.insert(&routine("legs", "Legs again")).await.unwrap());
        assert!(!catalog.insert(&routine("legs-2", "Legs")).await.unwrap());

        let got = catalog.get_routine("legs").await.unwrap().unwrap();
        assert_eq!(got, routine("legs", "Legs"));
    }

    #[tokio::test]
    async fn find_by_index_id_or_name() {
        let catalog = SqliteCatalog::new(db::open_in_memory().await.unwrap());
        catalog.insert(&routine("pull", "Pull")).await.unwrap();
        catalog.insert(&routine("legs", "Legs")).await.unwrap();

        assert_eq!(catalog.find("1").await.unwrap().unwrap().id, "legs");
        assert_eq!(catalog.find("pull").await.unwrap().unwrap().name, "Pull");
        assert_eq!(catalog.find("LEGS").await.unwrap().unwrap().id, "legs");
        assert!(catalog.find("push").await.unwrap().is_none());

        let rows = catalog.list().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].exercises, 1);

        assert!(catalog.delete("pull").await.unwrap());
        assert!(catalog.get_routine("pull").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn require_routine_reports_missing_ids() {
        let catalog = SqliteCatalog::new(db::open_in_memory().await.unwrap());
        catalog.insert(&routine("legs", "Legs")).await.unwrap();

        assert_eq!(catalog.require_routine("legs").await.unwrap().name, "Legs");
        let err = catalog.require_routine("push").await.unwrap_err();
        assert!(matches!(err, EngineError::RoutineNotFound(ref id) if id == "push"));
        assert!(!err.is_persistence());
    }
}
