use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{parse_category, parse_datetime, parse_difficulty},
        Database,
    },
    models::{default_workouts, Segment, Workout},
};

const SELECT_WORKOUT: &str = "SELECT id, name, description, difficulty, category, segments_json, created_at, updated_at
     FROM workouts";

fn row_to_workout(row: &Row) -> Result<Workout> {
    let id: String = row.get("id")?;
    let segments_json: String = row.get("segments_json")?;
    let segments: Vec<Segment> = serde_json::from_str(&segments_json)
        .with_context(|| format!("failed to decode segments of workout {id}"))?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    let mut workout = Workout::new(id, row.get::<_, String>("name")?, segments)?
        .with_timestamps(
            parse_datetime(&created_at, "created_at")?,
            parse_datetime(&updated_at, "updated_at")?,
        );
    if let Some(description) = row.get::<_, Option<String>>("description")? {
        workout = workout.with_description(description);
    }
    if let Some(difficulty) = parse_difficulty(row.get("difficulty")?)? {
        workout = workout.with_difficulty(difficulty);
    }
    if let Some(category) = parse_category(row.get("category")?)? {
        workout = workout.with_category(category);
    }

    Ok(workout)
}

fn upsert(conn: &Connection, workout: &Workout) -> Result<()> {
    let segments_json =
        serde_json::to_string(workout.segments()).context("failed to encode segments")?;
    conn.execute(
        "INSERT INTO workouts (id, name, description, difficulty, category, segments_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             description = excluded.description,
             difficulty = excluded.difficulty,
             category = excluded.category,
             segments_json = excluded.segments_json,
             updated_at = excluded.updated_at",
        params![
            workout.id(),
            workout.name(),
            workout.description(),
            workout.difficulty().map(|d| d.as_str()),
            workout.category().map(|c| c.as_str()),
            segments_json,
            workout.created_at().to_rfc3339(),
            workout.updated_at().to_rfc3339(),
        ],
    )
    .with_context(|| format!("failed to save workout {}", workout.id()))?;
    Ok(())
}

fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM workouts", [], |row| row.get(0))?)
}

impl Database {
    /// Returns `Ok(None)` when no workout has this id. A stored workout that no
    /// longer validates is an error carrying the `WorkoutError`.
    pub async fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_WORKOUT} WHERE id = ?1"))?;
            let mut rows = stmt.query(params![workout_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_workout(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// All workouts in creation order.
    pub async fn list_workouts(&self) -> Result<Vec<Workout>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_WORKOUT} ORDER BY created_at ASC, id ASC"))?;
            let mut rows = stmt.query([])?;
            let mut workouts = Vec::new();
            while let Some(row) = rows.next()? {
                workouts.push(row_to_workout(row)?);
            }
            Ok(workouts)
        })
        .await
    }

    /// Inserts or replaces a workout by id. The creation time of an existing row
    /// is kept; `updated_at` is set to now.
    pub async fn put_workout(&self, workout: &Workout) -> Result<Workout> {
        let mut record = workout.clone();
        record.touch(Utc::now());
        self.execute(move |conn| {
            upsert(conn, &record)?;
            let created_at: Option<String> = conn
                .query_row(
                    "SELECT created_at FROM workouts WHERE id = ?1",
                    params![record.id()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(created_at) = created_at {
                let created_at = parse_datetime(&created_at, "created_at")?;
                let updated_at = record.updated_at();
                record = record.with_timestamps(created_at, updated_at);
            }
            Ok(record)
        })
        .await
    }

    /// Returns whether a row was removed.
    pub async fn delete_workout(&self, workout_id: &str) -> Result<bool> {
        let workout_id = workout_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM workouts WHERE id = ?1", params![workout_id])?;
            Ok(rows_affected > 0)
        })
        .await
    }

    /// Fills an empty store with the bundled sample workouts. Returns how many
    /// were inserted.
    pub async fn seed_default_workouts(&self) -> Result<usize> {
        self.execute(|conn| {
            if count(conn)? > 0 {
                return Ok(0);
            }
            let tx = conn.transaction()?;
            let defaults = default_workouts();
            for workout in &defaults {
                upsert(&tx, workout)?;
            }
            tx.commit().context("failed to commit default workouts")?;
            Ok(defaults.len())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, SegmentKind, WorkoutError};
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("workouts.sqlite3")).unwrap();
        (dir, db)
    }

    fn tabata() -> Workout {
        Workout::new(
            "tabata",
            "Tabata",
            vec![
                Segment::exercise("a", "Sprint", 20),
                Segment::rest("b", 10),
                Segment::exercise("c", "Sprint", 20),
            ],
        )
        .unwrap()
        .with_category(Category::Cardio)
    }

    #[tokio::test]
    async fn put_then_get_returns_the_workout() {
        let (_dir, db) = open();
        let saved = db.put_workout(&tabata()).await.unwrap();

        let loaded = db.get_workout("tabata").await.unwrap().unwrap();
        assert_eq!(loaded.name(), "Tabata");
        assert_eq!(loaded.category(), Some(Category::Cardio));
        assert_eq!(loaded.segments()[1].kind, SegmentKind::Rest);
        assert_eq!(loaded.total_duration_secs(), 50);
        assert_eq!(loaded.created_at(), saved.created_at());
    }

    #[tokio::test]
    async fn missing_workout_is_none() {
        let (_dir, db) = open();
        assert!(db.get_workout("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_replaces_and_keeps_creation_time() {
        let (_dir, db) = open();
        let first = db.put_workout(&tabata()).await.unwrap();

        let renamed = Workout::new("tabata", "Tabata x2", first.segments().to_vec())
            .unwrap()
            .with_timestamps(Utc::now(), Utc::now());
        let second = db.put_workout(&renamed).await.unwrap();

        assert_eq!(second.created_at(), first.created_at());
        let listed = db.list_workouts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name(), "Tabata x2");
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let (_dir, db) = open();
        db.put_workout(&tabata()).await.unwrap();
        assert!(db.delete_workout("tabata").await.unwrap());
        assert!(!db.delete_workout("tabata").await.unwrap());
        assert!(db.list_workouts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn seeding_only_fills_an_empty_store() {
        let (_dir, db) = open();
        assert_eq!(db.seed_default_workouts().await.unwrap(), 1);
        assert_eq!(db.seed_default_workouts().await.unwrap(), 0);

        let listed = db.list_workouts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name(), "Full Body HIIT");
    }

    #[tokio::test]
    async fn corrupted_row_surfaces_workout_error() {
        let (_dir, db) = open();
        db.put_workout(&tabata()).await.unwrap();
        db.execute(|conn| {
            conn.execute(
                "UPDATE workouts SET segments_json = '[]' WHERE id = 'tabata'",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let err = db.get_workout("tabata").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<WorkoutError>(),
            Some(&WorkoutError::Empty("tabata".into()))
        );
    }
}
