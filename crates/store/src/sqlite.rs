//! SQLite storage backend.
//!
//! A single database file with three tables: `goals`, `messages`, and
//! `world_states`. The schema is created idempotently at open. Message
//! and world-state ids are SQLite rowids, so appends are durable and
//! monotonic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clawcraft_core::error::StorageError;
use clawcraft_core::goal::{Goal, GoalStatus, GoalType};
use clawcraft_core::message::Role;
use clawcraft_core::snapshot::Position;
use clawcraft_core::storage::{Storage, StoredMessage, WorldStateRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

/// A SQLite-backed implementation of the storage port.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (tests).
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Io(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; cap the pool at
        // one so the schema and the data share a connection.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Io(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Idempotent schema creation.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS goals (
                id           TEXT PRIMARY KEY,
                goal_type    TEXT NOT NULL,
                description  TEXT NOT NULL,
                priority     INTEGER NOT NULL,
                status       TEXT NOT NULL,
                parent_id    TEXT,
                created_at   TEXT NOT NULL,
                completed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("goals table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_goals_status_priority ON goals(status, priority)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("goals index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_states (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                x          REAL NOT NULL,
                y          REAL NOT NULL,
                z          REAL NOT NULL,
                health     REAL NOT NULL,
                food       REAL NOT NULL,
                dimension  TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("world_states table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::Query(format!("Bad timestamp '{raw}': {e}")))
    }

    fn row_to_goal(row: &sqlx::sqlite::SqliteRow) -> Result<Goal, StorageError> {
        let goal_type: String = row.get("goal_type");
        let status: String = row.get("status");
        let created_at: String = row.get("created_at");
        let completed_at: Option<String> = row.get("completed_at");

        Ok(Goal {
            id: row.get("id"),
            goal_type: GoalType::from_str(&goal_type).map_err(StorageError::Query)?,
            description: row.get("description"),
            priority: row.get::<i64, _>("priority") as u32,
            status: GoalStatus::from_str(&status).map_err(StorageError::Query)?,
            parent_id: row.get("parent_id"),
            created_at: Self::parse_timestamp(&created_at)?,
            completed_at: completed_at
                .map(|raw| Self::parse_timestamp(&raw))
                .transpose()?,
        })
    }
}

#[async_trait]
impl Storage for SqliteStore {
    async fn insert_goal(&self, goal: &Goal) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO goals (id, goal_type, description, priority, status, parent_id, created_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&goal.id)
        .bind(goal.goal_type.as_str())
        .bind(&goal.description)
        .bind(goal.priority as i64)
        .bind(goal.status.as_str())
        .bind(&goal.parent_id)
        .bind(goal.created_at.to_rfc3339())
        .bind(goal.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("insert goal: {e}")))?;

        Ok(())
    }

    async fn goal(&self, id: &str) -> Result<Option<Goal>, StorageError> {
        let row = sqlx::query("SELECT * FROM goals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("get goal: {e}")))?;

        row.as_ref().map(Self::row_to_goal).transpose()
    }

    async fn update_goal_status(&self, id: &str, status: GoalStatus) -> Result<(), StorageError> {
        // completed_at is set iff the new status is completed.
        let completed_at = match status {
            GoalStatus::Completed => Some(Utc::now().to_rfc3339()),
            _ => None,
        };

        sqlx::query("UPDATE goals SET status = ?, completed_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(completed_at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("update goal status: {e}")))?;

        Ok(())
    }

    async fn pending_goals(&self) -> Result<Vec<Goal>, StorageError> {
        let rows = sqlx::query("SELECT * FROM goals WHERE status = 'pending' ORDER BY priority ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("pending goals: {e}")))?;

        rows.iter().map(Self::row_to_goal).collect()
    }

    async fn insert_message(&self, role: Role, content: &str) -> Result<i64, StorageError> {
        let result = sqlx::query("INSERT INTO messages (role, content, created_at) VALUES (?, ?, ?)")
            .bind(role.as_str())
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("insert message: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_messages(&self, n: u32) -> Result<Vec<StoredMessage>, StorageError> {
        let rows = sqlx::query("SELECT * FROM messages ORDER BY id DESC LIMIT ?")
            .bind(n as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("recent messages: {e}")))?;

        rows.iter()
            .map(|row| {
                let role: String = row.get("role");
                let created_at: String = row.get("created_at");
                Ok(StoredMessage {
                    id: row.get("id"),
                    role: Role::from_str(&role).map_err(StorageError::Query)?,
                    content: row.get("content"),
                    created_at: Self::parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    async fn clear_old_messages(&self, keep_last: u32) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM messages WHERE id NOT IN (SELECT id FROM messages ORDER BY id DESC LIMIT ?)",
        )
        .bind(keep_last as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("clear old messages: {e}")))?;

        Ok(result.rows_affected())
    }

    async fn insert_world_state(
        &self,
        position: Position,
        health: f32,
        food: f32,
        dimension: &str,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO world_states (x, y, z, health, food, dimension, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(position.x)
        .bind(position.y)
        .bind(position.z)
        .bind(health as f64)
        .bind(food as f64)
        .bind(dimension)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("insert world state: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn latest_world_state(&self) -> Result<Option<WorldStateRow>, StorageError> {
        let row = sqlx::query("SELECT * FROM world_states ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("latest world state: {e}")))?;

        row.map(|row| {
            let created_at: String = row.get("created_at");
            Ok(WorldStateRow {
                id: row.get("id"),
                position: Position::new(row.get("x"), row.get("y"), row.get("z")),
                health: row.get::<f64, _>("health") as f32,
                food: row.get::<f64, _>("food") as f32,
                dimension: row.get("dimension"),
                created_at: Self::parse_timestamp(&created_at)?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clawcraft_core::goal::GoalType;

    async fn store() -> SqliteStore {
        SqliteStore::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let s = store().await;
        // A second migration pass must not fail.
        s.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn goal_roundtrip() {
        let s = store().await;
        let goal = Goal::new(GoalType::Main, "Reach the nether", 1);
        s.insert_goal(&goal).await.unwrap();

        let loaded = s.goal(&goal.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, goal.id);
        assert_eq!(loaded.description, "Reach the nether");
        assert_eq!(loaded.priority, 1);
        assert_eq!(loaded.status, GoalStatus::Pending);
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn missing_goal_is_none() {
        let s = store().await;
        assert!(s.goal("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completing_goal_sets_completed_at() {
        let s = store().await;
        let goal = Goal::new(GoalType::Sub, "Craft a pickaxe", 2);
        s.insert_goal(&goal).await.unwrap();

        s.update_goal_status(&goal.id, GoalStatus::Completed)
            .await
            .unwrap();
        let loaded = s.goal(&goal.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, GoalStatus::Completed);
        assert!(loaded.completed_at.is_some());

        // Moving away from completed clears the timestamp.
        s.update_goal_status(&goal.id, GoalStatus::InProgress)
            .await
            .unwrap();
        let loaded = s.goal(&goal.id).await.unwrap().unwrap();
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn pending_goals_sorted_by_priority() {
        let s = store().await;
        s.insert_goal(&Goal::new(GoalType::Sub, "later", 5))
            .await
            .unwrap();
        s.insert_goal(&Goal::new(GoalType::Sub, "urgent", 0))
            .await
            .unwrap();
        s.insert_goal(&Goal::new(GoalType::Sub, "soon", 2))
            .await
            .unwrap();

        let mut done = Goal::new(GoalType::Sub, "done", 0);
        done.status = GoalStatus::Completed;
        s.insert_goal(&done).await.unwrap();

        let pending = s.pending_goals().await.unwrap();
        let descriptions: Vec<_> = pending.iter().map(|g| g.description.as_str()).collect();
        assert_eq!(descriptions, vec!["urgent", "soon", "later"]);
    }

    #[tokio::test]
    async fn message_ids_are_monotonic() {
        let s = store().await;
        let a = s.insert_message(Role::User, "first").await.unwrap();
        let b = s.insert_message(Role::Assistant, "second").await.unwrap();
        let c = s.insert_message(Role::User, "third").await.unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn recent_messages_newest_first() {
        let s = store().await;
        for i in 1..=5 {
            s.insert_message(Role::User, &format!("m{i}")).await.unwrap();
        }

        let recent = s.recent_messages(3).await.unwrap();
        let contents: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m5", "m4", "m3"]);
    }

    #[tokio::test]
    async fn insert_then_recent_one() {
        let s = store().await;
        s.insert_message(Role::Assistant, "hello there").await.unwrap();
        let recent = s.recent_messages(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "hello there");
        assert_eq!(recent[0].role, Role::Assistant);
    }

    #[tokio::test]
    async fn clear_old_messages_keeps_newest() {
        let s = store().await;
        for i in 1..=10 {
            s.insert_message(Role::User, &format!("m{i}")).await.unwrap();
        }

        let deleted = s.clear_old_messages(4).await.unwrap();
        assert_eq!(deleted, 6);

        let remaining = s.recent_messages(100).await.unwrap();
        assert_eq!(remaining.len(), 4);
        assert_eq!(remaining[0].content, "m10");
        assert_eq!(remaining[3].content, "m7");
    }

    #[tokio::test]
    async fn world_state_roundtrip() {
        let s = store().await;
        assert!(s.latest_world_state().await.unwrap().is_none());

        s.insert_world_state(Position::new(10.5, 64.0, -3.2), 18.0, 17.0, "overworld")
            .await
            .unwrap();
        s.insert_world_state(Position::new(11.0, 64.0, -3.0), 16.0, 16.0, "overworld")
            .await
            .unwrap();

        let latest = s.latest_world_state().await.unwrap().unwrap();
        assert_eq!(latest.position.x, 11.0);
        assert_eq!(latest.health, 16.0);
        assert_eq!(latest.dimension, "overworld");
    }
}
