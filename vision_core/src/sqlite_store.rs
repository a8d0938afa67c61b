//! SQLite-backed entry store.
//!
//! Two tables: `users` (keyed by UUID, unique email) and `entries` (owned by a
//! user, ordered by `date`). Timestamps are stored as fixed-width RFC 3339
//! text so ordering by the column is chronological.

use crate::config::DemoUserConfig;
use crate::store::{EntryStore, StoreError, StoreResult};
use crate::types::format_timestamp;
use crate::{DemoUser, JournalEntry, NewEntry, Result};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

/// Queries run on tokio's blocking pool, so a slow disk never stalls the
/// caller's runtime.
pub struct SqliteEntryStore {
    db: Arc<Database>,
}

struct Database {
    conn: Mutex<Connection>,
    demo_user: DemoUserConfig,
}

impl SqliteEntryStore {
    /// Open (or create) the database file and apply the schema
    pub fn open(db_path: &Path, demo_user: DemoUserConfig) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        tracing::debug!("Opened entry database at {:?}", db_path);
        Self::with_connection(conn, demo_user)
    }

    pub fn open_in_memory(demo_user: DemoUserConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, demo_user)
    }

    fn with_connection(conn: Connection, demo_user: DemoUserConfig) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            db: Arc::new(Database {
                conn: Mutex::new(conn),
                demo_user,
            }),
        })
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(|e| StoreError::internal("Entry database task failed", e))?
    }
}

impl Database {

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::internal("Entry database lock poisoned", e))
    }

    fn ensure_demo_user(&self) -> StoreResult<DemoUser> {
        let conn = self.lock()?;
        let now = format_timestamp(&Utc::now());
        let email = &self.demo_user.email;

        conn.execute(
            r#"
            INSERT INTO users (id, email, name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(email) DO NOTHING
            "#,
            params![Uuid::new_v4().to_string(), email, &self.demo_user.name, now],
        )
        .map_err(|e| StoreError::internal("Error creating demo user", e))?;

        conn.query_row(
            "SELECT id, email, name FROM users WHERE email = ?1",
            [email],
            |row| {
                Ok(DemoUser {
                    user_id: parse_uuid(0, row.get(0)?)?,
                    email: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .map_err(|e| StoreError::internal("Error loading demo user", e))
    }

    fn create_entry(&self, entry: NewEntry) -> StoreResult<JournalEntry> {
        if entry.exercise.is_empty() {
            return Err(StoreError::InvalidInput("exercise must not be empty".into()));
        }
        if entry.content.is_empty() {
            return Err(StoreError::InvalidInput("content must not be empty".into()));
        }

        let conn = self.lock()?;
        if !user_exists(&conn, entry.user_id)
            .map_err(|e| StoreError::internal("Error checking user", e))?
        {
            return Err(StoreError::UserNotFound);
        }

        let now = Utc::now().trunc_subsecs(6);
        let created = JournalEntry {
            id: Uuid::new_v4(),
            date: entry.date.trunc_subsecs(6),
            exercise: entry.exercise,
            content: entry.content,
            user_id: entry.user_id,
            created_at: now,
            updated_at: now,
        };

        conn.execute(
            r#"
            INSERT INTO entries (id, date, exercise, content, user_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                created.id.to_string(),
                format_timestamp(&created.date),
                &created.exercise,
                &created.content,
                created.user_id.to_string(),
                format_timestamp(&created.created_at),
                format_timestamp(&created.updated_at),
            ],
        )
        .map_err(|e| StoreError::internal("Error creating entry", e))?;

        tracing::debug!("Created entry {} for user {}", created.id, created.user_id);
        Ok(created)
    }

    fn list_entries(&self, user_id: Uuid) -> StoreResult<Vec<JournalEntry>> {
        let conn = self.lock()?;
        if !user_exists(&conn, user_id).map_err(|e| StoreError::internal("Error checking user", e))?
        {
            return Err(StoreError::UserNotFound);
        }

        let query = || -> rusqlite::Result<Vec<JournalEntry>> {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, date, exercise, content, user_id, created_at, updated_at
                FROM entries
                WHERE user_id = ?1
                ORDER BY date DESC, created_at DESC
                "#,
            )?;
            let rows = stmt.query_map([user_id.to_string()], |row| {
                Ok(JournalEntry {
                    id: parse_uuid(0, row.get(0)?)?,
                    date: parse_timestamp(1, row.get(1)?)?,
                    exercise: row.get(2)?,
                    content: row.get(3)?,
                    user_id: parse_uuid(4, row.get(4)?)?,
                    created_at: parse_timestamp(5, row.get(5)?)?,
                    updated_at: parse_timestamp(6, row.get(6)?)?,
                })
            })?;
            rows.collect()
        };

        let entries = query().map_err(|e| StoreError::internal("Error fetching entries", e))?;
        tracing::debug!("Listed {} entries for user {}", entries.len(), user_id);
        Ok(entries)
    }

    fn delete_entry(&self, entry_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let conn = self.lock()?;
        // Ownership check and delete in one statement
        let affected = conn
            .execute(
                "DELETE FROM entries WHERE id = ?1 AND user_id = ?2",
                params![entry_id.to_string(), user_id.to_string()],
            )
            .map_err(|e| StoreError::internal("Error deleting entry", e))?;

        if affected == 0 {
            return Err(StoreError::NotFoundOrUnauthorized);
        }
        tracing::debug!("Deleted entry {}", entry_id);
        Ok(())
    }
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn ensure_demo_user(&self) -> StoreResult<DemoUser> {
        self.run(|db| db.ensure_demo_user()).await
    }

    async fn create_entry(&self, entry: NewEntry) -> StoreResult<JournalEntry> {
        self.run(move |db| db.create_entry(entry)).await
    }

    async fn list_entries(&self, user_id: Uuid) -> StoreResult<Vec<JournalEntry>> {
        self.run(move |db| db.list_entries(user_id)).await
    }

    async fn delete_entry(&self, entry_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.run(move |db| db.delete_entry(entry_id, user_id)).await
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current_version > SCHEMA_VERSION {
        return Err(crate::Error::Other(format!(
            "Entry database schema version {} is newer than supported version {}",
            current_version, SCHEMA_VERSION
        )));
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            exercise TEXT NOT NULL,
            content TEXT NOT NULL,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_entries_user_date ON entries(user_id, date DESC);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;
    Ok(())
}

fn user_exists(conn: &Connection, user_id: Uuid) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM users WHERE id = ?1",
        [user_id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn parse_uuid(idx: usize, text: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> SqliteEntryStore {
        SqliteEntryStore::open_in_memory(DemoUserConfig::default()).unwrap()
    }

    fn new_entry(user_id: Uuid, content: &str, date: DateTime<Utc>) -> NewEntry {
        NewEntry {
            date,
            exercise: "Mental Screen Exercise".into(),
            content: content.into(),
            user_id,
        }
    }

    #[tokio::test]
    async fn test_demo_user_is_idempotent() {
        let store = store();
        let first = store.ensure_demo_user().await.unwrap();
        let second = store.ensure_demo_user().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.email, "temp@mindvision.app");
        assert_eq!(first.name, "Temporary User");
    }

    #[tokio::test]
    async fn test_create_entry_assigns_id_and_timestamps() {
        let store = store();
        let user = store.ensure_demo_user().await.unwrap();
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let before = Utc::now() - Duration::seconds(1);
        let entry = store
            .create_entry(new_entry(user.user_id, "test", date))
            .await
            .unwrap();

        assert!(!entry.id.is_nil());
        assert_eq!(entry.date, date);
        assert_eq!(entry.exercise, "Mental Screen Exercise");
        assert_eq!(entry.user_id, user.user_id);
        assert!(entry.created_at >= before);
        assert_eq!(entry.created_at, entry.updated_at);
    }

    #[tokio::test]
    async fn test_round_trip_newest_first() {
        let store = store();
        let user = store.ensure_demo_user().await.unwrap();

        store
            .create_entry(new_entry(
                user.user_id,
                "Older thought",
                Utc::now() - Duration::days(1),
            ))
            .await
            .unwrap();
        let created = store
            .create_entry(new_entry(user.user_id, "Felt calm and focused", Utc::now()))
            .await
            .unwrap();

        let entries = store.list_entries(user.user_id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], created);
        assert_eq!(entries[0].content, "Felt calm and focused");
        assert_eq!(entries[0].exercise, "Mental Screen Exercise");
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let store = store();
        let stranger = Uuid::new_v4();

        let created = store
            .create_entry(new_entry(stranger, "hello", Utc::now()))
            .await;
        assert_eq!(created, Err(StoreError::UserNotFound));

        let listed = store.list_entries(stranger).await;
        assert_eq!(listed, Err(StoreError::UserNotFound));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = store();
        let user = store.ensure_demo_user().await.unwrap();
        let result = store
            .create_entry(new_entry(user.user_id, "", Utc::now()))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_delete_checks_ownership() {
        let store = store();
        let user = store.ensure_demo_user().await.unwrap();
        let entry = store
            .create_entry(new_entry(user.user_id, "mine", Utc::now()))
            .await
            .unwrap();

        // Foreign owner and nonexistent entry look the same
        let foreign = store.delete_entry(entry.id, Uuid::new_v4()).await;
        assert_eq!(foreign, Err(StoreError::NotFoundOrUnauthorized));
        let missing = store.delete_entry(Uuid::new_v4(), user.user_id).await;
        assert_eq!(missing, Err(StoreError::NotFoundOrUnauthorized));

        assert_eq!(store.list_entries(user.user_id).await.unwrap().len(), 1);

        store.delete_entry(entry.id, user.user_id).await.unwrap();
        assert!(store.list_entries(user.user_id).await.unwrap().is_empty());

        // Second delete of the same id
        let again = store.delete_entry(entry.id, user.user_id).await;
        assert_eq!(again, Err(StoreError::NotFoundOrUnauthorized));
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("data/mindvision.db");

        let user_id = {
            let store = SqliteEntryStore::open(&db_path, DemoUserConfig::default()).unwrap();
            let user = store.ensure_demo_user().await.unwrap();
            store
                .create_entry(new_entry(user.user_id, "persisted", Utc::now()))
                .await
                .unwrap();
            user.user_id
        };

        let store = SqliteEntryStore::open(&db_path, DemoUserConfig::default()).unwrap();
        let user = store.ensure_demo_user().await.unwrap();
        assert_eq!(user.user_id, user_id);
        let entries = store.list_entries(user_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "persisted");
    }

    #[tokio::test]
    async fn test_query_leaves_runtime_free() {
        let store = Arc::new(store());
        let user = store.ensure_demo_user().await.unwrap();

        // Hold the connection so the next query has to wait for it
        let guard = store.db.conn.lock().unwrap();
        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.list_entries(user.user_id).await }
        });

        // Timers still fire on this thread while the query is blocked
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!pending.is_finished());

        drop(guard);
        assert!(pending.await.unwrap().unwrap().is_empty());
    }
}
