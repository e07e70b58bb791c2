//! SQLite document store for the hub.
//!
//! `HubDb` owns a single connection; its methods are split by entity across
//! the submodules. Access rules live next to the data they guard, so every
//! handler goes through `require_pod_access` / `block_access` before reading
//! block contents.

mod blocks;
mod chat;
mod content;
mod explore;
mod files;
mod pods;
mod users;

pub use blocks::BlockUpdate;
pub use content::{EventInput, GoalUpdate, parse_goal_status};
pub use explore::NewProfile;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Async-safe handle to the hub database.
///
/// Wraps `HubDb` behind `Arc<Mutex>` and runs all access on tokio's blocking
/// thread pool via `spawn_blocking`, so synchronous SQLite I/O never ties up
/// async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<HubDb>>,
}

impl DbHandle {
    pub fn new(db: HubDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&HubDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup, CLI commands
    /// and tests; never from a request handler.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, HubDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct HubDb {
    conn: Connection,
}

impl HubDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token_hash TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    expires_at TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS pods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    tagline TEXT NOT NULL DEFAULT '',
                    logo_url TEXT,
                    creator_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS pod_members (
                    pod_id INTEGER NOT NULL REFERENCES pods(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    joined_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (pod_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS blocks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    pod_id INTEGER NOT NULL REFERENCES pods(id) ON DELETE CASCADE,
                    kind TEXT NOT NULL,
                    label TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    x REAL NOT NULL,
                    y REAL NOT NULL,
                    creator_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS block_members (
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    added_at TEXT NOT NULL DEFAULT (datetime('now')),
                    PRIMARY KEY (block_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS chat_messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id),
                    message TEXT NOT NULL,
                    mentions TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS chat_read_markers (
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    last_read_id INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (block_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS stored_files (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    kind TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    bytes BLOB NOT NULL,
                    uploader_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS documents (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    uploader_id INTEGER NOT NULL REFERENCES users(id),
                    file_id INTEGER NOT NULL REFERENCES stored_files(id),
                    file_name TEXT NOT NULL,
                    content_type TEXT NOT NULL,
                    size INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS calendar_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    date TEXT NOT NULL,
                    time TEXT,
                    description TEXT,
                    creator_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS goals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    block_id INTEGER NOT NULL REFERENCES blocks(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    due_date TEXT,
                    status TEXT NOT NULL DEFAULT 'not_started',
                    creator_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS explore_profiles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    pod_id INTEGER REFERENCES pods(id) ON DELETE SET NULL,
                    kind TEXT NOT NULL,
                    fields TEXT NOT NULL,
                    name TEXT NOT NULL,
                    is_published INTEGER NOT NULL DEFAULT 1,
                    is_featured INTEGER NOT NULL DEFAULT 0,
                    view_count INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS profile_likes (
                    profile_id INTEGER NOT NULL REFERENCES explore_profiles(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    PRIMARY KEY (profile_id, user_id)
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
                CREATE INDEX IF NOT EXISTS idx_pod_members_user ON pod_members(user_id);
                CREATE INDEX IF NOT EXISTS idx_blocks_pod ON blocks(pod_id, kind);
                CREATE INDEX IF NOT EXISTS idx_block_members_user ON block_members(user_id);
                CREATE INDEX IF NOT EXISTS idx_chat_messages_block ON chat_messages(block_id, id);
                CREATE INDEX IF NOT EXISTS idx_documents_block ON documents(block_id);
                CREATE INDEX IF NOT EXISTS idx_calendar_events_block ON calendar_events(block_id, date);
                CREATE INDEX IF NOT EXISTS idx_goals_block ON goals(block_id);
                CREATE INDEX IF NOT EXISTS idx_explore_profiles_owner ON explore_profiles(owner_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }
}

// ── JSON columns ─────────────────────────────────────────────────────

pub(crate) fn to_json_text<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode JSON column")
}

pub(crate) fn from_json_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).context("Failed to decode JSON column")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = HubDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('users', 'sessions', 'pods', 'pod_members', 'blocks', 'block_members',
              'chat_messages', 'chat_read_markers', 'stored_files', 'documents',
              'calendar_events', 'goals', 'explore_profiles', 'profile_likes')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 14);
        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hub.db");
        {
            let db = HubDb::new(&path)?;
            db.create_user("a@gmail.com", "A", "hash")?;
        }
        let db = HubDb::new(&path)?;
        assert!(db.get_user_by_email("a@gmail.com")?.is_some());
        Ok(())
    }

    #[test]
    fn test_foreign_keys_enforced() -> Result<()> {
        let db = HubDb::new_in_memory()?;
        let result = db.conn.execute(
            "INSERT INTO blocks (pod_id, kind, label, x, y, creator_id) VALUES (999, 'chat', 'x', 0, 0, 999)",
            [],
        );
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_db_handle_call_runs_closure() -> Result<()> {
        let handle = DbHandle::new(HubDb::new_in_memory()?);
        let user = handle
            .call(|db| db.create_user("b@gmail.com", "Bee", "hash"))
            .await?;
        let found = handle
            .call(move |db| db.get_user(user.id))
            .await?
            .expect("user exists");
        assert_eq!(found.name, "Bee");
        Ok(())
    }
}
