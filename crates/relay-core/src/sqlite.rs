//! SQLite-backed user directory and message log.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::{
    directory::{LogEntry, LogStats, MessageLog, UserDirectory},
    domain::{ChatId, User},
    errors::Error,
    Result,
};

/// Durable store for the `users` and `messages` tables.
///
/// rusqlite is blocking, so every call hops onto the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path` and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS users (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id INTEGER NOT NULL UNIQUE,
                display_name TEXT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_id INTEGER NOT NULL,
                recipient_id INTEGER NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_recipient ON messages (recipient_id, id);
            "#,
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| Error::Storage("sqlite connection lock poisoned".to_string()))?;
            f(&*guard).map_err(Error::from)
        })
        .await
        .map_err(|e| Error::Storage(format!("sqlite task failed: {e}")))?
    }
}

/// RFC 3339 UTC timestamp; informational only, ordering uses `users.seq`.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn upsert(&self, id: ChatId, display_name: Option<&str>) -> Result<()> {
        let name = display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let now = timestamp();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                   display_name = COALESCE(excluded.display_name, users.display_name)",
                params![id.0, name, now],
            )
            .map(|_| ())
        })
        .await
    }

    async fn get(&self, id: ChatId) -> Result<Option<User>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, display_name FROM users WHERE id = ?1",
                params![id.0],
                |row| Ok(User::new(ChatId(row.get(0)?), row.get(1)?)),
            )
            .optional()
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, display_name FROM users ORDER BY seq")?;
            let rows = stmt.query_map([], |row| Ok(User::new(ChatId(row.get(0)?), row.get(1)?)))?;
            let users = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get::<_, i64>(0))
        })
        .await
        .map(|n| n.max(0) as usize)
    }
}

#[async_trait]
impl MessageLog for SqliteStore {
    async fn record(&self, entry: LogEntry) -> Result<()> {
        let now = timestamp();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages (sender_id, recipient_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    entry.sender.0,
                    entry.recipient.map(|r| r.0),
                    entry.content,
                    now
                ],
            )
            .map(|_| ())
        })
        .await
    }

    async fn stats(&self) -> Result<LogStats> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;
            let active: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages m
                 WHERE m.recipient_id IS NULL
                   AND NOT EXISTS (
                     SELECT 1 FROM messages r
                     WHERE r.recipient_id = m.sender_id AND r.id > m.id
                   )",
                [],
                |r| r.get(0),
            )?;
            Ok(LogStats {
                total_messages: total.max(0) as usize,
                active_requests: active.max(0) as usize,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("nested/bot.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn upsert_keeps_order_and_better_names() {
        let (_dir, store) = open_temp();
        store.upsert(ChatId(30), Some("carol")).await.unwrap();
        store.upsert(ChatId(10), None).await.unwrap();
        store.upsert(ChatId(30), None).await.unwrap();
        store.upsert(ChatId(10), Some("dave")).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let users = store.list_all().await.unwrap();
        assert_eq!(
            users,
            vec![
                User::new(ChatId(30), Some("carol".to_string())),
                User::new(ChatId(10), Some("dave".to_string())),
            ]
        );
        assert!(store.get(ChatId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn first_contact_order_ignores_clock_steps() {
        let (_dir, store) = open_temp();
        store.upsert(ChatId(30), Some("carol")).await.unwrap();
        store.upsert(ChatId(10), Some("dave")).await.unwrap();
        store.upsert(ChatId(20), None).await.unwrap();

        // A later first contact stamped earlier, as after a backwards clock step.
        store
            .with_conn(|conn| {
                conn.execute(
                    "UPDATE users SET created_at = '2000-01-01T00:00:00.000000000Z' WHERE id = 10",
                    [],
                )
            })
            .await
            .unwrap();

        let ids: Vec<ChatId> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, vec![ChatId(30), ChatId(10), ChatId(20)]);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert(ChatId(1), Some("alice")).await.unwrap();
            store
                .record(LogEntry::to_admin(ChatId(1), "hello"))
                .await
                .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.stats().await.unwrap().total_messages, 1);
    }

    #[tokio::test]
    async fn stats_track_unanswered_requests() {
        let (_dir, store) = open_temp();
        let admin = ChatId(500);
        store.record(LogEntry::to_admin(ChatId(1), "a")).await.unwrap();
        store.record(LogEntry::to_admin(ChatId(2), "b")).await.unwrap();
        store
            .record(LogEntry::admin_reply(admin, ChatId(2), "done"))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.active_requests, 1);
    }
}
