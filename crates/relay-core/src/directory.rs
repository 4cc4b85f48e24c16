//! Known users and the append-only relay log.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, User},
    Result,
};

/// Persistent set of users who have contacted the bot.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert or refresh a user. Idempotent; an absent name never replaces a known one.
    async fn upsert(&self, id: ChatId, display_name: Option<&str>) -> Result<()>;

    async fn get(&self, id: ChatId) -> Result<Option<User>>;

    /// All users in first-contact order.
    async fn list_all(&self) -> Result<Vec<User>>;

    async fn count(&self) -> Result<usize>;
}

/// One relayed message. `recipient: None` means "addressed to the administrator".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub sender: ChatId,
    pub recipient: Option<ChatId>,
    pub content: String,
}

impl LogEntry {
    pub fn to_admin(sender: ChatId, content: impl Into<String>) -> Self {
        Self {
            sender,
            recipient: None,
            content: content.into(),
        }
    }

    pub fn admin_reply(admin: ChatId, recipient: ChatId, content: impl Into<String>) -> Self {
        Self {
            sender: admin,
            recipient: Some(recipient),
            content: content.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogStats {
    /// Every logged message, both directions.
    pub total_messages: usize,
    /// User messages the administrator has not replied to since.
    pub active_requests: usize,
}

/// Append-only audit log of relayed messages, used for admin stats.
#[async_trait]
pub trait MessageLog: Send + Sync {
    async fn record(&self, entry: LogEntry) -> Result<()>;
    async fn stats(&self) -> Result<LogStats>;
}

/// Process-local store. Used in tests and when no database is configured.
#[derive(Default)]
pub struct InMemoryStore {
    users: Mutex<Vec<User>>,
    log: Mutex<Vec<LogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> crate::Error {
    crate::Error::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn upsert(&self, id: ChatId, display_name: Option<&str>) -> Result<()> {
        let name = display_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let mut users = self.users.lock().map_err(poisoned)?;
        match users.iter_mut().find(|u| u.id == id) {
            Some(existing) => {
                if name.is_some() {
                    existing.display_name = name;
                }
            }
            None => users.push(User::new(id, name)),
        }
        Ok(())
    }

    async fn get(&self, id: ChatId) -> Result<Option<User>> {
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.users.lock().map_err(poisoned)?.clone())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.users.lock().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl MessageLog for InMemoryStore {
    async fn record(&self, entry: LogEntry) -> Result<()> {
        self.log.lock().map_err(poisoned)?.push(entry);
        Ok(())
    }

    async fn stats(&self) -> Result<LogStats> {
        let log = self.log.lock().map_err(poisoned)?;
        let active_requests = log
            .iter()
            .enumerate()
            .filter(|(_, e)| e.recipient.is_none())
            .filter(|(idx, e)| {
                !log[idx + 1..]
                    .iter()
                    .any(|later| later.recipient == Some(e.sender))
            })
            .count();
        Ok(LogStats {
            total_messages: log.len(),
            active_requests,
        })
    }
}
