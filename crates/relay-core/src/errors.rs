use std::time::Duration;

use crate::domain::ChatId;

/// Core error type for the relay bot.
///
/// Adapter crates map their specific errors into this type so the relay engine
/// can tell recoverable per-recipient failures apart from everything else.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Recipient unreachable (blocked the bot, deleted account, bad chat id).
    #[error("delivery to {chat_id} failed: {reason}")]
    Delivery { chat_id: ChatId, reason: String },

    /// Platform throttling; the duration is the wait the platform asked for.
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("webhook registration failed: {0}")]
    Registration(String),

    /// A conversation step referenced state that no longer resolves.
    #[error("state error: {0}")]
    State(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn delivery(chat_id: ChatId, reason: impl Into<String>) -> Self {
        Self::Delivery {
            chat_id,
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
