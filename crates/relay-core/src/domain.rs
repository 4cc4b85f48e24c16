use std::fmt;

/// Telegram chat id (numeric). In private chats this is also the user's identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// A known end user of the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: ChatId,
    pub display_name: Option<String>,
}

impl User {
    pub fn new(id: ChatId, display_name: Option<String>) -> Self {
        Self { id, display_name }
    }

    /// Human label used in admin-facing lists: the display name, or the id when unknown.
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("user {}", self.id),
        }
    }
}
