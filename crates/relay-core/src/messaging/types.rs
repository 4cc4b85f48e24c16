use crate::domain::{ChatId, MessageId, MessageRef};

/// Messenger-agnostic incoming update model.
///
/// Telegram-specific decoding lives in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Media(MediaMessage),
    Callback(CallbackQuery),
}

impl IncomingUpdate {
    /// Chat the update originated from.
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Command(c) => c.chat_id,
            Self::Text(t) => t.chat_id,
            Self::Media(m) => m.chat_id,
            Self::Callback(q) => q.chat_id,
        }
    }

    /// Best-effort display name of the sender.
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Command(c) => c.display_name.as_deref(),
            Self::Text(t) => t.display_name.as_deref(),
            Self::Media(m) => m.display_name.as_deref(),
            Self::Callback(q) => q.display_name.as_deref(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub display_name: Option<String>,
    /// Lowercased command name without the leading `/` or `@botname` suffix.
    pub name: String,
    pub args: String,
}

impl Command {
    /// Parse `/cmd@botname arg1 ...`. Returns `None` for non-command text.
    pub fn parse(chat_id: ChatId, display_name: Option<String>, text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let mut parts = text.splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("");
        let args = parts.next().unwrap_or("").trim().to_string();

        let name = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            chat_id,
            display_name,
            name,
            args,
        })
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub display_name: Option<String>,
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
    Video,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Document => "document",
            Self::Video => "video",
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaMessage {
    pub chat_id: ChatId,
    pub display_name: Option<String>,
    pub message_id: MessageId,
    pub kind: MediaKind,
    pub caption: Option<String>,
}

impl MediaMessage {
    pub fn message_ref(&self) -> MessageRef {
        MessageRef {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub display_name: Option<String>,
    pub callback_id: String,
    pub data: String,
}

/// Inline keyboard (buttons) carrying stable callback identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// Convenience for "one button per row" layouts.
    pub fn one_per_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Platform limits the engine has to respect when composing messages.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Longest text a single send may carry.
    pub max_message_len: usize,
}
