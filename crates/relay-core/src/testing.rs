//! Test doubles shared by the unit tests in this crate.

use std::{collections::HashSet, sync::Mutex};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

pub const MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Html {
        chat_id: ChatId,
        html: String,
    },
    Forward {
        chat_id: ChatId,
        source: MessageRef,
    },
    Keyboard {
        chat_id: ChatId,
        html: String,
        keyboard: InlineKeyboard,
    },
    CallbackAnswer {
        callback_id: String,
        text: Option<String>,
    },
}

/// Records every outbound call; chats marked unreachable fail like a blocked user.
/// Texts longer than [`MAX_MESSAGE_LEN`] are rejected the way Telegram rejects them.
#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sent: Mutex<Vec<Sent>>,
    unreachable: Mutex<HashSet<ChatId>>,
}

impl FakeMessenger {
    pub fn fail_for(&self, chat_id: ChatId) {
        self.unreachable.lock().unwrap().insert(chat_id);
    }

    pub fn restore(&self, chat_id: ChatId) {
        self.unreachable.lock().unwrap().remove(&chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Plain HTML messages (no keyboard) delivered to `chat_id`.
    pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Html { chat_id: c, html } if c == chat_id => Some(html),
                _ => None,
            })
            .collect()
    }

    pub fn keyboards_to(&self, chat_id: ChatId) -> Vec<(String, InlineKeyboard)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Keyboard {
                    chat_id: c,
                    html,
                    keyboard,
                } if c == chat_id => Some((html, keyboard)),
                _ => None,
            })
            .collect()
    }

    pub fn forwards_to(&self, chat_id: ChatId) -> Vec<MessageRef> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Forward { chat_id: c, source } if c == chat_id => Some(source),
                _ => None,
            })
            .collect()
    }

    pub fn callback_answers(&self) -> Vec<(String, Option<String>)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::CallbackAnswer { callback_id, text } => Some((callback_id, text)),
                _ => None,
            })
            .collect()
    }

    fn check(&self, chat_id: ChatId) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(&chat_id) {
            return Err(Error::delivery(chat_id, "Forbidden: bot was blocked by the user"));
        }
        Ok(())
    }

    fn check_len(chat_id: ChatId, html: &str) -> Result<()> {
        if html.chars().count() > MAX_MESSAGE_LEN {
            return Err(Error::delivery(chat_id, "Bad Request: message is too long"));
        }
        Ok(())
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.check(chat_id)?;
        Self::check_len(chat_id, html)?;
        self.sent.lock().unwrap().push(Sent::Html {
            chat_id,
            html: html.to_string(),
        });
        Ok(self.alloc(chat_id))
    }

    async fn forward_message(&self, chat_id: ChatId, source: MessageRef) -> Result<MessageRef> {
        self.check(chat_id)?;
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Forward { chat_id, source });
        Ok(self.alloc(chat_id))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.check(chat_id)?;
        Self::check_len(chat_id, html)?;
        self.sent.lock().unwrap().push(Sent::Keyboard {
            chat_id,
            html: html.to_string(),
            keyboard,
        });
        Ok(self.alloc(chat_id))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::CallbackAnswer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
