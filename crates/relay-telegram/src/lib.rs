//! Telegram adapter (teloxide).
//!
//! Implements the `relay-core` messaging and webhook ports over the Telegram Bot
//! API, decodes webhook updates and serves the HTTP endpoints.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
    RequestError,
};

use tokio::time::sleep;
use tracing::debug;

pub mod router;
pub mod server;
pub mod update;

use relay_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    webhook::{WebhookApi, WebhookFailure},
    Result,
};

/// Bot API limit on a single message text.
const MAX_MESSAGE_LEN: usize = 4096;

/// Builds a bot whose HTTP client gives up after `timeout`.
pub fn build_bot(token: &str, timeout: Duration) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()?;
    Ok(Bot::with_client(token, client))
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(chat_id: Option<ChatId>, e: RequestError) -> Error {
        match (e, chat_id) {
            (RequestError::RetryAfter(d), _) => Error::RateLimited(d),
            (other, Some(chat_id)) => Error::delivery(chat_id, other.to_string()),
            (other, None) => Error::External(format!("telegram error: {other}")),
        }
    }

    /// Honors one `RetryAfter` per call; the throttling decorator keeps them rare.
    async fn with_retry<T, Fut>(
        &self,
        chat_id: Option<ChatId>,
        mut op: impl FnMut() -> Fut,
    ) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    debug!(wait = ?d, "telegram asked us to back off");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(chat_id, other)),
            }
        }
    }

    fn markup(keyboard: InlineKeyboard) -> InlineKeyboardMarkup {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|b| InlineKeyboardButton::callback(b.label, b.callback_data))
                    .collect()
            })
            .collect();
        InlineKeyboardMarkup::new(rows)
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(Some(chat_id), || {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn forward_message(&self, chat_id: ChatId, source: MessageRef) -> Result<MessageRef> {
        let msg = self
            .with_retry(Some(chat_id), || {
                self.bot.forward_message(
                    Self::tg_chat(chat_id),
                    Self::tg_chat(source.chat_id),
                    Self::tg_msg_id(source.message_id),
                )
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let markup = Self::markup(keyboard);

        let msg = self
            .with_retry(Some(chat_id), || {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(None, || {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

/// Webhook management calls, classified for the registrar's retry policy.
#[derive(Clone)]
pub struct TelegramWebhookApi {
    bot: Bot,
}

impl TelegramWebhookApi {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn classify(e: RequestError) -> WebhookFailure {
    match e {
        RequestError::RetryAfter(d) => WebhookFailure::RateLimited(d),
        RequestError::Network(e) => WebhookFailure::Transient(e.to_string()),
        RequestError::Io(e) => WebhookFailure::Transient(e.to_string()),
        other => WebhookFailure::Rejected(other.to_string()),
    }
}

#[async_trait]
impl WebhookApi for TelegramWebhookApi {
    async fn delete_webhook(&self) -> std::result::Result<(), WebhookFailure> {
        self.bot.delete_webhook().await.map_err(classify)?;
        Ok(())
    }

    async fn set_webhook(
        &self,
        url: &str,
        secret_token: Option<&str>,
    ) -> std::result::Result<(), WebhookFailure> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| WebhookFailure::Rejected(format!("invalid webhook url {url}: {e}")))?;
        let mut req = self.bot.set_webhook(url);
        if let Some(secret) = secret_token {
            req = req.secret_token(secret.to_string());
        }
        req.await.map_err(classify)?;
        Ok(())
    }
}
