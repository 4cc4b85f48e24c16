//! The relay engine: routes every inbound update between users and the administrator.
//!
//! Users pick an intent from the menu and their next text message is relayed to
//! the administrator tagged with it. Media always goes straight through. The
//! administrator either replies to a selected user, broadcasts to everyone, or
//! drives the admin menu.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    directory::{MessageLog, UserDirectory},
    domain::ChatId,
    formatting::split_lines,
    messaging::{
        port::MessagingPort,
        types::{IncomingUpdate, InlineKeyboard},
    },
    state::{ConversationStore, ReplySelection},
    Result,
};

mod admin;
mod broadcast;
mod user;

pub use broadcast::BroadcastReport;

const DEFAULT_BROADCAST_CONCURRENCY: usize = 8;

pub struct RelayEngine {
    admin: ChatId,
    messenger: Arc<dyn MessagingPort>,
    directory: Arc<dyn UserDirectory>,
    log: Arc<dyn MessageLog>,
    state: Arc<dyn ConversationStore>,
    selection: ReplySelection,
    broadcast_concurrency: usize,
}

impl RelayEngine {
    pub fn new(
        admin: ChatId,
        messenger: Arc<dyn MessagingPort>,
        directory: Arc<dyn UserDirectory>,
        log: Arc<dyn MessageLog>,
        state: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            admin,
            messenger,
            directory,
            log,
            state,
            selection: ReplySelection::new(),
            broadcast_concurrency: DEFAULT_BROADCAST_CONCURRENCY,
        }
    }

    pub fn with_broadcast_concurrency(mut self, n: usize) -> Self {
        self.broadcast_concurrency = n.max(1);
        self
    }

    /// Handle one inbound update.
    ///
    /// Delivery failures to the sender are logged and swallowed; only storage
    /// failures surface as errors.
    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        let chat_id = update.chat_id();
        if chat_id == self.admin {
            return self.handle_admin(update).await;
        }

        // First-contact capture happens before any routing decision.
        if let Err(e) = self.directory.upsert(chat_id, update.display_name()).await {
            warn!(chat_id = chat_id.0, error = %e, "failed to record user");
        }

        match update {
            IncomingUpdate::Command(cmd) => self.user_command(cmd).await,
            IncomingUpdate::Text(msg) => self.user_text(msg).await,
            IncomingUpdate::Media(msg) => self.user_media(msg).await,
            IncomingUpdate::Callback(q) => self.user_callback(q).await,
        }
    }

    /// Sends `html` in as many messages as the platform's length limit requires.
    ///
    /// Stops at the first failed chunk.
    async fn send_chunked(&self, chat_id: ChatId, html: &str) -> Result<()> {
        let limit = self.messenger.capabilities().max_message_len;
        for chunk in split_lines(html, limit) {
            if chunk.trim().is_empty() {
                continue;
            }
            self.messenger.send_html(chat_id, &chunk).await?;
        }
        Ok(())
    }

    /// Best-effort message to a chat; failures are logged, never propagated.
    async fn notify(&self, chat_id: ChatId, html: &str) {
        if let Err(e) = self.send_chunked(chat_id, html).await {
            warn!(chat_id = chat_id.0, error = %e, "failed to send message");
        }
    }

    async fn notify_with_keyboard(&self, chat_id: ChatId, html: &str, keyboard: InlineKeyboard) {
        if let Err(e) = self
            .messenger
            .send_inline_keyboard(chat_id, html, keyboard)
            .await
        {
            warn!(chat_id = chat_id.0, error = %e, "failed to send keyboard");
        }
    }

    async fn answer(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self.messenger.answer_callback_query(callback_id, text).await {
            debug!(error = %e, "failed to answer callback query");
        }
    }
}
