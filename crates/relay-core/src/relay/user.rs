use tracing::{debug, info, warn};

use crate::{
    directory::LogEntry,
    domain::ChatId,
    formatting::{intent_relay, media_notice},
    menu::{user_keyboard, CallbackAction, Intent},
    messaging::types::{CallbackQuery, Command, MediaMessage, TextMessage},
    state::ConversationState,
    Result,
};

use super::RelayEngine;

const WELCOME: &str = "Welcome! Use the buttons below to interact with the bot.";
const USER_HELP: &str = "Send a request to the admin:\n\
/request_mod - request a mod\n\
/report_error - report an error\n\
/suggest_feature - suggest a feature\n\
/chat_admin - chat with the admin\n\
/cancel - cancel the current request\n\
/menu - show the menu\n\n\
Photos, documents and videos are forwarded to the admin directly.";

impl RelayEngine {
    pub(super) async fn user_command(&self, cmd: Command) -> Result<()> {
        let chat_id = cmd.chat_id;
        match cmd.name.as_str() {
            "start" => {
                self.notify_with_keyboard(chat_id, WELCOME, user_keyboard())
                    .await
            }
            "menu" => {
                self.notify_with_keyboard(chat_id, "Choose an option:", user_keyboard())
                    .await
            }
            "help" => self.notify(chat_id, USER_HELP).await,
            "cancel" => self.cancel_intent(chat_id).await,
            other => match Intent::from_id(other) {
                Some(intent) => self.select_intent(chat_id, intent).await,
                None => {
                    self.notify(chat_id, "Unknown command. Use /menu to see the options.")
                        .await
                }
            },
        }
        Ok(())
    }

    /// Last write wins: a new selection replaces any pending one.
    pub(super) async fn select_intent(&self, chat_id: ChatId, intent: Intent) {
        let prev = self
            .state
            .set(chat_id, ConversationState::Pending(intent))
            .await;
        debug!(chat_id = chat_id.0, %intent, ?prev, "intent selected");
        self.notify(chat_id, intent.prompt()).await;
    }

    async fn cancel_intent(&self, chat_id: ChatId) {
        self.state.clear(chat_id).await;
        self.notify(chat_id, "Menu cleared.").await;
    }

    pub(super) async fn user_text(&self, msg: TextMessage) -> Result<()> {
        let chat_id = msg.chat_id;
        let intent = match self.state.take(chat_id).await {
            ConversationState::Pending(intent) => intent,
            _ => {
                self.notify_with_keyboard(
                    chat_id,
                    "Please choose an option from the menu first:",
                    user_keyboard(),
                )
                .await;
                return Ok(());
            }
        };

        let html = intent_relay(intent, &msg.text, chat_id, msg.display_name.as_deref());
        if let Err(e) = self.send_chunked(self.admin, &html).await {
            // Not relayed, so not consumed: let the user try again.
            warn!(chat_id = chat_id.0, %intent, error = %e, "failed to relay to admin");
            self.state
                .set(chat_id, ConversationState::Pending(intent))
                .await;
            self.notify(
                chat_id,
                "❌ Could not reach the admin right now. Please send your message again.",
            )
            .await;
            return Ok(());
        }

        info!(chat_id = chat_id.0, %intent, "relayed message to admin");
        self.notify(chat_id, &format!("✅ Sent to admin: {}", intent.title()))
            .await;

        if let Err(e) = self
            .log
            .record(LogEntry::to_admin(chat_id, format!("[{}] {}", intent.tag(), msg.text)))
            .await
        {
            warn!(chat_id = chat_id.0, error = %e, "failed to log relayed message");
        }
        Ok(())
    }

    /// Media bypasses intent state entirely.
    pub(super) async fn user_media(&self, msg: MediaMessage) -> Result<()> {
        let chat_id = msg.chat_id;
        let notice = media_notice(
            msg.kind,
            chat_id,
            msg.display_name.as_deref(),
            msg.caption.as_deref(),
        );
        if let Err(e) = self.messenger.send_html(self.admin, &notice).await {
            warn!(chat_id = chat_id.0, error = %e, "failed to send media notice to admin");
        }

        match self
            .messenger
            .forward_message(self.admin, msg.message_ref())
            .await
        {
            Ok(_) => {
                info!(chat_id = chat_id.0, kind = msg.kind.label(), "forwarded media to admin");
                self.notify(chat_id, "✅ Media forwarded to admin.").await;

                let content = match msg.caption.as_deref() {
                    Some(c) if !c.trim().is_empty() => format!("[{}] {c}", msg.kind.label()),
                    _ => format!("[{}]", msg.kind.label()),
                };
                if let Err(e) = self.log.record(LogEntry::to_admin(chat_id, content)).await {
                    warn!(chat_id = chat_id.0, error = %e, "failed to log forwarded media");
                }
            }
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "failed to forward media to admin");
                self.notify(chat_id, "❌ Could not forward your media. Please try again.")
                    .await;
            }
        }
        Ok(())
    }

    pub(super) async fn user_callback(&self, q: CallbackQuery) -> Result<()> {
        match CallbackAction::decode(&q.data) {
            CallbackAction::SelectIntent(intent) => {
                self.answer(&q.callback_id, None).await;
                self.select_intent(q.chat_id, intent).await;
            }
            CallbackAction::Back => {
                self.answer(&q.callback_id, None).await;
                self.cancel_intent(q.chat_id).await;
            }
            CallbackAction::Admin(_) | CallbackAction::ReplyTo(_) => {
                warn!(chat_id = q.chat_id.0, data = %q.data, "non-admin pressed an admin button");
                self.answer(&q.callback_id, Some("Unauthorized")).await;
            }
            CallbackAction::Unknown => {
                self.answer(&q.callback_id, Some("Unknown action")).await;
            }
        }
        Ok(())
    }
}
