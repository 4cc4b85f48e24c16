use tracing::{info, warn};

use crate::{
    directory::LogEntry,
    domain::ChatId,
    errors::Error,
    formatting::{self, admin_reply, escape_html},
    menu::{admin_keyboard, AdminAction, CallbackAction, REPLY_PREFIX},
    messaging::types::{CallbackQuery, Command, IncomingUpdate, InlineButton, InlineKeyboard},
    state::ConversationState,
    Result,
};

use super::RelayEngine;

const ADMIN_HELP: &str = "Admin commands:\n\
/reply - pick a user and reply to them\n\
/broadcast - send the next message to every user\n\
/broadcast &lt;text&gt; - broadcast right away\n\
/users - list registered users\n\
/stats - show bot stats\n\
/cancel - drop a pending reply or broadcast\n\
/menu - show the admin menu";

/// Telegram rejects very large inline keyboards; split the user picker.
const MAX_BUTTONS_PER_MESSAGE: usize = 50;

impl RelayEngine {
    pub(super) async fn handle_admin(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.admin_command(cmd).await,
            IncomingUpdate::Text(msg) => self.admin_text(&msg.text).await,
            IncomingUpdate::Media(_) => {
                self.notify(
                    self.admin,
                    "Only text replies and broadcasts are supported from the admin chat.",
                )
                .await;
                Ok(())
            }
            IncomingUpdate::Callback(q) => self.admin_callback(q).await,
        }
    }

    /// Slash commands are always commands, even with a reply or broadcast pending.
    async fn admin_command(&self, cmd: Command) -> Result<()> {
        match cmd.name.as_str() {
            "start" | "menu" => self.show_admin_menu().await,
            "help" => self.notify(self.admin, ADMIN_HELP).await,
            "users" => self.list_users().await?,
            "stats" => self.show_stats().await?,
            "reply" => self.show_reply_selection().await?,
            "cancel" => self.cancel_admin().await,
            "broadcast" => {
                let body = cmd.args.trim();
                if body.is_empty() {
                    self.prompt_broadcast().await?;
                } else {
                    self.state.clear(self.admin).await;
                    self.broadcast(body).await?;
                }
            }
            _ => {
                self.notify(self.admin, "Unknown command. Use /help to see admin commands.")
                    .await
            }
        }
        Ok(())
    }

    /// Priority: pending reply target, then pending broadcast, then the menu.
    async fn admin_text(&self, text: &str) -> Result<()> {
        match self.state.take(self.admin).await {
            ConversationState::ReplyingTo(target) => {
                if let Err(e) = self.deliver_reply(target, text).await {
                    warn!(target = target.0, error = %e, "admin reply not delivered");
                    self.notify(self.admin, &format!("❌ {}", escape_html(&e.to_string())))
                        .await;
                }
            }
            ConversationState::AwaitingBroadcast => {
                self.broadcast(text).await?;
            }
            ConversationState::Idle | ConversationState::Pending(_) => {
                self.show_admin_menu().await;
            }
        }
        Ok(())
    }

    /// The reply target has already been consumed by the caller, whatever happens here.
    async fn deliver_reply(&self, target: ChatId, text: &str) -> Result<()> {
        let user = self.directory.get(target).await?.ok_or_else(|| {
            Error::State(format!("user {target} is no longer known; reply not sent"))
        })?;

        self.send_chunked(target, &admin_reply(text)).await?;
        info!(target = target.0, "admin reply delivered");
        self.notify(
            self.admin,
            &format!("📩 Reply sent to {}!", formatting::user_line(&user)),
        )
        .await;

        if let Err(e) = self
            .log
            .record(LogEntry::admin_reply(self.admin, target, text))
            .await
        {
            warn!(target = target.0, error = %e, "failed to log admin reply");
        }
        Ok(())
    }

    async fn admin_callback(&self, q: CallbackQuery) -> Result<()> {
        match CallbackAction::decode(&q.data) {
            CallbackAction::Admin(action) => {
                self.answer(&q.callback_id, None).await;
                match action {
                    AdminAction::Reply => self.show_reply_selection().await?,
                    AdminAction::Broadcast => self.prompt_broadcast().await?,
                    AdminAction::ListUsers => self.list_users().await?,
                    AdminAction::Stats => self.show_stats().await?,
                    AdminAction::Cancel => self.cancel_admin().await,
                }
            }
            CallbackAction::ReplyTo(token) => self.select_reply_target(&q, &token).await?,
            CallbackAction::Back => {
                self.answer(&q.callback_id, None).await;
                self.cancel_admin().await;
            }
            CallbackAction::SelectIntent(_) => {
                self.answer(&q.callback_id, Some("That menu is for users.")).await;
            }
            CallbackAction::Unknown => {
                self.answer(&q.callback_id, Some("Unknown action")).await;
            }
        }
        Ok(())
    }

    async fn select_reply_target(&self, q: &CallbackQuery, token: &str) -> Result<()> {
        let Some(target) = self.selection.redeem(token).await else {
            self.answer(&q.callback_id, Some("Selection expired. Use /reply again."))
                .await;
            return Ok(());
        };
        self.answer(&q.callback_id, None).await;

        let Some(user) = self.directory.get(target).await? else {
            self.notify(
                self.admin,
                &format!("❌ User {target} is no longer known. Use /reply again."),
            )
            .await;
            return Ok(());
        };

        self.state
            .set(self.admin, ConversationState::ReplyingTo(target))
            .await;
        self.notify(
            self.admin,
            &format!(
                "💬 Type your reply to {}:\n(/cancel to abort)",
                escape_html(&user.label())
            ),
        )
        .await;
        Ok(())
    }

    async fn show_admin_menu(&self) {
        self.notify_with_keyboard(self.admin, "Admin menu:", admin_keyboard())
            .await;
    }

    async fn cancel_admin(&self) {
        self.state.clear(self.admin).await;
        self.notify(self.admin, "Cancelled.").await;
    }

    async fn prompt_broadcast(&self) -> Result<()> {
        if self.directory.count().await? == 0 {
            self.notify(self.admin, "❌ No users to broadcast to.").await;
            return Ok(());
        }
        self.state
            .set(self.admin, ConversationState::AwaitingBroadcast)
            .await;
        self.notify(self.admin, "Type the broadcast message:\n(/cancel to abort)")
            .await;
        Ok(())
    }

    async fn list_users(&self) -> Result<()> {
        let users = self.directory.list_all().await?;
        if users.is_empty() {
            self.notify(self.admin, "❌ No users registered.").await;
            return Ok(());
        }
        self.notify(self.admin, &formatting::user_list(&users))
            .await;
        Ok(())
    }

    async fn show_stats(&self) -> Result<()> {
        let total_users = self.directory.count().await?;
        let log = self.log.stats().await?;
        self.notify(self.admin, &formatting::stats(total_users, log))
            .await;
        Ok(())
    }

    /// Lists users in directory order, each bound to a fresh one-shot token.
    async fn show_reply_selection(&self) -> Result<()> {
        let users = self.directory.list_all().await?;
        if users.is_empty() {
            self.notify(self.admin, "❌ No users to reply to.").await;
            return Ok(());
        }

        let ids: Vec<ChatId> = users.iter().map(|u| u.id).collect();
        let tokens = self.selection.issue(&ids).await;
        let buttons: Vec<InlineButton> = users
            .iter()
            .zip(tokens)
            .map(|(user, (token, _))| {
                InlineButton::new(
                    format!("👤 {} (ID: {})", user.label(), user.id),
                    format!("{REPLY_PREFIX}{token}"),
                )
            })
            .collect();

        for chunk in buttons.chunks(MAX_BUTTONS_PER_MESSAGE) {
            self.notify_with_keyboard(
                self.admin,
                "Select a user to reply:",
                InlineKeyboard::one_per_row(chunk.to_vec()),
            )
            .await;
        }
        Ok(())
    }
}
