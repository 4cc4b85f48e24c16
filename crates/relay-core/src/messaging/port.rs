use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{InlineKeyboard, MessagingCapabilities},
    Result,
};

/// Outbound delivery port.
///
/// Telegram is the only implementation today. `send_html` and `forward_message`
/// are the relay primitives; both fail with `Error::Delivery` when the recipient
/// is unreachable (blocked the bot, left, bad id) and `Error::RateLimited` when
/// the platform throttles.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Forward an existing message (any media type) into `chat_id`.
    async fn forward_message(&self, chat_id: ChatId, source: MessageRef) -> Result<MessageRef>;

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef>;

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()>;
}
