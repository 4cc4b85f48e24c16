//! Telegram `Update` -> messenger-agnostic `IncomingUpdate`.

use teloxide::types::{Message, Update, UpdateKind, User};

use relay_core::{
    domain::{ChatId, MessageId},
    messaging::types::{
        CallbackQuery, Command, IncomingUpdate, MediaKind, MediaMessage, TextMessage,
    },
};

/// Returns `None` for update kinds the relay does not handle (edits, polls, stickers, ...).
pub fn to_incoming(update: &Update) -> Option<IncomingUpdate> {
    match &update.kind {
        UpdateKind::Message(msg) => from_message(msg),
        UpdateKind::CallbackQuery(q) => {
            let chat_id = q
                .message
                .as_ref()
                .map(|m| ChatId(m.chat.id.0))
                .unwrap_or(ChatId(q.from.id.0 as i64));
            Some(IncomingUpdate::Callback(CallbackQuery {
                chat_id,
                display_name: display_name(&q.from),
                callback_id: q.id.clone(),
                data: q.data.clone().unwrap_or_default(),
            }))
        }
        _ => None,
    }
}

fn from_message(msg: &Message) -> Option<IncomingUpdate> {
    let chat_id = ChatId(msg.chat.id.0);
    let name = msg.from().and_then(display_name);
    let message_id = MessageId(msg.id.0);

    if let Some(text) = msg.text() {
        if let Some(cmd) = Command::parse(chat_id, name.clone(), text) {
            return Some(IncomingUpdate::Command(cmd));
        }
        return Some(IncomingUpdate::Text(TextMessage {
            chat_id,
            display_name: name,
            message_id,
            text: text.to_string(),
        }));
    }

    let kind = if msg.photo().is_some() {
        MediaKind::Photo
    } else if msg.document().is_some() {
        MediaKind::Document
    } else if msg.video().is_some() {
        MediaKind::Video
    } else {
        return None;
    };

    Some(IncomingUpdate::Media(MediaMessage {
        chat_id,
        display_name: name,
        message_id,
        kind,
        caption: msg.caption().map(str::to_string),
    }))
}

/// `@username` when set, otherwise the full name.
fn display_name(user: &User) -> Option<String> {
    if let Some(username) = user.username.as_deref().filter(|u| !u.is_empty()) {
        return Some(username.to_string());
    }
    let full = user.full_name();
    let full = full.trim();
    (!full.is_empty()).then(|| full.to_string())
}
