//! Menu intents and admin actions, decoded from stable callback ids and command names.
//!
//! Button labels are presentation only; nothing here ever matches on them.

use std::fmt;

use crate::messaging::types::{InlineButton, InlineKeyboard};

pub const INTENT_PREFIX: &str = "intent:";
pub const ADMIN_PREFIX: &str = "admin:";
pub const REPLY_PREFIX: &str = "reply:";
pub const BACK: &str = "menu:back";

/// The action a user picked from the menu; their next text message is tagged with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    ModRequest,
    ErrorReport,
    FeatureSuggestion,
    AdminChat,
}

impl Intent {
    pub const ALL: [Intent; 4] = [
        Intent::ModRequest,
        Intent::ErrorReport,
        Intent::FeatureSuggestion,
        Intent::AdminChat,
    ];

    /// Stable id used in callback data and commands.
    pub fn id(self) -> &'static str {
        match self {
            Self::ModRequest => "request_mod",
            Self::ErrorReport => "report_error",
            Self::FeatureSuggestion => "suggest_feature",
            Self::AdminChat => "chat_admin",
        }
    }

    /// Tag attached to relayed messages; also a Telegram hashtag the admin can search by.
    pub fn tag(self) -> &'static str {
        match self {
            Self::ModRequest => "ModRequest",
            Self::ErrorReport => "ErrorReport",
            Self::FeatureSuggestion => "FeatureSuggestion",
            Self::AdminChat => "AdminChat",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::ModRequest => "🛠 Mod Request",
            Self::ErrorReport => "⚠️ Error Report",
            Self::FeatureSuggestion => "💡 Feature Suggestion",
            Self::AdminChat => "📩 User Message",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Self::ModRequest => "🛠 Request Mod",
            Self::ErrorReport => "⚠️ Report Error",
            Self::FeatureSuggestion => "💡 Suggest Features",
            Self::AdminChat => "📩 Chat with Admin",
        }
    }

    /// Prompt sent to the user right after they pick this intent.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::ModRequest => "Please provide details about the mod you want:",
            Self::ErrorReport => "Please describe the error you encountered:",
            Self::FeatureSuggestion => "Please describe your feature suggestion:",
            Self::AdminChat => "Type your message to the admin:",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.id() == id)
    }

    pub fn callback_data(self) -> String {
        format!("{INTENT_PREFIX}{}", self.id())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Buttons on the administrator's menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminAction {
    Reply,
    Broadcast,
    ListUsers,
    Stats,
    Cancel,
}

impl AdminAction {
    pub const ALL: [AdminAction; 5] = [
        AdminAction::Reply,
        AdminAction::Broadcast,
        AdminAction::ListUsers,
        AdminAction::Stats,
        AdminAction::Cancel,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Broadcast => "broadcast",
            Self::ListUsers => "users",
            Self::Stats => "stats",
            Self::Cancel => "cancel",
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Self::Reply => "📨 Reply to Chat",
            Self::Broadcast => "📢 Broadcast Message",
            Self::ListUsers => "👥 View All Users",
            Self::Stats => "📊 View Stats",
            Self::Cancel => "🔙 Back",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }

    pub fn callback_data(self) -> String {
        format!("{ADMIN_PREFIX}{}", self.id())
    }
}

/// Decoded inline-button payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    SelectIntent(Intent),
    Admin(AdminAction),
    ReplyTo(String),
    Back,
    Unknown,
}

impl CallbackAction {
    pub fn decode(data: &str) -> Self {
        if data == BACK {
            return Self::Back;
        }
        if let Some(id) = data.strip_prefix(INTENT_PREFIX) {
            return Intent::from_id(id).map_or(Self::Unknown, Self::SelectIntent);
        }
        if let Some(id) = data.strip_prefix(ADMIN_PREFIX) {
            return AdminAction::from_id(id).map_or(Self::Unknown, Self::Admin);
        }
        if let Some(token) = data.strip_prefix(REPLY_PREFIX) {
            if !token.is_empty() {
                return Self::ReplyTo(token.to_string());
            }
        }
        Self::Unknown
    }
}

/// Two intents per row, then a back button.
pub fn user_keyboard() -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = Intent::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|i| InlineButton::new(i.button_label(), i.callback_data()))
                .collect()
        })
        .collect();
    rows.push(vec![InlineButton::new("🔙 Back", BACK)]);
    InlineKeyboard::new(rows)
}

pub fn admin_keyboard() -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = AdminAction::ALL[..4]
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|a| InlineButton::new(a.button_label(), a.callback_data()))
                .collect()
        })
        .collect();
    rows.push(vec![InlineButton::new(
        AdminAction::Cancel.button_label(),
        AdminAction::Cancel.callback_data(),
    )]);
    InlineKeyboard::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_callback_ids() {
        assert_eq!(
            CallbackAction::decode("intent:report_error"),
            CallbackAction::SelectIntent(Intent::ErrorReport)
        );
        assert_eq!(
            CallbackAction::decode("admin:broadcast"),
            CallbackAction::Admin(AdminAction::Broadcast)
        );
        assert_eq!(
            CallbackAction::decode("reply:3.1"),
            CallbackAction::ReplyTo("3.1".to_string())
        );
        assert_eq!(CallbackAction::decode("menu:back"), CallbackAction::Back);
        assert_eq!(CallbackAction::decode("intent:nope"), CallbackAction::Unknown);
        assert_eq!(CallbackAction::decode("reply:"), CallbackAction::Unknown);
        // Display labels are not callback ids.
        assert_eq!(CallbackAction::decode("⚠️ Report Error"), CallbackAction::Unknown);
    }

    #[test]
    fn keyboards_only_carry_decodable_payloads() {
        for b in user_keyboard().buttons().chain(admin_keyboard().buttons()) {
            assert_ne!(
                CallbackAction::decode(&b.callback_data),
                CallbackAction::Unknown,
                "{}",
                b.callback_data
            );
        }
        assert_eq!(user_keyboard().buttons().count(), 5);
        assert_eq!(admin_keyboard().buttons().count(), 5);
    }
}
