//! Telegram HTML for everything the bot says. User-supplied text is always escaped.

use crate::{
    directory::LogStats,
    domain::{ChatId, User},
    menu::Intent,
    messaging::types::MediaKind,
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn attribution(id: ChatId, display_name: Option<&str>) -> String {
    let name = display_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("unknown");
    format!("From: {} (ID: <code>{id}</code>)", escape_html(name))
}

/// What the administrator sees when a user's intent payload is relayed.
pub fn intent_relay(intent: Intent, text: &str, id: ChatId, display_name: Option<&str>) -> String {
    format!(
        "<b>{}</b> #{}\n\n{}\n\n{}",
        intent.title(),
        intent.tag(),
        escape_html(text),
        attribution(id, display_name)
    )
}

/// Header sent to the administrator right before a forwarded media message.
pub fn media_notice(
    kind: MediaKind,
    id: ChatId,
    display_name: Option<&str>,
    caption: Option<&str>,
) -> String {
    let mut out = format!(
        "📤 <b>Media</b> ({})\n{}",
        kind.label(),
        attribution(id, display_name)
    );
    if let Some(c) = caption.filter(|c| !c.trim().is_empty()) {
        out.push_str(&format!("\nCaption: {}", escape_html(c)));
    }
    out
}

pub fn admin_reply(text: &str) -> String {
    format!("✅ <b>Admin Reply</b>\n\n{}", escape_html(text))
}

pub fn announcement(text: &str) -> String {
    format!("✅ <b>Admin Announcement</b>\n\n{}", escape_html(text))
}

pub fn user_line(user: &User) -> String {
    format!(
        "👤 {} (ID: <code>{}</code>)",
        escape_html(&user.label()),
        user.id
    )
}

pub fn user_list(users: &[User]) -> String {
    let mut out = format!("📊 <b>Registered Users ({})</b>:", users.len());
    for u in users {
        out.push('\n');
        out.push_str(&user_line(u));
    }
    out
}

pub fn stats(total_users: usize, log: LogStats) -> String {
    format!(
        "📊 <b>Bot Stats</b>\n\n👥 Total Users: {total_users}\n📨 Active Requests: {}\n✉️ Relayed Messages: {}",
        log.active_requests, log.total_messages
    )
}

/// Split a message on line boundaries so every chunk fits in `limit` bytes.
///
/// A single line longer than `limit` is hard-split on a char boundary, never
/// inside an HTML entity such as `&amp;`.
pub fn split_lines(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let needed = if chunk.is_empty() { line.len() } else { chunk.len() + 1 + line.len() };
        if needed > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }

        if line.len() > limit {
            let mut rest = line;
            while rest.len() > limit {
                let mut cut = limit;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                if let Some(amp) = rest[..cut].rfind('&') {
                    if amp > 0 && !rest[amp..cut].contains(';') {
                        cut = amp;
                    }
                }
                out.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            chunk.push_str(rest);
            continue;
        }

        if !chunk.is_empty() {
            chunk.push('\n');
        }
        chunk.push_str(line);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn intent_relay_carries_tag_text_and_identity() {
        let html = intent_relay(Intent::ErrorReport, "crash <on> login", ChatId(42), Some("alice"));
        assert!(html.contains("#ErrorReport"));
        assert!(html.contains("crash &lt;on&gt; login"));
        assert!(html.contains("alice"));
        assert!(html.contains("42"));
    }

    #[test]
    fn media_notice_skips_blank_caption() {
        let html = media_notice(MediaKind::Photo, ChatId(7), None, Some("  "));
        assert!(html.contains("photo"));
        assert!(html.contains("unknown"));
        assert!(!html.contains("Caption"));
    }

    #[test]
    fn split_lines_respects_limit() {
        let text = "aaaa\nbbbb\ncccc";
        assert_eq!(split_lines(text, 9), vec!["aaaa\nbbbb", "cccc"]);
        assert_eq!(split_lines(text, 100), vec![text]);

        let chunks = split_lines("ééééé", 4);
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(chunks.concat(), "ééééé");
    }

    #[test]
    fn split_lines_keeps_entities_whole() {
        assert_eq!(split_lines("aa&amp;bb", 6), vec!["aa", "&amp;b", "b"]);

        let body = format!("a{}", "<>".repeat(3000));
        let chunks = split_lines(&announcement(&body), 4096);
        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 4096);
            assert!(chunk.rfind('&').map_or(true, |i| chunk[i..].contains(';')));
        }
        assert_eq!(chunks[1..].concat(), escape_html(&body));
    }
}
