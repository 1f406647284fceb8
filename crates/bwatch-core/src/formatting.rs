//! Message composition (bulletin → notification HTML).

use std::collections::BTreeSet;

use regex::Regex;

use crate::domain::Bulletin;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Flatten bulletin markup to plain text: line breaks kept, tags dropped,
/// common entities decoded, whitespace collapsed.
pub fn strip_tags(markup: &str) -> String {
    let breaks = Regex::new(r"(?i)<\s*(br\s*/?|/p)\s*>").expect("valid regex");
    let tag = Regex::new(r"(?s)<[^>]*>").expect("valid regex");

    let text = breaks.replace_all(markup, "\n");
    let text = tag.replace_all(&text, " ");

    let mut text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let spaces = Regex::new(r"[ \t]+").expect("valid regex");
    text = spaces.replace_all(&text, " ").to_string();

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut text = lines.join("\n");
    while text.contains("\n\n\n") {
        text = text.replace("\n\n\n", "\n\n");
    }
    text.trim().to_string()
}

/// Compose the notification text for one bulletin.
pub fn compose_message(bulletin: &Bulletin, classes: &BTreeSet<String>) -> String {
    let mut message = format!(
        "<b>\u{1F4CC} {}</b>\n\u{1F4C5} {}\n",
        escape_html(&bulletin.title),
        escape_html(&bulletin.date)
    );

    let body = strip_tags(&bulletin.body);
    if !body.is_empty() {
        message.push('\n');
        message.push_str(&escape_html(&body));
        message.push('\n');
    }

    if !classes.is_empty() {
        let list = classes.iter().cloned().collect::<Vec<_>>().join(", ");
        message.push_str(&format!("\n\u{1F4DA} Classes: {list}\n"));
    }

    message
}
