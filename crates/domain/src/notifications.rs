use serde::{Deserialize, Serialize};

use crate::mentions::ResolvedMention;
use crate::quotes::QuoteRef;
use crate::util::non_empty;

pub const NOTIFICATION_TYPE_MENTION: &str = "mention";
pub const MAX_SNIPPET_CHARS: usize = 220;
const ELLIPSIS: &str = "...";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    pub href: String,
    #[serde(rename = "type")]
    pub notification_type: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLocale {
    #[default]
    En,
    Pt,
}

impl NotificationLocale {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en_us" => Some(NotificationLocale::En),
            "pt" | "pt-br" | "pt_br" => Some(NotificationLocale::Pt),
            _ => None,
        }
    }

    pub fn mention_title(&self) -> &'static str {
        match self {
            NotificationLocale::En => "You were mentioned in a quote comment",
            NotificationLocale::Pt => "Você foi mencionado em um comentário de orçamento",
        }
    }

    /// Names the quote by number when known, else by id.
    pub fn quote_label(&self, quote: &QuoteRef) -> String {
        let noun = match self {
            NotificationLocale::En => "Quote",
            NotificationLocale::Pt => "Orçamento",
        };
        match non_empty(quote.number.as_deref()) {
            Some(number) => format!("{noun} #{number}"),
            None => format!("{noun} {}", quote.id),
        }
    }
}

/// At most [`MAX_SNIPPET_CHARS`] characters; longer text keeps 217 and ends in `...`.
pub fn truncate_snippet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= MAX_SNIPPET_CHARS {
        return text.to_string();
    }
    let keep = MAX_SNIPPET_CHARS - ELLIPSIS.len();
    let mut snippet: String = text.chars().take(keep).collect();
    snippet.push_str(ELLIPSIS);
    snippet
}

pub fn quote_href(quote_id: &str) -> String {
    format!("/orders/estimates/{quote_id}")
}

pub fn build_mention_notification(
    locale: NotificationLocale,
    quote: &QuoteRef,
    comment_body: &str,
    recipient: &str,
) -> Notification {
    let label = locale.quote_label(quote);
    let snippet = truncate_snippet(comment_body);
    let body = if snippet.is_empty() {
        label
    } else {
        format!("{label}: {snippet}")
    };
    Notification {
        user_id: recipient.to_string(),
        title: locale.mention_title().to_string(),
        body,
        href: quote_href(&quote.id),
        notification_type: NOTIFICATION_TYPE_MENTION.to_string(),
    }
}

/// Explicit ids first, then resolved ones; first-seen order, blanks and the
/// author removed.
pub fn merge_recipients(
    explicit: &[String],
    resolved: &[ResolvedMention],
    author_id: &str,
) -> Vec<String> {
    let author_id = author_id.trim();
    let mut recipients: Vec<String> = Vec::new();
    let candidates = explicit
        .iter()
        .map(String::as_str)
        .chain(resolved.iter().map(|mention| mention.user_id.as_str()));
    for candidate in candidates {
        let candidate = candidate.trim();
        if candidate.is_empty() || candidate == author_id {
            continue;
        }
        if !recipients.iter().any(|existing| existing == candidate) {
            recipients.push(candidate.to_string());
        }
    }
    recipients
}
