use crate::api::models::{Message, MessageId, SenderType, UserId};
use crate::feedback::{MAX_STARS, Rating, StarRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleKind {
    Sent,
    Received,
}

/// A message is ours only when a user wrote it and that user is the one
/// owning the open conversation.
pub fn classify(message: &Message, user_id: Option<UserId>) -> BubbleKind {
    match (message.sender_type, message.sender_id, user_id) {
        (SenderType::User, Some(sender), Some(me)) if sender == me => BubbleKind::Sent,
        _ => BubbleKind::Received,
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_html(markup: &str) -> String {
    markup
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Escapes the text and turns every line break (`\r\n`, `\r` or `\n`) into
/// `<br>`.
pub fn text_to_markup(text: &str) -> String {
    escape_html(text)
        .replace("\r\n", "<br>")
        .replace('\r', "<br>")
        .replace('\n', "<br>")
}

pub fn markup_to_text(markup: &str) -> String {
    unescape_html(&markup.replace("<br>", "\n"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub message_id: Option<MessageId>,
    pub kind: BubbleKind,
    pub markup: String,
    pub time: String,
    pub stars: Option<StarRow>,
}

impl Bubble {
    pub fn from_message(message: &Message, user_id: Option<UserId>) -> Self {
        let kind = classify(message, user_id);
        let stars = match kind {
            BubbleKind::Received => Some(StarRow::from_feedback(message.feedback)),
            BubbleKind::Sent => None,
        };
        Self {
            message_id: message.id,
            kind,
            markup: text_to_markup(&message.message),
            time: message.time.clone(),
            stars,
        }
    }

    pub fn outgoing(text: &str, time: &str) -> Self {
        Self {
            message_id: None,
            kind: BubbleKind::Sent,
            markup: text_to_markup(text),
            time: time.to_string(),
            stars: None,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.markup.split("<br>").map(unescape_html).collect()
    }

    pub fn copy_text(&self) -> String {
        markup_to_text(&self.markup)
    }

    pub fn to_html(&self) -> String {
        match self.kind {
            BubbleKind::Sent => format!(
                "<li class=\"sent\"><p>{}</p></li><p class=\"send-time\">{}</p>",
                self.markup,
                escape_html(&self.time)
            ),
            BubbleKind::Received => {
                let id = self
                    .message_id
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                let row = self.stars.unwrap_or_default();
                let mut stars = String::new();
                for i in 1..=MAX_STARS {
                    let class = if row.is_active(i) {
                        "fa fa-star active"
                    } else {
                        "fa fa-star"
                    };
                    stars.push_str(&format!(
                        "<i class=\"{class}\" aria-hidden=\"true\" id=\"star-{i}-{id}\"></i>"
                    ));
                }
                format!(
                    "<li class=\"replies\"><p title=\"Copy to clipboard\">{}<br><span title=\"Rate the response\">{}</span></p></li><p class=\"reply-time\">{}</p>",
                    self.markup,
                    stars,
                    escape_html(&self.time)
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    bubbles: Vec<Bubble>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bubble: Bubble) {
        self.bubbles.push(bubble);
    }

    pub fn clear(&mut self) {
        self.bubbles.clear();
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    pub fn bubbles(&self) -> &[Bubble] {
        &self.bubbles
    }

    pub fn find(&self, id: MessageId) -> Option<&Bubble> {
        self.bubbles.iter().find(|b| b.message_id == Some(id))
    }

    /// Applies a confirmed rating. Returns false when the message is not in
    /// the transcript or has no stars.
    pub fn apply_rating(&mut self, id: MessageId, rating: Rating) -> bool {
        match self
            .bubbles
            .iter_mut()
            .find(|b| b.message_id == Some(id))
            .and_then(|b| b.stars.as_mut())
        {
            Some(row) => {
                row.apply(rating);
                true
            }
            None => false,
        }
    }

    pub fn to_html(&self) -> String {
        self.bubbles.iter().map(Bubble::to_html).collect()
    }
}
