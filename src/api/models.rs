use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type ConversationId = i64;
pub type MessageId = i64;
pub type UserId = i64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SenderType {
    User,
    Bot,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Bot {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub bot: Bot,
    pub user_id: UserId,
}

/// A chat message as the backend serialises it. Optimistic messages built on
/// the client have no id or sender yet.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    #[serde(default)]
    pub id: Option<MessageId>,
    pub message: String,
    pub sender_type: SenderType,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_feedback")]
    pub feedback: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// The backend stores whatever was posted as feedback, so a bad value on one
/// message must not fail the whole conversation. Anything unreadable is 0.
fn lenient_feedback<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    };
    Ok(value)
}

impl Message {
    pub fn outgoing(text: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            id: None,
            message: text.into(),
            sender_type: SenderType::User,
            sender_id: None,
            time: time.into(),
            feedback: 0,
            conversation_id: None,
            receiver_id: None,
            timestamp: None,
            date: None,
        }
    }

    pub fn is_from_user(&self) -> bool {
        self.sender_type == SenderType::User
    }
}

/// `{ status, message, data }` wrapper used by every JSON endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversationData {
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SentData {
    pub conversation: Conversation,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContactEntry {
    pub id: ConversationId,
    pub name: String,
    pub description: String,
    pub preview: Option<String>,
    pub preview_from_user: bool,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_message() {
        let raw = r#"{
            "id": 7,
            "conversation_id": 3,
            "sender_id": 2,
            "receiver_id": 1,
            "sender_type": "BOT",
            "message": "Hi there",
            "feedback": 4,
            "timestamp": "2023-05-01T10:00:00Z",
            "date": "01/05/2023",
            "time": "10:00 AM"
        }"#;
        let msg: Message = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.id, Some(7));
        assert_eq!(msg.sender_type, SenderType::Bot);
        assert_eq!(msg.feedback, 4);
        assert_eq!(msg.time, "10:00 AM");
        assert!(!msg.is_from_user());
    }

    #[test]
    fn out_of_range_feedback_does_not_drop_the_conversation() {
        let raw = r#"{
            "conversation": {"id": 3, "user_id": 1, "bot": {"name": "Eliza"}},
            "messages": [
                {"id": 1, "sender_id": 2, "sender_type": "BOT", "message": "a", "feedback": -1},
                {"id": 2, "sender_id": 2, "sender_type": "BOT", "message": "b", "feedback": 300},
                {"id": 3, "sender_id": 2, "sender_type": "BOT", "message": "c", "feedback": "4"},
                {"id": 4, "sender_id": 2, "sender_type": "BOT", "message": "d", "feedback": null},
                {"id": 5, "sender_id": 2, "sender_type": "BOT", "message": "e", "feedback": 2}
            ]
        }"#;
        let data: ConversationData = serde_json::from_str(raw).unwrap();
        let feedback: Vec<_> = data.messages.iter().map(|m| m.feedback).collect();
        assert_eq!(feedback, vec![-1, 300, 4, 0, 2]);
    }

    #[test]
    fn envelope_without_data_is_accepted() {
        let env: Envelope<ConversationData> =
            serde_json::from_str(r#"{"status": false, "message": "Invalid payload."}"#).unwrap();
        assert!(!env.status);
        assert!(env.data.is_none());
    }

    #[test]
    fn sent_data_may_omit_reply() {
        let raw = r#"{"conversation": {"id": 1, "user_id": 5, "bot": {"name": "Eliza"}}}"#;
        let data: SentData = serde_json::from_str(raw).unwrap();
        assert_eq!(data.conversation.bot.name, "Eliza");
        assert!(data.message.is_none());
    }
}
