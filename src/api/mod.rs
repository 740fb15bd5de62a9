pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::Result;
use crate::feedback::Rating;
use models::{ConversationData, ConversationId, Export, MessageId, SentData};

/// The conversation endpoints the session drives. [`client::ApiClient`] is
/// the HTTP implementation.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn fetch_conversation(&self, id: ConversationId) -> Result<ConversationData>;

    async fn send_message(&self, id: ConversationId, text: &str) -> Result<SentData>;

    async fn set_feedback(&self, message_id: MessageId, rating: Rating) -> Result<()>;

    async fn clear_conversation(&self, id: ConversationId) -> Result<()>;

    async fn save_conversation(&self, id: ConversationId) -> Result<Export>;

    async fn update_fullname(&self, fullname: &str) -> Result<()>;
}
