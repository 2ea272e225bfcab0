//! Conversation store port.
//!
//! Contract for persisting users, conversations, and messages. Each call is
//! transactional: success commits, failure rolls back entirely, so no
//! partial writes are ever visible.

use async_trait::async_trait;
use chrono::Duration;

use crate::domain::catalog::CategoryKey;
use crate::domain::conversation::{
    Conversation, ConversationStatus, DialogState, Message, MessageKind, User,
};
use crate::domain::foundation::{ConversationId, LineUserId, UserId};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The referenced conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A uniqueness or concurrency conflict that did not resolve.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

/// Port for user/conversation/message persistence.
///
/// Implementations must enforce at most one active conversation per user
/// (unique constraint plus retry-on-conflict or an equivalent single-writer
/// serialization point).
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Finds or creates the user for an external platform id.
    ///
    /// Idempotent: an existing row wins and its display name is not
    /// overwritten.
    async fn get_or_create_user(
        &self,
        line_user_id: &LineUserId,
        display_name: Option<&str>,
    ) -> Result<User, StoreError>;

    /// Finds a user by external platform id.
    async fn find_user(&self, line_user_id: &LineUserId) -> Result<Option<User>, StoreError>;

    /// Finds the user's most-recently-active active conversation.
    async fn find_active_conversation(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Creates a new active conversation in the initial state.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user id does not resolve
    /// - `Conflict` if another active conversation won a concurrent race
    ///   and could not be re-read
    async fn create_conversation(
        &self,
        user_id: UserId,
        category_key: Option<CategoryKey>,
        ai_model: &str,
    ) -> Result<Conversation, StoreError>;

    /// Finds a conversation by id.
    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError>;

    /// Appends a message, atomically incrementing the conversation's
    /// message count, accumulating `tokens_used` into its total, and
    /// refreshing its last activity.
    ///
    /// # Errors
    ///
    /// - `ConversationNotFound` if the conversation id does not resolve
    async fn append_message(
        &self,
        conversation_id: ConversationId,
        kind: MessageKind,
        content: &str,
        tokens_used: Option<i32>,
        processing_time_ms: Option<i32>,
    ) -> Result<Message, StoreError>;

    /// Sets the dialog state.
    async fn set_state(
        &self,
        conversation_id: ConversationId,
        state: DialogState,
    ) -> Result<(), StoreError>;

    /// Sets or clears the selected category.
    async fn set_category(
        &self,
        conversation_id: ConversationId,
        category_key: Option<&CategoryKey>,
    ) -> Result<(), StoreError>;

    /// Sets the lifecycle status.
    async fn set_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), StoreError>;

    /// Atomically resets a conversation: status=reset, state=initial,
    /// category cleared, counters zeroed.
    async fn reset(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    /// Refreshes the conversation's last-activity timestamp.
    ///
    /// Best-effort from the orchestrator's perspective; callers may swallow
    /// failures.
    async fn refresh_activity(&self, conversation_id: ConversationId) -> Result<(), StoreError>;

    /// Returns the most recent messages in chronological ascending order,
    /// bounded by `limit`.
    async fn recent_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError>;

    /// Lists a user's conversations, most recent first, bounded by `limit`.
    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Conversation>, StoreError>;

    /// Transitions active conversations idle past the cutoff to expired.
    ///
    /// The status write must be conditional on the row still being active
    /// so the sweep cannot clobber an in-flight reset.
    async fn expire_inactive(&self, idle_for: Duration) -> Result<u64, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ConversationStore) {}
    }

    #[test]
    fn store_error_displays_context() {
        let id = ConversationId::new();
        let err = StoreError::ConversationNotFound(id);
        assert_eq!(err.to_string(), format!("conversation not found: {}", id));
    }
}
