//! Message entity for conversations.
//!
//! Messages are immutable records of user/assistant exchanges. They are
//! never edited or deleted except by cascading conversation deletion, and
//! their creation order defines the context window.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ConversationId, MessageId, Timestamp, ValidationError};

/// Who produced a message. Exactly these two kinds are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Inbound text from the user.
    User,
    /// Generated reply from the assistant.
    Assistant,
}

/// An immutable message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Sender kind.
    pub kind: MessageKind,
    /// Text content, non-empty.
    pub content: String,
    /// Total tokens consumed producing this message (assistant only in practice).
    pub tokens_used: Option<i32>,
    /// Wall-clock generation time in milliseconds.
    pub processing_time_ms: Option<i32>,
    /// Creation time; defines context-window ordering.
    pub created_at: Timestamp,
}

impl Message {
    /// Creates a new message.
    ///
    /// # Errors
    ///
    /// Returns a validation error if content is empty.
    pub fn new(
        conversation_id: ConversationId,
        kind: MessageKind,
        content: impl Into<String>,
        tokens_used: Option<i32>,
        processing_time_ms: Option<i32>,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ValidationError::empty_field("content"));
        }
        Ok(Self {
            id: MessageId::new(),
            conversation_id,
            kind,
            content,
            tokens_used,
            processing_time_ms,
            created_at: Timestamp::now(),
        })
    }

    /// Creates an inbound user message.
    pub fn user(
        conversation_id: ConversationId,
        content: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::new(conversation_id, MessageKind::User, content, None, None)
    }

    /// Creates a generated assistant message with usage accounting.
    pub fn assistant(
        conversation_id: ConversationId,
        content: impl Into<String>,
        tokens_used: Option<i32>,
        processing_time_ms: Option<i32>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            conversation_id,
            MessageKind::Assistant,
            content,
            tokens_used,
            processing_time_ms,
        )
    }

    /// Reconstitutes a message from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: MessageId,
        conversation_id: ConversationId,
        kind: MessageKind,
        content: String,
        tokens_used: Option<i32>,
        processing_time_ms: Option<i32>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id,
            kind,
            content,
            tokens_used,
            processing_time_ms,
            created_at,
        }
    }

    /// Returns true if this message came from the user.
    pub fn is_user(&self) -> bool {
        self.kind == MessageKind::User
    }

    /// Returns true if this message was generated by the assistant.
    pub fn is_assistant(&self) -> bool {
        self.kind == MessageKind::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_content() {
        let conversation_id = ConversationId::new();
        assert!(Message::user(conversation_id, "").is_err());
        assert!(Message::user(conversation_id, "  \n ").is_err());
    }

    #[test]
    fn user_message_carries_no_usage() {
        let message = Message::user(ConversationId::new(), "哈囉").unwrap();
        assert!(message.is_user());
        assert_eq!(message.tokens_used, None);
        assert_eq!(message.processing_time_ms, None);
    }

    #[test]
    fn assistant_message_carries_usage() {
        let message =
            Message::assistant(ConversationId::new(), "你好！", Some(42), Some(850)).unwrap();
        assert!(message.is_assistant());
        assert_eq!(message.tokens_used, Some(42));
        assert_eq!(message.processing_time_ms, Some(850));
    }

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&MessageKind::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageKind::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
