//! In-memory implementation of the ConversationStore port.
//!
//! Used by tests and local development. Mutex-guarded maps behind the same
//! contract as the Postgres adapter, including the one-active-conversation
//! rule and reset/expire semantics.

use async_trait::async_trait;
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::catalog::CategoryKey;
use crate::domain::conversation::{
    Conversation, ConversationStatus, DialogState, Message, MessageKind, User,
};
use crate::domain::foundation::{ConversationId, LineUserId, Timestamp, UserId};
use crate::ports::{ConversationStore, StoreError};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: Vec<Message>,
}

/// In-memory conversation store.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: returns all messages of a conversation in insertion order.
    pub fn messages_for(&self, conversation_id: ConversationId) -> Vec<Message> {
        self.inner
            .lock()
            .unwrap()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Test hook: returns a conversation snapshot.
    pub fn conversation(&self, conversation_id: ConversationId) -> Option<Conversation> {
        self.inner
            .lock()
            .unwrap()
            .conversations
            .get(&conversation_id)
            .cloned()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn get_or_create_user(
        &self,
        line_user_id: &LineUserId,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner
            .users
            .values()
            .find(|u| &u.line_user_id == line_user_id)
        {
            return Ok(user.clone());
        }

        let user = User::new(line_user_id.clone(), display_name.map(str::to_string));
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, line_user_id: &LineUserId) -> Result<Option<User>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .users
            .values()
            .find(|u| &u.line_user_id == line_user_id)
            .cloned())
    }

    async fn find_active_conversation(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id && c.status.is_active())
            .max_by_key(|c| c.last_activity_at)
            .cloned())
    }

    async fn create_conversation(
        &self,
        user_id: UserId,
        category_key: Option<CategoryKey>,
        ai_model: &str,
    ) -> Result<Conversation, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::UserNotFound(user_id));
        }

        // One active conversation per user: an existing active row wins.
        if let Some(existing) = inner
            .conversations
            .values()
            .find(|c| c.user_id == user_id && c.status.is_active())
        {
            return Ok(existing.clone());
        }

        let conversation = Conversation::new(user_id, category_key, ai_model);
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.conversations.get(&id).cloned())
    }

    async fn append_message(
        &self,
        conversation_id: ConversationId,
        kind: MessageKind,
        content: &str,
        tokens_used: Option<i32>,
        processing_time_ms: Option<i32>,
    ) -> Result<Message, StoreError> {
        let message = Message::new(conversation_id, kind, content, tokens_used, processing_time_ms)
            .map_err(|e| StoreError::database(format!("invalid message: {}", e)))?;

        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;

        conversation.record_message(tokens_used);
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn set_state(
        &self,
        conversation_id: ConversationId,
        state: DialogState,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.state = state;
        conversation.touch();
        Ok(())
    }

    async fn set_category(
        &self,
        conversation_id: ConversationId,
        category_key: Option<&CategoryKey>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.category_key = category_key.cloned();
        conversation.touch();
        Ok(())
    }

    async fn set_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.status = status;
        conversation.touch();
        Ok(())
    }

    async fn reset(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.apply_reset();
        Ok(())
    }

    async fn refresh_activity(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::ConversationNotFound(conversation_id))?;
        conversation.touch();
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();

        let keep = limit as usize;
        if messages.len() > keep {
            messages = messages.split_off(messages.len() - keep);
        }
        Ok(messages)
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Conversation>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        conversations.truncate(limit as usize);
        Ok(conversations)
    }

    async fn expire_inactive(&self, idle_for: Duration) -> Result<u64, StoreError> {
        let cutoff = Timestamp::now().minus(idle_for);
        let mut inner = self.inner.lock().unwrap();
        let mut expired = 0;
        for conversation in inner.conversations.values_mut() {
            if conversation.is_idle_since(&cutoff) {
                conversation.status = ConversationStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }
}
