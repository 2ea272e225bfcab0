//! PostgreSQL implementation of the ConversationStore port.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};

use crate::domain::catalog::CategoryKey;
use crate::domain::conversation::{
    Conversation, ConversationStatus, DialogState, Message, MessageKind, User,
};
use crate::domain::foundation::{ConversationId, LineUserId, MessageId, Timestamp, UserId};
use crate::ports::{ConversationStore, StoreError};

/// PostgreSQL-backed conversation store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_user(&self, line_user_id: &LineUserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, line_user_id, display_name, created_at, updated_at
            FROM users
            WHERE line_user_id = $1
            "#,
        )
        .bind(line_user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to fetch user: {}", e)))?;

        row.map(row_to_user).transpose()
    }
}

#[async_trait]
impl ConversationStore for PostgresStore {
    async fn get_or_create_user(
        &self,
        line_user_id: &LineUserId,
        display_name: Option<&str>,
    ) -> Result<User, StoreError> {
        if let Some(user) = self.fetch_user(line_user_id).await? {
            return Ok(user);
        }

        // A concurrent first-contact race resolves on the unique index; the
        // loser falls through to the re-read below.
        sqlx::query(
            r#"
            INSERT INTO users (id, line_user_id, display_name, created_at, updated_at)
            VALUES ($1, $2, $3, now(), now())
            ON CONFLICT (line_user_id) DO NOTHING
            "#,
        )
        .bind(UserId::new().as_uuid())
        .bind(line_user_id.as_str())
        .bind(display_name)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to insert user: {}", e)))?;

        self.fetch_user(line_user_id)
            .await?
            .ok_or_else(|| StoreError::Conflict("user vanished after insert".to_string()))
    }

    async fn find_user(&self, line_user_id: &LineUserId) -> Result<Option<User>, StoreError> {
        self.fetch_user(line_user_id).await
    }

    async fn find_active_conversation(
        &self,
        user_id: UserId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, state, category_key, ai_model,
                   message_count, total_tokens, last_activity_at, created_at, updated_at
            FROM conversations
            WHERE user_id = $1 AND status = 'active'
            ORDER BY last_activity_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to fetch active conversation: {}", e)))?;

        row.map(row_to_conversation).transpose()
    }

    async fn create_conversation(
        &self,
        user_id: UserId,
        category_key: Option<CategoryKey>,
        ai_model: &str,
    ) -> Result<Conversation, StoreError> {
        let exists = sqlx::query("SELECT 1 AS one FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::database(format!("failed to check user: {}", e)))?;
        if exists.is_none() {
            return Err(StoreError::UserNotFound(user_id));
        }

        let conversation = Conversation::new(user_id, category_key, ai_model);

        // The partial unique index allows only one active conversation per
        // user; a racing creator loses here and re-reads the winner's row.
        let result = sqlx::query(
            r#"
            INSERT INTO conversations (
                id, user_id, status, state, category_key, ai_model,
                message_count, total_tokens, last_activity_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id) WHERE status = 'active' DO NOTHING
            "#,
        )
        .bind(conversation.id.as_uuid())
        .bind(conversation.user_id.as_uuid())
        .bind(status_to_str(conversation.status))
        .bind(state_to_str(conversation.state))
        .bind(conversation.category_key.as_ref().map(|k| k.as_str()))
        .bind(&conversation.ai_model)
        .bind(conversation.message_count)
        .bind(conversation.total_tokens)
        .bind(conversation.last_activity_at.as_datetime())
        .bind(conversation.created_at.as_datetime())
        .bind(conversation.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to insert conversation: {}", e)))?;

        if result.rows_affected() == 0 {
            return self
                .find_active_conversation(user_id)
                .await?
                .ok_or_else(|| {
                    StoreError::Conflict("lost creation race and found no active row".to_string())
                });
        }

        Ok(conversation)
    }

    async fn find_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, status, state, category_key, ai_model,
                   message_count, total_tokens, last_activity_at, created_at, updated_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to fetch conversation: {}", e)))?;

        row.map(row_to_conversation).transpose()
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

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::database(format!("failed to start transaction: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO messages (
                id, conversation_id, kind, content, tokens_used, processing_time_ms, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(conversation_id.as_uuid())
        .bind(kind_to_str(message.kind))
        .bind(&message.content)
        .bind(message.tokens_used)
        .bind(message.processing_time_ms)
        .bind(message.created_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::database(format!("failed to insert message: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                message_count = message_count + 1,
                total_tokens = total_tokens + COALESCE($2, 0),
                last_activity_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(tokens_used)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::database(format!("failed to update counters: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::database(format!("failed to commit transaction: {}", e)))?;

        Ok(message)
    }

    async fn set_state(
        &self,
        conversation_id: ConversationId,
        state: DialogState,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE conversations SET state = $2, updated_at = now() WHERE id = $1")
                .bind(conversation_id.as_uuid())
                .bind(state_to_str(state))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::database(format!("failed to set state: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        Ok(())
    }

    async fn set_category(
        &self,
        conversation_id: ConversationId,
        category_key: Option<&CategoryKey>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE conversations SET category_key = $2, updated_at = now() WHERE id = $1",
        )
        .bind(conversation_id.as_uuid())
        .bind(category_key.map(|k| k.as_str()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to set category: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        Ok(())
    }

    async fn set_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE conversations SET status = $2, updated_at = now() WHERE id = $1")
                .bind(conversation_id.as_uuid())
                .bind(status_to_str(status))
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::database(format!("failed to set status: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        Ok(())
    }

    async fn reset(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE conversations SET
                status = 'reset',
                state = 'initial',
                category_key = NULL,
                message_count = 0,
                total_tokens = 0,
                last_activity_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to reset conversation: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        Ok(())
    }

    async fn refresh_activity(&self, conversation_id: ConversationId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE conversations SET last_activity_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(conversation_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to refresh activity: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConversationNotFound(conversation_id));
        }
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, kind, content, tokens_used, processing_time_ms, created_at
            FROM (
                SELECT id, conversation_id, kind, content, tokens_used, processing_time_ms, created_at
                FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to fetch messages: {}", e)))?;

        rows.into_iter().map(row_to_message).collect()
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, status, state, category_key, ai_model,
                   message_count, total_tokens, last_activity_at, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to list conversations: {}", e)))?;

        rows.into_iter().map(row_to_conversation).collect()
    }

    async fn expire_inactive(&self, idle_for: Duration) -> Result<u64, StoreError> {
        let cutoff: DateTime<Utc> = Utc::now() - idle_for;

        // Conditional on status so the sweep cannot clobber a concurrent
        // reset of the same conversation.
        let result = sqlx::query(
            r#"
            UPDATE conversations SET status = 'expired', updated_at = now()
            WHERE status = 'active' AND last_activity_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::database(format!("failed to expire conversations: {}", e)))?;

        Ok(result.rows_affected())
    }
}

// === Row mapping helpers ===

fn row_to_user(row: sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let id: uuid::Uuid = row.get("id");
    let line_user_id: String = row.get("line_user_id");
    let display_name: Option<String> = row.get("display_name");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(User {
        id: UserId::from_uuid(id),
        line_user_id: LineUserId::new(line_user_id)
            .map_err(|e| StoreError::database(format!("corrupt user row: {}", e)))?,
        display_name,
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn row_to_conversation(row: sqlx::postgres::PgRow) -> Result<Conversation, StoreError> {
    let id: uuid::Uuid = row.get("id");
    let user_id: uuid::Uuid = row.get("user_id");
    let status: &str = row.get("status");
    let state: &str = row.get("state");
    let category_key: Option<String> = row.get("category_key");
    let ai_model: String = row.get("ai_model");
    let message_count: i64 = row.get("message_count");
    let total_tokens: i64 = row.get("total_tokens");
    let last_activity_at: DateTime<Utc> = row.get("last_activity_at");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let category_key = category_key
        .map(CategoryKey::new)
        .transpose()
        .map_err(|e| StoreError::database(format!("corrupt conversation row: {}", e)))?;

    Ok(Conversation {
        id: ConversationId::from_uuid(id),
        user_id: UserId::from_uuid(user_id),
        status: str_to_status(status)?,
        state: str_to_state(state)?,
        category_key,
        ai_model,
        message_count,
        total_tokens,
        last_activity_at: Timestamp::from_datetime(last_activity_at),
        created_at: Timestamp::from_datetime(created_at),
        updated_at: Timestamp::from_datetime(updated_at),
    })
}

fn row_to_message(row: sqlx::postgres::PgRow) -> Result<Message, StoreError> {
    let id: uuid::Uuid = row.get("id");
    let conversation_id: uuid::Uuid = row.get("conversation_id");
    let kind: &str = row.get("kind");
    let content: String = row.get("content");
    let tokens_used: Option<i32> = row.get("tokens_used");
    let processing_time_ms: Option<i32> = row.get("processing_time_ms");
    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(Message::reconstitute(
        MessageId::from_uuid(id),
        ConversationId::from_uuid(conversation_id),
        str_to_kind(kind)?,
        content,
        tokens_used,
        processing_time_ms,
        Timestamp::from_datetime(created_at),
    ))
}

fn status_to_str(status: ConversationStatus) -> &'static str {
    match status {
        ConversationStatus::Active => "active",
        ConversationStatus::Reset => "reset",
        ConversationStatus::Expired => "expired",
        ConversationStatus::Archived => "archived",
    }
}

fn str_to_status(s: &str) -> Result<ConversationStatus, StoreError> {
    match s {
        "active" => Ok(ConversationStatus::Active),
        "reset" => Ok(ConversationStatus::Reset),
        "expired" => Ok(ConversationStatus::Expired),
        "archived" => Ok(ConversationStatus::Archived),
        _ => Err(StoreError::database(format!("invalid status: {}", s))),
    }
}

fn state_to_str(state: DialogState) -> &'static str {
    match state {
        DialogState::Initial => "initial",
        DialogState::CategoryConfirmation => "category_confirmation",
        DialogState::Conversation => "conversation",
        DialogState::Unknown => "unknown",
    }
}

fn str_to_state(s: &str) -> Result<DialogState, StoreError> {
    match s {
        "initial" => Ok(DialogState::Initial),
        "category_confirmation" => Ok(DialogState::CategoryConfirmation),
        "conversation" => Ok(DialogState::Conversation),
        _ => Ok(DialogState::Unknown),
    }
}

fn kind_to_str(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::User => "user",
        MessageKind::Assistant => "assistant",
    }
}

fn str_to_kind(s: &str) -> Result<MessageKind, StoreError> {
    match s {
        "user" => Ok(MessageKind::User),
        "assistant" => Ok(MessageKind::Assistant),
        _ => Err(StoreError::database(format!("invalid message kind: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            ConversationStatus::Active,
            ConversationStatus::Reset,
            ConversationStatus::Expired,
            ConversationStatus::Archived,
        ] {
            assert_eq!(str_to_status(status_to_str(status)).unwrap(), status);
        }
    }

    #[test]
    fn state_round_trips() {
        for state in [
            DialogState::Initial,
            DialogState::CategoryConfirmation,
            DialogState::Conversation,
            DialogState::Unknown,
        ] {
            assert_eq!(str_to_state(state_to_str(state)).unwrap(), state);
        }
    }

    #[test]
    fn unrecognized_state_maps_to_unknown() {
        // Defensive: a row written by a newer schema version must not wedge
        // the conversation; the unknown state recovers on the next turn.
        assert_eq!(str_to_state("negotiating").unwrap(), DialogState::Unknown);
    }

    #[test]
    fn unrecognized_kind_is_rejected() {
        assert!(str_to_kind("system").is_err());
    }
}
