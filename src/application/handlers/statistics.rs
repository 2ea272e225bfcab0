//! Usage statistics and cost estimation.
//!
//! Aggregates a user's conversations for the administrative surface and
//! produces order-of-magnitude cost figures. Estimates only, never
//! billing-accurate.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::catalog::CategoryCatalog;
use crate::domain::conversation::{ConversationStatus, Message};
use crate::domain::foundation::LineUserId;
use crate::ports::{approximate_tokens, ConversationStore, StoreError};

/// USD per 1K prompt tokens (gpt-3.5-turbo class pricing).
const INPUT_RATE_PER_1K: f64 = 0.0015;

/// USD per 1K completion tokens.
const OUTPUT_RATE_PER_1K: f64 = 0.002;

/// Bound on how many conversations one aggregation reads.
const AGGREGATION_LIMIT: u32 = 1000;

/// Errors from the statistics handler.
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// No user exists for the platform id.
    #[error("user not found: {0}")]
    UserNotFound(LineUserId),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Aggregated usage over all of a user's conversations.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStatistics {
    pub total_conversations: u64,
    pub active_conversations: u64,
    pub reset_conversations: u64,
    pub expired_conversations: u64,
    pub archived_conversations: u64,
    pub total_messages: i64,
    pub total_tokens: i64,
    pub by_category: HashMap<String, u64>,
    pub by_model: HashMap<String, u64>,
    /// Rough total cost, assuming an averaged completion rate.
    pub estimated_total_cost_usd: f64,
    pub average_tokens_per_conversation: f64,
}

/// Cost estimate for a hypothetical next exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub estimated_cost_usd: f64,
}

/// Snapshot of a user's active conversation for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub category_key: Option<String>,
    pub category_name: Option<String>,
    pub ai_model: String,
    pub status: ConversationStatus,
    pub state: crate::domain::conversation::DialogState,
    pub message_count: i64,
    pub total_tokens: i64,
}

/// Handler for usage statistics queries.
pub struct StatisticsHandler {
    store: Arc<dyn ConversationStore>,
    catalog: Arc<CategoryCatalog>,
}

impl StatisticsHandler {
    /// Creates a new handler with the given dependencies.
    pub fn new(store: Arc<dyn ConversationStore>, catalog: Arc<CategoryCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Aggregates usage over all of a user's conversations.
    pub async fn usage_statistics(
        &self,
        line_user_id: &LineUserId,
    ) -> Result<UsageStatistics, StatisticsError> {
        let user = self
            .store
            .find_user(line_user_id)
            .await?
            .ok_or_else(|| StatisticsError::UserNotFound(line_user_id.clone()))?;

        let conversations = self
            .store
            .list_conversations(user.id, AGGREGATION_LIMIT)
            .await?;

        let mut stats = UsageStatistics {
            total_conversations: conversations.len() as u64,
            active_conversations: 0,
            reset_conversations: 0,
            expired_conversations: 0,
            archived_conversations: 0,
            total_messages: 0,
            total_tokens: 0,
            by_category: HashMap::new(),
            by_model: HashMap::new(),
            estimated_total_cost_usd: 0.0,
            average_tokens_per_conversation: 0.0,
        };

        for conversation in &conversations {
            match conversation.status {
                ConversationStatus::Active => stats.active_conversations += 1,
                ConversationStatus::Reset => stats.reset_conversations += 1,
                ConversationStatus::Expired => stats.expired_conversations += 1,
                ConversationStatus::Archived => stats.archived_conversations += 1,
            }

            stats.total_messages += conversation.message_count;
            stats.total_tokens += conversation.total_tokens;

            if let Some(key) = &conversation.category_key {
                *stats.by_category.entry(key.as_str().to_string()).or_insert(0) += 1;
            }
            *stats
                .by_model
                .entry(conversation.ai_model.clone())
                .or_insert(0) += 1;
        }

        stats.estimated_total_cost_usd =
            stats.total_tokens as f64 * OUTPUT_RATE_PER_1K / 1000.0;
        if stats.total_conversations > 0 {
            stats.average_tokens_per_conversation =
                stats.total_tokens as f64 / stats.total_conversations as f64;
        }

        Ok(stats)
    }

    /// Returns a snapshot of the user's active conversation, if any.
    pub async fn conversation_summary(
        &self,
        line_user_id: &LineUserId,
    ) -> Result<Option<ConversationSummary>, StatisticsError> {
        let user = self
            .store
            .find_user(line_user_id)
            .await?
            .ok_or_else(|| StatisticsError::UserNotFound(line_user_id.clone()))?;

        let Some(conversation) = self.store.find_active_conversation(user.id).await? else {
            return Ok(None);
        };

        let category_name = conversation
            .category_key
            .as_ref()
            .and_then(|key| self.catalog.by_key(key))
            .map(|category| category.name.clone());

        Ok(Some(ConversationSummary {
            conversation_id: conversation.id.to_string(),
            line_user_id: user.line_user_id.to_string(),
            display_name: user.display_name,
            category_key: conversation
                .category_key
                .as_ref()
                .map(|key| key.as_str().to_string()),
            category_name,
            ai_model: conversation.ai_model,
            status: conversation.status,
            state: conversation.state,
            message_count: conversation.message_count,
            total_tokens: conversation.total_tokens,
        }))
    }
}

/// Estimates the cost of one more exchange over the given history.
///
/// Sums estimated prompt tokens over the history plus a synthetic reply of
/// `assumed_reply_chars` characters.
pub fn estimate_cost(history: &[Message], assumed_reply_chars: usize) -> CostEstimate {
    let input_tokens: u32 = history
        .iter()
        .map(|message| approximate_tokens(&message.content))
        .sum();
    let output_tokens = approximate_tokens(&"x".repeat(assumed_reply_chars));

    let cost = f64::from(input_tokens) * INPUT_RATE_PER_1K / 1000.0
        + f64::from(output_tokens) * OUTPUT_RATE_PER_1K / 1000.0;

    CostEstimate {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
        estimated_cost_usd: cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::conversation::MessageKind;
    use crate::domain::foundation::ConversationId;
    use crate::ports::ConversationStore as _;

    fn line_id(s: &str) -> LineUserId {
        LineUserId::new(s).unwrap()
    }

    async fn seeded_store() -> (Arc<InMemoryStore>, LineUserId) {
        let store = Arc::new(InMemoryStore::new());
        let line = line_id("U1");
        let user = store.get_or_create_user(&line, Some("Alice")).await.unwrap();

        // One reset conversation with a category and usage.
        let first = store
            .create_conversation(user.id, None, "gpt-3.5-turbo")
            .await
            .unwrap();
        store
            .set_category(
                first.id,
                Some(&crate::domain::catalog::CategoryKey::new("career").unwrap()),
            )
            .await
            .unwrap();
        store
            .append_message(first.id, MessageKind::User, "1", None, None)
            .await
            .unwrap();
        store
            .append_message(first.id, MessageKind::Assistant, "好", Some(100), Some(400))
            .await
            .unwrap();
        store.set_status(first.id, ConversationStatus::Reset).await.unwrap();

        // One active conversation.
        let second = store
            .create_conversation(user.id, None, "gpt-4o")
            .await
            .unwrap();
        store
            .append_message(second.id, MessageKind::User, "hello", None, None)
            .await
            .unwrap();

        (store, line)
    }

    fn handler(store: Arc<InMemoryStore>) -> StatisticsHandler {
        StatisticsHandler::new(store, Arc::new(CategoryCatalog::builtin()))
    }

    #[tokio::test]
    async fn aggregates_counts_by_status_category_and_model() {
        let (store, line) = seeded_store().await;
        let stats = handler(store).usage_statistics(&line).await.unwrap();

        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.active_conversations, 1);
        assert_eq!(stats.reset_conversations, 1);
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.total_tokens, 100);
        assert_eq!(stats.by_category.get("career"), Some(&1));
        assert_eq!(stats.by_model.get("gpt-3.5-turbo"), Some(&1));
        assert_eq!(stats.by_model.get("gpt-4o"), Some(&1));
        assert_eq!(stats.average_tokens_per_conversation, 50.0);
        assert!(stats.estimated_total_cost_usd > 0.0);
    }

    #[tokio::test]
    async fn unknown_user_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let result = handler(store).usage_statistics(&line_id("Unobody")).await;
        assert!(matches!(result, Err(StatisticsError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn summary_resolves_category_name() {
        let (store, line) = seeded_store().await;
        // Give the active conversation a category.
        let user = store.find_user(&line).await.unwrap().unwrap();
        let active = store.find_active_conversation(user.id).await.unwrap().unwrap();
        store
            .set_category(
                active.id,
                Some(&crate::domain::catalog::CategoryKey::new("stress").unwrap()),
            )
            .await
            .unwrap();

        let summary = handler(store)
            .conversation_summary(&line)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.category_key.as_deref(), Some("stress"));
        assert_eq!(summary.category_name.as_deref(), Some("情緒壓力"));
        assert_eq!(summary.ai_model, "gpt-4o");
    }

    #[tokio::test]
    async fn summary_is_none_without_active_conversation() {
        let store = Arc::new(InMemoryStore::new());
        let line = line_id("U2");
        store.get_or_create_user(&line, None).await.unwrap();

        let summary = handler(store).conversation_summary(&line).await.unwrap();
        assert!(summary.is_none());
    }

    #[test]
    fn estimate_cost_sums_history_and_synthetic_reply() {
        let conversation_id = ConversationId::new();
        let history = vec![
            Message::user(conversation_id, "hello there").unwrap(),
            Message::assistant(conversation_id, "嗨，你好嗎", None, None).unwrap(),
        ];

        let estimate = estimate_cost(&history, 200);
        assert_eq!(
            estimate.total_tokens,
            estimate.input_tokens + estimate.output_tokens
        );
        assert_eq!(estimate.output_tokens, 50);
        assert!(estimate.estimated_cost_usd > 0.0);
    }

    #[test]
    fn estimate_cost_of_empty_history_is_reply_only() {
        let estimate = estimate_cost(&[], 100);
        // approximate_tokens floors at 1 per message; with no messages the
        // input side is zero.
        assert_eq!(estimate.input_tokens, 0);
        assert_eq!(estimate.output_tokens, 25);
    }
}
