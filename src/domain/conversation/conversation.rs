//! Conversation entity and the user it belongs to.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::CategoryKey;
use crate::domain::conversation::{ConversationStatus, DialogState};
use crate::domain::foundation::{ConversationId, LineUserId, Timestamp, UserId};

/// A platform user, created on first contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal identifier.
    pub id: UserId,
    /// External LINE identifier, unique.
    pub line_user_id: LineUserId,
    /// Display name from the platform profile, if known.
    pub display_name: Option<String>,
    /// When the user was first seen.
    pub created_at: Timestamp,
    /// Last profile refresh.
    pub updated_at: Timestamp,
}

impl User {
    /// Creates a new user record for first contact.
    pub fn new(line_user_id: LineUserId, display_name: Option<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: UserId::new(),
            line_user_id,
            display_name,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A conversation between one user and the assistant.
///
/// Counters are monotonically non-decreasing except on an explicit reset,
/// which zeroes both and clears the category. The dialog state only moves
/// through the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier.
    pub id: ConversationId,
    /// Owning user.
    pub user_id: UserId,
    /// Lifecycle status.
    pub status: ConversationStatus,
    /// Position in the guided flow.
    pub state: DialogState,
    /// Confirmed or pending category, if any.
    pub category_key: Option<CategoryKey>,
    /// Model identifier used for generation.
    pub ai_model: String,
    /// Number of stored messages.
    pub message_count: i64,
    /// Accumulated token usage.
    pub total_tokens: i64,
    /// Last turn or stats refresh.
    pub last_activity_at: Timestamp,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last mutation time.
    pub updated_at: Timestamp,
}

impl Conversation {
    /// Creates a new active conversation in the initial state.
    pub fn new(user_id: UserId, category_key: Option<CategoryKey>, ai_model: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: ConversationId::new(),
            user_id,
            status: ConversationStatus::Active,
            state: DialogState::Initial,
            category_key,
            ai_model: ai_model.into(),
            message_count: 0,
            total_tokens: 0,
            last_activity_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records one stored message, accumulating usage if present.
    pub fn record_message(&mut self, tokens_used: Option<i32>) {
        self.message_count += 1;
        if let Some(tokens) = tokens_used {
            self.total_tokens += i64::from(tokens);
        }
        self.touch();
    }

    /// Applies an explicit reset: out of the active slot, back to the
    /// initial state, category cleared, counters zeroed.
    pub fn apply_reset(&mut self) {
        self.status = ConversationStatus::Reset;
        self.state = DialogState::Initial;
        self.category_key = None;
        self.message_count = 0;
        self.total_tokens = 0;
        self.touch();
    }

    /// Refreshes the activity timestamps.
    pub fn touch(&mut self) {
        let now = Timestamp::now();
        self.last_activity_at = now;
        self.updated_at = now;
    }

    /// Returns true if the conversation is idle past the cutoff.
    pub fn is_idle_since(&self, cutoff: &Timestamp) -> bool {
        self.status.is_active() && self.last_activity_at.is_before(cutoff)
    }
}
