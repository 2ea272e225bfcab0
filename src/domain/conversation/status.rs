//! Conversation lifecycle status.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Lifecycle status of a conversation.
///
/// At most one conversation per user is `Active` at a time. Reset and
/// expiry take a conversation out of the active slot; a fresh conversation
/// is created lazily on the user's next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// The user's current conversation.
    #[default]
    Active,

    /// Explicitly reset by the user; kept for history.
    Reset,

    /// Timed out by the inactivity sweep.
    Expired,

    /// Administratively archived after expiry.
    Archived,
}

impl ConversationStatus {
    /// Returns true if the conversation occupies the user's active slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl StateMachine for ConversationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConversationStatus::*;
        matches!(
            (self, target),
            (Active, Reset) | (Active, Expired) | (Expired, Archived)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationStatus::*;
        match self {
            Active => vec![Reset, Expired],
            Expired => vec![Archived],
            Reset | Archived => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_can_reset_or_expire() {
        assert!(ConversationStatus::Active.can_transition_to(&ConversationStatus::Reset));
        assert!(ConversationStatus::Active.can_transition_to(&ConversationStatus::Expired));
    }

    #[test]
    fn expired_can_only_archive() {
        assert_eq!(
            ConversationStatus::Expired.valid_transitions(),
            vec![ConversationStatus::Archived]
        );
    }

    #[test]
    fn reset_and_archived_are_terminal() {
        assert!(ConversationStatus::Reset.is_terminal());
        assert!(ConversationStatus::Archived.is_terminal());
        assert!(!ConversationStatus::Active.is_terminal());
    }

    #[test]
    fn only_active_is_active() {
        assert!(ConversationStatus::Active.is_active());
        assert!(!ConversationStatus::Reset.is_active());
        assert!(!ConversationStatus::Expired.is_active());
        assert!(!ConversationStatus::Archived.is_active());
    }
}
