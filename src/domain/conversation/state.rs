//! Dialog state machine.
//!
//! Governs the guided flow of a conversation: menu selection, category
//! confirmation, then free-form dialogue. Reset is a global transition back
//! to the start from every state.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Where a conversation is in the guided flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// Waiting for a numbered category selection.
    #[default]
    Initial,

    /// A category was selected, awaiting yes/no confirmation.
    CategoryConfirmation,

    /// Free-form dialogue scoped to the confirmed category. Loops on itself.
    Conversation,

    /// Defensive catch-all; recovers to Initial on the next turn.
    Unknown,
}

impl StateMachine for DialogState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DialogState::*;
        // Reset makes Initial reachable from every state, including itself.
        if *target == Initial {
            return true;
        }
        matches!(
            (self, target),
            (Initial, CategoryConfirmation) | (CategoryConfirmation, Conversation)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DialogState::*;
        match self {
            Initial => vec![Initial, CategoryConfirmation],
            CategoryConfirmation => vec![Initial, Conversation],
            Conversation => vec![Initial],
            Unknown => vec![Initial],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_edges_follow_the_guided_flow() {
        assert!(DialogState::Initial.can_transition_to(&DialogState::CategoryConfirmation));
        assert!(DialogState::CategoryConfirmation.can_transition_to(&DialogState::Conversation));
    }

    #[test]
    fn initial_is_reachable_from_every_state() {
        for state in [
            DialogState::Initial,
            DialogState::CategoryConfirmation,
            DialogState::Conversation,
            DialogState::Unknown,
        ] {
            assert!(state.can_transition_to(&DialogState::Initial));
        }
    }

    #[test]
    fn skipping_confirmation_is_invalid() {
        assert!(!DialogState::Initial.can_transition_to(&DialogState::Conversation));
        assert!(!DialogState::Conversation.can_transition_to(&DialogState::CategoryConfirmation));
    }

    #[test]
    fn unknown_only_recovers_to_initial() {
        assert_eq!(DialogState::Unknown.valid_transitions(), vec![DialogState::Initial]);
    }

    #[test]
    fn no_state_is_terminal() {
        for state in [
            DialogState::Initial,
            DialogState::CategoryConfirmation,
            DialogState::Conversation,
            DialogState::Unknown,
        ] {
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&DialogState::CategoryConfirmation).unwrap();
        assert_eq!(json, "\"category_confirmation\"");
    }
}
