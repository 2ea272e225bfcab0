//! Conversation domain - entities and state machines for the guided flow.

mod conversation;
mod message;
mod state;
mod status;

pub use conversation::{Conversation, User};
pub use message::{Message, MessageKind};
pub use state::DialogState;
pub use status::ConversationStatus;
