//! LINE messaging adapter: webhook verification, event extraction, and
//! outbound push.

mod client;
mod events;
mod signature;

pub use client::LinePushClient;
pub use events::{extract_events, InboundEvent, WebhookPayload};
pub use signature::LineSignatureVerifier;

use thiserror::Error;

/// Errors from the LINE adapter.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header did not match the body.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The request could not be parsed.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Outbound delivery failed.
    #[error("delivery error: {0}")]
    Delivery(String),
}
