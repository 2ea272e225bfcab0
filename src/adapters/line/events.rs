//! LINE webhook payload types and event extraction.
//!
//! Translates transport-specific webhook events into the simple
//! `(line user id, text)` shape the orchestrator consumes. Non-text message
//! types are rendered as bracketed placeholders.

use serde::Deserialize;

/// Top-level webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Bot user id the events are destined for.
    #[serde(default)]
    pub destination: Option<String>,
    /// Events in delivery order.
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// A single webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event type ("message", "follow", "unfollow", ...).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event source.
    #[serde(default)]
    pub source: Option<EventSource>,
    /// Message body for message events.
    #[serde(default)]
    pub message: Option<MessagePayload>,
}

/// Source of an event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSource {
    /// Sending user's platform id.
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

/// Message body of a message event.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    /// Message type ("text", "image", "sticker", ...).
    #[serde(rename = "type")]
    pub message_type: String,
    /// Text content for text messages.
    #[serde(default)]
    pub text: Option<String>,
}

/// A webhook event reduced to what the orchestrator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A user turn: platform id plus text (placeholder for non-text media).
    Message { user_id: String, text: String },
    /// The user added the bot; triggers the welcome menu.
    Follow { user_id: String },
}

/// Extracts orchestrator-ready events from a webhook payload.
///
/// Events without a user id (group sources, unsupported types) are dropped.
pub fn extract_events(payload: &WebhookPayload) -> Vec<InboundEvent> {
    payload
        .events
        .iter()
        .filter_map(|event| {
            let user_id = event.source.as_ref()?.user_id.clone()?;
            match event.event_type.as_str() {
                "message" => {
                    let message = event.message.as_ref()?;
                    let text = match message.message_type.as_str() {
                        "text" => message.text.clone()?,
                        other => format!("[{}]", other),
                    };
                    Some(InboundEvent::Message { user_id, text })
                }
                "follow" => Some(InboundEvent::Follow { user_id }),
                _ => None,
            }
        })
        .collect()
}
