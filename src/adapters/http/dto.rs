//! HTTP DTOs.
//!
//! Decouple the HTTP surface from domain types so the API can evolve
//! independently.

use serde::Serialize;

/// Acknowledgement for a processed webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    /// Number of events processed.
    pub processed: usize,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub provider: String,
    pub model: String,
}

/// Result of an administrative reset.
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    /// True if an active conversation was reset.
    pub reset: bool,
}

/// Result of a welcome/menu resend.
#[derive(Debug, Clone, Serialize)]
pub struct WelcomeResponse {
    pub sent: bool,
}

/// Error body for failed requests.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
