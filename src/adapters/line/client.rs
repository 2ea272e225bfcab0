//! Outbound push client for the LINE Messaging API.

use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Serialize;
use std::time::Duration;

use super::WebhookError;

/// Push client over the LINE Messaging API.
pub struct LinePushClient {
    http: Client,
    access_token: Secret<String>,
    base_url: String,
}

impl LinePushClient {
    /// Creates a new push client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(access_token: Secret<String>) -> Result<Self, WebhookError> {
        Self::with_base_url(access_token, "https://api.line.me")
    }

    /// Creates a push client against a custom API host (tests).
    pub fn with_base_url(
        access_token: Secret<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, WebhookError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WebhookError::Delivery(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            access_token,
            base_url: base_url.into(),
        })
    }

    /// Pushes a plain text message to a user.
    ///
    /// # Errors
    ///
    /// Returns `Delivery` if the request fails or the API rejects it.
    pub async fn push_text(&self, line_user_id: &str, text: &str) -> Result<(), WebhookError> {
        let request = PushRequest {
            to: line_user_id,
            messages: vec![OutboundMessage {
                message_type: "text",
                text,
            }],
        };

        let response = self
            .http
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.access_token.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| WebhookError::Delivery(format!("push request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WebhookError::Delivery(format!(
                "push rejected with {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<OutboundMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'a str,
    text: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_request_serializes_to_line_shape() {
        let request = PushRequest {
            to: "U123",
            messages: vec![OutboundMessage {
                message_type: "text",
                text: "哈囉",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["to"], "U123");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "哈囉");
    }
}
