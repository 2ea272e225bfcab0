//! AI provider port - interface for LLM completion providers.
//!
//! Abstracts all interaction with the completion provider so the
//! orchestrator can generate replies without coupling to a specific API.
//! Message ordering is preserved exactly as given; chronological assembly
//! is the caller's responsibility.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for AI/LLM completion providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Generates a single completion for the given request.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError>;

    /// Estimates the token count of a text.
    ///
    /// A cheap heuristic for cost estimation, never used for truncation
    /// decisions that affect correctness.
    fn estimate_tokens(&self, text: &str) -> u32 {
        approximate_tokens(text)
    }

    /// Returns provider information (name, default model).
    fn provider_info(&self) -> ProviderInfo;
}

/// Default sampling temperature when the caller does not override it.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Ordered conversation messages (history + current user message).
    pub messages: Vec<ChatMessage>,
    /// System prompt guiding model behavior.
    pub system_prompt: Option<String>,
    /// Model override; the provider's default model applies when absent.
    pub model: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Creates an empty request with default parameters.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            model: None,
            max_tokens: None,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Appends a message to the conversation.
    pub fn with_message(mut self, role: MessageRole, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::new(role, content));
        self
    }

    /// Appends already-assembled messages, preserving their order.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets a model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

impl Default for CompletionRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// A role-tagged message sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent this message.
    pub role: MessageRole,
    /// Message content.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new message.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// Response from a completion call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated content.
    pub content: String,
    /// Token usage for the exchange.
    pub usage: TokenUsage,
    /// Model that generated the response.
    pub model: String,
    /// Wall-clock time spent in the provider call, in milliseconds.
    pub processing_time_ms: u64,
    /// Why the model stopped generating.
    pub finish_reason: FinishReason,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion).
    pub total_tokens: u32,
}

impl TokenUsage {
    /// Creates new token usage.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Creates zero usage.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop (end of response).
    Stop,
    /// Hit max_tokens limit.
    Length,
    /// Content was filtered for safety.
    ContentFilter,
}

/// Provider information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "openai").
    pub name: String,
    /// Default model identifier.
    pub model: String,
}

impl ProviderInfo {
    /// Creates new provider info.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Provider errors.
///
/// All of these are transient to the turn: the orchestrator converts them
/// into a user-safe fallback reply and continues without advancing state.
#[derive(Debug, thiserror::Error)]
pub enum AIError {
    /// Rate limited by the provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Request exceeded the configured timeout.
    #[error("request timed out after {timeout_secs}s")]
    Timeout {
        /// Configured timeout.
        timeout_secs: u32,
    },

    /// Network-level failure reaching the provider.
    #[error("connection error: {0}")]
    Connection(String),

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The credential lacks access to the requested resource.
    #[error("permission denied")]
    PermissionDenied,

    /// Any other provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),
}

impl AIError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a generic provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Returns true if an immediate retry of the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AIError::Connection(_) | AIError::Provider(_))
    }
}

/// Estimates the token count of a text.
///
/// CJK characters average roughly one token per 2.5 characters, everything
/// else roughly one per 4. Minimum result is 1.
pub fn approximate_tokens(text: &str) -> u32 {
    let cjk_chars = text
        .chars()
        .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
        .count();
    let other_chars = text.chars().count() - cjk_chars;

    let estimate = (cjk_chars as f64 / 2.5 + other_chars as f64 / 4.0) as u32;
    estimate.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn request_builder_collects_parameters() {
        let request = CompletionRequest::new()
            .with_system_prompt("扮演顧問")
            .with_message(MessageRole::User, "你好")
            .with_model("gpt-4o")
            .with_max_tokens(256)
            .with_temperature(0.2);

        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, MessageRole::User);
        assert_eq!(request.system_prompt.as_deref(), Some("扮演顧問"));
        assert_eq!(request.model.as_deref(), Some("gpt-4o"));
        assert_eq!(request.max_tokens, Some(256));
        assert_eq!(request.temperature, 0.2);
    }

    #[test]
    fn request_defaults_to_standard_temperature() {
        assert_eq!(CompletionRequest::new().temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn with_messages_preserves_order() {
        let request = CompletionRequest::new().with_messages(vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("second"),
            ChatMessage::user("third"),
        ]);
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::User]
        );
        assert_eq!(request.messages[2].content, "third");
    }

    #[test]
    fn token_usage_computes_total() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(TokenUsage::zero().total_tokens, 0);
    }

    #[test]
    fn message_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"assistant\""
        );
        assert_eq!(serde_json::to_string(&MessageRole::System).unwrap(), "\"system\"");
    }

    #[test]
    fn retryable_classification() {
        assert!(AIError::connection("reset by peer").is_retryable());
        assert!(AIError::provider("502 bad gateway").is_retryable());

        assert!(!AIError::RateLimited { retry_after_secs: 30 }.is_retryable());
        assert!(!AIError::Timeout { timeout_secs: 60 }.is_retryable());
        assert!(!AIError::AuthenticationFailed.is_retryable());
        assert!(!AIError::PermissionDenied.is_retryable());
    }

    #[test]
    fn approximate_tokens_has_floor_of_one() {
        assert_eq!(approximate_tokens(""), 1);
        assert_eq!(approximate_tokens("a"), 1);
    }

    #[test]
    fn approximate_tokens_weighs_cjk_heavier() {
        // 10 CJK chars -> 4 tokens, 10 ASCII chars -> 2 tokens.
        assert_eq!(approximate_tokens("這是一段共有十個字元喔"), 4);
        assert_eq!(approximate_tokens("abcdefghij"), 2);
    }

    #[test]
    fn approximate_tokens_mixes_scripts() {
        // 5 CJK (2 tokens) + 8 ASCII (2 tokens).
        let text = "你好嗎今天 hello ok";
        assert_eq!(approximate_tokens(text), 4);
    }

    proptest! {
        #[test]
        fn approximate_tokens_is_at_least_one(text in ".*") {
            prop_assert!(approximate_tokens(&text) >= 1);
        }

        #[test]
        fn approximate_tokens_monotone_in_ascii_length(len in 0usize..2000) {
            let shorter = "x".repeat(len);
            let longer = "x".repeat(len + 40);
            prop_assert!(approximate_tokens(&longer) >= approximate_tokens(&shorter));
        }

        #[test]
        fn approximate_tokens_monotone_in_cjk_length(len in 0usize..500) {
            let shorter = "字".repeat(len);
            let longer = "字".repeat(len + 10);
            prop_assert!(approximate_tokens(&longer) >= approximate_tokens(&shorter));
        }
    }
}
