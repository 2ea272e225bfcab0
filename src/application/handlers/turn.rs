//! Turn handler - the conversation orchestration state machine.
//!
//! Consumes one inbound user message, applies the dialog state machine,
//! optionally calls the completion provider, and records the exchange with
//! usage accounting. Expected flow outcomes (invalid selection, unparsed
//! confirmation) are ordinary replies, never errors; errors are reserved for
//! store failures and caller-supplied bad ids.

use std::sync::Arc;
use thiserror::Error;

use crate::domain::catalog::{self, replies, CategoryCatalog, ConfirmReply};
use crate::domain::conversation::{Conversation, DialogState, Message, MessageKind};
use crate::domain::foundation::{
    ConversationId, LineUserId, StateMachine, ValidationError,
};
use crate::ports::{
    AIError, AIProvider, ChatMessage, CompletionRequest, ConversationStore, MessageRole,
    StoreError, TokenUsage,
};

/// Tunables for turn processing.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Model recorded on newly created conversations.
    pub default_model: String,
    /// Context window size over message history.
    pub max_history: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            default_model: "gpt-3.5-turbo".to_string(),
            max_history: 20,
        }
    }
}

/// Command for one inbound user turn.
#[derive(Debug, Clone)]
pub struct TurnCommand {
    /// The sending user's platform id.
    pub line_user_id: LineUserId,
    /// Display name from the platform, if known.
    pub display_name: Option<String>,
    /// The user's message text.
    pub text: String,
    /// Explicit conversation to address; the active one is resolved
    /// (or created) when absent.
    pub conversation_id: Option<ConversationId>,
}

impl TurnCommand {
    /// Creates a command addressing the user's active conversation.
    pub fn new(line_user_id: LineUserId, text: impl Into<String>) -> Self {
        Self {
            line_user_id,
            display_name: None,
            text: text.into(),
            conversation_id: None,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Addresses an explicit conversation.
    pub fn with_conversation_id(mut self, id: ConversationId) -> Self {
        self.conversation_id = Some(id);
        self
    }
}

/// Usage metadata for a turn that reached generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUsage {
    /// Token counts for the exchange.
    pub usage: TokenUsage,
    /// Model that produced the reply.
    pub model: String,
    /// Wall-clock generation time in milliseconds.
    pub processing_time_ms: u64,
}

/// Result of a processed turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Reply text to deliver to the user.
    pub reply: String,
    /// The conversation the turn was recorded against.
    pub conversation_id: ConversationId,
    /// Usage metadata; empty for non-generative turns and fallbacks.
    pub usage: Option<TurnUsage>,
}

/// Errors that escalate out of a turn.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Message content is empty or whitespace only.
    #[error("message content cannot be empty")]
    EmptyMessage,

    /// The caller-supplied conversation id does not resolve.
    #[error("conversation not found: {0}")]
    ConversationNotFound(ConversationId),

    /// A state transition outside the machine's rules was attempted.
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] ValidationError),

    /// Store failure on the critical path.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Handler for inbound user turns.
///
/// Constructed once with its collaborators; no hidden process-wide state.
pub struct TurnHandler {
    store: Arc<dyn ConversationStore>,
    provider: Arc<dyn AIProvider>,
    catalog: Arc<CategoryCatalog>,
    settings: TurnSettings,
}

impl TurnHandler {
    /// Creates a new handler with the given dependencies.
    pub fn new(
        store: Arc<dyn ConversationStore>,
        provider: Arc<dyn AIProvider>,
        catalog: Arc<CategoryCatalog>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            store,
            provider,
            catalog,
            settings,
        }
    }

    /// Returns the catalog this handler serves.
    pub fn catalog(&self) -> &CategoryCatalog {
        &self.catalog
    }

    /// Processes one inbound user turn.
    #[tracing::instrument(skip(self, cmd), fields(line_user_id = %cmd.line_user_id))]
    pub async fn handle(&self, cmd: TurnCommand) -> Result<TurnResult, TurnError> {
        let text = cmd.text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let user = self
            .store
            .get_or_create_user(&cmd.line_user_id, cmd.display_name.as_deref())
            .await?;

        let conversation = match cmd.conversation_id {
            Some(id) => self
                .store
                .find_conversation(id)
                .await?
                .ok_or(TurnError::ConversationNotFound(id))?,
            None => match self.store.find_active_conversation(user.id).await? {
                Some(conversation) => conversation,
                None => {
                    self.store
                        .create_conversation(user.id, None, &self.settings.default_model)
                        .await?
                }
            },
        };

        // The inbound message is always recorded first; history is never
        // lost even if generation fails below.
        self.store
            .append_message(conversation.id, MessageKind::User, text, None, None)
            .await?;

        // Reset escapes to the menu from every state.
        if catalog::is_reset_keyword(text) {
            self.store.reset(conversation.id).await?;
            return Ok(TurnResult {
                reply: replies::reset_message(&self.catalog),
                conversation_id: conversation.id,
                usage: None,
            });
        }

        let (reply, usage) = match conversation.state {
            DialogState::Initial => (self.handle_initial(&conversation, text).await?, None),
            DialogState::CategoryConfirmation => {
                self.handle_confirmation(&conversation, text).await?
            }
            DialogState::Conversation => self.handle_dialogue(&conversation).await?,
            DialogState::Unknown => (self.handle_unknown(&conversation).await?, None),
        };

        // Aggregate stats refresh is best-effort: a failure here never
        // aborts an otherwise-successful turn.
        if usage.is_some() {
            if let Err(err) = self.store.refresh_activity(conversation.id).await {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %err,
                    "stats refresh failed"
                );
            }
        }

        Ok(TurnResult {
            reply,
            conversation_id: conversation.id,
            usage,
        })
    }

    /// Initial state: the text is a numbered category selection.
    async fn handle_initial(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<String, TurnError> {
        match self.catalog.select(text) {
            Some(category) => {
                let next = conversation
                    .state
                    .transition_to(DialogState::CategoryConfirmation)?;
                self.store
                    .set_category(conversation.id, Some(&category.key))
                    .await?;
                self.store.set_state(conversation.id, next).await?;
                Ok(replies::category_confirmation(category))
            }
            None => Ok(replies::invalid_selection(&self.catalog)),
        }
    }

    /// Confirmation state: the text is a yes/no reply.
    async fn handle_confirmation(
        &self,
        conversation: &Conversation,
        text: &str,
    ) -> Result<(String, Option<TurnUsage>), TurnError> {
        match catalog::parse_confirmation(text) {
            ConfirmReply::Yes => {
                // The transition is unconditional; a generation failure
                // below does not roll it back.
                let next = conversation.state.transition_to(DialogState::Conversation)?;
                self.store.set_state(conversation.id, next).await?;

                let category = conversation
                    .category_key
                    .as_ref()
                    .and_then(|key| self.catalog.by_key(key));
                let Some(category) = category else {
                    tracing::warn!(
                        conversation_id = %conversation.id,
                        "confirmed conversation has no resolvable category"
                    );
                    return Ok((replies::FALLBACK_OPENING.to_string(), None));
                };

                let request = CompletionRequest::new()
                    .with_system_prompt(replies::opening_system_prompt(category))
                    .with_message(MessageRole::User, replies::OPENING_USER_TURN)
                    .with_model(&conversation.ai_model);
                self.generate_and_store(conversation, request).await
            }
            ConfirmReply::No => {
                let next = conversation.state.transition_to(DialogState::Initial)?;
                self.store.set_category(conversation.id, None).await?;
                self.store.set_state(conversation.id, next).await?;
                Ok((replies::reset_message(&self.catalog), None))
            }
            ConfirmReply::Unrecognized => Ok((replies::invalid_confirmation(), None)),
        }
    }

    /// Dialogue state: generate over the bounded context window.
    ///
    /// The just-persisted inbound message is the window's final entry, so
    /// the assembled context is (system prompt, history, current message).
    async fn handle_dialogue(
        &self,
        conversation: &Conversation,
    ) -> Result<(String, Option<TurnUsage>), TurnError> {
        let history = self
            .store
            .recent_messages(conversation.id, self.settings.max_history)
            .await?;

        let system_prompt = conversation
            .category_key
            .as_ref()
            .and_then(|key| self.catalog.by_key(key))
            .map(|category| category.prompt_template.clone())
            // Defensive: dialogue without a category falls back to a
            // generic assistant prompt.
            .unwrap_or_else(|| replies::GENERIC_SYSTEM_PROMPT.to_string());

        let request = CompletionRequest::new()
            .with_system_prompt(system_prompt)
            .with_messages(build_context(&history))
            .with_model(&conversation.ai_model);
        self.generate_and_store(conversation, request).await
    }

    /// Unknown state: recover to the menu.
    async fn handle_unknown(&self, conversation: &Conversation) -> Result<String, TurnError> {
        let next = conversation.state.transition_to(DialogState::Initial)?;
        self.store.set_state(conversation.id, next).await?;
        Ok(replies::reset_message(&self.catalog))
    }

    /// Calls the provider and persists the reply.
    ///
    /// Provider failures are converted into user-safe fallback replies; the
    /// turn continues with whatever state it already reached.
    async fn generate_and_store(
        &self,
        conversation: &Conversation,
        request: CompletionRequest,
    ) -> Result<(String, Option<TurnUsage>), TurnError> {
        match self.provider.complete(request).await {
            Ok(response) => {
                self.store
                    .append_message(
                        conversation.id,
                        MessageKind::Assistant,
                        &response.content,
                        Some(response.usage.total_tokens as i32),
                        Some(response.processing_time_ms as i32),
                    )
                    .await?;

                let usage = TurnUsage {
                    usage: response.usage,
                    model: response.model,
                    processing_time_ms: response.processing_time_ms,
                };
                Ok((response.content, Some(usage)))
            }
            Err(err) => {
                tracing::warn!(
                    conversation_id = %conversation.id,
                    error = %err,
                    "completion failed, replying with fallback"
                );
                Ok((fallback_reply(&err).to_string(), None))
            }
        }
    }
}

/// Maps message history into provider context, oldest first.
fn build_context(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|message| {
            let role = match message.kind {
                MessageKind::User => MessageRole::User,
                MessageKind::Assistant => MessageRole::Assistant,
            };
            ChatMessage::new(role, &message.content)
        })
        .collect()
}

/// User-safe fallback reply per provider error kind.
///
/// The raw error is logged, never shown to the user.
fn fallback_reply(err: &AIError) -> &'static str {
    match err {
        AIError::RateLimited { .. } => "抱歉，目前服務使用量較高，請稍後再試。",
        AIError::Timeout { .. } => "抱歉，服務回應時間過長，請稍後再試。",
        AIError::Connection(_) => "抱歉，網路連接出現問題，請檢查網路後再試。",
        AIError::AuthenticationFailed | AIError::PermissionDenied => {
            "抱歉，服務認證出現問題，請聯繫管理員。"
        }
        AIError::Provider(_) => "抱歉，服務暫時無法使用，請稍後再試。",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockAIProvider, MockError};
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::conversation::ConversationStatus;

    fn line_id(s: &str) -> LineUserId {
        LineUserId::new(s).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        provider: Arc<MockAIProvider>,
        handler: TurnHandler,
    }

    fn fixture(provider: MockAIProvider) -> Fixture {
        fixture_with_settings(provider, TurnSettings::default())
    }

    fn fixture_with_settings(provider: MockAIProvider, settings: TurnSettings) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(provider);
        let handler = TurnHandler::new(
            store.clone(),
            provider.clone(),
            Arc::new(CategoryCatalog::builtin()),
            settings,
        );
        Fixture {
            store,
            provider,
            handler,
        }
    }

    impl Fixture {
        async fn turn(&self, text: &str) -> TurnResult {
            self.handler
                .handle(TurnCommand::new(line_id("U1"), text))
                .await
                .unwrap()
        }

        async fn state_of(&self, conversation_id: ConversationId) -> DialogState {
            self.store.conversation(conversation_id).unwrap().state
        }
    }

    mod resolution {
        use super::*;

        #[tokio::test]
        async fn first_turn_creates_user_and_initial_conversation() {
            let f = fixture(MockAIProvider::new());
            let result = f.turn("hello").await;

            let conversation = f.store.conversation(result.conversation_id).unwrap();
            assert_eq!(conversation.status, ConversationStatus::Active);
            assert!(f
                .store
                .find_user(&line_id("U1"))
                .await
                .unwrap()
                .is_some());
        }

        #[tokio::test]
        async fn turns_reuse_the_active_conversation() {
            let f = fixture(MockAIProvider::new());
            let first = f.turn("hello").await;
            let second = f.turn("again").await;
            assert_eq!(first.conversation_id, second.conversation_id);
        }

        #[tokio::test]
        async fn unknown_conversation_id_escalates() {
            let f = fixture(MockAIProvider::new());
            let missing = ConversationId::new();
            let result = f
                .handler
                .handle(TurnCommand::new(line_id("U1"), "hi").with_conversation_id(missing))
                .await;
            assert!(matches!(result, Err(TurnError::ConversationNotFound(id)) if id == missing));
        }

        #[tokio::test]
        async fn empty_message_is_rejected() {
            let f = fixture(MockAIProvider::new());
            let result = f.handler.handle(TurnCommand::new(line_id("U1"), "  \n ")).await;
            assert!(matches!(result, Err(TurnError::EmptyMessage)));
        }

        #[tokio::test]
        async fn every_turn_appends_exactly_one_user_message() {
            let f = fixture(MockAIProvider::new());
            let result = f.turn("not a number").await;

            let messages = f.store.messages_for(result.conversation_id);
            assert_eq!(messages.len(), 1);
            assert!(messages[0].is_user());
            assert_eq!(messages[0].content, "not a number");
        }
    }

    mod initial_state {
        use super::*;

        #[tokio::test]
        async fn valid_selection_moves_to_confirmation() {
            let f = fixture(MockAIProvider::new());
            let result = f.turn("3").await;

            assert_eq!(
                f.state_of(result.conversation_id).await,
                DialogState::CategoryConfirmation
            );
            let conversation = f.store.conversation(result.conversation_id).unwrap();
            assert_eq!(
                conversation.category_key.as_ref().unwrap().as_str(),
                "learning"
            );
            assert!(result.reply.contains("學習成長"));
            assert!(result.usage.is_none());
            assert_eq!(f.provider.call_count(), 0);
        }

        #[tokio::test]
        async fn selection_tolerates_surrounding_whitespace() {
            let f = fixture(MockAIProvider::new());
            let result = f.turn("  1  ").await;
            assert_eq!(
                f.state_of(result.conversation_id).await,
                DialogState::CategoryConfirmation
            );
        }

        #[tokio::test]
        async fn invalid_selection_stays_in_initial_with_no_generation() {
            let f = fixture(MockAIProvider::new());
            for input in ["abc", "0", "6", "99", "2.5", "3x", "-1"] {
                let result = f.turn(input).await;
                assert_eq!(
                    f.state_of(result.conversation_id).await,
                    DialogState::Initial,
                    "input {:?} must keep state",
                    input
                );
                assert!(result.reply.contains("1-5"), "input {:?}", input);
                assert!(result.usage.is_none());
            }
            assert_eq!(f.provider.call_count(), 0);
        }
    }

    mod confirmation_state {
        use super::*;

        async fn select_category(f: &Fixture) -> ConversationId {
            f.turn("1").await.conversation_id
        }

        #[tokio::test]
        async fn yes_transitions_and_generates_exactly_once() {
            let f = fixture(MockAIProvider::new().with_response("歡迎！想聊聊哪方面的問題？"));
            let conversation_id = select_category(&f).await;

            let result = f.turn("是").await;

            assert_eq!(f.state_of(conversation_id).await, DialogState::Conversation);
            assert_eq!(f.provider.call_count(), 1);
            assert_eq!(result.reply, "歡迎！想聊聊哪方面的問題？");
            assert!(result.usage.is_some());

            // Opening call uses the canned opener turn and the category prompt.
            let call = &f.provider.calls()[0];
            assert_eq!(call.messages.len(), 1);
            assert_eq!(call.messages[0].content, replies::OPENING_USER_TURN);
            assert!(call.system_prompt.as_ref().unwrap().contains("職涯發展"));
        }

        #[tokio::test]
        async fn yes_persists_assistant_message_with_usage() {
            let f = fixture(MockAIProvider::new().with_response("哈囉"));
            let conversation_id = select_category(&f).await;
            f.turn("yes").await;

            let messages = f.store.messages_for(conversation_id);
            let assistant: Vec<_> = messages.iter().filter(|m| m.is_assistant()).collect();
            assert_eq!(assistant.len(), 1);
            assert_eq!(assistant[0].tokens_used, Some(30));
        }

        #[tokio::test]
        async fn no_clears_category_and_returns_menu() {
            let f = fixture(MockAIProvider::new());
            let conversation_id = select_category(&f).await;

            let result = f.turn("否").await;

            assert_eq!(f.state_of(conversation_id).await, DialogState::Initial);
            let conversation = f.store.conversation(conversation_id).unwrap();
            assert!(conversation.category_key.is_none());
            assert!(result.reply.contains("請選擇你想討論的問題類型"));
            assert_eq!(f.provider.call_count(), 0);
        }

        #[tokio::test]
        async fn unrecognized_reply_keeps_waiting() {
            let f = fixture(MockAIProvider::new());
            let conversation_id = select_category(&f).await;

            let result = f.turn("maybe").await;

            assert_eq!(
                f.state_of(conversation_id).await,
                DialogState::CategoryConfirmation
            );
            assert_eq!(result.reply, replies::invalid_confirmation());
            assert_eq!(f.provider.call_count(), 0);
        }

        #[tokio::test]
        async fn provider_failure_keeps_the_unconditional_transition() {
            let f = fixture(
                MockAIProvider::new().with_error(MockError::Timeout { timeout_secs: 30 }),
            );
            let conversation_id = select_category(&f).await;

            let result = f.turn("是").await;

            // The yes-transition already happened; only the opening reply
            // is replaced with a fallback.
            assert_eq!(f.state_of(conversation_id).await, DialogState::Conversation);
            assert_eq!(result.reply, "抱歉，服務回應時間過長，請稍後再試。");
            assert!(result.usage.is_none());
            assert!(f
                .store
                .messages_for(conversation_id)
                .iter()
                .all(|m| m.is_user()));
        }
    }

    mod dialogue_state {
        use super::*;

        async fn reach_dialogue(f: &Fixture) -> ConversationId {
            let id = f.turn("2").await.conversation_id;
            f.turn("是").await;
            id
        }

        #[tokio::test]
        async fn generates_with_category_prompt_over_history() {
            let f = fixture(
                MockAIProvider::new()
                    .with_response("開場")
                    .with_response("聽起來不容易，可以多說一點嗎？"),
            );
            let conversation_id = reach_dialogue(&f).await;

            let result = f.turn("我和同事處得不好").await;

            assert_eq!(result.reply, "聽起來不容易，可以多說一點嗎？");
            assert_eq!(f.state_of(conversation_id).await, DialogState::Conversation);
            assert_eq!(f.provider.call_count(), 2);

            let call = &f.provider.calls()[1];
            assert!(call
                .system_prompt
                .as_ref()
                .unwrap()
                .contains("人際關係顧問"));
            // Context ends with the current user message.
            assert_eq!(
                call.messages.last().unwrap().content,
                "我和同事處得不好"
            );
        }

        #[tokio::test]
        async fn history_window_is_bounded() {
            let settings = TurnSettings {
                max_history: 3,
                ..TurnSettings::default()
            };
            let f = fixture_with_settings(MockAIProvider::new(), settings);
            let _ = reach_dialogue(&f).await;

            for text in ["一", "二", "三", "四"] {
                f.turn(text).await;
            }

            let last_call = f.provider.calls().pop().unwrap();
            assert_eq!(last_call.messages.len(), 3);
            assert_eq!(last_call.messages.last().unwrap().content, "四");
        }

        #[tokio::test]
        async fn timeout_leaves_state_and_history_intact() {
            let f = fixture(
                MockAIProvider::new()
                    .with_response("開場")
                    .with_error(MockError::Timeout { timeout_secs: 30 }),
            );
            let conversation_id = reach_dialogue(&f).await;
            let messages_before = f.store.messages_for(conversation_id).len();

            let result = f.turn("還在嗎？").await;

            assert_eq!(result.reply, "抱歉，服務回應時間過長，請稍後再試。");
            assert!(result.usage.is_none());
            assert_eq!(f.state_of(conversation_id).await, DialogState::Conversation);

            // The user message was persisted, no assistant message was.
            let messages = f.store.messages_for(conversation_id);
            assert_eq!(messages.len(), messages_before + 1);
            assert!(messages.last().unwrap().is_user());
        }

        #[tokio::test]
        async fn each_error_kind_maps_to_its_fallback() {
            let cases = [
                (
                    MockError::RateLimited { retry_after_secs: 7 },
                    "抱歉，目前服務使用量較高，請稍後再試。",
                ),
                (
                    MockError::Connection { message: "reset".into() },
                    "抱歉，網路連接出現問題，請檢查網路後再試。",
                ),
                (
                    MockError::AuthenticationFailed,
                    "抱歉，服務認證出現問題，請聯繫管理員。",
                ),
                (
                    MockError::PermissionDenied,
                    "抱歉，服務認證出現問題，請聯繫管理員。",
                ),
                (
                    MockError::Provider { message: "boom".into() },
                    "抱歉，服務暫時無法使用，請稍後再試。",
                ),
            ];

            for (error, expected) in cases {
                let f = fixture(
                    MockAIProvider::new().with_response("開場").with_error(error),
                );
                reach_dialogue(&f).await;
                let result = f.turn("hello").await;
                assert_eq!(result.reply, expected);
            }
        }

        #[tokio::test]
        async fn missing_category_falls_back_to_generic_prompt() {
            let f = fixture(MockAIProvider::new().with_response("好的"));
            let conversation_id = f.turn("hello").await.conversation_id;

            // Force the defensive combination directly through the store.
            f.store
                .set_state(conversation_id, DialogState::Conversation)
                .await
                .unwrap();

            f.turn("隨便聊聊").await;

            let call = f.provider.calls().pop().unwrap();
            assert_eq!(
                call.system_prompt.as_deref(),
                Some(replies::GENERIC_SYSTEM_PROMPT)
            );
        }
    }

    mod reset {
        use super::*;

        #[tokio::test]
        async fn reset_escapes_from_every_state() {
            for setup in ["initial", "confirmation", "dialogue"] {
                let f = fixture(MockAIProvider::new().with_response("開場"));
                let conversation_id = match setup {
                    "initial" => f.turn("hello").await.conversation_id,
                    "confirmation" => f.turn("1").await.conversation_id,
                    _ => {
                        let id = f.turn("1").await.conversation_id;
                        f.turn("是").await;
                        id
                    }
                };

                let result = f.turn("重置").await;

                let conversation = f.store.conversation(conversation_id).unwrap();
                assert_eq!(conversation.status, ConversationStatus::Reset, "from {}", setup);
                assert_eq!(conversation.state, DialogState::Initial);
                assert!(conversation.category_key.is_none());
                assert_eq!(conversation.message_count, 0);
                assert_eq!(conversation.total_tokens, 0);
                assert!(result.reply.contains("重新開始"));
                assert!(result.usage.is_none());
            }
        }

        #[tokio::test]
        async fn english_reset_keyword_works_mid_dialogue() {
            let f = fixture(MockAIProvider::new().with_response("開場"));
            f.turn("1").await;
            f.turn("是").await;

            let result = f.turn("RESET").await;
            assert!(result.reply.contains("請選擇你想討論的問題類型"));
            assert_eq!(f.provider.call_count(), 1);
        }

        #[tokio::test]
        async fn next_turn_after_reset_starts_a_fresh_conversation() {
            let f = fixture(MockAIProvider::new());
            let first = f.turn("hello").await.conversation_id;
            f.turn("重置").await;

            let next = f.turn("1").await;
            assert_ne!(next.conversation_id, first);
            assert_eq!(
                f.state_of(next.conversation_id).await,
                DialogState::CategoryConfirmation
            );
        }
    }

    mod unknown_state {
        use super::*;

        #[tokio::test]
        async fn recovers_to_initial_with_menu_and_no_generation() {
            let f = fixture(MockAIProvider::new());
            let conversation_id = f.turn("hello").await.conversation_id;
            f.store
                .set_state(conversation_id, DialogState::Unknown)
                .await
                .unwrap();

            let result = f.turn("anything").await;

            assert_eq!(f.state_of(conversation_id).await, DialogState::Initial);
            assert!(result.reply.contains("請選擇你想討論的問題類型"));
            assert_eq!(f.provider.call_count(), 0);
        }
    }

    mod scenarios {
        use super::*;

        #[tokio::test]
        async fn full_guided_walkthrough() {
            let f = fixture(
                MockAIProvider::new()
                    .with_response("你好！我是你的學習規劃顧問。")
                    .with_response("建議先從基礎開始。"),
            );

            // "3" selects the third category.
            let selected = f.turn("3").await;
            assert!(selected.reply.contains("學習成長"));

            // "是" confirms and produces the opening reply.
            let opened = f.turn("是").await;
            assert_eq!(opened.reply, "你好！我是你的學習規劃顧問。");
            assert_eq!(opened.usage.as_ref().unwrap().usage.total_tokens, 30);

            // Free-form dialogue.
            let replied = f.turn("我想學程式設計").await;
            assert_eq!(replied.reply, "建議先從基礎開始。");

            // "重置" escapes back to the menu.
            let reset = f.turn("重置").await;
            assert!(reset.reply.contains("請選擇"));

            let conversation = f.store.conversation(selected.conversation_id).unwrap();
            assert_eq!(conversation.total_tokens, 0);
        }
    }
}
