//! HTTP handlers connecting axum routes to application operations.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::adapters::line::{
    extract_events, InboundEvent, LinePushClient, LineSignatureVerifier, WebhookPayload,
};
use crate::application::handlers::{StatisticsError, StatisticsHandler, TurnCommand, TurnHandler};
use crate::domain::catalog::replies;
use crate::domain::foundation::LineUserId;
use crate::ports::{AIProvider, ConversationStore};

use super::dto::{ErrorResponse, HealthResponse, ResetResponse, WebhookAck, WelcomeResponse};

/// Shared application state for the HTTP surface.
#[derive(Clone)]
pub struct AppState {
    pub turn_handler: Arc<TurnHandler>,
    pub statistics: Arc<StatisticsHandler>,
    pub store: Arc<dyn ConversationStore>,
    pub provider: Arc<dyn AIProvider>,
    pub push_client: Arc<LinePushClient>,
    pub verifier: Arc<LineSignatureVerifier>,
}

/// API error with status mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<StatisticsError> for ApiError {
    fn from(err: StatisticsError) -> Self {
        match err {
            StatisticsError::UserNotFound(id) => ApiError::NotFound(format!("user not found: {}", id)),
            StatisticsError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

fn parse_line_user_id(raw: &str) -> Result<LineUserId, ApiError> {
    LineUserId::new(raw).map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// POST /api/line/webhook - inbound delivery events.
///
/// Verifies the signature over the raw body, extracts user turns, runs
/// each through the orchestrator, and pushes replies back. Per-event
/// failures are logged and do not fail the delivery.
pub async fn line_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get("x-line-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing x-line-signature header".to_string()))?;

    state
        .verifier
        .verify(&body, signature)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook payload: {}", e)))?;

    let mut processed = 0;
    for event in extract_events(&payload) {
        match event {
            InboundEvent::Message { user_id, text } => {
                let line_user_id = match LineUserId::new(user_id) {
                    Ok(id) => id,
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping event with bad user id");
                        continue;
                    }
                };

                match state
                    .turn_handler
                    .handle(TurnCommand::new(line_user_id.clone(), text))
                    .await
                {
                    Ok(result) => {
                        processed += 1;
                        if let Err(err) = state
                            .push_client
                            .push_text(line_user_id.as_str(), &result.reply)
                            .await
                        {
                            tracing::error!(error = %err, "failed to push reply");
                        }
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "turn processing failed");
                    }
                }
            }
            InboundEvent::Follow { user_id } => {
                processed += 1;
                let menu = replies::menu(state.turn_handler.catalog());
                if let Err(err) = state.push_client.push_text(&user_id, &menu).await {
                    tracing::error!(error = %err, "failed to push welcome menu");
                }
            }
        }
    }

    Ok(Json(WebhookAck { processed }))
}

/// GET /api/line/health - service health and provider identity.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let info = state.provider.provider_info();
    Json(HealthResponse {
        status: "ok",
        provider: info.name,
        model: info.model,
    })
}

/// GET /api/line/user/:line_user_id/stats - usage statistics.
pub async fn user_stats(
    State(state): State<AppState>,
    Path(line_user_id): Path<String>,
) -> Result<Response, ApiError> {
    let line_user_id = parse_line_user_id(&line_user_id)?;
    let stats = state.statistics.usage_statistics(&line_user_id).await?;
    Ok(Json(stats).into_response())
}

/// GET /api/line/user/:line_user_id/summary - active conversation snapshot.
pub async fn conversation_summary(
    State(state): State<AppState>,
    Path(line_user_id): Path<String>,
) -> Result<Response, ApiError> {
    let line_user_id = parse_line_user_id(&line_user_id)?;
    let summary = state
        .statistics
        .conversation_summary(&line_user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("no active conversation".to_string()))?;
    Ok(Json(summary).into_response())
}

/// POST /api/line/user/:line_user_id/welcome - resend the category menu.
pub async fn send_welcome(
    State(state): State<AppState>,
    Path(line_user_id): Path<String>,
) -> Result<Json<WelcomeResponse>, ApiError> {
    let line_user_id = parse_line_user_id(&line_user_id)?;
    let menu = replies::menu(state.turn_handler.catalog());
    state
        .push_client
        .push_text(line_user_id.as_str(), &menu)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(WelcomeResponse { sent: true }))
}

/// POST /api/line/user/:line_user_id/reset - administrative reset.
pub async fn reset_conversation(
    State(state): State<AppState>,
    Path(line_user_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let line_user_id = parse_line_user_id(&line_user_id)?;

    let user = state
        .store
        .find_user(&line_user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("user not found: {}", line_user_id)))?;

    let Some(conversation) = state
        .store
        .find_active_conversation(user.id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
    else {
        return Ok(Json(ResetResponse { reset: false }));
    };

    state
        .store
        .reset(conversation.id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let menu = replies::reset_message(state.turn_handler.catalog());
    if let Err(err) = state.push_client.push_text(line_user_id.as_str(), &menu).await {
        tracing::warn!(error = %err, "reset succeeded but menu push failed");
    }

    Ok(Json(ResetResponse { reset: true }))
}
