//! Axum routes for the LINE bot surface.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use super::handlers::{
    conversation_summary, health, line_webhook, reset_conversation, send_welcome, user_stats,
    AppState,
};

/// Creates the LINE bot routes.
///
/// Endpoints:
/// - POST /api/line/webhook - inbound delivery events
/// - GET  /api/line/health - service health
/// - GET  /api/line/user/:line_user_id/stats - usage statistics
/// - GET  /api/line/user/:line_user_id/summary - active conversation snapshot
/// - POST /api/line/user/:line_user_id/welcome - resend the category menu
/// - POST /api/line/user/:line_user_id/reset - administrative reset
pub fn line_routes() -> Router<AppState> {
    Router::new()
        .route("/line/webhook", post(line_webhook))
        .route("/line/health", get(health))
        .route("/line/user/:line_user_id/stats", get(user_stats))
        .route("/line/user/:line_user_id/summary", get(conversation_summary))
        .route("/line/user/:line_user_id/welcome", post(send_welcome))
        .route("/line/user/:line_user_id/reset", post(reset_conversation))
}

/// Combined router with all routes under /api plus request tracing.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", line_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_routes_creates_valid_router() {
        let _routes = line_routes();
    }
}
