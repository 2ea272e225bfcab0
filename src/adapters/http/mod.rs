//! HTTP adapter - axum surface for the webhook and admin operations.

mod dto;
mod handlers;
mod routes;

pub use handlers::{ApiError, AppState};
pub use routes::{app_router, line_routes};
