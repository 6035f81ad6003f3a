use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod chat;

/// Build the HTTP application with all routes wired to shared state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/chat", post(chat::chat))
        .with_state(state)
}
