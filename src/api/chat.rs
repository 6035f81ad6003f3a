//! POST /chat: the single conversational entry point.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::agent::router;
use crate::models::{ChatRequest, ChatResponse};
use crate::state::AppState;

/// Handle one chat turn. Pipeline failures are logged with full detail and
/// reduced to their designed user-facing message in the response body.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<serde_json::Value>)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "query must not be empty"})),
        ));
    }

    tracing::info!("Chat query: {query}");

    match router::answer(&state, query).await {
        Ok(response) => Ok(Json(ChatResponse { response })),
        Err(e) => {
            tracing::error!(error = ?e, "Chat request failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.user_message()})),
            ))
        }
    }
}
