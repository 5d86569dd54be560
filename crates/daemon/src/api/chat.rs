use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::{error_response, ApiError};
use crate::orchestrator::assistant::{Assistant, ChatReply};

#[derive(Deserialize)]
pub struct ChatRequest {
    message: String,
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .with_state(assistant)
}

async fn chat(
    State(assistant): State<Arc<Assistant>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    assistant
        .chat(&req.message)
        .await
        .map(Json)
        .map_err(error_response)
}
