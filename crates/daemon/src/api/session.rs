use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, put},
    Router,
};
use engine::{AssetManifest, ConversationTurn, EditingLibrary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::ApiError;
use crate::orchestrator::assistant::Assistant;

#[derive(Serialize)]
pub struct SessionResponse {
    library: EditingLibrary,
    libraries: Vec<EditingLibrary>,
    assets: AssetManifest,
    description: String,
    has_description: bool,
    history: Vec<ConversationTurn>,
    current_output: Option<PathBuf>,
    last_code: Option<String>,
}

#[derive(Deserialize)]
pub struct LibraryRequest {
    library: String,
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route("/", get(get_session))
        .route("/library", put(set_library))
        .with_state(assistant)
}

async fn get_session(State(assistant): State<Arc<Assistant>>) -> Json<SessionResponse> {
    let session = assistant.snapshot().await;
    Json(SessionResponse {
        library: session.library(),
        libraries: EditingLibrary::ALL.to_vec(),
        assets: session.assets().clone(),
        description: session.description().to_string(),
        has_description: session.has_description(),
        history: session.history().to_vec(),
        current_output: session.current_output().map(PathBuf::from),
        last_code: session.last_code().map(str::to_string),
    })
}

async fn set_library(
    State(assistant): State<Arc<Assistant>>,
    Json(req): Json<LibraryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let library: EditingLibrary = req
        .library
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))))?;
    assistant.set_library(library).await;
    Ok(Json(json!({ "library": library })))
}
