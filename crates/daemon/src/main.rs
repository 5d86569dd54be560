use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod api;
mod config;
mod llm;
mod media;
mod orchestrator;
mod planner;
mod runner;
mod vision;

use crate::config::Config;
use crate::llm::OpenAiCompatClient;
use crate::media::Ffprobe;
use crate::orchestrator::assistant::Assistant;
use crate::orchestrator::repair::RepairLoop;
use crate::planner::EditPlanner;
use crate::runner::{Interpreter, ProcessRunner};
use crate::vision::GeminiDescriber;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn app(assistant: Arc<Assistant>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(assistant))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the variables may come from the environment
    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    std::fs::create_dir_all(&config.workdir)?;
    info!("Working directory: {:?}", config.workdir);

    let chat = Arc::new(OpenAiCompatClient::new(config.chat.clone())?);
    let planner = Arc::new(EditPlanner::new(chat));
    let describer = Arc::new(GeminiDescriber::new(config.vision.clone())?);
    let runner = Arc::new(ProcessRunner::new(
        Interpreter::python(config.execution.python.clone()),
        config.execution.timeout,
    ));
    let repair = RepairLoop::new(
        runner,
        planner.clone(),
        config.workdir.clone(),
        config.execution.max_attempts,
        config.execution.error_tail_bytes,
    );
    info!(
        "Generated code runs via {} with up to {} attempts",
        config.execution.python,
        repair.max_attempts()
    );
    warn!("Generated code is executed without sandboxing, with this process's privileges");

    let assistant = Arc::new(Assistant::new(
        describer,
        Arc::new(Ffprobe::default()),
        planner,
        repair,
        config.workdir.clone(),
    ));

    info!("Starting promptcut on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app(assistant)).await?;

    Ok(())
}
