use axum::{http::StatusCode, response::Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::orchestrator::assistant::{Assistant, AssistantError};

pub mod chat;
pub mod media;
pub mod session;

pub type ApiError = (StatusCode, Json<Value>);

pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new().nest("/session", {
        Router::new()
            .merge(session::router(assistant.clone()))
            .merge(media::router(assistant.clone()))
            .merge(chat::router(assistant))
    })
}

/// Input problems are the caller's to fix (400); anything else is ours (500)
pub(crate) fn error_response(err: AssistantError) -> ApiError {
    let status = if err.is_input_error() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!("Request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": err.to_string() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaInfo, MediaProber, ProbeError};
    use crate::orchestrator::repair::RepairLoop;
    use crate::planner::Planner;
    use crate::runner::{Interpreter, ProcessRunner};
    use crate::vision::{ContentDescriber, DescribeError};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use engine::{PlanRequest, PlannerResponse};
    use std::path::Path;
    use std::time::Duration;
    use tower::ServiceExt;

    struct FixedDescriber;

    #[async_trait::async_trait]
    impl ContentDescriber for FixedDescriber {
        async fn describe(&self, _video_path: &Path) -> Result<String, DescribeError> {
            Ok("a cat on a sofa".to_string())
        }
    }

    /// Accepts anything except bodies starting with "garbage"
    struct StubProber;

    #[async_trait::async_trait]
    impl MediaProber for StubProber {
        async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
            if std::fs::read(path).unwrap().starts_with(b"garbage") {
                return Err(ProbeError::Unreadable("File has no video stream".to_string()));
            }
            Ok(MediaInfo {
                duration_seconds: 1.0,
                width: 320,
                height: 240,
                frame_rate: Some(30.0),
                has_audio: true,
            })
        }
    }

    struct WritesOutputPlanner;

    #[async_trait::async_trait]
    impl Planner for WritesOutputPlanner {
        async fn plan(&self, _request: &PlanRequest) -> PlannerResponse {
            PlannerResponse {
                message: "Done.".to_string(),
                editing_code: Some("printf 'edited' > output.mp4\n".to_string()),
                required_libs: Some(vec!["moviepy".to_string()]),
                reason: Some("Applied the edit.".to_string()),
            }
        }
    }

    fn test_app(workdir: &Path) -> Router {
        let planner = Arc::new(WritesOutputPlanner);
        let runner = Arc::new(ProcessRunner::new(
            Interpreter::new("sh"),
            Duration::from_secs(10),
        ));
        let repair = RepairLoop::new(runner, planner.clone(), workdir.to_path_buf(), 2, 4096);
        let assistant = Arc::new(Assistant::new(
            Arc::new(FixedDescriber),
            Arc::new(StubProber),
            planner,
            repair,
            workdir.to_path_buf(),
        ));
        crate::app(assistant)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn chat_request(message: &str) -> Request<Body> {
        Request::post("/api/session/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "message": message }).to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["ok"], true);
    }

    #[tokio::test]
    async fn chat_before_upload_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path())
            .oneshot(chat_request("make it black and white"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("main video"));
    }

    #[tokio::test]
    async fn unknown_library_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path())
            .oneshot(
                Request::put("/api/session/library")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"library": "OpenCV"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreadable_upload_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = test_app(dir.path())
            .oneshot(
                Request::put("/api/session/assets/main_video")
                    .body(Body::from("garbage, not a video"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"]
            .as_str()
            .unwrap()
            .contains("not a readable video"));
    }

    #[tokio::test]
    async fn upload_chat_and_preview_flow() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let response = app
            .clone()
            .oneshot(
                Request::put("/api/session/assets/main_video")
                    .body(Body::from("raw video bytes"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let upload = json_body(response).await;
        assert_eq!(upload["path"], "uploads/main_video.mp4");
        assert_eq!(upload["description"]["status"], "generated");
        assert_eq!(upload["media"]["width"], 320);

        let response = app
            .clone()
            .oneshot(
                Request::put("/api/session/library")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"library": "Movis"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(chat_request("make it black and white"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply = json_body(response).await;
        assert_eq!(reply["message"], "Done.");
        assert_eq!(reply["execution"]["report"]["outcome"]["status"], "succeeded");

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/session/preview")
                    .header(header::RANGE, "bytes=0-3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers()[header::CONTENT_RANGE],
            "bytes 0-3/6"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"edit");

        let response = app
            .oneshot(Request::get("/api/session").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let session = json_body(response).await;
        assert_eq!(session["library"], "Movis");
        assert_eq!(session["description"], "a cat on a sofa");
        assert_eq!(session["history"].as_array().unwrap().len(), 2);
        assert!(session["current_output"].as_str().is_some());
    }
}
