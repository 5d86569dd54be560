use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::VisionConfig;

const DESCRIBE_PROMPT: &str = "You are a film editor. Give a detailed visual and audio description of the video with accurate timestamps.";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("Failed to read video {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Description service returned error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Description service request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Description service returned no text")]
    EmptyResponse,
}

/// Produces the free-text description stored alongside the main video
#[async_trait::async_trait]
pub trait ContentDescriber: Send + Sync {
    async fn describe(&self, video_path: &Path) -> Result<String, DescribeError>;
}

/// Gemini `generateContent` with the whole clip sent inline
pub struct GeminiDescriber {
    http: Client,
    config: VisionConfig,
}

impl GeminiDescriber {
    pub fn new(config: VisionConfig) -> Result<Self, DescribeError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

#[async_trait::async_trait]
impl ContentDescriber for GeminiDescriber {
    async fn describe(&self, video_path: &Path) -> Result<String, DescribeError> {
        let bytes = tokio::fs::read(video_path)
            .await
            .map_err(|source| DescribeError::Io {
                path: video_path.to_path_buf(),
                source,
            })?;
        info!("Describing {:?} ({} bytes)", video_path, bytes.len());

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::Text {
                        text: DESCRIBE_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "video/mp4".to_string(),
                            data: BASE64_STANDARD.encode(&bytes),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: 2048 * 16,
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorWrapper>(&body)
                .ok()
                .and_then(|wrapper| {
                    let msg = wrapper.error.message?;
                    Some(match wrapper.error.status {
                        Some(s) if !s.is_empty() => format!("{}: {}", s, msg),
                        _ => msg,
                    })
                })
                .unwrap_or(body);
            return Err(DescribeError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
            .ok_or(DescribeError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn describer(base_url: String) -> GeminiDescriber {
        GeminiDescriber::new(VisionConfig {
            base_url,
            api_key: "gem-key".to_string(),
            model: "gemini-test".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_description_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gemini-test:generateContent"))
            .and(query_param("key", "gem-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json", "topK": 40}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "{\"00:00\": \"a cat\"}"}]}}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("main_video.mp4");
        std::fs::write(&video, b"fake mp4 bytes").unwrap();

        let text = describer(server.uri()).describe(&video).await.unwrap();
        assert_eq!(text, "{\"00:00\": \"a cat\"}");
    }

    #[tokio::test]
    async fn unreadable_file_is_an_io_error_without_a_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        let err = describer(server.uri()).describe(&missing).await.unwrap_err();
        assert!(matches!(err, DescribeError::Io { .. }));
    }

    #[tokio::test]
    async fn provider_errors_carry_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("main_video.mp4");
        std::fs::write(&video, b"x").unwrap();

        let err = describer(server.uri()).describe(&video).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Description service returned error 400: INVALID_ARGUMENT: API key not valid"
        );
    }
}
