use std::sync::Arc;

use engine::{PlanRequest, PlannerResponse, SCHEMA_NAME};
use tracing::{info, warn};

use crate::llm::{ChatCompletion, ChatMessage, ChatRequest};

/// Low temperature: identical requests should yield near-identical edits
const TEMPERATURE: f32 = 0.1;
const TOP_P: f32 = 1.0;

/// Turns a request into a planner response. Implementations never fail;
/// problems come back as a fallback response.
#[async_trait::async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlanRequest) -> PlannerResponse;
}

pub struct EditPlanner {
    chat: Arc<dyn ChatCompletion>,
}

impl EditPlanner {
    pub fn new(chat: Arc<dyn ChatCompletion>) -> Self {
        EditPlanner { chat }
    }

    async fn try_plan(&self, request: &PlanRequest) -> Result<PlannerResponse, String> {
        request.validate()?;

        let chat_request = build_chat_request(request);
        let content = self
            .chat
            .complete(&chat_request)
            .await
            .map_err(|e| e.to_string())?;
        PlannerResponse::from_model_output(&content)
    }
}

#[async_trait::async_trait]
impl Planner for EditPlanner {
    async fn plan(&self, request: &PlanRequest) -> PlannerResponse {
        match self.try_plan(request).await {
            Ok(response) => {
                if let Some(code) = response.code() {
                    let literal = request.assets.hardcoded_paths(code);
                    if !literal.is_empty() {
                        warn!("Generated code hardcodes asset paths {:?}", literal);
                    }
                }
                info!(
                    "Planner replied (code: {}, libs: {:?})",
                    response.code().is_some(),
                    response.required_libs
                );
                response
            }
            Err(e) => {
                warn!("Planning failed, returning fallback: {}", e);
                PlannerResponse::fallback(e)
            }
        }
    }
}

/// System prompt, prior turns, then the new user message
pub fn build_chat_request(request: &PlanRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    messages.push(ChatMessage::new("system", request.system_prompt()));
    messages.extend(
        request
            .history
            .iter()
            .map(|turn| ChatMessage::new(turn.role.as_str(), turn.content.clone())),
    );
    messages.push(ChatMessage::new("user", request.user_message.clone()));

    ChatRequest {
        messages,
        schema_name: SCHEMA_NAME.to_string(),
        schema: PlannerResponse::json_schema(),
        temperature: TEMPERATURE,
        top_p: TOP_P,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use engine::{AssetManifest, ConversationTurn, EditingLibrary, MAIN_VIDEO};
    use std::sync::Mutex;

    /// Replays canned results and records what it was asked
    struct ScriptedChat {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(ScriptedChat {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatCompletion for ScriptedChat {
        async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(LlmError::EmptyResponse)
            } else {
                replies.remove(0)
            }
        }
    }

    fn request() -> PlanRequest {
        let mut assets = AssetManifest::new();
        assets.insert(MAIN_VIDEO, "uploads/main_video.mp4");
        PlanRequest {
            library: EditingLibrary::MoviePy,
            user_message: "make it black and white".to_string(),
            description: "A cat on a sofa.".to_string(),
            assets,
            history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn black_and_white_request_goes_through_assets() {
        let reply = serde_json::json!({
            "message": "Converted to black and white.",
            "editing_code": "from moviepy.editor import VideoFileClip\nimport moviepy.video.fx.all as vfx\nclip = VideoFileClip(assets[\"main_video\"])\nclip.fx(vfx.blackwhite).write_videofile(\"output.mp4\")\n",
            "required_libs": ["moviepy"],
            "reason": "Simple grayscale filter."
        });
        let chat = ScriptedChat::new(vec![Ok(reply.to_string())]);
        let planner = EditPlanner::new(chat.clone());

        let resp = planner.plan(&request()).await;
        let code = resp.code().expect("code expected");
        assert!(code.contains("assets[\"main_video\"]"));
        assert!(request().assets.hardcoded_paths(code).is_empty());

        let seen = chat.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.schema_name, "ai_response");
        assert_eq!(sent.temperature, TEMPERATURE);
        assert_eq!(sent.messages.len(), 2);
        assert_eq!(sent.messages[0].role, "system");
        assert!(sent.messages[0].content.contains("uploads/main_video.mp4"));
        assert!(sent.messages[0].content.contains("assets[\"main_video\"]"));
        assert_eq!(sent.messages[1].content, "make it black and white");
    }

    #[tokio::test]
    async fn history_sits_between_system_and_user() {
        let chat = ScriptedChat::new(vec![Ok(r#"{"message":"ok"}"#.to_string())]);
        let planner = EditPlanner::new(chat.clone());

        let mut req = request();
        req.history = vec![
            ConversationTurn::user("trim the start"),
            ConversationTurn::assistant("Trimmed.", Some("asked".to_string())),
        ];
        planner.plan(&req).await;

        let seen = chat.seen.lock().unwrap();
        let roles: Vec<_> = seen[0].messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[tokio::test]
    async fn never_fails_on_service_problems() {
        let chat = ScriptedChat::new(vec![
            Err(LlmError::Status {
                status: 504,
                body: "gateway timeout".to_string(),
            }),
            Ok("{not json".to_string()),
            Ok(r#"{"editing_code": "print(1)"}"#.to_string()),
            Ok(r#"{"message": ["wrong", "type"]}"#.to_string()),
            Err(LlmError::EmptyResponse),
        ]);
        let planner = EditPlanner::new(chat);

        for _ in 0..5 {
            let resp = planner.plan(&request()).await;
            assert!(resp.is_fallback(), "expected fallback, got {:?}", resp);
            assert!(resp.message.starts_with("Sorry, I failed. Error:"));
            assert!(resp.code().is_none());
            assert!(resp.required_libs.is_none());
        }
    }

    #[tokio::test]
    async fn precondition_violations_skip_the_service() {
        let chat = ScriptedChat::new(vec![Ok(r#"{"message":"ok"}"#.to_string())]);
        let planner = EditPlanner::new(chat.clone());

        let mut no_video = request();
        no_video.assets = AssetManifest::new();
        let resp = planner.plan(&no_video).await;
        assert!(resp.is_fallback());
        assert!(resp.message.contains("no main video"));

        let mut blank = request();
        blank.user_message = String::new();
        assert!(planner.plan(&blank).await.is_fallback());

        assert!(chat.seen.lock().unwrap().is_empty());
    }
}
