use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name the schema is registered under in `response_format`
pub const SCHEMA_NAME: &str = "ai_response";

pub const FALLBACK_REASON: &str =
    "System could not complete the request, needs user clarification.";

/// Structured reply of the edit planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannerResponse {
    pub message: String,
    #[serde(default)]
    pub editing_code: Option<String>,
    #[serde(default)]
    pub required_libs: Option<Vec<String>>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PlannerResponse {
    /// Message-only reply used whenever a well-formed response could not be obtained
    pub fn fallback(error: impl std::fmt::Display) -> Self {
        PlannerResponse {
            message: format!("Sorry, I failed. Error: {}", error),
            editing_code: None,
            required_libs: None,
            reason: Some(FALLBACK_REASON.to_string()),
        }
    }

    /// Parse raw model output and enforce the schema contract
    pub fn from_model_output(text: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(text.trim()).map_err(|e| format!("invalid JSON: {}", e))?;
        if !value.is_object() {
            return Err("response is not a JSON object".to_string());
        }
        let response: PlannerResponse = serde_json::from_value(value)
            .map_err(|e| format!("response does not match schema: {}", e))?;
        response.validated()
    }

    fn validated(self) -> Result<Self, String> {
        if self.message.trim().is_empty() {
            return Err("response has an empty message".to_string());
        }
        Ok(self.normalized())
    }

    /// Blank code counts as no code; libraries only make sense alongside code
    pub fn normalized(mut self) -> Self {
        if self
            .editing_code
            .as_deref()
            .map_or(false, |code| code.trim().is_empty())
        {
            self.editing_code = None;
        }
        if self.editing_code.is_none() {
            self.required_libs = None;
        }
        if self.reason.as_deref().map_or(false, |r| r.trim().is_empty()) {
            self.reason = None;
        }
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.editing_code.as_deref()
    }

    pub fn is_fallback(&self) -> bool {
        self.editing_code.is_none() && self.reason.as_deref() == Some(FALLBACK_REASON)
    }

    /// JSON Schema used for schema-constrained decoding
    pub fn json_schema() -> Value {
        let nullable = |title: &str, inner: Value| {
            json!({
                "anyOf": [inner, { "type": "null" }],
                "default": null,
                "title": title,
            })
        };
        json!({
            "title": "AIResponse",
            "type": "object",
            "properties": {
                "message": { "title": "Message", "type": "string" },
                "editing_code": nullable("Editing Code", json!({ "type": "string" })),
                "required_libs": nullable(
                    "Required Libs",
                    json!({ "type": "array", "items": { "type": "string" } }),
                ),
                "reason": nullable("Reason", json!({ "type": "string" })),
            },
            "required": ["message"],
        })
    }
}
