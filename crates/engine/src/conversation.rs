use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Short rationale shown next to assistant replies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ConversationTurn {
            role: Role::User,
            content: content.into(),
            reason: None,
        }
    }

    pub fn assistant(content: impl Into<String>, reason: Option<String>) -> Self {
        ConversationTurn {
            role: Role::Assistant,
            content: content.into(),
            reason,
        }
    }
}
