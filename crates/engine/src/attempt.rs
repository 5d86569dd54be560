use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One execution of a candidate script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    /// 1-based
    pub number: u32,
    pub code: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustReason {
    /// Every allowed attempt failed
    AttemptsSpent,
    /// A repair request came back without code
    NoRepairCode,
}

/// Terminal state of the execute-repair loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopOutcome {
    Succeeded { artifact: PathBuf },
    /// The script exited cleanly but left no output video behind
    SoftSuccess,
    Exhausted {
        last_error: String,
        reason: ExhaustReason,
    },
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, LoopOutcome::Exhausted { .. })
    }

    pub fn artifact(&self) -> Option<&PathBuf> {
        match self {
            LoopOutcome::Succeeded { artifact } => Some(artifact),
            _ => None,
        }
    }

    /// User-facing summary line
    pub fn summary(&self) -> &'static str {
        match self {
            LoopOutcome::Succeeded { .. } => "Edit applied successfully!",
            LoopOutcome::SoftSuccess => "Code executed successfully (no video output).",
            LoopOutcome::Exhausted { .. } => {
                "Error occurred during editing. Please clarify your request."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairReport {
    pub outcome: LoopOutcome,
    pub attempts: Vec<ExecutionAttempt>,
}

impl RepairReport {
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// One warning per failed attempt, in order
    pub fn warnings(&self) -> Vec<String> {
        self.attempts
            .iter()
            .filter(|a| !a.success)
            .map(|a| {
                format!(
                    "Attempt {} failed: {}",
                    a.number,
                    a.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect()
    }
}
