use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use engine::{
    artifact_file_name, ExecutionAttempt, ExhaustReason, LoopOutcome, PlanRequest, RepairReport,
    OUTPUT_FILE,
};
use tracing::{info, warn};

use crate::planner::Planner;
use crate::runner::CodeRunner;

/// Runs generated code and asks the planner to patch it until it runs,
/// bounded by `max_attempts` regardless of what the planner returns.
pub struct RepairLoop {
    runner: Arc<dyn CodeRunner>,
    planner: Arc<dyn Planner>,
    workdir: PathBuf,
    max_attempts: u32,
    error_tail_bytes: usize,
}

impl RepairLoop {
    pub fn new(
        runner: Arc<dyn CodeRunner>,
        planner: Arc<dyn Planner>,
        workdir: PathBuf,
        max_attempts: u32,
        error_tail_bytes: usize,
    ) -> Self {
        RepairLoop {
            runner,
            planner,
            workdir,
            max_attempts: max_attempts.max(1),
            error_tail_bytes,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `context` is the request that produced `initial_code`; repairs reuse
    /// its library, description, assets and history.
    pub async fn run(&self, initial_code: &str, context: &PlanRequest) -> RepairReport {
        let mut attempts = Vec::new();
        let mut code = initial_code.to_string();
        let mut number = 1;

        loop {
            info!("Attempt {}/{} to run generated code", number, self.max_attempts);
            let result = self.execute(&code, context).await;

            let error = match result {
                Ok(artifact) => {
                    attempts.push(ExecutionAttempt {
                        number,
                        code,
                        success: true,
                        error: None,
                    });
                    let outcome = match artifact {
                        Some(artifact) => {
                            info!("Edit produced {:?}", artifact);
                            LoopOutcome::Succeeded { artifact }
                        }
                        None => {
                            info!("Code ran cleanly but wrote no {}", OUTPUT_FILE);
                            LoopOutcome::SoftSuccess
                        }
                    };
                    return RepairReport { outcome, attempts };
                }
                Err(error) => error,
            };

            warn!("Attempt {} failed: {}", number, error);
            attempts.push(ExecutionAttempt {
                number,
                code: code.clone(),
                success: false,
                error: Some(error.clone()),
            });

            if number >= self.max_attempts {
                return RepairReport {
                    outcome: LoopOutcome::Exhausted {
                        last_error: error,
                        reason: ExhaustReason::AttemptsSpent,
                    },
                    attempts,
                };
            }

            let repair = self.planner.plan(&context.repair(&code, &error)).await;
            match repair.editing_code.filter(|fixed| !fixed.trim().is_empty()) {
                Some(fixed) => code = fixed,
                None => {
                    warn!("Repair request returned no code, giving up after attempt {}", number);
                    return RepairReport {
                        outcome: LoopOutcome::Exhausted {
                            last_error: error,
                            reason: ExhaustReason::NoRepairCode,
                        },
                        attempts,
                    };
                }
            }
            number += 1;
        }
    }

    /// One attempt. `Ok(None)` is a clean exit without an output video.
    async fn execute(&self, code: &str, context: &PlanRequest) -> Result<Option<PathBuf>, String> {
        let output_path = self.workdir.join(OUTPUT_FILE);
        // A leftover from an earlier attempt must not pass for this attempt's output
        remove_stale(&output_path).await?;

        let output = self
            .runner
            .run(&self.workdir, code, &context.assets)
            .await
            .map_err(|e| e.to_string())?;
        if !output.success {
            return Err(output.error_text(self.error_tail_bytes));
        }

        let produced = tokio::fs::try_exists(&output_path)
            .await
            .map_err(|e| format!("Failed to check for {:?}: {}", output_path, e))?;
        if !produced {
            return Ok(None);
        }

        let artifact = self.workdir.join(artifact_file_name(Utc::now()));
        tokio::fs::rename(&output_path, &artifact)
            .await
            .map_err(|e| format!("Failed to rename {:?} to {:?}: {}", output_path, artifact, e))?;
        Ok(Some(artifact))
    }
}

async fn remove_stale(path: &Path) -> Result<(), String> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            warn!("Removed stale {:?} before running", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("Failed to clear {:?}: {}", path, e)),
    }
}
