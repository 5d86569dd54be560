use std::path::{Path, PathBuf};
use std::sync::Arc;

use engine::{
    is_valid_asset_name, ConversationTurn, EditingLibrary, LoopOutcome, RepairReport, MAIN_VIDEO,
};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::media::{MediaInfo, MediaProber, ProbeError};
use crate::orchestrator::repair::RepairLoop;
use crate::orchestrator::session::Session;
use crate::planner::Planner;
use crate::vision::ContentDescriber;

/// Directory, relative to the work directory, holding uploaded assets
pub const UPLOAD_DIR: &str = "uploads";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Upload a main video before requesting edits")]
    NoMainVideo,

    #[error("Invalid asset name {0:?}")]
    InvalidAssetName(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Uploaded file is not a readable video: {0}")]
    UnreadableUpload(String),

    #[error("Failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

impl AssistantError {
    /// Caused by what the user sent rather than by the host
    pub fn is_input_error(&self) -> bool {
        !matches!(self, AssistantError::Storage(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DescriptionStatus {
    Generated,
    AlreadyPresent,
    Failed { error: String },
    NotRequested,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub name: String,
    pub path: String,
    pub size_bytes: u64,
    /// `None` when the probe tool is not installed
    pub media: Option<MediaInfo>,
    pub description: DescriptionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    pub summary: String,
    pub warnings: Vec<String>,
    pub report: RepairReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub reason: Option<String>,
    pub required_libs: Option<Vec<String>>,
    pub execution: Option<ExecutionSummary>,
    pub preview: Option<PathBuf>,
}

/// Drives the session. Every action holds the session lock until it has
/// fully completed, so actions never interleave and the scratch script and
/// output path are only ever used by one run.
pub struct Assistant {
    session: Mutex<Session>,
    describer: Arc<dyn ContentDescriber>,
    prober: Arc<dyn MediaProber>,
    planner: Arc<dyn Planner>,
    repair: RepairLoop,
    workdir: PathBuf,
}

impl Assistant {
    pub fn new(
        describer: Arc<dyn ContentDescriber>,
        prober: Arc<dyn MediaProber>,
        planner: Arc<dyn Planner>,
        repair: RepairLoop,
        workdir: PathBuf,
    ) -> Self {
        Assistant {
            session: Mutex::new(Session::new()),
            describer,
            prober,
            planner,
            repair,
            workdir,
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub async fn snapshot(&self) -> Session {
        self.session.lock().await.clone()
    }

    pub async fn set_library(&self, library: EditingLibrary) {
        info!("Editing library set to {}", library);
        self.session.lock().await.set_library(library);
    }

    /// Absolute path of the video to preview, if any
    pub async fn preview_path(&self) -> Option<PathBuf> {
        let session = self.session.lock().await;
        session.preview_path().map(|p| self.resolve(&p))
    }

    /// Store an uploaded asset. The bytes are probed before they replace
    /// anything, and a file without a video stream is rejected. For the main
    /// video, also generate the content description unless one already exists.
    pub async fn upload(&self, name: &str, bytes: &[u8]) -> Result<UploadResult, AssistantError> {
        if !is_valid_asset_name(name) {
            return Err(AssistantError::InvalidAssetName(name.to_string()));
        }
        if bytes.is_empty() {
            return Err(AssistantError::EmptyUpload);
        }

        let mut session = self.session.lock().await;

        let relative = format!("{}/{}.mp4", UPLOAD_DIR, name);
        let absolute = self.workdir.join(&relative);
        // Asset names carry no dots, so this never collides with a stored asset
        let staging = self.workdir.join(format!("{}/.{}.partial.mp4", UPLOAD_DIR, name));
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&staging, bytes).await?;

        let media = match self.prober.probe(&staging).await {
            Ok(info) => Some(info),
            Err(ProbeError::Unavailable { program, source }) => {
                warn!("Cannot probe uploads ({}: {}), storing {} unchecked", program, source, name);
                None
            }
            Err(ProbeError::Unreadable(reason)) => {
                if let Err(e) = tokio::fs::remove_file(&staging).await {
                    warn!("Failed to remove {:?}: {}", staging, e);
                }
                return Err(AssistantError::UnreadableUpload(reason));
            }
        };

        tokio::fs::rename(&staging, &absolute).await?;
        session.add_asset(name, relative.clone());
        info!("Stored asset {} at {:?} ({} bytes)", name, absolute, bytes.len());

        let description = if name != MAIN_VIDEO {
            DescriptionStatus::NotRequested
        } else if session.has_description() {
            DescriptionStatus::AlreadyPresent
        } else {
            match self.describer.describe(&absolute).await {
                Ok(text) => {
                    session.set_description(text);
                    DescriptionStatus::Generated
                }
                Err(e) => {
                    warn!("Video analysis failed: {}", e);
                    DescriptionStatus::Failed {
                        error: e.to_string(),
                    }
                }
            }
        };

        Ok(UploadResult {
            name: name.to_string(),
            path: relative,
            size_bytes: bytes.len() as u64,
            media,
            description,
        })
    }

    /// Handle one chat message end to end: plan, run any code, update the preview
    pub async fn chat(&self, message: &str) -> Result<ChatReply, AssistantError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(AssistantError::EmptyMessage);
        }

        let mut session = self.session.lock().await;
        if session.assets().main_video().is_none() {
            return Err(AssistantError::NoMainVideo);
        }

        // Prior turns only; the new message travels as the request's user message
        let request = session.plan_request(message);
        session.append_turn(ConversationTurn::user(message));

        let response = self.planner.plan(&request).await;
        session.append_turn(ConversationTurn::assistant(
            response.message.clone(),
            response.reason.clone(),
        ));

        let execution = match response.code() {
            Some(code) => {
                session.set_last_code(code.to_string());
                // Repairs see this exchange too, so they know what the code is for
                let context = session.plan_request(message);
                let report = self.repair.run(code, &context).await;

                if let Some(last) = report.attempts.last() {
                    session.set_last_code(last.code.clone());
                }
                if let LoopOutcome::Succeeded { artifact } = &report.outcome {
                    session.set_current_output(artifact.clone());
                }

                Some(ExecutionSummary {
                    summary: report.outcome.summary().to_string(),
                    warnings: report.warnings(),
                    report,
                })
            }
            None => None,
        };

        let preview = session.preview_path().map(|p| self.resolve(&p));
        Ok(ChatReply {
            message: response.message,
            reason: response.reason,
            required_libs: response.required_libs,
            execution,
            preview,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() {
            self.workdir.join(path)
        } else {
            path.to_path_buf()
        }
    }
}
