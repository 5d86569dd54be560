pub mod ffprobe;

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use ffprobe::Ffprobe;

/// Stream facts about an uploaded video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    pub has_audio: bool,
}

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe tool itself could not run; says nothing about the file
    #[error("Failed to launch {program}: {source}")]
    Unavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Unreadable(String),
}

/// Seam over media inspection of uploads
#[async_trait::async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError>;
}
