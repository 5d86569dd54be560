use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use super::{MediaInfo, MediaProber, ProbeError};

/// Runs `ffprobe` and requires at least one video stream
pub struct Ffprobe {
    program: String,
}

impl Ffprobe {
    pub fn new(program: impl Into<String>) -> Self {
        Ffprobe {
            program: program.into(),
        }
    }
}

impl Default for Ffprobe {
    fn default() -> Self {
        Ffprobe::new("ffprobe")
    }
}

#[async_trait::async_trait]
impl MediaProber for Ffprobe {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ProbeError> {
        let output = Command::new(&self.program)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type,width,height,avg_frame_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|source| ProbeError::Unavailable {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(ProbeError::Unreadable(if stderr.is_empty() {
                format!("{} rejected the file", self.program)
            } else {
                stderr.to_string()
            }));
        }

        debug!("Probed {:?}", path);
        parse_probe_output(&output.stdout)
    }
}

#[derive(Deserialize)]
struct ProbeReport {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

/// Interpret `ffprobe -of json` output. A file without a video stream is unreadable.
pub fn parse_probe_output(stdout: &[u8]) -> Result<MediaInfo, ProbeError> {
    let report: ProbeReport = serde_json::from_slice(stdout)
        .map_err(|e| ProbeError::Unreadable(format!("Unexpected probe output: {}", e)))?;

    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ProbeError::Unreadable("File has no video stream".to_string()))?;

    Ok(MediaInfo {
        duration_seconds: report
            .format
            .and_then(|f| f.duration)
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0),
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        frame_rate: video.avg_frame_rate.as_deref().and_then(frame_rate),
        has_audio: report
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// "30000/1001" -> 29.97; "0/0" (unknown) -> None
fn frame_rate(ratio: &str) -> Option<f64> {
    let (num, den) = ratio.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    (den > 0.0 && num > 0.0).then(|| num / den)
}
