use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fixed path, relative to the work directory, that generated code writes to
pub const OUTPUT_FILE: &str = "output.mp4";

/// Single scratch location for the script under execution
pub const SCRIPT_FILE: &str = "generated_edit.py";

/// Unique, time-ordered name for a finished artifact.
/// The random suffix keeps names distinct within the same millisecond.
pub fn artifact_file_name(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "output_{}_{}.mp4",
        now.format("%Y%m%d_%H%M%S_%3f"),
        &suffix[..8]
    )
}
