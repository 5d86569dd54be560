use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use engine::{AssetManifest, SCRIPT_FILE};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable carrying the asset manifest as a JSON object
pub const ASSETS_ENV: &str = "PROMPTCUT_ASSETS";

/// Runs the staged script as `__main__` with `assets` predefined, so the
/// file on disk holds exactly the generated code.
const PYTHON_LAUNCHER: &str = r#"import json, os, runpy, sys
script = sys.argv[1]
sys.argv = sys.argv[1:]
assets = json.loads(os.environ.get("PROMPTCUT_ASSETS", "{}"))
runpy.run_path(script, init_globals={"assets": assets}, run_name="__main__")
"#;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to stage script at {path:?}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Program and leading arguments; the script path is appended last
#[derive(Debug, Clone)]
pub struct Interpreter {
    pub program: String,
    pub args: Vec<String>,
}

impl Interpreter {
    pub fn new(program: impl Into<String>) -> Self {
        Interpreter {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn python(program: impl Into<String>) -> Self {
        Interpreter {
            program: program.into(),
            args: vec!["-c".to_string(), PYTHON_LAUNCHER.to_string()],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    /// `None` when the process was killed by a signal or by the deadline
    pub exit_code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Raw diagnostic text for a failed run, stderr trimmed to its last `tail_bytes`
    pub fn error_text(&self, tail_bytes: usize) -> String {
        let headline = if self.timed_out {
            "Process timed out and was killed".to_string()
        } else {
            match self.exit_code {
                Some(code) => format!("Process exited with status {}", code),
                None => "Process was terminated by a signal".to_string(),
            }
        };

        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            headline
        } else {
            format!("{}\n{}", headline, tail(stderr, tail_bytes))
        }
    }
}

/// Last `max` bytes of `text`, cut on a char boundary
pub fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Seam over child-process execution of generated code
#[async_trait::async_trait]
pub trait CodeRunner: Send + Sync {
    /// Stage `code` at the scratch path inside `workdir` and run it there
    async fn run(
        &self,
        workdir: &Path,
        code: &str,
        assets: &AssetManifest,
    ) -> Result<RunOutput, RunError>;
}

pub struct ProcessRunner {
    interpreter: Interpreter,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(interpreter: Interpreter, timeout: Duration) -> Self {
        ProcessRunner {
            interpreter,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl CodeRunner for ProcessRunner {
    async fn run(
        &self,
        workdir: &Path,
        code: &str,
        assets: &AssetManifest,
    ) -> Result<RunOutput, RunError> {
        let script_path = workdir.join(SCRIPT_FILE);
        tokio::fs::write(&script_path, code)
            .await
            .map_err(|source| RunError::Stage {
                path: script_path.clone(),
                source,
            })?;

        let child = Command::new(&self.interpreter.program)
            .args(&self.interpreter.args)
            .arg(SCRIPT_FILE)
            .current_dir(workdir)
            .env(ASSETS_ENV, assets.to_json())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: self.interpreter.program.clone(),
                source,
            })?;

        info!("Running {:?} with {}", script_path, self.interpreter.program);

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| RunError::Wait {
                program: self.interpreter.program.clone(),
                source,
            })?,
            Err(_) => {
                return Ok(RunOutput {
                    exit_code: None,
                    success: false,
                    timed_out: true,
                    stdout: String::new(),
                    stderr: format!("No exit within {:?}", self.timeout),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        debug!("Script stdout:\n{}", stdout);

        Ok(RunOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            timed_out: false,
            stdout,
            stderr,
        })
    }
}
