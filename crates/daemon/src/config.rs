use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;

const DEFAULT_CHAT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_CHAT_MODEL: &str = "openai/gpt-oss-120b";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

/// Chat-completion provider settings (OpenAI-compatible endpoint)
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_completion_tokens: u32,
    pub timeout: Duration,
}

/// Multimodal description provider settings
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Execution-repair loop settings
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub python: String,
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Only the tail of stderr is kept once it grows past this many bytes
    pub error_tail_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            max_attempts: 5,
            timeout: Duration::from_secs(600),
            error_tail_bytes: 8 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub log_level: LevelFilter,
    /// Scratch script, uploads and output artifacts all live here
    pub workdir: PathBuf,
    pub chat: ChatConfig,
    pub vision: VisionConfig,
    pub execution: ExecutionConfig,
}

impl Config {
    /// Build configuration from the process environment (after `.env` is loaded)
    pub fn from_env() -> Result<Self> {
        let http_timeout = Duration::from_secs(env_parse("PROMPTCUT_HTTP_TIMEOUT_SECS", 300)?);

        let chat_key = std::env::var("GROQ_API_KEY")
            .or_else(|_| std::env::var("GROQ_API"))
            .context("GROQ_API_KEY environment variable not set")?;
        let gemini_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;

        let bind = env_or("PROMPTCUT_BIND", "127.0.0.1:7777")
            .parse()
            .context("PROMPTCUT_BIND is not a socket address")?;
        let log_level = env_or("PROMPTCUT_LOG", "info")
            .parse()
            .context("PROMPTCUT_LOG is not a log level")?;

        let defaults = ExecutionConfig::default();
        let execution = ExecutionConfig {
            python: env_or("PROMPTCUT_PYTHON", &defaults.python),
            max_attempts: env_parse("PROMPTCUT_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            timeout: Duration::from_secs(env_parse(
                "PROMPTCUT_EXEC_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )?),
            error_tail_bytes: env_parse("PROMPTCUT_ERROR_TAIL_BYTES", defaults.error_tail_bytes)?,
        };

        Ok(Config {
            bind,
            log_level,
            workdir: PathBuf::from(env_or("PROMPTCUT_WORKDIR", ".")),
            chat: ChatConfig {
                base_url: env_or("PROMPTCUT_CHAT_BASE_URL", DEFAULT_CHAT_BASE_URL),
                api_key: chat_key,
                model: env_or("PROMPTCUT_CHAT_MODEL", DEFAULT_CHAT_MODEL),
                max_completion_tokens: env_parse("PROMPTCUT_MAX_COMPLETION_TOKENS", 65536)?,
                timeout: http_timeout,
            },
            vision: VisionConfig {
                base_url: env_or("PROMPTCUT_GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                api_key: gemini_key,
                model: env_or("PROMPTCUT_GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                timeout: http_timeout,
            },
            execution,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}
