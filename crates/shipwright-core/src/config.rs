//! Service configuration.
//!
//! Built once at startup and handed to every component constructor; nothing
//! in the pipeline reads the environment on its own.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL up to and including `/v1`.
    pub base_url: String,
}

/// GitHub REST API access.
#[derive(Clone)]
pub struct GitHubConfig {
    pub token: String,
    pub api_url: String,
    /// Repository owner; looked up via `GET /user` when `None`.
    pub owner: Option<String>,
}

/// Round queue / worker sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    pub workers: usize,
    /// Maximum submissions that are queued, running or waiting for a retry.
    pub max_pending: usize,
    /// Attempt budget per submission.
    pub max_attempts: u32,
    /// How long a finished submission stays visible to status queries.
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_pending: 64,
            max_attempts: 3,
            retention: Duration::from_secs(60 * 60),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub shared_secret: String,
    pub openai: OpenAiConfig,
    pub github: GitHubConfig,
    /// Parent of the per-task working directories.
    pub work_root: PathBuf,
    pub bind: SocketAddr,
    pub queue: QueueConfig,
    /// Pause after Pages is first enabled, before its URL is reported.
    pub pages_settle: Duration,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let defaults = QueueConfig::default();
        let queue = QueueConfig {
            workers: parse_or(&get, "SHIPWRIGHT_WORKERS", defaults.workers)?,
            max_pending: parse_or(&get, "SHIPWRIGHT_MAX_PENDING", defaults.max_pending)?,
            max_attempts: parse_or(&get, "SHIPWRIGHT_MAX_ATTEMPTS", defaults.max_attempts)?,
            retention: Duration::from_secs(parse_or(
                &get,
                "SHIPWRIGHT_RETENTION_SECS",
                defaults.retention.as_secs(),
            )?),
        };
        if queue.workers == 0 {
            return Err(ConfigError::Invalid {
                var: "SHIPWRIGHT_WORKERS",
                reason: "must be at least 1".into(),
            });
        }
        if queue.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: "SHIPWRIGHT_MAX_ATTEMPTS",
                reason: "must be at least 1".into(),
            });
        }

        let bind_raw = get("SHIPWRIGHT_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: "SHIPWRIGHT_BIND",
            reason: format!("{e}"),
        })?;

        Ok(Self {
            shared_secret: require("SHARED_SECRET")?,
            openai: OpenAiConfig {
                api_key: require("OPENAI_API_KEY")?,
                model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.into()),
                base_url: get("OPENAI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into())
                    .trim_end_matches('/')
                    .to_string(),
            },
            github: GitHubConfig {
                token: require("GITHUB_TOKEN")?,
                api_url: get("GITHUB_API_URL")
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.into())
                    .trim_end_matches('/')
                    .to_string(),
                owner: get("GITHUB_OWNER"),
            },
            work_root: get("SHIPWRIGHT_WORK_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            bind,
            queue,
            pages_settle: Duration::from_secs(parse_or(&get, "SHIPWRIGHT_PAGES_SETTLE_SECS", 10)?),
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("shared_secret", &"<redacted>")
            .field("openai", &self.openai)
            .field("github", &self.github)
            .field("work_root", &self.work_root)
            .field("bind", &self.bind)
            .field("queue", &self.queue)
            .field("pages_settle", &self.pages_settle)
            .finish()
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .finish()
    }
}
