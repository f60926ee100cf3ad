//! Configuration types for cv-analyzer-client

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable overriding [`ApiConfig::base_url`]
pub const ENV_API_URL: &str = "CV_ANALYZER_API_URL";
/// Environment variable overriding [`ApiConfig::timeout`] (seconds)
pub const ENV_TIMEOUT_SECS: &str = "CV_ANALYZER_TIMEOUT_SECS";
/// Environment variable overriding [`PollingConfig::interval`] (milliseconds)
pub const ENV_POLL_INTERVAL_MS: &str = "CV_ANALYZER_POLL_INTERVAL_MS";

/// Analysis service connection settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the analysis service (default: "http://localhost:8080")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    ///
    /// A request exceeding it fails with a timeout-classified transport error.
    #[serde(default = "default_timeout", with = "duration_ms_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Job status polling settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between a status fetch resolving and the next one starting (default: 2000ms)
    #[serde(default = "default_poll_interval", with = "duration_ms_serde")]
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
        }
    }
}

/// Pre-submission artifact limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum artifact size in bytes (default: 10 MiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Accepted extensions, lowercase, without the dot (default: pdf, docx, txt)
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

/// Main configuration for the analysis client
///
/// Fields are organized into sub-configs:
/// - [`api`](ApiConfig) - base URL, timeout, user agent
/// - [`polling`](PollingConfig) - status poll interval
/// - [`upload`](UploadConfig) - artifact type and size limits
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Service connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Artifact validation limits
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    /// Build a config from defaults overridden by environment variables
    ///
    /// Reads [`ENV_API_URL`], [`ENV_TIMEOUT_SECS`] and [`ENV_POLL_INTERVAL_MS`].
    /// Unset variables keep their defaults; unparsable numbers are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (used by [`from_env`](Self::from_env))
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api.base_url = url;
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::config("api.timeout", format!("{ENV_TIMEOUT_SECS}={raw:?} is not a number"))
            })?;
            config.api.timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                Error::config(
                    "polling.interval",
                    format!("{ENV_POLL_INTERVAL_MS}={raw:?} is not a number"),
                )
            })?;
            config.polling.interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the client cannot work with
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .map_err(|e| Error::config("api.base_url", format!("invalid base URL: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::config(
                "api.base_url",
                format!("{} cannot be used as a base URL", self.api.base_url),
            ));
        }

        if self.api.timeout.is_zero() {
            return Err(Error::config("api.timeout", "timeout must be greater than zero"));
        }

        if self.polling.interval.is_zero() {
            return Err(Error::config(
                "polling.interval",
                "poll interval must be greater than zero",
            ));
        }

        if self.upload.allowed_extensions.is_empty() {
            return Err(Error::config(
                "upload.allowed_extensions",
                "at least one file extension must be allowed",
            ));
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("cv-analyzer-client/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "docx".to_string(), "txt".to_string()]
}

// Durations travel as integer milliseconds
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
