//! Client configuration parsed from environment variables.
//!
//! Numeric knobs fall back to their defaults when absent or unparseable;
//! only a malformed base URL is reported as an error.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HEALTH_POLL_MS: u64 = 3000;
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL '{0}' (expected http:// or https://)")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Where and how to reach the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeouts: ServiceTimeouts,
}

impl ServiceConfig {
    /// Build a service config for `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the URL is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            timeouts: ServiceTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        })
    }
}

/// Workflow tuning: poll cadence and the image size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub health_poll_interval: Duration,
    pub max_image_bytes: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            health_poll_interval: Duration::from_millis(DEFAULT_HEALTH_POLL_MS),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub service: ServiceConfig,
    pub workflow: WorkflowConfig,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CAPTURE_API_BASE_URL`: default `http://localhost:5000`
    /// - `CAPTURE_REQUEST_TIMEOUT_SECS`: default 120
    /// - `CAPTURE_CONNECT_TIMEOUT_SECS`: default 10
    /// - `CAPTURE_HEALTH_POLL_MS`: default 3000
    /// - `CAPTURE_MAX_IMAGE_BYTES`: default 10 MiB
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the base URL is not http(s).
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("CAPTURE_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());
        let service = ServiceConfig {
            base_url: normalize_base_url(&base_url)?,
            timeouts: ServiceTimeouts {
                request_secs: env_parse("CAPTURE_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("CAPTURE_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        };
        let workflow = WorkflowConfig {
            health_poll_interval: Duration::from_millis(env_parse("CAPTURE_HEALTH_POLL_MS", DEFAULT_HEALTH_POLL_MS)),
            max_image_bytes: env_parse("CAPTURE_MAX_IMAGE_BYTES", DEFAULT_MAX_IMAGE_BYTES),
        };
        Ok(Self { service, workflow })
    }
}

/// Trim trailing slashes and require an http(s) scheme.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for any other scheme.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
