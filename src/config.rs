//! Configuration for binbuild
//!
//! Settings are read from environment variables with defaults:
//!
//! ## Upload flow
//! - `BINBUILD_TIMEOUT`: overall launch-and-wait budget in seconds - default: "300"
//! - `BINBUILD_LAUNCH_POLL_MS`: interval between build creation attempts - default: "1000"
//! - `BINBUILD_PHASE_POLL_MS`: interval between phase observations - default: "1000"
//! - `BINBUILD_CANCEL_POLL_MS`: interval between cancellation attempts - default: "500"
//! - `BINBUILD_CANCEL_DURATION`: how long to keep trying to cancel, in seconds - default: "30"
//!
//! ## Cluster access
//! - `BINBUILD_SERVER`: API server URL - default: "https://localhost:6443"
//! - `BINBUILD_TOKEN`: bearer token - optional
//! - `BINBUILD_NAMESPACE`: namespace of the build config - default: "default"
//! - `BINBUILD_INSECURE`: skip TLS verification (true|false) - default: "false"

use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_LAUNCH_POLL_MS: u64 = 1000;
const DEFAULT_PHASE_POLL_MS: u64 = 1000;
const DEFAULT_CANCEL_POLL_MS: u64 = 500;
const DEFAULT_CANCEL_DURATION_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 3600;

const DEFAULT_SERVER: &str = "https://localhost:6443";
const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

/// Time budget and poll intervals of the upload flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Shared budget for creating the build and waiting for it to run
    pub timeout: Duration,
    pub launch_poll_interval: Duration,
    pub phase_poll_interval: Duration,
    pub cancel_poll_interval: Duration,
    pub cancel_poll_duration: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(env_u64("BINBUILD_TIMEOUT", DEFAULT_TIMEOUT_SECS)),
            launch_poll_interval: Duration::from_millis(env_u64(
                "BINBUILD_LAUNCH_POLL_MS",
                DEFAULT_LAUNCH_POLL_MS,
            )),
            phase_poll_interval: Duration::from_millis(env_u64(
                "BINBUILD_PHASE_POLL_MS",
                DEFAULT_PHASE_POLL_MS,
            )),
            cancel_poll_interval: Duration::from_millis(env_u64(
                "BINBUILD_CANCEL_POLL_MS",
                DEFAULT_CANCEL_POLL_MS,
            )),
            cancel_poll_duration: Duration::from_secs(env_u64(
                "BINBUILD_CANCEL_DURATION",
                DEFAULT_CANCEL_DURATION_SECS,
            )),
        }
    }
}

impl UploadConfig {
    /// Built-in defaults, ignoring the environment
    pub fn defaults() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            launch_poll_interval: Duration::from_millis(DEFAULT_LAUNCH_POLL_MS),
            phase_poll_interval: Duration::from_millis(DEFAULT_PHASE_POLL_MS),
            cancel_poll_interval: Duration::from_millis(DEFAULT_CANCEL_POLL_MS),
            cancel_poll_duration: Duration::from_secs(DEFAULT_CANCEL_DURATION_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout < Duration::from_secs(1) {
            return Err(ConfigError::ValidationFailed(
                "Timeout must be at least 1 second".to_string(),
            ));
        }
        if self.timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
            return Err(ConfigError::ValidationFailed(
                "Timeout cannot exceed 1 hour".to_string(),
            ));
        }

        for (label, interval) in [
            ("Launch poll interval", self.launch_poll_interval),
            ("Phase poll interval", self.phase_poll_interval),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be greater than zero",
                    label
                )));
            }
            if interval >= self.timeout {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be shorter than the timeout",
                    label
                )));
            }
        }

        if self.cancel_poll_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "Cancel poll interval must be greater than zero".to_string(),
            ));
        }
        if self.cancel_poll_duration < self.cancel_poll_interval {
            return Err(ConfigError::ValidationFailed(
                "Cancel duration must be at least one cancel poll interval".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the builds API lives and how to authenticate to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub server: String,
    pub token: Option<String>,
    pub namespace: String,
    pub insecure: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            server: env::var("BINBUILD_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string()),
            token: env::var("BINBUILD_TOKEN").ok().filter(|t| !t.is_empty()),
            namespace: env::var("BINBUILD_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
            insecure: env::var("BINBUILD_INSECURE")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(false),
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server.starts_with("https://") || self.server.starts_with("http://")) {
            return Err(ConfigError::ParseError {
                field: "server".to_string(),
                error: format!("expected an http(s) URL, got '{}'", self.server),
            });
        }
        if self.namespace.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
