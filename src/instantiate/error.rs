use crate::build::Phase;
use crate::client::{ClientError, Status};
use std::time::Duration;
use thiserror::Error;

/// Appended to rejections of builds whose logs the caller cannot fetch
pub const NO_BUILD_LOGS_MESSAGE: &str = "No logs are available.";

/// Reasons a binary build request is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiateError {
    /// The generator refused to create the build
    #[error("{source}")]
    LaunchFailed {
        name: String,
        #[source]
        source: ClientError,
    },

    /// A dependency of the build stayed missing for the whole budget
    #[error("timed out after {}s waiting to create a build from {name}: {last_error}", .timeout.as_secs())]
    LaunchTimedOut {
        name: String,
        timeout: Duration,
        last_error: String,
    },

    #[error("build {name} was deleted before it started: {}", NO_BUILD_LOGS_MESSAGE)]
    BuildDeletedBeforeStart { name: String },

    #[error("unable to wait for build {name} to run: {source}")]
    WaitObservationFailed {
        name: String,
        #[source]
        source: ClientError,
    },

    /// Carries the configured budget and how much of it had actually passed
    #[error("timed out waiting for build {name} to start after {}s", .timeout.as_secs())]
    StartTimeout {
        name: String,
        timeout: Duration,
        elapsed: Duration,
    },

    /// The build reached Error, Failed or Cancelled on its own
    #[error("{}", terminal_message(.name, .phase, .reason, .message))]
    TerminalPhaseRejection {
        name: String,
        phase: Phase,
        reason: String,
        message: String,
    },

    #[error("cannot upload file to build {name} with status {phase}")]
    InvalidPhaseForUpload { name: String, phase: Phase },

    #[error("unable to stream the upload into build {name}: {source}")]
    StreamingFailed {
        name: String,
        #[source]
        source: ClientError,
    },
}

fn terminal_message(name: &str, phase: &Phase, reason: &str, message: &str) -> String {
    match phase {
        Phase::Failed => format!("build {} failed: {}: {}", name, reason, message),
        Phase::Cancelled => format!("build {} was cancelled: {}", name, NO_BUILD_LOGS_MESSAGE),
        _ => format!(
            "build {} encountered an error: {}",
            name, NO_BUILD_LOGS_MESSAGE
        ),
    }
}

impl InstantiateError {
    pub fn status_code(&self) -> u16 {
        match self {
            InstantiateError::LaunchFailed { source, .. } => source.code(),
            InstantiateError::LaunchTimedOut { .. } | InstantiateError::StartTimeout { .. } => 504,
            InstantiateError::BuildDeletedBeforeStart { .. }
            | InstantiateError::WaitObservationFailed { .. }
            | InstantiateError::TerminalPhaseRejection { .. }
            | InstantiateError::InvalidPhaseForUpload { .. } => 400,
            InstantiateError::StreamingFailed { .. } => 500,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            InstantiateError::LaunchFailed { source, .. } => source.reason(),
            InstantiateError::LaunchTimedOut { .. } | InstantiateError::StartTimeout { .. } => {
                "Timeout"
            }
            InstantiateError::StreamingFailed { .. } => "InternalError",
            _ => "BadRequest",
        }
    }

    /// Name of the build, or of the build config when no build exists yet
    pub fn name(&self) -> &str {
        match self {
            InstantiateError::LaunchFailed { name, .. }
            | InstantiateError::LaunchTimedOut { name, .. }
            | InstantiateError::BuildDeletedBeforeStart { name }
            | InstantiateError::WaitObservationFailed { name, .. }
            | InstantiateError::StartTimeout { name, .. }
            | InstantiateError::TerminalPhaseRejection { name, .. }
            | InstantiateError::InvalidPhaseForUpload { name, .. }
            | InstantiateError::StreamingFailed { name, .. } => name,
        }
    }

    /// True when the build ended by itself, so there is nothing to cancel
    pub fn build_is_terminal(&self) -> bool {
        matches!(self, InstantiateError::TerminalPhaseRejection { .. })
    }

    pub fn to_status(&self) -> Status {
        let kind = match self {
            InstantiateError::LaunchFailed { .. } | InstantiateError::LaunchTimedOut { .. } => {
                "buildconfigs"
            }
            _ => "builds",
        };
        Status::failure(self.status_code(), self.reason(), self.to_string())
            .with_details(kind, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_messages() {
        let failed = InstantiateError::TerminalPhaseRejection {
            name: "app-1".to_string(),
            phase: Phase::Failed,
            reason: "BuildError".to_string(),
            message: "assemble script failed".to_string(),
        };
        assert_eq!(
            failed.to_string(),
            "build app-1 failed: BuildError: assemble script failed"
        );

        let cancelled = InstantiateError::TerminalPhaseRejection {
            name: "app-1".to_string(),
            phase: Phase::Cancelled,
            reason: String::new(),
            message: String::new(),
        };
        assert_eq!(
            cancelled.to_string(),
            "build app-1 was cancelled: No logs are available."
        );

        let errored = InstantiateError::TerminalPhaseRejection {
            name: "app-1".to_string(),
            phase: Phase::Error,
            reason: String::new(),
            message: String::new(),
        };
        assert!(errored.to_string().contains("encountered an error"));
        assert!(errored.build_is_terminal());
    }

    #[test]
    fn test_status_codes() {
        let stream = InstantiateError::StreamingFailed {
            name: "app-1".to_string(),
            source: ClientError::Stream("connection refused".to_string()),
        };
        assert_eq!(stream.status_code(), 500);
        assert_eq!(stream.reason(), "InternalError");
        assert!(!stream.build_is_terminal());

        let timeout = InstantiateError::StartTimeout {
            name: "app-1".to_string(),
            timeout: Duration::from_secs(300),
            elapsed: Duration::from_millis(299_600),
        };
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(
            timeout.to_string(),
            "timed out waiting for build app-1 to start after 300s"
        );

        let invalid = InstantiateError::InvalidPhaseForUpload {
            name: "app-1".to_string(),
            phase: Phase::Complete,
        };
        assert_eq!(invalid.status_code(), 400);
        assert_eq!(
            invalid.to_string(),
            "cannot upload file to build app-1 with status Complete"
        );

        let launch = InstantiateError::LaunchFailed {
            name: "app".to_string(),
            source: ClientError::not_found("buildconfigs", "app"),
        };
        assert_eq!(launch.status_code(), 404);
        assert_eq!(launch.reason(), "NotFound");
    }

    #[test]
    fn test_status_document() {
        let err = InstantiateError::BuildDeletedBeforeStart {
            name: "app-1".to_string(),
        };
        let status = err.to_status();

        assert_eq!(status.kind, "Status");
        assert_eq!(status.status, "Failure");
        assert_eq!(status.code, 400);
        assert_eq!(status.reason, "BadRequest");
        assert_eq!(
            status.message,
            "build app-1 was deleted before it started: No logs are available."
        );
        let details = status.details.unwrap();
        assert_eq!(details.kind, "builds");
        assert_eq!(details.name, "app-1");
    }
}
