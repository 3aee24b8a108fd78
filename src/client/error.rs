//! Collaborator errors and the Kubernetes `Status` document

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource kind reported when a referenced image stream tag is missing
pub const IMAGE_STREAM_TAGS_KIND: &str = "imagestreamtags";

/// Errors returned by the builds API, the generator and the attach transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    #[error("operation cannot be fulfilled on {kind} \"{name}\": {message}")]
    Conflict {
        kind: String,
        name: String,
        message: String,
    },

    #[error("{message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("stream error: {0}")]
    Stream(String),
}

impl ClientError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        ClientError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        ClientError::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict { .. })
    }

    /// Resource kind of a not-found error
    pub fn not_found_kind(&self) -> Option<&str> {
        match self {
            ClientError::NotFound { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ClientError::NotFound { .. } => 404,
            ClientError::Conflict { .. } => 409,
            ClientError::Api { code, .. } => *code,
            ClientError::Transport(_) | ClientError::Decode(_) | ClientError::Stream(_) => 500,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            ClientError::NotFound { .. } => "NotFound",
            ClientError::Conflict { .. } => "Conflict",
            ClientError::Api { reason, .. } if !reason.is_empty() => reason,
            _ => "InternalError",
        }
    }

    /// Decodes a failure `Status` returned by the API server.
    ///
    /// `kind` and `name` describe the request and are used when the server
    /// did not fill in `details`.
    pub fn from_status(status: Status, kind: &str, name: &str) -> Self {
        let details = status.details.unwrap_or_default();
        let kind = if details.kind.is_empty() {
            kind.to_string()
        } else {
            details.kind
        };
        let name = if details.name.is_empty() {
            name.to_string()
        } else {
            details.name
        };

        match (status.code, status.reason.as_str()) {
            (404, _) | (_, "NotFound") => ClientError::NotFound { kind, name },
            (409, _) | (_, "Conflict") => ClientError::Conflict {
                kind,
                name,
                message: status.message,
            },
            (code, reason) => ClientError::Api {
                code,
                reason: reason.to_string(),
                message: status.message,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

/// Kubernetes `Status` object, used for failure responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,

    #[serde(default)]
    pub code: u16,
}

impl Status {
    pub fn failure(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: "Status".to_string(),
            api_version: "v1".to_string(),
            status: "Failure".to_string(),
            message: message.into(),
            reason: reason.into(),
            details: None,
            code,
        }
    }

    pub fn with_details(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.details = Some(StatusDetails {
            name: name.into(),
            kind: kind.into(),
        });
        self
    }
}
