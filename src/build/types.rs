//! Build resource model
//!
//! These types mirror the `build.openshift.io/v1` wire shape closely enough
//! to round-trip through the API server. Every object keeps the fields it
//! does not model in an `extra` map so that a fetched build can be updated
//! without dropping data owned by other writers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Message recorded on requests that arrive without a trigger cause
pub const MANUAL_TRIGGER_MESSAGE: &str = "Manually triggered";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Optimistic-concurrency token; advances on every successful write
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Lifecycle phase reported by the build controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::New => "New",
            Phase::Pending => "Pending",
            Phase::Running => "Running",
            Phase::Complete => "Complete",
            Phase::Failed => "Failed",
            Phase::Error => "Error",
            Phase::Cancelled => "Cancelled",
        }
    }

    /// Terminal phases are never left once entered
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Complete | Phase::Failed | Phase::Error | Phase::Cancelled
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Phase::New),
            "Pending" => Ok(Phase::Pending),
            "Running" => Ok(Phase::Running),
            "Complete" => Ok(Phase::Complete),
            "Failed" => Ok(Phase::Failed),
            "Error" => Ok(Phase::Error),
            "Cancelled" => Ok(Phase::Cancelled),
            other => Err(format!("unknown build phase: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStrategy {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub strategy_type: String,

    /// Present only for custom-strategy builds; the content is opaque here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_strategy: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildStrategy {
    pub fn custom() -> Self {
        Self {
            strategy_type: "Custom".to_string(),
            custom_strategy: Some(Value::Object(Map::new())),
            extra: Map::new(),
        }
    }

    pub fn source() -> Self {
        Self {
            strategy_type: "Source".to_string(),
            ..Default::default()
        }
    }

    pub fn is_custom(&self) -> bool {
        self.custom_strategy.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default)]
    pub strategy: BuildStrategy,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default)]
    pub phase: Phase,

    /// Set by clients to ask the build controller to abort the build
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Point-in-time snapshot of a build resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: BuildSpec,

    #[serde(default)]
    pub status: BuildStatus,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Build {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_strategy(mut self, strategy: BuildStrategy) -> Self {
        self.spec.strategy = strategy;
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.status.phase = phase;
        self
    }

    pub fn with_resource_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.resource_version = version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn phase(&self) -> Phase {
        self.status.phase
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceControlUser {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSourceRevision {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,

    #[serde(default)]
    pub author: SourceControlUser,

    #[serde(default)]
    pub committer: SourceControlUser,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Revision of the source the build should record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceRevision {
    Git { git: GitSourceRevision },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryBuildSource {
    /// File name the payload is stored as inside the build context;
    /// empty means the payload is an archive to extract
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub as_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTriggerCause {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl BuildTriggerCause {
    pub fn manual() -> Self {
        Self {
            message: MANUAL_TRIGGER_MESSAGE.to_string(),
        }
    }
}

/// Request to instantiate a build from a build configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<SourceRevision>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<BinaryBuildSource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_by: Vec<BuildTriggerCause>,
}

impl BuildRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    /// Records a manual trigger when the caller supplied none
    pub fn ensure_trigger_cause(&mut self) {
        if self.triggered_by.is_empty() {
            self.triggered_by.push(BuildTriggerCause::manual());
        }
    }
}

/// Query options accompanying a binary upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryBuildRequestOptions {
    pub namespace: String,
    pub name: String,
    pub as_file: String,
    pub commit: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
}

impl BinaryBuildRequestOptions {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builds the instantiate request. Commit metadata is only attached
    /// when a commit id was given; the binary source is always set.
    pub fn to_build_request(&self) -> BuildRequest {
        let mut request = BuildRequest::new(self.namespace.clone(), self.name.clone());

        if !self.commit.is_empty() {
            request.revision = Some(SourceRevision::Git {
                git: GitSourceRevision {
                    commit: self.commit.clone(),
                    author: SourceControlUser {
                        name: self.author_name.clone(),
                        email: self.author_email.clone(),
                    },
                    committer: SourceControlUser {
                        name: self.committer_name.clone(),
                        email: self.committer_email.clone(),
                    },
                    message: self.message.clone(),
                },
            });
        }

        request.binary = Some(BinaryBuildSource {
            as_file: self.as_file.clone(),
        });

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_terminal_set() {
        assert!(!Phase::New.is_terminal());
        assert!(!Phase::Pending.is_terminal());
        assert!(!Phase::Running.is_terminal());
        assert!(Phase::Complete.is_terminal());
        assert!(Phase::Failed.is_terminal());
        assert!(Phase::Error.is_terminal());
        assert!(Phase::Cancelled.is_terminal());
    }

    #[test]
    fn test_phase_parse() {
        assert_eq!("Running".parse::<Phase>().unwrap(), Phase::Running);
        assert!("running".parse::<Phase>().is_err());
        assert!("Bogus".parse::<Phase>().is_err());
    }

    #[test]
    fn test_build_preserves_unknown_fields() {
        let raw = json!({
            "kind": "Build",
            "apiVersion": "build.openshift.io/v1",
            "metadata": {
                "name": "app-1",
                "namespace": "demo",
                "resourceVersion": "42",
                "labels": {"buildconfig": "app"}
            },
            "spec": {
                "strategy": {"type": "Custom", "customStrategy": {"from": {"kind": "DockerImage"}}},
                "output": {"to": {"kind": "ImageStreamTag", "name": "app:latest"}}
            },
            "status": {"phase": "Running", "startTimestamp": "2024-01-01T00:00:00Z"}
        });

        let build: Build = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(build.name(), "app-1");
        assert_eq!(build.metadata.resource_version, "42");
        assert_eq!(build.phase(), Phase::Running);
        assert!(build.spec.strategy.is_custom());
        assert!(!build.status.cancelled);

        let back = serde_json::to_value(&build).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_build_rejects_unknown_phase() {
        let raw = json!({"metadata": {"name": "x"}, "status": {"phase": "Exploded"}});
        assert!(serde_json::from_value::<Build>(raw).is_err());
    }

    #[test]
    fn test_options_without_commit_have_no_revision() {
        let mut options = BinaryBuildRequestOptions::new("demo", "app");
        options.as_file = "app.jar".to_string();
        options.author_name = "ignored".to_string();

        let request = options.to_build_request();
        assert_eq!(request.name(), "app");
        assert!(request.revision.is_none());
        assert_eq!(request.binary.unwrap().as_file, "app.jar");
    }

    #[test]
    fn test_options_with_commit_carry_identity() {
        let options = BinaryBuildRequestOptions {
            commit: "abc123".to_string(),
            message: "fix".to_string(),
            author_name: "A".to_string(),
            author_email: "a@example.com".to_string(),
            committer_name: "C".to_string(),
            committer_email: "c@example.com".to_string(),
            ..BinaryBuildRequestOptions::new("demo", "app")
        };

        let request = options.to_build_request();
        let Some(SourceRevision::Git { git }) = request.revision else {
            panic!("expected git revision");
        };
        assert_eq!(git.commit, "abc123");
        assert_eq!(git.author.email, "a@example.com");
        assert_eq!(git.committer.name, "C");
        assert_eq!(git.message, "fix");
        assert!(request.binary.unwrap().as_file.is_empty());
    }

    #[test]
    fn test_revision_wire_shape() {
        let revision = SourceRevision::Git {
            git: GitSourceRevision {
                commit: "abc".to_string(),
                ..Default::default()
            },
        };
        let value = serde_json::to_value(&revision).unwrap();
        assert_eq!(value["type"], "Git");
        assert_eq!(value["git"]["commit"], "abc");
    }

    #[test]
    fn test_ensure_trigger_cause() {
        let mut request = BuildRequest::new("demo", "app");
        request.ensure_trigger_cause();
        assert_eq!(request.triggered_by, vec![BuildTriggerCause::manual()]);

        let mut request = BuildRequest::new("demo", "app");
        request.triggered_by.push(BuildTriggerCause {
            message: "GitHub webhook".to_string(),
        });
        request.ensure_trigger_cause();
        assert_eq!(request.triggered_by.len(), 1);
        assert_eq!(request.triggered_by[0].message, "GitHub webhook");
    }
}
