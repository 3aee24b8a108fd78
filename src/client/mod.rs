//! Collaborators of the binary build flow
//!
//! The flow never talks to the cluster directly. It goes through four seams:
//!
//! - [`BuildGenerator`] creates a build from a [`BuildRequest`]
//! - [`BuildsClient`] reads and conditionally updates builds
//! - [`PhaseTracker`] waits for a build to leave its pre-running phases
//! - [`AttachTransport`] streams bytes into a container's standard input
//!
//! [`rest`] and [`attach`] provide cluster-backed implementations, [`mock`]
//! provides in-memory doubles for tests.

pub mod attach;
pub mod error;
pub mod mock;
pub mod rest;
pub mod tracker;

pub use attach::PodAttachTransport;
pub use error::{ClientError, Status, StatusDetails, IMAGE_STREAM_TAGS_KIND};
pub use rest::RestClient;
pub use tracker::PollingPhaseTracker;

use crate::build::{Build, BuildRequest};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncRead;

#[async_trait]
pub trait BuildGenerator: Send + Sync {
    /// Creates a build for the request or rejects it
    async fn instantiate(&self, request: &BuildRequest) -> Result<Build, ClientError>;
}

#[async_trait]
pub trait BuildsClient: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Build, ClientError>;

    /// Writes the build back. Fails with [`ClientError::Conflict`] when the
    /// stored resource version no longer matches the one on `build`.
    async fn update(&self, build: &Build) -> Result<Build, ClientError>;
}

/// Result of waiting for a build to start running
#[derive(Debug, Clone, PartialEq)]
pub enum RunningWait {
    /// The build left New/Pending; the snapshot may be Running or terminal
    Reached(Build),

    /// The deadline passed first, with the last snapshot seen (if any)
    TimedOut(Option<Build>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    #[error("build was deleted")]
    Deleted,

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[async_trait]
pub trait PhaseTracker: Send + Sync {
    async fn wait_for_running(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<RunningWait, WaitError>;
}

/// Container an attach session is opened against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachTarget {
    pub namespace: String,
    pub pod: String,
    pub container: String,
    pub stdin: bool,
}

#[async_trait]
pub trait AttachTransport: Send + Sync {
    /// Opens one attach session and copies `stdin` into it until EOF.
    /// The session is closed before this returns, on success or failure.
    async fn stream(
        &self,
        target: &AttachTarget,
        stdin: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), ClientError>;
}
