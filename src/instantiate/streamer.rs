use super::error::InstantiateError;
use super::guard::CancellationGuard;
use crate::build::{build_pod_name, upload_container, Build};
use crate::client::{AttachTarget, AttachTransport};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{error, info};

/// Copies the upload into the running build pod
pub struct UploadStreamer {
    transport: Arc<dyn AttachTransport>,
}

impl UploadStreamer {
    pub fn new(transport: Arc<dyn AttachTransport>) -> Self {
        Self { transport }
    }

    /// Attach target for a build: its build pod, and the clone container
    /// unless the build uses a custom strategy
    pub fn target_for(build: &Build) -> AttachTarget {
        AttachTarget {
            namespace: build.namespace().to_string(),
            pod: build_pod_name(build.name()),
            container: upload_container(build).to_string(),
            stdin: true,
        }
    }

    /// Streams `payload` in a single attach session. Success disarms
    /// `guard` and hands back `latest` as the result of the request.
    pub async fn stream(
        &self,
        latest: Build,
        payload: &mut (dyn AsyncRead + Unpin + Send),
        guard: &mut CancellationGuard,
    ) -> Result<Build, InstantiateError> {
        let target = Self::target_for(&latest);
        info!(
            build = latest.name(),
            pod = %target.pod,
            container = %target.container,
            "Streaming upload into build"
        );

        if let Err(source) = self.transport.stream(&target, payload).await {
            error!(build = latest.name(), "Upload failed: {}", source);
            return Err(InstantiateError::StreamingFailed {
                name: latest.name().to_string(),
                source,
            });
        }

        guard.disarm();
        Ok(latest)
    }
}
