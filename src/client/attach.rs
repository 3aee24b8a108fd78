use super::{AttachTarget, AttachTransport, ClientError};
use crate::config::ClusterConfig;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::{Api, AttachParams};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

/// Attach transport that goes through the API server's pod `attach`
/// subresource, so it works wherever the pod is scheduled.
pub struct PodAttachTransport {
    client: kube::Client,
}

impl PodAttachTransport {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Builds a client for the same server and credentials as the REST adapter
    pub fn from_cluster(cluster: &ClusterConfig) -> Result<Self, ClientError> {
        let url = cluster
            .server
            .parse()
            .map_err(|e| ClientError::Transport(format!("Invalid server URL: {}", e)))?;

        let mut config = kube::Config::new(url);
        config.default_namespace = cluster.namespace.clone();
        config.accept_invalid_certs = cluster.insecure;
        config.auth_info.token = cluster.token.clone().map(Into::into);

        let client = kube::Client::try_from(config)
            .map_err(|e| ClientError::Transport(format!("Failed to create kube client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Parameters for a stdin-only attach session
pub fn attach_params(target: &AttachTarget) -> AttachParams {
    AttachParams::default()
        .container(target.container.clone())
        .stdin(target.stdin)
        .stdout(false)
        .stderr(false)
}

/// Maps the status the server sends when the session ends
pub fn attach_outcome(status: Option<Status>) -> Result<(), ClientError> {
    let Some(status) = status else {
        return Ok(());
    };
    if status.status.as_deref() == Some("Success") {
        return Ok(());
    }

    let detail = status
        .message
        .filter(|m| !m.is_empty())
        .or(status.reason.filter(|r| !r.is_empty()))
        .or(status.status)
        .unwrap_or_else(|| "unknown failure".to_string());
    Err(ClientError::Stream(format!("attach session failed: {}", detail)))
}

#[async_trait]
impl AttachTransport for PodAttachTransport {
    async fn stream(
        &self,
        target: &AttachTarget,
        stdin: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<(), ClientError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        debug!(
            "Attaching to container {} of pod {}/{}",
            target.container, target.namespace, target.pod
        );

        let mut attached = pods
            .attach(&target.pod, &attach_params(target))
            .await
            .map_err(|e| ClientError::Stream(format!("Failed to attach: {}", e)))?;

        let status = attached.take_status();
        let mut input = attached
            .stdin()
            .ok_or_else(|| ClientError::Stream("attach session has no stdin".to_string()))?;

        let copied = match tokio::io::copy(stdin, &mut input).await {
            Ok(copied) => copied,
            Err(e) => {
                attached.abort();
                return Err(ClientError::Stream(format!("Failed to copy payload: {}", e)));
            }
        };
        if let Err(e) = input.shutdown().await {
            attached.abort();
            return Err(ClientError::Stream(format!("Failed to close stdin: {}", e)));
        }
        drop(input);

        let outcome = match status {
            Some(status) => attach_outcome(status.await),
            None => Ok(()),
        };
        attached
            .join()
            .await
            .map_err(|e| ClientError::Stream(format!("Attach session ended badly: {}", e)))?;
        outcome?;

        debug!("Streamed {} bytes into {}", copied, target.pod);
        Ok(())
    }
}
