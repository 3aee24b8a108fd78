//! HTTP client for the builds API
//!
//! Talks to the `build.openshift.io/v1` group of an API server:
//!
//! - `POST .../buildconfigs/{name}/instantiate` creates a build
//! - `GET .../builds/{name}` reads a build
//! - `PUT .../builds/{name}` replaces a build, guarded by its resource version
//!
//! Failure responses carry a `Status` document which is decoded into
//! [`ClientError`], so callers can tell a missing image stream tag from a
//! missing build config and a version conflict from anything else.

use super::error::{ClientError, Status};
use super::{BuildGenerator, BuildsClient};
use crate::build::{Build, BuildRequest};
use crate::config::ClusterConfig;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

const BUILD_API_VERSION: &str = "build.openshift.io/v1";
const BUILD_API_PREFIX: &str = "/apis/build.openshift.io/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Typed<'a, T: Serialize> {
    kind: &'static str,
    api_version: &'static str,
    #[serde(flatten)]
    object: &'a T,
}

pub struct RestClient {
    server: String,
    token: Option<String>,
    http_client: Client,
}

impl RestClient {
    pub fn new(config: &ClusterConfig) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            server: config.server.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            http_client,
        })
    }

    pub fn build_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}{}/namespaces/{}/builds/{}",
            self.server, BUILD_API_PREFIX, namespace, name
        )
    }

    pub fn instantiate_url(&self, namespace: &str, build_config: &str) -> String {
        format!(
            "{}{}/namespaces/{}/buildconfigs/{}/instantiate",
            self.server, BUILD_API_PREFIX, namespace, build_config
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        kind: &str,
        name: &str,
    ) -> Result<T, ClientError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Transport(format!("request for {} {} timed out", kind, name))
            } else {
                ClientError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("API server returned {} for {} {}: {}", status, kind, name, body);
            return Err(error_from_response(status.as_u16(), &body, kind, name));
        }

        response.json::<T>().await.map_err(|e| {
            error!("Failed to decode {} {}: {}", kind, name, e);
            ClientError::Decode(e.to_string())
        })
    }
}

/// Maps a non-success response to a typed error, falling back to the HTTP
/// status when the body is not a `Status` document
pub fn error_from_response(code: u16, body: &str, kind: &str, name: &str) -> ClientError {
    match serde_json::from_str::<Status>(body) {
        Ok(status) if status.kind == "Status" => {
            let status = if status.code == 0 {
                Status { code, ..status }
            } else {
                status
            };
            ClientError::from_status(status, kind, name)
        }
        _ => ClientError::from_status(
            Status::failure(code, "", format!("HTTP {}: {}", code, body.trim())),
            kind,
            name,
        ),
    }
}

#[async_trait]
impl BuildGenerator for RestClient {
    async fn instantiate(&self, request: &BuildRequest) -> Result<Build, ClientError> {
        let url = self.instantiate_url(request.namespace(), request.name());
        debug!("Instantiating build config {}/{}", request.namespace(), request.name());

        let body = Typed {
            kind: "BuildRequest",
            api_version: BUILD_API_VERSION,
            object: request,
        };
        self.send(
            self.http_client.post(&url).json(&body),
            "buildconfigs",
            request.name(),
        )
        .await
    }
}

#[async_trait]
impl BuildsClient for RestClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Build, ClientError> {
        let url = self.build_url(namespace, name);
        self.send(self.http_client.get(&url), "builds", name).await
    }

    async fn update(&self, build: &Build) -> Result<Build, ClientError> {
        let url = self.build_url(build.namespace(), build.name());
        self.send(self.http_client.put(&url).json(build), "builds", build.name())
            .await
    }
}
