//! Request-level composition of the binary build flow
//!
//! `BinaryInstantiateHandler::handle` runs, in order:
//!
//! 1. arm a [`CancellationGuard`]
//! 2. [`BuildLauncher::launch`] against the shared [`TimeBudget`]
//! 3. [`PhaseWaiter::wait_for_running`] with what is left of the budget
//! 4. [`UploadStreamer::stream`] into the build pod
//! 5. release the guard, which cancels the build unless a checkpoint disarmed it
//!
//! The outcome of steps 2 to 4 is what the caller gets; step 5 only logs.

use super::budget::TimeBudget;
use super::error::InstantiateError;
use super::guard::CancellationGuard;
use super::launcher::BuildLauncher;
use super::streamer::UploadStreamer;
use super::waiter::PhaseWaiter;
use crate::build::{BinaryBuildRequestOptions, Build, BuildRequest};
use crate::client::{
    AttachTransport, BuildGenerator, BuildsClient, PhaseTracker, PollingPhaseTracker,
};
use crate::config::UploadConfig;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{info, warn};

/// Status code of a successful instantiation
pub const CREATED: u16 = 201;

/// Instantiates builds without an upload
pub struct BuildInstantiator {
    generator: Arc<dyn BuildGenerator>,
}

impl BuildInstantiator {
    pub fn new(generator: Arc<dyn BuildGenerator>) -> Self {
        Self { generator }
    }

    pub async fn instantiate(&self, mut request: BuildRequest) -> Result<Build, InstantiateError> {
        request.ensure_trigger_cause();
        self.generator
            .instantiate(&request)
            .await
            .map_err(|source| InstantiateError::LaunchFailed {
                name: request.name().to_string(),
                source,
            })
    }
}

pub struct BinaryInstantiateHandler {
    launcher: BuildLauncher,
    waiter: PhaseWaiter,
    streamer: UploadStreamer,
    builds: Arc<dyn BuildsClient>,
    config: UploadConfig,
}

impl BinaryInstantiateHandler {
    pub fn new(
        generator: Arc<dyn BuildGenerator>,
        builds: Arc<dyn BuildsClient>,
        tracker: Arc<dyn PhaseTracker>,
        transport: Arc<dyn AttachTransport>,
        config: UploadConfig,
    ) -> Self {
        Self {
            launcher: BuildLauncher::new(generator, config.launch_poll_interval),
            waiter: PhaseWaiter::new(tracker),
            streamer: UploadStreamer::new(transport),
            builds,
            config,
        }
    }

    /// Handler whose phase tracking polls `builds`
    pub fn polling(
        generator: Arc<dyn BuildGenerator>,
        builds: Arc<dyn BuildsClient>,
        transport: Arc<dyn AttachTransport>,
        config: UploadConfig,
    ) -> Self {
        let tracker = Arc::new(PollingPhaseTracker::new(
            builds.clone(),
            config.phase_poll_interval,
        ));
        Self::new(generator, builds, tracker, transport, config)
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Starts a build from `options` and streams `payload` into it
    pub async fn handle(
        &self,
        options: &BinaryBuildRequestOptions,
        payload: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<Build, InstantiateError> {
        let budget = TimeBudget::start(self.config.timeout);
        let mut guard = CancellationGuard::arm(self.builds.clone(), &self.config);

        let result = self.run(options, payload, &budget, &mut guard).await;
        match &result {
            Ok(build) => info!(build = build.name(), "Binary build started"),
            Err(e) => warn!(build = e.name(), status = e.status_code(), "Binary build rejected: {}", e),
        }

        guard.release().await;
        result
    }

    async fn run(
        &self,
        options: &BinaryBuildRequestOptions,
        payload: &mut (dyn AsyncRead + Unpin + Send),
        budget: &TimeBudget,
        guard: &mut CancellationGuard,
    ) -> Result<Build, InstantiateError> {
        let mut request = options.to_build_request();
        request.ensure_trigger_cause();

        let build = self.launcher.launch(&request, budget).await?;
        guard.track(&build);

        let latest = self.waiter.wait_for_running(&build, budget, guard).await?;
        self.streamer.stream(latest, payload, guard).await
    }
}

/// Renders a handler result the way the API server answers: `201` with the
/// build, or the error's status code with a `Status` document
pub fn respond(result: &Result<Build, InstantiateError>) -> (u16, Value) {
    match result {
        Ok(build) => match serde_json::to_value(build) {
            Ok(body) => (CREATED, body),
            Err(e) => {
                let status = crate::client::Status::failure(500, "InternalError", e.to_string());
                (500, status_value(&status))
            }
        },
        Err(err) => (err.status_code(), status_value(&err.to_status())),
    }
}

fn status_value(status: &crate::client::Status) -> Value {
    serde_json::to_value(status).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{Phase, MANUAL_TRIGGER_MESSAGE};
    use crate::client::mock::{MockAttachTransport, MockBuildStore, MockGenerator};
    use crate::client::ClientError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_plain_instantiate_defaults_trigger() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_response(Ok(Build::new("demo", "app-1")));
        let instantiator = BuildInstantiator::new(generator.clone());

        let build = instantiator
            .instantiate(BuildRequest::new("demo", "app"))
            .await
            .unwrap();

        assert_eq!(build.name(), "app-1");
        let requests = generator.requests();
        assert_eq!(requests[0].triggered_by[0].message, MANUAL_TRIGGER_MESSAGE);
        assert!(requests[0].binary.is_none());
    }

    #[tokio::test]
    async fn test_plain_instantiate_does_not_retry() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_response(Err(ClientError::not_found("imagestreamtags", "base:latest")));
        let instantiator = BuildInstantiator::new(generator.clone());

        let err = instantiator
            .instantiate(BuildRequest::new("demo", "app"))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 404);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_failure_has_nothing_to_cancel() {
        let store = Arc::new(MockBuildStore::new());
        let generator = Arc::new(MockGenerator::backed_by(store.clone()));
        generator.add_response(Err(ClientError::Api {
            code: 403,
            reason: "Forbidden".to_string(),
            message: "buildconfigs.build.openshift.io \"app\" is forbidden".to_string(),
        }));
        let handler = BinaryInstantiateHandler::polling(
            generator,
            store.clone(),
            Arc::new(MockAttachTransport::new()),
            UploadConfig::defaults(),
        );

        let mut payload: &[u8] = b"data";
        let result = handler
            .handle(&BinaryBuildRequestOptions::new("demo", "app"), &mut payload)
            .await;

        assert_eq!(result.unwrap_err().status_code(), 403);
        assert!(store.updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_sends_binary_request() {
        let store = Arc::new(MockBuildStore::new());
        let generator = Arc::new(MockGenerator::backed_by(store.clone()));
        generator.add_response(Ok(Build::new("demo", "app-1").with_phase(Phase::Running)));
        let handler = BinaryInstantiateHandler::polling(
            generator.clone(),
            store.clone(),
            Arc::new(MockAttachTransport::new()),
            UploadConfig::defaults().with_timeout(Duration::from_secs(10)),
        );

        let mut options = BinaryBuildRequestOptions::new("demo", "app");
        options.as_file = "app.jar".to_string();
        let mut payload: &[u8] = b"data";
        handler.handle(&options, &mut payload).await.unwrap();

        let request = &generator.requests()[0];
        assert_eq!(request.binary.as_ref().unwrap().as_file, "app.jar");
        assert_eq!(request.triggered_by[0].message, MANUAL_TRIGGER_MESSAGE);
        assert!(request.revision.is_none());
    }

    #[test]
    fn test_respond_created() {
        let build = Build::new("demo", "app-1").with_phase(Phase::Running);
        let (code, body) = respond(&Ok(build));

        assert_eq!(code, CREATED);
        assert_eq!(body["metadata"]["name"], "app-1");
        assert_eq!(body["status"]["phase"], "Running");
    }

    #[test]
    fn test_respond_error() {
        let err = InstantiateError::StartTimeout {
            name: "app-1".to_string(),
            timeout: Duration::from_secs(300),
            elapsed: Duration::from_secs(300),
        };
        let (code, body) = respond(&Err(err));

        assert_eq!(code, 504);
        assert_eq!(body["kind"], "Status");
        assert_eq!(body["reason"], "Timeout");
        assert_eq!(body["code"], 504);
        assert_eq!(body["details"]["name"], "app-1");
    }
}
