use super::budget::TimeBudget;
use super::error::InstantiateError;
use crate::build::{Build, BuildRequest};
use crate::client::{BuildGenerator, ClientError, IMAGE_STREAM_TAGS_KIND};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// Creates the build, waiting out image stream tags that do not exist yet
pub struct BuildLauncher {
    generator: Arc<dyn BuildGenerator>,
    poll_interval: Duration,
}

impl BuildLauncher {
    pub fn new(generator: Arc<dyn BuildGenerator>, poll_interval: Duration) -> Self {
        Self {
            generator,
            poll_interval,
        }
    }

    /// Calls the generator until it succeeds, fails for a reason other than
    /// a missing image stream tag, or the budget runs out
    pub async fn launch(
        &self,
        request: &BuildRequest,
        budget: &TimeBudget,
    ) -> Result<Build, InstantiateError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let last_error = match self.generator.instantiate(request).await {
                Ok(build) => {
                    info!(
                        build = build.name(),
                        namespace = build.namespace(),
                        attempt,
                        "Created build from {}",
                        request.name()
                    );
                    return Ok(build);
                }
                Err(e) if is_missing_image_stream_tag(&e) => {
                    debug!(
                        build_config = request.name(),
                        attempt, "Image stream tag not available yet: {}", e
                    );
                    e
                }
                Err(e) => {
                    debug!(build_config = request.name(), attempt, "Failed to instantiate: {}", e);
                    return Err(InstantiateError::LaunchFailed {
                        name: request.name().to_string(),
                        source: e,
                    });
                }
            };

            let remaining = budget.remaining();
            if remaining.is_zero() {
                return Err(InstantiateError::LaunchTimedOut {
                    name: request.name().to_string(),
                    timeout: budget.timeout(),
                    last_error: last_error.to_string(),
                });
            }
            sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

/// The only generator failure worth retrying: the source image the build
/// depends on may still be on its way into the image stream
pub fn is_missing_image_stream_tag(err: &ClientError) -> bool {
    err.not_found_kind() == Some(IMAGE_STREAM_TAGS_KIND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockGenerator;
    use tokio::time::Instant;

    fn missing_tag() -> ClientError {
        ClientError::not_found(IMAGE_STREAM_TAGS_KIND, "base:latest")
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_missing_image_stream_tag(&missing_tag()));
        assert!(!is_missing_image_stream_tag(&ClientError::not_found(
            "buildconfigs",
            "app"
        )));
        assert!(!is_missing_image_stream_tag(&ClientError::conflict(
            "imagestreamtags",
            "base:latest"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_tag_is_retried_until_created() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_responses([
            Err(missing_tag()),
            Err(missing_tag()),
            Err(missing_tag()),
            Ok(Build::new("demo", "app-1")),
        ]);
        let launcher = BuildLauncher::new(generator.clone(), Duration::from_secs(1));

        let start = Instant::now();
        let budget = TimeBudget::start(Duration::from_secs(300));
        let build = launcher
            .launch(&BuildRequest::new("demo", "app"), &budget)
            .await
            .unwrap();

        assert_eq!(build.name(), "app-1");
        assert_eq!(generator.calls(), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_not_found_fails_fast() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_responses([
            Err(ClientError::not_found("buildconfigs", "app")),
            Ok(Build::new("demo", "app-1")),
        ]);
        let launcher = BuildLauncher::new(generator.clone(), Duration::from_secs(1));

        let start = Instant::now();
        let budget = TimeBudget::start(Duration::from_secs(300));
        let err = launcher
            .launch(&BuildRequest::new("demo", "app"), &budget)
            .await
            .unwrap_err();

        assert!(matches!(err, InstantiateError::LaunchFailed { .. }));
        assert_eq!(err.status_code(), 404);
        assert_eq!(generator.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_bounds_retries() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_responses((0..100).map(|_| Err(missing_tag())));
        let launcher = BuildLauncher::new(generator.clone(), Duration::from_secs(1));

        let start = Instant::now();
        let budget = TimeBudget::start(Duration::from_millis(4500));
        let err = launcher
            .launch(&BuildRequest::new("demo", "app"), &budget)
            .await
            .unwrap_err();

        assert!(start.elapsed() <= Duration::from_millis(4500) + Duration::from_secs(1));
        assert_eq!(err.status_code(), 504);
        match err {
            InstantiateError::LaunchTimedOut { last_error, .. } => {
                assert!(last_error.contains("imagestreamtags"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(generator.calls(), 6);
    }
}
