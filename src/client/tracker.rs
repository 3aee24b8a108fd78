use super::{BuildsClient, PhaseTracker, RunningWait, WaitError};
use crate::build::Phase;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Phase tracker that re-reads the build at a fixed interval
pub struct PollingPhaseTracker {
    client: Arc<dyn BuildsClient>,
    interval: Duration,
}

impl PollingPhaseTracker {
    pub fn new(client: Arc<dyn BuildsClient>, interval: Duration) -> Self {
        Self { client, interval }
    }
}

#[async_trait]
impl PhaseTracker for PollingPhaseTracker {
    async fn wait_for_running(
        &self,
        namespace: &str,
        name: &str,
        timeout: Duration,
    ) -> Result<RunningWait, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut observed = None;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.client.get(namespace, name).await {
                Ok(build) => {
                    debug!(build = name, namespace, phase = %build.phase(), attempt, "Observed build phase");
                    match build.phase() {
                        Phase::New | Phase::Pending => observed = Some(build),
                        Phase::Running
                        | Phase::Complete
                        | Phase::Failed
                        | Phase::Error
                        | Phase::Cancelled => return Ok(RunningWait::Reached(build)),
                    }
                }
                Err(e) if e.is_not_found() => return Err(WaitError::Deleted),
                Err(e) => return Err(WaitError::Client(e)),
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(build = name, namespace, attempt, "Gave up waiting for build to run");
                return Ok(RunningWait::TimedOut(observed));
            }
            sleep(self.interval.min(deadline - now)).await;
        }
    }
}
