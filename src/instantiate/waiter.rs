use super::budget::TimeBudget;
use super::error::InstantiateError;
use super::guard::CancellationGuard;
use crate::build::{Build, Phase};
use crate::client::{PhaseTracker, RunningWait, WaitError};
use std::sync::Arc;
use tracing::{debug, info};

/// Waits for a freshly created build to start running
pub struct PhaseWaiter {
    tracker: Arc<dyn PhaseTracker>,
}

impl PhaseWaiter {
    pub fn new(tracker: Arc<dyn PhaseTracker>) -> Self {
        Self { tracker }
    }

    /// Returns the latest snapshot once the build is Running.
    ///
    /// Builds that ended in Error, Failed or Cancelled by themselves disarm
    /// `guard`; every other rejection leaves it armed.
    pub async fn wait_for_running(
        &self,
        build: &Build,
        budget: &TimeBudget,
        guard: &mut CancellationGuard,
    ) -> Result<Build, InstantiateError> {
        let name = build.name().to_string();
        let remaining = budget.remaining();
        debug!(build = %name, "Waiting up to {:?} for build to run", remaining);

        let outcome = self
            .tracker
            .wait_for_running(build.namespace(), build.name(), remaining)
            .await;

        let latest = match outcome {
            Err(WaitError::Deleted) => {
                return Err(InstantiateError::BuildDeletedBeforeStart { name });
            }
            Err(WaitError::Client(source)) => {
                return Err(InstantiateError::WaitObservationFailed { name, source });
            }
            Ok(RunningWait::TimedOut(observed)) => {
                if let Some(observed) = observed {
                    guard.track(&observed);
                }
                return Err(InstantiateError::StartTimeout {
                    name,
                    timeout: budget.timeout(),
                    elapsed: budget.elapsed(),
                });
            }
            Ok(RunningWait::Reached(latest)) => latest,
        };
        guard.track(&latest);

        match latest.phase() {
            Phase::Running => {
                info!(build = %name, "Build is running");
                Ok(latest)
            }
            phase @ (Phase::Error | Phase::Failed | Phase::Cancelled) => {
                guard.disarm();
                Err(InstantiateError::TerminalPhaseRejection {
                    name,
                    phase,
                    reason: latest.status.reason.clone(),
                    message: latest.status.message.clone(),
                })
            }
            phase @ (Phase::New | Phase::Pending | Phase::Complete) => {
                Err(InstantiateError::InvalidPhaseForUpload { name, phase })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockBuildStore;
    use crate::client::ClientError;
    use crate::config::UploadConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Tracker that answers with a fixed outcome
    struct FixedTracker(Result<RunningWait, WaitError>);

    #[async_trait]
    impl PhaseTracker for FixedTracker {
        async fn wait_for_running(
            &self,
            _namespace: &str,
            _name: &str,
            _timeout: Duration,
        ) -> Result<RunningWait, WaitError> {
            self.0.clone()
        }
    }

    async fn wait_with(
        outcome: Result<RunningWait, WaitError>,
    ) -> (Result<Build, InstantiateError>, bool) {
        let waiter = PhaseWaiter::new(Arc::new(FixedTracker(outcome)));
        let mut guard =
            CancellationGuard::arm(Arc::new(MockBuildStore::new()), &UploadConfig::defaults());
        let budget = TimeBudget::start(Duration::from_secs(300));

        let result = waiter
            .wait_for_running(&Build::new("demo", "app-1"), &budget, &mut guard)
            .await;
        let armed = guard.is_armed();
        guard.disarm();
        (result, armed)
    }

    fn reached(phase: Phase) -> Result<RunningWait, WaitError> {
        Ok(RunningWait::Reached(Build::new("demo", "app-1").with_phase(phase)))
    }

    #[tokio::test]
    async fn test_running_proceeds() {
        let (result, armed) = wait_with(reached(Phase::Running)).await;
        assert_eq!(result.unwrap().phase(), Phase::Running);
        assert!(armed);
    }

    #[tokio::test]
    async fn test_self_terminated_phases_disarm() {
        for phase in [Phase::Error, Phase::Failed, Phase::Cancelled] {
            let (result, armed) = wait_with(reached(phase)).await;
            let err = result.unwrap_err();
            assert!(err.build_is_terminal(), "phase {}", phase);
            assert!(!armed, "phase {} must not be cancelled", phase);
        }
    }

    #[tokio::test]
    async fn test_failed_phase_carries_reason() {
        let mut failed = Build::new("demo", "app-1").with_phase(Phase::Failed);
        failed.status.reason = "BuildError".to_string();
        failed.status.message = "exit code 1".to_string();

        let (result, _) = wait_with(Ok(RunningWait::Reached(failed))).await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "build app-1 failed: BuildError: exit code 1"
        );
    }

    #[tokio::test]
    async fn test_other_phases_stay_armed() {
        for phase in [Phase::New, Phase::Pending, Phase::Complete] {
            let (result, armed) = wait_with(reached(phase)).await;
            assert!(matches!(
                result.unwrap_err(),
                InstantiateError::InvalidPhaseForUpload { .. }
            ));
            assert!(armed, "phase {} must stay armed", phase);
        }
    }

    #[tokio::test]
    async fn test_tracker_failures() {
        let (result, armed) = wait_with(Err(WaitError::Deleted)).await;
        assert!(matches!(
            result.unwrap_err(),
            InstantiateError::BuildDeletedBeforeStart { .. }
        ));
        assert!(armed);

        let (result, armed) = wait_with(Err(WaitError::Client(ClientError::Transport(
            "connection refused".to_string(),
        ))))
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, InstantiateError::WaitObservationFailed { .. }));
        assert!(err.to_string().contains("unable to wait for build app-1"));
        assert!(armed);
    }

    #[tokio::test]
    async fn test_timeout_stays_armed() {
        let (result, armed) = wait_with(Ok(RunningWait::TimedOut(None))).await;
        let err = result.unwrap_err();
        assert!(matches!(err, InstantiateError::StartTimeout { .. }));
        assert_eq!(err.status_code(), 504);
        assert_eq!(
            err.to_string(),
            "timed out waiting for build app-1 to start after 300s"
        );
        assert!(armed);
    }
}
