//! Best-effort cancellation of builds the upload gave up on
//!
//! A [`CancellationGuard`] is armed when a request enters the flow and is
//! disarmed only when the build ended on its own or the upload succeeded.
//! Releasing an armed guard marks the last known build snapshot as cancelled,
//! retrying through version conflicts for a bounded time. Cleanup failures
//! are logged and never reach the caller.

use crate::build::Build;
use crate::client::{BuildsClient, ClientError};
use crate::config::UploadConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// What releasing a guard did
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// Disarmed, or no build had been created yet
    NotNeeded,
    /// The cancellation flag was stored
    Requested(Build),
    /// Cleanup stopped without storing the flag
    GaveUp(ClientError),
}

pub struct CancellationGuard {
    client: Arc<dyn BuildsClient>,
    snapshot: Option<Build>,
    armed: bool,
    poll_interval: Duration,
    poll_duration: Duration,
}

impl CancellationGuard {
    pub fn arm(client: Arc<dyn BuildsClient>, config: &UploadConfig) -> Self {
        Self {
            client,
            snapshot: None,
            armed: true,
            poll_interval: config.cancel_poll_interval,
            poll_duration: config.cancel_poll_duration,
        }
    }

    /// Records the most recent snapshot of the build to cancel
    pub fn track(&mut self, build: &Build) {
        self.snapshot = Some(build.clone());
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Runs the compensating cancellation if still armed
    pub async fn release(mut self) -> CancelOutcome {
        let snapshot = self.snapshot.take();
        if !std::mem::replace(&mut self.armed, false) {
            return CancelOutcome::NotNeeded;
        }
        match snapshot {
            Some(build) => {
                cancel_build(
                    self.client.clone(),
                    build,
                    self.poll_interval,
                    self.poll_duration,
                )
                .await
            }
            None => CancelOutcome::NotNeeded,
        }
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(build) = self.snapshot.take() else {
            return;
        };

        // Dropped mid-flight, e.g. the request future was abandoned
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                let (interval, duration) = (self.poll_interval, self.poll_duration);
                handle.spawn(async move {
                    cancel_build(client, build, interval, duration).await;
                });
            }
            Err(_) => warn!(
                build = build.name(),
                "No runtime available to cancel abandoned build"
            ),
        }
    }
}

/// Marks `build` as cancelled, re-reading it whenever the write loses a race
pub async fn cancel_build(
    client: Arc<dyn BuildsClient>,
    build: Build,
    interval: Duration,
    duration: Duration,
) -> CancelOutcome {
    let name = build.name().to_string();
    let namespace = build.namespace().to_string();
    info!(build = %name, namespace = %namespace, "Cancelling build");

    let result = retry_on_conflict(client.as_ref(), build, interval, duration, |b| {
        b.status.cancelled = true;
    })
    .await;

    match result {
        Ok(updated) => {
            debug!(build = %name, "Build marked for cancellation");
            CancelOutcome::Requested(updated)
        }
        Err(e) if e.is_conflict() => {
            warn!(build = %name, "Gave up cancelling build after {:?}: {}", duration, e);
            CancelOutcome::GaveUp(e)
        }
        Err(e) => {
            warn!(build = %name, "Unable to cancel build: {}", e);
            CancelOutcome::GaveUp(e)
        }
    }
}

/// Applies `mutate` and writes the build back. On a version conflict the
/// latest copy is fetched and the change re-applied, every `interval`,
/// until it is stored or `duration` has passed. The last conflict is
/// returned when time runs out.
pub async fn retry_on_conflict<F>(
    client: &dyn BuildsClient,
    mut build: Build,
    interval: Duration,
    duration: Duration,
    mut mutate: F,
) -> Result<Build, ClientError>
where
    F: FnMut(&mut Build) + Send,
{
    let deadline = Instant::now() + duration;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        mutate(&mut build);

        match client.update(&build).await {
            Ok(updated) => return Ok(updated),
            Err(e) if e.is_conflict() => {
                debug!(build = build.name(), attempt, "Update conflicted, re-reading build");
                let now = Instant::now();
                if now >= deadline {
                    return Err(e);
                }
                build = client.get(build.namespace(), build.name()).await?;
                sleep(interval.min(deadline - now)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Phase;
    use crate::client::mock::MockBuildStore;

    fn config() -> UploadConfig {
        UploadConfig::defaults()
    }

    fn store_with_build() -> (Arc<MockBuildStore>, Build) {
        let store = Arc::new(MockBuildStore::new());
        let build = store.insert(Build::new("demo", "app-1").with_phase(Phase::Pending));
        (store, build)
    }

    #[tokio::test(start_paused = true)]
    async fn test_armed_guard_cancels() {
        let (store, build) = store_with_build();
        let mut guard = CancellationGuard::arm(store.clone(), &config());
        guard.track(&build);

        let outcome = guard.release().await;

        assert!(matches!(outcome, CancelOutcome::Requested(_)));
        assert!(store.cancellation_requested("demo", "app-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_guard_does_nothing() {
        let (store, build) = store_with_build();
        let mut guard = CancellationGuard::arm(store.clone(), &config());
        guard.track(&build);
        guard.disarm();

        assert_eq!(guard.release().await, CancelOutcome::NotNeeded);
        assert!(store.updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_without_build_does_nothing() {
        let (store, _) = store_with_build();
        let guard = CancellationGuard::arm(store.clone(), &config());

        assert!(guard.is_armed());
        assert_eq!(guard.release().await, CancelOutcome::NotNeeded);
        assert!(store.updates().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflict_refetches_and_retries() {
        let (store, build) = store_with_build();
        store.conflict_next_updates(1);

        let start = Instant::now();
        let outcome = cancel_build(
            store.clone(),
            build,
            Duration::from_millis(500),
            Duration::from_secs(30),
        )
        .await;

        assert!(matches!(outcome, CancelOutcome::Requested(_)));
        assert_eq!(store.updates().len(), 2);
        assert_eq!(store.get_calls(), 1);
        assert_eq!(start.elapsed(), Duration::from_millis(500));
        assert!(store.cancellation_requested("demo", "app-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_conflict_gives_up_at_deadline() {
        let (store, build) = store_with_build();
        store.conflict_next_updates(usize::MAX);

        let start = Instant::now();
        let outcome = cancel_build(
            store.clone(),
            build,
            Duration::from_millis(500),
            Duration::from_secs(30),
        )
        .await;

        assert!(matches!(outcome, CancelOutcome::GaveUp(ref e) if e.is_conflict()));
        assert_eq!(start.elapsed(), Duration::from_secs(30));
        assert_eq!(store.updates().len(), 61);
        assert!(!store.cancellation_requested("demo", "app-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_stop_immediately() {
        let (store, build) = store_with_build();
        store.fail_updates(ClientError::Api {
            code: 403,
            reason: "Forbidden".to_string(),
            message: "builds is forbidden".to_string(),
        });

        let outcome = cancel_build(
            store.clone(),
            build,
            Duration::from_millis(500),
            Duration::from_secs(30),
        )
        .await;

        assert!(matches!(outcome, CancelOutcome::GaveUp(ClientError::Api { code: 403, .. })));
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_armed_guard_cancels_in_background() {
        let (store, build) = store_with_build();
        let mut guard = CancellationGuard::arm(store.clone(), &config());
        guard.track(&build);
        drop(guard);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.cancellation_requested("demo", "app-1"));
    }
}
