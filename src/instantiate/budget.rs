use std::time::Duration;
use tokio::time::Instant;

/// Wall-clock budget shared by launching a build and waiting for it to run
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    timeout: Duration,
}

impl TimeBudget {
    pub fn start(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.elapsed())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining().is_zero()
    }
}
