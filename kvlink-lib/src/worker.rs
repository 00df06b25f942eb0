//! Cycle pacing shared by the heartbeat and status loops.

use crate::config::BackoffPolicy;
use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Counters a worker hands back when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub failures: u64,
}

/// Decides how long to wait before the next cycle.
///
/// A healthy worker runs on its fixed cadence. After a failed cycle the wait
/// grows exponentially, capped by the policy, and snaps back on the first
/// success.
#[derive(Debug)]
pub struct CyclePacer {
    interval: Duration,
    policy: BackoffPolicy,
    backoff: ExponentialBackoff,
    consecutive_failures: u32,
}

impl CyclePacer {
    pub fn new(interval: Duration, policy: &BackoffPolicy) -> Self {
        Self {
            interval,
            policy: policy.clone(),
            backoff: policy.build(),
            consecutive_failures: 0,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn on_success(&mut self) -> Duration {
        if self.consecutive_failures > 0 {
            self.consecutive_failures = 0;
            self.backoff.reset();
        }
        self.interval
    }

    pub fn on_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        // First failure keeps the normal cadence
        if self.consecutive_failures == 1 {
            return self.interval;
        }
        let delay = self.backoff.next_backoff().unwrap_or_else(|| self.policy.max_interval());
        delay.max(self.interval)
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
pub async fn pause(cancel: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            initial_interval_ms: 1_000,
            max_interval_ms: 4_000,
            multiplier: 2.0,
            randomization_factor: 0.0,
        }
    }

    #[test]
    fn test_backoff_grows_and_resets() {
        let mut pacer = CyclePacer::new(Duration::from_millis(500), &policy());
        assert_eq!(pacer.on_success(), Duration::from_millis(500));

        let delays: Vec<u128> = (0..5).map(|_| pacer.on_failure().as_millis()).collect();
        assert_eq!(delays, vec![500, 1_000, 2_000, 4_000, 4_000]);
        assert_eq!(pacer.consecutive_failures(), 5);

        assert_eq!(pacer.on_success(), Duration::from_millis(500));
        assert_eq!(pacer.consecutive_failures(), 0);
        assert_eq!(pacer.on_failure().as_millis(), 500);
        assert_eq!(pacer.on_failure().as_millis(), 1_000);
    }

    #[test]
    fn test_backoff_never_below_cadence() {
        let small = BackoffPolicy {
            initial_interval_ms: 10,
            max_interval_ms: 20,
            ..policy()
        };
        let mut pacer = CyclePacer::new(Duration::from_millis(500), &small);
        for _ in 0..4 {
            assert_eq!(pacer.on_failure(), Duration::from_millis(500));
        }
    }

    #[tokio::test]
    async fn test_pause_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!pause(&cancel, Duration::from_secs(60)).await);
    }
}
