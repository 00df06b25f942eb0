use crate::codec::{DmAddress, encode_write_vector};
use crate::config::{BackoffPolicy, LinkConfig};
use crate::constants::STATUS_WIDTH;
use crate::detector::ScreenDetector;
use crate::error::LinkError;
use crate::link::PlcLink;
use crate::state::{ScreenState, StatusVector};
use crate::worker::{CyclePacer, WorkerStats, pause};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Push one screen state to a result register as a `WRS` of four flags.
pub async fn report_state(link: &PlcLink, address: &DmAddress, state: ScreenState) -> Result<StatusVector, LinkError> {
    let vector = StatusVector::from(state);
    let frame = encode_write_vector(address, STATUS_WIDTH, &vector.words());
    link.exchange(&frame, false).await?;
    Ok(vector)
}

/// Samples the detector and mirrors its verdict into the PLC, once per cycle.
pub struct StatusReporter<D> {
    link: PlcLink,
    result_addr: DmAddress,
    interval: Duration,
    backoff: BackoffPolicy,
    detector: D,
}

impl<D: ScreenDetector> StatusReporter<D> {
    pub fn new(link: PlcLink, result_addr: DmAddress, config: &LinkConfig, detector: D) -> Self {
        Self {
            link,
            result_addr,
            interval: config.report_interval,
            backoff: config.backoff.clone(),
            detector,
        }
    }

    /// One sample-and-send. The sample is taken even if the send then fails.
    pub async fn cycle(&mut self) -> (ScreenState, Result<StatusVector, LinkError>) {
        let state = self.detector.sample_screen_state().await;
        let result = report_state(&self.link, &self.result_addr, state).await;
        (state, result)
    }

    pub async fn run(mut self, cancel: CancellationToken) -> WorkerStats {
        info!(
            endpoint = self.link.endpoint(),
            result = %self.result_addr,
            interval_ms = self.interval.as_millis() as u64,
            "Status reporter started"
        );
        let mut pacer = CyclePacer::new(self.interval, &self.backoff);
        let mut stats = WorkerStats::default();
        let mut last_state = None;

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let (state, result) = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.cycle() => outcome,
            };
            stats.cycles += 1;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let delay = match result {
                Ok(vector) => {
                    if last_state != Some(state) {
                        info!(%state, %vector, elapsed_ms, "Screen state changed");
                        last_state = Some(state);
                    } else {
                        debug!(%state, elapsed_ms, "Status sent");
                    }
                    pacer.on_success()
                }
                Err(e) => {
                    stats.failures += 1;
                    let delay = pacer.on_failure();
                    warn!(
                        %state,
                        error = %e,
                        kind = %e.kind(),
                        elapsed_ms,
                        consecutive = pacer.consecutive_failures(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Status report failed"
                    );
                    delay
                }
            };

            if !pause(&cancel, delay).await {
                break;
            }
        }

        info!(cycles = stats.cycles, failures = stats.failures, "Status reporter stopped");
        stats
    }
}
