use crate::config::StationConfig;
use crate::detector::ScreenDetector;
use crate::heartbeat::HeartbeatService;
use crate::link::PlcLink;
use crate::reporter::StatusReporter;
use crate::worker::WorkerStats;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The two running workers of one station.
pub struct StationHandle {
    cancel: CancellationToken,
    heartbeat: JoinHandle<WorkerStats>,
    reporter: JoinHandle<WorkerStats>,
}

/// Final counters of both workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationStats {
    pub heartbeat: WorkerStats,
    pub reporter: WorkerStats,
}

/// Start the heartbeat and status workers as independent tasks.
///
/// They share nothing but the cancellation token: each gets its own link
/// handle and opens its own connections.
pub fn spawn_station<D>(config: &StationConfig, detector: D, cancel: CancellationToken) -> StationHandle
where
    D: ScreenDetector + 'static,
{
    let link = PlcLink::from_config(&config.link);
    info!(
        device = %config.device.id,
        class = %config.device.class,
        endpoint = link.endpoint(),
        "Starting station workers"
    );

    let heartbeat = HeartbeatService::new(link.clone(), &config.device.addresses, &config.link);
    let reporter = StatusReporter::new(link, config.device.addresses.result.clone(), &config.link, detector);

    StationHandle {
        heartbeat: tokio::spawn(heartbeat.run(cancel.child_token())),
        reporter: tokio::spawn(reporter.run(cancel.child_token())),
        cancel,
    }
}

impl StationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for both workers to stop. They only stop once cancelled.
    pub async fn join(self) -> Result<StationStats, JoinError> {
        let (heartbeat, reporter) = tokio::join!(self.heartbeat, self.reporter);
        Ok(StationStats {
            heartbeat: heartbeat?,
            reporter: reporter?,
        })
    }

    /// Cancel and wait.
    pub async fn shutdown(self) -> Result<StationStats, JoinError> {
        self.cancel();
        self.join().await
    }
}
