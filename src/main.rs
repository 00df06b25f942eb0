mod detector;
mod error;
mod settings;
mod shutdown;

use anyhow::{Context, Result};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use kvlink_lib::constants::DEFAULT_PORT;
use kvlink_lib::{BackoffPolicy, DeviceClass, DeviceRegistry, LinkConfig, MatchThresholds, StationConfig, spawn_station};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use detector::FileDetector;
use settings::Settings;
use shutdown::ShutdownSignal;

/// Bridges a test station's screen verdict and heartbeat to a PLC.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PLC IP address. Defaults to the last one used.
    #[arg(long)]
    host: Option<String>,

    /// Station identifier (T1, T2, D1, D2, NFC). Defaults to the last one used.
    #[arg(short, long)]
    device: Option<String>,

    /// Expected NFC reader model, NFC station only.
    #[arg(long)]
    nfc_model: Option<String>,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Where the last used host, device and NFC model are kept.
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Template scores written by the screen matcher.
    #[arg(long, default_value = "screen_scores.txt")]
    detector_file: PathBuf,

    #[arg(long, default_value_t = 500)]
    heartbeat_interval_ms: u64,

    #[arg(long, default_value_t = 500)]
    report_interval_ms: u64,

    /// Bound on each connect, write and read.
    #[arg(long, default_value_t = 2000)]
    io_timeout_ms: u64,

    /// Longest delay between cycles while the PLC keeps failing.
    #[arg(long, default_value_t = 5000)]
    max_backoff_ms: u64,

    #[arg(long, default_value_t = 0.6)]
    fail_threshold: f32,

    #[arg(long, default_value_t = 0.6)]
    pass_threshold: f32,

    #[arg(long, default_value_t = 0.4)]
    front_threshold: f32,

    #[arg(long, default_value_t = 0.6)]
    nfc_threshold: f32,

    /// Optional directory for daily rolling log files, in addition to the console.
    #[arg(short, long)]
    log_dir: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

impl Cli {
    fn link_config(&self, host: &str) -> LinkConfig {
        LinkConfig {
            port: self.port,
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            report_interval: Duration::from_millis(self.report_interval_ms),
            backoff: BackoffPolicy {
                max_interval_ms: self.max_backoff_ms,
                ..BackoffPolicy::default()
            },
            ..LinkConfig::new(host)
        }
    }

    fn thresholds(&self) -> MatchThresholds {
        MatchThresholds {
            fail: self.fail_threshold,
            pass: self.pass_threshold,
            front: self.front_threshold,
            nfc_model: self.nfc_threshold,
        }
    }
}

fn setup_logging(log_dir: Option<&Path>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false);

    let (file_layer, guard) = if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory at: {:?}", dir))?;
        let appender = tracing_appender::rolling::daily(dir, "kvlink.log");
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, RUST_LOG wins over both
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        info!("Logging to directory: {:?}", dir);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_dir.as_deref(), &cli.verbose)?;

    let mut settings = Settings::load(&cli.settings).context("Failed to load settings")?;
    if let Some(host) = &cli.host {
        settings.host = host.clone();
    }
    if let Some(device) = &cli.device {
        settings.device = device.clone();
    }
    if let Some(model) = &cli.nfc_model {
        settings.nfc_model = model.clone();
    }

    let registry = DeviceRegistry::builtin();
    let nfc_model = settings.nfc_model().map(str::to_owned);
    let config = StationConfig::resolve(cli.link_config(&settings.host), &registry, &settings.device, nfc_model)
        .with_context(|| format!("Invalid station configuration for device {:?}", settings.device))?;

    settings.device = config.device.id.clone();
    if let Err(e) = settings.save(&cli.settings) {
        warn!(error = %e, "Could not save settings");
    }

    let nfc_model = match config.device.class {
        DeviceClass::Nfc => {
            if config.nfc_model.is_none() {
                warn!("NFC station without a model name, only `nfc` score lines will confirm the reader");
            }
            config.nfc_model.clone()
        }
        DeviceClass::Standard => None,
    };
    let detector = FileDetector::new(
        cli.detector_file.clone(),
        cli.thresholds(),
        config.device.class,
        config.link.io_timeout,
    )
    .with_nfc_model(nfc_model);

    let mut shutdown = ShutdownSignal::new()?;
    let cancel = CancellationToken::new();
    let station = spawn_station(&config, detector, cancel);

    let reason = shutdown.recv().await?;
    info!("{reason} received, shutting down");

    let stats = station.shutdown().await.context("Station worker panicked")?;
    info!(
        heartbeat_cycles = stats.heartbeat.cycles,
        heartbeat_failures = stats.heartbeat.failures,
        report_cycles = stats.reporter.cycles,
        report_failures = stats.reporter.failures,
        "Station stopped"
    );
    Ok(())
}
