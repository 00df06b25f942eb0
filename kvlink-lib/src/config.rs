use crate::constants::{
    DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_IO_TIMEOUT, DEFAULT_PORT, DEFAULT_REPORT_INTERVAL,
    MAX_RECOMMENDED_REPORT_INTERVAL, MIN_RECOMMENDED_REPORT_INTERVAL,
};
use crate::error::ConfigError;
use crate::registry::{DeviceProfile, DeviceRegistry};
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Delay growth applied after consecutive failed cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    #[serde(default = "BackoffPolicy::default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Upper bound on any single delay
    #[serde(default = "BackoffPolicy::default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "BackoffPolicy::default_multiplier")]
    pub multiplier: f64,

    /// Jitter in range [0.0, 1.0]
    #[serde(default)]
    pub randomization_factor: f64,
}

impl BackoffPolicy {
    fn default_initial_interval_ms() -> u64 {
        500
    }

    fn default_max_interval_ms() -> u64 {
        5_000
    }

    fn default_multiplier() -> f64 {
        2.0
    }

    /// The failure backoff never gives up; cycles keep running forever.
    pub fn build(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.initial_interval_ms.max(1)),
            current_interval: Duration::from_millis(self.initial_interval_ms.max(1)),
            max_interval: Duration::from_millis(self.max_interval_ms.max(self.initial_interval_ms)),
            randomization_factor: self.randomization_factor.clamp(0.0, 1.0),
            multiplier: self.multiplier.max(1.0),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms.max(self.initial_interval_ms))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: Self::default_initial_interval_ms(),
            max_interval_ms: Self::default_max_interval_ms(),
            multiplier: Self::default_multiplier(),
            randomization_factor: 0.0,
        }
    }
}

/// Where the PLC is and how patiently to talk to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub host: String,
    #[serde(default = "LinkConfig::default_port")]
    pub port: u16,
    /// Bound on each connect, write and read
    #[serde(default = "LinkConfig::default_io_timeout", with = "millis")]
    pub io_timeout: Duration,
    #[serde(default = "LinkConfig::default_heartbeat_interval", with = "millis")]
    pub heartbeat_interval: Duration,
    #[serde(default = "LinkConfig::default_report_interval", with = "millis")]
    pub report_interval: Duration,
    #[serde(default)]
    pub backoff: BackoffPolicy,
}

impl LinkConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            io_timeout: DEFAULT_IO_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            backoff: BackoffPolicy::default(),
        }
    }

    fn default_port() -> u16 {
        DEFAULT_PORT
    }

    fn default_io_timeout() -> Duration {
        DEFAULT_IO_TIMEOUT
    }

    fn default_heartbeat_interval() -> Duration {
        DEFAULT_HEARTBEAT_INTERVAL
    }

    fn default_report_interval() -> Duration {
        DEFAULT_REPORT_INTERVAL
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("PLC host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidConfig("PLC port is 0".to_string()));
        }
        for (name, value) in [
            ("io_timeout", self.io_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("report_interval", self.report_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidConfig(format!("{name} must be non-zero")));
            }
        }
        if !(MIN_RECOMMENDED_REPORT_INTERVAL..=MAX_RECOMMENDED_REPORT_INTERVAL).contains(&self.report_interval) {
            warn!(
                report_interval_ms = self.report_interval.as_millis() as u64,
                "Report interval outside the recommended 200-500 ms range"
            );
        }
        Ok(())
    }
}

/// Everything the two workers need, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    pub link: LinkConfig,
    pub device: DeviceProfile,
    /// Expected NFC reader model screen, NFC stations only
    pub nfc_model: Option<String>,
}

impl StationConfig {
    /// Resolve the device identifier and validate the link settings.
    /// Any failure here is fatal.
    pub fn resolve(
        link: LinkConfig,
        registry: &DeviceRegistry,
        device_id: &str,
        nfc_model: Option<String>,
    ) -> Result<Self, ConfigError> {
        link.validate()?;
        let device = registry.lookup(device_id)?.clone();
        Ok(Self {
            link,
            device,
            nfc_model,
        })
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
