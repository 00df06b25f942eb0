pub mod codec;
pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod heartbeat;
pub mod link;
pub mod registry;
pub mod reporter;
pub mod state;
pub mod station;
pub mod worker;


// Re-export the main types for easy access
pub use codec::{Command, DmAddress, decode_heartbeat, encode_read, encode_write_scalar, encode_write_vector};
pub use config::{BackoffPolicy, LinkConfig, StationConfig};
pub use detector::{MatchScores, MatchThresholds, ScreenDetector};
pub use error::{ConfigError, Error, LinkError, LinkErrorKind};
pub use heartbeat::{HeartbeatOutcome, HeartbeatService, HeartbeatToken};
pub use link::PlcLink;
pub use registry::{DeviceAddressSet, DeviceClass, DeviceProfile, DeviceRegistry};
pub use reporter::{StatusReporter, report_state};
pub use state::{DetectorMatches, ScreenState, StatusVector, state_to_vector};
pub use station::{StationHandle, StationStats, spawn_station};
pub use worker::WorkerStats;
