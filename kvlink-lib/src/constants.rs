// Protocol constants for the PLC host link

use std::time::Duration;

/// TCP port the PLC listens on for host-link commands
pub const DEFAULT_PORT: u16 = 8501;

/// Request terminator
pub const TERMINATOR: u8 = b'\r';

/// Device-area prefix for data memory registers
pub const DM_PREFIX: &str = "DM";

/// Opcode: read one data memory word
pub const OP_READ: &str = "RD";

/// Opcode: write one data memory word
pub const OP_WRITE: &str = "WR";

/// Opcode: write consecutive data memory words
pub const OP_WRITE_SEQUENTIAL: &str = "WRS";

/// Bytes read back for a `RD` request
pub const RESPONSE_SIZE: usize = 5;

/// Offset of the value inside a `RD` reply
pub const VALUE_OFFSET: usize = 2;

/// Width of the value inside a `RD` reply
pub const VALUE_WIDTH: usize = 3;

/// Number of flags in a status vector
pub const STATUS_WIDTH: usize = 4;

/// Default bound on each connect/write/read stage
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Default pause between heartbeat cycles
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);

/// Default pause between status report cycles
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// Recommended bounds for the report cadence
pub const MIN_RECOMMENDED_REPORT_INTERVAL: Duration = Duration::from_millis(200);
pub const MAX_RECOMMENDED_REPORT_INTERVAL: Duration = Duration::from_millis(500);
