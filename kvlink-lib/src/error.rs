use std::io;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`LinkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum LinkErrorKind {
    Unreachable,
    Timeout,
    Malformed,
}

/// Stage of an exchange an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Connect,
    Write,
    Read,
}

/// Wire-level failure of a single PLC exchange.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("PLC at {endpoint} unreachable during {stage}: {source}")]
    Unreachable {
        endpoint: String,
        stage: Stage,
        #[source]
        source: io::Error,
    },

    #[error("PLC at {endpoint} timed out during {stage} after {timeout:?}")]
    Timeout {
        endpoint: String,
        stage: Stage,
        timeout: Duration,
    },

    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("Short reply: expected {expected} bytes, got {actual}")]
    ShortReply { expected: usize, actual: usize },

    #[error("PLC rejected the command with error code {0}")]
    PlcError(String),
}

impl LinkError {
    pub fn kind(&self) -> LinkErrorKind {
        match self {
            LinkError::Unreachable { .. } => LinkErrorKind::Unreachable,
            LinkError::Timeout { .. } => LinkErrorKind::Timeout,
            LinkError::Malformed(_) | LinkError::ShortReply { .. } | LinkError::PlcError(_) => {
                LinkErrorKind::Malformed
            }
        }
    }
}

/// Startup configuration failure. Always fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown device identifier {0:?}")]
    UnknownDevice(String),

    #[error("Invalid DM address {0:?}: expected decimal digits")]
    InvalidAddress(String),

    #[error("Device identifier {0:?} registered twice")]
    DuplicateDevice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The primary error type for the `kvlink-lib` library.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
