//! # Host-link wire codec
//!
//! The PLC speaks a line-oriented ASCII protocol. Every request is a single
//! line terminated by a carriage return:
//!
//! | Request | Frame | Reply |
//! |---|---|---|
//! | read word | `RD DM<addr>\r` | fixed-width frame, value at bytes `[2..5]` |
//! | write word | `WR DM<addr> <value>\r` | none expected |
//! | write words | `WRS DM<addr> <n> <v1> .. <vn>\r` | none expected |
//!
//! The free `encode_*` functions produce the raw frames; [`Command`] wraps them
//! in a typed value that can also be parsed back from bytes, which is what the
//! mock PLC endpoints in the tests rely on.

use crate::constants::{
    DM_PREFIX, OP_READ, OP_WRITE, OP_WRITE_SEQUENTIAL, RESPONSE_SIZE, TERMINATOR, VALUE_OFFSET,
    VALUE_WIDTH,
};
use crate::error::{ConfigError, LinkError};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A data memory register number, e.g. `6501` in `DM6501`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DmAddress(String);

impl DmAddress {
    pub fn new(token: impl Into<String>) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidAddress(token));
        }
        Ok(Self(token))
    }

    /// For compile-time tables that are checked by tests.
    pub(crate) fn from_static(token: &'static str) -> Self {
        debug_assert!(token.bytes().all(|b| b.is_ascii_digit()));
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DM_PREFIX, self.0)
    }
}

impl FromStr for DmAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both `6501` and `DM6501`
        let token = s.strip_prefix(DM_PREFIX).unwrap_or(s);
        Self::new(token)
    }
}

impl TryFrom<String> for DmAddress {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DmAddress> for String {
    fn from(value: DmAddress) -> Self {
        value.0
    }
}

/// `RD DM<address>\r`
pub fn encode_read(address: &DmAddress) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_slice(OP_READ.as_bytes());
    buf.put_u8(b' ');
    put_address(&mut buf, address);
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// `WR DM<address> <value>\r`
pub fn encode_write_scalar(address: &DmAddress, value: u16) -> Bytes {
    let mut buf = BytesMut::with_capacity(24);
    buf.put_slice(OP_WRITE.as_bytes());
    buf.put_u8(b' ');
    put_address(&mut buf, address);
    buf.put_u8(b' ');
    buf.put_slice(value.to_string().as_bytes());
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

/// `WRS DM<address> <width> <v1> .. <vn>\r`
///
/// `width` goes on the wire as given; callers pass `vector.len()`.
pub fn encode_write_vector(address: &DmAddress, width: usize, vector: &[u16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(24 + vector.len() * 2);
    buf.put_slice(OP_WRITE_SEQUENTIAL.as_bytes());
    buf.put_u8(b' ');
    put_address(&mut buf, address);
    buf.put_u8(b' ');
    buf.put_slice(width.to_string().as_bytes());
    for value in vector {
        buf.put_u8(b' ');
        buf.put_slice(value.to_string().as_bytes());
    }
    buf.put_u8(TERMINATOR);
    buf.freeze()
}

fn put_address(buf: &mut BytesMut, address: &DmAddress) {
    buf.put_slice(DM_PREFIX.as_bytes());
    buf.put_slice(address.as_str().as_bytes());
}

/// Extract the 3-byte heartbeat value from a `RD` reply.
///
/// The reply carries a 2-byte header before the value. Anything shorter than
/// a full frame is a framing error; a reply starting with `E` is the PLC's
/// own error code.
pub fn decode_heartbeat(raw: &[u8]) -> Result<[u8; VALUE_WIDTH], LinkError> {
    if raw.len() < RESPONSE_SIZE {
        if raw.len() >= 2 && raw[0] == b'E' && raw[1].is_ascii_digit() {
            return Err(LinkError::PlcError(String::from_utf8_lossy(&raw[..2]).into_owned()));
        }
        return Err(LinkError::ShortReply {
            expected: RESPONSE_SIZE,
            actual: raw.len(),
        });
    }
    let mut token = [0u8; VALUE_WIDTH];
    token.copy_from_slice(&raw[VALUE_OFFSET..VALUE_OFFSET + VALUE_WIDTH]);
    Ok(token)
}

/// A typed host-link request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Read { address: DmAddress },
    WriteScalar { address: DmAddress, value: u16 },
    WriteVector { address: DmAddress, values: Vec<u16> },
}

impl Command {
    pub fn address(&self) -> &DmAddress {
        match self {
            Command::Read { address }
            | Command::WriteScalar { address, .. }
            | Command::WriteVector { address, .. } => address,
        }
    }

    /// Only reads get a reply worth waiting for.
    pub fn expects_response(&self) -> bool {
        matches!(self, Command::Read { .. })
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Command::Read { address } => encode_read(address),
            Command::WriteScalar { address, value } => encode_write_scalar(address, *value),
            Command::WriteVector { address, values } => encode_write_vector(address, values.len(), values),
        }
    }

    /// Parse a single CR-terminated request frame.
    pub fn parse(frame: &[u8]) -> Result<Self, LinkError> {
        let body = frame
            .strip_suffix(&[TERMINATOR])
            .ok_or_else(|| LinkError::Malformed("missing CR terminator".to_string()))?;
        let text = std::str::from_utf8(body).map_err(|_| LinkError::Malformed("frame is not ASCII".to_string()))?;

        let mut fields = text.split(' ');
        let opcode = fields.next().unwrap_or_default();
        let address = fields
            .next()
            .ok_or_else(|| LinkError::Malformed(format!("{opcode}: missing device")))?;
        let address = address
            .strip_prefix(DM_PREFIX)
            .ok_or_else(|| LinkError::Malformed(format!("unsupported device {address:?}")))?;
        let address = DmAddress::new(address).map_err(|e| LinkError::Malformed(e.to_string()))?;
        let rest: Vec<&str> = fields.collect();

        match opcode {
            OP_READ => {
                if !rest.is_empty() {
                    return Err(LinkError::Malformed(format!("RD takes no operands, got {rest:?}")));
                }
                Ok(Command::Read { address })
            }
            OP_WRITE => match rest.as_slice() {
                [value] => Ok(Command::WriteScalar {
                    address,
                    value: parse_word(value)?,
                }),
                _ => Err(LinkError::Malformed(format!("WR takes one value, got {rest:?}"))),
            },
            OP_WRITE_SEQUENTIAL => {
                let (width, values) = rest
                    .split_first()
                    .ok_or_else(|| LinkError::Malformed("WRS: missing width".to_string()))?;
                let width: usize = width
                    .parse()
                    .map_err(|_| LinkError::Malformed(format!("WRS: bad width {width:?}")))?;
                let values = values.iter().map(|v| parse_word(v)).collect::<Result<Vec<_>, _>>()?;
                if width != values.len() {
                    return Err(LinkError::Malformed(format!(
                        "WRS: width {width} but {} values",
                        values.len()
                    )));
                }
                Ok(Command::WriteVector { address, values })
            }
            other => Err(LinkError::Malformed(format!("unknown opcode {other:?}"))),
        }
    }
}

fn parse_word(token: &str) -> Result<u16, LinkError> {
    token
        .parse()
        .map_err(|_| LinkError::Malformed(format!("bad value {token:?}")))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Read { address } => write!(f, "{OP_READ} {address}"),
            Command::WriteScalar { address, value } => write!(f, "{OP_WRITE} {address} {value}"),
            Command::WriteVector { address, values } => {
                write!(f, "{OP_WRITE_SEQUENTIAL} {address} {}", values.len())?;
                for v in values {
                    write!(f, " {v}")?;
                }
                Ok(())
            }
        }
    }
}
