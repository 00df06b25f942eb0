use crate::codec::{Command, DmAddress};
use crate::config::{BackoffPolicy, LinkConfig};
use crate::error::LinkError;
use crate::link::PlcLink;
use crate::registry::DeviceAddressSet;
use crate::worker::{CyclePacer, WorkerStats, pause};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::time::{Duration, Instant};
use strum_macros::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The PLC's liveness pulse. It flips between two values and expects the
/// host to answer with the other one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum HeartbeatToken {
    #[strum(to_string = "100")]
    Low = 100,
    #[strum(to_string = "200")]
    High = 200,
}

impl HeartbeatToken {
    /// Interpret the 3-byte value field of a `RD` reply.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(raw).ok()?;
        if text.len() != 3 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::try_from(text.parse::<u16>().ok()?).ok()
    }

    pub fn complement(self) -> Self {
        match self {
            HeartbeatToken::Low => HeartbeatToken::High,
            HeartbeatToken::High => HeartbeatToken::Low,
        }
    }
}

/// Result of one heartbeat cycle that reached the PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    Echoed {
        received: HeartbeatToken,
        sent: HeartbeatToken,
    },
    /// The register held something other than a pulse value; nothing written
    NoSignal { raw: [u8; 3] },
}

/// Keeps the PLC's watchdog fed by echoing its pulse.
///
/// Each cycle waits for the pulse (`RD` on the receive register) and responds
/// with its complement (`WR` on the send register). The two exchanges use
/// separate connections. A failed cycle writes nothing and the next read
/// picks the alternation back up.
#[derive(Debug, Clone)]
pub struct HeartbeatService {
    link: PlcLink,
    send_addr: DmAddress,
    recv_addr: DmAddress,
    interval: Duration,
    backoff: BackoffPolicy,
}

impl HeartbeatService {
    pub fn new(link: PlcLink, addresses: &DeviceAddressSet, config: &LinkConfig) -> Self {
        Self {
            link,
            send_addr: addresses.heartbeat_send.clone(),
            recv_addr: addresses.heartbeat_recv.clone(),
            interval: config.heartbeat_interval,
            backoff: config.backoff.clone(),
        }
    }

    pub async fn step(&self) -> Result<HeartbeatOutcome, LinkError> {
        let raw = self.link.read(&self.recv_addr).await?;
        let Some(received) = HeartbeatToken::parse(&raw) else {
            return Ok(HeartbeatOutcome::NoSignal { raw });
        };

        let sent = received.complement();
        let reply = Command::WriteScalar {
            address: self.send_addr.clone(),
            value: sent.into(),
        };
        self.link.send(&reply).await?;
        Ok(HeartbeatOutcome::Echoed { received, sent })
    }

    /// Loop until `cancel` fires. Link failures are logged and never end the loop.
    pub async fn run(self, cancel: CancellationToken) -> WorkerStats {
        info!(
            endpoint = self.link.endpoint(),
            recv = %self.recv_addr,
            send = %self.send_addr,
            "Heartbeat service started"
        );
        let mut pacer = CyclePacer::new(self.interval, &self.backoff);
        let mut stats = WorkerStats::default();

        while !cancel.is_cancelled() {
            let started = Instant::now();
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.step() => result,
            };
            stats.cycles += 1;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let delay = match result {
                Ok(HeartbeatOutcome::Echoed { received, sent }) => {
                    debug!(%received, %sent, elapsed_ms, "Heartbeat received/sent");
                    pacer.on_success()
                }
                Ok(HeartbeatOutcome::NoSignal { raw }) => {
                    debug!(raw = %String::from_utf8_lossy(&raw), elapsed_ms, "No heartbeat pulse");
                    pacer.on_success()
                }
                Err(e) => {
                    stats.failures += 1;
                    let delay = pacer.on_failure();
                    warn!(
                        error = %e,
                        kind = %e.kind(),
                        elapsed_ms,
                        consecutive = pacer.consecutive_failures(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Heartbeat cycle failed"
                    );
                    delay
                }
            };

            if !pause(&cancel, delay).await {
                break;
            }
        }

        info!(cycles = stats.cycles, failures = stats.failures, "Heartbeat service stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parse() {
        assert_eq!(HeartbeatToken::parse(b"100"), Some(HeartbeatToken::Low));
        assert_eq!(HeartbeatToken::parse(b"200"), Some(HeartbeatToken::High));
        assert_eq!(HeartbeatToken::parse(b"000"), None);
        assert_eq!(HeartbeatToken::parse(b"150"), None);
        assert_eq!(HeartbeatToken::parse(b" 10"), None);
        assert_eq!(HeartbeatToken::parse(&[0xff, 0x00, 0x31]), None);
    }

    #[test]
    fn test_complement() {
        assert_eq!(HeartbeatToken::Low.complement(), HeartbeatToken::High);
        assert_eq!(HeartbeatToken::High.complement(), HeartbeatToken::Low);
        assert_eq!(u16::from(HeartbeatToken::Low.complement()), 200);
        assert_eq!(HeartbeatToken::High.to_string(), "200");
    }
}
