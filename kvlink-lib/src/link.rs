use crate::codec::{Command, DmAddress, decode_heartbeat};
use crate::config::LinkConfig;
use crate::constants::{RESPONSE_SIZE, TERMINATOR, VALUE_WIDTH};
use crate::error::{LinkError, Stage};
use bytes::Bytes;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Request/response access to one PLC.
///
/// Every call opens its own TCP connection and drops it before returning, so
/// a `PlcLink` holds no session and can be cloned into each worker.
#[derive(Debug, Clone)]
pub struct PlcLink {
    endpoint: String,
    io_timeout: Duration,
}

impl PlcLink {
    pub fn new(host: &str, port: u16, io_timeout: Duration) -> Self {
        Self {
            endpoint: format!("{host}:{port}"),
            io_timeout,
        }
    }

    pub fn from_config(config: &LinkConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            io_timeout: config.io_timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Connect, write `request`, optionally read one reply frame, close.
    ///
    /// With `expect_response` the reply is read until [`RESPONSE_SIZE`] bytes
    /// arrived, a line ending arrived or the peer closed; without it the call
    /// returns once the request is flushed.
    pub async fn exchange(&self, request: &[u8], expect_response: bool) -> Result<Option<Bytes>, LinkError> {
        let mut stream = self.stage(Stage::Connect, TcpStream::connect(&self.endpoint)).await?;
        debug!(
            endpoint = %self.endpoint,
            bytes = hex::encode(request),
            request = %String::from_utf8_lossy(request).trim_end(),
            "PLC write"
        );
        self.stage(Stage::Write, async {
            stream.write_all(request).await?;
            stream.flush().await?;
            Ok::<_, io::Error>(())
        })
        .await?;

        if !expect_response {
            return Ok(None);
        }

        let mut buf = [0u8; RESPONSE_SIZE];
        let filled = self.stage(Stage::Read, read_frame(&mut stream, &mut buf)).await?;
        debug!(endpoint = %self.endpoint, bytes = hex::encode(&buf[..filled]), "PLC read");
        Ok(Some(Bytes::copy_from_slice(&buf[..filled])))
    }

    /// Send a typed command, reading a reply only if the command has one.
    pub async fn send(&self, command: &Command) -> Result<Option<Bytes>, LinkError> {
        self.exchange(&command.encode(), command.expects_response()).await
    }

    /// `RD` one register and return its 3-byte value field.
    pub async fn read(&self, address: &DmAddress) -> Result<[u8; VALUE_WIDTH], LinkError> {
        let command = Command::Read {
            address: address.clone(),
        };
        let reply = self.send(&command).await?.unwrap_or_default();
        decode_heartbeat(&reply)
    }

    async fn stage<T, F>(&self, stage: Stage, fut: F) -> Result<T, LinkError>
    where
        F: Future<Output = io::Result<T>>,
    {
        match timeout(self.io_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(LinkError::Unreachable {
                endpoint: self.endpoint.clone(),
                stage,
                source,
            }),
            Err(_) => Err(LinkError::Timeout {
                endpoint: self.endpoint.clone(),
                stage,
                timeout: self.io_timeout,
            }),
        }
    }
}

// A single read may return part of the frame; keep going until it is full,
// the PLC ends a short reply (`E1\r\n`) or the PLC hangs up.
async fn read_frame<R: AsyncRead + Unpin>(stream: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        if buf[..filled].iter().any(|&b| b == TERMINATOR || b == b'\n') {
            break;
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_from_config_uses_config_endpoint() {
        let config = LinkConfig {
            port: 9000,
            ..LinkConfig::new("192.168.20.10")
        };
        let link = PlcLink::from_config(&config);
        assert_eq!(link.endpoint(), config.endpoint());
        assert_eq!(link.endpoint(), "192.168.20.10:9000");
    }

    #[tokio::test]
    async fn test_read_frame_stops_at_line_ending() {
        let (mut client, mut server) = tokio::io::duplex(64);
        server.write_all(b"E1\r\n").await.unwrap();

        // The writer stays open, so only the line ending can end the read
        let mut buf = [0u8; RESPONSE_SIZE];
        let filled = timeout(Duration::from_millis(500), read_frame(&mut client, &mut buf))
            .await
            .expect("read_frame waited for more bytes")
            .unwrap();
        assert_eq!(&buf[..filled], b"E1\r\n");
        drop(server);
    }

    #[tokio::test]
    async fn test_read_frame_joins_split_reply() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            server.write_all(b"00").await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            server.write_all(b"100\r\n").await.unwrap();
            server
        });

        let mut buf = [0u8; RESPONSE_SIZE];
        let filled = read_frame(&mut client, &mut buf).await.unwrap();
        assert_eq!(&buf[..filled], b"00100");
        drop(writer.await.unwrap());
    }
}
