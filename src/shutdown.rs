use anyhow::{Context, Result};
use tokio::signal;

/// Ctrl+C, plus SIGTERM on unix so a service manager stop also shuts down
/// cleanly.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: signal::unix::Signal,
}

impl ShutdownSignal {
    /// Installs the SIGTERM handler right away, so a stop that arrives
    /// before the first `recv` is not lost.
    pub fn new() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal::unix::signal(signal::unix::SignalKind::terminate())
                .context("Failed to listen for SIGTERM")?,
        })
    }

    /// Wait for the first shutdown request and name it.
    pub async fn recv(&mut self) -> Result<&'static str> {
        #[cfg(unix)]
        {
            tokio::select! {
                res = signal::ctrl_c() => {
                    res.context("Failed to listen for Ctrl+C")?;
                    Ok("Ctrl+C")
                }
                _ = self.terminate.recv() => Ok("SIGTERM"),
            }
        }
        #[cfg(not(unix))]
        {
            signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
            Ok("Ctrl+C")
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_requests_shutdown() {
        let mut shutdown = ShutdownSignal::new().unwrap();

        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let received = tokio::time::timeout(Duration::from_secs(2), shutdown.recv())
            .await
            .expect("SIGTERM was not delivered")
            .unwrap();
        assert_eq!(received, "SIGTERM");
    }
}
