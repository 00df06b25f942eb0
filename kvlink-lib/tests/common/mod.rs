//! Common test utilities and shared imports

// Not every test file uses every helper
#![allow(dead_code)]

#[allow(unused_imports)]
pub use kvlink_lib::{
    BackoffPolicy, Command, DmAddress, HeartbeatOutcome, HeartbeatService, HeartbeatToken, LinkConfig, LinkError,
    LinkErrorKind, PlcLink, ScreenDetector, ScreenState, StatusReporter,
};

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Level;

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .with_test_writer()
            .try_init();
    });
}

pub fn addr(token: &str) -> DmAddress {
    DmAddress::new(token).expect("valid address")
}

/// Link settings tuned for loopback tests.
pub fn fast_config(port: u16) -> LinkConfig {
    LinkConfig {
        port,
        io_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(20),
        report_interval: Duration::from_millis(20),
        backoff: BackoffPolicy {
            initial_interval_ms: 20,
            max_interval_ms: 50,
            multiplier: 2.0,
            randomization_factor: 0.0,
        },
        ..LinkConfig::new("127.0.0.1")
    }
}

pub fn link_to(port: u16) -> PlcLink {
    PlcLink::from_config(&fast_config(port))
}

/// A port with nothing listening on it.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    listener.local_addr().expect("local addr").port()
}

/// Loopback stand-in for the PLC.
///
/// Records every request frame it receives and answers `RD` from a script
/// (falling back to `default_reply` once the script runs dry).
pub struct MockPlc {
    addr: SocketAddr,
    commands: mpsc::UnboundedReceiver<Command>,
    seen: Arc<Mutex<Vec<Command>>>,
    task: JoinHandle<()>,
}

impl MockPlc {
    pub async fn start(replies: Vec<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock PLC");
        Self::serve(listener, replies, "00000")
    }

    pub async fn start_on(port: u16) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.expect("rebind mock PLC");
        Self::serve(listener, Vec::new(), "00000")
    }

    fn serve(listener: TcpListener, replies: Vec<&'static str>, default_reply: &'static str) -> Self {
        let addr = listener.local_addr().expect("local addr");
        let (tx, commands) = mpsc::unbounded_channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(VecDeque::from(replies)));

        let seen_in_task = Arc::clone(&seen);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                let seen = Arc::clone(&seen_in_task);
                let script = Arc::clone(&script);
                tokio::spawn(async move {
                    handle_connection(stream, tx, seen, script, default_reply).await;
                });
            }
        });

        Self {
            addr,
            commands,
            seen,
            task,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the next request, failing the test after a few seconds.
    pub async fn next_command(&mut self) -> Command {
        tokio::time::timeout(Duration::from_secs(5), self.commands.recv())
            .await
            .expect("mock PLC timed out waiting for a command")
            .expect("mock PLC channel closed")
    }

    /// Whatever is already queued, without waiting.
    pub fn drain(&mut self) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.commands.try_recv() {
            out.push(cmd);
        }
        out
    }

    pub fn seen(&self) -> Vec<Command> {
        self.seen.lock().expect("lock").clone()
    }
}

impl Drop for MockPlc {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    tx: mpsc::UnboundedSender<Command>,
    seen: Arc<Mutex<Vec<Command>>>,
    script: Arc<Mutex<VecDeque<&'static str>>>,
    default_reply: &'static str,
) {
    let mut pending = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);

        while let Some(end) = pending.iter().position(|&b| b == b'\r') {
            let frame: Vec<u8> = pending.drain(..=end).collect();
            let command = Command::parse(&frame).expect("mock PLC received a malformed frame");
            seen.lock().expect("lock").push(command.clone());
            let is_read = command.expects_response();
            let _ = tx.send(command);

            if is_read {
                let reply = script.lock().expect("lock").pop_front().unwrap_or(default_reply);
                if stream.write_all(reply.as_bytes()).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Accepts connections and never answers.
pub struct SilentPlc {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl SilentPlc {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind silent PLC");
        let addr = listener.local_addr().expect("local addr");
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        Self { addr, task }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for SilentPlc {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Replays a fixed list of states, then keeps repeating the last one.
pub struct ScriptedDetector {
    script: VecDeque<ScreenState>,
    last: ScreenState,
    samples: Arc<AtomicUsize>,
}

impl ScriptedDetector {
    pub fn new(states: impl IntoIterator<Item = ScreenState>) -> Self {
        Self {
            script: states.into_iter().collect(),
            last: ScreenState::Disappeared,
            samples: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sample_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.samples)
    }
}

impl ScreenDetector for ScriptedDetector {
    async fn sample_screen_state(&mut self) -> ScreenState {
        self.samples.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}
