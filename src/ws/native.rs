//! Native WebSocket transport — `tokio-tungstenite`.
//!
//! Full implementation with:
//! - Background tokio task for connection management
//! - WS-level ping/pong health check
//! - Exponential backoff reconnection with jitter
//! - Listener fan-out of lifecycle events and inbound text frames
//!
//! Frames are never queued while the socket is down: `send` fails with
//! `NotConnected` and the RPC layer resubmits after the reconnect.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::TransportError;
use crate::rpc::listeners::{ConnectionListener, ListenerId, ListenerRegistry};
use crate::rpc::lock;
use crate::rpc::transport::Transport;
use crate::ws::{ReadyState, WsConfig};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const COMMAND_BUFFER: usize = 1024;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Send(String),
    Disconnect,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum DisconnectReason {
    UserRequested,
    NormalClose,
    PongTimeout,
    RateLimited,
    Error(String),
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    listeners: Arc<ListenerRegistry>,
    cmd_rx: mpsc::Receiver<Command>,
    reconnect_attempts: u32,
    ready_state: Arc<AtomicU16>,
}

impl TaskState {
    fn set_ready(&self, state: ReadyState) {
        self.ready_state.store(state as u16, Ordering::SeqCst);
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect && self.reconnect_attempts < self.config.max_reconnect_attempts
    }

    fn give_up(&self) {
        self.set_ready(ReadyState::Closed);
        tracing::error!(
            "Giving up on {} after {} reconnect attempt(s)",
            self.config.url,
            self.reconnect_attempts
        );
        self.listeners
            .failure(&TransportError::ReconnectExhausted(self.reconnect_attempts));
    }
}

struct Running {
    url: String,
    cmd_tx: mpsc::Sender<Command>,
    handle: JoinHandle<()>,
}

impl Running {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

// ─── Public WsTransport ──────────────────────────────────────────────────────

/// Native WebSocket transport using `tokio-tungstenite`.
///
/// Uses a background tokio task for connection management. `connect` must be
/// called from within a tokio runtime.
pub struct WsTransport {
    config: Mutex<WsConfig>,
    listeners: Arc<ListenerRegistry>,
    ready_state: Arc<AtomicU16>,
    running: Mutex<Option<Running>>,
}

impl WsTransport {
    /// Create a new transport. Does not connect yet.
    pub fn new(config: WsConfig) -> Self {
        Self {
            config: Mutex::new(config),
            listeners: Arc::new(ListenerRegistry::new()),
            ready_state: Arc::new(AtomicU16::new(ReadyState::Closed as u16)),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> WsConfig {
        lock(&self.config).clone()
    }

    /// Whether the WebSocket is currently open.
    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.ready_state.load(Ordering::SeqCst))
    }

    /// Force a fresh connection attempt.
    ///
    /// Tears down the current connection (if any), resets the reconnect
    /// counter, and spawns a new background task.
    pub fn restart_connection(&self) -> Result<(), TransportError> {
        if self.ready_state() == ReadyState::Connecting {
            tracing::info!("Already connecting, skipping restart");
            return Ok(());
        }

        tracing::info!("Manual reconnection requested");
        self.disconnect();
        self.connect()
    }
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &lock(&self.config).url)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl Transport for WsTransport {
    fn set_url(&self, url: &str) {
        lock(&self.config).url = url.to_string();
    }

    /// Spawns the background task that manages the connection, ping/pong
    /// keepalive and reconnection.
    ///
    /// While a task is running for the same URL this is a no-op. If `set_url`
    /// changed the URL since, the old task is stopped and a new one started.
    fn connect(&self) -> Result<(), TransportError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let config = self.config();

        let mut running = lock(&self.running);
        if let Some(current) = running.as_ref().filter(|r| r.is_alive()) {
            if current.url == config.url {
                return Ok(());
            }
            tracing::info!(
                "URL changed from {} to {}, restarting connection",
                current.url,
                config.url
            );
        }
        if let Some(old) = running.take() {
            // Aborted rather than asked to close, so it cannot touch the
            // shared ready state after the new task starts.
            old.handle.abort();
            if self.ready_state() == ReadyState::Open {
                self.listeners.disconnected();
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        self.ready_state
            .store(ReadyState::Connecting as u16, Ordering::SeqCst);

        let url = config.url.clone();
        let state = TaskState {
            config,
            listeners: Arc::clone(&self.listeners),
            cmd_rx,
            reconnect_attempts: 0,
            ready_state: Arc::clone(&self.ready_state),
        };

        let handle = runtime.spawn(run_task(state));
        *running = Some(Running {
            url,
            cmd_tx,
            handle,
        });
        Ok(())
    }

    /// Ask the background task to close gracefully. Does not wait for it.
    fn disconnect(&self) {
        if let Some(running) = lock(&self.running).take() {
            if running.cmd_tx.try_send(Command::Disconnect).is_err() {
                running.handle.abort();
            }
        }
        self.ready_state
            .store(ReadyState::Closed as u16, Ordering::SeqCst);
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        match lock(&self.running).as_ref() {
            Some(running) => running.cmd_tx.try_send(Command::Send(text)).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    TransportError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => TransportError::NotConnected,
            }),
            None => Err(TransportError::NotConnected),
        }
    }

    fn on(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(running) = lock(&self.running).take() {
            running.handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        state.set_ready(ReadyState::Connecting);
        let timeout = Duration::from_millis(state.config.connect_timeout_ms);
        let (sink, stream) = match attempt_connect(&state.config.url, timeout).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("WebSocket connection failed: {}", e);
                state
                    .listeners
                    .failure(&TransportError::ConnectionFailed(e));

                if !state.should_reconnect() {
                    state.give_up();
                    return;
                }
                if !backoff_sleep(&mut state, false).await {
                    state.set_ready(ReadyState::Closed);
                    return;
                }
                continue;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        state.reconnect_attempts = 0;
        state.set_ready(ReadyState::Open);
        tracing::info!("WebSocket open: {}", state.config.url);
        state.listeners.connected();

        // ── 3. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut state, sink, stream).await;

        // ── 4. Post-disconnect decision ──────────────────────────────────
        state.set_ready(ReadyState::Closed);
        state.listeners.disconnected();

        let rate_limited = match reason {
            DisconnectReason::UserRequested => return,
            DisconnectReason::RateLimited => true,
            DisconnectReason::NormalClose
            | DisconnectReason::PongTimeout
            | DisconnectReason::Error(_) => false,
        };

        if !state.should_reconnect() {
            state.give_up();
            return;
        }
        if !backoff_sleep(&mut state, rate_limited).await {
            state.set_ready(ReadyState::Closed);
            return;
        }
    }
}

/// The inner connected loop. Runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let ping_dur = Duration::from_millis(state.config.ping_interval_ms as u64);
    let pong_dur = Duration::from_millis(state.config.pong_timeout_ms as u64);

    let mut ping_interval = tokio::time::interval(ping_dur);
    ping_interval.reset(); // skip immediate first tick

    let mut pong_deadline: Option<tokio::time::Instant> = None;

    // Reset whenever a pong deadline is set; parked far in the future otherwise.
    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        state.listeners.event(text_str);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline = None;
                        pong_sleep.as_mut().reset(far_future);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!("WebSocket closed by server: {} {}", code, reason);
                        return classify_close(code, reason);
                    }
                    Some(Ok(_)) => {} // Binary and raw frames are ignored
                    Some(Err(e)) => {
                        let reason = e.to_string();
                        tracing::error!("WebSocket error: {}", reason);
                        return DisconnectReason::Error(reason);
                    }
                    None => {
                        return DisconnectReason::Error("Stream ended".into());
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!("Send failed: {}", e);
                        }
                    }
                    Some(Command::Disconnect) => {
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                    None => {
                        // WsTransport dropped, exit cleanly
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Ping interval ─────────────────────────────────────────
            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(Message::Ping(Vec::new().into())).await {
                    tracing::warn!("Failed to send ping: {}", e);
                } else if pong_deadline.is_none() {
                    let deadline = tokio::time::Instant::now() + pong_dur;
                    pong_deadline = Some(deadline);
                    pong_sleep.as_mut().reset(deadline);
                }
            }

            // ── d) Pong timeout ──────────────────────────────────────────
            () = &mut pong_sleep, if pong_deadline.is_some() => {
                tracing::warn!(
                    "Pong timeout: no response within {}ms",
                    state.config.pong_timeout_ms
                );
                let _ = sink.close().await;
                return DisconnectReason::PongTimeout;
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish a WebSocket connection within `timeout`.
async fn attempt_connect(
    url: &str,
    timeout: Duration,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), String> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| "Connection timeout".to_string())?
        .map_err(|e| e.to_string())?;

    Ok(ws_stream.split())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.as_str().to_string()),
        None => (1006, "No close frame".into()),
    }
}

fn classify_close(code: u16, reason: String) -> DisconnectReason {
    match code {
        1000 => DisconnectReason::NormalClose,
        1008 => DisconnectReason::RateLimited,
        _ => DisconnectReason::Error(reason),
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Delay before reconnect attempt `attempt` (1-based), jitter included.
fn backoff_delay(attempt: u32, base_ms: u32, rate_limited: bool, jitter_seed: u32) -> u32 {
    let exp = attempt.saturating_sub(1).min(10);
    let base = base_ms.saturating_mul(1u32 << exp);

    let (jitter_max, cap) = if rate_limited {
        (1000u32, 300_000u32) // up to 5 minutes for rate limits
    } else {
        (500u32, 60_000u32) // up to 60 seconds normally
    };

    let jitter = jitter_seed % jitter_max;
    base.saturating_add(jitter).min(cap)
}

/// Sleep before the next attempt. Returns `false` if the transport was
/// disconnected or dropped meanwhile.
async fn backoff_sleep(state: &mut TaskState, rate_limited: bool) -> bool {
    state.reconnect_attempts += 1;
    state.set_ready(ReadyState::Connecting);

    let delay = backoff_delay(
        state.reconnect_attempts,
        state.config.base_reconnect_delay_ms,
        rate_limited,
        rand::random::<u32>(),
    );

    tracing::info!(
        "Reconnect attempt {}/{} in {}ms{}",
        state.reconnect_attempts,
        state.config.max_reconnect_attempts,
        delay,
        if rate_limited { " (rate-limited)" } else { "" }
    );

    let sleep = tokio::time::sleep(Duration::from_millis(delay as u64));
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = state.cmd_rx.recv() => match cmd {
                Some(Command::Send(_)) => {
                    tracing::debug!("Dropping frame sent while reconnecting");
                }
                Some(Command::Disconnect) | None => return false,
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
