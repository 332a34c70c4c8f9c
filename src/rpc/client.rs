//! `RpcClient` — call correlation over a [`Transport`].
//!
//! ```rust,ignore
//! use meridian_sdk::rpc::{MemoryTransport, RpcClient, RpcRequest};
//!
//! let rpc = RpcClient::new(MemoryTransport::new());
//! rpc.connect("wss://node.meridian.network/ws")?;
//!
//! // Callback style
//! rpc.emit::<u64, _>(RpcRequest::new("database", "get_chain_height"), |result| {
//!     println!("{:?}", result);
//! })?;
//!
//! // Future style
//! let height: u64 = rpc.call(RpcRequest::new("database", "get_chain_height")).await?;
//! ```
//!
//! Lifecycle:
//! - `connect()`: calls emitted from here on are held until they can be sent,
//!   so there is no need to wait for the socket before the first call.
//! - `Connected` from the transport: state becomes `Connected` and every
//!   pending call is (re-)sent in id order. Calls stay pending, so a late
//!   answer to an earlier attempt still matches.
//! - Transport drop: state becomes `Disconnected`, pending calls are kept.
//! - Transport gives up reconnecting: every pending call fails.
//! - `disconnect()`: unregisters from the transport, closes it and (by
//!   default) fails every pending call with a connection error.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{RpcError, TransportError};
use crate::rpc::listeners::{ConnectionListener, ListenerId, ListenerRegistry};
use crate::rpc::mapper::{JsonMapper, PayloadMapper};
use crate::rpc::registry::{PendingCall, PendingCallRegistry, Responder};
use crate::rpc::transport::Transport;
use crate::rpc::{lock, CallId, ConnectionState, RequestEnvelope, RpcConfig, RpcRequest};

// ─── Public RpcClient ────────────────────────────────────────────────────────

/// Correlates outbound calls with inbound responses by call id.
///
/// Cheap to clone; clones share one connection and one pending-call registry.
pub struct RpcClient<T: Transport, M: PayloadMapper = JsonMapper> {
    shared: Arc<Shared<T, M>>,
}

impl<T: Transport, M: PayloadMapper> Clone for RpcClient<T, M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport, M: PayloadMapper> std::fmt::Debug for RpcClient<T, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("listeners", &self.shared.listeners.len())
            .finish()
    }
}

impl<T: Transport> RpcClient<T, JsonMapper> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, RpcConfig::default())
    }

    pub fn with_config(transport: T, config: RpcConfig) -> Self {
        Self::from_parts(transport, JsonMapper, config)
    }
}

impl<T: Transport, M: PayloadMapper> RpcClient<T, M> {
    pub fn from_parts(transport: T, mapper: M, config: RpcConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                mapper: Arc::new(mapper),
                config,
                next_id: AtomicU64::new(1),
                pending: PendingCallRegistry::new(),
                listeners: ListenerRegistry::new(),
                state: AtomicU8::new(ConnectionState::Disconnected as u8),
                ever_connected: AtomicBool::new(false),
                connect_requested: AtomicBool::new(false),
                handler: Mutex::new(None),
            }),
        }
    }

    /// Register with the transport (once) and ask it to open `url`.
    ///
    /// The outcome arrives through listeners; `Ok` only means the attempt
    /// was started.
    pub fn connect(&self, url: &str) -> Result<(), RpcError> {
        let shared = &self.shared;
        shared.connect_requested.store(true, Ordering::SeqCst);

        {
            let mut handler = lock(&shared.handler);
            if handler.is_none() {
                let listener: Arc<dyn ConnectionListener> = Arc::new(Handler {
                    shared: Arc::downgrade(shared),
                });
                *handler = Some(shared.transport.on(listener));
            }
        }

        tracing::info!("Connecting to {}", url);
        shared.transport.set_url(url);
        shared.transport.connect().map_err(|e| {
            shared.connect_requested.store(false, Ordering::SeqCst);
            RpcError::from(e)
        })
    }

    /// Close the connection and drop every listener.
    pub fn disconnect(&self) {
        let shared = &self.shared;
        shared.connect_requested.store(false, Ordering::SeqCst);

        let handler = lock(&shared.handler).take();
        if let Some(id) = handler {
            shared.transport.off(id);
        }

        let previous = ConnectionState::from(
            shared
                .state
                .swap(ConnectionState::Disconnected as u8, Ordering::SeqCst),
        );
        shared.transport.disconnect();

        let cancelled = if shared.config.fail_pending_on_disconnect {
            shared.fail_all("client disconnected")
        } else {
            0
        };
        tracing::info!(
            "Disconnected ({} pending call(s) cancelled, {} kept)",
            cancelled,
            shared.pending.len()
        );

        if previous == ConnectionState::Connected {
            shared.listeners.disconnected();
        }
        shared.listeners.clear();
    }

    /// Send `request` and deliver its decoded result to `callback`.
    ///
    /// The callback fires at most once, on whichever thread delivers the
    /// response. If this returns `Err` the callback is never invoked.
    pub fn emit<R, F>(&self, request: RpcRequest, callback: F) -> Result<CallId, RpcError>
    where
        R: DeserializeOwned + 'static,
        F: FnOnce(Result<R, RpcError>) + Send + 'static,
    {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::SeqCst);
        let envelope = RequestEnvelope::new(id, request);
        let text = shared.mapper.encode_request(&envelope)?;

        tracing::debug!(
            "→ call #{} {}.{}",
            id,
            envelope.api(),
            envelope.method_name()
        );

        let mapper = Arc::clone(&shared.mapper);
        let responder: Responder = Box::new(move |result: Result<Value, RpcError>| {
            callback(result.and_then(|value| mapper.decode_result::<R>(value)))
        });

        // Tracked before the frame leaves, so a fast response always finds it.
        if shared
            .pending
            .insert(PendingCall::new(envelope, responder))
            .is_err()
        {
            return Err(RpcError::Encode(format!("call id {} already in use", id)));
        }

        if let Err(err) = shared.transport.send(text) {
            if shared.holds_for_resubmit() {
                tracing::debug!("Call #{} held for resubmission: {}", id, err);
            } else if let Some(call) = shared.pending.remove(id) {
                tracing::warn!("Call #{} not sent: {}", id, err);
                call.complete(Err(err.into()));
            }
        }

        Ok(id)
    }

    /// Future-returning form of [`emit`](Self::emit).
    pub async fn call<R>(&self, request: RpcRequest) -> Result<R, RpcError>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.emit::<R, _>(request, move |result| {
            let _ = tx.send(result);
        })?;
        rx.await
            .map_err(|_| RpcError::Connection("call dropped before completion".into()))?
    }

    pub fn on(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn is_pending(&self, id: CallId) -> bool {
        self.shared.pending.contains(id)
    }

    pub fn config(&self) -> &RpcConfig {
        &self.shared.config
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }
}

// ─── Shared state ────────────────────────────────────────────────────────────

struct Shared<T, M> {
    transport: T,
    mapper: Arc<M>,
    config: RpcConfig,
    next_id: AtomicU64,
    pending: PendingCallRegistry,
    listeners: ListenerRegistry,
    state: AtomicU8,
    ever_connected: AtomicBool,
    connect_requested: AtomicBool,
    handler: Mutex<Option<ListenerId>>,
}

impl<T: Transport, M: PayloadMapper> Shared<T, M> {
    /// Between `connect()` and `disconnect()` (or giving up), a send that
    /// fails now goes out on the next `Connected`, first one included.
    fn holds_for_resubmit(&self) -> bool {
        self.connect_requested.load(Ordering::SeqCst)
    }

    fn handle_connected(&self) {
        let reconnect = self.ever_connected.swap(true, Ordering::SeqCst);
        self.state
            .store(ConnectionState::Connected as u8, Ordering::SeqCst);

        if reconnect {
            tracing::info!("Reconnected");
        } else {
            tracing::info!("Connected");
        }
        self.resubmit_pending();
        self.listeners.connected();
    }

    fn handle_disconnected(&self) {
        self.state
            .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
        tracing::info!(
            "Connection lost; {} call(s) awaiting resubmission",
            self.pending.len()
        );
        self.listeners.disconnected();
    }

    fn handle_failure(&self, error: &TransportError) {
        tracing::error!("Transport failure: {}", error);
        if matches!(error, TransportError::ReconnectExhausted(_)) {
            self.state
                .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
            // Nothing will come back on its own; stop holding calls.
            self.connect_requested.store(false, Ordering::SeqCst);
            let failed = self.fail_all(&error.to_string());
            if failed > 0 {
                tracing::warn!("Failed {} pending call(s) after giving up", failed);
            }
        }
        self.listeners.failure(error);
    }

    fn handle_event(&self, text: &str) {
        self.dispatch(text);
        self.listeners.event(text);
    }

    fn dispatch(&self, text: &str) {
        let envelope = match self.mapper.decode_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Dropping unparseable frame: {}", e);
                return;
            }
        };

        let Some(id) = envelope.id else {
            return;
        };

        let Some(call) = self.pending.remove(id) else {
            tracing::warn!("No pending call #{}; dropping duplicate or late frame", id);
            return;
        };

        match envelope.error {
            Some(error) => {
                tracing::debug!("← call #{} failed: {}", id, error.message);
                call.complete(Err(RpcError::Response {
                    message: error.message,
                    code: error.code,
                    data: error.data,
                }));
            }
            None => {
                tracing::debug!("← call #{} ok", id);
                call.complete(Ok(envelope.result.unwrap_or(Value::Null)));
            }
        }
    }

    fn resubmit_pending(&self) {
        let outstanding = self.pending.snapshot_in_order();
        if outstanding.is_empty() {
            return;
        }

        tracing::info!("Sending {} held call(s)", outstanding.len());
        for envelope in outstanding {
            // Answered while we were walking the snapshot.
            if !self.pending.contains(envelope.id) {
                continue;
            }
            let text = match self.mapper.encode_request(&envelope) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Failed to re-encode call #{}: {}", envelope.id, e);
                    continue;
                }
            };
            if let Err(e) = self.transport.send(text) {
                tracing::warn!("Failed to resubmit call #{}: {}", envelope.id, e);
            }
        }
    }

    fn fail_all(&self, reason: &str) -> usize {
        let calls = self.pending.drain();
        let count = calls.len();
        for call in calls {
            call.complete(Err(RpcError::Connection(reason.to_string())));
        }
        count
    }
}

// ─── Transport adapter ───────────────────────────────────────────────────────

/// Registered with the transport. Holds a weak reference so the transport
/// never keeps the client alive.
struct Handler<T, M> {
    shared: Weak<Shared<T, M>>,
}

impl<T: Transport, M: PayloadMapper> ConnectionListener for Handler<T, M> {
    fn on_connected(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_connected();
        }
    }

    fn on_disconnected(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_disconnected();
        }
    }

    fn on_event(&self, text: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_event(text);
        }
    }

    fn on_failure(&self, error: &TransportError) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_failure(error);
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
