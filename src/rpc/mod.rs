//! RPC correlation layer.
//!
//! Outbound calls are tagged with a monotonic [`CallId`] and parked in a
//! [`registry::PendingCallRegistry`] until the matching inbound frame arrives.
//! The layer sits on any [`transport::Transport`]; the WebSocket transport
//! lives in [`crate::ws`].
//!
//! Wire format (one text frame per message):
//!
//! ```text
//! → {"jsonrpc":"2.0","id":7,"method":"call","params":["database","get_block",[42]]}
//! ← {"id":7,"result":{...}}
//! ← {"id":7,"error":{"message":"...","code":1}}
//! ```

pub mod client;
pub mod listeners;
pub mod mapper;
pub mod memory;
pub mod registry;
pub mod transport;

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use client::RpcClient;
pub use listeners::{ConnectionListener, ListenerId, ListenerRegistry};
pub use mapper::{JsonMapper, PayloadMapper};
pub use memory::MemoryTransport;
pub use registry::PendingCallRegistry;
pub use transport::Transport;

/// Per-connection request identifier. Starts at 1.
pub type CallId = u64;

pub const JSONRPC_VERSION: &str = "2.0";

/// Every request is routed through the node's `call` dispatcher.
pub const CALL_METHOD: &str = "call";

// ─── Connection state ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    Disconnected = 0,
    Connected = 1,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Behaviour knobs for [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Resolve outstanding calls with a connection error on `disconnect()`.
    pub fail_pending_on_disconnect: bool,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            fail_pending_on_disconnect: true,
        }
    }
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// Target API of a call: by name before resolution, by numeric id after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiRef {
    Id(u32),
    Name(String),
}

impl From<u32> for ApiRef {
    fn from(id: u32) -> Self {
        ApiRef::Id(id)
    }
}

impl From<&str> for ApiRef {
    fn from(name: &str) -> Self {
        ApiRef::Name(name.to_string())
    }
}

impl From<String> for ApiRef {
    fn from(name: String) -> Self {
        ApiRef::Name(name)
    }
}

impl std::fmt::Display for ApiRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiRef::Id(id) => write!(f, "{}", id),
            ApiRef::Name(name) => f.write_str(name),
        }
    }
}

/// A single operation: API, method, positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub api: ApiRef,
    pub method: String,
    pub params: Vec<Value>,
}

impl RpcRequest {
    pub fn new(api: impl Into<ApiRef>, method: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn params(mut self, values: Vec<Value>) -> Self {
        self.params = values;
        self
    }
}

/// Outbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub jsonrpc: String,
    pub id: CallId,
    pub method: String,
    pub params: (ApiRef, String, Vec<Value>),
}

impl RequestEnvelope {
    pub fn new(id: CallId, request: RpcRequest) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: CALL_METHOD.to_string(),
            params: (request.api, request.method, request.params),
        }
    }

    pub fn api(&self) -> &ApiRef {
        &self.params.0
    }

    pub fn method_name(&self) -> &str {
        &self.params.1
    }
}

// ─── Inbound ─────────────────────────────────────────────────────────────────

/// Error body of a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Any inbound frame. Frames without an `id` are server notifications.
///
/// A missing or `null` `result` alongside an `id` is a successful call that
/// returned nothing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub id: Option<CallId>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorPayload>,
}

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
