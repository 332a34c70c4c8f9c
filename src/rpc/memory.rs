//! In-process transport.
//!
//! Records every outbound frame and lets the owner play the remote side by
//! hand: open or drop the link, push inbound frames, report failures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::rpc::listeners::{ConnectionListener, ListenerId, ListenerRegistry};
use crate::rpc::transport::Transport;
use crate::rpc::{lock, CallId, RequestEnvelope};

#[derive(Debug)]
pub struct MemoryTransport {
    url: Mutex<Option<String>>,
    auto_connect: bool,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
    listeners: ListenerRegistry,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// `connect()` opens the link immediately.
    pub fn new() -> Self {
        Self::with_auto_connect(true)
    }

    /// `connect()` only records the attempt; call
    /// [`simulate_connected`](Self::simulate_connected) to open the link.
    pub fn manual() -> Self {
        Self::with_auto_connect(false)
    }

    fn with_auto_connect(auto_connect: bool) -> Self {
        Self {
            url: Mutex::new(None),
            auto_connect,
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            listeners: ListenerRegistry::new(),
        }
    }

    pub fn url(&self) -> Option<String> {
        lock(&self.url).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Frames sent so far, oldest first.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    pub fn take_sent(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.sent))
    }

    /// Call ids of the request frames sent so far. Non-request frames are skipped.
    pub fn sent_ids(&self) -> Vec<CallId> {
        lock(&self.sent)
            .iter()
            .filter_map(|text| serde_json::from_str::<RequestEnvelope>(text).ok())
            .map(|env| env.id)
            .collect()
    }

    pub fn simulate_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.listeners.connected();
    }

    pub fn simulate_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.listeners.disconnected();
    }

    /// Push an inbound text frame to every listener.
    pub fn deliver(&self, text: &str) {
        self.listeners.event(text);
    }

    pub fn simulate_failure(&self, error: TransportError) {
        self.listeners.failure(&error);
    }
}

impl Transport for MemoryTransport {
    fn set_url(&self, url: &str) {
        *lock(&self.url) = Some(url.to_string());
    }

    fn connect(&self) -> Result<(), TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if lock(&self.url).is_none() {
            return Err(TransportError::ConnectionFailed("no url set".into()));
        }
        if self.auto_connect && !self.is_connected() {
            self.simulate_connected();
        }
        Ok(())
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.listeners.disconnected();
        }
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        lock(&self.sent).push(text);
        Ok(())
    }

    fn on(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_requires_connection() {
        let transport = MemoryTransport::manual();
        transport.set_url("ws://localhost");
        transport.connect().unwrap();
        assert_eq!(transport.send("x".into()), Err(TransportError::NotConnected));

        transport.simulate_connected();
        transport.send("x".into()).unwrap();
        assert_eq!(transport.sent(), vec!["x"]);
        assert_eq!(transport.take_sent(), vec!["x"]);
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_connect_without_url_fails() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.connect(),
            Err(TransportError::ConnectionFailed(_))
        ));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_auto_connect() {
        let transport = MemoryTransport::new();
        transport.set_url("ws://localhost");
        transport.connect().unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.url().as_deref(), Some("ws://localhost"));
        assert_eq!(transport.connect_calls(), 1);
    }
}
