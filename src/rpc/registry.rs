//! In-flight call bookkeeping.
//!
//! Entries are keyed by [`CallId`] in a `BTreeMap`, so iteration order is call
//! order. `remove` is the only way to take a call's responder out, which is
//! what makes completion exactly-once: whoever removes the entry completes it.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Instant;

use serde_json::Value;

use crate::error::RpcError;
use crate::rpc::{lock, CallId, RequestEnvelope};

/// Completion hook. Receives the raw `result` value or the call's error, and
/// decodes into the caller's expected type itself.
pub(crate) type Responder = Box<dyn FnOnce(Result<Value, RpcError>) + Send>;

/// One outstanding call.
pub struct PendingCall {
    envelope: RequestEnvelope,
    responder: Responder,
    created_at: Instant,
}

impl PendingCall {
    pub(crate) fn new(envelope: RequestEnvelope, responder: Responder) -> Self {
        Self {
            envelope,
            responder,
            created_at: Instant::now(),
        }
    }

    pub fn id(&self) -> CallId {
        self.envelope.id
    }

    pub fn envelope(&self) -> &RequestEnvelope {
        &self.envelope
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Consume the call and run its responder.
    pub(crate) fn complete(self, result: Result<Value, RpcError>) {
        (self.responder)(result)
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.envelope.id)
            .field("api", self.envelope.api())
            .field("method", &self.envelope.method_name())
            .finish()
    }
}

/// Thread-safe map of outstanding calls.
///
/// Responders are always invoked by the caller after the entry has left the
/// map, never while the lock is held.
#[derive(Debug, Default)]
pub struct PendingCallRegistry {
    calls: Mutex<BTreeMap<CallId, PendingCall>>,
}

impl PendingCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a call. Returns it back if its id is already taken.
    pub(crate) fn insert(&self, call: PendingCall) -> Result<(), PendingCall> {
        let mut calls = lock(&self.calls);
        if calls.contains_key(&call.id()) {
            return Err(call);
        }
        calls.insert(call.id(), call);
        Ok(())
    }

    /// Take a call out. Only the first remove for an id returns `Some`.
    pub(crate) fn remove(&self, id: CallId) -> Option<PendingCall> {
        lock(&self.calls).remove(&id)
    }

    pub fn contains(&self, id: CallId) -> bool {
        lock(&self.calls).contains_key(&id)
    }

    pub fn len(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of every outstanding request, lowest id first. Entries stay put.
    pub fn snapshot_in_order(&self) -> Vec<RequestEnvelope> {
        lock(&self.calls)
            .values()
            .map(|call| call.envelope.clone())
            .collect()
    }

    /// Remove every call, lowest id first.
    pub(crate) fn drain(&self) -> Vec<PendingCall> {
        std::mem::take(&mut *lock(&self.calls))
            .into_values()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcRequest;
    use std::sync::Arc;

    fn call(id: CallId, sink: Arc<Mutex<Vec<(CallId, Result<Value, RpcError>)>>>) -> PendingCall {
        let env = RequestEnvelope::new(id, RpcRequest::new("database", "get_block").param(id));
        PendingCall::new(
            env,
            Box::new(move |result| sink.lock().unwrap().push((id, result))),
        )
    }

    #[test]
    fn test_remove_exactly_once() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let registry = PendingCallRegistry::new();
        registry.insert(call(1, sink.clone())).unwrap();

        assert!(registry.contains(1));
        let taken = registry.remove(1).unwrap();
        assert!(registry.remove(1).is_none());
        assert!(!registry.contains(1));

        taken.complete(Ok(Value::from(5)));
        assert_eq!(sink.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let registry = PendingCallRegistry::new();
        registry.insert(call(1, sink.clone())).unwrap();
        let rejected = registry.insert(call(1, sink)).unwrap_err();
        assert_eq!(rejected.id(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_in_id_order() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let registry = PendingCallRegistry::new();
        for id in [3, 1, 2] {
            registry.insert(call(id, sink.clone())).unwrap();
        }
        let ids: Vec<_> = registry.snapshot_in_order().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_drain() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let registry = PendingCallRegistry::new();
        for id in [2, 1] {
            registry.insert(call(id, sink.clone())).unwrap();
        }
        let drained = registry.drain();
        assert!(registry.is_empty());
        for c in drained {
            c.complete(Err(RpcError::Connection("closed".into())));
        }
        let ids: Vec<_> = sink.lock().unwrap().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
