//! Connection-event listeners.
//!
//! The registry is copy-on-write: every delivery walks an immutable snapshot,
//! so listeners may register or unregister (themselves included) from inside a
//! callback without deadlocking. A listener removed while an event is being
//! delivered still receives that event, and nothing after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::rpc::lock;

/// Receives connection lifecycle events and raw inbound frames.
///
/// Callbacks run on the transport's receive path and must not block.
pub trait ConnectionListener: Send + Sync {
    fn on_connected(&self) {}

    fn on_disconnected(&self) {}

    /// A raw inbound text frame.
    fn on_event(&self, _text: &str) {}

    fn on_failure(&self, _error: &TransportError) {}
}

/// Handle returned by [`ListenerRegistry::add`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Entries = Arc<Vec<(ListenerId, Arc<dyn ConnectionListener>)>>;

/// Ordered set of listeners. Delivery order is registration order.
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Entries>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Arc::new(Vec::new())),
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = lock(&self.entries);
        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push((id, listener));
        *entries = Arc::new(next);
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = lock(&self.entries);
        if !entries.iter().any(|(entry_id, _)| *entry_id == id) {
            return false;
        }
        let next: Vec<_> = entries
            .iter()
            .filter(|(entry_id, _)| *entry_id != id)
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    pub fn clear(&self) {
        *lock(&self.entries) = Arc::new(Vec::new());
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `f` on every listener registered at the time of the call.
    pub fn notify(&self, f: impl Fn(&dyn ConnectionListener)) {
        let snapshot = Arc::clone(&lock(&self.entries));
        for (_, listener) in snapshot.iter() {
            f(listener.as_ref());
        }
    }

    pub fn connected(&self) {
        self.notify(|l| l.on_connected());
    }

    pub fn disconnected(&self) {
        self.notify(|l| l.on_disconnected());
    }

    pub fn event(&self, text: &str) {
        self.notify(|l| l.on_event(text));
    }

    pub fn failure(&self, error: &TransportError) {
        self.notify(|l| l.on_failure(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    #[derive(Default)]
    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionListener for Recorder {
        fn on_connected(&self) {
            self.log.lock().unwrap().push(format!("{}:connected", self.tag));
        }

        fn on_event(&self, text: &str) {
            self.log.lock().unwrap().push(format!("{}:{}", self.tag, text));
        }
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        for tag in ["a", "b", "c"] {
            registry.add(Arc::new(Recorder { tag, log: log.clone() }));
        }
        registry.connected();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:connected", "b:connected", "c:connected"]
        );
    }

    #[test]
    fn test_remove() {
        let registry = ListenerRegistry::new();
        let id = registry.add(Arc::new(Recorder::default()));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    /// Unregisters itself on the first event it sees.
    struct OneShot {
        registry: Weak<ListenerRegistry>,
        id: Mutex<Option<ListenerId>>,
        seen: Mutex<Vec<String>>,
    }

    impl ConnectionListener for OneShot {
        fn on_event(&self, text: &str) {
            self.seen.lock().unwrap().push(text.to_string());
            if let (Some(registry), Some(id)) = (self.registry.upgrade(), *self.id.lock().unwrap()) {
                registry.remove(id);
            }
        }
    }

    #[test]
    fn test_removal_during_delivery() {
        let registry = Arc::new(ListenerRegistry::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let one_shot = Arc::new(OneShot {
            registry: Arc::downgrade(&registry),
            id: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        });
        let id = registry.add(one_shot.clone());
        *one_shot.id.lock().unwrap() = Some(id);
        registry.add(Arc::new(Recorder { tag: "after", log: log.clone() }));

        registry.event("first");
        registry.event("second");

        assert_eq!(*one_shot.seen.lock().unwrap(), vec!["first"]);
        assert_eq!(*log.lock().unwrap(), vec!["after:first", "after:second"]);
        assert_eq!(registry.len(), 1);
    }
}
