//! Duplex text transport consumed by the correlation layer.

use std::sync::Arc;

use crate::error::TransportError;
use crate::rpc::listeners::{ConnectionListener, ListenerId};

/// A connection that carries text frames in both directions.
///
/// Methods never block on network I/O: `connect` starts a connection attempt
/// and reports the outcome through `on_connected` / `on_failure`, and `send`
/// only enqueues. Listener callbacks may be invoked from any thread.
pub trait Transport: Send + Sync + 'static {
    fn set_url(&self, url: &str);

    fn connect(&self) -> Result<(), TransportError>;

    fn disconnect(&self);

    /// Fails with [`TransportError::NotConnected`] while the link is down.
    fn send(&self, text: String) -> Result<(), TransportError>;

    fn on(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId;

    fn off(&self, id: ListenerId) -> bool;
}

impl<T: Transport> Transport for Arc<T> {
    fn set_url(&self, url: &str) {
        (**self).set_url(url)
    }

    fn connect(&self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn disconnect(&self) {
        (**self).disconnect()
    }

    fn send(&self, text: String) -> Result<(), TransportError> {
        (**self).send(text)
    }

    fn on(&self, listener: Arc<dyn ConnectionListener>) -> ListenerId {
        (**self).on(listener)
    }

    fn off(&self, id: ListenerId) -> bool {
        (**self).off(id)
    }
}
