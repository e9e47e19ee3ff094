//! The boundary between the messaging core and the connection layer.
//!
//! The core never owns sockets. Everything it needs from the outside world is
//! expressed by [`Transport`]: queue a text for one connection, or ask for a
//! connection to be closed. [`ConnectionManager`](crate::ConnectionManager) is
//! the WebSocket implementation; tests plug in an in-memory one.

use crate::error::Result;
use std::fmt;
use std::hash::Hash;

/// Outbound side of the connection layer.
///
/// Implementations must be callable from any task at any time and must not
/// block: [`send`](Transport::send) only queues, it never waits for the peer.
pub trait Transport: Send + Sync + 'static {
    /// Opaque, comparable token naming one live connection.
    type Handle: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Queues `text` for delivery on `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeliveryFailed`](crate::Error::DeliveryFailed) if the
    /// connection is gone or its outbound queue is closed.
    fn send(&self, handle: &Self::Handle, text: &str) -> Result<()>;

    /// Asks the connection layer to close `handle` after anything already queued.
    fn close(&self, handle: &Self::Handle);
}
