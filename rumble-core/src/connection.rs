//! WebSocket connection tracking.
//!
//! This module owns the outbound half of every live socket and implements
//! [`Transport`] on top of it.
//!
//! # Overview
//!
//! - [`ConnectionId`]: the handle the core uses for a socket
//! - [`Connection`]: one socket's outbound queue plus metadata
//! - [`ConnectionManager`]: thread-safe map of all live connections
//!
//! # Architecture
//!
//! Each WebSocket connection has a write task draining an unbounded channel
//! into the socket. Sending never waits on the peer: [`Connection::send_text`]
//! only pushes onto the channel, so one slow client cannot hold up a broadcast
//! to everyone else.
//!
//! # Examples
//!
//! ```
//! use rumble_core::{Connection, ConnectionId, ConnectionManager, Transport};
//! use tokio::sync::mpsc;
//!
//! let manager = ConnectionManager::new();
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let id = ConnectionId::next();
//! manager.add(Connection::new(id, "127.0.0.1:9000".parse().unwrap(), "/chat", tx));
//!
//! manager.send(&id, "hello").unwrap();
//! assert_eq!(rx.try_recv().unwrap().into_text().unwrap(), "hello");
//! ```

use crate::error::{Error, Result};
use crate::transport::Transport;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tungstenite::Message as WsMessage;

/// A unique identifier for a WebSocket connection.
///
/// IDs come from a process-wide counter and are never reused while the
/// process runs. They display as `conn_{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next unused ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// Metadata about a WebSocket connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Socket address of the connected client
    pub addr: SocketAddr,
    /// Unix timestamp when the connection was established
    pub connected_at: u64,
    /// Channel path the client connected to (e.g. `/chat`)
    pub channel: String,
}

/// Outbound side of one live WebSocket connection.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct Connection {
    info: ConnectionInfo,
    sender: mpsc::UnboundedSender<WsMessage>,
}

impl Connection {
    /// Creates a connection whose frames are pushed onto `sender`.
    ///
    /// This is typically called by the server once the WebSocket handshake
    /// has completed and the write task is running.
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        channel: impl Into<String>,
        sender: mpsc::UnboundedSender<WsMessage>,
    ) -> Self {
        let connected_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            info: ConnectionInfo {
                id,
                addr,
                connected_at,
                channel: channel.into(),
            },
            sender,
        }
    }

    /// Queues a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeliveryFailed`] if the write task has ended and the
    /// channel receiver has been dropped.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.sender
            .send(WsMessage::Text(text.into()))
            .map_err(|_| Error::delivery(&self.info.id, "connection closed"))
    }

    /// Queues a close frame. The write task stops after sending it.
    pub fn close(&self) {
        if self.sender.send(WsMessage::Close(None)).is_err() {
            debug!("Close requested for {} after its writer ended", self.info.id);
        }
    }

    /// Returns `true` once the write task has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.info.id
    }

    /// Returns the connection metadata.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }
}

/// Manages the set of live WebSocket connections.
///
/// Uses [`DashMap`] internally, so every method can be called from any task
/// without extra locking. This map is independent of the session
/// [`Registry`](crate::Registry): a connection is here from handshake to
/// socket teardown, whether or not it ever got an identity.
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionManager {
    /// Creates an empty manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Adds a connection, returning the number of live connections.
    pub fn add(&self, conn: Connection) -> usize {
        let id = conn.id();
        self.connections.insert(id, conn);
        let count = self.connections.len();
        info!("Added connection: {} (Total: {})", id, count);
        count
    }

    /// Removes a connection. Dropping the returned value (and every clone)
    /// lets the write task finish.
    pub fn remove(&self, id: &ConnectionId) -> Option<Connection> {
        let result = self.connections.remove(id).map(|(_, conn)| conn);
        if result.is_some() {
            info!(
                "Removed connection: {} (Total: {})",
                id,
                self.connections.len()
            );
        }
        result
    }

    /// Returns a clone of the connection, if it is live.
    pub fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Returns the number of live connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Returns the metadata of every live connection. Order is not guaranteed.
    pub fn infos(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|e| e.value().info().clone())
            .collect()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionManager {
    type Handle = ConnectionId;

    fn send(&self, handle: &ConnectionId, text: &str) -> Result<()> {
        // Clone out of the map so the shard lock is not held while sending.
        let conn = self
            .get(handle)
            .ok_or_else(|| Error::delivery(handle, "connection not found"))?;
        conn.send_text(text)
    }

    fn close(&self, handle: &ConnectionId) {
        match self.get(handle) {
            Some(conn) => conn.close(),
            None => debug!("Close requested for unknown connection {}", handle),
        }
    }
}
