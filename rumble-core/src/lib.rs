//! # Rumble Core - Real-Time Messaging for Rumble
//!
//! `rumble-core` is the live messaging layer of the Rumble robot pairing
//! backend. It keeps track of who is connected, under which name, and routes
//! chat, direct messages, typing indicators and presence notices between
//! WebSocket clients.
//!
//! ## Key Features
//!
//! - 👥 **Unique identities**: a registry that binds each connection to exactly
//!   one name and each name to exactly one connection
//! - 📡 **Broadcast and direct messages**: `hello` goes to everyone, `@bob hello`
//!   goes to bob only
//! - ✍️ **Typing indicators and presence**: join/leave notices plus a roster
//! - 🧩 **Configurable channels**: the full chat room and the direct-message
//!   service are one router with different capabilities
//! - ⚡ **Non-blocking delivery**: sends are queued per socket, a slow client
//!   never stalls the registry or other clients
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Server                              │
//! │      TCP accept → WS handshake → channel by request path     │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ one Session per socket
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │  Lifecycle  ──▶  Router  ──▶  Registry (RwLock bimap)        │
//! │  Connecting → Active → Closed                                │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ Transport::send / close
//! ┌──────────────────────────────▼───────────────────────────────┐
//! │         ConnectionManager (DashMap of outbound queues)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`registry`]: handle ↔ identity bijection
//! - [`router`]: payload classification and best-effort delivery
//! - [`lifecycle`]: per-connection state machine and presence
//! - [`message`]: inbound grammar and outbound notice texts
//! - [`transport`]: the boundary the core sends through
//! - [`connection`]: WebSocket implementation of the transport
//! - [`server`]: accept loop, handshake and per-socket tasks
//! - [`config`]: serde configuration
//! - [`error`]: error types and result handling
//!
//! ## Quick Start
//!
//! ```no_run
//! use rumble_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig {
//!         bind: "127.0.0.1:9000".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     // ws://127.0.0.1:9000/chat/{name} and ws://127.0.0.1:9000/direct/{name}
//!     Server::new(config)?.listen().await
//! }
//! ```
//!
//! ## Using the core without sockets
//!
//! Anything implementing [`Transport`] can carry the messages:
//!
//! ```
//! use rumble_core::prelude::*;
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Outbox(Mutex<Vec<(u32, String)>>);
//!
//! impl Transport for Outbox {
//!     type Handle = u32;
//!
//!     fn send(&self, handle: &u32, text: &str) -> Result<()> {
//!         self.0.lock().unwrap().push((*handle, text.to_string()));
//!         Ok(())
//!     }
//!
//!     fn close(&self, _handle: &u32) {}
//! }
//!
//! let outbox = Arc::new(Outbox::default());
//! let router = Router::new(Arc::new(Registry::new()), outbox.clone(), RouterConfig::chat());
//! let lifecycle = Lifecycle::new(router);
//!
//! let mut alice = lifecycle.session(1);
//! alice.connect("alice").unwrap();
//! alice.receive("hi!");
//!
//! let sent = outbox.0.lock().unwrap();
//! assert_eq!(sent.last().unwrap(), &(1, "alice: hi!".to_string()));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod message;
pub mod registry;
pub mod router;
pub mod server;
pub mod transport;

pub use config::{ChannelConfig, ServerConfig};
pub use connection::{Connection, ConnectionId, ConnectionInfo, ConnectionManager};
pub use error::{Error, Result};
pub use lifecycle::{Lifecycle, Session, SessionState};
pub use message::{Delimiter, Inbound, Notice};
pub use registry::Registry;
pub use router::{Capabilities, DeliveryReport, Dispatch, DropReason, Router, RouterConfig};
pub use server::Server;
pub use transport::Transport;

/// Prelude module for convenient imports.
///
/// ```
/// use rumble_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ChannelConfig, ServerConfig};
    pub use crate::connection::{Connection, ConnectionId, ConnectionManager};
    pub use crate::error::{Error, Result};
    pub use crate::lifecycle::{Lifecycle, Session, SessionState};
    pub use crate::registry::Registry;
    pub use crate::router::{Capabilities, Dispatch, Router, RouterConfig};
    pub use crate::server::Server;
    pub use crate::transport::Transport;
}
