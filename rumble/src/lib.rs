//! # Rumble - Real-Time Chat for the Rumble Robot Pairing Backend
//!
//! Rumble is the messaging service robot operators use to talk to each other
//! while pairing and monitoring robots. It serves two WebSocket channels out of
//! the box:
//!
//! | Endpoint | What it does |
//! |----------|--------------|
//! | `/chat/{name}` | Room chat: broadcast, `@name` direct messages, `/typing`, join/leave notices, roster |
//! | `/direct/{name}` | Direct messages only: `@name:text`, welcome message, copy back to sender |
//!
//! ## Quick Start
//!
//! Add Rumble to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rumble = "0.1.0"
//! tokio = { version = "1.40", features = ["full"] }
//! ```
//!
//! Run the server:
//!
//! ```no_run
//! use rumble::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     Server::new(ServerConfig::default())?.listen().await
//! }
//! ```
//!
//! ## Talking to it
//!
//! ```text
//! alice ─▶ ws://127.0.0.1:8080/chat/alice
//!          ◀─ User: alice has joined the chat
//!          ◀─ Active users: alice
//! bob   ─▶ ws://127.0.0.1:8080/chat/bob
//!          ◀─ User: bob has joined the chat          (alice and bob)
//!          ◀─ Active users: alice, bob               (alice and bob)
//! alice ─▶ @bob hello
//!          ◀─ [DM from alice]: hello                 (bob only)
//! bob   ─▶ /typing
//!          ◀─ bob is typing...                       (alice and bob)
//! ```
//!
//! See [`rumble_core`] for the building blocks.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub use rumble_core::*;

/// Prelude module for convenient imports.
///
/// ```
/// use rumble::prelude::*;
///
/// let config = ServerConfig::default();
/// assert!(Server::new(config).is_ok());
/// ```
///
/// ## Included Types
///
/// - **Server**: `Server`, `ServerConfig`, `ChannelConfig`
/// - **Core**: `Registry`, `Router`, `RouterConfig`, `Capabilities`, `Lifecycle`, `Session`
/// - **Transport**: `Transport`, `Connection`, `ConnectionId`, `ConnectionManager`
/// - **Errors**: `Error`, `Result`
pub mod prelude {
    pub use rumble_core::prelude::*;
}
