//! Message routing and best-effort delivery.
//!
//! The [`Router`] decides where a payload goes and pushes it through the
//! [`Transport`]. It is shared by every connection of a channel and holds no
//! mutable state of its own: who is online comes from the [`Registry`], what
//! the channel is allowed to do comes from its [`RouterConfig`].
//!
//! # Overview
//!
//! Inbound payloads from an active session are classified with
//! [`Inbound::parse`] and then:
//!
//! - **Typing** (`/typing`) is broadcast as `"{identity} is typing..."`
//! - **Direct** (`@bob hello`) is delivered to `bob` only; unknown targets
//!   are dropped without telling the sender
//! - **Chat** (anything else) is broadcast as `"{identity}: {body}"`
//!
//! Broadcasts include the sender.
//!
//! # Delivery
//!
//! A broadcast first copies the list of active handles out of the registry,
//! releases the lock, and then sends to each handle in turn. A failed send is
//! logged and counted in the returned [`DeliveryReport`]; it never stops the
//! loop. A connection that registers while a broadcast is running may or may
//! not receive it.
//!
//! # Channel variants
//!
//! The chat channel and the direct-message channel are the same router with
//! different [`RouterConfig`]s:
//!
//! ```
//! use rumble_core::router::{Capabilities, RouterConfig};
//!
//! let chat = RouterConfig::chat();
//! assert_eq!(chat.capabilities, Capabilities::ALL);
//!
//! let direct = RouterConfig::direct();
//! assert_eq!(direct.capabilities, Capabilities::NONE);
//! assert!(direct.welcome.is_some());
//! ```

use crate::error::Result;
use crate::message::{Delimiter, Inbound, Notice};
use crate::registry::Registry;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Greeting sent to a peer that joins the direct-message channel.
pub const DIRECT_WELCOME: &str = "Welcome to the Direct Messaging service!";

/// Features a channel offers beyond direct messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Plain chat broadcast plus join/leave notices.
    pub broadcast: bool,
    /// The `/typing` control token.
    pub typing: bool,
    /// `Active users: ...` after every join and leave.
    pub roster: bool,
}

impl Capabilities {
    /// Every feature enabled.
    pub const ALL: Self = Self {
        broadcast: true,
        typing: true,
        roster: true,
    };

    /// Direct messages only.
    pub const NONE: Self = Self {
        broadcast: false,
        typing: false,
        roster: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// Per-channel routing behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Which broadcast features are on.
    pub capabilities: Capabilities,
    /// What ends the target identity in a direct message.
    pub direct_delimiter: Delimiter,
    /// Text sent only to a peer right after it registers.
    pub welcome: Option<String>,
    /// Also deliver a copy of each resolved direct message to its sender.
    pub echo_direct: bool,
}

impl RouterConfig {
    /// Broadcast chat with typing indicators, presence and roster.
    pub fn chat() -> Self {
        Self {
            capabilities: Capabilities::ALL,
            direct_delimiter: Delimiter::Whitespace,
            welcome: None,
            echo_direct: false,
        }
    }

    /// Direct messages only, addressed as `@target:body`, with a welcome
    /// message and a copy back to the sender.
    pub fn direct() -> Self {
        Self {
            capabilities: Capabilities::NONE,
            direct_delimiter: Delimiter::Char(':'),
            welcome: Some(DIRECT_WELCOME.to_string()),
            echo_direct: true,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::chat()
    }
}

/// Counts from one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Handles in the snapshot
    pub attempted: usize,
    /// Sends the transport accepted
    pub delivered: usize,
    /// Sends the transport refused
    pub failed: usize,
}

/// Why a payload produced no delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Direct message to an identity that is not online.
    UnknownTarget,
    /// Address marker without a delimiter after the target.
    MalformedDirect,
    /// Plain chat on a channel without broadcast.
    BroadcastDisabled,
}

/// What the router did with one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Typing indicator broadcast.
    Typing(DeliveryReport),
    /// Plain chat broadcast.
    Chat(DeliveryReport),
    /// Direct message handed to the target's connection.
    Direct {
        /// Whether the transport accepted the message for the target
        delivered: bool,
    },
    /// Nothing was sent.
    Dropped(DropReason),
}

/// Routes payloads for one channel.
///
/// Cloning is cheap; clones share the registry and transport.
pub struct Router<T: Transport> {
    registry: Arc<Registry<T::Handle>>,
    transport: Arc<T>,
    config: RouterConfig,
}

impl<T: Transport> Router<T> {
    /// Creates a router over `registry`, delivering through `transport`.
    pub fn new(
        registry: Arc<Registry<T::Handle>>,
        transport: Arc<T>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    /// The registry this router reads from.
    pub fn registry(&self) -> &Arc<Registry<T::Handle>> {
        &self.registry
    }

    /// The transport this router delivers through.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The channel configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Sends `text` to one connection.
    ///
    /// Failures are logged here; callers may ignore the result.
    pub fn deliver(&self, handle: &T::Handle, text: &str) -> Result<()> {
        let result = self.transport.send(handle, text);
        match &result {
            Ok(()) => debug!("Delivered to {}", handle),
            Err(e) => warn!("Delivery to {} failed: {}", handle, e),
        }
        result
    }

    /// Sends `text` to every active session, sender included.
    pub fn broadcast(&self, text: &str) -> DeliveryReport {
        let handles = self.registry.active_handles();
        let mut report = DeliveryReport {
            attempted: handles.len(),
            ..DeliveryReport::default()
        };

        for handle in &handles {
            match self.deliver(handle, text) {
                Ok(()) => report.delivered += 1,
                Err(_) => report.failed += 1,
            }
        }

        debug!(
            "Broadcast complete: {} success, {} failed out of {} total",
            report.delivered, report.failed, report.attempted
        );
        report
    }

    /// Broadcasts the current roster.
    pub fn broadcast_roster(&self) -> DeliveryReport {
        let identities = self.registry.active_identities();
        self.broadcast(&Notice::Roster(&identities).to_string())
    }

    /// Sends `text` to the connection bound to `identity`, if any.
    ///
    /// Returns `false` without sending when `identity` is not online.
    pub fn send_to(&self, identity: &str, text: &str) -> bool {
        match self.registry.lookup_handle(identity) {
            Some(handle) => self.deliver(&handle, text).is_ok(),
            None => {
                debug!("No active session for {:?}; message dropped", identity);
                false
            }
        }
    }

    /// Presence work after `identity` registered on `handle`.
    ///
    /// Sends the welcome (if configured) to the new session only, then the join
    /// notice and the roster to everyone, in that order.
    pub fn announce_join(&self, handle: &T::Handle, identity: &str) {
        if let Some(welcome) = &self.config.welcome {
            let _ = self.deliver(handle, welcome);
        }
        if self.config.capabilities.broadcast {
            self.broadcast(&Notice::Joined(identity).to_string());
            if self.config.capabilities.roster {
                self.broadcast_roster();
            }
        }
    }

    /// Presence work after `identity` was removed from the registry.
    pub fn announce_leave(&self, identity: &str) {
        if self.config.capabilities.broadcast {
            self.broadcast(&Notice::Left(identity).to_string());
            if self.config.capabilities.roster {
                self.broadcast_roster();
            }
        }
    }

    /// Routes one payload sent by the active session `sender`.
    pub fn dispatch(&self, sender: &str, payload: &str) -> Dispatch {
        let caps = self.config.capabilities;

        match Inbound::parse(payload, self.config.direct_delimiter) {
            Inbound::Typing if caps.typing => {
                Dispatch::Typing(self.broadcast(&Notice::Typing(sender).to_string()))
            }
            Inbound::Direct { target, body } => self.direct(sender, target, body),
            Inbound::MalformedDirect => {
                debug!("Malformed direct message from {}", sender);
                Dispatch::Dropped(DropReason::MalformedDirect)
            }
            // Typing without the capability is ordinary text.
            Inbound::Typing | Inbound::Chat(_) if caps.broadcast => {
                let text = Notice::Chat {
                    from: sender,
                    body: payload,
                }
                .to_string();
                Dispatch::Chat(self.broadcast(&text))
            }
            Inbound::Typing | Inbound::Chat(_) => {
                debug!("Broadcast disabled; dropped payload from {}", sender);
                Dispatch::Dropped(DropReason::BroadcastDisabled)
            }
        }
    }

    fn direct(&self, sender: &str, target: &str, body: &str) -> Dispatch {
        let Some(handle) = self.registry.lookup_handle(target) else {
            debug!("Direct message from {} to unknown {:?} dropped", sender, target);
            return Dispatch::Dropped(DropReason::UnknownTarget);
        };

        let text = Notice::Direct { from: sender, body }.to_string();
        let delivered = self.deliver(&handle, &text).is_ok();
        info!("Direct message {} -> {}", sender, target);

        if self.config.echo_direct {
            self.send_to(sender, &text);
        }

        Dispatch::Direct { delivered }
    }
}

impl<T: Transport> Clone for Router<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }
}
