//! Per-connection session state machine.
//!
//! Every connection goes through the same three states:
//!
//! ```text
//!  Connecting ──connect() ok──▶ Active ──close()──▶ Closed
//!      │                                              ▲
//!      └────────connect() rejected────────────────────┘
//! ```
//!
//! A [`Session`] is owned by whatever drives the connection (the server's
//! per-socket task) and is the only way to move between states, so a handle
//! can never dispatch before it has an identity or after it was closed.
//!
//! # Presence
//!
//! A successful `connect` is followed by the join notice and roster; the
//! first `close` of an active session is followed by the leave notice and
//! roster. Later close signals are no-ops and emit nothing.
//!
//! # Examples
//!
//! ```
//! use rumble_core::{ConnectionManager, Lifecycle, Registry, Router, RouterConfig};
//! use std::sync::Arc;
//!
//! let manager = Arc::new(ConnectionManager::new());
//! let router = Router::new(Arc::new(Registry::new()), manager, RouterConfig::chat());
//! let lifecycle = Lifecycle::new(router);
//!
//! // Without a live socket the join notice cannot be delivered, but the
//! // session is still registered.
//! let mut session = lifecycle.session(rumble_core::ConnectionId::next());
//! session.connect("alice").unwrap();
//! assert_eq!(session.identity(), Some("alice"));
//!
//! assert_eq!(session.close().as_deref(), Some("alice"));
//! assert_eq!(session.close(), None);
//! ```

use crate::error::{Error, Result};
use crate::router::{Dispatch, Router};
use crate::transport::Transport;
use tracing::{debug, info, warn};

/// Where a connection is in its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Transport connection exists, no identity yet.
    Connecting,
    /// Identity bound; payloads are routed.
    Active {
        /// The identity registered for this connection
        identity: String,
    },
    /// Terminal. The registry no longer knows this handle.
    Closed,
}

/// Drives sessions for one channel.
///
/// Cloning is cheap; clones share the router.
pub struct Lifecycle<T: Transport> {
    router: Router<T>,
}

impl<T: Transport> Lifecycle<T> {
    /// Creates a controller routing through `router`.
    pub fn new(router: Router<T>) -> Self {
        Self { router }
    }

    /// The channel's router.
    pub fn router(&self) -> &Router<T> {
        &self.router
    }

    /// Starts tracking a new connection in the `Connecting` state.
    pub fn session(&self, handle: T::Handle) -> Session<T> {
        debug!("Session created for {}", handle);
        Session {
            handle,
            state: SessionState::Connecting,
            lifecycle: self.clone(),
        }
    }

    /// Removes `handle` from the registry and announces the departure.
    ///
    /// Meant for transports that learn about a closure outside the session's
    /// own task. Only the call that actually removes an identity announces
    /// anything; repeated calls return `None`.
    pub fn disconnect(&self, handle: &T::Handle) -> Option<String> {
        let identity = self.router.registry().unregister(handle)?;
        info!("Session {} ({}) closed", handle, identity);
        self.router.announce_leave(&identity);
        Some(identity)
    }
}

impl<T: Transport> Clone for Lifecycle<T> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
        }
    }
}

/// One connection's view of the lifecycle.
pub struct Session<T: Transport> {
    handle: T::Handle,
    state: SessionState,
    lifecycle: Lifecycle<T>,
}

impl<T: Transport> Session<T> {
    /// The transport handle this session belongs to.
    pub fn handle(&self) -> &T::Handle {
        &self.handle
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The bound identity while active.
    pub fn identity(&self) -> Option<&str> {
        match &self.state {
            SessionState::Active { identity } => Some(identity),
            _ => None,
        }
    }

    /// Returns `true` while the session can route payloads.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// Handshake: binds `proposed` to this connection.
    ///
    /// On success the session becomes active and the channel hears about it.
    /// On failure the peer is sent the matching rejection text, the transport
    /// is asked to close the connection, and the session is closed. The
    /// registry is not touched on failure.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentity`] / [`Error::DuplicateIdentity`] from the registry
    /// - [`Error::HandleAlreadyBound`] if this session already went through a handshake
    pub fn connect(&mut self, proposed: &str) -> Result<()> {
        if self.state != SessionState::Connecting {
            return Err(Error::HandleAlreadyBound(self.handle.to_string()));
        }

        let router = self.lifecycle.router();
        match router.registry().register(self.handle.clone(), proposed) {
            Ok(()) => {
                info!("Session {} active as {}", self.handle, proposed);
                self.state = SessionState::Active {
                    identity: proposed.to_string(),
                };
                router.announce_join(&self.handle, proposed);
                Ok(())
            }
            Err(e) => {
                warn!("Rejected {} as {:?}: {}", self.handle, proposed, e);
                if let Some(notice) = e.rejection_notice() {
                    let _ = router.deliver(&self.handle, notice);
                }
                router.transport().close(&self.handle);
                self.state = SessionState::Closed;
                Err(e)
            }
        }
    }

    /// Routes one inbound payload.
    ///
    /// Returns `None` without doing anything unless the session is active.
    pub fn receive(&self, payload: &str) -> Option<Dispatch> {
        match &self.state {
            SessionState::Active { identity } => {
                debug!("Received from {} ({})", self.handle, identity);
                Some(self.lifecycle.router().dispatch(identity, payload))
            }
            state => {
                debug!("Ignoring payload for {} in state {:?}", self.handle, state);
                None
            }
        }
    }

    /// Ends the session, returning the identity if this call removed it.
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) -> Option<String> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Active { .. } => self.lifecycle.disconnect(&self.handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::router::RouterConfig;
    use crate::transport::testing::RecordingTransport;
    use std::sync::Arc;

    fn lifecycle(
        config: RouterConfig,
    ) -> (Lifecycle<RecordingTransport>, Arc<RecordingTransport>) {
        let transport = RecordingTransport::new();
        let router = Router::new(Arc::new(Registry::new()), transport.clone(), config);
        (Lifecycle::new(router), transport)
    }

    #[test]
    fn test_first_join_sees_own_roster() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());

        let mut alice = lifecycle.session(1);
        alice.connect("alice").unwrap();

        assert!(alice.is_active());
        assert_eq!(
            transport.inbox(1),
            vec!["User: alice has joined the chat", "Active users: alice"]
        );
    }

    #[test]
    fn test_invalid_identity_is_rejected_and_closed() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());

        let mut session = lifecycle.session(1);
        let err = session.connect("Admin").unwrap_err();

        assert!(matches!(err, Error::InvalidIdentity(_)));
        assert_eq!(session.state(), &SessionState::Closed);
        assert_eq!(transport.inbox(1), vec!["Error: Invalid username"]);
        assert_eq!(transport.closed(), vec![1]);
        assert!(lifecycle.router().registry().is_empty());
    }

    #[test]
    fn test_duplicate_identity_is_rejected_without_notices() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());
        let mut first = lifecycle.session(1);
        first.connect("alice").unwrap();
        transport.clear();

        let mut second = lifecycle.session(2);
        let err = second.connect("alice").unwrap_err();

        assert!(matches!(err, Error::DuplicateIdentity(_)));
        assert_eq!(
            transport.attempts(),
            vec![(2, "Error: Username already exists".to_string())]
        );
        assert_eq!(transport.closed(), vec![2]);
        assert_eq!(
            lifecycle.router().registry().lookup_handle("alice"),
            Some(1)
        );
    }

    #[test]
    fn test_rejected_session_ignores_payloads_and_close() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());
        let mut session = lifecycle.session(1);
        let _ = session.connect("");
        transport.clear();

        assert_eq!(session.receive("hello"), None);
        assert_eq!(session.close(), None);
        assert!(transport.attempts().is_empty());
    }

    #[test]
    fn test_connect_twice_is_refused() {
        let (lifecycle, _transport) = lifecycle(RouterConfig::chat());
        let mut session = lifecycle.session(1);
        session.connect("alice").unwrap();

        let err = session.connect("bob").unwrap_err();

        assert!(matches!(err, Error::HandleAlreadyBound(_)));
        assert_eq!(session.identity(), Some("alice"));
    }

    #[test]
    fn test_payload_before_connect_is_ignored() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());
        let session = lifecycle.session(1);

        assert_eq!(session.receive("hi"), None);
        assert!(transport.attempts().is_empty());
    }

    #[test]
    fn test_close_announces_once() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());
        let mut alice = lifecycle.session(1);
        let mut bob = lifecycle.session(2);
        alice.connect("alice").unwrap();
        bob.connect("bob").unwrap();
        transport.clear();

        assert_eq!(bob.close().as_deref(), Some("bob"));
        assert_eq!(bob.close(), None);
        assert_eq!(lifecycle.disconnect(&2), None);

        assert_eq!(
            transport.inbox(1),
            vec!["User bob has disconnected", "Active users: alice"]
        );
        assert!(bob.receive("still here?").is_none());
    }

    #[test]
    fn test_out_of_band_disconnect_then_session_close() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());
        let mut alice = lifecycle.session(1);
        let mut bob = lifecycle.session(2);
        alice.connect("alice").unwrap();
        bob.connect("bob").unwrap();
        transport.clear();

        assert_eq!(lifecycle.disconnect(&2).as_deref(), Some("bob"));
        assert_eq!(bob.close(), None);

        assert_eq!(transport.inbox(1).len(), 2);
    }

    #[test]
    fn test_direct_channel_lifecycle_is_quiet() {
        let (lifecycle, transport) = lifecycle(RouterConfig::direct());
        let mut alice = lifecycle.session(1);
        let mut bob = lifecycle.session(2);
        alice.connect("alice").unwrap();
        bob.connect("bob").unwrap();

        bob.close();

        assert_eq!(
            transport.inbox(1),
            vec!["Welcome to the Direct Messaging service!"]
        );
    }

    #[test]
    fn test_chat_scenario() {
        let (lifecycle, transport) = lifecycle(RouterConfig::chat());

        let mut alice = lifecycle.session(1);
        alice.connect("alice").unwrap();
        assert_eq!(transport.inbox(1).last().unwrap(), "Active users: alice");

        let mut bob = lifecycle.session(2);
        bob.connect("bob").unwrap();
        for handle in [1, 2] {
            let inbox = transport.inbox(handle);
            assert_eq!(
                inbox[inbox.len() - 2..],
                ["User: bob has joined the chat", "Active users: alice, bob"]
            );
        }

        transport.clear();
        alice.receive("@bob hello");
        assert_eq!(
            transport.attempts(),
            vec![(2, "[DM from alice]: hello".to_string())]
        );

        transport.clear();
        bob.close();
        assert_eq!(
            transport.inbox(1),
            vec!["User bob has disconnected", "Active users: alice"]
        );

        transport.clear();
        let mut impostor = lifecycle.session(3);
        assert!(impostor.connect("alice").is_err());
        assert_eq!(transport.inbox(3), vec!["Error: Username already exists"]);
    }
}
