//! Live session registry.
//!
//! The [`Registry`] is the only mutable state shared between connections. It
//! keeps a bijection between transport handles and peer identities: every
//! active handle has exactly one identity and every active identity belongs to
//! exactly one handle.
//!
//! # Locking
//!
//! Both directions of the mapping live behind one [`parking_lot::RwLock`], so
//! no caller can ever observe half of a registration. Lookups share the read
//! lock; [`register`](Registry::register) and
//! [`unregister`](Registry::unregister) take the write lock for a single map
//! update each. Nothing in this module performs I/O while holding the lock;
//! callers that need to deliver messages take a snapshot with
//! [`active_handles`](Registry::active_handles) and send after it returns.
//!
//! # Examples
//!
//! ```
//! use rumble_core::Registry;
//!
//! let registry: Registry<u64> = Registry::new();
//! registry.register(1, "alice").unwrap();
//! registry.register(2, "bob").unwrap();
//!
//! assert_eq!(registry.lookup_handle("bob"), Some(2));
//! assert_eq!(registry.active_identities(), vec!["alice", "bob"]);
//!
//! assert_eq!(registry.unregister(&2).as_deref(), Some("bob"));
//! assert_eq!(registry.unregister(&2), None);
//! ```

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use tracing::{debug, info};

/// Identity reserved for system use. Rejected in any letter case.
pub const RESERVED_IDENTITY: &str = "admin";

/// Checks that `identity` may be bound to a peer.
///
/// An identity is rejected when it is empty, consists only of whitespace, or
/// equals [`RESERVED_IDENTITY`] ignoring case. Uniqueness is not checked here;
/// that needs the registry.
///
/// # Examples
///
/// ```
/// use rumble_core::registry::validate_identity;
///
/// assert!(validate_identity("alice").is_ok());
/// assert!(validate_identity("   ").is_err());
/// assert!(validate_identity("AdMiN").is_err());
/// ```
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.trim().is_empty() || identity.eq_ignore_ascii_case(RESERVED_IDENTITY) {
        return Err(Error::InvalidIdentity(identity.to_string()));
    }
    Ok(())
}

struct Sessions<H> {
    by_handle: HashMap<H, String>,
    // Ordered so roster snapshots come out sorted without an extra pass.
    by_identity: BTreeMap<String, H>,
}

/// Thread-safe bijection between connection handles and identities.
///
/// The registry is generic over the handle type so it can sit on top of any
/// transport. The WebSocket server uses [`ConnectionId`](crate::ConnectionId);
/// tests use plain integers.
///
/// Share it between tasks with an `Arc`:
///
/// ```
/// use rumble_core::Registry;
/// use std::sync::Arc;
///
/// let registry = Arc::new(Registry::<u32>::new());
/// let for_task = registry.clone();
/// std::thread::spawn(move || for_task.register(7, "carol").unwrap())
///     .join()
///     .unwrap();
///
/// assert!(registry.contains_identity("carol"));
/// ```
pub struct Registry<H> {
    sessions: RwLock<Sessions<H>>,
}

impl<H> Registry<H>
where
    H: Clone + Eq + Hash + fmt::Display,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(Sessions {
                by_handle: HashMap::new(),
                by_identity: BTreeMap::new(),
            }),
        }
    }

    /// Binds `identity` to `handle`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidIdentity`] if the identity fails [`validate_identity`]
    /// - [`Error::HandleAlreadyBound`] if `handle` already has an identity
    /// - [`Error::DuplicateIdentity`] if another handle holds `identity`
    ///
    /// On error the registry is left exactly as it was.
    pub fn register(&self, handle: H, identity: impl Into<String>) -> Result<()> {
        let identity = identity.into();
        validate_identity(&identity)?;

        let mut sessions = self.sessions.write();
        if sessions.by_handle.contains_key(&handle) {
            return Err(Error::HandleAlreadyBound(handle.to_string()));
        }
        if sessions.by_identity.contains_key(&identity) {
            return Err(Error::DuplicateIdentity(identity));
        }

        sessions.by_identity.insert(identity.clone(), handle.clone());
        sessions.by_handle.insert(handle.clone(), identity.clone());
        let total = sessions.by_handle.len();
        drop(sessions);

        info!("Registered {} as {} (Total: {})", handle, identity, total);
        Ok(())
    }

    /// Removes the session bound to `handle`, returning its identity.
    ///
    /// Calling this for a handle that is not registered (or was already
    /// removed) changes nothing and returns `None`.
    pub fn unregister(&self, handle: &H) -> Option<String> {
        let mut sessions = self.sessions.write();
        let identity = sessions.by_handle.remove(handle)?;
        sessions.by_identity.remove(&identity);
        let total = sessions.by_handle.len();
        drop(sessions);

        info!("Unregistered {} ({}) (Total: {})", handle, identity, total);
        Some(identity)
    }

    /// Returns the identity bound to `handle`.
    pub fn lookup_identity(&self, handle: &H) -> Option<String> {
        self.sessions.read().by_handle.get(handle).cloned()
    }

    /// Returns the handle bound to `identity`. Matching is case-sensitive.
    pub fn lookup_handle(&self, identity: &str) -> Option<H> {
        self.sessions.read().by_identity.get(identity).cloned()
    }

    /// Returns `true` if `identity` is currently bound.
    pub fn contains_identity(&self, identity: &str) -> bool {
        self.sessions.read().by_identity.contains_key(identity)
    }

    /// Point-in-time copy of all bound identities, in ascending order.
    pub fn active_identities(&self) -> Vec<String> {
        self.sessions.read().by_identity.keys().cloned().collect()
    }

    /// Point-in-time copy of all bound handles, ordered by identity.
    ///
    /// This is the broadcast target list. The lock is released before the
    /// vector is returned, so sending to these handles never blocks
    /// registrations.
    pub fn active_handles(&self) -> Vec<H> {
        let handles: Vec<H> = self.sessions.read().by_identity.values().cloned().collect();
        debug!("Snapshot of {} active handles", handles.len());
        handles
    }

    /// Returns the number of active sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().by_handle.len()
    }

    /// Returns `true` if no session is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> Default for Registry<H>
where
    H: Clone + Eq + Hash + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_register_and_lookup_both_directions() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        assert_eq!(registry.lookup_identity(&1).as_deref(), Some("alice"));
        assert_eq!(registry.lookup_handle("alice"), Some(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_identity_leaves_state_unchanged() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        let err = registry.register(2, "alice").unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(ref name) if name == "alice"));

        assert_eq!(registry.lookup_handle("alice"), Some(1));
        assert_eq!(registry.lookup_identity(&2), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_identity_is_case_sensitive() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();
        registry.register(2, "Alice").unwrap();

        assert_eq!(registry.active_identities(), vec!["Alice", "alice"]);
    }

    #[test]
    fn test_reserved_identity_rejected_in_any_case() {
        let registry = Registry::new();
        for name in ["admin", "ADMIN", "Admin", "aDmIn"] {
            let err = registry.register(1u32, name).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentity(_)), "{name}");
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_blank_identity_rejected() {
        let registry = Registry::new();
        for name in ["", " ", "\t\n"] {
            assert!(matches!(
                registry.register(1u32, name),
                Err(Error::InvalidIdentity(_))
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handle_cannot_change_identity() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        let err = registry.register(1, "bob").unwrap_err();
        assert!(matches!(err, Error::HandleAlreadyBound(_)));
        assert_eq!(registry.lookup_identity(&1).as_deref(), Some("alice"));
        assert!(!registry.contains_identity("bob"));
    }

    #[test]
    fn test_unregister_unknown_handle_is_noop() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        assert_eq!(registry.unregister(&9), None);
        assert_eq!(registry.active_identities(), vec!["alice"]);
    }

    #[test]
    fn test_double_unregister() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        assert_eq!(registry.unregister(&1).as_deref(), Some("alice"));
        assert_eq!(registry.unregister(&1), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_identity_reusable_after_unregister() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();
        registry.unregister(&1);

        registry.register(2, "alice").unwrap();
        assert_eq!(registry.lookup_handle("alice"), Some(2));
    }

    #[test]
    fn test_snapshot_is_not_live() {
        let registry = Registry::new();
        registry.register(1u32, "alice").unwrap();

        let snapshot = registry.active_identities();
        registry.register(2, "bob").unwrap();

        assert_eq!(snapshot, vec!["alice"]);
        assert_eq!(registry.active_handles(), vec![1, 2]);
    }

    #[test]
    fn test_concurrent_registration_of_same_identity() {
        let registry = Arc::new(Registry::<u32>::new());

        let threads: Vec<_> = (0..16)
            .map(|handle| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register(handle, "alice").is_ok())
            })
            .collect();

        let winners = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register(u8, &'static str),
        Unregister(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        let names = prop::sample::select(vec!["alice", "bob", "carol", "admin", "", "Bob"]);
        prop_oneof![
            (0u8..6, names).prop_map(|(h, n)| Op::Register(h, n)),
            (0u8..6).prop_map(Op::Unregister),
        ]
    }

    proptest! {
        #[test]
        fn prop_registry_stays_bijective(ops in prop::collection::vec(op(), 0..64)) {
            let registry = Registry::<u8>::new();

            for op in ops {
                match op {
                    Op::Register(handle, name) => {
                        let before = registry.active_identities();
                        if registry.register(handle, name).is_err() {
                            prop_assert_eq!(registry.active_identities(), before);
                        }
                    }
                    Op::Unregister(handle) => {
                        registry.unregister(&handle);
                    }
                }

                let identities = registry.active_identities();
                let handles = registry.active_handles();
                prop_assert_eq!(identities.len(), handles.len());
                prop_assert_eq!(identities.len(), registry.len());

                for (identity, handle) in identities.iter().zip(handles.iter()) {
                    let back = registry.lookup_identity(handle);
                    prop_assert_eq!(back.as_ref(), Some(identity));
                    prop_assert_eq!(registry.lookup_handle(identity), Some(*handle));
                }
            }
        }
    }
}
