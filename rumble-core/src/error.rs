//! Error types and result handling for Rumble.
//!
//! This module provides the single error type used across the messaging core,
//! from WebSocket protocol failures up to identity validation at handshake time.
//!
//! # Overview
//!
//! The error handling in Rumble is designed to be:
//! - **Ergonomic**: `Result<T>` is an alias for `std::result::Result<T, Error>`
//! - **Contained**: routing failures are logged where they happen and never
//!   propagate to unrelated connections
//! - **Peer-facing where it matters**: handshake failures map to the exact
//!   rejection texts sent to the peer before the connection is closed
//!
//! # Error Categories
//!
//! - **Handshake Errors**: [`Error::InvalidIdentity`], [`Error::DuplicateIdentity`]
//! - **Registry Misuse**: [`Error::HandleAlreadyBound`]
//! - **Delivery Errors**: [`Error::DeliveryFailed`]
//! - **Protocol Errors**: WebSocket and IO errors
//! - **Configuration Errors**: bad addresses, invalid config files
//!
//! # Examples
//!
//! ```
//! use rumble_core::{Error, Registry};
//!
//! let registry: Registry<u32> = Registry::new();
//! registry.register(1, "alice").unwrap();
//!
//! let err = registry.register(2, "alice").unwrap_err();
//! assert!(matches!(err, Error::DuplicateIdentity(_)));
//! assert_eq!(err.rejection_notice(), Some("Error: Username already exists"));
//! ```

use std::fmt;
use thiserror::Error;

/// Peer-facing text sent before closing a connection with an unusable identity.
pub const INVALID_IDENTITY_NOTICE: &str = "Error: Invalid username";

/// Peer-facing text sent before closing a connection whose identity is taken.
pub const DUPLICATE_IDENTITY_NOTICE: &str = "Error: Username already exists";

/// The main error type for Rumble.
///
/// Only the handshake variants ever reach a peer, and only as the fixed strings
/// returned by [`Error::rejection_notice`]. Everything else is logged by the
/// component that hit it.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket protocol error from tungstenite.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// IO error from socket operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while reading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Identity is empty, whitespace-only, or the reserved system name.
    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    /// Identity is already bound to another active connection.
    #[error("Identity already in use: {0}")]
    DuplicateIdentity(String),

    /// The handle already carries an identity; identities never change in place.
    #[error("Connection {0} already has an identity")]
    HandleAlreadyBound(String),

    /// The transport could not queue a message for a connection.
    #[error("Delivery to {handle} failed: {reason}")]
    DeliveryFailed {
        /// Display form of the target handle
        handle: String,
        /// Why the transport refused the message
        reason: String,
    },

    /// No live transport connection for the given handle.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// A bind address could not be parsed.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The server configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A specialized `Result` type for Rumble operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a [`Error::DeliveryFailed`] for the given handle.
    pub fn delivery<H: fmt::Display, R: fmt::Display>(handle: &H, reason: R) -> Self {
        Error::DeliveryFailed {
            handle: handle.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a [`Error::Config`] error.
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }

    /// Returns the text a peer receives when its handshake fails with this error.
    ///
    /// Returns `None` for errors that are never reported to a peer.
    ///
    /// # Examples
    ///
    /// ```
    /// use rumble_core::Error;
    ///
    /// let err = Error::InvalidIdentity("admin".to_string());
    /// assert_eq!(err.rejection_notice(), Some("Error: Invalid username"));
    ///
    /// let err = Error::config("no channels");
    /// assert_eq!(err.rejection_notice(), None);
    /// ```
    pub fn rejection_notice(&self) -> Option<&'static str> {
        match self {
            Error::InvalidIdentity(_) => Some(INVALID_IDENTITY_NOTICE),
            Error::DuplicateIdentity(_) => Some(DUPLICATE_IDENTITY_NOTICE),
            _ => None,
        }
    }
}
