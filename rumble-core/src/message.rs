//! Chat payload grammar and notice formats.
//!
//! Inbound text frames are classified into an [`Inbound`] before routing, and
//! every text the core sends is produced by formatting a [`Notice`]. Keeping
//! both directions here means the wire texts live in exactly one place.
//!
//! # Inbound grammar
//!
//! | Payload | Classification |
//! |---------|----------------|
//! | `/typing` (any case) | [`Inbound::Typing`] |
//! | `@{target}{delimiter}{body}` | [`Inbound::Direct`] |
//! | `@{target}` with no delimiter | [`Inbound::MalformedDirect`] |
//! | anything else | [`Inbound::Chat`] |
//!
//! The delimiter after the target is configurable per channel, see
//! [`Delimiter`].
//!
//! # Examples
//!
//! ```
//! use rumble_core::message::{Delimiter, Inbound, Notice};
//!
//! let parsed = Inbound::parse("@bob hello there", Delimiter::Whitespace);
//! assert_eq!(parsed, Inbound::Direct { target: "bob", body: "hello there" });
//!
//! let text = Notice::Direct { from: "alice", body: "hello there" }.to_string();
//! assert_eq!(text, "[DM from alice]: hello there");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Control payload announcing that the sender is typing. Matched ignoring case.
pub const TYPING_TOKEN: &str = "/typing";

/// Leading character of a direct message payload.
pub const ADDRESS_MARKER: char = '@';

/// Separator between the target identity and the body of a direct message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    /// Any Unicode whitespace character (`@bob hello`).
    #[default]
    Whitespace,
    /// One specific character (`@bob:hello` with `Char(':')`).
    Char(char),
}

impl Delimiter {
    fn matches(self, c: char) -> bool {
        match self {
            Delimiter::Whitespace => c.is_whitespace(),
            Delimiter::Char(d) => c == d,
        }
    }
}

/// Classification of one inbound text payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    /// The typing control token.
    Typing,
    /// A message addressed to a single identity.
    Direct {
        /// Identity the message is addressed to (may be empty)
        target: &'a str,
        /// Everything after the first delimiter, untouched
        body: &'a str,
    },
    /// Starts with the address marker but has no delimiter after the target.
    MalformedDirect,
    /// Any other payload, routed as plain chat.
    Chat(&'a str),
}

impl<'a> Inbound<'a> {
    /// Classifies `payload`, splitting direct messages at the first `delimiter`.
    ///
    /// The body of a direct message is not trimmed; only the single delimiter
    /// character that ends the target is consumed.
    ///
    /// # Examples
    ///
    /// ```
    /// use rumble_core::message::{Delimiter, Inbound};
    ///
    /// assert_eq!(Inbound::parse("/TYPING", Delimiter::Whitespace), Inbound::Typing);
    /// assert_eq!(
    ///     Inbound::parse("@bob:see you: soon", Delimiter::Char(':')),
    ///     Inbound::Direct { target: "bob", body: "see you: soon" },
    /// );
    /// assert_eq!(Inbound::parse("@bob", Delimiter::Whitespace), Inbound::MalformedDirect);
    /// assert_eq!(Inbound::parse("hi all", Delimiter::Whitespace), Inbound::Chat("hi all"));
    /// ```
    pub fn parse(payload: &'a str, delimiter: Delimiter) -> Self {
        if payload.eq_ignore_ascii_case(TYPING_TOKEN) {
            return Inbound::Typing;
        }

        let Some(rest) = payload.strip_prefix(ADDRESS_MARKER) else {
            return Inbound::Chat(payload);
        };

        match rest.char_indices().find(|&(_, c)| delimiter.matches(c)) {
            Some((at, c)) => Inbound::Direct {
                target: &rest[..at],
                body: &rest[at + c.len_utf8()..],
            },
            None => Inbound::MalformedDirect,
        }
    }
}

/// A text produced by the core for delivery to peers.
///
/// The `Display` implementation yields the exact wire text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice<'a> {
    /// `User: {identity} has joined the chat`
    Joined(&'a str),
    /// `User {identity} has disconnected`
    Left(&'a str),
    /// `Active users: {a, b, ...}`
    Roster(&'a [String]),
    /// `{identity} is typing...`
    Typing(&'a str),
    /// `{identity}: {body}`
    Chat {
        /// Sender identity
        from: &'a str,
        /// Message body as received
        body: &'a str,
    },
    /// `[DM from {identity}]: {body}`
    Direct {
        /// Sender identity
        from: &'a str,
        /// Message body as received
        body: &'a str,
    },
}

impl fmt::Display for Notice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Joined(identity) => write!(f, "User: {identity} has joined the chat"),
            Notice::Left(identity) => write!(f, "User {identity} has disconnected"),
            Notice::Roster(identities) => write!(f, "Active users: {}", identities.join(", ")),
            Notice::Typing(identity) => write!(f, "{identity} is typing..."),
            Notice::Chat { from, body } => write!(f, "{from}: {body}"),
            Notice::Direct { from, body } => write!(f, "[DM from {from}]: {body}"),
        }
    }
}
