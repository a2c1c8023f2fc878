//! Core types for the Lamport mutual exclusion protocol.
//!
//! - [`NodeId`]: Identifies a participant (`lamport-node` uses its listening port)
//! - [`Timestamp`]: Lamport logical time carried by every message
//! - [`Message`]: The only wire entity exchanged between nodes
//! - [`Commit`]: Record of a write this node applied inside its critical section

use serde::{Deserialize, Serialize};

/// The replicated value.
pub type Value = i64;

/// Identifier of a node in the cluster.
///
/// Node ids are totally ordered; the order breaks ties between requests
/// carrying the same logical timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new node id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node({})", self.0)
    }
}

impl From<u16> for NodeId {
    fn from(port: u16) -> Self {
        Self(u64::from(port))
    }
}

/// Lamport logical timestamp.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Logical time before any event.
    pub const ZERO: Self = Self(0);

    /// Create a new timestamp.
    pub const fn new(t: u64) -> Self {
        Self(t)
    }

    /// The timestamp immediately after this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Discriminant of a [`Message`], used for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A node asks to enter the critical section.
    Request,
    /// A peer has recorded a request.
    Acknowledgement,
    /// The critical section was released with a new value.
    Liberation,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageKind::Request => "REQUEST",
            MessageKind::Acknowledgement => "ACKNOWLEDGEMENT",
            MessageKind::Liberation => "LIBERATION",
        };
        f.write_str(name)
    }
}

/// A protocol message.
///
/// Every variant carries the sender's clock at send time and the sender id.
/// Messages are built once and never mutated after being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Ask every peer to queue a request for the critical section.
    Request {
        /// Logical time of the request.
        timestamp: Timestamp,
        /// Requesting node.
        sender: NodeId,
    },
    /// Reply to a [`Message::Request`].
    Acknowledgement {
        /// Logical time of the acknowledging node.
        timestamp: Timestamp,
        /// Acknowledging node.
        sender: NodeId,
    },
    /// Release of the critical section, announcing the committed value.
    Liberation {
        /// Logical time of the release.
        timestamp: Timestamp,
        /// Node leaving the critical section.
        sender: NodeId,
        /// Value every receiver must apply.
        new_value: Value,
    },
}

impl Message {
    /// Logical time at which the message was sent.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Message::Request { timestamp, .. }
            | Message::Acknowledgement { timestamp, .. }
            | Message::Liberation { timestamp, .. } => *timestamp,
        }
    }

    /// Node that sent the message.
    pub fn sender(&self) -> NodeId {
        match self {
            Message::Request { sender, .. }
            | Message::Acknowledgement { sender, .. }
            | Message::Liberation { sender, .. } => *sender,
        }
    }

    /// The message kind.
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request { .. } => MessageKind::Request,
            Message::Acknowledgement { .. } => MessageKind::Acknowledgement,
            Message::Liberation { .. } => MessageKind::Liberation,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Liberation { new_value, .. } => write!(
                f,
                "{}({}, {}, value={})",
                self.kind(),
                self.timestamp(),
                self.sender(),
                new_value
            ),
            _ => write!(f, "{}({}, {})", self.kind(), self.timestamp(), self.sender()),
        }
    }
}

/// A write this node applied while holding the critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// The value now stored.
    pub value: Value,
    /// Logical time of the request that was admitted.
    pub request_timestamp: Timestamp,
    /// Logical time of the liberation that announced it.
    pub liberation_timestamp: Timestamp,
}
