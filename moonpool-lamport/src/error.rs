//! Error types for moonpool-lamport.

use crate::codec::CodecError;
use crate::types::NodeId;
use crate::wire::WireError;

/// Result alias used throughout the crate.
pub type LamportResult<T> = Result<T, LamportError>;

/// Errors surfaced by the protocol engine, the node and its transports.
///
/// | Error | When it happens |
/// |-------|-----------------|
/// | `EmptySet` | `minimum()` on an empty pending set |
/// | `PeerNotFound` | The directory has no handle for a node id |
/// | `DeliveryFailure` | A send to a peer failed or timed out |
/// | `WriteInProgress` | A local write is still waiting for its turn |
/// | `NodeStopped` | The node's worker is gone |
/// | `InvalidConfig` | Startup parameters are inconsistent |
#[derive(Debug, thiserror::Error)]
pub enum LamportError {
    /// The pending request set has no entries.
    #[error("pending request set is empty")]
    EmptySet,

    /// No handle is registered for this node.
    #[error("peer not found: {0}")]
    PeerNotFound(NodeId),

    /// A message could not be delivered.
    #[error("delivery to {peer} failed: {reason}")]
    DeliveryFailure {
        /// The unreachable peer.
        peer: NodeId,
        /// What went wrong.
        reason: String,
    },

    /// This node already has an outstanding request.
    #[error("a write is already waiting for the critical section")]
    WriteInProgress,

    /// The node's worker task has shut down.
    #[error("node stopped")]
    NodeStopped,

    /// Startup parameters are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Message serialization failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Frame was malformed.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LamportError {
    /// Build a [`LamportError::DeliveryFailure`].
    pub fn delivery(peer: NodeId, reason: impl Into<String>) -> Self {
        LamportError::DeliveryFailure {
            peer,
            reason: reason.into(),
        }
    }
}
