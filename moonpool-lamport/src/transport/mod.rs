//! Message transports.
//!
//! A [`MessageChannel`] delivers one [`Message`] to one peer. The protocol
//! relies on it for per-pair FIFO ordering: a LIBERATION must never overtake
//! the REQUEST it releases. Both implementations here keep a single ordered
//! stream per destination.
//!
//! - [`local`]: in-process delivery between nodes of the same runtime
//! - [`tcp`]: framed messages over TCP, one connection per peer

use async_trait::async_trait;

use crate::error::LamportResult;
use crate::types::{Message, NodeId};

pub mod local;
pub mod tcp;

/// Delivers messages to peers resolved through a [`PeerDirectory`](crate::PeerDirectory).
#[async_trait]
pub trait MessageChannel<H>: Send + Sync + 'static {
    /// Send `message` to `peer`, reachable through `handle`.
    ///
    /// # Errors
    ///
    /// [`LamportError::DeliveryFailure`](crate::LamportError::DeliveryFailure)
    /// if the peer is unreachable.
    async fn send(&self, peer: NodeId, handle: &H, message: Message) -> LamportResult<()>;
}
