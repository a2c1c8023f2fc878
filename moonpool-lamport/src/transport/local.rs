//! In-process network.
//!
//! [`LocalNetwork`] connects nodes running in the same tokio runtime. It is
//! both the [`PeerDirectory`] (node id → [`NodeHandle`]) and the
//! [`MessageChannel`] (push into the peer's mailbox). Mailboxes are FIFO and
//! each node sends from a single task, so per-pair ordering holds.
//!
//! Nodes can be cut off with [`LocalNetwork::disconnect`] to observe how the
//! protocol behaves when a peer becomes unreachable.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::directory::PeerDirectory;
use crate::error::{LamportError, LamportResult};
use crate::node::NodeHandle;
use crate::transport::MessageChannel;
use crate::types::{Message, NodeId};

#[derive(Default)]
struct Registry {
    nodes: HashMap<NodeId, NodeHandle>,
    disconnected: HashSet<NodeId>,
}

/// Shared in-process network. Clones refer to the same network.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    registry: Arc<RwLock<Registry>>,
}

impl LocalNetwork {
    /// An empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node` reachable by the other nodes.
    pub fn register(&self, node: NodeHandle) {
        let mut registry = self.write();
        tracing::debug!(node = %node.id(), "registered on local network");
        registry.nodes.insert(node.id(), node);
    }

    /// Make sends to `node` fail until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, node: NodeId) {
        self.write().disconnected.insert(node);
    }

    /// Undo [`disconnect`](Self::disconnect).
    pub fn reconnect(&self, node: NodeId) {
        self.write().disconnected.remove(&node);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PeerDirectory for LocalNetwork {
    type Handle = NodeHandle;

    fn resolve(&self, node: NodeId) -> LamportResult<NodeHandle> {
        self.read()
            .nodes
            .get(&node)
            .cloned()
            .ok_or(LamportError::PeerNotFound(node))
    }
}

#[async_trait]
impl MessageChannel<NodeHandle> for LocalNetwork {
    async fn send(&self, peer: NodeId, handle: &NodeHandle, message: Message) -> LamportResult<()> {
        if self.read().disconnected.contains(&peer) {
            return Err(LamportError::delivery(peer, "peer disconnected"));
        }
        handle.receive_message(message);
        Ok(())
    }
}
