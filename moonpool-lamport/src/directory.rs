//! Peer directory: binds node ids to callable handles.
//!
//! The node never performs discovery itself. Whoever launches it fills a
//! directory with every peer before the first write is issued; the node's
//! sender task resolves the destination of each outbound message through it.

use std::collections::HashMap;

use crate::error::{LamportError, LamportResult};
use crate::types::NodeId;

/// Resolves a node id to a handle a [`MessageChannel`](crate::MessageChannel) can send to.
pub trait PeerDirectory: Send + Sync + 'static {
    /// Whatever the channel needs to reach a peer (socket address, in-process sender, ...).
    type Handle: Clone + Send + Sync + 'static;

    /// Look up the handle of `node`.
    ///
    /// # Errors
    ///
    /// [`LamportError::PeerNotFound`] if the node is unknown.
    fn resolve(&self, node: NodeId) -> LamportResult<Self::Handle>;

    /// Check that every node in `nodes` resolves.
    ///
    /// This is the "link" step an operator runs once all nodes are up.
    fn verify(&self, nodes: &[NodeId]) -> LamportResult<()> {
        for node in nodes {
            self.resolve(*node)?;
        }
        Ok(())
    }
}

/// A directory over a fixed map, populated at startup.
#[derive(Debug, Clone)]
pub struct StaticPeerDirectory<H> {
    peers: HashMap<NodeId, H>,
}

impl<H> StaticPeerDirectory<H> {
    /// An empty directory.
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Add a peer, builder style.
    pub fn with_peer(mut self, node: NodeId, handle: H) -> Self {
        self.peers.insert(node, handle);
        self
    }
}

impl<H> Default for StaticPeerDirectory<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> FromIterator<(NodeId, H)> for StaticPeerDirectory<H> {
    fn from_iter<I: IntoIterator<Item = (NodeId, H)>>(iter: I) -> Self {
        Self {
            peers: iter.into_iter().collect(),
        }
    }
}

impl<H: Clone + Send + Sync + 'static> PeerDirectory for StaticPeerDirectory<H> {
    type Handle = H;

    fn resolve(&self, node: NodeId) -> LamportResult<H> {
        self.peers
            .get(&node)
            .cloned()
            .ok_or(LamportError::PeerNotFound(node))
    }
}
