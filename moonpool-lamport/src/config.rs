//! Node startup configuration.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{LamportError, LamportResult};
use crate::types::{NodeId, Value};

/// Startup parameters of a node.
///
/// Mirrors the launch arguments of a deployment: the node's own id, the
/// cluster size N and the ids of the N−1 other nodes.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// This node.
    pub id: NodeId,

    /// Total number of nodes, including this one.
    pub cluster_size: usize,

    /// The other nodes of the cluster.
    pub peers: Vec<NodeId>,

    /// Value stored before any write is committed.
    pub initial_value: Value,

    /// Upper bound on a single outbound send.
    ///
    /// `None` waits for the transport indefinitely. An expired send is
    /// reported as a delivery failure; the peer is not excluded from the
    /// quorum, so the affected write still needs its acknowledgement.
    pub send_timeout: Option<Duration>,
}

impl NodeConfig {
    /// Configuration for `id` in a cluster made of `id` and `peers`.
    pub fn new(id: NodeId, peers: Vec<NodeId>) -> Self {
        Self {
            id,
            cluster_size: peers.len() + 1,
            peers,
            initial_value: 0,
            send_timeout: None,
        }
    }

    /// Declare the expected cluster size; checked by [`validate`](Self::validate).
    pub fn with_cluster_size(mut self, cluster_size: usize) -> Self {
        self.cluster_size = cluster_size;
        self
    }

    /// Start from `value` instead of zero.
    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = value;
        self
    }

    /// Bound every outbound send by `timeout`.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Check the parameters are consistent.
    ///
    /// # Errors
    ///
    /// [`LamportError::InvalidConfig`] when N does not match the peer list,
    /// a peer is listed twice, or the node lists itself as a peer.
    pub fn validate(&self) -> LamportResult<()> {
        if self.cluster_size == 0 {
            return Err(LamportError::InvalidConfig(
                "cluster size must be at least 1".to_string(),
            ));
        }
        if self.peers.len() + 1 != self.cluster_size {
            return Err(LamportError::InvalidConfig(format!(
                "cluster of {} nodes needs {} peers, got {}",
                self.cluster_size,
                self.cluster_size - 1,
                self.peers.len()
            )));
        }

        let mut seen = HashSet::new();
        for peer in &self.peers {
            if *peer == self.id {
                return Err(LamportError::InvalidConfig(format!(
                    "{} lists itself as a peer",
                    self.id
                )));
            }
            if !seen.insert(*peer) {
                return Err(LamportError::InvalidConfig(format!(
                    "{} listed more than once",
                    peer
                )));
            }
        }
        Ok(())
    }
}
