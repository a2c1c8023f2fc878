//! Pending request set.
//!
//! Every node keeps its own view of which nodes currently want the critical
//! section. Entries are keyed by node id (one outstanding request per node)
//! and ordered by `(timestamp, node id)`, which is a total order: given the
//! same entries, every node computes the same minimum.

use std::collections::{BTreeSet, HashMap};

use crate::error::LamportError;
use crate::types::{NodeId, Timestamp};

/// A request for the critical section as recorded in the pending set.
///
/// Field order matters: the derived `Ord` compares `timestamp` first and
/// falls back to `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingRequest {
    /// Logical time of the request.
    pub timestamp: Timestamp,
    /// Requesting node.
    pub node: NodeId,
}

impl PendingRequest {
    /// Build a pending request.
    pub fn new(timestamp: Timestamp, node: NodeId) -> Self {
        Self { timestamp, node }
    }
}

impl std::fmt::Display for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.timestamp, self.node)
    }
}

/// Outstanding requests, keyed by node and ordered by `(timestamp, node)`.
#[derive(Debug, Clone, Default)]
pub struct PendingRequestSet {
    by_node: HashMap<NodeId, PendingRequest>,
    ordered: BTreeSet<PendingRequest>,
}

impl PendingRequestSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request, replacing any earlier one from the same node.
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, node: NodeId, timestamp: Timestamp) -> Option<PendingRequest> {
        let request = PendingRequest::new(timestamp, node);
        let previous = self.by_node.insert(node, request);
        if let Some(prev) = previous {
            self.ordered.remove(&prev);
        }
        self.ordered.insert(request);
        previous
    }

    /// Drop the request of `node`. Absent entries are ignored.
    pub fn remove(&mut self, node: NodeId) -> Option<PendingRequest> {
        let removed = self.by_node.remove(&node);
        if let Some(request) = removed {
            self.ordered.remove(&request);
        }
        removed
    }

    /// The oldest request: smallest timestamp, ties going to the smaller id.
    pub fn minimum(&self) -> Result<&PendingRequest, LamportError> {
        self.ordered.first().ok_or(LamportError::EmptySet)
    }

    /// Request currently held for `node`.
    pub fn get(&self, node: NodeId) -> Option<&PendingRequest> {
        self.by_node.get(&node)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }

    /// Requests in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.ordered.iter()
    }
}
