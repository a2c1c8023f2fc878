//! Protocol engine: the per-node Lamport mutual exclusion state machine.
//!
//! The engine is pure and synchronous. Each transition mutates local state
//! and returns the [`Effect`]s the caller must carry out (sends, broadcasts,
//! commit notifications). The [`node`](crate::node) module runs it behind a
//! lock and performs the effects outside of it.
//!
//! ## Round of a write
//!
//! ```text
//! request_write(v):
//!   clock.tick(); requesting = true; desired = v; acks = 0
//!   pending.insert(self, clock)
//!   broadcast REQUEST(clock, self)
//!
//! on REQUEST(ts, j):       observe(ts); pending.insert(j, ts); send ACK(clock, self) to j
//! on ACK(ts, j):           observe(ts); acks += 1; if acks == N-1: try_enter()
//! on LIBERATION(ts, j, v): observe(ts); pending.remove(j); value = v unless newer stored; try_enter()
//!
//! try_enter():
//!   if requesting && acks == N-1 && pending.minimum() == pending.get(self):
//!     value = desired; pending.remove(self); requesting = false; acks = 0
//!     broadcast LIBERATION(clock, self, value)
//! ```
//!
//! There is no "in critical section" state: commit happens inside the
//! transition that makes the admission conditions true.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::clock::LogicalClock;
use crate::error::LamportError;
use crate::queue::{PendingRequest, PendingRequestSet};
use crate::types::{Commit, Message, NodeId, Timestamp, Value};

/// Something the engine wants done after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver `message` to a single peer.
    Send {
        /// Destination.
        to: NodeId,
        /// Message to deliver.
        message: Message,
    },
    /// Deliver `message` to every peer.
    Broadcast(Message),
    /// This node applied its own write.
    Committed(Commit),
}

/// Lamport mutual exclusion state for one node.
#[derive(Debug, Clone)]
pub struct ProtocolEngine {
    id: NodeId,
    peers: BTreeSet<NodeId>,
    clock: LogicalClock,
    value: Value,
    pending: PendingRequestSet,
    ack_count: usize,
    requesting: bool,
    desired_value: Value,
    /// Request whose value is currently stored.
    last_applied: Option<PendingRequest>,
}

impl ProtocolEngine {
    /// Create the engine for node `id`.
    ///
    /// `peers` are the other N−1 nodes; duplicates and `id` itself are
    /// ignored.
    pub fn new(id: NodeId, peers: impl IntoIterator<Item = NodeId>, initial_value: Value) -> Self {
        let peers = peers.into_iter().filter(|peer| *peer != id).collect();
        Self {
            id,
            peers,
            clock: LogicalClock::new(),
            value: initial_value,
            pending: PendingRequestSet::new(),
            ack_count: 0,
            requesting: false,
            desired_value: initial_value,
            last_applied: None,
        }
    }

    /// This node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The other nodes of the cluster.
    pub fn peers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.peers.iter().copied()
    }

    /// Total number of nodes, N.
    pub fn cluster_size(&self) -> usize {
        self.peers.len() + 1
    }

    /// Current stored value. Uncoordinated and possibly stale.
    pub fn value(&self) -> Value {
        self.value
    }

    /// Current logical time.
    pub fn clock(&self) -> Timestamp {
        self.clock.now()
    }

    /// Whether a local write is waiting for the critical section.
    pub fn is_requesting(&self) -> bool {
        self.requesting
    }

    /// Acknowledgements collected for the current request.
    pub fn ack_count(&self) -> usize {
        self.ack_count
    }

    /// This node's view of outstanding requests.
    pub fn pending(&self) -> &PendingRequestSet {
        &self.pending
    }

    /// Ask for the critical section in order to store `new_value`.
    ///
    /// Returns the REQUEST broadcast. The write is applied later, when
    /// enough acknowledgements and liberations have been processed.
    ///
    /// # Errors
    ///
    /// [`LamportError::WriteInProgress`] if an earlier write has not been
    /// committed yet; the outstanding request is left untouched.
    pub fn request_write(&mut self, new_value: Value) -> Result<Vec<Effect>, LamportError> {
        if self.requesting {
            return Err(LamportError::WriteInProgress);
        }

        let timestamp = self.clock.tick();
        self.requesting = true;
        self.desired_value = new_value;
        self.ack_count = 0;
        self.pending.insert(self.id, timestamp);

        let request = Message::Request {
            timestamp,
            sender: self.id,
        };
        info!(
            node = %self.id,
            clock = %timestamp,
            value = new_value,
            "sending REQUEST to other nodes"
        );

        let mut effects = vec![Effect::Broadcast(request)];
        // A single-node cluster needs no acknowledgement at all.
        self.try_enter_critical_section(&mut effects);
        Ok(effects)
    }

    /// Process an inbound message.
    ///
    /// Never fails: anything unexpected is logged and dropped.
    pub fn on_message(&mut self, message: Message) -> Vec<Effect> {
        let sender = message.sender();
        if !self.peers.contains(&sender) {
            warn!(
                node = %self.id,
                %message,
                "dropping message from unknown sender"
            );
            return Vec::new();
        }

        let now = self.clock.observe(message.timestamp());
        debug!(node = %self.id, clock = %now, %message, "message received");

        let mut effects = Vec::new();
        match message {
            Message::Request { timestamp, sender } => {
                self.pending.insert(sender, timestamp);
                effects.push(Effect::Send {
                    to: sender,
                    message: Message::Acknowledgement {
                        timestamp: now,
                        sender: self.id,
                    },
                });
            }
            Message::Acknowledgement { .. } => {
                if !self.requesting {
                    warn!(node = %self.id, %sender, "ignoring acknowledgement without a request");
                    return effects;
                }
                self.ack_count += 1;
                if self.ack_count == self.peers.len() {
                    self.try_enter_critical_section(&mut effects);
                }
            }
            Message::Liberation { new_value, .. } => {
                match self.pending.remove(sender) {
                    Some(request) => self.apply(request, new_value),
                    None => {
                        debug!(node = %self.id, %sender, "liberation for a request not in the queue");
                        self.value = new_value;
                    }
                }
                self.try_enter_critical_section(&mut effects);
            }
        }
        effects
    }

    /// Store the value written by `request`, unless a later write is already stored.
    ///
    /// Liberations from different senders travel on different channels and
    /// may arrive out of admission order.
    fn apply(&mut self, request: PendingRequest, value: Value) {
        match self.last_applied {
            Some(last) if last > request => {
                debug!(
                    node = %self.id,
                    request = %request,
                    applied = %last,
                    "ignoring value of an older write"
                );
            }
            _ => {
                self.value = value;
                self.last_applied = Some(request);
            }
        }
    }

    /// Commit the local write if this node may enter the critical section.
    fn try_enter_critical_section(&mut self, effects: &mut Vec<Effect>) {
        if !self.requesting || self.ack_count != self.peers.len() {
            return;
        }
        let Some(own) = self.pending.get(self.id).copied() else {
            return;
        };
        match self.pending.minimum() {
            Ok(oldest) if *oldest == own => {}
            Ok(oldest) => {
                debug!(
                    node = %self.id,
                    own = %own,
                    oldest = %oldest,
                    "waiting for an older request"
                );
                return;
            }
            Err(_) => return,
        }

        info!(node = %self.id, request = %own, "entering the critical section");
        self.apply(own, self.desired_value);
        self.pending.remove(self.id);
        self.requesting = false;
        self.ack_count = 0;

        let liberation_timestamp = self.clock.now();
        effects.push(Effect::Committed(Commit {
            value: self.value,
            request_timestamp: own.timestamp,
            liberation_timestamp,
        }));
        effects.push(Effect::Broadcast(Message::Liberation {
            timestamp: liberation_timestamp,
            sender: self.id,
            new_value: self.value,
        }));
        info!(
            node = %self.id,
            clock = %liberation_timestamp,
            value = self.value,
            "value updated, liberating the critical section"
        );
    }
}
