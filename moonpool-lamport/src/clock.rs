//! Lamport logical clock.
//!
//! ```text
//! local send:   clock = clock + 1
//! on receive:   clock = max(clock + 1, remote + 1)
//! ```
//!
//! The clock lives inside the node's protocol engine and is only touched
//! under the node lock, so it is a plain counter rather than an atomic.

use crate::types::Timestamp;

/// Per-node Lamport clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogicalClock {
    now: Timestamp,
}

impl LogicalClock {
    /// A clock at logical time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Advance for a locally originated event and return the new time.
    pub fn tick(&mut self) -> Timestamp {
        self.now = self.now.next();
        self.now
    }

    /// Merge the timestamp of an inbound message and return the new time.
    ///
    /// Must run exactly once per inbound message, before anything else
    /// looks at the message.
    pub fn observe(&mut self, remote: Timestamp) -> Timestamp {
        self.now = std::cmp::max(self.now.next(), remote.next());
        self.now
    }
}
