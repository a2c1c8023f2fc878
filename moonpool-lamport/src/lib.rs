//! # Moonpool Lamport: mutual exclusion over a replicated register
//!
//! N peer nodes each hold a copy of one integer. Any node may ask to change
//! it; Lamport's distributed mutual exclusion algorithm makes every node
//! apply the writes in the same total order.
//!
//! ## Protocol
//!
//! | Step | Message | Effect on the receiver |
//! |------|---------|------------------------|
//! | A node wants to write | `REQUEST(ts, id)` to all | queue the request, reply `ACKNOWLEDGEMENT` |
//! | A peer recorded the request | `ACKNOWLEDGEMENT(ts, id)` | count it; at N−1, check admission |
//! | The writer committed | `LIBERATION(ts, id, value)` to all | dequeue, apply value, check admission |
//!
//! A node commits when it holds N−1 acknowledgements and its own request is
//! the smallest `(timestamp, node id)` in its queue. Every message advances
//! the receiver's [Lamport clock](clock::LogicalClock).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ NodeHandle  get_value / request_write /      │
//! │             receive_message                  │
//! └──────────────────────┬───────────────────────┘
//!                        │ mailbox
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ Worker ──lock──▶ ProtocolEngine              │
//! │                  LogicalClock                │
//! │                  PendingRequestSet           │
//! └──────────────────────┬───────────────────────┘
//!                        │ outbox
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │ Sender ──▶ PeerDirectory ──▶ MessageChannel  │
//! │            (LocalNetwork | TcpChannel)       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Assumptions
//!
//! Delivery is reliable, at most once and FIFO per sender/receiver pair.
//! Crashed or unreachable peers are not tolerated: a write waits for every
//! acknowledgement.
//!
//! ## Crate Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | `NodeId`, `Timestamp`, `Message`, `Commit` |
//! | [`clock`] | `LogicalClock` |
//! | [`queue`] | `PendingRequestSet` |
//! | [`engine`] | `ProtocolEngine` state machine |
//! | [`node`] | `Node` actor and `NodeHandle` |
//! | [`directory`] | `PeerDirectory` trait, `StaticPeerDirectory` |
//! | [`transport`] | `MessageChannel` trait, in-process and TCP transports |
//! | [`codec`] / [`wire`] | message encoding and TCP framing |
//! | [`config`] | `NodeConfig` |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod codec;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod node;
pub mod queue;
pub mod transport;
pub mod types;
pub mod wire;

pub use clock::LogicalClock;
pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use config::NodeConfig;
pub use directory::{PeerDirectory, StaticPeerDirectory};
pub use engine::{Effect, ProtocolEngine};
pub use error::{LamportError, LamportResult};
pub use node::{Node, NodeHandle, NodeStatus, WriteTicket};
pub use queue::{PendingRequest, PendingRequestSet};
pub use transport::local::LocalNetwork;
pub use transport::tcp::TcpChannel;
pub use transport::MessageChannel;
pub use types::{Commit, Message, MessageKind, NodeId, Timestamp, Value};
