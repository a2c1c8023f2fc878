//! Simulation test infrastructure for moonpool-lamport.
//!
//! ```text
//! ┌──────────┐   FIFO per pair   ┌──────────┐
//! │ engine 1 │ ◀───────────────▶ │ engine 2 │
//! └────┬─────┘                   └────┬─────┘
//!      │          ┌──────────┐        │
//!      └────────▶ │ engine 3 │ ◀──────┘
//!                 └──────────┘
//! ```
//!
//! Each step the [`network::SimNetwork`] picks, with a seeded RNG, either
//! the head of one non-empty channel to deliver or an idle node to start
//! its next write. Every engine effect is recorded so the invariant
//! checkers can inspect the full history of a run.

#![allow(dead_code)]

pub mod invariants;
pub mod network;
#[cfg(test)]
pub mod test_scenarios;
