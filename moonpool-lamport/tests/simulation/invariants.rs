//! Invariant checkers for simulated runs.
//!
//! ## Safety
//!
//! 1. **Admission order**: commits happen in strictly increasing
//!    `(timestamp, node id)` order, so no two writes overlap and every node
//!    sees the same sequence.
//! 2. **No overtaking**: when a node commits, no other node is still waiting
//!    on an older request.
//! 3. **Clock monotonicity**: a node's logical clock never goes back.
//!
//! ## Convergence (checked once the network is quiet)
//!
//! 1. Every issued write is committed exactly once.
//! 2. Every node holds the value of the last commit.
//! 3. No node is requesting and every pending set is empty.

use std::collections::BTreeSet;

use super::network::SimNetwork;

/// A property checked against the history of a run.
pub trait Invariant {
    fn name(&self) -> &str;
    fn check(&self, network: &SimNetwork);
}

pub struct AdmissionOrderChecker;

impl Invariant for AdmissionOrderChecker {
    fn name(&self) -> &str {
        "admission_order"
    }

    fn check(&self, network: &SimNetwork) {
        for pair in network.commits.windows(2) {
            assert!(
                pair[0].request < pair[1].request,
                "SAFETY VIOLATION: {} committed at step {} after {} committed at step {}",
                pair[1].request,
                pair[1].step,
                pair[0].request,
                pair[0].step,
            );
        }
    }
}

pub struct NoOvertakingChecker;

impl Invariant for NoOvertakingChecker {
    fn name(&self) -> &str {
        "no_overtaking"
    }

    fn check(&self, network: &SimNetwork) {
        for commit in &network.commits {
            for waiting in &commit.waiting {
                assert!(
                    *waiting > commit.request,
                    "SAFETY VIOLATION: {} committed at step {} while older {} was waiting",
                    commit.request,
                    commit.step,
                    waiting,
                );
            }
        }
    }
}

pub struct ClockMonotonicityChecker;

impl Invariant for ClockMonotonicityChecker {
    fn name(&self) -> &str {
        "clock_monotonicity"
    }

    fn check(&self, network: &SimNetwork) {
        for (node, history) in &network.clock_history {
            for pair in history.windows(2) {
                assert!(
                    pair[0] <= pair[1],
                    "SAFETY VIOLATION: clock of {} went from {} back to {}",
                    node,
                    pair[0],
                    pair[1],
                );
            }
        }
    }
}

pub struct ConvergenceChecker;

impl Invariant for ConvergenceChecker {
    fn name(&self) -> &str {
        "convergence"
    }

    fn check(&self, network: &SimNetwork) {
        assert_eq!(network.in_flight(), 0, "convergence checked while messages are in flight");

        let issued: BTreeSet<_> = network.issued.iter().map(|(_, value)| *value).collect();
        let committed: BTreeSet<_> = network.commits.iter().map(|commit| commit.value).collect();
        assert_eq!(
            network.commits.len(),
            network.issued.len(),
            "LIVENESS VIOLATION: {} writes issued, {} committed",
            network.issued.len(),
            network.commits.len(),
        );
        assert_eq!(issued, committed, "LIVENESS VIOLATION: committed values differ from issued ones");

        let expected = network.expected_final_value();
        for engine in network.engines.values() {
            assert_eq!(
                engine.value(),
                expected,
                "CONVERGENCE VIOLATION: {} holds {}, last commit wrote {}",
                engine.id(),
                engine.value(),
                expected,
            );
            assert!(!engine.is_requesting(), "{} still requesting", engine.id());
            assert!(
                engine.pending().is_empty(),
                "{} still has {} pending requests",
                engine.id(),
                engine.pending().len(),
            );
        }
    }
}

/// Safety checkers, valid at any point of a run.
pub fn safety_checkers() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(AdmissionOrderChecker),
        Box::new(NoOvertakingChecker),
        Box::new(ClockMonotonicityChecker),
    ]
}

/// Run every checker against a finished run.
pub fn check_all(network: &SimNetwork) {
    for checker in safety_checkers() {
        tracing::trace!(invariant = checker.name(), "checking");
        checker.check(network);
    }
    ConvergenceChecker.check(network);
}
