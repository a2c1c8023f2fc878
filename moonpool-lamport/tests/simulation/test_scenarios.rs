//! Simulation scenarios.
//!
//! - `test_*`: a handful of seeds, small clusters
//! - `slow_simulation_*`: many seeds, more nodes and writes

use std::collections::BTreeSet;

use super::invariants::check_all;
use super::network::{SimConfig, SimNetwork};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_test_writer()
        .try_init();
}

fn run_seed(config: SimConfig, seed: u64) -> SimNetwork {
    let mut network = SimNetwork::new(config, seed);
    network.run();
    check_all(&network);
    network
}

fn run_seeds(config: SimConfig, seeds: std::ops::Range<u64>) -> Vec<SimNetwork> {
    seeds.map(|seed| run_seed(config.clone(), seed)).collect()
}

#[test]
fn test_single_node_commits_alone() {
    init_tracing();
    let config = SimConfig {
        nodes: 1,
        writes_per_node: 3,
        ..SimConfig::default()
    };
    let network = run_seed(config, 0);

    assert_eq!(network.commits.len(), 3);
    assert_eq!(network.delivered, 0);
}

#[test]
fn test_two_nodes_one_write_each() {
    init_tracing();
    let config = SimConfig {
        nodes: 2,
        ..SimConfig::default()
    };
    for network in run_seeds(config, 0..50) {
        assert_eq!(network.commits.len(), 2);
    }
}

#[test]
fn test_three_nodes_one_write_each() {
    init_tracing();
    run_seeds(SimConfig::default(), 0..100);
}

#[test]
fn test_same_seed_same_history() {
    init_tracing();
    let config = SimConfig {
        writes_per_node: 3,
        ..SimConfig::default()
    };
    let first = run_seed(config.clone(), 42);
    let second = run_seed(config, 42);

    assert_eq!(first.commits, second.commits);
    assert_eq!(first.step, second.step);
}

#[test]
fn test_timestamp_ties_are_exercised() {
    init_tracing();
    // With one write per node, two nodes often request before hearing from
    // each other and pick the same timestamp.
    let ties = run_seeds(SimConfig::default(), 0..100)
        .iter()
        .filter(|network| {
            let timestamps: BTreeSet<_> = network
                .commits
                .iter()
                .map(|commit| commit.request.timestamp)
                .collect();
            timestamps.len() < network.commits.len()
        })
        .count();

    assert!(ties > 0, "no run produced two requests with the same timestamp");
}

#[test]
fn test_ties_resolved_by_lower_id() {
    init_tracing();
    for network in run_seeds(SimConfig::default(), 0..100) {
        for pair in network.commits.windows(2) {
            if pair[0].request.timestamp == pair[1].request.timestamp {
                assert!(pair[0].node < pair[1].node);
            }
        }
    }
}

#[test]
fn test_every_node_ends_on_last_commit() {
    init_tracing();
    let config = SimConfig {
        nodes: 4,
        writes_per_node: 2,
        initial_value: -1,
        ..SimConfig::default()
    };
    for network in run_seeds(config, 0..30) {
        let last = network.commits.last().expect("writes were issued");
        for engine in network.engines.values() {
            assert_eq!(engine.value(), last.value);
        }
    }
}

#[test]
fn slow_simulation_five_nodes_many_writes() {
    init_tracing();
    let config = SimConfig {
        nodes: 5,
        writes_per_node: 5,
        ..SimConfig::default()
    };
    for network in run_seeds(config, 0..200) {
        assert_eq!(network.commits.len(), 25);
    }
}

#[test]
fn slow_simulation_seven_nodes() {
    init_tracing();
    let config = SimConfig {
        nodes: 7,
        writes_per_node: 3,
        ..SimConfig::default()
    };
    run_seeds(config, 0..100);
}
