//! Deterministic in-memory network of protocol engines.
//!
//! Channels are keyed by `(from, to)` and are FIFO; nothing else about
//! delivery order is guaranteed. All randomness comes from one seeded
//! [`ChaCha8Rng`], so a seed fully determines a run.

use std::collections::{BTreeMap, VecDeque};

use moonpool_lamport::{Effect, Message, NodeId, PendingRequest, ProtocolEngine, Timestamp, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A write applied by the node that requested it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Simulation step of the commit.
    pub step: u64,
    /// Committing node.
    pub node: NodeId,
    /// The request that was admitted.
    pub request: PendingRequest,
    /// Value written.
    pub value: Value,
    /// Own requests of the other nodes still waiting at that moment.
    pub waiting: Vec<PendingRequest>,
}

/// Workload and topology of one run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of nodes; ids are `1..=nodes`.
    pub nodes: u64,
    /// Writes each node issues, one after the other.
    pub writes_per_node: usize,
    /// Value every node starts with.
    pub initial_value: Value,
    /// Step budget before the run is declared stuck.
    pub max_steps: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nodes: 3,
            writes_per_node: 1,
            initial_value: 0,
            max_steps: 100_000,
        }
    }
}

/// Engines plus the messages in flight between them.
pub struct SimNetwork {
    pub config: SimConfig,
    pub engines: BTreeMap<NodeId, ProtocolEngine>,
    pub channels: BTreeMap<(NodeId, NodeId), VecDeque<Message>>,
    pub remaining_writes: BTreeMap<NodeId, VecDeque<Value>>,
    pub commits: Vec<CommitRecord>,
    pub issued: Vec<(NodeId, Value)>,
    pub clock_history: BTreeMap<NodeId, Vec<Timestamp>>,
    pub delivered: u64,
    pub step: u64,
    rng: ChaCha8Rng,
}

/// Value written by the `k`-th write of `node`. Unique across a run.
pub fn write_value(node: NodeId, k: usize) -> Value {
    (node.0 as Value) * 1_000 + k as Value
}

impl SimNetwork {
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let ids: Vec<NodeId> = (1..=config.nodes).map(NodeId::new).collect();

        let engines = ids
            .iter()
            .map(|id| {
                let peers = ids.iter().copied().filter(|peer| peer != id);
                (*id, ProtocolEngine::new(*id, peers, config.initial_value))
            })
            .collect();
        let remaining_writes = ids
            .iter()
            .map(|id| {
                let writes = (0..config.writes_per_node)
                    .map(|k| write_value(*id, k))
                    .collect();
                (*id, writes)
            })
            .collect();
        let clock_history = ids.iter().map(|id| (*id, vec![Timestamp::ZERO])).collect();

        Self {
            config,
            engines,
            channels: BTreeMap::new(),
            remaining_writes,
            commits: Vec::new(),
            issued: Vec::new(),
            clock_history,
            delivered: 0,
            step: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Run until no message is in flight and every write was issued.
    ///
    /// Panics if the step budget runs out.
    pub fn run(&mut self) {
        while self.step() {
            assert!(
                self.step <= self.config.max_steps,
                "LIVENESS VIOLATION: no quiescence after {} steps",
                self.config.max_steps
            );
        }
    }

    /// Perform one random action. Returns `false` once nothing is left to do.
    pub fn step(&mut self) -> bool {
        let busy: Vec<(NodeId, NodeId)> = self
            .channels
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(pair, _)| *pair)
            .collect();
        let writers: Vec<NodeId> = self
            .remaining_writes
            .iter()
            .filter(|(id, writes)| !writes.is_empty() && !self.engines[*id].is_requesting())
            .map(|(id, _)| *id)
            .collect();

        let choices = busy.len() + writers.len();
        if choices == 0 {
            return false;
        }
        self.step += 1;

        let pick = self.rng.gen_range(0..choices);
        if pick < busy.len() {
            let (from, to) = busy[pick];
            self.deliver(from, to);
        } else {
            self.issue_write(writers[pick - busy.len()]);
        }
        true
    }

    fn deliver(&mut self, from: NodeId, to: NodeId) {
        let Some(message) = self.channels.get_mut(&(from, to)).and_then(VecDeque::pop_front) else {
            return;
        };
        self.delivered += 1;
        let effects = self.engine_mut(to).on_message(message);
        self.apply_effects(to, effects);
    }

    fn issue_write(&mut self, node: NodeId) {
        let Some(value) = self
            .remaining_writes
            .get_mut(&node)
            .and_then(VecDeque::pop_front)
        else {
            return;
        };
        self.issued.push((node, value));
        let effects = self
            .engine_mut(node)
            .request_write(value)
            .expect("idle node accepts a write");
        self.apply_effects(node, effects);
    }

    fn engine_mut(&mut self, node: NodeId) -> &mut ProtocolEngine {
        self.engines.get_mut(&node).expect("known node")
    }

    fn apply_effects(&mut self, node: NodeId, effects: Vec<Effect>) {
        let clock = self.engines[&node].clock();
        self.clock_history.entry(node).or_default().push(clock);

        for effect in effects {
            match effect {
                Effect::Send { to, message } => {
                    self.channels.entry((node, to)).or_default().push_back(message);
                }
                Effect::Broadcast(message) => {
                    let peers: Vec<NodeId> = self.engines[&node].peers().collect();
                    for peer in peers {
                        self.channels
                            .entry((node, peer))
                            .or_default()
                            .push_back(message);
                    }
                }
                Effect::Committed(commit) => {
                    let waiting = self
                        .engines
                        .values()
                        .filter(|engine| engine.id() != node && engine.is_requesting())
                        .filter_map(|engine| engine.pending().get(engine.id()).copied())
                        .collect();
                    self.commits.push(CommitRecord {
                        step: self.step,
                        node,
                        request: PendingRequest::new(commit.request_timestamp, node),
                        value: commit.value,
                        waiting,
                    });
                }
            }
        }
    }

    /// Messages not delivered yet.
    pub fn in_flight(&self) -> usize {
        self.channels.values().map(VecDeque::len).sum()
    }

    /// Value every node should hold once the run is over.
    pub fn expected_final_value(&self) -> Value {
        self.commits
            .last()
            .map_or(self.config.initial_value, |commit| commit.value)
    }
}
