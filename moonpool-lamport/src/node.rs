//! Node runtime: runs a [`ProtocolEngine`] as an actor.
//!
//! ```text
//!  peers ──receive_message──┐
//!                           ▼
//!  client ──request_write──▶ mailbox ──▶ worker ──(lock)──▶ ProtocolEngine
//!                                          │
//!                                          ▼ effects
//!                                       outbox ──▶ sender ──▶ PeerDirectory + MessageChannel
//! ```
//!
//! All engine state sits behind one mutex per node. The worker is the only
//! writer and never holds the lock across an await; sends happen in a
//! separate task that drains the outbox in order, so messages to a given
//! peer leave in the order the engine produced them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::directory::PeerDirectory;
use crate::engine::{Effect, ProtocolEngine};
use crate::error::{LamportError, LamportResult};
use crate::queue::PendingRequest;
use crate::transport::MessageChannel;
use crate::types::{Commit, Message, NodeId, Timestamp, Value};

/// Point-in-time view of a node's protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// The node.
    pub id: NodeId,
    /// Stored value.
    pub value: Value,
    /// Logical time.
    pub clock: Timestamp,
    /// Whether a local write waits for the critical section.
    pub requesting: bool,
    /// Acknowledgements collected for that write.
    pub ack_count: usize,
    /// Pending requests in admission order.
    pub pending: Vec<PendingRequest>,
}

/// Completion signal of a write accepted by [`NodeHandle::request_write`].
#[derive(Debug)]
pub struct WriteTicket {
    commit: oneshot::Receiver<Commit>,
}

impl WriteTicket {
    /// Wait until this node applies the write.
    ///
    /// There is no deadline: a peer that never acknowledges stalls the
    /// write forever. Wrap in `tokio::time::timeout` to bound the wait.
    ///
    /// # Errors
    ///
    /// [`LamportError::NodeStopped`] if the node shut down first.
    pub async fn committed(self) -> LamportResult<Commit> {
        self.commit.await.map_err(|_| LamportError::NodeStopped)
    }
}

enum Command {
    Deliver(Message),
    Write {
        value: Value,
        broadcast: oneshot::Sender<LamportResult<()>>,
        commit: oneshot::Sender<Commit>,
    },
}

enum Target {
    Peer(NodeId),
    All,
}

struct Outbound {
    target: Target,
    message: Message,
    done: Option<oneshot::Sender<LamportResult<()>>>,
}

/// Cheap, cloneable entry point to a running node.
///
/// Exposes the three operations of a node: `get_value`, `request_write`
/// and `receive_message`.
#[derive(Clone)]
pub struct NodeHandle {
    id: NodeId,
    engine: Arc<Mutex<ProtocolEngine>>,
    mailbox: mpsc::UnboundedSender<Command>,
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle").field("id", &self.id).finish()
    }
}

impl NodeHandle {
    /// The node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Current stored value.
    ///
    /// Returns immediately. The read is not ordered against writes still
    /// waiting for the critical section, on this node or elsewhere.
    pub fn get_value(&self) -> Value {
        lock(&self.engine).value()
    }

    /// Snapshot of the protocol state.
    pub fn status(&self) -> NodeStatus {
        let engine = lock(&self.engine);
        NodeStatus {
            id: engine.id(),
            value: engine.value(),
            clock: engine.clock(),
            requesting: engine.is_requesting(),
            ack_count: engine.ack_count(),
            pending: engine.pending().iter().copied().collect(),
        }
    }

    /// Ask the cluster to store `value`.
    ///
    /// Returns once the REQUEST has been handed to every peer; the write is
    /// applied later. Await [`WriteTicket::committed`] to learn when.
    ///
    /// # Errors
    ///
    /// - [`LamportError::WriteInProgress`] if an earlier write is pending
    /// - [`LamportError::DeliveryFailure`] / [`LamportError::PeerNotFound`]
    ///   if a peer could not be reached. The request stays queued: peers
    ///   that did receive it already hold an entry for it.
    /// - [`LamportError::NodeStopped`] if the node is gone
    pub async fn request_write(&self, value: Value) -> LamportResult<WriteTicket> {
        let (broadcast_tx, broadcast_rx) = oneshot::channel();
        let (commit_tx, commit_rx) = oneshot::channel();
        self.mailbox
            .send(Command::Write {
                value,
                broadcast: broadcast_tx,
                commit: commit_tx,
            })
            .map_err(|_| LamportError::NodeStopped)?;

        broadcast_rx.await.map_err(|_| LamportError::NodeStopped)??;
        Ok(WriteTicket { commit: commit_rx })
    }

    /// Hand an inbound peer message to the node. Fire and forget.
    pub fn receive_message(&self, message: Message) {
        if self.mailbox.send(Command::Deliver(message)).is_err() {
            warn!(node = %self.id, %message, "node stopped, dropping message");
        }
    }
}

/// A running node and its background tasks.
pub struct Node {
    handle: NodeHandle,
    worker: JoinHandle<()>,
    sender: JoinHandle<()>,
}

impl Node {
    /// Validate `config` and start the node on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// [`LamportError::InvalidConfig`] if the configuration is inconsistent.
    pub fn spawn<D, C>(config: NodeConfig, directory: D, channel: C) -> LamportResult<Self>
    where
        D: PeerDirectory,
        C: MessageChannel<D::Handle>,
    {
        config.validate()?;

        let engine = Arc::new(Mutex::new(ProtocolEngine::new(
            config.id,
            config.peers.iter().copied(),
            config.initial_value,
        )));
        let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            id: config.id,
            engine: engine.clone(),
            outbox: outbox_tx,
            commit_waiter: None,
        };
        let sender = Sender {
            id: config.id,
            peers: config.peers.clone(),
            directory,
            channel,
            send_timeout: config.send_timeout,
        };

        info!(
            node = %config.id,
            cluster_size = config.cluster_size,
            value = config.initial_value,
            "node started"
        );

        Ok(Self {
            handle: NodeHandle {
                id: config.id,
                engine,
                mailbox: mailbox_tx,
            },
            worker: tokio::spawn(worker.run(mailbox_rx)),
            sender: tokio::spawn(sender.run(outbox_rx)),
        })
    }

    /// A handle to this node.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Stop the background tasks. Outstanding tickets resolve with `NodeStopped`.
    pub fn shutdown(self) {
        self.worker.abort();
        self.sender.abort();
        info!(node = %self.handle.id, "node stopped");
    }
}

fn lock(engine: &Mutex<ProtocolEngine>) -> MutexGuard<'_, ProtocolEngine> {
    // Transitions never panic midway; a poisoned lock still holds a usable engine.
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    id: NodeId,
    engine: Arc<Mutex<ProtocolEngine>>,
    outbox: mpsc::UnboundedSender<Outbound>,
    commit_waiter: Option<oneshot::Sender<Commit>>,
}

impl Worker {
    async fn run(mut self, mut mailbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = mailbox.recv().await {
            match command {
                Command::Deliver(message) => {
                    let effects = lock(&self.engine).on_message(message);
                    self.dispatch(effects, None);
                }
                Command::Write {
                    value,
                    broadcast,
                    commit,
                } => {
                    let result = lock(&self.engine).request_write(value);
                    match result {
                        Ok(effects) => {
                            self.commit_waiter = Some(commit);
                            self.dispatch(effects, Some(broadcast));
                        }
                        Err(e) => {
                            let _ = broadcast.send(Err(e));
                        }
                    }
                }
            }
        }
        debug!(node = %self.id, "mailbox closed");
    }

    /// Forward effects to the sender task. `request_done` is attached to the
    /// first broadcast, which is always the REQUEST of a local write.
    fn dispatch(
        &mut self,
        effects: Vec<Effect>,
        mut request_done: Option<oneshot::Sender<LamportResult<()>>>,
    ) {
        for effect in effects {
            let outbound = match effect {
                Effect::Committed(commit) => {
                    if let Some(waiter) = self.commit_waiter.take() {
                        let _ = waiter.send(commit);
                    }
                    continue;
                }
                Effect::Send { to, message } => Outbound {
                    target: Target::Peer(to),
                    message,
                    done: None,
                },
                Effect::Broadcast(message) => Outbound {
                    target: Target::All,
                    message,
                    done: request_done.take(),
                },
            };
            if self.outbox.send(outbound).is_err() {
                warn!(node = %self.id, "sender task gone, dropping outbound message");
            }
        }
    }
}

struct Sender<D, C> {
    id: NodeId,
    peers: Vec<NodeId>,
    directory: D,
    channel: C,
    send_timeout: Option<Duration>,
}

impl<D, C> Sender<D, C>
where
    D: PeerDirectory,
    C: MessageChannel<D::Handle>,
{
    async fn run(self, mut outbox: mpsc::UnboundedReceiver<Outbound>) {
        while let Some(outbound) = outbox.recv().await {
            let result = match outbound.target {
                Target::Peer(peer) => self.send_to(peer, outbound.message).await,
                Target::All => self.broadcast(outbound.message).await,
            };
            match outbound.done {
                Some(done) => {
                    let _ = done.send(result);
                }
                None => {
                    if let Err(e) = result {
                        warn!(node = %self.id, message = %outbound.message, error = %e, "send failed");
                    }
                }
            }
        }
    }

    /// Send to every peer, even past a failure. Reports the first error.
    async fn broadcast(&self, message: Message) -> LamportResult<()> {
        let mut result = Ok(());
        for peer in &self.peers {
            if let Err(e) = self.send_to(*peer, message).await {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    async fn send_to(&self, peer: NodeId, message: Message) -> LamportResult<()> {
        let handle = self.directory.resolve(peer)?;
        debug!(node = %self.id, %peer, %message, "sending");

        let send = self.channel.send(peer, &handle, message);
        match self.send_timeout {
            Some(limit) => tokio::time::timeout(limit, send).await.map_err(|_| {
                LamportError::delivery(peer, format!("timed out after {:?}", limit))
            })?,
            None => send.await,
        }
    }
}
