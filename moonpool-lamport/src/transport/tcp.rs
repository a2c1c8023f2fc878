//! TCP transport.
//!
//! Outbound, [`TcpChannel`] keeps one connection per peer and writes one
//! frame (see [`wire`](crate::wire)) per message; a single connection per
//! destination gives the FIFO ordering the protocol needs. A stream is only
//! cached again after a complete frame went out: a failed write, or a send
//! cancelled mid-frame (e.g. by a timeout), drops the connection so the next
//! message starts on a fresh stream instead of behind a partial frame.
//!
//! Inbound, [`serve`] accepts connections and feeds every decoded message to
//! a [`NodeHandle`]. Frames that fail to decode are logged and skipped.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::codec::{JsonCodec, MessageCodec};
use crate::error::{LamportError, LamportResult};
use crate::node::NodeHandle;
use crate::transport::MessageChannel;
use crate::types::{Message, NodeId};
use crate::wire::{read_frame, write_frame};

/// Outbound TCP channel, handle type `SocketAddr`.
pub struct TcpChannel<C: MessageCodec = JsonCodec> {
    codec: C,
    connections: Mutex<HashMap<NodeId, TcpStream>>,
}

impl TcpChannel<JsonCodec> {
    /// A channel using the JSON codec.
    pub fn new() -> Self {
        Self::with_codec(JsonCodec)
    }
}

impl Default for TcpChannel<JsonCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: MessageCodec> TcpChannel<C> {
    /// A channel using `codec`.
    pub fn with_codec(codec: C) -> Self {
        Self {
            codec,
            connections: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<C: MessageCodec> MessageChannel<SocketAddr> for TcpChannel<C> {
    async fn send(&self, peer: NodeId, addr: &SocketAddr, message: Message) -> LamportResult<()> {
        let payload = self.codec.encode(&message)?;
        let mut connections = self.connections.lock().await;

        // Out of the map while writing; dropping this future drops the stream.
        let mut stream = match connections.remove(&peer) {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| LamportError::delivery(peer, e.to_string()))?;
                stream
                    .set_nodelay(true)
                    .map_err(|e| LamportError::delivery(peer, e.to_string()))?;
                debug!(%peer, %addr, "connected");
                stream
            }
        };

        write_frame(&mut stream, &payload)
            .await
            .map_err(|e| LamportError::delivery(peer, e.to_string()))?;
        connections.insert(peer, stream);
        Ok(())
    }
}

/// Accept peer connections on `listener` and deliver their messages to `node`.
///
/// Runs until the listener fails.
pub async fn serve<C: MessageCodec>(
    listener: TcpListener,
    node: NodeHandle,
    codec: C,
) -> LamportResult<()> {
    info!(node = %node.id(), addr = %listener.local_addr()?, "listening for peers");
    loop {
        let (stream, remote) = listener.accept().await?;
        debug!(node = %node.id(), %remote, "peer connected");
        tokio::spawn(read_connection(stream, remote, node.clone(), codec.clone()));
    }
}

async fn read_connection<C: MessageCodec>(
    mut stream: TcpStream,
    remote: SocketAddr,
    node: NodeHandle,
    codec: C,
) {
    loop {
        let payload = match read_frame(&mut stream).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(node = %node.id(), %remote, "peer closed connection");
                return;
            }
            Err(e) => {
                warn!(node = %node.id(), %remote, error = %e, "closing connection");
                return;
            }
        };

        match codec.decode(&payload) {
            Ok(message) => node.receive_message(message),
            Err(e) => warn!(node = %node.id(), %remote, error = %e, "dropping undecodable message"),
        }
    }
}

/// Check that something accepts connections at `addr`.
pub async fn probe(addr: SocketAddr) -> LamportResult<()> {
    TcpStream::connect(addr).await?;
    Ok(())
}
