//! Lamport node: one member of a replicated-register cluster over TCP.
//!
//! Each node is identified by the port it listens on. Start every node of a
//! three-node cluster, then type commands in any of their consoles:
//!
//! ```bash
//! cargo run --bin lamport-node -- --port 5000 --nodes 3 --peers 5001,5002
//! cargo run --bin lamport-node -- --port 5001 --nodes 3 --peers 5000,5002
//! cargo run --bin lamport-node -- --port 5002 --nodes 3 --peers 5000,5001
//! ```
//!
//! Console commands:
//!
//! - `l`: check that every peer accepts connections
//! - `p`: print the current value
//! - `w <int>`: request a write
//! - `q`: quit

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use moonpool_lamport::transport::tcp::{probe, serve};
use moonpool_lamport::{
    JsonCodec, Node, NodeConfig, NodeHandle, NodeId, StaticPeerDirectory, TcpChannel,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const UNKNOWN_COMMAND: &str = "Unknown command";

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "lamport-node")]
#[command(about = "Replicated register node using Lamport mutual exclusion", long_about = None)]
struct Args {
    /// Port to listen on; also this node's id
    #[arg(short, long)]
    port: u16,

    /// Total number of nodes in the cluster
    #[arg(short, long)]
    nodes: usize,

    /// Comma-separated ports of the other nodes
    /// Example: --peers 5001,5002
    #[arg(long, value_delimiter = ',')]
    peers: Vec<u16>,

    /// Host every node listens on
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Initial value of the register
    #[arg(long, default_value = "0")]
    value: i64,

    /// Give up on a single send after this many milliseconds
    #[arg(long)]
    send_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,moonpool_lamport=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let id = NodeId::from(args.port);
    let peers: Vec<NodeId> = args.peers.iter().copied().map(NodeId::from).collect();
    let peer_addrs: Vec<(NodeId, SocketAddr)> = args
        .peers
        .iter()
        .map(|port| (NodeId::from(*port), SocketAddr::new(args.host, *port)))
        .collect();

    let mut config = NodeConfig::new(id, peers)
        .with_cluster_size(args.nodes)
        .with_initial_value(args.value);
    if let Some(ms) = args.send_timeout_ms {
        config = config.with_send_timeout(Duration::from_millis(ms));
    }

    let directory: StaticPeerDirectory<SocketAddr> = peer_addrs.iter().copied().collect();
    let listener = TcpListener::bind(SocketAddr::new(args.host, args.port)).await?;
    let node = Node::spawn(config, directory, TcpChannel::new())?;
    let handle = node.handle();

    tokio::spawn({
        let handle = handle.clone();
        async move {
            if let Err(e) = serve(listener, handle, JsonCodec).await {
                tracing::error!(error = %e, "listener failed");
            }
        }
    });

    tracing::info!(%id, port = args.port, "node listening");
    run_console(handle, &peer_addrs).await?;

    node.shutdown();
    Ok(())
}

async fn run_console(
    node: NodeHandle,
    peers: &[(NodeId, SocketAddr)],
) -> std::io::Result<()> {
    print_menu();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };

        match command.to_ascii_lowercase().as_str() {
            "p" => println!("{}", node.get_value()),
            "w" => match words.next().map(str::parse::<i64>) {
                Some(Ok(value)) => request_write(&node, value).await,
                _ => println!("{}", UNKNOWN_COMMAND),
            },
            "l" => link(peers).await,
            "s" => println!("{:?}", node.status()),
            "q" => break,
            _ => println!("{}", UNKNOWN_COMMAND),
        }
    }
    Ok(())
}

async fn request_write(node: &NodeHandle, value: i64) {
    match node.request_write(value).await {
        Ok(ticket) => {
            println!("write of {} requested", value);
            tokio::spawn(async move {
                match ticket.committed().await {
                    Ok(commit) => println!("committed value {}", commit.value),
                    Err(e) => println!("write of {} abandoned: {}", value, e),
                }
            });
        }
        Err(e) => println!("write of {} failed: {}", value, e),
    }
}

async fn link(peers: &[(NodeId, SocketAddr)]) {
    let mut reachable = 0;
    for (peer, addr) in peers {
        match probe(*addr).await {
            Ok(()) => reachable += 1,
            Err(e) => println!("{} at {} unreachable: {}", peer, addr, e),
        }
    }
    println!("{}/{} peers reachable", reachable, peers.len());
}

fn print_menu() {
    println!("Enter the command you would like to execute:");
    println!("- \"l\" to check the other nodes are up");
    println!("- \"p\" to print the current value");
    println!("- \"w <int>\" to set a new value");
    println!("- \"s\" to print the protocol state");
    println!("- \"q\" to quit");
}
