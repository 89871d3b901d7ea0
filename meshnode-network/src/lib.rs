use std::collections::HashMap;
use std::sync::Arc;

use meshnode_proto::{Block, NodeClient, Transaction, Version};
use parking_lot::RwLock;
use thiserror::Error;
use tonic::transport::Channel;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("dial failed: {0}")]
    Dial(#[from] tonic::transport::Error),
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),
}

#[derive(Clone)]
struct PeerEntry {
    client: NodeClient<Channel>,
    last_version: Version,
}

/// Mapping from peer listen address to its client handle and last known
/// Version, de-duplicated by advertised `listen_addr` rather than by dial
/// identity.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, PeerEntry>>,
}

impl PeerRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, listen_addr: &str) -> bool {
        self.peers.read().contains_key(listen_addr)
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn peer_version(&self, listen_addr: &str) -> Option<Version> {
        self.peers.read().get(listen_addr).map(|e| e.last_version.clone())
    }

    /// Advertised listen addresses of every currently registered peer, for
    /// populating `Version.peer_list` so new peers are learned transitively.
    pub fn peer_list(&self) -> Vec<String> {
        self.peers.read().keys().cloned().collect()
    }

    fn snapshot(&self) -> Vec<(String, NodeClient<Channel>)> {
        self.peers
            .read()
            .iter()
            .map(|(addr, entry)| (addr.clone(), entry.client.clone()))
            .collect()
    }
}

async fn dial(addr: &str) -> Result<NodeClient<Channel>, NetworkError> {
    let endpoint = format!("http://{addr}");
    let channel = Channel::from_shared(endpoint)
        .expect("listen_addr is a valid authority")
        .connect()
        .await?;
    Ok(NodeClient::new(channel))
}

/// The single chokepoint for peer acquisition. Both inbound handshake and
/// outbound dial funnel through here. If the remote advertised a non-empty
/// peer list, transitive bootstrap is spawned detached; no lock is held
/// across the spawn.
pub fn add_peer(
    registry: Arc<PeerRegistry>,
    self_listen_addr: String,
    our_version: Version,
    addr: String,
    client: NodeClient<Channel>,
    version: Version,
) {
    if addr == self_listen_addr {
        return;
    }
    let peer_list = version.peer_list.clone();
    {
        let mut peers = registry.peers.write();
        peers.insert(
            addr.clone(),
            PeerEntry {
                client,
                last_version: version,
            },
        );
    }
    debug!(peer = %addr, "peer registered");
    if !peer_list.is_empty() {
        let registry = registry.clone();
        tokio::spawn(async move {
            bootstrap_network(registry, self_listen_addr, our_version, peer_list).await;
        });
    }
}

/// For each address, skip it if it is our own listen address or already a
/// known peer; otherwise dial, handshake, and register.
pub async fn bootstrap_network(
    registry: Arc<PeerRegistry>,
    self_listen_addr: String,
    our_version: Version,
    addrs: Vec<String>,
) {
    for addr in addrs {
        if addr == self_listen_addr || registry.contains(&addr) {
            continue;
        }
        let mut client = match dial(&addr).await {
            Ok(c) => c,
            Err(e) => {
                warn!(peer = %addr, error = %e, "bootstrap dial failed");
                continue;
            }
        };
        let request = our_version.clone();
        let remote_version = match client.handshake(request).await {
            Ok(resp) => resp.into_inner(),
            Err(e) => {
                warn!(peer = %addr, error = %e, "handshake failed");
                continue;
            }
        };
        add_peer(
            registry.clone(),
            self_listen_addr.clone(),
            our_version.clone(),
            addr,
            client,
            remote_version,
        );
    }
}

/// Broadcasts to every currently registered peer. Each send is an
/// independent task; a peer that hangs cannot stall the others.
pub fn broadcast_tx(registry: Arc<PeerRegistry>, tx: Transaction) {
    for (addr, mut client) in registry.snapshot() {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = client.handle_transaction(tx).await {
                warn!(peer = %addr, error = %e, "tx broadcast failed");
            }
        });
    }
}

pub fn broadcast_block(registry: Arc<PeerRegistry>, block: Block) {
    for (addr, mut client) in registry.snapshot() {
        let block = block.clone();
        tokio::spawn(async move {
            if let Err(e) = client.handle_block(block).await {
                warn!(peer = %addr, error = %e, "block broadcast failed");
            }
        });
    }
}
