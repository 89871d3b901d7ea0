use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use meshnode_chain::Chain;
use meshnode_config::NodeConfig;
use meshnode_core::{sign_block, Block, Header};
use meshnode_crypto::PrivateKey;
use meshnode_mempool::Mempool;
use meshnode_network::{self as network, PeerRegistry};
use meshnode_proto::{node_server::NodeServer, Version};
use meshnode_rpc::{NodeRpcService, RpcState};
use meshnode_storage::{MemoryBlockStore, MemoryTxStore, MemoryUtxoStore};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

pub async fn run_node(config_path: std::path::PathBuf) -> Result<()> {
    let cfg = NodeConfig::load(&config_path)?;
    init_logging();
    info!(?config_path, "starting meshnode");

    let chain = Arc::new(Chain::new(
        Box::new(MemoryBlockStore::default()),
        Box::new(MemoryTxStore::default()),
        Box::new(MemoryUtxoStore::default()),
    ));
    let mempool = Arc::new(Mempool::new());
    let peers = PeerRegistry::new();

    let state = RpcState {
        chain: chain.clone(),
        mempool: mempool.clone(),
        peers: peers.clone(),
        listen_addr: cfg.listen_addr.clone(),
        version: cfg.version.clone(),
    };

    let our_version = Version {
        version: cfg.version.clone(),
        height: chain.height() as i64,
        listen_addr: cfg.listen_addr.clone(),
        peer_list: peers.peer_list(),
    };

    if !cfg.bootstrap_nodes.is_empty() {
        let peers = peers.clone();
        let self_addr = cfg.listen_addr.clone();
        let our_version = our_version.clone();
        let bootstrap_nodes = cfg.bootstrap_nodes.clone();
        tokio::spawn(async move {
            network::bootstrap_network(peers, self_addr, our_version, bootstrap_nodes).await;
        });
    }

    let validator_handle = match &cfg.private_key {
        Some(hex_seed) => {
            let priv_key = PrivateKey::from_hex(hex_seed)?;
            let chain = chain.clone();
            let mempool = mempool.clone();
            let peers = peers.clone();
            let block_time = Duration::from_secs(cfg.block_time_secs);
            Some(tokio::spawn(async move {
                run_validator_loop(chain, mempool, peers, priv_key, block_time).await;
            }))
        }
        None => None,
    };

    let addr = cfg.listen_addr.parse()?;
    let service = NodeRpcService::new(state);
    info!(%addr, "gRPC listening");
    let server = tonic::transport::Server::builder()
        .add_service(NodeServer::new(service))
        .serve(addr);

    if let Some(handle) = validator_handle {
        tokio::select! {
            res = server => { res?; }
            res = handle => { res?; }
        }
    } else {
        server.await?;
    }
    Ok(())
}

/// Runs iff the node holds a validator private key. On each tick: drain the
/// mempool, build a block (even when empty, to keep the chain advancing on
/// schedule), sign it, append it, and broadcast it.
async fn run_validator_loop(
    chain: Arc<Chain>,
    mempool: Arc<Mempool>,
    peers: Arc<PeerRegistry>,
    priv_key: PrivateKey,
    block_time: Duration,
) {
    let mut ticker = tokio::time::interval(block_time);
    loop {
        ticker.tick().await;
        let txs = mempool.clear();
        let tip_height = chain.height();
        let tip = match chain.get_block_by_height(tip_height) {
            Ok(b) => b,
            Err(e) => {
                error!(error = %e, "validator loop: cannot read tip");
                continue;
            }
        };
        let mut block = Block {
            header: Header {
                version: 1,
                height: tip_height + 1,
                prev_hash: meshnode_core::hash_block(&tip),
                root_hash: [0u8; 32],
                timestamp: now_ns(),
            },
            transactions: txs,
            public_key: [0u8; 32],
            signature: [0u8; 64],
        };
        sign_block(&priv_key, &mut block);
        if let Err(e) = chain.add_block(block.clone()) {
            error!(error = %e, "validator loop: forged block rejected by own chain");
            continue;
        }
        info!(height = block.header.height, txs = block.transactions.len(), "block forged");
        let wire = meshnode_rpc::convert::block_to_wire(&block);
        network::broadcast_block(peers.clone(), wire);
    }
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
