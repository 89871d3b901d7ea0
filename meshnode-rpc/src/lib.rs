use std::sync::Arc;

use meshnode_chain::Chain;
use meshnode_mempool::Mempool;
use meshnode_network::{self as network, PeerRegistry};
use meshnode_proto::{
    self as proto, node_server::Node as NodeService, Ack, Block as WireBlock,
    Header as WireHeader, Transaction as WireTransaction, TxOutput as WireTxOutput, Version,
};
use tonic::{Request, Response, Status};
use tracing::info;

pub mod convert;

pub use convert::ConvertError;

#[derive(Clone)]
pub struct RpcState {
    pub chain: Arc<Chain>,
    pub mempool: Arc<Mempool>,
    pub peers: Arc<PeerRegistry>,
    pub listen_addr: String,
    pub version: String,
}

#[derive(Clone)]
pub struct NodeRpcService {
    state: RpcState,
}

impl NodeRpcService {
    pub fn new(state: RpcState) -> Self {
        Self { state }
    }

    fn our_version(&self) -> Version {
        Version {
            version: self.state.version.clone(),
            height: self.state.chain.height() as i64,
            listen_addr: self.state.listen_addr.clone(),
            peer_list: self.state.peers.peer_list(),
        }
    }
}

#[tonic::async_trait]
impl NodeService for NodeRpcService {
    /// Dials the remote back at its advertised `listen_addr`, registers it,
    /// and replies with our own Version.
    async fn handshake(&self, request: Request<Version>) -> Result<Response<Version>, Status> {
        let remote_version = request.into_inner();
        let remote_addr = remote_version.listen_addr.clone();
        info!(peer = %remote_addr, "handshake received");

        let endpoint = format!("http://{remote_addr}");
        let channel = tonic::transport::Channel::from_shared(endpoint)
            .map_err(|e| Status::invalid_argument(e.to_string()))?
            .connect()
            .await
            .map_err(|e| Status::unavailable(e.to_string()))?;
        let client = proto::node_client::NodeClient::new(channel);

        network::add_peer(
            self.state.peers.clone(),
            self.state.listen_addr.clone(),
            self.our_version(),
            remote_addr,
            client,
            remote_version,
        );

        Ok(Response::new(self.our_version()))
    }

    async fn handle_transaction(
        &self,
        request: Request<WireTransaction>,
    ) -> Result<Response<Ack>, Status> {
        let wire_tx = request.into_inner();
        let tx = convert::transaction_from_wire(&wire_tx)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        if self.state.mempool.add(tx) {
            network::broadcast_tx(self.state.peers.clone(), wire_tx);
        }
        Ok(Response::new(Ack {
            ok: true,
            message: String::new(),
        }))
    }

    async fn handle_block(&self, request: Request<WireBlock>) -> Result<Response<Ack>, Status> {
        let wire_block = request.into_inner();
        let block = convert::block_from_wire(&wire_block)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        match self.state.chain.add_block(block) {
            Ok(()) => {
                network::broadcast_block(self.state.peers.clone(), wire_block);
                Ok(Response::new(Ack {
                    ok: true,
                    message: String::new(),
                }))
            }
            Err(e) => Ok(Response::new(Ack {
                ok: false,
                message: e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshnode_chain::Chain;
    use meshnode_storage::{MemoryBlockStore, MemoryTxStore, MemoryUtxoStore};

    fn test_state() -> RpcState {
        RpcState {
            chain: Arc::new(Chain::new(
                Box::new(MemoryBlockStore::default()),
                Box::new(MemoryTxStore::default()),
                Box::new(MemoryUtxoStore::default()),
            )),
            mempool: Arc::new(Mempool::new()),
            peers: PeerRegistry::new(),
            listen_addr: "127.0.0.1:7000".into(),
            version: "0.1.0".into(),
        }
    }

    #[tokio::test]
    async fn handle_transaction_rejects_duplicate_without_rebroadcast_panic() {
        let svc = NodeRpcService::new(test_state());
        let tx = WireTransaction {
            version: 1,
            inputs: vec![],
            outputs: vec![WireTxOutput {
                amount: 1,
                address: vec![0u8; 20],
            }],
        };
        let ack1 = svc
            .handle_transaction(Request::new(tx.clone()))
            .await
            .unwrap();
        assert!(ack1.into_inner().ok);
        let ack2 = svc.handle_transaction(Request::new(tx)).await.unwrap();
        assert!(ack2.into_inner().ok);
        assert_eq!(svc.state.mempool.len(), 1);
    }

    #[tokio::test]
    async fn handle_block_rejects_bad_prev_hash() {
        let svc = NodeRpcService::new(test_state());
        let bad_block = WireBlock {
            header: Some(WireHeader {
                version: 1,
                height: 1,
                prev_hash: vec![0u8; 32],
                root_hash: vec![0u8; 32],
                timestamp: 0,
            }),
            transactions: vec![],
            public_key: vec![0u8; 32],
            signature: vec![0u8; 64],
        };
        let ack = svc.handle_block(Request::new(bad_block)).await.unwrap();
        assert!(!ack.into_inner().ok);
    }
}
