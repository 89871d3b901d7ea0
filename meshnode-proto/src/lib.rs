pub mod proto {
    tonic::include_proto!("meshnode");
}

pub use proto::{
    node_client, node_client::NodeClient,
    node_server, node_server::{Node, NodeServer},
    Ack, Block, Header, Transaction, TxInput, TxOutput, Version,
};
