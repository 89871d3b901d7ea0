use meshnode_core::{Block, Header, Transaction, TxInput, TxOutput};
use meshnode_proto::{
    Block as WireBlock, Header as WireHeader, Transaction as WireTransaction,
    TxInput as WireTxInput, TxOutput as WireTxOutput,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("missing header")]
    MissingHeader,
    #[error("{field} must be {expected} bytes, got {got}")]
    BadLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
}

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], ConvertError> {
    bytes.try_into().map_err(|_| ConvertError::BadLength {
        field,
        expected: N,
        got: bytes.len(),
    })
}

pub fn header_from_wire(w: &WireHeader) -> Result<Header, ConvertError> {
    Ok(Header {
        version: w.version,
        height: w.height,
        prev_hash: fixed("prev_hash", &w.prev_hash)?,
        root_hash: fixed("root_hash", &w.root_hash)?,
        timestamp: w.timestamp,
    })
}

pub fn header_to_wire(h: &Header) -> WireHeader {
    WireHeader {
        version: h.version,
        height: h.height,
        prev_hash: h.prev_hash.to_vec(),
        root_hash: h.root_hash.to_vec(),
        timestamp: h.timestamp,
    }
}

pub fn tx_input_from_wire(w: &WireTxInput) -> Result<TxInput, ConvertError> {
    Ok(TxInput {
        prev_tx_hash: fixed("prev_tx_hash", &w.prev_tx_hash)?,
        prev_out_index: w.prev_out_index,
        public_key: fixed("public_key", &w.public_key)?,
        signature: fixed("signature", &w.signature)?,
    })
}

pub fn tx_input_to_wire(i: &TxInput) -> WireTxInput {
    WireTxInput {
        prev_tx_hash: i.prev_tx_hash.to_vec(),
        prev_out_index: i.prev_out_index,
        public_key: i.public_key.to_vec(),
        signature: i.signature.to_vec(),
    }
}

pub fn tx_output_from_wire(w: &WireTxOutput) -> Result<TxOutput, ConvertError> {
    Ok(TxOutput {
        amount: w.amount,
        address: fixed("address", &w.address)?,
    })
}

pub fn tx_output_to_wire(o: &TxOutput) -> WireTxOutput {
    WireTxOutput {
        amount: o.amount,
        address: o.address.to_vec(),
    }
}

pub fn transaction_from_wire(w: &WireTransaction) -> Result<Transaction, ConvertError> {
    Ok(Transaction {
        version: w.version,
        inputs: w
            .inputs
            .iter()
            .map(tx_input_from_wire)
            .collect::<Result<_, _>>()?,
        outputs: w
            .outputs
            .iter()
            .map(tx_output_from_wire)
            .collect::<Result<_, _>>()?,
    })
}

pub fn transaction_to_wire(tx: &Transaction) -> WireTransaction {
    WireTransaction {
        version: tx.version,
        inputs: tx.inputs.iter().map(tx_input_to_wire).collect(),
        outputs: tx.outputs.iter().map(tx_output_to_wire).collect(),
    }
}

pub fn block_from_wire(w: &WireBlock) -> Result<Block, ConvertError> {
    let header = w.header.as_ref().ok_or(ConvertError::MissingHeader)?;
    Ok(Block {
        header: header_from_wire(header)?,
        transactions: w
            .transactions
            .iter()
            .map(transaction_from_wire)
            .collect::<Result<_, _>>()?,
        public_key: fixed("public_key", &w.public_key)?,
        signature: fixed("signature", &w.signature)?,
    })
}

pub fn block_to_wire(b: &Block) -> WireBlock {
    WireBlock {
        header: Some(header_to_wire(&b.header)),
        transactions: b.transactions.iter().map(transaction_to_wire).collect(),
        public_key: b.public_key.to_vec(),
        signature: b.signature.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_round_trips_through_wire() {
        let tx = Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_tx_hash: [1u8; 32],
                prev_out_index: 2,
                public_key: [3u8; 32],
                signature: [4u8; 64],
            }],
            outputs: vec![TxOutput {
                amount: 10,
                address: [5u8; 20],
            }],
        };
        let wire = transaction_to_wire(&tx);
        let back = transaction_from_wire(&wire).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn block_without_header_is_rejected() {
        let wire = WireBlock {
            header: None,
            transactions: vec![],
            public_key: vec![0u8; 32],
            signature: vec![0u8; 64],
        };
        assert!(matches!(
            block_from_wire(&wire),
            Err(ConvertError::MissingHeader)
        ));
    }
}
