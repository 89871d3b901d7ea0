use meshnode_crypto::{Address, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub type Hash = [u8; 32];

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("codec error: {0}")]
    Codec(#[from] Box<bincode::ErrorKind>),
    #[error("bad public key: {0}")]
    BadPublicKey(#[from] meshnode_crypto::CryptoError),
}

/// The only input to block hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub height: i32,
    pub prev_hash: Hash,
    pub root_hash: Hash,
    pub timestamp: i64,
}

impl Header {
    pub fn genesis() -> Self {
        Self {
            version: 1,
            height: 0,
            prev_hash: [0u8; 32],
            root_hash: [0u8; 32],
            timestamp: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prev_tx_hash: Hash,
    pub prev_out_index: u32,
    pub public_key: [u8; 32],
    #[serde(with = "sig_bytes")]
    pub signature: [u8; 64],
}

/// Serde support for 64-byte arrays; std derive only covers arrays up to 32 elements.
mod sig_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        bytes.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v = Vec::<u8>::deserialize(d)?;
        v.try_into()
            .map_err(|v: Vec<u8>| D::Error::custom(format!("expected 64 bytes, got {}", v.len())))
    }
}

pub const EMPTY_SIGNATURE: [u8; 64] = [0u8; 64];

impl TxInput {
    pub fn public_key(&self) -> Result<PublicKey, CoreError> {
        Ok(PublicKey::from_bytes(&self.public_key)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub address: [u8; 20],
}

impl TxOutput {
    pub fn address(&self) -> Address {
        Address(self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub public_key: [u8; 32],
    #[serde(with = "sig_bytes")]
    pub signature: [u8; 64],
}

/// Deterministic, field-ordered binary serialization. Produces identical bytes
/// for structurally identical values across runs and platforms.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, CoreError> {
    Ok(bincode::serialize(value)?)
}

pub fn hash_header(header: &Header) -> Hash {
    let bytes = serialize(header).expect("header always serializes");
    let digest = Sha256::digest(&bytes);
    digest.into()
}

pub fn hash_block(block: &Block) -> Hash {
    hash_header(&block.header)
}

/// Hashes the transaction with all input signatures cleared to empty, so the
/// same hash is produced both before and after the inputs are signed.
pub fn hash_transaction(tx: &Transaction) -> Hash {
    let mut cleared = tx.clone();
    for input in &mut cleared.inputs {
        input.signature = EMPTY_SIGNATURE;
    }
    let bytes = serialize(&cleared).expect("transaction always serializes");
    let digest = Sha256::digest(&bytes);
    digest.into()
}

/// Root over `hash_transaction(tx)` for each transaction, in order. An empty
/// transaction list hashes to the zero hash.
pub fn merkle_root(transactions: &[Transaction]) -> Hash {
    if transactions.is_empty() {
        return [0u8; 32];
    }
    let mut layer: Vec<Hash> = transactions.iter().map(hash_transaction).collect();
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len().div_ceil(2));
        for pair in layer.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(pair[0]);
            hasher.update(if pair.len() == 2 { pair[1] } else { pair[0] });
            next.push(hasher.finalize().into());
        }
        layer = next;
    }
    layer[0]
}

/// Writes the Merkle root (if any transactions are present), hashes the
/// header, and signs that hash. Root hash must be written before hashing the
/// header, or the signature would not bind the transactions.
pub fn sign_block(priv_key: &PrivateKey, block: &mut Block) {
    if !block.transactions.is_empty() {
        block.header.root_hash = merkle_root(&block.transactions);
    }
    let hash = hash_block(block);
    let sig = priv_key.sign(&hash);
    block.public_key = priv_key.public().to_bytes();
    block.signature = sig.to_bytes();
}

pub fn verify_block(block: &Block) -> bool {
    if !block.transactions.is_empty() {
        let root = merkle_root(&block.transactions);
        if root != block.header.root_hash {
            return false;
        }
    }
    let pub_key = match PublicKey::from_bytes(&block.public_key) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = match Signature::from_bytes(&block.signature) {
        Ok(s) => s,
        Err(_) => return false,
    };
    sig.verify(&pub_key, &hash_block(block))
}

/// Clears input signatures, hashes, and signs. The caller writes the returned
/// signature bytes into the appropriate `TxInput.signature` afterwards.
pub fn sign_transaction(priv_key: &PrivateKey, tx: &Transaction) -> Signature {
    priv_key.sign(&hash_transaction(tx))
}

pub fn verify_transaction(tx: &Transaction) -> bool {
    if tx.inputs.is_empty() {
        return true;
    }
    let hash = hash_transaction(tx);
    for input in &tx.inputs {
        if input.signature == EMPTY_SIGNATURE {
            return false;
        }
        let pub_key = match input.public_key() {
            Ok(k) => k,
            Err(_) => return false,
        };
        let sig = match Signature::from_bytes(&input.signature) {
            Ok(s) => s,
            Err(_) => return false,
        };
        if !sig.verify(&pub_key, &hash) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount: 10,
                address: [1u8; 20],
            }],
        }
    }

    #[test]
    fn hash_block_is_stable() {
        let priv_key = PrivateKey::generate();
        let mut block = Block {
            header: Header::genesis(),
            transactions: vec![sample_tx()],
            public_key: [0u8; 32],
            signature: [0u8; 64],
        };
        sign_block(&priv_key, &mut block);
        let h1 = hash_block(&block);
        let h2 = hash_block(&block);
        assert_eq!(h1, h2);
    }

    #[test]
    fn sign_verify_block_round_trip() {
        let priv_key = PrivateKey::generate();
        let mut block = Block {
            header: Header::genesis(),
            transactions: vec![sample_tx()],
            public_key: [0u8; 32],
            signature: [0u8; 64],
        };
        sign_block(&priv_key, &mut block);
        assert_eq!(block.header.root_hash.len(), 32);
        assert!(verify_block(&block));

        let other = PrivateKey::generate();
        block.public_key = other.public().to_bytes();
        assert!(!verify_block(&block));
    }

    #[test]
    fn merkle_binding_invalidates_tampered_block() {
        let priv_key = PrivateKey::generate();
        let mut block = Block {
            header: Header::genesis(),
            transactions: vec![sample_tx()],
            public_key: [0u8; 32],
            signature: [0u8; 64],
        };
        sign_block(&priv_key, &mut block);
        block.transactions[0].outputs[0].amount = 999;
        assert!(!verify_block(&block));
    }

    #[test]
    fn sign_verify_transaction_round_trip() {
        let priv_key = PrivateKey::generate();
        let mut tx = Transaction {
            version: 1,
            inputs: vec![TxInput {
                prev_tx_hash: [0u8; 32],
                prev_out_index: 0,
                public_key: priv_key.public().to_bytes(),
                signature: EMPTY_SIGNATURE,
            }],
            outputs: vec![TxOutput {
                amount: 5,
                address: [2u8; 20],
            }],
        };
        let sig = sign_transaction(&priv_key, &tx);
        tx.inputs[0].signature = sig.to_bytes();
        assert!(verify_transaction(&tx));

        tx.outputs[0].amount = 6;
        assert!(!verify_transaction(&tx));
    }

    #[test]
    fn empty_merkle_root_is_zero() {
        assert_eq!(merkle_root(&[]), [0u8; 32]);
    }
}
