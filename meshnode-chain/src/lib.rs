use meshnode_core::{
    hash_transaction, sign_block, verify_block, verify_transaction, Block, Header, Transaction,
    TxOutput,
};
use meshnode_crypto::{Address, PrivateKey};
use meshnode_storage::{utxo_key, BlockStore, StoreError, TxStore, Utxo, UtxoStore};
use parking_lot::Mutex;
use thiserror::Error;

/// Compile-time fixed seed so every honest node computes the same genesis tip.
const GOD_SEED_HEX: &str = "10b2718850eb224208fff9f437aa2f07a634e121447ae09eb2d4e90f8bba24dc";
const GENESIS_SUPPLY: u64 = 1000;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid block signature")]
    InvalidSignature,
    #[error("invalid previous block hash")]
    InvalidPrevHash,
    #[error("invalid tx signature")]
    InvalidTxSignature,
    #[error("unspent-output not found or spent")]
    UnspentOutputNotFound,
    #[error("input owner does not match referenced output")]
    OwnerMismatch,
    #[error("insufficient input value")]
    InsufficientFunds,
    #[error("height too high")]
    HeightTooHigh,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Dense ordered sequence of accepted headers; height = len - 1.
pub struct Chain {
    headers: Mutex<Vec<Header>>,
    block_store: Box<dyn BlockStore>,
    tx_store: Box<dyn TxStore>,
    utxo_store: Box<dyn UtxoStore>,
}

impl Chain {
    pub fn new(
        block_store: Box<dyn BlockStore>,
        tx_store: Box<dyn TxStore>,
        utxo_store: Box<dyn UtxoStore>,
    ) -> Self {
        let chain = Self {
            headers: Mutex::new(Vec::new()),
            block_store,
            tx_store,
            utxo_store,
        };
        let genesis = chain.build_genesis();
        chain.append_unvalidated(genesis);
        chain
    }

    fn build_genesis(&self) -> Block {
        let god_key = PrivateKey::from_hex(GOD_SEED_HEX).expect("godSeed is a valid 32-byte seed");
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount: GENESIS_SUPPLY,
                address: god_key.public().address().0,
            }],
        };
        let mut block = Block {
            header: Header::genesis(),
            transactions: vec![tx],
            public_key: [0u8; 32],
            signature: [0u8; 64],
        };
        sign_block(&god_key, &mut block);
        block
    }

    pub fn height(&self) -> i32 {
        self.headers.lock().len() as i32 - 1
    }

    pub fn get_block_by_hash(&self, hash_hex: &str) -> Result<Block, ChainError> {
        Ok(self.block_store.get(hash_hex)?)
    }

    pub fn get_block_by_height(&self, height: i32) -> Result<Block, ChainError> {
        if height > self.height() {
            return Err(ChainError::HeightTooHigh);
        }
        let header = self.headers.lock()[height as usize].clone();
        let hash_hex = hex::encode(meshnode_core::hash_header(&header));
        self.get_block_by_hash(&hash_hex)
    }

    fn tip(&self) -> Header {
        self.headers
            .lock()
            .last()
            .expect("genesis always present")
            .clone()
    }

    pub fn validate_block(&self, block: &Block) -> Result<(), ChainError> {
        if !verify_block(block) {
            return Err(ChainError::InvalidSignature);
        }
        let tip = self.tip();
        let tip_hash = meshnode_core::hash_header(&tip);
        if block.header.prev_hash != tip_hash {
            return Err(ChainError::InvalidPrevHash);
        }
        for tx in &block.transactions {
            if !verify_transaction(tx) {
                return Err(ChainError::InvalidTxSignature);
            }
        }
        for tx in &block.transactions {
            if tx.is_coinbase() {
                continue;
            }
            let mut input_sum: u64 = 0;
            let output_sum: u64 = tx.outputs.iter().map(|o| o.amount).sum();
            for input in &tx.inputs {
                let key = utxo_key(&hex::encode(input.prev_tx_hash), input.prev_out_index);
                let utxo = self
                    .utxo_store
                    .get(&key)
                    .map_err(|_| ChainError::UnspentOutputNotFound)?;
                if utxo.spent {
                    return Err(ChainError::UnspentOutputNotFound);
                }
                let owner = input
                    .public_key()
                    .map_err(|_| ChainError::OwnerMismatch)?
                    .address();
                if owner != utxo.address {
                    return Err(ChainError::OwnerMismatch);
                }
                input_sum += utxo.amount;
            }
            if input_sum < output_sum {
                return Err(ChainError::InsufficientFunds);
            }
        }
        Ok(())
    }

    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        self.validate_block(&block)?;
        self.apply_spends(&block);
        self.append_unvalidated(block);
        Ok(())
    }

    fn apply_spends(&self, block: &Block) {
        for tx in &block.transactions {
            if tx.is_coinbase() {
                continue;
            }
            for input in &tx.inputs {
                let key = utxo_key(&hex::encode(input.prev_tx_hash), input.prev_out_index);
                let _ = self.utxo_store.mark_spent(&key);
            }
        }
    }

    fn append_unvalidated(&self, block: Block) {
        self.headers.lock().push(block.header.clone());
        for tx in &block.transactions {
            let tx_hash_hex = hex::encode(hash_transaction(tx));
            for (index, output) in tx.outputs.iter().enumerate() {
                self.utxo_store.put(Utxo {
                    tx_hash: tx_hash_hex.clone(),
                    out_index: index as u32,
                    amount: output.amount,
                    address: Address(output.address),
                    spent: false,
                });
            }
            self.tx_store.put(tx.clone());
        }
        self.block_store.put(block);
    }
}
