use crate::config::{LedgerConfig, MAX_DIFFICULTY};
use crate::crypto::{Address, FieldHasher, HashHex};
use crate::error::ChainError;
use crate::miner::{SealCancel, SealJob, SealOutcome, SealedBlock};
use crate::transaction::types::now_millis;
use crate::transaction::{validate_well_formed, Transaction};
use tracing::{debug, info, warn};

use super::validation::verify_blocks;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
pub const GENESIS_TIMESTAMP: u64 = 1672531200000;
pub const GENESIS_PROOF: &str = "Genesis Block";

/// Transactions sealed into a block plus an opaque proof blob.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BlockPayload {
    pub transactions: Vec<Transaction>,
    pub proof: String,
}

impl BlockPayload {
    /// Builds a payload whose proof commits to the transaction ids.
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let proof = Self::commitment(&transactions);
        Self { transactions, proof }
    }

    pub fn commitment(transactions: &[Transaction]) -> HashHex {
        transactions
            .iter()
            .fold(FieldHasher::new().u64(transactions.len() as u64), |h, tx| {
                h.str(&tx.id())
            })
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: HashHex,
    /// Unix milliseconds
    pub timestamp: u64,
    pub payload: BlockPayload,
    pub nonce: u64,
    pub hash: HashHex,
}

impl Block {
    pub fn new(index: u64, previous_hash: HashHex, timestamp: u64, payload: BlockPayload) -> Self {
        let mut block = Block {
            index,
            previous_hash,
            timestamp,
            payload,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();
        block
    }

    pub fn genesis() -> Self {
        Block::new(
            0,
            GENESIS_PREVIOUS_HASH.to_string(),
            GENESIS_TIMESTAMP,
            BlockPayload {
                transactions: Vec::new(),
                proof: GENESIS_PROOF.to_string(),
            },
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.payload.transactions
    }

    /// Digest over every field except `hash` itself.
    pub fn calculate_hash(&self) -> HashHex {
        self.prefix_hasher().u64(self.nonce).finish_hardened()
    }

    /// Hasher state covering all fields that precede the nonce.
    pub(crate) fn prefix_hasher(&self) -> FieldHasher {
        let hasher = FieldHasher::new()
            .u64(self.index)
            .str(&self.previous_hash)
            .u64(self.timestamp)
            .u64(self.payload.transactions.len() as u64);
        self.payload
            .transactions
            .iter()
            .fold(hasher, |h, tx| tx.feed(h))
            .str(&self.payload.proof)
    }
}

/// A transaction as seen from an address' history, tagged with its block.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnnotatedTransaction {
    pub transaction: Transaction,
    pub block_index: u64,
    pub block_hash: HashHex,
}

impl AnnotatedTransaction {
    pub fn new(transaction: Transaction, block: &Block) -> Self {
        Self {
            transaction,
            block_index: block.index,
            block_hash: block.hash.clone(),
        }
    }
}

/// Append-only chain of sealed blocks plus the pending-transaction pool.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    difficulty: u32,
    block_reward: f64,
}

impl Ledger {
    /// `difficulty` is capped at [`MAX_DIFFICULTY`], the length of a hex digest.
    pub fn new(difficulty: u32, block_reward: f64) -> Self {
        if difficulty > MAX_DIFFICULTY {
            warn!(
                "Difficulty {} exceeds the digest length; capping at {}",
                difficulty, MAX_DIFFICULTY
            );
        }
        let difficulty = difficulty.min(MAX_DIFFICULTY);
        Ledger {
            blocks: vec![Block::genesis()],
            pending: Vec::new(),
            difficulty,
            block_reward,
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.difficulty, config.block_reward)
    }

    pub fn chain(&self) -> &[Block] {
        &self.blocks
    }

    pub fn head(&self) -> &Block {
        // The genesis block is pushed in `new` and blocks are never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the genesis block is present from construction.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn block_reward(&self) -> f64 {
        self.block_reward
    }

    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        validate_well_formed(&tx)?;
        debug!(
            "Queued transaction {} -> {} ({})",
            tx.from.as_deref().unwrap_or("<mint>"),
            tx.to,
            tx.amount
        );
        self.pending.push(tx);
        Ok(())
    }

    /// Snapshots the head and the pending pool into a candidate block that
    /// credits `reward_recipient` with the block reward.
    pub fn prepare_seal(&self, reward_recipient: &Address) -> Result<SealJob, ChainError> {
        let reward = Transaction::reward(reward_recipient.clone(), self.block_reward);
        validate_well_formed(&reward)?;

        let head = self.head();
        let mut transactions = self.pending.clone();
        transactions.push(reward);

        let timestamp = now_millis().max(head.timestamp + 1);
        let block = Block::new(
            head.index + 1,
            head.hash.clone(),
            timestamp,
            BlockPayload::new(transactions),
        );
        Ok(SealJob::new(block, self.difficulty, self.pending.len()))
    }

    /// Appends a finished block, provided the head has not moved since the job
    /// was prepared, and drops the pending transactions it consumed.
    pub fn commit_seal(&mut self, sealed: SealedBlock) -> Result<Block, ChainError> {
        let head = self.head();
        if sealed.block.previous_hash != head.hash || sealed.block.index != head.index + 1 {
            return Err(ChainError::StaleSeal);
        }

        let taken = sealed.pending_taken.min(self.pending.len());
        self.pending.drain(..taken);
        info!(
            "Appended block {} ({} transactions), chain length {}",
            sealed.block.index,
            sealed.block.payload.transactions.len(),
            self.blocks.len() + 1
        );
        self.blocks.push(sealed.block.clone());
        Ok(sealed.block)
    }

    /// Prepare, search and commit in one call on an exclusively owned ledger.
    pub fn seal_block(
        &mut self,
        reward_recipient: &Address,
        cancel: &SealCancel,
    ) -> Result<SealOutcome, ChainError> {
        match self.prepare_seal(reward_recipient)?.run(cancel) {
            SealOutcome::Sealed(sealed) => Ok(SealOutcome::Sealed(self.commit_seal(sealed)?)),
            SealOutcome::Cancelled => Ok(SealOutcome::Cancelled),
        }
    }

    /// Uncached balance: replays every sealed transaction.
    pub fn get_balance(&self, address: &str) -> f64 {
        self.blocks
            .iter()
            .flat_map(|b| b.payload.transactions.iter())
            .map(|tx| tx.balance_delta(address))
            .sum()
    }

    /// Uncached history in chain order.
    pub fn get_transaction_history(&self, address: &str) -> Vec<AnnotatedTransaction> {
        self.blocks
            .iter()
            .flat_map(|block| {
                block
                    .payload
                    .transactions
                    .iter()
                    .filter(|tx| tx.touches(address))
                    .map(move |tx| AnnotatedTransaction::new(tx.clone(), block))
            })
            .collect()
    }

    /// Full O(n) re-verification; only run on explicit request.
    pub fn verify_chain_integrity(&self) -> bool {
        verify_blocks(&self.blocks, self.difficulty)
    }
}
