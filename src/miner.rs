//! Proof-of-work sealing
//!
//! A block is sealed by incrementing its nonce until the hardened block digest
//! starts with `difficulty` `'0'` hex characters. The search is unbounded, so it
//! runs on a detached [`SealJob`] that owns a copy of the candidate block and can
//! be aborted through a [`SealCancel`] flag without touching the ledger.

use crate::blockchain::Block;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const PROGRESS_LOG_INTERVAL: u64 = 250_000;

/// Result of a seal attempt. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SealOutcome<T = Block> {
    Sealed(T),
    Cancelled,
}

impl<T> SealOutcome<T> {
    pub fn sealed(self) -> Option<T> {
        match self {
            SealOutcome::Sealed(value) => Some(value),
            SealOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SealOutcome::Cancelled)
    }
}

/// Cloneable cancellation signal shared between the caller and a running search.
#[derive(Debug, Clone, Default)]
pub struct SealCancel {
    flag: Arc<AtomicBool>,
}

impl SealCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// True when `hash` starts with `difficulty` zero characters.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Runs the nonce search on `block` in place of its current nonce/hash.
pub fn mine_block(mut block: Block, difficulty: u32, cancel: &SealCancel) -> SealOutcome {
    if cancel.is_cancelled() {
        return SealOutcome::Cancelled;
    }

    // Everything but the nonce is fixed for the whole search.
    let prefix = block.prefix_hasher();
    block.hash = prefix.clone().u64(block.nonce).finish_hardened();

    while !meets_difficulty(&block.hash, difficulty) {
        if cancel.is_cancelled() {
            debug!(
                "Seal of block {} cancelled after {} attempts",
                block.index, block.nonce
            );
            return SealOutcome::Cancelled;
        }
        block.nonce += 1;
        block.hash = prefix.clone().u64(block.nonce).finish_hardened();

        if block.nonce % PROGRESS_LOG_INTERVAL == 0 {
            debug!("Sealing block {}: nonce {}", block.index, block.nonce);
        }
    }

    info!(
        "Block {} sealed: hash {} (nonce {})",
        block.index,
        &block.hash[..16],
        block.nonce
    );
    SealOutcome::Sealed(block)
}

/// A candidate block detached from the ledger, ready to be searched without
/// holding any lock on it.
#[derive(Debug, Clone)]
pub struct SealJob {
    block: Block,
    difficulty: u32,
    pending_taken: usize,
}

impl SealJob {
    pub(crate) fn new(block: Block, difficulty: u32, pending_taken: usize) -> Self {
        Self {
            block,
            difficulty,
            pending_taken,
        }
    }

    pub fn candidate(&self) -> &Block {
        &self.block
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn run(self, cancel: &SealCancel) -> SealOutcome<SealedBlock> {
        match mine_block(self.block, self.difficulty, cancel) {
            SealOutcome::Sealed(block) => SealOutcome::Sealed(SealedBlock {
                block,
                pending_taken: self.pending_taken,
            }),
            SealOutcome::Cancelled => SealOutcome::Cancelled,
        }
    }
}

/// A block whose search finished, waiting to be committed to the ledger.
#[derive(Debug, Clone)]
pub struct SealedBlock {
    pub(crate) block: Block,
    /// Number of pending transactions snapshotted into the block.
    pub(crate) pending_taken: usize,
}

impl SealedBlock {
    pub fn block(&self) -> &Block {
        &self.block
    }
}
