//! Shared, async handle around an [`Engine`].
//!
//! Reads take the read lock and may run concurrently; every mutation takes the
//! write lock, so at most one is in flight. Sealing runs its nonce search on the
//! blocking pool with no engine lock held and only write-locks to commit. Seals
//! queue on their own gate, so each one starts from the previous seal's head.

use crate::blockchain::{AnnotatedTransaction, Block};
use crate::config::Config;
use crate::consensus::{EpochTransition, ValidationRecord};
use crate::crypto::Address;
use crate::engine::Engine;
use crate::error::ChainError;
use crate::miner::{SealCancel, SealOutcome};
use crate::transaction::Transaction;
use crate::validator::{SlashRecord, Validator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

#[derive(Clone)]
pub struct Node {
    engine: Arc<RwLock<Engine>>,
    seal_gate: Arc<Mutex<()>>,
}

/// Cancels an in-flight search if the sealing future is dropped before the
/// search returns.
struct CancelOnDrop(Option<SealCancel>);

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel.cancel();
        }
    }
}

impl Node {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            seal_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        info!(
            "Starting StakeChain engine (difficulty = {}, minimum stake = {})",
            config.ledger.difficulty, config.consensus.minimum_stake
        );
        Self::new(Engine::new(config))
    }

    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let config = Config::load(path)?;
        Ok(Self::from_config(&config))
    }

    /// The underlying lock, for callers that need several reads at once.
    pub fn shared(&self) -> Arc<RwLock<Engine>> {
        Arc::clone(&self.engine)
    }

    pub async fn submit_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        self.engine.write().await.submit_transaction(tx)
    }

    /// Seals the pending pool. Readers keep seeing the pre-seal chain until the
    /// commit; a cancelled search leaves chain and pool untouched. Concurrent
    /// seals run one after another. Dropping the returned future cancels the
    /// search.
    pub async fn seal_block(
        &self,
        reward_recipient: Address,
        cancel: SealCancel,
    ) -> Result<SealOutcome, ChainError> {
        let _gate = self.seal_gate.lock().await;
        let job = self.engine.read().await.ledger().prepare_seal(&reward_recipient)?;
        let index = job.candidate().index;

        let mut guard = CancelOnDrop(Some(cancel.clone()));
        let outcome = tokio::task::spawn_blocking(move || job.run(&cancel)).await?;
        guard.disarm();
        match outcome {
            SealOutcome::Sealed(sealed) => {
                let block = self.engine.write().await.commit_sealed(sealed)?;
                Ok(SealOutcome::Sealed(block))
            }
            SealOutcome::Cancelled => {
                info!("Seal of block {} cancelled", index);
                Ok(SealOutcome::Cancelled)
            }
        }
    }

    /// [`Node::seal_block`] that cancels itself once `timeout` elapses.
    pub async fn seal_block_with_timeout(
        &self,
        reward_recipient: Address,
        timeout: Duration,
    ) -> Result<SealOutcome, ChainError> {
        let cancel = SealCancel::new();
        let trigger = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("Seal exceeded {:?}; cancelling", timeout);
            trigger.cancel();
        });
        let result = self.seal_block(reward_recipient, cancel).await;
        timer.abort();
        result
    }

    pub async fn get_balance(&self, address: &str) -> f64 {
        self.engine.read().await.get_balance(address)
    }

    pub async fn get_transaction_history(&self, address: &str) -> Vec<AnnotatedTransaction> {
        self.engine.read().await.get_transaction_history(address)
    }

    pub async fn verify_chain_integrity(&self) -> bool {
        self.engine.read().await.verify_chain_integrity()
    }

    pub async fn chain_length(&self) -> usize {
        self.engine.read().await.ledger().len()
    }

    pub async fn head(&self) -> Block {
        self.engine.read().await.ledger().head().clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.engine.read().await.ledger().pending().len()
    }

    pub async fn register_validator(
        &self,
        address: Address,
        public_key: String,
        initial_stake: f64,
    ) -> Result<Validator, ChainError> {
        self.engine
            .write()
            .await
            .register_validator(address, public_key, initial_stake)
    }

    pub async fn select_validators(&self, target_count: usize) -> Vec<Validator> {
        self.engine.write().await.select_validators(target_count)
    }

    pub async fn validate_block(
        &self,
        block: &Block,
        validator_address: &str,
    ) -> Result<ValidationRecord, ChainError> {
        self.engine
            .write()
            .await
            .validate_block(block, validator_address)
    }

    pub async fn check_and_advance_epoch(&self, now: u64) -> Option<EpochTransition> {
        self.engine.write().await.check_and_advance_epoch(now)
    }

    pub async fn slash_validator(&self, address: &str, reason: &str) -> Result<SlashRecord, ChainError> {
        self.engine.write().await.slash_validator(address, reason)
    }
}
