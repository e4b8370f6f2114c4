//! Single-owner facade over the ledger, its derived caches and consensus.
//!
//! `Engine` is the synchronous core: every mutating call takes `&mut self`, so
//! holding it (directly, or behind the write half of a lock as [`crate::node`]
//! does) serializes mutations. Chain append and cache invalidation happen in
//! the same call, so no reader can see one without the other.

use crate::blockchain::{AnnotatedTransaction, Block, Ledger};
use crate::cache::DerivedStateCache;
use crate::config::Config;
use crate::consensus::{ConsensusCoordinator, EpochTransition, ValidationRecord};
use crate::crypto::Address;
use crate::error::ChainError;
use crate::events::{log_event, ChainEvent, EventObserver, NullObserver};
use crate::miner::{SealCancel, SealOutcome, SealedBlock};
use crate::transaction::types::now_millis;
use crate::transaction::Transaction;
use crate::validator::{SlashRecord, Validator};
use std::sync::Arc;

pub struct Engine {
    ledger: Ledger,
    cache: DerivedStateCache,
    consensus: ConsensusCoordinator,
    observer: Arc<dyn EventObserver>,
}

impl Engine {
    pub fn new(config: &Config) -> Self {
        Self::with_observer(config, Arc::new(NullObserver), now_millis())
    }

    /// `started_at` (Unix ms) opens the first epoch.
    pub fn with_observer(
        config: &Config,
        observer: Arc<dyn EventObserver>,
        started_at: u64,
    ) -> Self {
        Self {
            ledger: Ledger::from_config(&config.ledger),
            cache: DerivedStateCache::new(),
            consensus: ConsensusCoordinator::new(&config.consensus, started_at),
            observer,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn cache(&self) -> &DerivedStateCache {
        &self.cache
    }

    pub fn consensus(&self) -> &ConsensusCoordinator {
        &self.consensus
    }

    pub fn submit_transaction(&mut self, tx: Transaction) -> Result<(), ChainError> {
        self.ledger.submit_transaction(tx)
    }

    /// Seals the pending pool into a new block paying `reward_recipient`.
    pub fn seal_block(
        &mut self,
        reward_recipient: &Address,
        cancel: &SealCancel,
    ) -> Result<SealOutcome, ChainError> {
        match self.ledger.prepare_seal(reward_recipient)?.run(cancel) {
            SealOutcome::Sealed(sealed) => Ok(SealOutcome::Sealed(self.commit_sealed(sealed)?)),
            SealOutcome::Cancelled => Ok(SealOutcome::Cancelled),
        }
    }

    /// Appends a block sealed off-lock and applies its cache effects.
    pub fn commit_sealed(&mut self, sealed: SealedBlock) -> Result<Block, ChainError> {
        let block = self.ledger.commit_seal(sealed)?;
        self.cache.on_block_sealed(&block);
        self.emit(ChainEvent::BlockSealed(block.clone()));
        Ok(block)
    }

    pub fn get_balance(&self, address: &str) -> f64 {
        self.cache.get_balance(&self.ledger, address)
    }

    pub fn get_transaction_history(&self, address: &str) -> Vec<AnnotatedTransaction> {
        self.cache.get_transaction_history(&self.ledger, address)
    }

    pub fn verify_chain_integrity(&self) -> bool {
        self.ledger.verify_chain_integrity()
    }

    pub fn register_validator(
        &mut self,
        address: Address,
        public_key: String,
        initial_stake: f64,
    ) -> Result<Validator, ChainError> {
        let validator = self
            .consensus
            .register_validator(address, public_key, initial_stake)?;
        self.emit(ChainEvent::ValidatorRegistered(validator.clone()));
        Ok(validator)
    }

    pub fn add_stake(&mut self, address: &str, amount: f64) -> Result<Validator, ChainError> {
        self.consensus.add_stake(address, amount)
    }

    pub fn remove_stake(&mut self, address: &str, amount: f64) -> Result<Validator, ChainError> {
        self.consensus.remove_stake(address, amount)
    }

    pub fn select_validators(&mut self, target_count: usize) -> Vec<Validator> {
        self.consensus.select_validators(target_count)
    }

    pub fn select_default_validators(&mut self) -> Vec<Validator> {
        self.consensus.select_default()
    }

    pub fn validate_block(
        &mut self,
        block: &Block,
        validator_address: &str,
    ) -> Result<ValidationRecord, ChainError> {
        self.consensus
            .validate_block(block, validator_address, now_millis())
    }

    pub fn check_and_advance_epoch(&mut self, now: u64) -> Option<EpochTransition> {
        let transition = self.consensus.check_and_advance_epoch(now)?;
        self.emit(ChainEvent::EpochTransition {
            previous_epoch: transition.previous_epoch,
            new_epoch: transition.new_epoch,
        });
        Some(transition)
    }

    pub fn slash_validator(&mut self, address: &str, reason: &str) -> Result<SlashRecord, ChainError> {
        let record = self.consensus.slash_validator(address, reason)?;
        self.emit(ChainEvent::ValidatorSlashed {
            address: record.address.clone(),
            amount: record.amount,
            reason: record.reason.clone(),
        });
        Ok(record)
    }

    fn emit(&self, event: ChainEvent) {
        log_event(&event);
        self.observer.on_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelObserver;

    fn config() -> Config {
        let mut config = Config::default();
        config.ledger.difficulty = 1;
        config.consensus.selection_seed = Some(7);
        config
    }

    #[test]
    fn test_genesis_then_one_seal() {
        let mut engine = Engine::new(&config());
        assert_eq!(engine.ledger().len(), 1);
        engine
            .seal_block(&"X".to_string(), &SealCancel::new())
            .unwrap();
        assert_eq!(engine.get_balance("X"), 100.0);
        assert_eq!(engine.ledger().len(), 2);
        assert!(engine.verify_chain_integrity());
    }

    #[test]
    fn test_cached_balance_tracks_seals() {
        let mut engine = Engine::new(&config());
        engine
            .seal_block(&"alice".to_string(), &SealCancel::new())
            .unwrap();
        assert_eq!(engine.get_balance("alice"), 100.0);

        engine
            .submit_transaction(Transaction::transfer("alice", "bob", 25.0).sign("ka"))
            .unwrap();
        engine
            .seal_block(&"carol".to_string(), &SealCancel::new())
            .unwrap();
        assert_eq!(engine.get_balance("alice"), 75.0);
        assert_eq!(engine.get_balance("bob"), 25.0);
        assert_eq!(engine.get_transaction_history("alice").len(), 2);
    }

    #[test]
    fn test_events_are_emitted_in_order() {
        let (observer, rx) = ChannelObserver::new();
        let mut engine = Engine::with_observer(&config(), Arc::new(observer), 0);

        engine
            .register_validator("V".to_string(), "pk".to_string(), 1000.0)
            .unwrap();
        let block = engine
            .seal_block(&"V".to_string(), &SealCancel::new())
            .unwrap()
            .sealed()
            .unwrap();
        engine.slash_validator("V", "double-sign").unwrap();
        engine.check_and_advance_epoch(86_400_000).unwrap();

        let events: Vec<ChainEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], ChainEvent::ValidatorRegistered(v) if v.address == "V"));
        assert_eq!(events[1], ChainEvent::BlockSealed(block));
        assert_eq!(
            events[2],
            ChainEvent::ValidatorSlashed {
                address: "V".to_string(),
                amount: 100.0,
                reason: "double-sign".to_string(),
            }
        );
        assert_eq!(
            events[3],
            ChainEvent::EpochTransition {
                previous_epoch: 0,
                new_epoch: 1
            }
        );
    }

    #[test]
    fn test_failed_operations_emit_nothing() {
        let (observer, rx) = ChannelObserver::new();
        let mut engine = Engine::with_observer(&config(), Arc::new(observer), 0);
        assert!(engine
            .register_validator("V".to_string(), "pk".to_string(), 1.0)
            .is_err());
        assert!(engine.slash_validator("V", "x").is_err());
        assert!(engine.check_and_advance_epoch(1).is_none());
        let cancel = SealCancel::new();
        cancel.cancel();
        assert!(engine
            .seal_block(&"m".to_string(), &cancel)
            .unwrap()
            .is_cancelled());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_validation_is_advisory() {
        let mut engine = Engine::new(&config());
        engine
            .register_validator("V".to_string(), "pk".to_string(), 1000.0)
            .unwrap();
        let mut block = engine
            .seal_block(&"m".to_string(), &SealCancel::new())
            .unwrap()
            .sealed()
            .unwrap();
        block.payload.proof.clear();
        assert!(engine.validate_block(&block, "V").is_err());
        assert_eq!(engine.ledger().len(), 2);
        assert!(engine.verify_chain_integrity());
    }
}
