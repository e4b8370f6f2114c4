//! Consensus coordination: validator selection, advisory block validation,
//! epoch rewards and slashing on top of the [`ValidatorRegistry`].

use crate::blockchain::Block;
use crate::config::ConsensusConfig;
use crate::crypto::{sign_placeholder, Address, HashHex};
use crate::error::ChainError;
use crate::transaction::validate_well_formed;
use crate::validator::{SlashRecord, Validator, ValidatorRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// 365 days in milliseconds; epoch rewards are pro-rated against it.
pub const YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Attestation issued by a validator for a structurally sound block.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationRecord {
    pub block_hash: HashHex,
    pub validator: Address,
    pub timestamp: u64,
    pub proof: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EpochTransition {
    pub previous_epoch: u64,
    pub new_epoch: u64,
    pub timestamp: u64,
    /// Stake credited per validator, in registry order
    pub rewards: Vec<(Address, f64)>,
}

pub struct ConsensusCoordinator {
    registry: ValidatorRegistry,
    epoch: u64,
    epoch_duration_ms: u64,
    reward_rate: f64,
    max_validators: usize,
    last_epoch_time: u64,
    rng: StdRng,
    slash_history: Vec<SlashRecord>,
    validations: Vec<ValidationRecord>,
}

impl ConsensusCoordinator {
    /// `started_at` (Unix ms) opens epoch 0.
    pub fn new(config: &ConsensusConfig, started_at: u64) -> Self {
        let rng = match config.selection_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            registry: ValidatorRegistry::new(config.minimum_stake, config.slashing_rate),
            epoch: 0,
            epoch_duration_ms: config.epoch_duration_ms(),
            reward_rate: config.reward_rate,
            max_validators: config.max_validators,
            last_epoch_time: started_at,
            rng,
            slash_history: Vec::new(),
            validations: Vec::new(),
        }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_epoch_time(&self) -> u64 {
        self.last_epoch_time
    }

    pub fn slash_history(&self) -> &[SlashRecord] {
        &self.slash_history
    }

    pub fn validations(&self) -> &[ValidationRecord] {
        &self.validations
    }

    pub fn register_validator(
        &mut self,
        address: Address,
        public_key: String,
        initial_stake: f64,
    ) -> Result<Validator, ChainError> {
        self.registry
            .register(address, public_key, initial_stake, self.epoch)
    }

    pub fn add_stake(&mut self, address: &str, amount: f64) -> Result<Validator, ChainError> {
        self.registry.add_stake(address, amount).cloned()
    }

    pub fn remove_stake(&mut self, address: &str, amount: f64) -> Result<Validator, ChainError> {
        self.registry.remove_stake(address, amount).cloned()
    }

    /// Selects `min(active, max_validators)` validators.
    pub fn select_default(&mut self) -> Vec<Validator> {
        let target = self.registry.active_count().min(self.max_validators);
        self.select_validators(target)
    }

    /// Stake-weighted selection without replacement. When the request covers at
    /// least 80% of the active set the top validators by voting power are taken
    /// directly. Sampling gives each slot `2 × active` draws; a slot that only
    /// hits already-chosen validators stays empty, so the result may be short.
    pub fn select_validators(&mut self, target_count: usize) -> Vec<Validator> {
        let active: Vec<&Validator> = self.registry.active().collect();
        let active_count = active.len();
        let target = target_count.min(active_count);
        if target == 0 {
            return Vec::new();
        }

        let total_power: f64 = active.iter().map(|v| v.voting_power).sum();
        if target * 5 >= active_count * 4 || !total_power.is_finite() || total_power <= 0.0 {
            return top_by_voting_power(active, target);
        }

        let mut cumulative = Vec::with_capacity(active_count);
        let mut running = 0.0;
        for v in &active {
            running += v.voting_power;
            cumulative.push(running);
        }

        let max_attempts = 2 * active_count;
        let mut chosen = vec![false; active_count];
        let mut selected = Vec::with_capacity(target);
        for _ in 0..target {
            for _ in 0..max_attempts {
                let draw = self.rng.gen_range(0.0..total_power);
                let index = cumulative
                    .iter()
                    .position(|&c| draw < c)
                    .unwrap_or(active_count - 1);
                if !chosen[index] {
                    chosen[index] = true;
                    selected.push(active[index].clone());
                    break;
                }
            }
        }

        if selected.len() < target {
            debug!(
                "Selection under-filled: {} of {} validators chosen",
                selected.len(),
                target
            );
        }
        selected
    }

    /// Advisory structural check of `block` by `validator_address`. Adjusts the
    /// validator's reputation either way; never affects the ledger.
    pub fn validate_block(
        &mut self,
        block: &Block,
        validator_address: &str,
        now: u64,
    ) -> Result<ValidationRecord, ChainError> {
        let public_key = self
            .registry
            .get(validator_address)
            .filter(|v| v.active)
            .map(|v| v.public_key.clone())
            .ok_or_else(|| ChainError::UnknownOrInactiveValidator(validator_address.to_string()))?;

        if let Err(reason) = check_block_structure(block) {
            self.registry.record_validation_failure(validator_address)?;
            warn!(
                "Validator {} rejected block {}: {}",
                validator_address, block.index, reason
            );
            return Err(ChainError::BlockValidationFailed(reason));
        }

        self.registry.record_validation_success(validator_address)?;
        let mut message = Vec::new();
        message.extend_from_slice(block.hash.as_bytes());
        message.extend_from_slice(validator_address.as_bytes());
        message.extend_from_slice(&now.to_le_bytes());

        let record = ValidationRecord {
            block_hash: block.hash.clone(),
            validator: validator_address.to_string(),
            timestamp: now,
            proof: sign_placeholder(&public_key, &message),
        };
        self.validations.push(record.clone());
        Ok(record)
    }

    /// Advances the epoch once `epoch_duration` has elapsed since the last
    /// transition and credits every active validator at or above the minimum
    /// stake with `stake × reward_rate × epoch_duration / year`.
    pub fn check_and_advance_epoch(&mut self, now: u64) -> Option<EpochTransition> {
        if now.saturating_sub(self.last_epoch_time) < self.epoch_duration_ms {
            return None;
        }

        let previous_epoch = self.epoch;
        self.epoch += 1;
        self.last_epoch_time = now;

        // Snapshot first so crediting cannot skip or double-pay anyone.
        let minimum = self.registry.minimum_stake();
        let eligible: Vec<(Address, f64)> = self
            .registry
            .active()
            .filter(|v| v.stake >= minimum)
            .map(|v| (v.address.clone(), v.stake))
            .collect();

        let fraction = self.epoch_duration_ms as f64 / YEAR_MS as f64;
        let mut rewards = Vec::with_capacity(eligible.len());
        for (address, stake) in eligible {
            let reward = stake * self.reward_rate * fraction;
            match self.registry.add_stake(&address, reward) {
                Ok(_) => rewards.push((address, reward)),
                Err(e) => warn!("Skipping epoch reward for {}: {}", address, e),
            }
        }

        info!(
            "Epoch {} -> {}: rewarded {} validators",
            previous_epoch,
            self.epoch,
            rewards.len()
        );
        Some(EpochTransition {
            previous_epoch,
            new_epoch: self.epoch,
            timestamp: now,
            rewards,
        })
    }

    pub fn slash_validator(&mut self, address: &str, reason: &str) -> Result<SlashRecord, ChainError> {
        let record = self.registry.slash(address, reason)?;
        self.slash_history.push(record.clone());
        Ok(record)
    }
}

fn top_by_voting_power(mut active: Vec<&Validator>, target: usize) -> Vec<Validator> {
    active.sort_by(|a, b| {
        b.voting_power
            .total_cmp(&a.voting_power)
            .then_with(|| a.address.cmp(&b.address))
    });
    active.into_iter().take(target).cloned().collect()
}

fn check_block_structure(block: &Block) -> Result<(), String> {
    if block.hash.is_empty() {
        return Err("block hash is missing".to_string());
    }
    if block.previous_hash.is_empty() {
        return Err("previous hash is missing".to_string());
    }
    if block.timestamp == 0 {
        return Err("timestamp is missing".to_string());
    }
    if block.payload.proof.is_empty() {
        return Err("payload proof is missing".to_string());
    }
    for (i, tx) in block.transactions().iter().enumerate() {
        validate_well_formed(tx).map_err(|e| format!("transaction {}: {}", i, e))?;
    }
    Ok(())
}
