//! Validator registry: stake, reputation and voting-power bookkeeping.

use crate::crypto::Address;
use crate::error::ChainError;
use std::collections::BTreeMap;
use tracing::{debug, info};

pub const INITIAL_REPUTATION: u8 = 50;
pub const MAX_REPUTATION: u8 = 100;

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Validator {
    pub address: Address,
    pub public_key: String,
    pub stake: f64,
    pub active: bool,
    /// 0..=100
    pub reputation: u8,
    pub validated_blocks: u64,
    pub joined_epoch: u64,
    pub voting_power: f64,
}

impl Validator {
    /// `stake × (0.5 + reputation / 100)`, or zero while inactive.
    pub fn compute_voting_power(&self) -> f64 {
        if !self.active {
            return 0.0;
        }
        self.stake * (0.5 + f64::from(self.reputation) / 100.0)
    }
}

/// Outcome of a slash, used for events and the slashing history.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SlashRecord {
    pub address: Address,
    pub amount: f64,
    pub reason: String,
    pub remaining_stake: f64,
    pub reputation: u8,
    pub deactivated: bool,
}

/// Validators keyed by address. Validators are never removed, only deactivated.
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<Address, Validator>,
    minimum_stake: f64,
    slashing_rate: f64,
}

impl ValidatorRegistry {
    pub fn new(minimum_stake: f64, slashing_rate: f64) -> Self {
        Self {
            validators: BTreeMap::new(),
            minimum_stake,
            slashing_rate,
        }
    }

    pub fn minimum_stake(&self) -> f64 {
        self.minimum_stake
    }

    pub fn slashing_rate(&self) -> f64 {
        self.slashing_rate
    }

    pub fn get(&self, address: &str) -> Option<&Validator> {
        self.validators.get(address)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    pub fn active(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values().filter(|v| v.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn register(
        &mut self,
        address: Address,
        public_key: String,
        initial_stake: f64,
        epoch: u64,
    ) -> Result<Validator, ChainError> {
        if self.validators.contains_key(&address) {
            return Err(ChainError::AlreadyRegistered(address));
        }
        if !initial_stake.is_finite() || initial_stake < self.minimum_stake {
            return Err(ChainError::InsufficientStake {
                required: self.minimum_stake,
                available: initial_stake,
            });
        }

        let mut validator = Validator {
            address: address.clone(),
            public_key,
            stake: initial_stake,
            active: true,
            reputation: INITIAL_REPUTATION,
            validated_blocks: 0,
            joined_epoch: epoch,
            voting_power: 0.0,
        };
        validator.voting_power = validator.compute_voting_power();
        info!("Registered validator {} with stake {}", address, initial_stake);
        self.validators.insert(address, validator.clone());
        Ok(validator)
    }

    pub fn add_stake(&mut self, address: &str, amount: f64) -> Result<&Validator, ChainError> {
        check_stake_amount(amount)?;
        let minimum = self.minimum_stake;
        let validator = self.get_mut(address)?;
        let total = validator.stake + amount;
        if !total.is_finite() {
            return Err(ChainError::InvalidStakeAmount(amount));
        }
        validator.stake = total;
        Self::refresh(validator, minimum);
        debug!("Added {} stake to {} (now {})", amount, address, validator.stake);
        Ok(&*validator)
    }

    /// Withdraws stake. Leaving a remainder strictly between zero and the
    /// minimum is rejected; withdrawing everything deactivates the validator.
    pub fn remove_stake(&mut self, address: &str, amount: f64) -> Result<&Validator, ChainError> {
        check_stake_amount(amount)?;
        let minimum = self.minimum_stake;
        let validator = self.get_mut(address)?;
        if amount > validator.stake {
            return Err(ChainError::InsufficientStake {
                required: amount,
                available: validator.stake,
            });
        }

        let remaining = validator.stake - amount;
        if remaining > 0.0 && remaining < minimum {
            return Err(ChainError::BelowMinimum { remaining, minimum });
        }

        validator.stake = remaining;
        Self::refresh(validator, minimum);
        debug!("Removed {} stake from {} (now {})", amount, address, remaining);
        Ok(&*validator)
    }

    /// Burns `stake × slashing_rate` and takes 20 reputation points.
    pub fn slash(&mut self, address: &str, reason: &str) -> Result<SlashRecord, ChainError> {
        let (minimum, rate) = (self.minimum_stake, self.slashing_rate);
        let validator = self.get_mut(address)?;

        let amount = (validator.stake * rate).clamp(0.0, validator.stake);
        validator.stake -= amount;
        validator.reputation = validator.reputation.saturating_sub(20);
        let was_active = validator.active;
        Self::refresh(validator, minimum);

        info!(
            "Slashed validator {} by {} for {} (stake {}, reputation {})",
            address, amount, reason, validator.stake, validator.reputation
        );
        Ok(SlashRecord {
            address: validator.address.clone(),
            amount,
            reason: reason.to_string(),
            remaining_stake: validator.stake,
            reputation: validator.reputation,
            deactivated: was_active && !validator.active,
        })
    }

    /// Zero for unknown or inactive validators.
    pub fn voting_power(&self, address: &str) -> f64 {
        self.validators
            .get(address)
            .filter(|v| v.active)
            .map_or(0.0, |v| v.voting_power)
    }

    /// Records a successful validation: +1 reputation (capped) and +1 block.
    pub fn record_validation_success(&mut self, address: &str) -> Result<&Validator, ChainError> {
        let minimum = self.minimum_stake;
        let validator = self.get_mut(address)?;
        validator.reputation = (validator.reputation + 1).min(MAX_REPUTATION);
        validator.validated_blocks += 1;
        Self::refresh(validator, minimum);
        Ok(&*validator)
    }

    /// Records a failed validation: -5 reputation (floored at zero).
    pub fn record_validation_failure(&mut self, address: &str) -> Result<&Validator, ChainError> {
        let minimum = self.minimum_stake;
        let validator = self.get_mut(address)?;
        validator.reputation = validator.reputation.saturating_sub(5);
        Self::refresh(validator, minimum);
        Ok(&*validator)
    }

    fn get_mut(&mut self, address: &str) -> Result<&mut Validator, ChainError> {
        self.validators
            .get_mut(address)
            .ok_or_else(|| ChainError::UnknownValidator(address.to_string()))
    }

    /// Re-derives the active flag from stake and recomputes voting power.
    fn refresh(validator: &mut Validator, minimum: f64) {
        validator.active = validator.stake >= minimum && validator.stake > 0.0;
        validator.voting_power = validator.compute_voting_power();
    }
}

fn check_stake_amount(amount: f64) -> Result<(), ChainError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(ChainError::InvalidStakeAmount(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ValidatorRegistry {
        ValidatorRegistry::new(1000.0, 0.1)
    }

    fn register(reg: &mut ValidatorRegistry, address: &str, stake: f64) -> Validator {
        reg.register(address.to_string(), format!("pk-{}", address), stake, 0)
            .unwrap()
    }

    #[test]
    fn test_register_defaults() {
        let mut reg = registry();
        let v = reg
            .register("v1".to_string(), "pk".to_string(), 1500.0, 3)
            .unwrap();
        assert!(v.active);
        assert_eq!(v.reputation, 50);
        assert_eq!(v.joined_epoch, 3);
        assert_eq!(v.validated_blocks, 0);
        assert_eq!(v.voting_power, 1500.0);
    }

    #[test]
    fn test_register_rejects_duplicates_and_low_stake() {
        let mut reg = registry();
        register(&mut reg, "v1", 1000.0);
        assert_eq!(
            reg.register("v1".to_string(), "pk".to_string(), 5000.0, 0),
            Err(ChainError::AlreadyRegistered("v1".to_string()))
        );
        assert!(matches!(
            reg.register("v2".to_string(), "pk".to_string(), 999.0, 0),
            Err(ChainError::InsufficientStake { .. })
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_remove_stake_scenario() {
        let mut reg = registry();
        register(&mut reg, "V", 1000.0);

        assert_eq!(
            reg.remove_stake("V", 1.0).unwrap_err(),
            ChainError::BelowMinimum {
                remaining: 999.0,
                minimum: 1000.0
            }
        );
        assert_eq!(reg.get("V").unwrap().stake, 1000.0);

        let v = reg.remove_stake("V", 1000.0).unwrap();
        assert_eq!(v.stake, 0.0);
        assert!(!v.active);
        assert_eq!(reg.voting_power("V"), 0.0);
    }

    #[test]
    fn test_remove_more_than_staked() {
        let mut reg = registry();
        register(&mut reg, "V", 1200.0);
        assert!(matches!(
            reg.remove_stake("V", 1200.5),
            Err(ChainError::InsufficientStake { .. })
        ));
        assert!(reg.remove_stake("V", 200.0).unwrap().active);
    }

    #[test]
    fn test_unknown_validator() {
        let mut reg = registry();
        assert_eq!(
            reg.add_stake("ghost", 1.0).unwrap_err(),
            ChainError::UnknownValidator("ghost".to_string())
        );
        assert!(reg.remove_stake("ghost", 1.0).is_err());
        assert!(reg.slash("ghost", "x").is_err());
        assert_eq!(reg.voting_power("ghost"), 0.0);
    }

    #[test]
    fn test_voting_power_follows_reputation() {
        let mut reg = registry();
        register(&mut reg, "V", 2000.0);
        for _ in 0..10 {
            reg.record_validation_failure("V").unwrap();
        }
        assert_eq!(reg.get("V").unwrap().reputation, 0);
        assert_eq!(reg.voting_power("V"), 1000.0);

        for _ in 0..150 {
            reg.record_validation_success("V").unwrap();
        }
        let v = reg.get("V").unwrap();
        assert_eq!(v.reputation, 100);
        assert_eq!(v.validated_blocks, 150);
        assert_eq!(reg.voting_power("V"), 3000.0);
    }

    #[test]
    fn test_slash_scenario() {
        let mut reg = registry();
        register(&mut reg, "V", 1000.0);
        let record = reg.slash("V", "double-sign").unwrap();
        assert_eq!(record.amount, 100.0);
        assert_eq!(record.remaining_stake, 900.0);
        assert_eq!(record.reputation, 30);
        assert!(record.deactivated);
        assert!(!reg.get("V").unwrap().active);
    }

    #[test]
    fn test_slash_never_goes_negative() {
        let mut reg = ValidatorRegistry::new(0.0, 1.0);
        register(&mut reg, "V", 10.0);
        reg.slash("V", "a").unwrap();
        let record = reg.slash("V", "b").unwrap();
        assert_eq!(record.amount, 0.0);
        assert_eq!(reg.get("V").unwrap().stake, 0.0);
        assert_eq!(reg.get("V").unwrap().reputation, 10);
    }

    #[test]
    fn test_add_stake_reactivates() {
        let mut reg = registry();
        register(&mut reg, "V", 1000.0);
        reg.slash("V", "downtime").unwrap();
        assert!(!reg.get("V").unwrap().active);
        let v = reg.add_stake("V", 100.0).unwrap();
        assert!(v.active);
        assert_eq!(v.stake, 1000.0);
    }

    #[test]
    fn test_stake_changes_reject_bad_amounts() {
        let mut reg = registry();
        register(&mut reg, "V", 2000.0);
        for amount in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, -1.0] {
            assert!(matches!(
                reg.add_stake("V", amount),
                Err(ChainError::InvalidStakeAmount(_))
            ));
            assert!(matches!(
                reg.remove_stake("V", amount),
                Err(ChainError::InvalidStakeAmount(_))
            ));
        }
        assert_eq!(reg.get("V").unwrap().stake, 2000.0);

        reg.add_stake("V", f64::MAX).unwrap();
        assert!(matches!(
            reg.add_stake("V", f64::MAX),
            Err(ChainError::InvalidStakeAmount(_))
        ));
        let v = reg.get("V").unwrap();
        assert!(v.stake.is_finite());
        assert!(v.voting_power.is_finite());
    }
}
