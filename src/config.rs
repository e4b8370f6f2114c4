//! Configuration management for StakeChain

use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "stakechain.toml";

/// Leading zero hex characters cannot exceed the digest length.
pub const MAX_DIFFICULTY: u32 = 64;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default = "default_block_reward")]
    pub block_reward: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            block_reward: default_block_reward(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConsensusConfig {
    #[serde(default = "default_minimum_stake")]
    pub minimum_stake: f64,
    #[serde(default = "default_slashing_rate")]
    pub slashing_rate: f64,
    /// Annual reward rate, pro-rated per epoch
    #[serde(default = "default_reward_rate")]
    pub reward_rate: f64,
    #[serde(default = "default_epoch_duration_secs")]
    pub epoch_duration_secs: u64,
    #[serde(default = "default_max_validators")]
    pub max_validators: usize,
    /// Fixed seed for reproducible validator selection
    #[serde(default)]
    pub selection_seed: Option<u64>,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            minimum_stake: default_minimum_stake(),
            slashing_rate: default_slashing_rate(),
            reward_rate: default_reward_rate(),
            epoch_duration_secs: default_epoch_duration_secs(),
            max_validators: default_max_validators(),
            selection_seed: None,
        }
    }
}

impl ConsensusConfig {
    pub fn epoch_duration_ms(&self) -> u64 {
        self.epoch_duration_secs.saturating_mul(1000)
    }
}

impl Config {
    /// Loads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let config_str = fs::read_to_string(path)?;
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "ledger.difficulty must be at most {}",
                MAX_DIFFICULTY
            )));
        }
        if !self.ledger.block_reward.is_finite() || self.ledger.block_reward < 0.0 {
            return Err(ChainError::ConfigError(
                "ledger.block_reward must be a non-negative number".to_string(),
            ));
        }

        let c = &self.consensus;
        if !c.minimum_stake.is_finite() || c.minimum_stake < 0.0 {
            return Err(ChainError::ConfigError(
                "consensus.minimum_stake must be a non-negative number".to_string(),
            ));
        }
        for (name, rate) in [("slashing_rate", c.slashing_rate), ("reward_rate", c.reward_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ChainError::ConfigError(format!(
                    "consensus.{} must be within [0, 1]",
                    name
                )));
            }
        }
        if c.epoch_duration_secs == 0 {
            return Err(ChainError::ConfigError(
                "consensus.epoch_duration_secs must be positive".to_string(),
            ));
        }
        if c.max_validators == 0 {
            return Err(ChainError::ConfigError(
                "consensus.max_validators must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_difficulty() -> u32 {
    4
}

fn default_block_reward() -> f64 {
    100.0
}

fn default_minimum_stake() -> f64 {
    1000.0
}

fn default_slashing_rate() -> f64 {
    0.1
}

fn default_reward_rate() -> f64 {
    0.05
}

fn default_epoch_duration_secs() -> u64 {
    86_400
}

fn default_max_validators() -> usize {
    21
}
