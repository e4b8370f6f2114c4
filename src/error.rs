//! Error types for StakeChain

use crate::crypto::Address;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Validator already registered: {0}")]
    AlreadyRegistered(Address),
    #[error("Insufficient stake: required {required}, available {available}")]
    InsufficientStake { required: f64, available: f64 },
    #[error("Unknown validator: {0}")]
    UnknownValidator(Address),
    #[error("Invalid stake amount: {0}")]
    InvalidStakeAmount(f64),
    #[error("Remaining stake {remaining} would fall below the minimum of {minimum}")]
    BelowMinimum { remaining: f64, minimum: f64 },
    #[error("Unknown or inactive validator: {0}")]
    UnknownOrInactiveValidator(Address),
    #[error("Block validation failed: {0}")]
    BlockValidationFailed(String),
    #[error("Chain head moved while the block was being sealed")]
    StaleSeal,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ChainError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChainError::TaskFailed(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
