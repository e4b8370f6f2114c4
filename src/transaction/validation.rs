/// Validation logic for transactions separated from type definitions
use crate::error::ChainError;
use crate::transaction::types::Transaction;

/// Maximum encoded transaction size in bytes (100KB)
pub const MAX_TRANSACTION_SIZE: u64 = 100_000;

/// Stateless checks applied on submission and when a validator inspects a
/// block. Sender solvency is deliberately not checked; balances may go negative.
pub fn validate_well_formed(tx: &Transaction) -> Result<(), ChainError> {
    if tx.to.is_empty() {
        return Err(ChainError::InvalidTransaction(
            "Recipient address is required".to_string(),
        ));
    }

    if !tx.amount.is_finite() || tx.amount < 0.0 {
        return Err(ChainError::InvalidTransaction(format!(
            "Amount must be a non-negative finite number, got {}",
            tx.amount
        )));
    }

    if let Some(from) = &tx.from {
        if from.is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Sender address must not be empty when present".to_string(),
            ));
        }
        if tx.signature.as_deref().map_or(true, str::is_empty) {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction from {} is missing its signature",
                from
            )));
        }
    }

    if let Some(metadata) = &tx.metadata {
        if metadata.len() > Transaction::MAX_METADATA_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Metadata exceeds maximum length of {} bytes",
                Transaction::MAX_METADATA_LENGTH
            )));
        }
    }

    validate_size(tx)
}

fn validate_size(tx: &Transaction) -> Result<(), ChainError> {
    let size = bincode::serialized_size(tx)
        .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

    if size > MAX_TRANSACTION_SIZE {
        return Err(ChainError::InvalidTransaction(format!(
            "Transaction too large: {} bytes (max: {})",
            size, MAX_TRANSACTION_SIZE
        )));
    }
    Ok(())
}
