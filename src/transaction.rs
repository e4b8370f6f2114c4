//! Transaction module split into types and validation for better modularity

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::validate_well_formed;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;

    #[test]
    fn test_signed_transfer_is_well_formed() {
        let tx = Transaction::transfer("alice", "bob", 10.0).sign("alice-secret");
        assert!(validate_well_formed(&tx).is_ok());
    }

    #[test]
    fn test_unsigned_transfer_fails() {
        let tx = Transaction::transfer("alice", "bob", 10.0);
        match validate_well_formed(&tx) {
            Err(ChainError::InvalidTransaction(msg)) => assert!(msg.contains("signature")),
            other => panic!("Expected InvalidTransaction, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_signature_fails() {
        let mut tx = Transaction::transfer("alice", "bob", 10.0);
        tx.signature = Some(String::new());
        assert!(validate_well_formed(&tx).is_err());
    }

    #[test]
    fn test_reward_needs_no_signature() {
        let tx = Transaction::reward("miner", 100.0);
        assert!(tx.is_reward());
        assert!(validate_well_formed(&tx).is_ok());
    }

    #[test]
    fn test_missing_recipient_fails() {
        let tx = Transaction::reward("", 1.0);
        assert!(validate_well_formed(&tx).is_err());
    }

    #[test]
    fn test_negative_and_non_finite_amounts_rejected() {
        let negative = Transaction::transfer("alice", "bob", -1.0).sign("k");
        assert!(validate_well_formed(&negative).is_err());

        let nan = Transaction::transfer("alice", "bob", f64::NAN).sign("k");
        assert!(validate_well_formed(&nan).is_err());
    }

    #[test]
    fn test_metadata_length_limit() {
        let ok = Transaction::transfer("alice", "bob", 1.0)
            .with_metadata("swap".to_string())
            .unwrap();
        assert_eq!(ok.metadata.as_deref(), Some("swap"));

        let too_long = "x".repeat(Transaction::MAX_METADATA_LENGTH + 1);
        assert!(Transaction::transfer("alice", "bob", 1.0)
            .with_metadata(too_long)
            .is_err());
    }

    #[test]
    fn test_id_covers_signature_and_amount() {
        let base = Transaction::transfer("alice", "bob", 1.0).at(5);
        let signed = base.clone().sign("k");
        let mut bigger = base.clone();
        bigger.amount = 2.0;
        assert_ne!(base.id(), signed.id());
        assert_ne!(base.id(), bigger.id());
        assert_eq!(base.id(), base.clone().id());
    }
}
