use crate::blockchain::core::chain::Block;
use crate::miner::meets_difficulty;
use tracing::warn;

/// Checks hash linkage, hash freshness and the difficulty target of every
/// non-genesis block. Returns false on the first mismatch.
pub fn verify_blocks(blocks: &[Block], difficulty: u32) -> bool {
    for pair in blocks.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if current.hash != current.calculate_hash() {
            warn!("Invalid hash at block {}", current.index);
            return false;
        }

        if current.previous_hash != previous.hash {
            warn!("Invalid previous hash at block {}", current.index);
            return false;
        }

        if !meets_difficulty(&current.hash, difficulty) {
            warn!("Block {} does not meet difficulty {}", current.index, difficulty);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Ledger;
    use crate::miner::SealCancel;
    use crate::transaction::Transaction;

    fn sealed_chain(blocks: usize) -> Vec<Block> {
        let mut ledger = Ledger::new(1, 10.0);
        for i in 0..blocks {
            ledger
                .submit_transaction(Transaction::transfer("a", "b", i as f64).sign("ka"))
                .unwrap();
            ledger
                .seal_block(&"m".to_string(), &SealCancel::new())
                .unwrap();
        }
        ledger.chain().to_vec()
    }

    #[test]
    fn test_untouched_chain_verifies() {
        assert!(verify_blocks(&sealed_chain(3), 1));
        assert!(verify_blocks(&[Block::genesis()], 4));
    }

    #[test]
    fn test_tampered_payload_detected() {
        let mut chain = sealed_chain(2);
        chain[1].payload.transactions[0].amount = 1_000.0;
        assert!(!verify_blocks(&chain, 1));
    }

    #[test]
    fn test_rehashed_tamper_breaks_linkage() {
        let mut chain = sealed_chain(2);
        chain[1].payload.proof = "forged".to_string();
        chain[1].hash = chain[1].calculate_hash();
        assert_ne!(chain[2].previous_hash, chain[1].hash);
        assert!(!verify_blocks(&chain, 1));
    }

    #[test]
    fn test_difficulty_is_enforced() {
        let chain = sealed_chain(1);
        // A chain sealed at difficulty 1 almost never satisfies difficulty 8.
        assert!(!verify_blocks(&chain, 8) || chain[1].hash.starts_with("00000000"));
    }
}
