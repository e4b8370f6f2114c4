//! Hashing primitives for StakeChain
//!
//! Every digest in the crate is a lowercase hex SHA-256 string. Structured
//! values are fed field by field through [`FieldHasher`], which length-prefixes
//! strings and tags optional fields so that distinct payloads never collide on
//! concatenation.

use sha2::{Digest, Sha256};

/// Account or validator identifier.
pub type Address = String;

/// Hex-encoded SHA-256 digest.
pub type HashHex = String;

/// Extra SHA-256 passes applied to block digests.
pub const HARDENING_ROUNDS: u32 = 3;

/// SHA-256 of raw bytes, hex encoded.
pub fn sha256_hex(data: &[u8]) -> HashHex {
    hex::encode(Sha256::digest(data))
}

/// Re-hashes a digest `HARDENING_ROUNDS` times, mixing in the round number.
pub fn harden(hash: HashHex) -> HashHex {
    (0..HARDENING_ROUNDS).fold(hash, |acc, round| {
        let mut hasher = Sha256::new();
        hasher.update(acc.as_bytes());
        hasher.update(round.to_string().as_bytes());
        hex::encode(hasher.finalize())
    })
}

/// Hash-based stand-in for a wallet signature. Nothing verifies it.
pub fn sign_placeholder(secret: &str, message: &[u8]) -> String {
    FieldHasher::new().str(secret).bytes(message).finish()
}

/// Incremental, order-sensitive hasher over typed fields.
#[derive(Clone, Default)]
pub struct FieldHasher {
    inner: Sha256,
}

impl FieldHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.inner.update((data.len() as u64).to_le_bytes());
        self.inner.update(data);
        self
    }

    pub fn str(self, value: &str) -> Self {
        self.bytes(value.as_bytes())
    }

    pub fn opt_str(mut self, value: Option<&str>) -> Self {
        match value {
            Some(v) => {
                self.inner.update([1u8]);
                self.str(v)
            }
            None => {
                self.inner.update([0u8]);
                self
            }
        }
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.inner.update(value.to_le_bytes());
        self
    }

    pub fn f64(mut self, value: f64) -> Self {
        self.inner.update(value.to_bits().to_le_bytes());
        self
    }

    pub fn finish(self) -> HashHex {
        hex::encode(self.inner.finalize())
    }

    /// Finishes and applies [`harden`].
    pub fn finish_hardened(self) -> HashHex {
        harden(self.finish())
    }
}
