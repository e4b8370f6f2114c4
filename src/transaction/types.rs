/// Transaction types for StakeChain
use crate::crypto::{sign_placeholder, Address, FieldHasher, HashHex};
use crate::error::ChainError;

/// A value movement recorded in a block. A transaction without a sender mints
/// new value (block rewards).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub from: Option<Address>,
    pub to: Address,
    pub amount: f64,
    /// Unix milliseconds
    pub timestamp: u64,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

impl Transaction {
    /// Maximum metadata length (256 bytes)
    pub const MAX_METADATA_LENGTH: usize = 256;

    pub fn transfer(from: impl Into<Address>, to: impl Into<Address>, amount: f64) -> Self {
        Transaction {
            from: Some(from.into()),
            to: to.into(),
            amount,
            timestamp: now_millis(),
            metadata: None,
            signature: None,
        }
    }

    /// Minting transaction used for block rewards.
    pub fn reward(to: impl Into<Address>, amount: f64) -> Self {
        Transaction {
            from: None,
            to: to.into(),
            amount,
            timestamp: now_millis(),
            metadata: None,
            signature: None,
        }
    }

    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_metadata(mut self, metadata: String) -> Result<Self, ChainError> {
        if metadata.len() > Self::MAX_METADATA_LENGTH {
            return Err(ChainError::InvalidTransaction(format!(
                "Metadata exceeds maximum length of {} bytes",
                Self::MAX_METADATA_LENGTH
            )));
        }
        self.metadata = Some(metadata);
        Ok(self)
    }

    /// Attaches the hash-based signature placeholder for `secret`.
    pub fn sign(mut self, secret: &str) -> Self {
        self.signature = Some(sign_placeholder(secret, &self.signable_message()));
        self
    }

    pub fn signable_message(&self) -> Vec<u8> {
        let mut message = Vec::new();
        message.extend_from_slice(b"TRANSFER:");
        message.extend_from_slice(self.from.as_deref().unwrap_or("").as_bytes());
        message.push(b':');
        message.extend_from_slice(self.to.as_bytes());
        message.extend_from_slice(&self.amount.to_le_bytes());
        message.extend_from_slice(&self.timestamp.to_le_bytes());
        message
    }

    pub fn is_reward(&self) -> bool {
        self.from.is_none()
    }

    /// True when `address` is the sender or the recipient.
    pub fn touches(&self, address: &str) -> bool {
        self.to == address || self.from.as_deref() == Some(address)
    }

    /// Net effect of this transaction on `address`'s balance.
    pub fn balance_delta(&self, address: &str) -> f64 {
        let mut delta = 0.0;
        if self.to == address {
            delta += self.amount;
        }
        if self.from.as_deref() == Some(address) {
            delta -= self.amount;
        }
        delta
    }

    /// Content hash of every field, signature included.
    pub fn id(&self) -> HashHex {
        self.feed(FieldHasher::new()).finish()
    }

    pub(crate) fn feed(&self, hasher: FieldHasher) -> FieldHasher {
        hasher
            .opt_str(self.from.as_deref())
            .str(&self.to)
            .f64(self.amount)
            .u64(self.timestamp)
            .opt_str(self.metadata.as_deref())
            .opt_str(self.signature.as_deref())
    }
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
