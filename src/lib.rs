//! StakeChain - a single-process ledger simulator with proof-of-work sealing
//! and stake-weighted validator selection
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the append-only ledger and integrity verification
//! - [`transaction`] - Transaction types and well-formedness checks
//! - [`miner`] - Cancellable proof-of-work sealing
//! - [`cache`] - Balance and history caches derived from the ledger
//!
//! ## Consensus
//! - [`validator`] - Validator registry (stake, reputation, voting power)
//! - [`consensus`] - Selection, block validation, epochs and slashing
//!
//! ## Cryptography
//! - [`crypto`] - Hashing and signature placeholders
//!
//! ## Runtime
//! - [`engine`] - Single-owner facade over every operation
//! - [`node`] - Shared async handle serializing mutations
//! - [`events`] - Typed events for external observers
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod cache;
pub mod miner;
pub mod transaction;

// ============================================================================
// Consensus
// ============================================================================
pub mod consensus;
pub mod validator;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Runtime
// ============================================================================
pub mod engine;
pub mod events;
pub mod node;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use engine::Engine;
pub use error::{ChainError, Result};
pub use node::Node;
