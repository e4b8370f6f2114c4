#![forbid(unsafe_code)]
//! Walks through the engine end to end: seals a few blocks, prints the chain,
//! verifies it, shows tamper detection and runs one round of consensus.

use clap::Parser;
use stakechain::blockchain::{verify_blocks, Block};
use stakechain::config::{Config, DEFAULT_CONFIG_PATH};
use stakechain::miner::SealCancel;
use stakechain::transaction::Transaction;
use stakechain::Engine;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    /// Override the sealing difficulty
    #[arg(long)]
    difficulty: Option<u32>,
    /// Number of blocks to seal
    #[arg(long, default_value_t = 3)]
    blocks: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(difficulty) = cli.difficulty {
        config.ledger.difficulty = difficulty;
    }
    config.validate()?;

    println!("{}", "=".repeat(80));
    println!("StakeChain Ledger Demo (difficulty {})", config.ledger.difficulty);
    println!("{}", "=".repeat(80));

    let mut engine = Engine::new(&config);
    println!("\n✓ Genesis block created");

    let transfers = [("alice", "bob", 10.0), ("bob", "charlie", 5.0), ("charlie", "alice", 2.0)];
    for i in 0..cli.blocks {
        let (from, to, amount) = transfers[i % transfers.len()];
        engine.submit_transaction(Transaction::transfer(from, to, amount).sign(from))?;

        println!("\n--- Sealing Block {} ---", i + 1);
        let start = Instant::now();
        let outcome = engine.seal_block(&"miner".to_string(), &SealCancel::new())?;
        if let Some(block) = outcome.sealed() {
            println!("Block sealed in {:.3}s: {}", start.elapsed().as_secs_f64(), block.hash);
        }
    }

    println!("\n{}", "=".repeat(80));
    println!("Complete Chain:");
    println!("{}", "=".repeat(80));
    for block in engine.ledger().chain() {
        print_block(block)?;
    }

    println!("\nChain is valid: {}", engine.verify_chain_integrity());
    for address in ["alice", "bob", "charlie", "miner"] {
        println!("Balance of {:<8} {:>10.2}", address, engine.get_balance(address));
    }

    println!("\n{}", "=".repeat(80));
    println!("Tampering Detection:");
    println!("{}", "=".repeat(80));
    let mut tampered = engine.ledger().chain().to_vec();
    if let Some(tx) = tampered
        .get_mut(1)
        .and_then(|b| b.payload.transactions.first_mut())
    {
        println!("Attempting to tamper with block 1...");
        tx.amount *= 10.0;
    }
    println!(
        "Chain is valid after tampering: {}",
        verify_blocks(&tampered, engine.ledger().difficulty())
    );

    println!("\n{}", "=".repeat(80));
    println!("Validator Round:");
    println!("{}", "=".repeat(80));
    let minimum = config.consensus.minimum_stake;
    for (i, name) in ["val-a", "val-b", "val-c", "val-d", "val-e"].iter().enumerate() {
        engine.register_validator(
            name.to_string(),
            format!("pk-{}", name),
            minimum * (i + 1) as f64,
        )?;
    }
    let selected = engine.select_validators(2);
    println!(
        "Selected: {:?}",
        selected.iter().map(|v| v.address.as_str()).collect::<Vec<_>>()
    );

    let head = engine.ledger().head().clone();
    if let Some(validator) = selected.first() {
        let record = engine.validate_block(&head, &validator.address)?;
        println!("Validation record: {}", serde_json::to_string_pretty(&record)?);
    }

    engine.slash_validator("val-e", "double-sign")?;
    let epoch_end = engine.consensus().last_epoch_time() + config.consensus.epoch_duration_ms();
    if let Some(transition) = engine.check_and_advance_epoch(epoch_end) {
        println!("Epoch transition: {}", serde_json::to_string_pretty(&transition)?);
    }
    Ok(())
}

fn print_block(block: &Block) -> Result<(), Box<dyn std::error::Error>> {
    println!("\nBlock #{}", block.index);
    println!("Timestamp: {}", block.timestamp);
    println!("Payload: {}", serde_json::to_string(&block.payload)?);
    println!("Nonce: {}", block.nonce);
    println!("Hash: {}", block.hash);
    println!("Previous Hash: {}", block.previous_hash);
    println!("{}", "-".repeat(80));
    Ok(())
}
