//! Engine events for external observers (presentation layers, tests).

use crate::blockchain::Block;
use crate::crypto::Address;
use crate::validator::Validator;
use crossbeam_channel::{Receiver, Sender};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub enum ChainEvent {
    BlockSealed(Block),
    ValidatorRegistered(Validator),
    EpochTransition {
        previous_epoch: u64,
        new_epoch: u64,
    },
    ValidatorSlashed {
        address: Address,
        amount: f64,
        reason: String,
    },
}

/// Receives every event emitted by an engine, synchronously and in order.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &ChainEvent);
}

/// Drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl EventObserver for NullObserver {
    fn on_event(&self, _event: &ChainEvent) {}
}

/// Forwards events into an unbounded crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<ChainEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, Receiver<ChainEvent>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl EventObserver for ChannelObserver {
    fn on_event(&self, event: &ChainEvent) {
        if self.sender.send(event.clone()).is_err() {
            warn!("Event receiver dropped; discarding {}", event_name(event));
        }
    }
}

pub(crate) fn log_event(event: &ChainEvent) {
    match event {
        ChainEvent::BlockSealed(block) => {
            info!("event=block_sealed index={} hash={}", block.index, block.hash)
        }
        ChainEvent::ValidatorRegistered(v) => {
            info!("event=validator_registered address={} stake={}", v.address, v.stake)
        }
        ChainEvent::EpochTransition {
            previous_epoch,
            new_epoch,
        } => info!("event=epoch_transition from={} to={}", previous_epoch, new_epoch),
        ChainEvent::ValidatorSlashed {
            address,
            amount,
            reason,
        } => info!(
            "event=validator_slashed address={} amount={} reason={}",
            address, amount, reason
        ),
    }
}

fn event_name(event: &ChainEvent) -> &'static str {
    match event {
        ChainEvent::BlockSealed(_) => "block_sealed",
        ChainEvent::ValidatorRegistered(_) => "validator_registered",
        ChainEvent::EpochTransition { .. } => "epoch_transition",
        ChainEvent::ValidatorSlashed { .. } => "validator_slashed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_in_order() {
        let (observer, rx) = ChannelObserver::new();
        observer.on_event(&ChainEvent::EpochTransition {
            previous_epoch: 0,
            new_epoch: 1,
        });
        observer.on_event(&ChainEvent::BlockSealed(Block::genesis()));

        assert!(matches!(
            rx.try_recv(),
            Ok(ChainEvent::EpochTransition { new_epoch: 1, .. })
        ));
        assert!(matches!(rx.try_recv(), Ok(ChainEvent::BlockSealed(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_tolerated() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_event(&ChainEvent::BlockSealed(Block::genesis()));
    }
}
