// registry/mod.rs
//! Connected switch clients and the power-state broadcast.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{PowerState, PowerUpdate};

pub type ObserverSender = mpsc::UnboundedSender<PowerUpdate>;

/// Live observers, keyed by connection id. The registry holds write-only
/// handles; a dead observer fails its own send without affecting the rest.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    observers: DashMap<Uuid, ObserverSender>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self {
            observers: DashMap::new(),
        }
    }

    /// Adds the observer and immediately pushes the current power state, so
    /// a fresh client is in sync before the next change. Invoked on the
    /// scheduler task, which serializes the snapshot against power writes.
    /// Registering the same id twice keeps a single entry.
    pub fn register(&self, id: Uuid, sender: ObserverSender, power: PowerState) {
        let _ = sender.send(PowerUpdate {
            power_on: power.is_on(),
        });
        self.observers.insert(id, sender);
        info!(%id, total = self.observers.len(), "observer connected");
    }

    /// Idempotent: removing an unknown observer is a no-op.
    pub fn deregister(&self, id: Uuid) {
        if self.observers.remove(&id).is_some() {
            info!(%id, total = self.observers.len(), "observer disconnected");
        }
    }

    /// Sends the update to every observer except `skip` (the originator of
    /// the change, if any). Per-observer failures never abort the rest.
    pub fn broadcast_except(&self, update: &PowerUpdate, skip: Option<Uuid>) {
        for entry in self.observers.iter() {
            if Some(*entry.key()) == skip {
                continue;
            }
            if entry.value().send(update.clone()).is_err() {
                debug!(id = %entry.key(), "observer channel closed, skipping");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_pushes_a_snapshot_right_away() {
        let registry = ObserverRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(Uuid::new_v4(), tx, PowerState::On);
        assert!(rx.try_recv().unwrap().power_on);
    }

    #[test]
    fn duplicate_register_keeps_one_entry() {
        let registry = ObserverRegistry::new();
        let id = Uuid::new_v4();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register(id, tx1, PowerState::Off);
        registry.register(id, tx2, PowerState::Off);
        assert_eq!(registry.len(), 1);
        registry.deregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn deregister_is_idempotent() {
        let registry = ObserverRegistry::new();
        let id = Uuid::new_v4();
        registry.deregister(id);
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(id, tx, PowerState::Off);
        registry.deregister(id);
        registry.deregister(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_skips_the_originator() {
        let registry = ObserverRegistry::new();
        let origin = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(origin, tx_a, PowerState::On);
        registry.register(other, tx_b, PowerState::On);
        let _ = rx_a.try_recv();
        let _ = rx_b.try_recv();

        registry.broadcast_except(&PowerUpdate { power_on: false }, Some(origin));
        assert!(rx_a.try_recv().is_err());
        assert!(!rx_b.try_recv().unwrap().power_on);
    }

    #[test]
    fn dead_observer_does_not_block_the_rest() {
        let registry = ObserverRegistry::new();
        let dead = Uuid::new_v4();
        let alive = Uuid::new_v4();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_alive, mut rx_alive) = mpsc::unbounded_channel();
        registry.register(dead, tx_dead, PowerState::On);
        registry.register(alive, tx_alive, PowerState::On);
        let _ = rx_alive.try_recv();
        drop(rx_dead);

        registry.broadcast_except(&PowerUpdate { power_on: false }, None);
        assert!(!rx_alive.try_recv().unwrap().power_on);
    }
}
