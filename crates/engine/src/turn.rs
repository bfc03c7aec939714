//! Per-customer turn serialization.
//!
//! WhatsApp delivers webhooks concurrently and retries aggressively, so two
//! events from the same customer can race. Each customer gets an async gate
//! that a turn holds from session load to session write; turns for different
//! customers never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sofra_core::CustomerId;
use tokio::sync::{Mutex as TurnMutex, OwnedMutexGuard};

/// Idle gates are swept once the map grows past this.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct CustomerGates {
    gates: Mutex<HashMap<String, Arc<TurnMutex<()>>>>,
}

impl CustomerGates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other turn for this customer is in flight. The guard
    /// is held across the whole turn, awaits included.
    pub async fn acquire(&self, customer_id: &CustomerId) -> OwnedMutexGuard<()> {
        let gate = {
            let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
            if gates.len() > SWEEP_THRESHOLD {
                gates.retain(|_, gate| Arc::strong_count(gate) > 1);
            }
            Arc::clone(gates.entry(customer_id.as_str().to_string()).or_default())
        };
        gate.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
