//! Nullable network: records broadcasts instead of sending them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use dpos_types::{BroadcastError, Broadcaster};

#[derive(Debug, Default)]
pub struct NullNetwork {
    sent: Mutex<Vec<Vec<u8>>>,
    fail_next: AtomicBool,
}

impl NullNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every block broadcast so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make the next broadcast fail.
    pub fn fail_next_broadcast(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Broadcaster for NullNetwork {
    fn broadcast(&self, encoded_block: &[u8]) -> Result<(), BroadcastError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BroadcastError("injected failure".into()));
        }
        self.sent
            .lock()
            .map_err(|_| BroadcastError("recorder poisoned".into()))?
            .push(encoded_block.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_fails_on_demand() {
        let net = NullNetwork::new();
        net.broadcast(b"one").unwrap();
        net.fail_next_broadcast();
        assert!(net.broadcast(b"two").is_err());
        net.broadcast(b"three").unwrap();
        assert_eq!(net.sent(), vec![b"one".to_vec(), b"three".to_vec()]);
    }
}
