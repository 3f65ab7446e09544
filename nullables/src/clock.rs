//! Nullable clock: time only moves when a test moves it.

use std::sync::atomic::{AtomicI64, Ordering};

use dpos_types::{Clock, Timestamp};

#[derive(Debug, Default)]
pub struct NullClock {
    millis: AtomicI64,
}

impl NullClock {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(initial.as_millis()),
        }
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
