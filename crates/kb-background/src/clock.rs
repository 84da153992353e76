use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

use kb_core::Timestamp;

/// Source of "now" for expiration checks.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall clock. Not usable on `wasm32-unknown-unknown`; hosts there supply
/// `Date.now()` through `ManualClock`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// Clock set explicitly by the host before each event.
#[derive(Debug, Default)]
pub struct ManualClock(Cell<Timestamp>);

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self(Cell::new(now))
    }

    pub fn set(&self, now: Timestamp) {
        self.0.set(now);
    }

    pub fn advance(&self, millis: i64) {
        self.0.set(self.0.get() + millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.get()
    }
}
