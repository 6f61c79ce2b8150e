//! Time source for cache expiry
//!
//! The cache only needs a monotonic "now"; export and tests drive it by hand.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Monotonic time since an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock, measured from construction
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
///
/// Clones share the same time, so a test can keep one copy and hand the
/// other to the engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jump to an absolute time in seconds
    pub fn set_secs(&self, secs: f64) {
        *self.now.lock() = Duration::from_secs_f64(secs.max(0.0));
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}
