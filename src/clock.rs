//! Time source used for the caption timestamp

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock {
    fn now(&self) -> SystemTime;

    /// Whole seconds since the Unix epoch, flooring fractional time.
    fn epoch_seconds(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(SystemTime);

impl FixedClock {
    pub fn from_epoch_secs_f64(secs: f64) -> Self {
        FixedClock(UNIX_EPOCH + Duration::from_secs_f64(secs.max(0.0)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        self.0
    }
}
