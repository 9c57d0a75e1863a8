//! Wall-clock source for cache timestamps
//!
//! Timestamps are milliseconds since the Unix epoch. Tests swap in a
//! manual clock to step through TTL boundaries without sleeping.

/// Source of "now" in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Real time from the system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

#[cfg(test)]
pub use manual::ManualClock;
