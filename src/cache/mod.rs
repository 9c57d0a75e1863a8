//! In-memory mod cache
//!
//! Entries expire after a fixed TTL and are evicted lazily on read.
//! Background cache tasks are tracked alongside the entries.

pub mod clock;
pub mod mods;
pub mod task;

pub use clock::{Clock, SystemClock};
pub use mods::{CachedMod, Claim, ModsCache};
pub use task::{CacheTask, TaskStatus, TaskUpdate};
