//! Mod cache implementation
//!
//! Holds fully assembled mods with a fixed TTL, plus the records of the
//! background tasks that fill it. Expiry is lazy: stale entries are evicted
//! by the reads that notice them, there is no sweeper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, trace};

use crate::content::AssetTree;
use crate::github::ModInfo;

use super::clock::{Clock, SystemClock};
use super::task::{CacheTask, TaskStatus, TaskUpdate};

/// A fully cached mod. Never mutated after insertion; re-caching replaces it.
#[derive(Debug, Clone)]
pub struct CachedMod {
    pub info: ModInfo,
    /// Relative asset path -> bytes
    pub assets: AssetTree,
    pub image: Option<Vec<u8>>,
    /// Epoch milliseconds at which the mod was cached
    pub cached_at: u64,
}

/// Outcome of trying to start a cache task for a mod
#[derive(Debug, Clone)]
pub enum Claim {
    /// A live entry exists; no task was created
    Cached(Arc<CachedMod>),
    /// A pending or in-progress task already exists; no task was created
    InFlight(CacheTask),
    /// A new pending task was stored and the caller owns running it
    Started(CacheTask),
}

/// Entry store and task store for cached mods
///
/// Lock order, when both are held: `tasks` then `entries`.
pub struct ModsCache {
    entries: RwLock<HashMap<String, Arc<CachedMod>>>,
    tasks: Mutex<HashMap<String, CacheTask>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    next_task_id: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ModsCache {
    /// Create a cache using the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache with a custom time source
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            ttl,
            clock,
            next_task_id: AtomicU64::new(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current time in epoch milliseconds, from this cache's clock
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn ttl_ms(&self) -> u64 {
        u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX)
    }

    fn is_fresh(&self, entry: &CachedMod, now: u64) -> bool {
        now.saturating_sub(entry.cached_at) <= self.ttl_ms()
    }

    fn lock_tasks(&self) -> MutexGuard<'_, HashMap<String, CacheTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live entry for `mod_id`, evicting it if it has expired
    fn live_entry(&self, mod_id: &str) -> Option<Arc<CachedMod>> {
        let now = self.now_ms();
        let found = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries.get(mod_id).cloned()
        };

        let Some(entry) = found else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(mod_id = mod_id, "Cache MISS");
            return None;
        };

        if self.is_fresh(&entry, now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(mod_id = mod_id, "Cache HIT");
            return Some(entry);
        }

        // Re-check under the write lock: a fresh entry may have replaced it
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(mod_id) {
            Some(current) if self.is_fresh(current, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(current));
            }
            Some(_) => {
                entries.remove(mod_id);
                debug!(mod_id = mod_id, "Evicted expired cache entry");
            }
            None => {}
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Whether a non-expired entry exists. Evicts the entry if it has expired.
    pub fn is_cached(&self, mod_id: &str) -> bool {
        self.live_entry(mod_id).is_some()
    }

    /// Non-expired entry for `mod_id`
    pub fn get(&self, mod_id: &str) -> Option<Arc<CachedMod>> {
        self.live_entry(mod_id)
    }

    /// Store or replace the entry for `mod_id`
    pub fn set(&self, mod_id: &str, entry: CachedMod) {
        let assets = entry.assets.len();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(mod_id.to_string(), Arc::new(entry));
        debug!(mod_id = mod_id, assets = assets, "Cached mod");
    }

    /// Number of stored entries, counting expired ones not yet evicted
    pub fn entry_count(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Evict every expired entry, then return a snapshot of the rest
    pub fn get_all(&self) -> HashMap<String, Arc<CachedMod>> {
        let now = self.now_ms();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| self.is_fresh(entry, now));
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "Swept expired cache entries");
        }
        entries.clone()
    }

    /// Insert or replace the task record for `mod_id`
    pub fn set_cache_task(&self, mod_id: &str, task: CacheTask) {
        self.lock_tasks().insert(mod_id.to_string(), task);
    }

    pub fn get_cache_task(&self, mod_id: &str) -> Option<CacheTask> {
        self.lock_tasks().get(mod_id).cloned()
    }

    /// Merge `update` into the existing task; does nothing if there is none.
    ///
    /// Returns whether a task was updated.
    pub fn update_cache_task(&self, mod_id: &str, update: TaskUpdate) -> bool {
        match self.lock_tasks().get_mut(mod_id) {
            Some(task) => {
                task.apply(update);
                true
            }
            None => {
                trace!(mod_id = mod_id, "Ignoring update for missing task");
                false
            }
        }
    }

    pub fn remove_cache_task(&self, mod_id: &str) {
        self.lock_tasks().remove(mod_id);
    }

    /// Remove the task for `mod_id` only if it is still the task `task_id`
    pub fn remove_cache_task_if(&self, mod_id: &str, task_id: u64) -> bool {
        let mut tasks = self.lock_tasks();
        match tasks.get(mod_id) {
            Some(task) if task.id == task_id => {
                tasks.remove(mod_id);
                true
            }
            _ => false,
        }
    }

    /// True only while a task for `mod_id` is exactly `in_progress`
    pub fn is_being_cached(&self, mod_id: &str) -> bool {
        self.lock_tasks()
            .get(mod_id)
            .is_some_and(|task| task.status == TaskStatus::InProgress)
    }

    /// Atomically decide whether a new cache task should run for `mod_id`
    ///
    /// Creates and stores a pending task only when there is no live entry and
    /// no pending or in-progress task for the mod.
    pub fn begin_cache_task(&self, mod_id: &str) -> Claim {
        let mut tasks = self.lock_tasks();

        if let Some(entry) = self.live_entry(mod_id) {
            return Claim::Cached(entry);
        }

        if let Some(task) = tasks.get(mod_id) {
            if !task.status.is_terminal() {
                return Claim::InFlight(task.clone());
            }
        }

        let id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = CacheTask::pending(id, mod_id, self.now_ms());
        tasks.insert(mod_id.to_string(), task.clone());
        debug!(mod_id = mod_id, task_id = id, "Created cache task");
        Claim::Started(task)
    }

    /// Get cache statistics
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        let entries = self.entry_count();
        let tasks = self.lock_tasks().len();

        debug!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            entries = entries,
            tasks = tasks,
            "Cache metrics"
        );
    }
}
