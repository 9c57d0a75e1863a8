//! Cache Coordinator - runs background cache jobs
//!
//! Decides whether a cache request needs a new job, spawns the job without
//! waiting for it, and keeps the task record in the cache up to date.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::cache::{CacheTask, CachedMod, Claim, ModsCache, TaskStatus, TaskUpdate};
use crate::content::ContentStore;

/// Spawns and tracks background cache jobs
#[derive(Clone)]
pub struct CacheCoordinator {
    cache: Arc<ModsCache>,
    store: Arc<dyn ContentStore>,
    /// How long a finished task record stays queryable
    cleanup_delay: Duration,
}

impl CacheCoordinator {
    pub fn new(cache: Arc<ModsCache>, store: Arc<dyn ContentStore>, cleanup_delay: Duration) -> Self {
        Self {
            cache,
            store,
            cleanup_delay,
        }
    }

    pub fn cache(&self) -> &Arc<ModsCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Request caching of a mod
    ///
    /// Returns immediately. A background job is started only for
    /// `Claim::Started`; the other outcomes describe existing state.
    pub fn trigger(&self, mod_id: &str) -> Claim {
        let claim = self.cache.begin_cache_task(mod_id);
        match &claim {
            Claim::Started(task) => {
                info!(mod_id = mod_id, task_id = task.id, "Starting background cache job");
                self.spawn_job(task.clone());
            }
            Claim::InFlight(task) => {
                debug!(mod_id = mod_id, status = task.status.as_str(), "Cache job already running");
            }
            Claim::Cached(_) => {
                debug!(mod_id = mod_id, "Mod already cached");
            }
        }
        claim
    }

    /// Spawn the job and a supervisor that records panics and schedules cleanup
    ///
    /// Completed and failed tasks are both removed after `cleanup_delay`,
    /// unless a newer task for the mod has replaced them.
    fn spawn_job(&self, task: CacheTask) {
        let cache = Arc::clone(&self.cache);
        let store = Arc::clone(&self.store);
        let cleanup_delay = self.cleanup_delay;

        tokio::spawn(async move {
            let mod_id = task.mod_id.clone();
            let job = tokio::spawn(run_cache_job(
                Arc::clone(&cache),
                store,
                mod_id.clone(),
            ));

            let status = match job.await {
                Ok(status) => status,
                Err(e) => {
                    error!(mod_id = %mod_id, error = %e, "Cache job aborted");
                    cache.update_cache_task(
                        &mod_id,
                        TaskUpdate::failed(cache.now_ms(), format!("Cache job aborted: {}", e)),
                    );
                    TaskStatus::Failed
                }
            };

            cache.log_metrics();

            tokio::time::sleep(cleanup_delay).await;
            if cache.remove_cache_task_if(&mod_id, task.id) {
                debug!(
                    mod_id = %mod_id,
                    task_id = task.id,
                    status = status.as_str(),
                    "Removed finished cache task"
                );
            }
        });
    }
}

/// Fetch, assemble, and store one mod, recording progress on its task
async fn run_cache_job(
    cache: Arc<ModsCache>,
    store: Arc<dyn ContentStore>,
    mod_id: String,
) -> TaskStatus {
    cache.update_cache_task(&mod_id, TaskUpdate::in_progress());

    let (info, image, assets) = tokio::join!(
        store.get_metadata(&mod_id),
        store.get_image(&mod_id),
        store.get_asset_tree(&mod_id),
    );

    let info = match info {
        Ok(Some(info)) => info,
        Ok(None) => return fail(&cache, &mod_id, "Mod not found".to_string()),
        Err(e) => return fail(&cache, &mod_id, e.to_string()),
    };

    let assets = match assets {
        Ok(assets) => assets,
        Err(e) => return fail(&cache, &mod_id, e.to_string()),
    };

    let image = image.unwrap_or_else(|e| {
        warn!(mod_id = %mod_id, error = %e, "Failed to fetch mod image, caching without it");
        None
    });

    let assets_count = assets.len();
    let cached_at = cache.now_ms();
    cache.set(
        &mod_id,
        CachedMod {
            info,
            assets,
            image,
            cached_at,
        },
    );
    cache.update_cache_task(&mod_id, TaskUpdate::completed(cache.now_ms(), assets_count));

    info!(mod_id = %mod_id, assets = assets_count, "Mod cached");
    TaskStatus::Completed
}

fn fail(cache: &ModsCache, mod_id: &str, message: String) -> TaskStatus {
    error!(mod_id = mod_id, error = %message, "Cache job failed");
    cache.update_cache_task(mod_id, TaskUpdate::failed(cache.now_ms(), message));
    TaskStatus::Failed
}
