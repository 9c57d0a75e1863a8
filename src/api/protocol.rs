//! JSON response shapes for the REST API
//!
//! Every JSON response is an envelope with a `success` flag and either
//! `data` or `error`. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};

use crate::cache::{CacheTask, CachedMod};

/// Status reported for a mod with neither an entry nor a task
pub const NOT_CACHED_STATUS: &str = "not_cached";

/// Status reported for a mod with a live entry
pub const COMPLETED_STATUS: &str = "completed";

/// Error text for endpoints that need a cached mod
pub const NOT_CACHED_ERROR: &str = "Mod not cached. Please cache the mod first.";

/// Standard response envelope
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Health check body
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

/// Cache state of one mod
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusView {
    pub mod_id: String,
    pub status: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheStatusView {
    /// View of a live cache entry
    pub fn from_entry(mod_id: &str, entry: &CachedMod) -> Self {
        Self {
            mod_id: mod_id.to_string(),
            status: COMPLETED_STATUS.to_string(),
            cached: true,
            assets_count: Some(entry.assets.len()),
            cached_at: Some(entry.cached_at),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// View of a task whose mod has no live entry
    pub fn from_task(task: &CacheTask) -> Self {
        Self {
            mod_id: task.mod_id.clone(),
            status: task.status.as_str().to_string(),
            cached: false,
            assets_count: task.assets_count,
            cached_at: None,
            started_at: Some(task.started_at),
            completed_at: task.completed_at,
            error: task.error.clone(),
        }
    }

    pub fn not_cached(mod_id: &str) -> Self {
        Self {
            mod_id: mod_id.to_string(),
            status: NOT_CACHED_STATUS.to_string(),
            cached: false,
            assets_count: None,
            cached_at: None,
            started_at: None,
            completed_at: None,
            error: None,
        }
    }
}

/// Body of `POST /mods/cache-status`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatusRequest {
    pub mod_ids: Vec<String>,
}

/// Parse a batch status request, returning None when `modIds` is not an array of strings
pub fn parse_cache_status_request(data: &[u8]) -> Option<CacheStatusRequest> {
    serde_json::from_slice(data).ok()
}

/// One file of a cached mod
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    pub filename: String,
    pub size: usize,
}

/// Asset listing of a cached mod
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListing {
    pub mod_id: String,
    pub assets: Vec<AssetSummary>,
    pub total_assets: usize,
    pub cached_at: u64,
}

impl AssetListing {
    /// Listing sorted by filename
    pub fn from_entry(mod_id: &str, entry: &CachedMod) -> Self {
        let mut assets: Vec<AssetSummary> = entry
            .assets
            .iter()
            .map(|(filename, bytes)| AssetSummary {
                filename: filename.clone(),
                size: bytes.len(),
            })
            .collect();
        assets.sort_by(|a, b| a.filename.cmp(&b.filename));

        Self {
            mod_id: mod_id.to_string(),
            total_assets: assets.len(),
            assets,
            cached_at: entry.cached_at,
        }
    }
}
