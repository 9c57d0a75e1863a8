//! Content store abstraction
//!
//! The cache and the HTTP layer only see this trait; the GitHub client is the
//! production implementation and tests substitute an in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::github::{GitHubError, ModInfo};

/// Relative asset path -> raw file bytes
pub type AssetTree = HashMap<String, Vec<u8>>;

/// Whether `mod_id` names a single directory entry under the mods root
///
/// Rejects ids that could address anything outside their own mod directory
/// once joined into a repository path.
pub fn is_valid_mod_id(mod_id: &str) -> bool {
    !mod_id.is_empty()
        && mod_id != "."
        && mod_id != ".."
        && !mod_id.contains(|c: char| c == '/' || c == '\\')
}

/// Source of mod directories and files
///
/// Absent paths are reported as `Ok(None)` or an empty collection; `Err` is
/// reserved for transport and API failures. A mod id rejected by
/// [`is_valid_mod_id`] is treated as absent.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Names of the sub-directories at `path`
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, GitHubError>;

    /// Decoded `mod.json` for a mod
    async fn get_metadata(&self, mod_id: &str) -> Result<Option<ModInfo>, GitHubError>;

    /// Thumbnail bytes for a mod
    async fn get_image(&self, mod_id: &str) -> Result<Option<Vec<u8>>, GitHubError>;

    /// Every file under the mod's asset directory, keyed by relative path
    async fn get_asset_tree(&self, mod_id: &str) -> Result<AssetTree, GitHubError>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_mod_ids_are_valid() {
        assert!(is_valid_mod_id("mod-a"));
        assert!(is_valid_mod_id("My Mod v2.1"));
        assert!(is_valid_mod_id("..hidden"));
    }

    #[test]
    fn test_path_like_mod_ids_are_rejected() {
        for id in ["", ".", "..", "../other", "a/b", "..\\x", "x\\y", "/"] {
            assert!(!is_valid_mod_id(id), "accepted {:?}", id);
        }
    }
}
