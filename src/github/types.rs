//! GitHub contents API types
//!
//! Defines the response shapes of `GET /repos/{owner}/{repo}/contents/{path}`
//! and the mod metadata record stored as `mod.json` in each mod directory.

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::errors::GitHubError;

/// Kind of entry in a directory listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Dir,
    Symlink,
    Submodule,
}

/// One entry of a directory listing
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    /// Entry name (last path segment)
    pub name: String,
    /// Full path within the repository
    pub path: String,
    /// Entry kind
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,
}

/// A single file with inline content
#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    /// Base64 content with embedded newlines; empty for large files
    #[serde(default)]
    pub content: String,
    /// "base64", or "none" when the file exceeds the inline size limit
    #[serde(default)]
    pub encoding: String,
    /// Raw download location, used when content is not inlined
    #[serde(default)]
    pub download_url: Option<String>,
}

impl FileContent {
    /// Whether the file body is carried inline in this response
    pub fn is_inline(&self) -> bool {
        self.encoding == "base64" && (!self.content.is_empty() || self.size == 0)
    }

    /// Decode the inline base64 content
    pub fn decode(&self) -> Result<Vec<u8>, GitHubError> {
        decode_content(&self.content)
    }
}

/// Response of the contents endpoint: an array for directories, an object for files
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
    Directory(Vec<ContentItem>),
    File(FileContent),
}

/// Decode GitHub's base64 content, which is wrapped at 60 columns
pub fn decode_content(content: &str) -> Result<Vec<u8>, GitHubError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

/// Mod metadata as stored in `mod.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    /// Client version tag the mod was uploaded for
    #[serde(default)]
    pub client_version_upload: String,
    #[serde(default)]
    pub file_version: u64,
}
