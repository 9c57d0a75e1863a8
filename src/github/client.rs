//! GitHub Contents API Client
//!
//! Provides authenticated read access to a repository's mod directories and
//! decodes file content returned by the contents endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::GitHubConfig;
use crate::content::{is_valid_mod_id, AssetTree, ContentStore};

use super::errors::GitHubError;
use super::types::{ContentItem, ContentsResponse, FileContent, ItemType, ModInfo};

/// Pinned REST API version
const GITHUB_API_VERSION: &str = "2022-11-28";

/// HTTP client timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata file inside each mod directory
const METADATA_FILE: &str = "mod.json";

/// Thumbnail file inside each mod directory
const IMAGE_FILE: &str = "mod.png";

/// Asset directory inside each mod directory
const ASSETS_DIR: &str = "assets";

/// GitHub client bound to one repository
#[derive(Clone)]
pub struct GitHubClient {
    /// HTTP client with auth headers preset
    http_client: Client,
    /// API base URL, e.g. `https://api.github.com`
    api_url: String,
    owner: String,
    repo: String,
    /// Directory holding one sub-directory per mod
    mods_path: String,
}

impl GitHubClient {
    /// Create a client for the configured repository
    ///
    /// # Arguments
    /// * `config` - API base URL, token and repository coordinates
    /// * `mods_path` - Repository directory that contains the mods
    pub fn new(config: &GitHubConfig, mods_path: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.token))
                .context("GitHub token contains invalid header characters")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("mod-marketplace"));

        let http_client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            api_url = %config.api_url,
            owner = %config.owner,
            repo = %config.repo,
            "GitHub client ready"
        );

        Ok(Self {
            http_client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            mods_path: mods_path.to_string(),
        })
    }

    /// Repository path of a file or directory inside a mod
    fn mod_path(&self, mod_id: &str, rest: &str) -> String {
        if self.mods_path.is_empty() {
            format!("{}/{}", mod_id, rest)
        } else {
            format!("{}/{}/{}", self.mods_path, mod_id, rest)
        }
    }

    /// Contents endpoint URL for a repository path
    fn contents_url(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_url,
            self.owner,
            self.repo,
            encoded.join("/")
        )
    }

    /// Fetch a contents endpoint response
    async fn fetch_contents(&self, path: &str) -> Result<ContentsResponse, GitHubError> {
        let url = self.contents_url(path);
        debug!(path = path, url = %url, "GitHub contents request");

        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::from_status(status, &body));
        }

        Ok(response.json::<ContentsResponse>().await?)
    }

    /// List a directory, returning None if it does not exist
    async fn list_dir(&self, path: &str) -> Result<Option<Vec<ContentItem>>, GitHubError> {
        match self.fetch_contents(path).await {
            Ok(ContentsResponse::Directory(items)) => Ok(Some(items)),
            Ok(ContentsResponse::File(_)) => Err(GitHubError::Request(format!(
                "Expected a directory at '{}', found a file",
                path
            ))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch and decode a file, returning None if it does not exist
    async fn fetch_file(&self, path: &str) -> Result<Option<Vec<u8>>, GitHubError> {
        match self.fetch_contents(path).await {
            Ok(ContentsResponse::File(file)) => self.file_bytes(&file).await.map(Some),
            Ok(ContentsResponse::Directory(_)) => Err(GitHubError::Request(format!(
                "Expected a file at '{}', found a directory",
                path
            ))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Bytes of a file, downloading the raw body when it is not inlined
    async fn file_bytes(&self, file: &FileContent) -> Result<Vec<u8>, GitHubError> {
        if file.is_inline() {
            return file.decode();
        }

        let url = file.download_url.as_deref().ok_or_else(|| {
            GitHubError::Decode(format!("No inline content or download URL for '{}'", file.path))
        })?;

        debug!(path = %file.path, size = file.size, "Downloading large file");

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::from_status(status, &body));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Join a relative prefix and an entry name
fn join_relative(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}

#[async_trait]
impl ContentStore for GitHubClient {
    async fn list_directories(&self, path: &str) -> Result<Vec<String>, GitHubError> {
        let items = self.list_dir(path).await?.unwrap_or_default();
        let names: Vec<String> = items
            .into_iter()
            .filter(|item| item.item_type == ItemType::Dir)
            .map(|item| item.name)
            .collect();

        debug!(path = path, count = names.len(), "Listed directories");
        Ok(names)
    }

    async fn get_metadata(&self, mod_id: &str) -> Result<Option<ModInfo>, GitHubError> {
        if !is_valid_mod_id(mod_id) {
            debug!(mod_id = mod_id, "Rejected invalid mod id");
            return Ok(None);
        }
        let path = self.mod_path(mod_id, METADATA_FILE);
        match self.fetch_file(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice::<ModInfo>(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_image(&self, mod_id: &str) -> Result<Option<Vec<u8>>, GitHubError> {
        if !is_valid_mod_id(mod_id) {
            debug!(mod_id = mod_id, "Rejected invalid mod id");
            return Ok(None);
        }
        self.fetch_file(&self.mod_path(mod_id, IMAGE_FILE)).await
    }

    async fn get_asset_tree(&self, mod_id: &str) -> Result<AssetTree, GitHubError> {
        let mut assets = AssetTree::new();
        if !is_valid_mod_id(mod_id) {
            debug!(mod_id = mod_id, "Rejected invalid mod id");
            return Ok(assets);
        }

        // (repository path, path relative to the assets root)
        let mut pending = vec![(self.mod_path(mod_id, ASSETS_DIR), String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let Some(items) = self.list_dir(&dir).await? else {
                debug!(mod_id = mod_id, dir = %dir, "Asset directory not found");
                continue;
            };

            let mut files = Vec::new();
            for item in items {
                let rel = join_relative(&relative, &item.name);
                match item.item_type {
                    ItemType::Dir => pending.push((item.path, rel)),
                    ItemType::File => files.push((item.path, rel)),
                    _ => debug!(path = %item.path, "Skipping non-file asset entry"),
                }
            }

            let fetched = join_all(files.into_iter().map(|(path, rel)| async move {
                let result = self.fetch_file(&path).await;
                (path, rel, result)
            }))
            .await;

            for (path, rel, result) in fetched {
                match result {
                    Ok(Some(bytes)) => {
                        assets.insert(rel, bytes);
                    }
                    Ok(None) => {
                        warn!(mod_id = mod_id, path = %path, "Asset disappeared while listing");
                    }
                    Err(e) => {
                        warn!(mod_id = mod_id, path = %path, error = %e, "Failed to fetch asset, skipping");
                    }
                }
            }
        }

        info!(mod_id = mod_id, count = assets.len(), "Fetched asset tree");
        Ok(assets)
    }
}
