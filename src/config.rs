//! Service configuration
//!
//! Read once from the environment at startup and shared read-only afterwards.

use std::time::Duration;

use anyhow::{anyhow, Result};

/// Default entry TTL: 1 hour
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(3_600_000);

/// Default delay before a finished task record is dropped
pub const DEFAULT_TASK_CLEANUP_DELAY: Duration = Duration::from_secs(30);

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Repository coordinates and credentials
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// API base URL without a trailing slash
    pub api_url: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
}

/// Full service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub github: GitHubConfig,
    /// Directory in the repository holding one sub-directory per mod
    pub mods_path: String,
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
    pub task_cleanup_delay: Duration,
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let token = var("GITHUB_TOKEN");
        let owner = var("GITHUB_OWNER");
        let repo = var("GITHUB_REPO");

        let missing: Vec<&str> = [
            ("GITHUB_TOKEN", token.is_none()),
            ("GITHUB_OWNER", owner.is_none()),
            ("GITHUB_REPO", repo.is_none()),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name)
        .collect();

        let (Some(token), Some(owner), Some(repo)) = (token, owner, repo) else {
            return Err(anyhow!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        };

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow!("Invalid PORT '{}': {}", raw, e))?,
            None => 3000,
        };

        let cache_ttl = parse_millis(var("CACHE_TTL_MS"), "CACHE_TTL_MS", DEFAULT_CACHE_TTL)?;
        let task_cleanup_delay = parse_millis(
            var("TASK_CLEANUP_MS"),
            "TASK_CLEANUP_MS",
            DEFAULT_TASK_CLEANUP_DELAY,
        )?;

        let api_url = var("GITHUB_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());

        let mods_path = var("MODS_PATH")
            .map(|p| p.trim_matches('/').to_string())
            .unwrap_or_else(|| "mods".to_string());

        Ok(Self {
            github: GitHubConfig {
                api_url,
                token,
                owner,
                repo,
            },
            mods_path,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cache_ttl,
            task_cleanup_delay,
        })
    }
}

fn parse_millis(raw: Option<String>, name: &str, default: Duration) -> Result<Duration> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| anyhow!("Invalid {} '{}': {}", name, raw, e)),
        None => Ok(default),
    }
}
