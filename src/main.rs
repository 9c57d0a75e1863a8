//! Mod Marketplace - REST facade over a GitHub repository of game mods
//!
//! Serves mod metadata, thumbnails and assets, and caches whole mods in
//! memory on request so their assets can be downloaded without hitting GitHub.

mod api;
mod cache;
mod config;
mod content;
mod github;
mod jobs;

use anyhow::{anyhow, Result};
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::AppState;
use cache::ModsCache;
use config::Config;
use content::ContentStore;
use github::GitHubClient;
use jobs::CacheCoordinator;

/// CLI command
#[derive(Debug)]
enum Command {
    /// Run the REST server (default)
    Serve,
    /// Print the mod ids found in the repository
    List,
    /// Show help
    Help,
}

fn print_help() {
    eprintln!(
        r#"Mod Marketplace - REST API for a GitHub-hosted mod repository

USAGE:
    mod-marketplace              # Run REST server (default)
    mod-marketplace serve
    mod-marketplace list
    mod-marketplace help

COMMANDS:
    serve   Run the REST server under /api/v1
    list    Print the mod ids found in the repository
    help    Show this help message

ENVIRONMENT:
    GITHUB_TOKEN       GitHub access token (required)
    GITHUB_OWNER       Repository owner (required)
    GITHUB_REPO        Repository name (required)
    GITHUB_API_URL     API base URL (default: https://api.github.com)
    MODS_PATH          Directory holding the mods (default: mods)
    HOST               Bind address (default: 0.0.0.0)
    PORT               Bind port (default: 3000)
    CACHE_TTL_MS       Cache entry lifetime in ms (default: 3600000)
    TASK_CLEANUP_MS    How long finished tasks stay visible in ms (default: 30000)
    RUST_LOG           Log filter (trace, debug, info, warn, error)
"#
    );
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Serve);
    }

    match args[1].as_str() {
        "serve" => Ok(Command::Serve),
        "list" => Ok(Command::List),
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(anyhow!("Unknown command: {}", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let command = match parse_args() {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    match command {
        Command::Serve => serve(load_config()?).await?,
        Command::List => list(load_config()?).await?,
        Command::Help => print_help(),
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    Config::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        e
    })
}

async fn serve(config: Config) -> Result<()> {
    info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        "Starting Mod Marketplace API"
    );

    let client = GitHubClient::new(&config.github, &config.mods_path)?;
    let cache = Arc::new(ModsCache::new(config.cache_ttl));
    let coordinator = CacheCoordinator::new(cache, Arc::new(client), config.task_cleanup_delay);
    let state = Arc::new(AppState::new(coordinator, config.mods_path.clone()));

    // A failed listing is retried on the first request
    state.load_mod_ids().await;

    let addr = match api::start_server(Arc::clone(&state), &config.host, config.port).await {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, "Failed to start server");
            return Err(e);
        }
    };

    info!(addr = %addr, "Ready. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    info!("Received shutdown signal");
    state.coordinator.cache().log_metrics();
    info!("Shutdown complete.");
    Ok(())
}

async fn list(config: Config) -> Result<()> {
    let client = GitHubClient::new(&config.github, &config.mods_path)?;
    let ids = client.list_directories(&config.mods_path).await?;
    if ids.is_empty() {
        println!("No mods found in {}.", config.mods_path);
    } else {
        for id in ids {
            println!("{}", id);
        }
    }
    Ok(())
}
