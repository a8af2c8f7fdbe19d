//! Command-line interface: argument parsing and the `run` entrypoint.
//!
//! Every subcommand loads the YAML config, builds the in-memory site
//! repository and content store, and hands off to
//! [`syndication_core::Syndicator`]. Commands that touch local posts read
//! and write the JSON store given with `--store`; pull failure counts and
//! sites disabled after repeated failures live in a state file beside it.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syndication_core::factory::builtin_descriptors;
use syndication_core::syndicate::{DeleteResult, PullStatus, PushResult};
use syndication_core::{HostContext, MemorySiteRepository, MemoryStore, SiteCredentials, Syndicator};

use crate::content_store::{load_site_states, load_store, save_site_states, save_store, site_state_path};
use crate::events::TraceEvents;
use crate::load_config::{cipher_from_env, load_config, CliConfig};

/// Syndicate posts between a local store and remote WordPress-style sites.
#[derive(Parser)]
#[clap(name = "syndication", version, about = "Pull, push and delete syndicated posts")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull posts from enabled sites into the local store
    Pull {
        #[clap(long)]
        config: PathBuf,
        /// JSON content store
        #[clap(long)]
        store: PathBuf,
        /// Pull only this site instead of the configured sitegroups
        #[clap(long)]
        site: Option<String>,
    },
    /// Push a local post to remote sites
    Push {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        store: PathBuf,
        #[clap(long)]
        post_id: u64,
        /// Target site; repeatable. Defaults to every push-capable site.
        #[clap(long = "site")]
        sites: Vec<String>,
    },
    /// Delete the remote copies of a local post
    Delete {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        store: PathBuf,
        #[clap(long)]
        post_id: u64,
        #[clap(long = "site")]
        sites: Vec<String>,
    },
    /// Check that a site's remote is reachable with its credentials
    TestConnection {
        #[clap(long)]
        config: PathBuf,
        #[clap(long)]
        site: String,
    },
    /// Seal credentials into a blob for a site's `credentials` entry
    EncryptCredentials {
        #[clap(long)]
        username: Option<String>,
        #[clap(long)]
        password: Option<String>,
        #[clap(long)]
        token: Option<String>,
    },
    /// Clear the saved pull failures of a site, re-enabling it after an automatic disable
    EnableSite {
        #[clap(long)]
        store: PathBuf,
        #[clap(long)]
        site: String,
    },
    /// List configured sites and what their transports can do
    ListSites {
        #[clap(long)]
        config: PathBuf,
    },
}

/// Configured sites with the state saved beside `store_path` applied.
fn site_repository(config: &CliConfig, store_path: Option<&Path>) -> Result<Arc<MemorySiteRepository>> {
    let sites = config.site_repository(cipher_from_env()?);
    if let Some(store_path) = store_path {
        sites.restore_states(&load_site_states(&site_state_path(store_path))?);
    }
    Ok(Arc::new(sites))
}

fn syndicator(config: &CliConfig, sites: Arc<MemorySiteRepository>, store: Arc<MemoryStore>) -> Syndicator {
    let ctx = HostContext::new(store.clone(), store, Arc::new(TraceEvents), config.settings.clone());
    Syndicator::new(sites, ctx)
}

async fn pull(config: &Path, store_path: &Path, site: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    let store = Arc::new(load_store(store_path)?);
    let sites = site_repository(&config, Some(store_path))?;
    let syndicator = syndicator(&config, sites.clone(), store.clone());

    let reports = match site {
        Some(site_id) => vec![syndicator.pull_site(&site_id).await],
        None => syndicator.pull_sites().await.sites,
    };
    save_store(store_path, &store)?;
    save_site_states(&site_state_path(store_path), &sites.site_states())?;

    if reports.is_empty() {
        println!("No enabled sites to pull");
    }

    for report in &reports {
        match &report.status {
            PullStatus::Pulled => println!(
                "{}: {} inserted, {} updated, {} unchanged, {} errors",
                report.site_id,
                report.inserted.len(),
                report.updated.len(),
                report.unchanged,
                report.errors.len()
            ),
            PullStatus::Failed { failures, disabled } => println!(
                "{}: pull failed ({failures} consecutive){}",
                report.site_id,
                if *disabled { ", site disabled" } else { "" }
            ),
            PullStatus::NoTransport => println!("{}: no usable transport", report.site_id),
            PullStatus::PushOnly => println!("{}: transport cannot pull", report.site_id),
        }
    }
    Ok(())
}

async fn push(config: &Path, store_path: &Path, post_id: u64, sites: Vec<String>) -> Result<()> {
    let config = load_config(config)?;
    let store = Arc::new(load_store(store_path)?);
    let repository = site_repository(&config, Some(store_path))?;
    let syndicator = syndicator(&config, repository, store.clone());

    let targets = if sites.is_empty() { syndicator.push_targets() } else { sites };
    if targets.is_empty() {
        bail!("No push-capable sites configured");
    }
    let report = syndicator.push_post(post_id, &targets).await;
    save_store(store_path, &store)?;

    for site in &report.sites {
        match &site.result {
            PushResult::Created(remote_id) => println!("{}: created remote post {remote_id}", site.site_id),
            PushResult::Updated(remote_id) => println!("{}: updated remote post {remote_id}", site.site_id),
            PushResult::Skipped => println!("{}: skipped", site.site_id),
            PushResult::NoTransport => println!("{}: no usable transport", site.site_id),
            PushResult::PullOnly => println!("{}: transport cannot push", site.site_id),
            PushResult::Failed(e) => println!("{}: failed [{}] {}", site.site_id, e.code(), e),
        }
    }
    let failures = report.failures().count();
    if failures > 0 {
        bail!("Push of post {post_id} failed on {failures} site(s)");
    }
    Ok(())
}

async fn delete(config: &Path, store_path: &Path, post_id: u64, sites: Vec<String>) -> Result<()> {
    let config = load_config(config)?;
    let store = Arc::new(load_store(store_path)?);
    let repository = site_repository(&config, Some(store_path))?;
    let syndicator = syndicator(&config, repository, store.clone());

    let report = syndicator.delete_post(post_id, &sites).await;
    if !report.enabled {
        println!("Remote deletion is disabled (settings.delete_pushed_posts)");
        return Ok(());
    }
    save_store(store_path, &store)?;

    let mut failures = 0;
    for (site_id, result) in &report.sites {
        match result {
            DeleteResult::Deleted(remote_id) => println!("{site_id}: deleted remote post {remote_id}"),
            DeleteResult::NotPushed => println!("{site_id}: nothing to delete"),
            DeleteResult::NoTransport => println!("{site_id}: no usable transport"),
            DeleteResult::PullOnly => println!("{site_id}: transport cannot delete"),
            DeleteResult::Failed(e) => {
                failures += 1;
                println!("{site_id}: failed [{}] {}", e.code(), e);
            }
        }
    }
    if failures > 0 {
        bail!("Delete of post {post_id} failed on {failures} site(s)");
    }
    Ok(())
}

async fn test_connection(config: &Path, site: &str) -> Result<()> {
    let config = load_config(config)?;
    let syndicator = syndicator(&config, site_repository(&config, None)?, Arc::new(MemoryStore::new()));
    if syndicator.test_connection(site).await {
        println!("{site}: connection ok");
        Ok(())
    } else {
        bail!("Connection test for site {site:?} failed")
    }
}

fn encrypt_credentials(username: Option<String>, password: Option<String>, token: Option<String>) -> Result<()> {
    let credentials = match (token, username, password) {
        (Some(token), None, None) => SiteCredentials::with_token(token),
        (None, Some(username), Some(password)) => SiteCredentials::with_username_password(username, password),
        _ => bail!("Provide either --token, or both --username and --password"),
    };
    let blob = cipher_from_env()?.seal(&credentials)?;
    println!("{blob}");
    Ok(())
}

fn enable_site(store_path: &Path, site: &str) -> Result<()> {
    let path = site_state_path(store_path);
    let mut states = load_site_states(&path)?;
    match states.remove(site) {
        Some(state) => {
            save_site_states(&path, &states)?;
            tracing::info!(site = %site, ?state, "Cleared site state");
            println!("{site}: cleared {} pull failure(s), enabled as configured", state.pull_failures);
        }
        None => println!("{site}: no saved pull state"),
    }
    Ok(())
}

fn list_sites(config: &Path) -> Result<()> {
    let config = load_config(config)?;
    let descriptors = builtin_descriptors();
    for entry in &config.sites {
        let site = &entry.site;
        let modes = descriptors
            .iter()
            .find(|d| d.client_data.id == site.transport_type)
            .map(|d| {
                d.client_data
                    .modes
                    .iter()
                    .map(|m| format!("{m:?}").to_lowercase())
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .unwrap_or_else(|| "unknown transport".to_string());
        println!(
            "{}\t{}\t{}\t{}\t{}",
            site.site_id,
            site.transport_type,
            modes,
            if site.enabled { "enabled" } else { "disabled" },
            site.groups.join(",")
        );
    }
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Pull { config, store, site } => {
            tracing::info!(command = "pull", "Starting pull");
            pull(&config, &store, site).await
        }
        Commands::Push {
            config,
            store,
            post_id,
            sites,
        } => {
            tracing::info!(command = "push", post_id, "Starting push");
            push(&config, &store, post_id, sites).await
        }
        Commands::Delete {
            config,
            store,
            post_id,
            sites,
        } => {
            tracing::info!(command = "delete", post_id, "Starting remote delete");
            delete(&config, &store, post_id, sites).await
        }
        Commands::TestConnection { config, site } => {
            tracing::info!(command = "test-connection", site = %site, "Testing connection");
            test_connection(&config, &site).await
        }
        Commands::EncryptCredentials {
            username,
            password,
            token,
        } => encrypt_credentials(username, password, token),
        Commands::EnableSite { store, site } => enable_site(&store, &site),
        Commands::ListSites { config } => list_sites(&config),
    }
}
