//! Loads the YAML configuration and the credential secret.
//!
//! The config file holds settings and sites. Credentials never appear in
//! clear text: each site may carry a sealed `credentials` blob produced by
//! `syndication encrypt-credentials`, opened with the secret read from
//! `SYNDICATION_SECRET_KEY`.
//!
//! ```yaml
//! settings:
//!   gmt_offset_minutes: 60
//!   pull_sitegroups: [news]
//! sites:
//!   - site_id: partner
//!     transport_type: WP_XMLRPC
//!     url: https://partner.example.com
//!     remote_site_id: 1
//!     groups: [news]
//!     credentials: <sealed blob>
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use syndication_core::{CredentialCipher, MemorySiteRepository, Settings, SiteConfig};
use tracing::{error, info};

pub const SECRET_ENV: &str = "SYNDICATION_SECRET_KEY";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub sites: Vec<SiteEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SiteEntry {
    #[serde(flatten)]
    pub site: SiteConfig,
    /// Sealed credentials blob.
    #[serde(default)]
    pub credentials: Option<String>,
}

impl CliConfig {
    /// Site repository over the configured sites, opening credentials with `cipher`.
    pub fn site_repository(&self, cipher: CredentialCipher) -> MemorySiteRepository {
        let repository = MemorySiteRepository::new(cipher);
        for entry in &self.sites {
            repository.insert(entry.site.clone(), entry.credentials.clone());
        }
        repository
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&content) {
        Ok(config) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            config
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut seen = BTreeSet::new();
    for entry in &config.sites {
        if entry.site.site_id.trim().is_empty() {
            bail!("Invalid config: a site has an empty site_id");
        }
        if !seen.insert(entry.site.site_id.as_str()) {
            bail!("Invalid config: duplicate site_id {:?}", entry.site.site_id);
        }
    }

    config.settings.trace_loaded();
    for entry in &config.sites {
        entry.site.trace_loaded();
    }
    Ok(config)
}

/// The credential secret from the environment.
pub fn secret_from_env() -> Result<String> {
    let secret = std::env::var(SECRET_ENV).with_context(|| format!("{SECRET_ENV} must be set"))?;
    if secret.trim().is_empty() {
        bail!("{SECRET_ENV} must not be empty");
    }
    Ok(secret)
}

pub fn cipher_from_env() -> Result<CredentialCipher> {
    Ok(CredentialCipher::from_secret(&secret_from_env()?))
}
