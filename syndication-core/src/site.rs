//! Site configuration and the repository that holds it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialCipher, CredentialError, SiteCredentials};

/// Defaults applied to posts imported from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportDefaults {
    pub post_type: String,
    pub post_status: String,
    pub comment_status: String,
    pub ping_status: String,
    /// Resolve feed categories into local terms.
    pub import_categories: bool,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            post_type: "post".to_string(),
            post_status: "draft".to_string(),
            comment_status: "open".to_string(),
            ping_status: "open".to_string(),
            import_categories: false,
        }
    }
}

fn enabled_default() -> bool {
    true
}

/// A configured syndication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site_id: String,
    #[serde(default)]
    pub name: String,
    /// Site URL, XML-RPC endpoint or feed URL depending on the transport.
    #[serde(default)]
    pub url: String,
    /// Blog id on the remote (XML-RPC) or numeric site id (REST).
    #[serde(default)]
    pub remote_site_id: u64,
    /// Registry key of the transport, e.g. `WP_XMLRPC`.
    pub transport_type: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Sitegroups this site belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub import: ImportDefaults,
}

impl SiteConfig {
    pub fn new(site_id: impl Into<String>, transport_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            name: String::new(),
            url: url.into(),
            remote_site_id: 0,
            transport_type: transport_type.into(),
            enabled: true,
            groups: Vec::new(),
            import: ImportDefaults::default(),
        }
    }

    pub fn in_any_group(&self, groups: &[String]) -> bool {
        groups.is_empty() || self.groups.iter().any(|g| groups.contains(g))
    }

    pub fn trace_loaded(&self) {
        info!(
            site_id = %self.site_id,
            transport = %self.transport_type,
            url = %self.url,
            enabled = self.enabled,
            "Loaded site"
        );
    }
}

pub trait SiteRepository: Send + Sync {
    fn get_site(&self, site_id: &str) -> Option<SiteConfig>;

    fn sites(&self) -> Vec<SiteConfig>;

    /// Decrypted credentials; empty when none are stored.
    fn credentials(&self, site_id: &str) -> Result<SiteCredentials, CredentialError>;

    /// Returns false when the site does not exist.
    fn set_enabled(&self, site_id: &str, enabled: bool) -> bool;

    /// Increments and returns the consecutive pull failure count.
    fn record_pull_failure(&self, site_id: &str) -> u32;

    fn reset_pull_failures(&self, site_id: &str);

    /// Sites in any of `groups`; every site when `groups` is empty.
    fn sites_in_groups(&self, groups: &[String]) -> Vec<SiteConfig> {
        self.sites().into_iter().filter(|s| s.in_any_group(groups)).collect()
    }
}

/// Pull bookkeeping of a site that outlives one process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteState {
    pub pull_failures: u32,
    /// Disabled after repeated pull failures.
    pub disabled: bool,
}

impl SiteState {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone)]
struct SiteRecord {
    config: SiteConfig,
    credentials: Option<String>,
    pull_failures: u32,
    /// `enabled` as configured, before any runtime toggle.
    configured_enabled: bool,
}

/// [`SiteRepository`] holding sealed credential blobs in memory.
#[derive(Debug)]
pub struct MemorySiteRepository {
    cipher: CredentialCipher,
    records: RwLock<BTreeMap<String, SiteRecord>>,
}

impl MemorySiteRepository {
    pub fn new(cipher: CredentialCipher) -> Self {
        Self {
            cipher,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Adds or replaces a site with an already sealed credentials blob.
    pub fn insert(&self, config: SiteConfig, sealed_credentials: Option<String>) {
        self.records.write().insert(
            config.site_id.clone(),
            SiteRecord {
                configured_enabled: config.enabled,
                config,
                credentials: sealed_credentials,
                pull_failures: 0,
            },
        );
    }

    /// Adds or replaces a site, sealing `credentials` first.
    pub fn insert_with_credentials(
        &self,
        config: SiteConfig,
        credentials: &SiteCredentials,
    ) -> Result<(), CredentialError> {
        let sealed = self.cipher.seal(credentials)?;
        self.insert(config, Some(sealed));
        Ok(())
    }

    pub fn pull_failures(&self, site_id: &str) -> u32 {
        self.records.read().get(site_id).map(|r| r.pull_failures).unwrap_or(0)
    }

    /// State of every site with failures or a runtime disable.
    pub fn site_states(&self) -> BTreeMap<String, SiteState> {
        self.records
            .read()
            .iter()
            .map(|(site_id, record)| {
                let state = SiteState {
                    pull_failures: record.pull_failures,
                    disabled: record.configured_enabled && !record.config.enabled,
                };
                (site_id.clone(), state)
            })
            .filter(|(_, state)| !state.is_clean())
            .collect()
    }

    /// Applies previously saved state. Unknown site ids are ignored.
    pub fn restore_states(&self, states: &BTreeMap<String, SiteState>) {
        let mut records = self.records.write();
        for (site_id, state) in states {
            let Some(record) = records.get_mut(site_id) else {
                debug!(site_id = %site_id, "Ignoring state of unknown site");
                continue;
            };
            record.pull_failures = state.pull_failures;
            if state.disabled {
                record.config.enabled = false;
            }
            debug!(site_id = %site_id, ?state, "Restored site state");
        }
    }
}

impl SiteRepository for MemorySiteRepository {
    fn get_site(&self, site_id: &str) -> Option<SiteConfig> {
        self.records.read().get(site_id).map(|r| r.config.clone())
    }

    fn sites(&self) -> Vec<SiteConfig> {
        self.records.read().values().map(|r| r.config.clone()).collect()
    }

    fn credentials(&self, site_id: &str) -> Result<SiteCredentials, CredentialError> {
        let blob = self.records.read().get(site_id).and_then(|r| r.credentials.clone());
        match blob {
            Some(blob) => self.cipher.open(&blob),
            None => Ok(SiteCredentials::default()),
        }
    }

    fn set_enabled(&self, site_id: &str, enabled: bool) -> bool {
        match self.records.write().get_mut(site_id) {
            Some(record) => {
                record.config.enabled = enabled;
                true
            }
            None => {
                warn!(site_id, "Cannot toggle unknown site");
                false
            }
        }
    }

    fn record_pull_failure(&self, site_id: &str) -> u32 {
        match self.records.write().get_mut(site_id) {
            Some(record) => {
                record.pull_failures += 1;
                record.pull_failures
            }
            None => 0,
        }
    }

    fn reset_pull_failures(&self, site_id: &str) {
        if let Some(record) = self.records.write().get_mut(site_id) {
            record.pull_failures = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repository() -> MemorySiteRepository {
        let repository = MemorySiteRepository::new(CredentialCipher::from_secret("test"));
        repository.insert(SiteConfig::new("feed", "WP_RSS", "https://example.com/feed"), None);
        let mut off = SiteConfig::new("off", "WP_RSS", "https://example.com/off");
        off.enabled = false;
        repository.insert(off, None);
        repository
    }

    #[test]
    fn fresh_sites_have_no_state() {
        assert!(repository().site_states().is_empty());
    }

    #[test]
    fn failures_and_runtime_disable_survive_a_restore() {
        let first = repository();
        first.record_pull_failure("feed");
        first.record_pull_failure("feed");
        first.set_enabled("feed", false);
        let states = first.site_states();
        assert_eq!(
            states.get("feed"),
            Some(&SiteState {
                pull_failures: 2,
                disabled: true
            })
        );
        // Disabled by configuration, not at runtime.
        assert!(!states.contains_key("off"));

        let second = repository();
        second.restore_states(&states);
        assert_eq!(second.pull_failures("feed"), 2);
        assert!(!second.get_site("feed").unwrap().enabled);
    }

    #[test]
    fn restore_ignores_unknown_sites() {
        let repository = repository();
        let mut states = BTreeMap::new();
        states.insert("gone".to_string(), SiteState { pull_failures: 3, disabled: true });
        repository.restore_states(&states);
        assert!(repository.get_site("gone").is_none());
        assert!(repository.site_states().is_empty());
    }
}
