//! The local content store persisted as a JSON file between runs, and the
//! site state file kept next to it.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use syndication_core::{MemoryStore, SiteState};
use tracing::info;

/// Reads the store at `path`; a missing file is an empty store.
pub fn load_store(path: &Path) -> Result<MemoryStore> {
    if !path.exists() {
        info!(store_path = ?path, "Store file does not exist, starting empty");
        return Ok(MemoryStore::new());
    }
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read store {path:?}"))?;
    let store = MemoryStore::from_json(&json).with_context(|| format!("Failed to parse store {path:?}"))?;
    info!(store_path = ?path, posts = store.post_ids().len(), "Loaded store");
    Ok(store)
}

pub fn save_store(path: &Path, store: &MemoryStore) -> Result<()> {
    let json = store.to_json()?;
    fs::write(path, json).with_context(|| format!("Failed to write store {path:?}"))?;
    info!(store_path = ?path, "Saved store");
    Ok(())
}

/// `store.json` keeps its site state in `store.sites.json`.
pub fn site_state_path(store_path: &Path) -> PathBuf {
    store_path.with_extension("sites.json")
}

/// Pull failure counts and runtime disables by site id; empty when the file is missing.
pub fn load_site_states(path: &Path) -> Result<BTreeMap<String, SiteState>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read site state {path:?}"))?;
    let states: BTreeMap<String, SiteState> =
        serde_json::from_str(&json).with_context(|| format!("Failed to parse site state {path:?}"))?;
    info!(state_path = ?path, sites = states.len(), "Loaded site state");
    Ok(states)
}

pub fn save_site_states(path: &Path, states: &BTreeMap<String, SiteState>) -> Result<()> {
    let json = serde_json::to_string_pretty(states)?;
    fs::write(path, json).with_context(|| format!("Failed to write site state {path:?}"))?;
    info!(state_path = ?path, sites = states.len(), "Saved site state");
    Ok(())
}
