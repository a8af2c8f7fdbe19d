use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_REST_API_BASE: &str = "https://public-api.wordpress.com/rest/v1/";

/// Global syndication settings, shared by every transport and the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Timeout applied to every HTTP round trip.
    pub timeout_secs: u64,
    /// Offset of the local site clock from UTC, used to derive GMT dates.
    pub gmt_offset_minutes: i32,
    /// Number of posts requested per XML-RPC pull.
    pub pull_batch_size: u32,
    /// Whether an already imported post is overwritten on the next pull.
    pub update_pulled_posts: bool,
    /// Consecutive failed pulls after which a site is disabled. 0 disables the check.
    pub max_pull_attempts: u32,
    /// Whether deleting a local post also deletes its remote copies.
    pub delete_pushed_posts: bool,
    /// Custom field keys that are never pushed.
    pub ignored_meta_keys: Vec<String>,
    /// Sitegroups pulled by a bulk pull. Empty means every site.
    pub pull_sitegroups: Vec<String>,
    /// Base URL of the REST API used by the REST transport.
    pub rest_api_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            gmt_offset_minutes: 0,
            pull_batch_size: 10,
            update_pulled_posts: false,
            max_pull_attempts: 0,
            delete_pushed_posts: false,
            ignored_meta_keys: vec![
                "_edit_lock".to_string(),
                "_edit_last".to_string(),
                "_wp_old_slug".to_string(),
            ],
            pull_sitegroups: Vec::new(),
            rest_api_base: DEFAULT_REST_API_BASE.to_string(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The configured site offset; falls back to UTC when out of range.
    pub fn gmt_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.gmt_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }

    pub fn trace_loaded(&self) {
        info!(
            timeout_secs = self.timeout_secs,
            gmt_offset_minutes = self.gmt_offset_minutes,
            pull_sitegroups = self.pull_sitegroups.len(),
            "Loaded Settings"
        );
        debug!(?self, "Settings loaded (full debug)");
    }
}
