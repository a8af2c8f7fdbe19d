//! Orchestration of pull, push and remote delete across configured sites.
//!
//! [`Syndicator`] owns a [`TransportFactory`] and drives one site at a time:
//!
//! - **pull**: pulled posts are matched to local posts by the GUID recorded in
//!   `syn_post_guid` meta. New posts are inserted; known posts are updated
//!   only when `update_pulled_posts` is set.
//! - **push**: the remote id of each pushed copy is kept in the local post's
//!   `_syn_remote_id_<site_id>` meta. A recorded id that still exists on the
//!   remote is updated; otherwise the post is pushed anew.
//! - **delete**: removes remote copies when `delete_pushed_posts` is set.
//!
//! Failures are reported per site and never abort the remaining sites.
//! Consecutive pull failures are counted per site; at `max_pull_attempts`
//! the site is disabled and a `site_disabled` event is emitted.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::contract::{HostContext, PullArgs};
use crate::error::TransportError;
use crate::factory::{TransportDescriptor, TransportFactory};
use crate::hooks::{SyndicationEvent, SyndicationHooks, Verdict};
use crate::post::{Post, PostData};
use crate::site::{SiteConfig, SiteRepository};
use crate::store::StoreError;
use crate::transport::is_internal_meta_key;
use crate::wire::RpcStruct;

/// Meta key holding the remote GUID of a pulled post.
pub const META_GUID: &str = "syn_post_guid";
/// Meta key holding the site a pulled post came from.
pub const META_SOURCE_SITE: &str = "syn_source_site_id";

pub fn remote_id_meta_key(site_id: &str) -> String {
    format!("_syn_remote_id_{site_id}")
}

/// Forwards every hook call and remembers which sites reported a pull failure.
struct FailureTap {
    inner: Arc<dyn SyndicationHooks>,
    failed: Mutex<BTreeSet<String>>,
}

impl FailureTap {
    fn new(inner: Arc<dyn SyndicationHooks>) -> Self {
        Self {
            inner,
            failed: Mutex::new(BTreeSet::new()),
        }
    }

    /// Whether `site_id` reported a failure since the last call; clears the mark.
    fn take_failure(&self, site_id: &str) -> bool {
        self.failed.lock().remove(site_id)
    }
}

impl SyndicationHooks for FailureTap {
    fn filter_push(&self, site: &SiteConfig, post: PostData) -> Verdict<PostData> {
        self.inner.filter_push(site, post)
    }

    fn filter_update(&self, site: &SiteConfig, post: PostData, remote_id: u64) -> Verdict<PostData> {
        self.inner.filter_update(site, post, remote_id)
    }

    fn rewrite_xmlrpc_args(
        &self,
        site: &SiteConfig,
        post: &PostData,
        remote_id: Option<u64>,
        args: RpcStruct,
    ) -> RpcStruct {
        self.inner.rewrite_xmlrpc_args(site, post, remote_id, args)
    }

    fn rewrite_rest_body(
        &self,
        site: &SiteConfig,
        post: &PostData,
        remote_id: Option<u64>,
        body: Map<String, Value>,
    ) -> Map<String, Value> {
        self.inner.rewrite_rest_body(site, post, remote_id, body)
    }

    fn filter_pull_args(&self, site: &SiteConfig, args: PullArgs) -> PullArgs {
        self.inner.filter_pull_args(site, args)
    }

    fn filter_pulled_post(&self, site: &SiteConfig, post: Post) -> Verdict<Post> {
        self.inner.filter_pulled_post(site, post)
    }

    fn notify(&self, event: &SyndicationEvent) {
        if let SyndicationEvent::PullFailure { site_id, .. } = event {
            self.failed.lock().insert(site_id.clone());
        }
        self.inner.notify(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullStatus {
    Pulled,
    /// The remote could not be read. `disabled` is set when this failure
    /// tripped the auto-disable threshold.
    Failed { failures: u32, disabled: bool },
    /// Missing, disabled or misconfigured site.
    NoTransport,
    /// The site's transport cannot pull.
    PushOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePullReport {
    pub site_id: String,
    pub status: PullStatus,
    pub inserted: Vec<u64>,
    pub updated: Vec<u64>,
    /// Already imported and left untouched.
    pub unchanged: usize,
    pub errors: Vec<String>,
}

impl SitePullReport {
    fn new(site_id: &str, status: PullStatus) -> Self {
        Self {
            site_id: site_id.to_string(),
            status,
            inserted: Vec::new(),
            updated: Vec::new(),
            unchanged: 0,
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub sites: Vec<SitePullReport>,
}

impl PullReport {
    pub fn inserted(&self) -> usize {
        self.sites.iter().map(|s| s.inserted.len()).sum()
    }

    pub fn updated(&self) -> usize {
        self.sites.iter().map(|s| s.updated.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushResult {
    Created(u64),
    Updated(u64),
    /// Vetoed by a hook.
    Skipped,
    NoTransport,
    /// The site's transport cannot push.
    PullOnly,
    Failed(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitePushReport {
    pub site_id: String,
    pub result: PushResult,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub local_id: u64,
    pub sites: Vec<SitePushReport>,
}

impl PushReport {
    pub fn failures(&self) -> impl Iterator<Item = &SitePushReport> {
        self.sites.iter().filter(|s| matches!(s.result, PushResult::Failed(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted(u64),
    /// No remote copy is recorded for this site.
    NotPushed,
    NoTransport,
    PullOnly,
    Failed(TransportError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub local_id: u64,
    /// False when remote deletion is switched off in the settings.
    pub enabled: bool,
    pub sites: Vec<(String, DeleteResult)>,
}

pub struct Syndicator {
    factory: TransportFactory,
    ctx: HostContext,
    tap: Arc<FailureTap>,
}

impl Syndicator {
    pub fn new(sites: Arc<dyn SiteRepository>, ctx: HostContext) -> Self {
        let tap = Arc::new(FailureTap::new(ctx.hooks.clone()));
        let ctx = ctx.with_hooks(tap.clone());
        Self {
            factory: TransportFactory::new(sites, ctx.clone()),
            ctx,
            tap,
        }
    }

    /// Registers an additional transport type on the underlying factory.
    pub fn register(&mut self, descriptor: TransportDescriptor) {
        self.factory.register(descriptor);
    }

    pub fn factory(&self) -> &TransportFactory {
        &self.factory
    }

    pub async fn test_connection(&self, site_id: &str) -> bool {
        match self.factory.get_transport(site_id) {
            Some(transport) => {
                let ok = transport.test_connection().await;
                info!(site_id, ok, "Tested connection");
                ok
            }
            None => {
                warn!(site_id, "Cannot test connection: no transport for site");
                false
            }
        }
    }

    /// Pulls every enabled site in the configured sitegroups.
    pub async fn pull_sites(&self) -> PullReport {
        let groups = &self.ctx.settings.pull_sitegroups;
        let sites: Vec<SiteConfig> = self
            .factory
            .sites()
            .sites_in_groups(groups)
            .into_iter()
            .filter(|s| s.enabled)
            .collect();
        info!(sites = sites.len(), groups = ?groups, "[PULL] Starting pull run");

        let mut report = PullReport::default();
        for site in sites {
            report.sites.push(self.pull_site(&site.site_id).await);
        }
        info!(inserted = report.inserted(), updated = report.updated(), "[PULL] Pull run finished");
        report
    }

    pub async fn pull_site(&self, site_id: &str) -> SitePullReport {
        let Some(transport) = self.factory.get_transport(site_id) else {
            return SitePullReport::new(site_id, PullStatus::NoTransport);
        };
        let Some(puller) = transport.as_pull() else {
            debug!(site_id, "[PULL] Site transport is push-only");
            return SitePullReport::new(site_id, PullStatus::PushOnly);
        };

        self.tap.take_failure(site_id);
        let posts = puller.pull(PullArgs::from_settings(&self.ctx.settings)).await;
        if self.tap.take_failure(site_id) {
            return SitePullReport::new(site_id, self.record_pull_failure(site_id));
        }
        self.factory.sites().reset_pull_failures(site_id);

        let mut report = SitePullReport::new(site_id, PullStatus::Pulled);
        for post in posts {
            self.import_post(site_id, post, &mut report);
        }
        info!(
            site_id,
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged,
            errors = report.errors.len(),
            "[PULL] Site pulled"
        );
        report
    }

    fn record_pull_failure(&self, site_id: &str) -> PullStatus {
        let sites = self.factory.sites();
        let failures = sites.record_pull_failure(site_id);
        let max = self.ctx.settings.max_pull_attempts;
        let disabled = max > 0 && failures >= max && sites.set_enabled(site_id, false);
        if disabled {
            warn!(site_id, failures, "[PULL] Disabling site after repeated pull failures");
            self.ctx.hooks.notify(&SyndicationEvent::SiteDisabled {
                site_id: site_id.to_string(),
                failures,
            });
        } else {
            warn!(site_id, failures, "[PULL] Pull failed");
        }
        PullStatus::Failed { failures, disabled }
    }

    fn import_post(&self, site_id: &str, mut post: Post, report: &mut SitePullReport) {
        // Remote bookkeeping must not overwrite ours.
        post.meta.retain(|field| !is_internal_meta_key(&field.key));

        let existing = if post.guid.is_empty() {
            None
        } else {
            self.ctx.posts.find_by_meta(META_GUID, &post.guid)
        };

        match existing {
            Some(local_id) if self.ctx.settings.update_pulled_posts => match self.ctx.posts.update_post(local_id, &post) {
                Ok(()) => {
                    debug!(site_id, local_id, guid = %post.guid, "[PULL] Updated pulled post");
                    report.updated.push(local_id);
                }
                Err(e) => {
                    error!(site_id, local_id, error = %e, "[PULL] Could not update pulled post");
                    report.errors.push(e.to_string());
                }
            },
            Some(local_id) => {
                debug!(site_id, local_id, guid = %post.guid, "[PULL] Post already imported");
                report.unchanged += 1;
            }
            None => match self.insert_pulled(site_id, &post) {
                Ok(local_id) => {
                    debug!(site_id, local_id, guid = %post.guid, "[PULL] Inserted pulled post");
                    report.inserted.push(local_id);
                }
                Err(e) => {
                    error!(site_id, guid = %post.guid, error = %e, "[PULL] Could not insert pulled post");
                    report.errors.push(e.to_string());
                }
            },
        }
    }

    fn insert_pulled(&self, site_id: &str, post: &Post) -> Result<u64, StoreError> {
        let local_id = self.ctx.posts.insert_post(post)?;
        if !post.guid.is_empty() {
            self.ctx.posts.set_meta(local_id, META_GUID, &post.guid)?;
        }
        self.ctx.posts.set_meta(local_id, META_SOURCE_SITE, site_id)?;
        Ok(local_id)
    }

    /// Enabled sites whose transport type can push.
    pub fn push_targets(&self) -> Vec<String> {
        self.factory
            .sites()
            .sites()
            .into_iter()
            .filter(|s| s.enabled && self.factory.supports_push(&s.transport_type))
            .map(|s| s.site_id)
            .collect()
    }

    /// Pushes or updates `local_id` on each of `site_ids`.
    pub async fn push_post(&self, local_id: u64, site_ids: &[String]) -> PushReport {
        info!(local_id, sites = site_ids.len(), "[PUSH] Starting push");
        let mut report = PushReport {
            local_id,
            sites: Vec::with_capacity(site_ids.len()),
        };
        for site_id in site_ids {
            let result = self.push_to_site(local_id, site_id).await;
            self.notify_push(local_id, site_id, &result);
            report.sites.push(SitePushReport {
                site_id: site_id.clone(),
                result,
            });
        }
        report
    }

    async fn push_to_site(&self, local_id: u64, site_id: &str) -> PushResult {
        let Some(transport) = self.factory.get_transport(site_id) else {
            return PushResult::NoTransport;
        };
        let Some(pusher) = transport.as_push() else {
            return PushResult::PullOnly;
        };

        let key = remote_id_meta_key(site_id);
        let recorded = self
            .ctx
            .posts
            .get_meta(local_id, &key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|id| *id > 0);

        if let Some(remote_id) = recorded {
            if transport.is_post_exists(remote_id).await {
                return match pusher.update(local_id, remote_id).await {
                    Ok(outcome) => outcome.map(|_| PushResult::Updated(remote_id)).done().unwrap_or(PushResult::Skipped),
                    Err(e) => PushResult::Failed(e),
                };
            }
            info!(site_id, local_id, remote_id, "[PUSH] Recorded remote post is gone, pushing anew");
        }

        match pusher.push(local_id).await {
            Ok(outcome) => match outcome.done() {
                Some(remote_id) => {
                    if let Err(e) = self.ctx.posts.set_meta(local_id, &key, &remote_id.to_string()) {
                        error!(site_id, local_id, remote_id, error = %e, "[PUSH] Could not record remote id");
                    }
                    PushResult::Created(remote_id)
                }
                None => PushResult::Skipped,
            },
            Err(e) => PushResult::Failed(e),
        }
    }

    fn notify_push(&self, local_id: u64, site_id: &str, result: &PushResult) {
        let event = match result {
            PushResult::Created(remote_id) | PushResult::Updated(remote_id) => {
                info!(site_id, local_id, remote_id, "[PUSH] Push succeeded");
                SyndicationEvent::PushSuccess {
                    site_id: site_id.to_string(),
                    local_id,
                    remote_id: *remote_id,
                }
            }
            PushResult::Failed(e) => {
                error!(site_id, local_id, code = e.code(), error = %e, "[PUSH] Push failed");
                SyndicationEvent::PushFailure {
                    site_id: site_id.to_string(),
                    local_id,
                    code: e.code().to_string(),
                    message: e.message(),
                }
            }
            other => {
                debug!(site_id, local_id, result = ?other, "[PUSH] Nothing pushed");
                return;
            }
        };
        self.ctx.hooks.notify(&event);
    }

    /// Deletes the remote copies of `local_id`. With no `site_ids`, every
    /// site that has a recorded copy is targeted.
    pub async fn delete_post(&self, local_id: u64, site_ids: &[String]) -> DeleteReport {
        let mut report = DeleteReport {
            local_id,
            enabled: self.ctx.settings.delete_pushed_posts,
            sites: Vec::new(),
        };
        if !report.enabled {
            info!(local_id, "[DELETE] Remote deletion is disabled");
            return report;
        }

        let targets: Vec<String> = if site_ids.is_empty() {
            self.factory
                .sites()
                .sites()
                .into_iter()
                .map(|s| s.site_id)
                .filter(|id| self.ctx.posts.get_meta(local_id, &remote_id_meta_key(id)).is_some())
                .collect()
        } else {
            site_ids.to_vec()
        };

        for site_id in targets {
            let result = self.delete_from_site(local_id, &site_id).await;
            report.sites.push((site_id, result));
        }
        report
    }

    async fn delete_from_site(&self, local_id: u64, site_id: &str) -> DeleteResult {
        let key = remote_id_meta_key(site_id);
        let Some(remote_id) = self
            .ctx
            .posts
            .get_meta(local_id, &key)
            .and_then(|v| v.trim().parse::<u64>().ok())
        else {
            return DeleteResult::NotPushed;
        };
        let Some(transport) = self.factory.get_transport(site_id) else {
            return DeleteResult::NoTransport;
        };
        let Some(pusher) = transport.as_push() else {
            return DeleteResult::PullOnly;
        };

        match pusher.delete(remote_id).await {
            Ok(()) => {
                if let Err(e) = self.ctx.posts.delete_meta(local_id, &key) {
                    error!(site_id, local_id, error = %e, "[DELETE] Could not clear remote id");
                }
                info!(site_id, local_id, remote_id, "[DELETE] Remote copy deleted");
                DeleteResult::Deleted(remote_id)
            }
            Err(e) => {
                error!(site_id, local_id, remote_id, code = e.code(), error = %e, "[DELETE] Remote delete failed");
                DeleteResult::Failed(e)
            }
        }
    }
}
