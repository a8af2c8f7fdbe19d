//! Extension points for push and pull.
//!
//! A [`SyndicationHooks`] implementation is passed into every transport
//! through [`crate::contract::HostContext`]. Every method has a pass-through
//! default, so an implementor overrides only the points it cares about.

use crate::contract::PullArgs;
use crate::post::{Post, PostData};
use crate::site::SiteConfig;
use crate::wire::RpcStruct;
use serde_json::{Map, Value};

/// Result of a veto-capable hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    Proceed(T),
    Skip,
}

/// Notifications emitted by transports and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyndicationEvent {
    PullSuccess {
        site_id: String,
        count: usize,
    },
    PullFailure {
        site_id: String,
        message: String,
    },
    PushSuccess {
        site_id: String,
        local_id: u64,
        remote_id: u64,
    },
    PushFailure {
        site_id: String,
        local_id: u64,
        code: String,
        message: String,
    },
    SiteDisabled {
        site_id: String,
        failures: u32,
    },
}

impl SyndicationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyndicationEvent::PullSuccess { .. } => "pull_success",
            SyndicationEvent::PullFailure { .. } => "pull_failure",
            SyndicationEvent::PushSuccess { .. } => "push_success",
            SyndicationEvent::PushFailure { .. } => "push_failure",
            SyndicationEvent::SiteDisabled { .. } => "site_disabled",
        }
    }

    pub fn site_id(&self) -> &str {
        match self {
            SyndicationEvent::PullSuccess { site_id, .. }
            | SyndicationEvent::PullFailure { site_id, .. }
            | SyndicationEvent::PushSuccess { site_id, .. }
            | SyndicationEvent::PushFailure { site_id, .. }
            | SyndicationEvent::SiteDisabled { site_id, .. } => site_id,
        }
    }
}

pub trait SyndicationHooks: Send + Sync {
    /// May veto a new push before any network call.
    fn filter_push(&self, _site: &SiteConfig, post: PostData) -> Verdict<PostData> {
        Verdict::Proceed(post)
    }

    /// May veto an update before any network call.
    fn filter_update(&self, _site: &SiteConfig, post: PostData, _remote_id: u64) -> Verdict<PostData> {
        Verdict::Proceed(post)
    }

    /// Rewrites the XML-RPC content struct. `remote_id` is set for updates.
    fn rewrite_xmlrpc_args(
        &self,
        _site: &SiteConfig,
        _post: &PostData,
        _remote_id: Option<u64>,
        args: RpcStruct,
    ) -> RpcStruct {
        args
    }

    /// Rewrites the REST request body. `remote_id` is set for updates.
    fn rewrite_rest_body(
        &self,
        _site: &SiteConfig,
        _post: &PostData,
        _remote_id: Option<u64>,
        body: Map<String, Value>,
    ) -> Map<String, Value> {
        body
    }

    fn filter_pull_args(&self, _site: &SiteConfig, args: PullArgs) -> PullArgs {
        args
    }

    /// May drop or rewrite one pulled post.
    fn filter_pulled_post(&self, _site: &SiteConfig, post: Post) -> Verdict<Post> {
        Verdict::Proceed(post)
    }

    fn notify(&self, _event: &SyndicationEvent) {}
}

/// Hooks that change nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl SyndicationHooks for NoHooks {}
