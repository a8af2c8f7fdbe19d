//! # contract: the transport capability set
//!
//! Every transport implements [`Transport`] (metadata, connection test,
//! existence probe) and one or both of the capability extensions:
//!
//! - [`PullTransport`]: list remote posts and fetch a single one.
//! - [`PushTransport`]: create, update and delete remote posts.
//!
//! A caller holding a `Box<dyn Transport>` asks for a capability with
//! [`Transport::as_pull`] / [`Transport::as_push`]; the static
//! [`ClientData`] answers the same question without building a transport.
//!
//! Transports reach the host content system only through [`HostContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::TransportError;
use crate::hooks::SyndicationHooks;
use crate::post::Post;
use crate::store::{PostStore, TermStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Push,
    Pull,
}

/// Static metadata of a transport type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientData {
    /// Registry key, as stored in a site's `transport_type`.
    pub id: &'static str,
    pub modes: &'static [Mode],
    pub name: &'static str,
}

impl ClientData {
    pub fn supports(&self, mode: Mode) -> bool {
        self.modes.contains(&mode)
    }
}

/// Result of a push-side operation that a hook may veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    /// A hook vetoed the operation; nothing was sent.
    Skipped,
}

impl<T> Outcome<T> {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Skipped => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Done(value) => Outcome::Done(f(value)),
            Outcome::Skipped => Outcome::Skipped,
        }
    }
}

/// Arguments of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullArgs {
    pub number: u32,
    pub offset: u32,
    pub post_type: String,
    pub post_status: String,
}

impl Default for PullArgs {
    fn default() -> Self {
        Self {
            number: 10,
            offset: 0,
            post_type: "post".to_string(),
            post_status: "publish".to_string(),
        }
    }
}

impl PullArgs {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            number: settings.pull_batch_size,
            ..Self::default()
        }
    }
}

/// Host capabilities handed to every transport.
#[derive(Clone)]
pub struct HostContext {
    pub posts: Arc<dyn PostStore>,
    pub terms: Arc<dyn TermStore>,
    pub hooks: Arc<dyn SyndicationHooks>,
    pub settings: Arc<Settings>,
}

impl HostContext {
    pub fn new(
        posts: Arc<dyn PostStore>,
        terms: Arc<dyn TermStore>,
        hooks: Arc<dyn SyndicationHooks>,
        settings: Settings,
    ) -> Self {
        Self {
            posts,
            terms,
            hooks,
            settings: Arc::new(settings),
        }
    }

    pub fn with_hooks(&self, hooks: Arc<dyn SyndicationHooks>) -> Self {
        Self {
            hooks,
            ..self.clone()
        }
    }
}

/// Base capability shared by all transports.
#[async_trait]
pub trait Transport: Send + Sync {
    fn client_data(&self) -> ClientData;

    /// The site this instance is bound to.
    fn site_id(&self) -> &str;

    /// Liveness probe. Never fails; an unreachable remote is `false`.
    async fn test_connection(&self) -> bool;

    async fn is_post_exists(&self, remote_id: u64) -> bool;

    fn as_pull(&self) -> Option<&dyn PullTransport> {
        None
    }

    fn as_push(&self) -> Option<&dyn PushTransport> {
        None
    }
}

#[async_trait]
pub trait PullTransport: Transport {
    /// Pulls and normalizes remote posts. Upstream failures yield an empty
    /// list and a `pull_failure` event.
    async fn pull(&self, args: PullArgs) -> Vec<Post>;

    async fn get_post(&self, remote_id: u64) -> Option<Post>;
}

#[async_trait]
pub trait PushTransport: Transport {
    /// Creates the remote copy of a local post; returns the remote id.
    async fn push(&self, local_id: u64) -> Result<Outcome<u64>, TransportError>;

    /// Updates an existing remote copy; returns the local id.
    async fn update(&self, local_id: u64, remote_id: u64) -> Result<Outcome<u64>, TransportError>;

    async fn delete(&self, remote_id: u64) -> Result<(), TransportError>;
}
