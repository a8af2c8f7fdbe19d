//! Built-in transports.
//!
//! | key         | transport             | modes      |
//! |-------------|-----------------------|------------|
//! | `WP_XMLRPC` | [`XmlRpcTransport`]   | push, pull |
//! | `WP_REST`   | [`RestTransport`]     | push       |
//! | `WP_RSS`    | [`RssTransport`]      | pull       |

pub mod rest;
pub mod rss;
pub mod xmlrpc;

pub use rest::RestTransport;
pub use rss::RssTransport;
pub use xmlrpc::XmlRpcTransport;

use crate::contract::HostContext;
use crate::error::TransportError;
use crate::hooks::Verdict;
use crate::post::{LocalPost, Post, PostData};
use crate::site::SiteConfig;
use tracing::info;

/// Keys of custom fields owned by the syndication layer itself.
pub fn is_internal_meta_key(key: &str) -> bool {
    key.starts_with("syn") || key.starts_with("_syn")
}

/// Applies the per-post pull hook, dropping vetoed posts.
pub(crate) fn filter_pulled(ctx: &HostContext, site: &SiteConfig, posts: Vec<Post>) -> Vec<Post> {
    posts
        .into_iter()
        .filter_map(|post| match ctx.hooks.filter_pulled_post(site, post) {
            Verdict::Proceed(post) => Some(post),
            Verdict::Skip => None,
        })
        .collect()
}

/// Loads the local post and runs the push veto. `Ok(None)` means vetoed.
pub(crate) fn prepare_push(
    ctx: &HostContext,
    site: &SiteConfig,
    local_id: u64,
    remote_id: Option<u64>,
) -> Result<Option<(LocalPost, PostData)>, TransportError> {
    let local = ctx
        .posts
        .get_post(local_id)
        .ok_or(TransportError::InvalidPost(local_id))?;
    let data = PostData::from_local(&local);
    let verdict = match remote_id {
        None => ctx.hooks.filter_push(site, data),
        Some(remote_id) => ctx.hooks.filter_update(site, data, remote_id),
    };
    Ok(match verdict {
        Verdict::Proceed(data) => Some((local, data)),
        Verdict::Skip => {
            info!(site_id = %site.site_id, local_id, "Push vetoed by hook");
            None
        }
    })
}
