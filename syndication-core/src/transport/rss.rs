//! RSS/Atom feed transport (pull only). Feeds need no authentication.

use async_trait::async_trait;
use feed_rs::model::{Entry, Feed};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::filter_pulled;
use crate::contract::{ClientData, HostContext, Mode, PullArgs, PullTransport, Transport};
use crate::credentials::SiteCredentials;
use crate::error::{codes, TransportError};
use crate::hooks::SyndicationEvent;
use crate::post::{local_from_utc, Post, DATE_FORMAT, TAXONOMY_CATEGORY, TAXONOMY_TAG};
use crate::site::SiteConfig;
use crate::wire::{build_http_client, FeedFetcher, HttpFeedFetcher};

pub const CLIENT_DATA: ClientData = ClientData {
    id: "WP_RSS",
    modes: &[Mode::Pull],
    name: "RSS / Atom feed",
};

pub struct RssTransport {
    site: SiteConfig,
    feed: Arc<dyn FeedFetcher>,
    ctx: HostContext,
}

impl RssTransport {
    pub fn new(site: SiteConfig, feed: Arc<dyn FeedFetcher>, ctx: HostContext) -> Self {
        Self { site, feed, ctx }
    }

    /// Factory entry point. `None` without a feed URL.
    pub fn build(site: &SiteConfig, _credentials: &SiteCredentials, ctx: &HostContext) -> Option<Box<dyn Transport>> {
        if site.url.trim().is_empty() {
            warn!(site_id = %site.site_id, "RSS site has no feed URL");
            return None;
        }
        let client = build_http_client(&ctx.settings, false).ok()?;
        info!(site_id = %site.site_id, feed_url = %site.url, "Built RSS transport");
        Some(Box::new(Self::new(
            site.clone(),
            Arc::new(HttpFeedFetcher::new(client)),
            ctx.clone(),
        )))
    }

    async fn fetch_feed(&self) -> Result<Feed, TransportError> {
        let bytes = self.feed.fetch(self.site.url.trim()).await?;
        feed_rs::parser::parse(bytes.as_slice()).map_err(|e| TransportError::ParseFailure {
            code: codes::RSS_PARSE,
            message: format!("feed {} could not be parsed: {e}", self.site.url),
        })
    }

    fn entry_to_post(&self, entry: &Entry) -> Post {
        let import = &self.site.import;
        let summary = entry.summary.as_ref().map(|t| t.content.clone());
        let content = entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .or_else(|| summary.clone())
            .unwrap_or_default();

        let published = entry.published.or(entry.updated);
        let offset = self.ctx.settings.gmt_offset();

        let mut post = Post {
            post_title: entry.title.as_ref().map(|t| t.content.clone()).unwrap_or_default(),
            post_content: content,
            post_excerpt: summary.unwrap_or_default(),
            post_status: import.post_status.clone(),
            post_type: import.post_type.clone(),
            comment_status: import.comment_status.clone(),
            ping_status: import.ping_status.clone(),
            post_date: published.map(|d| local_from_utc(&d, offset)).unwrap_or_default(),
            post_date_gmt: published.map(|d| d.format(DATE_FORMAT).to_string()).unwrap_or_default(),
            guid: entry.id.clone(),
            remote_id: 0,
            ..Post::default()
        };

        if import.import_categories {
            self.resolve_categories(entry, &mut post);
        }
        post
    }

    /// Category name lookup order: category, then tag, else a new category.
    fn resolve_categories(&self, entry: &Entry, post: &mut Post) {
        for category in &entry.categories {
            let name = category.label.as_deref().unwrap_or(&category.term).trim();
            if name.is_empty() {
                continue;
            }
            if let Some(id) = self.ctx.terms.find_term(TAXONOMY_CATEGORY, name) {
                push_unique(&mut post.post_category, id);
            } else if let Some(id) = self.ctx.terms.find_term(TAXONOMY_TAG, name) {
                push_unique(&mut post.tags_input, id);
            } else {
                match self.ctx.terms.create_term(TAXONOMY_CATEGORY, name) {
                    Ok(id) => {
                        debug!(site_id = %self.site.site_id, name, id, "Created category for feed item");
                        push_unique(&mut post.post_category, id);
                    }
                    Err(e) => warn!(site_id = %self.site.site_id, name, error = %e, "Could not create category"),
                }
            }
        }
    }
}

fn push_unique(ids: &mut Vec<u64>, id: u64) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[async_trait]
impl Transport for RssTransport {
    fn client_data(&self) -> ClientData {
        CLIENT_DATA
    }

    fn site_id(&self) -> &str {
        &self.site.site_id
    }

    async fn test_connection(&self) -> bool {
        match self.fetch_feed().await {
            Ok(_) => true,
            Err(e) => {
                warn!(site_id = %self.site.site_id, error = %e, "Feed connection test failed");
                false
            }
        }
    }

    /// Feeds have no addressable single post.
    async fn is_post_exists(&self, _remote_id: u64) -> bool {
        false
    }

    fn as_pull(&self) -> Option<&dyn PullTransport> {
        Some(self)
    }
}

#[async_trait]
impl PullTransport for RssTransport {
    async fn pull(&self, args: PullArgs) -> Vec<Post> {
        // Feeds are read whole; the arguments only reach the hook.
        let _args = self.ctx.hooks.filter_pull_args(&self.site, args);

        let feed = match self.fetch_feed().await {
            Ok(feed) => feed,
            Err(e) => {
                error!(site_id = %self.site.site_id, feed_url = %self.site.url, error = %e, "Feed pull failed");
                self.ctx.hooks.notify(&SyndicationEvent::PullFailure {
                    site_id: self.site.site_id.clone(),
                    message: e.message(),
                });
                return Vec::new();
            }
        };

        self.ctx.hooks.notify(&SyndicationEvent::PullSuccess {
            site_id: self.site.site_id.clone(),
            count: feed.entries.len(),
        });
        info!(site_id = %self.site.site_id, count = feed.entries.len(), "Pulled feed");

        let posts = feed.entries.iter().map(|entry| self.entry_to_post(entry)).collect();
        filter_pulled(&self.ctx, &self.site, posts)
    }

    async fn get_post(&self, _remote_id: u64) -> Option<Post> {
        None
    }
}
