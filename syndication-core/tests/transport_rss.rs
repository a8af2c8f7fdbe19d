mod common;

use std::sync::Arc;

use common::{context, RecordingHooks};
use syndication_core::error::{codes, TransportError};
use syndication_core::transport::RssTransport;
use syndication_core::wire::MockFeedFetcher;
use syndication_core::{MemoryStore, PullArgs, PullTransport, Settings, SiteConfig, TermStore, Transport};

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Remote blog</title>
    <link>https://feed.example</link>
    <description>Posts from elsewhere</description>
    <item>
      <title>First</title>
      <link>https://feed.example/first</link>
      <guid>https://feed.example/?p=1</guid>
      <pubDate>Tue, 02 Jan 2024 10:00:00 GMT</pubDate>
      <description>First summary</description>
      <content:encoded><![CDATA[<p>First body</p>]]></content:encoded>
      <category>News</category>
      <category>rust</category>
    </item>
    <item>
      <title>Second</title>
      <link>https://feed.example/second</link>
      <guid>https://feed.example/?p=2</guid>
      <pubDate>Wed, 03 Jan 2024 11:30:00 GMT</pubDate>
      <description>Second summary</description>
      <category>news</category>
    </item>
  </channel>
</rss>"#;

fn rss_site(import_categories: bool) -> SiteConfig {
    let mut site = SiteConfig::new("feed-a", "WP_RSS", "https://feed.example/feed");
    site.import.import_categories = import_categories;
    site
}

fn serving(body: &'static str) -> MockFeedFetcher {
    let mut feed = MockFeedFetcher::new();
    feed.expect_fetch()
        .withf(|url| url == "https://feed.example/feed")
        .returning(move |_| Ok(body.as_bytes().to_vec()));
    feed
}

fn transport(
    feed: MockFeedFetcher,
    site: SiteConfig,
    store: &Arc<MemoryStore>,
    hooks: Arc<RecordingHooks>,
    settings: Settings,
) -> RssTransport {
    RssTransport::new(site, Arc::new(feed), context(store, hooks, settings))
}

#[tokio::test]
async fn unreachable_feed_yields_empty_list_and_pull_failure() {
    let mut feed = MockFeedFetcher::new();
    feed.expect_fetch().returning(|_| {
        Err(TransportError::TransportFailure {
            code: codes::RSS_FETCH,
            message: "dns error".into(),
        })
    });
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::new();
    let t = transport(feed, rss_site(false), &store, hooks.clone(), Settings::default());

    let posts = t.pull(PullArgs::default()).await;

    assert!(posts.is_empty());
    assert_eq!(hooks.event_names(), vec!["pull_failure"]);
    assert_eq!(hooks.events()[0].site_id(), "feed-a");
}

#[tokio::test]
async fn unparseable_feed_is_a_pull_failure() {
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::new();
    let t = transport(serving("this is not a feed"), rss_site(false), &store, hooks.clone(), Settings::default());

    assert!(t.pull(PullArgs::default()).await.is_empty());
    assert_eq!(hooks.event_names(), vec!["pull_failure"]);
}

#[tokio::test]
async fn items_map_to_posts_with_import_defaults() {
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::new();
    let settings = Settings {
        gmt_offset_minutes: 120,
        ..Settings::default()
    };
    let t = transport(serving(FEED), rss_site(false), &store, hooks.clone(), settings);

    let posts = t.pull(PullArgs::default()).await;

    assert_eq!(posts.len(), 2);
    let first = &posts[0];
    assert_eq!(first.post_title, "First");
    assert_eq!(first.guid, "https://feed.example/?p=1");
    assert!(first.post_content.contains("First body"));
    assert_eq!(first.post_excerpt, "First summary");
    assert_eq!(first.post_status, "draft");
    assert_eq!(first.post_type, "post");
    assert_eq!(first.comment_status, "open");
    assert_eq!(first.post_date_gmt, "2024-01-02 10:00:00");
    assert_eq!(first.post_date, "2024-01-02 12:00:00");
    assert_eq!(first.remote_id, 0);
    assert!(first.post_category.is_empty());

    // No content:encoded, so the summary stands in.
    assert_eq!(posts[1].post_content, "Second summary");
    assert_eq!(hooks.event_names(), vec!["pull_success"]);
}

#[tokio::test]
async fn categories_resolve_to_existing_tags_or_a_single_new_category() {
    let store = Arc::new(MemoryStore::new());
    let rust_tag = store.create_term("post_tag", "rust").unwrap();
    let t = transport(serving(FEED), rss_site(true), &store, RecordingHooks::new(), Settings::default());

    let first_pull = t.pull(PullArgs::default()).await;
    let second_pull = t.pull(PullArgs::default()).await;

    let categories = store.terms("category");
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].name, "News");
    let news = categories[0].id;

    for posts in [&first_pull, &second_pull] {
        assert_eq!(posts[0].post_category, vec![news]);
        assert_eq!(posts[0].tags_input, vec![rust_tag]);
        assert_eq!(posts[1].post_category, vec![news]);
        assert!(posts[1].tags_input.is_empty());
    }
    assert_eq!(store.terms("post_tag").len(), 1);
}

#[tokio::test]
async fn vetoed_items_are_dropped() {
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::vetoing_titles(&["Second"]);
    let t = transport(serving(FEED), rss_site(false), &store, hooks, Settings::default());

    let posts = t.pull(PullArgs::default()).await;

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post_title, "First");
}

#[tokio::test]
async fn feed_transport_has_no_single_post_access() {
    let store = Arc::new(MemoryStore::new());
    let t = transport(serving(FEED), rss_site(false), &store, RecordingHooks::new(), Settings::default());

    assert!(t.test_connection().await);
    assert!(!t.is_post_exists(1).await);
    assert!(t.get_post(1).await.is_none());
    assert!(t.as_push().is_none());
}
