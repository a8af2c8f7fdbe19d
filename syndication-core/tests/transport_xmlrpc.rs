mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{context, xmlrpc_site, FakeWordPress, RecordingHooks, PASSWORD, USERNAME};
use syndication_core::error::TransportError;
use syndication_core::hooks::SyndicationEvent;
use syndication_core::post::{LocalPost, ZERO_DATE};
use syndication_core::transport::xmlrpc::{normalize_endpoint, normalize_record};
use syndication_core::transport::XmlRpcTransport;
use syndication_core::wire::{MockRpcClient, RpcClient, RpcStruct, RpcValue};
use syndication_core::{MemoryStore, NoHooks, Outcome, PostStore, PullArgs, PullTransport, PushTransport, Settings, TermStore, Transport};

fn transport_with(
    rpc: Arc<dyn RpcClient>,
    store: &Arc<MemoryStore>,
    hooks: Arc<RecordingHooks>,
    settings: Settings,
) -> XmlRpcTransport {
    XmlRpcTransport::new(
        xmlrpc_site("remote-a"),
        USERNAME,
        PASSWORD,
        rpc,
        context(store, hooks, settings),
    )
}

fn local_post(title: &str) -> LocalPost {
    LocalPost {
        post_title: title.to_string(),
        post_content: "Body text".to_string(),
        post_status: "publish".to_string(),
        post_date: "2024-01-02 10:00:00".to_string(),
        post_date_gmt: "2024-01-02 10:00:00".to_string(),
        ..LocalPost::default()
    }
}

#[tokio::test]
async fn push_creates_remote_post_and_returns_positive_id() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(local_post("Test Post"));
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());

    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    assert!(remote_id > 0);
    assert_eq!(fake.post(remote_id).unwrap().title(), "Test Post");
    assert_eq!(fake.calls(), vec!["wp.newPost".to_string()]);
}

#[tokio::test]
async fn push_sends_term_names_and_syndicated_custom_fields_only() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let news = store.create_term("category", "News").unwrap();
    let mut post = local_post("With terms");
    post.terms.insert("category".into(), vec![news]);
    post.meta.insert("color".into(), "blue".into());
    post.meta.insert("_edit_lock".into(), "1700000000:1".into());
    post.meta.insert("_syn_remote_id_other".into(), "7".into());
    let local_id = store.add_post(post);
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());

    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    let remote = fake.post(remote_id).unwrap();
    let keys: Vec<&str> = remote.custom_fields.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["color"]);
    let terms = remote.fields.get("terms_names").and_then(|t| t.get("category")).cloned();
    assert_eq!(terms, Some(RpcValue::Array(vec!["News".into()])));
}

#[tokio::test]
async fn update_with_no_custom_fields_deletes_every_remote_field() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let mut post = local_post("Fields then none");
    post.meta.insert("color".into(), "blue".into());
    post.meta.insert("size".into(), "large".into());
    let local_id = store.add_post(post);
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());
    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();
    assert_eq!(fake.post(remote_id).unwrap().custom_fields.len(), 2);

    let mut cleared = store.get_post(local_id).unwrap();
    cleared.meta.clear();
    store.add_post(cleared);
    let outcome = transport.update(local_id, remote_id).await.unwrap();

    assert_eq!(outcome, Outcome::Done(local_id));
    assert!(fake.post(remote_id).unwrap().custom_fields.is_empty());
}

#[tokio::test]
async fn repeated_updates_replace_custom_fields_instead_of_duplicating() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let mut post = local_post("Fields");
    post.meta.insert("color".into(), "blue".into());
    let local_id = store.add_post(post);
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());
    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    transport.update(local_id, remote_id).await.unwrap();
    transport.update(local_id, remote_id).await.unwrap();

    let fields = fake.post(remote_id).unwrap().custom_fields;
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].key, "color");
    assert_eq!(fields[0].value, "blue");
}

#[tokio::test]
async fn update_of_missing_remote_post_fails_with_edit_code() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(local_post("Orphan"));
    let transport = transport_with(fake, &store, RecordingHooks::new(), Settings::default());

    let err = transport.update(local_id, 404).await.unwrap_err();

    assert_eq!(err.code(), "xmlrpc-push-edit-fail");
}

#[tokio::test]
async fn gmt_date_is_derived_from_local_date_and_offset() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(LocalPost {
        post_title: "Dated".into(),
        post_date: "2024-01-02 10:00:00".into(),
        post_date_gmt: ZERO_DATE.into(),
        ..LocalPost::default()
    });
    let settings = Settings {
        gmt_offset_minutes: 60,
        ..Settings::default()
    };
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), settings);

    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    assert_eq!(
        fake.post(remote_id).unwrap().fields.get("post_date_gmt"),
        Some(&RpcValue::DateTime("20240102T09:00:00".into()))
    );
}

#[tokio::test]
async fn zero_dates_are_sent_as_the_zero_sentinel() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(LocalPost {
        post_title: "Undated".into(),
        ..LocalPost::default()
    });
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());

    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    assert_eq!(
        fake.post(remote_id).unwrap().fields.get("post_date_gmt"),
        Some(&RpcValue::DateTime("00000000T00:00:00".into()))
    );
}

#[tokio::test]
async fn push_of_unknown_local_post_is_invalid_post_without_network_call() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());

    let err = transport.push(99).await.unwrap_err();

    assert_eq!(err, TransportError::InvalidPost(99));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn vetoed_push_and_update_make_no_remote_call() {
    let mut rpc = MockRpcClient::new();
    rpc.expect_call().times(0);
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(local_post("Vetoed"));
    let transport = transport_with(Arc::new(rpc), &store, RecordingHooks::vetoing_push(), Settings::default());

    assert_eq!(transport.push(local_id).await.unwrap(), Outcome::Skipped);
    assert_eq!(transport.update(local_id, 5).await.unwrap(), Outcome::Skipped);
}

#[tokio::test]
async fn bad_credentials_surface_as_auth_failure_with_operation_code() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(local_post("Locked out"));
    let transport = XmlRpcTransport::new(
        xmlrpc_site("remote-a"),
        USERNAME,
        "wrong",
        fake,
        context(&store, Arc::new(NoHooks), Settings::default()),
    );

    let err = transport.push(local_id).await.unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(err.code(), "xmlrpc-push-new-fail");
}

#[tokio::test]
async fn delete_removes_the_remote_post() {
    let fake = FakeWordPress::new();
    let store = Arc::new(MemoryStore::new());
    let local_id = store.add_post(local_post("Short lived"));
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());
    let remote_id = transport.push(local_id).await.unwrap().done().unwrap();

    transport.delete(remote_id).await.unwrap();

    assert!(fake.post(remote_id).is_none());
    assert_eq!(transport.delete(remote_id).await.unwrap_err().code(), "xmlrpc-delete-fail");
}

#[tokio::test]
async fn existence_probe_and_connection_test() {
    let fake = FakeWordPress::new();
    let remote_id = fake.seed("Existing", "https://remote.example.com/?p=1");
    let store = Arc::new(MemoryStore::new());
    let transport = transport_with(fake.clone(), &store, RecordingHooks::new(), Settings::default());

    assert!(transport.test_connection().await);
    assert!(transport.is_post_exists(remote_id).await);
    assert!(!transport.is_post_exists(999).await);

    fake.set_offline(true);
    assert!(!transport.test_connection().await);
}

#[tokio::test]
async fn pull_normalizes_posts_and_applies_per_post_veto() {
    let fake = FakeWordPress::new();
    let kept = fake.seed("Hello world", "https://remote.example.com/?p=1");
    fake.seed("Draft thoughts", "https://remote.example.com/?p=2");
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::vetoing_titles(&["Draft thoughts"]);
    let transport = transport_with(fake, &store, hooks.clone(), Settings::default());

    let posts = transport.pull(PullArgs::default()).await;

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].post_title, "Hello world");
    assert_eq!(posts[0].remote_id, kept);
    assert_eq!(posts[0].guid, "https://remote.example.com/?p=1");
    assert_eq!(posts[0].post_date_gmt, "2024-03-01 08:30:00");
    assert_eq!(
        hooks.events(),
        vec![SyndicationEvent::PullSuccess {
            site_id: "remote-a".into(),
            count: 2
        }]
    );
}

#[tokio::test]
async fn failed_pull_returns_empty_list_and_emits_pull_failure() {
    let fake = FakeWordPress::new();
    fake.seed("Unreachable", "urn:1");
    fake.set_offline(true);
    let store = Arc::new(MemoryStore::new());
    let hooks = RecordingHooks::new();
    let transport = transport_with(fake, &store, hooks.clone(), Settings::default());

    let posts = transport.pull(PullArgs::default()).await;

    assert!(posts.is_empty());
    assert_eq!(hooks.event_names(), vec!["pull_failure"]);
}

#[tokio::test]
async fn get_post_returns_normalized_record_or_none() {
    let fake = FakeWordPress::new();
    let remote_id = fake.seed("Single", "urn:single");
    let store = Arc::new(MemoryStore::new());
    let transport = transport_with(fake, &store, RecordingHooks::new(), Settings::default());

    let post = transport.get_post(remote_id).await.unwrap();
    assert_eq!(post.post_title, "Single");
    assert!(transport.get_post(remote_id + 1).await.is_none());
}

#[test]
fn normalize_record_fills_defaults_for_absent_fields() {
    let post = normalize_record(&RpcStruct::new());

    assert_eq!(post.post_status, "draft");
    assert_eq!(post.post_type, "post");
    assert_eq!(post.post_date, ZERO_DATE);
    assert_eq!(post.post_date_gmt, ZERO_DATE);
    assert_eq!(post.remote_id, 0);
    assert!(post.post_title.is_empty());
    assert!(post.meta.is_empty());
}

#[test]
fn normalize_record_groups_terms_by_taxonomy() {
    let term = |taxonomy: &str, name: &str| {
        let mut t = RpcStruct::new();
        t.insert("taxonomy".into(), taxonomy.into());
        t.insert("name".into(), name.into());
        RpcValue::Struct(t)
    };
    let mut record = RpcStruct::new();
    record.insert("post_id".into(), "12".into());
    record.insert(
        "terms".into(),
        RpcValue::Array(vec![term("category", "News"), term("post_tag", "rust"), term("category", "Tech")]),
    );

    let post = normalize_record(&record);

    let mut expected = BTreeMap::new();
    expected.insert("category".to_string(), vec!["News".to_string(), "Tech".to_string()]);
    expected.insert("post_tag".to_string(), vec!["rust".to_string()]);
    assert_eq!(post.terms, expected);
    assert_eq!(post.remote_id, 12);
}

#[test]
fn endpoint_normalization() {
    assert_eq!(normalize_endpoint("https://a.example/"), "https://a.example/xmlrpc.php");
    assert_eq!(normalize_endpoint("https://a.example/xmlrpc.php"), "https://a.example/xmlrpc.php");
}
