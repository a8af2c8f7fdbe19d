#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use syndication_core::error::{codes, TransportError};
use syndication_core::hooks::{SyndicationEvent, SyndicationHooks, Verdict};
use syndication_core::post::{Post, PostData};
use syndication_core::wire::{RpcClient, RpcStruct, RpcValue};
use syndication_core::{HostContext, MemoryStore, Settings, SiteConfig};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone, Default)]
pub struct FakeField {
    pub id: u64,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct FakePost {
    pub fields: RpcStruct,
    pub custom_fields: Vec<FakeField>,
}

impl FakePost {
    pub fn title(&self) -> &str {
        self.fields.get("post_title").and_then(RpcValue::as_str).unwrap_or_default()
    }
}

#[derive(Default)]
struct FakeState {
    next_post_id: u64,
    next_field_id: u64,
    posts: BTreeMap<u64, FakePost>,
    calls: Vec<String>,
    offline: bool,
}

/// In-memory WordPress XML-RPC endpoint with `wp.*` custom field semantics:
/// `{id}` deletes a field, `{id, key, value}` edits it, `{key, value}` adds one.
#[derive(Default)]
pub struct FakeWordPress {
    state: Mutex<FakeState>,
}

impl FakeWordPress {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn post(&self, id: u64) -> Option<FakePost> {
        self.state.lock().unwrap().posts.get(&id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().unwrap().posts.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Seeds a remote post, as if authored on the remote site.
    pub fn seed(&self, title: &str, guid: &str) -> u64 {
        let mut fields = RpcStruct::new();
        fields.insert("post_title".into(), title.into());
        fields.insert("post_content".into(), format!("<p>{title}</p>").into());
        fields.insert("post_status".into(), "publish".into());
        fields.insert("post_type".into(), "post".into());
        fields.insert("guid".into(), guid.into());
        fields.insert("post_date_gmt".into(), RpcValue::DateTime("20240301T08:30:00".into()));
        let mut state = self.state.lock().unwrap();
        state.next_post_id += 1;
        let id = state.next_post_id;
        state.posts.insert(
            id,
            FakePost {
                fields,
                custom_fields: Vec::new(),
            },
        );
        id
    }

    /// Deletes a remote post behind the syndicator's back.
    pub fn remove(&self, id: u64) {
        self.state.lock().unwrap().posts.remove(&id);
    }

    /// Overwrites the title of a remote post.
    pub fn retitle(&self, id: u64, title: &str) {
        if let Some(post) = self.state.lock().unwrap().posts.get_mut(&id) {
            post.fields.insert("post_title".into(), title.into());
        }
    }
}

fn fault(code: &'static str, message: &str) -> TransportError {
    TransportError::RemoteRejected {
        code,
        message: message.to_string(),
    }
}

fn apply_custom_fields(state: &mut FakeState, post_id: u64, entries: &[RpcValue]) {
    for entry in entries {
        let id = entry.get("id").and_then(RpcValue::as_u64);
        let key = entry.get("key").and_then(RpcValue::as_str).map(str::to_string);
        let value = entry.get("value").and_then(RpcValue::as_str).unwrap_or_default().to_string();
        match (id, key) {
            (Some(id), None) => {
                if let Some(post) = state.posts.get_mut(&post_id) {
                    post.custom_fields.retain(|f| f.id != id);
                }
            }
            (Some(id), Some(key)) => {
                if let Some(field) = state
                    .posts
                    .get_mut(&post_id)
                    .and_then(|p| p.custom_fields.iter_mut().find(|f| f.id == id))
                {
                    field.key = key;
                    field.value = value;
                }
            }
            (None, Some(key)) => {
                state.next_field_id += 1;
                let id = state.next_field_id;
                if let Some(post) = state.posts.get_mut(&post_id) {
                    post.custom_fields.push(FakeField { id, key, value });
                }
            }
            (None, None) => {}
        }
    }
}

fn record(id: u64, post: &FakePost) -> RpcValue {
    let mut fields = post.fields.clone();
    fields.insert("post_id".into(), id.to_string().into());
    let custom_fields = post
        .custom_fields
        .iter()
        .map(|f| {
            let mut field = RpcStruct::new();
            field.insert("id".into(), f.id.to_string().into());
            field.insert("key".into(), f.key.clone().into());
            field.insert("value".into(), f.value.clone().into());
            RpcValue::Struct(field)
        })
        .collect::<Vec<_>>();
    fields.insert("custom_fields".into(), RpcValue::Array(custom_fields));
    RpcValue::Struct(fields)
}

#[async_trait]
impl RpcClient for FakeWordPress {
    async fn call(&self, method: &str, params: Vec<RpcValue>) -> Result<RpcValue, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        if state.offline {
            return Err(TransportError::TransportFailure {
                code: codes::XMLRPC_HTTP,
                message: "connection refused".into(),
            });
        }
        if method == "system.listMethods" {
            return Ok(RpcValue::Array(vec!["wp.getPost".into(), "wp.newPost".into()]));
        }

        let user = params.get(1).and_then(RpcValue::as_str);
        let pass = params.get(2).and_then(RpcValue::as_str);
        if user != Some(USERNAME) || pass != Some(PASSWORD) {
            return Err(TransportError::AuthFailure {
                code: codes::XMLRPC_FAULT,
                message: "Incorrect username or password.".into(),
            });
        }

        match method {
            "wp.newPost" => {
                let content = params.get(3).and_then(RpcValue::as_struct).cloned().unwrap_or_default();
                state.next_post_id += 1;
                let id = state.next_post_id;
                let mut fields = content.clone();
                fields.remove("custom_fields");
                state.posts.insert(
                    id,
                    FakePost {
                        fields,
                        custom_fields: Vec::new(),
                    },
                );
                if let Some(entries) = content.get("custom_fields").and_then(RpcValue::as_array) {
                    apply_custom_fields(&mut state, id, entries);
                }
                Ok(RpcValue::String(id.to_string()))
            }
            "wp.getPost" => {
                let id = params.get(3).and_then(RpcValue::as_u64).unwrap_or(0);
                match state.posts.get(&id) {
                    Some(post) => Ok(record(id, post)),
                    None => Err(TransportError::NotFound {
                        code: codes::XMLRPC_FAULT,
                        message: "Invalid post ID.".into(),
                    }),
                }
            }
            "wp.editPost" => {
                let id = params.get(3).and_then(RpcValue::as_u64).unwrap_or(0);
                let content = params.get(4).and_then(RpcValue::as_struct).cloned().unwrap_or_default();
                if !state.posts.contains_key(&id) {
                    return Err(fault(codes::XMLRPC_FAULT, "Invalid post ID."));
                }
                if let Some(post) = state.posts.get_mut(&id) {
                    for (key, value) in content.iter().filter(|(k, _)| k.as_str() != "custom_fields") {
                        post.fields.insert(key.clone(), value.clone());
                    }
                }
                if let Some(entries) = content.get("custom_fields").and_then(RpcValue::as_array) {
                    apply_custom_fields(&mut state, id, entries);
                }
                Ok(RpcValue::Bool(true))
            }
            "wp.deletePost" => {
                let id = params.get(3).and_then(RpcValue::as_u64).unwrap_or(0);
                match state.posts.remove(&id) {
                    Some(_) => Ok(RpcValue::Bool(true)),
                    None => Err(fault(codes::XMLRPC_FAULT, "Invalid post ID.")),
                }
            }
            "wp.getPosts" => Ok(RpcValue::Array(
                state.posts.iter().map(|(id, post)| record(*id, post)).collect(),
            )),
            other => Err(fault(codes::XMLRPC_FAULT, &format!("server error. requested method {other} does not exist."))),
        }
    }
}

/// Hooks that record events and veto by configuration.
#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<SyndicationEvent>>,
    pub veto_push: bool,
    pub veto_titles: Vec<String>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn vetoing_push() -> Arc<Self> {
        Arc::new(Self {
            veto_push: true,
            ..Self::default()
        })
    }

    pub fn vetoing_titles(titles: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            veto_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        })
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }

    pub fn events(&self) -> Vec<SyndicationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SyndicationHooks for RecordingHooks {
    fn filter_push(&self, _site: &SiteConfig, post: PostData) -> Verdict<PostData> {
        if self.veto_push {
            Verdict::Skip
        } else {
            Verdict::Proceed(post)
        }
    }

    fn filter_update(&self, _site: &SiteConfig, post: PostData, _remote_id: u64) -> Verdict<PostData> {
        if self.veto_push {
            Verdict::Skip
        } else {
            Verdict::Proceed(post)
        }
    }

    fn filter_pulled_post(&self, _site: &SiteConfig, post: Post) -> Verdict<Post> {
        if self.veto_titles.iter().any(|t| *t == post.post_title) {
            Verdict::Skip
        } else {
            Verdict::Proceed(post)
        }
    }

    fn notify(&self, event: &SyndicationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

pub fn context(store: &Arc<MemoryStore>, hooks: Arc<dyn SyndicationHooks>, settings: Settings) -> HostContext {
    HostContext::new(store.clone(), store.clone(), hooks, settings)
}

pub fn xmlrpc_site(site_id: &str) -> SiteConfig {
    let mut site = SiteConfig::new(site_id, "WP_XMLRPC", "https://remote.example.com");
    site.remote_site_id = 1;
    site
}
