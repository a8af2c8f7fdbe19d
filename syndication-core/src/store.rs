//! Local content store: the host's post and taxonomy capabilities.
//!
//! [`PostStore`] and [`TermStore`] are what transports and the orchestrator
//! need from the content system. [`MemoryStore`] implements both and can be
//! serialized to JSON, which is how the CLI persists it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

use crate::post::{or_default, LocalPost, Post, DEFAULT_STATUS, DEFAULT_TYPE, TAXONOMY_CATEGORY, TAXONOMY_TAG};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("post {0} does not exist")]
    PostNotFound(u64),
    #[error("term name must not be empty")]
    EmptyTermName,
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait PostStore: Send + Sync {
    fn get_post(&self, id: u64) -> Option<LocalPost>;

    /// Names of the post's terms in `taxonomy`.
    fn term_names(&self, id: u64, taxonomy: &str) -> Vec<String>;

    /// First post whose meta `key` equals `value`.
    fn find_by_meta(&self, key: &str, value: &str) -> Option<u64>;

    fn insert_post(&self, post: &Post) -> Result<u64, StoreError>;

    fn update_post(&self, id: u64, post: &Post) -> Result<(), StoreError>;

    fn get_meta(&self, id: u64, key: &str) -> Option<String>;

    fn set_meta(&self, id: u64, key: &str, value: &str) -> Result<(), StoreError>;

    fn delete_meta(&self, id: u64, key: &str) -> Result<(), StoreError>;
}

pub trait TermStore: Send + Sync {
    /// Id of the term named `name` in `taxonomy`. Names compare case-insensitively.
    fn find_term(&self, taxonomy: &str, name: &str) -> Option<u64>;

    fn create_term(&self, taxonomy: &str, name: &str) -> Result<u64, StoreError>;

    /// Existing term id, or a newly created one.
    fn ensure_term(&self, taxonomy: &str, name: &str) -> Result<u64, StoreError> {
        match self.find_term(taxonomy, name) {
            Some(id) => Ok(id),
            None => self.create_term(taxonomy, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: String,
    pub name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoreState {
    next_post_id: u64,
    next_term_id: u64,
    posts: BTreeMap<u64, LocalPost>,
    terms: Vec<Term>,
}

impl StoreState {
    fn allocate_post_id(&mut self) -> u64 {
        let floor = self.posts.keys().next_back().copied().unwrap_or(0);
        self.next_post_id = self.next_post_id.max(floor) + 1;
        self.next_post_id
    }

    fn find_term(&self, taxonomy: &str, name: &str) -> Option<u64> {
        let name = name.trim();
        self.terms
            .iter()
            .find(|t| t.taxonomy == taxonomy && t.name.eq_ignore_ascii_case(name))
            .map(|t| t.id)
    }

    fn create_term(&mut self, taxonomy: &str, name: &str) -> Result<u64, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyTermName);
        }
        if let Some(id) = self.find_term(taxonomy, name) {
            return Ok(id);
        }
        let floor = self.terms.iter().map(|t| t.id).max().unwrap_or(0);
        self.next_term_id = self.next_term_id.max(floor) + 1;
        let id = self.next_term_id;
        self.terms.push(Term {
            id,
            taxonomy: taxonomy.to_string(),
            name: name.to_string(),
        });
        debug!(taxonomy, name, id, "Created term");
        Ok(id)
    }

    /// Term ids for a pulled post: explicit category/tag ids plus any term
    /// names the remote reported, created on demand.
    fn resolve_terms(&mut self, post: &Post) -> Result<BTreeMap<String, Vec<u64>>, StoreError> {
        let mut terms: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        if !post.post_category.is_empty() {
            terms.insert(TAXONOMY_CATEGORY.to_string(), post.post_category.clone());
        }
        if !post.tags_input.is_empty() {
            terms.insert(TAXONOMY_TAG.to_string(), post.tags_input.clone());
        }
        for (taxonomy, names) in &post.terms {
            for name in names.iter().filter(|n| !n.trim().is_empty()) {
                let id = self.create_term(taxonomy, name)?;
                let ids = terms.entry(taxonomy.clone()).or_default();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        Ok(terms)
    }

    fn apply(&mut self, target: &mut LocalPost, post: &Post) -> Result<(), StoreError> {
        target.post_title = post.post_title.clone();
        target.post_content = post.post_content.clone();
        target.post_excerpt = post.post_excerpt.clone();
        target.post_status = or_default(&post.post_status, DEFAULT_STATUS);
        target.post_password = post.post_password.clone();
        target.post_date = post.post_date.clone();
        target.post_date_gmt = post.post_date_gmt.clone();
        target.post_type = or_default(&post.post_type, DEFAULT_TYPE);
        target.comment_status = post.comment_status.clone();
        target.ping_status = post.ping_status.clone();
        if !post.guid.is_empty() {
            target.guid = post.guid.clone();
        }
        let terms = self.resolve_terms(post)?;
        if !terms.is_empty() {
            target.terms = terms;
        }
        for field in &post.meta {
            target.meta.insert(field.key.clone(), field.value.clone());
        }
        Ok(())
    }
}

/// In-memory [`PostStore`] + [`TermStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let state: StoreState = serde_json::from_str(json)?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&*self.state.read())?)
    }

    /// Adds a local post as-is, assigning an id when `post.id` is 0.
    pub fn add_post(&self, mut post: LocalPost) -> u64 {
        let mut state = self.state.write();
        if post.id == 0 {
            post.id = state.allocate_post_id();
        }
        let id = post.id;
        state.posts.insert(id, post);
        id
    }

    pub fn post_ids(&self) -> Vec<u64> {
        self.state.read().posts.keys().copied().collect()
    }

    pub fn terms(&self, taxonomy: &str) -> Vec<Term> {
        self.state
            .read()
            .terms
            .iter()
            .filter(|t| t.taxonomy == taxonomy)
            .cloned()
            .collect()
    }
}

impl PostStore for MemoryStore {
    fn get_post(&self, id: u64) -> Option<LocalPost> {
        self.state.read().posts.get(&id).cloned()
    }

    fn term_names(&self, id: u64, taxonomy: &str) -> Vec<String> {
        let state = self.state.read();
        let Some(ids) = state.posts.get(&id).and_then(|p| p.terms.get(taxonomy)) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|term_id| {
                state
                    .terms
                    .iter()
                    .find(|t| t.id == *term_id && t.taxonomy == taxonomy)
                    .map(|t| t.name.clone())
            })
            .collect()
    }

    fn find_by_meta(&self, key: &str, value: &str) -> Option<u64> {
        self.state
            .read()
            .posts
            .values()
            .find(|p| p.meta.get(key).is_some_and(|v| v == value))
            .map(|p| p.id)
    }

    fn insert_post(&self, post: &Post) -> Result<u64, StoreError> {
        let mut state = self.state.write();
        let mut local = LocalPost {
            id: state.allocate_post_id(),
            ..LocalPost::default()
        };
        state.apply(&mut local, post)?;
        let id = local.id;
        state.posts.insert(id, local);
        Ok(id)
    }

    fn update_post(&self, id: u64, post: &Post) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let mut local = state.posts.get(&id).cloned().ok_or(StoreError::PostNotFound(id))?;
        state.apply(&mut local, post)?;
        state.posts.insert(id, local);
        Ok(())
    }

    fn get_meta(&self, id: u64, key: &str) -> Option<String> {
        self.state.read().posts.get(&id).and_then(|p| p.meta.get(key).cloned())
    }

    fn set_meta(&self, id: u64, key: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let post = state.posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;
        post.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_meta(&self, id: u64, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let post = state.posts.get_mut(&id).ok_or(StoreError::PostNotFound(id))?;
        post.meta.remove(key);
        Ok(())
    }
}

impl TermStore for MemoryStore {
    fn find_term(&self, taxonomy: &str, name: &str) -> Option<u64> {
        self.state.read().find_term(taxonomy, name)
    }

    fn create_term(&self, taxonomy: &str, name: &str) -> Result<u64, StoreError> {
        self.state.write().create_term(taxonomy, name)
    }
}
