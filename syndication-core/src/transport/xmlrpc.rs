//! WordPress XML-RPC transport (push + pull).
//!
//! Every call authenticates with the site's username and password; there is
//! no session. The blog id sent with each call is the site's
//! `remote_site_id`.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{filter_pulled, is_internal_meta_key, prepare_push};
use crate::contract::{ClientData, HostContext, Mode, Outcome, PullArgs, PullTransport, PushTransport, Transport};
use crate::credentials::SiteCredentials;
use crate::error::{codes, TransportError};
use crate::hooks::SyndicationEvent;
use crate::post::{
    from_xmlrpc_date, or_default, resolve_gmt_date, to_xmlrpc_date, CustomField, LocalPost, Post, PostData,
    DEFAULT_STATUS, DEFAULT_TYPE, TAXONOMY_CATEGORY, TAXONOMY_TAG, ZERO_DATE,
};
use crate::site::SiteConfig;
use crate::wire::{build_http_client, HttpRpcClient, RpcClient, RpcStruct, RpcValue};

pub const CLIENT_DATA: ClientData = ClientData {
    id: "WP_XMLRPC",
    modes: &[Mode::Push, Mode::Pull],
    name: "WordPress XML-RPC",
};

/// Endpoint for a site URL: trailing slashes dropped, `/xmlrpc.php` appended
/// unless already present.
pub fn normalize_endpoint(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with("xmlrpc.php") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/xmlrpc.php")
    }
}

pub struct XmlRpcTransport {
    site: SiteConfig,
    username: String,
    password: String,
    rpc: Arc<dyn RpcClient>,
    ctx: HostContext,
}

impl XmlRpcTransport {
    pub fn new(
        site: SiteConfig,
        username: impl Into<String>,
        password: impl Into<String>,
        rpc: Arc<dyn RpcClient>,
        ctx: HostContext,
    ) -> Self {
        Self {
            site,
            username: username.into(),
            password: password.into(),
            rpc,
            ctx,
        }
    }

    /// Factory entry point. `None` without a URL or without username/password.
    pub fn build(site: &SiteConfig, credentials: &SiteCredentials, ctx: &HostContext) -> Option<Box<dyn Transport>> {
        if site.url.trim().is_empty() {
            warn!(site_id = %site.site_id, "XML-RPC site has no URL");
            return None;
        }
        if !credentials.has_username_password() {
            warn!(site_id = %site.site_id, "XML-RPC site has no username/password");
            return None;
        }
        let client = build_http_client(&ctx.settings, false).ok()?;
        let endpoint = normalize_endpoint(&site.url);
        info!(site_id = %site.site_id, endpoint = %endpoint, "Built XML-RPC transport");
        Some(Box::new(Self::new(
            site.clone(),
            credentials.username().unwrap_or_default(),
            credentials.password().unwrap_or_default(),
            Arc::new(HttpRpcClient::new(client, endpoint)),
            ctx.clone(),
        )))
    }

    fn auth_params(&self) -> Vec<RpcValue> {
        vec![
            RpcValue::Int(self.site.remote_site_id as i64),
            RpcValue::String(self.username.clone()),
            RpcValue::String(self.password.clone()),
        ]
    }

    async fn fetch_remote(&self, remote_id: u64) -> Result<RpcStruct, TransportError> {
        let mut params = self.auth_params();
        params.push(RpcValue::Int(remote_id as i64));
        let value = self.rpc.call("wp.getPost", params).await?;
        match value {
            RpcValue::Struct(record) if record.contains_key("post_id") => Ok(record),
            _ => Err(TransportError::NotFound {
                code: codes::XMLRPC_MALFORMED,
                message: format!("wp.getPost returned no record for post {remote_id}"),
            }),
        }
    }

    fn content_struct(&self, local: &LocalPost, data: &PostData) -> RpcStruct {
        let gmt = resolve_gmt_date(&data.post_date, &data.post_date_gmt, self.ctx.settings.gmt_offset());
        let mut args = RpcStruct::new();
        args.insert("post_title".into(), data.post_title.clone().into());
        args.insert("post_content".into(), data.post_content.clone().into());
        args.insert("post_excerpt".into(), data.post_excerpt.clone().into());
        args.insert("post_status".into(), data.post_status.clone().into());
        args.insert("post_type".into(), data.post_type.clone().into());
        args.insert("post_password".into(), data.post_password.clone().into());
        args.insert("post_date_gmt".into(), RpcValue::DateTime(to_xmlrpc_date(&gmt)));
        args.insert("terms_names".into(), self.terms_names(local.id));
        args
    }

    fn terms_names(&self, local_id: u64) -> RpcValue {
        let mut terms = RpcStruct::new();
        for taxonomy in [TAXONOMY_CATEGORY, TAXONOMY_TAG] {
            let names = self.ctx.posts.term_names(local_id, taxonomy);
            if !names.is_empty() {
                terms.insert(
                    taxonomy.to_string(),
                    RpcValue::Array(names.into_iter().map(RpcValue::String).collect()),
                );
            }
        }
        RpcValue::Struct(terms)
    }

    fn is_syndicated_meta(&self, key: &str) -> bool {
        !is_internal_meta_key(key) && !self.ctx.settings.ignored_meta_keys.iter().any(|k| k == key)
    }

    /// `{key, value}` entries for every custom field that may leave the site.
    fn custom_fields(&self, local: &LocalPost) -> Vec<RpcValue> {
        local
            .meta
            .iter()
            .filter(|(key, _)| self.is_syndicated_meta(key))
            .map(|(key, value)| {
                let mut field = RpcStruct::new();
                field.insert("key".into(), key.clone().into());
                field.insert("value".into(), value.clone().into());
                RpcValue::Struct(field)
            })
            .collect()
    }

    fn finish_args(&self, data: &PostData, remote_id: Option<u64>, args: RpcStruct) -> RpcStruct {
        let args = self.ctx.hooks.rewrite_xmlrpc_args(&self.site, data, remote_id, args);
        debug!(site_id = %self.site.site_id, fields = ?args.keys().collect::<Vec<_>>(), "XML-RPC content struct");
        args
    }

    fn pull_failed(&self, message: String) -> Vec<Post> {
        error!(site_id = %self.site.site_id, detail = %message, "XML-RPC pull failed");
        self.ctx.hooks.notify(&SyndicationEvent::PullFailure {
            site_id: self.site.site_id.clone(),
            message,
        });
        Vec::new()
    }
}

fn string_field(record: &RpcStruct, key: &str) -> String {
    record.get(key).and_then(RpcValue::as_str).unwrap_or_default().to_string()
}

fn date_field(record: &RpcStruct, key: &str) -> String {
    match record.get(key) {
        Some(RpcValue::DateTime(raw)) => from_xmlrpc_date(raw),
        Some(RpcValue::String(raw)) if !raw.is_empty() => from_xmlrpc_date(raw),
        _ => ZERO_DATE.to_string(),
    }
}

/// Normalizes a `wp.getPost(s)` record, filling defaults for absent fields.
pub fn normalize_record(record: &RpcStruct) -> Post {
    let mut terms: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for term in record.get("terms").and_then(RpcValue::as_array).unwrap_or_default() {
        let taxonomy = term.get("taxonomy").and_then(RpcValue::as_str);
        let name = term.get("name").and_then(RpcValue::as_str);
        if let (Some(taxonomy), Some(name)) = (taxonomy, name) {
            terms.entry(taxonomy.to_string()).or_default().push(name.to_string());
        }
    }

    let meta = record
        .get("custom_fields")
        .and_then(RpcValue::as_array)
        .unwrap_or_default()
        .iter()
        .filter_map(|field| {
            let key = field.get("key").and_then(RpcValue::as_str)?;
            Some(CustomField {
                id: field.get("id").and_then(RpcValue::as_i64).map(|id| id.to_string()),
                key: key.to_string(),
                value: field.get("value").and_then(RpcValue::as_str).unwrap_or_default().to_string(),
            })
        })
        .collect();

    let guid = [string_field(record, "guid"), string_field(record, "link")]
        .into_iter()
        .find(|g| !g.is_empty())
        .unwrap_or_default();

    Post {
        post_title: string_field(record, "post_title"),
        post_content: string_field(record, "post_content"),
        post_excerpt: string_field(record, "post_excerpt"),
        post_status: or_default(&string_field(record, "post_status"), DEFAULT_STATUS),
        post_password: string_field(record, "post_password"),
        post_date: date_field(record, "post_date"),
        post_date_gmt: date_field(record, "post_date_gmt"),
        post_type: or_default(&string_field(record, "post_type"), DEFAULT_TYPE),
        comment_status: string_field(record, "comment_status"),
        ping_status: string_field(record, "ping_status"),
        remote_id: record.get("post_id").and_then(RpcValue::as_u64).unwrap_or(0),
        guid,
        post_category: Vec::new(),
        tags_input: Vec::new(),
        terms,
        meta,
    }
}

#[async_trait]
impl Transport for XmlRpcTransport {
    fn client_data(&self) -> ClientData {
        CLIENT_DATA
    }

    fn site_id(&self) -> &str {
        &self.site.site_id
    }

    async fn test_connection(&self) -> bool {
        match self.rpc.call("system.listMethods", Vec::new()).await {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                warn!(site_id = %self.site.site_id, error = %e, "XML-RPC connection test failed");
                false
            }
        }
    }

    async fn is_post_exists(&self, remote_id: u64) -> bool {
        self.fetch_remote(remote_id).await.is_ok()
    }

    fn as_pull(&self) -> Option<&dyn PullTransport> {
        Some(self)
    }

    fn as_push(&self) -> Option<&dyn PushTransport> {
        Some(self)
    }
}

#[async_trait]
impl PushTransport for XmlRpcTransport {
    async fn push(&self, local_id: u64) -> Result<Outcome<u64>, TransportError> {
        let Some((local, data)) = prepare_push(&self.ctx, &self.site, local_id, None)? else {
            return Ok(Outcome::Skipped);
        };

        let mut args = self.content_struct(&local, &data);
        args.insert("custom_fields".into(), RpcValue::Array(self.custom_fields(&local)));
        let args = self.finish_args(&data, None, args);

        let mut params = self.auth_params();
        params.push(RpcValue::Struct(args));
        let result = self
            .rpc
            .call("wp.newPost", params)
            .await
            .map_err(|e| e.with_code(codes::XMLRPC_PUSH_NEW))?;

        match result.as_u64().filter(|id| *id > 0) {
            Some(remote_id) => {
                info!(site_id = %self.site.site_id, local_id, remote_id, "Pushed post over XML-RPC");
                Ok(Outcome::Done(remote_id))
            }
            None => Err(TransportError::RemoteRejected {
                code: codes::XMLRPC_PUSH_NEW,
                message: format!("wp.newPost returned no post id: {result:?}"),
            }),
        }
    }

    async fn update(&self, local_id: u64, remote_id: u64) -> Result<Outcome<u64>, TransportError> {
        let Some((local, data)) = prepare_push(&self.ctx, &self.site, local_id, Some(remote_id))? else {
            return Ok(Outcome::Skipped);
        };

        // Existing remote fields are deleted by sending their id alone, then
        // the current set is added, so repeated syncs never leave duplicates.
        let existing = self
            .fetch_remote(remote_id)
            .await
            .map_err(|e| e.with_code(codes::XMLRPC_PUSH_EDIT))?;
        let mut fields: Vec<RpcValue> = existing
            .get("custom_fields")
            .and_then(RpcValue::as_array)
            .unwrap_or_default()
            .iter()
            .filter_map(|field| field.get("id").cloned())
            .map(|id| {
                let mut marker = RpcStruct::new();
                marker.insert("id".into(), id);
                RpcValue::Struct(marker)
            })
            .collect();
        fields.extend(self.custom_fields(&local));

        let mut args = self.content_struct(&local, &data);
        args.insert("custom_fields".into(), RpcValue::Array(fields));
        let args = self.finish_args(&data, Some(remote_id), args);

        let mut params = self.auth_params();
        params.push(RpcValue::Int(remote_id as i64));
        params.push(RpcValue::Struct(args));
        let result = self
            .rpc
            .call("wp.editPost", params)
            .await
            .map_err(|e| e.with_code(codes::XMLRPC_PUSH_EDIT))?;

        if !result.is_truthy() {
            return Err(TransportError::RemoteRejected {
                code: codes::XMLRPC_PUSH_EDIT,
                message: format!("wp.editPost did not confirm the update of post {remote_id}"),
            });
        }
        info!(site_id = %self.site.site_id, local_id, remote_id, "Updated post over XML-RPC");
        Ok(Outcome::Done(local_id))
    }

    async fn delete(&self, remote_id: u64) -> Result<(), TransportError> {
        let mut params = self.auth_params();
        params.push(RpcValue::Int(remote_id as i64));
        let result = self
            .rpc
            .call("wp.deletePost", params)
            .await
            .map_err(|e| e.with_code(codes::XMLRPC_DELETE))?;
        if !result.is_truthy() {
            return Err(TransportError::RemoteRejected {
                code: codes::XMLRPC_DELETE,
                message: format!("wp.deletePost did not confirm the deletion of post {remote_id}"),
            });
        }
        info!(site_id = %self.site.site_id, remote_id, "Deleted remote post over XML-RPC");
        Ok(())
    }
}

#[async_trait]
impl PullTransport for XmlRpcTransport {
    async fn pull(&self, args: PullArgs) -> Vec<Post> {
        let args = self.ctx.hooks.filter_pull_args(&self.site, args);
        let mut filter = RpcStruct::new();
        filter.insert("number".into(), RpcValue::Int(i64::from(args.number)));
        filter.insert("offset".into(), RpcValue::Int(i64::from(args.offset)));
        filter.insert("post_type".into(), args.post_type.clone().into());
        filter.insert("post_status".into(), args.post_status.clone().into());

        let mut params = self.auth_params();
        params.push(RpcValue::Struct(filter));
        let records = match self.rpc.call("wp.getPosts", params).await {
            Ok(RpcValue::Array(records)) => records,
            Ok(other) => return self.pull_failed(format!("wp.getPosts returned a non-list value: {other:?}")),
            Err(e) => return self.pull_failed(e.message()),
        };

        self.ctx.hooks.notify(&SyndicationEvent::PullSuccess {
            site_id: self.site.site_id.clone(),
            count: records.len(),
        });
        info!(site_id = %self.site.site_id, count = records.len(), "Pulled posts over XML-RPC");

        let posts = records
            .iter()
            .filter_map(RpcValue::as_struct)
            .map(normalize_record)
            .collect();
        filter_pulled(&self.ctx, &self.site, posts)
    }

    async fn get_post(&self, remote_id: u64) -> Option<Post> {
        match self.fetch_remote(remote_id).await {
            Ok(record) => Some(normalize_record(&record)),
            Err(e) => {
                debug!(site_id = %self.site.site_id, remote_id, error = %e, "wp.getPost failed");
                None
            }
        }
    }
}
