//! WordPress.com-style REST transport (push only).
//!
//! The remote signals failure with an `error` key in the JSON body; HTTP
//! status codes are not consulted. TLS certificate verification is disabled
//! for this transport.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::prepare_push;
use crate::contract::{ClientData, HostContext, Mode, Outcome, PushTransport, Transport};
use crate::credentials::SiteCredentials;
use crate::error::{codes, TransportError};
use crate::post::{to_rest_date, PostData, TAXONOMY_CATEGORY, TAXONOMY_TAG};
use crate::site::SiteConfig;
use crate::wire::{build_http_client, HttpRestClient, RestClient};

pub const CLIENT_DATA: ClientData = ClientData {
    id: "WP_REST",
    modes: &[Mode::Push],
    name: "WordPress.com REST",
};

const GENERIC_FAILURE: &str = "the remote site rejected the request";

pub struct RestTransport {
    site: SiteConfig,
    rest: Arc<dyn RestClient>,
    ctx: HostContext,
}

/// `error` value of a response, unless absent or empty.
fn response_error(response: &Value) -> Option<&Value> {
    response.get("error").filter(|error| match error {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

/// The post `ID` of a response, as a number or a numeric string.
fn response_id(response: &Value) -> Option<u64> {
    match response.get("ID")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

/// Error for a rejected response: the `message` field, else a string
/// `error`, else a generic message.
fn rejected(code: &'static str, response: &Value) -> TransportError {
    let error_kind = response.get("error").and_then(Value::as_str);
    let message = response
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .or(error_kind)
        .unwrap_or(GENERIC_FAILURE)
        .to_string();
    match error_kind {
        Some("unauthorized" | "authorization_required" | "invalid_token") => {
            TransportError::AuthFailure { code, message }
        }
        Some("unknown_post") => TransportError::NotFound { code, message },
        _ => TransportError::RemoteRejected { code, message },
    }
}

impl RestTransport {
    pub fn new(site: SiteConfig, rest: Arc<dyn RestClient>, ctx: HostContext) -> Self {
        Self { site, rest, ctx }
    }

    /// Factory entry point. `None` without a token.
    pub fn build(site: &SiteConfig, credentials: &SiteCredentials, ctx: &HostContext) -> Option<Box<dyn Transport>> {
        let Some(token) = credentials.token() else {
            warn!(site_id = %site.site_id, "REST site has no token");
            return None;
        };
        let client = build_http_client(&ctx.settings, true).ok()?;
        info!(site_id = %site.site_id, remote_site_id = site.remote_site_id, "Built REST transport");
        Some(Box::new(Self::new(
            site.clone(),
            Arc::new(HttpRestClient::new(client, &ctx.settings.rest_api_base, token)),
            ctx.clone(),
        )))
    }

    fn post_path(&self, remote_id: u64) -> String {
        format!("sites/{}/posts/{}/", self.site.remote_site_id, remote_id)
    }

    fn body(&self, data: &PostData, remote_id: Option<u64>) -> Value {
        let join = |taxonomy: &str| self.ctx.posts.term_names(data.local_id, taxonomy).join(",");
        let body = json!({
            "title": data.post_title,
            "content": data.post_content,
            "excerpt": data.post_excerpt,
            "status": data.post_status,
            "password": data.post_password,
            "date": to_rest_date(&data.post_date_gmt),
            "categories": join(TAXONOMY_CATEGORY),
            "tags": join(TAXONOMY_TAG),
        });
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Value::Object(self.ctx.hooks.rewrite_rest_body(&self.site, data, remote_id, body))
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn client_data(&self) -> ClientData {
        CLIENT_DATA
    }

    fn site_id(&self) -> &str {
        &self.site.site_id
    }

    async fn test_connection(&self) -> bool {
        match self.rest.get("me/").await {
            Ok(response) => response_error(&response).is_none(),
            Err(e) => {
                warn!(site_id = %self.site.site_id, error = %e, "REST connection test failed");
                false
            }
        }
    }

    async fn is_post_exists(&self, remote_id: u64) -> bool {
        match self.rest.get(&self.post_path(remote_id)).await {
            Ok(response) => response_error(&response).is_none(),
            Err(_) => false,
        }
    }

    fn as_push(&self) -> Option<&dyn PushTransport> {
        Some(self)
    }
}

#[async_trait]
impl PushTransport for RestTransport {
    async fn push(&self, local_id: u64) -> Result<Outcome<u64>, TransportError> {
        let Some((_, data)) = prepare_push(&self.ctx, &self.site, local_id, None)? else {
            return Ok(Outcome::Skipped);
        };
        let path = format!("sites/{}/posts/new/", self.site.remote_site_id);
        let response = self
            .rest
            .post(&path, self.body(&data, None))
            .await
            .map_err(|e| e.with_code(codes::REST_PUSH_NEW))?;

        if response_error(&response).is_some() {
            return Err(rejected(codes::REST_PUSH_NEW, &response));
        }
        match response_id(&response) {
            Some(remote_id) => {
                info!(site_id = %self.site.site_id, local_id, remote_id, "Pushed post over REST");
                Ok(Outcome::Done(remote_id))
            }
            None => Err(rejected(codes::REST_PUSH_NEW, &response)),
        }
    }

    async fn update(&self, local_id: u64, remote_id: u64) -> Result<Outcome<u64>, TransportError> {
        let Some((_, data)) = prepare_push(&self.ctx, &self.site, local_id, Some(remote_id))? else {
            return Ok(Outcome::Skipped);
        };
        let response = self
            .rest
            .post(&self.post_path(remote_id), self.body(&data, Some(remote_id)))
            .await
            .map_err(|e| e.with_code(codes::REST_PUSH_EDIT))?;

        if response_error(&response).is_some() {
            return Err(rejected(codes::REST_PUSH_EDIT, &response));
        }
        info!(site_id = %self.site.site_id, local_id, remote_id, "Updated post over REST");
        Ok(Outcome::Done(local_id))
    }

    async fn delete(&self, remote_id: u64) -> Result<(), TransportError> {
        let path = format!("{}delete", self.post_path(remote_id));
        let response = self
            .rest
            .post(&path, Value::Object(Map::new()))
            .await
            .map_err(|e| e.with_code(codes::REST_DELETE))?;
        if response_error(&response).is_some() {
            return Err(rejected(codes::REST_DELETE, &response));
        }
        info!(site_id = %self.site.site_id, remote_id, "Deleted remote post over REST");
        Ok(())
    }
}
