//! reqwest-backed implementations of the wire traits.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, error};

use super::xmlrpc::{decode_response, encode_call, RpcDecodeError, RpcValue};
use super::{FeedFetcher, RestClient, RpcClient};
use crate::config::Settings;
use crate::error::{codes, TransportError};

const AGENT: &str = concat!("syndication/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by one transport instance.
pub fn build_http_client(settings: &Settings, accept_invalid_certs: bool) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(settings.timeout())
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| {
            error!(error = ?e, "Failed to build HTTP client");
            TransportError::TransportFailure {
                code: codes::CLIENT_BUILD,
                message: e.to_string(),
            }
        })
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// XML-RPC over HTTP POST to a fixed endpoint.
pub struct HttpRpcClient {
    client: Client,
    endpoint: String,
}

impl HttpRpcClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, method: &str, params: Vec<RpcValue>) -> Result<RpcValue, TransportError> {
        debug!(endpoint = %self.endpoint, method, "XML-RPC call");
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml")
            .header(USER_AGENT, AGENT)
            .body(encode_call(method, &params))
            .send()
            .await
            .map_err(|e| {
                error!(error = ?e, endpoint = %self.endpoint, method, "XML-RPC request failed");
                TransportError::TransportFailure {
                    code: codes::XMLRPC_HTTP,
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if is_auth_status(status) {
            return Err(TransportError::AuthFailure {
                code: codes::XMLRPC_HTTP,
                message: format!("XML-RPC endpoint answered {status}"),
            });
        }
        if !status.is_success() {
            return Err(TransportError::TransportFailure {
                code: codes::XMLRPC_HTTP,
                message: format!("XML-RPC endpoint answered {status}"),
            });
        }

        let body = response.text().await.map_err(|e| TransportError::TransportFailure {
            code: codes::XMLRPC_HTTP,
            message: e.to_string(),
        })?;

        decode_response(&body).map_err(|e| match e {
            // 403 is WordPress' fault code for bad credentials.
            RpcDecodeError::Fault { code: 403, message } => TransportError::AuthFailure {
                code: codes::XMLRPC_FAULT,
                message,
            },
            RpcDecodeError::Fault { code: 404, message } => TransportError::NotFound {
                code: codes::XMLRPC_FAULT,
                message,
            },
            RpcDecodeError::Fault { message, .. } => TransportError::RemoteRejected {
                code: codes::XMLRPC_FAULT,
                message,
            },
            RpcDecodeError::Malformed(message) => {
                error!(endpoint = %self.endpoint, method, detail = %message, "Malformed XML-RPC response");
                TransportError::ParseFailure {
                    code: codes::XMLRPC_MALFORMED,
                    message,
                }
            }
        })
    }
}

/// Bearer-authenticated JSON API client.
pub struct HttpRestClient {
    client: Client,
    base: String,
    token: String,
}

impl HttpRestClient {
    pub fn new(client: Client, base: &str, token: impl Into<String>) -> Self {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Self {
            client,
            base,
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }

    async fn decode(&self, url: &str, response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        let body = response.text().await.map_err(|e| TransportError::TransportFailure {
            code: codes::REST_HTTP,
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| {
            error!(url, %status, error = ?e, "REST response is not JSON");
            TransportError::ParseFailure {
                code: codes::REST_MALFORMED,
                message: format!("response from {url} ({status}) is not JSON: {e}"),
            }
        })
    }

    fn request_failed(url: &str, e: reqwest::Error) -> TransportError {
        error!(url, error = ?e, "REST request failed");
        TransportError::TransportFailure {
            code: codes::REST_HTTP,
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        let url = self.url(path);
        debug!(url = %url, "REST GET");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(USER_AGENT, AGENT)
            .send()
            .await
            .map_err(|e| Self::request_failed(&url, e))?;
        self.decode(&url, response).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        let url = self.url(path);
        debug!(url = %url, "REST POST");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header(USER_AGENT, AGENT)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::request_failed(&url, e))?;
        self.decode(&url, response).await
    }
}

/// Plain HTTP GET of a feed document.
pub struct HttpFeedFetcher {
    client: Client,
}

impl HttpFeedFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let fetch_failed = |message: String| TransportError::TransportFailure {
            code: codes::RSS_FETCH,
            message,
        };
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, AGENT)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("feed {url} answered {status}")));
        }
        let bytes = response.bytes().await.map_err(|e| fetch_failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
