//! The network edge of the transports.
//!
//! Each transport talks to its remote through one of these traits, so the
//! push/pull logic can run against mocks or in-memory fakes in tests:
//!
//! - [`RpcClient`]: XML-RPC method calls ([`HttpRpcClient`] in production)
//! - [`RestClient`]: bearer-authenticated JSON calls ([`HttpRestClient`])
//! - [`FeedFetcher`]: raw feed download ([`HttpFeedFetcher`])

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde_json::Value;

use crate::error::TransportError;

mod http;
mod xmlrpc;

pub use http::{build_http_client, HttpFeedFetcher, HttpRestClient, HttpRpcClient};
pub use xmlrpc::{decode_response, encode_call, RpcDecodeError, RpcStruct, RpcValue};

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Calls `method`; a fault or a failed round trip is an error.
    async fn call(&self, method: &str, params: Vec<RpcValue>) -> Result<RpcValue, TransportError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RestClient: Send + Sync {
    /// GET `path` relative to the API base; the decoded JSON body regardless of status.
    async fn get(&self, path: &str) -> Result<Value, TransportError>;

    /// POST a JSON `body` to `path`; the decoded JSON body regardless of status.
    async fn post(&self, path: &str, body: Value) -> Result<Value, TransportError>;
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}
