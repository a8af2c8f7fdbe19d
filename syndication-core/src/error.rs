//! Structured errors returned by transports.
//!
//! Expected remote failures (bad credentials, HTTP errors, malformed bodies,
//! application-level error payloads) are values of [`TransportError`]; they
//! are never panics. A veto from a hook is not an error, see
//! [`crate::contract::Outcome::Skipped`].

use thiserror::Error;

/// Machine-readable error codes.
pub mod codes {
    pub const INVALID_POST: &str = "syndication-invalid-post";

    pub const XMLRPC_HTTP: &str = "xmlrpc-http-error";
    pub const XMLRPC_FAULT: &str = "xmlrpc-fault";
    pub const XMLRPC_MALFORMED: &str = "xmlrpc-malformed-response";
    pub const XMLRPC_PUSH_NEW: &str = "xmlrpc-push-new-fail";
    pub const XMLRPC_PUSH_EDIT: &str = "xmlrpc-push-edit-fail";
    pub const XMLRPC_DELETE: &str = "xmlrpc-delete-fail";

    pub const REST_HTTP: &str = "rest-http-error";
    pub const REST_MALFORMED: &str = "rest-malformed-response";
    pub const REST_PUSH_NEW: &str = "rest-push-new-fail";
    pub const REST_PUSH_EDIT: &str = "rest-push-edit-fail";
    pub const REST_DELETE: &str = "rest-delete-fail";

    pub const RSS_FETCH: &str = "rss-fetch-fail";
    pub const RSS_PARSE: &str = "rss-parse-fail";

    pub const CLIENT_BUILD: &str = "http-client-build-fail";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The local post to push does not exist.
    #[error("invalid post: local post {0} does not exist")]
    InvalidPost(u64),
    /// The remote rejected the credentials.
    #[error("{message}")]
    AuthFailure { code: &'static str, message: String },
    /// The request never produced a usable response.
    #[error("{message}")]
    TransportFailure { code: &'static str, message: String },
    /// The remote answered with an application-level error payload.
    #[error("{message}")]
    RemoteRejected { code: &'static str, message: String },
    /// The remote resource does not exist.
    #[error("{message}")]
    NotFound { code: &'static str, message: String },
    /// The response or feed could not be parsed.
    #[error("{message}")]
    ParseFailure { code: &'static str, message: String },
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::InvalidPost(_) => codes::INVALID_POST,
            TransportError::AuthFailure { code, .. }
            | TransportError::TransportFailure { code, .. }
            | TransportError::RemoteRejected { code, .. }
            | TransportError::NotFound { code, .. }
            | TransportError::ParseFailure { code, .. } => code,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Re-tags the error with the code of the operation that failed, keeping
    /// its kind and message.
    pub fn with_code(self, new_code: &'static str) -> Self {
        match self {
            TransportError::InvalidPost(id) => TransportError::InvalidPost(id),
            TransportError::AuthFailure { message, .. } => TransportError::AuthFailure {
                code: new_code,
                message,
            },
            TransportError::TransportFailure { message, .. } => TransportError::TransportFailure {
                code: new_code,
                message,
            },
            TransportError::RemoteRejected { message, .. } => TransportError::RemoteRejected {
                code: new_code,
                message,
            },
            TransportError::NotFound { message, .. } => TransportError::NotFound {
                code: new_code,
                message,
            },
            TransportError::ParseFailure { message, .. } => TransportError::ParseFailure {
                code: new_code,
                message,
            },
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, TransportError::AuthFailure { .. })
    }
}
