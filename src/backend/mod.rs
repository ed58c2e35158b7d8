//! The HTTP boundary between the tracker and the analysis backend.
//!
//! The tracker never talks to `reqwest` directly. It goes through the small
//! [`HttpTransport`] trait, which knows two verbs (multipart POST and GET)
//! and returns raw status + body. Everything that gives those bytes meaning
//! lives in [`protocol`], as pure functions that are trivially testable.
//!
//! ## Data Flow
//!
//! ```text
//! SubmissionRequest ──▶ protocol::submission_body ──▶ transport.post_multipart
//!                                                          │
//!                  SubmissionOutcome ◀── protocol::classify_submission
//!
//! JobHandle ──▶ transport.get(/status/{id}) ──▶ protocol::classify_poll ──▶ PollOutcome
//! ```
//!
//! 1. [`http`]      — the production transport over `reqwest`
//! 2. [`protocol`]  — request bodies and response classification
//! 3. [`standards`] — the auxiliary rules upload, independent of any job

pub mod http;
pub mod protocol;
pub mod standards;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;

/// Minimal HTTP client the tracker depends on.
///
/// Implementations must be `Send + Sync`: submission and polling run in
/// spawned tokio tasks that share the transport through an `Arc`.
pub trait HttpTransport: Send + Sync {
    /// POST a multipart form to `path` (relative to the backend origin).
    fn post_multipart<'a>(
        &'a self,
        path: &'a str,
        body: MultipartBody,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;

    /// GET `path` (relative to the backend origin).
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpResponse, TransportError>>;
}

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Convenience for fakes: a response whose body is `value` serialised.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The exchange itself failed: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, TLS error.
    #[error("request to {path} failed: {reason}")]
    Request { path: String, reason: String },

    /// The configured request timeout elapsed.
    #[error("request to {path} timed out")]
    Timeout { path: String },

    /// Headers arrived but reading the body failed.
    #[error("reading response body from {path} failed: {reason}")]
    Body { path: String, reason: String },

    /// The request could not be built; nothing was sent.
    #[error("could not build request to {path}: {reason}")]
    InvalidRequest { path: String, reason: String },
}

/// A multipart form, independent of any HTTP client library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    pub parts: Vec<FormPart>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::Text(value.into()),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        media_type: impl Into<String>,
        content: Bytes,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            value: PartValue::File {
                filename: filename.into(),
                media_type: media_type.into(),
                content,
            },
        });
        self
    }

    /// Text value of the first part called `name`, if it is a text part.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find(|p| p.name == name).and_then(|p| match &p.value {
            PartValue::Text(v) => Some(v.as_str()),
            PartValue::File { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartValue {
    Text(String),
    File {
        filename: String,
        media_type: String,
        content: Bytes,
    },
}
