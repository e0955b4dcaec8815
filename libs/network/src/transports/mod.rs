//! HTTP Transport Layer
//!
//! The pipeline owns URL construction and retry; a backend only dispatches one
//! prepared request and reports the outcome. Non-2xx responses are reported
//! as [`RawFailure::Status`] so every failure flows through the normalizer.

use crate::normalizer::{normalize, EnhancedError, RawFailure, RequestContext};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

pub mod http;

pub use http::ReqwestBackend;

/// Dispatch abstraction for all HTTP backends
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Send one request. `Ok` only for 2xx responses.
    async fn dispatch(&self, request: &PreparedRequest) -> Result<HttpResponse, RawFailure>;
}

/// A fully built request, ready for a backend
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

impl PreparedRequest {
    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.url.as_str(), self.method.as_str())
    }
}

/// A successful response, returned to callers unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
    pub context: RequestContext,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            context: RequestContext::default(),
        }
    }

    /// Decode the body as JSON. A malformed body normalizes to `CLIENT_ERROR`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, EnhancedError> {
        serde_json::from_str(&self.body)
            .map_err(|e| normalize(RawFailure::from(e), Some(&self.context)))
    }
}
