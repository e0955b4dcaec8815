//! Request descriptors and path normalization

use crate::normalizer::EnhancedError;
use reqwest::Method;
use serde::Serialize;
use types::{QueryParams, QueryValue};

/// One logical request as handed to the transport pipeline.
///
/// The retry counter is owned by the pipeline: it is incremented on every
/// transport-level retry of this same descriptor, so the attempt count is
/// preserved across re-sends.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: QueryParams,
    body: Option<serde_json::Value>,
    retry_count: u32,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            retry_count: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a single query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Merge a set of query parameters, later keys win
    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.query.extend(params);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a JSON body. Serialization failure is a caller bug and maps to
    /// `CLIENT_ERROR`.
    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, EnhancedError> {
        let value = serde_json::to_value(body)
            .map_err(|e| EnhancedError::client(format!("Failed to serialize request body: {}", e)))?;
        Ok(self.with_body(value))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Transport-level retries already spent on this descriptor
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn record_retry(&mut self) {
        self.retry_count += 1;
    }
}

/// Normalize a caller-supplied path.
///
/// Ensures a leading `/` and appends a trailing `/` to bare resource paths
/// (no query string, no file extension in the last segment). Idempotent.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if normalized.contains('?') || normalized.ends_with('/') {
        return normalized;
    }

    let last_segment = normalized.rsplit('/').next().unwrap_or_default();
    if !last_segment.contains('.') {
        normalized.push('/');
    }

    normalized
}

/// Strip leading copies of the API version prefix from a path so a caller
/// passing `/api/v1/events` against a base already ending in `/api/v1` does
/// not produce `/api/v1/api/v1/events`.
pub fn collapse_version_prefix(path: &str, prefix: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }

    let mut remaining = path;
    loop {
        match remaining.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() => return "/".to_string(),
            Some(rest) if rest.starts_with('/') || rest.starts_with('?') => remaining = rest,
            _ => break,
        }
    }

    if remaining.starts_with('?') {
        format!("/{}", remaining)
    } else {
        remaining.to_string()
    }
}
