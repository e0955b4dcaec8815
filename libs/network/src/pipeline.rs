//! Transport Pipeline
//!
//! Builds the request URL (versioned base, path normalization, query
//! formatting), dispatches through an [`HttpBackend`], and retries transient
//! failures with exponential backoff before surfacing a normalized error.

use crate::error::{ClientError, Result};
use crate::normalizer::{normalize, EnhancedError};
use crate::request::{collapse_version_prefix, normalize_path, RequestDescriptor};
use crate::retry::RetryPolicy;
use crate::transports::{HttpBackend, HttpResponse, PreparedRequest, ReqwestBackend};
use dashboard_config::ClientConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use types::{format_request_params, QueryParams};
use url::Url;

/// Shared request pipeline for every service call
#[derive(Clone)]
pub struct TransportPipeline {
    /// Base URL including the API version prefix, without trailing slash
    api_base: String,
    /// Version prefix, used to collapse already-versioned caller paths
    api_prefix: String,
    backend: Arc<dyn HttpBackend>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl fmt::Debug for TransportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportPipeline")
            .field("api_base", &self.api_base)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TransportPipeline {
    /// Create a pipeline over an arbitrary backend.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `base_url` is not an http(s) URL.
    pub fn new(
        base_url: &str,
        api_prefix: &str,
        backend: Arc<dyn HttpBackend>,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                base_url
            )));
        }

        let api_prefix = api_prefix.trim_end_matches('/').to_string();

        Ok(Self {
            api_base: versioned_base(base_url, &api_prefix),
            api_prefix,
            backend,
            retry: RetryPolicy::default(),
            timeout: Duration::from_millis(dashboard_config::defaults::transport::TIMEOUT_MS),
        })
    }

    /// Production pipeline: reqwest backend, settings from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let backend = ReqwestBackend::new(config.timeout())?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// Pipeline with settings from configuration over a custom backend
    pub fn with_backend(config: &ClientConfig, backend: Arc<dyn HttpBackend>) -> Result<Self> {
        Ok(Self::new(&config.base_url, &config.api_prefix, backend)?
            .with_retry(RetryPolicy::from_config(config))
            .with_timeout(config.timeout()))
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Full URL for a descriptor: versioned base + normalized path + formatted query
    pub fn build_url(&self, descriptor: &RequestDescriptor) -> std::result::Result<Url, EnhancedError> {
        let path = collapse_version_prefix(&normalize_path(descriptor.path()), &self.api_prefix);
        let raw = format!("{}{}", self.api_base, path);

        let mut url = Url::parse(&raw)
            .map_err(|e| EnhancedError::client(format!("Invalid request URL {}: {}", raw, e)))?;

        let params = format_request_params(descriptor.query());
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Send a request, retrying transient failures on the same descriptor.
    ///
    /// Successful responses are returned unchanged; no retry happens on
    /// success regardless of payload.
    pub async fn send(
        &self,
        descriptor: &mut RequestDescriptor,
    ) -> std::result::Result<HttpResponse, EnhancedError> {
        let request = PreparedRequest {
            method: descriptor.method().clone(),
            url: self.build_url(descriptor)?,
            body: descriptor.body().cloned(),
            timeout: self.timeout,
        };
        let context = request.context();

        loop {
            debug!(
                "Dispatching {} {} (retry {})",
                context.method,
                context.url,
                descriptor.retry_count()
            );

            let failure = match self.backend.dispatch(&request).await {
                Ok(response) => return Ok(response),
                Err(failure) => failure,
            };

            let error = normalize(failure, Some(&context));
            let attempt = descriptor.retry_count();

            if !self.retry.should_retry(&error, attempt) {
                if error.is_retryable() {
                    error!(
                        "{} {} failed after {} retries: {}",
                        context.method, context.url, attempt, error
                    );
                } else {
                    debug!("{} {} failed: {}", context.method, context.url, error);
                }
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt);
            descriptor.record_retry();
            warn!(
                "{} {} failed with {}, retrying in {}ms (attempt {}/{})",
                context.method,
                context.url,
                error.error_code(),
                delay.as_millis(),
                descriptor.retry_count(),
                self.retry.max_retries()
            );

            tokio::time::sleep(delay).await;
        }
    }

    /// GET a JSON resource
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: QueryParams,
    ) -> std::result::Result<T, EnhancedError> {
        let mut descriptor = RequestDescriptor::get(path).with_params(query);
        self.send(&mut descriptor).await?.json()
    }

    /// POST a JSON body, decode a JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, EnhancedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut descriptor = RequestDescriptor::post(path).with_json(body)?;
        self.send(&mut descriptor).await?.json()
    }

    /// PUT a JSON body, decode a JSON response
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> std::result::Result<T, EnhancedError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut descriptor = RequestDescriptor::put(path).with_json(body)?;
        self.send(&mut descriptor).await?.json()
    }

    /// DELETE a resource, ignoring any response body
    pub async fn delete(&self, path: &str) -> std::result::Result<(), EnhancedError> {
        let mut descriptor = RequestDescriptor::delete(path);
        self.send(&mut descriptor).await.map(|_| ())
    }
}

/// Append the version prefix to the base URL unless it is already there
fn versioned_base(base_url: &str, api_prefix: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if api_prefix.is_empty() || base.ends_with(api_prefix) {
        base.to_string()
    } else {
        format!("{}{}", base, api_prefix)
    }
}
