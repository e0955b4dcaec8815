//! reqwest-backed HTTP dispatch

use super::{HttpBackend, HttpResponse, PreparedRequest};
use crate::error::Result;
use crate::normalizer::RawFailure;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::debug;

/// Production backend over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    http: HttpClient,
}

impl ReqwestBackend {
    /// Create a backend whose client enforces `timeout` on every request
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Wrap an existing client (custom TLS, proxies, default headers)
    pub fn from_client(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn dispatch(&self, request: &PreparedRequest) -> std::result::Result<HttpResponse, RawFailure> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone())
            .timeout(request.timeout);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(RawFailure::from)?;
        let status = response.status();
        let body = response.text().await.map_err(RawFailure::from)?;

        debug!("{} {} -> {}", request.method, request.url, status.as_u16());

        if status.is_success() {
            Ok(HttpResponse {
                status: status.as_u16(),
                body,
                context: request.context(),
            })
        } else {
            Err(RawFailure::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
