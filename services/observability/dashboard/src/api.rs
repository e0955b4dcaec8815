//! Backend service functions
//!
//! Thin typed calls over the shared [`TransportPipeline`], plus helpers that
//! wrap them in operation controllers for list views.

use crate::error::{DashboardError, Result};
use crate::operation::{AsyncOperation, OperationOptions};
use crate::pagination::PaginationManager;
use crate::polling::HttpUpdateSource;
use dashboard_config::ClientConfig;
use network::{EnhancedError, TransportPipeline};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use types::{Page, PaginationParams, QueryParams};

#[derive(Debug, Clone)]
pub struct DashboardApi {
    pipeline: TransportPipeline,
}

impl DashboardApi {
    pub fn new(pipeline: TransportPipeline) -> Self {
        Self { pipeline }
    }

    /// Validate `config` and build the production pipeline from it
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DashboardError::Configuration {
                message: format!("{:#}", e),
            })?;
        Ok(Self::new(TransportPipeline::from_config(config)?))
    }

    pub fn pipeline(&self) -> &TransportPipeline {
        &self.pipeline
    }

    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: QueryParams,
    ) -> std::result::Result<T, EnhancedError> {
        self.pipeline.get_json(path, query).await
    }

    /// Fetch one page. Pagination parameters override same-named filters.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &PaginationParams,
        filters: &QueryParams,
    ) -> std::result::Result<Page<T>, EnhancedError> {
        let mut query = filters.clone();
        query.extend(params.to_query());
        self.pipeline.get_json(path, query).await
    }

    /// Controller for a paginated list view.
    ///
    /// Each run reads the current parameters from `pagination`. After
    /// changing the pagination state, pass `pagination.params()` to
    /// [`AsyncOperation::update_dependencies`] so stale pages are dropped.
    pub fn list_operation<T>(
        &self,
        path: impl Into<String>,
        pagination: Arc<Mutex<PaginationManager>>,
        filters: QueryParams,
        options: OperationOptions<Page<T>>,
    ) -> AsyncOperation<Page<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let api = self.clone();
        let path: Arc<str> = Arc::from(path.into());
        let filters = Arc::new(filters);

        AsyncOperation::new(
            move || {
                let api = api.clone();
                let path = Arc::clone(&path);
                let filters = Arc::clone(&filters);
                let params = pagination.lock().params();
                async move { api.fetch_page(&path, &params, &filters).await }
            },
            options,
        )
    }

    /// Update source polling this backend's `/updates/` endpoint
    pub fn update_source(&self) -> HttpUpdateSource {
        HttpUpdateSource::new(self.pipeline.clone())
    }
}
