//! Search index abstraction
//!
//! Content changes are pushed to an external index through `SearchIndexer`.
//! Providers:
//! - `none`: no-op (default)
//! - `http`: JSON documents posted to an indexing endpoint

use crate::config::SearchConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Document pushed to the search index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub object_id: String,
    pub title: String,
    /// e.g. `quote`
    pub object_type: String,
    pub content: String,
    pub status: i32,
    pub tags: Vec<String>,
    pub user_id: String,
    pub views: i32,
    /// Unix seconds
    pub created: i64,
    /// Unix seconds
    pub active: i64,
    pub score: i32,
}

/// Trait for search index synchronisation
#[async_trait]
pub trait SearchIndexer: Send + Sync {
    /// Insert or replace a document
    async fn update_content(&self, doc: &SearchDocument) -> Result<()>;

    /// Remove a document
    async fn delete_content(&self, object_id: &str) -> Result<()>;

    /// Provider name
    fn provider_name(&self) -> &str;
}

/// Indexer used when no search backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSearchIndexer;

#[async_trait]
impl SearchIndexer for NoopSearchIndexer {
    async fn update_content(&self, _doc: &SearchDocument) -> Result<()> {
        Ok(())
    }

    async fn delete_content(&self, _object_id: &str) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "none"
    }
}

/// HTTP indexing client
pub struct HttpSearchIndexer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    max_elapsed: Duration,
}

impl HttpSearchIndexer {
    pub fn new(endpoint: String, api_key: Option<String>, timeout: Duration, max_elapsed: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_elapsed,
        })
    }

    fn policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    /// Send once; server errors and transport failures are retried, client errors are not
    async fn send(&self, request: reqwest::RequestBuilder) -> std::result::Result<(), backoff::Error<AppError>> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(AppError::from(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let err = AppError::SearchError {
            message: format!("Index error {}: {}", status, body),
        };
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(status = %status, "Search index request failed, retrying");
            Err(backoff::Error::transient(err))
        } else {
            Err(backoff::Error::permanent(err))
        }
    }
}

#[async_trait]
impl SearchIndexer for HttpSearchIndexer {
    async fn update_content(&self, doc: &SearchDocument) -> Result<()> {
        let url = format!("{}/documents", self.endpoint);
        let url = url.as_str();
        let outcome = retry(self.policy(), || async move {
            self.send(self.client.post(url).json(doc)).await
        })
        .await;
        crate::metrics::record_search_index("update", outcome.is_ok());
        outcome
    }

    async fn delete_content(&self, object_id: &str) -> Result<()> {
        let url = format!("{}/documents/{}", self.endpoint, object_id);
        let url = url.as_str();
        let outcome = retry(self.policy(), || async move { self.send(self.client.delete(url)).await }).await;
        crate::metrics::record_search_index("delete", outcome.is_ok());
        outcome
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}

/// Create a search indexer based on configuration
pub fn create_search_indexer(config: &SearchConfig) -> Result<Arc<dyn SearchIndexer>> {
    match config.provider.as_str() {
        "http" => {
            let endpoint = config.endpoint.clone().ok_or_else(|| AppError::Configuration {
                message: "search.endpoint is required for the http provider".to_string(),
            })?;
            Ok(Arc::new(HttpSearchIndexer::new(
                endpoint,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
                Duration::from_secs(config.max_elapsed_secs),
            )?))
        }
        "none" | "" => Ok(Arc::new(NoopSearchIndexer)),
        other => {
            tracing::warn!(provider = other, "Unknown search provider, indexing disabled");
            Ok(Arc::new(NoopSearchIndexer))
        }
    }
}
