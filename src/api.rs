//! HTTP client for the data API.
//!
//! Provides the dataset query and the output publish calls used by the
//! aggregator. [`ApiClient`] is async; [`BlockingApiClient`] wraps it with a
//! current-thread runtime and implements the aggregator's capability traits.

use crate::config::{Config, DatasetRef};
use crate::core::record::{AggregateOutput, SourceRecord};
use crate::dataset::{DatasetClient, DatasetQuery};
use crate::error::ApiError;
use crate::publisher::OutputPublisher;
use serde::Serialize;
use std::time::Duration;

/// API connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.corva.ai`
    pub base_url: String,
    /// API key sent as `Authorization: API <key>`
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ApiConfig {
    /// Create a new API configuration.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout,
        }
    }

    /// Endpoint for reading from or writing to a dataset.
    pub fn data_url(&self, dataset: &DatasetRef) -> String {
        format!(
            "{}/api/v1/data/{}/{}/",
            self.base_url.trim_end_matches('/'),
            dataset.provider,
            dataset.dataset
        )
    }

    fn authorization(&self) -> String {
        format!("API {}", self.api_key)
    }
}

/// Async data API client.
pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Fetch the records matching `query`.
    pub async fn get_dataset(&self, query: &DatasetQuery) -> Result<Vec<SourceRecord>, ApiError> {
        let filter = serde_json::to_string(&query.filter)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let sort = serde_json::to_string(&query.sort)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        let limit = query.limit.to_string();

        tracing::debug!(dataset = %query.source, filter = %filter, "Querying dataset");

        let response = self
            .client
            .get(self.config.data_url(&query.source))
            .header("Authorization", self.config.authorization())
            .query(&[
                ("query", filter.as_str()),
                ("sort", sort.as_str()),
                ("limit", limit.as_str()),
                ("fields", query.fields.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Vec<SourceRecord>>()
            .await
            .map_err(|e| ApiError::Serialization(e.to_string()))
    }

    /// Post a batch of records to `target`.
    pub async fn post_records<T: Serialize>(
        &self,
        target: &DatasetRef,
        records: &[T],
    ) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.config.data_url(target))
            .header("Authorization", self.config.authorization())
            .header("Content-Type", "application/json")
            .json(records)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Server {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(dataset = %target, count = records.len(), "Posted records");
        Ok(())
    }
}

/// Blocking API client for use in synchronous contexts.
pub struct BlockingApiClient {
    inner: ApiClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingApiClient {
    /// Create a new blocking API client.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: ApiClient::new(config)?,
            runtime,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(ApiConfig::from_config(config))
    }

    pub fn config(&self) -> &ApiConfig {
        self.inner.config()
    }
}

impl DatasetClient for BlockingApiClient {
    fn query(&self, query: &DatasetQuery) -> Result<Vec<SourceRecord>, ApiError> {
        self.runtime.block_on(self.inner.get_dataset(query))
    }
}

impl OutputPublisher for BlockingApiClient {
    fn publish(&self, target: &DatasetRef, records: &[AggregateOutput]) -> Result<(), ApiError> {
        self.runtime.block_on(self.inner.post_records(target, records))
    }
}
