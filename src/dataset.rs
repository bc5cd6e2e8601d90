//! Read side of the data API.
//!
//! The aggregator only needs one capability from the dataset service: run a
//! filtered, sorted, projected query and return the matching samples.

use crate::config::DatasetRef;
use crate::core::record::{SourceRecord, SOURCE_FIELDS};
use crate::core::window::ScheduleWindow;
use crate::error::ApiError;
use serde_json::{json, Value};

/// A query against a single provider/dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetQuery {
    pub source: DatasetRef,
    /// Mongo-style filter document
    pub filter: Value,
    /// Sort document (`1` ascending, `-1` descending)
    pub sort: Value,
    /// Comma separated field projection
    pub fields: String,
    pub limit: usize,
}

impl DatasetQuery {
    /// Samples for `window`, inclusive on both bounds, oldest first.
    pub fn for_window(source: &DatasetRef, window: &ScheduleWindow, limit: usize) -> Self {
        Self {
            source: source.clone(),
            filter: json!({
                "asset_id": window.asset_id,
                "timestamp": {
                    "$gte": window.start,
                    "$lte": window.end(),
                },
            }),
            sort: json!({ "timestamp": 1 }),
            fields: SOURCE_FIELDS.to_string(),
            limit,
        }
    }
}

/// Capability to query a dataset.
pub trait DatasetClient {
    /// Run `query` and return the records in the order the service sorted them.
    fn query(&self, query: &DatasetQuery) -> Result<Vec<SourceRecord>, ApiError>;
}
