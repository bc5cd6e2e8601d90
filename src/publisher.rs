//! Write side of the data API.

use crate::config::DatasetRef;
use crate::core::record::AggregateOutput;
use crate::error::ApiError;

/// Capability to write a batch of summary records to an output dataset.
pub trait OutputPublisher {
    /// Write `records` to `target`. Any non-success response is an error.
    fn publish(&self, target: &DatasetRef, records: &[AggregateOutput]) -> Result<(), ApiError>;
}

/// Publisher that prints the batch to stdout instead of posting it.
///
/// Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoPublisher;

impl OutputPublisher for EchoPublisher {
    fn publish(&self, target: &DatasetRef, records: &[AggregateOutput]) -> Result<(), ApiError> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| ApiError::Serialization(e.to_string()))?;
        println!("{target}:");
        println!("{json}");
        Ok(())
    }
}
