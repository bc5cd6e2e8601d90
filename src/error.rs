//! Error types shared by the aggregator and its collaborators.

use crate::watermark::WatermarkError;

/// Failure talking to the data API (dataset query or publish).
#[derive(Debug)]
pub enum ApiError {
    /// Configuration error
    Config(String),
    /// Network/HTTP error
    Network(String),
    /// Server returned an error response
    Server { status: u16, message: String },
    /// JSON serialization error
    Serialization(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Config(msg) => write!(f, "API config error: {msg}"),
            ApiError::Network(msg) => write!(f, "API network error: {msg}"),
            ApiError::Server { status, message } => {
                write!(f, "API server error ({status}): {message}")
            }
            ApiError::Serialization(msg) => write!(f, "API serialization error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Hard failures of a single aggregation run.
///
/// Empty windows and already-exported windows are not errors; they are
/// reported through [`crate::core::Outcome`].
#[derive(Debug)]
pub enum AggregatorError {
    /// The dataset query failed
    Dataset(ApiError),
    /// Publishing the aggregate failed; the watermark was left untouched
    Publish(ApiError),
    /// Reading or writing the watermark failed
    Watermark(WatermarkError),
}

impl AggregatorError {
    /// Whether the failure came from the data API rather than local state.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AggregatorError::Dataset(_) | AggregatorError::Publish(_))
    }
}

impl std::fmt::Display for AggregatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregatorError::Dataset(e) => write!(f, "Dataset query failed: {e}"),
            AggregatorError::Publish(e) => write!(f, "Publish failed: {e}"),
            AggregatorError::Watermark(e) => write!(f, "Watermark store failed: {e}"),
        }
    }
}

impl std::error::Error for AggregatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AggregatorError::Dataset(e) | AggregatorError::Publish(e) => Some(e),
            AggregatorError::Watermark(e) => Some(e),
        }
    }
}

impl From<WatermarkError> for AggregatorError {
    fn from(err: WatermarkError) -> Self {
        AggregatorError::Watermark(err)
    }
}
