//! The window aggregator.
//!
//! One call to [`WindowAggregator::run`] handles one scheduled window:
//!
//! 1. Query the samples in `[start, end]`, oldest first
//! 2. Stop if there are none
//! 3. Stop if the window ends at or before the stored watermark
//! 4. Average `mud_density` (missing values count as zero)
//! 5. Publish a single summary record
//! 6. Advance the watermark to the last sample's timestamp
//!
//! The watermark check is read-then-write, so two overlapping runs for the
//! same asset can both publish. The scheduler is expected not to do that.

use crate::config::{Config, DatasetRef, DEFAULT_QUERY_LIMIT};
use crate::core::record::{AggregateOutput, SourceRecord};
use crate::core::window::ScheduleWindow;
use crate::dataset::{DatasetClient, DatasetQuery};
use crate::error::AggregatorError;
use crate::publisher::OutputPublisher;
use crate::watermark::{WatermarkStore, WATERMARK_KEY};
use statrs::statistics::Statistics;
use uuid::Uuid;

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The summary was published and the watermark advanced
    Published(AggregateOutput),
    /// The window query returned no samples
    EmptyWindow,
    /// The window ends at or before the stored watermark
    AlreadyExported { watermark: i64 },
}

impl Outcome {
    /// The published record, if any.
    pub fn output(&self) -> Option<&AggregateOutput> {
        match self {
            Outcome::Published(output) => Some(output),
            _ => None,
        }
    }

    pub fn into_output(self) -> Option<AggregateOutput> {
        match self {
            Outcome::Published(output) => Some(output),
            _ => None,
        }
    }

    /// Short label for logs and the run ledger.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Published(_) => "published",
            Outcome::EmptyWindow => "empty_window",
            Outcome::AlreadyExported { .. } => "already_exported",
        }
    }
}

/// Mean `mud_density` over `records`, counting missing values as zero.
///
/// Returns `None` for an empty slice.
pub fn mean_mud_density(records: &[SourceRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let values: Vec<f64> = records.iter().map(SourceRecord::mud_density_or_zero).collect();
    Some(values.iter().mean())
}

/// Averages one window of samples and publishes the result.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    source: DatasetRef,
    output: DatasetRef,
    query_limit: usize,
}

impl Default for WindowAggregator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl WindowAggregator {
    pub fn new(source: DatasetRef, output: DatasetRef) -> Self {
        Self {
            source,
            output,
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            source: config.source.clone(),
            output: config.output.clone(),
            query_limit: config.query_limit,
        }
    }

    pub fn with_query_limit(mut self, limit: usize) -> Self {
        self.query_limit = limit;
        self
    }

    pub fn source(&self) -> &DatasetRef {
        &self.source
    }

    pub fn output(&self) -> &DatasetRef {
        &self.output
    }

    /// Aggregate `window`.
    ///
    /// Errors from the dataset, the publisher or the watermark store abort the
    /// run. The watermark is only written after a successful publish.
    pub fn run(
        &self,
        window: &ScheduleWindow,
        dataset: &dyn DatasetClient,
        watermarks: &mut dyn WatermarkStore,
        publisher: &dyn OutputPublisher,
    ) -> Result<Outcome, AggregatorError> {
        let span = tracing::info_span!(
            "aggregate",
            invocation = %Uuid::new_v4(),
            company_id = window.company_id,
            asset_id = window.asset_id,
        );
        let _guard = span.enter();

        let query = DatasetQuery::for_window(&self.source, window, self.query_limit);
        let records = dataset.query(&query).map_err(AggregatorError::Dataset)?;

        let Some(last) = records.last() else {
            tracing::info!(
                start = window.start,
                end = window.end(),
                "No records in window"
            );
            return Ok(Outcome::EmptyWindow);
        };
        let last_timestamp = last.timestamp;

        let watermark = read_watermark(&*watermarks)?;
        if window.end() <= watermark {
            tracing::info!(
                end = window.end(),
                watermark,
                "Window already exported, skipping"
            );
            return Ok(Outcome::AlreadyExported { watermark });
        }

        let mean = mean_mud_density(&records).unwrap_or(0.0);
        tracing::debug!(records = records.len(), mean, "Computed mean mud density");

        let output = AggregateOutput::new(window, &self.output, last_timestamp, mean);
        publisher
            .publish(&self.output, std::slice::from_ref(&output))
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to publish aggregate");
                AggregatorError::Publish(e)
            })?;

        let advanced = watermark.max(last_timestamp);
        watermarks.set(WATERMARK_KEY, &advanced.to_string())?;

        tracing::info!(
            records = records.len(),
            mean,
            watermark = advanced,
            "Published aggregate to {}",
            self.output
        );

        Ok(Outcome::Published(output))
    }
}

/// Current watermark; absent or unreadable values count as zero.
fn read_watermark(store: &dyn WatermarkStore) -> Result<i64, AggregatorError> {
    let Some(raw) = store.get(WATERMARK_KEY)? else {
        return Ok(0);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(value = %raw, "Ignoring unparsable watermark: {}", e);
            Ok(0)
        }
    }
}
