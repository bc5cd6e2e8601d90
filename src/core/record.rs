//! Source samples and the summary record built from them.

use crate::config::DatasetRef;
use crate::core::window::ScheduleWindow;
use serde::{Deserialize, Deserializer, Serialize};

/// Schema version stamped on every summary record.
pub const OUTPUT_VERSION: u32 = 1;

/// Field projection requested from the dataset.
pub const SOURCE_FIELDS: &str = "timestamp,data.mud_density";

/// A single sensor sample as returned by the window query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Sample time (unix seconds)
    #[serde(deserialize_with = "integral_timestamp")]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: SourceData,
}

/// Projected payload of a sensor sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    /// Drilling fluid density; `None` when missing or not numeric
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mud_density: Option<f64>,
}

impl SourceRecord {
    pub fn new(timestamp: i64, mud_density: Option<f64>) -> Self {
        Self {
            timestamp,
            data: SourceData { mud_density },
        }
    }

    /// Density used for aggregation; malformed samples count as zero.
    pub fn mud_density_or_zero(&self) -> f64 {
        self.data.mud_density.unwrap_or(0.0)
    }
}

/// Accept any JSON value, keeping only finite numbers.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().filter(|v| v.is_finite()))
}

/// Accept any JSON value; anything but an object yields an empty payload.
fn lenient_data<'de, D>(deserializer: D) -> Result<SourceData, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
        _ => SourceData::default(),
    })
}

/// Accept integers and integral floats such as `1578291010.0`.
fn integral_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if let Some(ts) = value.as_i64() {
        return Ok(ts);
    }
    match value.as_f64() {
        Some(ts) if ts.fract() == 0.0 && ts >= i64::MIN as f64 && ts < i64::MAX as f64 => {
            Ok(ts as i64)
        }
        _ => Err(serde::de::Error::custom(format!("invalid timestamp: {value}"))),
    }
}

/// The summary record published once per successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutput {
    /// Timestamp of the last sample in the window
    pub timestamp: i64,
    pub asset_id: i64,
    pub company_id: i64,
    pub provider: String,
    pub collection: String,
    pub data: AggregateData,
    pub version: u32,
}

/// Payload of the summary record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateData {
    pub mean_mud_density: f64,
    pub schedule_start: i64,
    pub schedule_end: i64,
}

impl AggregateOutput {
    /// Build the summary for `window`, stamped with the last sample's timestamp.
    pub fn new(
        window: &ScheduleWindow,
        target: &DatasetRef,
        last_timestamp: i64,
        mean_mud_density: f64,
    ) -> Self {
        Self {
            timestamp: last_timestamp,
            asset_id: window.asset_id,
            company_id: window.company_id,
            provider: target.provider.clone(),
            collection: target.dataset.clone(),
            data: AggregateData {
                mean_mud_density,
                schedule_start: window.start,
                schedule_end: window.end(),
            },
            version: OUTPUT_VERSION,
        }
    }
}
