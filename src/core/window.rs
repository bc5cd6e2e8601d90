//! Schedule windows handed to the aggregator by the scheduler.
//!
//! A window covers `[start, start + interval]`, inclusive on both ends, for a
//! single company/asset pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Company the asset belongs to
    pub company_id: i64,
    /// Asset whose samples are aggregated
    pub asset_id: i64,
    /// Window start (unix seconds)
    #[serde(rename = "schedule_start")]
    pub start: i64,
    /// Window length in seconds
    pub interval: u64,
}

impl ScheduleWindow {
    /// Create a new window starting at `start` and lasting `interval` seconds.
    pub fn new(company_id: i64, asset_id: i64, start: i64, interval: u64) -> Self {
        Self {
            company_id,
            asset_id,
            start,
            interval,
        }
    }

    /// Parse a scheduler event document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Window end (unix seconds), clamped to `i64::MAX`.
    pub fn end(&self) -> i64 {
        let interval = i64::try_from(self.interval).unwrap_or(i64::MAX);
        self.start.saturating_add(interval)
    }

    /// Window start as a UTC datetime, if representable.
    pub fn start_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.start, 0)
    }

    /// Window end as a UTC datetime, if representable.
    pub fn end_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end(), 0)
    }
}

impl std::fmt::Display for ScheduleWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.start_utc(), self.end_utc()) {
            (Some(start), Some(end)) => write!(
                f,
                "asset {} [{}, {}]",
                self.asset_id,
                start.to_rfc3339(),
                end.to_rfc3339()
            ),
            _ => write!(f, "asset {} [{}, {}]", self.asset_id, self.start, self.end()),
        }
    }
}
