//! Cumulative run statistics with optional persistence.

use crate::core::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Counters for every way a run can end.
#[derive(Debug)]
pub struct RunLedger {
    /// Runs that published a summary
    published: AtomicU64,
    /// Runs whose window had no samples
    empty_windows: AtomicU64,
    /// Runs skipped because the window was already exported
    already_exported: AtomicU64,
    /// Runs that failed
    failures: AtomicU64,
    /// Timestamp of the most recently published summary
    last_published_timestamp: AtomicI64,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl RunLedger {
    /// Create a new, empty ledger.
    pub fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            empty_windows: AtomicU64::new(0),
            already_exported: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            last_published_timestamp: AtomicI64::new(0),
            persist_path: None,
        }
    }

    /// Create a ledger backed by `path`, loading any previous counts.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut ledger = Self::new();
        ledger.persist_path = Some(path);

        if let Err(e) = ledger.load() {
            tracing::warn!("Could not load previous run ledger: {}", e);
        }

        ledger
    }

    /// Record a run that completed without error.
    pub fn record_outcome(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Published(output) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                self.last_published_timestamp
                    .fetch_max(output.timestamp, Ordering::Relaxed);
            }
            Outcome::EmptyWindow => {
                self.empty_windows.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::AlreadyExported { .. } => {
                self.already_exported.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a failed run.
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> LedgerStats {
        let last = self.last_published_timestamp.load(Ordering::Relaxed);
        LedgerStats {
            published: self.published.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            already_exported: self.already_exported.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            last_published_timestamp: (last > 0).then_some(last),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let last = stats
            .last_published_timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "Run Statistics:\n\
             - Summaries published: {}\n\
             - Empty windows: {}\n\
             - Already exported: {}\n\
             - Failed runs: {}\n\
             - Last published sample: {}",
            stats.published, stats.empty_windows, stats.already_exported, stats.failures, last
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                stats: self.stats(),
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load stats from disk.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;
                let stats = persisted.stats;

                self.published.store(stats.published, Ordering::Relaxed);
                self.empty_windows
                    .store(stats.empty_windows, Ordering::Relaxed);
                self.already_exported
                    .store(stats.already_exported, Ordering::Relaxed);
                self.failures.store(stats.failures, Ordering::Relaxed);
                self.last_published_timestamp.store(
                    stats.last_published_timestamp.unwrap_or(0),
                    Ordering::Relaxed,
                );
            }
        }
        Ok(())
    }
}

impl Default for RunLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ledger statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub published: u64,
    pub empty_windows: u64,
    pub already_exported: u64,
    pub failures: u64,
    pub last_published_timestamp: Option<i64>,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(flatten)]
    stats: LedgerStats,
    last_updated: DateTime<Utc>,
}
