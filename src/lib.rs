//! Mud Density Aggregator - scheduled summary job for drilling sensor data.
//!
//! Each invocation receives one schedule window for an asset, averages the
//! `mud_density` samples recorded inside it, and publishes a single summary
//! record. A cached watermark guards against exporting the same window twice.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Mud Density Aggregator                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Dataset   │──▶│   Window    │──▶│   Output    │       │
//! │  │   Client    │   │ Aggregator  │   │  Publisher  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │  Watermark  │   │    Run      │       │
//! │                    │    Store    │   │   Ledger    │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mud_density_aggregator::{
//!     core::{ScheduleWindow, WindowAggregator},
//!     publisher::EchoPublisher,
//!     watermark::MemoryWatermarkStore,
//!     BlockingApiClient, Config,
//! };
//!
//! let config = Config::load().unwrap_or_default();
//! let client = BlockingApiClient::from_config(&config).expect("Failed to build API client");
//! let mut watermarks = MemoryWatermarkStore::new();
//!
//! let window = ScheduleWindow::new(1, 1234, 1578291000, 60);
//! let aggregator = WindowAggregator::from_config(&config);
//! let outcome = aggregator
//!     .run(&window, &client, &mut watermarks, &EchoPublisher)
//!     .expect("Aggregation failed");
//! println!("{}", outcome.label());
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod error;
pub mod ledger;
pub mod publisher;
pub mod watermark;

#[cfg(feature = "api")]
pub mod api;

// Re-export key types at crate root for convenience
pub use config::{Config, DatasetRef};
pub use self::core::{AggregateOutput, Outcome, ScheduleWindow, SourceRecord, WindowAggregator};
pub use dataset::{DatasetClient, DatasetQuery};
pub use error::{AggregatorError, ApiError};
pub use ledger::{LedgerStats, RunLedger};
pub use publisher::OutputPublisher;
pub use watermark::{
    FileWatermarkStore, MemoryWatermarkStore, WatermarkError, WatermarkStore, WATERMARK_KEY,
};

// API re-exports (when enabled)
#[cfg(feature = "api")]
pub use api::{ApiClient, ApiConfig, BlockingApiClient};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
