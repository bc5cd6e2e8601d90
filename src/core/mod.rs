//! Core functionality for the Mud Density Aggregator.
//!
//! This module contains:
//! - Schedule windows describing one invocation
//! - Source samples and the summary record
//! - The window aggregator that ties the collaborators together

pub mod aggregator;
pub mod record;
pub mod window;

// Re-export commonly used types
pub use aggregator::{mean_mud_density, Outcome, WindowAggregator};
pub use record::{AggregateData, AggregateOutput, SourceData, SourceRecord, OUTPUT_VERSION};
pub use window::ScheduleWindow;
