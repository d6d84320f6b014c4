//! Per-person work-log metrics from spreadsheet-like sheets.
//!
//! Each sheet is resolved to canonical columns, its dates and statuses are
//! normalized, and a [`models::MetricsRecord`] is computed. Records can then
//! be ranked and summarized as a cohort.

pub mod assessment;
pub mod batch;
pub mod cohort;
pub mod columns;
pub mod config;
pub mod dates;
pub mod error;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod quality;
pub mod report;
pub mod stats;
pub mod status;

pub use batch::{analyze_batch, BatchOutcome};
pub use cohort::summarize_cohort;
pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use metrics::analyze_sheet;
