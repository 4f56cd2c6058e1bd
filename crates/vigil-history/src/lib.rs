//! Vigil History: run history, baselines and regression analysis.
//!
//! Every completed run is appended to a [`HistoryStore`] as a
//! [`HistoryRecord`]. Stored runs feed three kinds of analysis:
//!
//! - [`RegressionDetector`]: compares check metrics against the [`Baseline`]
//! - [`trend::analyze`]: least-squares trends over a window of runs
//! - [`suggestions::suggest`]: improvement hints from recurring failures
//!
//! The baseline never moves on its own. A run becomes the new reference only
//! through [`HistoryTracker::promote`].
//!
//! # Stores
//!
//! - [`MemoryStore`]: process-local, for tests
//! - [`JsonlStore`]: one JSON document per line in a directory
//! - [`SqliteStore`]: a SQLite database file

pub mod baseline;
pub mod error;
pub mod record;
pub mod regression;
pub mod store;
pub mod suggestions;
pub mod tracker;
pub mod trend;

pub use baseline::{Baseline, BaselineEntry, MetricObservation};
pub use error::{HistoryError, HistoryResult};
pub use record::HistoryRecord;
pub use regression::{DEFAULT_THRESHOLD, RegressionDetector};
pub use store::{HistoryStore, JsonlStore, MemoryStore, SqliteStore};
pub use tracker::{HistoryTracker, QualitySnapshot};
pub use trend::{MetricTrend, TrendDirection, TrendReport, TrendSummary};
