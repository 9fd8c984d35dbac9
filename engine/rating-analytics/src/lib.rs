//! # Rating Analytics
//!
//! Windowed statistics over daily player rating histories.
//!
//! The pipeline is linear: [`RatingEngine::load`] resolves a [`LoadRequest`]
//! to a filtered [`RatingHistory`](rating_loader::RatingHistory) through the
//! artifact cache; the history is then handed to one of
//!
//! - [`WindowAggregator`] for per-window reductions of every player,
//! - [`DistributionBinner`] for normalized histograms and percentile cut-points,
//! - [`ThresholdClassifier`] for threshold counts, envelopes and medal lines.
//!
//! Every stage takes explicit parameters and returns plain maps keyed by
//! date; nothing is read from global state.
//!
//! ```rust,no_run
//! use rating_analytics::{EngineConfig, LoadRequest, RatingEngine, Reducer, WindowAggregator};
//! use rating_loader::{Category, ChangeCriteria, Discipline, WindowKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = RatingEngine::new(EngineConfig::default())?;
//!     let request = LoadRequest::new(Category::Batting, Discipline::Test)
//!         .with_change_criteria(ChangeCriteria::Rating, Some(WindowKind::Yearly));
//!     let history = engine.load(&request).await?;
//!
//!     let yearly = WindowAggregator::new(WindowKind::Yearly, Reducer::Max).aggregate(&history.ratings);
//!     println!("{} yearly windows", yearly.len());
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod change_filter;
pub mod cli;
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod logging;
pub mod reducer;
pub mod thresholds;

pub use aggregation::{AggregateMatrix, WindowAggregator, WindowValues};
pub use change_filter::ChangeFilter;
pub use config::EngineConfig;
pub use distribution::{histogram, BinningParams, Distribution, DistributionBinner};
pub use engine::{LoadReport, LoadRequest, RatingEngine};
pub use error::{EngineError, Result};
pub use reducer::Reducer;
pub use thresholds::{calibrate_medals, Medal, ThresholdClassifier, ThresholdCounts, ThresholdEnvelope};
