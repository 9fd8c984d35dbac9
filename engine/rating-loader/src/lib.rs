//! # Rating Loader
//!
//! Turns per-player daily record files into key-aligned rating and rank
//! matrices, and defines the domain types shared by the cache and analytics
//! crates.
//!
//! ## Record files
//!
//! One file per player under `<data_dir>[/<suffix>]/<discipline>/<category>/`,
//! named `<COUNTRY>_<name>.csv`, one `YYYYMMDD,rank,rating` line per day.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rating_loader::{AllrounderRule, Category, Discipline, LoaderConfig, RecordLoader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = RecordLoader::new(LoaderConfig::new("./data"));
//!     let history = loader.load(Category::Batting, Discipline::Test, AllrounderRule::Product).await?;
//!     println!("{} days", history.day_count());
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod error;
pub mod loader;
pub mod matrix;
pub mod types;

pub use calendar::WindowKind;
pub use error::{ConfigError, LoaderError, Result};
pub use loader::{LoaderConfig, RecordLoader};
pub use matrix::{DailyMatrix, DayValues, RankMatrix, RatingHistory};
pub use types::{AllrounderRule, Category, ChangeCriteria, DailyRecord, Discipline, EntityKey};

/// Re-export so downstream crates agree on the date type
pub use chrono::NaiveDate;
