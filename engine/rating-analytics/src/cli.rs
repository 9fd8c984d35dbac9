//! # Command Line Interface
//!
//! CLI for loading rating histories and printing windowed statistics as JSON
//! for reporting tools.

use crate::aggregation::WindowAggregator;
use crate::config::EngineConfig;
use crate::distribution::{Distribution, DistributionBinner};
use crate::engine::{LoadReport, LoadRequest, RatingEngine};
use crate::reducer::Reducer;
use crate::thresholds::{calibrate_medals, ThresholdClassifier, ThresholdCounts, ThresholdEnvelope};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rating_loader::{AllrounderRule, Category, ChangeCriteria, Discipline, NaiveDate, RatingHistory, WindowKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Rating history CLI
#[derive(Parser)]
#[command(name = "ratings-cli")]
#[command(about = "Windowed statistics over daily player rating histories")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root of the record files (overrides config and RATINGS_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Cache directory (overrides config and RATINGS_CACHE_DIR)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Dataset namespace below the data and cache directories
    #[arg(long)]
    pub dataset_suffix: Option<String>,

    /// Ignore cached artifacts and rebuild them from record files
    #[arg(long)]
    pub rebuild: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Configuration file (or defaults), then environment, then flags
    pub fn resolve_config(&self) -> Result<EngineConfig> {
        self.resolve_config_with(|name| std::env::var(name).ok())
    }

    /// Same as [`Cli::resolve_config`] with variables read from `lookup`
    pub fn resolve_config_with<F>(&self, lookup: F) -> Result<EngineConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load_from_file(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => EngineConfig::default(),
        };
        config.apply_overrides_from(lookup);

        if let Some(dir) = &self.data_dir {
            config.data.data_dir = dir.clone();
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.cache_dir = dir.clone();
        }
        if let Some(suffix) = &self.dataset_suffix {
            config.data.dataset_suffix = Some(suffix.clone()).filter(|s| !s.is_empty());
        }

        Ok(config)
    }
}

/// Load parameters; anything omitted falls back to the `[load]` section
#[derive(Args, Debug, Clone, Default)]
pub struct LoadArgs {
    /// batting | bowling | allrounder (or primary-skill | secondary-skill | composite)
    #[arg(long)]
    pub category: Option<Category>,

    /// test | odi | t20 (or long-form | mid-length | short-form)
    #[arg(long)]
    pub discipline: Option<Discipline>,

    /// none | rating | rank | either | both
    #[arg(long)]
    pub criteria: Option<ChangeCriteria>,

    /// Keep the first date of each window of this kind when filtering
    #[arg(long)]
    pub filter_window: Option<WindowKind>,

    /// product | geometric-mean
    #[arg(long)]
    pub allrounder_rule: Option<AllrounderRule>,

    /// First date to analyse (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last date to analyse (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Only players ranked at or above this position
    #[arg(long)]
    pub max_rank: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load (or rebuild) a rating history and report its size
    Load {
        #[command(flatten)]
        load: LoadArgs,
        /// Also print the rating and rank matrices
        #[arg(long)]
        full: bool,
    },
    /// Reduce every player's ratings per calendar window
    Aggregate {
        #[command(flatten)]
        load: LoadArgs,
        #[arg(long, default_value = "yearly")]
        window: WindowKind,
        #[arg(long, default_value = "max")]
        reducer: Reducer,
        /// Resolve the aggregate in effect on every source date
        #[arg(long)]
        carry_forward: bool,
    },
    /// Normalized rating histograms and percentile cut-points per window
    Distribution {
        #[command(flatten)]
        load: LoadArgs,
        #[arg(long)]
        window: Option<WindowKind>,
        /// Comma-separated bin edges
        #[arg(long, value_delimiter = ',')]
        stops: Option<Vec<f64>>,
        #[arg(long, conflicts_with = "entity_reducer")]
        bin_reducer: Option<Reducer>,
        #[arg(long)]
        entity_reducer: Option<Reducer>,
        /// Comma-separated percentiles, in percent
        #[arg(long, value_delimiter = ',')]
        percentiles: Option<Vec<f64>>,
    },
    /// Players at or above each threshold per window
    Thresholds {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
    },
    /// Calibrate medal thresholds against target mean counts
    Medals {
        #[command(flatten)]
        load: LoadArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        /// Comma-separated target mean counts, best medal first
        #[arg(long, value_delimiter = ',')]
        targets: Option<Vec<f64>>,
    },
    /// List cached artifacts of the dataset
    CacheList,
    /// Remove cached artifacts of the dataset
    CacheClear,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ThresholdArgs {
    #[arg(long)]
    pub window: Option<WindowKind>,
    /// Comma-separated ascending thresholds
    #[arg(long, value_delimiter = ',')]
    pub thresholds: Option<Vec<u32>>,
    /// Collapses each player's window before comparing
    #[arg(long)]
    pub reducer: Option<Reducer>,
}

#[derive(Serialize)]
struct Output<'a, T: Serialize> {
    load: &'a LoadReport,
    result: T,
}

/// CLI handler
pub struct CliHandler {
    engine: RatingEngine,
    rebuild: bool,
}

impl CliHandler {
    pub fn new(config: EngineConfig, rebuild: bool) -> Result<Self> {
        let engine = RatingEngine::new(config).context("invalid configuration")?;
        Ok(Self { engine, rebuild })
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Load { load, full } => {
                let (history, report) = self.history(&load).await?;
                if full {
                    print_json(&Output { load: &report, result: &history })
                } else {
                    print_json(&report)
                }
            }
            Commands::Aggregate { load, window, reducer, carry_forward } => {
                let (history, report) = self.history(&load).await?;
                let aggregate = WindowAggregator::new(window, reducer).aggregate(&history.ratings);
                if carry_forward {
                    print_json(&Output { load: &report, result: aggregate.carry_forward() })
                } else {
                    print_json(&Output { load: &report, result: &aggregate })
                }
            }
            Commands::Distribution { load, window, stops, bin_reducer, entity_reducer, percentiles } => {
                let settings = &self.engine.config().distribution;
                let mut params = settings.binning_params();
                if let Some(stops) = stops {
                    params.stops = stops;
                }
                if bin_reducer.is_some() || entity_reducer.is_some() {
                    params.bin_reducer = bin_reducer;
                    params.entity_reducer = entity_reducer;
                }
                let window = window.unwrap_or(settings.window_kind);
                let percentiles = percentiles.unwrap_or_else(|| settings.percentiles.clone());
                let binner = DistributionBinner::new(params)?;

                let (history, report) = self.history(&load).await?;
                let result = DistributionResult {
                    distributions: binner.bucketize(&history.ratings, window),
                    percentiles: &percentiles,
                    cut_points: binner.percentiles(&history.ratings, window, &percentiles)?,
                };
                print_json(&Output { load: &report, result })
            }
            Commands::Thresholds { load, thresholds } => {
                let (classifier, window, reducer) = self.classifier(thresholds)?;
                let (history, report) = self.history(&load).await?;
                let aggregate = WindowAggregator::new(window, reducer).aggregate(&history.ratings);
                let counts = classifier.counts_by_threshold(&aggregate, None);
                let result = ThresholdResult { envelopes: counts.envelopes(), counts };
                print_json(&Output { load: &report, result })
            }
            Commands::Medals { load, thresholds, targets } => {
                let targets = targets.unwrap_or_else(|| self.engine.config().thresholds.medal_targets.clone());
                let (classifier, window, reducer) = self.classifier(thresholds)?;
                let (history, report) = self.history(&load).await?;
                let aggregate = WindowAggregator::new(window, reducer).aggregate(&history.ratings);
                let envelopes = classifier.counts_by_threshold(&aggregate, None).envelopes();
                let medals = calibrate_medals(&envelopes, &targets)?;
                print_json(&Output { load: &report, result: medals })
            }
            Commands::CacheList => {
                let entries = self.engine.cache_entries(self.dataset_suffix()).await?;
                print_json(&entries)
            }
            Commands::CacheClear => {
                let removed = self.engine.clear_cache(self.dataset_suffix()).await?;
                print_json(&BTreeMap::from([("removed", removed)]))
            }
        }
    }

    fn dataset_suffix(&self) -> Option<&str> {
        self.engine.config().data.dataset_suffix.as_deref()
    }

    fn request(&self, args: &LoadArgs) -> LoadRequest {
        let mut request = LoadRequest::from_config(self.engine.config()).force_rebuild(self.rebuild);
        if let Some(category) = args.category {
            request.category = category;
        }
        if let Some(discipline) = args.discipline {
            request.discipline = discipline;
        }
        if let Some(criteria) = args.criteria {
            request.change_criteria = criteria;
        }
        if let Some(window) = args.filter_window {
            request.window_kind = Some(window);
        }
        if let Some(rule) = args.allrounder_rule {
            request.allrounder_rule = rule;
        }
        request
    }

    /// Load through the engine, then narrow to the requested dates and ranks
    async fn history(&self, args: &LoadArgs) -> Result<(RatingHistory, LoadReport)> {
        let request = self.request(args);
        let (mut history, report) = self
            .engine
            .load_with_report(&request)
            .await
            .with_context(|| format!("loading {}", request.cache_key()))?;

        let settings = &self.engine.config().load;
        let from = args.from.or(settings.start_date);
        let to = args.to.or(settings.end_date);
        if from.is_some() || to.is_some() {
            history.restrict(from, to);
        }
        if let Some(max_rank) = args.max_rank.or(settings.max_rank) {
            anyhow::ensure!(max_rank >= 1, "max rank must be at least 1");
            history.restrict_to_rank(max_rank);
        }

        Ok((history, report))
    }

    fn classifier(&self, args: ThresholdArgs) -> Result<(ThresholdClassifier, WindowKind, Reducer)> {
        let settings = &self.engine.config().thresholds;
        let thresholds = args.thresholds.unwrap_or_else(|| settings.thresholds.clone());
        let classifier = ThresholdClassifier::new(thresholds)?;
        Ok((classifier, args.window.unwrap_or(settings.window_kind), args.reducer.unwrap_or(settings.reducer)))
    }
}

#[derive(Serialize)]
struct DistributionResult<'a> {
    distributions: BTreeMap<NaiveDate, Distribution>,
    percentiles: &'a [f64],
    cut_points: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

#[derive(Serialize)]
struct ThresholdResult {
    counts: ThresholdCounts,
    envelopes: Vec<ThresholdEnvelope>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value).context("serializing output")?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ENV_CACHE_DIR, ENV_DATA_DIR};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_distribution_command() {
        let cli = Cli::try_parse_from([
            "ratings-cli",
            "--data-dir",
            "/srv/ratings",
            "--rebuild",
            "distribution",
            "--category",
            "composite",
            "--stops",
            "500,600,700,800",
            "--entity-reducer",
            "p90",
        ])
        .unwrap();

        assert!(cli.rebuild);
        match cli.command {
            Commands::Distribution { load, stops, entity_reducer, bin_reducer, .. } => {
                assert_eq!(load.category, Some(Category::Allrounder));
                assert_eq!(stops, Some(vec![500.0, 600.0, 700.0, 800.0]));
                assert_eq!(entity_reducer, Some(Reducer::Percentile(90)));
                assert_eq!(bin_reducer, None);
            }
            _ => panic!("expected distribution command"),
        }
    }

    #[test]
    fn test_conflicting_reducers_are_rejected() {
        let result = Cli::try_parse_from([
            "ratings-cli",
            "distribution",
            "--bin-reducer",
            "avg",
            "--entity-reducer",
            "max",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        assert!(Cli::try_parse_from(["ratings-cli", "load", "--discipline", "hundred"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "ratings-cli",
            "--cache-dir",
            "/tmp/ratings-cache",
            "--dataset-suffix",
            "_women",
            "cache-list",
        ])
        .unwrap();
        let config = cli
            .resolve_config_with(|name| match name {
                ENV_DATA_DIR => Some("/srv/ratings".to_string()),
                ENV_CACHE_DIR => Some("/srv/ratings-cache".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.data.data_dir, PathBuf::from("/srv/ratings"));
        assert_eq!(config.cache.cache_dir, PathBuf::from("/tmp/ratings-cache"));
        assert_eq!(config.data.dataset_suffix.as_deref(), Some("_women"));

        let defaults = Cli::try_parse_from(["ratings-cli", "cache-list"]).unwrap().resolve_config_with(|_| None).unwrap();
        assert_eq!(defaults.data.data_dir, EngineConfig::default().data.data_dir);
        assert_eq!(defaults.data.dataset_suffix, None);
    }
}
