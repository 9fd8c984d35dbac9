//! # Threshold Counting and Medal Calibration
//!
//! Counts how many players reach each rating threshold per window, summarises
//! those counts across windows, and picks the thresholds whose mean counts sit
//! closest to target medal counts (e.g. "about 2 players per year at gold").
//!
//! Calibration only annotates; it never changes the counts themselves.

use crate::aggregation::AggregateMatrix;
use crate::reducer::quantile;
use rating_loader::{ConfigError, NaiveDate};
use serde::{Deserialize, Serialize};

/// Highest rating a player can hold
pub const MAX_RATING: u32 = 1000;

const MEDAL_NAMES: [&str; 3] = ["gold", "silver", "bronze"];

/// Counts of one threshold, aligned with [`ThresholdCounts::windows`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRow {
    pub threshold: u32,
    pub counts: Vec<usize>,
}

/// Per-threshold, per-window player counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCounts {
    pub windows: Vec<NaiveDate>,
    pub rows: Vec<ThresholdRow>,
}

impl ThresholdCounts {
    pub fn count(&self, threshold: u32, window: NaiveDate) -> Option<usize> {
        let column = self.windows.iter().position(|w| *w == window)?;
        let row = self.rows.iter().find(|row| row.threshold == threshold)?;
        row.counts.get(column).copied()
    }

    /// Summary statistics of each threshold's counts across the windows.
    /// Empty when no window was requested.
    pub fn envelopes(&self) -> Vec<ThresholdEnvelope> {
        if self.windows.is_empty() {
            return Vec::new();
        }
        self.rows.iter().map(ThresholdEnvelope::from_row).collect()
    }
}

/// Distribution of one threshold's count across windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdEnvelope {
    pub threshold: u32,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl ThresholdEnvelope {
    fn from_row(row: &ThresholdRow) -> Self {
        let mut sorted: Vec<f64> = row.counts.iter().map(|c| *c as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            threshold: row.threshold,
            p10: quantile(&sorted, 0.10),
            p25: quantile(&sorted, 0.25),
            p50: quantile(&sorted, 0.50),
            p75: quantile(&sorted, 0.75),
            p90: quantile(&sorted, 0.90),
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        }
    }
}

/// A calibrated medal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medal {
    /// `gold`, `silver`, `bronze`, then `tier-4`, `tier-5`, ...
    pub tier: String,
    pub target: f64,
    pub threshold: u32,
    /// Mean count actually achieved at `threshold`
    pub mean_count: f64,
}

fn tier_label(index: usize) -> String {
    MEDAL_NAMES.get(index).map(|name| name.to_string()).unwrap_or_else(|| format!("tier-{}", index + 1))
}

/// Counts players at or above a fixed, ascending list of thresholds
#[derive(Debug, Clone)]
pub struct ThresholdClassifier {
    thresholds: Vec<u32>,
}

impl ThresholdClassifier {
    pub fn new(thresholds: Vec<u32>) -> Result<Self, ConfigError> {
        if thresholds.is_empty() {
            return Err(ConfigError::out_of_range("at least one threshold is required"));
        }
        if let Some(t) = thresholds.iter().find(|t| **t > MAX_RATING) {
            return Err(ConfigError::out_of_range(format!("threshold {t} exceeds maximum rating {MAX_RATING}")));
        }
        if thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::out_of_range("thresholds must be strictly ascending"));
        }
        Ok(Self { thresholds })
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Count players whose aggregated value is `>= threshold` in each window.
    ///
    /// `windows` defaults to every window of the aggregate; a requested window
    /// the aggregate does not hold counts zero.
    pub fn counts_by_threshold(&self, aggregate: &AggregateMatrix, windows: Option<&[NaiveDate]>) -> ThresholdCounts {
        let windows: Vec<NaiveDate> = match windows {
            Some(requested) => requested.to_vec(),
            None => aggregate.window_starts().collect(),
        };

        let rows = self
            .thresholds
            .iter()
            .map(|threshold| {
                let floor = *threshold as f64;
                let counts = windows
                    .iter()
                    .map(|start| {
                        aggregate.window(*start).map_or(0, |values| values.values().filter(|v| **v >= floor).count())
                    })
                    .collect();
                ThresholdRow { threshold: *threshold, counts }
            })
            .collect();

        tracing::debug!("Counted {} thresholds over {} windows", self.thresholds.len(), windows.len());

        ThresholdCounts { windows, rows }
    }
}

/// Pick, for each target mean count, the threshold whose mean count is
/// closest. Thresholds are walked from the most permissive upwards; on a tie
/// the less permissive threshold wins.
pub fn calibrate_medals(envelopes: &[ThresholdEnvelope], targets: &[f64]) -> Result<Vec<Medal>, ConfigError> {
    if let Some(bad) = targets.iter().find(|t| !(t.is_finite() && **t >= 0.0)) {
        return Err(ConfigError::out_of_range(format!("medal target {bad} must be a non-negative count")));
    }

    let mut ordered: Vec<&ThresholdEnvelope> = envelopes.iter().collect();
    ordered.sort_by_key(|envelope| envelope.threshold);

    let medals = targets
        .iter()
        .enumerate()
        .filter_map(|(index, target)| {
            let mut best: Option<(&ThresholdEnvelope, f64)> = None;
            for envelope in ordered.iter().copied() {
                let distance = (envelope.mean - target).abs();
                if best.map_or(true, |(_, closest)| distance <= closest) {
                    best = Some((envelope, distance));
                }
            }
            best.map(|(envelope, _)| Medal {
                tier: tier_label(index),
                target: *target,
                threshold: envelope.threshold,
                mean_count: envelope.mean,
            })
        })
        .collect();

    Ok(medals)
}
