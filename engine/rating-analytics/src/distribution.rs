//! # Distribution Binning
//!
//! Normalized rating histograms per calendar window, and percentile
//! cut-points read off a finer histogram.
//!
//! Two reduction levels are supported, exactly one per request:
//!
//! - **bin level**: every date is histogrammed and normalized on its own, then
//!   each bin's sequence of daily shares is reduced across the window;
//! - **entity level**: each player's daily values are first reduced across the
//!   window, and the window histogram is built once from those values.

use crate::aggregation::WindowAggregator;
use crate::reducer::Reducer;
use rating_loader::{ConfigError, DailyMatrix, NaiveDate, WindowKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of bins in the grid used for percentile extraction
pub const FINE_BIN_COUNT: usize = 100;

/// Conventional total of a normalized distribution
pub const DEFAULT_NORMALIZATION: f64 = 100.0;

const TOLERANCE: f64 = 1e-9;

/// Bin layout and reduction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningParams {
    /// Increasing bin edges; `n` stops make `n - 1` bins
    pub stops: Vec<f64>,
    /// Reduce each bin's daily shares across the window
    pub bin_reducer: Option<Reducer>,
    /// Reduce each player's values across the window before binning
    pub entity_reducer: Option<Reducer>,
    /// Total every produced distribution sums to
    pub normalization: f64,
}

impl Default for BinningParams {
    fn default() -> Self {
        Self {
            stops: (0..=10).map(|i| i as f64 * 100.0).collect(),
            bin_reducer: Some(Reducer::Avg),
            entity_reducer: None,
            normalization: DEFAULT_NORMALIZATION,
        }
    }
}

impl BinningParams {
    pub fn bin_level(stops: Vec<f64>, reducer: Reducer) -> Self {
        Self { stops, bin_reducer: Some(reducer), entity_reducer: None, normalization: DEFAULT_NORMALIZATION }
    }

    pub fn entity_level(stops: Vec<f64>, reducer: Reducer) -> Self {
        Self { stops, bin_reducer: None, entity_reducer: Some(reducer), normalization: DEFAULT_NORMALIZATION }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stops.len() < 2 {
            return Err(ConfigError::out_of_range("at least two bin stops are required"));
        }
        if self.stops.iter().any(|s| !s.is_finite()) {
            return Err(ConfigError::out_of_range("bin stops must be finite"));
        }
        if self.stops.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::out_of_range("bin stops must be strictly increasing"));
        }
        if !(self.normalization.is_finite() && self.normalization > 0.0) {
            return Err(ConfigError::out_of_range(format!(
                "normalization must be positive, got {}",
                self.normalization
            )));
        }
        match (self.bin_reducer, self.entity_reducer) {
            (Some(_), Some(_)) => Err(ConfigError::inconsistent(
                "choose either a bin-level or an entity-level reducer, not both",
            )),
            (None, None) => Err(ConfigError::inconsistent("a bin-level or entity-level reducer is required")),
            _ => Ok(()),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.stops.len() - 1
    }

    /// Same reducers and normalization on an evenly spaced grid of
    /// [`FINE_BIN_COUNT`] bins spanning the outer stops
    fn fine(&self) -> Self {
        let low = self.stops[0];
        let high = self.stops[self.stops.len() - 1];
        let width = (high - low) / FINE_BIN_COUNT as f64;
        let mut stops: Vec<f64> = (0..FINE_BIN_COUNT).map(|i| low + width * i as f64).collect();
        stops.push(high);
        Self { stops, ..self.clone() }
    }
}

/// Normalized distribution of one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    /// Per-bin totals summing to the normalization constant
    pub totals: Vec<f64>,
    /// Dates (bin level) or players (entity level) that contributed
    pub samples: usize,
}

impl Distribution {
    pub fn sum(&self) -> f64 {
        self.totals.iter().sum()
    }
}

/// Count values into bins. Bins are closed-open except the last, which is
/// closed; values outside the outer stops are not counted.
pub fn histogram<I>(values: I, stops: &[f64]) -> Vec<u32>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts = vec![0u32; stops.len().saturating_sub(1)];
    if counts.is_empty() {
        return counts;
    }

    let last = stops[stops.len() - 1];
    for value in values {
        if value < stops[0] || value > last {
            continue;
        }
        let bin = if value == last { counts.len() - 1 } else { stops.partition_point(|s| *s <= value) - 1 };
        counts[bin] += 1;
    }
    counts
}

/// Scale `values` so they sum to `total`; `None` when they sum to zero
fn normalize(values: &[f64], total: f64) -> Option<Vec<f64>> {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return None;
    }
    Some(values.iter().map(|v| v * total / sum).collect())
}

/// Builds per-window distributions from a daily matrix
#[derive(Debug, Clone)]
pub struct DistributionBinner {
    params: BinningParams,
}

impl DistributionBinner {
    pub fn new(params: BinningParams) -> Result<Self, ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &BinningParams {
        &self.params
    }

    /// One normalized distribution per window holding in-range data.
    /// Windows without any value inside the stops are absent. A bin reducer
    /// that zeroes every bin of a window falls back to the pooled daily shares.
    pub fn bucketize(&self, matrix: &DailyMatrix, window_kind: WindowKind) -> BTreeMap<NaiveDate, Distribution> {
        let distributions = match (self.params.entity_reducer, self.params.bin_reducer) {
            (Some(reducer), _) => self.bucketize_entities(matrix, window_kind, reducer),
            (None, Some(reducer)) => self.bucketize_bins(matrix, window_kind, reducer),
            (None, None) => BTreeMap::new(),
        };

        tracing::debug!(
            "Built {} {} distributions over {} bins",
            distributions.len(),
            window_kind,
            self.params.bin_count()
        );

        distributions
    }

    fn bucketize_bins(
        &self,
        matrix: &DailyMatrix,
        window_kind: WindowKind,
        reducer: Reducer,
    ) -> BTreeMap<NaiveDate, Distribution> {
        let mut daily_shares: BTreeMap<NaiveDate, Vec<Vec<f64>>> = BTreeMap::new();
        for (date, day) in matrix.iter() {
            let counts = histogram(day.values().map(|v| *v as f64), &self.params.stops);
            let counts: Vec<f64> = counts.into_iter().map(f64::from).collect();
            if let Some(shares) = normalize(&counts, self.params.normalization) {
                daily_shares.entry(window_kind.window_start(date)).or_default().push(shares);
            }
        }

        let bins = self.params.bin_count();
        let normalization = self.params.normalization;
        daily_shares
            .into_iter()
            .filter_map(|(start, days)| {
                let reduce_with = |reducer: Reducer| -> Vec<f64> {
                    (0..bins)
                        .map(|bin| {
                            let series: Vec<f64> = days.iter().map(|shares| shares[bin]).collect();
                            reducer.reduce(&series).unwrap_or(0.0)
                        })
                        .collect()
                };
                // Per-bin reducers other than avg/first/last do not preserve the total.
                let totals = match normalize(&reduce_with(reducer), normalization) {
                    Some(totals) => totals,
                    None => {
                        tracing::warn!(
                            "{} reducer left no mass in the {} window starting {}; using pooled daily shares",
                            reducer,
                            window_kind,
                            start
                        );
                        normalize(&reduce_with(Reducer::Avg), normalization)?
                    }
                };
                Some((start, Distribution { totals, samples: days.len() }))
            })
            .collect()
    }

    fn bucketize_entities(
        &self,
        matrix: &DailyMatrix,
        window_kind: WindowKind,
        reducer: Reducer,
    ) -> BTreeMap<NaiveDate, Distribution> {
        let aggregate = WindowAggregator::new(window_kind, reducer).aggregate(matrix);
        aggregate
            .windows
            .into_iter()
            .filter_map(|(start, values)| {
                let counts = histogram(values.values().copied(), &self.params.stops);
                let samples = counts.iter().map(|c| *c as usize).sum();
                let counts: Vec<f64> = counts.into_iter().map(f64::from).collect();
                let totals = normalize(&counts, self.params.normalization)?;
                Some((start, Distribution { totals, samples }))
            })
            .collect()
    }

    /// Percentile cut-points per window, read off a 100-bin grid.
    ///
    /// Normalized mass is accumulated from the lowest bin upwards; the lower
    /// edge of the first bin whose cumulative share reaches `p` percent is
    /// reported. A target that is never reached yields `None`.
    pub fn percentiles(
        &self,
        matrix: &DailyMatrix,
        window_kind: WindowKind,
        requested: &[f64],
    ) -> Result<BTreeMap<NaiveDate, Vec<Option<f64>>>, ConfigError> {
        if let Some(bad) = requested.iter().find(|p| !(**p > 0.0 && **p <= 100.0)) {
            return Err(ConfigError::out_of_range(format!("percentile {bad} must be within (0, 100]")));
        }

        let fine = DistributionBinner { params: self.params.fine() };
        let normalization = self.params.normalization;
        let result = fine
            .bucketize(matrix, window_kind)
            .into_iter()
            .map(|(start, distribution)| {
                let cuts = requested
                    .iter()
                    .map(|p| cut_point(&distribution.totals, &fine.params.stops, p / 100.0 * normalization))
                    .collect();
                (start, cuts)
            })
            .collect();

        Ok(result)
    }
}

fn cut_point(totals: &[f64], stops: &[f64], target: f64) -> Option<f64> {
    let mut cumulative = 0.0;
    for (bin, share) in totals.iter().enumerate() {
        cumulative += share;
        if cumulative >= target - TOLERANCE {
            return Some(stops[bin]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rating_loader::EntityKey;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2012, m, day).unwrap()
    }

    fn day_matrix(rows: &[(NaiveDate, &[u32])]) -> DailyMatrix {
        let mut matrix = DailyMatrix::new();
        for (date, values) in rows {
            for (i, value) in values.iter().enumerate() {
                matrix.insert(*date, EntityKey::new("WI", &format!("player {i}")), *value);
            }
        }
        matrix
    }

    #[test]
    fn test_histogram_raw_counts() {
        let counts = histogram([550.0, 550.0, 650.0, 750.0, 750.0, 750.0], &[500.0, 600.0, 700.0, 800.0]);
        assert_eq!(counts, vec![2, 1, 3]);
    }

    #[test]
    fn test_histogram_edges() {
        let stops = [0.0, 10.0, 20.0];
        assert_eq!(histogram([0.0, 10.0, 20.0], &stops), vec![1, 2]);
        assert_eq!(histogram([-1.0, 20.5], &stops), vec![0, 0]);
        assert!(histogram([1.0], &[5.0]).is_empty());
    }

    #[test]
    fn test_params_validation() {
        assert!(BinningParams::default().validate().is_ok());
        assert!(BinningParams::bin_level(vec![500.0], Reducer::Avg).validate().is_err());
        assert!(BinningParams::bin_level(vec![500.0, 500.0], Reducer::Avg).validate().is_err());

        let both = BinningParams { entity_reducer: Some(Reducer::Max), ..BinningParams::default() };
        assert!(matches!(both.validate(), Err(ConfigError::Inconsistent(_))));

        let neither = BinningParams { bin_reducer: None, ..BinningParams::default() };
        assert!(matches!(neither.validate(), Err(ConfigError::Inconsistent(_))));

        let zero = BinningParams { normalization: 0.0, ..BinningParams::default() };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_bin_level_totals_sum_to_normalization() {
        let matrix = day_matrix(&[
            (d(1, 2), &[550, 550, 650, 750, 750, 750]),
            (d(1, 3), &[550, 650]),
            (d(2, 1), &[790, 510, 600]),
        ]);
        for reducer in [Reducer::Avg, Reducer::Median, Reducer::Max, Reducer::Min, Reducer::Percentile(30)] {
            let binner = DistributionBinner::new(BinningParams::bin_level(vec![500.0, 600.0, 700.0, 800.0], reducer))
                .unwrap();
            let distributions = binner.bucketize(&matrix, WindowKind::Monthly);
            assert_eq!(distributions.len(), 2);
            for distribution in distributions.values() {
                assert!((distribution.sum() - 100.0).abs() < 1e-6, "{reducer}: {:?}", distribution);
            }
        }
    }

    #[test]
    fn test_bin_level_average_of_daily_shares() {
        let matrix = day_matrix(&[(d(1, 2), &[550, 550, 650, 750]), (d(1, 3), &[750, 750])]);
        let binner =
            DistributionBinner::new(BinningParams::bin_level(vec![500.0, 600.0, 700.0, 800.0], Reducer::Avg)).unwrap();
        let window = &binner.bucketize(&matrix, WindowKind::Yearly)[&d(1, 1)];
        assert_eq!(window.samples, 2);
        assert_eq!(window.totals, vec![25.0, 12.5, 62.5]);
    }

    #[test]
    fn test_bin_reducer_without_mass_falls_back_to_pooled_shares() {
        let mut matrix = DailyMatrix::new();
        let player = EntityKey::new("SA", "a");
        matrix.insert(d(1, 2), player.clone(), 550);
        matrix.insert(d(1, 3), player, 650);

        for reducer in [Reducer::Min, Reducer::Percentile(10)] {
            let binner =
                DistributionBinner::new(BinningParams::bin_level(vec![500.0, 600.0, 700.0], reducer)).unwrap();
            let distributions = binner.bucketize(&matrix, WindowKind::Yearly);
            assert_eq!(distributions.len(), 1, "{reducer}");
            let window = &distributions[&d(1, 1)];
            assert_eq!(window.samples, 2);
            assert_eq!(window.totals, vec![50.0, 50.0]);
        }
    }

    #[test]
    fn test_entity_level_reduces_players_first() {
        let mut matrix = DailyMatrix::new();
        let a = EntityKey::new("NZ", "a");
        let b = EntityKey::new("NZ", "b");
        matrix.insert(d(3, 1), a.clone(), 550);
        matrix.insert(d(3, 2), a, 750);
        matrix.insert(d(3, 1), b.clone(), 650);
        matrix.insert(d(3, 2), b, 640);

        let binner =
            DistributionBinner::new(BinningParams::entity_level(vec![500.0, 600.0, 700.0, 800.0], Reducer::Max))
                .unwrap();
        let window = &binner.bucketize(&matrix, WindowKind::Yearly)[&d(1, 1)];
        assert_eq!(window.samples, 2);
        assert_eq!(window.totals, vec![0.0, 50.0, 50.0]);
    }

    #[test]
    fn test_window_without_in_range_values_is_absent() {
        let matrix = day_matrix(&[(d(1, 2), &[100, 200])]);
        let binner =
            DistributionBinner::new(BinningParams::bin_level(vec![500.0, 600.0], Reducer::Avg)).unwrap();
        assert!(binner.bucketize(&matrix, WindowKind::Yearly).is_empty());
    }

    #[test]
    fn test_percentiles_are_monotonic_nearest_bin() {
        let values: Vec<u32> = (0..20).map(|i| 500 + i * 20).collect();
        let matrix = day_matrix(&[(d(6, 1), &values)]);
        let binner = DistributionBinner::new(BinningParams::default()).unwrap();

        let cuts = binner.percentiles(&matrix, WindowKind::Yearly, &[10.0, 50.0, 75.0, 90.0]).unwrap();
        let window = &cuts[&d(1, 1)];
        let cuts: Vec<f64> = window.iter().map(|c| c.unwrap()).collect();
        assert!(cuts.windows(2).all(|pair| pair[0] <= pair[1]));
        // 20 values in 10-point bins: the 10th value (680) completes 50%
        assert_eq!(cuts[1], 680.0);
        assert_eq!(cuts[0], 520.0);
    }

    #[test]
    fn test_percentiles_reject_bad_targets() {
        let binner = DistributionBinner::new(BinningParams::default()).unwrap();
        assert!(binner.percentiles(&DailyMatrix::new(), WindowKind::Yearly, &[0.0]).is_err());
        assert!(binner.percentiles(&DailyMatrix::new(), WindowKind::Yearly, &[101.0]).is_err());
        assert!(binner.percentiles(&DailyMatrix::new(), WindowKind::Yearly, &[50.0]).unwrap().is_empty());
    }

    #[test]
    fn test_cut_point_not_reached() {
        assert_eq!(cut_point(&[10.0, 20.0], &[0.0, 1.0, 2.0], 50.0), None);
        assert_eq!(cut_point(&[10.0, 40.0], &[0.0, 1.0, 2.0], 50.0), Some(1.0));
    }
}
