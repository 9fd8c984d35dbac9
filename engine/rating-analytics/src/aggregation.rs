//! # Window Aggregation
//!
//! Buckets daily values into calendar windows and reduces each player's
//! bucket to a single number.
//!
//! The daily matrix is walked in date order. Values accumulate per player
//! until the first date of the next window is reached; the bucket is then
//! reduced and published under the start of the window it belongs to. The
//! last window is closed with whatever data it has, even if the series ends
//! mid-window.

use crate::reducer::Reducer;
use rating_loader::{DailyMatrix, EntityKey, NaiveDate, WindowKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reduced value of every player in one window
pub type WindowValues = BTreeMap<EntityKey, f64>;

/// Window start -> player -> reduced value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMatrix {
    pub window_kind: WindowKind,
    pub windows: BTreeMap<NaiveDate, WindowValues>,
    /// Dates of the daily matrix the aggregate was built from
    pub source_dates: Vec<NaiveDate>,
}

impl AggregateMatrix {
    pub fn window(&self, start: NaiveDate) -> Option<&WindowValues> {
        self.windows.get(&start)
    }

    pub fn window_starts(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.windows.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Aggregate in effect on `date`: the latest window starting at or
    /// before it. Dates between window starts carry the last window forward.
    pub fn snapshot_at(&self, date: NaiveDate) -> Option<(NaiveDate, &WindowValues)> {
        self.windows.range(..=date).next_back().map(|(start, values)| (*start, values))
    }

    /// Materialize the carry-forward view for every source date
    pub fn carry_forward(&self) -> BTreeMap<NaiveDate, WindowValues> {
        self.source_dates
            .iter()
            .filter_map(|date| self.snapshot_at(*date).map(|(_, values)| (*date, values.clone())))
            .collect()
    }
}

/// Reduces a daily matrix into calendar windows
#[derive(Debug, Clone, Copy)]
pub struct WindowAggregator {
    window_kind: WindowKind,
    reducer: Reducer,
}

impl WindowAggregator {
    pub fn new(window_kind: WindowKind, reducer: Reducer) -> Self {
        Self { window_kind, reducer }
    }

    pub fn aggregate(&self, matrix: &DailyMatrix) -> AggregateMatrix {
        let mut windows = BTreeMap::new();
        let mut bucket: BTreeMap<&EntityKey, Vec<f64>> = BTreeMap::new();
        let mut current: Option<NaiveDate> = None;

        for (date, day) in matrix.iter() {
            let start = self.window_kind.window_start(date);
            if let Some(open) = current.filter(|open| *open != start) {
                windows.insert(open, self.close(&mut bucket));
            }
            current = Some(start);

            for (entity, value) in day {
                bucket.entry(entity).or_default().push(*value as f64);
            }
        }

        if let Some(open) = current {
            windows.insert(open, self.close(&mut bucket));
        }

        tracing::debug!(
            "Aggregated {} days into {} {} windows ({})",
            matrix.len(),
            windows.len(),
            self.window_kind,
            self.reducer
        );

        AggregateMatrix { window_kind: self.window_kind, windows, source_dates: matrix.dates().collect() }
    }

    fn close(&self, bucket: &mut BTreeMap<&EntityKey, Vec<f64>>) -> WindowValues {
        let closed = bucket
            .iter()
            .filter_map(|(entity, values)| self.reducer.reduce(values).map(|v| ((*entity).clone(), v)))
            .collect();
        bucket.clear();
        closed
    }
}
