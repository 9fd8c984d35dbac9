//! # Change Filter
//!
//! Reduces a daily history to the dates on which something actually moved.

use rating_loader::{ChangeCriteria, DailyMatrix, NaiveDate, RatingHistory, WindowKind};
use std::collections::BTreeSet;
use tracing::info;

/// Selects the dates worth keeping under a [`ChangeCriteria`].
///
/// A date is kept when it is the first date of the series, when the set of
/// players differs from the previous date, when any value differs under the
/// chosen criterion, or when it is the first available date of a window of
/// `window_kind`.
#[derive(Debug, Clone, Copy)]
pub struct ChangeFilter {
    criteria: ChangeCriteria,
    window_kind: Option<WindowKind>,
}

impl ChangeFilter {
    pub fn new(criteria: ChangeCriteria, window_kind: Option<WindowKind>) -> Self {
        Self { criteria, window_kind }
    }

    pub fn criteria(&self) -> ChangeCriteria {
        self.criteria
    }

    pub fn select_dates(&self, history: &RatingHistory) -> BTreeSet<NaiveDate> {
        match self.criteria {
            ChangeCriteria::None => history.ratings.dates().collect(),
            ChangeCriteria::Rating => self.changed_dates(&history.ratings),
            ChangeCriteria::Rank => self.changed_dates(&history.ranks),
            ChangeCriteria::Either => {
                let ratings = self.changed_dates(&history.ratings);
                let ranks = self.changed_dates(&history.ranks);
                ratings.union(&ranks).copied().collect()
            }
            ChangeCriteria::Both => {
                let ratings = self.changed_dates(&history.ratings);
                let ranks = self.changed_dates(&history.ranks);
                ratings.intersection(&ranks).copied().collect()
            }
        }
    }

    /// Keep only the selected dates
    pub fn apply(&self, mut history: RatingHistory) -> RatingHistory {
        if self.criteria == ChangeCriteria::None {
            return history;
        }

        let before = history.day_count();
        let keep = self.select_dates(&history);
        history.retain_dates(&keep);

        info!(
            "Change filter ({}) kept {} of {} days",
            self.criteria,
            history.day_count(),
            before
        );

        history
    }

    fn changed_dates(&self, matrix: &DailyMatrix) -> BTreeSet<NaiveDate> {
        let mut selected = BTreeSet::new();
        let mut previous = None;

        for (date, day) in matrix.iter() {
            let keep = match previous {
                None => true,
                Some((prev_date, prev_day)) => {
                    day != prev_day || self.opens_window(prev_date, date)
                }
            };
            if keep {
                selected.insert(date);
            }
            previous = Some((date, day));
        }

        selected
    }

    fn opens_window(&self, previous: NaiveDate, date: NaiveDate) -> bool {
        self.window_kind.map_or(false, |kind| kind.window_start(previous) != kind.window_start(date))
    }
}
