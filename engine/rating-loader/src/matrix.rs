//! # Rating Matrices
//!
//! `date -> entity -> value` tables. Ratings and ranks are stored in two
//! key-aligned matrices that together form a [`RatingHistory`].
//!
//! B-tree maps keep iteration (and therefore serialization) deterministic.
//! The "best first" presentation order is re-derived on demand and is never
//! stored.

use crate::error::{LoaderError, Result};
use crate::types::EntityKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Values of every entity present on one date
pub type DayValues = BTreeMap<EntityKey, u32>;

/// Per-date, per-entity integer values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMatrix {
    days: BTreeMap<NaiveDate, DayValues>,
}

/// Same shape as [`DailyMatrix`], carrying ranks instead of ratings
pub type RankMatrix = DailyMatrix;

impl DailyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, entity: EntityKey, value: u32) {
        self.days.entry(date).or_default().insert(entity, value);
    }

    /// Register a date even if no entity has a value on it
    pub fn ensure_date(&mut self, date: NaiveDate) {
        self.days.entry(date).or_default();
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayValues> {
        self.days.get(&date)
    }

    pub fn value(&self, date: NaiveDate, entity: &EntityKey) -> Option<u32> {
        self.days.get(&date).and_then(|day| day.get(entity)).copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &DayValues)> {
        self.days.iter().map(|(date, day)| (*date, day))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Distinct entities across all dates
    pub fn entities(&self) -> BTreeSet<&EntityKey> {
        self.days.values().flat_map(|day| day.keys()).collect()
    }

    /// Entries of one date ordered by value, highest first
    pub fn ranked_desc(&self, date: NaiveDate) -> Vec<(&EntityKey, u32)> {
        let mut entries = self.entries(date);
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Entries of one date ordered by value, lowest first
    pub fn ranked_asc(&self, date: NaiveDate) -> Vec<(&EntityKey, u32)> {
        let mut entries = self.entries(date);
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    fn entries(&self, date: NaiveDate) -> Vec<(&EntityKey, u32)> {
        self.days
            .get(&date)
            .map(|day| day.iter().map(|(entity, value)| (entity, *value)).collect())
            .unwrap_or_default()
    }

    pub fn retain_dates(&mut self, keep: &BTreeSet<NaiveDate>) {
        self.days.retain(|date, _| keep.contains(date));
    }

    pub fn retain_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.days.retain(|date, _| {
            start.map_or(true, |start| *date >= start) && end.map_or(true, |end| *date <= end)
        });
    }

    pub fn retain_entries<F>(&mut self, mut keep: F)
    where
        F: FnMut(NaiveDate, &EntityKey) -> bool,
    {
        for (date, day) in self.days.iter_mut() {
            day.retain(|entity, _| keep(*date, entity));
        }
    }
}

impl FromIterator<(NaiveDate, EntityKey, u32)> for DailyMatrix {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, EntityKey, u32)>>(iter: I) -> Self {
        let mut matrix = DailyMatrix::new();
        for (date, entity, value) in iter {
            matrix.insert(date, entity, value);
        }
        matrix
    }
}

/// Key-aligned rating and rank matrices for one category/discipline pair
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingHistory {
    pub ratings: DailyMatrix,
    pub ranks: RankMatrix,
}

impl RatingHistory {
    pub fn new(ratings: DailyMatrix, ranks: RankMatrix) -> Self {
        Self { ratings, ranks }
    }

    /// Check that both matrices carry the same dates and, per date, the same
    /// entity keys.
    pub fn validate(&self) -> Result<()> {
        if self.ratings.len() != self.ranks.len() || !self.ratings.dates().eq(self.ranks.dates()) {
            let rating_dates: BTreeSet<_> = self.ratings.dates().collect();
            let rank_dates: BTreeSet<_> = self.ranks.dates().collect();
            let first_diff = rating_dates.symmetric_difference(&rank_dates).next().copied();
            return Err(LoaderError::integrity(format!(
                "rating matrix has {} dates, rank matrix has {}; first mismatch at {:?}",
                rating_dates.len(),
                rank_dates.len(),
                first_diff
            )));
        }

        for ((date, ratings), (_, ranks)) in self.ratings.iter().zip(self.ranks.iter()) {
            if !ratings.keys().eq(ranks.keys()) {
                return Err(LoaderError::integrity(format!(
                    "entity keys differ on {date}: {} ratings vs {} ranks",
                    ratings.len(),
                    ranks.len()
                )));
            }
        }

        Ok(())
    }

    pub fn retain_dates(&mut self, keep: &BTreeSet<NaiveDate>) {
        self.ratings.retain_dates(keep);
        self.ranks.retain_dates(keep);
    }

    /// Clip both matrices to the inclusive range `[start, end]`
    pub fn restrict(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.ratings.retain_range(start, end);
        self.ranks.retain_range(start, end);
    }

    /// Keep only entities ranked `max_rank` or better on each date
    pub fn restrict_to_rank(&mut self, max_rank: u32) {
        let ranks = &self.ranks;
        self.ratings.retain_entries(|date, entity| {
            ranks.value(date, entity).map_or(false, |rank| rank <= max_rank)
        });
        for (_, day) in self.ranks.days.iter_mut() {
            day.retain(|_, rank| *rank <= max_rank);
        }
    }

    pub fn day_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn entity_count(&self) -> usize {
        self.ratings.entities().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn key(name: &str) -> EntityKey {
        EntityKey::new("AUS", name)
    }

    fn sample() -> RatingHistory {
        let ratings: DailyMatrix = vec![
            (d(1), key("a"), 700),
            (d(1), key("b"), 650),
            (d(2), key("a"), 720),
            (d(2), key("b"), 760),
        ]
        .into_iter()
        .collect();
        let ranks: RankMatrix =
            vec![(d(1), key("a"), 1), (d(1), key("b"), 2), (d(2), key("a"), 2), (d(2), key("b"), 1)]
                .into_iter()
                .collect();
        RatingHistory::new(ratings, ranks)
    }

    #[test]
    fn test_validate_accepts_aligned_matrices() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_date_mismatch() {
        let mut history = sample();
        history.ranks.insert(d(3), key("a"), 1);
        assert!(matches!(history.validate(), Err(LoaderError::Integrity(_))));
    }

    #[test]
    fn test_validate_rejects_entity_mismatch() {
        let mut history = sample();
        history.ratings.insert(d(2), key("c"), 500);
        assert!(matches!(history.validate(), Err(LoaderError::Integrity(_))));
    }

    #[test]
    fn test_presentation_order_is_derived() {
        let history = sample();
        let best: Vec<_> = history.ratings.ranked_desc(d(2)).into_iter().map(|(k, _)| k.name.clone()).collect();
        assert_eq!(best, vec!["b", "a"]);
        let by_rank: Vec<_> = history.ranks.ranked_asc(d(1)).into_iter().map(|(k, v)| (k.name.clone(), v)).collect();
        assert_eq!(by_rank, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
        assert!(history.ratings.ranked_desc(d(9)).is_empty());
    }

    #[test]
    fn test_restrict_and_rank_cut() {
        let mut history = sample();
        history.restrict(Some(d(2)), None);
        assert_eq!(history.day_count(), 1);

        history.restrict_to_rank(1);
        assert_eq!(history.ratings.get(d(2)).unwrap().len(), 1);
        assert_eq!(history.ratings.value(d(2), &key("b")), Some(760));
        assert!(history.validate().is_ok());
    }
}
