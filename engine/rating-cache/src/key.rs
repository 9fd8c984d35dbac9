//! Cache keys

use rating_loader::{AllrounderRule, Category, ChangeCriteria, Discipline, WindowKind};
use serde::{Deserialize, Serialize};
use std::fmt;

const UNSET: &str = "none";

/// Full parameter tuple a cached rating history depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub category: Category,
    pub discipline: Discipline,
    pub change_criteria: ChangeCriteria,
    pub window_kind: Option<WindowKind>,
    pub allrounder_rule: Option<AllrounderRule>,
    /// Dataset suffix the records were read from
    #[serde(default)]
    pub dataset: Option<String>,
}

impl CacheKey {
    pub fn new(
        category: Category,
        discipline: Discipline,
        change_criteria: ChangeCriteria,
        window_kind: Option<WindowKind>,
        allrounder_rule: Option<AllrounderRule>,
    ) -> Self {
        Self { category, discipline, change_criteria, window_kind, allrounder_rule, dataset: None }
    }

    /// Scope the key to a dataset; an empty suffix is the unsuffixed dataset
    pub fn with_dataset(mut self, suffix: Option<&str>) -> Self {
        self.dataset = suffix.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// File stem of the artifact. Every part is always rendered, unset parts
    /// as `none`, so equal keys always map to the same file.
    pub fn as_file_stem(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.category,
            self.discipline,
            self.change_criteria,
            self.window_kind.map_or(UNSET, |w| w.as_str()),
            self.allrounder_rule.map_or(UNSET, |r| r.as_str()),
            self.dataset.as_deref().unwrap_or(UNSET),
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_is_deterministic_and_total() {
        let key = CacheKey::new(Category::Batting, Discipline::Test, ChangeCriteria::None, None, None);
        assert_eq!(key.as_file_stem(), "batting_test_none_none_none_none");
        let again = CacheKey::new(Category::Batting, Discipline::Test, ChangeCriteria::None, None, None);
        assert_eq!(again.as_file_stem(), key.as_file_stem());

        let key = CacheKey::new(
            Category::Allrounder,
            Discipline::T20,
            ChangeCriteria::Both,
            Some(WindowKind::HalfYearly),
            Some(AllrounderRule::GeometricMean),
        );
        assert_eq!(key.to_string(), "allrounder_t20_both_half-yearly_geometric-mean_none");
    }

    #[test]
    fn test_distinct_parameters_give_distinct_stems() {
        let a = CacheKey::new(Category::Bowling, Discipline::Odi, ChangeCriteria::Rank, None, None);
        let b = CacheKey::new(Category::Bowling, Discipline::Odi, ChangeCriteria::Rank, Some(WindowKind::Yearly), None);
        assert_ne!(a.as_file_stem(), b.as_file_stem());
    }

    #[test]
    fn test_dataset_is_part_of_the_key() {
        let plain = CacheKey::new(Category::Batting, Discipline::Test, ChangeCriteria::None, None, None);
        let women = plain.clone().with_dataset(Some("_women"));
        assert_ne!(plain, women);
        assert_eq!(women.as_file_stem(), "batting_test_none_none_none__women");
        assert_eq!(plain.clone().with_dataset(Some("")), plain);
    }
}
