use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Skill dimension a rating series describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Primary skill
    Batting,
    /// Secondary skill
    Bowling,
    /// Composite derived from batting and bowling
    Allrounder,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Batting => "batting",
            Category::Bowling => "bowling",
            Category::Allrounder => "allrounder",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Category::Allrounder)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batting" | "primary-skill" | "primary" => Ok(Category::Batting),
            "bowling" | "secondary-skill" | "secondary" => Ok(Category::Bowling),
            "allrounder" | "all-rounder" | "composite" => Ok(Category::Allrounder),
            _ => Err(ConfigError::invalid("category", s)),
        }
    }
}

/// Competition format a rating series belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    /// Long-form
    Test,
    /// Mid-length
    Odi,
    /// Short-form
    T20,
}

impl Discipline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Test => "test",
            Discipline::Odi => "odi",
            Discipline::T20 => "t20",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Discipline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" | "long-form" => Ok(Discipline::Test),
            "odi" | "mid-length" => Ok(Discipline::Odi),
            "t20" | "t20i" | "short-form" => Ok(Discipline::T20),
            _ => Err(ConfigError::invalid("discipline", s)),
        }
    }
}

/// How a composite rating is derived from its two underlying ratings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllrounderRule {
    /// `batting * bowling / 1000`
    #[default]
    Product,
    /// `sqrt(batting * bowling)`
    GeometricMean,
}

impl AllrounderRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllrounderRule::Product => "product",
            AllrounderRule::GeometricMean => "geometric-mean",
        }
    }

    /// Combine the two component ratings, rounded to the nearest point
    pub fn combine(&self, batting: u32, bowling: u32) -> u32 {
        let product = batting as f64 * bowling as f64;
        let value = match self {
            AllrounderRule::Product => product / 1000.0,
            AllrounderRule::GeometricMean => product.sqrt(),
        };
        value.round() as u32
    }
}

impl fmt::Display for AllrounderRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllrounderRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Ok(AllrounderRule::Product),
            "geometric-mean" | "geometric" | "geomean" => Ok(AllrounderRule::GeometricMean),
            _ => Err(ConfigError::invalid("allrounder rule", s)),
        }
    }
}

/// Which day-over-day changes make a date worth keeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCriteria {
    /// Keep every date
    #[default]
    None,
    /// Keep dates where any rating moved
    Rating,
    /// Keep dates where any rank moved
    Rank,
    /// Union of the rating and rank day-sets
    Either,
    /// Intersection of the rating and rank day-sets
    Both,
}

impl ChangeCriteria {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCriteria::None => "none",
            ChangeCriteria::Rating => "rating",
            ChangeCriteria::Rank => "rank",
            ChangeCriteria::Either => "either",
            ChangeCriteria::Both => "both",
        }
    }
}

impl fmt::Display for ChangeCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeCriteria {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(ChangeCriteria::None),
            "rating" => Ok(ChangeCriteria::Rating),
            "rank" => Ok(ChangeCriteria::Rank),
            "either" => Ok(ChangeCriteria::Either),
            "both" => Ok(ChangeCriteria::Both),
            _ => Err(ConfigError::invalid("change criteria", s)),
        }
    }
}

/// A tracked player, identified by country and normalized name.
///
/// Keys come from record file stems of the form `<COUNTRY>_<name words>`,
/// e.g. `AUS_Steve_Smith` becomes `{ country: "AUS", name: "steve smith" }`.
/// Serialized as its file stem so keyed maps stay valid JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityKey {
    /// Country code, uppercased
    pub country: String,
    /// Lowercased name with single spaces
    pub name: String,
}

impl EntityKey {
    pub fn new(country: &str, name: &str) -> Self {
        Self { country: country.trim().to_uppercase(), name: normalize_name(name) }
    }

    /// Parse a record file stem
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let (country, name) = stem.split_once('_')?;
        let key = Self::new(country, name);
        if key.country.is_empty() || key.name.is_empty() {
            return None;
        }
        Some(key)
    }

    /// Inverse of [`EntityKey::from_file_stem`]
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.country, self.name.replace(' ', "_"))
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.country)
    }
}

impl TryFrom<String> for EntityKey {
    type Error = ConfigError;

    fn try_from(stem: String) -> Result<Self, Self::Error> {
        Self::from_file_stem(&stem).ok_or_else(|| ConfigError::invalid("entity key", stem))
    }
}

impl From<EntityKey> for String {
    fn from(key: EntityKey) -> Self {
        key.file_stem()
    }
}

fn normalize_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One parsed line of a record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: chrono::NaiveDate,
    pub rank: u32,
    pub rating: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_tokens_accept_both_vocabularies() {
        assert_eq!("primary-skill".parse::<Category>().unwrap(), Category::Batting);
        assert_eq!("Bowling".parse::<Category>().unwrap(), Category::Bowling);
        assert_eq!("composite".parse::<Category>().unwrap(), Category::Allrounder);
        assert_eq!("long-form".parse::<Discipline>().unwrap(), Discipline::Test);
        assert_eq!("t20".parse::<Discipline>().unwrap(), Discipline::T20);
        assert_eq!("both".parse::<ChangeCriteria>().unwrap(), ChangeCriteria::Both);
        assert_eq!("geometric".parse::<AllrounderRule>().unwrap(), AllrounderRule::GeometricMean);
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "fielding".parse::<Category>().unwrap_err();
        assert_eq!(err, ConfigError::invalid("category", "fielding"));
        assert!("hundred".parse::<Discipline>().is_err());
        assert!("sometimes".parse::<ChangeCriteria>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for category in [Category::Batting, Category::Bowling, Category::Allrounder] {
            assert_eq!(category.to_string().parse::<Category>().unwrap(), category);
        }
        for rule in [AllrounderRule::Product, AllrounderRule::GeometricMean] {
            assert_eq!(rule.to_string().parse::<AllrounderRule>().unwrap(), rule);
        }
    }

    #[test]
    fn test_allrounder_rules() {
        assert_eq!(AllrounderRule::Product.combine(500, 400), 200);
        assert_eq!(AllrounderRule::GeometricMean.combine(400, 900), 600);
        assert_eq!(AllrounderRule::Product.combine(0, 900), 0);
    }

    #[test]
    fn test_entity_key_from_file_stem() {
        let key = EntityKey::from_file_stem("aus_Steve__SMITH").unwrap();
        assert_eq!(key.country, "AUS");
        assert_eq!(key.name, "steve smith");
        assert_eq!(key.file_stem(), "AUS_steve_smith");

        assert!(EntityKey::from_file_stem("nounderscore").is_none());
        assert!(EntityKey::from_file_stem("IND_").is_none());
    }

    #[test]
    fn test_entity_key_serializes_as_stem() {
        let key = EntityKey::new("nz", "Kane  Williamson");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"NZ_kane_williamson\"");
        assert_eq!(serde_json::from_str::<EntityKey>(&json).unwrap(), key);
        assert!(serde_json::from_str::<EntityKey>("\"nobody\"").is_err());
    }
}
