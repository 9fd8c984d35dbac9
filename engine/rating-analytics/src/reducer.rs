//! # Reducers
//!
//! Functions collapsing a list of values into one.

use rating_loader::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a sequence of values collapses into one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Reducer {
    Avg,
    Median,
    Min,
    Max,
    First,
    Last,
    /// Percentile in 1..=99, linearly interpolated
    Percentile(u8),
}

impl Reducer {
    pub fn percentile(p: u8) -> Result<Self, ConfigError> {
        if !(1..=99).contains(&p) {
            return Err(ConfigError::out_of_range(format!("percentile reducer p{p} must be within p1..=p99")));
        }
        Ok(Reducer::Percentile(p))
    }

    /// Reduce `values` in their given order. Returns `None` for empty input.
    pub fn reduce(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let value = match self {
            Reducer::Avg => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::First => values[0],
            Reducer::Last => values[values.len() - 1],
            Reducer::Median => quantile(&sorted(values), 0.5),
            Reducer::Percentile(p) => quantile(&sorted(values), *p as f64 / 100.0),
        };
        Some(value)
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Linear-interpolation quantile of already sorted, non-empty values.
/// `q` is a fraction in `[0, 1]`.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Avg => f.write_str("avg"),
            Reducer::Median => f.write_str("median"),
            Reducer::Min => f.write_str("min"),
            Reducer::Max => f.write_str("max"),
            Reducer::First => f.write_str("first"),
            Reducer::Last => f.write_str("last"),
            Reducer::Percentile(p) => write!(f, "p{p}"),
        }
    }
}

impl FromStr for Reducer {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        match token.as_str() {
            "avg" | "mean" => Ok(Reducer::Avg),
            "median" => Ok(Reducer::Median),
            "min" => Ok(Reducer::Min),
            "max" => Ok(Reducer::Max),
            "first" => Ok(Reducer::First),
            "last" => Ok(Reducer::Last),
            _ => {
                let digits = token
                    .strip_prefix('p')
                    .filter(|d| !d.is_empty() && d.len() <= 2 && d.bytes().all(|b| b.is_ascii_digit()))
                    .ok_or_else(|| ConfigError::invalid("reducer", s))?;
                let p: u8 = digits.parse().map_err(|_| ConfigError::invalid("reducer", s))?;
                Reducer::percentile(p)
            }
        }
    }
}

impl TryFrom<String> for Reducer {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reducer> for String {
    fn from(reducer: Reducer) -> Self {
        reducer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALUES: [f64; 5] = [700.0, 650.0, 750.0, 600.0, 800.0];

    #[test]
    fn test_basic_reducers() {
        assert_eq!(Reducer::Avg.reduce(&VALUES), Some(700.0));
        assert_eq!(Reducer::Min.reduce(&VALUES), Some(600.0));
        assert_eq!(Reducer::Max.reduce(&VALUES), Some(800.0));
        assert_eq!(Reducer::First.reduce(&VALUES), Some(700.0));
        assert_eq!(Reducer::Last.reduce(&VALUES), Some(800.0));
        assert_eq!(Reducer::Median.reduce(&VALUES), Some(700.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(Reducer::Median.reduce(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
        assert_eq!(Reducer::Percentile(90).reduce(&[0.0, 10.0]), Some(9.0));
        assert_eq!(Reducer::Percentile(10).reduce(&[42.0]), Some(42.0));
    }

    #[test]
    fn test_empty_input_yields_none() {
        assert_eq!(Reducer::Avg.reduce(&[]), None);
        assert_eq!(Reducer::Percentile(50).reduce(&[]), None);
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!("mean".parse::<Reducer>().unwrap(), Reducer::Avg);
        assert_eq!("P75".parse::<Reducer>().unwrap(), Reducer::Percentile(75));
        assert_eq!(Reducer::Percentile(10).to_string(), "p10");
        assert!("p0".parse::<Reducer>().is_err());
        assert!("p100".parse::<Reducer>().is_err());
        assert!("p".parse::<Reducer>().is_err());
        assert!("mode".parse::<Reducer>().is_err());
    }

    #[test]
    fn test_serde_uses_tokens() {
        let json = serde_json::to_string(&Reducer::Percentile(25)).unwrap();
        assert_eq!(json, "\"p25\"");
        let parsed: Reducer = serde_json::from_str("\"median\"").unwrap();
        assert_eq!(parsed, Reducer::Median);
        assert!(serde_json::from_str::<Reducer>("\"sum\"").is_err());
    }
}
