use crate::error::{LoaderError, Result};
use crate::matrix::{DailyMatrix, DayValues, RankMatrix, RatingHistory};
use crate::types::{AllrounderRule, Category, DailyRecord, Discipline, EntityKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of per-player record files
pub const RECORD_EXTENSION: &str = "csv";

/// Where record files live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Root of the record tree
    pub data_dir: PathBuf,
    /// Optional dataset namespace below `data_dir`
    pub dataset_suffix: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), dataset_suffix: None }
    }
}

impl LoaderConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    pub fn with_suffix(mut self, suffix: Option<String>) -> Self {
        self.dataset_suffix = suffix.filter(|s| !s.is_empty());
        self
    }

    /// Directory holding one file per player for a category/discipline pair
    pub fn category_dir(&self, category: Category, discipline: Discipline) -> PathBuf {
        let mut dir = self.data_dir.clone();
        if let Some(suffix) = &self.dataset_suffix {
            dir.push(suffix);
        }
        dir.join(discipline.as_str()).join(category.as_str())
    }
}

/// Records of every player in one category/discipline, keyed by player
type EntityRecords = BTreeMap<EntityKey, Vec<DailyRecord>>;

/// Reads record files and builds rating/rank matrices.
///
/// Reading is the only side effect; caching is the caller's concern.
#[derive(Debug, Clone)]
pub struct RecordLoader {
    config: LoaderConfig,
}

impl RecordLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load the matrices for one category/discipline pair.
    ///
    /// The composite category is derived from batting and bowling with
    /// `rule`; the rule is ignored for the other categories.
    pub async fn load(
        &self,
        category: Category,
        discipline: Discipline,
        rule: AllrounderRule,
    ) -> Result<RatingHistory> {
        let history = match category {
            Category::Allrounder => {
                let batting = self.load_records(Category::Batting, discipline).await?;
                let bowling = self.load_records(Category::Bowling, discipline).await?;
                combine_allrounder(&build_history(batting), &build_history(bowling), rule)
            }
            _ => build_history(self.load_records(category, discipline).await?),
        };

        history.validate()?;

        info!(
            "Built {} days for {} players ({} {})",
            history.day_count(),
            history.entity_count(),
            category,
            discipline
        );

        Ok(history)
    }

    async fn load_records(&self, category: Category, discipline: Discipline) -> Result<EntityRecords> {
        let dir = self.config.category_dir(category, discipline);
        let files = list_entity_files(&dir).await?;

        let mut records = EntityRecords::new();
        let mut line_count = 0usize;
        for (entity, path) in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable record file {:?}: {}", path, e);
                    continue;
                }
            };

            let parsed = parse_record_file(&path, &content)?;
            debug!("Parsed {} records from {:?}", parsed.len(), path);
            line_count += parsed.len();
            records.entry(entity).or_default().extend(parsed);
        }

        info!(
            "Parsed {} record files ({} records) for {} {}",
            records.len(),
            line_count,
            category,
            discipline
        );

        Ok(records)
    }
}

async fn list_entity_files(dir: &Path) -> Result<Vec<(EntityKey, PathBuf)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LoaderError::MissingData(format!("record directory {dir:?} does not exist")));
        }
        Err(source) => return Err(LoaderError::Io { path: dir.to_path_buf(), source }),
    };

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => return Err(LoaderError::Io { path: dir.to_path_buf(), source }),
        };
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        match EntityKey::from_file_stem(stem) {
            Some(entity) => files.push((entity, path)),
            None => warn!("Skipping record file with unrecognized name {:?}", path),
        }
    }

    // read_dir order is platform dependent
    files.sort();
    if let Some(pair) = files.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(LoaderError::integrity(format!(
            "record files {:?} and {:?} both name player {}",
            pair[0].1, pair[1].1, pair[0].0
        )));
    }
    Ok(files)
}

/// Parse a whole record file. Blank lines are ignored, dates must increase.
pub fn parse_record_file(path: &Path, content: &str) -> Result<Vec<DailyRecord>> {
    let mut records: Vec<DailyRecord> = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let record = parse_record_line(line).map_err(|reason| LoaderError::parse(path, index + 1, reason))?;
        if let Some(previous) = records.last() {
            if record.date <= previous.date {
                return Err(LoaderError::parse(
                    path,
                    index + 1,
                    format!("date {} does not follow {}", record.date, previous.date),
                ));
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Parse one `YYYYMMDD,rank,rating` line
pub fn parse_record_line(line: &str) -> std::result::Result<DailyRecord, String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 3 {
        return Err(format!("expected 3 fields, found {}", fields.len()));
    }

    let date_field = fields[0];
    if date_field.len() != 8 || !date_field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("date '{date_field}' is not YYYYMMDD"));
    }
    let date = parse_compact_date(date_field)
        .ok_or_else(|| format!("date '{date_field}' is not a calendar date"))?;

    let rank = parse_digits(fields[1], "rank")?;
    if rank == 0 {
        return Err("rank must be at least 1".to_string());
    }

    let rating = parse_digits(fields[2], "rating")?;
    if rating > 1000 {
        return Err(format!("rating {rating} exceeds 1000"));
    }

    Ok(DailyRecord { date, rank, rating })
}

/// `YYYYMMDD` (already checked to be eight ASCII digits)
fn parse_compact_date(s: &str) -> Option<NaiveDate> {
    let year = s.get(0..4)?.parse().ok()?;
    let month = s.get(4..6)?.parse().ok()?;
    let day = s.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_digits(field: &str, what: &str) -> std::result::Result<u32, String> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{what} '{field}' is not a non-negative integer"));
    }
    field.parse::<u32>().map_err(|e| format!("{what} '{field}': {e}"))
}

fn build_history(records: EntityRecords) -> RatingHistory {
    let mut ratings = DailyMatrix::new();
    let mut ranks = RankMatrix::new();
    for (entity, entity_records) in records {
        for record in entity_records {
            ratings.insert(record.date, entity.clone(), record.rating);
            ranks.insert(record.date, entity.clone(), record.rank);
        }
    }
    RatingHistory::new(ratings, ranks)
}

/// Derive composite ratings for players present in both component tables
/// on the same date. Ranks are re-derived from the composite ratings.
pub fn combine_allrounder(
    batting: &RatingHistory,
    bowling: &RatingHistory,
    rule: AllrounderRule,
) -> RatingHistory {
    let mut ratings = DailyMatrix::new();
    let mut ranks = RankMatrix::new();

    for (date, bat_day) in batting.ratings.iter() {
        let Some(bowl_day) = bowling.ratings.get(date) else {
            continue;
        };

        let mut day = DayValues::new();
        for (entity, bat) in bat_day {
            if let Some(bowl) = bowl_day.get(entity) {
                day.insert(entity.clone(), rule.combine(*bat, *bowl));
            }
        }

        ratings.ensure_date(date);
        ranks.ensure_date(date);
        for (entity, rank) in competition_ranks(&day) {
            ranks.insert(date, entity, rank);
        }
        for (entity, rating) in day {
            ratings.insert(date, entity, rating);
        }
    }

    RatingHistory::new(ratings, ranks)
}

/// Standard competition ranking ("1224") by value, highest first
pub fn competition_ranks(day: &DayValues) -> DayValues {
    let mut ordered: Vec<(&EntityKey, u32)> = day.iter().map(|(k, v)| (k, *v)).collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut ranks = DayValues::new();
    let mut previous: Option<(u32, u32)> = None;
    for (position, (entity, value)) in ordered.into_iter().enumerate() {
        let rank = match previous {
            Some((prev_value, prev_rank)) if prev_value == value => prev_rank,
            _ => position as u32 + 1,
        };
        previous = Some((value, rank));
        ranks.insert(entity.clone(), rank);
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_records(config: &LoaderConfig, category: Category, stem: &str, lines: &[&str]) {
        let dir = config.category_dir(category, Discipline::Test);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{stem}.csv")), lines.join("\n")).unwrap();
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_record_line() {
        let record = parse_record_line("20040115,3,812").unwrap();
        assert_eq!(record, DailyRecord { date: d(2004, 1, 15), rank: 3, rating: 812 });
        assert!(parse_record_line(" 20040115 , 3 , 812 ").is_ok());
    }

    #[test]
    fn test_parse_record_line_is_strict() {
        assert!(parse_record_line("20040115,3").is_err());
        assert!(parse_record_line("20040115,3,812,1").is_err());
        assert!(parse_record_line("2004011,3,812").is_err());
        assert!(parse_record_line("20040231,3,812").is_err());
        assert!(parse_record_line("20040115,0,812").is_err());
        assert!(parse_record_line("20040115,3,1001").is_err());
        assert!(parse_record_line("20040115,+3,812").is_err());
        assert!(parse_record_line("20040115,3,800+12").is_err());
        assert!(parse_record_line("20040115,3,8e2").is_err());
    }

    #[test]
    fn test_parse_record_file_reports_line_number() {
        let path = Path::new("IND_a.csv");
        let err = parse_record_file(path, "20040115,3,812\n\n20040116,x,800\n").unwrap_err();
        match err {
            LoaderError::Parse { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other:?}"),
        }

        let err = parse_record_file(path, "20040116,3,812\n20040115,3,812\n").unwrap_err();
        assert!(matches!(err, LoaderError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_competition_ranks_share_ties() {
        let mut day = DayValues::new();
        day.insert(EntityKey::new("AUS", "a"), 700);
        day.insert(EntityKey::new("AUS", "b"), 800);
        day.insert(EntityKey::new("AUS", "c"), 700);
        day.insert(EntityKey::new("AUS", "d"), 600);
        let ranks: Vec<u32> = competition_ranks(&day).values().copied().collect();
        assert_eq!(ranks, vec![2, 1, 2, 4]);
    }

    #[tokio::test]
    async fn test_load_builds_aligned_matrices() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp_dir.path());
        write_records(&config, Category::Batting, "AUS_Steve_Smith", &["20150101,1,900", "20150102,2,880"]);
        write_records(&config, Category::Batting, "IND_Virat_Kohli", &["20150101,2,870", "20150102,1,890"]);

        let loader = RecordLoader::new(config);
        let history = loader.load(Category::Batting, Discipline::Test, AllrounderRule::Product).await.unwrap();

        assert_eq!(history.day_count(), 2);
        assert_eq!(history.entity_count(), 2);
        let smith = EntityKey::new("AUS", "steve smith");
        assert_eq!(history.ratings.value(d(2015, 1, 2), &smith), Some(880));
        assert_eq!(history.ranks.value(d(2015, 1, 2), &smith), Some(2));
        assert!(history.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_fails_on_malformed_line() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp_dir.path());
        write_records(&config, Category::Bowling, "ENG_Jimmy_Anderson", &["20150101,1,900", "20150102,two,880"]);

        let loader = RecordLoader::new(config);
        let result = loader.load(Category::Bowling, Discipline::Test, AllrounderRule::Product).await;
        assert!(matches!(result, Err(LoaderError::Parse { line: 2, .. })));
    }

    #[tokio::test]
    async fn test_files_naming_the_same_player_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp_dir.path());
        write_records(&config, Category::Batting, "AUS_Steve_Smith", &["20150101,1,900"]);
        write_records(&config, Category::Batting, "AUS_steve smith", &["20150101,2,880"]);

        let loader = RecordLoader::new(config);
        let result = loader.load(Category::Batting, Discipline::Test, AllrounderRule::Product).await;
        assert!(matches!(result, Err(LoaderError::Integrity(_))));
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let loader = RecordLoader::new(LoaderConfig::new(temp_dir.path().join("absent")));
        let result = tokio_test::block_on(loader.load(Category::Batting, Discipline::Odi, AllrounderRule::Product));
        assert!(matches!(result, Err(LoaderError::MissingData(_))));
    }

    #[tokio::test]
    async fn test_load_allrounder_combines_components() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp_dir.path()).with_suffix(Some("_2024".to_string()));
        write_records(&config, Category::Batting, "ENG_Ben_Stokes", &["20200101,5,600", "20200102,5,640"]);
        write_records(&config, Category::Bowling, "ENG_Ben_Stokes", &["20200101,9,500", "20200102,9,490"]);
        write_records(&config, Category::Batting, "NZ_Kyle_Jamieson", &["20200101,50,400"]);
        write_records(&config, Category::Bowling, "NZ_Kyle_Jamieson", &["20200101,3,900"]);
        write_records(&config, Category::Batting, "IND_Rohit_Sharma", &["20200101,2,850"]);

        let loader = RecordLoader::new(config);
        let history =
            loader.load(Category::Allrounder, Discipline::Test, AllrounderRule::GeometricMean).await.unwrap();

        let stokes = EntityKey::new("ENG", "ben stokes");
        let jamieson = EntityKey::new("NZ", "kyle jamieson");
        let day1 = d(2020, 1, 1);
        assert_eq!(history.ratings.value(day1, &stokes), Some(548));
        assert_eq!(history.ratings.value(day1, &jamieson), Some(600));
        assert_eq!(history.ranks.value(day1, &jamieson), Some(1));
        assert_eq!(history.ranks.value(day1, &stokes), Some(2));
        assert_eq!(history.ratings.get(day1).unwrap().len(), 2);
        assert_eq!(history.ratings.get(d(2020, 1, 2)).unwrap().len(), 1);
    }
}
