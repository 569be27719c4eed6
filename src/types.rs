use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

static DATE_IN_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})[-_]?(\d{2})[-_]?(\d{2})").expect("static date pattern is valid")
});

/// One dated snapshot pull of source data, identified by its folder label.
///
/// Batches order by the date found in the label. A label without a
/// recognizable date sorts before every dated batch; two undated labels
/// compare by text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractionBatch {
    pub label: String,
    pub date: Option<NaiveDate>,
}

impl ExtractionBatch {
    pub fn from_label(label: impl Into<String>) -> Self {
        let label = label.into();
        let date = parse_batch_date(&label);
        Self { label, date }
    }

    pub fn is_dated(&self) -> bool {
        self.date.is_some()
    }
}

impl Ord for ExtractionBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for ExtractionBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ExtractionBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Find a `YYYY-MM-DD`, `YYYY_MM_DD` or `YYYYMMDD` date inside a folder label
pub fn parse_batch_date(label: &str) -> Option<NaiveDate> {
    DATE_IN_LABEL.captures_iter(label).find_map(|caps| {
        let year = caps[1].parse::<i32>().ok()?;
        let month = caps[2].parse::<u32>().ok()?;
        let day = caps[3].parse::<u32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// A record of any kind tagged with the extraction batch it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Extract<T> {
    pub batch: ExtractionBatch,
    pub record: T,
}

impl<T> Extract<T> {
    pub fn new(batch: ExtractionBatch, record: T) -> Self {
        Self { batch, record }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extract<U> {
        Extract {
            batch: self.batch,
            record: f(self.record),
        }
    }
}

/// Per-table counters surfaced at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub table: String,
    /// Rows read from every discovered extract file
    pub raw_rows: usize,
    /// Rows skipped for a missing natural key or an unreadable value
    pub rejected_rows: usize,
    /// Rows dropped because a fresher extract of the same key exists
    pub superseded_rows: usize,
    /// `runs` values that were negative or non-numeric and clamped to 0
    pub clamped_values: usize,
    pub output_rows: usize,
}

impl TableStats {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }
}
