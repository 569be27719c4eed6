//! Local defaulting and parsing rules applied once, when raw rows become
//! typed records.
//!
//! Every function here is pure. Rows that cannot be keyed are rejected with a
//! [`RowDefect`]; the caller counts them and carries on.

use thiserror::Error;
use tracing::warn;

use crate::domain::{Base, GameRecord, Half, LinescoreRecord, RunnerMovementSegment};
use crate::pipeline::ingestion::raw::{RawGameRow, RawLinescoreRow, RawRunnerRow};
use crate::types::{Extract, TableStats};

/// How many rejected rows per table are logged individually
const REJECT_LOG_SAMPLE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDefect {
    #[error("missing or unreadable {0}")]
    MissingKey(&'static str),

    #[error("unknown base label '{0}'")]
    UnknownBase(String),

    #[error("unreadable isOut value '{0}'")]
    UnknownFlag(String),
}

/// Outcome of normalizing a `runs` value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunsValue {
    pub runs: u32,
    /// The raw value was negative or not a number
    pub clamped: bool,
}

pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Integer text, also accepting integral floats such as `"745001.0"`
pub fn parse_integer(value: Option<&str>) -> Option<i64> {
    let value = non_empty(value)?;
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    let f = value.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

fn required_i64(value: Option<&str>, field: &'static str) -> Result<i64, RowDefect> {
    parse_integer(value).ok_or(RowDefect::MissingKey(field))
}

fn required_u32(value: Option<&str>, field: &'static str) -> Result<u32, RowDefect> {
    parse_integer(value)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(RowDefect::MissingKey(field))
}

/// `runs`: null means nothing scored; negatives and junk clamp to zero.
pub fn normalize_runs(value: Option<&str>) -> RunsValue {
    let Some(text) = non_empty(value) else {
        return RunsValue {
            runs: 0,
            clamped: false,
        };
    };
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f >= 0.0 => RunsValue {
            runs: f.trunc().min(u32::MAX as f64) as u32,
            clamped: false,
        },
        _ => RunsValue {
            runs: 0,
            clamped: true,
        },
    }
}

/// Base label with the batter's box as the default for a missing value.
/// `score` and `4B` are home plate.
pub fn normalize_base(value: Option<&str>) -> Result<Base, RowDefect> {
    Ok(normalize_optional_base(value)?.unwrap_or(Base::Batter))
}

pub fn normalize_optional_base(value: Option<&str>) -> Result<Option<Base>, RowDefect> {
    let Some(label) = non_empty(value) else {
        return Ok(None);
    };
    let base = match label.to_ascii_uppercase().as_str() {
        "B" => Base::Batter,
        "1B" => Base::First,
        "2B" => Base::Second,
        "3B" => Base::Third,
        "HM" | "4B" | "SCORE" => Base::Home,
        _ => return Err(RowDefect::UnknownBase(label.to_string())),
    };
    Ok(Some(base))
}

/// Boolean flag text; missing means false
pub fn parse_flag(value: Option<&str>) -> Result<bool, RowDefect> {
    let Some(text) = non_empty(value) else {
        return Ok(false);
    };
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "1.0" | "yes" => Ok(true),
        "false" | "f" | "0" | "0.0" | "no" => Ok(false),
        _ => Err(RowDefect::UnknownFlag(text.to_string())),
    }
}

pub fn normalize_label(value: Option<&str>) -> Option<String> {
    non_empty(value).map(str::to_string)
}

pub fn game_from_raw(raw: RawGameRow) -> Result<GameRecord, RowDefect> {
    let gamepk = required_i64(raw.get("gamepk").map(String::as_str), "gamePk")?;
    let fields = raw
        .into_iter()
        .filter(|(column, value)| column != "gamepk" && !value.trim().is_empty())
        .collect();
    Ok(GameRecord { gamepk, fields })
}

pub fn linescore_from_raw(raw: RawLinescoreRow) -> Result<(LinescoreRecord, RunsValue), RowDefect> {
    let gamepk = required_i64(raw.gamepk.as_deref(), "gamePk")?;
    let inning = required_u32(raw.inning.as_deref(), "inning")?;
    let half = non_empty(raw.half.as_deref())
        .and_then(Half::parse)
        .ok_or(RowDefect::MissingKey("half"))?;
    let battingteamid = required_i64(raw.battingteamid.as_deref(), "battingteamid")?;
    let runs = normalize_runs(raw.runs.as_deref());

    Ok((
        LinescoreRecord {
            gamepk,
            inning,
            half,
            battingteamid,
            runs: runs.runs,
        },
        runs,
    ))
}

pub fn segment_from_raw(raw: RawRunnerRow) -> Result<RunnerMovementSegment, RowDefect> {
    let gamepk = required_i64(raw.gamepk.as_deref(), "gamePk")?;
    let atbatindex = required_u32(raw.atbatindex.as_deref(), "atBatIndex")?;
    let playindex = required_u32(raw.playindex.as_deref(), "playIndex")?;
    let runnerid = required_i64(raw.runnerid.as_deref(), "runnerid")?;

    let startbase = normalize_base(raw.originbase.as_deref())?;
    let start = match normalize_optional_base(raw.start.as_deref())? {
        Some(base) => base,
        None => startbase,
    };

    Ok(RunnerMovementSegment {
        gamepk,
        atbatindex,
        playindex,
        runnerid,
        runnerfullname: normalize_label(raw.runnerfullname.as_deref()),
        startbase,
        start,
        endbase: normalize_base(raw.end.as_deref())?,
        outbase: normalize_optional_base(raw.outbase.as_deref())?,
        is_out: parse_flag(raw.isout.as_deref())?,
        eventtype: normalize_label(raw.eventtype.as_deref()),
        movementreason: normalize_label(raw.movementreason.as_deref()),
        playid: normalize_label(raw.playid.as_deref()),
    })
}

/// Convert a table's raw extracts, skipping and counting rows that fail `convert`.
pub fn normalize_extracts<R, T, F>(
    raw: Vec<Extract<R>>,
    stats: &mut TableStats,
    convert: F,
) -> Vec<Extract<T>>
where
    F: Fn(R) -> Result<T, RowDefect>,
{
    stats.raw_rows += raw.len();
    let mut typed = Vec::with_capacity(raw.len());
    for (row, extract) in raw.into_iter().enumerate() {
        let batch = extract.batch;
        match convert(extract.record) {
            Ok(record) => typed.push(Extract::new(batch, record)),
            Err(defect) => {
                stats.rejected_rows += 1;
                if stats.rejected_rows <= REJECT_LOG_SAMPLE {
                    warn!(table = %stats.table, row, batch = %batch, "Skipping row: {}", defect);
                }
            }
        }
    }
    if stats.rejected_rows > REJECT_LOG_SAMPLE {
        warn!(
            table = %stats.table,
            "{} rows skipped in total",
            stats.rejected_rows
        );
    }
    crate::observability::metrics::ingest::rows_read(&stats.table, stats.raw_rows);
    crate::observability::metrics::ingest::rows_rejected(&stats.table, stats.rejected_rows);
    typed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractionBatch;

    fn runner_row() -> RawRunnerRow {
        RawRunnerRow {
            gamepk: Some("745001".into()),
            atbatindex: Some("3".into()),
            playindex: Some("1".into()),
            runnerid: Some("660271".into()),
            runnerfullname: Some("Shohei Ohtani".into()),
            originbase: Some("1B".into()),
            end: Some("score".into()),
            isout: Some("False".into()),
            eventtype: Some("double".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_defaults_and_clamping() {
        assert_eq!(normalize_runs(None), RunsValue { runs: 0, clamped: false });
        assert_eq!(normalize_runs(Some("  ")).runs, 0);
        assert_eq!(normalize_runs(Some("3")).runs, 3);
        assert_eq!(normalize_runs(Some("2.0")).runs, 2);
        assert_eq!(normalize_runs(Some("-1")), RunsValue { runs: 0, clamped: true });
        assert_eq!(normalize_runs(Some("x")), RunsValue { runs: 0, clamped: true });
    }

    #[test]
    fn test_home_plate_variants_are_canonical() {
        assert_eq!(normalize_base(Some("score")), Ok(Base::Home));
        assert_eq!(normalize_base(Some("4B")), Ok(Base::Home));
        assert_eq!(normalize_base(None), Ok(Base::Batter));
        assert_eq!(normalize_base(Some("")), Ok(Base::Batter));
        assert!(matches!(normalize_base(Some("5B")), Err(RowDefect::UnknownBase(_))));
    }

    #[test]
    fn test_segment_start_falls_back_to_origin() {
        let segment = segment_from_raw(runner_row()).unwrap();
        assert_eq!(segment.startbase, Base::First);
        assert_eq!(segment.start, Base::First);
        assert_eq!(segment.endbase, Base::Home);
        assert!(!segment.is_out);
        assert_eq!(segment.outbase, None);
    }

    #[test]
    fn test_segment_without_runner_is_rejected() {
        let mut row = runner_row();
        row.runnerid = None;
        assert_eq!(segment_from_raw(row), Err(RowDefect::MissingKey("runnerid")));
    }

    #[test]
    fn test_integral_float_keys_are_accepted() {
        assert_eq!(parse_integer(Some("745001.0")), Some(745001));
        assert_eq!(parse_integer(Some("1.5")), None);
        assert_eq!(parse_integer(None), None);
    }

    #[test]
    fn test_game_fields_drop_key_and_empties() {
        let mut raw = RawGameRow::new();
        raw.insert("gamepk".into(), "745001".into());
        raw.insert("venue".into(), "Fenway Park".into());
        raw.insert("doubleheader".into(), "".into());

        let game = game_from_raw(raw).unwrap();
        assert_eq!(game.gamepk, 745001);
        assert_eq!(game.fields.len(), 1);
        assert_eq!(game.fields["venue"], "Fenway Park");
    }

    #[test]
    fn test_normalize_extracts_counts_rejections() {
        let batch = ExtractionBatch::from_label("2025-04-01");
        let mut bad = runner_row();
        bad.gamepk = None;
        let raw = vec![
            Extract::new(batch.clone(), runner_row()),
            Extract::new(batch, bad),
        ];

        let mut stats = TableStats::new("runner_play");
        let typed = normalize_extracts(raw, &mut stats, segment_from_raw);
        assert_eq!(typed.len(), 1);
        assert_eq!(stats.raw_rows, 2);
        assert_eq!(stats.rejected_rows, 1);
    }
}
