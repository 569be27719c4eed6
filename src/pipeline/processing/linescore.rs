//! Running score at the start of every half-inning.
//!
//! Rows of one game are put in chronological order (inning, then top before
//! bottom) and folded once: the batting team's total and the game total are
//! read *before* the half-inning's own runs are added, which is the
//! "cumulative sum shifted back one row" of each group.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::constants::LINESCORE_TABLE;
use crate::domain::{GamePk, LinescoreRecord, ScoredLinescore, TeamId};
use crate::pipeline::ingestion::raw::RawLinescoreRow;
use crate::pipeline::processing::dedupe::resolve_freshest;
use crate::pipeline::processing::normalize::{linescore_from_raw, normalize_extracts};
use crate::pipeline::processing::{map_groups, ProcessingOptions, TableOutput};
use crate::types::{Extract, TableStats};

/// Chronological order of half-innings within one game
pub fn half_inning_chronology(a: &LinescoreRecord, b: &LinescoreRecord) -> Ordering {
    (a.inning, a.half).cmp(&(b.inning, b.half))
}

/// Batting team's lead given its score and the game total
pub fn score_diff(battingteam_score: i64, total_score: i64) -> i64 {
    battingteam_score - (total_score - battingteam_score)
}

/// Score one game's half-innings. All rows must share a `gamepk`.
pub fn score_game(mut rows: Vec<LinescoreRecord>) -> Vec<ScoredLinescore> {
    rows.sort_by(half_inning_chronology);

    let mut team_totals: HashMap<TeamId, i64> = HashMap::new();
    let mut game_total: i64 = 0;

    rows.into_iter()
        .map(|row| {
            let team_total = team_totals.entry(row.battingteamid).or_insert(0);
            let battingteam_score = *team_total;
            let total_score = game_total;

            *team_total += i64::from(row.runs);
            game_total += i64::from(row.runs);

            ScoredLinescore {
                gamepk: row.gamepk,
                inning: row.inning,
                half: row.half,
                battingteamid: row.battingteamid,
                runs: row.runs,
                battingteam_score,
                total_score,
                battingteam_score_diff: score_diff(battingteam_score, total_score),
            }
        })
        .collect()
}

/// Score every game. Output is grouped by game in `gamepk` order.
pub fn score_linescores(
    records: Vec<LinescoreRecord>,
    options: ProcessingOptions,
) -> Vec<ScoredLinescore> {
    let mut by_game: BTreeMap<GamePk, Vec<LinescoreRecord>> = BTreeMap::new();
    for record in records {
        by_game.entry(record.gamepk).or_default().push(record);
    }
    debug!("Scoring {} games", by_game.len());

    let games: Vec<Vec<LinescoreRecord>> = by_game.into_values().collect();
    map_groups(games, options, score_game)
        .into_iter()
        .flatten()
        .collect()
}

/// Normalize, deduplicate and score the linescore extracts
pub fn process_linescores(
    raw: Vec<Extract<RawLinescoreRow>>,
    options: ProcessingOptions,
) -> TableOutput<ScoredLinescore> {
    let mut stats = TableStats::new(LINESCORE_TABLE);
    let typed = normalize_extracts(raw, &mut stats, linescore_from_raw);

    let mut extracts = Vec::with_capacity(typed.len());
    for extract in typed {
        if extract.record.1.clamped {
            stats.clamped_values += 1;
        }
        extracts.push(extract.map(|(record, _)| record));
    }
    if stats.clamped_values > 0 {
        warn!(
            "{} linescore rows had negative or non-numeric runs, clamped to 0",
            stats.clamped_values
        );
        crate::observability::metrics::linescore::runs_clamped(stats.clamped_values);
    }

    let resolved = resolve_freshest(extracts);
    stats.superseded_rows = resolved.superseded;
    crate::observability::metrics::dedupe::superseded(LINESCORE_TABLE, resolved.superseded);

    let scored = score_linescores(resolved.records, options);
    stats.output_rows = scored.len();
    crate::observability::metrics::linescore::half_innings_scored(scored.len());

    info!(
        "Scored {} half-innings ({} stale extracts dropped)",
        stats.output_rows, stats.superseded_rows
    );
    TableOutput {
        records: scored,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Half;
    use crate::types::ExtractionBatch;

    const AWAY: TeamId = 147;
    const HOME: TeamId = 111;

    fn half(gamepk: GamePk, inning: u32, half: Half, team: TeamId, runs: u32) -> LinescoreRecord {
        LinescoreRecord {
            gamepk,
            inning,
            half,
            battingteamid: team,
            runs,
        }
    }

    #[test]
    fn test_second_inning_sees_first_inning_runs() {
        let scored = score_game(vec![
            half(1, 1, Half::Top, AWAY, 2),
            half(1, 1, Half::Bottom, HOME, 0),
            half(1, 2, Half::Top, AWAY, 1),
        ]);

        let third = &scored[2];
        assert_eq!(third.battingteam_score, 2);
        assert_eq!(third.total_score, 2);
        assert_eq!(third.battingteam_score_diff, 2);

        let second = &scored[1];
        assert_eq!(second.battingteam_score, 0);
        assert_eq!(second.total_score, 2);
        assert_eq!(second.battingteam_score_diff, -2);
    }

    #[test]
    fn test_first_half_inning_starts_at_zero() {
        let scored = score_game(vec![half(1, 1, Half::Top, AWAY, 4)]);
        assert_eq!(scored[0].battingteam_score, 0);
        assert_eq!(scored[0].total_score, 0);
        assert_eq!(scored[0].battingteam_score_diff, 0);
    }

    #[test]
    fn test_rows_are_scored_in_chronological_order() {
        // Arrival order is scrambled; top of an inning precedes its bottom.
        let scored = score_game(vec![
            half(1, 2, Half::Top, AWAY, 1),
            half(1, 1, Half::Bottom, HOME, 3),
            half(1, 1, Half::Top, AWAY, 2),
            half(1, 2, Half::Bottom, HOME, 0),
        ]);

        let order: Vec<(u32, Half)> = scored.iter().map(|s| (s.inning, s.half)).collect();
        assert_eq!(
            order,
            vec![
                (1, Half::Top),
                (1, Half::Bottom),
                (2, Half::Top),
                (2, Half::Bottom)
            ]
        );
        // Bottom of the 2nd: home has 3, away has 3
        assert_eq!(scored[3].battingteam_score, 3);
        assert_eq!(scored[3].total_score, 6);
        assert_eq!(scored[3].battingteam_score_diff, 0);
    }

    #[test]
    fn test_diff_is_negated_for_the_fielding_team() {
        // Same instant seen from each side: 5 runs in, batting team has 3.
        let batting = score_diff(3, 5);
        let fielding = score_diff(5 - 3, 5);
        assert_eq!(batting, -fielding);
    }

    #[test]
    fn test_games_do_not_share_totals() {
        let scored = score_linescores(
            vec![
                half(2, 1, Half::Top, AWAY, 5),
                half(1, 1, Half::Top, AWAY, 1),
                half(2, 2, Half::Top, AWAY, 0),
                half(1, 2, Half::Top, AWAY, 0),
            ],
            ProcessingOptions { parallel: false },
        );

        assert_eq!(scored[0].gamepk, 1);
        assert_eq!(scored[1].battingteam_score, 1);
        assert_eq!(scored[3].gamepk, 2);
        assert_eq!(scored[3].battingteam_score, 5);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let records: Vec<LinescoreRecord> = (1..=40)
            .flat_map(|game| {
                (1..=9).flat_map(move |inning| {
                    [
                        half(game, inning, Half::Top, AWAY, (game as u32 + inning) % 3),
                        half(game, inning, Half::Bottom, HOME, (game as u32 * inning) % 2),
                    ]
                })
            })
            .collect();

        let parallel = score_linescores(records.clone(), ProcessingOptions { parallel: true });
        let sequential = score_linescores(records, ProcessingOptions { parallel: false });
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_process_linescores_dedupes_and_clamps() {
        let older = ExtractionBatch::from_label("2025-04-01");
        let newer = ExtractionBatch::from_label("2025-04-02");
        let raw = |inning: &str, half: &str, team: &str, runs: Option<&str>| RawLinescoreRow {
            gamepk: Some("745001".into()),
            inning: Some(inning.into()),
            half: Some(half.into()),
            battingteamid: Some(team.into()),
            runs: runs.map(str::to_string),
        };

        let output = process_linescores(
            vec![
                Extract::new(older.clone(), raw("1", "top", "147", Some("1"))),
                Extract::new(newer.clone(), raw("1", "top", "147", Some("2"))),
                Extract::new(newer.clone(), raw("1", "bottom", "111", None)),
                Extract::new(older, raw("2", "top", "147", Some("-3"))),
                Extract::new(newer, raw("2", "middle", "147", Some("1"))),
            ],
            ProcessingOptions::default(),
        );

        assert_eq!(output.stats.raw_rows, 5);
        assert_eq!(output.stats.rejected_rows, 1);
        assert_eq!(output.stats.superseded_rows, 1);
        assert_eq!(output.stats.clamped_values, 1);
        assert_eq!(output.records.len(), 3);

        let top_second = &output.records[2];
        assert_eq!(top_second.runs, 0);
        assert_eq!(top_second.battingteam_score, 2);
        assert_eq!(top_second.battingteam_score_diff, 2);
    }
}
