//! Merge a runner's movement segments on one play into a single record.
//!
//! Segments of a play are ordered along the base path before the merge; each
//! output column has its own reducer over that ordered slice.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::constants::{HOME_RUN_EVENT, LABEL_SEPARATOR, RUNNER_PLAY_TABLE};
use crate::domain::{Base, PlayKey, RunnerMovementSegment, RunnerPlayRecord};
use crate::pipeline::ingestion::raw::RawRunnerRow;
use crate::pipeline::processing::dedupe::resolve_freshest;
use crate::pipeline::processing::normalize::{normalize_extracts, segment_from_raw};
use crate::pipeline::processing::{map_groups, ProcessingOptions, TableOutput};
use crate::types::{Extract, TableStats};

/// Order in which a runner's legs happened: where the leg began, then where it ended
pub fn segment_chronology(a: &RunnerMovementSegment, b: &RunnerMovementSegment) -> Ordering {
    a.start.cmp(&b.start).then_with(|| a.endbase.cmp(&b.endbase))
}

fn start_base(first: &RunnerMovementSegment) -> Base {
    first.startbase
}

fn end_base(last: &RunnerMovementSegment) -> Base {
    last.endbase
}

/// End of the last leg the runner survived; the play's start base if none
pub fn reached_base(segments: &[RunnerMovementSegment], start: Base) -> Base {
    segments
        .iter()
        .rev()
        .find(|segment| !segment.is_out)
        .map(|segment| segment.endbase)
        .unwrap_or(start)
}

/// Distinct non-empty labels, sorted and comma-joined
pub fn union_labels<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let distinct: BTreeSet<&str> = labels
        .flatten()
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .collect();
    if distinct.is_empty() {
        return None;
    }
    Some(distinct.into_iter().collect::<Vec<_>>().join(LABEL_SEPARATOR))
}

fn any_out(segments: &[RunnerMovementSegment]) -> bool {
    segments.iter().any(|segment| segment.is_out)
}

fn last_out_base(segments: &[RunnerMovementSegment]) -> Option<Base> {
    segments
        .iter()
        .rev()
        .filter(|segment| segment.is_out)
        .find_map(|segment| segment.outbase)
}

pub fn has_home_run(eventtype: Option<&str>) -> bool {
    eventtype.is_some_and(|labels| labels.contains(HOME_RUN_EVENT))
}

/// Runner went first to third on something other than a home run and stayed safe
pub fn is_first_to_third(startbase: Base, reachedbase: Base, eventtype: Option<&str>, is_out: bool) -> bool {
    startbase == Base::First && reachedbase == Base::Third && !has_home_run(eventtype) && !is_out
}

/// Runner scored from second on something other than a home run and stayed safe
pub fn is_second_to_home(startbase: Base, reachedbase: Base, eventtype: Option<&str>, is_out: bool) -> bool {
    startbase == Base::Second && reachedbase == Base::Home && !has_home_run(eventtype) && !is_out
}

/// Merge one play's segments. `None` for an empty group.
pub fn merge_play(mut segments: Vec<RunnerMovementSegment>) -> Option<RunnerPlayRecord> {
    segments.sort_by(segment_chronology);
    let first = segments.first()?;
    let last = segments.last()?;
    let key = first.play_key();

    let startbase = start_base(first);
    let endbase = end_base(last);
    let reachedbase = reached_base(&segments, startbase);
    let eventtype = union_labels(segments.iter().map(|s| s.eventtype.as_deref()));
    let movementreason = union_labels(segments.iter().map(|s| s.movementreason.as_deref()));
    let is_out = any_out(&segments);

    Some(RunnerPlayRecord {
        gamepk: key.gamepk,
        atbatindex: key.atbatindex,
        playindex: key.playindex,
        runnerid: key.runnerid,
        runnerfullname: first.runnerfullname.clone(),
        startbase,
        endbase,
        reachedbase,
        outbase: last_out_base(&segments),
        is_risp: startbase.is_scoring_position(),
        is_firsttothird: is_first_to_third(startbase, reachedbase, eventtype.as_deref(), is_out),
        is_secondtohome: is_second_to_home(startbase, reachedbase, eventtype.as_deref(), is_out),
        eventtype,
        movementreason,
        is_out,
        playid: first.playid.clone(),
    })
}

/// Group segments by play and merge each group. Output is in play-key order.
pub fn aggregate_plays(
    segments: Vec<RunnerMovementSegment>,
    options: ProcessingOptions,
) -> Vec<RunnerPlayRecord> {
    let mut by_play: BTreeMap<PlayKey, Vec<RunnerMovementSegment>> = BTreeMap::new();
    for segment in segments {
        by_play.entry(segment.play_key()).or_default().push(segment);
    }
    debug!("Merging segments of {} runner plays", by_play.len());

    let plays: Vec<Vec<RunnerMovementSegment>> = by_play.into_values().collect();
    map_groups(plays, options, merge_play)
        .into_iter()
        .flatten()
        .collect()
}

/// Normalize, deduplicate and merge the runner extracts
pub fn process_runner_plays(
    raw: Vec<Extract<RawRunnerRow>>,
    options: ProcessingOptions,
) -> TableOutput<RunnerPlayRecord> {
    let mut stats = TableStats::new(RUNNER_PLAY_TABLE);
    let typed = normalize_extracts(raw, &mut stats, segment_from_raw);

    let resolved = resolve_freshest(typed);
    stats.superseded_rows = resolved.superseded;
    crate::observability::metrics::dedupe::superseded(RUNNER_PLAY_TABLE, resolved.superseded);

    let segment_count = resolved.records.len();
    let plays = aggregate_plays(resolved.records, options);
    stats.output_rows = plays.len();
    crate::observability::metrics::runner_play::plays_merged(segment_count, plays.len());

    info!(
        "Merged {} segments into {} runner plays ({} stale extracts dropped)",
        segment_count, stats.output_rows, stats.superseded_rows
    );
    TableOutput {
        records: plays,
        stats,
    }
}
