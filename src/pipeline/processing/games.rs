use tracing::info;

use crate::constants::GAME_TABLE;
use crate::domain::GameRecord;
use crate::pipeline::ingestion::raw::RawGameRow;
use crate::pipeline::processing::dedupe::resolve_freshest;
use crate::pipeline::processing::normalize::{game_from_raw, normalize_extracts};
use crate::pipeline::processing::TableOutput;
use crate::types::{Extract, TableStats};

/// Keep the freshest schedule row per `gamepk`
pub fn process_games(raw: Vec<Extract<RawGameRow>>) -> TableOutput<GameRecord> {
    let mut stats = TableStats::new(GAME_TABLE);
    let typed = normalize_extracts(raw, &mut stats, game_from_raw);

    let resolved = resolve_freshest(typed);
    stats.superseded_rows = resolved.superseded;
    stats.output_rows = resolved.records.len();
    crate::observability::metrics::dedupe::superseded(GAME_TABLE, resolved.superseded);

    info!(
        "Resolved {} games ({} stale extracts dropped)",
        stats.output_rows, stats.superseded_rows
    );
    TableOutput {
        records: resolved.records,
        stats,
    }
}
