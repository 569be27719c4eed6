use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{GameRecord, RunnerPlayRecord, ScoredLinescore};

/// The full result set of one run, one sequence per destination table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EtlOutput {
    pub games: Vec<GameRecord>,
    pub linescores: Vec<ScoredLinescore>,
    pub runner_plays: Vec<RunnerPlayRecord>,
}

/// Rows written per table by a sink
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub sink: String,
    pub game_rows: usize,
    pub linescore_rows: usize,
    pub runner_play_rows: usize,
}

impl LoadSummary {
    pub fn for_output(sink: &str, output: &EtlOutput) -> Self {
        Self {
            sink: sink.to_string(),
            game_rows: output.games.len(),
            linescore_rows: output.linescores.len(),
            runner_play_rows: output.runner_plays.len(),
        }
    }
}

/// Destination for a run's output. Implementations replace whatever the
/// destination held before; there is no incremental merge.
#[async_trait]
pub trait LoadPort: Send + Sync {
    fn sink_name(&self) -> &'static str;

    async fn replace_all(&self, output: &EtlOutput) -> anyhow::Result<LoadSummary>;
}
