use anyhow::Context;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::{EtlOutput, LoadPort, LoadSummary};
use crate::constants::{GAME_TABLE, LINESCORE_TABLE, RUNNER_PLAY_TABLE};

const SINK_NAME: &str = "ndjson";

/// File-based implementation of LoadPort.
/// Writes one `<table>.ndjson` per destination table, replacing previous files.
pub struct NdjsonLoadAdapter {
    out_dir: PathBuf,
}

impl NdjsonLoadAdapter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.out_dir.join(format!("{}.ndjson", table))
    }

    fn temp_path(&self, table: &str) -> PathBuf {
        self.out_dir.join(format!("{}.ndjson.tmp", table))
    }
}

fn write_lines<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[async_trait::async_trait]
impl LoadPort for NdjsonLoadAdapter {
    fn sink_name(&self) -> &'static str {
        SINK_NAME
    }

    async fn replace_all(&self, output: &EtlOutput) -> anyhow::Result<LoadSummary> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("Failed to create {}", self.out_dir.display()))?;

        // All temp files are complete before any table is replaced
        write_lines(&self.temp_path(GAME_TABLE), &output.games)?;
        write_lines(&self.temp_path(LINESCORE_TABLE), &output.linescores)?;
        write_lines(&self.temp_path(RUNNER_PLAY_TABLE), &output.runner_plays)?;

        for table in [GAME_TABLE, LINESCORE_TABLE, RUNNER_PLAY_TABLE] {
            fs::rename(self.temp_path(table), self.table_path(table))
                .with_context(|| format!("Failed to replace {}", self.table_path(table).display()))?;
        }

        let summary = LoadSummary::for_output(SINK_NAME, output);
        crate::observability::metrics::load::rows_written(SINK_NAME, GAME_TABLE, summary.game_rows);
        crate::observability::metrics::load::rows_written(SINK_NAME, LINESCORE_TABLE, summary.linescore_rows);
        crate::observability::metrics::load::rows_written(SINK_NAME, RUNNER_PLAY_TABLE, summary.runner_play_rows);
        info!("Wrote NDJSON tables to {}", self.out_dir.display());
        Ok(summary)
    }
}
