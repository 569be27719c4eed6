//! Metric catalog and per-phase recording helpers.
//!
//! Names live in [`MetricName`] so call sites never spell them out. A
//! Prometheus recorder is installed by [`init`]; without it every call is a
//! no-op, which is what the unit tests rely on.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingest metrics
    IngestFilesDiscovered,
    IngestIdenticalFilesSkipped,
    IngestRowsRead,
    IngestRowsRejected,

    // Dedupe metrics
    DedupeRowsSuperseded,

    // Linescore metrics
    LinescoreRunsClamped,
    LinescoreHalfInningsScored,

    // Runner play metrics
    RunnerPlaySegmentsMerged,
    RunnerPlayPlaysProduced,

    // Load metrics
    LoadRowsWritten,
    LoadDuration,
    LoadFailures,

    // Run metrics
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestFilesDiscovered => "mlb_etl_ingest_files_discovered_total",
            MetricName::IngestIdenticalFilesSkipped => "mlb_etl_ingest_identical_files_skipped_total",
            MetricName::IngestRowsRead => "mlb_etl_ingest_rows_read_total",
            MetricName::IngestRowsRejected => "mlb_etl_ingest_rows_rejected_total",

            MetricName::DedupeRowsSuperseded => "mlb_etl_dedupe_rows_superseded_total",

            MetricName::LinescoreRunsClamped => "mlb_etl_linescore_runs_clamped_total",
            MetricName::LinescoreHalfInningsScored => "mlb_etl_linescore_half_innings_scored_total",

            MetricName::RunnerPlaySegmentsMerged => "mlb_etl_runner_play_segments_merged_total",
            MetricName::RunnerPlayPlaysProduced => "mlb_etl_runner_play_plays_produced_total",

            MetricName::LoadRowsWritten => "mlb_etl_load_rows_written_total",
            MetricName::LoadDuration => "mlb_etl_load_duration_seconds",
            MetricName::LoadFailures => "mlb_etl_load_failures_total",

            MetricName::RunDuration => "mlb_etl_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Calling it twice is harmless.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current metrics in Prometheus text format, if the recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Write the rendered metrics to `path`
pub fn write_snapshot(path: &Path) -> std::io::Result<bool> {
    match render() {
        Some(text) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

pub fn run_duration(secs: f64) {
    ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
}

// ============================================================================
// Ingest Metrics
// ============================================================================

pub mod ingest {
    use super::MetricName;

    pub fn files_discovered(file_name: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestFilesDiscovered.as_str(), "file" => file_name.to_string())
            .increment(count as u64);
    }

    pub fn identical_files_skipped(file_name: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestIdenticalFilesSkipped.as_str(), "file" => file_name.to_string())
            .increment(count as u64);
    }

    pub fn rows_read(table: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestRowsRead.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }

    pub fn rows_rejected(table: &str, count: usize) {
        ::metrics::counter!(MetricName::IngestRowsRejected.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Dedupe Metrics
// ============================================================================

pub mod dedupe {
    use super::MetricName;

    pub fn superseded(table: &str, count: usize) {
        ::metrics::counter!(MetricName::DedupeRowsSuperseded.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Linescore Metrics
// ============================================================================

pub mod linescore {
    use super::MetricName;

    pub fn runs_clamped(count: usize) {
        ::metrics::counter!(MetricName::LinescoreRunsClamped.as_str()).increment(count as u64);
    }

    pub fn half_innings_scored(count: usize) {
        ::metrics::counter!(MetricName::LinescoreHalfInningsScored.as_str()).increment(count as u64);
    }
}

// ============================================================================
// Runner Play Metrics
// ============================================================================

pub mod runner_play {
    use super::MetricName;

    pub fn plays_merged(segments: usize, plays: usize) {
        ::metrics::counter!(MetricName::RunnerPlaySegmentsMerged.as_str()).increment(segments as u64);
        ::metrics::counter!(MetricName::RunnerPlayPlaysProduced.as_str()).increment(plays as u64);
    }
}

// ============================================================================
// Load Metrics
// ============================================================================

pub mod load {
    use super::MetricName;

    pub fn rows_written(sink: &str, table: &str, count: usize) {
        ::metrics::counter!(
            MetricName::LoadRowsWritten.as_str(),
            "sink" => sink.to_string(),
            "table" => table.to_string()
        )
        .increment(count as u64);
    }

    pub fn duration(sink: &str, secs: f64) {
        ::metrics::histogram!(MetricName::LoadDuration.as_str(), "sink" => sink.to_string()).record(secs);
    }

    pub fn failure(sink: &str) {
        ::metrics::counter!(MetricName::LoadFailures.as_str(), "sink" => sink.to_string()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed_and_unique() {
        let names = [
            MetricName::IngestFilesDiscovered,
            MetricName::IngestIdenticalFilesSkipped,
            MetricName::IngestRowsRead,
            MetricName::IngestRowsRejected,
            MetricName::DedupeRowsSuperseded,
            MetricName::LinescoreRunsClamped,
            MetricName::LinescoreHalfInningsScored,
            MetricName::RunnerPlaySegmentsMerged,
            MetricName::RunnerPlayPlaysProduced,
            MetricName::LoadRowsWritten,
            MetricName::LoadDuration,
            MetricName::LoadFailures,
            MetricName::RunDuration,
        ];
        let unique: std::collections::HashSet<&str> = names.iter().map(|n| n.as_str()).collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().all(|n| n.to_string().starts_with("mlb_etl_")));
    }
}
