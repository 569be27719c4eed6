use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::app::ports::{EtlOutput, LoadPort, LoadSummary};
use crate::pipeline::ingestion::discovery::{discover_all, read_games, read_linescores, read_runners};
use crate::pipeline::ingestion::DiscoveredSources;
use crate::pipeline::processing::games::process_games;
use crate::pipeline::processing::linescore::process_linescores;
use crate::pipeline::processing::runner_play::process_runner_plays;
use crate::pipeline::processing::ProcessingOptions;
use crate::types::TableStats;

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct EtlReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub data_dir: String,
    pub files_read: usize,
    pub tables: Vec<TableStats>,
    /// `None` for a transform-only run
    pub load: Option<LoadSummary>,
}

impl EtlReport {
    pub fn table(&self, name: &str) -> Option<&TableStats> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn rejected_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rejected_rows).sum()
    }
}

/// Use case for discovering extracts, transforming them and replacing the destination tables
pub struct EtlUseCase {
    options: ProcessingOptions,
    load: Option<Box<dyn LoadPort>>,
}

impl EtlUseCase {
    pub fn new(options: ProcessingOptions, load: Box<dyn LoadPort>) -> Self {
        Self {
            options,
            load: Some(load),
        }
    }

    /// A use case that stops after the transforms
    pub fn transform_only(options: ProcessingOptions) -> Self {
        Self { options, load: None }
    }

    /// Read and transform all three tables. Tables are independent of each other.
    pub fn transform(&self, sources: &DiscoveredSources) -> Result<(EtlOutput, Vec<TableStats>)> {
        let games = process_games(read_games(&sources.games).context("Failed to read games extracts")?);

        let linescores = process_linescores(
            read_linescores(&sources.linescores).context("Failed to read linescore extracts")?,
            self.options,
        );

        let runner_plays = process_runner_plays(
            read_runners(&sources.runners).context("Failed to read runner extracts")?,
            self.options,
        );

        let stats = vec![games.stats, linescores.stats, runner_plays.stats];
        let output = EtlOutput {
            games: games.records,
            linescores: linescores.records,
            runner_plays: runner_plays.records,
        };
        Ok((output, stats))
    }

    /// Discover, transform and (unless transform-only) load.
    /// Discovery failures abort before any transform runs.
    #[instrument(skip(self, data_dir), fields(data_dir = %data_dir.display()))]
    pub async fn run(&self, data_dir: &Path) -> Result<EtlReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let t_run = Instant::now();
        info!(%run_id, parallel = self.options.parallel, "Starting ETL run");

        let sources = discover_all(data_dir)?;
        let (output, tables) = self.transform(&sources)?;

        for stats in &tables {
            info!(
                table = %stats.table,
                raw = stats.raw_rows,
                rejected = stats.rejected_rows,
                superseded = stats.superseded_rows,
                output = stats.output_rows,
                "Table transformed"
            );
        }

        let load = match &self.load {
            Some(port) => {
                let sink = port.sink_name();
                info!("Replacing destination tables via {} sink", sink);
                let t_load = Instant::now();
                match port.replace_all(&output).await {
                    Ok(summary) => {
                        crate::observability::metrics::load::duration(sink, t_load.elapsed().as_secs_f64());
                        Some(summary)
                    }
                    Err(e) => {
                        crate::observability::metrics::load::failure(sink);
                        error!("Load via {} sink failed: {:#}", sink, e);
                        return Err(e.context(format!("Failed to load output via {} sink", sink)));
                    }
                }
            }
            None => {
                info!("Transform-only run, nothing loaded");
                None
            }
        };

        crate::observability::metrics::run_duration(t_run.elapsed().as_secs_f64());
        info!(%run_id, "ETL run finished in {:.2}s", t_run.elapsed().as_secs_f64());

        Ok(EtlReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            data_dir: data_dir.display().to_string(),
            files_read: sources.file_count(),
            tables,
            load,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{LINESCORE_TABLE, RUNNER_PLAY_TABLE};
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Arc;

    struct MockLoadOutput {
        pub loaded: Arc<tokio::sync::Mutex<Vec<EtlOutput>>>,
    }

    impl MockLoadOutput {
        pub fn new() -> Self {
            Self {
                loaded: Arc::new(tokio::sync::Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl LoadPort for MockLoadOutput {
        fn sink_name(&self) -> &'static str {
            "mock"
        }

        async fn replace_all(&self, output: &EtlOutput) -> Result<LoadSummary> {
            let mut loaded = self.loaded.lock().await;
            loaded.clear();
            loaded.push(output.clone());
            Ok(LoadSummary::for_output("mock", output))
        }
    }

    struct FailingLoadOutput;

    #[async_trait]
    impl LoadPort for FailingLoadOutput {
        fn sink_name(&self) -> &'static str {
            "failing"
        }

        async fn replace_all(&self, _output: &EtlOutput) -> Result<LoadSummary> {
            anyhow::bail!("destination unavailable")
        }
    }

    fn write_fixture(root: &Path) {
        let dir = root.join("2025-04-01").join("extract");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("games.csv"), "gamePk,venue\n745001,Fenway Park\n").unwrap();
        fs::write(
            dir.join("linescores.csv"),
            "gamePk,inning,half,battingteamid,runs\n745001,1,top,147,2\n745001,1,bottom,111,\n,2,top,147,1\n",
        )
        .unwrap();
        fs::write(
            dir.join("runners.csv"),
            "gamePk,atBatIndex,playIndex,runnerid,runnerfullname,originBase,start,end,isOut,eventtype,movementreason,playid\n\
             745001,4,1,592450,Aaron Judge,1B,1B,2B,False,single,r_adv_play,p1\n\
             745001,4,1,592450,Aaron Judge,1B,2B,3B,False,single,r_adv_throw,p1\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_run_loads_all_three_tables() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let output = MockLoadOutput::new();
        let loaded = output.loaded.clone();
        let use_case = EtlUseCase::new(ProcessingOptions::default(), Box::new(output));

        let report = use_case.run(dir.path()).await.unwrap();
        assert_eq!(report.files_read, 3);
        assert_eq!(report.table(LINESCORE_TABLE).unwrap().rejected_rows, 1);
        assert_eq!(report.table(RUNNER_PLAY_TABLE).unwrap().output_rows, 1);
        assert_eq!(report.load.as_ref().unwrap().linescore_rows, 2);

        let loaded = loaded.lock().await;
        assert_eq!(loaded.len(), 1);
        let play = &loaded[0].runner_plays[0];
        assert!(play.is_firsttothird);
        assert_eq!(play.movementreason.as_deref(), Some("r_adv_play,r_adv_throw"));
    }

    #[tokio::test]
    async fn test_transform_only_run_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let report = EtlUseCase::transform_only(ProcessingOptions { parallel: false })
            .run(dir.path())
            .await
            .unwrap();
        assert!(report.load.is_none());
        assert_eq!(report.rejected_rows(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let use_case = EtlUseCase::new(ProcessingOptions::default(), Box::new(FailingLoadOutput));
        let err = use_case.run(dir.path()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("destination unavailable"));
    }

    #[tokio::test]
    async fn test_missing_table_aborts_before_transform() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        fs::remove_file(dir.path().join("2025-04-01/extract/runners.csv")).unwrap();

        let output = MockLoadOutput::new();
        let loaded = output.loaded.clone();
        let use_case = EtlUseCase::new(ProcessingOptions::default(), Box::new(output));

        assert!(use_case.run(dir.path()).await.is_err());
        assert!(loaded.lock().await.is_empty());
    }
}
