use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use mlb_etl::app::etl_use_case::{EtlReport, EtlUseCase};
use mlb_etl::app::ports::LoadPort;
use mlb_etl::config::{Config, SinkKind, DEFAULT_CONFIG_PATH};
use mlb_etl::infra::{NdjsonLoadAdapter, SqliteLoadAdapter};
use mlb_etl::pipeline::ProcessingOptions;
use mlb_etl::{logging, observability};

#[derive(Parser)]
#[command(name = "mlb_etl")]
#[command(about = "Deduplicate and transform dated MLB extracts into game, linescore and runner_play tables")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, transform and replace the destination tables
    Run {
        /// Root folder holding one sub-folder per extraction date
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Destination: sqlite or ndjson
        #[arg(long)]
        sink: Option<SinkKind>,
        #[arg(long)]
        sqlite_path: Option<PathBuf>,
        #[arg(long)]
        ndjson_dir: Option<PathBuf>,
        /// Process games and plays on one thread
        #[arg(long)]
        sequential: bool,
        /// Write a Prometheus text snapshot here when the run ends
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
    /// Discover and transform without loading anything
    Transform {
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        sequential: bool,
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
}

fn print_report(report: &EtlReport) {
    println!("\n📊 ETL Results (run {}):", report.run_id);
    println!("   Data dir: {}", report.data_dir);
    println!("   Files read: {}", report.files_read);
    for stats in &report.tables {
        println!(
            "   {}: {} raw, {} rejected, {} superseded, {} clamped, {} written",
            stats.table,
            stats.raw_rows,
            stats.rejected_rows,
            stats.superseded_rows,
            stats.clamped_values,
            stats.output_rows
        );
    }
    if let Some(load) = &report.load {
        println!(
            "   Loaded via {}: {} games, {} half-innings, {} runner plays",
            load.sink, load.game_rows, load.linescore_rows, load.runner_play_rows
        );
    }
    if report.rejected_rows() > 0 {
        warn!("{} rows rejected during the run", report.rejected_rows());
        println!("\n⚠️  {} rows were rejected, see the log for samples", report.rejected_rows());
    }
}

fn finish_metrics(metrics_out: Option<PathBuf>) {
    if let Some(path) = metrics_out {
        match observability::write_snapshot(&path) {
            Ok(true) => info!("Metrics snapshot written to {}", path.display()),
            Ok(false) => warn!("Metrics recorder not installed, no snapshot written"),
            Err(e) => error!("Failed to write metrics snapshot to {}: {}", path.display(), e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)?.apply_env_overrides();
    logging::init_logging(&config.logging.dir);

    if let Err(e) = observability::init() {
        warn!("Metrics recorder unavailable: {}", e);
    }

    match cli.command {
        Commands::Run {
            data_dir,
            sink,
            sqlite_path,
            ndjson_dir,
            sequential,
            metrics_out,
        } => {
            println!("🚀 Running full ETL (extract, transform, load)...");

            let data_dir = data_dir.unwrap_or(config.source.data_dir);
            let options = ProcessingOptions {
                parallel: config.processing.parallel && !sequential,
            };
            let load: Box<dyn LoadPort> = match sink.unwrap_or(config.sink.kind) {
                SinkKind::Sqlite => Box::new(SqliteLoadAdapter::new(
                    sqlite_path.unwrap_or(config.sink.sqlite_path),
                )),
                SinkKind::Ndjson => Box::new(NdjsonLoadAdapter::new(
                    ndjson_dir.unwrap_or(config.sink.ndjson_dir),
                )),
            };

            let result = EtlUseCase::new(options, load).run(&data_dir).await;
            finish_metrics(metrics_out);
            match result {
                Ok(report) => {
                    print_report(&report);
                    println!("✅ ETL run completed successfully!");
                }
                Err(e) => {
                    error!("ETL run failed: {:#}", e);
                    println!("❌ ETL run failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Transform {
            data_dir,
            sequential,
            metrics_out,
        } => {
            println!("🔨 Running transforms only...");

            let data_dir = data_dir.unwrap_or(config.source.data_dir);
            let options = ProcessingOptions {
                parallel: config.processing.parallel && !sequential,
            };

            let result = EtlUseCase::transform_only(options).run(&data_dir).await;
            finish_metrics(metrics_out);
            match result {
                Ok(report) => {
                    print_report(&report);
                    println!("✅ Transform run completed successfully");
                }
                Err(e) => {
                    error!("Transform run failed: {:#}", e);
                    println!("❌ Transform run failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }
    Ok(())
}
