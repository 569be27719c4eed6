use std::fs;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Console output on stderr plus a daily JSON log under `log_dir`.
/// `RUST_LOG` overrides the default `mlb_etl=info` filter.
pub fn init_logging(log_dir: &Path) {
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("Cannot create log dir {}: {}", log_dir.display(), e);
    }

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "mlb_etl.log"));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mlb_etl=info,warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(file_writer))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    // Flushes on drop; the process owns the writer until exit
    std::mem::forget(guard);
}
