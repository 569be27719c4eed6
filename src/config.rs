use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{EtlError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub sink: SinkConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root holding one folder per extraction date
    pub data_dir: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/MLB_Data_2025"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Sqlite,
    Ndjson,
}

impl std::str::FromStr for SinkKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(SinkKind::Sqlite),
            "ndjson" => Ok(SinkKind::Ndjson),
            other => Err(EtlError::Config(format!("Unknown sink kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub sqlite_path: PathBuf,
    pub ndjson_dir: PathBuf,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::Sqlite,
            sqlite_path: PathBuf::from("output/mlb_data_2025.db"),
            ndjson_dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Spread per-game and per-play groups over the rayon pool
    pub parallel: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /// Read `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            EtlError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply `MLB_ETL_*` environment overrides (after `.env` has been loaded).
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(dir) = env_path("MLB_ETL_DATA_DIR") {
            self.source.data_dir = dir;
        }
        if let Some(path) = env_path("MLB_ETL_SQLITE_PATH") {
            self.sink.sqlite_path = path;
        }
        if let Some(dir) = env_path("MLB_ETL_NDJSON_DIR") {
            self.sink.ndjson_dir = dir;
        }
        if let Some(dir) = env_path("MLB_ETL_LOG_DIR") {
            self.logging.dir = dir;
        }
        self
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(PathBuf::from(v.trim())),
        _ => None,
    }
}
