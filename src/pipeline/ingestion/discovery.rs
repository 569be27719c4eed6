use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants;
use crate::error::{EtlError, Result};
use crate::pipeline::ingestion::raw::{RawGameRow, RawLinescoreRow, RawRunnerRow};
use crate::types::{parse_batch_date, Extract, ExtractionBatch};

/// Label used when a file sits directly in the data directory
const UNDATED_LABEL: &str = "undated";

/// One extract file found under the data directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractFile {
    pub path: PathBuf,
    pub batch: ExtractionBatch,
    pub sha256: String,
}

/// Extract files for all three source tables, oldest batch first
#[derive(Debug, Clone)]
pub struct DiscoveredSources {
    pub games: Vec<ExtractFile>,
    pub linescores: Vec<ExtractFile>,
    pub runners: Vec<ExtractFile>,
}

impl DiscoveredSources {
    pub fn file_count(&self) -> usize {
        self.games.len() + self.linescores.len() + self.runners.len()
    }
}

/// Discover all three source tables. Any missing table aborts the run
/// before rows are read.
pub fn discover_all(data_dir: &Path) -> Result<DiscoveredSources> {
    if !data_dir.is_dir() {
        return Err(EtlError::Config(format!(
            "Data directory does not exist: {}",
            data_dir.display()
        )));
    }

    let sources = DiscoveredSources {
        games: discover_extracts(data_dir, constants::GAMES_FILE)?,
        linescores: discover_extracts(data_dir, constants::LINESCORES_FILE)?,
        runners: discover_extracts(data_dir, constants::RUNNERS_FILE)?,
    };
    info!(
        "Discovered {} extract files under {}",
        sources.file_count(),
        data_dir.display()
    );
    Ok(sources)
}

/// Find every `file_name` below `data_dir`, tag it with its batch and drop
/// byte-identical copies (the freshest batch keeps the file).
pub fn discover_extracts(data_dir: &Path, file_name: &str) -> Result<Vec<ExtractFile>> {
    let pattern = format!(
        "{}/**/{}",
        glob::Pattern::escape(&data_dir.to_string_lossy()),
        glob::Pattern::escape(file_name)
    );

    let mut files = Vec::new();
    for entry in glob::glob(&pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping unreadable path during discovery: {}", e);
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let batch = batch_for_path(data_dir, &path);
        let sha256 = content_digest(&path)?;
        files.push(ExtractFile {
            path,
            batch,
            sha256,
        });
    }

    if files.is_empty() {
        return Err(EtlError::MissingSource {
            file_name: file_name.to_string(),
            data_dir: data_dir.display().to_string(),
        });
    }

    files.sort_by(|a, b| a.batch.cmp(&b.batch).then_with(|| a.path.cmp(&b.path)));
    let found = files.len();
    let files = drop_identical_copies(files);
    crate::observability::metrics::ingest::files_discovered(file_name, files.len());
    if files.len() < found {
        crate::observability::metrics::ingest::identical_files_skipped(file_name, found - files.len());
    }
    debug!(
        "{}: {} files, {} identical copies skipped",
        file_name,
        files.len(),
        found - files.len()
    );
    Ok(files)
}

/// Keep the last (freshest) file of every digest. Input must be sorted oldest first.
fn drop_identical_copies(files: Vec<ExtractFile>) -> Vec<ExtractFile> {
    let mut last_by_digest: HashMap<&str, usize> = HashMap::new();
    for (i, file) in files.iter().enumerate() {
        last_by_digest.insert(file.sha256.as_str(), i);
    }
    let keep: Vec<bool> = (0..files.len())
        .map(|i| last_by_digest.get(files[i].sha256.as_str()) == Some(&i))
        .collect();
    files
        .into_iter()
        .zip(keep)
        .filter_map(|(file, keep)| keep.then_some(file))
        .collect()
}

/// Batch of an extract file: the nearest enclosing folder (below `data_dir`)
/// whose name holds a date, otherwise the grandparent folder
/// (`<batch>/<subdir>/<file>`), otherwise the parent.
pub fn batch_for_path(data_dir: &Path, path: &Path) -> ExtractionBatch {
    let relative = path.strip_prefix(data_dir).unwrap_or(path);
    let folders: Vec<String> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter_map(|c| match c {
                    Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if let Some(dated) = folders.iter().rev().find(|f| parse_batch_date(f).is_some()) {
        return ExtractionBatch::from_label(dated.clone());
    }

    let fallback = folders
        .iter()
        .rev()
        .nth(1)
        .or_else(|| folders.last())
        .cloned()
        .unwrap_or_else(|| UNDATED_LABEL.to_string());
    ExtractionBatch::from_label(fallback)
}

/// SHA-256 of a file's bytes, hex encoded
pub fn content_digest(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Read every row of every file, tagging each with its file's batch.
/// Rows keep file order, files keep discovery order (oldest batch first).
pub fn read_extracts<T: DeserializeOwned>(files: &[ExtractFile]) -> Result<Vec<Extract<T>>> {
    let mut rows = Vec::new();
    for file in files {
        let before = rows.len();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(File::open(&file.path)?);

        // Header matching is case-insensitive
        let headers: csv::StringRecord = reader
            .headers()?
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();
        reader.set_headers(headers);

        for record in reader.deserialize::<T>() {
            rows.push(Extract::new(file.batch.clone(), record?));
        }
        debug!(
            "Read {} rows from {} (batch {})",
            rows.len() - before,
            file.path.display(),
            file.batch
        );
    }
    Ok(rows)
}

pub fn read_games(files: &[ExtractFile]) -> Result<Vec<Extract<RawGameRow>>> {
    read_extracts(files)
}

pub fn read_linescores(files: &[ExtractFile]) -> Result<Vec<Extract<RawLinescoreRow>>> {
    read_extracts(files)
}

pub fn read_runners(files: &[ExtractFile]) -> Result<Vec<Extract<RawRunnerRow>>> {
    read_extracts(files)
}
