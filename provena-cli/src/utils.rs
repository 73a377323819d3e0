//! Common utility functions shared across CLI commands.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use provena_core::{DecisionEngine, TargetCorpus};
use tracing::info;

/// Build the corpus with the engine's extractor so probe and target
/// signatures share one configuration.
pub fn load_corpus(engine: &DecisionEngine, originals: &Path) -> Result<TargetCorpus> {
    let corpus = TargetCorpus::build_with(engine.extractor(), originals)
        .with_context(|| format!("Failed to read originals directory: {}", originals.display()))?;
    info!(targets = corpus.len(), path = %originals.display(), "Loaded originals");
    Ok(corpus)
}

/// Ground truth: probe path relative to the base directory
/// (`category/file`) mapped to the expected original stem, or `None` for
/// probes that must be rejected.
pub type GroundTruth = BTreeMap<String, Option<String>>;

pub fn read_ground_truth(path: &Path) -> Result<GroundTruth> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ground truth: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse ground truth: {}", path.display()))
}

/// Regular files in `dir`, sorted by name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read probe directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to read probe directory: {}", dir.display()))?
            .path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Final path component as a string, or the whole path if it has none.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Strip directories and extension: `originals/original_02.jpg` -> `original_02`.
pub fn stem(id: &str) -> String {
    Path::new(id)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| id.to_string())
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

/// Current UTC time in RFC 3339 form.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
