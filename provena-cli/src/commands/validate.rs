//! Validate command implementation.
//!
//! Scores an existing `batch` text report against a ground-truth file
//! without re-running any matching. Report probes are looked up in the
//! ground truth by file name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::evaluate::category_of;
use crate::report::{self, Tally};
use crate::utils::{read_ground_truth, stem, GroundTruth};

/// Prediction recovered from one report block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReportEntry {
    file: String,
    /// Matched id, `REJECTED` or `UNDECODABLE`
    raw_predicted: String,
    /// Matched id without extension; `None` for anything but a match
    predicted: Option<String>,
}

/// Pair every `Processing:` line with the `Final Score:` line that follows.
///
/// A `Final Score:` line with no pending `Processing:` line is ignored.
fn parse_report(text: &str) -> Vec<ReportEntry> {
    let mut entries = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines().map(str::trim) {
        if let Some(file) = line.strip_prefix("Processing:") {
            current = Some(file.trim().to_string());
        } else if line.starts_with("Final Score:") {
            let Some(file) = current.take() else {
                continue;
            };
            let verdict = line.split_once("->").map_or("", |(_, v)| v.trim());
            let (raw_predicted, predicted) = match verdict.strip_prefix("MATCH to ") {
                Some(id) => (id.trim().to_string(), Some(stem(id.trim()))),
                None => (verdict.to_string(), None),
            };
            entries.push(ReportEntry {
                file,
                raw_predicted,
                predicted,
            });
        }
    }

    entries
}

/// First ground-truth entry whose file name is `file`.
fn lookup<'a>(ground_truth: &'a GroundTruth, file: &str) -> Option<(&'a str, Option<&'a str>)> {
    ground_truth
        .iter()
        .find(|(path, _)| Path::new(path.as_str()).file_name().is_some_and(|n| n == file))
        .map(|(path, expected)| (path.as_str(), expected.as_deref()))
}

/// Execute the validate command.
pub fn execute(report_path: PathBuf, ground_truth: PathBuf) -> Result<()> {
    let text = std::fs::read_to_string(&report_path)
        .with_context(|| format!("Failed to read report: {}", report_path.display()))?;
    let expectations = read_ground_truth(&ground_truth)?;

    let entries = parse_report(&text);
    info!(probes = entries.len(), report = %report_path.display(), "Validating report");

    let mut overall = Tally::default();
    let mut by_category: BTreeMap<String, Tally> = BTreeMap::new();

    for entry in &entries {
        let (path, expected) = match lookup(&expectations, &entry.file) {
            Some(found) => found,
            None => {
                warn!(probe = %entry.file, "Probe missing from ground truth");
                (entry.file.as_str(), None)
            }
        };
        let correct = entry.predicted.as_deref() == expected;

        overall.record(correct);
        by_category
            .entry(category_of(path))
            .or_default()
            .record(correct);

        report::print_outcome(correct, path, Some(&entry.raw_predicted), expected);
    }

    report::print_summary(&overall, &by_category);
    Ok(())
}
