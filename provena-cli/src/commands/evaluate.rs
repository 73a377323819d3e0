//! Evaluate command implementation.
//!
//! Matches every probe named in the ground truth and writes
//! `comparison.json` and `predictions.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use provena_core::MatchResult;
use serde::Serialize;
use tracing::info;

use super::RuleOptions;
use crate::report::{self, Accuracy, Tally};
use crate::utils::{load_corpus, read_ground_truth, stem, timestamp, write_output};

const UNDECODABLE_REASON: &str = "Probe could not be decoded";

#[derive(Debug, Clone, Serialize)]
struct PredictionRecord {
    file: String,
    category: String,
    expected: Option<String>,
    /// Matched id, `REJECTED`, or null when the probe could not be decoded
    raw_predicted: Option<String>,
    predicted: Option<String>,
    correct: bool,
    reason: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    overall: Accuracy,
    by_category: BTreeMap<String, Accuracy>,
}

#[derive(Serialize)]
struct Comparison<'a> {
    generated_at: &'a str,
    summary: Summary,
    results: &'a [PredictionRecord],
}

#[derive(Serialize)]
struct Predictions<'a> {
    generated_at: &'a str,
    predictions: BTreeMap<&'a str, &'a PredictionRecord>,
}

/// First path segment, or `unknown` for a bare filename.
pub(crate) fn category_of(rel_path: &str) -> String {
    match rel_path.split_once('/') {
        Some((category, _)) => category.to_string(),
        None => "unknown".to_string(),
    }
}

/// Raw and normalized prediction for one probe.
fn normalize(result: Option<&MatchResult>) -> (Option<String>, Option<String>) {
    match result {
        None => (None, None),
        Some(result) => match result.target_id() {
            Some(id) => (Some(id.to_string()), Some(stem(id))),
            None => (Some("REJECTED".to_string()), None),
        },
    }
}

fn evaluate_one(
    rel_path: &str,
    expected: Option<String>,
    result: Option<&MatchResult>,
) -> PredictionRecord {
    let (raw_predicted, predicted) = normalize(result);
    PredictionRecord {
        file: rel_path.to_string(),
        category: category_of(rel_path),
        correct: predicted == expected,
        expected,
        raw_predicted,
        predicted,
        reason: result.map_or_else(|| UNDECODABLE_REASON.to_string(), |r| r.reason.clone()),
    }
}

/// Execute the evaluate command.
pub fn execute(
    base_dir: PathBuf,
    ground_truth: Option<PathBuf>,
    originals: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    rules: RuleOptions,
) -> Result<()> {
    let ground_truth = ground_truth.unwrap_or_else(|| base_dir.join("ground_truth.json"));
    let originals = originals.unwrap_or_else(|| base_dir.join("originals"));
    let out_dir = out_dir.unwrap_or_else(|| base_dir.clone());

    let expectations = read_ground_truth(&ground_truth)?;

    let engine = rules.engine();
    let corpus = load_corpus(&engine, &originals)?;
    info!(probes = expectations.len(), "Evaluating ground truth");

    let mut overall = Tally::default();
    let mut by_category: BTreeMap<String, Tally> = BTreeMap::new();
    let mut records = Vec::with_capacity(expectations.len());

    for (rel_path, expected) in expectations {
        let full_path = rel_path.split('/').fold(base_dir.clone(), |p, part| p.join(part));
        let result = engine.match_path(&full_path, &corpus);
        let record = evaluate_one(&rel_path, expected, result.as_ref());

        overall.record(record.correct);
        by_category
            .entry(record.category.clone())
            .or_default()
            .record(record.correct);

        report::print_outcome(
            record.correct,
            &record.file,
            record.raw_predicted.as_deref(),
            record.expected.as_deref(),
        );
        records.push(record);
    }

    let generated_at = timestamp();
    let comparison = Comparison {
        generated_at: &generated_at,
        summary: Summary {
            overall: overall.summary(),
            by_category: by_category
                .iter()
                .map(|(category, tally)| (category.clone(), tally.summary()))
                .collect(),
        },
        results: &records,
    };
    let predictions = Predictions {
        generated_at: &generated_at,
        predictions: records.iter().map(|r| (r.file.as_str(), r)).collect(),
    };

    let comparison_path = out_dir.join("comparison.json");
    let predictions_path = out_dir.join("predictions.json");
    write_json(&comparison_path, &comparison)?;
    write_json(&predictions_path, &predictions)?;

    report::print_summary(&overall, &by_category);
    println!();
    println!("{}", "Saved:".green());
    println!(" - {}", predictions_path.display());
    println!(" - {}", comparison_path.display());

    Ok(())
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_output(path, &json)
}
