//! Text report blocks and accuracy bookkeeping.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use colored::Colorize;
use provena_core::MatchResult;
use serde::Serialize;

/// Render one probe's report block.
///
/// ```text
/// Processing: crop_01_a.jpg
/// Rule 1 (Metadata): FIRED - Size ratio 0.93 (area ratio 0.88, not scored) -> 27/30 points
/// Final Score: 81/100 -> MATCH to original_01.jpg
/// ```
///
/// A probe that could not be decoded gets `Final Score: 0/0 -> UNDECODABLE`.
pub fn render_block(file_name: &str, result: Option<&MatchResult>) -> String {
    let mut block = format!("Processing: {file_name}\n");

    match result {
        Some(result) => {
            // Numbered by position; equal records still get distinct numbers.
            for (i, record) in result.evidence.iter().enumerate() {
                let status = if record.fired() { "FIRED" } else { "NO MATCH" };
                let _ = writeln!(
                    block,
                    "Rule {} ({}): {} - {} -> {}/{} points",
                    i + 1,
                    record.rule_name,
                    status,
                    record.explanation,
                    record.points_awarded,
                    record.max_points
                );
            }
            let _ = writeln!(
                block,
                "Final Score: {}/{} -> {}",
                result.total_score,
                result.max_total,
                verdict_label(result)
            );
        }
        None => block.push_str("Final Score: 0/0 -> UNDECODABLE\n"),
    }

    block.push('\n');
    block
}

fn verdict_label(result: &MatchResult) -> String {
    match result.target_id() {
        Some(id) => format!("MATCH to {id}"),
        None => "REJECTED".to_string(),
    }
}

/// Colored rendering of one result for interactive use.
pub fn print_result(file_name: &str, result: &MatchResult) {
    println!();
    println!("   {} {}", "Probe:".dimmed(), file_name);
    for (i, record) in result.evidence.iter().enumerate() {
        let status = if record.fired() {
            "FIRED".green()
        } else {
            "NO MATCH".yellow()
        };
        println!(
            "   {} {:<10} {:<8} {:>2}/{:<2}  {}",
            format!("Rule {}", i + 1).dimmed(),
            record.rule_name,
            status,
            record.points_awarded,
            record.max_points,
            record.explanation.dimmed()
        );
    }
    let verdict = match result.target_id() {
        Some(id) => format!("MATCH to {id}").green().bold(),
        None => "REJECTED".red().bold(),
    };
    println!(
        "   {} {}/{} -> {}",
        "Final Score:".dimmed(),
        result.total_score,
        result.max_total,
        verdict
    );
    println!("   {} {}", "Reason:".dimmed(), result.reason);
}

/// Filename convention: `<kind>_<original>_...` must name the matched
/// original in its second token. In a directory of unrelated images the
/// probe is correct only when rejected.
pub fn convention_correct(
    file_name: &str,
    result: Option<&MatchResult>,
    expect_rejected: bool,
) -> bool {
    let Some(result) = result else {
        return false;
    };
    if expect_rejected {
        return result.is_rejected();
    }
    match (result.target_id(), file_name.split('_').nth(1)) {
        (Some(id), Some(expected)) => id.contains(expected),
        _ => false,
    }
}

/// One scored prediction: `✓ file -> raw=... | expected=...`.
pub fn print_outcome(correct: bool, file: &str, raw: Option<&str>, expected: Option<&str>) {
    let icon = if correct { "✓".green() } else { "✗".red() };
    println!(
        "{} {} -> raw={} | expected={}",
        icon,
        file,
        raw.unwrap_or("null"),
        expected.unwrap_or("null")
    );
}

/// Overall and per-category accuracy block.
pub fn print_summary(overall: &Tally, by_category: &BTreeMap<String, Tally>) {
    println!();
    println!("{}", "--- SUMMARY ---".bold());
    println!(
        "Overall: {}/{} ({}%)",
        overall.correct,
        overall.total,
        overall.percent()
    );
    for (category, tally) in by_category {
        println!(
            "{}: {}/{} ({}%)",
            category,
            tally.correct,
            tally.total,
            tally.percent()
        );
    }
}

/// Running correct/total counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub correct: usize,
}

/// Serialized accuracy figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Accuracy {
    pub total: usize,
    pub correct: usize,
    pub accuracy_percent: f64,
}

impl Tally {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    /// Percentage rounded to two decimals; 0.0 when empty.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.correct as f64 / self.total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }

    pub fn summary(&self) -> Accuracy {
        Accuracy {
            total: self.total,
            correct: self.correct,
            accuracy_percent: self.percent(),
        }
    }
}
