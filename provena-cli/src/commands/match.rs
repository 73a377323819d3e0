//! Match command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::info;

use super::RuleOptions;
use crate::report;
use crate::utils::{file_name, load_corpus};

/// Execute the match command.
pub fn execute(probe: PathBuf, originals: PathBuf, json: bool, rules: RuleOptions) -> Result<()> {
    if !probe.is_file() {
        bail!("Failed to read probe: {} does not exist", probe.display());
    }

    let engine = rules.engine();
    let corpus = load_corpus(&engine, &originals)?;

    let image = engine
        .extractor()
        .load_probe(&probe)
        .with_context(|| format!("Failed to decode probe: {}", probe.display()))?;

    let result = engine.match_probe(&image, &corpus);
    info!(
        probe = %probe.display(),
        verdict = %result.verdict,
        score = result.total_score,
        "Match complete"
    );

    if json {
        let out = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
        println!("{out}");
        return Ok(());
    }

    println!();
    println!(
        "   {} {} / {}",
        "Rules:".dimmed(),
        rules.rule_set,
        rules.policy
    );
    println!("   {} {} targets", "Corpus:".dimmed(), corpus.len());
    report::print_result(&file_name(&probe), &result);
    Ok(())
}
