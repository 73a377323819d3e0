//! Batch command implementation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use tracing::{debug, info};

use super::RuleOptions;
use crate::report::{self, Tally};
use crate::utils::{file_name, list_files, load_corpus, write_output};

/// Execute the batch command.
///
/// Every probe directory is processed in the order given, its files in name
/// order. The text report goes to `output` (or stdout); per-directory
/// accuracy is printed once all directories are done.
pub fn execute(
    dirs: Vec<PathBuf>,
    originals: PathBuf,
    output: Option<PathBuf>,
    expect_rejected: Vec<PathBuf>,
    rules: RuleOptions,
) -> Result<()> {
    let engine = rules.engine();
    let corpus = load_corpus(&engine, &originals)?;

    // Fail on a missing directory before any work is done.
    let listings = dirs
        .iter()
        .map(|dir| Ok((dir.as_path(), list_files(dir)?)))
        .collect::<Result<Vec<(&Path, Vec<PathBuf>)>>>()?;

    let mut text = String::new();
    let mut tallies = Vec::with_capacity(listings.len());

    for (dir, files) in listings {
        let rejected_dir = expect_rejected.iter().any(|d| d == dir);
        let mut tally = Tally::default();
        info!(dir = %dir.display(), probes = files.len(), "Processing directory");

        for path in files {
            let name = file_name(&path);
            let result = engine.match_path(&path, &corpus);
            let correct = report::convention_correct(&name, result.as_ref(), rejected_dir);
            debug!(probe = %name, correct, "Probe processed");

            tally.record(correct);
            text.push_str(&report::render_block(&name, result.as_ref()));
        }

        tallies.push((dir, tally));
    }

    match &output {
        Some(path) => {
            write_output(path, &text)?;
            info!(path = %path.display(), "Report written");
        }
        None => print!("{text}"),
    }

    for (dir, tally) in &tallies {
        let percent = format!("{:.2}%", tally.percent());
        let colored = if tally.correct == tally.total {
            percent.green()
        } else {
            percent.yellow()
        };
        eprintln!(
            "{} {}: {} ({}/{})",
            "Accuracy".bold(),
            dir.display(),
            colored,
            tally.correct,
            tally.total
        );
    }

    if let Some(path) = output {
        eprintln!("{} {}", "Report saved to".dimmed(), path.display());
    }

    Ok(())
}
