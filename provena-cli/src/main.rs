//! Provena CLI - match derivative images to their originals.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod report;
mod utils;

use commands::RuleOptions;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Probe could not be decoded
  66  Missing input (originals, probe directory, ground truth, report)
  74  Report could not be written";

#[derive(Parser)]
#[command(name = "provena")]
#[command(author, version, about = "Content-based image provenance matching", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for the corpus scan (defaults to one per core)
    #[arg(long, global = true, env = "PROVENA_THREADS")]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match one probe image against the originals
    Match {
        /// Path to the probe image
        #[arg(value_name = "PROBE")]
        probe: PathBuf,

        /// Directory of original images
        #[arg(long, env = "PROVENA_ORIGINALS", default_value = "originals")]
        originals: PathBuf,

        /// Print the match result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        rules: RuleOptions,
    },

    /// Match every image in one or more directories and write a text report
    Batch {
        /// Probe directories, processed in the given order
        #[arg(value_name = "DIR", required = true)]
        dirs: Vec<PathBuf>,

        /// Directory of original images
        #[arg(long, env = "PROVENA_ORIGINALS", default_value = "originals")]
        originals: PathBuf,

        /// Report file (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Probe directory whose images should all be rejected (repeatable)
        #[arg(long, value_name = "DIR")]
        expect_rejected: Vec<PathBuf>,

        #[command(flatten)]
        rules: RuleOptions,
    },

    /// Score predictions against a ground-truth file
    Evaluate {
        /// Base directory that ground-truth paths are relative to
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Ground-truth JSON (defaults to <BASE_DIR>/ground_truth.json)
        #[arg(long, value_name = "FILE")]
        ground_truth: Option<PathBuf>,

        /// Directory of original images (defaults to <BASE_DIR>/originals)
        #[arg(long, env = "PROVENA_ORIGINALS")]
        originals: Option<PathBuf>,

        /// Where comparison.json and predictions.json are written (defaults to <BASE_DIR>)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        rules: RuleOptions,
    },

    /// Score an existing batch report against a ground-truth file
    Validate {
        /// Text report written by `batch`
        #[arg(long, value_name = "FILE")]
        report: PathBuf,

        /// Ground-truth JSON mapping probe paths to expected originals
        #[arg(long, value_name = "FILE", default_value = "ground_truth.json")]
        ground_truth: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "provena_core=debug,provena=debug"
    } else {
        "provena_core=info,provena=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn configure_threads(threads: Option<usize>) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure worker threads")?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    configure_threads(cli.threads)?;

    match cli.command {
        Commands::Match {
            probe,
            originals,
            json,
            rules,
        } => commands::r#match::execute(probe, originals, json, rules),
        Commands::Batch {
            dirs,
            originals,
            output,
            expect_rejected,
            rules,
        } => commands::batch::execute(dirs, originals, output, expect_rejected, rules),
        Commands::Evaluate {
            base_dir,
            ground_truth,
            originals,
            out_dir,
            rules,
        } => commands::evaluate::execute(base_dir, ground_truth, originals, out_dir, rules),
        Commands::Validate {
            report,
            ground_truth,
        } => commands::validate::execute(report, ground_truth),
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_codes::SUCCESS,
                _ => exit_codes::USAGE_ERROR,
            };
            // Printing can only fail if stdout/stderr are closed.
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        std::process::exit(exit.code);
    }
}
