//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving batch evaluations can tell a missing corpus apart from an
//! undecodable probe or an unwritable report.

use std::io;

use provena_core::ProvenaError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Probe image could not be decoded.
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input (originals, probe directory, ground truth).
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// I/O error (cannot write report).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        Self {
            code: classify(err, &message),
            message: Some(message),
        }
    }
}

fn classify(err: &anyhow::Error, message: &str) -> i32 {
    // Context strings name the step that failed; check them before the
    // underlying cause so a missing report directory is not read as missing input.
    if message.starts_with("Failed to write") {
        return IO_ERROR;
    }
    if message.starts_with("Failed to read") {
        return INPUT_ERROR;
    }

    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<ProvenaError>() {
            return match e {
                ProvenaError::InvalidImage { .. } => DATA_ERROR,
                ProvenaError::Corpus(_) => INPUT_ERROR,
                ProvenaError::Config(_) => USAGE_ERROR,
                ProvenaError::Io(_) => GENERAL_ERROR,
            };
        }
        if let Some(e) = cause.downcast_ref::<io::Error>() {
            if e.kind() == io::ErrorKind::NotFound {
                return INPUT_ERROR;
            }
        }
    }

    GENERAL_ERROR
}
