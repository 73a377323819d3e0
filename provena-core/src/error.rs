use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvenaError {
    #[error("Invalid image {path}: {reason}")]
    InvalidImage { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProvenaError {
    pub(crate) fn invalid_image(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidImage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvenaError>;
