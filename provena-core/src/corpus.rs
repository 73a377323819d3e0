//! Reference corpus of original images.
//!
//! Built once from a directory, then read-only. Entries are ordered by
//! filename so that iteration order (and therefore tie-breaking) does not
//! depend on the filesystem.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::error::{ProvenaError, Result};
use crate::signature::{Signature, SignatureExtractor};

/// Ordered `(identifier, Signature)` pairs keyed by filename.
#[derive(Debug, Clone, Default)]
pub struct TargetCorpus {
    entries: Vec<(String, Signature)>,
}

impl TargetCorpus {
    /// Build a corpus from every decodable file in `dir` using the default
    /// extractor.
    pub fn build(dir: impl AsRef<Path>) -> Result<Self> {
        Self::build_with(&SignatureExtractor::default(), dir)
    }

    /// Build a corpus from every decodable file in `dir`.
    ///
    /// Subdirectories, unreadable entries and files that fail to decode are
    /// skipped with a warning. Fails only if `dir` itself cannot be listed.
    #[instrument(level = "info", skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn build_with(extractor: &SignatureExtractor, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let listing = std::fs::read_dir(dir)
            .map_err(|e| ProvenaError::Corpus(format!("cannot read {}: {e}", dir.display())))?;

        let mut files = candidate_files(listing.map(|entry| entry.map(|e| e.path())));
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let candidates = files.len();
        let entries: Vec<(String, Signature)> = files
            .into_par_iter()
            .filter_map(|(name, path)| match extractor.extract(&path) {
                Ok(signature) => Some((name, signature)),
                Err(e) => {
                    warn!(file = %name, error = %e, "Skipping undecodable corpus entry");
                    None
                }
            })
            .collect();

        info!(
            targets = entries.len(),
            skipped = candidates - entries.len(),
            "Corpus built"
        );

        Ok(Self { entries })
    }

    /// Build a corpus from precomputed signatures. Entries are sorted by id.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Signature)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(id, signature)` pairs in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Signature)> {
        self.entries.iter().map(|(id, sig)| (id.as_str(), sig))
    }

    pub(crate) fn entries(&self) -> &[(String, Signature)] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Signature> {
        self.entries
            .binary_search_by(|(entry, _)| entry.as_str().cmp(id))
            .ok()
            .map(|i| &self.entries[i].1)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }
}

/// Regular files among `paths` with their UTF-8 names.
fn candidate_files(
    paths: impl IntoIterator<Item = std::io::Result<PathBuf>>,
) -> Vec<(String, PathBuf)> {
    let mut files = Vec::new();
    for path in paths {
        let path = match path {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable corpus entry");
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        match path.file_name().map(|n| n.to_os_string().into_string()) {
            Some(Ok(name)) => files.push((name, path)),
            Some(Err(name)) => warn!(?name, "Skipping corpus entry with non UTF-8 name"),
            None => {}
        }
    }
    files
}
