//! Provena Core - content-based image provenance matching
//!
//! This crate decides whether a probe image is a derivative (crop,
//! recompression, rotation, brightness shift, ...) of one image in a reference
//! corpus, or unrelated to all of them.
//!
//! # Features
//!
//! - Per-image signatures: file metadata, 512-bin color histogram, a 400px
//!   grayscale buffer and up to 4000 oriented binary descriptors
//! - Four independent comparison rules with bounded, itemized points
//! - Geometric verification: 2-NN Hamming matching, Lowe's ratio test and a
//!   seeded RANSAC homography
//! - Two explicit fusion policies (weighted sum, threshold priority)
//! - Deterministic verdicts with first-seen tie-breaking
//!
//! # Example
//!
//! ```no_run
//! use provena_core::{DecisionEngine, RuleSetSelector, TargetCorpus};
//!
//! # fn example() -> provena_core::Result<()> {
//! let corpus = TargetCorpus::build("originals")?;
//! let engine = DecisionEngine::new(RuleSetSelector::extended());
//!
//! match engine.match_path("probes/crop_01_a.jpg", &corpus) {
//!     Some(result) => println!(
//!         "{} ({}/{})",
//!         result.verdict, result.total_score, result.max_total
//!     ),
//!     None => eprintln!("probe could not be decoded"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod geometry;
pub mod rules;
pub mod signature;
pub mod template;

// Re-export main types for convenience
pub use config::{ExtractorConfig, FusionPolicy, RansacConfig, RuleSet, RuleSetSelector};
pub use corpus::TargetCorpus;
pub use engine::{fuse_threshold_priority, fuse_weighted_sum, DecisionEngine, TargetEvaluation};
pub use error::{ProvenaError, Result};
pub use evidence::{EvidenceRecord, MatchResult, Verdict};
pub use rules::{
    rules_for, ComparisonRule, GeometricFeatureRule, HistogramRule, Measurement, MetadataRule,
    RuleOutcome, TemplateRule,
};
pub use signature::{ProbeImage, Signature, SignatureExtractor};

/// Build the default corpus for `dir`.
pub fn build_corpus(dir: impl AsRef<std::path::Path>) -> Result<TargetCorpus> {
    TargetCorpus::build(dir)
}

/// Match the probe at `path` against `corpus` with the given rule set and
/// fusion policy. `None` means the probe could not be decoded.
pub fn match_image(
    path: impl AsRef<std::path::Path>,
    corpus: &TargetCorpus,
    selector: RuleSetSelector,
) -> Option<MatchResult> {
    DecisionEngine::new(selector).match_path(path, corpus)
}
