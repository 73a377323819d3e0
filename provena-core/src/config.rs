//! Runtime configuration.
//!
//! Feature-detector tuning lives in [`ExtractorConfig`] and may be overridden
//! from the environment. Which rules run and how their evidence is fused is an
//! explicit [`RuleSetSelector`] passed by the caller. Decision thresholds are
//! not configurable; see [`crate::constants`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DESCRIPTORS, RANSAC_REPROJECTION_THRESHOLD, TEMPLATE_MAX_DIMENSION};
use crate::error::ProvenaError;

/// Parameters for signature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorConfig {
    /// Longer side of the template-matching buffer (fixed at 400)
    pub max_dimension: u32,
    /// Maximum number of descriptors kept per image
    pub max_features: usize,
    /// FAST intensity threshold
    pub fast_threshold: u8,
    /// Number of pyramid levels searched for corners
    pub pyramid_levels: usize,
    /// Downscale factor between consecutive pyramid levels
    pub pyramid_scale: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_dimension: TEMPLATE_MAX_DIMENSION,
            max_features: MAX_DESCRIPTORS,
            fast_threshold: 20,
            pyramid_levels: 8,
            pyramid_scale: 1.2,
        }
    }
}

impl ExtractorConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional: `PROVENA_MAX_FEATURES`, `PROVENA_FAST_THRESHOLD`,
    /// `PROVENA_PYRAMID_LEVELS`. Unparsable values fall back to defaults.
    /// `PROVENA_MAX_FEATURES` can lower the descriptor cap but never raise
    /// it above [`MAX_DESCRIPTORS`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_features = std::env::var("PROVENA_MAX_FEATURES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .map_or(defaults.max_features, |n| n.min(MAX_DESCRIPTORS));

        let fast_threshold = std::env::var("PROVENA_FAST_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.fast_threshold);

        let pyramid_levels = std::env::var("PROVENA_PYRAMID_LEVELS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.pyramid_levels);

        Self {
            max_features,
            fast_threshold,
            pyramid_levels,
            ..defaults
        }
    }
}

/// Parameters for robust homography estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for a correspondence to count as inlier
    pub reprojection_threshold: f64,
    /// Hard cap on sampling iterations
    pub max_iterations: usize,
    /// Desired probability of drawing at least one outlier-free sample
    pub confidence: f64,
    /// Seed for the sampler; a fixed seed keeps verdicts reproducible
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            reprojection_threshold: RANSAC_REPROJECTION_THRESHOLD,
            max_iterations: 2000,
            confidence: 0.995,
            seed: 42,
        }
    }
}

/// Which comparison rules are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleSet {
    /// Metadata, histogram and template rules (max 100 points)
    #[default]
    Baseline,
    /// Baseline plus geometric feature verification (max 150 points)
    Extended,
}

/// How per-rule evidence is fused into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FusionPolicy {
    /// Sum enabled rule points, reject below the absolute floor
    #[default]
    WeightedSum,
    /// Geometry first, histogram fallback, otherwise reject
    ThresholdPriority,
}

/// Explicit capability flag chosen by the caller for each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSetSelector {
    pub rule_set: RuleSet,
    pub policy: FusionPolicy,
}

impl RuleSetSelector {
    pub fn new(rule_set: RuleSet, policy: FusionPolicy) -> Self {
        Self { rule_set, policy }
    }

    /// Three-rule weighted sum.
    pub fn baseline() -> Self {
        Self::new(RuleSet::Baseline, FusionPolicy::WeightedSum)
    }

    /// Four-rule weighted sum.
    pub fn extended() -> Self {
        Self::new(RuleSet::Extended, FusionPolicy::WeightedSum)
    }

    /// Geometry-first priority list over the extended rules.
    pub fn threshold_priority() -> Self {
        Self::new(RuleSet::Extended, FusionPolicy::ThresholdPriority)
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::Extended => write!(f, "extended"),
        }
    }
}

impl fmt::Display for FusionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WeightedSum => write!(f, "weighted-sum"),
            Self::ThresholdPriority => write!(f, "threshold-priority"),
        }
    }
}

impl FromStr for RuleSet {
    type Err = ProvenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "v1" => Ok(Self::Baseline),
            "extended" | "v2" => Ok(Self::Extended),
            other => Err(ProvenaError::Config(format!("unknown rule set '{other}'"))),
        }
    }
}

impl FromStr for FusionPolicy {
    type Err = ProvenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted-sum" | "sum" => Ok(Self::WeightedSum),
            "threshold-priority" | "priority" => Ok(Self::ThresholdPriority),
            other => Err(ProvenaError::Config(format!(
                "unknown fusion policy '{other}'"
            ))),
        }
    }
}
