//! Fixed decision constants.
//!
//! These values define the scoring scale and the rejection policy. They are
//! not part of any runtime configuration.

/// Longer side of the grayscale buffer used for template matching.
pub const TEMPLATE_MAX_DIMENSION: u32 = 400;

/// Upper bound on descriptors extracted per image.
pub const MAX_DESCRIPTORS: usize = 4000;

/// Quantization bins per color channel (8 x 8 x 8 = 512 bins).
pub const HISTOGRAM_BINS_PER_CHANNEL: usize = 8;

/// Total number of histogram bins.
pub const HISTOGRAM_BINS: usize =
    HISTOGRAM_BINS_PER_CHANNEL * HISTOGRAM_BINS_PER_CHANNEL * HISTOGRAM_BINS_PER_CHANNEL;

pub const METADATA_MAX_POINTS: u32 = 30;
pub const HISTOGRAM_MAX_POINTS: u32 = 30;
pub const TEMPLATE_MAX_POINTS: u32 = 40;
pub const GEOMETRIC_MAX_POINTS: u32 = 50;

/// Points awarded per RANSAC inlier, capped at [`GEOMETRIC_MAX_POINTS`].
pub const POINTS_PER_INLIER: u32 = 2;

/// Weighted-sum totals strictly below this are rejected.
pub const WEIGHTED_SUM_REJECTION_FLOOR: u32 = 40;

/// Lowe's ratio: keep a match only if `d1 < RATIO * d2`.
pub const LOWE_RATIO: f32 = 0.75;

/// Fewer ratio-test survivors than this yields no geometric evidence.
pub const MIN_GOOD_MATCHES: usize = 12;

/// RANSAC inlier threshold in pixels.
pub const RANSAC_REPROJECTION_THRESHOLD: f64 = 5.0;

/// Threshold-priority: inlier count that wins outright.
pub const STRONG_GEOMETRY_INLIERS: usize = 18;

/// Threshold-priority: correlation that must be exceeded for the fallback.
pub const HISTOGRAM_FALLBACK_CORRELATION: f64 = 0.98;
