use super::{ComparisonRule, Measurement, RuleOutcome};
use crate::config::RansacConfig;
use crate::constants::{GEOMETRIC_MAX_POINTS, POINTS_PER_INLIER};
use crate::geometry;
use crate::signature::{ProbeImage, Signature};

/// Counts RANSAC homography inliers between probe and target descriptors.
///
/// Robust to crops, rotation and scale. Awards two points per inlier up to
/// the maximum.
#[derive(Debug, Clone, Default)]
pub struct GeometricFeatureRule {
    ransac: RansacConfig,
}

impl GeometricFeatureRule {
    pub fn new(ransac: RansacConfig) -> Self {
        Self { ransac }
    }
}

impl ComparisonRule for GeometricFeatureRule {
    fn name(&self) -> &'static str {
        "ORB"
    }

    fn max_points(&self) -> u32 {
        GEOMETRIC_MAX_POINTS
    }

    fn evaluate(&self, target: &Signature, probe: &ProbeImage) -> RuleOutcome {
        let evidence = geometry::verify(
            &probe.signature.descriptors,
            &target.descriptors,
            &self.ransac,
        );

        let points = u32::try_from(evidence.inliers)
            .unwrap_or(u32::MAX)
            .saturating_mul(POINTS_PER_INLIER)
            .min(self.max_points());

        RuleOutcome::new(
            self,
            points,
            format!(
                "ORB inliers {} of {} good matches",
                evidence.inliers, evidence.good_matches
            ),
            Measurement::Geometry {
                good_matches: evidence.good_matches,
                inliers: evidence.inliers,
            },
        )
    }
}
