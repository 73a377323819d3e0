//! Geometric verification between two descriptor sets.
//!
//! Pipeline: 2-nearest-neighbour Hamming matching, Lowe's ratio test, then a
//! RANSAC homography over the survivors. The number of geometrically
//! consistent correspondences (inliers) is the evidence.

pub mod homography;
pub mod knn;

pub use homography::{find_homography_ransac, Homography, Point, RansacFit};
pub use knn::{match_descriptors, DescriptorMatch};

use crate::config::RansacConfig;
use crate::constants::{LOWE_RATIO, MIN_GOOD_MATCHES};
use crate::signature::DescriptorSet;

/// Outcome of geometric verification between a probe and one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometricEvidence {
    /// Matches that survived the ratio test
    pub good_matches: usize,
    /// RANSAC inliers (zero when too few good matches or the fit degenerates)
    pub inliers: usize,
}

/// Match `probe` against `target` and count homography inliers.
///
/// Absence of evidence is not an error: fewer than two descriptors on either
/// side, fewer than [`MIN_GOOD_MATCHES`] survivors, or a degenerate fit all
/// report zero inliers.
pub fn verify(
    probe: &DescriptorSet,
    target: &DescriptorSet,
    config: &RansacConfig,
) -> GeometricEvidence {
    let good = match_descriptors(probe.features(), target.features(), LOWE_RATIO);
    let good_matches = good.len();
    if good_matches < MIN_GOOD_MATCHES {
        return GeometricEvidence {
            good_matches,
            inliers: 0,
        };
    }

    let (src, dst): (Vec<Point>, Vec<Point>) = good
        .iter()
        .map(|m| {
            let q = &probe.features()[m.query].keypoint;
            let t = &target.features()[m.train].keypoint;
            ([q.x as f64, q.y as f64], [t.x as f64, t.y as f64])
        })
        .unzip();

    let inliers = find_homography_ransac(&src, &dst, config)
        .map(|fit| fit.inlier_count())
        .unwrap_or(0);

    GeometricEvidence {
        good_matches,
        inliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Feature, Keypoint};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_features(rng: &mut StdRng, count: usize) -> Vec<Feature> {
        (0..count)
            .map(|i| Feature {
                keypoint: Keypoint {
                    x: (i % 6) as f32 * 31.0 + (i / 6) as f32 * 4.0,
                    y: (i / 6) as f32 * 27.0 + (i % 4) as f32 * 6.0,
                    angle: 0.0,
                    response: 10.0,
                    octave: 0,
                },
                descriptor: rng.gen(),
            })
            .collect()
    }

    fn shifted(features: &[Feature], dx: f32, dy: f32) -> Vec<Feature> {
        features
            .iter()
            .map(|f| Feature {
                keypoint: Keypoint {
                    x: f.keypoint.x + dx,
                    y: f.keypoint.y + dy,
                    ..f.keypoint
                },
                descriptor: f.descriptor,
            })
            .collect()
    }

    #[test]
    fn test_consistent_matches_are_all_inliers() {
        let mut rng = StdRng::seed_from_u64(5);
        let probe = random_features(&mut rng, 20);
        let target = shifted(&probe, 12.0, -4.0);

        let evidence = verify(
            &DescriptorSet::new(probe),
            &DescriptorSet::new(target),
            &RansacConfig::default(),
        );
        assert_eq!(evidence.good_matches, 20);
        assert_eq!(evidence.inliers, 20);
    }

    #[test]
    fn test_ten_survivors_give_no_inliers() {
        let mut rng = StdRng::seed_from_u64(8);
        let distinct = random_features(&mut rng, 10);

        // Ambiguous probe descriptors: each has two identical copies in the target.
        let ambiguous = random_features(&mut rng, 5);
        let mut target = distinct.clone();
        target.extend(ambiguous.iter().cloned());
        target.extend(ambiguous.iter().cloned());

        let mut probe = distinct;
        probe.extend(ambiguous);

        let evidence = verify(
            &DescriptorSet::new(probe),
            &DescriptorSet::new(target),
            &RansacConfig::default(),
        );
        assert_eq!(evidence.good_matches, 10);
        assert_eq!(evidence.inliers, 0);
    }

    #[test]
    fn test_empty_sets_give_no_evidence() {
        let evidence = verify(
            &DescriptorSet::default(),
            &DescriptorSet::default(),
            &RansacConfig::default(),
        );
        assert_eq!(evidence, GeometricEvidence::default());
    }
}
