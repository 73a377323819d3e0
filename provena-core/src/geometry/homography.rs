//! Planar homography estimation.
//!
//! Minimal four-point solves come from a direct 8x8 linear system; the final
//! model is refit on all inliers with a normalized DLT. RANSAC sampling is
//! driven by a seeded generator so identical inputs give identical masks.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use crate::config::RansacConfig;

/// 2D point `[x, y]`.
pub type Point = [f64; 2];

/// A 3x3 projective transform mapping source points onto destination points.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    h: Matrix3<f64>,
}

impl Homography {
    pub fn from_matrix(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    /// Exact solve from four correspondences with `h[2][2]` fixed to one.
    pub fn from_four(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut m = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for i in 0..4 {
            let [sx, sy] = src[i];
            let [dx, dy] = dst[i];

            m[(i * 2, 0)] = sx;
            m[(i * 2, 1)] = sy;
            m[(i * 2, 2)] = 1.0;
            m[(i * 2, 6)] = -sx * dx;
            m[(i * 2, 7)] = -sy * dx;
            b[i * 2] = dx;

            m[(i * 2 + 1, 3)] = sx;
            m[(i * 2 + 1, 4)] = sy;
            m[(i * 2 + 1, 5)] = 1.0;
            m[(i * 2 + 1, 6)] = -sx * dy;
            m[(i * 2 + 1, 7)] = -sy * dy;
            b[i * 2 + 1] = dy;
        }

        let h = m.lu().solve(&b)?;
        let matrix = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        matrix.iter().all(|v| v.is_finite()).then_some(Self { h: matrix })
    }

    /// Least-squares fit over `n >= 4` correspondences (normalized DLT).
    pub fn fit(src: &[Point], dst: &[Point]) -> Option<Self> {
        if src.len() < 4 || src.len() != dst.len() {
            return None;
        }

        let t_src = normalizing_transform(src)?;
        let t_dst = normalizing_transform(dst)?;

        let mut ata = SMatrix::<f64, 9, 9>::zeros();
        for (s, d) in src.iter().zip(dst) {
            let s = t_src * Vector3::new(s[0], s[1], 1.0);
            let d = t_dst * Vector3::new(d[0], d[1], 1.0);
            let (x, y, u, v) = (s[0], s[1], d[0], d[1]);

            let r1 = SVector::<f64, 9>::from_column_slice(&[
                -x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u,
            ]);
            let r2 = SVector::<f64, 9>::from_column_slice(&[
                0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v,
            ]);
            ata += r1 * r1.transpose();
            ata += r2 * r2.transpose();
        }

        let eigen = ata.symmetric_eigen();
        let (min_idx, _) = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))?;
        let v = eigen.eigenvectors.column(min_idx);
        let normalized = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

        let mut h = t_dst.try_inverse()? * normalized * t_src;
        let scale = h[(2, 2)];
        if scale.abs() > f64::EPSILON {
            h /= scale;
        }
        h.iter().all(|v| v.is_finite()).then_some(Self { h })
    }

    /// Map a point through the homography; `None` at the line at infinity.
    pub fn project(&self, p: Point) -> Option<Point> {
        let res = self.h * Vector3::new(p[0], p[1], 1.0);
        let w = res[2];
        (w.abs() > f64::EPSILON).then(|| [res[0] / w, res[1] / w])
    }

    /// Squared distance between `project(src)` and `dst`.
    pub fn squared_error(&self, src: Point, dst: Point) -> f64 {
        match self.project(src) {
            Some([x, y]) => (x - dst[0]).powi(2) + (y - dst[1]).powi(2),
            None => f64::INFINITY,
        }
    }
}

/// A fitted model together with the per-correspondence inlier mask.
#[derive(Debug, Clone, PartialEq)]
pub struct RansacFit {
    pub homography: Homography,
    pub inlier_mask: Vec<bool>,
}

impl RansacFit {
    pub fn inlier_count(&self) -> usize {
        self.inlier_mask.iter().filter(|&&inlier| inlier).count()
    }
}

/// Robustly fit a homography mapping `src[i]` onto `dst[i]`.
///
/// Returns `None` when no non-degenerate model can be produced (fewer than
/// four correspondences, or every sample collinear).
pub fn find_homography_ransac(
    src: &[Point],
    dst: &[Point],
    config: &RansacConfig,
) -> Option<RansacFit> {
    let n = src.len();
    if n < 4 || n != dst.len() {
        return None;
    }

    let threshold_sq = config.reprojection_threshold * config.reprojection_threshold;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut needed = config.max_iterations;
    let mut iteration = 0;

    while iteration < needed.min(config.max_iterations) {
        iteration += 1;

        let sample = index::sample(&mut rng, n, 4).into_vec();
        let s = [src[sample[0]], src[sample[1]], src[sample[2]], src[sample[3]]];
        let d = [dst[sample[0]], dst[sample[1]], dst[sample[2]], dst[sample[3]]];
        if has_collinear_triple(&s) || has_collinear_triple(&d) {
            continue;
        }

        let Some(model) = Homography::from_four(&s, &d) else {
            continue;
        };
        let (mask, count) = score(&model, src, dst, threshold_sq);

        if best.as_ref().map_or(true, |(_, _, best_count)| count > *best_count) {
            needed = required_iterations(count, n, config.confidence, config.max_iterations);
            best = Some((model, mask, count));
        }
    }

    let (mut homography, mut inlier_mask, count) = best?;

    if count >= 4 {
        let (inlier_src, inlier_dst): (Vec<Point>, Vec<Point>) = src
            .iter()
            .zip(dst)
            .zip(&inlier_mask)
            .filter(|(_, &inlier)| inlier)
            .map(|((s, d), _)| (*s, *d))
            .unzip();

        if let Some(refined) = Homography::fit(&inlier_src, &inlier_dst) {
            let (refined_mask, refined_count) = score(&refined, src, dst, threshold_sq);
            if refined_count >= count {
                homography = refined;
                inlier_mask = refined_mask;
            }
        }
    }

    Some(RansacFit {
        homography,
        inlier_mask,
    })
}

fn score(
    model: &Homography,
    src: &[Point],
    dst: &[Point],
    threshold_sq: f64,
) -> (Vec<bool>, usize) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(&s, &d)| model.squared_error(s, d) <= threshold_sq)
        .collect();
    let count = mask.iter().filter(|&&inlier| inlier).count();
    (mask, count)
}

/// Iterations needed to draw one all-inlier sample with the given confidence.
fn required_iterations(
    inliers: usize,
    total: usize,
    confidence: f64,
    max_iterations: usize,
) -> usize {
    let inlier_ratio = inliers as f64 / total as f64;
    let p_good_sample = inlier_ratio.powi(4);
    if p_good_sample <= f64::EPSILON {
        return max_iterations;
    }
    if p_good_sample >= 1.0 - f64::EPSILON {
        return 1;
    }

    let num = (1.0 - confidence).max(f64::MIN_POSITIVE).ln();
    let denom = (1.0 - p_good_sample).ln();
    if denom >= 0.0 || -num >= max_iterations as f64 * -denom {
        return max_iterations;
    }
    ((num / denom).round() as usize).clamp(1, max_iterations)
}

fn has_collinear_triple(points: &[Point; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().any(|&[a, b, c]| {
        let (dx1, dy1) = (points[b][0] - points[a][0], points[b][1] - points[a][1]);
        let (dx2, dy2) = (points[c][0] - points[a][0], points[c][1] - points[a][1]);
        let cross = dx2 * dy1 - dy2 * dx1;
        cross.abs() <= f32::EPSILON as f64 * (dx1.abs() + dy1.abs() + dx2.abs() + dy2.abs())
    })
}

/// Similarity transform moving the centroid to the origin with mean
/// distance sqrt(2).
fn normalizing_transform(points: &[Point]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist <= f64::EPSILON {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn grid(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| {
                [
                    (i % 5) as f64 * 37.0 + (i / 5) as f64 * 3.0,
                    (i / 5) as f64 * 29.0 + (i % 3) as f64 * 5.0,
                ]
            })
            .collect()
    }

    fn known() -> Homography {
        Homography::from_matrix(Matrix3::new(
            0.9, -0.2, 15.0, //
            0.15, 1.1, -7.0, //
            0.0004, -0.0002, 1.0,
        ))
    }

    #[test]
    fn test_from_four_recovers_translation() {
        let src = [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]];
        let dst = src.map(|[x, y]| [x + 3.0, y - 2.0]);
        let h = Homography::from_four(&src, &dst).unwrap();
        let p = h.project([5.0, 5.0]).unwrap();
        assert!((p[0] - 8.0).abs() < 1e-9 && (p[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fit_recovers_projective_map() {
        let h = known();
        let src = grid(20);
        let dst: Vec<Point> = src.iter().map(|&p| h.project(p).unwrap()).collect();

        let fitted = Homography::fit(&src, &dst).unwrap();
        for (&s, &d) in src.iter().zip(&dst) {
            assert!(fitted.squared_error(s, d) < 1e-12);
        }
    }

    #[test]
    fn test_ransac_all_inliers() {
        let src = grid(20);
        let dst: Vec<Point> = src.iter().map(|p| [p[0] + 5.0, p[1] + 7.0]).collect();
        let fit = find_homography_ransac(&src, &dst, &RansacConfig::default()).unwrap();
        assert_eq!(fit.inlier_count(), 20);
    }

    #[test]
    fn test_ransac_rejects_outliers() {
        let h = known();
        let mut src = grid(25);
        let mut dst: Vec<Point> = src.iter().map(|&p| h.project(p).unwrap()).collect();

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..10 {
            src.push([rng.gen_range(0.0..200.0), rng.gen_range(0.0..150.0)]);
            dst.push([rng.gen_range(500.0..900.0), rng.gen_range(500.0..900.0)]);
        }

        let fit = find_homography_ransac(&src, &dst, &RansacConfig::default()).unwrap();
        assert_eq!(fit.inlier_count(), 25);
        assert!(fit.inlier_mask[..25].iter().all(|&m| m));
        assert!(fit.inlier_mask[25..].iter().all(|&m| !m));
    }

    #[test]
    fn test_ransac_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut random_points = || -> Vec<Point> {
            (0..40)
                .map(|_| [rng.gen_range(0.0..300.0), rng.gen_range(0.0..300.0)])
                .collect()
        };
        let src = random_points();
        let dst = random_points();

        let config = RansacConfig::default();
        assert_eq!(
            find_homography_ransac(&src, &dst, &config),
            find_homography_ransac(&src, &dst, &config)
        );
    }

    #[test]
    fn test_degenerate_input_yields_none() {
        let line: Vec<Point> = (0..12).map(|i| [i as f64, 2.0 * i as f64]).collect();
        assert!(find_homography_ransac(&line, &line, &RansacConfig::default()).is_none());
        assert!(find_homography_ransac(&line[..3], &line[..3], &RansacConfig::default()).is_none());
    }

    #[test]
    fn test_required_iterations_shrinks_with_inlier_ratio() {
        let few = required_iterations(5, 100, 0.995, 2000);
        let many = required_iterations(90, 100, 0.995, 2000);
        assert_eq!(few, 2000);
        assert!(many < 20);
        assert_eq!(required_iterations(100, 100, 0.995, 2000), 1);
    }
}
