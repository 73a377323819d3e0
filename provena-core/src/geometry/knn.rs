//! Brute-force Hamming matching with Lowe's ratio test.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::signature::{hamming_distance, Feature};

/// A ratio-test survivor: `query` indexes the probe set, `train` the target set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: u32,
}

/// Find, for each query descriptor, its two nearest train descriptors and
/// keep the pair only if `nearest < ratio * second_nearest`.
///
/// Returns no matches if either side has fewer than two descriptors. Output
/// is ordered by query index.
pub fn match_descriptors(query: &[Feature], train: &[Feature], ratio: f32) -> Vec<DescriptorMatch> {
    if query.len() < 2 || train.len() < 2 {
        return Vec::new();
    }

    query
        .par_iter()
        .enumerate()
        .filter_map(|(query_idx, q)| {
            let mut best = u32::MAX;
            let mut second = u32::MAX;
            let mut best_idx = 0;

            for (train_idx, t) in train.iter().enumerate() {
                let distance = hamming_distance(&q.descriptor, &t.descriptor);
                if distance < best {
                    second = best;
                    best = distance;
                    best_idx = train_idx;
                } else if distance < second {
                    second = distance;
                }
            }

            ((best as f32) < ratio * second as f32).then_some(DescriptorMatch {
                query: query_idx,
                train: best_idx,
                distance: best,
            })
        })
        .collect()
}
