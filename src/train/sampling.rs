//! Feature sampling for tree construction.
//!
//! Rows are subsampled at position-init time (a retired row simply stops
//! contributing statistics); columns are sampled here, once per tree and
//! optionally re-sampled per level.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Samples the feature set used by split finding.
#[derive(Debug)]
pub struct ColumnSampler {
    tree_features: Vec<u32>,
    bylevel: f32,
    rng: Xoshiro256PlusPlus,
}

impl ColumnSampler {
    /// Sample the per-tree feature set up front.
    pub fn new(num_col: usize, bytree: f32, bylevel: f32, seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let all: Vec<u32> = (0..num_col as u32).collect();
        let tree_features = sample_fraction(&all, bytree, &mut rng);
        Self {
            tree_features,
            bylevel,
            rng,
        }
    }

    /// Features available at the current level.
    pub fn level_features(&mut self) -> Vec<u32> {
        if self.bylevel < 1.0 {
            sample_fraction(&self.tree_features, self.bylevel, &mut self.rng)
        } else {
            self.tree_features.clone()
        }
    }
}

/// Sample `rate` of `pool` without replacement via partial Fisher-Yates,
/// returning a sorted subset. A rate of 1 or more returns the whole pool.
fn sample_fraction(pool: &[u32], rate: f32, rng: &mut Xoshiro256PlusPlus) -> Vec<u32> {
    if rate >= 1.0 || pool.is_empty() {
        return pool.to_vec();
    }
    let n = pool.len();
    let take = ((n as f32 * rate).ceil() as usize).clamp(1, n);
    let mut indices: Vec<u32> = pool.to_vec();
    for i in 0..take {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    let mut sampled = indices[..take].to_vec();
    sampled.sort_unstable();
    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_rate_returns_all() {
        let mut sampler = ColumnSampler::new(5, 1.0, 1.0, 7);
        assert_eq!(sampler.level_features(), vec![0, 1, 2, 3, 4]);
        // without bylevel sampling, every level sees the same set
        assert_eq!(sampler.level_features(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_bytree_subsets_and_is_seeded() {
        let a = ColumnSampler::new(100, 0.3, 1.0, 42).level_features();
        let b = ColumnSampler::new(100, 0.3, 1.0, 42).level_features();
        assert_eq!(a, b);
        assert_eq!(a.len(), 30);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bylevel_resamples_within_tree_set() {
        let mut sampler = ColumnSampler::new(100, 0.5, 0.4, 9);
        let tree_set = sampler.tree_features.clone();
        let lvl = sampler.level_features();
        assert_eq!(lvl.len(), 20);
        assert!(lvl.iter().all(|f| tree_set.contains(f)));
    }

    #[test]
    fn test_at_least_one_feature() {
        let mut sampler = ColumnSampler::new(10, 0.01, 1.0, 0);
        assert_eq!(sampler.level_features().len(), 1);
    }
}
