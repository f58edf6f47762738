//! Tree construction: parameters, makers, and the update entry point.
//!
//! One operation is exposed: [`update`] takes per-row gradient pairs, a
//! feature matrix, and a slice of fresh trees, and grows each tree in turn.
//! While several trees are grown in one call the learning rate is divided
//! by their count so the sum of their outputs keeps the intended scale.
//! The maker is selected by [`TreeMethod`]; [`update_distributed`] is the
//! same operation against an explicit peer group.

pub mod dist;
pub mod exact;
pub mod hist;
pub mod position;
pub mod prune;
pub mod sampling;
pub mod sketch;
pub mod split;
pub mod stats;

pub use dist::DistColMaker;
pub use exact::{ColMaker, RoutingMode};
pub use hist::{HistKind, HistMaker};
pub use position::{Frontier, Position, PositionMap};
pub use prune::prune_tree;
pub use sampling::ColumnSampler;
pub use sketch::{SketchBuilder, WQSummary, WQuantileSketch};
pub use split::SplitEntry;
pub use stats::{GainParams, GradPair, GradStats, SplitStats};

use crate::data::FeatureMatrix;
use crate::error::UpdateError;
use crate::sync::{Collective, LocalSync, Reducible};
use crate::tree::RegTree;

/// Numeric floor: hessian sums below this cannot support a split, and a
/// split is only applied when its loss change clears it.
pub(crate) const RT_EPS: f32 = 1e-5;
/// Two adjacent feature values closer than this are treated as equal when
/// choosing thresholds.
pub(crate) const RT_2EPS: f32 = 2.0 * RT_EPS;
/// Decorrelates the column-sampling stream from the row-sampling stream.
pub(crate) const COLSAMPLE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

// ============================================================================
// Parameters
// ============================================================================

/// Split-finding strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TreeMethod {
    /// Exact enumeration over presorted columns.
    #[default]
    Exact,
    /// Histograms with column-sketch proposals.
    HistColumn,
    /// Histograms with row-transpose proposals.
    HistRow,
}

/// Training parameters recognized by every maker.
#[derive(Clone, Debug)]
pub struct TrainParams {
    /// Shrinkage applied to leaf values.
    pub learning_rate: f32,
    /// Hard cap on tree depth.
    pub max_depth: u32,
    /// Minimum loss change a split must keep to survive pruning.
    pub min_split_loss: f32,
    /// Regularization constants for gain/weight formulas.
    pub gain: GainParams,
    /// Bernoulli per-row sampling probability.
    pub subsample: f32,
    /// Fraction of features sampled once per tree.
    pub colsample_bytree: f32,
    /// Fraction of the tree's features re-sampled each level.
    pub colsample_bylevel: f32,
    /// Quantile sketch error; the sketch holds `ceil(1 / sketch_eps)` entries.
    pub sketch_eps: f32,
    /// Seed for row and column sampling.
    pub seed: u64,
    /// Maker selection.
    pub tree_method: TreeMethod,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            max_depth: 6,
            min_split_loss: 0.0,
            gain: GainParams::default(),
            subsample: 1.0,
            colsample_bytree: 1.0,
            colsample_bylevel: 1.0,
            sketch_eps: 0.03,
            seed: 0,
            tree_method: TreeMethod::Exact,
        }
    }
}

impl TrainParams {
    /// Sketch capacity implied by `sketch_eps`.
    pub fn max_sketch_size(&self) -> usize {
        (1.0 / self.sketch_eps).ceil() as usize
    }

    /// Whether a split with this loss change at this child depth should be
    /// collapsed.
    pub fn need_prune(&self, loss_chg: f32, depth: usize) -> bool {
        loss_chg < self.min_split_loss
            || (self.max_depth != 0 && depth as u32 > self.max_depth)
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_tree_method(mut self, tree_method: TreeMethod) -> Self {
        self.tree_method = tree_method;
        self
    }
}

/// Per-update collaborator metadata.
#[derive(Clone, Debug)]
pub struct TrainInfo {
    /// Number of training rows.
    pub num_row: usize,
    /// Optional per-row root assignment; empty means every row starts at
    /// root 0.
    pub root_index: Vec<u32>,
}

impl TrainInfo {
    pub fn new(num_row: usize) -> Self {
        Self {
            num_row,
            root_index: Vec::new(),
        }
    }

    pub fn with_roots(mut self, root_index: Vec<u32>) -> Self {
        self.root_index = root_index;
        self
    }
}

// ============================================================================
// Update entry points
// ============================================================================

/// Grow every tree in `trees` from its fresh state, then prune it.
pub fn update<M: FeatureMatrix + Sync>(
    params: &TrainParams,
    gpair: &[GradPair],
    matrix: &M,
    info: &TrainInfo,
    trees: &mut [RegTree],
) -> Result<(), UpdateError> {
    update_with_stats::<M, GradStats>(params, gpair, matrix, info, trees)
}

/// [`update`] generalized over the statistics block.
pub fn update_with_stats<M: FeatureMatrix + Sync, S: SplitStats + Reducible>(
    params: &TrainParams,
    gpair: &[GradPair],
    matrix: &M,
    info: &TrainInfo,
    trees: &mut [RegTree],
) -> Result<(), UpdateError> {
    if trees.is_empty() {
        return Ok(());
    }
    // spread the shrinkage across the trees grown in this call
    let mut scaled = params.clone();
    let num_trees = trees.len();
    scaled.learning_rate = params.learning_rate / num_trees as f32;
    for (i, tree) in trees.iter_mut().enumerate() {
        let mut tree_params = scaled.clone();
        tree_params.seed = scaled.seed.wrapping_add(i as u64);
        grow_one::<M, S, LocalSync>(&tree_params, gpair, matrix, info, tree, &LocalSync)?;
        prune_tree(&tree_params, tree);
        log::info!(
            "tree {} of {}: {} extra nodes, depth {}",
            i + 1,
            num_trees,
            tree.num_extra_nodes(),
            tree.header().max_depth
        );
    }
    Ok(())
}

/// Grow one tree against a peer group. The exact maker routes through the
/// reduced row-direction bitmap and the finished tree is broadcast from
/// rank 0; the histogram makers synchronize their sketches and histograms.
pub fn update_distributed<M, S, C>(
    params: &TrainParams,
    gpair: &[GradPair],
    matrix: &M,
    info: &TrainInfo,
    tree: &mut RegTree,
    collective: &C,
) -> Result<(), UpdateError>
where
    M: FeatureMatrix + Sync,
    S: SplitStats + Reducible,
    C: Collective,
{
    match params.tree_method {
        TreeMethod::Exact => {
            DistColMaker::new(params, collective).update::<M, S>(gpair, matrix, info, tree)
        }
        TreeMethod::HistColumn | TreeMethod::HistRow => {
            grow_one::<M, S, C>(params, gpair, matrix, info, tree, collective)?;
            prune_tree(params, tree);
            Ok(())
        }
    }
}

fn grow_one<M, S, C>(
    params: &TrainParams,
    gpair: &[GradPair],
    matrix: &M,
    info: &TrainInfo,
    tree: &mut RegTree,
    collective: &C,
) -> Result<(), UpdateError>
where
    M: FeatureMatrix + Sync,
    S: SplitStats + Reducible,
    C: Collective,
{
    match params.tree_method {
        TreeMethod::Exact => {
            ColMaker::<M, S, C>::new(params, gpair, matrix, info, collective, RoutingMode::Column)
                .update(tree)
        }
        TreeMethod::HistColumn => {
            HistMaker::<M, S, C>::new(params, gpair, matrix, info, collective, HistKind::Column)
                .update(tree)
        }
        TreeMethod::HistRow => {
            HistMaker::<M, S, C>::new(params, gpair, matrix, info, collective, HistKind::Row)
                .update(tree)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_defaults() {
        let params = TrainParams::default();
        assert_eq!(params.max_depth, 6);
        assert!((params.learning_rate - 0.3).abs() < 1e-6);
        assert!((params.gain.reg_lambda - 1.0).abs() < 1e-6);
        assert_eq!(params.tree_method, TreeMethod::Exact);
    }

    #[test]
    fn test_max_sketch_size() {
        let params = TrainParams::default().with_max_depth(3);
        assert_eq!(params.max_sketch_size(), 34);
        let fine = TrainParams {
            sketch_eps: 0.01,
            ..TrainParams::default()
        };
        assert_eq!(fine.max_sketch_size(), 100);
    }

    #[test]
    fn test_need_prune() {
        let params = TrainParams {
            min_split_loss: 1.0,
            max_depth: 2,
            ..TrainParams::default()
        };
        assert!(params.need_prune(0.5, 1));
        assert!(!params.need_prune(1.5, 1));
        assert!(params.need_prune(1.5, 3));
    }

    #[test]
    fn test_learning_rate_split_across_trees() {
        use crate::data::SparseMatrix;

        let matrix = SparseMatrix::from_rows(&[vec![(0, 1.0)], vec![(0, 2.0)]], 1);
        let info = TrainInfo::new(2);
        let gpair = [GradPair::new(1.0, 1.0), GradPair::new(-1.0, 1.0)];
        let params = TrainParams {
            learning_rate: 0.4,
            max_depth: 1,
            gain: GainParams::no_regularization().with_min_child_weight(1.0),
            ..TrainParams::default()
        };

        let mut one = vec![RegTree::new(1, 1, 0)];
        update(&params, &gpair, &matrix, &info, &mut one).unwrap();

        let mut two = vec![RegTree::new(1, 1, 0), RegTree::new(1, 1, 0)];
        update(&params, &gpair, &matrix, &info, &mut two).unwrap();

        let leaf = |t: &RegTree| t.node(t.node(0).cleft as u32).leaf_value;
        assert!((leaf(&one[0]) - 2.0 * leaf(&two[0])).abs() < 1e-6);
        // both trees of the pair see identical data, so their sum restores
        // the single-tree output
        assert!((leaf(&two[0]) + leaf(&two[1]) - leaf(&one[0])).abs() < 1e-6);
    }
}
