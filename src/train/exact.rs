//! Exact greedy split finding over presorted columns.
//!
//! [`ColMaker`] grows one tree level at a time. Per level it aggregates
//! per-node statistics in a single pass over the working rowset, then sweeps
//! every candidate feature column twice:
//!
//! - **forward** (ascending fvalue): the accumulator holds the prospective
//!   left child, the complement holds the right child *plus every row
//!   missing the feature*, so the proposal carries `default_left = false`;
//! - **backward** (descending fvalue): symmetric, proposing
//!   `default_left = true`.
//!
//! Thresholds land between adjacent distinct values (their midpoint), and a
//! value is only treated as distinct when it clears `2·RT_EPS`, so a split
//! condition never equals an observed training value. Each sweep ends with a
//! tail proposal that separates every observed row from the missing mass.
//!
//! Features are enumerated in parallel; per-node bests merge through the
//! [`SplitEntry`] tie-break, whose total order makes the reduction
//! independent of thread count and scheduling.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::data::{Entry, FeatureMatrix};
use crate::error::UpdateError;
use crate::sync::{BitMap, Collective};
use crate::tree::RegTree;

use super::position::{Frontier, PositionMap};
use super::sampling::ColumnSampler;
use super::split::SplitEntry;
use super::stats::{GradPair, SplitStats};
use super::{TrainInfo, TrainParams, COLSAMPLE_SEED_SALT, RT_2EPS, RT_EPS};

/// How rows reach their children after splits are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingMode {
    /// Route directly from local columns. Single-process default.
    Column,
    /// Mark non-default rows in a bitmap and OR it across peers first;
    /// required when each peer only observes a shard of the columns.
    Bitmap,
}

/// Per-node search state for one level.
#[derive(Clone, Debug)]
struct NodeEntry<S> {
    stats: S,
    root_gain: f64,
    weight: f64,
    best: SplitEntry,
}

impl<S: Default> Default for NodeEntry<S> {
    fn default() -> Self {
        Self {
            stats: S::default(),
            root_gain: 0.0,
            weight: 0.0,
            best: SplitEntry::default(),
        }
    }
}

/// The exact greedy tree maker.
pub struct ColMaker<'a, M: FeatureMatrix, S: SplitStats, C: Collective> {
    params: &'a TrainParams,
    gpair: &'a [GradPair],
    matrix: &'a M,
    info: &'a TrainInfo,
    collective: &'a C,
    routing: RoutingMode,
    positions: PositionMap,
    frontier: Frontier,
    snode: Vec<NodeEntry<S>>,
    bitmap: BitMap,
}

impl<'a, M: FeatureMatrix + Sync, S: SplitStats, C: Collective> ColMaker<'a, M, S, C> {
    pub fn new(
        params: &'a TrainParams,
        gpair: &'a [GradPair],
        matrix: &'a M,
        info: &'a TrainInfo,
        collective: &'a C,
        routing: RoutingMode,
    ) -> Self {
        Self {
            params,
            gpair,
            matrix,
            info,
            collective,
            routing,
            positions: PositionMap::init(&[], &[], 1, 1.0, &mut Xoshiro256PlusPlus::seed_from_u64(0))
                .expect("empty init cannot fail"),
            frontier: Frontier::default(),
            snode: Vec::new(),
            bitmap: BitMap::default(),
        }
    }

    /// Final row positions, for invariant checks after `update`.
    pub fn positions(&self) -> &PositionMap {
        &self.positions
    }

    /// Grow `tree` from its fresh state to a finished tree.
    pub fn update(&mut self, tree: &mut RegTree) -> Result<(), UpdateError> {
        if self.gpair.len() != self.matrix.num_row() {
            return Err(UpdateError::GradientLength {
                gpair: self.gpair.len(),
                rows: self.matrix.num_row(),
            });
        }
        if tree.num_feature() != self.matrix.num_col() {
            return Err(UpdateError::FeatureCountMismatch {
                matrix: self.matrix.num_col(),
                tree: tree.num_feature(),
            });
        }
        if tree.num_nodes() != tree.num_roots() {
            return Err(UpdateError::TreeNotFresh {
                num_nodes: tree.num_nodes(),
                num_roots: tree.num_roots(),
            });
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.params.seed);
        self.positions = PositionMap::init(
            self.gpair,
            &self.info.root_index,
            tree.num_roots(),
            self.params.subsample,
            &mut rng,
        )?;
        self.frontier = Frontier::from_roots(tree);
        self.snode.clear();
        let mut sampler = ColumnSampler::new(
            self.matrix.num_col(),
            self.params.colsample_bytree,
            self.params.colsample_bylevel,
            self.params.seed ^ COLSAMPLE_SEED_SALT,
        );

        self.init_node_stats(tree)?;
        for depth in 0..self.params.max_depth {
            let feats = sampler.level_features();
            self.find_splits(&feats)?;
            self.apply_splits(tree);
            self.reset_positions(tree)?;
            self.frontier.refresh(tree);
            self.init_node_stats(tree)?;
            log::debug!(
                "exact depth {}: {} nodes expanding",
                depth + 1,
                self.frontier.len()
            );
            if self.frontier.is_empty() {
                break;
            }
        }
        // nodes still queued at the depth cap become leaves
        for &nid in self.frontier.nodes().to_vec().iter() {
            let weight = self.snode[nid as usize].weight;
            tree.node_mut(nid)
                .set_leaf((weight * self.params.learning_rate as f64) as f32);
        }
        self.write_stats(tree);
        tree.refresh_max_depth();
        Ok(())
    }

    /// Aggregate statistics for every queued node and derive its root gain
    /// and leaf weight.
    fn init_node_stats(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        self.snode.resize(tree.num_nodes(), NodeEntry::default());
        if self.frontier.is_empty() {
            return Ok(());
        }
        let mut sums: Vec<S> = vec![S::default(); self.frontier.len()];
        for &ridx in self.matrix.buffered_rowset() {
            let p = self.positions.get(ridx);
            if !p.is_active() {
                continue;
            }
            if let Some(wid) = self.frontier.work_of(p.node()) {
                sums[wid].add_pair(self.gpair[ridx as usize]);
            }
        }
        let gain = &self.params.gain;
        for (wid, &nid) in self.frontier.nodes().iter().enumerate() {
            let s = sums[wid].clone();
            if s.sum_hess() < 0.0 {
                return Err(UpdateError::NegativeHessian {
                    nid,
                    sum_hess: s.sum_hess(),
                });
            }
            let is_root = (nid as usize) < tree.num_roots();
            let (root_gain, weight) = if is_root {
                (s.calc_root_gain(gain), s.calc_root_weight(gain))
            } else {
                (s.calc_gain(gain), s.calc_weight(gain))
            };
            self.snode[nid as usize] = NodeEntry {
                stats: s,
                root_gain,
                weight,
                best: SplitEntry::default(),
            };
        }
        Ok(())
    }

    /// Enumerate candidate features in parallel and record the per-node
    /// best split.
    fn find_splits(&mut self, feats: &[u32]) -> Result<(), UpdateError> {
        let nq = self.frontier.len();
        if nq == 0 {
            return Ok(());
        }
        let mut best = vec![SplitEntry::default(); nq];
        for batch in self.matrix.col_batches(Some(feats)) {
            let this = &*self;
            let per_feature: Vec<Vec<SplitEntry>> = batch
                .cols()
                .par_iter()
                .map(|&(fid, col)| this.enumerate_feature(fid, col))
                .collect();
            for feature_best in per_feature {
                for (acc, e) in best.iter_mut().zip(feature_best.iter()) {
                    acc.update(e);
                }
            }
        }
        self.collective.allreduce(&mut best)?;
        for (wid, &nid) in self.frontier.nodes().iter().enumerate() {
            self.snode[nid as usize].best = best[wid];
        }
        Ok(())
    }

    /// Both sweeps of one feature column.
    fn enumerate_feature(&self, fid: u32, col: &[Entry]) -> Vec<SplitEntry> {
        let mut best = vec![SplitEntry::default(); self.frontier.len()];
        self.enumerate_sweep(fid, col.iter(), false, &mut best);
        self.enumerate_sweep(fid, col.iter().rev(), true, &mut best);
        best
    }

    /// One directional sweep over a column.
    ///
    /// `backward == false` walks ascending fvalues and accumulates the
    /// prospective left child; `backward == true` walks descending and
    /// accumulates the right child. Either way the complement comes from
    /// `set_subtract` against the node totals.
    fn enumerate_sweep<'e, I>(&self, fid: u32, entries: I, backward: bool, best: &mut [SplitEntry])
    where
        I: Iterator<Item = &'e Entry>,
    {
        let gain = &self.params.gain;
        let min_weight = (gain.min_child_weight as f64).max(RT_EPS as f64);
        let queue = self.frontier.nodes();
        let mut acc: Vec<(S, Option<f32>)> = vec![(S::default(), None); queue.len()];

        for e in entries {
            let p = self.positions.get(e.index);
            if !p.is_active() {
                continue;
            }
            let Some(wid) = self.frontier.work_of(p.node()) else {
                continue;
            };
            let g = self.gpair[e.index as usize];
            let node = &self.snode[queue[wid] as usize];
            let (stats, last) = &mut acc[wid];
            match *last {
                None => {
                    stats.add_pair(g);
                    *last = Some(e.fvalue);
                }
                Some(lv) => {
                    if (e.fvalue - lv).abs() > RT_2EPS && stats.sum_hess() >= min_weight {
                        let mut other = S::default();
                        other.set_subtract(&node.stats, stats);
                        if other.sum_hess() >= min_weight {
                            let loss_chg = (stats.calc_gain(gain) + other.calc_gain(gain)
                                - node.root_gain) as f32;
                            best[wid].update_split(
                                loss_chg,
                                fid,
                                0.5 * (e.fvalue + lv),
                                backward,
                            );
                        }
                    }
                    stats.add_pair(g);
                    *last = Some(e.fvalue);
                }
            }
        }

        // tail: every observed row on one side, the missing mass on the other
        for (wid, (stats, last)) in acc.iter().enumerate() {
            let Some(lv) = *last else {
                continue;
            };
            if stats.sum_hess() < min_weight {
                continue;
            }
            let node = &self.snode[queue[wid] as usize];
            let mut other = S::default();
            other.set_subtract(&node.stats, stats);
            if other.sum_hess() < min_weight {
                continue;
            }
            let loss_chg =
                (stats.calc_gain(gain) + other.calc_gain(gain) - node.root_gain) as f32;
            let gap = lv.abs() + RT_EPS;
            let delta = if backward { -gap } else { gap };
            best[wid].update_split(loss_chg, fid, lv + delta, backward);
        }
    }

    /// Turn each queued node into a split or a final leaf.
    fn apply_splits(&mut self, tree: &mut RegTree) {
        let lr = self.params.learning_rate as f64;
        for &nid in self.frontier.nodes().to_vec().iter() {
            let entry = &self.snode[nid as usize];
            if entry.best.loss_chg > RT_EPS {
                let best = entry.best;
                tree.add_childs(nid);
                tree.node_mut(nid)
                    .set_split(best.split_index, best.split_value, best.default_left);
            } else {
                let value = (entry.weight * lr) as f32;
                tree.node_mut(nid).set_leaf(value);
            }
        }
    }

    fn reset_positions(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        match self.routing {
            RoutingMode::Column => {
                self.positions
                    .route_non_default(self.frontier.nodes(), self.matrix, tree);
                self.positions
                    .route_default(&self.frontier, self.matrix.buffered_rowset(), tree);
                Ok(())
            }
            RoutingMode::Bitmap => self.reset_positions_bitmap(tree),
        }
    }

    /// Distributed routing: each peer marks the rows it can prove take the
    /// non-default direction, the bitmaps are OR-combined, and marked rows
    /// go to the non-default child. Everything else falls through to the
    /// default pass.
    fn reset_positions_bitmap(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        let fsplits =
            PositionMap::split_features(self.frontier.nodes(), tree, self.matrix.num_col());
        self.bitmap.reset(self.positions.len());
        for batch in self.matrix.col_batches(Some(&fsplits)) {
            for &(fid, col) in batch.cols() {
                for e in col {
                    let nid = self.positions.get(e.index).node();
                    let node = tree.node(nid);
                    if !node.is_leaf() && node.split_index == fid {
                        let goes_left = e.fvalue < node.split_cond;
                        if goes_left != node.default_left {
                            self.bitmap.set(e.index as usize);
                        }
                    }
                }
            }
        }
        self.collective.allreduce(self.bitmap.words_mut())?;
        for &ridx in self.matrix.buffered_rowset() {
            if !self.bitmap.get(ridx as usize) {
                continue;
            }
            let nid = self.positions.get(ridx).node();
            let node = tree.node(nid);
            debug_assert!(!node.is_leaf(), "bitmap marked a row at a leaf");
            let child = if node.default_left {
                node.cright
            } else {
                node.cleft
            };
            self.positions.assign(ridx, child as u32);
        }
        self.positions
            .route_default(&self.frontier, self.matrix.buffered_rowset(), tree);
        Ok(())
    }

    /// Record per-node aggregates in the finished tree.
    fn write_stats(&self, tree: &mut RegTree) {
        let gain = &self.params.gain;
        for nid in 0..tree.num_nodes() as u32 {
            let entry = &self.snode[nid as usize];
            let stat = tree.stat_mut(nid);
            stat.loss_chg = entry.best.loss_chg;
            stat.base_weight = entry.weight as f32;
            stat.sum_hess = entry.stats.sum_hess() as f32;
            entry.stats.set_leaf_vec(gain, tree.leaf_vec_mut(nid));
        }
    }
}
