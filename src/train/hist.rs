//! Histogram-based split finding with weighted quantile proposals.
//!
//! [`HistMaker`] is the approximate alternative to the exact maker: per
//! level it proposes cut points per `(node, feature)` from weighted quantile
//! sketches, buckets row statistics into dense histograms, and runs the same
//! forward/backward sweep over buckets instead of raw values.
//!
//! Two proposal strategies share the level loop:
//!
//! - [`HistKind::Column`]: sketches are built from column scans. A column
//!   covering the full rowset trusts each node's precomputed hessian sum;
//!   a partial column takes one counting pass first. Positions are routed
//!   through the column routing primitives after each level.
//! - [`HistKind::Row`]: each row batch is transposed into a per-feature
//!   layout before sketching, and positions advance lazily — a row steps
//!   one level down when the next proposal pass visits it.
//!
//! Histograms and pruned sketch summaries are combined across peers through
//! the collective, so the distributed and single-process paths are the same
//! code.

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;

use crate::data::{Entry, FeatureMatrix};
use crate::error::UpdateError;
use crate::sync::{Collective, Reducible};
use crate::tree::RegTree;

use super::position::{Frontier, PositionMap};
use super::sketch::{SketchBuilder, WQSummary, WQuantileSketch};
use super::split::SplitEntry;
use super::stats::{GainParams, GradPair, SplitStats};
use super::{TrainInfo, TrainParams, RT_EPS};

/// Cut-proposal strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistKind {
    /// Column-scan sketches, column-driven routing.
    Column,
    /// Row-transpose sketches, lazy row-driven routing.
    Row,
}

// ============================================================================
// Level workspace
// ============================================================================

/// Per-level cut vectors and histogram buckets.
///
/// Slots are keyed `fid * nq + wid` so one feature's buckets across all
/// working nodes form a contiguous region — that is the unit handed to a
/// parallel column task.
#[derive(Debug)]
struct HistWorkspace<S> {
    nq: usize,
    num_feature: usize,
    /// Slot boundaries into `cut`/`data`; length `nq * num_feature + 1`.
    rptr: Vec<usize>,
    cut: Vec<f32>,
    data: Vec<S>,
    /// Per-working-node totals (the statistics of the whole node).
    totals: Vec<S>,
}

impl<S: SplitStats> HistWorkspace<S> {
    fn empty() -> Self {
        Self {
            nq: 0,
            num_feature: 0,
            rptr: vec![0],
            cut: Vec::new(),
            data: Vec::new(),
            totals: Vec::new(),
        }
    }

    /// Rebuild cut vectors from pruned summaries (slot order, fid-major).
    ///
    /// Cut points sit just below each summary value so a threshold never
    /// equals an observed value, and every non-empty slot ends with a
    /// sentinel strictly above the maximum so `upper_bound` stays in range.
    fn propose_cuts(&mut self, summaries: &[WQSummary], nq: usize, num_feature: usize) {
        self.nq = nq;
        self.num_feature = num_feature;
        self.rptr.clear();
        self.rptr.push(0);
        self.cut.clear();
        for summary in summaries {
            let start = self.cut.len();
            for e in summary.entries().iter().skip(1) {
                let cpt = e.value - RT_EPS;
                if self.cut.len() == start || cpt > *self.cut.last().unwrap() {
                    self.cut.push(cpt);
                }
            }
            if let Some(maxv) = summary.max_value() {
                self.cut.push(maxv + maxv.abs() + RT_EPS);
            }
            self.rptr.push(self.cut.len());
        }
        debug_assert_eq!(self.rptr.len(), nq * num_feature + 1);
        self.data.clear();
        self.data.resize(self.cut.len(), S::default());
        self.totals.clear();
        self.totals.resize(nq, S::default());
    }

    #[inline]
    fn slot(&self, fid: usize, wid: usize) -> usize {
        fid * self.nq + wid
    }

    fn cuts(&self, fid: usize, wid: usize) -> &[f32] {
        let s = self.slot(fid, wid);
        &self.cut[self.rptr[s]..self.rptr[s + 1]]
    }

    fn hist(&self, fid: usize, wid: usize) -> &[S] {
        let s = self.slot(fid, wid);
        &self.data[self.rptr[s]..self.rptr[s + 1]]
    }
}

/// Split a flat bucket array into one mutable region per feature.
fn feature_regions<'d, S>(
    data: &'d mut [S],
    rptr: &[usize],
    nq: usize,
    num_feature: usize,
) -> Vec<&'d mut [S]> {
    let mut regions = Vec::with_capacity(num_feature);
    let mut rest = data;
    let mut offset = 0;
    for fid in 0..num_feature {
        let end = rptr[(fid + 1) * nq];
        let (head, tail) = rest.split_at_mut(end - offset);
        regions.push(head);
        rest = tail;
        offset = end;
    }
    regions
}

// ============================================================================
// HistMaker
// ============================================================================

/// Histogram tree maker.
pub struct HistMaker<'a, M: FeatureMatrix, S: SplitStats, C: Collective> {
    params: &'a TrainParams,
    gpair: &'a [GradPair],
    matrix: &'a M,
    info: &'a TrainInfo,
    collective: &'a C,
    kind: HistKind,
    positions: PositionMap,
    frontier: Frontier,
    /// Per-node statistics, indexed by node id; valid for queued nodes.
    node_stats: Vec<S>,
    wspace: HistWorkspace<S>,
    /// Worker-pool size the scratch space was provisioned for.
    thread_cap: usize,
}

impl<'a, M: FeatureMatrix + Sync, S: SplitStats + Reducible, C: Collective> HistMaker<'a, M, S, C> {
    pub fn new(
        params: &'a TrainParams,
        gpair: &'a [GradPair],
        matrix: &'a M,
        info: &'a TrainInfo,
        collective: &'a C,
        kind: HistKind,
    ) -> Self {
        Self {
            params,
            gpair,
            matrix,
            info,
            collective,
            kind,
            positions: PositionMap::init(&[], &[], 1, 1.0, &mut Xoshiro256PlusPlus::seed_from_u64(0))
                .expect("empty init cannot fail"),
            frontier: Frontier::default(),
            node_stats: Vec::new(),
            wspace: HistWorkspace::empty(),
            thread_cap: rayon::current_num_threads().max(1),
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

        for depth in 0..self.params.max_depth {
            match self.kind {
                HistKind::Column => self.propose_from_columns(tree)?,
                HistKind::Row => self.propose_from_rows(tree)?,
            }
            self.create_hist(tree)?;
            self.find_split(tree)?;
            if self.kind == HistKind::Column {
                self.positions
                    .route_non_default(self.frontier.nodes(), self.matrix, tree);
                self.positions
                    .route_default(&self.frontier, self.matrix.buffered_rowset(), tree);
            }
            self.frontier.refresh(tree);
            log::debug!(
                "hist depth {}: {} nodes expanding",
                depth + 1,
                self.frontier.len()
            );
            if self.frontier.is_empty() {
                break;
            }
        }
        // nodes still queued at the depth cap become leaves; their stats
        // were recorded when their parent split
        let lr = self.params.learning_rate;
        for &nid in self.frontier.nodes().to_vec().iter() {
            let value = tree.stat(nid).base_weight * lr;
            tree.node_mut(nid).set_leaf(value);
        }
        if self.kind == HistKind::Row {
            self.positions.finalize(self.matrix, tree);
        }
        tree.refresh_max_depth();
        Ok(())
    }

    /// Aggregate per-node statistics for the queued nodes.
    fn collect_node_stats(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        self.node_stats.clear();
        self.node_stats.resize(tree.num_nodes(), S::default());
        for &ridx in self.matrix.buffered_rowset() {
            let p = self.positions.get(ridx);
            if !p.is_active() {
                continue;
            }
            if self.frontier.contains(p.node()) {
                self.node_stats[p.node() as usize].add_pair(self.gpair[ridx as usize]);
            }
        }
        for &nid in self.frontier.nodes() {
            let s = &self.node_stats[nid as usize];
            if s.sum_hess() < 0.0 {
                return Err(UpdateError::NegativeHessian {
                    nid,
                    sum_hess: s.sum_hess(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Proposal
    // ------------------------------------------------------------------

    /// Column-scan proposal: one sketch per `(node, feature)`, fed in
    /// feature-value order through the budgeted builder.
    fn propose_from_columns(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        self.collect_node_stats(tree)?;
        let nq = self.frontier.len();
        let nf = self.matrix.num_col();
        let max_size = self.params.max_sketch_size();
        let nrows = self.matrix.buffered_rowset().len();
        let mut summaries: Vec<WQSummary> =
            vec![WQSummary::with_limit(max_size); nf * nq];

        let positions = &self.positions;
        let frontier = &self.frontier;
        let node_stats = &self.node_stats;
        let gpair = self.gpair;
        let queue = frontier.nodes();
        for batch in self.matrix.col_batches(None) {
            let per_col: Vec<(u32, Vec<WQSummary>)> = batch
                .cols()
                .par_iter()
                .map(|&(fid, col)| {
                    let mut sketches: Vec<WQuantileSketch> =
                        (0..nq).map(|_| WQuantileSketch::new(max_size)).collect();
                    if !col.is_empty() {
                        // per-node total weight: trusted when the column is
                        // dense, otherwise one counting pass
                        let mut sums = vec![0.0f64; nq];
                        if col.len() == nrows {
                            for (wid, &nid) in queue.iter().enumerate() {
                                sums[wid] = node_stats[nid as usize].sum_hess();
                            }
                        } else {
                            for e in col {
                                let p = positions.get(e.index);
                                if !p.is_active() {
                                    continue;
                                }
                                if let Some(wid) = frontier.work_of(p.node()) {
                                    sums[wid] += gpair[e.index as usize].hess as f64;
                                }
                            }
                        }
                        if col[0].fvalue == col[col.len() - 1].fvalue {
                            // single-valued column: one entry per node
                            for wid in 0..nq {
                                if sums[wid] > 0.0 {
                                    sketches[wid].push(col[0].fvalue, sums[wid]);
                                }
                            }
                        } else {
                            let mut builders = vec![SketchBuilder::default(); nq];
                            for wid in 0..nq {
                                builders[wid].begin(sums[wid], max_size);
                            }
                            for e in col {
                                let p = positions.get(e.index);
                                if !p.is_active() {
                                    continue;
                                }
                                if let Some(wid) = frontier.work_of(p.node()) {
                                    builders[wid].push(
                                        e.fvalue,
                                        gpair[e.index as usize].hess as f64,
                                        &mut sketches[wid],
                                    );
                                }
                            }
                            for wid in 0..nq {
                                builders[wid].finish(&mut sketches[wid]);
                            }
                        }
                    }
                    (
                        fid,
                        sketches.into_iter().map(|s| s.into_summary()).collect(),
                    )
                })
                .collect();
            for (fid, col_summaries) in per_col {
                for (wid, summary) in col_summaries.into_iter().enumerate() {
                    summaries[fid as usize * nq + wid] = summary;
                }
            }
        }

        self.collective.allreduce(&mut summaries)?;
        self.wspace.propose_cuts(&summaries, nq, nf);
        Ok(())
    }

    /// Row-transpose proposal: advance positions one level, retire rows
    /// whose node is no longer expanding, then sketch per feature.
    fn propose_from_rows(&mut self, tree: &RegTree) -> Result<(), UpdateError> {
        let nq = self.frontier.len();
        let nf = self.matrix.num_col();
        let max_size = self.params.max_sketch_size();
        let mut sketches: Vec<WQuantileSketch> = (0..nf * nq)
            .map(|_| WQuantileSketch::new(max_size))
            .collect();

        for batch in self.matrix.row_batches() {
            // step active rows down to the current frontier
            for i in 0..batch.len() {
                let ridx = (batch.base_rowid + i) as u32;
                let p = self.positions.get(ridx);
                if !p.is_active() {
                    continue;
                }
                let mut nid = p.node();
                if !tree.node(nid).is_leaf() {
                    nid = tree.next_level(batch.row(i), nid);
                    self.positions.assign(ridx, nid);
                }
                if !self.frontier.contains(nid) {
                    self.positions.retire(ridx);
                }
            }

            // transpose the batch into per-feature entry lists
            let mut counts = vec![0usize; nf];
            for i in 0..batch.len() {
                let ridx = (batch.base_rowid + i) as u32;
                if !self.positions.get(ridx).is_active() {
                    continue;
                }
                for e in batch.row(i) {
                    counts[e.index as usize] += 1;
                }
            }
            let mut col_ptr = Vec::with_capacity(nf + 1);
            col_ptr.push(0usize);
            for c in &counts {
                col_ptr.push(col_ptr.last().unwrap() + c);
            }
            let mut col_data = vec![Entry::new(0, 0.0); *col_ptr.last().unwrap()];
            let mut cursor = col_ptr.clone();
            for i in 0..batch.len() {
                let ridx = (batch.base_rowid + i) as u32;
                if !self.positions.get(ridx).is_active() {
                    continue;
                }
                for e in batch.row(i) {
                    let fid = e.index as usize;
                    col_data[cursor[fid]] = Entry::new(ridx, e.fvalue);
                    cursor[fid] += 1;
                }
            }

            let positions = &self.positions;
            let frontier = &self.frontier;
            let gpair = self.gpair;
            sketches
                .par_chunks_mut(nq)
                .enumerate()
                .for_each(|(fid, node_sketches)| {
                    for e in &col_data[col_ptr[fid]..col_ptr[fid + 1]] {
                        let nid = positions.get(e.index).node();
                        if let Some(wid) = frontier.work_of(nid) {
                            node_sketches[wid]
                                .push(e.fvalue, gpair[e.index as usize].hess as f64);
                        }
                    }
                });
        }

        let mut summaries: Vec<WQSummary> = sketches
            .into_iter()
            .map(|s| s.into_summary())
            .collect();
        self.collective.allreduce(&mut summaries)?;
        self.wspace.propose_cuts(&summaries, nq, nf);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Histogram filling
    // ------------------------------------------------------------------

    fn create_hist(&mut self, _tree: &RegTree) -> Result<(), UpdateError> {
        match self.kind {
            HistKind::Column => self.fill_from_columns()?,
            HistKind::Row => self.fill_from_rows()?,
        }
        self.collective.allreduce(&mut self.wspace.data)?;
        self.collective.allreduce(&mut self.wspace.totals)?;
        Ok(())
    }

    /// Column fill: each parallel task owns one feature's bucket region and
    /// walks its value-sorted column with a per-node cursor.
    fn fill_from_columns(&mut self) -> Result<(), UpdateError> {
        // node totals come from the statistics pass
        let queue: Vec<u32> = self.frontier.nodes().to_vec();
        for (wid, &nid) in queue.iter().enumerate() {
            self.wspace.totals[wid] = self.node_stats[nid as usize].clone();
        }

        let nq = self.wspace.nq;
        let nf = self.wspace.num_feature;
        let positions = &self.positions;
        let frontier = &self.frontier;
        let gpair = self.gpair;
        let rptr = &self.wspace.rptr;
        let cut = &self.wspace.cut;
        let regions = feature_regions(&mut self.wspace.data, rptr, nq, nf);
        let mut region_of: Vec<Option<&mut [S]>> = regions.into_iter().map(Some).collect();

        for batch in self.matrix.col_batches(None) {
            let mut tasks: Vec<(u32, &[Entry], &mut [S])> = Vec::with_capacity(batch.len());
            for &(fid, col) in batch.cols() {
                let region = region_of[fid as usize]
                    .take()
                    .expect("feature repeated across column batches");
                tasks.push((fid, col, region));
            }
            tasks
                .into_par_iter()
                .try_for_each(|(fid, col, region)| -> Result<(), UpdateError> {
                    let base = rptr[fid as usize * nq];
                    let mut cursor = vec![0usize; nq];
                    for e in col {
                        let p = positions.get(e.index);
                        if !p.is_active() {
                            continue;
                        }
                        let Some(wid) = frontier.work_of(p.node()) else {
                            continue;
                        };
                        let slot = fid as usize * nq + wid;
                        let cuts = &cut[rptr[slot]..rptr[slot + 1]];
                        let mut at = cursor[wid];
                        while at < cuts.len() && !(e.fvalue < cuts[at]) {
                            at += 1;
                        }
                        if at >= cuts.len() {
                            return Err(UpdateError::CutRange {
                                fid,
                                fvalue: e.fvalue,
                            });
                        }
                        cursor[wid] = at;
                        region[rptr[slot] - base + at].add_pair(gpair[e.index as usize]);
                    }
                    Ok(())
                })?;
        }
        Ok(())
    }

    /// Row fill: contiguous row shards per worker, merged afterwards.
    fn fill_from_rows(&mut self) -> Result<(), UpdateError> {
        let nq = self.wspace.nq;
        let nf = self.wspace.num_feature;
        let nthread = rayon::current_num_threads().max(1);
        if nthread > self.thread_cap {
            return Err(UpdateError::WorkspaceTooSmall {
                nthread,
                capacity: self.thread_cap,
            });
        }
        let positions = &self.positions;
        let frontier = &self.frontier;
        let gpair = self.gpair;
        let rptr = &self.wspace.rptr;
        let cut = &self.wspace.cut;

        for batch in self.matrix.row_batches() {
            let n = batch.len();
            let chunk = n.div_ceil(nthread).max(1);
            let mut locals: Vec<(Vec<S>, Vec<S>)> = (0..nthread)
                .map(|_| (vec![S::default(); cut.len()], vec![S::default(); nq]))
                .collect();
            locals
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(tid, (data, totals))| -> Result<(), UpdateError> {
                    let start = (tid * chunk).min(n);
                    let end = ((tid + 1) * chunk).min(n);
                    for i in start..end {
                        let ridx = (batch.base_rowid + i) as u32;
                        let p = positions.get(ridx);
                        if !p.is_active() {
                            continue;
                        }
                        let Some(wid) = frontier.work_of(p.node()) else {
                            continue;
                        };
                        let g = gpair[ridx as usize];
                        for e in batch.row(i) {
                            let fid = e.index as usize;
                            debug_assert!(fid < nf);
                            let slot = fid * nq + wid;
                            let cuts = &cut[rptr[slot]..rptr[slot + 1]];
                            let bucket = cuts.partition_point(|&c| c <= e.fvalue);
                            if bucket >= cuts.len() {
                                return Err(UpdateError::CutRange {
                                    fid: e.index,
                                    fvalue: e.fvalue,
                                });
                            }
                            data[rptr[slot] + bucket].add_pair(g);
                        }
                        totals[wid].add_pair(g);
                    }
                    Ok(())
                })?;
            for (data, totals) in locals {
                for (acc, local) in self.wspace.data.iter_mut().zip(&data) {
                    acc.add(local);
                }
                for (acc, local) in self.wspace.totals.iter_mut().zip(&totals) {
                    acc.add(local);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Split finding
    // ------------------------------------------------------------------

    /// Sweep the buckets of every `(node, feature)` pair and apply the
    /// winning splits. Child statistics come straight from the winning
    /// sweep's left sum and its complement.
    fn find_split(&mut self, tree: &mut RegTree) -> Result<(), UpdateError> {
        let nq = self.frontier.len();
        if nq == 0 {
            return Ok(());
        }
        let nf = self.wspace.num_feature;
        let gain = &self.params.gain;
        let queue: Vec<u32> = self.frontier.nodes().to_vec();
        let num_roots = tree.num_roots();

        let wspace = &self.wspace;
        let results: Vec<(SplitEntry, S)> = (0..nq)
            .into_par_iter()
            .map(|wid| {
                let nid = queue[wid];
                let node_sum = &wspace.totals[wid];
                let root_gain = if (nid as usize) < num_roots {
                    node_sum.calc_root_gain(gain)
                } else {
                    node_sum.calc_gain(gain)
                };
                let mut best = SplitEntry::default();
                let mut left_sum = S::default();
                for fid in 0..nf {
                    enumerate_buckets(
                        wspace.cuts(fid, wid),
                        wspace.hist(fid, wid),
                        node_sum,
                        root_gain,
                        fid as u32,
                        gain,
                        &mut best,
                        &mut left_sum,
                    );
                }
                (best, left_sum)
            })
            .collect();

        let lr = self.params.learning_rate as f64;
        for (wid, &nid) in queue.iter().enumerate() {
            let node_sum = self.wspace.totals[wid].clone();
            let (best, left_sum) = &results[wid];
            let is_root = (nid as usize) < num_roots;
            let weight = if is_root {
                node_sum.calc_root_weight(gain)
            } else {
                node_sum.calc_weight(gain)
            };
            {
                let stat = tree.stat_mut(nid);
                stat.loss_chg = best.loss_chg;
                stat.base_weight = weight as f32;
                stat.sum_hess = node_sum.sum_hess() as f32;
            }
            node_sum.set_leaf_vec(gain, tree.leaf_vec_mut(nid));
            if best.loss_chg > RT_EPS {
                let (left, right) = tree.add_childs(nid);
                tree.node_mut(nid)
                    .set_split(best.split_index, best.split_value, best.default_left);
                let mut right_sum = S::default();
                right_sum.set_subtract(&node_sum, left_sum);
                for (child, child_sum) in [(left, left_sum.clone()), (right, right_sum)] {
                    let stat = tree.stat_mut(child);
                    stat.loss_chg = 0.0;
                    stat.base_weight = child_sum.calc_weight(gain) as f32;
                    stat.sum_hess = child_sum.sum_hess() as f32;
                    child_sum.set_leaf_vec(gain, tree.leaf_vec_mut(child));
                }
            } else {
                tree.node_mut(nid).set_leaf((weight * lr) as f32);
            }
        }
        Ok(())
    }
}

/// Forward and backward bucket sweeps for one `(node, feature)` histogram.
///
/// A forward win splits at `cuts[i]` with missing going right; a backward
/// win splits at `cuts[i - 1]` with missing going left. The forward sweep
/// includes the sentinel bucket, which is the all-observed-versus-missing
/// proposal.
#[allow(clippy::too_many_arguments)]
fn enumerate_buckets<S: SplitStats>(
    cuts: &[f32],
    hist: &[S],
    node_sum: &S,
    root_gain: f64,
    fid: u32,
    gain: &GainParams,
    best: &mut SplitEntry,
    left_sum: &mut S,
) {
    if hist.is_empty() {
        return;
    }
    let min_weight = (gain.min_child_weight as f64).max(RT_EPS as f64);
    let mut s = S::default();
    let mut c = S::default();
    for i in 0..hist.len() {
        s.add(&hist[i]);
        if s.sum_hess() >= min_weight {
            c.set_subtract(node_sum, &s);
            if c.sum_hess() >= min_weight {
                let loss_chg = (s.calc_gain(gain) + c.calc_gain(gain) - root_gain) as f32;
                if best.update_split(loss_chg, fid, cuts[i], false) {
                    *left_sum = s.clone();
                }
            }
        }
    }
    s.clear();
    for i in (1..hist.len()).rev() {
        s.add(&hist[i]);
        if s.sum_hess() >= min_weight {
            c.set_subtract(node_sum, &s);
            if c.sum_hess() >= min_weight {
                let loss_chg = (s.calc_gain(gain) + c.calc_gain(gain) - root_gain) as f32;
                if best.update_split(loss_chg, fid, cuts[i - 1], true) {
                    *left_sum = c.clone();
                }
            }
        }
    }
}
