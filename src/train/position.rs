//! Instance-to-node position tracking and row routing.
//!
//! Every maker shares the same state: a per-row [`Position`] (which node the
//! row currently sits at, and whether it still contributes statistics), and
//! the per-level [`Frontier`] of nodes awaiting a split decision.
//!
//! Routing is split-feature driven: a level first moves every row that
//! actually carries a split feature ([`PositionMap::route_non_default`]),
//! then sends everything still parked at an internal node down the default
//! branch ([`PositionMap::route_default`]). Sparse rows are never
//! materialized — a row absent from every split column simply takes the
//! default direction at each node.

use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::FeatureMatrix;
use crate::error::UpdateError;
use crate::tree::RegTree;

use super::stats::GradPair;

// ============================================================================
// Position
// ============================================================================

/// Where one row currently sits in the tree.
///
/// `active` distinguishes rows still being routed from rows that are done:
/// deleted up front (negative hessian, subsample) or parked at a finalized
/// leaf. Retired rows keep being *routed* so their node id stays valid, they
/// just stop contributing statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    nid: u32,
    active: bool,
}

impl Position {
    #[inline]
    pub fn at(nid: u32) -> Self {
        Self { nid, active: true }
    }

    #[inline]
    pub fn node(self) -> u32 {
        self.nid
    }

    #[inline]
    pub fn is_active(self) -> bool {
        self.active
    }
}

// ============================================================================
// Frontier
// ============================================================================

/// The expansion queue: nodes awaiting a split decision at this level,
/// with a node-id → work-index lookup for queue-sized scratch arrays.
#[derive(Clone, Debug, Default)]
pub struct Frontier {
    queue: Vec<u32>,
    work_index: Vec<i32>,
}

impl Frontier {
    /// Seed the queue with the tree roots.
    pub fn from_roots(tree: &RegTree) -> Self {
        let mut frontier = Self {
            queue: (0..tree.num_roots() as u32).collect(),
            work_index: Vec::new(),
        };
        frontier.rebuild_index(tree.num_nodes());
        frontier
    }

    /// Replace the queue with the children of every node that split, left
    /// child before right, in queue order.
    pub fn refresh(&mut self, tree: &RegTree) {
        let mut next = Vec::with_capacity(self.queue.len() * 2);
        for &nid in &self.queue {
            let node = tree.node(nid);
            if !node.is_leaf() {
                next.push(node.cleft as u32);
                next.push(node.cright as u32);
            }
        }
        self.queue = next;
        self.rebuild_index(tree.num_nodes());
    }

    fn rebuild_index(&mut self, num_nodes: usize) {
        self.work_index.clear();
        self.work_index.resize(num_nodes, -1);
        for (wid, &nid) in self.queue.iter().enumerate() {
            self.work_index[nid as usize] = wid as i32;
        }
    }

    /// Compact work index of a queued node.
    #[inline]
    pub fn work_of(&self, nid: u32) -> Option<usize> {
        match self.work_index.get(nid as usize) {
            Some(&w) if w >= 0 => Some(w as usize),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, nid: u32) -> bool {
        self.work_of(nid).is_some()
    }

    #[inline]
    pub fn nodes(&self) -> &[u32] {
        &self.queue
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ============================================================================
// PositionMap
// ============================================================================

/// Dense per-row position vector.
#[derive(Clone, Debug)]
pub struct PositionMap {
    pos: Vec<Position>,
}

impl PositionMap {
    /// Initialize positions from optional per-row root assignments, then
    /// retire rows deleted upstream (negative hessian) and rows dropped by
    /// the Bernoulli subsample.
    pub fn init(
        gpair: &[GradPair],
        root_index: &[u32],
        num_roots: usize,
        subsample: f32,
        rng: &mut Xoshiro256PlusPlus,
    ) -> Result<Self, UpdateError> {
        let mut pos = Vec::with_capacity(gpair.len());
        if root_index.is_empty() {
            pos.resize(gpair.len(), Position::at(0));
        } else {
            for &root in root_index {
                if root as usize >= num_roots {
                    return Err(UpdateError::RootOutOfRange { root, num_roots });
                }
                pos.push(Position::at(root));
            }
        }
        for (p, g) in pos.iter_mut().zip(gpair) {
            if g.is_deleted() {
                p.active = false;
            }
        }
        if subsample < 1.0 {
            for (p, g) in pos.iter_mut().zip(gpair) {
                if g.is_deleted() {
                    continue;
                }
                if rng.gen::<f32>() >= subsample {
                    p.active = false;
                }
            }
        }
        Ok(Self { pos })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    #[inline]
    pub fn get(&self, ridx: u32) -> Position {
        self.pos[ridx as usize]
    }

    /// Move a row to a new node, preserving its active flag.
    #[inline]
    pub fn assign(&mut self, ridx: u32, nid: u32) {
        self.pos[ridx as usize].nid = nid;
    }

    /// Stop the row from contributing statistics.
    #[inline]
    pub fn retire(&mut self, ridx: u32) {
        self.pos[ridx as usize].active = false;
    }

    // ------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------

    /// Unique split features used by the internal nodes of `nodes`,
    /// restricted to features below `num_col`.
    pub fn split_features(nodes: &[u32], tree: &RegTree, num_col: usize) -> Vec<u32> {
        let mut fsplits: Vec<u32> = nodes
            .iter()
            .map(|&nid| tree.node(nid))
            .filter(|n| !n.is_leaf())
            .map(|n| n.split_index)
            .filter(|&fid| (fid as usize) < num_col)
            .collect();
        fsplits.sort_unstable();
        fsplits.dedup();
        fsplits
    }

    /// Route every row that carries a split feature of a just-split node in
    /// `nodes` to the matching child.
    pub fn route_non_default<M: FeatureMatrix>(
        &mut self,
        nodes: &[u32],
        matrix: &M,
        tree: &RegTree,
    ) {
        let fsplits = Self::split_features(nodes, tree, matrix.num_col());
        if fsplits.is_empty() {
            return;
        }
        for batch in matrix.col_batches(Some(&fsplits)) {
            for &(fid, col) in batch.cols() {
                for e in col {
                    let nid = self.get(e.index).node();
                    let node = tree.node(nid);
                    if !node.is_leaf() && node.split_index == fid {
                        let child = if e.fvalue < node.split_cond {
                            node.cleft
                        } else {
                            node.cright
                        };
                        self.assign(e.index, child as u32);
                    }
                }
            }
        }
    }

    /// Send every row still parked at an internal node to the default
    /// child, and retire rows sitting at a queued node that refused to
    /// split (it is now a final leaf). Fresh children are not queued yet,
    /// so their rows stay live for the next level.
    pub fn route_default(&mut self, frontier: &Frontier, rowset: &[u32], tree: &RegTree) {
        for &ridx in rowset {
            let nid = self.get(ridx).node();
            let node = tree.node(nid);
            if node.is_leaf() {
                if frontier.contains(nid) {
                    self.retire(ridx);
                }
            } else {
                self.assign(ridx, node.cdefault() as u32);
            }
        }
    }

    /// Walk every row down to a leaf of the finished tree.
    pub fn finalize<M: FeatureMatrix>(&mut self, matrix: &M, tree: &RegTree) {
        for batch in matrix.row_batches() {
            for i in 0..batch.len() {
                let ridx = (batch.base_rowid + i) as u32;
                let mut nid = self.get(ridx).node();
                if !tree.node(nid).is_leaf() {
                    nid = tree.leaf_for_row(batch.row(i), nid);
                    self.assign(ridx, nid);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SparseMatrix;
    use rand::SeedableRng;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(0)
    }

    fn pairs(n: usize) -> Vec<GradPair> {
        vec![GradPair::new(1.0, 1.0); n]
    }

    #[test]
    fn test_init_default_roots() {
        let pm = PositionMap::init(&pairs(3), &[], 1, 1.0, &mut rng()).unwrap();
        for r in 0..3 {
            assert_eq!(pm.get(r).node(), 0);
            assert!(pm.get(r).is_active());
        }
    }

    #[test]
    fn test_init_respects_root_index() {
        let pm = PositionMap::init(&pairs(2), &[1, 0], 2, 1.0, &mut rng()).unwrap();
        assert_eq!(pm.get(0).node(), 1);
        assert_eq!(pm.get(1).node(), 0);
    }

    #[test]
    fn test_init_rejects_bad_root() {
        let err = PositionMap::init(&pairs(1), &[3], 2, 1.0, &mut rng());
        assert!(matches!(err, Err(UpdateError::RootOutOfRange { .. })));
    }

    #[test]
    fn test_init_retires_deleted_rows() {
        let gpair = vec![GradPair::new(1.0, 1.0), GradPair::new(1.0, -1.0)];
        let pm = PositionMap::init(&gpair, &[], 1, 1.0, &mut rng()).unwrap();
        assert!(pm.get(0).is_active());
        assert!(!pm.get(1).is_active());
    }

    #[test]
    fn test_subsample_is_seeded() {
        let gpair = pairs(1000);
        let a = PositionMap::init(&gpair, &[], 1, 0.5, &mut rng()).unwrap();
        let b = PositionMap::init(&gpair, &[], 1, 0.5, &mut rng()).unwrap();
        let active = |pm: &PositionMap| {
            (0..1000)
                .filter(|&r| pm.get(r as u32).is_active())
                .collect::<Vec<_>>()
        };
        assert_eq!(active(&a), active(&b));
        let kept = active(&a).len();
        assert!(kept > 300 && kept < 700, "kept {kept} of 1000 at rate 0.5");
    }

    #[test]
    fn test_assign_preserves_flag() {
        let gpair = vec![GradPair::new(1.0, -1.0)];
        let mut pm = PositionMap::init(&gpair, &[], 1, 1.0, &mut rng()).unwrap();
        pm.assign(0, 5);
        assert_eq!(pm.get(0).node(), 5);
        assert!(!pm.get(0).is_active());
    }

    fn split_tree() -> RegTree {
        let mut tree = RegTree::new(1, 2, 0);
        let (_, _) = tree.add_childs(0);
        tree.node_mut(0).set_split(0, 1.5, true);
        tree
    }

    #[test]
    fn test_route_non_default_then_default() {
        // rows: 0 has f0=1.0 (left), 1 has f0=2.0 (right), 2 missing f0
        let matrix = SparseMatrix::from_rows(
            &[vec![(0, 1.0)], vec![(0, 2.0)], vec![(1, 3.0)]],
            2,
        );
        let tree = split_tree();
        let frontier = Frontier::from_roots(&tree);
        let mut pm = PositionMap::init(&pairs(3), &[], 1, 1.0, &mut rng()).unwrap();

        pm.route_non_default(frontier.nodes(), &matrix, &tree);
        assert_eq!(pm.get(0).node(), 1);
        assert_eq!(pm.get(1).node(), 2);
        assert_eq!(pm.get(2).node(), 0);

        pm.route_default(&frontier, matrix.buffered_rowset(), &tree);
        // missing row takes the default (left) child
        assert_eq!(pm.get(2).node(), 1);
        assert!(pm.get(2).is_active());
    }

    #[test]
    fn test_route_default_retires_refused_leaf() {
        let matrix = SparseMatrix::from_rows(&[vec![(0, 1.0)]], 2);
        // root stays a leaf: the queue still contains it, so its rows retire
        let tree = RegTree::new(1, 2, 0);
        let frontier = Frontier::from_roots(&tree);
        let mut pm = PositionMap::init(&pairs(1), &[], 1, 1.0, &mut rng()).unwrap();
        pm.route_default(&frontier, matrix.buffered_rowset(), &tree);
        assert!(!pm.get(0).is_active());
        assert_eq!(pm.get(0).node(), 0);
    }

    #[test]
    fn test_frontier_refresh_orders_children() {
        let mut tree = split_tree();
        let mut frontier = Frontier::from_roots(&tree);
        assert_eq!(frontier.nodes(), &[0]);
        frontier.refresh(&tree);
        assert_eq!(frontier.nodes(), &[1, 2]);
        assert_eq!(frontier.work_of(2), Some(1));
        assert_eq!(frontier.work_of(0), None);

        // leaves drop out on the next refresh
        tree.node_mut(1).set_leaf(0.0);
        tree.node_mut(2).set_leaf(0.0);
        frontier.refresh(&tree);
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_finalize_walks_to_leaves() {
        let matrix = SparseMatrix::from_rows(&[vec![(0, 2.0)], vec![]], 2);
        let tree = split_tree();
        let mut pm = PositionMap::init(&pairs(2), &[], 1, 1.0, &mut rng()).unwrap();
        pm.finalize(&matrix, &tree);
        assert_eq!(pm.get(0).node(), 2);
        assert_eq!(pm.get(1).node(), 1); // default left
    }
}
