//! The regression tree store.

use serde::{Deserialize, Serialize};

use super::node::{Node, NodeStat, NO_NODE};
use crate::data::Entry;
use crate::error::UpdateError;

/// Serialized tree format version. Bumped on any layout change.
pub const TREE_FORMAT_VERSION: u32 = 1;

/// Tree header: shape metadata that travels with the node array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeHeader {
    pub format_version: u32,
    pub num_roots: u32,
    pub num_feature: u32,
    pub num_nodes: u32,
    pub max_depth: u32,
    pub size_leaf_vector: u32,
}

/// Array-of-nodes regression tree.
///
/// Nodes `0..num_roots` are roots. `add_childs` appends children as a
/// consecutive pair, so sibling ids always differ by one. Pruning marks
/// collapsed children deleted instead of removing them; serialized trees
/// keep the full array.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegTree {
    header: TreeHeader,
    nodes: Vec<Node>,
    stats: Vec<NodeStat>,
    /// Per-node auxiliary outputs, `size_leaf_vector` values per node.
    leaf_vec: Vec<f32>,
    num_deleted: u32,
}

impl RegTree {
    /// A fresh tree: `num_roots` zero-valued leaves.
    pub fn new(num_roots: usize, num_feature: usize, size_leaf_vector: usize) -> Self {
        assert!(num_roots >= 1, "tree needs at least one root");
        let nodes = (0..num_roots).map(|_| Node::leaf(NO_NODE, 0.0)).collect();
        let stats = vec![NodeStat::default(); num_roots];
        let leaf_vec = vec![0.0; num_roots * size_leaf_vector];
        Self {
            header: TreeHeader {
                format_version: TREE_FORMAT_VERSION,
                num_roots: num_roots as u32,
                num_feature: num_feature as u32,
                num_nodes: num_roots as u32,
                max_depth: 0,
                size_leaf_vector: size_leaf_vector as u32,
            },
            nodes,
            stats,
            leaf_vec,
            num_deleted: 0,
        }
    }

    #[inline]
    pub fn header(&self) -> &TreeHeader {
        &self.header
    }

    #[inline]
    pub fn num_roots(&self) -> usize {
        self.header.num_roots as usize
    }

    #[inline]
    pub fn num_feature(&self) -> usize {
        self.header.num_feature as usize
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes beyond the roots that are still alive.
    pub fn num_extra_nodes(&self) -> usize {
        self.nodes.len() - self.num_roots() - self.num_deleted as usize
    }

    #[inline]
    pub fn node(&self, nid: u32) -> &Node {
        &self.nodes[nid as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, nid: u32) -> &mut Node {
        &mut self.nodes[nid as usize]
    }

    #[inline]
    pub fn stat(&self, nid: u32) -> &NodeStat {
        &self.stats[nid as usize]
    }

    #[inline]
    pub fn stat_mut(&mut self, nid: u32) -> &mut NodeStat {
        &mut self.stats[nid as usize]
    }

    /// The auxiliary output vector of a node.
    pub fn leaf_vec_mut(&mut self, nid: u32) -> &mut [f32] {
        let k = self.header.size_leaf_vector as usize;
        let at = nid as usize * k;
        &mut self.leaf_vec[at..at + k]
    }

    /// Append a left/right child pair under `nid` and return their ids.
    ///
    /// Both children start out as fresh zero-valued leaves.
    pub fn add_childs(&mut self, nid: u32) -> (u32, u32) {
        let left = self.nodes.len() as u32;
        let right = left + 1;
        self.nodes.push(Node::leaf(nid as i32, 0.0));
        self.nodes.push(Node::leaf(nid as i32, 0.0));
        self.stats.push(NodeStat::default());
        self.stats.push(NodeStat::default());
        self.leaf_vec
            .resize(self.nodes.len() * self.header.size_leaf_vector as usize, 0.0);
        let n = self.node_mut(nid);
        n.cleft = left as i32;
        n.cright = right as i32;
        self.header.num_nodes = self.nodes.len() as u32;
        (left, right)
    }

    /// Collapse an internal node whose children are both leaves back into a
    /// leaf with the given value. The children are marked deleted.
    pub fn collapse_to_leaf(&mut self, nid: u32, value: f32) {
        let (l, r) = {
            let n = self.node(nid);
            (n.cleft, n.cright)
        };
        debug_assert!(l >= 0 && r >= 0);
        debug_assert!(self.nodes[l as usize].is_leaf() && self.nodes[r as usize].is_leaf());
        self.nodes[l as usize].deleted = true;
        self.nodes[r as usize].deleted = true;
        self.num_deleted += 2;
        self.node_mut(nid).set_leaf(value);
    }

    /// Depth of a node (roots are depth 0).
    pub fn depth(&self, nid: u32) -> usize {
        let mut d = 0;
        let mut cur = self.node(nid).parent;
        while cur >= 0 {
            d += 1;
            cur = self.nodes[cur as usize].parent;
        }
        d
    }

    /// Recompute and record the deepest live node.
    pub fn refresh_max_depth(&mut self) {
        let mut max = 0;
        for nid in 0..self.nodes.len() as u32 {
            if !self.nodes[nid as usize].deleted {
                max = max.max(self.depth(nid));
            }
        }
        self.header.max_depth = max as u32;
    }

    /// Live leaves.
    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.deleted && n.is_leaf())
            .count()
    }

    /// Live internal nodes.
    pub fn num_internal(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.deleted && !n.is_leaf())
            .count()
    }

    // ------------------------------------------------------------------
    // Row routing
    // ------------------------------------------------------------------

    /// One routing step for a sparse row sitting at internal node `nid`.
    ///
    /// Rows are short, so the split feature is found by linear scan.
    pub fn next_level(&self, row: &[Entry], nid: u32) -> u32 {
        let n = self.node(nid);
        debug_assert!(!n.is_leaf());
        for e in row {
            if e.index == n.split_index {
                return if e.fvalue < n.split_cond {
                    n.cleft as u32
                } else {
                    n.cright as u32
                };
            }
        }
        n.cdefault() as u32
    }

    /// Walk a sparse row from `root` down to its leaf.
    pub fn leaf_for_row(&self, row: &[Entry], root: u32) -> u32 {
        let mut nid = root;
        while !self.node(nid).is_leaf() {
            nid = self.next_level(row, nid);
        }
        nid
    }

    /// Predict the scalar output for a sparse row.
    pub fn predict_row(&self, row: &[Entry], root: u32) -> f32 {
        self.node(self.leaf_for_row(row, root)).leaf_value
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the tree for persistence or peer broadcast.
    pub fn to_bytes(&self) -> Result<Vec<u8>, UpdateError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a tree, rejecting unknown format versions.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, UpdateError> {
        let tree: RegTree = serde_json::from_slice(bytes)?;
        if tree.header.format_version != TREE_FORMAT_VERSION {
            return Err(UpdateError::FormatVersion {
                found: tree.header.format_version,
                expected: TREE_FORMAT_VERSION,
            });
        }
        Ok(tree)
    }
}
