//! Regression tree representation.
//!
//! [`RegTree`] is the sink the makers write into: an array-of-nodes tree
//! with split/leaf payloads and per-node aggregate statistics. Construction
//! appends children in pairs; pruning collapses internal nodes back into
//! leaves without renumbering.

mod model;
mod node;

pub use model::{RegTree, TreeHeader, TREE_FORMAT_VERSION};
pub use node::{Node, NodeStat, NO_NODE};
