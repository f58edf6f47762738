//! Error types for tree construction.

use crate::sync::SyncError;

/// Errors that abort construction of the current tree.
///
/// Numeric degeneracies (a child below `min_child_weight`, no candidate split
/// clearing the gain threshold) are not errors: the node silently becomes a
/// leaf. Everything here is a violated precondition or a failed collective.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("gradient pairs ({gpair}) do not match matrix rows ({rows})")]
    GradientLength { gpair: usize, rows: usize },

    #[error("matrix has {matrix} features but the tree was built for {tree}")]
    FeatureCountMismatch { matrix: usize, tree: usize },

    #[error("tree has {num_nodes} nodes; update requires a fresh tree with only its {num_roots} roots")]
    TreeNotFresh { num_nodes: usize, num_roots: usize },

    #[error("root index {root} out of range for {num_roots} roots")]
    RootOutOfRange { root: u32, num_roots: usize },

    #[error("feature value {fvalue} of feature {fid} falls outside the proposed cut range")]
    CutRange { fid: u32, fvalue: f32 },

    #[error("negative hessian sum {sum_hess} aggregated for node {nid}")]
    NegativeHessian { nid: u32, sum_hess: f64 },

    #[error("worker pool grew to {nthread} threads but scratch space was sized for {capacity}")]
    WorkspaceTooSmall { nthread: usize, capacity: usize },

    #[error("model serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unsupported tree format version {found}, expected {expected}")]
    FormatVersion { found: u32, expected: u32 },

    #[error("synchronization failed: {0}")]
    Sync(#[from] SyncError),
}
