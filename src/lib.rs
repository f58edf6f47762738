//! boostree: the tree-learning core of a gradient boosting library.
//!
//! Given per-row first- and second-order gradients and a sparse feature
//! matrix, this crate constructs regression trees one level at a time:
//! exact greedy split finding over presorted columns, histogram-based
//! finding with weighted quantile proposals, sparse/missing-value handling
//! through learned default directions, post-construction pruning, and a
//! distributed variant that reduces split candidates and row-direction
//! bitmaps across peers.
//!
//! The surrounding system (data loading, objectives, metrics, the boosting
//! loop) talks to this core through three interfaces: a gradient-pair
//! slice, the [`data::FeatureMatrix`] trait, and the [`tree::RegTree`]
//! sink. See [`train::update`] for the entry point.

pub mod data;
pub mod error;
pub mod sync;
pub mod testing;
pub mod train;
pub mod tree;
