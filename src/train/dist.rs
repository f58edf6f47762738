//! Distributed column maker.
//!
//! Each peer holds a shard of the feature columns and grows the same tree.
//! Two synchronization points keep the peers in lockstep:
//!
//! - per level, the per-node best splits are combined with an AllReduce
//!   whose reduction operator is the [`SplitEntry`](super::SplitEntry)
//!   tie-break itself (associative, so peer order does not matter);
//! - after splits are applied, each peer marks the rows its columns prove
//!   take the non-default direction; the bitmaps OR together and marked
//!   rows go to the non-default child, everything else to the default.
//!
//! After growth the pruner runs and the finished tree is broadcast from
//! rank 0 so every peer carries identical structure. A collective failure
//! aborts the tree; retries belong to the boosting loop above.

use crate::data::FeatureMatrix;
use crate::error::UpdateError;
use crate::sync::Collective;
use crate::tree::RegTree;

use super::exact::{ColMaker, RoutingMode};
use super::prune::prune_tree;
use super::stats::{GradPair, SplitStats};
use super::{TrainInfo, TrainParams};

/// Exact maker over column shards with collective synchronization.
pub struct DistColMaker<'a, C: Collective> {
    params: &'a TrainParams,
    collective: &'a C,
}

impl<'a, C: Collective> DistColMaker<'a, C> {
    pub fn new(params: &'a TrainParams, collective: &'a C) -> Self {
        Self { params, collective }
    }

    /// Grow, prune, and replicate one tree.
    pub fn update<M, S>(
        &self,
        gpair: &[GradPair],
        matrix: &M,
        info: &TrainInfo,
        tree: &mut RegTree,
    ) -> Result<(), UpdateError>
    where
        M: FeatureMatrix + Sync,
        S: SplitStats,
    {
        let mut builder: ColMaker<'_, M, S, C> = ColMaker::new(
            self.params,
            gpair,
            matrix,
            info,
            self.collective,
            RoutingMode::Bitmap,
        );
        builder.update(tree)?;
        prune_tree(self.params, tree);
        self.sync_tree(tree)?;
        Ok(())
    }

    /// Replicate the finished tree from rank 0.
    fn sync_tree(&self, tree: &mut RegTree) -> Result<(), UpdateError> {
        if self.collective.world_size() <= 1 {
            return Ok(());
        }
        let mut bytes = if self.collective.rank() == 0 {
            tree.to_bytes()?
        } else {
            Vec::new()
        };
        self.collective.broadcast_bytes(&mut bytes, 0)?;
        if self.collective.rank() != 0 {
            *tree = RegTree::from_bytes(&bytes)?;
        }
        Ok(())
    }
}
