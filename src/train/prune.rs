//! Bottom-up tree pruning.

use crate::tree::RegTree;

use super::TrainParams;

/// Collapse splits that did not pay for themselves.
///
/// A node whose children are both leaves is collapsed back into a leaf when
/// the recorded loss change of its split is below `min_split_loss`, or when
/// its children sit deeper than `max_depth`. Collapsing can expose a newly
/// prunable parent, so the walk recurses upward until it reaches a node
/// that stays. Returns the number of nodes removed.
pub fn prune_tree(params: &TrainParams, tree: &mut RegTree) -> usize {
    let mut removed = 0;
    for nid in 0..tree.num_nodes() as u32 {
        let node = tree.node(nid);
        if !node.deleted && node.is_leaf() {
            removed += try_prune_leaf(params, tree, nid);
        }
    }
    if removed > 0 {
        tree.refresh_max_depth();
    }
    removed
}

/// If `nid` is a leaf whose sibling is also a leaf and whose parent's split
/// should not have happened, collapse the parent and keep walking up.
fn try_prune_leaf(params: &TrainParams, tree: &mut RegTree, nid: u32) -> usize {
    let parent = tree.node(nid).parent;
    if parent < 0 {
        return 0;
    }
    let pid = parent as u32;
    let (cleft, cright) = {
        let p = tree.node(pid);
        (p.cleft as u32, p.cright as u32)
    };
    if !tree.node(cleft).is_leaf() || !tree.node(cright).is_leaf() {
        return 0;
    }
    let depth = tree.depth(nid);
    if !params.need_prune(tree.stat(pid).loss_chg, depth) {
        return 0;
    }
    let value = params.learning_rate * tree.stat(pid).base_weight;
    tree.collapse_to_leaf(pid, value);
    2 + try_prune_leaf(params, tree, pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::RegTree;
    use approx::assert_abs_diff_eq;

    /// depth-2 chain: root -> (1, 2), 1 -> (3, 4)
    fn chain_tree(loss_root: f32, loss_inner: f32) -> RegTree {
        let mut tree = RegTree::new(1, 2, 0);
        let (a, _b) = tree.add_childs(0);
        tree.node_mut(0).set_split(0, 0.5, false);
        tree.stat_mut(0).loss_chg = loss_root;
        tree.stat_mut(0).base_weight = 0.75;
        let (_c, _d) = tree.add_childs(a);
        tree.node_mut(a).set_split(1, 0.5, false);
        tree.stat_mut(a).loss_chg = loss_inner;
        tree.stat_mut(a).base_weight = 0.25;
        tree
    }

    fn params_with_gamma(gamma: f32) -> TrainParams {
        TrainParams {
            min_split_loss: gamma,
            learning_rate: 0.1,
            ..TrainParams::default()
        }
    }

    #[test]
    fn test_no_prune_when_gains_clear_gamma() {
        let mut tree = chain_tree(10.0, 10.0);
        assert_eq!(prune_tree(&params_with_gamma(1.0), &mut tree), 0);
        assert_eq!(tree.num_extra_nodes(), 4);
    }

    #[test]
    fn test_prunes_weak_inner_split() {
        let mut tree = chain_tree(10.0, 0.5);
        assert_eq!(prune_tree(&params_with_gamma(1.0), &mut tree), 2);
        assert!(tree.node(1).is_leaf());
        assert_abs_diff_eq!(tree.node(1).leaf_value, 0.1 * 0.25, epsilon = 1e-7);
        assert!(!tree.node(0).is_leaf());
    }

    #[test]
    fn test_prune_cascades_to_root() {
        // collapsing the inner split exposes a weak root split
        let mut tree = chain_tree(0.5, 0.5);
        assert_eq!(prune_tree(&params_with_gamma(1.0), &mut tree), 4);
        assert!(tree.node(0).is_leaf());
        assert_abs_diff_eq!(tree.node(0).leaf_value, 0.1 * 0.75, epsilon = 1e-7);
        assert_eq!(tree.num_extra_nodes(), 0);
        assert_eq!(tree.header().max_depth, 0);
    }

    #[test]
    fn test_depth_cap_prunes_even_strong_splits() {
        let mut tree = chain_tree(10.0, 10.0);
        let params = TrainParams {
            max_depth: 1,
            ..params_with_gamma(0.0)
        };
        assert_eq!(prune_tree(&params, &mut tree), 2);
        assert!(tree.node(1).is_leaf());
        assert!(!tree.node(0).is_leaf());
    }
}
