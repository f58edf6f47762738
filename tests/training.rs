//! End-to-end training scenarios.

use boostree::data::{FeatureMatrix, SparseMatrix};
use boostree::testing::{rmse, squared_loss_gpair, synthetic_regression};
use boostree::train::{
    update, GainParams, GradPair, TrainInfo, TrainParams, TreeMethod,
};
use boostree::tree::RegTree;

fn no_reg(max_depth: u32) -> TrainParams {
    TrainParams {
        max_depth,
        gain: GainParams::no_regularization().with_min_child_weight(1.0),
        ..TrainParams::default()
    }
}

fn train_one(
    params: &TrainParams,
    matrix: &SparseMatrix,
    gpair: &[GradPair],
) -> RegTree {
    let info = TrainInfo::new(matrix.num_row());
    let mut trees = vec![RegTree::new(1, matrix.num_col(), 0)];
    update(params, gpair, matrix, &info, &mut trees).unwrap();
    trees.pop().unwrap()
}

#[test]
fn single_feature_two_rows() {
    let matrix = SparseMatrix::from_rows(&[vec![(0, 1.0)], vec![(0, 2.0)]], 1);
    let gpair = [GradPair::new(1.0, 1.0), GradPair::new(-1.0, 1.0)];
    let tree = train_one(&no_reg(1), &matrix, &gpair);

    let root = tree.node(0);
    assert!(!root.is_leaf());
    assert_eq!(root.split_index, 0);
    assert!(root.split_cond > 1.0 && root.split_cond < 2.0);
    let lr = 0.3;
    assert!((tree.node(root.cleft as u32).leaf_value + lr).abs() < 1e-6);
    assert!((tree.node(root.cright as u32).leaf_value - lr).abs() < 1e-6);
}

#[test]
fn missing_value_routing() {
    let matrix = SparseMatrix::from_rows(&[vec![(0, 1.0)], vec![(0, 2.0)], vec![]], 1);
    let gpair = [
        GradPair::new(2.0, 1.0),
        GradPair::new(-2.0, 1.0),
        GradPair::new(5.0, 1.0),
    ];
    let tree = train_one(&no_reg(1), &matrix, &gpair);

    let root = tree.node(0);
    assert!(root.default_left, "the missing row belongs with the left child");
    let lr = 0.3;
    assert!((tree.node(root.cleft as u32).leaf_value + 3.5 * lr).abs() < 1e-6);
    assert!((tree.node(root.cright as u32).leaf_value - 2.0 * lr).abs() < 1e-6);
    // a row with every feature absent walks default directions to that leaf
    assert_eq!(tree.leaf_for_row(&[], 0), root.cleft as u32);
}

#[test]
fn subsample_is_repeatable_per_seed() {
    let (matrix, targets) = synthetic_regression(2000, 4, 77, 0.3);
    let gpair = squared_loss_gpair(&vec![0.0; 2000], &targets);
    let params = TrainParams {
        subsample: 0.6,
        seed: 5,
        ..no_reg(4)
    };

    let a = train_one(&params, &matrix, &gpair);
    let b = train_one(&params, &matrix, &gpair);
    assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());

    let other_seed = TrainParams { seed: 6, ..params };
    let c = train_one(&other_seed, &matrix, &gpair);
    assert!(c.num_nodes() >= 1);
}

#[test]
fn histogram_tracks_exact_on_held_out_rmse() {
    let (train, train_targets) = synthetic_regression(1000, 5, 31, 0.5);
    let (test, test_targets) = synthetic_regression(250, 5, 32, 0.5);
    let gpair = squared_loss_gpair(&vec![0.0; 1000], &train_targets);

    let exact_params = TrainParams {
        learning_rate: 1.0,
        ..no_reg(6)
    };
    let exact_tree = train_one(&exact_params, &train, &gpair);

    let hist_params = TrainParams {
        sketch_eps: 0.01,
        tree_method: TreeMethod::HistColumn,
        ..exact_params.clone()
    };
    let hist_tree = train_one(&hist_params, &train, &gpair);

    // with zero predictions the squared-loss gradient is -target, so a
    // unit-learning-rate leaf weight estimates the target mean directly
    let predict = |tree: &RegTree| -> Vec<f32> {
        (0..test.num_row())
            .map(|r| tree.predict_row(test.row(r), 0))
            .collect()
    };
    let exact_rmse = rmse(&predict(&exact_tree), &test_targets);
    let hist_rmse = rmse(&predict(&hist_tree), &test_targets);

    assert!(
        hist_rmse <= exact_rmse * 1.05,
        "hist {hist_rmse:.4} vs exact {exact_rmse:.4}"
    );
}

#[test]
fn gamma_prunes_useless_split_to_root_leaf() {
    let matrix = SparseMatrix::from_rows(&[vec![(0, 1.0)], vec![(0, 2.0)]], 1);
    let gpair = [GradPair::new(1.0, 1.0), GradPair::new(-1.0, 1.0)];
    // the only available split improves the loss by 2, below gamma
    let params = TrainParams {
        min_split_loss: 5.0,
        ..no_reg(3)
    };
    let tree = train_one(&params, &matrix, &gpair);
    assert!(tree.node(0).is_leaf());
    assert_eq!(tree.num_extra_nodes(), 0);
}

#[test]
fn exact_maker_identical_across_thread_counts() {
    let (matrix, targets) = synthetic_regression(10_000, 8, 13, 0.4);
    let gpair = squared_loss_gpair(&vec![0.0; 10_000], &targets);
    let params = TrainParams { seed: 3, ..no_reg(6) };

    let mut serialized = Vec::new();
    for threads in [1, 2, 4, 8] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        let tree = pool.install(|| train_one(&params, &matrix, &gpair));
        serialized.push(tree.to_bytes().unwrap());
    }
    for bytes in &serialized[1..] {
        assert_eq!(&serialized[0], bytes, "tree differs across thread counts");
    }
}

#[test]
fn all_tree_methods_balance_leaves_and_internals() {
    let (matrix, targets) = synthetic_regression(600, 3, 21, 0.2);
    let gpair = squared_loss_gpair(&vec![0.0; 600], &targets);
    for method in [TreeMethod::Exact, TreeMethod::HistColumn, TreeMethod::HistRow] {
        let params = TrainParams {
            tree_method: method,
            ..no_reg(5)
        };
        let tree = train_one(&params, &matrix, &gpair);
        assert!(tree.num_extra_nodes() > 0, "{method:?} grew nothing");
        assert_eq!(
            tree.num_leaves(),
            tree.num_internal() + 1,
            "{method:?} tree out of balance"
        );
        // internal stats add up to their children
        for nid in 0..tree.num_nodes() as u32 {
            let node = tree.node(nid);
            if node.is_leaf() || node.deleted {
                continue;
            }
            let sum = tree.stat(node.cleft as u32).sum_hess
                + tree.stat(node.cright as u32).sum_hess;
            assert!(
                (tree.stat(nid).sum_hess - sum).abs() < 1e-2,
                "{method:?} node {nid}: {} vs {}",
                tree.stat(nid).sum_hess,
                sum
            );
        }
    }
}

#[test]
fn multiple_roots_grow_independently() {
    // rows 0-1 belong to root 0, rows 2-3 to root 1
    let matrix = SparseMatrix::from_rows(
        &[
            vec![(0, 1.0)],
            vec![(0, 2.0)],
            vec![(0, 1.0)],
            vec![(0, 2.0)],
        ],
        1,
    );
    let gpair = [
        GradPair::new(1.0, 1.0),
        GradPair::new(-1.0, 1.0),
        GradPair::new(3.0, 1.0),
        GradPair::new(3.0, 1.0),
    ];
    let info = TrainInfo::new(4).with_roots(vec![0, 0, 1, 1]);
    let mut trees = vec![RegTree::new(2, 1, 0)];
    update(&no_reg(1), &gpair, &matrix, &info, &mut trees).unwrap();
    let tree = trees.pop().unwrap();

    // root 0 has opposing gradients and splits; root 1 is uniform and stays
    // a leaf
    assert!(!tree.node(0).is_leaf());
    assert!(tree.node(1).is_leaf());
    assert!((tree.node(1).leaf_value + 3.0 * 0.3).abs() < 1e-6);
}
