//! Synthetic data helpers shared by unit and integration tests.

use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::data::SparseMatrix;
use crate::train::GradPair;

/// Generate a dense-ish synthetic regression problem.
///
/// Features are uniform in `[0, 10)`; the target is a fixed linear blend of
/// the first features plus seeded Gaussian-ish noise. Returns the matrix and
/// per-row targets.
pub fn synthetic_regression(
    n_rows: usize,
    n_cols: usize,
    seed: u64,
    noise: f32,
) -> (SparseMatrix, Vec<f32>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(n_rows);
    let mut targets = Vec::with_capacity(n_rows);
    for _ in 0..n_rows {
        let mut row = Vec::with_capacity(n_cols);
        let mut target = 0.0f32;
        for fid in 0..n_cols {
            let v: f32 = rng.gen::<f32>() * 10.0;
            row.push((fid as u32, v));
            // descending influence per feature keeps the signal learnable
            let coef = match fid {
                0 => 2.0,
                1 => -1.0,
                2 => 0.5,
                _ => 0.0,
            };
            target += coef * v;
        }
        // sum of uniforms as cheap noise
        let eps: f32 = (rng.gen::<f32>() + rng.gen::<f32>() - 1.0) * noise;
        targets.push(target + eps);
        rows.push(row);
    }
    (SparseMatrix::from_rows(&rows, n_cols), targets)
}

/// Squared-error gradients at the given predictions.
pub fn squared_loss_gpair(preds: &[f32], targets: &[f32]) -> Vec<GradPair> {
    preds
        .iter()
        .zip(targets)
        .map(|(&p, &t)| GradPair::new(p - t, 1.0))
        .collect()
}

/// Root mean squared error.
pub fn rmse(preds: &[f32], targets: &[f32]) -> f64 {
    let n = preds.len().max(1) as f64;
    let sum: f64 = preds
        .iter()
        .zip(targets)
        .map(|(&p, &t)| {
            let d = (p - t) as f64;
            d * d
        })
        .sum();
    (sum / n).sqrt()
}
