//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use boosthist::core::GradPair;
use boosthist::matrix::{BinStorage, BinnedMatrix};

/// Deterministic 8-row gradient vector used by the tiny fixtures.
pub fn tiny_gpairs() -> Vec<GradPair> {
    [
        (1.23, 0.24),
        (0.24, 0.25),
        (0.26, 0.27),
        (2.27, 0.28),
        (0.27, 0.29),
        (0.37, 0.39),
        (-0.47, 0.49),
        (0.57, 0.59),
    ]
    .iter()
    .map(|&(g, h)| GradPair::new(g, h))
    .collect()
}

/// Monotone cut values, one per global bin.
pub fn cuts(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}

/// Feature-local bin of the tiny dense fixture at `(row, feature)`.
pub fn tiny_bin(row: usize, feature: usize) -> u8 {
    ((row * 3 + feature * 5 + row * feature) % 4) as u8
}

/// 8 rows x 16 features, 4 bins per feature, deterministic bins.
pub fn tiny_dense() -> BinnedMatrix {
    let n_rows = 8;
    let n_features = 16;
    let idx: Vec<u8> = (0..n_rows)
        .flat_map(|r| (0..n_features).map(move |f| tiny_bin(r, f)))
        .collect();
    let offsets: Vec<u32> = (0..=n_features).map(|f| (f * 4) as u32).collect();
    BinnedMatrix::dense(BinStorage::U8(idx), offsets, cuts(n_features * 4), n_rows, 0)
        .expect("fixture matrix is well formed")
}

/// Worker-local view of [`tiny_dense`] for a column split: features in
/// `[feat_begin, feat_end)` keep their global bins, everything else is the
/// missing sentinel. Offsets and cut values stay global on every worker.
pub fn tiny_column_slice(feat_begin: usize, feat_end: usize) -> BinnedMatrix {
    let n_rows = 8;
    let n_features = 16;
    let sentinel = (n_features * 4) as u32;
    let idx: Vec<u32> = (0..n_rows)
        .flat_map(|r| {
            (0..n_features).map(move |f| {
                if f >= feat_begin && f < feat_end {
                    tiny_bin(r, f) as u32 + (f * 4) as u32
                } else {
                    sentinel
                }
            })
        })
        .collect();
    let offsets: Vec<u32> = (0..=n_features).map(|f| (f * 4) as u32).collect();
    BinnedMatrix::sparse(
        idx,
        offsets,
        cuts(n_features * 4),
        n_rows,
        n_features,
        0,
    )
    .expect("fixture matrix is well formed")
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
