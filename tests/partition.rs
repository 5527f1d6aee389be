//! End-to-end partition properties: split routing, multiset preservation,
//! the column-split path against the single-worker baseline, and
//! determinism across thread counts.

mod common;

use boosthist::collective::InProcessCollective;
use boosthist::core::Context;
use boosthist::partition::{CategoryBitset, RowPartitioner, SplitEntry};
use common::{init_logger, tiny_bin, tiny_column_slice, tiny_dense};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::thread;

#[test]
fn split_routes_rows_by_bin_threshold() {
    init_logger();
    let matrix = tiny_dense();
    let ctx = Context::new(2).unwrap();
    let mut part = RowPartitioner::new(&ctx, 8, 0, None);

    // feature 0 at cut value 2.0 -> global bin 2 -> local bins {0,1,2} left
    let splits = vec![SplitEntry::numeric(0, 1, 2, 0, 2.0, true)];
    part.update_position(&ctx, &matrix, &splits).unwrap();

    let expected_left: Vec<usize> = (0..8).filter(|&r| tiny_bin(r, 0) <= 2).collect();
    let expected_right: Vec<usize> = (0..8).filter(|&r| tiny_bin(r, 0) > 2).collect();
    assert_eq!(part.node_rows(1), expected_left.as_slice());
    assert_eq!(part.node_rows(2), expected_right.as_slice());
}

#[test]
fn partition_preserves_row_multiset() {
    let mut rng = StdRng::seed_from_u64(7);
    let n_rows = 5000;
    let idx: Vec<u8> = (0..n_rows).map(|_| rng.gen_range(0..4u8)).collect();
    let matrix = boosthist::matrix::BinnedMatrix::dense(
        boosthist::matrix::BinStorage::U8(idx),
        vec![0, 4],
        common::cuts(4),
        n_rows,
        0,
    )
    .unwrap();

    let ctx = Context::new(4).unwrap();
    let mut part = RowPartitioner::new(&ctx, n_rows, 0, None);
    let splits = vec![SplitEntry::numeric(0, 1, 2, 0, 1.0, false)];
    part.update_position(&ctx, &matrix, &splits).unwrap();

    let mut all = part.row_set().data().to_vec();
    all.sort_unstable();
    assert_eq!(all, (0..n_rows).collect::<Vec<_>>());
    assert_eq!(
        part.node_rows(1).len() + part.node_rows(2).len(),
        n_rows
    );
}

#[test]
fn categorical_split_routes_by_bitset() {
    let matrix = tiny_dense();
    let ctx = Context::new(2).unwrap();
    let mut part = RowPartitioner::new(&ctx, 8, 0, None);

    // feature 3: local bins {1, 3} go left
    let cats = CategoryBitset::from_categories([1u32, 3]);
    let splits = vec![SplitEntry::categorical(0, 1, 2, 3, cats, false)];
    part.update_position(&ctx, &matrix, &splits).unwrap();

    let expected_left: Vec<usize> = (0..8)
        .filter(|&r| matches!(tiny_bin(r, 3), 1 | 3))
        .collect();
    assert_eq!(part.node_rows(1), expected_left.as_slice());
}

#[test]
fn two_level_split_keeps_leaf_cover() {
    let matrix = tiny_dense();
    let ctx = Context::new(3).unwrap();
    let mut part = RowPartitioner::new(&ctx, 8, 0, None);

    part.update_position(&ctx, &matrix, &[SplitEntry::numeric(0, 1, 2, 0, 1.0, true)])
        .unwrap();
    // feature 5 spans cut values 20..=23, feature 9 spans 36..=39
    part.update_position(
        &ctx,
        &matrix,
        &[
            SplitEntry::numeric(1, 3, 4, 5, 22.0, true),
            SplitEntry::numeric(2, 5, 6, 9, 36.0, false),
        ],
    )
    .unwrap();

    let mut seen: Vec<usize> = [3usize, 4, 5, 6]
        .iter()
        .flat_map(|&nid| part.node_rows(nid).to_vec())
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..8).collect::<Vec<_>>());
}

#[test]
fn column_split_matches_single_worker() {
    init_logger();
    // worker 0 owns features 0..8, worker 1 owns features 8..16
    // feature 3 spans cut values 12..=15, feature 11 spans 44..=47
    let splits = vec![
        SplitEntry::numeric(0, 1, 2, 3, 14.0, true), // feature on worker 0
    ];
    let second = vec![
        SplitEntry::numeric(1, 3, 4, 11, 45.0, false), // feature on worker 1
        SplitEntry::numeric(2, 5, 6, 0, 0.0, true),
    ];

    // baseline: one worker with the full matrix
    let ctx = Context::new(2).unwrap();
    let full = tiny_dense();
    let mut baseline = RowPartitioner::new(&ctx, 8, 0, None);
    baseline.update_position(&ctx, &full, &splits).unwrap();
    baseline.update_position(&ctx, &full, &second).unwrap();
    let expected = baseline.row_set().data().to_vec();
    let expected_leaves: Vec<Vec<usize>> = [3usize, 4, 5, 6]
        .iter()
        .map(|&nid| baseline.node_rows(nid).to_vec())
        .collect();

    let handles = InProcessCollective::create(2);
    let joins: Vec<_> = handles
        .into_iter()
        .enumerate()
        .map(|(w, collective)| {
            let splits = splits.clone();
            let second = second.clone();
            thread::spawn(move || {
                let matrix = tiny_column_slice(w * 8, (w + 1) * 8);
                let ctx = Context::new(2).unwrap();
                let mut part = RowPartitioner::new(&ctx, 8, 0, Some(Arc::new(collective)));
                part.update_position(&ctx, &matrix, &splits).unwrap();
                part.update_position(&ctx, &matrix, &second).unwrap();
                let leaves: Vec<Vec<usize>> = [3usize, 4, 5, 6]
                    .iter()
                    .map(|&nid| part.node_rows(nid).to_vec())
                    .collect();
                (part.row_set().data().to_vec(), leaves)
            })
        })
        .collect();

    for j in joins {
        let (buf, leaves) = j.join().unwrap();
        assert_eq!(buf, expected);
        assert_eq!(leaves, expected_leaves);
    }
}

#[test]
fn partition_is_deterministic_across_thread_counts() {
    let matrix = tiny_dense();
    let run = |threads: usize| -> Vec<usize> {
        let ctx = Context::new(threads).unwrap();
        let mut part = RowPartitioner::new(&ctx, 8, 0, None);
        // feature 2 spans cut values 8..=11, feature 7 spans 28..=31,
        // feature 12 spans 48..=51
        part.update_position(&ctx, &matrix, &[SplitEntry::numeric(0, 1, 2, 2, 9.0, true)])
            .unwrap();
        part.update_position(
            &ctx,
            &matrix,
            &[
                SplitEntry::numeric(1, 3, 4, 7, 30.0, false),
                SplitEntry::numeric(2, 5, 6, 12, 48.0, true),
            ],
        )
        .unwrap();
        part.row_set().data().to_vec()
    };

    let reference = run(1);
    for threads in [3, 5, 7, 9, 11, 13, 15, 17] {
        assert_eq!(run(threads), reference, "thread count {threads} changed row order");
    }
}

#[test]
fn reset_restores_identity_ordering() {
    let matrix = tiny_dense();
    let ctx = Context::new(2).unwrap();
    let mut part = RowPartitioner::new(&ctx, 8, 0, None);
    part.update_position(&ctx, &matrix, &[SplitEntry::numeric(0, 1, 2, 0, 1.0, true)])
        .unwrap();

    part.reset(&ctx, 8, 0, None);
    assert_eq!(part.row_set().data(), (0..8).collect::<Vec<_>>().as_slice());
    assert_eq!(part.node_rows(0).len(), 8);
}
