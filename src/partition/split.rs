//! Split descriptors and the bin-level split decision.
//!
//! Splits are chosen by an external evaluator; this module consumes them.
//! For numeric splits the floating-point split value is converted once into
//! an integer bin threshold (`find_split_conditions`), after which the hot
//! partition loop compares bins only.

use crate::core::types::{BinIndex, FeatureIndex, NodeIndex};
use crate::matrix::BinnedMatrix;
use serde::{Deserialize, Serialize};

/// Bitset over the feature-local bins of one categorical split.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBitset {
    words: Vec<u32>,
}

impl CategoryBitset {
    /// Builds a bitset from feature-local category bins.
    pub fn from_categories(cats: impl IntoIterator<Item = BinIndex>) -> Self {
        let mut set = CategoryBitset::default();
        for c in cats {
            set.insert(c);
        }
        set
    }

    /// Adds a feature-local category bin.
    pub fn insert(&mut self, cat: BinIndex) {
        let word = (cat / 32) as usize;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u32 << (cat % 32);
    }

    /// Tests a feature-local category bin.
    #[inline]
    pub fn contains(&self, cat: BinIndex) -> bool {
        let word = (cat / 32) as usize;
        match self.words.get(word) {
            Some(w) => (w >> (cat % 32)) & 1 == 1,
            None => false,
        }
    }
}

/// One chosen split, as handed over by the external evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Node being split.
    pub nid: NodeIndex,
    /// Identifier the left child's rows attach to.
    pub left_child: NodeIndex,
    /// Identifier the right child's rows attach to.
    pub right_child: NodeIndex,
    /// Split feature.
    pub feature: FeatureIndex,
    /// Floating-point split value (numeric splits).
    pub split_value: f32,
    /// Default direction for missing rows: true = left.
    pub default_left: bool,
    /// True for categorical splits.
    pub is_cat: bool,
    /// Feature-local category bins routed left (categorical splits).
    pub cat_bits: CategoryBitset,
}

impl SplitEntry {
    /// Convenience constructor for a numeric split.
    pub fn numeric(
        nid: NodeIndex,
        left_child: NodeIndex,
        right_child: NodeIndex,
        feature: FeatureIndex,
        split_value: f32,
        default_left: bool,
    ) -> Self {
        SplitEntry {
            nid,
            left_child,
            right_child,
            feature,
            split_value,
            default_left,
            is_cat: false,
            cat_bits: CategoryBitset::default(),
        }
    }

    /// Convenience constructor for a categorical split.
    pub fn categorical(
        nid: NodeIndex,
        left_child: NodeIndex,
        right_child: NodeIndex,
        feature: FeatureIndex,
        cat_bits: CategoryBitset,
        default_left: bool,
    ) -> Self {
        SplitEntry {
            nid,
            left_child,
            right_child,
            feature,
            split_value: 0.0,
            default_left,
            is_cat: true,
            cat_bits,
        }
    }
}

/// Converts floating-point split values into integer bin thresholds.
///
/// For each numeric split, `split_cond = max { i in [offsets[f],
/// offsets[f+1]) : cut_values[i] == split_value }`; `-1` when no cut point
/// equals the split value, which places every non-missing row right.
/// Categorical splits get `-1` (the threshold is unused for them).
pub fn find_split_conditions(splits: &[SplitEntry], matrix: &BinnedMatrix) -> Vec<i32> {
    let cut_values = matrix.cut_values();
    let offsets = matrix.offsets();
    splits
        .iter()
        .map(|split| {
            if split.is_cat {
                return -1;
            }
            let lower = offsets[split.feature];
            let upper = offsets[split.feature + 1];
            assert!(
                upper < i32::MAX as BinIndex,
                "bin index overflows 32-bit split condition"
            );
            let mut cond = -1i32;
            for bin in lower..upper {
                if cut_values[bin as usize] == split.split_value {
                    cond = bin as i32;
                }
            }
            cond
        })
        .collect()
}

/// Decides left/right for one row of one split.
///
/// `split_cond` is the precomputed integer threshold for this split.
/// Returns `None` when the row's value for the split feature is missing on
/// this matrix (caller applies the default direction or the missing bit).
#[inline]
pub fn decide_row(
    matrix: &BinnedMatrix,
    split: &SplitEntry,
    split_cond: i32,
    local_row: usize,
) -> Option<bool> {
    let bin = matrix.bin_for_feature(local_row, split.feature)?;
    if matrix.is_missing_bin(bin) {
        return None;
    }
    let go_left = if split.is_cat {
        let local = bin - matrix.offsets()[split.feature];
        split.cat_bits.contains(local)
    } else {
        (bin as i32) <= split_cond
    };
    Some(go_left)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::BinStorage;

    fn matrix_2f() -> BinnedMatrix {
        // 1 row x 2 features, 3 bins each; cut values 0,1,2 / 10,11,12
        BinnedMatrix::dense(
            BinStorage::U8(vec![1, 2]),
            vec![0, 3, 6],
            vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0],
            1,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_find_split_conditions_equality() {
        let m = matrix_2f();
        let splits = vec![
            SplitEntry::numeric(0, 1, 2, 0, 1.0, true),
            SplitEntry::numeric(0, 1, 2, 1, 12.0, true),
        ];
        assert_eq!(find_split_conditions(&splits, &m), vec![1, 5]);
    }

    #[test]
    fn test_find_split_conditions_no_match() {
        let m = matrix_2f();
        let splits = vec![SplitEntry::numeric(0, 1, 2, 0, 0.5, true)];
        assert_eq!(find_split_conditions(&splits, &m), vec![-1]);
    }

    #[test]
    fn test_decide_row_numeric() {
        let m = matrix_2f();
        let split = SplitEntry::numeric(0, 1, 2, 0, 1.0, true);
        // row 0 has local bin 1 for feature 0 -> global bin 1
        assert_eq!(decide_row(&m, &split, 1, 0), Some(true));
        assert_eq!(decide_row(&m, &split, 0, 0), Some(false));
        // split below all cuts: everything non-missing goes right
        assert_eq!(decide_row(&m, &split, -1, 0), Some(false));
    }

    #[test]
    fn test_decide_row_categorical() {
        let m = matrix_2f();
        let split = SplitEntry::categorical(
            0,
            1,
            2,
            1,
            CategoryBitset::from_categories([2u32]),
            false,
        );
        // row 0 has local bin 2 for feature 1
        assert_eq!(decide_row(&m, &split, -1, 0), Some(true));

        let split = SplitEntry::categorical(
            0,
            1,
            2,
            1,
            CategoryBitset::from_categories([0u32, 1]),
            false,
        );
        assert_eq!(decide_row(&m, &split, -1, 0), Some(false));
    }

    #[test]
    fn test_category_bitset() {
        let set = CategoryBitset::from_categories([0u32, 33, 64]);
        assert!(set.contains(0));
        assert!(set.contains(33));
        assert!(set.contains(64));
        assert!(!set.contains(1));
        assert!(!set.contains(200));
    }
}
