//! Best-split records with a deterministic tie-break.

use serde::{Deserialize, Serialize};

use crate::sync::Reducible;

/// A candidate split for one node.
///
/// `update` keeps the maximum under a total order: greater `loss_chg` wins;
/// ties go to the smaller `split_index`, then the smaller `split_value`,
/// then `default_left == false`. Because it is a maximum under a total
/// order, the reduction is commutative and associative — per-node bests can
/// be combined across worker threads and across peers in any order and the
/// result is bit-identical.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitEntry {
    /// Loss reduction of the split; 0 means "no split found".
    pub loss_chg: f32,
    /// Feature to split on.
    pub split_index: u32,
    /// Threshold: rows with `fvalue < split_value` go left.
    pub split_value: f32,
    /// Side that receives rows missing the feature.
    pub default_left: bool,
}

impl Default for SplitEntry {
    fn default() -> Self {
        Self {
            loss_chg: 0.0,
            split_index: u32::MAX,
            split_value: f32::MAX,
            default_left: false,
        }
    }
}

impl SplitEntry {
    /// Whether `self` beats `other` under the tie-break order.
    fn better_than(&self, other: &SplitEntry) -> bool {
        match self.loss_chg.total_cmp(&other.loss_chg) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match self.split_index.cmp(&other.split_index) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Greater => false,
                std::cmp::Ordering::Equal => {
                    match self.split_value.total_cmp(&other.split_value) {
                        std::cmp::Ordering::Less => true,
                        std::cmp::Ordering::Greater => false,
                        std::cmp::Ordering::Equal => !self.default_left && other.default_left,
                    }
                }
            },
        }
    }

    /// Replace `self` with `other` if `other` wins. Returns whether it did.
    pub fn update(&mut self, other: &SplitEntry) -> bool {
        if other.better_than(self) {
            *self = *other;
            true
        } else {
            false
        }
    }

    /// Propose a candidate by fields. Returns whether it won.
    pub fn update_split(
        &mut self,
        loss_chg: f32,
        split_index: u32,
        split_value: f32,
        default_left: bool,
    ) -> bool {
        self.update(&SplitEntry {
            loss_chg,
            split_index,
            split_value,
            default_left,
        })
    }

    /// Whether any real candidate has been recorded.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.split_index != u32::MAX
    }
}

impl Reducible for SplitEntry {
    fn reduce(&mut self, other: &Self) {
        self.update(other);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(loss_chg: f32, split_index: u32, split_value: f32, default_left: bool) -> SplitEntry {
        SplitEntry {
            loss_chg,
            split_index,
            split_value,
            default_left,
        }
    }

    #[test]
    fn test_higher_loss_wins() {
        let mut best = SplitEntry::default();
        assert!(best.update(&entry(1.0, 3, 0.5, true)));
        assert!(!best.update(&entry(0.5, 0, 0.0, false)));
        assert!(best.update(&entry(2.0, 9, 9.0, true)));
        assert_eq!(best.split_index, 9);
    }

    #[test]
    fn test_tie_break_chain() {
        // equal loss: smaller feature wins
        let mut best = entry(1.0, 3, 0.5, false);
        assert!(best.update(&entry(1.0, 2, 0.9, true)));
        // equal loss + feature: smaller value wins
        assert!(best.update(&entry(1.0, 2, 0.4, true)));
        // equal everything: false beats true
        assert!(best.update(&entry(1.0, 2, 0.4, false)));
        assert!(!best.update(&entry(1.0, 2, 0.4, true)));
    }

    #[test]
    fn test_update_commutative_associative() {
        let candidates = [
            entry(1.0, 3, 0.5, false),
            entry(1.0, 3, 0.5, true),
            entry(1.0, 2, 0.7, false),
            entry(2.0, 5, 0.1, true),
            entry(0.0, 1, 0.0, false),
            SplitEntry::default(),
        ];
        // reduce in every pairwise grouping and ordering of a triple, plus
        // a full fold in both directions: all must agree
        let fold = |items: &[SplitEntry]| {
            let mut acc = SplitEntry::default();
            for e in items {
                acc.update(e);
            }
            acc
        };
        let forward = fold(&candidates);
        let mut reversed = candidates;
        reversed.reverse();
        assert_eq!(forward, fold(&reversed));

        for a in &candidates {
            for b in &candidates {
                let mut ab = *a;
                ab.update(b);
                let mut ba = *b;
                ba.update(a);
                assert_eq!(ab, ba);
                for c in &candidates {
                    let mut left = ab;
                    left.update(c);
                    let mut bc = *b;
                    bc.update(c);
                    let mut right = *a;
                    right.update(&bc);
                    assert_eq!(left, right);
                }
            }
        }
    }

    #[test]
    fn test_default_entry_invalid() {
        assert!(!SplitEntry::default().is_valid());
        let mut best = SplitEntry::default();
        best.update_split(0.5, 0, 1.0, false);
        assert!(best.is_valid());
    }
}
