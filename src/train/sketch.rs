//! Weighted quantile sketches for histogram cut proposals.
//!
//! The histogram makers summarize each `(node, feature)` value distribution,
//! weighted by the second-order gradient, into at most `max_size` entries.
//! Three pieces cooperate:
//!
//! - [`WQSummary`]: a strictly-increasing list of `(value, weight)` entries.
//!   Merging preserves total weight exactly; pruning folds dropped entries
//!   into their successors, so the summary always accounts for every unit of
//!   weight pushed and its rank error is bounded by the heaviest folded run
//!   (≈ `total_weight / max_size` after a prune).
//! - [`WQuantileSketch`]: buffered unordered pushes over a summary.
//! - [`SketchBuilder`]: budgeted streaming push for a value-ordered column
//!   scan. It needs the node's total weight up front, which is why the
//!   column maker either trusts the node's precomputed hessian sum (full
//!   column) or takes a counting pass first (partial column).

use serde::{Deserialize, Serialize};

use crate::sync::Reducible;

// ============================================================================
// WQSummary
// ============================================================================

/// One summary entry: a value and the weight it accounts for.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub value: f32,
    pub weight: f64,
}

/// Bounded-size weighted quantile summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WQSummary {
    entries: Vec<SummaryEntry>,
    limit: usize,
}

impl WQSummary {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(2),
        }
    }

    #[inline]
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.entries.iter().map(|e| e.weight).sum()
    }

    /// Largest value seen, if any.
    pub fn max_value(&self) -> Option<f32> {
        self.entries.last().map(|e| e.value)
    }

    /// Absorb a sorted, deduplicated entry list.
    fn merge_sorted(&mut self, other: &[SummaryEntry]) {
        if other.is_empty() {
            return;
        }
        let mut merged = Vec::with_capacity(self.entries.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.entries.len() && j < other.len() {
            let a = self.entries[i];
            let b = other[j];
            match a.value.total_cmp(&b.value) {
                std::cmp::Ordering::Less => {
                    merged.push(a);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(b);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(SummaryEntry {
                        value: a.value,
                        weight: a.weight + b.weight,
                    });
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.entries[i..]);
        merged.extend_from_slice(&other[j..]);
        self.entries = merged;
    }

    /// Merge another summary in, keeping the total weight exact.
    pub fn merge(&mut self, other: &WQSummary) {
        self.merge_sorted(&other.entries);
    }

    /// Shrink to at most `limit` entries.
    ///
    /// The minimum and maximum values are always kept; interior entries are
    /// kept at evenly spaced weighted ranks, and every dropped entry's
    /// weight rolls into the next kept one.
    pub fn prune(&mut self) {
        let n = self.entries.len();
        if n <= self.limit {
            return;
        }
        let total = self.total_weight();
        let k = self.limit;
        let step = total / (k - 1) as f64;
        let mut out = Vec::with_capacity(k);
        out.push(self.entries[0]);
        let mut acc = self.entries[0].weight;
        let mut pending = 0.0;
        let mut next_goal = step;
        for e in &self.entries[1..n - 1] {
            acc += e.weight;
            pending += e.weight;
            if acc >= next_goal && out.len() < k - 1 {
                out.push(SummaryEntry {
                    value: e.value,
                    weight: pending,
                });
                pending = 0.0;
                while next_goal <= acc {
                    next_goal += step;
                }
            }
        }
        let last = self.entries[n - 1];
        out.push(SummaryEntry {
            value: last.value,
            weight: pending + last.weight,
        });
        self.entries = out;
    }
}

/// Peer summaries combine by merge-then-prune; both sides of the reduction
/// carry the same limit.
impl Reducible for WQSummary {
    fn reduce(&mut self, other: &Self) {
        self.merge(other);
        self.prune();
    }
}

// ============================================================================
// WQuantileSketch
// ============================================================================

/// Buffering sketch: accepts unordered `(value, weight)` pushes and folds
/// them into a bounded summary.
#[derive(Clone, Debug)]
pub struct WQuantileSketch {
    buffer: Vec<SummaryEntry>,
    summary: WQSummary,
    buffer_cap: usize,
}

impl WQuantileSketch {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(2);
        Self {
            buffer: Vec::new(),
            summary: WQSummary::with_limit(max_size),
            buffer_cap: (max_size * 8).max(64),
        }
    }

    pub fn push(&mut self, value: f32, weight: f64) {
        if weight <= 0.0 {
            return;
        }
        self.buffer.push(SummaryEntry { value, weight });
        if self.buffer.len() >= self.buffer_cap {
            self.flush();
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        self.buffer
            .sort_by(|a, b| a.value.total_cmp(&b.value));
        let mut sorted: Vec<SummaryEntry> = Vec::with_capacity(self.buffer.len());
        for e in self.buffer.drain(..) {
            match sorted.last_mut() {
                Some(last) if last.value == e.value => last.weight += e.weight,
                _ => sorted.push(e),
            }
        }
        self.summary.merge_sorted(&sorted);
        self.summary.prune();
    }

    /// Finish and take the pruned summary.
    pub fn into_summary(mut self) -> WQSummary {
        self.flush();
        self.summary.prune();
        self.summary
    }
}

// ============================================================================
// SketchBuilder
// ============================================================================

/// Budgeted streaming push over a value-ordered scan.
///
/// Thins a column of up to the full rowset down to at most `max_size + 1`
/// sketch pushes by only emitting when the accumulated weight crosses the
/// next evenly spaced goal. Skipped weight rides along to the next emitted
/// value, so nothing is lost.
#[derive(Clone, Debug, Default)]
pub struct SketchBuilder {
    step: f64,
    next_goal: f64,
    acc: f64,
    pending: f64,
    last_value: f32,
    started: bool,
}

impl SketchBuilder {
    /// Arm the builder for a scan whose total weight is known.
    pub fn begin(&mut self, sum_total: f64, max_size: usize) {
        self.step = if max_size > 0 {
            sum_total / max_size as f64
        } else {
            0.0
        };
        self.next_goal = self.step;
        self.acc = 0.0;
        self.pending = 0.0;
        self.last_value = 0.0;
        self.started = false;
    }

    /// Feed the next `(value, weight)` of an ascending-value scan.
    pub fn push(&mut self, value: f32, weight: f64, sketch: &mut WQuantileSketch) {
        if !self.started {
            self.started = true;
            self.last_value = value;
            self.pending = weight;
            self.acc = weight;
            return;
        }
        if value == self.last_value {
            self.pending += weight;
            self.acc += weight;
            return;
        }
        if self.acc >= self.next_goal || self.step <= 0.0 {
            sketch.push(self.last_value, self.pending);
            self.pending = 0.0;
            while self.next_goal <= self.acc {
                self.next_goal += self.step;
                if self.step <= 0.0 {
                    break;
                }
            }
        }
        self.last_value = value;
        self.pending += weight;
        self.acc += weight;
    }

    /// Emit whatever is still pending (always includes the maximum value).
    pub fn finish(&mut self, sketch: &mut WQuantileSketch) {
        if self.started && self.pending > 0.0 {
            sketch.push(self.last_value, self.pending);
        }
        self.started = false;
        self.pending = 0.0;
    }
}
