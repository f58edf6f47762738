//! In-memory sparse matrix with row- and column-major access.

use super::{ColBatch, Entry, FeatureMatrix, RowBatch};

/// Sparse matrix stored in both CSR and CSC layout.
///
/// Built once from per-row `(feature, value)` lists; NaN values are treated
/// as absent. Rows keep their entries sorted by feature id. Columns keep
/// theirs sorted by ascending feature value so a single forward/backward
/// pass over a column visits values in threshold order.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    num_col: usize,
    row_ptr: Vec<usize>,
    row_data: Vec<Entry>,
    col_ptr: Vec<usize>,
    col_data: Vec<Entry>,
    rowset: Vec<u32>,
}

impl SparseMatrix {
    /// Build a matrix from per-row entry lists.
    ///
    /// Entries with NaN values or feature ids `>= num_col` are dropped.
    pub fn from_rows(rows: &[Vec<(u32, f32)>], num_col: usize) -> Self {
        let mut row_ptr = Vec::with_capacity(rows.len() + 1);
        let mut row_data = Vec::new();
        row_ptr.push(0);
        for row in rows {
            let mut entries: Vec<Entry> = row
                .iter()
                .filter(|(fid, fvalue)| (*fid as usize) < num_col && !fvalue.is_nan())
                .map(|&(fid, fvalue)| Entry::new(fid, fvalue))
                .collect();
            entries.sort_by_key(|e| e.index);
            row_data.extend_from_slice(&entries);
            row_ptr.push(row_data.len());
        }

        // Transpose into CSC, columns ordered by (fvalue, ridx).
        let mut counts = vec![0usize; num_col];
        for e in &row_data {
            counts[e.index as usize] += 1;
        }
        let mut col_ptr = Vec::with_capacity(num_col + 1);
        col_ptr.push(0);
        for c in &counts {
            col_ptr.push(col_ptr.last().unwrap() + c);
        }
        let mut col_data = vec![Entry::new(0, 0.0); row_data.len()];
        let mut cursor = col_ptr.clone();
        for ridx in 0..rows.len() {
            for e in &row_data[row_ptr[ridx]..row_ptr[ridx + 1]] {
                let fid = e.index as usize;
                col_data[cursor[fid]] = Entry::new(ridx as u32, e.fvalue);
                cursor[fid] += 1;
            }
        }
        for fid in 0..num_col {
            col_data[col_ptr[fid]..col_ptr[fid + 1]].sort_by(|a, b| {
                a.fvalue
                    .total_cmp(&b.fvalue)
                    .then_with(|| a.index.cmp(&b.index))
            });
        }

        let rowset = (0..rows.len() as u32).collect();
        Self {
            num_col,
            row_ptr,
            row_data,
            col_ptr,
            col_data,
            rowset,
        }
    }

    /// Entries of one row, sorted by feature id.
    #[inline]
    pub fn row(&self, ridx: usize) -> &[Entry] {
        &self.row_data[self.row_ptr[ridx]..self.row_ptr[ridx + 1]]
    }

    /// Entries of one column, sorted by ascending feature value.
    #[inline]
    pub fn col(&self, fid: usize) -> &[Entry] {
        &self.col_data[self.col_ptr[fid]..self.col_ptr[fid + 1]]
    }
}

impl FeatureMatrix for SparseMatrix {
    type RowIter<'a> = std::iter::Once<RowBatch<'a>>;
    type ColIter<'a> = std::iter::Once<ColBatch<'a>>;

    fn num_row(&self) -> usize {
        self.row_ptr.len() - 1
    }

    fn num_col(&self) -> usize {
        self.num_col
    }

    fn buffered_rowset(&self) -> &[u32] {
        &self.rowset
    }

    fn row_batches(&self) -> Self::RowIter<'_> {
        std::iter::once(RowBatch::new(0, &self.row_ptr, &self.row_data))
    }

    fn col_batches(&self, subset: Option<&[u32]>) -> Self::ColIter<'_> {
        let cols = match subset {
            Some(fids) => fids
                .iter()
                .filter(|&&fid| (fid as usize) < self.num_col)
                .map(|&fid| (fid, self.col(fid as usize)))
                .collect(),
            None => (0..self.num_col as u32)
                .map(|fid| (fid, self.col(fid as usize)))
                .collect(),
        };
        std::iter::once(ColBatch::new(cols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        SparseMatrix::from_rows(
            &[
                vec![(0, 3.0), (1, 1.0)],
                vec![(0, 1.0)],
                vec![(1, 2.0), (0, 2.0)],
                vec![],
            ],
            2,
        )
    }

    #[test]
    fn test_rows_sorted_by_feature() {
        let m = sample();
        assert_eq!(m.num_row(), 4);
        assert_eq!(m.row(2), &[Entry::new(0, 2.0), Entry::new(1, 2.0)]);
        assert!(m.row(3).is_empty());
    }

    #[test]
    fn test_cols_sorted_by_value() {
        let m = sample();
        let col0 = m.col(0);
        assert_eq!(col0.len(), 3);
        let values: Vec<f32> = col0.iter().map(|e| e.fvalue).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        // index here is the row id
        assert_eq!(col0[0].index, 1);
        assert_eq!(col0[2].index, 0);
    }

    #[test]
    fn test_nan_treated_as_absent() {
        let m = SparseMatrix::from_rows(&[vec![(0, f32::NAN), (1, 1.0)]], 2);
        assert!(m.row(0).len() == 1);
        assert!(m.col(0).is_empty());
    }

    #[test]
    fn test_col_subset() {
        let m = sample();
        let batch = m.col_batches(Some(&[1, 7])).next().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.cols()[0].0, 1);
    }

    #[test]
    fn test_row_batch_shape() {
        let m = sample();
        let batch = m.row_batches().next().unwrap();
        assert_eq!(batch.base_rowid, 0);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.row(0).len(), 2);
    }
}
