//! Compressed-row sparse matrix.
//!
//! Storage is a faer [`SparseRowMat`]. The integrator only reads matrices;
//! construction validates the structure up front so nothing downstream can
//! hit one of faer's structural assertions.

use faer::sparse::{SparseRowMat, SymbolicSparseRowMat, Triplet};
use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::scalar::NetiScalar;

/// Sparse matrix in compressed-row (CSR) form.
///
/// Row `i` owns the entries `row_offsets[i]..row_offsets[i + 1]` of
/// `col_indices` and `values`.
#[derive(Debug, Clone)]
pub struct CsrMatrix<T> {
    matrix: SparseRowMat<usize, T>,
}

impl<T: NetiScalar> CsrMatrix<T> {
    /// Create from raw CSR arrays, validating the structure.
    ///
    /// Requires `nrows + 1` row offsets starting at zero, non-decreasing, and
    /// ending at the number of nonzeros; every column index must be `< ncols`.
    /// Columns within a row may appear in any order.
    pub fn try_new(
        nrows: usize,
        ncols: usize,
        row_offsets: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self> {
        check_dimensions(nrows, ncols)?;
        if row_offsets.len() != nrows + 1 {
            return Err(Error::RowOffsetsLength {
                expected: nrows + 1,
                actual: row_offsets.len(),
            });
        }
        if values.len() != col_indices.len() {
            return Err(Error::ValueIndexMismatch {
                values: values.len(),
                indices: col_indices.len(),
            });
        }
        if row_offsets[0] != 0 {
            return Err(Error::RowOffsetsNotMonotonic { row: 0 });
        }
        for (row, pair) in row_offsets.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(Error::RowOffsetsNotMonotonic { row });
            }
        }
        let offset_end = row_offsets[nrows];
        if offset_end != values.len() {
            return Err(Error::NonzeroCountMismatch {
                offset_end,
                nnz: values.len(),
            });
        }
        for row in 0..nrows {
            for &col in &col_indices[row_offsets[row]..row_offsets[row + 1]] {
                if col >= ncols {
                    return Err(Error::ColumnOutOfRange { row, col, ncols });
                }
            }
        }

        let symbolic =
            SymbolicSparseRowMat::new_unsorted_checked(nrows, ncols, row_offsets, None, col_indices);
        Ok(Self {
            matrix: SparseRowMat::new(symbolic, values),
        })
    }

    /// Create from triplets (row, col, value).
    ///
    /// Duplicate entries at the same position are summed. Columns within a
    /// row come out sorted.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Result<Self> {
        check_dimensions(nrows, ncols)?;
        for &(row, col, _) in triplets {
            if row >= nrows || col >= ncols {
                return Err(Error::TripletOutOfRange {
                    row,
                    col,
                    nrows,
                    ncols,
                });
            }
        }

        let faer_triplets: Vec<_> = triplets
            .iter()
            .map(|&(r, c, v)| Triplet::new(r, c, v))
            .collect();

        let matrix = SparseRowMat::<usize, T>::try_new_from_triplets(nrows, ncols, &faer_triplets)
            .map_err(|err| Error::Assembly(format!("{err:?}")))?;
        Ok(Self { matrix })
    }

    /// Square diagonal matrix with the given entries.
    pub fn from_diagonal(diagonal: &[T]) -> Self {
        let n = diagonal.len();
        let symbolic =
            SymbolicSparseRowMat::new_checked(n, n, (0..=n).collect(), None, (0..n).collect());
        Self {
            matrix: SparseRowMat::new(symbolic, diagonal.to_vec()),
        }
    }

    /// The n×n identity.
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![T::one(); n])
    }

    /// An n×n matrix with no stored entries.
    pub fn zeros(n: usize) -> Self {
        let symbolic = SymbolicSparseRowMat::new_checked(n, n, vec![0; n + 1], None, Vec::new());
        Self {
            matrix: SparseRowMat::new(symbolic, Vec::new()),
        }
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.matrix.ncols()
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.matrix.val().len()
    }

    pub fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Row offsets (`nrows + 1` entries).
    pub fn row_offsets(&self) -> &[usize] {
        self.matrix.symbolic().row_ptr()
    }

    /// Column index of each stored entry.
    pub fn col_indices(&self) -> &[usize] {
        self.matrix.symbolic().col_idx()
    }

    /// Stored values, aligned with [`col_indices`](Self::col_indices).
    pub fn values(&self) -> &[T] {
        self.matrix.val()
    }

    /// Column indices and values of one row.
    pub fn row(&self, row: usize) -> (&[usize], &[T]) {
        (
            self.matrix.symbolic().col_idx_of_row_raw(row),
            self.matrix.val_of_row(row),
        )
    }

    /// Borrow the underlying faer matrix.
    pub fn as_faer(&self) -> &SparseRowMat<usize, T> {
        &self.matrix
    }

    /// Expand to a dense nalgebra matrix.
    pub fn to_dense(&self) -> DMatrix<T> {
        let mut dense = DMatrix::zeros(self.nrows(), self.ncols());
        for row in 0..self.nrows() {
            let (cols, vals) = self.row(row);
            for (&col, &val) in cols.iter().zip(vals) {
                dense[(row, col)] += val;
            }
        }
        dense
    }
}

impl<T: NetiScalar> PartialEq for CsrMatrix<T> {
    fn eq(&self, other: &Self) -> bool {
        self.nrows() == other.nrows()
            && self.ncols() == other.ncols()
            && self.row_offsets() == other.row_offsets()
            && self.col_indices() == other.col_indices()
            && self.values() == other.values()
    }
}

// faer indexes with signed offsets internally.
fn check_dimensions(nrows: usize, ncols: usize) -> Result<()> {
    let limit = isize::MAX as usize;
    if nrows > limit || ncols > limit {
        return Err(Error::DimensionsTooLarge { nrows, ncols });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_new_valid() {
        // [ 2 -1  0]
        // [-1  2 -1]
        // [ 0 -1  2]
        let m = CsrMatrix::try_new(
            3,
            3,
            vec![0, 2, 5, 7],
            vec![0, 1, 0, 1, 2, 1, 2],
            vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0],
        )
        .unwrap();

        assert_eq!(m.nnz(), 7);
        assert!(m.is_square());
        let (cols, vals) = m.row(1);
        assert_eq!(cols, &[0, 1, 2]);
        assert_eq!(vals, &[-1.0, 2.0, -1.0]);
    }

    #[test]
    fn try_new_rejects_short_offsets() {
        let result = CsrMatrix::<f64>::try_new(2, 2, vec![0, 1], vec![0], vec![1.0]);
        assert_eq!(
            result,
            Err(Error::RowOffsetsLength {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn try_new_rejects_decreasing_offsets() {
        let result = CsrMatrix::<f64>::try_new(2, 2, vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0]);
        assert!(matches!(result, Err(Error::RowOffsetsNotMonotonic { row: 1 })));
    }

    #[test]
    fn try_new_rejects_column_out_of_range() {
        let result = CsrMatrix::<f64>::try_new(2, 2, vec![0, 1, 2], vec![0, 2], vec![1.0, 1.0]);
        assert_eq!(
            result,
            Err(Error::ColumnOutOfRange {
                row: 1,
                col: 2,
                ncols: 2
            })
        );
    }

    #[test]
    fn try_new_rejects_nnz_mismatch() {
        let result = CsrMatrix::<f64>::try_new(1, 2, vec![0, 1], vec![0, 1], vec![1.0, 1.0]);
        assert!(matches!(result, Err(Error::NonzeroCountMismatch { .. })));
    }

    #[test]
    fn from_triplets_sums_duplicates() {
        let triplets = vec![(1, 1, 3.0), (0, 0, 2.0), (0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0)];
        let m = CsrMatrix::from_triplets(2, 2, &triplets).unwrap();

        assert_eq!(m.nnz(), 4);
        assert_eq!(m.row_offsets(), &[0, 2, 4]);
        let dense = m.to_dense();
        assert_eq!(dense[(0, 0)], 3.0);
        assert_eq!(dense[(0, 1)], 1.0);
        assert_eq!(dense[(1, 0)], 1.0);
        assert_eq!(dense[(1, 1)], 3.0);
    }

    #[test]
    fn from_triplets_rejects_out_of_range() {
        let result = CsrMatrix::from_triplets(2, 2, &[(2, 0, 1.0_f32)]);
        assert!(matches!(result, Err(Error::TripletOutOfRange { row: 2, .. })));
    }

    #[test]
    fn from_triplets_allows_empty_rows() {
        let m = CsrMatrix::from_triplets(3, 3, &[(2, 2, 5.0)]).unwrap();
        assert_eq!(m.row_offsets(), &[0, 0, 0, 1]);
        assert_eq!(m.row(0).0.len(), 0);
    }

    #[test]
    fn identity_and_zeros() {
        let eye = CsrMatrix::<f64>::identity(4);
        assert_eq!(eye.nnz(), 4);
        assert_eq!(eye.to_dense(), DMatrix::identity(4, 4));

        let zero = CsrMatrix::<f32>::zeros(3);
        assert_eq!(zero.nnz(), 0);
        assert_eq!(zero.row_offsets(), &[0, 0, 0, 0]);
    }

    #[test]
    fn try_new_accepts_unsorted_columns() {
        let m = CsrMatrix::try_new(1, 3, vec![0, 2], vec![2, 0], vec![5.0_f64, 1.0]).unwrap();
        let dense = m.to_dense();
        assert_eq!(dense[(0, 0)], 1.0);
        assert_eq!(dense[(0, 2)], 5.0);
    }

    #[test]
    fn try_new_rejects_oversized_dimensions() {
        let result = CsrMatrix::<f64>::try_new(1, usize::MAX, vec![0, 0], vec![], vec![]);
        assert!(matches!(result, Err(Error::DimensionsTooLarge { .. })));
    }

    #[test]
    fn from_triplets_matches_raw_construction() {
        let assembled = CsrMatrix::from_triplets(
            3,
            3,
            &[(2, 1, -1.0_f64), (0, 0, 2.0), (1, 2, -1.0), (1, 0, -1.0), (1, 1, 2.0), (2, 2, 2.0), (0, 1, -1.0)],
        )
        .unwrap();
        let raw = CsrMatrix::try_new(
            3,
            3,
            vec![0, 2, 5, 7],
            vec![0, 1, 0, 1, 2, 1, 2],
            vec![2.0, -1.0, -1.0, 2.0, -1.0, -1.0, 2.0],
        )
        .unwrap();
        assert_eq!(assembled, raw);
    }

    #[test]
    fn faer_view_shares_storage() {
        let m = CsrMatrix::from_diagonal(&[1.0_f32, 2.0, 3.0]);
        let inner = m.as_faer();
        assert_eq!(inner.nrows(), 3);
        assert_eq!(inner.val(), m.values());
    }
}
