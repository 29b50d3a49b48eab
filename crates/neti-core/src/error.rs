//! Error types for neti-core.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("row offsets must have {expected} entries, got {actual}")]
    RowOffsetsLength { expected: usize, actual: usize },

    #[error("row offsets must start at 0 and be non-decreasing (row {row})")]
    RowOffsetsNotMonotonic { row: usize },

    #[error("row offsets end at {offset_end} but {nnz} nonzeros were supplied")]
    NonzeroCountMismatch { offset_end: usize, nnz: usize },

    #[error("values and column indices differ in length: {values} vs {indices}")]
    ValueIndexMismatch { values: usize, indices: usize },

    #[error("column index {col} out of range for {ncols} columns (row {row})")]
    ColumnOutOfRange { row: usize, col: usize, ncols: usize },

    #[error("triplet ({row}, {col}) out of range for a {nrows}x{ncols} matrix")]
    TripletOutOfRange {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },

    #[error("{nrows}x{ncols} exceeds the addressable sparse dimension")]
    DimensionsTooLarge { nrows: usize, ncols: usize },

    #[error("sparse assembly failed: {0}")]
    Assembly(String),
}

pub type Result<T> = std::result::Result<T, Error>;
