//! Error types for neti-solver.

use thiserror::Error;

/// Failure of a workspace query or an integration step.
///
/// A step that returns any of these leaves the position history untouched.
#[derive(Debug, Error)]
pub enum NetiError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("workspace region `{region}` too small for `{view}`: need {required}, have {available}")]
    WorkspaceTooSmall {
        region: &'static str,
        view: &'static str,
        required: usize,
        available: usize,
    },

    #[error("Krylov breakdown at step {step}: residual {residual:e}")]
    KrylovBreakdown { step: usize, residual: f64 },

    #[error("eigendecomposition of the {dim}x{dim} Hessenberg matrix failed")]
    EigenDecompositionFailed { dim: usize },

    #[error("reduced eigenvector matrix is singular at pivot {pivot}")]
    LinearSolveSingular { pivot: usize },

    #[error("matrix error: {0}")]
    Matrix(#[from] neti_core::Error),
}

pub type Result<T> = std::result::Result<T, NetiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_message() {
        let err = NetiError::KrylovBreakdown {
            step: 3,
            residual: 0.0,
        };
        assert_eq!(err.to_string(), "Krylov breakdown at step 3: residual 0e0");
    }

    #[test]
    fn workspace_message() {
        let err = NetiError::WorkspaceTooSmall {
            region: "device",
            view: "basis",
            required: 40,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "workspace region `device` too small for `basis`: need 40, have 12"
        );
    }

    #[test]
    fn wraps_matrix_errors() {
        let err: NetiError = neti_core::Error::RowOffsetsNotMonotonic { row: 2 }.into();
        assert!(matches!(err, NetiError::Matrix(_)));
    }
}
