//! Compute device abstraction.
//!
//! The integrator never touches vectors directly: every vector, sparse and
//! dense operation goes through a [`Device`] handle passed in by the caller.
//! A GPU backend implements the same trait over its own queue; the crate
//! ships the [`HostDevice`] implementation.
//!
//! # Module Structure
//!
//! - [`host`] - CPU implementation of the primitives
//! - `dense` - eigendecomposition and pivoted LU used by the host device

mod dense;
pub mod host;

pub use host::{HostDevice, HostDeviceConfig};

use neti_core::{CsrMatrix, NetiScalar};

use crate::error::Result;

/// Numerical primitives the integrator composes.
///
/// All dense matrices are column-major. Operations with a `beta` argument
/// follow BLAS semantics: when `beta` is zero the output is not read, so it
/// may hold stale or non-finite data.
pub trait Device {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Sparse matrix-vector product: y = alpha * A * x + beta * y.
    fn spmv<T: NetiScalar>(&self, alpha: T, a: &CsrMatrix<T>, x: &[T], beta: T, y: &mut [T]);

    /// Dot product of two vectors.
    fn dot<T: NetiScalar>(&self, x: &[T], y: &[T]) -> T;

    /// Euclidean norm, free of intermediate underflow and overflow.
    fn nrm2<T: NetiScalar>(&self, x: &[T]) -> T;

    /// x = alpha * x.
    fn scal<T: NetiScalar>(&self, alpha: T, x: &mut [T]);

    /// y = alpha * x + y.
    fn axpy<T: NetiScalar>(&self, alpha: T, x: &[T], y: &mut [T]);

    /// y = x.
    fn copy<T: NetiScalar>(&self, x: &[T], y: &mut [T]);

    /// x = value everywhere.
    fn fill<T: NetiScalar>(&self, value: T, x: &mut [T]);

    /// Dense matrix-vector product: y = alpha * A * x + beta * y, with `A`
    /// stored column-major as `rows` x `cols`.
    #[allow(clippy::too_many_arguments)]
    fn gemv<T: NetiScalar>(
        &self,
        alpha: T,
        a: &[T],
        rows: usize,
        cols: usize,
        x: &[T],
        beta: T,
        y: &mut [T],
    );

    /// Blocking factor of the eigendecomposition for an `m` x `m` matrix.
    ///
    /// Sizes the eigendecomposition work region as `(2 + 2 * nb) * m`.
    /// Always at least 1.
    fn eig_block_size(&self, m: usize) -> usize;

    /// Right eigenvectors of a general `m` x `m` matrix.
    ///
    /// `h` is destroyed. On success `wr`/`wi` hold the real and imaginary
    /// parts of the eigenvalues and `vr` the eigenvectors: a real eigenvalue
    /// owns one real column, a complex pair `a ± ib` owns two adjacent columns
    /// `u`, `w` such that `u + i w` is the eigenvector for `a + ib`, listed
    /// first with positive imaginary part.
    fn geev<T: NetiScalar>(
        &self,
        m: usize,
        h: &mut [T],
        wr: &mut [T],
        wi: &mut [T],
        vr: &mut [T],
        work: &mut [T],
    ) -> Result<()>;

    /// Solve `A x = b` in place with LU and partial pivoting.
    ///
    /// `a` is overwritten with its factors, `pivots[i]` records the row of
    /// `A` moved to position `i`, and `b` is overwritten with the solution.
    fn gesv<T: NetiScalar>(&self, m: usize, a: &mut [T], pivots: &mut [usize], b: &mut [T]) -> Result<()>;
}
