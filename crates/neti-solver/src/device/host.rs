//! CPU implementation of the device primitives.

use faer::sparse::linalg::matmul::dense_sparse_matmul;
use faer::{Accum, MatMut, MatRef, Par};
use neti_core::{CsrMatrix, NetiScalar};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::Device;
use super::dense::{lu_solve, real_eigen};
use crate::error::{NetiError, Result};

/// Blocking factor reported for the eigendecomposition work region.
pub const DEFAULT_EIG_BLOCK_SIZE: usize = 32;

/// Iteration cap for the Schur reduction.
pub const DEFAULT_MAX_SCHUR_ITERATIONS: usize = 10_000;

/// Row count from which `spmv` runs row-parallel (with the `parallel` feature).
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Host device configuration.
#[derive(Debug, Clone)]
pub struct HostDeviceConfig {
    /// Blocking factor `nb` reported by [`Device::eig_block_size`].
    pub eig_block_size: usize,
    /// Maximum number of Schur iterations before the eigendecomposition fails.
    pub max_schur_iterations: usize,
    /// Minimum number of rows for a parallel sparse product.
    pub parallel_threshold: usize,
}

impl Default for HostDeviceConfig {
    fn default() -> Self {
        Self {
            eig_block_size: DEFAULT_EIG_BLOCK_SIZE,
            max_schur_iterations: DEFAULT_MAX_SCHUR_ITERATIONS,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl HostDeviceConfig {
    /// Set the reported eigendecomposition blocking factor (clamped to >= 1).
    pub fn with_eig_block_size(mut self, nb: usize) -> Self {
        self.eig_block_size = nb.max(1);
        self
    }

    /// Set the Schur iteration cap.
    pub fn with_max_schur_iterations(mut self, iterations: usize) -> Self {
        self.max_schur_iterations = iterations;
        self
    }

    /// Set the parallel `spmv` row threshold.
    pub fn with_parallel_threshold(mut self, rows: usize) -> Self {
        self.parallel_threshold = rows;
        self
    }
}

/// Device that runs every primitive on the calling thread's CPU.
#[derive(Debug, Clone, Default)]
pub struct HostDevice {
    config: HostDeviceConfig,
}

impl HostDevice {
    /// Create a host device with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    pub fn with_config(config: HostDeviceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HostDeviceConfig {
        &self.config
    }
}

#[cfg(feature = "parallel")]
#[inline]
fn csr_row_dot<T: NetiScalar>(a: &CsrMatrix<T>, row: usize, x: &[T]) -> T {
    let (cols, vals) = a.row(row);
    cols.iter()
        .zip(vals)
        .fold(T::zero(), |acc, (&c, &v)| acc + v * x[c])
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "host"
    }

    fn spmv<T: NetiScalar>(&self, alpha: T, a: &CsrMatrix<T>, x: &[T], beta: T, y: &mut [T]) {
        debug_assert_eq!(x.len(), a.ncols());
        debug_assert_eq!(y.len(), a.nrows());

        #[cfg(feature = "parallel")]
        {
            if a.nrows() >= self.config.parallel_threshold {
                y.par_iter_mut().enumerate().for_each(|(row, yi)| {
                    let ax = csr_row_dot(a, row, x);
                    *yi = if beta == T::zero() {
                        alpha * ax
                    } else {
                        alpha * ax + beta * *yi
                    };
                });
                return;
            }
        }

        // y^T = x^T A^T, with A^T viewed column-major over the CSR arrays.
        let accum = if beta == T::zero() {
            Accum::Replace
        } else {
            self.scal(beta, y);
            Accum::Add
        };
        let nrows = a.nrows();
        dense_sparse_matmul(
            MatMut::from_column_major_slice_mut(y, 1, nrows),
            accum,
            MatRef::from_column_major_slice(x, 1, a.ncols()),
            a.as_faer().transpose(),
            alpha,
            Par::Seq,
        );
    }

    fn dot<T: NetiScalar>(&self, x: &[T], y: &[T]) -> T {
        debug_assert_eq!(x.len(), y.len());
        x.iter()
            .zip(y)
            .fold(T::zero(), |acc, (&xi, &yi)| acc + xi * yi)
    }

    fn nrm2<T: NetiScalar>(&self, x: &[T]) -> T {
        // Scale by the largest magnitude so the squares neither underflow
        // nor overflow.
        let mut scale = T::zero();
        for &xi in x {
            let magnitude = xi.abs();
            if !magnitude.is_finite() {
                return magnitude;
            }
            if magnitude > scale {
                scale = magnitude;
            }
        }
        if scale == T::zero() {
            return T::zero();
        }
        let sum = x.iter().fold(T::zero(), |acc, &xi| {
            let ratio = xi / scale;
            acc + ratio * ratio
        });
        scale * sum.sqrt()
    }

    fn scal<T: NetiScalar>(&self, alpha: T, x: &mut [T]) {
        x.iter_mut().for_each(|xi| *xi *= alpha);
    }

    fn axpy<T: NetiScalar>(&self, alpha: T, x: &[T], y: &mut [T]) {
        debug_assert_eq!(x.len(), y.len());
        y.iter_mut().zip(x).for_each(|(yi, &xi)| *yi += alpha * xi);
    }

    fn copy<T: NetiScalar>(&self, x: &[T], y: &mut [T]) {
        y.copy_from_slice(x);
    }

    fn fill<T: NetiScalar>(&self, value: T, x: &mut [T]) {
        x.fill(value);
    }

    fn gemv<T: NetiScalar>(
        &self,
        alpha: T,
        a: &[T],
        rows: usize,
        cols: usize,
        x: &[T],
        beta: T,
        y: &mut [T],
    ) {
        debug_assert!(a.len() >= rows * cols);
        debug_assert_eq!(x.len(), cols);
        debug_assert_eq!(y.len(), rows);

        if beta == T::zero() {
            y.fill(T::zero());
        } else {
            self.scal(beta, y);
        }

        for (col, &xc) in x.iter().enumerate() {
            let scale = alpha * xc;
            if scale == T::zero() {
                continue;
            }
            let column = &a[col * rows..(col + 1) * rows];
            self.axpy(scale, column, y);
        }
    }

    fn eig_block_size(&self, _m: usize) -> usize {
        self.config.eig_block_size.max(1)
    }

    fn geev<T: NetiScalar>(
        &self,
        m: usize,
        h: &mut [T],
        wr: &mut [T],
        wi: &mut [T],
        vr: &mut [T],
        work: &mut [T],
    ) -> Result<()> {
        let required = (2 + 2 * self.eig_block_size(m)) * m;
        if work.len() < required {
            return Err(NetiError::WorkspaceTooSmall {
                region: "host",
                view: "eig_work",
                required,
                available: work.len(),
            });
        }

        real_eigen(m, h, self.config.max_schur_iterations, wr, wi, vr)?;
        // The input is consumed, as with the LAPACK driver.
        h[..m * m].fill(T::zero());
        Ok(())
    }

    fn gesv<T: NetiScalar>(&self, m: usize, a: &mut [T], pivots: &mut [usize], b: &mut [T]) -> Result<()> {
        lu_solve(m, a, pivots, b)
    }
}
