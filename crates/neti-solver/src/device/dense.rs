//! Dense kernels behind the host device: real eigendecomposition and the
//! pivoted LU solve.

use nalgebra::linalg::{LU, Schur};
use nalgebra::{DMatrix, DVector};
use neti_core::NetiScalar;
use num_complex::Complex;

use crate::error::{NetiError, Result};

/// Eigendecomposition of a general `m` x `m` column-major matrix.
///
/// Reduces to real Schur form `H = Q T Q^T`, then back-substitutes the
/// quasi-triangular `T` block by block for each eigenvector. Output layout
/// is described on [`Device::geev`](super::Device::geev).
pub(crate) fn real_eigen<T: NetiScalar>(
    m: usize,
    h: &[T],
    max_iterations: usize,
    wr: &mut [T],
    wi: &mut [T],
    vr: &mut [T],
) -> Result<()> {
    let failed = || NetiError::EigenDecompositionFailed { dim: m };
    let h = &h[..m * m];
    if h.iter().any(|v| !v.is_finite()) {
        return Err(failed());
    }

    if m == 1 {
        wr[0] = h[0];
        wi[0] = T::zero();
        vr[0] = T::one();
        return Ok(());
    }

    let eps = T::machine_epsilon();
    let schur = Schur::try_new(DMatrix::from_column_slice(m, m, h), eps, max_iterations)
        .ok_or_else(failed)?;
    let (q, t) = schur.unpack();

    let t_norm = t.iter().fold(T::zero(), |acc, v| acc.max(v.abs()));
    let smin = if t_norm > T::zero() { eps * t_norm } else { eps };

    let blocks = diagonal_blocks(&t, eps);
    let zero = Complex::new(T::zero(), T::zero());
    let mut x = vec![zero; m];

    for (index, &(start, size)) in blocks.iter().enumerate() {
        let lambdas = block_eigenvalues(&t, start, size);
        for (offset, &lambda) in lambdas.iter().enumerate() {
            let y = block_eigenvector(&t, &blocks, index, lambda, smin);

            x.iter_mut().for_each(|xi| *xi = zero);
            for (col, &yc) in y.iter().enumerate().take(start + size) {
                if yc == zero {
                    continue;
                }
                for (row, xi) in x.iter_mut().enumerate() {
                    *xi = *xi + yc * q[(row, col)];
                }
            }
            let norm = x.iter().fold(T::zero(), |acc, xi| acc + xi.norm_sqr()).sqrt();
            if !norm.is_finite() || norm == T::zero() {
                return Err(failed());
            }
            let inv = T::one() / norm;

            if lambda.im > T::zero() {
                // Complex pair: real part in `start`, imaginary part in `start + 1`.
                for (row, xi) in x.iter().enumerate() {
                    vr[row + start * m] = xi.re * inv;
                    vr[row + (start + 1) * m] = xi.im * inv;
                }
                wr[start] = lambda.re;
                wr[start + 1] = lambda.re;
                wi[start] = lambda.im;
                wi[start + 1] = -lambda.im;
            } else {
                let col = start + offset;
                for (row, xi) in x.iter().enumerate() {
                    vr[row + col * m] = xi.re * inv;
                }
                wr[col] = lambda.re;
                wi[col] = T::zero();
            }
        }
    }

    Ok(())
}

/// Split a quasi-triangular matrix into 1x1 and 2x2 diagonal blocks.
fn diagonal_blocks<T: NetiScalar>(t: &DMatrix<T>, eps: T) -> Vec<(usize, usize)> {
    let m = t.nrows();
    let mut blocks = Vec::with_capacity(m);
    let mut i = 0;
    while i < m {
        let coupled = i + 1 < m
            && t[(i + 1, i)].abs() > eps * (t[(i, i)].abs() + t[(i + 1, i + 1)].abs());
        if coupled {
            blocks.push((i, 2));
            i += 2;
        } else {
            blocks.push((i, 1));
            i += 1;
        }
    }
    blocks
}

/// Eigenvalues of one diagonal block.
///
/// A 2x2 block with a complex pair yields only the eigenvalue with positive
/// imaginary part; its conjugate shares the eigenvector storage.
fn block_eigenvalues<T: NetiScalar>(t: &DMatrix<T>, start: usize, size: usize) -> Vec<Complex<T>> {
    if size == 1 {
        return vec![Complex::new(t[(start, start)], T::zero())];
    }

    let two = T::one() + T::one();
    let a = t[(start, start)];
    let b = t[(start, start + 1)];
    let c = t[(start + 1, start)];
    let d = t[(start + 1, start + 1)];
    let half_trace = (a + d) / two;
    let half_gap = (a - d) / two;
    let disc = half_gap * half_gap + b * c;

    if disc < T::zero() {
        vec![Complex::new(half_trace, (-disc).sqrt())]
    } else {
        let root = disc.sqrt();
        vec![
            Complex::new(half_trace + root, T::zero()),
            Complex::new(half_trace - root, T::zero()),
        ]
    }
}

/// Solve `(T - lambda I) y = 0` for the eigenvector belonging to block `index`.
fn block_eigenvector<T: NetiScalar>(
    t: &DMatrix<T>,
    blocks: &[(usize, usize)],
    index: usize,
    lambda: Complex<T>,
    smin: T,
) -> Vec<Complex<T>> {
    let m = t.nrows();
    let zero = Complex::new(T::zero(), T::zero());
    let mut y = vec![zero; m];

    let (start, size) = blocks[index];
    let end = start + size;
    if size == 1 {
        y[start] = Complex::new(T::one(), T::zero());
    } else {
        let a = t[(start, start)];
        let b = t[(start, start + 1)];
        let c = t[(start + 1, start)];
        let d = t[(start + 1, start + 1)];
        if b.abs() >= c.abs() {
            y[start] = Complex::new(b, T::zero());
            y[start + 1] = lambda - a;
        } else {
            y[start] = lambda - d;
            y[start + 1] = Complex::new(c, T::zero());
        }
    }

    for &(row, rsize) in blocks[..index].iter().rev() {
        let mut rhs = [zero; 2];
        for (r, slot) in rhs.iter_mut().enumerate().take(rsize) {
            let mut acc = zero;
            for (col, &yc) in y.iter().enumerate().take(end).skip(row + rsize) {
                acc = acc + yc * t[(row + r, col)];
            }
            *slot = -acc;
        }

        if rsize == 1 {
            let denom = guard_pivot(Complex::new(t[(row, row)], T::zero()) - lambda, smin);
            y[row] = rhs[0] / denom;
        } else {
            let a = Complex::new(t[(row, row)], T::zero()) - lambda;
            let b = t[(row, row + 1)];
            let c = t[(row + 1, row)];
            let d = Complex::new(t[(row + 1, row + 1)], T::zero()) - lambda;
            let det = guard_pivot(a * d - Complex::new(b * c, T::zero()), smin);
            y[row] = (rhs[0] * d - rhs[1] * b) / det;
            y[row + 1] = (a * rhs[1] - rhs[0] * c) / det;
        }
    }

    y
}

/// Replace a vanishing pivot with `smin` so repeated eigenvalues stay finite.
fn guard_pivot<T: NetiScalar>(z: Complex<T>, smin: T) -> Complex<T> {
    if z.norm_sqr() < smin * smin {
        Complex::new(smin, T::zero())
    } else {
        z
    }
}

/// Solve `A x = b` in place through nalgebra's partial-pivot LU.
///
/// A diagonal entry of `U` at or below `eps * max|A|` is reported as
/// singular. On success `a` holds the packed factors (unit `L` strictly below
/// the diagonal, `U` on and above it) and `pivots[i]` is the row of `A` that
/// was moved to position `i`.
pub(crate) fn lu_solve<T: NetiScalar>(
    m: usize,
    a: &mut [T],
    pivots: &mut [usize],
    b: &mut [T],
) -> Result<()> {
    let a = &mut a[..m * m];
    let b = &mut b[..m];
    let a_norm = a.iter().fold(T::zero(), |acc, v| acc.max(v.abs()));
    let tol = T::machine_epsilon() * a_norm;

    let lu = LU::new(DMatrix::from_column_slice(m, m, a));
    let u = lu.u();
    for k in 0..m {
        let pivot = u[(k, k)].abs();
        if !pivot.is_finite() || pivot <= tol || pivot == T::zero() {
            return Err(NetiError::LinearSolveSingular { pivot: k });
        }
    }

    let mut x = DVector::from_column_slice(b);
    if !lu.solve_mut(&mut x) {
        let pivot = (0..m).find(|&k| u[(k, k)] == T::zero()).unwrap_or(0);
        return Err(NetiError::LinearSolveSingular { pivot });
    }
    b.copy_from_slice(x.as_slice());

    let l = lu.l();
    for j in 0..m {
        for i in 0..m {
            a[i + j * m] = if i > j { l[(i, j)] } else { u[(i, j)] };
        }
    }

    let mut order = DVector::from_fn(m, |i, _| i);
    lu.p().permute_rows(&mut order);
    pivots[..m].copy_from_slice(order.as_slice());

    Ok(())
}
