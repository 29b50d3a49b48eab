//! Krylov approximation of `cos(dt * sqrt(A)) * b`.
//!
//! With `A V = V H` on the Krylov basis, `f(A) b ≈ s V f(H) e₁` where
//! `s = ‖b‖`. The small matrix function is evaluated through the real
//! eigendecomposition `H = X B X⁻¹`:
//!
//! ```text
//! f(H) e₁ = X f(B) y,   X y = e₁
//! ```
//!
//! `B` is block diagonal with 1x1 blocks for real eigenvalues and 2x2 blocks
//! `[[a, b], [-b, a]]` for complex pairs `a ± ib`, so `f(B)` is applied block
//! by block without leaving real arithmetic.

use log::debug;
use neti_core::NetiScalar;
use num_complex::Complex;

use crate::config::NetiConfig;
use crate::device::Device;
use crate::error::{NetiError, Result};
use crate::krylov::{KrylovBasisBuilder, KrylovOperator, KrylovOutcome};
use crate::workspace::SpectralBuffers;

/// Result of one function evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvaluationOutcome {
    /// The Krylov approximation was evaluated on a basis of `krylov_dim` vectors.
    Evaluated { krylov_dim: usize, seed_norm: f64 },
    /// The seed was exactly zero; the result is the zero vector.
    DegenerateSeed,
}

impl EvaluationOutcome {
    pub fn is_degenerate(&self) -> bool {
        matches!(self, EvaluationOutcome::DegenerateSeed)
    }
}

/// `cos(dt * sqrt(λ))` for a possibly complex eigenvalue.
///
/// The function is entire in `λ`, so the branch of the square root does not
/// matter. Real negative eigenvalues give `cosh(dt * sqrt(-λ))`.
pub fn cos_sqrt<T: NetiScalar>(lambda: Complex<T>, dt: T) -> Complex<T> {
    let zero = T::zero();
    let half = T::from_f64_lossy(0.5);

    if lambda.im == zero {
        let re = lambda.re;
        let value = if re >= zero {
            (dt * re.sqrt()).cos()
        } else {
            (dt * (-re).sqrt()).cosh()
        };
        return Complex::new(value, zero);
    }

    let modulus = lambda.norm_sqr().sqrt();
    let root_re = ((modulus + lambda.re) * half).sqrt();
    let root_im = ((modulus - lambda.re) * half).sqrt();
    let root_im = if lambda.im < zero { -root_im } else { root_im };

    let x = dt * root_re;
    let y = dt * root_im;
    Complex::new(x.cos() * y.cosh(), -(x.sin() * y.sinh()))
}

/// Evaluates `cos(dt * sqrt(A)) * b` on a Krylov subspace.
#[derive(Debug, Clone)]
pub struct SpectralFunctionEvaluator<'d, D> {
    builder: KrylovBasisBuilder<'d, D>,
}

impl<'d, D: Device> SpectralFunctionEvaluator<'d, D> {
    pub fn new(device: &'d D, krylov_dim: usize, config: &NetiConfig) -> Self {
        Self {
            builder: KrylovBasisBuilder::from_config(device, krylov_dim, config),
        }
    }

    pub fn krylov_dim(&self) -> usize {
        self.builder.krylov_dim()
    }

    /// Write `cos(dt * sqrt(A)) * seed` into `out`.
    ///
    /// `seed` is used as scratch and does not survive the call. `out` must
    /// not alias any of the `buffers`.
    pub fn evaluate<T: NetiScalar>(
        &self,
        op: &KrylovOperator<'_, T>,
        seed: &mut [T],
        dt: T,
        buffers: &mut SpectralBuffers<'_, T>,
        out: &mut [T],
    ) -> Result<EvaluationOutcome> {
        let device = self.builder.device();
        let d = op.dim();
        if out.len() != d {
            return Err(NetiError::DimensionMismatch {
                what: "evaluation output",
                expected: d,
                actual: out.len(),
            });
        }

        let outcome = self
            .builder
            .build(op, seed, out, buffers.basis, buffers.hessenberg)?;
        let (k, seed_norm) = match outcome {
            KrylovOutcome::Degenerate => {
                debug!("degenerate seed, evaluation is zero");
                device.fill(T::zero(), out);
                return Ok(EvaluationOutcome::DegenerateSeed);
            }
            KrylovOutcome::Built { dim, seed_norm, .. } => (dim, seed_norm),
        };

        let eigvecs = &mut buffers.eigvecs[..k * k];
        let eig_re = &mut buffers.eig_re[..k];
        let eig_im = &mut buffers.eig_im[..k];
        device.geev(
            k,
            &mut buffers.hessenberg[..k * k],
            eig_re,
            eig_im,
            eigvecs,
            buffers.eig_work,
        )?;

        let lu = &mut buffers.lu[..k * k];
        let coords = &mut buffers.coords[..k];
        device.copy(eigvecs, lu);
        device.fill(T::zero(), coords);
        coords[0] = T::one();
        device.gesv(k, lu, &mut buffers.pivots[..k], coords)?;

        apply_block_function(eig_re, eig_im, dt, coords)?;

        let reduced = &mut buffers.eig_work[..k];
        device.gemv(T::one(), eigvecs, k, k, coords, T::zero(), reduced);
        device.gemv(seed_norm, &buffers.basis[..d * k], d, k, reduced, T::zero(), out);

        debug!(
            "evaluated cos(dt sqrt A) on {} Krylov vectors, seed norm {:e}",
            k,
            seed_norm.to_f64_lossy()
        );
        Ok(EvaluationOutcome::Evaluated {
            krylov_dim: k,
            seed_norm: seed_norm.to_f64_lossy(),
        })
    }
}

/// y <- f(B) y for the block diagonal eigenvalue matrix `B`.
fn apply_block_function<T: NetiScalar>(wr: &[T], wi: &[T], dt: T, y: &mut [T]) -> Result<()> {
    let k = y.len();
    let mut i = 0;
    while i < k {
        if wi[i] == T::zero() {
            y[i] *= cos_sqrt(Complex::new(wr[i], T::zero()), dt).re;
            i += 1;
            continue;
        }
        if i + 1 >= k {
            return Err(NetiError::EigenDecompositionFailed { dim: k });
        }
        let f = cos_sqrt(Complex::new(wr[i], wi[i]), dt);
        let (u, w) = (y[i], y[i + 1]);
        y[i] = f.re * u + f.im * w;
        y[i + 1] = f.re * w - f.im * u;
        i += 2;
    }
    Ok(())
}
