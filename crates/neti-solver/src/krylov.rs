//! Arnoldi construction of the Krylov basis of `A = invMass * Stiffness`.
//!
//! The builder writes an orthonormal basis `V` (column-major, `d` x `m`) and
//! the upper Hessenberg projection `H = Vᵀ A V` (column-major, `m` x `m`)
//! into caller-provided buffers. `A` is never formed: each column costs two
//! sparse products through the [`Device`].

use log::{trace, warn};
use neti_core::{CsrMatrix, NetiScalar};

use crate::config::{BreakdownPolicy, NetiConfig};
use crate::device::Device;
use crate::error::{NetiError, Result};

/// The operator `A = invMass * Stiffness`, applied as two sparse products.
#[derive(Debug, Clone, Copy)]
pub struct KrylovOperator<'a, T> {
    pub stiffness: &'a CsrMatrix<T>,
    pub inv_mass: &'a CsrMatrix<T>,
}

impl<'a, T: NetiScalar> KrylovOperator<'a, T> {
    pub fn new(stiffness: &'a CsrMatrix<T>, inv_mass: &'a CsrMatrix<T>) -> Self {
        Self {
            stiffness,
            inv_mass,
        }
    }

    /// Order of the operator.
    pub fn dim(&self) -> usize {
        self.stiffness.nrows()
    }

    /// y = invMass * (Stiffness * x), with `temp` holding the intermediate.
    pub fn apply<D: Device>(&self, device: &D, x: &[T], temp: &mut [T], y: &mut [T]) {
        device.spmv(T::one(), self.stiffness, x, T::zero(), temp);
        device.spmv(T::one(), self.inv_mass, temp, T::zero(), y);
    }
}

/// Result of a basis construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KrylovOutcome<T> {
    /// The seed has zero norm. Nothing was written.
    Degenerate,
    /// A basis of `dim` vectors and a `dim` x `dim` Hessenberg matrix.
    Built {
        dim: usize,
        seed_norm: T,
        /// Number of vectors at which the residual vanished, if it did.
        breakdown: Option<usize>,
    },
}

/// Arnoldi process with modified Gram-Schmidt.
#[derive(Debug, Clone)]
pub struct KrylovBasisBuilder<'d, D> {
    device: &'d D,
    krylov_dim: usize,
    tolerance: f64,
    policy: BreakdownPolicy,
}

impl<'d, D: Device> KrylovBasisBuilder<'d, D> {
    /// Builder for `krylov_dim` vectors with default breakdown handling.
    pub fn new(device: &'d D, krylov_dim: usize) -> Self {
        let defaults = NetiConfig::default();
        Self {
            device,
            krylov_dim,
            tolerance: defaults.breakdown_tolerance,
            policy: defaults.breakdown_policy,
        }
    }

    /// Builder taking its breakdown handling from `config`.
    pub fn from_config(device: &'d D, krylov_dim: usize, config: &NetiConfig) -> Self {
        Self {
            device,
            krylov_dim,
            tolerance: config.breakdown_tolerance,
            policy: config.breakdown_policy,
        }
    }

    pub fn krylov_dim(&self) -> usize {
        self.krylov_dim
    }

    pub fn device(&self) -> &'d D {
        self.device
    }

    /// Build the basis of `span{b, Ab, ..., A^(m-1) b}` for the seed `b`.
    ///
    /// `seed` is consumed: after its norm is taken it serves as the
    /// intermediate of the two sparse products. `scratch` (length `d`)
    /// receives the discarded residual of the last column. On return the
    /// Hessenberg matrix occupies the leading `dim * dim` entries of
    /// `hessenberg`, stored with leading dimension `dim`.
    pub fn build<T: NetiScalar>(
        &self,
        op: &KrylovOperator<'_, T>,
        seed: &mut [T],
        scratch: &mut [T],
        basis: &mut [T],
        hessenberg: &mut [T],
    ) -> Result<KrylovOutcome<T>> {
        let d = op.dim();
        let m = self.krylov_dim;
        check_len("seed", d, seed.len())?;
        check_len("krylov scratch", d, scratch.len())?;
        check_len("basis", d * m, basis.len())?;
        check_len("hessenberg", m * m, hessenberg.len())?;
        if m == 0 || m > d {
            return Err(NetiError::InvalidParameters(format!(
                "Krylov dimension {} outside [1, {}]",
                m, d
            )));
        }

        let device = self.device;
        let seed = &mut seed[..d];
        let seed_norm = device.nrm2(seed);
        if !seed_norm.is_finite() {
            return Err(NetiError::InvalidParameters(
                "seed vector is not finite".to_string(),
            ));
        }
        if seed_norm == T::zero() {
            return Ok(KrylovOutcome::Degenerate);
        }

        let tolerance = effective_tolerance::<T>(self.tolerance);
        let hessenberg = &mut hessenberg[..m * m];
        device.fill(T::zero(), hessenberg);

        device.copy(seed, &mut basis[..d]);
        let inv_norm = T::one() / seed_norm;
        if inv_norm.is_finite() {
            device.scal(inv_norm, &mut basis[..d]);
        } else {
            // Subnormal norm: the reciprocal overflows.
            basis[..d].iter_mut().for_each(|v| *v /= seed_norm);
        }

        for k in 0..m {
            let (built, rest) = basis.split_at_mut((k + 1) * d);
            let w: &mut [T] = if k + 1 < m {
                &mut rest[..d]
            } else {
                &mut scratch[..d]
            };

            op.apply(device, &built[k * d..], seed, w);
            let image_norm = device.nrm2(w);

            for j in 0..=k {
                let v_j = &built[j * d..(j + 1) * d];
                let h = device.dot(v_j, w);
                hessenberg[j + k * m] = h;
                device.axpy(-h, v_j, w);
            }

            if k + 1 == m {
                break;
            }

            let residual = device.nrm2(w);
            trace!(
                "arnoldi column {}: |Av| = {:e}, residual = {:e}",
                k,
                image_norm.to_f64_lossy(),
                residual.to_f64_lossy()
            );

            if residual <= tolerance * image_norm {
                let dim = k + 1;
                return match self.policy {
                    BreakdownPolicy::Fail => Err(NetiError::KrylovBreakdown {
                        step: dim,
                        residual: residual.to_f64_lossy(),
                    }),
                    BreakdownPolicy::Truncate => {
                        warn!(
                            "Krylov breakdown after {} of {} vectors, truncating basis",
                            dim, m
                        );
                        compact_leading_block(hessenberg, m, dim);
                        Ok(KrylovOutcome::Built {
                            dim,
                            seed_norm,
                            breakdown: Some(dim),
                        })
                    }
                };
            }

            hessenberg[k + 1 + k * m] = residual;
            device.scal(T::one() / residual, w);
        }

        Ok(KrylovOutcome::Built {
            dim: m,
            seed_norm,
            breakdown: None,
        })
    }
}

fn effective_tolerance<T: NetiScalar>(requested: f64) -> T {
    NetiConfig::default()
        .with_breakdown_tolerance(requested)
        .effective_tolerance()
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(NetiError::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Repack the leading `dim` x `dim` block of an `m` x `m` column-major matrix
/// with leading dimension `dim`.
fn compact_leading_block<T: Copy>(h: &mut [T], m: usize, dim: usize) {
    for col in 1..dim {
        h.copy_within(col * m..col * m + dim, col * dim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;

    fn spring_chain(n: usize) -> CsrMatrix<f64> {
        let mut triplets = Vec::new();
        for i in 0..n {
            triplets.push((i, i, 2.0));
            if i > 0 {
                triplets.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                triplets.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_triplets(n, n, &triplets).unwrap()
    }

    fn inv_masses(n: usize) -> CsrMatrix<f64> {
        let diag: Vec<f64> = (0..n).map(|i| 1.0 / (1.0 + 0.5 * i as f64)).collect();
        CsrMatrix::from_diagonal(&diag)
    }

    struct Buffers {
        seed: Vec<f64>,
        scratch: Vec<f64>,
        basis: Vec<f64>,
        hessenberg: Vec<f64>,
    }

    fn buffers(d: usize, m: usize, seed: Vec<f64>) -> Buffers {
        Buffers {
            seed,
            scratch: vec![0.0; d],
            basis: vec![0.0; d * m],
            hessenberg: vec![0.0; m * m],
        }
    }

    fn run(
        builder: &KrylovBasisBuilder<'_, HostDevice>,
        op: &KrylovOperator<'_, f64>,
        b: &mut Buffers,
    ) -> Result<KrylovOutcome<f64>> {
        builder.build(op, &mut b.seed, &mut b.scratch, &mut b.basis, &mut b.hessenberg)
    }

    #[test]
    fn basis_is_orthonormal() {
        let n = 12;
        let m = 6;
        let stiffness = spring_chain(n);
        let inv_mass = inv_masses(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, m);

        let seed: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 0.1).collect();
        let mut b = buffers(n, m, seed);
        let outcome = run(&builder, &op, &mut b).unwrap();
        assert!(matches!(outcome, KrylovOutcome::Built { dim: 6, breakdown: None, .. }));

        for k in 1..=m {
            for i in 0..k {
                for j in 0..k {
                    let vi = &b.basis[i * n..(i + 1) * n];
                    let vj = &b.basis[j * n..(j + 1) * n];
                    let dot: f64 = vi.iter().zip(vj).map(|(x, y)| x * y).sum();
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!(
                        (dot - expected).abs() < 1e-12,
                        "prefix {}: <v{}, v{}> = {}",
                        k,
                        i,
                        j,
                        dot
                    );
                }
            }
        }
    }

    #[test]
    fn hessenberg_satisfies_arnoldi_relation() {
        let n = 8;
        let m = 5;
        let stiffness = spring_chain(n);
        let inv_mass = inv_masses(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, m);

        let seed: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
        let mut b = buffers(n, m, seed);
        run(&builder, &op, &mut b).unwrap();

        // Below the subdiagonal everything is zero.
        for col in 0..m {
            for row in (col + 2)..m {
                assert_eq!(b.hessenberg[row + col * m], 0.0);
            }
        }

        // A v_k = sum_j H[j, k] v_j for every column with a stored residual.
        let a = inv_mass.to_dense() * stiffness.to_dense();
        for k in 0..m - 1 {
            let v_k = nalgebra::DVector::from_column_slice(&b.basis[k * n..(k + 1) * n]);
            let av = &a * v_k;
            let mut recon = nalgebra::DVector::zeros(n);
            for j in 0..=k + 1 {
                let v_j = nalgebra::DVector::from_column_slice(&b.basis[j * n..(j + 1) * n]);
                recon += v_j * b.hessenberg[j + k * m];
            }
            assert!(
                (&av - &recon).norm() < 1e-12,
                "column {} residual {}",
                k,
                (&av - &recon).norm()
            );
        }
    }

    #[test]
    fn degenerate_seed_writes_nothing() {
        let n = 4;
        let m = 2;
        let stiffness = spring_chain(n);
        let inv_mass = inv_masses(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, m);

        let mut b = buffers(n, m, vec![0.0; n]);
        b.basis.fill(7.0);
        b.hessenberg.fill(-3.0);

        let outcome = run(&builder, &op, &mut b).unwrap();
        assert_eq!(outcome, KrylovOutcome::Degenerate);
        assert!(b.basis.iter().all(|&x| x == 7.0));
        assert!(b.hessenberg.iter().all(|&x| x == -3.0));
    }

    #[test]
    fn non_finite_seed_rejected() {
        let n = 3;
        let stiffness = spring_chain(n);
        let inv_mass = inv_masses(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, 2);

        let mut b = buffers(n, 2, vec![1.0, f64::NAN, 0.0]);
        assert!(matches!(
            run(&builder, &op, &mut b),
            Err(NetiError::InvalidParameters(_))
        ));
    }

    #[test]
    fn subnormal_seed_is_normalized() {
        let n = 2;
        let stiffness = CsrMatrix::from_diagonal(&[1.0, 2.0]);
        let inv_mass = CsrMatrix::identity(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, 1);

        let mut b = buffers(n, 1, vec![3e-310, 4e-310]);
        let outcome = run(&builder, &op, &mut b).unwrap();

        assert!(matches!(outcome, KrylovOutcome::Built { dim: 1, .. }));
        assert!((b.basis[0] - 0.6).abs() < 1e-12, "got {}", b.basis[0]);
        assert!((b.basis[1] - 0.8).abs() < 1e-12, "got {}", b.basis[1]);
    }

    #[test]
    fn breakdown_truncates_to_invariant_subspace() {
        // A = 3 I: every seed spans an invariant subspace of dimension one.
        let n = 5;
        let m = 3;
        let stiffness = CsrMatrix::from_diagonal(&[3.0; 5]);
        let inv_mass = CsrMatrix::identity(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, m);

        let mut b = buffers(n, m, vec![2.0, 0.0, 1.0, 0.0, 2.0]);
        let outcome = run(&builder, &op, &mut b).unwrap();

        match outcome {
            KrylovOutcome::Built {
                dim,
                seed_norm,
                breakdown,
            } => {
                assert_eq!(dim, 1);
                assert_eq!(breakdown, Some(1));
                assert!((seed_norm - 3.0).abs() < 1e-14);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!((b.hessenberg[0] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn breakdown_compacts_hessenberg() {
        // Block diagonal A with a seed confined to the first 2x2 block.
        let stiffness = CsrMatrix::from_triplets(
            4,
            4,
            &[(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 3.0), (2, 2, 5.0), (3, 3, 7.0)],
        )
        .unwrap();
        let inv_mass = CsrMatrix::identity(4);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, 4);

        let mut b = buffers(4, 4, vec![1.0, 0.0, 0.0, 0.0]);
        let outcome = run(&builder, &op, &mut b).unwrap();
        assert!(matches!(outcome, KrylovOutcome::Built { dim: 2, .. }));

        // v0 = e0, v1 = e1: H is the leading block of A itself.
        let h = &b.hessenberg[..4];
        let expected = [2.0, 1.0, 1.0, 3.0];
        for (got, want) in h.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-14, "H = {:?}", h);
        }
    }

    #[test]
    fn breakdown_fails_when_requested() {
        let n = 3;
        let stiffness = CsrMatrix::identity(n);
        let inv_mass = CsrMatrix::identity(n);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let config = NetiConfig::default().with_breakdown_policy(BreakdownPolicy::Fail);
        let builder = KrylovBasisBuilder::from_config(&device, 2, &config);

        let mut b = buffers(n, 2, vec![1.0, 1.0, 1.0]);
        assert!(matches!(
            run(&builder, &op, &mut b),
            Err(NetiError::KrylovBreakdown { step: 1, .. })
        ));
    }

    #[test]
    fn single_vector_basis() {
        let stiffness = CsrMatrix::from_diagonal(&[4.0_f32]);
        let inv_mass = CsrMatrix::identity(1);
        let op = KrylovOperator::new(&stiffness, &inv_mass);
        let device = HostDevice::new();
        let builder = KrylovBasisBuilder::new(&device, 1);

        let mut seed = vec![-2.0_f32];
        let mut scratch = vec![0.0_f32];
        let mut basis = vec![0.0_f32];
        let mut hessenberg = vec![0.0_f32];
        let outcome = builder
            .build(&op, &mut seed, &mut scratch, &mut basis, &mut hessenberg)
            .unwrap();

        assert!(matches!(outcome, KrylovOutcome::Built { dim: 1, .. }));
        assert!((basis[0] + 1.0).abs() < 1e-6);
        assert!((hessenberg[0] - 4.0).abs() < 1e-5);
    }
}
