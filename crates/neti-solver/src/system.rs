//! The mechanical system and its two-slot position history.

use neti_core::{CsrMatrix, NetiScalar};

use crate::device::Device;
use crate::error::{NetiError, Result};

/// `M x'' + D x' + K x = f`, described by `invMass`, damping and stiffness.
///
/// The matrices are borrowed for the duration of the steps; assembly is the
/// caller's business.
#[derive(Debug, Clone, Copy)]
pub struct MechanicalSystem<'a, T> {
    inv_mass: &'a CsrMatrix<T>,
    damping: &'a CsrMatrix<T>,
    stiffness: &'a CsrMatrix<T>,
}

impl<'a, T: NetiScalar> MechanicalSystem<'a, T> {
    /// Validate that all three matrices are square and of the same order.
    pub fn new(
        inv_mass: &'a CsrMatrix<T>,
        damping: &'a CsrMatrix<T>,
        stiffness: &'a CsrMatrix<T>,
    ) -> Result<Self> {
        let ndof = stiffness.nrows();
        if ndof == 0 {
            return Err(NetiError::InvalidParameters(
                "system has no degrees of freedom".to_string(),
            ));
        }
        for (what, matrix) in [
            ("stiffness columns", stiffness),
            ("inverse mass", inv_mass),
            ("damping", damping),
        ] {
            if matrix.nrows() != ndof || matrix.ncols() != ndof {
                return Err(NetiError::DimensionMismatch {
                    what,
                    expected: ndof,
                    actual: if matrix.nrows() != ndof {
                        matrix.nrows()
                    } else {
                        matrix.ncols()
                    },
                });
            }
        }
        Ok(Self {
            inv_mass,
            damping,
            stiffness,
        })
    }

    pub fn ndof(&self) -> usize {
        self.stiffness.nrows()
    }

    pub fn inv_mass(&self) -> &'a CsrMatrix<T> {
        self.inv_mass
    }

    pub fn damping(&self) -> &'a CsrMatrix<T> {
        self.damping
    }

    pub fn stiffness(&self) -> &'a CsrMatrix<T> {
        self.stiffness
    }
}

/// Positions at the previous and the current time level.
///
/// Velocity is never stored; it is rederived from the pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionHistory<T> {
    pub old: Vec<T>,
    pub current: Vec<T>,
}

impl<T: NetiScalar> PositionHistory<T> {
    pub fn new(old: Vec<T>, current: Vec<T>) -> Result<Self> {
        if old.len() != current.len() {
            return Err(NetiError::DimensionMismatch {
                what: "old positions",
                expected: current.len(),
                actual: old.len(),
            });
        }
        Ok(Self { old, current })
    }

    /// History of a body held still at `x0`.
    pub fn at_rest(x0: Vec<T>) -> Self {
        Self {
            old: x0.clone(),
            current: x0,
        }
    }

    pub fn ndof(&self) -> usize {
        self.current.len()
    }

    /// Write the finite-difference velocity `(current - old) / dt` into `out`.
    pub fn velocity_into<D: Device>(&self, device: &D, dt: T, out: &mut [T]) {
        device.copy(&self.current, out);
        device.axpy(-T::one(), &self.old, out);
        device.scal(T::one() / dt, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;

    #[test]
    fn system_dimensions_validated() {
        let k = CsrMatrix::<f64>::identity(3);
        let d = CsrMatrix::<f64>::zeros(3);
        let bad = CsrMatrix::<f64>::identity(2);

        let system = MechanicalSystem::new(&k, &d, &k).unwrap();
        assert_eq!(system.ndof(), 3);

        assert!(matches!(
            MechanicalSystem::new(&bad, &d, &k),
            Err(NetiError::DimensionMismatch {
                what: "inverse mass",
                expected: 3,
                actual: 2
            })
        ));
        assert!(matches!(
            MechanicalSystem::new(&k, &bad, &k),
            Err(NetiError::DimensionMismatch { what: "damping", .. })
        ));
    }

    #[test]
    fn rectangular_stiffness_rejected() {
        let k = CsrMatrix::<f64>::from_triplets(2, 3, &[(0, 0, 1.0)]).unwrap();
        let m = CsrMatrix::<f64>::identity(2);
        assert!(MechanicalSystem::new(&m, &m, &k).is_err());
    }

    #[test]
    fn history_velocity() {
        let device = HostDevice::new();
        let history = PositionHistory::new(vec![1.0_f64, 2.0], vec![1.5_f64, 1.0]).unwrap();
        let mut v = vec![f64::NAN; 2];
        history.velocity_into(&device, 0.5, &mut v);
        assert!((v[0] - 1.0).abs() < 1e-15);
        assert!((v[1] + 2.0).abs() < 1e-15);

        let rest = PositionHistory::at_rest(vec![3.0_f32; 4]);
        assert_eq!(rest.ndof(), 4);
        let mut v = vec![1.0_f32; 4];
        rest.velocity_into(&device, 0.1, &mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn history_lengths_checked() {
        assert!(PositionHistory::new(vec![0.0; 2], vec![0.0; 3]).is_err());
    }
}
