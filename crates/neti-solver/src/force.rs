//! Driving vector of the forced response.

use neti_core::{CsrMatrix, NetiScalar};

use crate::device::Device;
use crate::error::{NetiError, Result};
use crate::system::PositionHistory;

/// Combines damping and external load into the seed of the forced response:
///
/// ```text
/// velocity = (current - old) / dt
/// drive    = Damping * velocity + force
/// ```
///
/// The load enters with the sign of the damping force.
#[derive(Debug, Clone, Copy)]
pub struct EquivalentForceComputer<'a, T> {
    damping: &'a CsrMatrix<T>,
    force: &'a [T],
}

impl<'a, T: NetiScalar> EquivalentForceComputer<'a, T> {
    pub fn new(damping: &'a CsrMatrix<T>, force: &'a [T]) -> Result<Self> {
        if force.len() != damping.nrows() {
            return Err(NetiError::DimensionMismatch {
                what: "force vector",
                expected: damping.nrows(),
                actual: force.len(),
            });
        }
        Ok(Self { damping, force })
    }

    /// Fill `velocity` with the history's finite-difference velocity and
    /// `out` with the driving vector.
    pub fn compute<D: Device>(
        &self,
        device: &D,
        history: &PositionHistory<T>,
        dt: T,
        velocity: &mut [T],
        out: &mut [T],
    ) {
        history.velocity_into(device, dt, velocity);

        device.copy(self.force, out);
        device.spmv(T::one(), self.damping, velocity, T::one(), out);
    }
}
