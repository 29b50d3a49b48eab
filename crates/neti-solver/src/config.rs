//! Integrator configuration.

use neti_core::NetiScalar;

use crate::error::{NetiError, Result};

/// What to do when the Krylov residual vanishes before the basis is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakdownPolicy {
    /// Stop at the invariant subspace and evaluate on the shorter basis.
    #[default]
    Truncate,
    /// Abort the step with [`NetiError::KrylovBreakdown`].
    Fail,
}

/// NETI step configuration.
#[derive(Debug, Clone)]
pub struct NetiConfig {
    /// Krylov subspace dimension `m`.
    pub krylov_dim: usize,
    /// Clamp `krylov_dim` into `[1, ndof]` instead of rejecting it.
    pub clamp_krylov_dim: bool,
    /// Relative residual below which the Arnoldi process is considered broken down.
    pub breakdown_tolerance: f64,
    /// Reaction to a breakdown.
    pub breakdown_policy: BreakdownPolicy,
}

impl Default for NetiConfig {
    fn default() -> Self {
        Self {
            krylov_dim: 10,
            clamp_krylov_dim: false,
            breakdown_tolerance: 1e-12,
            breakdown_policy: BreakdownPolicy::Truncate,
        }
    }
}

impl NetiConfig {
    /// Configuration with the given Krylov dimension and defaults otherwise.
    pub fn with_krylov_dim(mut self, krylov_dim: usize) -> Self {
        self.krylov_dim = krylov_dim;
        self
    }

    /// Set whether out-of-range Krylov dimensions are clamped.
    pub fn with_clamped_krylov_dim(mut self, clamp: bool) -> Self {
        self.clamp_krylov_dim = clamp;
        self
    }

    /// Set the relative breakdown tolerance.
    pub fn with_breakdown_tolerance(mut self, tolerance: f64) -> Self {
        self.breakdown_tolerance = tolerance;
        self
    }

    /// Set the breakdown policy.
    pub fn with_breakdown_policy(mut self, policy: BreakdownPolicy) -> Self {
        self.breakdown_policy = policy;
        self
    }

    /// Krylov dimension to use for a system with `ndof` degrees of freedom.
    pub fn krylov_dim_for(&self, ndof: usize) -> Result<usize> {
        if ndof == 0 {
            return Err(NetiError::InvalidParameters(
                "system has no degrees of freedom".to_string(),
            ));
        }
        if self.clamp_krylov_dim {
            return Ok(self.krylov_dim.clamp(1, ndof));
        }
        if self.krylov_dim == 0 || self.krylov_dim > ndof {
            return Err(NetiError::InvalidParameters(format!(
                "Krylov dimension {} outside [1, {}]",
                self.krylov_dim, ndof
            )));
        }
        Ok(self.krylov_dim)
    }

    /// Breakdown tolerance in the working precision, never below 16 epsilons.
    pub fn effective_tolerance<T: NetiScalar>(&self) -> T {
        let floor = T::machine_epsilon() * T::from_f64_lossy(16.0);
        let requested = T::from_f64_lossy(self.breakdown_tolerance);
        if requested > floor { requested } else { floor }
    }
}
