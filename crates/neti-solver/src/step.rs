//! One NETI timestep.
//!
//! ```text
//! xc      = cos(dt sqrt(A)) * current                     (homogeneous)
//! xphi    = cos(dt sqrt(A)) * (D * velocity + f)          (forced)
//! new     = 2 xc - dt² invMass xphi - old
//! old     <- current
//! current <- new
//! ```
//!
//! Every check runs before the first write, and the history is written only
//! after both evaluations succeed, so a failed step leaves `old` and
//! `current` as they were.

use log::debug;
use neti_core::NetiScalar;

use crate::config::NetiConfig;
use crate::device::{Device, HostDevice};
use crate::error::{NetiError, Result};
use crate::force::EquivalentForceComputer;
use crate::krylov::KrylovOperator;
use crate::spectral::{EvaluationOutcome, SpectralFunctionEvaluator};
use crate::system::{MechanicalSystem, PositionHistory};
use crate::workspace::{Workspace, WorkspaceSizes};

/// What the two evaluations of a step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// Response to the current positions.
    pub homogeneous: EvaluationOutcome,
    /// Response to the damping and external load.
    pub forced: EvaluationOutcome,
}

/// Advances a [`MechanicalSystem`] with Krylov exponential time integration.
#[derive(Debug, Clone)]
pub struct NetiIntegrator<'d, D> {
    device: &'d D,
    config: NetiConfig,
}

impl<'d, D: Device> NetiIntegrator<'d, D> {
    pub fn new(device: &'d D, config: NetiConfig) -> Self {
        Self { device, config }
    }

    pub fn config(&self) -> &NetiConfig {
        &self.config
    }

    pub fn device(&self) -> &'d D {
        self.device
    }

    /// Krylov dimension used for `ndof` degrees of freedom.
    pub fn krylov_dim_for(&self, ndof: usize) -> Result<usize> {
        self.config.krylov_dim_for(ndof)
    }

    /// Workspace sizes a step on `ndof` degrees of freedom needs.
    pub fn workspace_sizes(&self, ndof: usize) -> Result<WorkspaceSizes> {
        let m = self.krylov_dim_for(ndof)?;
        Ok(WorkspaceSizes::compute(
            ndof,
            m,
            self.device.eig_block_size(m),
        ))
    }

    /// Allocate a workspace for `ndof` degrees of freedom.
    pub fn allocate_workspace<T: NetiScalar>(&self, ndof: usize) -> Result<Workspace<T>> {
        Ok(Workspace::allocate(&self.workspace_sizes(ndof)?))
    }

    /// Advance `history` by one step of length `dt` under the load `force`.
    pub fn step<T: NetiScalar>(
        &self,
        system: &MechanicalSystem<'_, T>,
        force: &[T],
        history: &mut PositionHistory<T>,
        workspace: &mut Workspace<T>,
        dt: T,
    ) -> Result<StepReport> {
        let device = self.device;
        let d = system.ndof();

        if !dt.is_finite() || dt <= T::zero() {
            return Err(NetiError::InvalidParameters(format!(
                "timestep must be positive and finite, got {}",
                dt.to_f64_lossy()
            )));
        }
        if history.current.len() != d {
            return Err(NetiError::DimensionMismatch {
                what: "current positions",
                expected: d,
                actual: history.current.len(),
            });
        }
        if history.old.len() != d {
            return Err(NetiError::DimensionMismatch {
                what: "old positions",
                expected: d,
                actual: history.old.len(),
            });
        }
        let forcing = EquivalentForceComputer::new(system.damping(), force)?;

        let m = self.krylov_dim_for(d)?;
        let nb = device.eig_block_size(m);
        workspace
            .sizes()
            .covers(&WorkspaceSizes::compute(d, m, nb))?;
        let mut scratch = workspace.carve(d, m, nb)?;

        let op = KrylovOperator::new(system.stiffness(), system.inv_mass());
        let evaluator = SpectralFunctionEvaluator::new(device, m, &self.config);

        device.copy(&history.current, scratch.drive);
        let homogeneous =
            evaluator.evaluate(&op, scratch.drive, dt, &mut scratch.spectral, scratch.xc)?;

        forcing.compute(device, history, dt, scratch.xphi, scratch.drive);
        let forced =
            evaluator.evaluate(&op, scratch.drive, dt, &mut scratch.spectral, scratch.xphi)?;

        let two = T::one() + T::one();
        device.spmv(-(dt * dt), system.inv_mass(), scratch.xphi, two, scratch.xc);
        device.axpy(-T::one(), &history.old, scratch.xc);

        device.copy(&history.current, &mut history.old);
        device.copy(scratch.xc, &mut history.current);

        debug!(
            "{} step on {}: ndof = {}, m = {}, homogeneous {:?}, forced {:?}",
            T::PRECISION,
            device.name(),
            d,
            m,
            homogeneous,
            forced
        );
        Ok(StepReport {
            homogeneous,
            forced,
        })
    }
}

/// Workspace sizes for the host device.
pub fn size_workspaces(ndof: usize, krylov_dim: usize) -> WorkspaceSizes {
    let device = HostDevice::new();
    WorkspaceSizes::compute(ndof, krylov_dim, device.eig_block_size(krylov_dim))
}

/// Single-precision step on the host device with default settings.
pub fn step_f32(
    system: &MechanicalSystem<'_, f32>,
    force: &[f32],
    history: &mut PositionHistory<f32>,
    workspace: &mut Workspace<f32>,
    dt: f32,
    krylov_dim: usize,
) -> Result<StepReport> {
    step_on_host(system, force, history, workspace, dt, krylov_dim)
}

/// Double-precision step on the host device with default settings.
pub fn step_f64(
    system: &MechanicalSystem<'_, f64>,
    force: &[f64],
    history: &mut PositionHistory<f64>,
    workspace: &mut Workspace<f64>,
    dt: f64,
    krylov_dim: usize,
) -> Result<StepReport> {
    step_on_host(system, force, history, workspace, dt, krylov_dim)
}

fn step_on_host<T: NetiScalar>(
    system: &MechanicalSystem<'_, T>,
    force: &[T],
    history: &mut PositionHistory<T>,
    workspace: &mut Workspace<T>,
    dt: T,
    krylov_dim: usize,
) -> Result<StepReport> {
    let device = HostDevice::new();
    let config = NetiConfig::default().with_krylov_dim(krylov_dim);
    NetiIntegrator::new(&device, config).step(system, force, history, workspace, dt)
}
