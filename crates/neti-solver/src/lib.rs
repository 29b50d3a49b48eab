//! Krylov exponential time integration for sparse second-order systems.
//!
//! This crate advances `M x'' + D x' + K x = f` by one timestep at a time,
//! approximating `cos(dt * sqrt(A))` with `A = invMass * Stiffness` on a
//! small Krylov subspace instead of forming `A` or its spectrum.
//!
//! # Module Structure
//!
//! - [`device`] - Numerical primitives behind the [`Device`] handle
//! - [`workspace`] - Workspace sizing and scratch carving
//! - [`krylov`] - Arnoldi basis construction
//! - [`spectral`] - Reduced evaluation of the matrix cosine
//! - [`force`] - Driving vector from damping and load
//! - [`step`] - The two-phase step and its entry points
//!
//! # Example
//!
//! ```
//! use neti_core::CsrMatrix;
//! use neti_solver::{
//!     HostDevice, MechanicalSystem, NetiConfig, NetiIntegrator, PositionHistory,
//! };
//!
//! let stiffness = CsrMatrix::from_diagonal(&[4.0]);
//! let damping = CsrMatrix::zeros(1);
//! let inv_mass = CsrMatrix::identity(1);
//! let system = MechanicalSystem::new(&inv_mass, &damping, &stiffness).unwrap();
//!
//! let device = HostDevice::new();
//! let integrator = NetiIntegrator::new(&device, NetiConfig::default().with_krylov_dim(1));
//! let mut workspace = integrator.allocate_workspace(1).unwrap();
//! let mut history = PositionHistory::at_rest(vec![1.0]);
//!
//! integrator
//!     .step(&system, &[0.0], &mut history, &mut workspace, 0.1)
//!     .unwrap();
//! assert!(history.current[0] < 1.0);
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod force;
pub mod krylov;
pub mod spectral;
pub mod step;
pub mod system;
pub mod workspace;

pub use config::{BreakdownPolicy, NetiConfig};
pub use device::{Device, HostDevice, HostDeviceConfig};
pub use error::{NetiError, Result};
pub use force::EquivalentForceComputer;
pub use krylov::{KrylovBasisBuilder, KrylovOperator, KrylovOutcome};
pub use spectral::{EvaluationOutcome, SpectralFunctionEvaluator, cos_sqrt};
pub use step::{NetiIntegrator, StepReport, size_workspaces, step_f32, step_f64};
pub use system::{MechanicalSystem, PositionHistory};
pub use workspace::{ScratchArena, SpectralBuffers, Workspace, WorkspaceSizes};
