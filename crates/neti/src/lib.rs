//! Numerical exponential time integration.
//!
//! `neti` advances large sparse linear mechanical systems
//! `M x'' + D x' + K x = f` through time with a Krylov approximation of the
//! matrix cosine `cos(dt * sqrt(invMass * K))`. It re-exports the public API
//! of [`neti_core`] and [`neti_solver`].
//!
//! # Quick Start
//!
//! ```
//! use neti::prelude::*;
//!
//! // Three unit masses on a fixed-fixed spring chain.
//! let stiffness = CsrMatrix::from_triplets(
//!     3,
//!     3,
//!     &[
//!         (0, 0, 2.0), (0, 1, -1.0),
//!         (1, 0, -1.0), (1, 1, 2.0), (1, 2, -1.0),
//!         (2, 1, -1.0), (2, 2, 2.0),
//!     ],
//! )?;
//! let damping = CsrMatrix::zeros(3);
//! let inv_mass = CsrMatrix::identity(3);
//! let system = MechanicalSystem::new(&inv_mass, &damping, &stiffness)?;
//!
//! let mut workspace = Workspace::allocate(&size_workspaces(3, 3));
//! let mut history = PositionHistory::at_rest(vec![0.0, 1.0, 0.0]);
//! for _ in 0..100 {
//!     step_f64(&system, &[0.0; 3], &mut history, &mut workspace, 0.01, 3)?;
//! }
//! # Ok::<(), NetiError>(())
//! ```

pub use neti_core::{CsrMatrix, NetiScalar, Precision};
pub use neti_solver::*;

/// Commonly used types.
pub mod prelude {
    pub use neti_core::{CsrMatrix, NetiScalar};
    pub use neti_solver::{
        BreakdownPolicy, Device, HostDevice, MechanicalSystem, NetiConfig, NetiError,
        NetiIntegrator, PositionHistory, StepReport, Workspace, size_workspaces, step_f32,
        step_f64,
    };
}
