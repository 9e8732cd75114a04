//! diskflow: adaptive time integration and source coupling for disk simulations
//!
//! The core of a finite-volume solver for accretion disks on structured
//! curvilinear meshes: an adaptive embedded Runge-Kutta integrator and an
//! ordered chain of source terms (gravity, viscosity, cooling, rotating
//! frame) that feed its right-hand side and limit its step size.
//!
//! # Architecture
//!
//! diskflow is built on two core principles:
//!
//! 1. **Separation of Physics and Numerics**
//!    - physics modules define the variables and their conversions
//!    - source modules define forces and heating
//!    - the solver only combines right-hand sides and controls the step
//!
//! 2. **Extensibility and Type Safety**
//!    - trait seams for physics, fluxes, boundaries and sources
//!    - typed, `serde`-deserializable configuration
//!    - one crate-wide [`Error`] type
//!
//! # Quick Start
//!
//! ```rust
//! use diskflow::prelude::*;
//! use std::f64::consts::TAU;
//!
//! # fn main() -> diskflow::Result<()> {
//! // 1. Mesh and physics
//! let mesh = Mesh::new(&MeshConfig {
//!     geometry: Geometry::Cylindrical,
//!     inum: 8,
//!     jnum: 8,
//!     xmin: 1.0,
//!     xmax: 2.0,
//!     ymax: TAU,
//!     ..MeshConfig::default()
//! })?;
//! let physics = IsothermalPhysics::new(0.05, 2)?;
//!
//! // 2. Sources
//! let sources = SourceChain::from_config(&mesh, &physics, &[
//!     SourceConfig::Viscosity(ViscosityConfig::new(ViscosityModel::Pringle { nu: 1e-3 })),
//! ])?;
//!
//! // 3. Scenario
//! let mut initial = StateVector::zeros(&mesh, physics.nvar(), VarKind::Primitive)?;
//! initial.fill(1.0);
//! let mut scenario = Scenario::new(
//!     mesh,
//!     Box::new(physics),
//!     Box::new(NullFluxes),
//!     Box::new(DomainBoundaries::new([BoundaryType::ZeroGradient, BoundaryType::Periodic, BoundaryType::ZeroGradient])),
//!     sources,
//!     initial,
//! );
//!
//! // 4. Run
//! let config = TimeDiscConfig::new(0.1);
//! let result = EmbeddedRkSolver::new().solve(&mut scenario, &config)?;
//! assert_eq!(result.final_time, 0.1);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`mesh`]: structured mesh and field containers
//! - [`physics`]: state vector and physics modules
//! - [`sources`]: source terms and the source chain
//! - [`solver`]: Butcher tableaus, step control and the embedded RK solver
//! - [`error`]: crate-wide error type
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.

pub mod error;
pub mod mesh;
pub mod physics;
pub mod solver;
pub mod sources;

pub use error::{Error, Result};

pub mod prelude {
    //! Convenient imports for common usage
    //!
    //! ```rust
    //! use diskflow::prelude::*;
    //! ```
    pub use crate::error::{Error, Result};
    pub use crate::mesh::{Geometry, Mesh, MeshConfig};
    pub use crate::physics::{EulerPhysics, IsothermalPhysics, Physics, PhysicsConfig, StateVector, VarKind};
    pub use crate::solver::{
        BoundaryType, DomainBoundaries, EmbeddedRkSolver, NullFluxes, Scenario, SimulationResult, Solver,
        TableauKind, TimeDiscConfig,
    };
    pub use crate::sources::{
        GravityConfig, SourceChain, SourceConfig, SourceTerm, ViscosityConfig, ViscosityModel,
    };
}
