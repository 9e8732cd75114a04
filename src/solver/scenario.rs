//! Simulation scenario definition
//!
//! A scenario bundles everything the integrator advances: the mesh, the
//! physics, the flux scheme, the boundary conditions, the source chain and
//! the initial primitive state.

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::physics::{Physics, StateVector, VarKind};
use crate::solver::boundary::Boundary;
use crate::solver::fluxes::Fluxes;
use crate::sources::SourceChain;

/// Simulation scenario
///
/// This is the "WHAT to solve"; the same scenario can be integrated with
/// different [`TimeDiscConfig`](crate::solver::TimeDiscConfig)s.
///
/// # Examples
///
/// ```rust
/// use diskflow::mesh::{Mesh, MeshConfig};
/// use diskflow::physics::{IsothermalPhysics, StateVector, VarKind};
/// use diskflow::solver::{DomainBoundaries, NullFluxes, Scenario};
/// use diskflow::sources::SourceChain;
///
/// let mesh = Mesh::new(&MeshConfig { inum: 8, ..MeshConfig::default() }).unwrap();
/// let initial = StateVector::zeros(&mesh, 2, VarKind::Primitive).unwrap();
/// let scenario = Scenario::new(
///     mesh,
///     Box::new(IsothermalPhysics::new(1.0, 1).unwrap()),
///     Box::new(NullFluxes),
///     Box::new(DomainBoundaries::default()),
///     SourceChain::new(),
///     initial,
/// );
/// scenario.validate().unwrap();
/// ```
pub struct Scenario {
    pub mesh: Mesh,
    pub physics: Box<dyn Physics>,
    pub fluxes: Box<dyn Fluxes>,
    pub boundary: Box<dyn Boundary>,
    pub sources: SourceChain,
    /// Initial primitive state
    pub initial: StateVector,
}

impl Scenario {
    pub fn new(
        mesh: Mesh,
        physics: Box<dyn Physics>,
        fluxes: Box<dyn Fluxes>,
        boundary: Box<dyn Boundary>,
        sources: SourceChain,
        initial: StateVector,
    ) -> Self {
        Self {
            mesh,
            physics,
            fluxes,
            boundary,
            sources,
            initial,
        }
    }

    /// Check that the pieces fit together
    pub fn validate(&self) -> Result<()> {
        if self.initial.kind() != VarKind::Primitive {
            return Err(Error::config("scenario", "validate", "initial state must be primitive"));
        }
        if self.initial.shape() != self.mesh.shape() {
            return Err(Error::config(
                "scenario",
                "validate",
                format!("initial state shape {:?} does not match mesh {:?}", self.initial.shape(), self.mesh.shape()),
            ));
        }
        if self.initial.nvar() != self.physics.nvar() {
            return Err(Error::config(
                "scenario",
                "validate",
                format!("{} needs {} variables, initial state has {}", self.physics.name(), self.physics.nvar(), self.initial.nvar()),
            ));
        }
        self.boundary.validate(&self.mesh)?;
        if !self.fluxes.initialized() {
            return Err(Error::config("scenario", "validate", format!("{} is not initialized", self.fluxes.name())));
        }
        if self.sources.is_finalized() {
            return Err(Error::config("scenario", "validate", "source chain was already finalized"));
        }
        Ok(())
    }

    pub fn physics_name(&self) -> &str {
        self.physics.name()
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("geometry", &self.mesh.geometry())
            .field("cells", &self.mesh.num())
            .field("physics", &self.physics_name())
            .field("fluxes", &self.fluxes.name())
            .field("boundary", &self.boundary.name())
            .field("sources", &self.sources)
            .finish()
    }
}

// ================================================================================================
// Tests
// ================================================================================================
