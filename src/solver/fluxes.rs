//! Flux-divergence interface
//!
//! The integrator asks the flux scheme for the divergence of the numerical
//! fluxes at each stage and for its CFL limit once per step. Reconstruction
//! and Riemann solvers live behind this trait; [`NullFluxes`] is the scheme
//! of source-only problems.

use crate::error::Result;
use crate::mesh::Mesh;
use crate::physics::{Physics, StateVector, VarKind};

/// Trait for flux schemes
pub trait Fluxes: Send {
    fn name(&self) -> &str;

    /// Whether the scheme finished its setup
    fn initialized(&self) -> bool;

    /// Largest stable step for the state; `f64::INFINITY` if unconstrained
    fn calc_timestep(&mut self, mesh: &Mesh, physics: &dyn Physics, pvar: &StateVector, cvar: &StateVector) -> Result<f64>;

    /// Write `-∇·F` of the conservative equations into `rhs` on active cells
    ///
    /// `rhs` is overwritten.
    fn compute_rhs(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        pvar: &StateVector,
        cvar: &StateVector,
        rhs: &mut StateVector,
    ) -> Result<()>;
}

/// Flux scheme that transports nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFluxes;

impl Fluxes for NullFluxes {
    fn name(&self) -> &str {
        "null fluxes"
    }

    fn initialized(&self) -> bool {
        true
    }

    fn calc_timestep(&mut self, _mesh: &Mesh, _physics: &dyn Physics, _pvar: &StateVector, _cvar: &StateVector) -> Result<f64> {
        Ok(f64::INFINITY)
    }

    fn compute_rhs(
        &mut self,
        _mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _pvar: &StateVector,
        cvar: &StateVector,
        rhs: &mut StateVector,
    ) -> Result<()> {
        rhs.ensure_same_shape(cvar, "compute_rhs")?;
        rhs.fill(0.0);
        rhs.set_kind(VarKind::Conservative);
        Ok(())
    }
}
