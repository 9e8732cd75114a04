//! Source terms
//!
//! A source module contributes to the right-hand side of the conservative
//! equations and, optionally, constrains the time step. Modules are owned by
//! a [`SourceChain`] and evaluated in insertion order.
//!
//! # Contract
//!
//! - [`SourceTerm::compute_source_term`] receives a zeroed buffer shaped like
//!   the conservative state and adds its contribution on active cells.
//! - [`SourceTerm::compute_timestep_constraint`] receives the current
//!   candidate step and returns a value no larger than it.
//! - [`SourceTerm::finalize`] releases resources; the chain calls it exactly
//!   once per module.
//!
//! Modules may be called several times per step with the same `time` (once
//! per Runge-Kutta stage plus once for the step constraint). Modules whose
//! working fields are expensive keep them in a [`Memo`].
//!
//! # Example
//!
//! ```
//! use diskflow::mesh::{Mesh, MeshConfig};
//! use diskflow::physics::IsothermalPhysics;
//! use diskflow::sources::{SourceChain, SourceConfig, ViscosityConfig, ViscosityModel};
//!
//! let mesh = Mesh::new(&MeshConfig { inum: 8, jnum: 8, ..MeshConfig::default() }).unwrap();
//! let physics = IsothermalPhysics::new(0.1, 2).unwrap();
//! let configs = [SourceConfig::Viscosity(ViscosityConfig::new(ViscosityModel::Pringle { nu: 1e-3 }))];
//!
//! let chain = SourceChain::from_config(&mesh, &physics, &configs).unwrap();
//! assert_eq!(chain.len(), 1);
//! ```

pub mod config;
pub mod cooling;
pub mod gravity;
pub mod memo;
pub mod rotframe;
pub mod viscosity;

use std::fmt;

use crate::error::Result;
use crate::mesh::Mesh;
use crate::physics::{Physics, StateVector, VarKind};

pub use config::{
    ContributorConfig, CoolingConfig, CoolingMethod, EnvelopeConfig, GravityConfig, PointMassConfig,
    PotentialKind, RotatingFrameConfig, SelfGravityConfig, SourceConfig, ViscosityConfig, ViscosityModel,
};
pub use cooling::DiskCoolingSource;
pub use gravity::{GravityContributor, GravitySource, PointMass, SelfGravity};
pub use memo::Memo;
pub use rotframe::RotatingFrameSource;
pub use viscosity::ViscositySource;

// =================================================================================================
// Source Trait
// =================================================================================================

/// Category of a source module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Gravity,
    Viscosity,
    DiskCooling,
    RotatingFrame,
    /// User-provided module
    Custom,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Gravity => "gravity",
            SourceKind::Viscosity => "viscosity",
            SourceKind::DiskCooling => "disk cooling",
            SourceKind::RotatingFrame => "rotating frame",
            SourceKind::Custom => "custom",
        };
        write!(f, "{}", name)
    }
}

/// Trait for source modules
///
/// `pvar` and `cvar` describe the same state; both have valid ghost cells
/// when called from the integrator.
pub trait SourceTerm: Send {
    fn kind(&self) -> SourceKind;

    /// Name used in logs and in the step-size cause
    fn name(&self) -> &str;

    /// Add this module's contribution to `sterm`
    ///
    /// `sterm` is zeroed by the caller.
    #[allow(clippy::too_many_arguments)]
    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        dt: f64,
        pvar: &StateVector,
        cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()>;

    /// Tighten the candidate time step `dt`
    fn compute_timestep_constraint(
        &mut self,
        _mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _pvar: &StateVector,
        _cvar: &StateVector,
        dt: f64,
    ) -> Result<f64> {
        Ok(dt)
    }

    /// Release resources
    fn finalize(&mut self) {}
}

// =================================================================================================
// Source Chain
// =================================================================================================

/// Ordered, owning collection of source modules
#[derive(Default)]
pub struct SourceChain {
    modules: Vec<Box<dyn SourceTerm>>,
    scratch: Option<StateVector>,
    finalized: bool,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every configured module, in order
    ///
    /// # Errors
    ///
    /// The first module that fails to set up aborts the build; modules
    /// already built are finalized on drop.
    pub fn from_config(mesh: &Mesh, physics: &dyn Physics, configs: &[SourceConfig]) -> Result<Self> {
        let mut chain = Self::new();
        for config in configs {
            let module: Box<dyn SourceTerm> = match config {
                SourceConfig::Gravity(c) => Box::new(GravitySource::new(mesh, physics, c)?),
                SourceConfig::Viscosity(c) => Box::new(ViscositySource::new(mesh, physics, c)?),
                SourceConfig::DiskCooling(c) => Box::new(DiskCoolingSource::new(mesh, physics, c)?),
                SourceConfig::RotatingFrame(c) => Box::new(RotatingFrameSource::new(mesh, physics, c)?),
            };
            chain.push(module);
        }
        Ok(chain)
    }

    /// Append a module at the end of the chain
    pub fn push(&mut self, module: Box<dyn SourceTerm>) {
        log::info!("source chain: added {} module '{}'", module.kind(), module.name());
        self.modules.push(module);
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module names in evaluation order
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// First module of the given kind
    pub fn find(&self, kind: SourceKind) -> Option<&dyn SourceTerm> {
        self.modules.iter().find(|m| m.kind() == kind).map(|m| m.as_ref())
    }

    /// Sum of all module contributions into `sterm`
    ///
    /// `sterm` is overwritten and tagged conservative.
    #[allow(clippy::too_many_arguments)]
    pub fn external_sources(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        dt: f64,
        pvar: &StateVector,
        cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        sterm.ensure_same_shape(cvar, "external_sources")?;
        sterm.fill(0.0);
        sterm.set_kind(VarKind::Conservative);
        if self.modules.is_empty() {
            return Ok(());
        }

        let mut scratch = match self.scratch.take() {
            Some(buffer) if buffer.ensure_same_shape(cvar, "external_sources").is_ok() => buffer,
            _ => cvar.zeros_like(VarKind::Conservative)?,
        };

        for module in self.modules.iter_mut() {
            scratch.fill(0.0);
            module.compute_source_term(mesh, physics, time, dt, pvar, cvar, &mut scratch)?;
            *sterm += &scratch;
        }

        self.scratch = Some(scratch);
        Ok(())
    }

    /// Fold every module's constraint over the candidate `dt`
    ///
    /// Returns the new step and the name of the module that set it, if any
    /// module tightened the candidate.
    pub fn calc_timestep(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        pvar: &StateVector,
        cvar: &StateVector,
        dt: f64,
    ) -> Result<(f64, Option<String>)> {
        let mut dt = dt;
        let mut cause = None;
        for module in self.modules.iter_mut() {
            let limit = module.compute_timestep_constraint(mesh, physics, time, pvar, cvar, dt)?;
            if limit < dt {
                dt = limit;
                cause = Some(module.name().to_string());
            }
        }
        Ok((dt, cause))
    }

    /// Finalize every module in order; later calls do nothing
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        for module in self.modules.iter_mut() {
            log::debug!("source chain: finalizing '{}'", module.name());
            module.finalize();
        }
        self.scratch = None;
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}

impl Drop for SourceChain {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for SourceChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceChain")
            .field("modules", &self.names())
            .field("finalized", &self.finalized)
            .finish()
    }
}
