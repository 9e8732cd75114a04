//! Gammie β-cooling
//!
//! The internal energy of the disk relaxes on a fixed number of dynamical
//! times: `Q = -(p / (γ - 1)) · Ω / b_cool`. `Ω` is either Keplerian about a
//! central mass or the constant rate of a shearing box.

use crate::error::{Error, Result};
use crate::mesh::{Mesh, MeshField, field};
use crate::physics::{Physics, StateVector};
use crate::sources::config::{CoolingConfig, CoolingMethod};
use crate::sources::{SourceKind, SourceTerm};

/// Disk cooling module of the source chain
#[derive(Debug, Clone)]
pub struct DiskCoolingSource {
    method: CoolingMethod,
    b_cool: f64,
    cvis: f64,
    gamma: f64,
    energy: usize,
    omega: MeshField,
    max_omega: f64,
}

impl DiskCoolingSource {
    /// # Errors
    ///
    /// `Configuration` if the physics has no energy equation, or for
    /// non-positive `b_cool`, `cvis`, mass or rate.
    pub fn new(mesh: &Mesh, physics: &dyn Physics, config: &CoolingConfig) -> Result<Self> {
        let (energy, gamma) = match (physics.energy_index(), physics.gamma()) {
            (Some(e), Some(g)) => (e, g),
            _ => {
                return Err(Error::config(
                    "disk cooling",
                    "new",
                    format!("{} physics has no energy equation to cool", physics.name()),
                ));
            }
        };
        if !(config.b_cool > 0.0) || !(config.cvis > 0.0) {
            return Err(Error::config("disk cooling", "new", "b_cool and cvis must be positive"));
        }

        let mut omega = field::scalar_field(mesh.shape(), 0.0, "disk cooling")?;
        match config.method {
            CoolingMethod::Gammie { mass, gn } => {
                if !(mass > 0.0 && gn > 0.0) {
                    return Err(Error::config("disk cooling", "new", "central mass and gn must be positive"));
                }
                for ((i, j, k), cell) in mesh.cells().indexed_iter() {
                    let r = cell.radius;
                    omega[[i, j, k]] = if r > 0.0 { (gn * mass / (r * r * r)).sqrt() } else { 0.0 };
                }
                if mesh.active_cells().any(|(i, j, k)| mesh.cell(i, j, k).radius <= 0.0) {
                    return Err(Error::config("disk cooling", "new", "keplerian rate is singular on the axis"));
                }
            }
            CoolingMethod::GammieShearingBox { omega: rate } => {
                if !(rate > 0.0) {
                    return Err(Error::config("disk cooling", "new", "shearing box rate must be positive"));
                }
                omega.fill(rate);
            }
        }

        let max_omega = mesh.active_cells().map(|(i, j, k)| omega[[i, j, k]]).fold(0.0, f64::max);

        log::info!("disk cooling: {:?}, b_cool = {}", config.method, config.b_cool);
        Ok(Self {
            method: config.method,
            b_cool: config.b_cool,
            cvis: config.cvis,
            gamma,
            energy,
            omega,
            max_omega,
        })
    }

    pub fn method(&self) -> CoolingMethod {
        self.method
    }

    /// Angular frequency used for the cooling time
    pub fn omega(&self) -> &MeshField {
        &self.omega
    }
}

impl SourceTerm for DiskCoolingSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DiskCooling
    }

    fn name(&self) -> &str {
        "disk cooling"
    }

    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _dt: f64,
        pvar: &StateVector,
        _cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        for (i, j, k) in mesh.active_cells() {
            let eint = pvar.get(i, j, k, self.energy) / (self.gamma - 1.0);
            sterm.data_mut()[[i, j, k, self.energy]] -= eint * self.omega[[i, j, k]] / self.b_cool;
        }
        Ok(())
    }

    /// `dt ≤ cvis · b_cool / max Ω`
    fn compute_timestep_constraint(
        &mut self,
        _mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _pvar: &StateVector,
        _cvar: &StateVector,
        dt: f64,
    ) -> Result<f64> {
        if self.max_omega <= 0.0 {
            return Ok(dt);
        }
        Ok(dt.min(self.cvis * self.b_cool / self.max_omega))
    }
}
