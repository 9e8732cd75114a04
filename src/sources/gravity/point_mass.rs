//! Point-mass gravity
//!
//! The field of a fixed point mass does not depend on the fluid state, so
//! acceleration and potential are computed once at setup. The Keplerian
//! frequency about the mass gives the disk scale height `h = c_s / Ω_K`.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::mesh::{CellGeometry, Mesh, MeshField, VectorField, field};
use crate::physics::{Physics, StateVector};
use crate::sources::config::{PointMassConfig, PotentialKind};

/// Static point mass
#[derive(Debug, Clone)]
pub struct PointMass {
    gm: f64,
    position: Vector3<f64>,
    softening: f64,
    kind: PotentialKind,
    rs: f64,
    accel: VectorField,
    potential: MeshField,
}

impl PointMass {
    /// Precompute the field of the configured mass
    ///
    /// # Errors
    ///
    /// `Configuration` for a non-positive mass, a negative softening, a
    /// Paczyński–Wiita potential without a positive Schwarzschild radius, or
    /// an active cell at (or inside) the singular radius.
    pub fn new(mesh: &Mesh, gn: f64, config: &PointMassConfig) -> Result<Self> {
        if !(config.mass > 0.0) || !(gn > 0.0) {
            return Err(Error::config("point mass", "new", "mass and gravitational constant must be positive"));
        }
        if !(config.softening >= 0.0) {
            return Err(Error::config("point mass", "new", "softening must be non-negative"));
        }
        if config.potential == PotentialKind::PaczynskiWiita && !(config.schwarzschild_radius > 0.0) {
            return Err(Error::config(
                "point mass",
                "new",
                "paczynski-wiita potential needs a positive schwarzschild radius",
            ));
        }

        let mut pm = Self {
            gm: gn * config.mass,
            position: Vector3::from(config.position),
            softening: config.softening,
            kind: config.potential,
            rs: match config.potential {
                PotentialKind::Newton => 0.0,
                PotentialKind::PaczynskiWiita => config.schwarzschild_radius,
            },
            accel: field::vector_field(mesh.shape(), 3, 0.0, "point mass")?,
            potential: field::scalar_field(mesh.shape(), 0.0, "point mass")?,
        };

        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            let separation = cell.position - pm.position;
            let dist = (separation.norm_squared() + pm.softening * pm.softening).sqrt();
            let (accel, phi) = pm.field_at(separation, dist);

            if !(accel.iter().all(|a| a.is_finite()) && phi.is_finite()) {
                if mesh.is_active(i, j, k) {
                    return Err(Error::config(
                        "point mass",
                        "new",
                        format!("cell ({}, {}, {}) lies on the singular radius of the potential", i, j, k),
                    ));
                }
                continue;
            }

            let local = cell.to_local(&accel);
            for d in 0..3 {
                pm.accel[[i, j, k, d]] = local[d];
            }
            pm.potential[[i, j, k]] = phi;
        }

        log::debug!(
            "point mass: GM = {}, position {:?}, softening {}, {:?}",
            pm.gm,
            config.position,
            pm.softening,
            pm.kind
        );
        Ok(pm)
    }

    /// Cartesian acceleration and potential at `separation` from the mass
    fn field_at(&self, separation: Vector3<f64>, dist: f64) -> (Vector3<f64>, f64) {
        match self.kind {
            PotentialKind::Newton => (-self.gm / (dist * dist * dist) * separation, -self.gm / dist),
            PotentialKind::PaczynskiWiita => {
                let shifted = dist - self.rs;
                if shifted <= 0.0 {
                    return (Vector3::repeat(f64::NAN), f64::NAN);
                }
                (-self.gm / (shifted * shifted * dist) * separation, -self.gm / shifted)
            }
        }
    }

    /// `GM`
    pub fn gm(&self) -> f64 {
        self.gm
    }

    /// Keplerian angular frequency at a cell, from the cylindrical distance
    pub fn keplerian_omega(&self, cell: &CellGeometry) -> f64 {
        let separation = cell.position - self.position;
        let r = (separation.x * separation.x + separation.y * separation.y + self.softening * self.softening).sqrt();
        match self.kind {
            PotentialKind::Newton => (self.gm / (r * r * r)).sqrt(),
            PotentialKind::PaczynskiWiita => (self.gm / r).sqrt() / (r - self.rs),
        }
    }

    /// Write `h = c_s / Ω_K` on active cells of `height`
    pub fn scale_height(&self, mesh: &Mesh, physics: &dyn Physics, pvar: &StateVector, height: &mut MeshField) {
        for (i, j, k) in mesh.active_cells() {
            let cs = physics.sound_speed_sq(pvar.cell(i, j, k)).sqrt();
            height[[i, j, k]] = cs / self.keplerian_omega(mesh.cell(i, j, k));
        }
    }

    /// Acceleration in the local basis, three components per cell
    pub fn accel(&self) -> &VectorField {
        &self.accel
    }

    pub fn potential(&self) -> &MeshField {
        &self.potential
    }
}
