//! Inertial forces in a frame rotating about the z axis
//!
//! `a = -2 Ω×v - Ω×(Ω×x)`. The centrifugal part only depends on position and
//! is cached at setup; the Coriolis part is recomputed from the velocity on
//! every call.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::mesh::{Mesh, VectorField, field};
use crate::physics::{Physics, StateVector};
use crate::sources::config::RotatingFrameConfig;
use crate::sources::{SourceKind, SourceTerm};

/// Rotating frame module of the source chain
#[derive(Debug, Clone)]
pub struct RotatingFrameSource {
    omega: f64,
    centrifugal: VectorField,
    accel: VectorField,
}

impl RotatingFrameSource {
    pub fn new(mesh: &Mesh, physics: &dyn Physics, config: &RotatingFrameConfig) -> Result<Self> {
        let dims = physics.velocity_dims();
        if dims < 2 {
            return Err(Error::config(
                "rotating frame",
                "new",
                "inertial forces need at least 2 velocity components",
            ));
        }
        let omega = config.omega.unwrap_or(mesh.omega());
        if omega == 0.0 {
            log::warn!("rotating frame: rotation rate is zero, the module adds nothing");
        }

        let mut centrifugal = field::vector_field(mesh.shape(), dims, 0.0, "rotating frame")?;
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            let cartesian = Vector3::new(cell.position.x, cell.position.y, 0.0) * (omega * omega);
            let local = cell.to_local(&cartesian);
            for d in 0..dims {
                centrifugal[[i, j, k, d]] = local[d];
            }
        }

        log::info!("rotating frame: omega = {}", omega);
        Ok(Self {
            omega,
            accel: centrifugal.clone(),
            centrifugal,
        })
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Total inertial acceleration of the last evaluation
    pub fn accel(&self) -> &VectorField {
        &self.accel
    }
}

impl SourceTerm for RotatingFrameSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RotatingFrame
    }

    fn name(&self) -> &str {
        "rotating frame"
    }

    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        _time: f64,
        _dt: f64,
        pvar: &StateVector,
        _cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        let dims = physics.velocity_dims();
        for (i, j, k) in mesh.active_cells() {
            let cell = mesh.cell(i, j, k);
            let mut v = Vector3::<f64>::zeros();
            for d in 0..dims {
                v[d] = pvar.get(i, j, k, 1 + d);
            }
            let v = cell.to_cartesian(&v);
            let coriolis = cell.to_local(&Vector3::new(v.y, -v.x, 0.0)) * (2.0 * self.omega);
            for d in 0..dims {
                self.accel[[i, j, k, d]] = self.centrifugal[[i, j, k, d]] + coriolis[d];
            }
        }
        physics.external_accel_source(mesh, pvar, &self.accel, sterm);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Geometry, MeshConfig};
    use crate::physics::{IsothermalPhysics, VarKind};
    use std::f64::consts::TAU;

    #[test]
    fn test_inertial_forces_in_cylindrical_basis() {
        let mesh = Mesh::new(&MeshConfig {
            geometry: Geometry::Cylindrical,
            inum: 4,
            jnum: 8,
            xmin: 1.0,
            xmax: 2.0,
            ymin: 0.0,
            ymax: TAU,
            omega: 0.5,
            ..MeshConfig::default()
        })
        .unwrap();
        let physics = IsothermalPhysics::new(0.1, 2).unwrap();
        let mut frame = RotatingFrameSource::new(&mesh, &physics, &RotatingFrameConfig::default()).unwrap();

        let (w, u) = (0.2, 0.3);
        let mut pvar = StateVector::zeros(&mesh, 3, VarKind::Primitive).unwrap();
        for (i, j, k) in mesh.active_cells() {
            pvar.set(i, j, k, 0, 1.0);
            pvar.set(i, j, k, 1, w);
            pvar.set(i, j, k, 2, u);
        }
        let cvar = pvar.zeros_like(VarKind::Conservative).unwrap();
        let mut sterm = cvar.zeros_like(VarKind::Conservative).unwrap();
        frame.compute_source_term(&mesh, &physics, 0.0, 0.1, &pvar, &cvar, &mut sterm).unwrap();

        for (i, j, k) in mesh.active_cells() {
            let r = mesh.cell(i, j, k).radius;
            // a_r = 2Ωu + Ω²r, a_φ = -2Ωw
            assert!((sterm.get(i, j, k, 1) - (2.0 * 0.5 * u + 0.25 * r)).abs() < 1e-12);
            assert!((sterm.get(i, j, k, 2) + 2.0 * 0.5 * w).abs() < 1e-12);
        }
    }

    #[test]
    fn test_needs_two_velocity_components() {
        let mesh = Mesh::new(&MeshConfig { inum: 4, ..MeshConfig::default() }).unwrap();
        let physics = IsothermalPhysics::new(0.1, 1).unwrap();
        let config = RotatingFrameConfig { omega: Some(1.0) };
        assert!(RotatingFrameSource::new(&mesh, &physics, &config).is_err());
    }
}
