//! Ghost-cell boundary conditions
//!
//! The integrator fills ghost cells of every stage state through the
//! [`Boundary`] trait before the right-hand side is evaluated.
//! [`DomainBoundaries`] stores one [`BoundaryType`] per direction and fills
//! directions in order `x, y, z`, so corner ghosts end up consistent with
//! both neighbours.
//!
//! Inactive directions (one cell, no ghosts) are skipped.

use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::physics::{Physics, StateVector, VarKind};

/// Trait for ghost-cell filling
pub trait Boundary: Send + Sync {
    fn name(&self) -> &str;

    /// Check the conditions against the mesh before the time loop
    fn validate(&self, _mesh: &Mesh) -> Result<()> {
        Ok(())
    }

    /// Overwrite the ghost cells of the primitive state `pvar`
    fn enforce(&self, mesh: &Mesh, physics: &dyn Physics, time: f64, pvar: &mut StateVector) -> Result<()>;
}

/// Boundary condition of one direction (both faces)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    /// Ghosts copy the nearest active cell
    #[default]
    ZeroGradient,
    /// Ghosts copy the active cells of the opposite face
    Periodic,
}

/// Per-direction boundary conditions
///
/// # Examples
///
/// ```rust
/// use diskflow::solver::{BoundaryType, DomainBoundaries};
///
/// // periodic in azimuth, open in radius
/// let boundaries = DomainBoundaries::new([
///     BoundaryType::ZeroGradient,
///     BoundaryType::Periodic,
///     BoundaryType::ZeroGradient,
/// ]);
/// assert_eq!(boundaries.direction(1), BoundaryType::Periodic);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DomainBoundaries {
    #[serde(default)]
    pub x: BoundaryType,
    #[serde(default)]
    pub y: BoundaryType,
    #[serde(default)]
    pub z: BoundaryType,
}

impl DomainBoundaries {
    pub fn new(types: [BoundaryType; 3]) -> Self {
        Self { x: types[0], y: types[1], z: types[2] }
    }

    /// Same condition in every direction
    pub fn uniform(kind: BoundaryType) -> Self {
        Self::new([kind; 3])
    }

    /// Condition of direction `d`
    pub fn direction(&self, d: usize) -> BoundaryType {
        match d {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Boundary for DomainBoundaries {
    fn name(&self) -> &str {
        "domain boundaries"
    }

    /// Check that periodic directions have enough active cells for the ghosts
    fn validate(&self, mesh: &Mesh) -> Result<()> {
        for d in 0..3 {
            if mesh.is_active_dir(d)
                && self.direction(d) == BoundaryType::Periodic
                && mesh.num()[d] < mesh.ghost()[d]
            {
                return Err(Error::config(
                    "boundary",
                    "validate",
                    format!(
                        "periodic direction {} has {} cells but {} ghost layers",
                        d,
                        mesh.num()[d],
                        mesh.ghost()[d]
                    ),
                ));
            }
        }
        Ok(())
    }

    fn enforce(&self, mesh: &Mesh, _physics: &dyn Physics, _time: f64, pvar: &mut StateVector) -> Result<()> {
        if pvar.kind() != VarKind::Primitive {
            return Err(Error::invalid_state("boundary", "enforce", "ghost cells are filled on the primitive state"));
        }
        let (ni, nj, nk) = pvar.shape();
        if (ni, nj, nk) != mesh.shape() {
            return Err(Error::invalid_state(
                "boundary",
                "enforce",
                format!("state shape {:?} does not match mesh {:?}", (ni, nj, nk), mesh.shape()),
            ));
        }

        let data = pvar.data_mut();
        for d in 0..3 {
            if !mesh.is_active_dir(d) {
                continue;
            }
            let ghost = mesh.ghost()[d];
            let num = mesh.num()[d];
            let first = ghost;
            let last = ghost + num - 1;

            for g in 0..ghost {
                let lower = ghost - 1 - g;
                let upper = last + 1 + g;
                let (lower_src, upper_src) = match self.direction(d) {
                    BoundaryType::ZeroGradient => (first, last),
                    BoundaryType::Periodic => (lower + num, upper - num),
                };
                let values = data.index_axis(Axis(d), lower_src).to_owned();
                data.index_axis_mut(Axis(d), lower).assign(&values);
                let values = data.index_axis(Axis(d), upper_src).to_owned();
                data.index_axis_mut(Axis(d), upper).assign(&values);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshConfig;
    use crate::physics::IsothermalPhysics;

    fn strip() -> Mesh {
        Mesh::new(&MeshConfig { inum: 4, jnum: 3, ..MeshConfig::default() }).unwrap()
    }

    /// Active cells hold `100 i + j`, ghosts hold -1
    fn labelled(mesh: &Mesh) -> StateVector {
        let mut pvar = StateVector::zeros(mesh, 3, VarKind::Primitive).unwrap();
        pvar.fill(-1.0);
        for (i, j, k) in mesh.active_cells() {
            for v in 0..3 {
                pvar.set(i, j, k, v, (100 * i + j) as f64);
            }
        }
        pvar
    }

    #[test]
    fn test_zero_gradient_copies_nearest_active_cell() {
        let mesh = strip();
        let physics = IsothermalPhysics::new(1.0, 2).unwrap();
        let mut pvar = labelled(&mesh);
        DomainBoundaries::default().enforce(&mesh, &physics, 0.0, &mut pvar).unwrap();

        let g = mesh.ghost()[0];
        let last = g + 3;
        for j in mesh.active_range(1) {
            assert_eq!(pvar.get(0, j, 0, 0), (100 * g + j) as f64);
            assert_eq!(pvar.get(last + 2, j, 0, 1), (100 * last + j) as f64);
        }
        assert!(pvar.data().iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn test_periodic_wraps_opposite_face() {
        let mesh = strip();
        let physics = IsothermalPhysics::new(1.0, 2).unwrap();
        let mut pvar = labelled(&mesh);
        let boundaries = DomainBoundaries::new([BoundaryType::Periodic, BoundaryType::ZeroGradient, BoundaryType::ZeroGradient]);
        boundaries.validate(&mesh).unwrap();
        boundaries.enforce(&mesh, &physics, 0.0, &mut pvar).unwrap();

        let g = mesh.ghost()[0];
        let j = g;
        // lower ghost layer next to the domain mirrors the last active column
        assert_eq!(pvar.get(g - 1, j, 0, 0), (100 * (g + 3) + j) as f64);
        // upper ghost layer next to the domain mirrors the first active column
        assert_eq!(pvar.get(g + 4, j, 0, 0), (100 * g + j) as f64);
    }

    #[test]
    fn test_rejects_conservative_state() {
        let mesh = strip();
        let physics = IsothermalPhysics::new(1.0, 2).unwrap();
        let mut cvar = StateVector::zeros(&mesh, 3, VarKind::Conservative).unwrap();
        let err = DomainBoundaries::default().enforce(&mesh, &physics, 0.0, &mut cvar).unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
    }

    #[test]
    fn test_periodic_needs_enough_cells() {
        let boundaries = DomainBoundaries::uniform(BoundaryType::Periodic);
        // a single x cell is an inactive direction, not a short periodic one
        let flat = Mesh::new(&MeshConfig { inum: 1, jnum: 4, ..MeshConfig::default() }).unwrap();
        assert!(boundaries.validate(&flat).is_ok());

        let short = Mesh::new(&MeshConfig { inum: 2, jnum: 4, ghost: 3, ..MeshConfig::default() }).unwrap();
        assert!(boundaries.validate(&short).unwrap_err().is_configuration());
    }

    #[test]
    fn test_parses_from_config() {
        let boundaries: DomainBoundaries = serde_json::from_str(r#"{ "y": "periodic" }"#).unwrap();
        assert_eq!(boundaries.x, BoundaryType::ZeroGradient);
        assert_eq!(boundaries.y, BoundaryType::Periodic);
    }
}
