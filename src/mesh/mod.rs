//! Structured mesh geometry
//!
//! The solver core only needs a narrow view of the mesh:
//!
//! - index ranges of active and ghost cells,
//! - cell-centre position, cylindrical radius and local unit vectors,
//! - cell spacings and volumes,
//! - the rotation rate `Ω` of the reference frame.
//!
//! [`Mesh`] provides exactly that for uniform logical grids in Cartesian,
//! cylindrical `(r, φ, z)` and spherical `(r, θ, φ)` coordinates. Velocity
//! components everywhere in the crate are expressed in the local
//! orthonormal basis of the cell (`e_r, e_φ, e_z` for cylindrical meshes).
//!
//! A direction with a single cell carries no ghost cells and is treated as
//! inactive (no gradients, no diffusive time-step limit).
//!
//! # Example
//!
//! ```
//! use diskflow::mesh::{Geometry, Mesh, MeshConfig};
//!
//! let config = MeshConfig {
//!     geometry: Geometry::Cylindrical,
//!     inum: 16, jnum: 32, knum: 1,
//!     xmin: 0.5, xmax: 2.0,
//!     ymin: 0.0, ymax: std::f64::consts::TAU,
//!     ..MeshConfig::default()
//! };
//! let mesh = Mesh::new(&config).unwrap();
//!
//! assert_eq!(mesh.active_dims(), 2);
//! assert_eq!(mesh.shape(), (16 + 4, 32 + 4, 1));
//! ```

pub mod field;

use nalgebra::{Matrix3, Vector3};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::error::{Error, Result};

pub use field::{MeshField, VectorField};

/// Coordinate system of the logical grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geometry {
    /// `(x, y, z)`
    #[default]
    Cartesian,
    /// `(r, φ, z)`; a polar disk is a cylindrical mesh with `knum = 1`
    Cylindrical,
    /// `(r, θ, φ)`
    Spherical,
}

/// Mesh parameters
///
/// Logical coordinate bounds are given per direction. Angles are in
/// radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    #[serde(default)]
    pub geometry: Geometry,

    pub inum: usize,
    #[serde(default = "one")]
    pub jnum: usize,
    #[serde(default = "one")]
    pub knum: usize,

    pub xmin: f64,
    pub xmax: f64,
    #[serde(default)]
    pub ymin: f64,
    #[serde(default = "unit")]
    pub ymax: f64,
    /// With a single z cell on a Cartesian or cylindrical mesh the grid is a
    /// vertically integrated disk: cells sit on the midplane `z = 0` and the
    /// extent only sets the cell height.
    #[serde(default)]
    pub zmin: f64,
    #[serde(default = "unit")]
    pub zmax: f64,

    /// Ghost cells per side in every direction with more than one cell
    #[serde(default = "default_ghost")]
    pub ghost: usize,

    /// Rotation rate of the reference frame about the z axis
    #[serde(default)]
    pub omega: f64,
}

fn one() -> usize {
    1
}

fn unit() -> f64 {
    1.0
}

fn default_ghost() -> usize {
    2
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            geometry: Geometry::Cartesian,
            inum: 1,
            jnum: 1,
            knum: 1,
            xmin: 0.0,
            xmax: 1.0,
            ymin: 0.0,
            ymax: 1.0,
            zmin: 0.0,
            zmax: 1.0,
            ghost: default_ghost(),
            omega: 0.0,
        }
    }
}

/// Geometry of a single cell centre
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGeometry {
    /// Cartesian position of the centre
    pub position: Vector3<f64>,
    /// Distance from the z axis
    pub radius: f64,
    /// Columns are the local unit vectors in Cartesian components
    pub basis: Matrix3<f64>,
    /// Physical cell widths `h_d · Δξ_d`
    pub dl: Vector3<f64>,
    /// Cell volume (area for thin disks, length in 1D)
    pub volume: f64,
}

impl CellGeometry {
    /// Express a Cartesian vector in the local basis
    #[inline]
    pub fn to_local(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        self.basis.transpose() * cartesian
    }

    /// Express a local-basis vector in Cartesian components
    #[inline]
    pub fn to_cartesian(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.basis * local
    }

    /// Azimuthal unit vector in the local basis
    pub fn e_phi(&self) -> Vector3<f64> {
        let (s, c) = self.position.y.atan2(self.position.x).sin_cos();
        self.to_local(&Vector3::new(-s, c, 0.0))
    }

    /// Cylindrical radial unit vector in the local basis
    pub fn e_cyl(&self) -> Vector3<f64> {
        let (s, c) = self.position.y.atan2(self.position.x).sin_cos();
        self.to_local(&Vector3::new(c, s, 0.0))
    }

    /// z unit vector in the local basis
    pub fn e_z(&self) -> Vector3<f64> {
        self.to_local(&Vector3::z())
    }
}

/// Uniform logical mesh with ghost halo
#[derive(Debug, Clone)]
pub struct Mesh {
    geometry: Geometry,
    num: [usize; 3],
    ghost: [usize; 3],
    delta: [f64; 3],
    lower: [f64; 3],
    omega: f64,
    cells: Array3<CellGeometry>,
}

impl Mesh {
    /// Build the mesh and precompute cell geometry
    pub fn new(config: &MeshConfig) -> Result<Self> {
        let num = [config.inum, config.jnum, config.knum];
        let bounds = [
            (config.xmin, config.xmax),
            (config.ymin, config.ymax),
            (config.zmin, config.zmax),
        ];

        if num.iter().any(|&n| n == 0) {
            return Err(Error::config("mesh", "new", "every direction needs at least one cell"));
        }
        for (d, (lo, hi)) in bounds.iter().enumerate() {
            if !(hi > lo) {
                return Err(Error::config(
                    "mesh",
                    "new",
                    format!("direction {} has empty extent [{}, {}]", d, lo, hi),
                ));
            }
        }
        if config.geometry != Geometry::Cartesian && config.xmin < 0.0 {
            return Err(Error::config("mesh", "new", "radial coordinate must be non-negative"));
        }

        let ghost = num.map(|n| if n > 1 { config.ghost } else { 0 });
        let delta = [0, 1, 2].map(|d| (bounds[d].1 - bounds[d].0) / num[d] as f64);
        let lower = [0, 1, 2].map(|d| bounds[d].0);
        let shape = (num[0] + 2 * ghost[0], num[1] + 2 * ghost[1], num[2] + 2 * ghost[2]);

        let mut mesh = Self {
            geometry: config.geometry,
            num,
            ghost,
            delta,
            lower,
            omega: config.omega,
            cells: Array3::from_elem(
                shape,
                CellGeometry {
                    position: Vector3::zeros(),
                    radius: 0.0,
                    basis: Matrix3::identity(),
                    dl: Vector3::zeros(),
                    volume: 0.0,
                },
            ),
        };

        let midplane = config.geometry != Geometry::Spherical && num[2] == 1;
        for ((i, j, k), cell) in mesh.cells.indexed_iter_mut() {
            let mut xi = [0, 1, 2].map(|d| {
                let index = [i, j, k][d] as f64 - ghost[d] as f64;
                lower[d] + (index + 0.5) * delta[d]
            });
            if midplane {
                xi[2] = 0.0;
            }
            *cell = cell_geometry(config.geometry, xi, delta, num);
        }

        log::debug!(
            "mesh: {:?} {}x{}x{} cells, ghost {:?}, omega {}",
            config.geometry, num[0], num[1], num[2], ghost, config.omega
        );

        Ok(mesh)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Index-box shape including ghost cells
    pub fn shape(&self) -> (usize, usize, usize) {
        self.cells.dim()
    }

    /// Number of active cells per direction
    pub fn num(&self) -> [usize; 3] {
        self.num
    }

    /// Ghost cells per side per direction
    pub fn ghost(&self) -> [usize; 3] {
        self.ghost
    }

    /// Logical spacing per direction
    pub fn delta(&self) -> [f64; 3] {
        self.delta
    }

    /// Frame rotation rate
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Whether direction `d` has more than one cell
    pub fn is_active_dir(&self, d: usize) -> bool {
        self.num[d] > 1
    }

    /// Number of directions with more than one cell
    pub fn active_dims(&self) -> usize {
        (0..3).filter(|&d| self.is_active_dir(d)).count()
    }

    /// Active index range along direction `d`
    pub fn active_range(&self, d: usize) -> RangeInclusive<usize> {
        self.ghost[d]..=self.ghost[d] + self.num[d] - 1
    }

    /// Iterate over active cell indices in `(i, j, k)` order
    pub fn active_cells(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let (ri, rj, rk) = (self.active_range(0), self.active_range(1), self.active_range(2));
        ri.flat_map(move |i| {
            let rk = rk.clone();
            rj.clone().flat_map(move |j| rk.clone().map(move |k| (i, j, k)))
        })
    }

    /// Active range along `d` grown by `width` ghost layers
    ///
    /// One-cell directions are not grown.
    pub fn extended_range(&self, d: usize, width: usize) -> RangeInclusive<usize> {
        let range = self.active_range(d);
        if self.is_active_dir(d) {
            let width = width.min(self.ghost[d]);
            (*range.start() - width)..=(*range.end() + width)
        } else {
            range
        }
    }

    /// Iterate over active cells plus `width` ghost layers in `(i, j, k)` order
    pub fn extended_cells(&self, width: usize) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        let (ri, rj, rk) = (
            self.extended_range(0, width),
            self.extended_range(1, width),
            self.extended_range(2, width),
        );
        ri.flat_map(move |i| {
            let rk = rk.clone();
            rj.clone().flat_map(move |j| rk.clone().map(move |k| (i, j, k)))
        })
    }

    /// Total number of active cells
    pub fn active_count(&self) -> usize {
        self.num.iter().product()
    }

    /// Whether `(i, j, k)` is an active cell
    pub fn is_active(&self, i: usize, j: usize, k: usize) -> bool {
        self.active_range(0).contains(&i) && self.active_range(1).contains(&j) && self.active_range(2).contains(&k)
    }

    /// Geometry of a cell
    #[inline]
    pub fn cell(&self, i: usize, j: usize, k: usize) -> &CellGeometry {
        &self.cells[[i, j, k]]
    }

    /// All cell geometries over the index box
    pub fn cells(&self) -> &Array3<CellGeometry> {
        &self.cells
    }
}

fn cell_geometry(geometry: Geometry, xi: [f64; 3], delta: [f64; 3], num: [usize; 3]) -> CellGeometry {
    let (position, basis, scale) = match geometry {
        Geometry::Cartesian => (Vector3::new(xi[0], xi[1], xi[2]), Matrix3::identity(), Vector3::new(1.0, 1.0, 1.0)),
        Geometry::Cylindrical => {
            let (r, (s, c), z) = (xi[0], xi[1].sin_cos(), xi[2]);
            let basis = Matrix3::from_columns(&[
                Vector3::new(c, s, 0.0),
                Vector3::new(-s, c, 0.0),
                Vector3::z(),
            ]);
            (Vector3::new(r * c, r * s, z), basis, Vector3::new(1.0, r, 1.0))
        }
        Geometry::Spherical => {
            let (r, (st, ct), (sp, cp)) = (xi[0], xi[1].sin_cos(), xi[2].sin_cos());
            let basis = Matrix3::from_columns(&[
                Vector3::new(st * cp, st * sp, ct),
                Vector3::new(ct * cp, ct * sp, -st),
                Vector3::new(-sp, cp, 0.0),
            ]);
            (Vector3::new(r * st * cp, r * st * sp, r * ct), basis, Vector3::new(1.0, r, r * st))
        }
    };

    let dl = Vector3::new(scale.x * delta[0], scale.y * delta[1], scale.z * delta[2]);
    let volume = (0..3).filter(|&d| num[d] > 1).map(|d| dl[d]).product::<f64>();
    let radius = position.x.hypot(position.y);

    CellGeometry { position, radius, basis, dl, volume }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, TAU};

    fn polar(inum: usize, jnum: usize) -> Mesh {
        Mesh::new(&MeshConfig {
            geometry: Geometry::Cylindrical,
            inum,
            jnum,
            xmin: 1.0,
            xmax: 2.0,
            ymin: 0.0,
            ymax: TAU,
            ..MeshConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_ghost_only_in_active_directions() {
        let mesh = polar(8, 4);
        assert_eq!(mesh.ghost(), [2, 2, 0]);
        assert_eq!(mesh.shape(), (12, 8, 1));
        assert_eq!(mesh.active_range(0), 2..=9);
        assert_eq!(mesh.active_range(2), 0..=0);
        assert_eq!(mesh.active_cells().count(), mesh.active_count());
        assert_eq!(mesh.extended_range(0, 1), 1..=10);
        assert_eq!(mesh.extended_range(2, 1), 0..=0);
        assert_eq!(mesh.extended_cells(1).count(), 10 * 6);
    }

    #[test]
    fn test_cylindrical_unit_vectors() {
        let mesh = polar(8, 4);
        let cell = mesh.cell(3, 3, 0);

        let e_phi = cell.e_phi();
        assert!((e_phi - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
        assert!((cell.e_cyl() - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((cell.radius - cell.position.xy().norm()).abs() < 1e-12);
    }

    #[test]
    fn test_cartesian_azimuthal_vector() {
        let mesh = Mesh::new(&MeshConfig {
            inum: 2,
            jnum: 2,
            xmin: -1.0,
            xmax: 1.0,
            ymin: -1.0,
            ymax: 1.0,
            ..MeshConfig::default()
        })
        .unwrap();

        // centre at (0.5, 0.5): e_phi = (-1, 1)/sqrt(2)
        let cell = mesh.cell(3, 3, 0);
        let expected = Vector3::new(-1.0, 1.0, 0.0) / 2f64.sqrt();
        assert!((cell.e_phi() - expected).norm() < 1e-12);
    }

    #[test]
    fn test_spherical_spacing() {
        let mesh = Mesh::new(&MeshConfig {
            geometry: Geometry::Spherical,
            inum: 4,
            jnum: 1,
            knum: 4,
            xmin: 1.0,
            xmax: 2.0,
            ymin: FRAC_PI_2 - 0.1,
            ymax: FRAC_PI_2 + 0.1,
            zmin: 0.0,
            zmax: TAU,
            ..MeshConfig::default()
        })
        .unwrap();

        let cell = mesh.cell(2, 0, 2);
        let r = 1.0 + 0.125;
        assert!((cell.dl.x - 0.25).abs() < 1e-12);
        assert!((cell.dl.z - r * TAU / 4.0).abs() < 1e-12);
        // thin in theta: area element only
        assert!((cell.volume - cell.dl.x * cell.dl.z).abs() < 1e-12);
    }

    #[test]
    fn test_thin_disk_cells_sit_on_midplane() {
        // default z extent is [0, 1]
        let mesh = polar(8, 4);
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            assert_eq!(cell.position.z, 0.0, "cell ({}, {}, {})", i, j, k);
        }
        assert!((mesh.cell(3, 3, 0).dl.z - 1.0).abs() < 1e-15);

        let slab = Mesh::new(&MeshConfig { inum: 2, knum: 2, ..MeshConfig::default() }).unwrap();
        assert!((slab.cell(2, 0, 2).position.z - 0.25).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_empty_extent() {
        let err = Mesh::new(&MeshConfig { inum: 4, xmin: 1.0, xmax: 1.0, ..MeshConfig::default() }).unwrap_err();
        assert!(err.is_configuration());
    }
}
