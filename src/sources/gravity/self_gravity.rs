//! Self-gravity of a thin disk
//!
//! Acceleration and potential are obtained by direct summation over the
//! active cells with a softened Green's function, treating the density of
//! each cell as a surface density and `ρ · volume` as its mass. The sum is
//! `O(N²)` and runs in parallel over target cells above the parallel
//! threshold.
//!
//! The disk height including self-gravity solves
//!
//! ```text
//! (c²/h_e²) h² + π G Σ h − c² = 0
//! ```
//!
//! where `h_e` is the height set by the external (point-mass) potential.

use nalgebra::Vector3;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::f64::consts::PI;

use crate::error::{Error, Result};
use crate::mesh::{Geometry, Mesh, MeshField, VectorField, field};
use crate::physics::{Physics, StateVector};
use crate::sources::config::SelfGravityConfig;

/// Direct-summation self-gravity
#[derive(Debug, Clone)]
pub struct SelfGravity {
    gn: f64,
    softening: f64,
    accel: VectorField,
    potential: MeshField,
}

impl SelfGravity {
    pub fn new(mesh: &Mesh, gn: f64, config: &SelfGravityConfig) -> Result<Self> {
        if !(gn > 0.0) {
            return Err(Error::config("self-gravity", "new", "gravitational constant must be positive"));
        }
        if !(config.softening >= 0.0) {
            return Err(Error::config("self-gravity", "new", "softening must be non-negative"));
        }
        Ok(Self {
            gn,
            softening: config.softening,
            accel: field::vector_field(mesh.shape(), 3, 0.0, "self-gravity")?,
            potential: field::scalar_field(mesh.shape(), 0.0, "self-gravity")?,
        })
    }

    /// Whether the mesh describes a vertically integrated disk
    pub fn supports_height(mesh: &Mesh) -> bool {
        mesh.geometry() != Geometry::Spherical && !mesh.is_active_dir(2)
    }

    /// Recompute acceleration and potential from the current density
    pub fn update(&mut self, mesh: &Mesh, pvar: &StateVector) -> Result<()> {
        let cells: Vec<(usize, usize, usize)> = mesh.active_cells().collect();
        let sources: Vec<(Vector3<f64>, f64)> = cells
            .iter()
            .map(|&(i, j, k)| {
                let cell = mesh.cell(i, j, k);
                (cell.position, pvar.get(i, j, k, 0) * cell.volume)
            })
            .collect();

        let (gn, eps2) = (self.gn, self.softening * self.softening);
        let at_target = |t: usize| -> (Vector3<f64>, f64) {
            let target = sources[t].0;
            let mut accel = Vector3::zeros();
            let mut phi = 0.0;
            for (s, &(position, mass)) in sources.iter().enumerate() {
                if s == t {
                    continue;
                }
                let separation = target - position;
                let dist = (separation.norm_squared() + eps2).sqrt();
                accel -= gn * mass / (dist * dist * dist) * separation;
                phi -= gn * mass / dist;
            }
            (accel, phi)
        };

        #[cfg(feature = "parallel")]
        let fields: Vec<(Vector3<f64>, f64)> = if cells.len() > crate::solver::parallel_threshold() {
            (0..cells.len()).into_par_iter().map(at_target).collect()
        } else {
            (0..cells.len()).map(at_target).collect()
        };
        #[cfg(not(feature = "parallel"))]
        let fields: Vec<(Vector3<f64>, f64)> = (0..cells.len()).map(at_target).collect();

        for (&(i, j, k), (accel, phi)) in cells.iter().zip(fields) {
            if !(accel.iter().all(|a| a.is_finite()) && phi.is_finite()) {
                return Err(Error::invalid_state(
                    "self-gravity",
                    "update",
                    format!("non-finite field at cell ({}, {}, {}); coincident cells need softening", i, j, k),
                ));
            }
            let local = mesh.cell(i, j, k).to_local(&accel);
            for d in 0..3 {
                self.accel[[i, j, k, d]] = local[d];
            }
            self.potential[[i, j, k]] = phi;
        }
        Ok(())
    }

    /// Fold the external height `h_external` with the disk's own gravity
    ///
    /// An infinite `h_external` yields the pure self-gravity height
    /// `c² / (π G Σ)`.
    pub fn fold_height(
        &self,
        mesh: &Mesh,
        physics: &dyn Physics,
        pvar: &StateVector,
        h_external: &MeshField,
        height: &mut MeshField,
    ) {
        for (i, j, k) in mesh.active_cells() {
            let c2 = physics.sound_speed_sq(pvar.cell(i, j, k));
            if c2 <= 0.0 {
                height[[i, j, k]] = 0.0;
                continue;
            }
            let he = h_external[[i, j, k]];
            let a = c2 / (he * he);
            let b = PI * self.gn * pvar.get(i, j, k, 0);
            // root of a h² + b h - c² = 0 without cancellation
            height[[i, j, k]] = 2.0 * c2 / (b + (b * b + 4.0 * a * c2).sqrt());
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
