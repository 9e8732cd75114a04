//! Gravity source
//!
//! [`GravitySource`] owns an ordered list of contributors and sums their
//! accelerations and potentials. When disk-height tracking is enabled it
//! also maintains the pressure scale height of the disk:
//!
//! 1. every point mass supplies `h_i = c_s / Ω_K,i`, combined as
//!    `1/h_ext² = Σ 1/h_i²`;
//! 2. with self-gravity the external height is folded with the disk's own
//!    gravity, otherwise `h = h_ext`.
//!
//! With a single point mass and no self-gravity the height is that point
//! mass's height, bit for bit.

mod point_mass;
mod self_gravity;

use ndarray::Axis;

use crate::error::{Error, Result};
use crate::mesh::{Mesh, MeshField, VectorField, field};
use crate::physics::{Physics, StateVector};
use crate::sources::config::{ContributorConfig, GravityConfig};
use crate::sources::{SourceKind, SourceTerm};

pub use point_mass::PointMass;
pub use self_gravity::SelfGravity;

// =================================================================================================
// Contributors
// =================================================================================================

/// One term of the gravitational field
#[derive(Debug, Clone)]
pub enum GravityContributor {
    PointMass(PointMass),
    SelfGravity(SelfGravity),
}

impl GravityContributor {
    /// Build a contributor from its configuration
    pub fn from_config(mesh: &Mesh, gn: f64, config: &ContributorConfig) -> Result<Self> {
        Ok(match config {
            ContributorConfig::PointMass(c) => Self::PointMass(PointMass::new(mesh, gn, c)?),
            ContributorConfig::SelfGravity(c) => Self::SelfGravity(SelfGravity::new(mesh, gn, c)?),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PointMass(_) => "point mass",
            Self::SelfGravity(_) => "self-gravity",
        }
    }

    /// Bring the contributor's field up to date with `pvar`
    pub fn update(&mut self, mesh: &Mesh, pvar: &StateVector) -> Result<()> {
        match self {
            Self::PointMass(_) => Ok(()),
            Self::SelfGravity(sg) => sg.update(mesh, pvar),
        }
    }

    /// Acceleration in the local basis, three components per cell
    pub fn accel(&self) -> &VectorField {
        match self {
            Self::PointMass(pm) => pm.accel(),
            Self::SelfGravity(sg) => sg.accel(),
        }
    }

    pub fn potential(&self) -> &MeshField {
        match self {
            Self::PointMass(pm) => pm.potential(),
            Self::SelfGravity(sg) => sg.potential(),
        }
    }
}

// =================================================================================================
// Gravity Source
// =================================================================================================

/// Working fields of disk-height tracking
#[derive(Debug, Clone)]
struct DiskHeight {
    height: MeshField,
    inv_height2: MeshField,
    h_external: MeshField,
    scratch: MeshField,
}

impl DiskHeight {
    fn new(mesh: &Mesh) -> Result<Self> {
        Ok(Self {
            height: field::scalar_field(mesh.shape(), 0.0, "gravity")?,
            inv_height2: field::scalar_field(mesh.shape(), 0.0, "gravity")?,
            h_external: field::scalar_field(mesh.shape(), 0.0, "gravity")?,
            scratch: field::scalar_field(mesh.shape(), 0.0, "gravity")?,
        })
    }
}

/// Gravity module of the source chain
#[derive(Debug, Clone)]
pub struct GravitySource {
    contributors: Vec<GravityContributor>,
    accel: VectorField,
    potential: MeshField,
    disk: Option<DiskHeight>,
    self_gravity: Option<usize>,
    energy_source: bool,
}

impl GravitySource {
    /// Build the module and its contributors from configuration
    pub fn new(mesh: &Mesh, physics: &dyn Physics, config: &GravityConfig) -> Result<Self> {
        let contributors = config
            .contributors
            .iter()
            .map(|c| GravityContributor::from_config(mesh, config.gn, c))
            .collect::<Result<Vec<_>>>()?;
        Self::with_contributors(mesh, physics, contributors, config.update_disk_height, config.energy_source)
    }

    /// Build the module around ready-made contributors
    ///
    /// # Errors
    ///
    /// `Configuration` if height tracking is requested but no contributor can
    /// supply a height, or self-gravity is asked for a height on a mesh that
    /// is not a vertically integrated disk.
    pub fn with_contributors(
        mesh: &Mesh,
        physics: &dyn Physics,
        contributors: Vec<GravityContributor>,
        update_disk_height: bool,
        energy_source: bool,
    ) -> Result<Self> {
        let self_gravity_indices: Vec<usize> = contributors
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, GravityContributor::SelfGravity(_)))
            .map(|(n, _)| n)
            .collect();
        if self_gravity_indices.len() > 1 {
            log::warn!(
                "gravity: {} self-gravity contributors configured, only the last one enters the disk height",
                self_gravity_indices.len()
            );
        }
        let self_gravity = self_gravity_indices.last().copied();

        let disk = if update_disk_height {
            let external = contributors.iter().any(|c| matches!(c, GravityContributor::PointMass(_)));
            if !external && self_gravity.is_none() {
                return Err(Error::config(
                    "gravity",
                    "new",
                    "disk height tracking needs at least one point mass or self-gravity contributor",
                ));
            }
            if self_gravity.is_some() && !SelfGravity::supports_height(mesh) {
                return Err(Error::config(
                    "gravity",
                    "new",
                    "self-gravity disk height needs a vertically integrated (thin disk) mesh",
                ));
            }
            Some(DiskHeight::new(mesh)?)
        } else {
            None
        };

        if contributors.is_empty() {
            log::warn!("gravity: no contributors configured, the module adds nothing");
        }

        log::info!(
            "gravity: {} contributor(s) [{}], disk height {}",
            contributors.len(),
            contributors.iter().map(|c| c.name()).collect::<Vec<_>>().join(", "),
            if update_disk_height { "on" } else { "off" }
        );

        Ok(Self {
            accel: field::vector_field(mesh.shape(), physics.velocity_dims(), 0.0, "gravity")?,
            potential: field::scalar_field(mesh.shape(), 0.0, "gravity")?,
            contributors,
            disk,
            self_gravity,
            energy_source,
        })
    }

    /// Sum all contributors into the total acceleration and potential
    pub fn update_gravity(&mut self, mesh: &Mesh, pvar: &StateVector) -> Result<()> {
        self.accel.fill(0.0);
        self.potential.fill(0.0);
        let dims = self.accel.len_of(Axis(3));

        for contributor in self.contributors.iter_mut() {
            contributor.update(mesh, pvar)?;
            let accel = contributor.accel();
            for d in 0..dims {
                let mut total = self.accel.index_axis_mut(Axis(3), d);
                total += &accel.index_axis(Axis(3), d);
            }
            self.potential += contributor.potential();
        }
        Ok(())
    }

    /// Recompute the disk scale height on active cells
    ///
    /// # Errors
    ///
    /// `Configuration` if height tracking is disabled or no contributor
    /// supplies a height.
    pub fn calc_disk_height(&mut self, mesh: &Mesh, physics: &dyn Physics, pvar: &StateVector) -> Result<()> {
        let Self { contributors, disk, self_gravity, .. } = self;
        let disk = disk
            .as_mut()
            .ok_or_else(|| Error::config("gravity", "calc_disk_height", "disk height tracking is disabled"))?;

        disk.inv_height2.fill(0.0);
        let mut external = 0usize;
        for contributor in contributors.iter() {
            if let GravityContributor::PointMass(pm) = contributor {
                pm.scale_height(mesh, physics, pvar, &mut disk.scratch);
                for (i, j, k) in mesh.active_cells() {
                    let h = disk.scratch[[i, j, k]];
                    disk.inv_height2[[i, j, k]] += 1.0 / (h * h);
                }
                if external == 0 {
                    disk.h_external.assign(&disk.scratch);
                }
                external += 1;
            }
        }
        if external > 1 {
            for (i, j, k) in mesh.active_cells() {
                disk.h_external[[i, j, k]] = 1.0 / disk.inv_height2[[i, j, k]].sqrt();
            }
        }

        match *self_gravity {
            Some(n) => {
                if external == 0 {
                    disk.h_external.fill(f64::INFINITY);
                }
                if let GravityContributor::SelfGravity(sg) = &contributors[n] {
                    sg.fold_height(mesh, physics, pvar, &disk.h_external, &mut disk.height);
                }
            }
            None if external == 0 => {
                return Err(Error::config("gravity", "calc_disk_height", "no contributor supplies a disk height"));
            }
            None => disk.height.assign(&disk.h_external),
        }

        log::trace!("gravity: disk height updated from {} external contributor(s)", external);
        Ok(())
    }

    /// Total acceleration, one component per velocity dimension
    pub fn accel(&self) -> &VectorField {
        &self.accel
    }

    pub fn potential(&self) -> &MeshField {
        &self.potential
    }

    /// Current disk scale height, if tracked
    pub fn height(&self) -> Option<&MeshField> {
        self.disk.as_ref().map(|d| &d.height)
    }

    /// Height set by the point masses alone, if tracked
    pub fn external_height(&self) -> Option<&MeshField> {
        self.disk.as_ref().map(|d| &d.h_external)
    }

    /// `Σ 1/h_i²` over point masses, if tracked
    pub fn inv_height2(&self) -> Option<&MeshField> {
        self.disk.as_ref().map(|d| &d.inv_height2)
    }

    pub fn contributors(&self) -> &[GravityContributor] {
        &self.contributors
    }
}

impl SourceTerm for GravitySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gravity
    }

    fn name(&self) -> &str {
        "gravity"
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
        self.update_gravity(mesh, pvar)?;
        if self.disk.is_some() {
            self.calc_disk_height(mesh, physics, pvar)?;
        }

        physics.external_accel_source(mesh, pvar, &self.accel, sterm);
        if !self.energy_source {
            if let Some(e) = physics.energy_index() {
                sterm.data_mut().index_axis_mut(Axis(3), e).fill(0.0);
            }
        }
        Ok(())
    }

    fn finalize(&mut self) {
        self.disk = None;
    }
}
