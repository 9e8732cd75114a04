//! Viscosity source
//!
//! Computes the dynamic viscosity `η` with one of several prescriptions,
//! derives the bulk viscosity, and hands both to the physics module, which
//! builds the stress tensor and its divergence.
//!
//! | model     | η                      | bulk        |
//! |-----------|------------------------|-------------|
//! | molecular | `dynconst`             | `bulkconst` |
//! | alpha     | `α ρ c_s² / \|Ω\|`     | `-2/3 η`    |
//! | beta      | `β ρ r² \|Ω\|`         | `-2/3 η`    |
//! | pringle   | `ν ρ`                  | `-2/3 η`    |
//!
//! `Ω = v_φ / r + Ω_frame` is the local angular velocity about the z axis.
//! The fields are cached per evaluation time (see [`Memo`]); the molecular
//! fields never change and are computed once.
//!
//! The stress stencil carries the metric terms of cylindrical meshes. On
//! spherical meshes it differentiates the local velocity components in index
//! space only, so a rotating flow there picks up spurious shear stress.

use nalgebra::Vector3;

use crate::error::{Error, Result};
use crate::mesh::{Mesh, MeshField, VectorField, field};
use crate::physics::{Physics, STRESS_COMPONENTS, StateVector};
use crate::sources::config::{EnvelopeConfig, ViscosityConfig, ViscosityModel};
use crate::sources::memo::Memo;
use crate::sources::{SourceKind, SourceTerm};

/// Dynamic and bulk viscosity over the mesh
#[derive(Debug, Clone, PartialEq)]
pub struct ViscosityFields {
    pub dynvis: MeshField,
    pub bulkvis: MeshField,
}

/// Viscosity module of the source chain
#[derive(Debug, Clone)]
pub struct ViscositySource {
    model: ViscosityModel,
    cvis: f64,
    frame_omega: f64,
    envelope: Option<MeshField>,
    memo: Memo<ViscosityFields>,
    stress: VectorField,
}

impl ViscositySource {
    /// Validate the prescription against mesh and physics and allocate fields
    ///
    /// # Errors
    ///
    /// `Configuration` for the alpha-alt prescription, invalid parameters,
    /// alpha/beta with fewer than two velocity components, or fewer than two
    /// ghost layers in an active direction.
    pub fn new(mesh: &Mesh, physics: &dyn Physics, config: &ViscosityConfig) -> Result<Self> {
        let model = config.model;
        let positive = |name: &str, value: f64| -> Result<()> {
            if value > 0.0 {
                Ok(())
            } else {
                Err(Error::config("viscosity", "new", format!("{} must be positive, got {}", name, value)))
            }
        };
        let non_negative = |name: &str, value: f64| -> Result<()> {
            if value >= 0.0 {
                Ok(())
            } else {
                Err(Error::config("viscosity", "new", format!("{} must be non-negative, got {}", name, value)))
            }
        };

        match model {
            ViscosityModel::Molecular { dynconst, .. } => non_negative("dynconst", dynconst)?,
            ViscosityModel::Alpha { alpha } => positive("alpha", alpha)?,
            ViscosityModel::Beta { beta } => positive("beta", beta)?,
            ViscosityModel::Pringle { nu } => non_negative("nu", nu)?,
            ViscosityModel::AlphaAlt { .. } => {
                return Err(Error::config(
                    "viscosity",
                    "new",
                    "alpha-alt prescription needs the gravity disk height and is not supported, use alpha",
                ));
            }
        }
        positive("cvis", config.cvis)?;

        if matches!(model, ViscosityModel::Alpha { .. } | ViscosityModel::Beta { .. }) && physics.velocity_dims() < 2 {
            return Err(Error::config(
                "viscosity",
                "new",
                format!("{} viscosity needs at least 2 velocity components", model.name()),
            ));
        }
        if let Some(d) = (0..3).find(|&d| mesh.is_active_dir(d) && mesh.ghost()[d] < 2) {
            return Err(Error::config(
                "viscosity",
                "new",
                format!("stress stencil needs 2 ghost layers, direction {} has {}", d, mesh.ghost()[d]),
            ));
        }

        let fields = ViscosityFields {
            dynvis: field::scalar_field(mesh.shape(), 0.0, "viscosity")?,
            bulkvis: field::scalar_field(mesh.shape(), 0.0, "viscosity")?,
        };
        let envelope = config.envelope.map(|e| envelope_mask(mesh, &e)).transpose()?;

        let mut source = Self {
            model,
            cvis: config.cvis,
            frame_omega: mesh.omega(),
            envelope,
            memo: Memo::new(fields),
            stress: field::vector_field(mesh.shape(), STRESS_COMPONENTS, 0.0, "viscosity")?,
        };
        source.init_molecular(mesh)?;

        log::info!("viscosity: {} prescription, cvis = {}", model.name(), config.cvis);
        Ok(source)
    }

    /// Replace the envelope mask
    ///
    /// Values must lie in `[0, 1]`; the cached fields are invalidated.
    pub fn with_envelope(mut self, mesh: &Mesh, mask: MeshField) -> Result<Self> {
        if mask.dim() != mesh.shape() {
            return Err(Error::config(
                "viscosity",
                "with_envelope",
                format!("mask shape {:?} does not match mesh {:?}", mask.dim(), mesh.shape()),
            ));
        }
        if mask.iter().any(|m| !(0.0..=1.0).contains(m)) {
            return Err(Error::config("viscosity", "with_envelope", "mask values must lie in [0, 1]"));
        }
        self.envelope = Some(mask);
        self.memo.invalidate();
        self.init_molecular(mesh)?;
        Ok(self)
    }

    fn init_molecular(&mut self, mesh: &Mesh) -> Result<()> {
        if let ViscosityModel::Molecular { dynconst, bulkconst } = self.model {
            let envelope = self.envelope.as_ref();
            self.memo.refresh(0.0, |fields| -> Result<()> {
                for ((i, j, k), _) in mesh.cells().indexed_iter() {
                    let mask = envelope.map_or(1.0, |e| e[[i, j, k]]);
                    fields.dynvis[[i, j, k]] = mask * dynconst;
                    fields.bulkvis[[i, j, k]] = mask * bulkconst;
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Recompute `η` and the bulk viscosity for `time` if stale
    ///
    /// Returns whether the fields were recomputed. Values are set on active
    /// cells and one ghost layer, which is what the stress stencil reads.
    pub fn update_viscosity(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        pvar: &StateVector,
    ) -> Result<bool> {
        if matches!(self.model, ViscosityModel::Molecular { .. }) {
            return Ok(false);
        }

        let (model, frame_omega) = (self.model, self.frame_omega);
        let envelope = self.envelope.as_ref();
        let dims = physics.velocity_dims();

        let updated = self.memo.refresh(time, |fields| -> Result<()> {
            for (i, j, k) in mesh.extended_cells(1) {
                let cell = mesh.cell(i, j, k);
                let rho = pvar.get(i, j, k, 0);
                let angular = || {
                    let mut v = Vector3::<f64>::zeros();
                    for d in 0..dims {
                        v[d] = pvar.get(i, j, k, 1 + d);
                    }
                    if cell.radius > 0.0 { v.dot(&cell.e_phi()) / cell.radius + frame_omega } else { frame_omega }
                };

                let eta = match model {
                    ViscosityModel::Alpha { alpha } => {
                        let omega = angular().abs();
                        if omega > 0.0 {
                            alpha * rho * physics.sound_speed_sq(pvar.cell(i, j, k)) / omega
                        } else {
                            0.0
                        }
                    }
                    ViscosityModel::Beta { beta } => beta * rho * cell.radius * cell.radius * angular().abs(),
                    ViscosityModel::Pringle { nu } => nu * rho,
                    ViscosityModel::Molecular { .. } | ViscosityModel::AlphaAlt { .. } => 0.0,
                };
                let eta = eta * envelope.map_or(1.0, |e| e[[i, j, k]]);

                fields.dynvis[[i, j, k]] = eta;
                fields.bulkvis[[i, j, k]] = -2.0 / 3.0 * eta;
            }
            Ok(())
        })?;

        if updated {
            log::trace!("viscosity: fields updated at t = {:e}", time);
        }
        Ok(updated)
    }

    pub fn model(&self) -> ViscosityModel {
        self.model
    }

    pub fn dynamic_viscosity(&self) -> &MeshField {
        &self.memo.get().dynvis
    }

    pub fn bulk_viscosity(&self) -> &MeshField {
        &self.memo.get().bulkvis
    }

    /// Stress tensor of the last source evaluation, `[xx, xy, xz, yy, yz, zz]`
    pub fn stress(&self) -> &VectorField {
        &self.stress
    }

    /// Time the cached fields belong to
    pub fn last_update(&self) -> Option<f64> {
        self.memo.last_time()
    }
}

/// Product of two smooth steps in cylindrical radius
fn envelope_mask(mesh: &Mesh, config: &EnvelopeConfig) -> Result<MeshField> {
    if !(config.width > 0.0) || !(config.outer > config.inner) {
        return Err(Error::config(
            "viscosity",
            "envelope",
            format!("need width > 0 and outer > inner, got {:?}", config),
        ));
    }
    let smoothstep = |x: f64| {
        let s = x.clamp(0.0, 1.0);
        s * s * (3.0 - 2.0 * s)
    };
    let mut mask = field::scalar_field(mesh.shape(), 0.0, "viscosity")?;
    for ((i, j, k), cell) in mesh.cells().indexed_iter() {
        let r = cell.radius;
        mask[[i, j, k]] = smoothstep((r - config.inner) / config.width) * smoothstep((config.outer - r) / config.width);
    }
    Ok(mask)
}

impl SourceTerm for ViscositySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Viscosity
    }

    fn name(&self) -> &str {
        "viscosity"
    }

    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        _dt: f64,
        pvar: &StateVector,
        _cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        self.update_viscosity(mesh, physics, time, pvar)?;
        let fields = self.memo.get();
        physics.calc_stresses(mesh, pvar, &fields.dynvis, &fields.bulkvis, &mut self.stress);
        physics.viscous_source(mesh, pvar, &self.stress, sterm);
        Ok(())
    }

    /// `dt ≤ cvis / max(ν / Δl²)` over active cells and active directions
    fn compute_timestep_constraint(
        &mut self,
        mesh: &Mesh,
        physics: &dyn Physics,
        time: f64,
        pvar: &StateVector,
        _cvar: &StateVector,
        dt: f64,
    ) -> Result<f64> {
        self.update_viscosity(mesh, physics, time, pvar)?;
        let dynvis = &self.memo.get().dynvis;

        let mut rate: f64 = 0.0;
        for (i, j, k) in mesh.active_cells() {
            let nu = dynvis[[i, j, k]] / pvar.get(i, j, k, 0);
            let dl = mesh.cell(i, j, k).dl;
            for d in (0..3).filter(|&d| mesh.is_active_dir(d)) {
                rate = rate.max(nu / (dl[d] * dl[d]));
            }
        }

        if rate < f64::EPSILON {
            return Ok(dt);
        }
        Ok(dt.min(self.cvis / rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Geometry, MeshConfig};
    use crate::physics::{EulerPhysics, IsothermalPhysics, VarKind};
    use std::f64::consts::TAU;

    fn disk_mesh() -> Mesh {
        Mesh::new(&MeshConfig {
            geometry: Geometry::Cylindrical,
            inum: 8,
            jnum: 8,
            xmin: 1.0,
            xmax: 3.0,
            ymin: 0.0,
            ymax: TAU,
            ..MeshConfig::default()
        })
        .unwrap()
    }

    /// Keplerian disk, `ρ = 1`, `v_φ = r^{-1/2}`
    fn keplerian(mesh: &Mesh) -> StateVector {
        let mut pvar = StateVector::zeros(mesh, 3, VarKind::Primitive).unwrap();
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            pvar.set(i, j, k, 0, 1.0);
            pvar.set(i, j, k, 2, cell.radius.powf(-0.5));
        }
        pvar
    }

    fn source(mesh: &Mesh, physics: &dyn Physics, model: ViscosityModel) -> ViscositySource {
        ViscositySource::new(mesh, physics, &ViscosityConfig::new(model)).unwrap()
    }

    #[test]
    fn test_alpha_alt_is_rejected() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let config = ViscosityConfig::new(ViscosityModel::AlphaAlt { alpha: 0.01 });
        assert!(ViscositySource::new(&mesh, &physics, &config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_alpha_needs_azimuthal_velocity() {
        let mesh = Mesh::new(&MeshConfig { inum: 8, ..MeshConfig::default() }).unwrap();
        let physics = IsothermalPhysics::new(0.05, 1).unwrap();
        let config = ViscosityConfig::new(ViscosityModel::Alpha { alpha: 0.01 });
        assert!(ViscositySource::new(&mesh, &physics, &config).is_err());
    }

    #[test]
    fn test_needs_two_ghost_layers() {
        let mesh = Mesh::new(&MeshConfig { inum: 8, ghost: 1, ..MeshConfig::default() }).unwrap();
        let physics = IsothermalPhysics::new(0.05, 1).unwrap();
        let config = ViscosityConfig::new(ViscosityModel::Pringle { nu: 0.1 });
        assert!(ViscositySource::new(&mesh, &physics, &config).is_err());
    }

    #[test]
    fn test_bulk_is_minus_two_thirds_eta() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let pvar = keplerian(&mesh);

        for model in [
            ViscosityModel::Alpha { alpha: 0.01 },
            ViscosityModel::Beta { beta: 1e-3 },
            ViscosityModel::Pringle { nu: 1e-4 },
        ] {
            let mut visc = source(&mesh, &physics, model);
            visc.update_viscosity(&mesh, &physics, 0.25, &pvar).unwrap();
            for (i, j, k) in mesh.active_cells() {
                let eta = visc.dynamic_viscosity()[[i, j, k]];
                assert!(eta > 0.0, "{} gave {}", model.name(), eta);
                assert_eq!(visc.bulk_viscosity()[[i, j, k]], -2.0 / 3.0 * eta);
            }
        }
    }

    #[test]
    fn test_alpha_and_beta_values() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let pvar = keplerian(&mesh);

        let mut alpha = source(&mesh, &physics, ViscosityModel::Alpha { alpha: 0.01 });
        alpha.update_viscosity(&mesh, &physics, 0.0, &pvar).unwrap();
        let mut beta = source(&mesh, &physics, ViscosityModel::Beta { beta: 1e-3 });
        beta.update_viscosity(&mesh, &physics, 0.0, &pvar).unwrap();

        let r = mesh.cell(4, 4, 0).radius;
        let omega = r.powf(-1.5);
        assert!((alpha.dynamic_viscosity()[[4, 4, 0]] - 0.01 * 0.0025 / omega).abs() < 1e-12);
        assert!((beta.dynamic_viscosity()[[4, 4, 0]] - 1e-3 * r * r * omega).abs() < 1e-12);
    }

    #[test]
    fn test_molecular_constants() {
        let mesh = disk_mesh();
        let physics = EulerPhysics::new(1.4, 2).unwrap();
        let visc = source(&mesh, &physics, ViscosityModel::Molecular { dynconst: 0.3, bulkconst: 0.1 });
        assert_eq!(visc.dynamic_viscosity()[[4, 4, 0]], 0.3);
        assert_eq!(visc.bulk_viscosity()[[4, 4, 0]], 0.1);
    }

    #[test]
    fn test_memoized_on_time() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let mut pvar = keplerian(&mesh);
        let mut visc = source(&mesh, &physics, ViscosityModel::Pringle { nu: 1e-3 });

        assert!(visc.update_viscosity(&mesh, &physics, 0.5, &pvar).unwrap());
        let first = visc.dynamic_viscosity().clone();

        // same non-zero time: cache kept even though the state changed
        pvar.data_mut().index_axis_mut(ndarray::Axis(3), 0).fill(2.0);
        assert!(!visc.update_viscosity(&mesh, &physics, 0.5, &pvar).unwrap());
        assert_eq!(visc.dynamic_viscosity(), &first);

        assert!(visc.update_viscosity(&mesh, &physics, 0.6, &pvar).unwrap());
        assert_eq!(visc.dynamic_viscosity()[[4, 4, 0]], 2e-3);

        // time zero always recomputes
        assert!(visc.update_viscosity(&mesh, &physics, 0.0, &pvar).unwrap());
        assert!(visc.update_viscosity(&mesh, &physics, 0.0, &pvar).unwrap());
    }

    #[test]
    fn test_timestep_constraint() {
        let mesh = Mesh::new(&MeshConfig { inum: 10, jnum: 5, ..MeshConfig::default() }).unwrap();
        let physics = IsothermalPhysics::new(0.1, 2).unwrap();
        let mut pvar = StateVector::zeros(&mesh, 3, VarKind::Primitive).unwrap();
        pvar.data_mut().index_axis_mut(ndarray::Axis(3), 0).fill(1.0);
        let cvar = pvar.zeros_like(VarKind::Conservative).unwrap();

        let mut visc = source(&mesh, &physics, ViscosityModel::Pringle { nu: 0.01 });
        let dt = visc.compute_timestep_constraint(&mesh, &physics, 0.0, &pvar, &cvar, 1.0).unwrap();
        // largest single-direction rate is ν/Δx² = 1; summing with ν/Δy² would give 0.4
        assert!((dt - 0.5 * 0.01 / 0.01).abs() < 1e-12);

        let dt = visc.compute_timestep_constraint(&mesh, &physics, 0.0, &pvar, &cvar, 0.1).unwrap();
        assert_eq!(dt, 0.1);

        let mut inviscid = source(&mesh, &physics, ViscosityModel::Pringle { nu: 0.0 });
        let dt = inviscid.compute_timestep_constraint(&mesh, &physics, 0.0, &pvar, &cvar, 3.0).unwrap();
        assert_eq!(dt, 3.0);
    }

    #[test]
    fn test_envelope_damps_edges() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let pvar = keplerian(&mesh);
        let config = ViscosityConfig {
            envelope: Some(EnvelopeConfig { inner: 1.0, outer: 3.0, width: 0.5 }),
            ..ViscosityConfig::new(ViscosityModel::Pringle { nu: 1e-3 })
        };
        let mut visc = ViscositySource::new(&mesh, &physics, &config).unwrap();
        visc.update_viscosity(&mesh, &physics, 0.0, &pvar).unwrap();

        // r = 1.125 is damped, r = 2.125 is not
        let inner = visc.dynamic_viscosity()[[2, 4, 0]];
        let middle = visc.dynamic_viscosity()[[6, 4, 0]];
        assert!(inner > 0.0 && inner < 1e-3);
        assert_eq!(middle, 1e-3);

        let bad = field::scalar_field(mesh.shape(), 2.0, "test").unwrap();
        assert!(visc.with_envelope(&mesh, bad).is_err());
    }

    #[test]
    fn test_rigid_rotation_has_no_viscous_force() {
        let mesh = disk_mesh();
        let physics = EulerPhysics::new(1.4, 2).unwrap();
        let mut pvar = StateVector::zeros(&mesh, 4, VarKind::Primitive).unwrap();
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            pvar.set(i, j, k, 0, 1.0);
            pvar.set(i, j, k, 2, 0.4 * cell.radius);
            pvar.set(i, j, k, 3, 0.01);
        }
        let mut cvar = pvar.zeros_like(VarKind::Conservative).unwrap();
        physics.convert_to_conservative(&pvar, &mut cvar).unwrap();

        let mut visc = source(&mesh, &physics, ViscosityModel::Pringle { nu: 1e-2 });
        let mut sterm = cvar.zeros_like(VarKind::Conservative).unwrap();
        visc.compute_source_term(&mesh, &physics, 0.0, 0.1, &pvar, &cvar, &mut sterm).unwrap();

        let tau_r_phi = visc.stress()[[4, 4, 0, 1]];
        assert!(tau_r_phi.abs() < 1e-14, "τ_rφ = {}", tau_r_phi);
        assert!(sterm.data().iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn test_fluid_at_rest_has_no_viscous_force() {
        let mesh = disk_mesh();
        let physics = IsothermalPhysics::new(0.05, 2).unwrap();
        let mut pvar = StateVector::zeros(&mesh, 3, VarKind::Primitive).unwrap();
        pvar.data_mut().index_axis_mut(ndarray::Axis(3), 0).fill(1.0);
        let cvar = pvar.zeros_like(VarKind::Conservative).unwrap();
        let mut visc = source(&mesh, &physics, ViscosityModel::Pringle { nu: 1e-3 });
        let mut sterm = cvar.zeros_like(VarKind::Conservative).unwrap();
        visc.compute_source_term(&mesh, &physics, 0.0, 0.1, &pvar, &cvar, &mut sterm).unwrap();
        assert!(sterm.data().iter().all(|x| x.abs() < 1e-12));
    }
}
