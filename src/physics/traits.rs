//! Physics trait and variable identifiers
//!
//! This module defines the narrow interface the solver core needs from a
//! physics module:
//! - `Physics`: variable layout, primitive/conservative conversion, sound
//!   speed, and the conversion of accelerations and viscous stresses into
//!   conservative source terms
//! - `Variable`: type-safe identifier for a slot of a state vector

use ndarray::ArrayView1;
use std::fmt;

use crate::error::Result;
use crate::mesh::{Mesh, MeshField, VectorField};
use crate::physics::data::{StateVector, VarKind};
use crate::physics::stress;

// =================================================================================================
// Variables (Type-safe Identifiers)
// =================================================================================================

/// Known physical variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    /// Mass density
    Density,
    /// Velocity component in the local basis
    Velocity(usize),
    /// Thermal pressure
    Pressure,
    /// Momentum density component in the local basis
    Momentum(usize),
    /// Total energy density
    Energy,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Density => write!(f, "density"),
            Variable::Velocity(d) => write!(f, "velocity[{}]", d),
            Variable::Pressure => write!(f, "pressure"),
            Variable::Momentum(d) => write!(f, "momentum[{}]", d),
            Variable::Energy => write!(f, "energy"),
        }
    }
}

/// Number of independent components of the symmetric 3×3 stress tensor
pub const STRESS_COMPONENTS: usize = 6;

// ==================================================================================================
// Physics Trait
// =================================================================================================

/// Trait for physics modules
///
/// # Layout
///
/// Slot 0 is density, slots `1..=velocity_dims()` are velocities (primitive)
/// or momenta (conservative) in the local basis, and
/// [`energy_index`](Physics::energy_index) optionally holds pressure
/// (primitive) / total energy (conservative).
///
/// # Responsibility
///
/// A physics module knows the equations' variables. It does NOT know the
/// time integration (the solver's job) nor the individual source terms
/// (the source chain's job).
pub trait Physics: Send + Sync {
    /// Name of the physics (used to display and logging)
    fn name(&self) -> &str;

    /// Number of velocity components carried
    fn velocity_dims(&self) -> usize;

    /// Number of variables per cell
    fn nvar(&self) -> usize {
        1 + self.velocity_dims() + usize::from(self.energy_index().is_some())
    }

    /// Slot of pressure / total energy, if the physics has an energy equation
    fn energy_index(&self) -> Option<usize>;

    /// Adiabatic index, if any
    fn gamma(&self) -> Option<f64> {
        None
    }

    /// Identifier of slot `v` in the given representation
    fn variable(&self, kind: VarKind, v: usize) -> Variable {
        if v == 0 {
            return Variable::Density;
        }
        if Some(v) == self.energy_index() {
            return match kind {
                VarKind::Primitive => Variable::Pressure,
                VarKind::Conservative => Variable::Energy,
            };
        }
        match kind {
            VarKind::Primitive => Variable::Velocity(v - 1),
            VarKind::Conservative => Variable::Momentum(v - 1),
        }
    }

    /// Convert one cell from primitive to conservative form
    fn cell_to_conservative(&self, prim: ArrayView1<f64>, cons: &mut [f64]);

    /// Convert one cell from conservative to primitive form
    fn cell_to_primitive(&self, cons: ArrayView1<f64>, prim: &mut [f64]);

    /// Squared sound speed from one cell's primitive variables
    fn sound_speed_sq(&self, prim: ArrayView1<f64>) -> f64;

    /// Regenerate `cvar` from `pvar` over the whole index box
    fn convert_to_conservative(&self, pvar: &StateVector, cvar: &mut StateVector) -> Result<()> {
        convert(self, pvar, cvar, VarKind::Primitive, |prim, out| self.cell_to_conservative(prim, out))
    }

    /// Regenerate `pvar` from `cvar` over the whole index box
    fn convert_to_primitive(&self, cvar: &StateVector, pvar: &mut StateVector) -> Result<()> {
        convert(self, cvar, pvar, VarKind::Conservative, |cons, out| self.cell_to_primitive(cons, out))
    }

    /// Add the conservative source of an acceleration field to `sterm`
    ///
    /// Momentum gains `ρ a`, total energy gains `ρ v·a`. `accel` carries three
    /// local-basis components per cell; only the first
    /// [`velocity_dims`](Physics::velocity_dims) are used.
    fn external_accel_source(&self, mesh: &Mesh, pvar: &StateVector, accel: &VectorField, sterm: &mut StateVector) {
        let dims = self.velocity_dims();
        let energy = self.energy_index();
        for (i, j, k) in mesh.active_cells() {
            let rho = pvar.get(i, j, k, 0);
            let mut work = 0.0;
            for d in 0..dims {
                let a = accel[[i, j, k, d]];
                let v = pvar.get(i, j, k, 1 + d);
                sterm.data_mut()[[i, j, k, 1 + d]] += rho * a;
                work += rho * v * a;
            }
            if let Some(e) = energy {
                sterm.data_mut()[[i, j, k, e]] += work;
            }
        }
    }

    /// Compute the viscous stress tensor on active cells and one ghost layer
    ///
    /// Components are stored `[xx, xy, xz, yy, yz, zz]`.
    fn calc_stresses(
        &self,
        mesh: &Mesh,
        pvar: &StateVector,
        dynvis: &MeshField,
        bulkvis: &MeshField,
        stress: &mut VectorField,
    ) {
        stress::calc_stresses(mesh, pvar, self.velocity_dims(), dynvis, bulkvis, stress);
    }

    /// Add the divergence of the stress tensor to `sterm`
    ///
    /// Momentum gains `∇·τ`; total energy gains `∇·(τ·v)` when present.
    fn viscous_source(&self, mesh: &Mesh, pvar: &StateVector, stress: &VectorField, sterm: &mut StateVector) {
        stress::viscous_source(mesh, pvar, self.velocity_dims(), self.energy_index(), stress, sterm);
    }
}

fn convert<P, F>(physics: &P, input: &StateVector, output: &mut StateVector, expected: VarKind, f: F) -> Result<()>
where
    P: Physics + ?Sized,
    F: Fn(ArrayView1<f64>, &mut [f64]),
{
    use crate::error::Error;

    if input.kind() != expected {
        return Err(Error::invalid_state(
            "physics",
            "convert",
            format!("expected a {} state, got {}", expected, input.kind()),
        ));
    }
    if input.nvar() != physics.nvar() {
        return Err(Error::invalid_state(
            "physics",
            "convert",
            format!("{} expects {} variables, state has {}", physics.name(), physics.nvar(), input.nvar()),
        ));
    }
    input.ensure_same_shape(output, "convert")?;

    let target = match expected {
        VarKind::Primitive => VarKind::Conservative,
        VarKind::Conservative => VarKind::Primitive,
    };
    let (ni, nj, nk) = input.shape();
    let mut buffer = vec![0.0; input.nvar()];
    for i in 0..ni {
        for j in 0..nj {
            for k in 0..nk {
                f(input.cell(i, j, k), &mut buffer);
                output.cell_mut(i, j, k).iter_mut().zip(&buffer).for_each(|(o, b)| *o = *b);
            }
        }
    }
    output.set_kind(target);
    Ok(())
}
