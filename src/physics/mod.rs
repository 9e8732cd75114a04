//! Physics modules
//!
//! This module provides the state container and the physics interface the
//! solver core consumes.
//!
//! # Core Concepts
//!
//! - **Physics**: variable layout and conversions (see [`Physics`])
//! - **StateVector**: all variables over the mesh, primitive or conservative
//! - **Variable**: type-safe identifier for a state slot
//!
//! # Architecture
//!
//! Physics modules are **separate from the integrator and the sources**:
//! - the physics knows what the variables mean,
//! - sources compute accelerations, stresses and heating rates,
//! - the physics turns those into conservative right-hand-side terms.
//!
//! # Example
//!
//! ```
//! use diskflow::mesh::{Mesh, MeshConfig};
//! use diskflow::physics::{EulerPhysics, Physics, StateVector, VarKind};
//!
//! let mesh = Mesh::new(&MeshConfig { inum: 8, ..MeshConfig::default() }).unwrap();
//! let physics = EulerPhysics::new(1.4, 1).unwrap();
//!
//! let mut pvar = StateVector::zeros(&mesh, physics.nvar(), VarKind::Primitive).unwrap();
//! pvar.data_mut().fill(1.0);
//! let mut cvar = pvar.zeros_like(VarKind::Conservative).unwrap();
//! physics.convert_to_conservative(&pvar, &mut cvar).unwrap();
//! ```

pub mod data;
pub mod euler;
pub mod stress;
pub mod traits;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use data::{StateVector, VarKind};
pub use euler::{EulerPhysics, IsothermalPhysics};
pub use traits::{Physics, STRESS_COMPONENTS, Variable};

/// Physics selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PhysicsConfig {
    Euler {
        #[serde(default = "default_gamma")]
        gamma: f64,
        dims: usize,
    },
    Isothermal {
        cs: f64,
        dims: usize,
    },
}

fn default_gamma() -> f64 {
    1.4
}

impl PhysicsConfig {
    /// Build the configured physics module
    pub fn build(&self) -> Result<Box<dyn Physics>> {
        Ok(match *self {
            PhysicsConfig::Euler { gamma, dims } => Box::new(EulerPhysics::new(gamma, dims)?),
            PhysicsConfig::Isothermal { cs, dims } => Box::new(IsothermalPhysics::new(cs, dims)?),
        })
    }
}
