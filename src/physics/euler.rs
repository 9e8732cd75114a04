//! Euler equations
//!
//! Two physics modules share the same momentum equations and differ in the
//! thermodynamics:
//!
//! - [`EulerPhysics`]: ideal gas with adiabatic index `γ` and a total energy
//!   equation. Primitive `[ρ, v.., p]`, conservative `[ρ, ρv.., E]` with
//!   `E = p/(γ-1) + ρ|v|²/2`.
//! - [`IsothermalPhysics`]: constant sound speed, no energy equation.
//!   Primitive `[ρ, v..]`, conservative `[ρ, ρv..]`.

use ndarray::ArrayView1;

use crate::error::{Error, Result};
use crate::physics::traits::Physics;

fn check_dims(dims: usize, operation: &'static str) -> Result<()> {
    if !(1..=3).contains(&dims) {
        return Err(Error::config(
            "physics",
            operation,
            format!("velocity dimensions must be 1, 2 or 3, got {}", dims),
        ));
    }
    Ok(())
}

// =================================================================================================
// Adiabatic Euler
// =================================================================================================

/// Ideal-gas Euler equations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EulerPhysics {
    gamma: f64,
    dims: usize,
}

impl EulerPhysics {
    /// Create a new module
    ///
    /// # Errors
    ///
    /// `Configuration` if `gamma <= 1` or `dims` is not in `1..=3`.
    pub fn new(gamma: f64, dims: usize) -> Result<Self> {
        check_dims(dims, "euler")?;
        if !(gamma > 1.0) {
            return Err(Error::config("physics", "euler", format!("gamma must exceed 1, got {}", gamma)));
        }
        Ok(Self { gamma, dims })
    }
}

impl Physics for EulerPhysics {
    fn name(&self) -> &str {
        "euler"
    }

    fn velocity_dims(&self) -> usize {
        self.dims
    }

    fn energy_index(&self) -> Option<usize> {
        Some(self.dims + 1)
    }

    fn gamma(&self) -> Option<f64> {
        Some(self.gamma)
    }

    fn cell_to_conservative(&self, prim: ArrayView1<f64>, cons: &mut [f64]) {
        let rho = prim[0];
        let mut kinetic = 0.0;
        for d in 0..self.dims {
            let v = prim[1 + d];
            cons[1 + d] = rho * v;
            kinetic += v * v;
        }
        cons[0] = rho;
        cons[self.dims + 1] = prim[self.dims + 1] / (self.gamma - 1.0) + 0.5 * rho * kinetic;
    }

    fn cell_to_primitive(&self, cons: ArrayView1<f64>, prim: &mut [f64]) {
        let rho = cons[0];
        let mut kinetic = 0.0;
        for d in 0..self.dims {
            let m = cons[1 + d];
            prim[1 + d] = m / rho;
            kinetic += m * m;
        }
        prim[0] = rho;
        prim[self.dims + 1] = (self.gamma - 1.0) * (cons[self.dims + 1] - 0.5 * kinetic / rho);
    }

    fn sound_speed_sq(&self, prim: ArrayView1<f64>) -> f64 {
        self.gamma * prim[self.dims + 1] / prim[0]
    }
}

// =================================================================================================
// Isothermal Euler
// =================================================================================================

/// Isothermal Euler equations with constant sound speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsothermalPhysics {
    cs: f64,
    dims: usize,
}

impl IsothermalPhysics {
    /// Create a new module
    pub fn new(cs: f64, dims: usize) -> Result<Self> {
        check_dims(dims, "isothermal")?;
        if !(cs > 0.0) {
            return Err(Error::config("physics", "isothermal", format!("sound speed must be positive, got {}", cs)));
        }
        Ok(Self { cs, dims })
    }

    /// Isothermal sound speed
    pub fn sound_speed(&self) -> f64 {
        self.cs
    }
}

impl Physics for IsothermalPhysics {
    fn name(&self) -> &str {
        "isothermal"
    }

    fn velocity_dims(&self) -> usize {
        self.dims
    }

    fn energy_index(&self) -> Option<usize> {
        None
    }

    fn cell_to_conservative(&self, prim: ArrayView1<f64>, cons: &mut [f64]) {
        cons[0] = prim[0];
        for d in 0..self.dims {
            cons[1 + d] = prim[0] * prim[1 + d];
        }
    }

    fn cell_to_primitive(&self, cons: ArrayView1<f64>, prim: &mut [f64]) {
        prim[0] = cons[0];
        for d in 0..self.dims {
            prim[1 + d] = cons[1 + d] / cons[0];
        }
    }

    fn sound_speed_sq(&self, _prim: ArrayView1<f64>) -> f64 {
        self.cs * self.cs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::data::VarKind;
    use crate::physics::traits::Variable;
    use ndarray::arr1;

    #[test]
    fn test_invalid_parameters() {
        assert!(EulerPhysics::new(1.0, 2).unwrap_err().is_configuration());
        assert!(EulerPhysics::new(1.4, 4).is_err());
        assert!(IsothermalPhysics::new(0.0, 2).is_err());
    }

    #[test]
    fn test_layout() {
        let euler = EulerPhysics::new(1.4, 2).unwrap();
        assert_eq!(euler.nvar(), 4);
        assert_eq!(euler.energy_index(), Some(3));
        assert_eq!(euler.variable(VarKind::Primitive, 3), Variable::Pressure);
        assert_eq!(euler.variable(VarKind::Conservative, 2), Variable::Momentum(1));

        let iso = IsothermalPhysics::new(0.1, 3).unwrap();
        assert_eq!(iso.nvar(), 4);
        assert_eq!(iso.variable(VarKind::Conservative, 3), Variable::Momentum(2));
    }

    #[test]
    fn test_euler_cell_conversion() {
        let euler = EulerPhysics::new(5.0 / 3.0, 2).unwrap();
        let prim = arr1(&[2.0, 0.5, -1.0, 3.0]);
        let mut cons = [0.0; 4];
        euler.cell_to_conservative(prim.view(), &mut cons);

        assert_eq!(cons[1], 1.0);
        assert_eq!(cons[2], -2.0);
        assert!((cons[3] - (3.0 / (2.0 / 3.0) + 0.5 * 2.0 * 1.25)).abs() < 1e-12);

        let mut back = [0.0; 4];
        euler.cell_to_primitive(arr1(&cons).view(), &mut back);
        for (a, b) in back.iter().zip(prim.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sound_speed() {
        let euler = EulerPhysics::new(1.4, 1).unwrap();
        assert!((euler.sound_speed_sq(arr1(&[1.0, 0.0, 1.0]).view()) - 1.4).abs() < 1e-15);

        let iso = IsothermalPhysics::new(0.2, 1).unwrap();
        assert!((iso.sound_speed_sq(arr1(&[7.0, 1.0]).view()) - 0.04).abs() < 1e-15);
    }
}
