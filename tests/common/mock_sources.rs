//! Mock source modules for testing
//!
//! These sources have known analytical solutions, making them ideal for
//! validating the integrator's accuracy.

use diskflow::mesh::Mesh;
use diskflow::physics::{Physics, StateVector};
use diskflow::sources::{SourceKind, SourceTerm};
use diskflow::Result;

// =================================================================================================
// Exponential Decay: dρ/dt = -k ρ
// =================================================================================================

/// Exponential decay of the density
///
/// Analytical solution: ρ(t) = ρ₀ exp(-k t)
pub struct ExponentialDecay {
    pub decay_rate: f64,
}

impl ExponentialDecay {
    pub fn new(decay_rate: f64) -> Self {
        Self { decay_rate }
    }

    /// Compute analytical solution at time t
    pub fn analytical_solution(&self, t: f64, rho0: f64) -> f64 {
        rho0 * (-self.decay_rate * t).exp()
    }
}

impl SourceTerm for ExponentialDecay {
    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    fn name(&self) -> &str {
        "exponential decay"
    }

    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _dt: f64,
        _pvar: &StateVector,
        cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        for (i, j, k) in mesh.active_cells() {
            sterm.data_mut()[[i, j, k, 0]] -= self.decay_rate * cvar.get(i, j, k, 0);
        }
        Ok(())
    }
}

// =================================================================================================
// Constant Growth: dρ/dt = c
// =================================================================================================

/// Constant growth of the density, with an optional step limit
///
/// Analytical solution: ρ(t) = ρ₀ + c t. Every embedded pair is exact.
pub struct ConstantGrowth {
    pub growth_rate: f64,
    pub max_dt: f64,
}

impl ConstantGrowth {
    pub fn new(growth_rate: f64) -> Self {
        Self { growth_rate, max_dt: f64::INFINITY }
    }

    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = max_dt;
        self
    }
}

impl SourceTerm for ConstantGrowth {
    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    fn name(&self) -> &str {
        "constant growth"
    }

    fn compute_source_term(
        &mut self,
        mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _dt: f64,
        _pvar: &StateVector,
        _cvar: &StateVector,
        sterm: &mut StateVector,
    ) -> Result<()> {
        for (i, j, k) in mesh.active_cells() {
            sterm.data_mut()[[i, j, k, 0]] += self.growth_rate;
        }
        Ok(())
    }

    fn compute_timestep_constraint(
        &mut self,
        _mesh: &Mesh,
        _physics: &dyn Physics,
        _time: f64,
        _pvar: &StateVector,
        _cvar: &StateVector,
        dt: f64,
    ) -> Result<f64> {
        Ok(dt.min(self.max_dt))
    }
}
