//! Solver trait, time-discretization configuration and result types
//!
//! # Design
//!
//! - [`TimeDiscConfig`] says HOW to integrate (tableau, tolerances, limits).
//! - [`Scenario`] says WHAT to integrate (mesh, physics, fluxes, boundaries,
//!   sources, initial state).
//! - [`Solver::solve`] runs one against the other and returns a
//!   [`SimulationResult`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::physics::StateVector;
use crate::solver::scenario::Scenario;
use crate::solver::tableau::TableauKind;
use crate::solver::timestep::{DtCause, StepController};

// =================================================================================================
// Time Discretization Configuration
// =================================================================================================

fn default_maxiter() -> usize {
    1_000_000
}

fn default_tol_rel() -> f64 {
    1e-3
}

fn default_tol_abs() -> Vec<f64> {
    vec![1e-6]
}

fn default_max_rejections() -> usize {
    50
}

/// Parameters of the adaptive time integration
///
/// # Examples
///
/// ```rust
/// use diskflow::solver::{TableauKind, TimeDiscConfig};
///
/// let config: TimeDiscConfig = serde_json::from_str(
///     r#"{ "method": "fehlberg45", "stoptime": 10.0, "tol_rel": 1e-5 }"#,
/// ).unwrap();
///
/// assert_eq!(config.method, TableauKind::Fehlberg45);
/// assert_eq!(config.tol_abs, vec![1e-6]);
/// config.validate(4).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeDiscConfig {
    /// Embedded pair
    #[serde(default)]
    pub method: TableauKind,

    /// End of the simulation
    pub stoptime: f64,

    /// Upper bound of every step; `None` leaves steps unbounded
    #[serde(default)]
    pub dtlimit: Option<f64>,

    /// First trial step; `None` starts from the stability limits
    #[serde(default)]
    pub dt_initial: Option<f64>,

    /// Accepted steps below this abort the run; 0 disables the check
    #[serde(default)]
    pub dtmin: f64,

    /// Largest number of accepted steps
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,

    /// Relative tolerance of the error norm
    #[serde(default = "default_tol_rel")]
    pub tol_rel: f64,

    /// Absolute tolerance, one value for all variables or one per variable
    #[serde(default = "default_tol_abs")]
    pub tol_abs: Vec<f64>,

    /// Number of evenly spaced output times after the initial state
    #[serde(default)]
    pub noutput: usize,

    /// Consecutive rejections before giving up
    #[serde(default = "default_max_rejections")]
    pub max_rejections: usize,

    #[serde(default)]
    pub controller: StepController,
}

impl TimeDiscConfig {
    /// Defaults for a run that ends at `stoptime`
    pub fn new(stoptime: f64) -> Self {
        Self {
            method: TableauKind::default(),
            stoptime,
            dtlimit: None,
            dt_initial: None,
            dtmin: 0.0,
            maxiter: default_maxiter(),
            tol_rel: default_tol_rel(),
            tol_abs: default_tol_abs(),
            noutput: 0,
            max_rejections: default_max_rejections(),
            controller: StepController::default(),
        }
    }

    /// Check the parameters against a state with `nvar` variables
    pub fn validate(&self, nvar: usize) -> Result<()> {
        let fail = |message: String| -> Result<()> { Err(Error::config("timedisc", "validate", message)) };

        if !(self.stoptime.is_finite() && self.stoptime > 0.0) {
            return fail(format!("stoptime must be positive and finite, got {}", self.stoptime));
        }
        if let Some(limit) = self.dtlimit
            && !(limit > 0.0)
        {
            return fail(format!("dtlimit must be positive, got {}", limit));
        }
        if let Some(dt) = self.dt_initial
            && !(dt.is_finite() && dt > 0.0)
        {
            return fail(format!("dt_initial must be positive and finite, got {}", dt));
        }
        if !(self.dtmin >= 0.0) {
            return fail(format!("dtmin must be non-negative, got {}", self.dtmin));
        }
        if self.maxiter == 0 {
            return fail("maxiter must be greater than 0".to_string());
        }
        if !(self.tol_rel >= 0.0) {
            return fail(format!("tol_rel must be non-negative, got {}", self.tol_rel));
        }
        if self.tol_abs.len() != 1 && self.tol_abs.len() != nvar {
            return fail(format!("tol_abs needs 1 or {} entries, got {}", nvar, self.tol_abs.len()));
        }
        if self.tol_abs.iter().any(|&t| !(t >= 0.0)) {
            return fail("tol_abs entries must be non-negative".to_string());
        }
        if self.tol_rel == 0.0 && self.tol_abs.iter().any(|&t| t == 0.0) {
            return fail("tol_rel and tol_abs cannot both vanish".to_string());
        }
        self.controller.validate()
    }

    /// Absolute tolerance of variable `v`
    pub fn tol_abs(&self, v: usize) -> f64 {
        if self.tol_abs.len() == 1 { self.tol_abs[0] } else { self.tol_abs[v] }
    }

    /// Times at which snapshots are recorded, ending at `stoptime`
    pub fn output_times(&self, start: f64) -> Vec<f64> {
        (1..=self.noutput)
            .map(|n| start + (self.stoptime - start) * n as f64 / self.noutput as f64)
            .collect()
    }
}

// =================================================================================================
// Solver Trait
// =================================================================================================

/// Trait for time integrators
///
/// The scenario is taken by `&mut` because source modules keep working
/// fields that are refreshed during the run.
pub trait Solver {
    /// Integrate `scenario` from its initial state to `config.stoptime`
    fn solve(&self, scenario: &mut Scenario, config: &TimeDiscConfig) -> Result<SimulationResult>;

    fn name(&self) -> &str;
}

// =================================================================================================
// Simulation Result
// =================================================================================================

/// Counters of one integration
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Right-hand-side evaluations
    pub evaluations: usize,
    /// Smallest accepted step
    pub dtmin: f64,
    /// Largest accepted step
    pub dtmax: f64,
    /// Step proposed after the last accepted step
    pub final_dt: f64,
    /// What limited the last proposed step
    pub last_cause: DtCause,
}

/// Snapshots and statistics of a run
///
/// Snapshots are primitive states: the initial state followed by one per
/// output time. The final state is always present.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub time_points: Vec<f64>,
    pub snapshots: Vec<StateVector>,
    pub final_time: f64,
    pub final_state: StateVector,
    pub stats: IntegrationStats,
    pub metadata: HashMap<String, String>,
}

impl SimulationResult {
    pub fn new(
        time_points: Vec<f64>,
        snapshots: Vec<StateVector>,
        final_time: f64,
        final_state: StateVector,
        stats: IntegrationStats,
    ) -> Self {
        Self {
            time_points,
            snapshots,
            final_time,
            final_state,
            stats,
            metadata: HashMap::new(),
        }
    }

    /// Number of recorded snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn add_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let config: TimeDiscConfig = serde_json::from_str(r#"{ "stoptime": 2.0 }"#).unwrap();
        assert_eq!(config, TimeDiscConfig::new(2.0));
        assert_eq!(config.method, TableauKind::CashKarp45);
        assert!(config.dtlimit.is_none());
        config.validate(3).unwrap();
    }

    #[test]
    fn test_stoptime_is_required() {
        assert!(serde_json::from_str::<TimeDiscConfig>("{}").is_err());
    }

    #[test]
    fn test_invalid_parameters() {
        let mut config = TimeDiscConfig::new(1.0);
        config.tol_abs = vec![1e-6, 1e-6];
        assert!(config.validate(3).unwrap_err().is_configuration());
        assert!(config.validate(2).is_ok());

        let config = TimeDiscConfig { stoptime: -1.0, ..TimeDiscConfig::new(1.0) };
        assert!(config.validate(3).is_err());

        let config = TimeDiscConfig { dtlimit: Some(0.0), ..TimeDiscConfig::new(1.0) };
        assert!(config.validate(3).is_err());

        let config = TimeDiscConfig { maxiter: 0, ..TimeDiscConfig::new(1.0) };
        assert!(config.validate(3).is_err());

        let config = TimeDiscConfig { tol_rel: 0.0, tol_abs: vec![0.0], ..TimeDiscConfig::new(1.0) };
        assert!(config.validate(3).is_err());
    }

    #[test]
    fn test_tol_abs_broadcast() {
        let mut config = TimeDiscConfig::new(1.0);
        assert_eq!(config.tol_abs(2), 1e-6);
        config.tol_abs = vec![1.0, 2.0, 3.0];
        assert_eq!(config.tol_abs(2), 3.0);
    }

    #[test]
    fn test_output_times() {
        let config = TimeDiscConfig { noutput: 4, ..TimeDiscConfig::new(2.0) };
        assert_eq!(config.output_times(0.0), vec![0.5, 1.0, 1.5, 2.0]);
        assert!(TimeDiscConfig::new(2.0).output_times(0.0).is_empty());
    }
}
