//! Step-size control
//!
//! [`StepController`] turns the scaled error norm `E` of an embedded pair
//! into a new step size:
//!
//! ```text
//! accepted (E ≤ 1):  f = safety · E^(-α) · E_old^(β),   clipped to [1, maxfac]
//! rejected (E > 1):  f = max(minfac, safety · E^(-1/k)) < 1
//! ```
//!
//! with `k = q + 1` for an embedded solution of order `q` and
//! `α = 1/k - 0.75 β` (PI control with memory exponent `β`). An accepted step
//! never shrinks the next one; a rejected step always shrinks the retry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Floor of the stored previous error, so the PI term stays bounded
const MIN_ERR_OLD: f64 = 1e-4;

/// What set the current step size
#[derive(Debug, Clone, PartialEq)]
pub enum DtCause {
    /// Configured initial step
    Initial,
    /// Error controller after an accepted step
    Controller,
    /// Error controller after a rejected step
    Rejected,
    /// Configured upper bound `dtlimit`
    DtLimit,
    /// Flux CFL condition
    Fluxes,
    /// Constraint of the named source module
    Source(String),
    /// Clipped to land on the stop time
    StopTime,
    /// Clipped to land on an output time
    Output,
}

impl fmt::Display for DtCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DtCause::Initial => write!(f, "initial"),
            DtCause::Controller => write!(f, "error controller"),
            DtCause::Rejected => write!(f, "rejected step"),
            DtCause::DtLimit => write!(f, "dtlimit"),
            DtCause::Fluxes => write!(f, "fluxes"),
            DtCause::Source(name) => write!(f, "source '{}'", name),
            DtCause::StopTime => write!(f, "stoptime"),
            DtCause::Output => write!(f, "output"),
        }
    }
}

/// Mutable bookkeeping of the adaptive integrator
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepState {
    pub time: f64,
    pub dt: f64,
    pub dt_cause: DtCause,
    /// Error norm of the last accepted step
    pub err_old: f64,
    /// Accepted steps
    pub iteration: usize,
    /// Rejected steps in total
    pub rejected: usize,
    /// Rejections since the last accepted step
    pub consecutive_rejections: usize,
    /// Smallest accepted step so far
    pub dtmin: f64,
    /// Right-hand-side evaluations
    pub evaluations: usize,
}

impl TimestepState {
    pub fn new(time: f64, dt: f64, dt_cause: DtCause) -> Self {
        Self {
            time,
            dt,
            dt_cause,
            err_old: 1.0,
            iteration: 0,
            rejected: 0,
            consecutive_rejections: 0,
            dtmin: f64::INFINITY,
            evaluations: 0,
        }
    }
}

/// PI step-size controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepController {
    /// Safety factor, in `(0, 1)`
    pub safety: f64,
    /// Smallest shrink factor after a rejection, in `(0, 1)`
    pub minfac: f64,
    /// Largest growth factor after an acceptance, `> 1`
    pub maxfac: f64,
    /// Memory exponent of the PI term (0 gives a plain I controller)
    pub beta: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            minfac: 0.2,
            maxfac: 5.0,
            beta: 0.04,
        }
    }
}

impl StepController {
    pub fn validate(&self) -> Result<()> {
        if !(self.safety > 0.0 && self.safety < 1.0) {
            return Err(Error::config("controller", "validate", format!("safety must lie in (0, 1), got {}", self.safety)));
        }
        if !(self.minfac > 0.0 && self.minfac < 1.0) {
            return Err(Error::config("controller", "validate", format!("minfac must lie in (0, 1), got {}", self.minfac)));
        }
        if !(self.maxfac > 1.0) {
            return Err(Error::config("controller", "validate", format!("maxfac must exceed 1, got {}", self.maxfac)));
        }
        if !(self.beta >= 0.0) {
            return Err(Error::config("controller", "validate", format!("beta must be non-negative, got {}", self.beta)));
        }
        Ok(())
    }

    /// Growth factor after an accepted step with error `err ≤ 1`
    ///
    /// `order` is the order of the embedded solution.
    pub fn accept_factor(&self, err: f64, err_old: f64, order: usize) -> f64 {
        if err <= 0.0 {
            return self.maxfac;
        }
        let k = (order + 1) as f64;
        let alpha = 1.0 / k - 0.75 * self.beta;
        let factor = self.safety * err.powf(-alpha) * err_old.powf(self.beta);
        factor.clamp(1.0, self.maxfac)
    }

    /// Shrink factor after a rejected step with error `err > 1`
    ///
    /// A non-finite error shrinks by `minfac`.
    pub fn reject_factor(&self, err: f64, order: usize) -> f64 {
        if !err.is_finite() {
            return self.minfac;
        }
        let k = (order + 1) as f64;
        (self.safety * err.powf(-1.0 / k)).max(self.minfac)
    }

    /// Error norm to remember after an accepted step
    pub fn remember(&self, err: f64) -> f64 {
        err.max(MIN_ERR_OLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        StepController::default().validate().unwrap();
        let bad = StepController { safety: 1.0, ..StepController::default() };
        assert!(bad.validate().unwrap_err().is_configuration());
        let bad = StepController { maxfac: 0.5, ..StepController::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_reject_always_shrinks() {
        let controller = StepController::default();
        for err in [1.0 + 1e-12, 1.5, 10.0, 1e6, f64::INFINITY, f64::NAN] {
            let factor = controller.reject_factor(err, 4);
            assert!(factor < 1.0, "err {} gave {}", err, factor);
            assert!(factor >= controller.minfac);
        }
    }

    #[test]
    fn test_accept_grows_only_for_small_error() {
        let controller = StepController::default();
        // close to the tolerance: keep dt
        assert_eq!(controller.accept_factor(0.99, 1.0, 4), 1.0);
        // well below: grow, bounded by maxfac
        let factor = controller.accept_factor(1e-3, 1.0, 4);
        assert!(factor > 1.0 && factor <= controller.maxfac);
        assert_eq!(controller.accept_factor(1e-30, 1.0, 4), controller.maxfac);
        assert_eq!(controller.accept_factor(0.0, 1.0, 4), controller.maxfac);
    }

    #[test]
    fn test_accept_factor_is_monotone_in_error() {
        let controller = StepController::default();
        let mut previous = f64::INFINITY;
        for err in [1e-8, 1e-6, 1e-4, 1e-2, 0.5, 1.0] {
            let factor = controller.accept_factor(err, 0.5, 4);
            assert!(factor <= previous);
            previous = factor;
        }
    }

    #[test]
    fn test_remember_floors_error() {
        let controller = StepController::default();
        assert_eq!(controller.remember(0.0), 1e-4);
        assert_eq!(controller.remember(0.3), 0.3);
    }

    #[test]
    fn test_cause_display() {
        assert_eq!(DtCause::Source("viscosity".into()).to_string(), "source 'viscosity'");
        assert_eq!(TimestepState::new(0.0, 0.1, DtCause::Initial).err_old, 1.0);
    }
}
