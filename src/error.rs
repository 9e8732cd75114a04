//! Error types
//!
//! Every fatal condition the crate can raise is a variant of [`Error`].
//! Each variant names the component and the operation that failed so the
//! message alone is enough to locate the problem.
//!
//! Step rejection inside the adaptive integrator is *not* an error: it is a
//! normal phase transition and never surfaces here.
//!
//! # Example
//!
//! ```
//! use diskflow::error::{Error, Result};
//!
//! fn check_gamma(gamma: f64) -> Result<()> {
//!     if gamma <= 1.0 {
//!         return Err(Error::config("physics", "new", "gamma must exceed 1"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_gamma(0.5).is_err());
//! ```

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised by the solver core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Unsupported model, missing parameter, inconsistent tableau, ...
    ///
    /// Raised at setup; the simulation never enters the time loop.
    #[error("configuration error in {component}::{operation}: {message}")]
    Configuration {
        component: &'static str,
        operation: &'static str,
        message: String,
    },

    /// Memory for a working field could not be obtained
    #[error("allocation of {bytes} bytes failed in {component}::{operation}")]
    Allocation {
        component: &'static str,
        operation: &'static str,
        bytes: usize,
    },

    /// The adaptive step was rejected too many times in a row, or shrank
    /// below the configured minimum
    #[error("time step did not converge at t = {time:e} (dt = {dt:e}, {rejections} consecutive rejections)")]
    NonConvergence { time: f64, dt: f64, rejections: usize },

    /// `maxiter` was reached before `stoptime`
    #[error("simulation did not finish: stopped at t = {time:e} < stoptime = {stoptime:e} after {iterations} iterations")]
    DidNotFinish {
        time: f64,
        stoptime: f64,
        iterations: usize,
    },

    /// A state contains NaN or Inf, or has the wrong shape
    #[error("invalid state in {component}::{operation}: {message}")]
    InvalidState {
        component: &'static str,
        operation: &'static str,
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Configuration`]
    pub fn config(
        component: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            component,
            operation,
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::InvalidState`]
    pub fn invalid_state(
        component: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            component,
            operation,
            message: message.into(),
        }
    }

    /// Whether this is a setup-time configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
