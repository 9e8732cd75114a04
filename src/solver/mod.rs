//! Adaptive time integration
//!
//! # Architecture (WHAT vs HOW)
//!
//! 1. **Scenario** ([`Scenario`]) - WHAT to integrate
//!    - mesh and physics
//!    - flux scheme ([`Fluxes`]) and ghost-cell filling ([`Boundary`])
//!    - source chain and initial state
//!
//! 2. **Configuration** ([`TimeDiscConfig`]) - HOW to integrate
//!    - embedded pair ([`TableauKind`])
//!    - tolerances, step limits, output times
//!    - step-size controller ([`StepController`])
//!
//! 3. **Solver** ([`Solver`] trait) - the method
//!    - [`EmbeddedRkSolver`] drives the stage / error / accept / reject
//!      cycle and returns a [`SimulationResult`]
//!
//! # Workflow
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐
//! │   Scenario   │     │ TimeDiscConfig │
//! └──────┬───────┘     └───────┬────────┘
//!        └──────────┬──────────┘
//!          ┌────────▼─────────┐
//!          │ EmbeddedRkSolver │  stages → error → accept / reject
//!          └────────┬─────────┘
//!          ┌────────▼─────────┐
//!          │ SimulationResult │  snapshots + stats + metadata
//!          └──────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use diskflow::mesh::{Mesh, MeshConfig};
//! use diskflow::physics::{IsothermalPhysics, StateVector, VarKind};
//! use diskflow::solver::{DomainBoundaries, EmbeddedRkSolver, NullFluxes, Scenario, Solver, TimeDiscConfig};
//! use diskflow::sources::SourceChain;
//!
//! let mesh = Mesh::new(&MeshConfig { inum: 4, ..MeshConfig::default() }).unwrap();
//! let mut initial = StateVector::zeros(&mesh, 2, VarKind::Primitive).unwrap();
//! initial.fill(1.0);
//!
//! let mut scenario = Scenario::new(
//!     mesh,
//!     Box::new(IsothermalPhysics::new(1.0, 1).unwrap()),
//!     Box::new(NullFluxes),
//!     Box::new(DomainBoundaries::default()),
//!     SourceChain::new(),
//!     initial,
//! );
//!
//! // nothing changes the state: one step reaches the stop time
//! let result = EmbeddedRkSolver::new().solve(&mut scenario, &TimeDiscConfig::new(1.0)).unwrap();
//! assert_eq!(result.final_time, 1.0);
//! assert_eq!(result.stats.accepted, 1);
//! ```
//!
//! # Error Handling
//!
//! Setup problems are [`Error::Configuration`](crate::Error::Configuration).
//! A rejected step is a normal transition; only a run of more than
//! `max_rejections` consecutive rejections (or an accepted step below
//! `dtmin`) is [`Error::NonConvergence`](crate::Error::NonConvergence).

// =================================================================================================
// Module Declarations
// =================================================================================================
mod boundary;
mod fluxes;
mod methods;
mod scenario;
mod tableau;
mod timestep;
mod traits;

// =================================================================================================
// Parallel Execution Threshold
// =================================================================================================
//
// Deciding *when* to hand cell loops off to Rayon is a numerical-execution
// concern, so it lives here rather than next to the state containers. The
// threshold sits in an AtomicUsize so benchmarks and tests can change it at
// runtime. Relaxed ordering is enough: the value is a performance hint, not a
// synchronisation point.
// =================================================================================================

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of elements above which state arithmetic, the error norm
/// and the self-gravity summation switch to parallel iteration.
const DEFAULT_PARALLEL_THRESHOLD: usize = 999;

/// Runtime-configurable parallel-execution threshold.
///
/// Read via [`parallel_threshold()`], written via [`set_parallel_threshold()`].
static PARALLEL_THRESHOLD: AtomicUsize = AtomicUsize::new(DEFAULT_PARALLEL_THRESHOLD);

/// Return the current parallel-execution threshold.
///
/// Cell loops run sequentially below this many elements and switch to Rayon
/// above it, when the crate is compiled with the `parallel` feature.
///
/// # Example
///
/// ```rust
/// use diskflow::solver::parallel_threshold;
///
/// assert!(parallel_threshold() > 0);
/// ```
pub fn parallel_threshold() -> usize {
    PARALLEL_THRESHOLD.load(Ordering::Relaxed)
}

/// Set the parallel-execution threshold to a new value.
///
/// # Panics
///
/// Panics when `threshold == 0`.
///
/// # Example
///
/// ```rust
/// use diskflow::solver::{parallel_threshold, set_parallel_threshold};
///
/// let previous = parallel_threshold();
/// set_parallel_threshold(2048);
/// assert_eq!(parallel_threshold(), 2048);
///
/// // Restore so other tests are not affected.
/// set_parallel_threshold(previous);
/// ```
pub fn set_parallel_threshold(threshold: usize) {
    assert!(threshold > 0, "parallel threshold must be at least 1");
    PARALLEL_THRESHOLD.store(threshold, Ordering::Relaxed);
}

/// RAII guard that saves the current threshold on construction and restores
/// it on drop.
///
/// Only compiled in test builds. Guards on different threads run one at a
/// time, so tests that change the threshold never observe each other. A
/// thread that already holds a guard may nest further guards.
///
/// ```rust,ignore
/// let _guard = crate::solver::ThresholdGuard::save(50);
/// // threshold is now 50 …
/// // … and is automatically restored when _guard is dropped.
/// ```
#[cfg(test)]
pub(crate) struct ThresholdGuard {
    previous: usize,
    _lock: Option<std::sync::MutexGuard<'static, ()>>,
}

#[cfg(test)]
static THRESHOLD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
thread_local! {
    static GUARD_DEPTH: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

#[cfg(test)]
impl ThresholdGuard {
    /// Set the threshold to `new_value` and return a guard that will
    /// restore the previous value on drop.
    pub(crate) fn save(new_value: usize) -> Self {
        let lock = if GUARD_DEPTH.get() == 0 {
            // a panicking test must not block the others
            Some(THRESHOLD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        } else {
            None
        };
        GUARD_DEPTH.set(GUARD_DEPTH.get() + 1);

        let previous = parallel_threshold();
        set_parallel_threshold(new_value);
        Self { previous, _lock: lock }
    }
}

#[cfg(test)]
impl Drop for ThresholdGuard {
    fn drop(&mut self) {
        // bypass the public setter so restoring never panics
        PARALLEL_THRESHOLD.store(self.previous, Ordering::Relaxed);
        GUARD_DEPTH.set(GUARD_DEPTH.get() - 1);
    }
}

// =================================================================================================
// Public Re-exports
// =================================================================================================

pub use boundary::{Boundary, BoundaryType, DomainBoundaries};
pub use fluxes::{Fluxes, NullFluxes};
pub use methods::{EmbeddedRkSolver, Phase};
pub use scenario::Scenario;
pub use tableau::{ButcherTableau, TableauKind};
pub use timestep::{DtCause, StepController, TimestepState};
pub use traits::{IntegrationStats, SimulationResult, Solver, TimeDiscConfig};

// =================================================================================================
// Helper Functions
// =================================================================================================

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::physics::StateVector;

/// Validate a state for numerical issues
///
/// Checks every active cell for NaN or Inf, which indicate numerical
/// instability or a broken source module.
///
/// # Arguments
///
/// * `mesh` - Mesh the state lives on
/// * `state` - State to validate
/// * `step` - Current accepted step (for error reporting)
///
/// # Example
///
/// ```rust,ignore
/// validate_state(&mesh, &pvar, 42)?;  // Validates the state after step 42
/// ```
pub(crate) fn validate_state(mesh: &Mesh, state: &StateVector, step: usize) -> Result<()> {
    for (i, j, k) in mesh.active_cells() {
        for (v, &x) in state.cell(i, j, k).iter().enumerate() {
            if x.is_nan() {
                return Err(Error::invalid_state(
                    "solver",
                    "validate_state",
                    format!(
                        "NaN in {} variable {} at cell ({}, {}, {}) after step {}",
                        state.kind(), v, i, j, k, step
                    ),
                ));
            }
            if x.is_infinite() {
                return Err(Error::invalid_state(
                    "solver",
                    "validate_state",
                    format!(
                        "Infinity in {} variable {} at cell ({}, {}, {}) after step {}",
                        state.kind(), v, i, j, k, step
                    ),
                ));
            }
        }
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshConfig;
    use crate::physics::VarKind;

    #[test]
    fn test_default_threshold_value() {
        assert_eq!(DEFAULT_PARALLEL_THRESHOLD, 999);
    }

    #[test]
    fn test_get_and_set_threshold() {
        let _guard = ThresholdGuard::save(500);
        assert_eq!(parallel_threshold(), 500);
    }

    #[test]
    #[should_panic(expected = "parallel threshold must be at least 1")]
    fn test_zero_threshold_panics() {
        set_parallel_threshold(0);
    }

    #[test]
    fn test_threshold_guard_restores_previous_value() {
        let _outer = ThresholdGuard::save(7);
        {
            let _guard = ThresholdGuard::save(42);
            assert_eq!(parallel_threshold(), 42);
        }
        assert_eq!(parallel_threshold(), 7);
    }

    #[test]
    fn test_threshold_guards_serialize_across_threads() {
        // each thread sees only its own value while its guard lives
        let handles: Vec<_> = (1..=16)
            .map(|n| {
                std::thread::spawn(move || {
                    let _guard = ThresholdGuard::save(n * 100);
                    for _ in 0..1000 {
                        assert_eq!(parallel_threshold(), n * 100);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_threshold_is_visible_across_threads() {
        use std::thread;

        let _guard = ThresholdGuard::save(1234);

        let handles: Vec<_> = (0..8).map(|_| thread::spawn(parallel_threshold)).collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1234);
        }
    }

    #[test]
    fn test_validate_state_ignores_ghost_cells() {
        let mesh = Mesh::new(&MeshConfig { inum: 4, ..MeshConfig::default() }).unwrap();
        let mut state = StateVector::zeros(&mesh, 2, VarKind::Primitive).unwrap();
        state.set(0, 0, 0, 0, f64::NAN);
        validate_state(&mesh, &state, 1).unwrap();

        state.set(3, 0, 0, 1, f64::INFINITY);
        let err = validate_state(&mesh, &state, 7).unwrap_err();
        assert!(err.to_string().contains("Infinity"));
        assert!(err.to_string().contains("step 7"));

        state.set(2, 0, 0, 0, f64::NAN);
        assert!(validate_state(&mesh, &state, 7).unwrap_err().to_string().contains("NaN"));
    }
}
