//! Adaptive embedded Runge-Kutta solver
//!
//! # Mathematical Background
//!
//! For the semi-discrete conservative system `dU/dt = L(U) + S(t, U)`, with
//! `L` the flux divergence and `S` the source chain, one step of an
//! `s`-stage embedded pair reads
//!
//! ```text
//! Y_i = U + dt Σ_{j<i} a_ij k_j
//! k_i = L(Y_i) + S(t + c_i dt, Y_i)
//! U_high = U + dt Σ b_high_i k_i
//! U_low  = U + dt Σ b_low_i  k_i
//! ```
//!
//! and the scaled error norm is
//!
//! ```text
//! E = max over active cells and variables of
//!     |U_high - U_low| / (tol_abs[v] + tol_rel |U_high|)
//! ```
//!
//! A non-finite `E` counts as `+∞`. The step is accepted when `E ≤ 1`.
//!
//! # Phases
//!
//! ```text
//!            ┌──────────────────────────────────┐
//!            ▼                                  │
//!   ComputeStages ──► EstimateError ──► RejectStep
//!            ▲              │
//!            │              ▼
//!            └─────────  AcceptStep ──► Terminal
//! ```
//!
//! Every stage state is converted to primitive form, has its ghost cells
//! filled and is converted back, so fluxes and sources always see
//! consistent ghost values.
//!
//! # Step Size
//!
//! After each accepted step the controller proposes `f · dt`, which is then
//! clipped by `dtlimit`, the flux CFL step, the source constraints, the next
//! output time and the stop time, in that order. The last binding limit is
//! recorded as the [`DtCause`].

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::physics::{StateVector, VarKind};
use crate::solver::tableau::ButcherTableau;
use crate::solver::timestep::{DtCause, TimestepState};
use crate::solver::{
    IntegrationStats, Scenario, SimulationResult, Solver, TimeDiscConfig, validate_state,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Relative tolerance for landing exactly on output and stop times
const TIME_EPS: f64 = 1e-12;

/// State of the step cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Evaluate the stage derivatives
    ComputeStages,
    /// Combine stages into the two solutions and measure the error
    EstimateError,
    /// Commit the step and propose the next one
    AcceptStep,
    /// Shrink the step and retry
    RejectStep,
    /// Stop time reached
    Terminal,
}

// =================================================================================================
// Embedded Runge-Kutta Solver
// =================================================================================================

/// Adaptive solver for explicit embedded Runge-Kutta pairs
///
/// Uses the pair selected by [`TimeDiscConfig::method`] unless a custom
/// tableau is supplied with [`with_tableau`](Self::with_tableau).
///
/// # Example
///
/// ```rust
/// use diskflow::solver::{ButcherTableau, EmbeddedRkSolver, Solver};
///
/// let solver = EmbeddedRkSolver::with_tableau(ButcherTableau::heun_euler21().unwrap());
/// assert_eq!(solver.name(), "embedded Runge-Kutta");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedRkSolver {
    tableau: Option<ButcherTableau>,
}

impl EmbeddedRkSolver {
    pub fn new() -> Self {
        Self { tableau: None }
    }

    /// Use `tableau` regardless of the configured method
    pub fn with_tableau(tableau: ButcherTableau) -> Self {
        Self { tableau: Some(tableau) }
    }
}

impl Solver for EmbeddedRkSolver {
    fn solve(&self, scenario: &mut Scenario, config: &TimeDiscConfig) -> Result<SimulationResult> {
        // ====== Step 1: Validation ======

        scenario.validate()?;
        config.validate(scenario.physics.nvar())?;
        let tableau = match &self.tableau {
            Some(tableau) => tableau.clone(),
            None => config.method.tableau()?,
        };

        log::info!(
            "embedded rk: {} ({} stages), stoptime {}, tol_rel {}, physics {}",
            tableau.name(),
            tableau.stages(),
            config.stoptime,
            config.tol_rel,
            scenario.physics_name()
        );

        // ====== Step 2: Setup ======

        let mut run = Run::new(scenario, config, tableau)?;

        // ====== Step 3: Time Integration ======

        let mut phase = Phase::ComputeStages;
        while phase != Phase::Terminal {
            phase = match phase {
                Phase::ComputeStages => {
                    run.compute_stages(scenario)?;
                    Phase::EstimateError
                }
                Phase::EstimateError => run.estimate_error(&scenario.mesh)?,
                Phase::AcceptStep => run.accept_step(scenario)?,
                Phase::RejectStep => run.reject_step()?,
                Phase::Terminal => Phase::Terminal,
            };
        }

        // ====== Step 4: Build Result ======

        Ok(run.into_result())
    }

    fn name(&self) -> &str {
        "embedded Runge-Kutta"
    }
}

// =================================================================================================
// Integration Workspace
// =================================================================================================

/// Buffers and bookkeeping of one `solve` call
struct Run<'c> {
    config: &'c TimeDiscConfig,
    tableau: ButcherTableau,
    ts: TimestepState,
    err: f64,
    dtmax: f64,

    /// Current state, both forms, ghost cells valid
    pvar: StateVector,
    cvar: StateVector,
    /// Stage state, both forms
    stage_p: StateVector,
    stage_c: StateVector,
    /// Stage derivatives
    k: Vec<StateVector>,
    /// Source-chain output of one stage
    sterm: StateVector,
    /// Propagated solution and the difference of the two solutions
    y_high: StateVector,
    delta: StateVector,

    outputs: Vec<f64>,
    next_output: usize,
    time_points: Vec<f64>,
    snapshots: Vec<StateVector>,
}

impl<'c> Run<'c> {
    fn new(scenario: &mut Scenario, config: &'c TimeDiscConfig, tableau: ButcherTableau) -> Result<Self> {
        let Scenario { mesh, physics, boundary, initial, .. } = &mut *scenario;

        let mut pvar = initial.clone();
        boundary.enforce(mesh, &**physics, 0.0, &mut pvar)?;
        let mut cvar = pvar.zeros_like(VarKind::Conservative)?;
        physics.convert_to_conservative(&pvar, &mut cvar)?;
        validate_state(mesh, &pvar, 0)?;

        let stages = tableau.stages();
        let mut k = Vec::with_capacity(stages);
        for _ in 0..stages {
            k.push(cvar.zeros_like(VarKind::Conservative)?);
        }

        let time = 0.0;
        let mut run = Self {
            config,
            ts: TimestepState::new(time, config.dt_initial.unwrap_or(f64::INFINITY), DtCause::Initial),
            err: 0.0,
            dtmax: 0.0,
            stage_p: pvar.clone(),
            stage_c: cvar.clone(),
            k,
            sterm: cvar.zeros_like(VarKind::Conservative)?,
            y_high: cvar.zeros_like(VarKind::Conservative)?,
            delta: cvar.zeros_like(VarKind::Conservative)?,
            outputs: config.output_times(time),
            next_output: 0,
            time_points: vec![time],
            snapshots: vec![pvar.clone()],
            tableau,
            pvar,
            cvar,
        };

        let (dt, cause) = (run.ts.dt, run.ts.dt_cause.clone());
        run.propose(scenario, dt, cause)?;
        log::debug!("embedded rk: initial dt = {:e} ({})", run.ts.dt, run.ts.dt_cause);
        Ok(run)
    }

    // ====================================== Step size ======================================

    /// Clip the candidate step by every limit and store it
    fn propose(&mut self, scenario: &mut Scenario, candidate: f64, cause: DtCause) -> Result<()> {
        let Scenario { mesh, physics, fluxes, sources, .. } = scenario;
        let time = self.ts.time;
        let (mut dt, mut cause) = (candidate, cause);

        if let Some(limit) = self.config.dtlimit
            && limit < dt
        {
            dt = limit;
            cause = DtCause::DtLimit;
        }

        let flux_dt = fluxes.calc_timestep(mesh, &**physics, &self.pvar, &self.cvar)?;
        if flux_dt < dt {
            dt = flux_dt;
            cause = DtCause::Fluxes;
        }

        let (source_dt, source) = sources.calc_timestep(mesh, &**physics, time, &self.pvar, &self.cvar, dt)?;
        if let Some(name) = source {
            dt = source_dt;
            cause = DtCause::Source(name);
        }

        if let Some(&next) = self.outputs.get(self.next_output)
            && next < self.config.stoptime
            && time + dt >= next
        {
            dt = next - time;
            cause = DtCause::Output;
        }

        if time + dt >= self.config.stoptime {
            dt = self.config.stoptime - time;
            cause = DtCause::StopTime;
        }

        if !(dt > 0.0 && dt.is_finite()) {
            return Err(Error::NonConvergence {
                time,
                dt,
                rejections: self.ts.consecutive_rejections,
            });
        }

        self.ts.dt = dt;
        self.ts.dt_cause = cause;
        Ok(())
    }

    // ====================================== Phases ======================================

    fn compute_stages(&mut self, scenario: &mut Scenario) -> Result<()> {
        let Scenario { mesh, physics, fluxes, boundary, sources, .. } = scenario;
        let physics = &**physics;
        let (time, dt) = (self.ts.time, self.ts.dt);

        for i in 0..self.tableau.stages() {
            let stage_time = time + self.tableau.c(i) * dt;

            // the first stage is the current state, whose ghosts are valid
            let (pvar, cvar) = if i == 0 {
                (&self.pvar, &self.cvar)
            } else {
                self.stage_c.assign(&self.cvar)?;
                for (j, &a) in self.tableau.a_row(i).iter().enumerate() {
                    if a != 0.0 {
                        self.stage_c.scaled_add(dt * a, &self.k[j])?;
                    }
                }
                physics.convert_to_primitive(&self.stage_c, &mut self.stage_p)?;
                boundary.enforce(mesh, physics, stage_time, &mut self.stage_p)?;
                physics.convert_to_conservative(&self.stage_p, &mut self.stage_c)?;
                (&self.stage_p, &self.stage_c)
            };

            let k = &mut self.k[i];
            fluxes.compute_rhs(mesh, physics, stage_time, pvar, cvar, k)?;
            sources.external_sources(mesh, physics, stage_time, dt, pvar, cvar, &mut self.sterm)?;
            *k += &self.sterm;

            self.ts.evaluations += 1;
            log::trace!("embedded rk: stage {} at t = {:e}", i, stage_time);
        }
        Ok(())
    }

    fn estimate_error(&mut self, mesh: &Mesh) -> Result<Phase> {
        let dt = self.ts.dt;
        self.y_high.assign(&self.cvar)?;
        self.delta.fill(0.0);
        for i in 0..self.tableau.stages() {
            let high = self.tableau.b_high()[i];
            let low = self.tableau.b_low()[i];
            if high != 0.0 {
                self.y_high.scaled_add(dt * high, &self.k[i])?;
            }
            if high != low {
                self.delta.scaled_add(dt * (high - low), &self.k[i])?;
            }
        }

        self.err = error_norm(mesh, self.config, &self.y_high, &self.delta);
        Ok(if self.err <= 1.0 { Phase::AcceptStep } else { Phase::RejectStep })
    }

    fn accept_step(&mut self, scenario: &mut Scenario) -> Result<Phase> {
        let dt = self.ts.dt;
        {
            let Scenario { mesh, physics, boundary, .. } = &mut *scenario;
            let physics = &**physics;

            self.cvar.assign(&self.y_high)?;
            physics.convert_to_primitive(&self.cvar, &mut self.pvar)?;
            self.ts.time = self.landing_time(self.ts.time + dt);
            boundary.enforce(mesh, physics, self.ts.time, &mut self.pvar)?;
            physics.convert_to_conservative(&self.pvar, &mut self.cvar)?;

            self.ts.iteration += 1;
            self.ts.consecutive_rejections = 0;
            self.ts.err_old = self.config.controller.remember(self.err);
            self.ts.dtmin = self.ts.dtmin.min(dt);
            self.dtmax = self.dtmax.max(dt);
            validate_state(mesh, &self.pvar, self.ts.iteration)?;
        }

        log::debug!(
            "embedded rk: step {} accepted, t = {:e}, dt = {:e} ({}), err = {:.3e}",
            self.ts.iteration,
            self.ts.time,
            dt,
            self.ts.dt_cause,
            self.err
        );

        let clipped = matches!(self.ts.dt_cause, DtCause::Output | DtCause::StopTime);
        if self.config.dtmin > 0.0 && dt < self.config.dtmin && !clipped {
            log::warn!("embedded rk: accepted dt = {:e} fell below dtmin = {:e}", dt, self.config.dtmin);
            return Err(Error::NonConvergence {
                time: self.ts.time,
                dt,
                rejections: 0,
            });
        }

        while let Some(&next) = self.outputs.get(self.next_output) {
            if self.ts.time < next {
                break;
            }
            self.time_points.push(next);
            self.snapshots.push(self.pvar.clone());
            self.next_output += 1;
        }

        if self.ts.time >= self.config.stoptime {
            return Ok(Phase::Terminal);
        }
        if self.ts.iteration >= self.config.maxiter {
            return Err(Error::DidNotFinish {
                time: self.ts.time,
                stoptime: self.config.stoptime,
                iterations: self.ts.iteration,
            });
        }

        let factor = self.config.controller.accept_factor(self.err, self.ts.err_old, self.tableau.order());
        self.propose(scenario, factor * dt, DtCause::Controller)?;
        Ok(Phase::ComputeStages)
    }

    fn reject_step(&mut self) -> Result<Phase> {
        self.ts.rejected += 1;
        self.ts.consecutive_rejections += 1;

        let factor = self.config.controller.reject_factor(self.err, self.tableau.order());
        let dt = factor * self.ts.dt;
        log::trace!(
            "embedded rk: step rejected at t = {:e}, err = {:.3e}, dt {:e} -> {:e}",
            self.ts.time,
            self.err,
            self.ts.dt,
            dt
        );

        if self.ts.consecutive_rejections > self.config.max_rejections {
            return Err(Error::NonConvergence {
                time: self.ts.time,
                dt,
                rejections: self.ts.consecutive_rejections,
            });
        }

        self.ts.dt = dt;
        self.ts.dt_cause = DtCause::Rejected;
        Ok(Phase::ComputeStages)
    }

    // ====================================== Helpers ======================================

    /// Snap `time` onto the next output or stop time when within rounding
    fn landing_time(&self, time: f64) -> f64 {
        let targets = self.outputs.get(self.next_output).into_iter().chain(std::iter::once(&self.config.stoptime));
        for &target in targets {
            if (time - target).abs() <= TIME_EPS * target.abs().max(1.0) {
                return target;
            }
        }
        time
    }

    fn into_result(self) -> SimulationResult {
        let mut time_points = self.time_points;
        let mut snapshots = self.snapshots;
        if time_points.last() != Some(&self.ts.time) {
            time_points.push(self.ts.time);
            snapshots.push(self.pvar.clone());
        }

        let stats = IntegrationStats {
            accepted: self.ts.iteration,
            rejected: self.ts.rejected,
            evaluations: self.ts.evaluations,
            dtmin: self.ts.dtmin,
            dtmax: self.dtmax,
            final_dt: self.ts.dt,
            last_cause: self.ts.dt_cause.clone(),
        };

        log::info!(
            "embedded rk: finished at t = {:e} after {} steps ({} rejected, {} evaluations)",
            self.ts.time,
            stats.accepted,
            stats.rejected,
            stats.evaluations
        );

        let mut result = SimulationResult::new(time_points, snapshots, self.ts.time, self.pvar, stats);
        result.add_metadata("solver", "embedded Runge-Kutta");
        result.add_metadata("tableau", self.tableau.name());
        result.add_metadata("stages", &self.tableau.stages().to_string());
        result.add_metadata("accepted steps", &result.stats.accepted.to_string());
        result.add_metadata("rejected steps", &result.stats.rejected.to_string());
        result.add_metadata("function evaluations", &result.stats.evaluations.to_string());
        result.add_metadata("stoptime", &self.config.stoptime.to_string());
        result
    }
}

// =================================================================================================
// Error Norm
// =================================================================================================

/// Scaled max-norm of `delta` over active cells; non-finite gives `+∞`
fn error_norm(mesh: &Mesh, config: &TimeDiscConfig, y_high: &StateVector, delta: &StateVector) -> f64 {
    let nvar = y_high.nvar();
    let plane = |i: usize| -> f64 {
        let mut worst = 0.0f64;
        for j in mesh.active_range(1) {
            for k in mesh.active_range(2) {
                for v in 0..nvar {
                    let err = delta.get(i, j, k, v).abs();
                    if err == 0.0 {
                        continue;
                    }
                    let ratio = err / (config.tol_abs(v) + config.tol_rel * y_high.get(i, j, k, v).abs());
                    if !ratio.is_finite() {
                        return f64::INFINITY;
                    }
                    worst = worst.max(ratio);
                }
            }
        }
        worst
    };

    #[cfg(feature = "parallel")]
    {
        if mesh.active_count() * nvar > crate::solver::parallel_threshold() {
            return mesh.active_range(0).into_par_iter().map(plane).reduce(|| 0.0, f64::max);
        }
    }

    mesh.active_range(0).map(plane).fold(0.0, f64::max)
}

// =================================================================================================
// Tests
// =================================================================================================
