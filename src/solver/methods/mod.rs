//! Time integration methods
//!
//! Concrete implementations of the [`Solver`](crate::solver::Solver) trait.
//!
//! # Available Methods
//!
//! - **[`EmbeddedRkSolver`]**: explicit embedded Runge-Kutta pair with PI
//!   step-size control. The pair is chosen by
//!   [`TableauKind`](crate::solver::TableauKind):
//!
//! | Pair          | Stages | Propagated order | Error order |
//! |---------------|--------|------------------|-------------|
//! | Cash-Karp     | 6      | 5                | 4           |
//! | Fehlberg      | 6      | 5                | 4           |
//! | Heun-Euler    | 2      | 2                | 1           |
//!
//! # Performance Considerations
//!
//! - Stage states are preallocated once per run and reused.
//! - State arithmetic and the error norm switch to Rayon above
//!   [`parallel_threshold`](crate::solver::parallel_threshold) elements
//!   (feature `parallel`).

mod embedded;

pub use embedded::{EmbeddedRkSolver, Phase};
