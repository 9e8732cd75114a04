//! Common utilities for integration tests

#![allow(dead_code)]

pub mod mock_sources;
pub mod test_helpers;

// Re-export commonly used items
pub use mock_sources::{ConstantGrowth, ExponentialDecay};
pub use test_helpers::{
    assert_states_close,
    create_simple_scenario,
    keplerian_ring,
    line_mesh,
    relative_error,
};
