//! Helper functions for integration tests

use std::f64::consts::TAU;

use diskflow::mesh::{Geometry, Mesh, MeshConfig};
use diskflow::physics::{IsothermalPhysics, StateVector, VarKind};
use diskflow::solver::{BoundaryType, DomainBoundaries, NullFluxes, Scenario};
use diskflow::sources::{SourceChain, SourceTerm};

/// Assert that two states agree on every entry (within tolerance)
pub fn assert_states_close(state1: &StateVector, state2: &StateVector, tolerance: f64, message: &str) {
    assert_eq!(state1.data().dim(), state2.data().dim(), "{}: Dimension mismatch", message);

    for ((index, &v1), &v2) in state1.data().indexed_iter().zip(state2.data().iter()) {
        let diff = (v1 - v2).abs();
        assert!(
            diff < tolerance,
            "{}: element {:?} differs by {} (tolerance {})",
            message, index, diff, tolerance
        );
    }
}

/// One-dimensional Cartesian mesh with `inum` cells on `[0, 1]`
pub fn line_mesh(inum: usize) -> Mesh {
    Mesh::new(&MeshConfig { inum, ..MeshConfig::default() }).unwrap()
}

/// Thin cylindrical ring `r ∈ [1, 2]`, full azimuth, centred on `z = 0`
pub fn keplerian_ring(inum: usize, jnum: usize) -> Mesh {
    Mesh::new(&MeshConfig {
        geometry: Geometry::Cylindrical,
        inum,
        jnum,
        xmin: 1.0,
        xmax: 2.0,
        ymin: 0.0,
        ymax: TAU,
        zmin: -0.5,
        zmax: 0.5,
        ..MeshConfig::default()
    })
    .unwrap()
}

/// Isothermal gas at rest with unit density, no fluxes, driven by `sources`
pub fn create_simple_scenario(mesh: Mesh, sources: Vec<Box<dyn SourceTerm>>) -> Scenario {
    let physics = IsothermalPhysics::new(0.1, 2).unwrap();
    let mut initial = StateVector::zeros(&mesh, 3, VarKind::Primitive).unwrap();
    for (i, j, k) in mesh.active_cells() {
        initial.set(i, j, k, 0, 1.0);
    }

    let mut chain = SourceChain::new();
    for source in sources {
        chain.push(source);
    }

    Scenario::new(
        mesh,
        Box::new(physics),
        Box::new(NullFluxes),
        Box::new(DomainBoundaries::new([BoundaryType::ZeroGradient, BoundaryType::Periodic, BoundaryType::ZeroGradient])),
        chain,
        initial,
    )
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}
