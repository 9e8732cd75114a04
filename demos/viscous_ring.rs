//! Cooling viscous ring around a point mass
//!
//! An adiabatic Keplerian ring `r ∈ [1, 2]` is heated by alpha viscosity and
//! cooled with the Gammie prescription (`t_cool = b / Ω`). The flux scheme is
//! left out, so every cell evolves under its local sources only and the
//! pressure relaxes on the cooling time.
//!
//! The configuration is read from JSON the way a driver program would:
//!
//! ```bash
//! cargo run --release --example viscous_ring
//! ```

use diskflow::prelude::*;
use std::error::Error;
use std::result::Result;
use std::f64::consts::TAU;

const SOURCES: &str = r#"[
    { "type": "gravity", "update_disk_height": true,
      "contributors": [ { "type": "point_mass", "mass": 1.0 } ] },
    { "type": "viscosity", "model": { "type": "alpha", "alpha": 0.01 } },
    { "type": "disk_cooling", "method": { "type": "gammie" }, "b_cool": 5.0 }
]"#;

const TIME_DISC: &str = r#"{
    "method": "cash_karp45",
    "stoptime": 20.0,
    "tol_rel": 1e-5,
    "tol_abs": [1e-8],
    "noutput": 10
}"#;

fn main() -> Result<(), Box<dyn Error>> {
    let mesh = Mesh::new(&MeshConfig {
        geometry: Geometry::Cylindrical,
        inum: 32,
        jnum: 16,
        xmin: 1.0,
        xmax: 2.0,
        ymax: TAU,
        zmin: -0.5,
        zmax: 0.5,
        ..MeshConfig::default()
    })?;
    let physics = EulerPhysics::new(1.4, 2)?;

    let source_configs: Vec<SourceConfig> = serde_json::from_str(SOURCES)?;
    let sources = SourceChain::from_config(&mesh, &physics, &source_configs)?;
    println!("Sources: {}", sources.names().join(", "));

    let mut initial = StateVector::zeros(&mesh, physics.nvar(), VarKind::Primitive)?;
    for ((i, j, k), cell) in mesh.cells().indexed_iter() {
        let r = cell.radius;
        initial.set(i, j, k, 0, 1.0 / r);
        initial.set(i, j, k, 2, r.powf(-0.5));
        initial.set(i, j, k, 3, 2.5e-3 / r);
    }

    let mut scenario = Scenario::new(
        mesh,
        Box::new(physics),
        Box::new(NullFluxes),
        Box::new(DomainBoundaries::new([BoundaryType::ZeroGradient, BoundaryType::Periodic, BoundaryType::ZeroGradient])),
        sources,
        initial,
    );

    let config: TimeDiscConfig = serde_json::from_str(TIME_DISC)?;
    let result = EmbeddedRkSolver::new().solve(&mut scenario, &config)?;

    // pressure along the ring at φ = 0
    let (inner, outer) = (*scenario.mesh.active_range(0).start(), *scenario.mesh.active_range(0).end());
    let j = *scenario.mesh.active_range(1).start();
    let k = *scenario.mesh.active_range(2).start();
    println!();
    println!("{:>8} {:>14} {:>14}", "t", "p(r = 1)", "p(r = 2)");
    for (t, state) in result.time_points.iter().zip(&result.snapshots) {
        println!("{:>8.2} {:>14.6e} {:>14.6e}", t, state.get(inner, j, k, 3), state.get(outer, j, k, 3));
    }

    println!();
    println!("Accepted steps:       {}", result.stats.accepted);
    println!("Rejected steps:       {}", result.stats.rejected);
    println!("Function evaluations: {}", result.stats.evaluations);
    println!("Last step limited by: {}", result.stats.last_cause);

    Ok(())
}
