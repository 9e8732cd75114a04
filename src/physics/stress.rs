//! Viscous stress tensor helpers shared by all physics modules
//!
//! Derivatives are second-order central differences along the index
//! directions, scaled by the physical cell width. On cylindrical meshes the
//! metric terms of the `(r, φ, z)` basis are added to the velocity gradient
//! and to `∇·τ`, so rigid rotation is stress-free. Spherical meshes use the
//! index-space stencil only.

use nalgebra::Matrix3;

use crate::mesh::{Geometry, Mesh, MeshField, VectorField};
use crate::physics::data::StateVector;

/// Slot of component `(a, b)` in the packed `[xx, xy, xz, yy, yz, zz]` layout
#[inline]
pub fn packed_index(a: usize, b: usize) -> usize {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    match (a, b) {
        (0, 0) => 0,
        (0, 1) => 1,
        (0, 2) => 2,
        (1, 1) => 3,
        (1, 2) => 4,
        _ => 5,
    }
}

fn offset(index: [usize; 3], d: usize, forward: bool) -> [usize; 3] {
    let mut out = index;
    out[d] = if forward { index[d] + 1 } else { index[d] - 1 };
    out
}

/// Velocity gradient `∂_a v_b` at `index`
fn velocity_gradient(mesh: &Mesh, pvar: &StateVector, dims: usize, index: [usize; 3]) -> Matrix3<f64> {
    let mut grad = Matrix3::zeros();
    let dl = mesh.cell(index[0], index[1], index[2]).dl;
    for a in (0..3).filter(|&a| mesh.is_active_dir(a)) {
        let (p, m) = (offset(index, a, true), offset(index, a, false));
        for b in 0..dims {
            let vp = pvar.get(p[0], p[1], p[2], 1 + b);
            let vm = pvar.get(m[0], m[1], m[2], 1 + b);
            grad[(a, b)] = (vp - vm) / (2.0 * dl[a]);
        }
    }

    // (∇v)_φr = ∂_φ v_r / r - v_φ / r,  (∇v)_φφ = ∂_φ v_φ / r + v_r / r
    let r = mesh.cell(index[0], index[1], index[2]).radius;
    if mesh.geometry() == Geometry::Cylindrical && r > 0.0 {
        let v_r = pvar.get(index[0], index[1], index[2], 1);
        grad[(1, 1)] += v_r / r;
        if dims >= 2 {
            grad[(1, 0)] -= pvar.get(index[0], index[1], index[2], 2) / r;
        }
    }
    grad
}

/// `τ = η (∇v + ∇vᵀ) + μ_bulk (∇·v) I`
pub fn calc_stresses(
    mesh: &Mesh,
    pvar: &StateVector,
    dims: usize,
    dynvis: &MeshField,
    bulkvis: &MeshField,
    stress: &mut VectorField,
) {
    // the divergence on active cells reads one ghost layer
    for (i, j, k) in mesh.extended_cells(1) {
        let grad = velocity_gradient(mesh, pvar, dims, [i, j, k]);
        let divergence = grad.trace();
        let (eta, bulk) = (dynvis[[i, j, k]], bulkvis[[i, j, k]]);
        for a in 0..3 {
            for b in a..3 {
                let mut tau = eta * (grad[(a, b)] + grad[(b, a)]);
                if a == b {
                    tau += bulk * divergence;
                }
                stress[[i, j, k, packed_index(a, b)]] = tau;
            }
        }
    }
}

/// Add `∇·τ` to the momenta and `∇·(τ·v)` to the energy, on active cells
pub fn viscous_source(
    mesh: &Mesh,
    pvar: &StateVector,
    dims: usize,
    energy: Option<usize>,
    stress: &VectorField,
    sterm: &mut StateVector,
) {
    let work = |idx: [usize; 3], a: usize| -> f64 {
        (0..dims)
            .map(|b| stress[[idx[0], idx[1], idx[2], packed_index(a, b)]] * pvar.get(idx[0], idx[1], idx[2], 1 + b))
            .sum()
    };

    for (i, j, k) in mesh.active_cells() {
        let index = [i, j, k];
        let dl = mesh.cell(i, j, k).dl;
        let mut heating = 0.0;
        for a in (0..3).filter(|&a| mesh.is_active_dir(a)) {
            let (p, m) = (offset(index, a, true), offset(index, a, false));
            let width = 2.0 * dl[a];
            for b in 0..dims {
                let tp = stress[[p[0], p[1], p[2], packed_index(a, b)]];
                let tm = stress[[m[0], m[1], m[2], packed_index(a, b)]];
                sterm.data_mut()[[i, j, k, 1 + b]] += (tp - tm) / width;
            }
            if energy.is_some() {
                heating += (work(p, a) - work(m, a)) / width;
            }
        }

        // hoop terms of ∇·τ and ∇·(τ·v)
        let r = mesh.cell(i, j, k).radius;
        if mesh.geometry() == Geometry::Cylindrical && r > 0.0 {
            let tau = |a: usize, b: usize| stress[[i, j, k, packed_index(a, b)]];
            sterm.data_mut()[[i, j, k, 1]] += (tau(0, 0) - tau(1, 1)) / r;
            if dims >= 2 {
                sterm.data_mut()[[i, j, k, 2]] += 2.0 * tau(0, 1) / r;
            }
            if energy.is_some() {
                heating += work(index, 0) / r;
            }
        }

        if let Some(e) = energy {
            sterm.data_mut()[[i, j, k, e]] += heating;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshConfig, field};
    use crate::physics::data::VarKind;

    #[test]
    fn test_packed_index_is_symmetric() {
        for a in 0..3 {
            for b in 0..3 {
                assert_eq!(packed_index(a, b), packed_index(b, a));
            }
        }
        assert_eq!(packed_index(2, 2), 5);
    }

    #[test]
    fn test_linear_shear_flow() {
        // v_x = s * y: τ_xy = η s, trace-free part vanishes on the diagonal
        let mesh = Mesh::new(&MeshConfig { inum: 6, jnum: 6, ..MeshConfig::default() }).unwrap();
        let mut pvar = StateVector::zeros(&mesh, 3, VarKind::Primitive).unwrap();
        let shear = 2.0;
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            pvar.set(i, j, k, 0, 1.0);
            pvar.set(i, j, k, 1, shear * cell.position.y);
        }

        let eta = field::scalar_field(mesh.shape(), 0.5, "test").unwrap();
        let bulk = eta.mapv(|x| -2.0 / 3.0 * x);
        let mut stress = field::vector_field(mesh.shape(), 6, 0.0, "test").unwrap();
        calc_stresses(&mesh, &pvar, 2, &eta, &bulk, &mut stress);

        let tau_xy = stress[[4, 4, 0, packed_index(0, 1)]];
        assert!((tau_xy - 0.5 * shear).abs() < 1e-12);
        assert!(stress[[4, 4, 0, packed_index(0, 0)]].abs() < 1e-12);

        // uniform stress: no net force
        let mut sterm = pvar.zeros_like(VarKind::Conservative).unwrap();
        viscous_source(&mesh, &pvar, 2, None, &stress, &mut sterm);
        assert!(sterm.data().iter().all(|x| x.abs() < 1e-10));
    }

    fn polar_mesh() -> Mesh {
        Mesh::new(&MeshConfig {
            geometry: Geometry::Cylindrical,
            inum: 8,
            jnum: 8,
            xmin: 1.0,
            xmax: 3.0,
            ymin: 0.0,
            ymax: std::f64::consts::TAU,
            ..MeshConfig::default()
        })
        .unwrap()
    }

    /// `v_φ = f(r)` on every cell, `ρ = 1`, `v_r = 0`
    fn rotating(mesh: &Mesh, v_phi: impl Fn(f64) -> f64) -> StateVector {
        let mut pvar = StateVector::zeros(mesh, 4, VarKind::Primitive).unwrap();
        for ((i, j, k), cell) in mesh.cells().indexed_iter() {
            pvar.set(i, j, k, 0, 1.0);
            pvar.set(i, j, k, 2, v_phi(cell.radius));
        }
        pvar
    }

    #[test]
    fn test_rigid_rotation_is_stress_free() {
        let mesh = polar_mesh();
        let pvar = rotating(&mesh, |r| 0.7 * r);

        let eta = field::scalar_field(mesh.shape(), 1e-2, "test").unwrap();
        let bulk = eta.mapv(|x| -2.0 / 3.0 * x);
        let mut stress = field::vector_field(mesh.shape(), 6, 0.0, "test").unwrap();
        calc_stresses(&mesh, &pvar, 2, &eta, &bulk, &mut stress);
        for (i, j, k) in mesh.extended_cells(1) {
            for c in 0..6 {
                assert!(stress[[i, j, k, c]].abs() < 1e-14, "cell ({}, {}, {}) component {}", i, j, k, c);
            }
        }

        let mut sterm = pvar.zeros_like(VarKind::Conservative).unwrap();
        viscous_source(&mesh, &pvar, 2, Some(3), &stress, &mut sterm);
        assert!(sterm.data().iter().all(|x| x.abs() < 1e-12));
    }

    #[test]
    fn test_keplerian_shear_stress() {
        // τ_rφ = η r dΩ/dr = -1.5 η Ω for Ω = r^{-3/2}
        let mesh = polar_mesh();
        let pvar = rotating(&mesh, |r| r.powf(-0.5));

        let eta = field::scalar_field(mesh.shape(), 1e-3, "test").unwrap();
        let bulk = eta.mapv(|x| -2.0 / 3.0 * x);
        let mut stress = field::vector_field(mesh.shape(), 6, 0.0, "test").unwrap();
        calc_stresses(&mesh, &pvar, 2, &eta, &bulk, &mut stress);

        for (i, j, k) in mesh.active_cells() {
            let r = mesh.cell(i, j, k).radius;
            let expected = -1.5e-3 * r.powf(-1.5);
            let tau = stress[[i, j, k, packed_index(0, 1)]];
            assert!(((tau - expected) / expected).abs() < 0.02, "r = {}: {} vs {}", r, tau, expected);
            assert!(stress[[i, j, k, packed_index(0, 0)]].abs() < 1e-14);
        }
    }
}
