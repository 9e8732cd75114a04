//! Mesh-sized field containers
//!
//! Fields cover the whole index box of a mesh, active cells plus the ghost
//! halo. Scalars are `Array3<f64>` indexed `(i, j, k)`; vector and tensor
//! fields add a trailing component axis, `Array4<f64>` indexed
//! `(i, j, k, c)`.
//!
//! Ghost values are only meaningful after the boundary layer has filled
//! them. Active values are always valid.
//!
//! Allocation goes through [`Vec::try_reserve_exact`] so that a field that
//! does not fit in memory is reported as [`Error::Allocation`] instead of
//! aborting the process.

use ndarray::{Array3, Array4};

use crate::error::{Error, Result};

/// Scalar field over the mesh index box
pub type MeshField = Array3<f64>;

/// Vector (or tensor) field over the mesh index box, component axis last
pub type VectorField = Array4<f64>;

fn checked_len(dims: &[usize], component: &'static str) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(Error::Allocation {
            component,
            operation: "allocate",
            bytes: usize::MAX,
        })
}

fn try_buffer(len: usize, value: f64, component: &'static str) -> Result<Vec<f64>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Error::Allocation {
            component,
            operation: "allocate",
            bytes: len.saturating_mul(std::mem::size_of::<f64>()),
        })?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Allocate a scalar field filled with `value`
///
/// `component` names the owner for error reporting.
pub fn scalar_field(shape: (usize, usize, usize), value: f64, component: &'static str) -> Result<MeshField> {
    let len = checked_len(&[shape.0, shape.1, shape.2], component)?;
    let buffer = try_buffer(len, value, component)?;
    Array3::from_shape_vec(shape, buffer).map_err(|e| Error::invalid_state(component, "allocate", e.to_string()))
}

/// Allocate a vector field with `components` entries per cell
pub fn vector_field(
    shape: (usize, usize, usize),
    components: usize,
    value: f64,
    component: &'static str,
) -> Result<VectorField> {
    let full = (shape.0, shape.1, shape.2, components);
    let len = checked_len(&[full.0, full.1, full.2, full.3], component)?;
    let buffer = try_buffer(len, value, component)?;
    Array4::from_shape_vec(full, buffer).map_err(|e| Error::invalid_state(component, "allocate", e.to_string()))
}
