//! State vector container
//!
//! A [`StateVector`] holds every physical variable of a physics module over
//! the full mesh index box, `(i, j, k, var)`, and is tagged as primitive or
//! conservative.
//!
//! # Memory Layout
//!
//! Standard (row-major) ndarray layout, variable axis fastest. The slice
//! operations below rely on it and switch to rayon above
//! [`parallel_threshold`](crate::solver::parallel_threshold) elements when the
//! crate is built with the `parallel` feature.

use ndarray::{Array4, ArrayView1, ArrayViewMut1, s};
use std::fmt;

use crate::error::{Error, Result};
use crate::mesh::{Mesh, field};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Representation of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    /// Density, velocity, pressure
    Primitive,
    /// Density, momentum, total energy
    Conservative,
}

impl fmt::Display for VarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarKind::Primitive => write!(f, "primitive"),
            VarKind::Conservative => write!(f, "conservative"),
        }
    }
}

/// Physical variables over the mesh, in one representation
#[derive(Debug, Clone, PartialEq)]
pub struct StateVector {
    kind: VarKind,
    data: Array4<f64>,
}

impl StateVector {
    /// Allocate a zero state for `mesh` with `nvar` variables
    pub fn zeros(mesh: &Mesh, nvar: usize, kind: VarKind) -> Result<Self> {
        let data = field::vector_field(mesh.shape(), nvar, 0.0, "state")?;
        Ok(Self { kind, data })
    }

    /// Wrap an existing array
    pub fn from_array(kind: VarKind, data: Array4<f64>) -> Self {
        Self { kind, data }
    }

    /// Zero state with the same shape, tagged `kind`
    pub fn zeros_like(&self, kind: VarKind) -> Result<Self> {
        let (ni, nj, nk, nv) = self.data.dim();
        let data = field::vector_field((ni, nj, nk), nv, 0.0, "state")?;
        Ok(Self { kind, data })
    }

    pub fn kind(&self) -> VarKind {
        self.kind
    }

    /// Retag the representation after an in-place conversion
    pub fn set_kind(&mut self, kind: VarKind) {
        self.kind = kind;
    }

    pub fn nvar(&self) -> usize {
        self.data.dim().3
    }

    /// Index-box shape without the variable axis
    pub fn shape(&self) -> (usize, usize, usize) {
        let (ni, nj, nk, _) = self.data.dim();
        (ni, nj, nk)
    }

    pub fn data(&self) -> &Array4<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array4<f64> {
        &mut self.data
    }

    /// All variables of one cell
    #[inline]
    pub fn cell(&self, i: usize, j: usize, k: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![i, j, k, ..])
    }

    /// All variables of one cell, mutable
    #[inline]
    pub fn cell_mut(&mut self, i: usize, j: usize, k: usize) -> ArrayViewMut1<'_, f64> {
        self.data.slice_mut(s![i, j, k, ..])
    }

    /// Single value
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize, v: usize) -> f64 {
        self.data[[i, j, k, v]]
    }

    /// Set a single value
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, v: usize, value: f64) {
        self.data[[i, j, k, v]] = value;
    }

    /// Set every entry to `value`
    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Check that `other` has the same shape
    pub fn ensure_same_shape(&self, other: &Self, operation: &'static str) -> Result<()> {
        if self.data.dim() != other.data.dim() {
            return Err(Error::invalid_state(
                "state",
                operation,
                format!("shape mismatch {:?} vs {:?}", self.data.dim(), other.data.dim()),
            ));
        }
        Ok(())
    }

    /// Copy values (and representation) from `other`
    pub fn assign(&mut self, other: &Self) -> Result<()> {
        self.ensure_same_shape(other, "assign")?;
        self.kind = other.kind;
        self.data.assign(&other.data);
        Ok(())
    }

    /// `self += factor * other`
    pub fn scaled_add(&mut self, factor: f64, other: &Self) -> Result<()> {
        self.ensure_same_shape(other, "scaled_add")?;
        if factor == 0.0 {
            return Ok(());
        }
        match (self.data.as_slice_mut(), other.data.as_slice()) {
            (Some(lhs), Some(rhs)) => axpy(lhs, factor, rhs),
            _ => self.data.scaled_add(factor, &other.data),
        }
        Ok(())
    }

    /// Apply `f` to every entry
    pub fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        match self.data.as_slice_mut() {
            Some(values) => {
                #[cfg(feature = "parallel")]
                if values.len() > crate::solver::parallel_threshold() {
                    values.par_iter_mut().for_each(|x| *x = f(*x));
                    return;
                }
                values.iter_mut().for_each(|x| *x = f(*x));
            }
            None => self.data.mapv_inplace(f),
        }
    }
}

fn axpy(lhs: &mut [f64], factor: f64, rhs: &[f64]) {
    #[cfg(feature = "parallel")]
    if lhs.len() > crate::solver::parallel_threshold() {
        lhs.par_iter_mut().zip(rhs.par_iter()).for_each(|(y, x)| *y += factor * x);
        return;
    }
    lhs.iter_mut().zip(rhs.iter()).for_each(|(y, x)| *y += factor * x);
}

// ================================== Simple arithmetic operators ==================================

impl std::ops::AddAssign<&StateVector> for StateVector {
    fn add_assign(&mut self, rhs: &StateVector) {
        assert_eq!(self.data.dim(), rhs.data.dim(), "State shapes must match");
        self.data += &rhs.data;
    }
}

impl std::ops::MulAssign<f64> for StateVector {
    fn mul_assign(&mut self, scalar: f64) {
        self.data *= scalar;
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (ni, nj, nk, nv) = self.data.dim();
        write!(f, "StateVector ({}) [{} * {} * {}] x {}", self.kind, ni, nj, nk, nv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshConfig;
    use crate::solver::ThresholdGuard;

    fn mesh() -> Mesh {
        Mesh::new(&MeshConfig { inum: 8, jnum: 4, ..MeshConfig::default() }).unwrap()
    }

    #[test]
    fn test_zero_state() {
        let state = StateVector::zeros(&mesh(), 4, VarKind::Primitive).unwrap();
        assert_eq!(state.nvar(), 4);
        assert_eq!(state.shape(), (12, 8, 1));
        assert_eq!(state.kind(), VarKind::Primitive);
        assert!(state.data().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_scaled_add() {
        let mut a = StateVector::zeros(&mesh(), 2, VarKind::Conservative).unwrap();
        let mut b = a.clone();
        a.fill(1.0);
        b.fill(2.0);

        a.scaled_add(0.5, &b).unwrap();
        assert!(a.data().iter().all(|&x| x == 2.0));
    }

    #[test]
    fn test_scaled_add_parallel_path_matches() {
        let _guard = ThresholdGuard::save(1);
        let mut a = StateVector::zeros(&mesh(), 3, VarKind::Conservative).unwrap();
        let mut b = a.clone();
        b.fill(3.0);

        a.scaled_add(-2.0, &b).unwrap();
        assert!(a.data().iter().all(|&x| x == -6.0));
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let mut a = StateVector::zeros(&mesh(), 2, VarKind::Conservative).unwrap();
        let b = StateVector::zeros(&mesh(), 3, VarKind::Conservative).unwrap();
        assert!(a.scaled_add(1.0, &b).is_err());
        assert!(a.assign(&b).is_err());
    }

    #[test]
    fn test_operators() {
        let mut a = StateVector::zeros(&mesh(), 1, VarKind::Primitive).unwrap();
        let mut b = a.clone();
        a.fill(1.0);
        b.fill(4.0);

        a += &b;
        a *= 2.0;
        assert_eq!(a.get(3, 3, 0, 0), 10.0);
    }

    #[test]
    fn test_apply() {
        let mut a = StateVector::zeros(&mesh(), 1, VarKind::Primitive).unwrap();
        a.fill(3.0);
        a.apply(|x| x * x);
        assert_eq!(a.get(0, 0, 0, 0), 9.0);
    }
}
