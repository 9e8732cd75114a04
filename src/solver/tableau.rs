//! Butcher tableaus of embedded Runge-Kutta pairs
//!
//! # Mathematical Background
//!
//! An explicit `s`-stage pair advances `dy/dt = f(t, y)` with
//!
//! ```text
//! k_i = f(t + c_i dt, y + dt Σ_{j<i} a_ij k_j)
//! y_high = y + dt Σ b_high_i k_i
//! y_low  = y + dt Σ b_low_i  k_i
//! ```
//!
//! `y_high - y_low` estimates the local error of the lower-order solution;
//! the higher-order one is propagated.
//!
//! | Tableau         | Stages | Orders |
//! |-----------------|--------|--------|
//! | `CashKarp45`    | 6      | 5(4)   |
//! | `Fehlberg45`    | 6      | 5(4)   |
//! | `HeunEuler21`   | 2      | 2(1)   |

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Consistency tolerance of row sums and weight sums
const CONSISTENCY_TOL: f64 = 1e-12;

/// Selectable embedded pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableauKind {
    #[default]
    CashKarp45,
    Fehlberg45,
    HeunEuler21,
}

impl TableauKind {
    /// Build and validate the tableau
    pub fn tableau(self) -> Result<ButcherTableau> {
        match self {
            TableauKind::CashKarp45 => ButcherTableau::cash_karp45(),
            TableauKind::Fehlberg45 => ButcherTableau::fehlberg45(),
            TableauKind::HeunEuler21 => ButcherTableau::heun_euler21(),
        }
    }
}

/// Validated coefficients of an explicit embedded pair
#[derive(Debug, Clone, PartialEq)]
pub struct ButcherTableau {
    name: &'static str,
    a: Vec<Vec<f64>>,
    b_high: Vec<f64>,
    b_low: Vec<f64>,
    c: Vec<f64>,
    order: usize,
}

impl ButcherTableau {
    /// Create a tableau
    ///
    /// `a` is the full `s × s` matrix (zeros on and above the diagonal).
    /// `order` is the order of the embedded (lower-order) solution, which
    /// sets the exponent of the step-size controller.
    ///
    /// # Errors
    ///
    /// `Configuration` if the tableau is empty, not square, not strictly
    /// lower triangular, `c[0] != 0`, a row sum differs from `c`, or a weight
    /// vector does not sum to one.
    pub fn new(
        name: &'static str,
        a: Vec<Vec<f64>>,
        b_high: Vec<f64>,
        b_low: Vec<f64>,
        c: Vec<f64>,
        order: usize,
    ) -> Result<Self> {
        let tableau = Self { name, a, b_high, b_low, c, order };
        tableau.validate()?;
        Ok(tableau)
    }

    fn validate(&self) -> Result<()> {
        let fail = |message: String| -> Result<()> {
            Err(Error::config("tableau", "validate", format!("{}: {}", self.name, message)))
        };
        let s = self.c.len();

        if s == 0 {
            return fail("no stages".into());
        }
        if self.order == 0 {
            return fail("embedded order must be at least 1".into());
        }
        if self.a.len() != s || self.a.iter().any(|row| row.len() != s) {
            return fail(format!("a must be {}x{}", s, s));
        }
        if self.b_high.len() != s || self.b_low.len() != s {
            return fail(format!("weights must have {} entries", s));
        }
        if self.c[0] != 0.0 {
            return fail(format!("c[0] must be 0, got {}", self.c[0]));
        }
        for (i, row) in self.a.iter().enumerate() {
            if row[i..].iter().any(|&x| x != 0.0) {
                return fail(format!("row {} is not strictly lower triangular", i));
            }
            let sum: f64 = row.iter().sum();
            if (sum - self.c[i]).abs() > CONSISTENCY_TOL {
                return fail(format!("row {} sums to {} but c = {}", i, sum, self.c[i]));
            }
        }
        for (label, weights) in [("b_high", &self.b_high), ("b_low", &self.b_low)] {
            let sum: f64 = weights.iter().sum();
            if (sum - 1.0).abs() > CONSISTENCY_TOL {
                return fail(format!("{} sums to {}", label, sum));
            }
        }
        Ok(())
    }

    /// Cash–Karp 5(4)
    pub fn cash_karp45() -> Result<Self> {
        Self::new(
            "cash-karp 5(4)",
            vec![
                vec![0.0; 6],
                vec![1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
                vec![3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0, 0.0, 0.0, 0.0],
                vec![-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0, 0.0, 0.0],
                vec![
                    1631.0 / 55296.0,
                    175.0 / 512.0,
                    575.0 / 13824.0,
                    44275.0 / 110592.0,
                    253.0 / 4096.0,
                    0.0,
                ],
            ],
            vec![37.0 / 378.0, 0.0, 250.0 / 621.0, 125.0 / 594.0, 0.0, 512.0 / 1771.0],
            vec![
                2825.0 / 27648.0,
                0.0,
                18575.0 / 48384.0,
                13525.0 / 55296.0,
                277.0 / 14336.0,
                1.0 / 4.0,
            ],
            vec![0.0, 1.0 / 5.0, 3.0 / 10.0, 3.0 / 5.0, 1.0, 7.0 / 8.0],
            4,
        )
    }

    /// Runge–Kutta–Fehlberg 4(5), propagating the fifth-order solution
    pub fn fehlberg45() -> Result<Self> {
        Self::new(
            "fehlberg 5(4)",
            vec![
                vec![0.0; 6],
                vec![1.0 / 4.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                vec![3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0, 0.0],
                vec![1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0, 0.0],
                vec![439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0, 0.0],
                vec![-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0, 0.0],
            ],
            vec![16.0 / 135.0, 0.0, 6656.0 / 12825.0, 28561.0 / 56430.0, -9.0 / 50.0, 2.0 / 55.0],
            vec![25.0 / 216.0, 0.0, 1408.0 / 2565.0, 2197.0 / 4104.0, -1.0 / 5.0, 0.0],
            vec![0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
            4,
        )
    }

    /// Heun–Euler 2(1)
    pub fn heun_euler21() -> Result<Self> {
        Self::new(
            "heun-euler 2(1)",
            vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            vec![0.5, 0.5],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            1,
        )
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of stages
    pub fn stages(&self) -> usize {
        self.c.len()
    }

    /// Order of the embedded solution
    pub fn order(&self) -> usize {
        self.order
    }

    /// Coefficients of stage `i` on earlier stages (`j < i`)
    pub fn a_row(&self, i: usize) -> &[f64] {
        &self.a[i][..i]
    }

    pub fn c(&self, i: usize) -> f64 {
        self.c[i]
    }

    pub fn b_high(&self) -> &[f64] {
        &self.b_high
    }

    pub fn b_low(&self) -> &[f64] {
        &self.b_low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tableaus_are_consistent() {
        for kind in [TableauKind::CashKarp45, TableauKind::Fehlberg45, TableauKind::HeunEuler21] {
            let tableau = kind.tableau().unwrap();
            assert_eq!(tableau.a_row(0).len(), 0);
            assert_eq!(tableau.b_high().len(), tableau.stages());
        }
    }

    #[test]
    fn test_cash_karp_row_sums() {
        let ck = ButcherTableau::cash_karp45().unwrap();
        assert_eq!(ck.stages(), 6);
        assert_eq!(ck.order(), 4);

        let row3: f64 = ck.a_row(3).iter().sum();
        assert!((row3 - 0.6).abs() < 1e-15);

        for i in 0..ck.stages() {
            let sum: f64 = ck.a_row(i).iter().sum();
            assert!((sum - ck.c(i)).abs() < 1e-12, "row {}", i);
        }
    }

    #[test]
    fn test_fehlberg_shape() {
        let rkf = ButcherTableau::fehlberg45().unwrap();
        assert_eq!(rkf.stages(), 6);
        assert_eq!(rkf.c(3), 12.0 / 13.0);
        assert_eq!(rkf.b_low()[5], 0.0);
    }

    #[test]
    fn test_inconsistent_row_is_rejected() {
        let err = ButcherTableau::new(
            "broken",
            vec![vec![0.0, 0.0], vec![0.9, 0.0]],
            vec![0.5, 0.5],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            1,
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_upper_entries_are_rejected() {
        let err = ButcherTableau::new(
            "implicit",
            vec![vec![0.0, 0.0], vec![0.5, 0.5]],
            vec![0.5, 0.5],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            1,
        )
        .unwrap_err();
        assert!(err.to_string().contains("lower triangular"));
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(
            ButcherTableau::new("weights", vec![vec![0.0, 0.0], vec![1.0, 0.0]], vec![0.5, 0.4], vec![1.0, 0.0], vec![0.0, 1.0], 1)
                .is_err()
        );
        assert!(ButcherTableau::new("empty", vec![], vec![], vec![], vec![], 1).is_err());
    }

    #[test]
    fn test_kind_parses_from_config() {
        let kind: TableauKind = serde_json::from_str("\"fehlberg45\"").unwrap();
        assert_eq!(kind, TableauKind::Fehlberg45);
    }
}
