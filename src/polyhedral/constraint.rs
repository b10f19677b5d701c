//! Linear constraints for polyhedral representation.
//!
//! A constraint is a linear inequality or equality:
//! - Inequality: expr >= 0
//! - Equality: expr = 0

use crate::polyhedral::expr::AffineExpr;
use num_integer::Integer;
use serde::{Serialize, Deserialize};
use std::fmt;

/// A linear constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraint {
    /// The affine expression (constraint is: expr >= 0 or expr = 0)
    pub expr: AffineExpr,
    /// Kind of constraint
    pub kind: ConstraintKind,
}

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    /// Greater than or equal: expr >= 0
    Inequality,
    /// Equal: expr = 0
    Equality,
}

/// Result of normalizing a constraint over the integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Holds for every point
    Tautology,
    /// Holds for no point
    Contradiction,
    /// An equivalent constraint with coprime coefficients
    Constraint(Constraint),
}

impl Constraint {
    /// Create a new constraint.
    pub fn new(expr: AffineExpr, kind: ConstraintKind) -> Self {
        Self { expr, kind }
    }

    /// Create an inequality constraint: expr >= 0
    pub fn ge_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Inequality)
    }

    /// Create an equality constraint: expr = 0
    pub fn eq_zero(expr: AffineExpr) -> Self {
        Self::new(expr, ConstraintKind::Equality)
    }

    /// Create a constraint: lhs >= rhs
    pub fn ge(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(lhs - rhs)
    }

    /// Create a constraint: lhs <= rhs
    pub fn le(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::ge_zero(rhs - lhs)
    }

    /// Create a constraint: lhs = rhs
    pub fn eq(lhs: AffineExpr, rhs: AffineExpr) -> Self {
        Self::eq_zero(lhs - rhs)
    }

    /// Create a lower bound constraint: var >= lower
    pub fn lower_bound(dim: usize, lower: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = AffineExpr::var(dim, n_dim, n_param);
        expr.constant = -lower;
        Self::ge_zero(expr)
    }

    /// Create an upper bound constraint: var <= upper
    pub fn upper_bound(dim: usize, upper: i64, n_dim: usize, n_param: usize) -> Self {
        let mut expr = -AffineExpr::var(dim, n_dim, n_param);
        expr.constant = upper;
        Self::ge_zero(expr)
    }

    /// Check if this is an equality constraint.
    pub fn is_equality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Equality)
    }

    /// Check if this is an inequality constraint.
    pub fn is_inequality(&self) -> bool {
        matches!(self.kind, ConstraintKind::Inequality)
    }

    /// Check if this constraint is satisfied by the given point.
    pub fn is_satisfied(&self, dim_values: &[i64], param_values: &[i64]) -> bool {
        let value = self.expr.evaluate(dim_values, param_values);
        match self.kind {
            ConstraintKind::Inequality => value >= 0,
            ConstraintKind::Equality => value == 0,
        }
    }

    /// Integer complement as a disjunction of inequalities.
    ///
    /// `e >= 0` becomes `-e - 1 >= 0`; `e = 0` becomes `e - 1 >= 0` or `-e - 1 >= 0`.
    pub fn complement(&self) -> Vec<Constraint> {
        let mut below = -self.expr.clone();
        below.constant -= 1;
        match self.kind {
            ConstraintKind::Inequality => vec![Self::ge_zero(below)],
            ConstraintKind::Equality => {
                let mut above = self.expr.clone();
                above.constant -= 1;
                vec![Self::ge_zero(above), Self::ge_zero(below)]
            }
        }
    }

    /// Divide out the coefficient GCD, tightening inequalities to the
    /// integer hull and detecting equalities without integer solutions.
    pub fn normalize(&self) -> Normalized {
        let g = self.expr.coeff_gcd();
        if g == 0 {
            let c = self.expr.constant;
            let holds = match self.kind {
                ConstraintKind::Inequality => c >= 0,
                ConstraintKind::Equality => c == 0,
            };
            return if holds { Normalized::Tautology } else { Normalized::Contradiction };
        }
        let mut expr = self.expr.clone();
        if g > 1 {
            match self.kind {
                ConstraintKind::Equality => {
                    if expr.constant % g != 0 {
                        return Normalized::Contradiction;
                    }
                    expr.constant /= g;
                }
                ConstraintKind::Inequality => {
                    expr.constant = Integer::div_floor(&expr.constant, &g);
                }
            }
            for c in expr.coeffs.iter_mut().chain(expr.param_coeffs.iter_mut()) {
                *c /= g;
            }
        }
        if self.is_equality() {
            // Canonical sign: first non-zero coefficient positive.
            let first = expr
                .coeffs
                .iter()
                .chain(&expr.param_coeffs)
                .find(|&&c| c != 0)
                .copied()
                .unwrap_or(0);
            if first < 0 {
                expr = -expr;
            }
        }
        Normalized::Constraint(Self::new(expr, self.kind))
    }

    /// Get the number of variable columns.
    pub fn n_dim(&self) -> usize {
        self.expr.n_dim()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.expr.n_param()
    }

    /// Convert to string with given names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        // Print as "lhs >= rhs" with positive terms on the left.
        let mut lhs = self.expr.clone();
        let mut rhs = AffineExpr::zero(lhs.n_dim(), lhs.n_param());
        for i in 0..lhs.coeffs.len() {
            if lhs.coeffs[i] < 0 {
                rhs.coeffs[i] = -lhs.coeffs[i];
                lhs.coeffs[i] = 0;
            }
        }
        for i in 0..lhs.param_coeffs.len() {
            if lhs.param_coeffs[i] < 0 {
                rhs.param_coeffs[i] = -lhs.param_coeffs[i];
                lhs.param_coeffs[i] = 0;
            }
        }
        if lhs.constant < 0 {
            rhs.constant = -lhs.constant;
            lhs.constant = 0;
        }
        let op = match self.kind {
            ConstraintKind::Inequality => ">=",
            ConstraintKind::Equality => "=",
        };
        format!(
            "{} {} {}",
            lhs.to_string_with_names(dim_names, param_names),
            op,
            rhs.to_string_with_names(dim_names, param_names)
        )
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let lo = Constraint::lower_bound(0, 0, 2, 0);
        assert!(lo.is_satisfied(&[0, 0], &[]));
        assert!(!lo.is_satisfied(&[-1, 0], &[]));
        let hi = Constraint::upper_bound(0, 10, 2, 0);
        assert!(hi.is_satisfied(&[10, 0], &[]));
        assert!(!hi.is_satisfied(&[11, 0], &[]));
    }

    #[test]
    fn test_complement() {
        let c = Constraint::lower_bound(0, 3, 1, 0);
        let neg = c.complement();
        assert_eq!(neg.len(), 1);
        assert!(neg[0].is_satisfied(&[2], &[]));
        assert!(!neg[0].is_satisfied(&[3], &[]));

        let mut e = AffineExpr::var(0, 1, 0);
        e.constant = -5;
        let eq = Constraint::eq_zero(e).complement();
        assert_eq!(eq.len(), 2);
        assert!(eq.iter().any(|c| c.is_satisfied(&[6], &[])));
        assert!(eq.iter().all(|c| !c.is_satisfied(&[5], &[])));
    }

    #[test]
    fn test_normalize() {
        // 2x - 3 >= 0  ==>  x - 2 >= 0
        let c = Constraint::ge_zero(AffineExpr { constant: -3, coeffs: vec![2], param_coeffs: vec![] });
        match c.normalize() {
            Normalized::Constraint(n) => {
                assert_eq!(n.expr.coeffs, vec![1]);
                assert_eq!(n.expr.constant, -2);
            }
            other => panic!("unexpected {:?}", other),
        }
        // 2x + 1 = 0 has no integer solution
        let e = Constraint::eq_zero(AffineExpr { constant: 1, coeffs: vec![2], param_coeffs: vec![] });
        assert_eq!(e.normalize(), Normalized::Contradiction);
        let t = Constraint::ge_zero(AffineExpr::constant(0, 1, 0));
        assert_eq!(t.normalize(), Normalized::Tautology);
    }
}
