//! Affine expressions for polyhedral representation.
//!
//! An affine expression is a linear combination of variables plus a constant:
//! `aff(x) = c0 + c1*x1 + c2*x2 + ... + cn*xn + p1*N1 + ...`
//!
//! The variable columns are laid out by the owning polyhedron as
//! `[input dims | output dims | local (existential) dims]`; parameters
//! live in a separate coefficient vector so that parameter lists can be
//! aligned without touching the variable columns.

use serde::{Serialize, Deserialize};
use std::fmt;
use std::ops::{Add, Sub, Neg};

/// An affine expression: constant + sum(coeff[i] * var[i]) + sum(param_coeff[j] * param[j])
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffineExpr {
    /// Constant term
    pub constant: i64,
    /// Coefficients for each variable column
    pub coeffs: Vec<i64>,
    /// Coefficients for parameters (index = parameter index)
    pub param_coeffs: Vec<i64>,
}

impl AffineExpr {
    /// Create a zero expression.
    pub fn zero(n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: 0,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create a constant expression.
    pub fn constant(value: i64, n_dim: usize, n_param: usize) -> Self {
        Self {
            constant: value,
            coeffs: vec![0; n_dim],
            param_coeffs: vec![0; n_param],
        }
    }

    /// Create an expression for a single variable column.
    pub fn var(dim: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if dim < n_dim {
            expr.coeffs[dim] = 1;
        }
        expr
    }

    /// Create an expression for a parameter.
    pub fn param(param_idx: usize, n_dim: usize, n_param: usize) -> Self {
        let mut expr = Self::zero(n_dim, n_param);
        if param_idx < n_param {
            expr.param_coeffs[param_idx] = 1;
        }
        expr
    }

    /// Build from a coefficient row `[c_0, ..., c_{n-1}, constant]`.
    pub fn from_row(row: &[i64], n_param: usize) -> Self {
        let n = row.len().saturating_sub(1);
        Self {
            constant: row.last().copied().unwrap_or(0),
            coeffs: row[..n].to_vec(),
            param_coeffs: vec![0; n_param],
        }
    }

    /// Check if this is a constant expression.
    pub fn is_constant(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0) &&
        self.param_coeffs.iter().all(|&c| c == 0)
    }

    /// Check if this expression is zero.
    pub fn is_zero(&self) -> bool {
        self.constant == 0 && self.is_constant()
    }

    /// Get the constant value if this is a constant expression.
    pub fn as_constant(&self) -> Option<i64> {
        if self.is_constant() {
            Some(self.constant)
        } else {
            None
        }
    }

    /// Get the number of variable columns.
    pub fn n_dim(&self) -> usize {
        self.coeffs.len()
    }

    /// Get the number of parameters.
    pub fn n_param(&self) -> usize {
        self.param_coeffs.len()
    }

    /// Get coefficient for a variable column.
    pub fn coeff(&self, dim: usize) -> i64 {
        self.coeffs.get(dim).copied().unwrap_or(0)
    }

    /// Get coefficient for a parameter.
    pub fn param_coeff(&self, idx: usize) -> i64 {
        self.param_coeffs.get(idx).copied().unwrap_or(0)
    }

    /// Set coefficient for a variable column.
    pub fn set_coeff(&mut self, dim: usize, value: i64) {
        if dim < self.coeffs.len() {
            self.coeffs[dim] = value;
        }
    }

    /// Set coefficient for a parameter.
    pub fn set_param_coeff(&mut self, idx: usize, value: i64) {
        if idx < self.param_coeffs.len() {
            self.param_coeffs[idx] = value;
        }
    }

    /// Evaluate the expression given concrete values.
    pub fn evaluate(&self, dim_values: &[i64], param_values: &[i64]) -> i64 {
        let mut result = self.constant;
        for (i, &c) in self.coeffs.iter().enumerate() {
            if let Some(&v) = dim_values.get(i) {
                result += c * v;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if let Some(&v) = param_values.get(i) {
                result += c * v;
            }
        }
        result
    }

    /// Linear part applied to a direction vector (constant and parameters ignored).
    pub fn linear_dot(&self, direction: &[i64]) -> i64 {
        self.coeffs.iter().zip(direction).map(|(a, b)| a * b).sum()
    }

    /// Scale the expression by a constant.
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            constant: self.constant * factor,
            coeffs: self.coeffs.iter().map(|&c| c * factor).collect(),
            param_coeffs: self.param_coeffs.iter().map(|&c| c * factor).collect(),
        }
    }

    /// GCD of the variable and parameter coefficients (constant excluded).
    pub fn coeff_gcd(&self) -> i64 {
        use num_integer::Integer;
        let mut g = 0i64;
        for &c in self.coeffs.iter().chain(&self.param_coeffs) {
            g = g.gcd(&c.abs());
        }
        g
    }

    /// Get GCD of all coefficients including the constant.
    pub fn gcd(&self) -> i64 {
        use num_integer::Integer;
        let g = self.coeff_gcd().gcd(&self.constant.abs());
        if g == 0 { 1 } else { g }
    }

    /// Move variable columns: column `i` becomes column `mapping[i]` of an
    /// expression with `new_len` columns. Parameters are moved the same
    /// way with `param_mapping`.
    pub fn remap(
        &self,
        mapping: &[usize],
        new_len: usize,
        param_mapping: &[usize],
        new_n_param: usize,
    ) -> Self {
        let mut out = Self::constant(self.constant, new_len, new_n_param);
        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                out.coeffs[mapping[i]] += c;
            }
        }
        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                out.param_coeffs[param_mapping[i]] += c;
            }
        }
        out
    }

    /// Substitute `var = replacement / den` where `den` divides every
    /// coefficient of the result after scaling. The expression is scaled by
    /// `den` first, so the result represents `den * self`.
    pub fn substitute(&self, var: usize, replacement: &AffineExpr, den: i64) -> Self {
        let a = self.coeff(var);
        let mut out = self.scale(den);
        out.coeffs[var] = 0;
        if a != 0 {
            out = out + replacement.scale(a);
            out.coeffs[var] = 0;
        }
        out
    }

    /// Remove a variable column (its coefficient must be irrelevant).
    pub fn remove_dim(&mut self, dim: usize) {
        if dim < self.coeffs.len() {
            self.coeffs.remove(dim);
        }
    }

    /// Insert `n` zero columns at `pos`.
    pub fn insert_dims(&mut self, pos: usize, n: usize) {
        let pos = pos.min(self.coeffs.len());
        for _ in 0..n {
            self.coeffs.insert(pos, 0);
        }
    }

    /// Convert to string with given dimension and parameter names.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let mut parts = Vec::new();

        let mut push_term = |c: i64, name: &str| {
            if c == 1 {
                parts.push(name.to_string());
            } else if c == -1 {
                parts.push(format!("-{}", name));
            } else {
                parts.push(format!("{}*{}", c, name));
            }
        };

        for (i, &c) in self.coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("d{}", i);
                let name = dim_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
                push_term(c, name);
            }
        }

        for (i, &c) in self.param_coeffs.iter().enumerate() {
            if c != 0 {
                let default_name = format!("p{}", i);
                let name = param_names.get(i).map(|s| s.as_str()).unwrap_or(&default_name);
                push_term(c, name);
            }
        }

        if self.constant != 0 || parts.is_empty() {
            parts.push(format!("{}", self.constant));
        }

        parts.join(" + ").replace("+ -", "- ")
    }
}

impl Add for AffineExpr {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        assert_eq!(self.coeffs.len(), other.coeffs.len());
        assert_eq!(self.param_coeffs.len(), other.param_coeffs.len());
        Self {
            constant: self.constant + other.constant,
            coeffs: self.coeffs.iter().zip(&other.coeffs)
                .map(|(&a, &b)| a + b).collect(),
            param_coeffs: self.param_coeffs.iter().zip(&other.param_coeffs)
                .map(|(&a, &b)| a + b).collect(),
        }
    }
}

impl Sub for AffineExpr {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Neg for AffineExpr {
    type Output = Self;

    fn neg(self) -> Self {
        self.scale(-1)
    }
}

impl fmt::Display for AffineExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_with_names(&[], &[]))
    }
}
