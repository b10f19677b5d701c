//! Convex integer polyhedra with existential variables.
//!
//! A `Polyhedron` is the conjunction of affine constraints over the
//! dimensions of its space plus a number of local (existentially
//! quantified) columns. It is the building block of sets and relations:
//! unions of polyhedra live in `set.rs` and `map.rs`.

use crate::polyhedral::constraint::{Constraint, Normalized};
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::solver::{self, IlpResult, LpResult, Row, DEFAULT_NODE_LIMIT};
use crate::polyhedral::space::{Space, Tuple, TupleId};
use crate::utils::errors::{SolverError, SolverErrorKind};
use crate::utils::intern::Symbol;
use crate::utils::matrix::{primitive_integer_vector, Rational, RationalMatrix};
use num_traits::{Signed, Zero};
use std::fmt;

/// Integer optimum of an affine expression over a polyhedron.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimum {
    Value(i64),
    Unbounded,
    Empty,
}

impl Optimum {
    pub fn value(self) -> Option<i64> {
        match self {
            Optimum::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Asymptotic shape of a polyhedron restricted to some columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RayShape {
    /// No unbounded direction in the selected columns
    Bounded,
    /// Exactly one unbounded direction
    Ray {
        /// Direction in the selected columns
        direction: Vec<i64>,
        /// Primitive direction over all columns, when the recession cone
        /// is one-dimensional in the full space
        full: Option<Vec<i64>>,
    },
    /// More than one independent direction, or a line
    Multiple,
}

/// A convex polyhedron over integer points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Polyhedron {
    space: Space,
    n_local: usize,
    constraints: Vec<Constraint>,
}

impl Polyhedron {
    /// The polyhedron containing every point of the space.
    pub fn universe(space: Space) -> Self {
        Self { space, n_local: 0, constraints: Vec::new() }
    }

    /// The polyhedron containing no point.
    pub fn empty(space: Space) -> Self {
        let mut p = Self::universe(space);
        let e = AffineExpr::constant(-1, p.n_cols(), p.n_param());
        p.constraints.push(Constraint::ge_zero(e));
        p
    }

    /// Build from constraints over the space dimensions (no locals).
    pub fn from_constraints(space: Space, constraints: Vec<Constraint>) -> Self {
        let mut p = Self::universe(space);
        for c in constraints {
            p.add_constraint(c);
        }
        p
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn n_local(&self) -> usize {
        self.n_local
    }

    pub fn n_in(&self) -> usize {
        self.space.n_in()
    }

    pub fn n_out(&self) -> usize {
        self.space.n_out()
    }

    /// Number of space dimensions (input plus output).
    pub fn n_dim(&self) -> usize {
        self.space.n_dim()
    }

    /// Number of variable columns (dimensions plus locals).
    pub fn n_cols(&self) -> usize {
        self.space.n_dim() + self.n_local
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    /// A zero expression shaped for this polyhedron.
    pub fn zero_expr(&self) -> AffineExpr {
        AffineExpr::zero(self.n_cols(), self.n_param())
    }

    /// Expression for column `col`.
    pub fn col_expr(&self, col: usize) -> AffineExpr {
        AffineExpr::var(col, self.n_cols(), self.n_param())
    }

    /// Expression for output dimension `dim`.
    pub fn out_expr(&self, dim: usize) -> AffineExpr {
        self.col_expr(self.n_in() + dim)
    }

    /// Expression for input dimension `dim`.
    pub fn in_expr(&self, dim: usize) -> AffineExpr {
        self.col_expr(dim)
    }

    /// Expression for parameter `idx`.
    pub fn param_expr(&self, idx: usize) -> AffineExpr {
        AffineExpr::param(idx, self.n_cols(), self.n_param())
    }

    pub fn add_constraint(&mut self, c: Constraint) {
        debug_assert_eq!(c.n_dim(), self.n_cols());
        debug_assert_eq!(c.n_param(), self.n_param());
        self.constraints.push(c);
    }

    pub fn with_constraint(mut self, c: Constraint) -> Self {
        self.add_constraint(c);
        self
    }

    /// Append a local column and return its index.
    pub fn add_local(&mut self) -> usize {
        let col = self.n_cols();
        for c in self.constraints.iter_mut() {
            c.expr.coeffs.push(0);
        }
        self.n_local += 1;
        col
    }

    /// Rename the tuples of the space (dimensions must agree).
    pub fn with_tuples(mut self, input: Option<Tuple>, output: Tuple) -> Self {
        debug_assert_eq!(input.map(|t| t.dim).unwrap_or(0), self.n_in());
        debug_assert_eq!(output.dim, self.n_out());
        self.space.input = input;
        self.space.output = output;
        self
    }

    /// Move constraints of `other` into a new column layout.
    fn embed(other: &Polyhedron, mapping: &[usize], n_cols: usize, params: &[Symbol]) -> Vec<Constraint> {
        let param_mapping: Vec<usize> = other
            .space
            .params
            .iter()
            .map(|p| params.iter().position(|q| q == p).unwrap_or(0))
            .collect();
        other
            .constraints
            .iter()
            .map(|c| {
                Constraint::new(
                    c.expr.remap(mapping, n_cols, &param_mapping, params.len()),
                    c.kind,
                )
            })
            .collect()
    }

    /// Express the polyhedron over a parameter list that contains its own.
    pub fn align_params(&self, params: &[Symbol]) -> Self {
        if self.space.params == params {
            return self.clone();
        }
        let mapping: Vec<usize> = (0..self.n_cols()).collect();
        let constraints = Self::embed(self, &mapping, self.n_cols(), params);
        let mut space = self.space.clone();
        space.params = params.to_vec();
        Self { space, n_local: self.n_local, constraints }
    }

    fn aligned_pair(&self, other: &Polyhedron) -> (Polyhedron, Polyhedron) {
        let params = self.space.merged_params(&other.space);
        (self.align_params(&params), other.align_params(&params))
    }

    /// Intersection with a polyhedron in the same space.
    pub fn intersect(&self, other: &Polyhedron) -> Self {
        debug_assert!(self.space.same_tuples(&other.space));
        let (a, b) = self.aligned_pair(other);
        let n_dim = a.n_dim();
        let n_cols = n_dim + a.n_local + b.n_local;
        let mut mapping: Vec<usize> = (0..n_dim).collect();
        mapping.extend((0..b.n_local).map(|k| n_dim + a.n_local + k));
        let mut result = a.clone();
        for c in result.constraints.iter_mut() {
            c.expr.coeffs.resize(n_cols, 0);
        }
        result.n_local += b.n_local;
        result.constraints.extend(Self::embed(&b, &mapping, n_cols, &a.space.params));
        result.simplified()
    }

    /// Swap input and output of a relation.
    pub fn reverse(&self) -> Self {
        let (n_in, n_out) = (self.n_in(), self.n_out());
        let mut mapping: Vec<usize> = (0..n_in).map(|i| n_out + i).collect();
        mapping.extend(0..n_out);
        mapping.extend((0..self.n_local).map(|k| n_in + n_out + k));
        let constraints = Self::embed(self, &mapping, self.n_cols(), &self.space.params);
        Self { space: self.space.reverse(), n_local: self.n_local, constraints }
    }

    /// Relational composition: `self: A -> B`, `other: B -> C` gives `A -> C`.
    pub fn apply_range(&self, other: &Polyhedron) -> Self {
        let (a, b) = self.aligned_pair(other);
        let (n_a, n_b, n_c) = (a.n_in(), a.n_out(), b.n_out());
        debug_assert_eq!(n_b, b.n_in());
        let (l1, l2) = (a.n_local, b.n_local);
        let n_cols = n_a + n_c + l1 + n_b + l2;
        let b_base = n_a + n_c + l1;

        let mut map_a: Vec<usize> = (0..n_a).collect();
        map_a.extend((0..n_b).map(|j| b_base + j));
        map_a.extend((0..l1).map(|k| n_a + n_c + k));

        let mut map_b: Vec<usize> = (0..n_b).map(|j| b_base + j).collect();
        map_b.extend((0..n_c).map(|j| n_a + j));
        map_b.extend((0..l2).map(|k| b_base + n_b + k));

        let params = a.space.params.clone();
        let mut constraints = Self::embed(&a, &map_a, n_cols, &params);
        constraints.extend(Self::embed(&b, &map_b, n_cols, &params));
        let space = Space { params, input: a.space.input, output: b.space.output };
        Self { space, n_local: l1 + n_b + l2, constraints }.simplified()
    }

    /// Restrict the input of a relation (or a set itself) to `set`.
    pub fn intersect_domain(&self, set: &Polyhedron) -> Self {
        if self.space.is_set() {
            return self.intersect(set);
        }
        let (m, s) = self.aligned_pair(set);
        debug_assert_eq!(s.n_dim(), m.n_in());
        let base = m.n_cols();
        let n_cols = base + s.n_local;
        let mut mapping: Vec<usize> = (0..s.n_dim()).collect();
        mapping.extend((0..s.n_local).map(|k| base + k));
        let mut result = m.clone();
        for c in result.constraints.iter_mut() {
            c.expr.coeffs.resize(n_cols, 0);
        }
        result.n_local += s.n_local;
        result.constraints.extend(Self::embed(&s, &mapping, n_cols, &m.space.params));
        result.simplified()
    }

    /// Restrict the output of a relation to `set`.
    pub fn intersect_range(&self, set: &Polyhedron) -> Self {
        if self.space.is_set() {
            return self.intersect(set);
        }
        let (m, s) = self.aligned_pair(set);
        debug_assert_eq!(s.n_dim(), m.n_out());
        let base = m.n_cols();
        let n_cols = base + s.n_local;
        let mut mapping: Vec<usize> = (0..s.n_dim()).map(|j| m.n_in() + j).collect();
        mapping.extend((0..s.n_local).map(|k| base + k));
        let mut result = m.clone();
        for c in result.constraints.iter_mut() {
            c.expr.coeffs.resize(n_cols, 0);
        }
        result.n_local += s.n_local;
        result.constraints.extend(Self::embed(&s, &mapping, n_cols, &m.space.params));
        result.simplified()
    }

    /// The set of outputs (projecting inputs into locals).
    pub fn range(&self) -> Self {
        if self.space.is_set() {
            return self.clone();
        }
        let (n_in, n_out, l) = (self.n_in(), self.n_out(), self.n_local);
        let mut mapping: Vec<usize> = (0..n_in).map(|i| n_out + l + i).collect();
        mapping.extend(0..n_out);
        mapping.extend((0..l).map(|k| n_out + k));
        let constraints = Self::embed(self, &mapping, self.n_cols(), &self.space.params);
        Self { space: self.space.range(), n_local: l + n_in, constraints }.simplified()
    }

    /// The set of inputs (projecting outputs into locals).
    pub fn domain(&self) -> Self {
        if self.space.is_set() {
            return self.clone();
        }
        self.reverse().range()
    }

    /// Image of a set under this relation.
    pub fn image(&self, set: &Polyhedron) -> Self {
        self.intersect_domain(set).range()
    }

    /// Preimage of a set under this relation.
    pub fn preimage(&self, set: &Polyhedron) -> Self {
        self.intersect_range(set).domain()
    }

    /// `A -> B` and `A -> C` give `A -> [B, C]`.
    pub fn range_product(&self, other: &Polyhedron, output: Tuple) -> Self {
        let (a, b) = self.aligned_pair(other);
        let (n_a, n_b, n_c) = (a.n_in(), a.n_out(), b.n_out());
        debug_assert_eq!(output.dim, n_b + n_c);
        let (l1, l2) = (a.n_local, b.n_local);
        let n_cols = n_a + n_b + n_c + l1 + l2;
        let mut map_a: Vec<usize> = (0..n_a + n_b).collect();
        map_a.extend((0..l1).map(|k| n_a + n_b + n_c + k));
        let mut map_b: Vec<usize> = (0..n_a).collect();
        map_b.extend((0..n_c).map(|j| n_a + n_b + j));
        map_b.extend((0..l2).map(|k| n_a + n_b + n_c + l1 + k));
        let params = a.space.params.clone();
        let mut constraints = Self::embed(&a, &map_a, n_cols, &params);
        constraints.extend(Self::embed(&b, &map_b, n_cols, &params));
        let space = Space { params, input: a.space.input, output };
        Self { space, n_local: l1 + l2, constraints }.simplified()
    }

    /// Turn a relation `A -> B` into a set over `[A, B]`.
    pub fn wrap(&self) -> Self {
        let mut p = self.clone();
        p.space = Space {
            params: self.space.params.clone(),
            input: None,
            output: Tuple::new(TupleId::Anonymous, self.n_dim()),
        };
        p
    }

    /// Shift output dimension `dim` by `delta` (`y' = y + delta`).
    pub fn translate_out(&self, dim: usize, delta: i64) -> Self {
        let col = self.n_in() + dim;
        let mut p = self.clone();
        for c in p.constraints.iter_mut() {
            c.expr.constant -= c.expr.coeff(col) * delta;
        }
        p
    }

    /// The set `{ x + delta : x in self }` for a delta over all columns.
    pub fn shift(&self, delta: &[i64]) -> Self {
        let mut p = self.clone();
        for c in p.constraints.iter_mut() {
            c.expr.constant -= c.expr.linear_dot(delta);
        }
        p
    }

    /// Normalize constraints, substitute unit-coefficient locals, detect
    /// trivial emptiness.
    pub fn simplified(mut self) -> Self {
        self.simplify();
        self
    }

    pub fn simplify(&mut self) {
        loop {
            let mut normalized: Vec<Constraint> = Vec::with_capacity(self.constraints.len());
            for c in &self.constraints {
                match c.normalize() {
                    Normalized::Tautology => {}
                    Normalized::Contradiction => {
                        let e = AffineExpr::constant(-1, self.n_cols(), self.n_param());
                        self.constraints = vec![Constraint::ge_zero(e)];
                        return;
                    }
                    Normalized::Constraint(n) => {
                        if !normalized.contains(&n) {
                            normalized.push(n);
                        }
                    }
                }
            }
            // Opposite inequalities form an equality.
            let mut i = 0;
            while i < normalized.len() {
                if normalized[i].is_inequality() {
                    let neg = -normalized[i].expr.clone();
                    if let Some(j) = normalized
                        .iter()
                        .position(|c| c.is_inequality() && c.expr == neg)
                    {
                        let eq = Constraint::eq_zero(normalized[i].expr.clone());
                        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
                        normalized.remove(hi);
                        normalized.remove(lo);
                        if let Normalized::Constraint(n) = eq.normalize() {
                            normalized.push(n);
                        }
                        continue;
                    }
                }
                i += 1;
            }
            self.constraints = normalized;

            let first_local = self.n_dim();
            let pick = self.constraints.iter().enumerate().find_map(|(i, c)| {
                if !c.is_equality() {
                    return None;
                }
                (first_local..self.n_cols())
                    .find(|&col| c.expr.coeff(col).abs() == 1)
                    .map(|col| (i, col))
            });
            match pick {
                Some((i, col)) => {
                    let eq = self.constraints.remove(i);
                    // a*l + rest = 0  ==>  l = -a * rest
                    let a = eq.expr.coeff(col);
                    let mut rep = eq.expr.scale(-a);
                    rep.coeffs[col] = 0;
                    for c in self.constraints.iter_mut() {
                        if c.expr.coeff(col) != 0 {
                            c.expr = c.expr.substitute(col, &rep, 1);
                        }
                    }
                    self.remove_col(col);
                }
                None => {
                    // Drop locals that no constraint mentions.
                    let unused = (first_local..self.n_cols())
                        .rev()
                        .find(|&col| self.constraints.iter().all(|c| c.expr.coeff(col) == 0));
                    match unused {
                        Some(col) => self.remove_col(col),
                        None => return,
                    }
                }
            }
        }
    }

    fn remove_col(&mut self, col: usize) {
        debug_assert!(col >= self.n_dim());
        for c in self.constraints.iter_mut() {
            c.expr.remove_dim(col);
        }
        self.n_local -= 1;
    }

    /// True if simplification already proved the polyhedron empty.
    pub fn is_obviously_empty(&self) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c.normalize(), Normalized::Contradiction))
    }

    /// Solver rows over `[columns | params]`.
    pub fn to_rows(&self) -> Vec<Row> {
        self.constraints
            .iter()
            .map(|c| {
                let coeffs: Vec<i128> = c
                    .expr
                    .coeffs
                    .iter()
                    .chain(&c.expr.param_coeffs)
                    .map(|&v| v as i128)
                    .collect();
                Row { coeffs, constant: c.expr.constant as i128, equality: c.is_equality() }
            })
            .collect()
    }

    fn n_vars(&self) -> usize {
        self.n_cols() + self.n_param()
    }

    fn objective(&self, expr: &AffineExpr) -> Vec<i128> {
        expr.coeffs
            .iter()
            .chain(&expr.param_coeffs)
            .map(|&v| v as i128)
            .collect()
    }

    /// Integer emptiness test.
    pub fn is_empty(&self) -> Result<bool, SolverError> {
        if self.is_obviously_empty() {
            return Ok(true);
        }
        Ok(solver::integer_point(&self.to_rows(), self.n_vars(), DEFAULT_NODE_LIMIT)?.is_none())
    }

    /// Integer maximum of an affine expression.
    pub fn max(&self, expr: &AffineExpr) -> Result<Optimum, SolverError> {
        if self.is_obviously_empty() {
            return Ok(Optimum::Empty);
        }
        let obj = self.objective(expr);
        match solver::ilp_maximize(&self.to_rows(), self.n_vars(), &obj, DEFAULT_NODE_LIMIT)? {
            IlpResult::Optimal { value, .. } => {
                let v = value + expr.constant as i128;
                let v = i64::try_from(v).map_err(|_| {
                    SolverError::new(SolverErrorKind::Overflow, "Optimum exceeds 64-bit range")
                })?;
                Ok(Optimum::Value(v))
            }
            IlpResult::Unbounded => Ok(Optimum::Unbounded),
            IlpResult::Infeasible => Ok(Optimum::Empty),
        }
    }

    /// Integer minimum of an affine expression.
    pub fn min(&self, expr: &AffineExpr) -> Result<Optimum, SolverError> {
        Ok(match self.max(&-expr.clone())? {
            Optimum::Value(v) => Optimum::Value(-v),
            other => other,
        })
    }

    /// Rational minimum (a lower bound of the integer minimum).
    pub fn rational_min(&self, expr: &AffineExpr) -> Result<Option<Rational>, SolverError> {
        let obj: Vec<Rational> = self
            .objective(&-expr.clone())
            .into_iter()
            .map(Rational::from_integer)
            .collect();
        match solver::lp_maximize(&self.to_rows(), self.n_vars(), &obj)? {
            LpResult::Optimal { value, .. } => {
                Ok(Some(-value + Rational::from_integer(expr.constant as i128)))
            }
            LpResult::Unbounded | LpResult::Infeasible => Ok(None),
        }
    }

    /// Some integer point: values of the dimensions followed by the parameters.
    pub fn sample(&self) -> Result<Option<Vec<i64>>, SolverError> {
        if self.is_obviously_empty() {
            return Ok(None);
        }
        let point = solver::integer_point(&self.to_rows(), self.n_vars(), DEFAULT_NODE_LIMIT)?;
        Ok(point.map(|p| {
            let n_dim = self.n_dim();
            let n_cols = self.n_cols();
            p[..n_dim]
                .iter()
                .chain(&p[n_cols..])
                .map(|&v| v as i64)
                .collect()
        }))
    }

    /// Fix dimensions and parameters to values (dims first, then params).
    pub fn fix(&self, values: &[i64]) -> Self {
        let mut p = self.clone();
        let n_dim = self.n_dim();
        for (k, &v) in values.iter().enumerate() {
            let mut e = if k < n_dim {
                p.col_expr(k)
            } else {
                p.param_expr(k - n_dim)
            };
            e.constant = -v;
            p.add_constraint(Constraint::eq_zero(e));
        }
        p.simplified()
    }

    /// Membership of a point (dims followed by params).
    pub fn contains(&self, values: &[i64]) -> Result<bool, SolverError> {
        if self.n_local == 0 {
            let n_dim = self.n_dim();
            let (dims, params) = values.split_at(n_dim.min(values.len()));
            return Ok(self.constraints.iter().all(|c| c.is_satisfied(dims, params)));
        }
        Ok(!self.fix(values).is_empty()?)
    }

    /// Enumerate all integer points (dims followed by params). Fails on
    /// unbounded sets.
    pub fn points(&self) -> Result<Vec<Vec<i64>>, SolverError> {
        let mut out = Vec::new();
        let total = self.n_dim() + self.n_param();
        self.enumerate_from(&mut Vec::new(), total, &mut out)?;
        Ok(out)
    }

    fn enumerate_from(
        &self,
        prefix: &mut Vec<i64>,
        total: usize,
        out: &mut Vec<Vec<i64>>,
    ) -> Result<(), SolverError> {
        let fixed = self.fix(prefix);
        if prefix.len() == total {
            if !fixed.is_empty()? {
                out.push(prefix.clone());
            }
            return Ok(());
        }
        let k = prefix.len();
        let e = if k < self.n_dim() { self.col_expr(k) } else { self.param_expr(k - self.n_dim()) };
        let (lo, hi) = match (fixed.min(&e)?, fixed.max(&e)?) {
            (Optimum::Value(lo), Optimum::Value(hi)) => (lo, hi),
            (Optimum::Empty, _) | (_, Optimum::Empty) => return Ok(()),
            _ => {
                return Err(SolverError::new(
                    SolverErrorKind::Unbounded,
                    "Cannot enumerate points of an unbounded set",
                ))
            }
        };
        for v in lo..=hi {
            prefix.push(v);
            self.enumerate_from(prefix, total, out)?;
            prefix.pop();
        }
        Ok(())
    }

    /// Pieces of `self \ other`, pairwise disjoint. `other` must not have
    /// local columns.
    pub fn subtract(&self, other: &Polyhedron) -> Result<Vec<Polyhedron>, SolverError> {
        if other.n_local > 0 {
            return Err(SolverError::new(
                SolverErrorKind::SpaceMismatch,
                "Set difference with existentially quantified subtrahend",
            ));
        }
        let (a, b) = self.aligned_pair(other);
        let mut pieces = Vec::new();
        let mut prefix = a.clone();
        for c in b.constraints() {
            let mut c_here = c.clone();
            c_here.expr.coeffs.resize(a.n_cols(), 0);
            for neg in c_here.complement() {
                let piece = prefix.clone().with_constraint(neg).simplified();
                if !piece.is_empty()? {
                    pieces.push(piece);
                }
            }
            prefix = prefix.with_constraint(c_here).simplified();
        }
        Ok(pieces)
    }

    /// Fourier-Motzkin elimination of a local column (rational projection).
    pub fn eliminate_local(&self, col: usize) -> Self {
        debug_assert!(col >= self.n_dim() && col < self.n_cols());
        let mut p = self.clone();
        if let Some(i) = p
            .constraints
            .iter()
            .position(|c| c.is_equality() && c.expr.coeff(col) != 0)
        {
            let eq = p.constraints.remove(i);
            let a = eq.expr.coeff(col);
            for c in p.constraints.iter_mut() {
                let b = c.expr.coeff(col);
                if b != 0 {
                    c.expr = c.expr.scale(a.abs()) - eq.expr.scale(a.signum() * b);
                }
            }
        } else {
            let (mixed, rest): (Vec<Constraint>, Vec<Constraint>) = p
                .constraints
                .drain(..)
                .partition(|c| c.expr.coeff(col) != 0);
            let mut out = rest;
            let lowers: Vec<&Constraint> = mixed.iter().filter(|c| c.expr.coeff(col) > 0).collect();
            let uppers: Vec<&Constraint> = mixed.iter().filter(|c| c.expr.coeff(col) < 0).collect();
            for lo in &lowers {
                for up in &uppers {
                    let l = lo.expr.coeff(col);
                    let u = -up.expr.coeff(col);
                    out.push(Constraint::ge_zero(lo.expr.scale(u) + up.expr.scale(l)));
                }
            }
            p.constraints = out;
        }
        p.remove_col(col);
        p.constraints.dedup();
        p
    }

    /// Move dimensions into locals: the output dims starting at `first`
    /// become existential. Only the output tuple shrinks.
    pub fn project_out_outputs(&self, first: usize) -> Self {
        let n_in = self.n_in();
        let n_out = self.n_out();
        let keep = first;
        let drop = n_out - first;
        let mut mapping: Vec<usize> = (0..n_in + keep).collect();
        mapping.extend((0..drop).map(|k| n_in + keep + self.n_local + k));
        mapping.extend((0..self.n_local).map(|k| n_in + keep + k));
        let constraints = Self::embed(self, &mapping, self.n_cols(), &self.space.params);
        let mut space = self.space.clone();
        space.output = Tuple::new(space.output.id, keep);
        Self { space, n_local: self.n_local + drop, constraints }.simplified()
    }

    /// Recession analysis restricted to the columns in `cols`.
    pub fn recession(&self, cols: &[usize]) -> Result<RayShape, SolverError> {
        if self.is_obviously_empty() {
            return Ok(RayShape::Bounded);
        }
        let n = self.n_vars();
        let cone: Vec<Row> = self
            .to_rows()
            .into_iter()
            .map(|mut r| {
                r.constant = 0;
                r
            })
            .collect();

        // Implicit equalities of the cone: inequalities whose maximum over
        // the cone intersected with the unit box is zero.
        let mut boxed = cone.clone();
        for j in 0..n {
            let mut lo = vec![0i128; n];
            lo[j] = 1;
            boxed.push(Row::ge(lo, 1));
            let mut hi = vec![0i128; n];
            hi[j] = -1;
            boxed.push(Row::ge(hi, 1));
        }
        let mut equalities: Vec<Vec<i64>> = Vec::new();
        for r in &cone {
            let row: Vec<i64> = r.coeffs.iter().map(|&v| v as i64).collect();
            if r.equality {
                equalities.push(row);
                continue;
            }
            let obj: Vec<Rational> = r.coeffs.iter().map(|&v| Rational::from_integer(v)).collect();
            match solver::lp_maximize(&boxed, n, &obj)? {
                LpResult::Optimal { value, .. } if value.is_zero() => equalities.push(row),
                _ => {}
            }
        }

        let basis = RationalMatrix::from_rows(&equalities, n).null_space();
        if basis.is_empty() {
            return Ok(RayShape::Bounded);
        }
        let projected: Vec<Vec<Rational>> = basis
            .iter()
            .map(|b| cols.iter().map(|&c| b[c]).collect())
            .collect();
        let mut rank_rows = RationalMatrix::zeros(projected.len(), cols.len());
        for (i, v) in projected.iter().enumerate() {
            for (j, x) in v.iter().enumerate() {
                rank_rows.set(i, j, *x);
            }
        }
        match rank_rows.rank() {
            0 => return Ok(RayShape::Bounded),
            1 => {}
            _ => return Ok(RayShape::Multiple),
        }
        let Some(d) = projected.iter().find(|v| v.iter().any(|x| !x.is_zero())) else {
            return Ok(RayShape::Bounded);
        };
        let d = primitive_integer_vector(d);

        // Which orientations of d are in the projected cone?
        let reaches = |sign: i64| -> Result<bool, SolverError> {
            let mut rows = cone.clone();
            for (k, &c) in cols.iter().enumerate() {
                let mut coeffs = vec![0i128; n];
                coeffs[c] = 1;
                rows.push(Row::eq(coeffs, -(sign * d[k]) as i128));
            }
            Ok(!matches!(
                solver::lp_maximize(&rows, n, &vec![Rational::zero(); n])?,
                LpResult::Infeasible
            ))
        };
        let forward = reaches(1)?;
        let backward = reaches(-1)?;
        let sign = match (forward, backward) {
            (true, true) => return Ok(RayShape::Multiple),
            (true, false) => 1,
            (false, true) => -1,
            (false, false) => return Ok(RayShape::Bounded),
        };
        let direction: Vec<i64> = d.iter().map(|v| v * sign).collect();

        let full = if basis.len() == 1 {
            let mut f = primitive_integer_vector(&basis[0]);
            let along: Rational = cols
                .iter()
                .zip(&direction)
                .map(|(&c, &v)| Rational::from_integer((f[c] * v) as i128))
                .fold(Rational::zero(), |a, b| a + b);
            if along.is_negative() {
                f.iter_mut().for_each(|v| *v = -*v);
            }
            Some(f)
        } else {
            None
        };
        let direction = match &full {
            Some(f) => cols.iter().map(|&c| f[c]).collect(),
            None => direction,
        };
        Ok(RayShape::Ray { direction, full })
    }

    /// Print with explicit names for the dimensions and parameters.
    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        if self.is_obviously_empty() {
            return "false".to_string();
        }
        let mut names: Vec<String> = dim_names.to_vec();
        for k in 0..self.n_local {
            names.push(format!("e{}", k));
        }
        let parts: Vec<String> = self
            .constraints
            .iter()
            .map(|c| c.to_string_with_names(&names, param_names))
            .collect();
        let body = if parts.is_empty() { "true".to_string() } else { parts.join(" and ") };
        if self.n_local > 0 {
            let locals: Vec<String> = (0..self.n_local).map(|k| format!("e{}", k)).collect();
            format!("exists ({}: {})", locals.join(", "), body)
        } else {
            body
        }
    }
}

impl fmt::Display for Polyhedron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = (0..self.n_dim()).map(|i| format!("d{}", i)).collect();
        let params: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dims, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArrayId, StmtId};

    fn stmt_space(dim: usize) -> Space {
        Space::set(Tuple::statement(StmtId(0), dim))
    }

    /// { S[i] : lo <= i <= hi }
    fn interval(lo: i64, hi: Option<i64>) -> Polyhedron {
        let mut p = Polyhedron::universe(stmt_space(1));
        p.add_constraint(Constraint::lower_bound(0, lo, 1, 0));
        if let Some(hi) = hi {
            p.add_constraint(Constraint::upper_bound(0, hi, 1, 0));
        }
        p
    }

    /// { S[i] -> A[i + shift] }
    fn access(shift: i64) -> Polyhedron {
        let space = Space::map(Tuple::statement(StmtId(0), 1), Tuple::array(ArrayId(0), 1));
        let mut p = Polyhedron::universe(space);
        let mut e = p.out_expr(0) - p.in_expr(0);
        e.constant = -shift;
        p.add_constraint(Constraint::eq_zero(e));
        p
    }

    #[test]
    fn test_optimum() {
        let p = interval(2, Some(7));
        let x = p.col_expr(0);
        assert_eq!(p.max(&x).unwrap(), Optimum::Value(7));
        assert_eq!(p.min(&x).unwrap(), Optimum::Value(2));
        assert_eq!(interval(0, None).max(&x).unwrap(), Optimum::Unbounded);
        assert!(interval(3, Some(2)).is_empty().unwrap());
    }

    #[test]
    fn test_image_and_simplify() {
        let img = access(-1).image(&interval(0, Some(9)));
        // The statement dimension is substituted away.
        assert_eq!(img.n_local(), 0);
        let a = img.col_expr(0);
        assert_eq!(img.min(&a).unwrap(), Optimum::Value(-1));
        assert_eq!(img.max(&a).unwrap(), Optimum::Value(8));
    }

    #[test]
    fn test_apply_range_reverse() {
        // S[i] -> A[i] composed with A[a] -> S[a + 1] (reverse of shift -1)
        let dep = access(0).apply_range(&access(-1).reverse());
        let d = dep.intersect_domain(&interval(0, Some(5)));
        let diff = d.out_expr(0) - d.in_expr(0);
        assert_eq!(d.max(&diff).unwrap(), Optimum::Value(1));
        assert_eq!(d.min(&diff).unwrap(), Optimum::Value(1));
    }

    #[test]
    fn test_strided_image_keeps_local() {
        // { S[i] -> A[2i] } image of 0 <= i <= 3 is {0, 2, 4, 6}
        let space = Space::map(Tuple::statement(StmtId(0), 1), Tuple::array(ArrayId(0), 1));
        let mut m = Polyhedron::universe(space);
        let e = m.out_expr(0) - m.in_expr(0).scale(2);
        m.add_constraint(Constraint::eq_zero(e));
        let img = m.image(&interval(0, Some(3)));
        assert_eq!(img.n_local(), 1);
        assert!(img.contains(&[4]).unwrap());
        assert!(!img.contains(&[5]).unwrap());
        assert_eq!(img.points().unwrap().len(), 4);
    }

    #[test]
    fn test_subtract() {
        let a = interval(0, Some(9));
        let b = interval(0, Some(9)).shift(&[1]);
        let diff = a.subtract(&b).unwrap();
        let points: Vec<Vec<i64>> = diff.iter().flat_map(|p| p.points().unwrap()).collect();
        assert_eq!(points, vec![vec![0]]);
    }

    #[test]
    fn test_recession_ray() {
        let p = interval(0, None);
        match p.recession(&[0]).unwrap() {
            RayShape::Ray { direction, full } => {
                assert_eq!(direction, vec![1]);
                assert_eq!(full, Some(vec![1]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(interval(0, Some(4)).recession(&[0]).unwrap(), RayShape::Bounded);
    }

    #[test]
    fn test_recession_multiple() {
        // { S[i, j] : i >= 0 and j >= 0 }
        let mut p = Polyhedron::universe(stmt_space(2));
        p.add_constraint(Constraint::lower_bound(0, 0, 2, 0));
        p.add_constraint(Constraint::lower_bound(1, 0, 2, 0));
        assert_eq!(p.recession(&[0, 1]).unwrap(), RayShape::Multiple);
        // A line is also rejected.
        let line = Polyhedron::universe(stmt_space(1));
        assert_eq!(line.recession(&[0]).unwrap(), RayShape::Multiple);
    }

    #[test]
    fn test_recession_of_graph() {
        // { [i, t, a] : i >= 0, t = 2i + 1, a = 2i } : full ray (1, 2, 2)
        let space = Space::set(Tuple::new(TupleId::Anonymous, 3));
        let mut p = Polyhedron::universe(space);
        p.add_constraint(Constraint::lower_bound(0, 0, 3, 0));
        let mut t = p.col_expr(1) - p.col_expr(0).scale(2);
        t.constant = -1;
        p.add_constraint(Constraint::eq_zero(t));
        p.add_constraint(Constraint::eq_zero(p.col_expr(2) - p.col_expr(0).scale(2)));
        match p.recession(&[1, 2]).unwrap() {
            RayShape::Ray { direction, full } => {
                assert_eq!(direction, vec![2, 2]);
                assert_eq!(full, Some(vec![1, 2, 2]));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_eliminate_local() {
        // exists e: x = 2e and 0 <= e <= 3  ==> rational 0 <= x <= 6
        let mut p = Polyhedron::universe(stmt_space(1));
        let e = p.add_local();
        p.add_constraint(Constraint::eq_zero(p.col_expr(0) - p.col_expr(e).scale(2)));
        p.add_constraint(Constraint::lower_bound(e, 0, 2, 0));
        p.add_constraint(Constraint::upper_bound(e, 3, 2, 0));
        let q = p.eliminate_local(e);
        assert_eq!(q.n_local(), 0);
        let x = q.col_expr(0);
        assert_eq!(q.max(&x).unwrap(), Optimum::Value(6));
        assert!(q.contains(&[3]).unwrap());
    }
}
