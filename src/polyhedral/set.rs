//! Integer sets: finite unions of polyhedra in one space.

use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::polyhedron::{Optimum, Polyhedron, RayShape};
use crate::polyhedral::space::{Space, Tuple};
use crate::polyhedral::expr::AffineExpr;
use crate::utils::errors::SolverError;
use crate::utils::intern::Symbol;
use std::fmt;

/// A union of polyhedra sharing one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerSet {
    space: Space,
    pieces: Vec<Polyhedron>,
}

impl IntegerSet {
    pub fn empty(space: Space) -> Self {
        Self { space, pieces: Vec::new() }
    }

    pub fn universe(space: Space) -> Self {
        let piece = Polyhedron::universe(space.clone());
        Self { space, pieces: vec![piece] }
    }

    pub fn from_polyhedron(piece: Polyhedron) -> Self {
        let mut set = Self::empty(piece.space().clone());
        set.add_piece(piece);
        set
    }

    pub fn from_pieces(space: Space, pieces: impl IntoIterator<Item = Polyhedron>) -> Self {
        let mut set = Self::empty(space);
        for p in pieces {
            set.add_piece(p);
        }
        set
    }

    /// Box `{ [x] : lo_d <= x_d <= hi_d }`; `None` leaves a side open.
    pub fn boxed(space: Space, bounds: &[(i64, Option<i64>)]) -> Self {
        let mut p = Polyhedron::universe(space.clone());
        let n = p.n_cols();
        for (d, &(lo, hi)) in bounds.iter().enumerate() {
            p.add_constraint(Constraint::lower_bound(d, lo, n, p.n_param()));
            if let Some(hi) = hi {
                p.add_constraint(Constraint::upper_bound(d, hi, n, p.n_param()));
            }
        }
        Self::from_polyhedron(p)
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn dim(&self) -> usize {
        self.space.n_dim()
    }

    pub fn n_param(&self) -> usize {
        self.space.n_param()
    }

    pub fn params(&self) -> &[Symbol] {
        &self.space.params
    }

    pub fn pieces(&self) -> &[Polyhedron] {
        &self.pieces
    }

    /// Add a polyhedron in the same tuple space; trivially empty ones are dropped.
    pub fn add_piece(&mut self, piece: Polyhedron) {
        debug_assert!(self.space.same_tuples(piece.space()));
        let piece = piece.simplified();
        if piece.is_obviously_empty() {
            return;
        }
        let params = self.space.merged_params(piece.space());
        if params != self.space.params {
            self.align_params_in_place(&params);
        }
        let piece = piece.align_params(&self.space.params);
        if !self.pieces.contains(&piece) {
            self.pieces.push(piece);
        }
    }

    fn align_params_in_place(&mut self, params: &[Symbol]) {
        self.space.params = params.to_vec();
        for p in self.pieces.iter_mut() {
            *p = p.align_params(params);
        }
    }

    pub fn align_params(&self, params: &[Symbol]) -> Self {
        let mut s = self.clone();
        let merged = s.space.merged_params(&Space::params_only(params.to_vec()));
        s.align_params_in_place(&merged);
        s
    }

    /// Apply a function to every piece, keeping the space.
    pub fn map_pieces(&self, f: impl Fn(&Polyhedron) -> Polyhedron) -> Self {
        let pieces: Vec<Polyhedron> = self.pieces.iter().map(f).collect();
        let space = pieces.first().map(|p| p.space().clone()).unwrap_or_else(|| self.space.clone());
        Self::from_pieces(space, pieces)
    }

    /// Rename the tuple of the set (dimension must agree).
    pub fn with_tuple(&self, tuple: Tuple) -> Self {
        debug_assert_eq!(tuple.dim, self.dim());
        let mut space = self.space.clone();
        space.output = tuple;
        let pieces: Vec<Polyhedron> = self
            .pieces
            .iter()
            .map(|p| p.clone().with_tuples(None, tuple))
            .collect();
        Self::from_pieces(space, pieces)
    }

    /// Add a constraint built per piece (pieces may differ in local columns).
    pub fn constrain(&self, f: impl Fn(&Polyhedron) -> Constraint) -> Self {
        self.map_pieces(|p| p.clone().with_constraint(f(p)))
    }

    pub fn union(&self, other: &IntegerSet) -> Self {
        let mut out = self.clone();
        for p in &other.pieces {
            out.add_piece(p.clone());
        }
        out
    }

    pub fn intersect(&self, other: &IntegerSet) -> Self {
        let mut out = Self::empty(self.space.clone());
        for a in &self.pieces {
            for b in &other.pieces {
                out.add_piece(a.intersect(b));
            }
        }
        out
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        for p in &self.pieces {
            if !p.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drop pieces without integer points.
    pub fn coalesce(&self) -> Result<Self, SolverError> {
        let mut out = Self::empty(self.space.clone());
        for p in &self.pieces {
            if !p.is_empty()? {
                out.add_piece(p.clone());
            }
        }
        Ok(out)
    }

    /// Set difference. Exact when `other` has no existential columns;
    /// otherwise `self` is enumerated and must be bounded.
    pub fn subtract(&self, other: &IntegerSet) -> Result<Self, SolverError> {
        if other.pieces.iter().all(|p| p.n_local() == 0) {
            let mut current: Vec<Polyhedron> = self.pieces.clone();
            for b in &other.pieces {
                let mut next = Vec::new();
                for a in &current {
                    next.extend(a.subtract(b)?);
                }
                current = next;
            }
            return Ok(Self::from_pieces(self.space.clone(), current));
        }
        let mut out = Self::empty(self.space.clone());
        for point in self.points()? {
            if !other.contains(&point)? {
                out.add_piece(self.point_set(&point));
            }
        }
        Ok(out)
    }

    /// The singleton polyhedron of a point (dims followed by params).
    fn point_set(&self, point: &[i64]) -> Polyhedron {
        Polyhedron::universe(self.space.clone()).fix(point)
    }

    pub fn is_subset(&self, other: &IntegerSet) -> Result<bool, SolverError> {
        self.subtract(other)?.is_empty()
    }

    pub fn contains(&self, point: &[i64]) -> Result<bool, SolverError> {
        for p in &self.pieces {
            if p.contains(point)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// All points (dims followed by params), deduplicated and sorted.
    pub fn points(&self) -> Result<Vec<Vec<i64>>, SolverError> {
        let mut all = Vec::new();
        for p in &self.pieces {
            all.extend(p.points()?);
        }
        all.sort();
        all.dedup();
        Ok(all)
    }

    /// Maximum of an expression built per piece.
    pub fn max_with(&self, f: impl Fn(&Polyhedron) -> AffineExpr) -> Result<Optimum, SolverError> {
        let mut best = Optimum::Empty;
        for p in &self.pieces {
            match p.max(&f(p))? {
                Optimum::Unbounded => return Ok(Optimum::Unbounded),
                Optimum::Value(v) => {
                    best = match best {
                        Optimum::Value(b) if b >= v => Optimum::Value(b),
                        _ => Optimum::Value(v),
                    }
                }
                Optimum::Empty => {}
            }
        }
        Ok(best)
    }

    /// Minimum of an expression built per piece.
    pub fn min_with(&self, f: impl Fn(&Polyhedron) -> AffineExpr) -> Result<Optimum, SolverError> {
        Ok(match self.max_with(|p| -f(p))? {
            Optimum::Value(v) => Optimum::Value(-v),
            other => other,
        })
    }

    pub fn max_dim(&self, dim: usize) -> Result<Optimum, SolverError> {
        self.max_with(|p| p.col_expr(dim))
    }

    pub fn min_dim(&self, dim: usize) -> Result<Optimum, SolverError> {
        self.min_with(|p| p.col_expr(dim))
    }

    /// The common unbounded direction of all pieces in the given columns.
    pub fn recession(&self, cols: &[usize]) -> Result<RayShape, SolverError> {
        let mut shape = RayShape::Bounded;
        for p in &self.pieces {
            if p.is_empty()? {
                continue;
            }
            match (p.recession(cols)?, &shape) {
                (RayShape::Bounded, _) => {}
                (RayShape::Multiple, _) => return Ok(RayShape::Multiple),
                (ray @ RayShape::Ray { .. }, RayShape::Bounded) => shape = ray,
                (RayShape::Ray { direction, .. }, RayShape::Ray { direction: seen, .. }) => {
                    if &direction != seen {
                        return Ok(RayShape::Multiple);
                    }
                }
                (RayShape::Ray { .. }, RayShape::Multiple) => return Ok(RayShape::Multiple),
            }
        }
        Ok(shape)
    }

    /// `{ x + delta }` for a delta over the set dimensions.
    pub fn shift(&self, delta: &[i64]) -> Self {
        self.map_pieces(|p| {
            let mut full = delta.to_vec();
            full.resize(p.n_cols(), 0);
            p.shift(&full)
        })
    }

    /// Fix leading dims/params to values.
    pub fn fix(&self, values: &[i64]) -> Self {
        self.map_pieces(|p| p.fix(values))
    }

    pub fn to_string_with_names(&self, dim_names: &[String], param_names: &[String]) -> String {
        let tuple = format!("{}[{}]", self.space.output.id, dim_names.join(", "));
        if self.pieces.is_empty() {
            return "{ }".to_string();
        }
        let parts: Vec<String> = self
            .pieces
            .iter()
            .map(|p| format!("{} : {}", tuple, p.to_string_with_names(dim_names, param_names)))
            .collect();
        format!("{{ {} }}", parts.join("; "))
    }
}

impl fmt::Display for IntegerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = (0..self.dim()).map(|i| format!("d{}", i)).collect();
        let params: Vec<String> = (0..self.n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&dims, &params))
    }
}
