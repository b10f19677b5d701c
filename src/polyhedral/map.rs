//! Integer relations for schedules, accesses and dependencies.

use crate::polyhedral::constraint::Constraint;
use crate::polyhedral::expr::AffineExpr;
use crate::polyhedral::polyhedron::{Optimum, Polyhedron};
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::{Space, Tuple};
use crate::utils::errors::SolverError;
use crate::utils::intern::Symbol;
use std::fmt;

/// A single-valued affine function, the usual way to write schedules and
/// array accesses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffineMap {
    pub input: Tuple,
    pub output: Tuple,
    pub params: Vec<Symbol>,
    /// Output expressions over the input dimensions (one per output dimension)
    pub outputs: Vec<AffineExpr>,
}

impl AffineMap {
    /// Create from output expressions without parameters.
    pub fn from_outputs(input: Tuple, output: Tuple, outputs: Vec<AffineExpr>) -> Self {
        debug_assert_eq!(output.dim, outputs.len());
        Self { input, output, params: Vec::new(), outputs }
    }

    /// Name the parameters the output expressions refer to.
    pub fn with_params(mut self, params: Vec<Symbol>) -> Self {
        debug_assert!(self.outputs.iter().all(|e| e.n_param() == params.len()));
        self.params = params;
        self
    }

    /// Create from coefficient rows `[c_0, ..., c_{n-1}, constant]`.
    pub fn from_rows(input: Tuple, output: Tuple, rows: &[Vec<i64>]) -> Self {
        let outputs = rows.iter().map(|r| AffineExpr::from_row(r, 0)).collect();
        Self::from_outputs(input, output, outputs)
    }

    /// Identity on a tuple.
    pub fn identity(tuple: Tuple) -> Self {
        let outputs = (0..tuple.dim).map(|i| AffineExpr::var(i, tuple.dim, 0)).collect();
        Self::from_outputs(tuple, tuple, outputs)
    }

    pub fn n_in(&self) -> usize {
        self.input.dim
    }

    pub fn n_out(&self) -> usize {
        self.output.dim
    }

    /// Apply the map to a point.
    pub fn apply(&self, input: &[i64], params: &[i64]) -> Vec<i64> {
        self.outputs.iter().map(|e| e.evaluate(input, params)).collect()
    }

    /// The graph of the function as a relation.
    pub fn to_map(&self) -> IntegerMap {
        let space = Space::map(self.input, self.output).with_params(self.params.clone());
        let mut p = Polyhedron::universe(space);
        let n_in = self.n_in();
        let n_cols = p.n_cols();
        for (d, e) in self.outputs.iter().enumerate() {
            let mapping: Vec<usize> = (0..n_in).collect();
            let param_mapping: Vec<usize> = (0..e.n_param()).collect();
            let lifted = e.remap(&mapping, n_cols, &param_mapping, p.n_param());
            p.add_constraint(Constraint::eq_zero(p.out_expr(d) - lifted));
        }
        IntegerMap::from_polyhedron(p)
    }
}

/// A union of relation pieces sharing one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerMap {
    pieces: IntegerSet,
}

impl IntegerMap {
    pub fn empty(space: Space) -> Self {
        Self { pieces: IntegerSet::empty(space) }
    }

    pub fn universe(space: Space) -> Self {
        Self { pieces: IntegerSet::universe(space) }
    }

    pub fn from_polyhedron(piece: Polyhedron) -> Self {
        Self { pieces: IntegerSet::from_polyhedron(piece) }
    }

    pub fn from_pieces(space: Space, pieces: impl IntoIterator<Item = Polyhedron>) -> Self {
        Self { pieces: IntegerSet::from_pieces(space, pieces) }
    }

    /// Identity relation restricted to `set`.
    pub fn identity_on(set: &IntegerSet) -> Self {
        let tuple = set.space().output;
        AffineMap::identity(tuple).to_map().intersect_domain(set)
    }

    pub fn space(&self) -> &Space {
        self.pieces.space()
    }

    pub fn n_in(&self) -> usize {
        self.space().n_in()
    }

    pub fn n_out(&self) -> usize {
        self.space().n_out()
    }

    pub fn pieces(&self) -> &[Polyhedron] {
        self.pieces.pieces()
    }

    pub fn add_piece(&mut self, piece: Polyhedron) {
        self.pieces.add_piece(piece);
    }

    pub fn align_params(&self, params: &[Symbol]) -> Self {
        Self { pieces: self.pieces.align_params(params) }
    }

    fn lift(&self, space: Space, pieces: Vec<Polyhedron>) -> Self {
        Self::from_pieces(space, pieces)
    }

    pub fn union(&self, other: &IntegerMap) -> Self {
        Self { pieces: self.pieces.union(&other.pieces) }
    }

    pub fn intersect(&self, other: &IntegerMap) -> Self {
        Self { pieces: self.pieces.intersect(&other.pieces) }
    }

    pub fn subtract(&self, other: &IntegerMap) -> Result<Self, SolverError> {
        Ok(Self { pieces: self.pieces.subtract(&other.pieces)? })
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        self.pieces.is_empty()
    }

    pub fn is_subset(&self, other: &IntegerMap) -> Result<bool, SolverError> {
        self.pieces.is_subset(&other.pieces)
    }

    pub fn coalesce(&self) -> Result<Self, SolverError> {
        Ok(Self { pieces: self.pieces.coalesce()? })
    }

    pub fn reverse(&self) -> Self {
        let pieces = self.pieces().iter().map(Polyhedron::reverse).collect();
        self.lift(self.space().reverse(), pieces)
    }

    /// Composition `self: A -> B` then `other: B -> C`.
    pub fn apply_range(&self, other: &IntegerMap) -> Self {
        let space = Space::map(
            self.space().input.unwrap_or(self.space().output),
            other.space().output,
        )
        .with_params(self.space().merged_params(other.space()));
        let mut pieces = Vec::new();
        for a in self.pieces() {
            for b in other.pieces() {
                pieces.push(a.apply_range(b));
            }
        }
        self.lift(space, pieces)
    }

    pub fn intersect_domain(&self, set: &IntegerSet) -> Self {
        let space = self.space().clone().with_params(self.space().merged_params(set.space()));
        let mut pieces = Vec::new();
        for a in self.pieces() {
            for s in set.pieces() {
                pieces.push(a.intersect_domain(s));
            }
        }
        self.lift(space, pieces)
    }

    pub fn intersect_range(&self, set: &IntegerSet) -> Self {
        let space = self.space().clone().with_params(self.space().merged_params(set.space()));
        let mut pieces = Vec::new();
        for a in self.pieces() {
            for s in set.pieces() {
                pieces.push(a.intersect_range(s));
            }
        }
        self.lift(space, pieces)
    }

    pub fn domain(&self) -> IntegerSet {
        let pieces: Vec<Polyhedron> = self.pieces().iter().map(Polyhedron::domain).collect();
        IntegerSet::from_pieces(self.space().domain(), pieces)
    }

    pub fn range(&self) -> IntegerSet {
        let pieces: Vec<Polyhedron> = self.pieces().iter().map(Polyhedron::range).collect();
        IntegerSet::from_pieces(self.space().range(), pieces)
    }

    /// Image of a set.
    pub fn image(&self, set: &IntegerSet) -> IntegerSet {
        self.intersect_domain(set).range()
    }

    /// `A -> B` and `A -> C` give `A -> [B, C]` over the anonymous tuple `output`.
    pub fn range_product(&self, other: &IntegerMap, output: Tuple) -> Self {
        let space = Space::map(
            self.space().input.unwrap_or(self.space().output),
            output,
        )
        .with_params(self.space().merged_params(other.space()));
        let mut pieces = Vec::new();
        for a in self.pieces() {
            for b in other.pieces() {
                pieces.push(a.range_product(b, output));
            }
        }
        self.lift(space, pieces)
    }

    /// The relation as a set over `[in, out]`.
    pub fn wrap(&self) -> IntegerSet {
        let pieces: Vec<Polyhedron> = self.pieces().iter().map(Polyhedron::wrap).collect();
        let space = pieces
            .first()
            .map(|p| p.space().clone())
            .unwrap_or_else(|| Polyhedron::universe(self.space().clone()).wrap().space().clone());
        IntegerSet::from_pieces(space, pieces)
    }

    /// Rename tuples (dimensions must agree).
    pub fn with_tuples(&self, input: Tuple, output: Tuple) -> Self {
        let space = Space::map(input, output).with_params(self.space().params.clone());
        let pieces = self
            .pieces()
            .iter()
            .map(|p| p.clone().with_tuples(Some(input), output))
            .collect();
        self.lift(space, pieces)
    }

    /// Shift output dimension `dim` by `delta`.
    pub fn translate_out(&self, dim: usize, delta: i64) -> Self {
        let pieces = self.pieces().iter().map(|p| p.translate_out(dim, delta)).collect();
        self.lift(self.space().clone(), pieces)
    }

    /// Restrict every piece with a constraint built per piece.
    pub fn constrain(&self, f: impl Fn(&Polyhedron) -> Constraint) -> Self {
        Self { pieces: self.pieces.constrain(f) }
    }

    /// Apply a function to every piece.
    pub fn map_pieces(&self, f: impl Fn(&Polyhedron) -> Polyhedron) -> Self {
        Self { pieces: self.pieces.map_pieces(f) }
    }

    pub fn max_with(&self, f: impl Fn(&Polyhedron) -> AffineExpr) -> Result<Optimum, SolverError> {
        self.pieces.max_with(f)
    }

    pub fn min_with(&self, f: impl Fn(&Polyhedron) -> AffineExpr) -> Result<Optimum, SolverError> {
        self.pieces.min_with(f)
    }

    /// All pairs (input dims, output dims, params) of a bounded relation.
    pub fn points(&self) -> Result<Vec<Vec<i64>>, SolverError> {
        self.pieces.points()
    }

    pub fn contains(&self, point: &[i64]) -> Result<bool, SolverError> {
        self.pieces.contains(point)
    }

    /// Pieces of the lexicographic order `in <=lex out` over `tuple`. Piece
    /// `l < n` holds pairs equal before `l` and strictly ordered at `l`;
    /// piece `n` is the diagonal.
    pub fn lex_le_pieces(tuple: Tuple) -> Vec<Polyhedron> {
        let n = tuple.dim;
        let space = Space::map(tuple, tuple);
        (0..=n)
            .map(|l| {
                let mut p = Polyhedron::universe(space.clone());
                for j in 0..l {
                    p.add_constraint(Constraint::eq(p.out_expr(j), p.in_expr(j)));
                }
                if l < n {
                    let mut gap = p.out_expr(l) - p.in_expr(l);
                    gap.constant = -1;
                    p.add_constraint(Constraint::ge_zero(gap));
                }
                p
            })
            .collect()
    }

    /// `{ a -> b : a <lex b }` over `tuple`.
    pub fn lex_lt(tuple: Tuple) -> Self {
        let mut pieces = Self::lex_le_pieces(tuple);
        pieces.pop();
        Self::from_pieces(Space::map(tuple, tuple), pieces)
    }

    /// `{ a -> b : a <=lex b }` over `tuple`.
    pub fn lex_le(tuple: Tuple) -> Self {
        Self::from_pieces(Space::map(tuple, tuple), Self::lex_le_pieces(tuple))
    }

    /// `{ a -> b : b <lex a }` restricted to this relation.
    pub fn backwards_pairs(&self) -> Self {
        debug_assert_eq!(self.n_in(), self.n_out());
        let tuple = self.space().output;
        let gt = Self::lex_lt(tuple).reverse().with_tuples(
            self.space().input.unwrap_or(tuple),
            tuple,
        );
        self.intersect(&gt)
    }

    pub fn to_string_with_names(&self, in_names: &[String], out_names: &[String], params: &[String]) -> String {
        if self.pieces().is_empty() {
            return "{ }".to_string();
        }
        let space = self.space();
        let src = space.input.map(|t| t.id.to_string()).unwrap_or_default();
        let mut names: Vec<String> = in_names.to_vec();
        names.extend(out_names.iter().cloned());
        let parts: Vec<String> = self
            .pieces()
            .iter()
            .map(|p| {
                format!(
                    "{}[{}] -> {}[{}] : {}",
                    src,
                    in_names.join(", "),
                    space.output.id,
                    out_names.join(", "),
                    p.to_string_with_names(&names, params)
                )
            })
            .collect();
        format!("{{ {} }}", parts.join("; "))
    }
}

impl fmt::Display for IntegerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ins: Vec<String> = (0..self.n_in()).map(|i| format!("i{}", i)).collect();
        let outs: Vec<String> = (0..self.n_out()).map(|i| format!("o{}", i)).collect();
        let params: Vec<String> = (0..self.space().n_param()).map(|i| format!("p{}", i)).collect();
        write!(f, "{}", self.to_string_with_names(&ins, &outs, &params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArrayId, StmtId};

    fn stmt(dim: usize) -> Tuple {
        Tuple::statement(StmtId(0), dim)
    }

    #[test]
    fn test_affine_map_graph() {
        // S[i] -> A[2i + 1]
        let m = AffineMap::from_rows(stmt(1), Tuple::array(ArrayId(0), 1), &[vec![2, 1]]);
        assert_eq!(m.apply(&[3], &[]), vec![7]);
        let g = m.to_map();
        let dom = IntegerSet::boxed(Space::set(stmt(1)), &[(0, Some(4))]);
        let img = g.image(&dom);
        assert_eq!(img.points().unwrap(), vec![vec![1], vec![3], vec![5], vec![7], vec![9]]);
    }

    #[test]
    fn test_lex_order() {
        let t = Tuple::time(2);
        let lt = IntegerMap::lex_lt(t);
        assert!(lt.contains(&[0, 5, 1, 0]).unwrap());
        assert!(lt.contains(&[0, 1, 0, 2]).unwrap());
        assert!(!lt.contains(&[1, 0, 0, 9]).unwrap());
        assert!(!lt.contains(&[1, 1, 1, 1]).unwrap());
        assert!(IntegerMap::lex_le(t).contains(&[1, 1, 1, 1]).unwrap());
    }

    #[test]
    fn test_compose_and_reverse() {
        let w = AffineMap::from_rows(stmt(1), Tuple::array(ArrayId(0), 1), &[vec![1, 0]]).to_map();
        let r = AffineMap::from_rows(
            Tuple::statement(StmtId(1), 1),
            Tuple::array(ArrayId(0), 1),
            &[vec![1, -1]],
        )
        .to_map();
        // S0[i] writes A[i], S1[j] reads A[j - 1]: S0[i] -> S1[i + 1]
        let dep = w.apply_range(&r.reverse());
        assert!(dep.contains(&[4, 5]).unwrap());
        assert!(!dep.contains(&[4, 4]).unwrap());
        assert_eq!(dep.space().output, Tuple::statement(StmtId(1), 1));
    }
}
