//! Programmatic construction of models.
//!
//! ```rust,ignore
//! let mut b = ModelBuilder::new();
//! let x = b.array("x", &[(0, None)])?;
//! let s = b.statement("s", &[(0, None)])?;
//! b.write(s, x, &[vec![1, 0]])?;          // s[i] writes x[i]
//! let model = b.build()?;
//! ```

use crate::ir::expr::Expr;
use crate::ir::model::{Array, ArrayAccess, ArrayId, ElementType, Model, Statement, StmtId};
use crate::polyhedral::{
    AffineExpr, AffineMap, Constraint, ConstraintKind, IntegerSet, Optimum, Space, Tuple, UnionMap,
};
use crate::utils::errors::{ModelError, ModelErrorKind, PolyResult};
use log::debug;
use std::collections::BTreeMap;

/// Builder for a `Model`.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: Model,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an array of reals with per-dimension bounds. Only dimension 0
    /// may be unbounded, which makes the array infinite.
    pub fn array(&mut self, name: &str, bounds: &[(i64, Option<i64>)]) -> PolyResult<ArrayId> {
        self.typed_array(name, bounds, ElementType::default())
    }

    pub fn typed_array(
        &mut self,
        name: &str,
        bounds: &[(i64, Option<i64>)],
        element_type: ElementType,
    ) -> PolyResult<ArrayId> {
        if self.model.find_array(name).is_some() {
            return Err(ModelError::new(
                ModelErrorKind::DuplicateName,
                format!("Array {} is defined twice.", name),
            )
            .into());
        }
        if bounds.iter().skip(1).any(|(_, hi)| hi.is_none()) {
            return Err(ModelError::new(
                ModelErrorKind::DimensionMismatch,
                format!("Array {} is unbounded in a dimension other than the first.", name),
            )
            .into());
        }
        let id = ArrayId(self.model.arrays.len());
        let tuple = Tuple::array(id, bounds.len());
        let is_infinite = bounds.first().map(|(_, hi)| hi.is_none()).unwrap_or(false);
        self.model.arrays.push(Array {
            id,
            name: name.to_string(),
            domain: IntegerSet::boxed(Space::set(tuple), bounds),
            element_type,
            is_infinite,
            buffer_size: Vec::new(),
            period: 0,
            period_offset: 0,
            first_period_access: 0,
            last_period_access: 0,
            inter_period_dependency: false,
        });
        Ok(id)
    }

    /// Declare a statement with a box iteration domain.
    pub fn statement(&mut self, name: &str, bounds: &[(i64, Option<i64>)]) -> PolyResult<StmtId> {
        if self.model.find_statement(name).is_some() {
            return Err(ModelError::new(
                ModelErrorKind::DuplicateName,
                format!("Statement {} is defined twice.", name),
            )
            .into());
        }
        let id = StmtId(self.model.statements.len());
        let tuple = Tuple::statement(id, bounds.len());
        self.model.statements.push(Statement {
            id,
            name: name.to_string(),
            domain: IntegerSet::boxed(Space::set(tuple), bounds),
            expr: None,
            accesses: Vec::new(),
            self_order: None,
            is_infinite: false,
            is_input_or_output: false,
            streaming_needs_modulo: false,
            array_access_offset: BTreeMap::new(),
            clone_of: None,
        });
        Ok(id)
    }

    pub fn find_array(&self, name: &str) -> Option<ArrayId> {
        self.model.find_array(name)
    }

    pub fn find_statement(&self, name: &str) -> Option<StmtId> {
        self.model.find_statement(name)
    }

    fn check_statement(&self, stmt: StmtId) -> PolyResult<()> {
        if stmt.0 >= self.model.statements.len() {
            return Err(ModelError::new(
                ModelErrorKind::UnknownStatement,
                format!("No statement with handle {}.", stmt),
            )
            .into());
        }
        Ok(())
    }

    fn check_array(&self, array: ArrayId) -> PolyResult<()> {
        if array.0 >= self.model.arrays.len() {
            return Err(ModelError::new(
                ModelErrorKind::UnknownArray,
                format!("No array with handle {}.", array),
            )
            .into());
        }
        Ok(())
    }

    /// Add `coeffs . i + constant >= 0` (or `= 0`) to a statement domain.
    pub fn constrain(&mut self, stmt: StmtId, coeffs: &[i64], constant: i64, equality: bool) -> PolyResult<()> {
        self.check_statement(stmt)?;
        let s = self.model.statement_mut(stmt);
        if coeffs.len() != s.dims() {
            return Err(ModelError::new(
                ModelErrorKind::DimensionMismatch,
                format!("Constraint on {} has {} coefficients, expected {}.", s.name, coeffs.len(), s.dims()),
            )
            .into());
        }
        let mut row = coeffs.to_vec();
        row.push(constant);
        let kind = if equality { ConstraintKind::Equality } else { ConstraintKind::Inequality };
        s.domain = s.domain.constrain(|p| {
            let mut e = AffineExpr::from_row(&row, p.n_param());
            e.coeffs.resize(p.n_cols(), 0);
            Constraint::new(e, kind)
        });
        Ok(())
    }

    fn access_map(&self, stmt: StmtId, array: ArrayId, index: &[Vec<i64>]) -> PolyResult<AffineMap> {
        self.check_statement(stmt)?;
        self.check_array(array)?;
        let s = self.model.statement(stmt);
        let a = self.model.array(array);
        if index.len() != a.dims() || index.iter().any(|r| r.len() != s.dims() + 1) {
            return Err(ModelError::new(
                ModelErrorKind::DimensionMismatch,
                format!("Access of {} to {} does not match their dimensions.", s.name, a.name),
            )
            .into());
        }
        Ok(AffineMap::from_rows(s.tuple(), a.tuple(), index))
    }

    /// Record that `stmt` writes `array` at the affine index given as rows
    /// `[c_0, ..., c_{n-1}, constant]` over the statement dimensions.
    pub fn write(&mut self, stmt: StmtId, array: ArrayId, index: &[Vec<i64>]) -> PolyResult<usize> {
        let map = self.access_map(stmt, array, index)?;
        Ok(self.push_access(stmt, array, map, false, true))
    }

    /// Record a read; returns the access position used by `Expr::Read`.
    pub fn read(&mut self, stmt: StmtId, array: ArrayId, index: &[Vec<i64>]) -> PolyResult<usize> {
        let map = self.access_map(stmt, array, index)?;
        Ok(self.push_access(stmt, array, map, true, false))
    }

    fn push_access(&mut self, stmt: StmtId, array: ArrayId, map: AffineMap, reading: bool, writing: bool) -> usize {
        let s = self.model.statement_mut(stmt);
        s.accesses.push(ArrayAccess { array, relation: map.to_map(), reading, writing });
        s.accesses.len() - 1
    }

    pub fn expr(&mut self, stmt: StmtId, expr: Expr) -> PolyResult<()> {
        self.check_statement(stmt)?;
        self.model.statement_mut(stmt).expr = Some(expr);
        Ok(())
    }

    /// Order instance `i` of a statement before instance `f(i)`.
    pub fn self_order(&mut self, stmt: StmtId, rows: &[Vec<i64>]) -> PolyResult<()> {
        self.check_statement(stmt)?;
        let s = self.model.statement_mut(stmt);
        if rows.len() != s.dims() || rows.iter().any(|r| r.len() != s.dims() + 1) {
            return Err(ModelError::new(
                ModelErrorKind::DimensionMismatch,
                format!("Self ordering of {} does not match its dimensions.", s.name),
            )
            .into());
        }
        let order = AffineMap::from_rows(s.tuple(), s.tuple(), rows).to_map();
        s.self_order = Some(match s.self_order.take() {
            Some(existing) => existing.union(&order),
            None => order,
        });
        Ok(())
    }

    /// Global ordering: instance `i` of `from` precedes instance `f(i)` of `to`.
    pub fn clock(&mut self, from: StmtId, to: StmtId, rows: &[Vec<i64>]) -> PolyResult<()> {
        self.check_statement(from)?;
        self.check_statement(to)?;
        let src = self.model.statement(from).tuple();
        let dst = self.model.statement(to).tuple();
        if rows.len() != dst.dim || rows.iter().any(|r| r.len() != src.dim + 1) {
            return Err(ModelError::new(
                ModelErrorKind::DimensionMismatch,
                "Clock relation does not match statement dimensions.",
            )
            .into());
        }
        let map = AffineMap::from_rows(src, dst, rows).to_map();
        self.model.clock.get_or_insert_with(UnionMap::new).add(map);
        Ok(())
    }

    pub fn input_or_output(&mut self, stmt: StmtId) -> PolyResult<()> {
        self.check_statement(stmt)?;
        self.model.statement_mut(stmt).is_input_or_output = true;
        Ok(())
    }

    /// Finish the model: derive infinity flags and check expressions.
    pub fn build(mut self) -> PolyResult<Model> {
        for s in self.model.statements.iter_mut() {
            s.is_infinite = s.dims() > 0 && s.domain.max_dim(0)? == Optimum::Unbounded;
            if let Some(expr) = &s.expr {
                let bad_read = expr
                    .reads()
                    .into_iter()
                    .any(|r| s.accesses.get(r).map(|a| !a.reading).unwrap_or(true));
                if bad_read || expr.iterator_extent() > s.dims() || !expr.well_formed() {
                    return Err(ModelError::new(
                        ModelErrorKind::DimensionMismatch,
                        format!("Expression of statement {} is malformed.", s.name),
                    )
                    .into());
                }
            }
            debug!("statement {}: {} dims, infinite = {}", s.name, s.dims(), s.is_infinite);
        }
        Ok(self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::PrimitiveOp;
    use crate::utils::errors::PolyError;

    #[test]
    fn test_build_stream() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let y = b.array("y", &[(0, Some(9))]).unwrap();
        let s = b.statement("s", &[(0, None)]).unwrap();
        let t = b.statement("t", &[(0, Some(9))]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        let r = b.read(t, x, &[vec![1, 0]]).unwrap();
        b.write(t, y, &[vec![1, 0]]).unwrap();
        b.expr(t, Expr::primitive(PrimitiveOp::Neg, vec![Expr::read(r)])).unwrap();
        let model = b.build().unwrap();
        assert!(model.array(x).is_infinite);
        assert!(!model.array(y).is_infinite);
        assert!(model.statement(s).is_infinite);
        assert!(!model.statement(t).is_infinite);
        assert_eq!(model.statement(t).reads().count(), 1);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut b = ModelBuilder::new();
        b.array("x", &[(0, None)]).unwrap();
        assert!(matches!(b.array("x", &[(0, Some(1))]), Err(PolyError::Model(_))));
        assert!(b.array("z", &[(0, Some(3)), (0, None)]).is_err());

        let x = ArrayId(0);
        let s = b.statement("s", &[(0, Some(3))]).unwrap();
        assert!(b.write(s, x, &[vec![1, 0], vec![0, 0]]).is_err());
        b.expr(s, Expr::read(0)).unwrap();
        assert!(b.build().is_err());
    }

    #[test]
    fn test_constrain_domain() {
        let mut b = ModelBuilder::new();
        let s = b.statement("s", &[(0, Some(9)), (0, Some(9))]).unwrap();
        // j <= i
        b.constrain(s, &[1, -1], 0, false).unwrap();
        let model = b.build().unwrap();
        let dom = &model.statement(s).domain;
        assert!(dom.contains(&[3, 2]).unwrap());
        assert!(!dom.contains(&[2, 3]).unwrap());
    }
}
