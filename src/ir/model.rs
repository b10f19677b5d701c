//! The polyhedral model.
//!
//! The model is an arena: arrays and statements live in vectors and are
//! referred to by `ArrayId`/`StmtId` everywhere else, including inside the
//! spaces of polyhedral objects. Only modulo avoidance appends statements
//! (clones); every other phase writes its own annotation fields.

use crate::ir::expr::Expr;
use crate::polyhedral::{Context, IntegerMap, IntegerSet, Tuple, TupleId, UnionMap};
use crate::utils::intern::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Handle of an array in its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArrayId(pub usize);

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A{}", self.0)
    }
}

/// Handle of a statement in its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StmtId(pub usize);

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Element type of arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Int,
    #[default]
    Real,
    Bool,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Int => write!(f, "int"),
            ElementType::Real => write!(f, "real"),
            ElementType::Bool => write!(f, "bool"),
        }
    }
}

/// An array, possibly infinite in its first dimension.
#[derive(Debug, Clone)]
pub struct Array {
    pub id: ArrayId,
    pub name: String,
    /// Index domain
    pub domain: IntegerSet,
    pub element_type: ElementType,
    pub is_infinite: bool,
    /// Buffer size per dimension (set by storage allocation)
    pub buffer_size: Vec<i64>,
    /// Index advance of dimension 0 per schedule period
    pub period: i64,
    /// Buffer-aligned base index of the accesses in one period
    pub period_offset: i64,
    pub first_period_access: i64,
    pub last_period_access: i64,
    /// Some value read in a period is written in an earlier one
    pub inter_period_dependency: bool,
}

impl Array {
    pub fn dims(&self) -> usize {
        self.domain.dim()
    }

    pub fn tuple(&self) -> Tuple {
        Tuple::array(self.id, self.dims())
    }
}

/// An affine access of a statement to an array.
#[derive(Debug, Clone)]
pub struct ArrayAccess {
    pub array: ArrayId,
    /// Statement domain -> array index
    pub relation: IntegerMap,
    pub reading: bool,
    pub writing: bool,
}

/// A statement: an iteration domain, the value it computes and the
/// accesses that feed and store it.
#[derive(Debug, Clone)]
pub struct Statement {
    pub id: StmtId,
    pub name: String,
    pub domain: IntegerSet,
    pub expr: Option<Expr>,
    pub accesses: Vec<ArrayAccess>,
    /// Extra ordering among the statement's own instances
    pub self_order: Option<IntegerMap>,
    pub is_infinite: bool,
    pub is_input_or_output: bool,
    pub streaming_needs_modulo: bool,
    /// Index corrections of split statements, per array
    pub array_access_offset: BTreeMap<ArrayId, i64>,
    /// The statement this one was split from
    pub clone_of: Option<StmtId>,
}

impl Statement {
    pub fn dims(&self) -> usize {
        self.domain.dim()
    }

    pub fn tuple(&self) -> Tuple {
        Tuple::statement(self.id, self.dims())
    }

    pub fn writes(&self) -> impl Iterator<Item = &ArrayAccess> {
        self.accesses.iter().filter(|a| a.writing)
    }

    pub fn reads(&self) -> impl Iterator<Item = &ArrayAccess> {
        self.accesses.iter().filter(|a| a.reading)
    }

    /// Arrays accessed, in first-access order.
    pub fn arrays(&self) -> Vec<ArrayId> {
        let mut out = Vec::new();
        for a in &self.accesses {
            if !out.contains(&a.array) {
                out.push(a.array);
            }
        }
        out
    }
}

/// The whole model of one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub context: Context,
    pub arrays: Vec<Array>,
    pub statements: Vec<Statement>,
    /// Global ordering between statement instances, if any
    pub clock: Option<UnionMap>,
    /// Pairs of array elements accessed by concurrent loop iterations
    pub parallel_accesses: UnionMap,
    /// Phase parameters introduced by statement splitting
    pub phase_ids: BTreeMap<Symbol, ArrayId>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn array(&self, id: ArrayId) -> &Array {
        &self.arrays[id.0]
    }

    pub fn array_mut(&mut self, id: ArrayId) -> &mut Array {
        &mut self.arrays[id.0]
    }

    pub fn statement(&self, id: StmtId) -> &Statement {
        &self.statements[id.0]
    }

    pub fn statement_mut(&mut self, id: StmtId) -> &mut Statement {
        &mut self.statements[id.0]
    }

    pub fn find_array(&self, name: &str) -> Option<ArrayId> {
        self.arrays.iter().find(|a| a.name == name).map(|a| a.id)
    }

    pub fn find_statement(&self, name: &str) -> Option<StmtId> {
        self.statements.iter().find(|s| s.name == name).map(|s| s.id)
    }

    /// Statements of the original model (no split clones).
    pub fn original_statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(|s| s.clone_of.is_none())
    }

    /// Printable name of a tuple.
    pub fn tuple_name(&self, id: TupleId) -> String {
        match id {
            TupleId::Statement(s) => self
                .statements
                .get(s.0)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| s.to_string()),
            TupleId::Array(a) => self
                .arrays
                .get(a.0)
                .map(|a| a.name.clone())
                .unwrap_or_else(|| a.to_string()),
            TupleId::Time => "T".to_string(),
            TupleId::Anonymous => String::new(),
        }
    }

    /// Append a copy of a statement under a new handle and name. Domains
    /// and relations are re-tupled to the new handle.
    pub fn clone_statement(&mut self, id: StmtId, name: String, domain: IntegerSet) -> StmtId {
        let new_id = StmtId(self.statements.len());
        let source = self.statement(id).clone();
        let tuple = Tuple::statement(new_id, source.dims());
        let accesses = source
            .accesses
            .iter()
            .map(|a| ArrayAccess {
                array: a.array,
                relation: a.relation.with_tuples(tuple, a.relation.space().output),
                reading: a.reading,
                writing: a.writing,
            })
            .collect();
        let self_order = source.self_order.as_ref().map(|o| o.with_tuples(tuple, tuple));
        self.statements.push(Statement {
            id: new_id,
            name,
            domain: domain.with_tuple(tuple),
            expr: source.expr.clone(),
            accesses,
            self_order,
            is_infinite: source.is_infinite,
            is_input_or_output: source.is_input_or_output,
            streaming_needs_modulo: false,
            array_access_offset: BTreeMap::new(),
            clone_of: Some(id),
        });
        new_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::ModelBuilder;

    #[test]
    fn test_ids_display() {
        assert_eq!(StmtId(3).to_string(), "S3");
        assert_eq!(ArrayId(0).to_string(), "A0");
    }

    #[test]
    fn test_clone_statement_retuples() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let s = b.statement("s", &[(0, None)]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        let mut model = b.build().unwrap();

        let domain = model.statement(s).domain.clone();
        let c = model.clone_statement(s, "s_p0".to_string(), domain);
        let clone = model.statement(c);
        assert_eq!(clone.clone_of, Some(s));
        assert_eq!(clone.domain.space().output.id, TupleId::Statement(c));
        assert_eq!(clone.accesses[0].relation.space().input.map(|t| t.id), Some(TupleId::Statement(c)));
        assert_eq!(model.find_statement("s_p0"), Some(c));
        assert_eq!(model.tuple_name(TupleId::Statement(c)), "s_p0");
    }
}
