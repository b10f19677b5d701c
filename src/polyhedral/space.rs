//! Spaces: the named, typed coordinate systems of sets and relations.
//!
//! A set lives in a space with one tuple; a relation (map) lives in a
//! space with an input and an output tuple. Tuples are identified by
//! arena handles, never by name or pointer, so cloning a statement only
//! means giving its tuple a new `StmtId`.

use crate::ir::{ArrayId, StmtId};
use crate::utils::intern::Symbol;
use std::fmt;

/// Identity of a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TupleId {
    /// Iteration space of a statement
    Statement(StmtId),
    /// Index space of an array
    Array(ArrayId),
    /// Schedule time
    Time,
    /// No identity (parameter-only sets, scratch spaces)
    Anonymous,
}

impl fmt::Display for TupleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleId::Statement(s) => write!(f, "{}", s),
            TupleId::Array(a) => write!(f, "{}", a),
            TupleId::Time => write!(f, "T"),
            TupleId::Anonymous => Ok(()),
        }
    }
}

/// A tuple of integer dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tuple {
    pub id: TupleId,
    pub dim: usize,
}

impl Tuple {
    pub fn new(id: TupleId, dim: usize) -> Self {
        Self { id, dim }
    }

    pub fn statement(id: StmtId, dim: usize) -> Self {
        Self::new(TupleId::Statement(id), dim)
    }

    pub fn array(id: ArrayId, dim: usize) -> Self {
        Self::new(TupleId::Array(id), dim)
    }

    pub fn time(dim: usize) -> Self {
        Self::new(TupleId::Time, dim)
    }
}

/// A space for a polyhedral object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Space {
    /// Symbolic parameters, in column order
    pub params: Vec<Symbol>,
    /// Input tuple (`None` for sets)
    pub input: Option<Tuple>,
    /// Output tuple (the only tuple of a set)
    pub output: Tuple,
}

impl Space {
    /// Create a set space.
    pub fn set(tuple: Tuple) -> Self {
        Self { params: Vec::new(), input: None, output: tuple }
    }

    /// Create a relation space.
    pub fn map(input: Tuple, output: Tuple) -> Self {
        Self { params: Vec::new(), input: Some(input), output }
    }

    /// Parameter-only space.
    pub fn params_only(params: Vec<Symbol>) -> Self {
        Self { params, input: None, output: Tuple::new(TupleId::Anonymous, 0) }
    }

    pub fn with_params(mut self, params: Vec<Symbol>) -> Self {
        self.params = params;
        self
    }

    pub fn is_set(&self) -> bool {
        self.input.is_none()
    }

    pub fn n_param(&self) -> usize {
        self.params.len()
    }

    pub fn n_in(&self) -> usize {
        self.input.map(|t| t.dim).unwrap_or(0)
    }

    pub fn n_out(&self) -> usize {
        self.output.dim
    }

    /// Number of set/relation dimensions (input plus output).
    pub fn n_dim(&self) -> usize {
        self.n_in() + self.n_out()
    }

    /// Set space of the input tuple (or the set itself).
    pub fn domain(&self) -> Space {
        match self.input {
            Some(t) => Space { params: self.params.clone(), input: None, output: t },
            None => self.clone(),
        }
    }

    /// Set space of the output tuple.
    pub fn range(&self) -> Space {
        Space { params: self.params.clone(), input: None, output: self.output }
    }

    /// Swap input and output.
    pub fn reverse(&self) -> Space {
        match self.input {
            Some(t) => Space { params: self.params.clone(), input: Some(self.output), output: t },
            None => self.clone(),
        }
    }

    /// Union of both parameter lists, keeping `self`'s order first.
    pub fn merged_params(&self, other: &Space) -> Vec<Symbol> {
        let mut params = self.params.clone();
        for p in &other.params {
            if !params.contains(p) {
                params.push(*p);
            }
        }
        params
    }

    /// Key identifying the tuples of this space, ignoring parameters.
    pub fn key(&self) -> SpaceKey {
        SpaceKey { input: self.input, output: self.output }
    }

    /// Check that two spaces have the same tuples.
    pub fn same_tuples(&self, other: &Space) -> bool {
        self.input == other.input && self.output == other.output
    }
}

/// Tuples of a space, used to key unions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpaceKey {
    pub input: Option<Tuple>,
    pub output: Tuple,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_space() {
        let s = Space::map(Tuple::statement(StmtId(0), 2), Tuple::array(ArrayId(1), 1));
        assert_eq!(s.n_in(), 2);
        assert_eq!(s.n_out(), 1);
        assert_eq!(s.n_dim(), 3);
        assert!(!s.is_set());
        assert_eq!(s.domain().output, Tuple::statement(StmtId(0), 2));
        assert_eq!(s.reverse().input, Some(Tuple::array(ArrayId(1), 1)));
    }

    #[test]
    fn test_set_space() {
        let s = Space::set(Tuple::time(3));
        assert!(s.is_set());
        assert_eq!(s.n_in(), 0);
        assert_eq!(s.n_dim(), 3);
        assert_eq!(s.domain(), s);
    }
}
