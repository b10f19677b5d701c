//! Unions over several spaces.
//!
//! Statement domains, schedules and dependencies span many tuples. A
//! `UnionSet`/`UnionMap` keeps one `IntegerSet`/`IntegerMap` per tuple
//! combination in a `BTreeMap`, so iteration order is deterministic and
//! inserting the same piece twice is a no-op.

use crate::polyhedral::map::IntegerMap;
use crate::polyhedral::polyhedron::Optimum;
use crate::polyhedral::set::IntegerSet;
use crate::polyhedral::space::{SpaceKey, TupleId};
use crate::utils::errors::SolverError;
use std::collections::BTreeMap;

/// Union of sets in different spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionSet {
    sets: BTreeMap<SpaceKey, IntegerSet>,
}

impl UnionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(set: IntegerSet) -> Self {
        let mut u = Self::new();
        u.add(set);
        u
    }

    /// Add a set, merging with the set already present in its space.
    pub fn add(&mut self, set: IntegerSet) {
        if set.pieces().is_empty() {
            return;
        }
        let key = set.space().key();
        let merged = match self.sets.remove(&key) {
            Some(existing) => existing.union(&set),
            None => set,
        };
        self.sets.insert(key, merged);
    }

    pub fn union(&self, other: &UnionSet) -> Self {
        let mut out = self.clone();
        for s in other.sets.values() {
            out.add(s.clone());
        }
        out
    }

    pub fn intersect(&self, other: &UnionSet) -> Self {
        let mut out = Self::new();
        for (key, s) in &self.sets {
            if let Some(o) = other.sets.get(key) {
                out.add(s.intersect(o));
            }
        }
        out
    }

    pub fn subtract(&self, other: &UnionSet) -> Result<Self, SolverError> {
        let mut out = Self::new();
        for (key, s) in &self.sets {
            match other.sets.get(key) {
                Some(o) => out.add(s.subtract(o)?),
                None => out.add(s.clone()),
            }
        }
        Ok(out)
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        for s in self.sets.values() {
            if !s.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_subset(&self, other: &UnionSet) -> Result<bool, SolverError> {
        self.subtract(other)?.is_empty()
    }

    pub fn get(&self, key: &SpaceKey) -> Option<&IntegerSet> {
        self.sets.get(key)
    }

    /// The set over the tuple with the given identity, if any.
    pub fn get_tuple(&self, id: TupleId) -> Option<&IntegerSet> {
        self.sets.values().find(|s| s.space().output.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntegerSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Maximum of an output dimension over every member set.
    pub fn max_dim(&self, dim: usize) -> Result<Optimum, SolverError> {
        let mut best = Optimum::Empty;
        for s in self.sets.values() {
            best = combine_max(best, s.max_dim(dim)?);
        }
        Ok(best)
    }

    pub fn min_dim(&self, dim: usize) -> Result<Optimum, SolverError> {
        let mut best = Optimum::Empty;
        for s in self.sets.values() {
            best = combine_min(best, s.min_dim(dim)?);
        }
        Ok(best)
    }
}

/// Union of relations in different spaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnionMap {
    maps: BTreeMap<SpaceKey, IntegerMap>,
}

impl UnionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: IntegerMap) -> Self {
        let mut u = Self::new();
        u.add(map);
        u
    }

    /// Add a relation, merging with the one already present in its space.
    pub fn add(&mut self, map: IntegerMap) {
        if map.pieces().is_empty() {
            return;
        }
        let key = map.space().key();
        let merged = match self.maps.remove(&key) {
            Some(existing) => existing.union(&map),
            None => map,
        };
        self.maps.insert(key, merged);
    }

    pub fn union(&self, other: &UnionMap) -> Self {
        let mut out = self.clone();
        for m in other.maps.values() {
            out.add(m.clone());
        }
        out
    }

    pub fn intersect(&self, other: &UnionMap) -> Self {
        let mut out = Self::new();
        for (key, m) in &self.maps {
            if let Some(o) = other.maps.get(key) {
                out.add(m.intersect(o));
            }
        }
        out
    }

    pub fn subtract(&self, other: &UnionMap) -> Result<Self, SolverError> {
        let mut out = Self::new();
        for (key, m) in &self.maps {
            match other.maps.get(key) {
                Some(o) => out.add(m.subtract(o)?),
                None => out.add(m.clone()),
            }
        }
        Ok(out)
    }

    pub fn reverse(&self) -> Self {
        let mut out = Self::new();
        for m in self.maps.values() {
            out.add(m.reverse());
        }
        out
    }

    /// Composition: pairs `self: A -> B`, `other: B -> C` whose middle tuples agree.
    pub fn apply_range(&self, other: &UnionMap) -> Self {
        let mut out = Self::new();
        for a in self.maps.values() {
            for b in other.maps.values() {
                if b.space().input == Some(a.space().output) {
                    out.add(a.apply_range(b));
                }
            }
        }
        out
    }

    pub fn intersect_domain(&self, set: &UnionSet) -> Self {
        let mut out = Self::new();
        for m in self.maps.values() {
            let Some(input) = m.space().input else { continue };
            if let Some(s) = set.get(&SpaceKey { input: None, output: input }) {
                out.add(m.intersect_domain(s));
            }
        }
        out
    }

    pub fn intersect_range(&self, set: &UnionSet) -> Self {
        let mut out = Self::new();
        for m in self.maps.values() {
            if let Some(s) = set.get(&SpaceKey { input: None, output: m.space().output }) {
                out.add(m.intersect_range(s));
            }
        }
        out
    }

    pub fn domain(&self) -> UnionSet {
        let mut out = UnionSet::new();
        for m in self.maps.values() {
            out.add(m.domain());
        }
        out
    }

    pub fn range(&self) -> UnionSet {
        let mut out = UnionSet::new();
        for m in self.maps.values() {
            out.add(m.range());
        }
        out
    }

    /// Image of a union set.
    pub fn image(&self, set: &UnionSet) -> UnionSet {
        self.intersect_domain(set).range()
    }

    pub fn is_empty(&self) -> Result<bool, SolverError> {
        for m in self.maps.values() {
            if !m.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_subset(&self, other: &UnionMap) -> Result<bool, SolverError> {
        self.subtract(other)?.is_empty()
    }

    /// Drop relations (and pieces) without integer points.
    pub fn coalesce(&self) -> Result<Self, SolverError> {
        let mut out = Self::new();
        for m in self.maps.values() {
            out.add(m.coalesce()?);
        }
        Ok(out)
    }

    pub fn get(&self, key: &SpaceKey) -> Option<&IntegerMap> {
        self.maps.get(key)
    }

    /// Relations whose input tuple has the given identity.
    pub fn from_tuple(&self, id: TupleId) -> impl Iterator<Item = &IntegerMap> {
        self.maps
            .values()
            .filter(move |m| m.space().input.map(|t| t.id) == Some(id))
    }

    /// Relations whose output tuple has the given identity.
    pub fn to_tuple(&self, id: TupleId) -> impl Iterator<Item = &IntegerMap> {
        self.maps.values().filter(move |m| m.space().output.id == id)
    }

    /// Keep relations accepted by the predicate.
    pub fn filter(&self, keep: impl Fn(&IntegerMap) -> bool) -> Self {
        let mut out = Self::new();
        for m in self.maps.values().filter(|m| keep(m)) {
            out.add(m.clone());
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntegerMap> {
        self.maps.values()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }
}

pub(crate) fn combine_max(a: Optimum, b: Optimum) -> Optimum {
    match (a, b) {
        (Optimum::Unbounded, _) | (_, Optimum::Unbounded) => Optimum::Unbounded,
        (Optimum::Empty, x) | (x, Optimum::Empty) => x,
        (Optimum::Value(x), Optimum::Value(y)) => Optimum::Value(x.max(y)),
    }
}

pub(crate) fn combine_min(a: Optimum, b: Optimum) -> Optimum {
    match (a, b) {
        (Optimum::Unbounded, _) | (_, Optimum::Unbounded) => Optimum::Unbounded,
        (Optimum::Empty, x) | (x, Optimum::Empty) => x,
        (Optimum::Value(x), Optimum::Value(y)) => Optimum::Value(x.min(y)),
    }
}
