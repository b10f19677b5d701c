//! Schedule trees and their flat forms.
//!
//! A schedule tree is a sequence of elements executed one after another.
//! Each element is a band: a relation from the instances of its statements
//! to a common time tuple. An element whose band is unbounded in time is
//! infinite; at most one such element exists and it comes last.
//!
//! The flat form of a tree prefixes every time with the index of its
//! element:
//!
//! ```text
//! flatten = { S[i] -> [e, t_0, ..., t_{w-1}, 0, ...] }
//! tiled   = { S[i] -> [k, e, t_0, ..., t_{w-1}, 0, ...] }
//! ```
//!
//! where `k` is -1 for the prelude and the period index otherwise.

use crate::ir::StmtId;
use crate::polyhedral::{AffineMap, IntegerMap, IntegerSet, Space, Tuple, TupleId, UnionMap, UnionSet};
use crate::utils::errors::PolyResult;
use std::fmt;

/// One element of a schedule sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleElement {
    pub statements: Vec<StmtId>,
    /// Statement instances -> band time
    pub band: UnionMap,
    pub infinite: bool,
}

impl ScheduleElement {
    pub fn new(statements: Vec<StmtId>, band: UnionMap, infinite: bool) -> Self {
        Self { statements, band, infinite }
    }

    /// Number of band time dimensions.
    pub fn width(&self) -> usize {
        self.band.iter().map(|m| m.n_out()).max().unwrap_or(0)
    }

    /// Band relation of one statement.
    pub fn map_of(&self, stmt: StmtId) -> Option<&IntegerMap> {
        self.band.from_tuple(TupleId::Statement(stmt)).next()
    }

    /// Statement instances scheduled by this element.
    pub fn domain(&self) -> UnionSet {
        self.band.domain()
    }

    /// Replace the band relation of a statement.
    pub fn set_map(&mut self, stmt: StmtId, map: IntegerMap) {
        self.band = self.band.filter(|m| m.space().input.map(|t| t.id) != Some(TupleId::Statement(stmt)));
        self.band.add(map);
        if !self.statements.contains(&stmt) {
            self.statements.push(stmt);
        }
    }

    /// Drop a statement from the element.
    pub fn remove(&mut self, stmt: StmtId) {
        self.band = self.band.filter(|m| m.space().input.map(|t| t.id) != Some(TupleId::Statement(stmt)));
        self.statements.retain(|&s| s != stmt);
    }

    pub fn is_empty(&self) -> PolyResult<bool> {
        Ok(self.band.is_empty()?)
    }
}

/// A sequence of schedule elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTree {
    pub elements: Vec<ScheduleElement>,
}

impl ScheduleTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, element: ScheduleElement) {
        self.elements.push(element);
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Widest band of the tree.
    pub fn max_width(&self) -> usize {
        self.elements.iter().map(ScheduleElement::width).max().unwrap_or(0)
    }

    /// Every scheduled statement, in element order.
    pub fn statements(&self) -> Vec<StmtId> {
        self.elements.iter().flat_map(|e| e.statements.iter().copied()).collect()
    }

    /// The element scheduling a statement, with its index.
    pub fn element_of(&self, stmt: StmtId) -> Option<(usize, &ScheduleElement)> {
        self.elements
            .iter()
            .enumerate()
            .find(|(_, e)| e.statements.contains(&stmt))
    }

    pub fn element_of_mut(&mut self, stmt: StmtId) -> Option<&mut ScheduleElement> {
        self.elements.iter_mut().find(|e| e.statements.contains(&stmt))
    }

    /// Union of all scheduled instances.
    pub fn domain(&self) -> UnionSet {
        self.elements
            .iter()
            .fold(UnionSet::new(), |acc, e| acc.union(&e.domain()))
    }

    /// Flat schedule over `[e, band..., padding]` with the tree's own width.
    pub fn flatten(&self) -> UnionMap {
        self.flatten_with(&[], self.max_width())
    }

    /// Flat schedule with fixed leading coordinates and band width `width`.
    pub fn flatten_with(&self, prefix: &[i64], width: usize) -> UnionMap {
        let out = Tuple::time(prefix.len() + 1 + width);
        let mut flat = UnionMap::new();
        for (index, element) in self.elements.iter().enumerate() {
            for map in element.band.iter() {
                let w = map.n_out();
                let mut rows: Vec<Vec<i64>> = prefix
                    .iter()
                    .map(|&c| constant_row(w, c))
                    .collect();
                rows.push(constant_row(w, index as i64));
                for j in 0..width {
                    let mut row = vec![0; w + 1];
                    if j < w {
                        row[j] = 1;
                    }
                    rows.push(row);
                }
                let embed = AffineMap::from_rows(map.space().output, out, &rows).to_map();
                flat.add(map.apply_range(&embed));
            }
        }
        flat
    }
}

fn constant_row(n: usize, value: i64) -> Vec<i64> {
    let mut row = vec![0; n + 1];
    row[n] = value;
    row
}

impl fmt::Display for ScheduleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.elements.iter().enumerate() {
            let names: Vec<String> = e.statements.iter().map(|s| s.to_string()).collect();
            writeln!(
                f,
                "element {}{}: [{}] width {}",
                i,
                if e.infinite { " (infinite)" } else { "" },
                names.join(", "),
                e.width()
            )?;
        }
        Ok(())
    }
}

/// Location of the periodic part of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// Band time dimension that grows without bound
    pub dim: usize,
    /// First band time of the steady state
    pub offset: i64,
    /// Band time covered by one period
    pub size: i64,
}

/// The schedule of a compilation in all its forms.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub full: ScheduleTree,
    pub prelude: ScheduleTree,
    /// One period, in period-local time
    pub period: ScheduleTree,
    /// `[k, e, band...]` with `k = -1` in the prelude
    pub tiled: UnionMap,
    pub tiling: Option<Tiling>,
    /// Constraints on the parameters introduced by statement splitting
    pub params: IntegerSet,
}

impl Schedule {
    /// A schedule without steady state: everything runs once.
    pub fn finite(full: ScheduleTree) -> Self {
        let tiled = full.flatten_with(&[-1], full.max_width());
        Self {
            prelude: full.clone(),
            period: ScheduleTree::new(),
            full,
            tiled,
            tiling: None,
            params: IntegerSet::universe(Space::params_only(Vec::new())),
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.tiling.is_some()
    }
}
