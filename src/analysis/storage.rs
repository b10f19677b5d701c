//! Storage allocation: buffer sizes from the conflicts of array elements.
//!
//! Two elements of an array conflict when both are live at once: each is
//! written no later than the other is read. Elements that never conflict
//! may share a buffer slot, so an array only needs as many slots per
//! dimension as the conflict distances require. Slots are addressed modulo
//! the buffer size.

use crate::analysis::ModelSummary;
use crate::ir::{Array, ArrayId, Model};
use crate::polyhedral::{Constraint, IntegerMap, Optimum, Space, SpaceKey, Tuple, TupleId, UnionMap, UnionSet};
use crate::transform::schedule::Schedule;
use crate::utils::errors::{Outcome, PolyResult, StorageError};
use log::{debug, info, trace};

/// Strategy turning a conflict relation into buffer sizes.
pub trait BufferSizing {
    fn name(&self) -> &str;

    /// Sizes per dimension such that no two conflicting elements share a
    /// slot. `conflicts` is symmetric and non-empty.
    fn buffer_size(&self, array: &Array, conflicts: &IntegerMap) -> PolyResult<Vec<i64>>;
}

/// Maximal distance `out[dim] - in[dim]` over a conflict relation.
fn max_distance(array: &Array, conflicts: &IntegerMap, dim: usize) -> PolyResult<Option<i64>> {
    match conflicts.max_with(|p| p.out_expr(dim) - p.in_expr(dim))? {
        Optimum::Value(v) => Ok(Some(v)),
        Optimum::Empty => Ok(None),
        Optimum::Unbounded => Err(StorageError::infinite_distance(&array.name, dim).into()),
    }
}

fn pin_equal(conflicts: &IntegerMap, dims: impl Iterator<Item = usize> + Clone) -> IntegerMap {
    conflicts.map_pieces(|piece| {
        let mut p = piece.clone();
        for j in dims.clone() {
            p.add_constraint(Constraint::eq(p.out_expr(j), p.in_expr(j)));
        }
        p
    })
}

/// Dimension by dimension: one slot per distance, then pin the dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassicSizing;

impl BufferSizing for ClassicSizing {
    fn name(&self) -> &str {
        "classic"
    }

    fn buffer_size(&self, array: &Array, conflicts: &IntegerMap) -> PolyResult<Vec<i64>> {
        let n = array.dims();
        let mut sizes = vec![1; n];
        for d in 0..n {
            let pinned = pin_equal(conflicts, 0..d);
            match max_distance(array, &pinned, d)? {
                Some(v) => sizes[d] = (v + 1).max(1),
                None => break,
            }
        }
        Ok(sizes)
    }
}

/// Lower bounds from conflicts along a single dimension, then grow sizes
/// until no conflicting pair aliases.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefinedSizing;

impl RefinedSizing {
    /// Conflicts that first differ at `d0` and still share a slot: the
    /// distance at `d0` is a positive multiple of its size and deeper
    /// distances are multiples of theirs.
    fn aliasing(conflicts: &IntegerMap, sizes: &[i64], d0: usize) -> IntegerMap {
        conflicts.map_pieces(|piece| {
            let mut p = piece.clone();
            let locals: Vec<usize> = (d0..sizes.len()).map(|_| p.add_local()).collect();
            for j in 0..d0 {
                p.add_constraint(Constraint::eq(p.out_expr(j), p.in_expr(j)));
            }
            for (&col, j) in locals.iter().zip(d0..) {
                let wraps = p.col_expr(col).scale(sizes[j]);
                p.add_constraint(Constraint::eq(p.out_expr(j) - p.in_expr(j), wraps));
            }
            let mut positive = p.col_expr(locals[0]);
            positive.constant = -1;
            p.with_constraint(Constraint::ge_zero(positive))
        })
    }
}

impl BufferSizing for RefinedSizing {
    fn name(&self) -> &str {
        "refined"
    }

    fn buffer_size(&self, array: &Array, conflicts: &IntegerMap) -> PolyResult<Vec<i64>> {
        let n = array.dims();
        let mut sizes = vec![1; n];
        for d in 0..n {
            let along = pin_equal(conflicts, (0..n).filter(move |&j| j != d));
            if let Some(v) = max_distance(array, &along, d)? {
                sizes[d] = (v + 1).max(1);
            }
        }
        trace!("{}: lower bounds {:?}", array.name, sizes);

        loop {
            let mut grown = false;
            for d0 in 0..n {
                let clash = Self::aliasing(conflicts, &sizes, d0);
                if let Some(v) = max_distance(array, &clash, d0)? {
                    trace!("{}: dimension {} aliases at distance {}", array.name, d0, v);
                    sizes[d0] = v + 1;
                    grown = true;
                }
            }
            if !grown {
                return Ok(sizes);
            }
        }
    }
}

/// All relations of `relations` ending in the array, reversed and mapped
/// through `schedule`: `array -> time`.
fn access_times(relations: &UnionMap, array: ArrayId, schedule: &UnionMap) -> Option<IntegerMap> {
    let mut accesses = UnionMap::new();
    for map in relations.to_tuple(TupleId::Array(array)) {
        accesses.add(map.clone());
    }
    accesses
        .reverse()
        .apply_range(schedule)
        .iter()
        .fold(None, |acc: Option<IntegerMap>, m| match acc {
            Some(a) => Some(a.union(m)),
            None => Some(m.clone()),
        })
}

/// Pairs of elements live at the same time.
pub fn conflicts(model: &Model, summary: &ModelSummary, schedule: &Schedule, array: ArrayId) -> PolyResult<Outcome<IntegerMap>> {
    let name = &model.array(array).name;
    let writes = access_times(&summary.write_relations, array, &schedule.tiled);
    let reads = access_times(&summary.read_relations, array, &schedule.tiled);
    let (writes, reads) = match (writes, reads) {
        (None, Some(_)) => return Err(StorageError::readers_without_writers(name).into()),
        (None, None) => return Ok(Outcome::NotApplicable(format!("array {} is never accessed", name))),
        (Some(_), None) => return Ok(Outcome::NotApplicable(format!("array {} is never read", name))),
        (Some(w), Some(r)) => (w, r),
    };

    let time = Tuple::time(writes.n_out());
    let tuple = model.array(array).tuple();
    let read_back = reads.reverse();
    let mut live = IntegerMap::empty(Space::map(tuple, tuple));
    for piece in IntegerMap::lex_le_pieces(time) {
        let order = IntegerMap::from_polyhedron(piece);
        let before = writes.apply_range(&order).apply_range(&read_back).coalesce()?;
        live = live.union(&before);
    }
    let mut conflicts = live.intersect(&live.reverse());

    if let Some(parallel) = model.parallel_accesses.get(&SpaceKey { input: Some(tuple), output: tuple }) {
        conflicts = conflicts.union(parallel).union(&parallel.reverse());
    }
    let conflicts = conflicts.coalesce()?;
    if conflicts.is_empty()? {
        return Ok(Outcome::NotApplicable(format!("array {} has no conflicts", name)));
    }
    Ok(Outcome::Applied(conflicts))
}

/// Size the buffers of every array and record whether a period reads
/// values written before it.
pub fn allocate(
    model: &mut Model,
    summary: &ModelSummary,
    schedule: &Schedule,
    sizing: &dyn BufferSizing,
) -> PolyResult<Vec<(ArrayId, Outcome<Vec<i64>>)>> {
    let ids: Vec<ArrayId> = model.arrays.iter().map(|a| a.id).collect();
    let mut report = Vec::with_capacity(ids.len());
    for id in ids {
        let outcome = match conflicts(model, summary, schedule, id)? {
            Outcome::Applied(conflicts) => {
                let sizes = sizing.buffer_size(model.array(id), &conflicts)?;
                Outcome::Applied(sizes)
            }
            Outcome::NotApplicable(reason) => {
                debug!("{}", reason);
                Outcome::NotApplicable(reason)
            }
        };
        let array = model.array_mut(id);
        array.buffer_size = match &outcome {
            Outcome::Applied(sizes) => sizes.clone(),
            Outcome::NotApplicable(_) => vec![1; array.dims()],
        };
        info!("{} buffer of {}: {:?}", sizing.name(), array.name, array.buffer_size);
        report.push((id, outcome));
    }

    let flags = inter_period_dependencies(model, summary, schedule)?;
    for (id, flag) in flags {
        model.array_mut(id).inter_period_dependency = flag;
    }
    Ok(report)
}

/// Per array, whether some element read in the period is not written in it.
fn inter_period_dependencies(model: &Model, summary: &ModelSummary, schedule: &Schedule) -> PolyResult<Vec<(ArrayId, bool)>> {
    let mut flags = Vec::new();
    if !schedule.is_periodic() {
        return Ok(flags);
    }
    let period: UnionSet = schedule.period.domain();
    let read = summary.read_relations.intersect_domain(&period).range();
    let written = summary.write_relations.intersect_domain(&period).range();
    for array in &model.arrays {
        let Some(r) = read.get_tuple(TupleId::Array(array.id)) else { continue };
        let carried = match written.get_tuple(TupleId::Array(array.id)) {
            Some(w) => !r.is_subset(w)?,
            None => !r.is_empty()?,
        };
        if carried {
            debug!("array {} carries values across periods", array.name);
        }
        flags.push((array.id, carried));
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;
    use crate::transform::{periodic, scheduler::AffineScheduler, scheduler::SchedulingPrimitive};

    fn conflicts_from_pairs(array: &Array, pairs: &[(Vec<i64>, Vec<i64>)]) -> IntegerMap {
        let tuple = array.tuple();
        let mut map = IntegerMap::empty(Space::map(tuple, tuple));
        for (x, y) in pairs {
            let point: Vec<i64> = x.iter().chain(y).copied().collect();
            let one = IntegerMap::universe(Space::map(tuple, tuple)).map_pieces(|p| p.fix(&point));
            map = map.union(&one).union(&one.reverse());
        }
        map
    }

    fn plain_array(dims: usize) -> Array {
        let mut b = ModelBuilder::new();
        let bounds = vec![(0, Some(9)); dims];
        let a = b.array("buf", &bounds).unwrap();
        b.build().unwrap().array(a).clone()
    }

    fn run(model: &mut Model, sizing: &dyn BufferSizing) -> Vec<(ArrayId, Outcome<Vec<i64>>)> {
        let summary = ModelSummary::new(model).unwrap();
        let tree = AffineScheduler::new().schedule(model, &summary).unwrap();
        let schedule = periodic::decompose(model, &summary, tree).unwrap();
        allocate(model, &summary, &schedule, sizing).unwrap()
    }

    #[test]
    fn test_classic_pins_outer_dimension() {
        let array = plain_array(2);
        let conflicts = conflicts_from_pairs(&array, &[(vec![0, 0], vec![2, 5]), (vec![0, 0], vec![0, 1])]);
        assert_eq!(ClassicSizing.buffer_size(&array, &conflicts).unwrap(), vec![3, 2]);
    }

    #[test]
    fn test_refined_is_tighter() {
        let array = plain_array(2);
        let conflicts = conflicts_from_pairs(&array, &[(vec![0, 0], vec![2, 5]), (vec![0, 0], vec![0, 1])]);
        let sizes = RefinedSizing.buffer_size(&array, &conflicts).unwrap();
        assert_eq!(sizes, vec![1, 2]);
        // no conflicting pair shares a slot
        for (x, y) in [([0i64, 0i64], [2i64, 5i64]), ([0, 0], [0, 1])] {
            let same = (0..2).all(|d| (y[d] - x[d]).rem_euclid(sizes[d]) == 0);
            assert!(!same);
        }
    }

    #[test]
    fn test_unbounded_conflict_distance() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let model = b.build().unwrap();
        let array = model.array(x);
        let tuple = array.tuple();
        // every pair of non-negative indices
        let conflicts = IntegerMap::universe(Space::map(tuple, tuple)).map_pieces(|p| {
            let mut p = p.clone();
            let (mut lo_in, mut lo_out) = (p.in_expr(0), p.out_expr(0));
            lo_in.constant = 0;
            lo_out.constant = 0;
            p.add_constraint(Constraint::ge_zero(lo_in));
            p.add_constraint(Constraint::ge_zero(lo_out));
            p
        });
        let err = ClassicSizing.buffer_size(array, &conflicts).unwrap_err();
        assert!(err.to_string().contains("Infinite storage conflict distance"));
    }

    #[test]
    fn test_single_finite_statement() {
        let mut b = ModelBuilder::new();
        let a = b.array("a", &[(0, Some(9))]).unwrap();
        let s = b.statement("s", &[(0, Some(9))]).unwrap();
        b.write(s, a, &[vec![1, 0]]).unwrap();
        let mut model = b.build().unwrap();
        let report = run(&mut model, &RefinedSizing);
        assert!(!report[0].1.is_applied());
        assert_eq!(model.array(a).buffer_size, vec![1]);
    }

    #[test]
    fn test_readers_without_writers() {
        let mut b = ModelBuilder::new();
        let a = b.array("a", &[(0, Some(9))]).unwrap();
        let s = b.statement("s", &[(0, Some(9))]).unwrap();
        b.read(s, a, &[vec![1, 0]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let tree = AffineScheduler::new().schedule(&model, &summary).unwrap();
        let schedule = periodic::decompose(&mut model, &summary, tree).unwrap();
        let err = allocate(&mut model, &summary, &schedule, &RefinedSizing).unwrap_err();
        assert!(err.to_string().contains("Array a has readers but no writers."));
    }

    #[test]
    fn test_sliding_window() {
        let mut b = ModelBuilder::new();
        let w = b.array("w", &[(0, None)]).unwrap();
        let p = b.statement("W", &[(0, None)]).unwrap();
        let r = b.statement("R", &[(1, None)]).unwrap();
        b.write(p, w, &[vec![1, 0]]).unwrap();
        b.read(r, w, &[vec![1, 0]]).unwrap();
        b.read(r, w, &[vec![1, -1]]).unwrap();
        let mut model = b.build().unwrap();
        run(&mut model, &RefinedSizing);
        assert!(model.array(w).buffer_size[0] >= 2);
        assert!(model.array(w).inter_period_dependency);
    }
}
