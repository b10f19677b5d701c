//! Modulo avoidance.
//!
//! A buffer of `B` slots holding an infinite array is addressed modulo
//! `B`. When the indices one period statement touches stay within one
//! window of `B` consecutive slots, the statement can be split into clones,
//! each covering one aligned block of the window, and every clone addresses
//! the buffer with a constant correction instead of a modulo. The phase of
//! the window in the current period is the `<array>_offset` parameter.

use crate::ir::{ArrayId, Model, StmtId};
use crate::polyhedral::{Constraint, IntegerSet, Optimum, Polyhedron, Space, Tuple};
use crate::transform::schedule::Schedule;
use crate::utils::errors::{Outcome, PolyResult};
use crate::utils::intern::Symbol;
use crate::utils::matrix::floor_div;
use log::{debug, info, warn};

/// Index range of one array accessed in a period.
#[derive(Debug, Clone, Copy)]
struct Window {
    array: ArrayId,
    buffer: i64,
    /// Advance of the index per period
    period: i64,
    base: i64,
}

impl Window {
    /// Worst shift of the window against buffer alignment over all periods.
    fn max_offset(&self) -> i64 {
        let inc = self.period.rem_euclid(self.buffer);
        if inc == 0 {
            0
        } else if self.buffer % inc == 0 {
            (self.buffer / inc - 1) * inc
        } else {
            self.buffer - 1
        }
    }
}

/// Accessed range in dimension 0, as `(min, max)`.
fn index_range(set: &IntegerSet) -> PolyResult<Option<(i64, i64)>> {
    match (set.min_dim(0)?, set.max_dim(0)?) {
        (Optimum::Value(lo), Optimum::Value(hi)) => Ok(Some((lo, hi))),
        _ => Ok(None),
    }
}

fn accessed(model: &Model, stmt: StmtId, array: ArrayId, domain: &IntegerSet) -> IntegerSet {
    let tuple = model.array(array).tuple();
    let mut out = IntegerSet::empty(Space::set(tuple));
    for access in model.statement(stmt).accesses.iter().filter(|a| a.array == array) {
        out = out.union(&access.relation.image(domain));
    }
    out
}

/// A domain with a single instance.
fn is_single_point(domain: &IntegerSet) -> PolyResult<bool> {
    for d in 0..domain.dim() {
        match (domain.min_dim(d)?, domain.max_dim(d)?) {
            (Optimum::Value(lo), Optimum::Value(hi)) if lo == hi => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Flag period statements that need modulo addressing and, when `split`
/// is set, replace them in the period by clones that do not.
pub fn avoid_modulo(model: &mut Model, schedule: &mut Schedule, split: bool) -> PolyResult<Outcome<Vec<StmtId>>> {
    if !schedule.is_periodic() {
        return Ok(Outcome::NotApplicable("schedule has no period".to_string()));
    }
    let Some(element) = schedule.period.elements.first() else {
        return Ok(Outcome::NotApplicable("period is empty".to_string()));
    };
    let element_width = element.width();
    let period_statements: Vec<(StmtId, IntegerSet)> = element
        .statements
        .iter()
        .filter_map(|&s| element.map_of(s).map(|m| (s, m.domain())))
        .collect();

    let mut windows = Vec::new();
    for array in model.arrays.iter().filter(|a| a.is_infinite) {
        let buffer = array.buffer_size.first().copied().unwrap_or(1);
        if buffer < 2 {
            continue;
        }
        let mut all = IntegerSet::empty(Space::set(array.tuple()));
        for (stmt, domain) in &period_statements {
            all = all.union(&accessed(model, *stmt, array.id, domain));
        }
        let Some((lo, hi)) = index_range(&all)? else { continue };
        windows.push((
            Window { array: array.id, buffer, period: array.period, base: floor_div(lo, buffer) * buffer },
            lo,
            hi,
        ));
    }
    for (w, lo, hi) in &windows {
        let array = model.array_mut(w.array);
        array.period_offset = w.base;
        array.first_period_access = *lo;
        array.last_period_access = *hi;
        debug!("{}: period accesses [{}, {}], base {}", array.name, lo, hi, w.base);
    }

    let mut touched = Vec::new();
    let mut clones = Vec::new();
    for (stmt, domain) in &period_statements {
        let s = model.statement(*stmt);
        if !s.is_infinite || s.clone_of.is_some() {
            continue;
        }
        let mut needs = Vec::new();
        for (w, _, _) in &windows {
            let Some((lo, hi)) = index_range(&accessed(model, *stmt, w.array, domain))? else { continue };
            let (lo, hi) = (lo - w.base, hi - w.base);
            if w.max_offset() + hi >= w.buffer {
                needs.push((*w, lo, hi));
            }
        }
        if needs.is_empty() {
            continue;
        }
        model.statement_mut(*stmt).streaming_needs_modulo = true;
        touched.push(*stmt);

        let [(window, lo, hi)] = needs.as_slice() else {
            warn!("{} needs modulo addressing for {} arrays; not split", model.statement(*stmt).name, needs.len());
            continue;
        };
        if !split || is_single_point(domain)? {
            continue;
        }
        let made = split_statement(model, schedule, *stmt, domain, *window, *lo, *hi, element_width)?;
        clones.extend(made);
    }

    if touched.is_empty() {
        return Ok(Outcome::NotApplicable("no statement needs modulo addressing".to_string()));
    }
    info!("modulo avoidance: {} statements flagged, {} clones", touched.len(), clones.len());
    Ok(Outcome::Applied(clones))
}

/// Replace `stmt` in the period by one clone per aligned block.
#[allow(clippy::too_many_arguments)]
fn split_statement(
    model: &mut Model,
    schedule: &mut Schedule,
    stmt: StmtId,
    domain: &IntegerSet,
    window: Window,
    lo: i64,
    hi: i64,
    width: usize,
) -> PolyResult<Vec<StmtId>> {
    let s = model.statement(stmt);
    let Some(access) = s
        .writes()
        .find(|a| a.array == window.array)
        .or_else(|| s.reads().find(|a| a.array == window.array))
        .map(|a| a.relation.clone())
    else {
        return Ok(Vec::new());
    };
    let name = s.name.clone();
    let array_name = model.array(window.array).name.clone();
    let b = window.buffer;
    let count = floor_div(hi + window.max_offset(), b) - floor_div(lo, b) + 1;

    let phase = model.context.param(&format!("{}_offset", array_name));
    model.phase_ids.insert(phase, window.array);
    let mut range = Polyhedron::universe(Space::params_only(vec![phase]));
    range.add_constraint(Constraint::ge_zero(range.param_expr(0)));
    let mut upper = -range.param_expr(0);
    upper.constant = b - 1;
    range.add_constraint(Constraint::ge_zero(upper));
    schedule.params = schedule.params.intersect(&IntegerSet::from_polyhedron(range));

    let Some(sigma) = schedule
        .period
        .elements
        .first()
        .and_then(|e| e.map_of(stmt))
        .cloned()
    else {
        return Ok(Vec::new());
    };

    let array_tuple = model.array(window.array).tuple();
    let mut made = Vec::new();
    for k in 0..count {
        let lb = floor_div(lo, b) * b + k * b;
        let block = phase_block(array_tuple, phase, window.base, lb, b);
        let part = domain.intersect(&access.intersect_range(&block).domain()).coalesce()?;
        if part.is_empty()? {
            continue;
        }
        let clone = model.clone_statement(stmt, format!("{}_p{}", name, k), part.clone());
        model.statement_mut(clone).array_access_offset.insert(window.array, -lb);
        let tuple = model.statement(clone).tuple();
        let map = sigma.intersect_domain(&part).with_tuples(tuple, Tuple::time(width));
        if let Some(element) = schedule.period.elements.first_mut() {
            element.set_map(clone, map);
        }
        debug!("{}: clone {} covers [{}, {})", name, model.statement(clone).name, lb, lb + b);
        made.push(clone);
    }

    if !made.is_empty() {
        if let Some(element) = schedule.period.elements.first_mut() {
            element.remove(stmt);
        }
        model.statement_mut(stmt).streaming_needs_modulo = false;
    }
    Ok(made)
}

/// `{ A[a] : lb <= a[0] - base + phase < lb + size, 0 <= phase < size }`
fn phase_block(tuple: Tuple, phase: Symbol, base: i64, lb: i64, size: i64) -> IntegerSet {
    let mut p = Polyhedron::universe(Space::set(tuple).with_params(vec![phase]));
    let shifted = p.col_expr(0) + p.param_expr(0);
    let mut above = shifted.clone();
    above.constant = -(base + lb);
    let mut below = -shifted;
    below.constant = base + lb + size - 1;
    p.add_constraint(Constraint::ge_zero(above));
    p.add_constraint(Constraint::ge_zero(below));
    p.add_constraint(Constraint::ge_zero(p.param_expr(0)));
    let mut cap = -p.param_expr(0);
    cap.constant = size - 1;
    p.add_constraint(Constraint::ge_zero(cap));
    IntegerSet::from_polyhedron(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModelSummary;
    use crate::ir::ModelBuilder;
    use crate::transform::periodic;
    use crate::transform::scheduler::{AffineScheduler, SchedulingPrimitive};

    /// `s[i, j]` for `i >= 0, 0 <= j < 6` writes `x[6i + j + 2]`.
    fn blocked_writer() -> (Model, Schedule) {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let s = b.statement("s", &[(0, None), (0, Some(5))]).unwrap();
        b.write(s, x, &[vec![6, 1, 2]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let tree = AffineScheduler::new().schedule(&model, &summary).unwrap();
        let schedule = periodic::decompose(&mut model, &summary, tree).unwrap();
        model.array_mut(x).buffer_size = vec![4];
        (model, schedule)
    }

    #[test]
    fn test_max_offset() {
        let w = |period| Window { array: ArrayId(0), buffer: 4, period, base: 0 };
        assert_eq!(w(8).max_offset(), 0);
        assert_eq!(w(6).max_offset(), 2);
        assert_eq!(w(3).max_offset(), 3);
        assert_eq!(w(1).max_offset(), 3);
    }

    #[test]
    fn test_split_into_blocks() {
        let (mut model, mut schedule) = blocked_writer();
        let clones = avoid_modulo(&mut model, &mut schedule, true).unwrap().applied().unwrap();
        assert_eq!(clones.len(), 2);
        assert_eq!(model.statement(clones[0]).name, "s_p0");
        assert_eq!(model.statement(clones[1]).name, "s_p1");
        assert_eq!(model.statement(clones[1]).array_access_offset[&ArrayId(0)], -4);

        let array = model.array(ArrayId(0));
        assert_eq!(array.period, 6);
        assert_eq!(array.period_offset % 4, 0);
        assert_eq!(array.last_period_access - array.first_period_access, 5);

        let phase = model.context.lookup("x_offset").unwrap();
        assert_eq!(model.phase_ids.get(&phase), Some(&ArrayId(0)));
        assert!(schedule.params.contains(&[3]).unwrap());
        assert!(!schedule.params.contains(&[4]).unwrap());

        let period = &schedule.period.elements[0];
        assert!(!period.statements.contains(&StmtId(0)));
        assert!(!model.statement(StmtId(0)).streaming_needs_modulo);
    }

    #[test]
    fn test_clones_partition_the_period() {
        let (mut model, mut schedule) = blocked_writer();
        let original = schedule.period.elements[0].map_of(StmtId(0)).unwrap().domain();
        let clones = avoid_modulo(&mut model, &mut schedule, true).unwrap().applied().unwrap();
        // For each reachable phase, every instance lands in exactly one clone.
        for phase in [0, 2] {
            for point in original.points().unwrap() {
                let mut full = point.clone();
                full.push(phase);
                let owners = clones
                    .iter()
                    .filter(|&&c| model.statement(c).domain.contains(&full).unwrap())
                    .count();
                assert_eq!(owners, 1, "instance {:?} at phase {}", point, phase);
            }
        }
    }

    #[test]
    fn test_split_reader_partitions_its_period() {
        // w[i, j] writes x[6i + j], r[i, j] reads x[6i + j + 2].
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let w = b.statement("w", &[(0, None), (0, Some(5))]).unwrap();
        let r = b.statement("r", &[(0, None), (0, Some(5))]).unwrap();
        b.write(w, x, &[vec![6, 1, 0]]).unwrap();
        b.read(r, x, &[vec![6, 1, 2]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let tree = AffineScheduler::new().schedule(&model, &summary).unwrap();
        let mut schedule = periodic::decompose(&mut model, &summary, tree).unwrap();
        model.array_mut(x).buffer_size = vec![4];
        let original = schedule.period.elements[0].map_of(r).unwrap().domain();

        avoid_modulo(&mut model, &mut schedule, true).unwrap().applied().unwrap();
        let reader_clones: Vec<StmtId> = model
            .statements
            .iter()
            .filter(|s| s.clone_of == Some(r))
            .map(|s| s.id)
            .collect();
        assert!(reader_clones.len() >= 2);
        for &c in &reader_clones {
            let clone = model.statement(c);
            assert!(clone.name.starts_with("r_p"));
            assert_eq!(clone.writes().count(), 0);
            assert_eq!(clone.reads().count(), 1);
            assert_eq!(clone.array_access_offset[&x] % 4, 0);
        }
        assert!(!schedule.period.elements[0].statements.contains(&r));

        for phase in [0, 2] {
            for point in original.points().unwrap() {
                let mut full = point.clone();
                full.push(phase);
                let owners = reader_clones
                    .iter()
                    .filter(|&&c| model.statement(c).domain.contains(&full).unwrap())
                    .count();
                assert_eq!(owners, 1, "instance {:?} at phase {}", point, phase);
            }
        }
    }

    #[test]
    fn test_flag_without_split() {
        let (mut model, mut schedule) = blocked_writer();
        let outcome = avoid_modulo(&mut model, &mut schedule, false).unwrap();
        assert_eq!(outcome, Outcome::Applied(Vec::new()));
        assert!(model.statement(StmtId(0)).streaming_needs_modulo);
        assert_eq!(model.statements.len(), 1);
    }

    #[test]
    fn test_small_buffer_not_applicable() {
        let (mut model, mut schedule) = blocked_writer();
        model.array_mut(ArrayId(0)).buffer_size = vec![1];
        assert!(!avoid_modulo(&mut model, &mut schedule, true).unwrap().is_applied());
    }
}
