//! Periodic decomposition of a schedule tree.
//!
//! The infinite band of a stream schedule eventually repeats itself: past
//! some offset, every `size` steps of the tiling dimension execute the same
//! statement instances shifted by one ray of their access relations. This
//! module finds those rays, derives the tiling and splits the schedule into
//! a finite prelude, one period in period-local time and the tiled form
//! that numbers the periods.

use crate::analysis::dependence::check_validity;
use crate::analysis::ModelSummary;
use crate::ir::{ArrayId, Model, StmtId};
use crate::polyhedral::{
    Constraint, IntegerMap, IntegerSet, Optimum, Polyhedron, RayShape, Space, Tuple, TupleId,
    UnionMap,
};
use crate::transform::schedule::{Schedule, ScheduleElement, ScheduleTree, Tiling};
use crate::utils::errors::{PolyResult, ScheduleError, ScheduleErrorKind};
use log::{debug, info, trace};
use num_integer::Integer;
use std::collections::BTreeMap;

/// The (instance, time, index) graph of one access in the infinite band.
#[derive(Debug, Clone)]
struct AccessGraph {
    stmt: StmtId,
    array: Option<ArrayId>,
    /// Wrapped `[i, t, a]`
    graph: IntegerSet,
    /// Columns of `[t, a]` in `graph`
    first_time_col: usize,
    width: usize,
}

impl AccessGraph {
    fn ray_cols(&self) -> Vec<usize> {
        let n_index = self.graph.dim() - self.first_time_col - self.width;
        (self.first_time_col..self.first_time_col + self.width + n_index).collect()
    }

    fn describe(&self, model: &Model) -> String {
        let stmt = &model.statement(self.stmt).name;
        match self.array {
            Some(a) => format!("access of {} to {}", stmt, model.array(a).name),
            None => format!("schedule of {}", stmt),
        }
    }
}

/// Split a schedule tree into prelude, period and tiled schedules, and
/// record the per-period index advance of every array.
pub fn decompose(model: &mut Model, summary: &ModelSummary, full: ScheduleTree) -> PolyResult<Schedule> {
    let infinite: Vec<usize> = full
        .elements
        .iter()
        .enumerate()
        .filter(|(_, e)| e.infinite)
        .map(|(i, _)| i)
        .collect();
    let band_index = match infinite.as_slice() {
        [] => {
            debug!("no infinite schedule element; schedule is finite");
            return Ok(Schedule::finite(full));
        }
        [i] if *i + 1 == full.elements.len() => *i,
        _ => {
            return Err(ScheduleError::new(
                ScheduleErrorKind::UnsupportedStructure,
                "Only one infinite schedule element is supported and it must come last.",
            )
            .into());
        }
    };
    let band = &full.elements[band_index];
    let width = band.width();

    let graphs = access_graphs(model, band, width);
    let mut rays = Vec::with_capacity(graphs.len());
    for g in &graphs {
        match g.graph.recession(&g.ray_cols())? {
            RayShape::Multiple => return Err(ScheduleError::multiple_rays(g.describe(model)).into()),
            RayShape::Bounded => rays.push(None),
            RayShape::Ray { direction, .. } => {
                trace!("ray of {}: {:?}", g.describe(model), direction);
                rays.push(Some(direction));
            }
        }
    }

    // Tiling dimension and size.
    let mut dim = None;
    let mut size = 1i64;
    for ray in rays.iter().flatten() {
        let time = &ray[..width];
        let Some(d) = time.iter().position(|&v| v != 0) else {
            return Err(ScheduleError::inconsistent_directions().into());
        };
        if dim.is_some_and(|seen| seen != d) {
            return Err(ScheduleError::inconsistent_directions().into());
        }
        dim = Some(d);
        size = size.lcm(&time[d].abs());
    }
    let Some(dim) = dim else {
        debug!("infinite element has no unbounded access; schedule is finite");
        return Ok(Schedule::finite(full));
    };

    // Index advance per array and period.
    let mut advances: BTreeMap<ArrayId, Vec<i64>> = BTreeMap::new();
    for (g, ray) in graphs.iter().zip(&rays) {
        let (Some(array), Some(ray)) = (g.array, ray) else { continue };
        let scale = size / ray[dim].abs();
        let advance: Vec<i64> = ray[width..].iter().map(|v| v * scale).collect();
        match advances.get(&array) {
            Some(seen) if *seen != advance => {
                return Err(ScheduleError::inconsistent_offsets(&model.array(array).name).into());
            }
            Some(_) => {}
            None => {
                advances.insert(array, advance);
            }
        }
    }
    for (array, advance) in &advances {
        let period = advance.first().copied().unwrap_or(0);
        debug!("array {} advances by {:?} per period", model.array(*array).name, advance);
        model.array_mut(*array).period = period;
    }

    let mut offset = 0i64;
    for g in &graphs {
        let onset = onset_of(model, g, dim)?;
        trace!("onset of {}: {}", g.describe(model), onset);
        offset = offset.max(onset);
    }
    let tiling = Tiling { dim, offset, size };
    info!("tiling: dimension {}, offset {}, size {}", dim, offset, size);

    let mut prelude = ScheduleTree::new();
    for element in &full.elements[..band_index] {
        prelude.push(element.clone());
    }
    let head = restrict_band(band, dim, None, Some(offset - 1), 0)?;
    if !head.statements.is_empty() {
        prelude.push(head);
    }
    let mut period = ScheduleTree::new();
    let mut steady = restrict_band(band, dim, Some(offset), Some(offset + size - 1), -offset)?;
    steady.infinite = false;
    period.push(steady);

    let max_width = full.max_width();
    let mut tiled = prelude.flatten_with(&[-1], max_width);
    let embed = period_embedding(width, max_width, band_index, tiling);
    for map in band.band.iter() {
        tiled.add(map.apply_range(&embed));
    }

    check_validity(model, &summary.dependencies, &prelude.flatten())?;
    check_validity(model, &summary.dependencies, &period.flatten())?;

    Ok(Schedule {
        full,
        prelude,
        period,
        tiled,
        tiling: Some(tiling),
        params: IntegerSet::universe(Space::params_only(Vec::new())),
    })
}

/// The access graphs of every statement in the band, plus the bare
/// schedule graph of its infinite statements.
fn access_graphs(model: &Model, band: &ScheduleElement, width: usize) -> Vec<AccessGraph> {
    let mut graphs = Vec::new();
    for &stmt in &band.statements {
        let Some(sigma) = band.map_of(stmt) else { continue };
        let s = model.statement(stmt);
        if s.is_infinite {
            graphs.push(AccessGraph {
                stmt,
                array: None,
                graph: sigma.wrap(),
                first_time_col: s.dims(),
                width,
            });
        }
        for access in &s.accesses {
            let n_index = access.relation.n_out();
            let product = sigma.range_product(&access.relation, Tuple::new(TupleId::Anonymous, width + n_index));
            graphs.push(AccessGraph {
                stmt,
                array: Some(access.array),
                graph: product.wrap(),
                first_time_col: s.dims(),
                width,
            });
        }
    }
    graphs
}

/// First band time from which the access repeats along its ray.
fn onset_of(model: &Model, g: &AccessGraph, dim: usize) -> PolyResult<i64> {
    let time_col = g.first_time_col + dim;
    let cols = g.ray_cols();
    let mut boundary: Vec<Polyhedron> = Vec::new();
    for piece in g.graph.pieces() {
        if piece.is_empty()? {
            continue;
        }
        match piece.recession(&cols)? {
            RayShape::Bounded => boundary.push(piece.clone()),
            RayShape::Multiple | RayShape::Ray { full: None, .. } => {
                return Err(ScheduleError::multiple_rays(g.describe(model)).into());
            }
            RayShape::Ray { full: Some(ray), .. } => {
                // Points whose predecessor along the ray leaves the piece.
                let n_cols = piece.n_cols();
                for c in piece.constraints().iter().filter(|c| c.is_inequality()) {
                    let step = c.expr.linear_dot(&ray[..n_cols])
                        + c.expr
                            .param_coeffs
                            .iter()
                            .zip(&ray[n_cols..])
                            .map(|(a, b)| a * b)
                            .sum::<i64>();
                    if step <= 0 {
                        continue;
                    }
                    let mut edge = -c.expr.clone();
                    edge.constant += step - 1;
                    boundary.push(piece.clone().with_constraint(Constraint::ge_zero(edge)));
                }
            }
        }
    }
    let boundary = IntegerSet::from_pieces(g.graph.space().clone(), boundary);
    match boundary.max_dim(time_col)? {
        Optimum::Value(latest) => Ok(latest + 1),
        Optimum::Empty => Ok(0),
        Optimum::Unbounded => Err(ScheduleError::new(
            ScheduleErrorKind::UnsupportedStructure,
            format!("The {} never becomes periodic.", g.describe(model)),
        )
        .into()),
    }
}

/// The band restricted to `lower <= t[dim] <= upper`, shifted by `shift`.
/// Statements without instances in the window are dropped.
fn restrict_band(
    band: &ScheduleElement,
    dim: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    shift: i64,
) -> PolyResult<ScheduleElement> {
    let mut out = ScheduleElement::new(Vec::new(), UnionMap::new(), band.infinite);
    for &stmt in &band.statements {
        let Some(map) = band.map_of(stmt) else { continue };
        let mut window = map.clone();
        if let Some(lo) = lower {
            window = window.constrain(|p| {
                let mut e = p.out_expr(dim);
                e.constant = -lo;
                Constraint::ge_zero(e)
            });
        }
        if let Some(hi) = upper {
            window = window.constrain(|p| {
                let mut e = -p.out_expr(dim);
                e.constant = hi;
                Constraint::ge_zero(e)
            });
        }
        let window = window.coalesce()?;
        if window.is_empty()? {
            continue;
        }
        out.set_map(stmt, window.translate_out(dim, shift));
    }
    Ok(out)
}

/// Band time `Time(width)` to tiled time `[k, e, t', 0...]` where
/// `t[dim] = offset + size * k + t'[dim]` with `k >= 0`.
fn period_embedding(width: usize, max_width: usize, element: usize, tiling: Tiling) -> IntegerMap {
    let space = Space::map(Tuple::time(width), Tuple::time(2 + max_width));
    let mut p = Polyhedron::universe(space);
    let k = p.out_expr(0);
    p.add_constraint(Constraint::ge_zero(k.clone()));
    let mut e = p.out_expr(1);
    e.constant = -(element as i64);
    p.add_constraint(Constraint::eq_zero(e));
    for j in 0..max_width {
        let local = p.out_expr(2 + j);
        if j == tiling.dim {
            let mut split = p.in_expr(j) - k.scale(tiling.size) - local.clone();
            split.constant = -tiling.offset;
            p.add_constraint(Constraint::eq_zero(split));
            p.add_constraint(Constraint::ge_zero(local.clone()));
            let mut below = -local;
            below.constant = tiling.size - 1;
            p.add_constraint(Constraint::ge_zero(below));
        } else if j < width {
            p.add_constraint(Constraint::eq(local, p.in_expr(j)));
        } else {
            p.add_constraint(Constraint::eq_zero(local));
        }
    }
    IntegerMap::from_polyhedron(p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;
    use crate::polyhedral::AffineMap;
    use crate::transform::scheduler::{AffineScheduler, SchedulingPrimitive};

    fn compile(model: &mut Model) -> PolyResult<Schedule> {
        let summary = ModelSummary::new(model)?;
        let tree = AffineScheduler::new().schedule(model, &summary)?;
        decompose(model, &summary, tree)
    }

    fn stream_copy() -> Model {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let y = b.array("y", &[(0, None)]).unwrap();
        let s = b.statement("s", &[(0, None)]).unwrap();
        let t = b.statement("t", &[(0, None)]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        b.read(t, x, &[vec![1, 0]]).unwrap();
        b.write(t, y, &[vec![1, 0]]).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_finite_model_is_not_tiled() {
        let mut b = ModelBuilder::new();
        b.statement("s", &[(0, Some(9))]).unwrap();
        let mut model = b.build().unwrap();
        let schedule = compile(&mut model).unwrap();
        assert!(!schedule.is_periodic());
        assert!(schedule.period.is_empty());
    }

    #[test]
    fn test_stream_tiling() {
        let mut model = stream_copy();
        let schedule = compile(&mut model).unwrap();
        let tiling = schedule.tiling.unwrap();
        assert_eq!(tiling.dim, 0);
        assert_eq!(tiling.size, 1);
        assert_eq!(model.array(ArrayId(0)).period, 1);
        assert_eq!(schedule.period.elements.len(), 1);

        // One instance of each statement per period, at period-local time 0.
        let s = schedule.period.elements[0].map_of(StmtId(0)).unwrap();
        assert_eq!(s.max_with(|p| p.out_expr(0)).unwrap(), Optimum::Value(0));
        assert_eq!(s.min_with(|p| p.out_expr(0)).unwrap(), Optimum::Value(0));
        assert_eq!(s.max_with(|p| p.in_expr(0)).unwrap(), Optimum::Value(tiling.offset));
    }

    #[test]
    fn test_tiled_numbers_periods() {
        let mut model = stream_copy();
        let schedule = compile(&mut model).unwrap();
        let offset = schedule.tiling.unwrap().offset;
        let tiled = schedule.tiled.from_tuple(TupleId::Statement(StmtId(0))).next().unwrap();
        // s[offset + 3] runs in period 3.
        let at = tiled.map_pieces(|p| p.fix(&[offset + 3]));
        assert_eq!(at.max_with(|p| p.out_expr(0)).unwrap(), Optimum::Value(3));
        // s[0] is in the prelude when the offset is positive.
        if offset > 0 {
            let first = tiled.map_pieces(|p| p.fix(&[0]));
            assert_eq!(first.max_with(|p| p.out_expr(0)).unwrap(), Optimum::Value(-1));
        }
    }

    #[test]
    fn test_inconsistent_directions() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let s = b.statement("a", &[(0, None)]).unwrap();
        let t = b.statement("b", &[(0, None)]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        b.write(t, x, &[vec![1, 0]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();

        let mut band = UnionMap::new();
        for (stmt, rows) in [(s, vec![vec![1, 0], vec![0, 0]]), (t, vec![vec![0, 0], vec![1, 0]])] {
            let st = model.statement(stmt);
            band.add(
                AffineMap::from_rows(st.tuple(), Tuple::time(2), &rows)
                    .to_map()
                    .intersect_domain(&st.domain),
            );
        }
        let mut tree = ScheduleTree::new();
        tree.push(ScheduleElement::new(vec![s, t], band, true));
        let err = decompose(&mut model, &summary, tree).unwrap_err();
        assert!(err
            .to_string()
            .contains("Inconsistent infinite directions of access schedules."));
    }

    /// A single band over `stmts` with the given schedule rows.
    fn band_of(model: &Model, rows: &[(StmtId, Vec<Vec<i64>>)], width: usize) -> ScheduleTree {
        let mut band = UnionMap::new();
        for (stmt, rows) in rows {
            let st = model.statement(*stmt);
            band.add(
                AffineMap::from_rows(st.tuple(), Tuple::time(width), rows)
                    .to_map()
                    .intersect_domain(&st.domain),
            );
        }
        let mut tree = ScheduleTree::new();
        tree.push(ScheduleElement::new(rows.iter().map(|(s, _)| *s).collect(), band, true));
        tree
    }

    #[test]
    fn test_inconsistent_array_advance() {
        // Both run at one instance per step, but b reads x twice as fast
        // as a writes it.
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let s = b.statement("a", &[(0, None)]).unwrap();
        let t = b.statement("b", &[(0, None)]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        b.read(t, x, &[vec![2, 0]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let tree = band_of(
            &model,
            &[(s, vec![vec![1, 0], vec![0, 0]]), (t, vec![vec![1, 0], vec![0, 1]])],
            2,
        );
        let err = decompose(&mut model, &summary, tree).unwrap_err();
        assert!(err
            .to_string()
            .contains("Accesses have inconsistent tile offsets in array space (array x)."));
    }

    #[test]
    fn test_access_with_two_rays() {
        // s[i, j] over the quadrant runs at time i + j but writes x[i]:
        // time alone has one direction, (time, index) has two.
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let s = b.statement("s", &[(0, None), (0, None)]).unwrap();
        b.write(s, x, &[vec![1, 0, 0]]).unwrap();
        let mut model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let tree = band_of(&model, &[(s, vec![vec![1, 1, 0]])], 1);
        let err = decompose(&mut model, &summary, tree).unwrap_err();
        assert!(err.to_string().contains("Multiple rays in access of s to x."));
    }

    #[test]
    fn test_infinite_element_must_be_last() {
        let mut model = stream_copy();
        let summary = ModelSummary::new(&model).unwrap();
        let mut tree = AffineScheduler::new().schedule(&model, &summary).unwrap();
        let band = tree.elements[0].clone();
        tree.push(ScheduleElement::new(band.statements.clone(), band.band.clone(), false));
        let err = decompose(&mut model, &summary, tree).unwrap_err();
        assert!(err.to_string().contains("must come last"));
    }
}
