//! Dependence analysis over the model summary.
//!
//! This module provides:
//! - The statement-level dependence graph (edges carry the instance relation)
//! - Proximity classification of edges
//! - Strongly connected components and their topological order
//! - Validity checks of schedules against dependencies
//! - Detection of dependencies carried by a schedule dimension

use crate::ir::{Model, StmtId};
use crate::polyhedral::{Constraint, IntegerMap, Optimum, TupleId, UnionMap};
use crate::utils::errors::{PolyResult, ScheduleError, ScheduleErrorKind, SolverErrorKind};
use log::{debug, trace};
use std::collections::{BTreeSet, HashMap};

/// A dependence between the instances of two statements.
#[derive(Debug, Clone)]
pub struct Dependence {
    /// Source (producer) statement
    pub source: StmtId,
    /// Target (consumer) statement
    pub target: StmtId,
    /// Pairs of dependent instances
    pub relation: IntegerMap,
    /// Two sinks of one source lie a bounded distance apart
    pub proximity: bool,
}

impl Dependence {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn description(&self, model: &Model) -> String {
        format!(
            "{} -> {}{}",
            model.statement(self.source).name,
            model.statement(self.target).name,
            if self.proximity { " (proximity)" } else { "" }
        )
    }
}

/// Whether the sinks of any source instance are a bounded distance apart
/// in their first dimension.
pub fn is_proximity(relation: &IntegerMap) -> PolyResult<bool> {
    if relation.n_out() == 0 {
        return Ok(true);
    }
    let sinks = relation.reverse().apply_range(relation);
    match sinks.max_with(|p| p.out_expr(0) - p.in_expr(0)) {
        Ok(spread) => Ok(!matches!(spread, Optimum::Unbounded)),
        // An undecided edge is not a proximity edge.
        Err(e) if e.kind == SolverErrorKind::NodeLimit => {
            debug!("proximity undecided ({}); treating edge as distant", e);
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

fn statement_of(id: TupleId) -> Option<StmtId> {
    match id {
        TupleId::Statement(s) => Some(s),
        _ => None,
    }
}

/// Statement-level dependence graph.
#[derive(Debug, Clone)]
pub struct DependenceGraph {
    statements: Vec<StmtId>,
    edges: Vec<Dependence>,
    successors: HashMap<StmtId, Vec<usize>>,
    predecessors: HashMap<StmtId, Vec<usize>>,
}

impl DependenceGraph {
    /// Build the graph over `statements` from instance dependencies.
    pub fn new(statements: Vec<StmtId>, dependencies: &UnionMap) -> PolyResult<Self> {
        let mut edges = Vec::new();
        for relation in dependencies.iter() {
            let space = relation.space();
            let (Some(source), Some(target)) = (
                space.input.and_then(|t| statement_of(t.id)),
                statement_of(space.output.id),
            ) else {
                continue;
            };
            if !statements.contains(&source) || !statements.contains(&target) {
                continue;
            }
            if relation.is_empty()? {
                continue;
            }
            let proximity = is_proximity(relation)?;
            trace!("dependence {} -> {} proximity={}", source, target, proximity);
            edges.push(Dependence { source, target, relation: relation.clone(), proximity });
        }

        let mut successors: HashMap<StmtId, Vec<usize>> = HashMap::new();
        let mut predecessors: HashMap<StmtId, Vec<usize>> = HashMap::new();
        for stmt in &statements {
            successors.insert(*stmt, Vec::new());
            predecessors.insert(*stmt, Vec::new());
        }
        for (i, dep) in edges.iter().enumerate() {
            if let Some(v) = successors.get_mut(&dep.source) {
                v.push(i);
            }
            if let Some(v) = predecessors.get_mut(&dep.target) {
                v.push(i);
            }
        }
        debug!("dependence graph: {} statements, {} edges", statements.len(), edges.len());
        Ok(Self { statements, edges, successors, predecessors })
    }

    pub fn statements(&self) -> &[StmtId] {
        &self.statements
    }

    pub fn edges(&self) -> &[Dependence] {
        &self.edges
    }

    pub fn get_outgoing(&self, stmt: StmtId) -> Vec<&Dependence> {
        self.successors
            .get(&stmt)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    pub fn get_incoming(&self, stmt: StmtId) -> Vec<&Dependence> {
        self.predecessors
            .get(&stmt)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    pub fn proximity_edges(&self) -> impl Iterator<Item = &Dependence> {
        self.edges.iter().filter(|d| d.proximity)
    }

    /// Statements reachable from `roots` (roots included).
    pub fn reachable_from(&self, roots: impl IntoIterator<Item = StmtId>) -> BTreeSet<StmtId> {
        let mut seen: BTreeSet<StmtId> = BTreeSet::new();
        let mut work: Vec<StmtId> = roots.into_iter().collect();
        while let Some(s) = work.pop() {
            if !seen.insert(s) {
                continue;
            }
            for dep in self.get_outgoing(s) {
                if !seen.contains(&dep.target) {
                    work.push(dep.target);
                }
            }
        }
        seen
    }

    /// Strongly connected components using Tarjan's algorithm, in reverse
    /// topological order. Statements within a component are sorted.
    pub fn strongly_connected_components(&self) -> Vec<Vec<StmtId>> {
        let mut state = TarjanState::default();
        for &v in &self.statements {
            if !state.indices.contains_key(&v) {
                self.strongconnect(v, &mut state);
            }
        }
        state.sccs
    }

    fn strongconnect(&self, v: StmtId, state: &mut TarjanState) {
        let index = state.counter;
        state.indices.insert(v, index);
        state.lowlinks.insert(v, index);
        state.counter += 1;
        state.stack.push(v);
        state.on_stack.insert(v);

        for dep in self.get_outgoing(v) {
            let w = dep.target;
            match state.indices.get(&w).copied() {
                None => {
                    self.strongconnect(w, state);
                    let low_w = state.lowlinks.get(&w).copied().unwrap_or(usize::MAX);
                    if let Some(low_v) = state.lowlinks.get_mut(&v) {
                        *low_v = (*low_v).min(low_w);
                    }
                }
                Some(index_w) if state.on_stack.contains(&w) => {
                    if let Some(low_v) = state.lowlinks.get_mut(&v) {
                        *low_v = (*low_v).min(index_w);
                    }
                }
                Some(_) => {}
            }
        }

        if state.lowlinks.get(&v) == state.indices.get(&v) {
            let mut scc = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack.remove(&w);
                scc.push(w);
                if w == v {
                    break;
                }
            }
            scc.sort();
            state.sccs.push(scc);
        }
    }

    /// Components of the statements in `subset`, ordered so that every
    /// edge between components goes forward. Among components that are
    /// ready at the same time, the one holding the lowest statement id
    /// comes first.
    pub fn ordered_components(&self, subset: &BTreeSet<StmtId>) -> Vec<Vec<StmtId>> {
        let sccs = self.strongly_connected_components();
        let mut component_of: HashMap<StmtId, usize> = HashMap::new();
        for (c, scc) in sccs.iter().enumerate() {
            for &s in scc {
                component_of.insert(s, c);
            }
        }
        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sccs.len()];
        let mut in_degree = vec![0usize; sccs.len()];
        for dep in &self.edges {
            let (Some(&from), Some(&to)) = (component_of.get(&dep.source), component_of.get(&dep.target))
            else {
                continue;
            };
            if from != to && successors[from].insert(to) {
                in_degree[to] += 1;
            }
        }

        // Components are non-empty and sorted, so `scc[0]` is the lowest id.
        let mut ready: BTreeSet<(StmtId, usize)> = (0..sccs.len())
            .filter(|&c| in_degree[c] == 0)
            .map(|c| (sccs[c][0], c))
            .collect();
        let mut order = Vec::with_capacity(sccs.len());
        while let Some((_, c)) = ready.pop_first() {
            order.push(c);
            for &next in &successors[c] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert((sccs[next][0], next));
                }
            }
        }

        order
            .into_iter()
            .filter_map(|c| {
                let kept: Vec<StmtId> = sccs[c].iter().copied().filter(|s| subset.contains(s)).collect();
                (!kept.is_empty()).then_some(kept)
            })
            .collect()
    }
}

#[derive(Default)]
struct TarjanState {
    counter: usize,
    stack: Vec<StmtId>,
    indices: HashMap<StmtId, usize>,
    lowlinks: HashMap<StmtId, usize>,
    on_stack: BTreeSet<StmtId>,
    sccs: Vec<Vec<StmtId>>,
}

/// A dependency expressed between schedule times.
#[derive(Debug, Clone)]
pub struct TimeDependence {
    pub source: StmtId,
    pub target: StmtId,
    /// Time of source -> time of target
    pub relation: IntegerMap,
}

/// Map every dependency through a schedule (`statement -> time`).
/// Dependencies whose endpoints are not both scheduled are skipped.
pub fn time_dependencies(dependencies: &UnionMap, schedule: &UnionMap) -> Vec<TimeDependence> {
    let mut out = Vec::new();
    for dep in dependencies.iter() {
        let space = dep.space();
        let (Some(source), Some(target)) = (
            space.input.and_then(|t| statement_of(t.id)),
            statement_of(space.output.id),
        ) else {
            continue;
        };
        let from = schedule.from_tuple(TupleId::Statement(source)).next();
        let to = schedule.from_tuple(TupleId::Statement(target)).next();
        let (Some(from), Some(to)) = (from, to) else { continue };
        if from.n_out() != to.n_out() {
            continue;
        }
        let relation = from.reverse().apply_range(dep).apply_range(to);
        out.push(TimeDependence { source, target, relation });
    }
    out
}

/// Check that no dependency runs backwards in time under `schedule`.
pub fn check_validity(model: &Model, dependencies: &UnionMap, schedule: &UnionMap) -> PolyResult<()> {
    for dep in time_dependencies(dependencies, schedule) {
        if !dep.relation.backwards_pairs().is_empty()? {
            return Err(ScheduleError::new(
                ScheduleErrorKind::DependencyViolation,
                format!(
                    "Schedule violates dependency {} -> {}.",
                    model.statement(dep.source).name,
                    model.statement(dep.target).name
                ),
            )
            .into());
        }
    }
    Ok(())
}

/// Whether some dependency is carried by time dimension `dim`: its
/// endpoints agree before `dim` and the target comes strictly later at `dim`.
pub fn is_carried_at(deps: &[TimeDependence], dim: usize) -> PolyResult<bool> {
    for dep in deps {
        let carried = dep.relation.map_pieces(|p| {
            let mut p = p.clone();
            for j in 0..dim {
                p.add_constraint(Constraint::eq(p.out_expr(j), p.in_expr(j)));
            }
            let mut gap = p.out_expr(dim) - p.in_expr(dim);
            gap.constant -= 1;
            p.with_constraint(Constraint::ge_zero(gap))
        });
        if !carried.is_empty()? {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModelSummary;
    use crate::ir::ModelBuilder;
    use crate::polyhedral::{AffineMap, Tuple};

    /// a -> b -> c, with c also feeding back into b.
    fn chain() -> Model {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, Some(9))]).unwrap();
        let y = b.array("y", &[(0, Some(9))]).unwrap();
        let z = b.array("z", &[(0, Some(9))]).unwrap();
        let s0 = b.statement("a", &[(0, Some(9))]).unwrap();
        let s1 = b.statement("b", &[(0, Some(9))]).unwrap();
        let s2 = b.statement("c", &[(0, Some(9))]).unwrap();
        b.write(s0, x, &[vec![1, 0]]).unwrap();
        b.read(s1, x, &[vec![1, 0]]).unwrap();
        b.read(s1, z, &[vec![1, -1]]).unwrap();
        b.write(s1, y, &[vec![1, 0]]).unwrap();
        b.read(s2, y, &[vec![1, 0]]).unwrap();
        b.write(s2, z, &[vec![1, 0]]).unwrap();
        b.build().unwrap()
    }

    fn graph(model: &Model) -> DependenceGraph {
        let summary = ModelSummary::new(model).unwrap();
        let ids = model.statements.iter().map(|s| s.id).collect();
        DependenceGraph::new(ids, &summary.dependencies).unwrap()
    }

    #[test]
    fn test_components_in_order() {
        let model = chain();
        let g = graph(&model);
        assert_eq!(g.edges().len(), 3);
        let all: BTreeSet<StmtId> = g.statements().iter().copied().collect();
        let comps = g.ordered_components(&all);
        assert_eq!(comps, vec![vec![StmtId(0)], vec![StmtId(1), StmtId(2)]]);
        assert_eq!(g.reachable_from([StmtId(1)]).len(), 2);
    }

    #[test]
    fn test_independent_components_keep_declaration_order() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, Some(3))]).unwrap();
        let y = b.array("y", &[(0, Some(3))]).unwrap();
        let s0 = b.statement("first", &[(0, Some(3))]).unwrap();
        let s1 = b.statement("second", &[(0, Some(3))]).unwrap();
        let s2 = b.statement("third", &[(0, Some(3))]).unwrap();
        let s3 = b.statement("fourth", &[(0, Some(3))]).unwrap();
        b.write(s0, x, &[vec![1, 0]]).unwrap();
        // third consumes what fourth produces; first and second are unrelated
        b.write(s3, y, &[vec![1, 0]]).unwrap();
        b.read(s2, y, &[vec![1, 0]]).unwrap();
        b.read(s1, x, &[vec![-1, 3]]).unwrap();
        let model = b.build().unwrap();
        let g = graph(&model);
        let all: BTreeSet<StmtId> = g.statements().iter().copied().collect();
        let order: Vec<StmtId> = g.ordered_components(&all).into_iter().flatten().collect();
        assert_eq!(order, vec![s0, s1, s3, s2]);

        let subset: BTreeSet<StmtId> = [s2, s3].into_iter().collect();
        let order: Vec<StmtId> = g.ordered_components(&subset).into_iter().flatten().collect();
        assert_eq!(order, vec![s3, s2]);
    }

    #[test]
    fn test_proximity() {
        let s = Tuple::statement(StmtId(0), 1);
        let t = Tuple::statement(StmtId(1), 1);
        // every t-instance depends on s[0]: unbounded spread
        let broadcast = AffineMap::from_rows(t, s, &[vec![0, 0]]).to_map().reverse();
        let broadcast = broadcast.intersect_range(&crate::polyhedral::IntegerSet::boxed(
            crate::polyhedral::Space::set(t),
            &[(0, None)],
        ));
        assert!(!is_proximity(&broadcast).unwrap());
        let shift = AffineMap::from_rows(s, t, &[vec![1, 1]]).to_map();
        assert!(is_proximity(&shift).unwrap());
    }

    #[test]
    fn test_rate_conversion_edge_is_proximity() {
        // p[i, j] writes x[3i + j], c[i, j] reads x[2i + j]
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let p = b.statement("p", &[(0, None), (0, Some(2))]).unwrap();
        let c = b.statement("c", &[(0, None), (0, Some(1))]).unwrap();
        b.write(p, x, &[vec![3, 1, 0]]).unwrap();
        b.read(c, x, &[vec![2, 1, 0]]).unwrap();
        let model = b.build().unwrap();
        let g = graph(&model);
        assert_eq!(g.edges().len(), 1);
        let edge = &g.edges()[0];
        assert_eq!((edge.source, edge.target), (p, c));
        assert!(edge.proximity);
    }

    #[test]
    fn test_validity_and_carried() {
        let model = chain();
        let summary = ModelSummary::new(&model).unwrap();
        let time = Tuple::time(2);
        let mut schedule = UnionMap::new();
        // [i, position]
        for (k, s) in model.statements.iter().enumerate() {
            let rows = vec![vec![1, 0], vec![0, k as i64]];
            schedule.add(AffineMap::from_rows(s.tuple(), time, &rows).to_map());
        }
        check_validity(&model, &summary.dependencies, &schedule).unwrap();
        let deps = time_dependencies(&summary.dependencies, &schedule);
        // c[i] feeds b[i + 1]
        assert!(is_carried_at(&deps, 0).unwrap());
        assert!(is_carried_at(&deps, 1).unwrap());

        // c before b inside one i: b reads z[i - 1] written in the previous i
        let mut bad = UnionMap::new();
        for (k, s) in model.statements.iter().enumerate() {
            let rows = vec![vec![0, 0], vec![0, -(k as i64)]];
            bad.add(AffineMap::from_rows(s.tuple(), time, &rows).to_map());
        }
        let err = check_validity(&model, &summary.dependencies, &bad).unwrap_err();
        assert!(err.to_string().contains("Schedule violates dependency"));
    }
}
