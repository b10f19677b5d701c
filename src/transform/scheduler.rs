//! Affine scheduling of stream programs.
//!
//! The scheduler assigns every statement instance a band time
//!
//! ```text
//! infinite statement:  [k_S * i_s + o_S, other dims..., 0..., position]
//! finite statement:    [o_S, dims..., 0..., position]
//! ```
//!
//! where `i_s` is the streaming dimension (the direction in which the
//! domain is unbounded), `k_S` the stream rate and `o_S` an offset. Rates
//! keep producers and consumers in step along the dependence rays; offsets
//! are the longest paths of the dependence lower bounds. Statements that
//! no infinite statement depends on run first, one element per strongly
//! connected component.

use crate::analysis::dependence::{Dependence, DependenceGraph};
use crate::analysis::ModelSummary;
use crate::ir::{Model, StmtId};
use crate::polyhedral::{AffineMap, IntegerMap, Optimum, RayShape, Tuple, UnionMap};
use crate::transform::schedule::{ScheduleElement, ScheduleTree};
use crate::utils::errors::{PolyResult, ScheduleError, ScheduleErrorKind};
use crate::utils::matrix::Rational;
use log::{debug, info, trace};
use num_integer::Integer;
use num_traits::One;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A scheduling algorithm producing a schedule tree for a model.
pub trait SchedulingPrimitive {
    /// Compute a schedule respecting every dependency of the summary.
    fn schedule(&self, model: &Model, summary: &ModelSummary) -> PolyResult<ScheduleTree>;

    /// Get the algorithm name.
    fn name(&self) -> &str;
}

/// Leading band coordinate of a streaming statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lead {
    dim: usize,
    rate: i64,
}

#[derive(Debug, Clone)]
struct Member {
    stmt: StmtId,
    lead: Option<Lead>,
    offset: i64,
    position: usize,
}

/// A dependence edge between two members with its lower bound.
#[derive(Debug, Clone)]
struct Edge<'a> {
    source: usize,
    target: usize,
    dep: &'a Dependence,
    /// Minimum of `lead_T(q) - lead_S(p)` without offsets
    min_gap: i64,
    strict: bool,
}

impl Edge<'_> {
    fn weight(&self) -> i64 {
        -self.min_gap + i64::from(self.strict)
    }
}

/// The default scheduler: rates from rays, offsets from longest paths.
#[derive(Debug, Clone)]
pub struct AffineScheduler {
    /// Pull producers towards their proximity consumers
    optimize: bool,
    /// Put every statement in one band
    whole_program: bool,
}

impl AffineScheduler {
    pub fn new() -> Self {
        Self { optimize: true, whole_program: false }
    }

    pub fn with_optimization(mut self, enable: bool) -> Self {
        self.optimize = enable;
        self
    }

    pub fn with_whole_program(mut self, enable: bool) -> Self {
        self.whole_program = enable;
        self
    }
}

impl Default for AffineScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingPrimitive for AffineScheduler {
    fn name(&self) -> &str {
        "affine"
    }

    fn schedule(&self, model: &Model, summary: &ModelSummary) -> PolyResult<ScheduleTree> {
        let ids: Vec<StmtId> = model.statements.iter().map(|s| s.id).collect();
        let graph = DependenceGraph::new(ids.clone(), &summary.dependencies)?;

        let infinite: Vec<StmtId> = model
            .statements
            .iter()
            .filter(|s| s.is_infinite)
            .map(|s| s.id)
            .collect();
        let band: BTreeSet<StmtId> = if self.whole_program {
            ids.iter().copied().collect()
        } else {
            graph.reachable_from(infinite.iter().copied())
        };
        let prefix: BTreeSet<StmtId> = ids.iter().copied().filter(|s| !band.contains(s)).collect();

        let mut tree = ScheduleTree::new();
        for component in graph.ordered_components(&prefix) {
            let leads = component
                .iter()
                .map(|&s| {
                    let lead = (model.statement(s).dims() > 0).then_some(Lead { dim: 0, rate: 1 });
                    (s, lead)
                })
                .collect();
            let element = self.solve_element(model, &graph, &component, leads, false)?;
            tree.push(element);
        }

        if !band.is_empty() {
            let mut streams = HashMap::new();
            for &s in &band {
                if let Some(dim) = stream_dimension(model, s)? {
                    streams.insert(s, dim);
                }
            }
            let rates = self.stream_rates(model, &graph, &streams)?;
            let leads = streams
                .iter()
                .map(|(&s, &dim)| (s, Some(Lead { dim, rate: rates.get(&s).copied().unwrap_or(1) })))
                .collect();
            let order: Vec<StmtId> = graph.ordered_components(&band).into_iter().flatten().collect();
            let is_infinite = order.iter().any(|s| model.statement(*s).is_infinite);
            let element = self.solve_element(model, &graph, &order, leads, is_infinite)?;
            tree.push(element);
        }

        info!(
            "{} scheduler: {} elements for {} statements",
            self.name(),
            tree.elements.len(),
            ids.len()
        );
        Ok(tree)
    }
}

/// The streaming dimension of an infinite statement.
fn stream_dimension(model: &Model, stmt: StmtId) -> PolyResult<Option<usize>> {
    let s = model.statement(stmt);
    if !s.is_infinite {
        return Ok(None);
    }
    let cols: Vec<usize> = (0..s.dims()).collect();
    match s.domain.recession(&cols)? {
        RayShape::Bounded => Ok(None),
        RayShape::Multiple => Err(ScheduleError::multiple_rays(format!("domain of {}", s.name)).into()),
        RayShape::Ray { direction, .. } => match direction.iter().position(|&v| v != 0) {
            Some(d) if direction[d] > 0 => Ok(Some(d)),
            _ => Err(ScheduleError::new(
                ScheduleErrorKind::UnsupportedStructure,
                format!("Statement {} does not stream towards increasing indices.", s.name),
            )
            .into()),
        },
    }
}

impl AffineScheduler {
    /// Stream rates making `k_S * r_S = k_T * r_T` along every dependence ray.
    fn stream_rates(
        &self,
        model: &Model,
        graph: &DependenceGraph,
        streams: &HashMap<StmtId, usize>,
    ) -> PolyResult<HashMap<StmtId, i64>> {
        let mut edges: Vec<&Dependence> = graph
            .edges()
            .iter()
            .filter(|d| !d.is_self_loop())
            .filter(|d| streams.contains_key(&d.source) && streams.contains_key(&d.target))
            .collect();
        if self.optimize {
            edges.sort_by_key(|d| !d.proximity);
        }

        // ratio k_T / k_S per edge
        let mut adjacency: HashMap<StmtId, Vec<(StmtId, Rational)>> = HashMap::new();
        for dep in edges {
            let cols = [streams[&dep.source], dep.relation.n_in() + streams[&dep.target]];
            let RayShape::Ray { direction, .. } = dep.relation.wrap().recession(&cols)? else {
                continue;
            };
            let (rs, rt) = (direction[0], direction[1]);
            if rs == 0 || rt == 0 || rs.signum() != rt.signum() {
                continue;
            }
            let ratio = Rational::new(rs as i128, rt as i128);
            trace!("rate ratio {} -> {}: {}", dep.source, dep.target, ratio);
            adjacency.entry(dep.source).or_default().push((dep.target, ratio));
            adjacency.entry(dep.target).or_default().push((dep.source, Rational::one() / ratio));
        }

        let mut roots: Vec<StmtId> = streams.keys().copied().collect();
        roots.sort();
        let mut rates: HashMap<StmtId, Rational> = HashMap::new();
        let mut result = HashMap::new();
        for root in roots {
            if rates.contains_key(&root) {
                continue;
            }
            let mut component = vec![root];
            rates.insert(root, Rational::one());
            let mut queue = VecDeque::from([root]);
            while let Some(s) = queue.pop_front() {
                let k = rates[&s];
                for &(t, ratio) in adjacency.get(&s).map(Vec::as_slice).unwrap_or(&[]) {
                    let candidate = k * ratio;
                    match rates.get(&t) {
                        Some(&existing) if existing != candidate => {
                            return Err(ScheduleError::new(
                                ScheduleErrorKind::NoValidSchedule,
                                format!(
                                    "Inconsistent stream rates of statements {} and {}.",
                                    model.statement(s).name,
                                    model.statement(t).name
                                ),
                            )
                            .into());
                        }
                        Some(_) => {}
                        None => {
                            rates.insert(t, candidate);
                            component.push(t);
                            queue.push_back(t);
                        }
                    }
                }
            }
            // Smallest positive integers with the same ratios.
            let den = component.iter().fold(1i128, |acc, s| acc.lcm(rates[s].denom()));
            let ints: Vec<i128> = component
                .iter()
                .map(|s| (rates[s] * Rational::from_integer(den)).to_integer())
                .collect();
            let g = ints.iter().fold(0i128, |acc, v| acc.gcd(v)).max(1);
            for (s, v) in component.iter().zip(ints) {
                result.insert(*s, (v / g) as i64);
            }
        }
        debug!("stream rates: {:?}", result);
        Ok(result)
    }

    /// Offsets and positions for one element, made valid by tightening
    /// violated edges.
    fn solve_element(
        &self,
        model: &Model,
        graph: &DependenceGraph,
        order: &[StmtId],
        leads: HashMap<StmtId, Option<Lead>>,
        infinite: bool,
    ) -> PolyResult<ScheduleElement> {
        let mut members: Vec<Member> = order
            .iter()
            .enumerate()
            .map(|(position, &stmt)| Member {
                stmt,
                lead: leads.get(&stmt).copied().flatten(),
                offset: 0,
                position,
            })
            .collect();
        let index: HashMap<StmtId, usize> = members.iter().enumerate().map(|(i, m)| (m.stmt, i)).collect();
        let width = 2 + members
            .iter()
            .map(|m| model.statement(m.stmt).dims() - usize::from(m.lead.is_some()))
            .max()
            .unwrap_or(0);

        let mut edges = Vec::new();
        for dep in graph.edges() {
            let (Some(&source), Some(&target)) = (index.get(&dep.source), index.get(&dep.target)) else {
                continue;
            };
            let (ls, lt) = (members[source].lead, members[target].lead);
            let gap = dep.relation.min_with(|p| {
                let mut e = p.zero_expr();
                if let Some(l) = lt {
                    e = e + p.out_expr(l.dim).scale(l.rate);
                }
                if let Some(l) = ls {
                    e = e - p.in_expr(l.dim).scale(l.rate);
                }
                e
            })?;
            let min_gap = match gap {
                Optimum::Value(v) => v,
                Optimum::Empty => continue,
                Optimum::Unbounded => {
                    return Err(ScheduleError::new(
                        ScheduleErrorKind::NoValidSchedule,
                        format!(
                            "Unbounded dependence distance from {} to {}.",
                            model.statement(dep.source).name,
                            model.statement(dep.target).name
                        ),
                    )
                    .into());
                }
            };
            edges.push(Edge { source, target, dep, min_gap, strict: false });
        }

        loop {
            let offsets = longest_paths(members.len(), &edges).ok_or_else(|| {
                ScheduleError::new(
                    ScheduleErrorKind::NoValidSchedule,
                    "Dependencies form a cycle without slack; no valid schedule.",
                )
            })?;
            for (m, o) in members.iter_mut().zip(offsets) {
                m.offset = o;
            }
            if self.optimize {
                self.pull_producers(graph, &mut members, &edges, &index);
            }

            let maps: Vec<IntegerMap> = members.iter().map(|m| band_map(model, m, width)).collect();
            let mut tightened = false;
            for edge in edges.iter_mut() {
                let time = maps[edge.source]
                    .reverse()
                    .apply_range(&edge.dep.relation)
                    .apply_range(&maps[edge.target]);
                if time.backwards_pairs().is_empty()? {
                    continue;
                }
                if edge.strict || edge.source == edge.target {
                    return Err(ScheduleError::new(
                        ScheduleErrorKind::DependencyViolation,
                        format!(
                            "Schedule violates dependency {} -> {}.",
                            model.statement(edge.dep.source).name,
                            model.statement(edge.dep.target).name
                        ),
                    )
                    .into());
                }
                trace!("tightening {} -> {}", edge.dep.source, edge.dep.target);
                edge.strict = true;
                tightened = true;
            }
            if !tightened {
                let mut band = UnionMap::new();
                for map in maps {
                    band.add(map);
                }
                for m in &members {
                    debug!(
                        "{}: lead {:?} offset {} position {}",
                        model.statement(m.stmt).name,
                        m.lead,
                        m.offset,
                        m.position
                    );
                }
                return Ok(ScheduleElement::new(order.to_vec(), band, infinite));
            }
        }
    }

    /// Move producers as late as their consumers allow when they feed a
    /// proximity consumer. Producers on cycles stay put.
    fn pull_producers(
        &self,
        graph: &DependenceGraph,
        members: &mut [Member],
        edges: &[Edge<'_>],
        index: &HashMap<StmtId, usize>,
    ) {
        let subset: BTreeSet<StmtId> = index.keys().copied().collect();
        let components = graph.ordered_components(&subset);
        for component in components.iter().rev() {
            let [stmt] = component.as_slice() else { continue };
            let s = index[stmt];
            let out: Vec<&Edge<'_>> = edges.iter().filter(|e| e.source == s).collect();
            if out.iter().any(|e| e.target == s) || !out.iter().any(|e| e.dep.proximity) {
                continue;
            }
            if let Some(latest) = out.iter().map(|e| members[e.target].offset - e.weight()).min() {
                if latest > members[s].offset {
                    members[s].offset = latest;
                }
            }
        }
    }
}

/// Longest paths from a virtual source joined to every node with weight 0.
/// `None` when a cycle has positive weight.
fn longest_paths(n: usize, edges: &[Edge<'_>]) -> Option<Vec<i64>> {
    let mut dist = vec![0i64; n];
    for _ in 0..=n {
        let mut changed = false;
        for e in edges {
            let candidate = dist[e.source] + e.weight();
            if candidate > dist[e.target] {
                dist[e.target] = candidate;
                changed = true;
            }
        }
        if !changed {
            return Some(dist);
        }
    }
    None
}

/// The band relation of a member, restricted to its domain.
fn band_map(model: &Model, member: &Member, width: usize) -> IntegerMap {
    let s = model.statement(member.stmt);
    let n = s.dims();
    let unit = |d: usize| {
        let mut row = vec![0; n + 1];
        row[d] = 1;
        row
    };
    let mut lead = vec![0; n + 1];
    lead[n] = member.offset;
    if let Some(l) = member.lead {
        lead[l.dim] = l.rate;
    }
    let mut rows = vec![lead];
    rows.extend((0..n).filter(|&d| member.lead.map(|l| l.dim) != Some(d)).map(unit));
    while rows.len() < width - 1 {
        rows.push(vec![0; n + 1]);
    }
    let mut position = vec![0; n + 1];
    position[n] = member.position as i64;
    rows.push(position);
    AffineMap::from_rows(s.tuple(), Tuple::time(width), &rows)
        .to_map()
        .intersect_domain(&s.domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dependence::check_validity;
    use crate::ir::ModelBuilder;
    use crate::polyhedral::TupleId;

    fn schedule(model: &Model) -> ScheduleTree {
        let summary = ModelSummary::new(model).unwrap();
        let tree = AffineScheduler::new().schedule(model, &summary).unwrap();
        check_validity(model, &summary.dependencies, &tree.flatten()).unwrap();
        tree
    }

    fn band_value(tree: &ScheduleTree, stmt: StmtId, point: &[i64]) -> Vec<i64> {
        let (_, e) = tree.element_of(stmt).unwrap();
        let map = e.map_of(stmt).unwrap().map_pieces(|p| p.fix(point));
        (0..map.n_out())
            .map(|d| map.max_with(|p| p.out_expr(d)).unwrap().value().unwrap())
            .collect()
    }

    #[test]
    fn test_single_finite_statement() {
        let mut b = ModelBuilder::new();
        b.statement("s", &[(0, Some(4))]).unwrap();
        let model = b.build().unwrap();
        let tree = schedule(&model);
        assert_eq!(tree.elements.len(), 1);
        assert!(!tree.elements[0].infinite);
        // identity plus position
        assert_eq!(band_value(&tree, StmtId(0), &[3]), vec![3, 0]);
    }

    #[test]
    fn test_stream_rates() {
        // p[i] writes x[i]; c[j] reads x[2j] and x[2j + 1]
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, None)]).unwrap();
        let p = b.statement("p", &[(0, None)]).unwrap();
        let c = b.statement("c", &[(0, None)]).unwrap();
        b.write(p, x, &[vec![1, 0]]).unwrap();
        b.read(c, x, &[vec![2, 0]]).unwrap();
        b.read(c, x, &[vec![2, 1]]).unwrap();
        let model = b.build().unwrap();
        let tree = schedule(&model);
        assert_eq!(tree.elements.len(), 1);
        assert!(tree.elements[0].infinite);
        let tp = band_value(&tree, p, &[5]);
        let tc = band_value(&tree, c, &[2]);
        // c[2] needs p[5]; the rate of c is twice that of p
        assert!(tc > tp);
        let tc3 = band_value(&tree, c, &[3]);
        assert_eq!(tc3[0] - tc[0], 2);
    }

    #[test]
    fn test_prefix_before_band() {
        let mut b = ModelBuilder::new();
        let init = b.array("init", &[(0, Some(3))]).unwrap();
        let x = b.array("x", &[(0, None)]).unwrap();
        let i = b.statement("i", &[(0, Some(3))]).unwrap();
        let s = b.statement("s", &[(0, None)]).unwrap();
        b.write(i, init, &[vec![1, 0]]).unwrap();
        b.read(s, init, &[vec![0, 0]]).unwrap();
        b.write(s, x, &[vec![1, 0]]).unwrap();
        let model = b.build().unwrap();
        let tree = schedule(&model);
        assert_eq!(tree.elements.len(), 2);
        assert_eq!(tree.element_of(i).map(|(k, _)| k), Some(0));
        assert_eq!(tree.element_of(s).map(|(k, _)| k), Some(1));
        assert!(tree.elements[1].infinite);
        assert!(tree.elements[1].map_of(s).unwrap().space().output.id == TupleId::Time);
    }

    #[test]
    fn test_multiple_rays_rejected() {
        let mut b = ModelBuilder::new();
        b.statement("s", &[(0, None), (0, None)]).unwrap();
        let model = b.build().unwrap();
        let summary = ModelSummary::new(&model).unwrap();
        let err = AffineScheduler::new().schedule(&model, &summary).unwrap_err();
        assert!(err.to_string().contains("Multiple rays in domain of s."));
    }
}
