//! AST builder for generating loop nests from schedules.
//!
//! The flat schedule of a tree is scanned one time dimension at a time.
//! Dimensions that are constant for every statement become an ordered
//! sequence of blocks; all other dimensions become loops whose bounds are
//! read off the projected schedule images.

use crate::analysis::dependence::{is_carried_at, time_dependencies, TimeDependence};
use crate::ir::{Model, StmtId};
use crate::polyhedral::{
    AffineExpr, Constraint, IntegerMap, IntegerSet, Optimum, Polyhedron, Space, Tuple, TupleId, UnionMap,
};
use crate::transform::ScheduleTree;
use crate::utils::errors::{CodegenError, CodegenErrorKind, PolyResult};
use crate::utils::matrix::{ceil_div, floor_div, vector_lcm, Rational, RationalMatrix};
use log::{debug, trace};
use std::collections::BTreeMap;

/// Annotations of a generated loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMarks {
    /// No dependency among the loop's statements is carried by the loop
    pub parallelizable: bool,
    /// Marked for parallel execution
    pub parallel: bool,
    /// Innermost parallelizable loop of its nest
    pub vectorizable: bool,
}

/// A node in the generated AST.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    /// A for loop
    For {
        iterator: String,
        lower: AstExpr,
        upper: AstExpr,
        step: i64,
        body: Vec<AstNode>,
        marks: LoopMarks,
    },
    /// A guarded statement
    If {
        condition: AstExpr,
        then_body: Vec<AstNode>,
    },
    /// A statement instance
    Stmt {
        id: StmtId,
        name: String,
        iterators: Vec<AstExpr>,
    },
    /// A block of statements
    Block {
        statements: Vec<AstNode>,
    },
}

impl AstNode {
    /// Statements instantiated anywhere below this node.
    pub fn statements(&self) -> Vec<StmtId> {
        let mut out = Vec::new();
        self.collect_statements(&mut out);
        out
    }

    fn collect_statements(&self, out: &mut Vec<StmtId>) {
        match self {
            AstNode::For { body, .. } | AstNode::If { then_body: body, .. } | AstNode::Block { statements: body } => {
                for node in body {
                    node.collect_statements(out);
                }
            }
            AstNode::Stmt { id, .. } => out.push(*id),
        }
    }

    /// All loops below and including this node, outermost first.
    pub fn loops(&self) -> Vec<&AstNode> {
        let mut out = Vec::new();
        self.collect_loops(&mut out);
        out
    }

    fn collect_loops<'a>(&'a self, out: &mut Vec<&'a AstNode>) {
        match self {
            AstNode::For { body, .. } => {
                out.push(self);
                for node in body {
                    node.collect_loops(out);
                }
            }
            AstNode::If { then_body: body, .. } | AstNode::Block { statements: body } => {
                for node in body {
                    node.collect_loops(out);
                }
            }
            AstNode::Stmt { .. } => {}
        }
    }
}

/// An expression in the generated AST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstExpr {
    /// Integer constant
    Int(i64),
    /// Loop iterator or parameter
    Var(String),
    /// Binary operation
    Binary {
        op: AstBinOp,
        left: Box<AstExpr>,
        right: Box<AstExpr>,
    },
    /// Minimum
    Min(Vec<AstExpr>),
    /// Maximum
    Max(Vec<AstExpr>),
    /// Floor division by a positive constant
    FloorDiv(Box<AstExpr>, i64),
    /// Ceiling division by a positive constant
    CeilDiv(Box<AstExpr>, i64),
}

impl AstExpr {
    pub fn int(v: i64) -> Self {
        Self::Int(v)
    }

    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    fn binary(op: AstBinOp, left: Self, right: Self) -> Self {
        Self::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn add(self, other: Self) -> Self {
        Self::binary(AstBinOp::Add, self, other)
    }

    pub fn sub(self, other: Self) -> Self {
        Self::binary(AstBinOp::Sub, self, other)
    }

    pub fn mul(self, other: Self) -> Self {
        Self::binary(AstBinOp::Mul, self, other)
    }

    pub fn rem(self, other: Self) -> Self {
        Self::binary(AstBinOp::Mod, self, other)
    }

    pub fn ge(self, other: Self) -> Self {
        Self::binary(AstBinOp::Ge, self, other)
    }

    pub fn le(self, other: Self) -> Self {
        Self::binary(AstBinOp::Le, self, other)
    }

    pub fn equals(self, other: Self) -> Self {
        Self::binary(AstBinOp::Eq, self, other)
    }

    pub fn and(self, other: Self) -> Self {
        Self::binary(AstBinOp::And, self, other)
    }

    /// Minimum of a list; constants fold and duplicates collapse.
    pub fn min_of(items: impl IntoIterator<Item = AstExpr>) -> Self {
        Self::extremum(items, false)
    }

    /// Maximum of a list; constants fold and duplicates collapse.
    pub fn max_of(items: impl IntoIterator<Item = AstExpr>) -> Self {
        Self::extremum(items, true)
    }

    fn extremum(items: impl IntoIterator<Item = AstExpr>, max: bool) -> Self {
        let mut constant: Option<i64> = None;
        let mut rest: Vec<AstExpr> = Vec::new();
        for item in items {
            match item {
                AstExpr::Int(v) => {
                    constant = Some(match constant {
                        Some(c) if max => c.max(v),
                        Some(c) => c.min(v),
                        None => v,
                    })
                }
                e if !rest.contains(&e) => rest.push(e),
                _ => {}
            }
        }
        if let Some(c) = constant {
            rest.push(AstExpr::Int(c));
        }
        match rest.len() {
            0 => AstExpr::Int(0),
            1 => rest.remove(0),
            _ if max => AstExpr::Max(rest),
            _ => AstExpr::Min(rest),
        }
    }

    fn divided(self, d: i64, ceil: bool) -> Self {
        match self {
            AstExpr::Int(v) => AstExpr::Int(if ceil { ceil_div(v, d) } else { floor_div(v, d) }),
            e if d == 1 => e,
            e if ceil => AstExpr::CeilDiv(Box::new(e), d),
            e => AstExpr::FloorDiv(Box::new(e), d),
        }
    }

    /// `sum(c * e) + constant`, folding constant terms.
    pub fn linear(terms: Vec<(i64, AstExpr)>, constant: i64) -> Self {
        let mut constant = constant;
        let mut acc: Option<AstExpr> = None;
        for (c, e) in terms {
            if c == 0 {
                continue;
            }
            if let AstExpr::Int(v) = e {
                constant += c * v;
                continue;
            }
            let magnitude = if c.abs() == 1 { e } else { AstExpr::Int(c.abs()).mul(e) };
            acc = Some(match acc {
                None if c > 0 => magnitude,
                None if c == -1 => AstExpr::Int(-1).mul(magnitude),
                None => match magnitude {
                    AstExpr::Binary { op: AstBinOp::Mul, right, .. } => AstExpr::Int(c).mul(*right),
                    other => AstExpr::Int(c).mul(other),
                },
                Some(a) if c > 0 => a.add(magnitude),
                Some(a) => a.sub(magnitude),
            });
        }
        match acc {
            None => AstExpr::Int(constant),
            Some(a) if constant > 0 => a.add(AstExpr::Int(constant)),
            Some(a) if constant < 0 => a.sub(AstExpr::Int(-constant)),
            Some(a) => a,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstBinOp {
    Add,
    Sub,
    Mul,
    Mod,
    Le,
    Ge,
    Eq,
    And,
}

impl AstBinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AstBinOp::Add => "+",
            AstBinOp::Sub => "-",
            AstBinOp::Mul => "*",
            AstBinOp::Mod => "%",
            AstBinOp::Le => "<=",
            AstBinOp::Ge => ">=",
            AstBinOp::Eq => "==",
            AstBinOp::And => "&&",
        }
    }
}

/// One statement being scanned: its schedule restricted to the current
/// path through the tree, the image of that schedule, and the guards
/// collected on the way down.
#[derive(Debug, Clone)]
struct Item {
    stmt: StmtId,
    schedule: IntegerMap,
    image: IntegerSet,
    guards: Vec<AstExpr>,
}

impl Item {
    fn fixed_at(mut self, depth: usize, value: i64) -> Self {
        self.schedule = self.schedule.constrain(|p| {
            let mut e = p.out_expr(depth);
            e.constant -= value;
            Constraint::eq_zero(e)
        });
        self.image = self.image.constrain(|p| {
            let mut e = p.col_expr(depth);
            e.constant -= value;
            Constraint::eq_zero(e)
        });
        self
    }
}

/// Builds loop nests by scanning flat schedules.
pub struct AstBuilder<'a> {
    model: &'a Model,
    dependencies: &'a UnionMap,
    parallel: bool,
    separate_loops: bool,
    time_deps: Vec<TimeDependence>,
    parallel_accesses: UnionMap,
}

impl<'a> AstBuilder<'a> {
    pub fn new(model: &'a Model, dependencies: &'a UnionMap) -> Self {
        Self {
            model,
            dependencies,
            parallel: false,
            separate_loops: false,
            time_deps: Vec::new(),
            parallel_accesses: UnionMap::new(),
        }
    }

    /// Mark outermost parallelizable loops as parallel.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Split loops over statements whose ranges at a dimension do not overlap.
    pub fn with_separation(mut self, separate: bool) -> Self {
        self.separate_loops = separate;
        self
    }

    /// Pairs of array elements touched by instances of the same parallel loop.
    pub fn parallel_accesses(&self) -> &UnionMap {
        &self.parallel_accesses
    }

    pub fn take_parallel_accesses(&mut self) -> UnionMap {
        std::mem::take(&mut self.parallel_accesses)
    }

    /// Build the AST of a schedule tree.
    pub fn build(&mut self, tree: &ScheduleTree) -> PolyResult<Vec<AstNode>> {
        let flat = tree.flatten();
        self.time_deps = time_dependencies(self.dependencies, &flat);

        let mut items = Vec::new();
        let mut width = 0;
        for map in flat.iter() {
            let Some(TupleId::Statement(stmt)) = map.space().input.map(|t| t.id) else {
                continue;
            };
            if map.is_empty()? {
                continue;
            }
            width = map.n_out();
            items.push(Item { stmt, schedule: map.clone(), image: map.range(), guards: Vec::new() });
        }
        items.sort_by_key(|item| item.stmt);
        debug!("building AST for {} statements over {} time dimensions", items.len(), width);

        let mut env = Vec::with_capacity(width);
        self.scan(items, 0, width, &mut env, false)
    }

    fn scan(
        &mut self,
        items: Vec<Item>,
        depth: usize,
        width: usize,
        env: &mut Vec<AstExpr>,
        in_parallel: bool,
    ) -> PolyResult<Vec<AstNode>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if depth == width {
            let mut out = Vec::new();
            for item in &items {
                out.extend(self.leaf(item, env)?);
            }
            return Ok(out);
        }

        let mut constants = Vec::with_capacity(items.len());
        for item in &items {
            constants.push(constant_at(&item.image, depth)?);
        }
        if constants.iter().all(Option::is_some) {
            let mut groups: BTreeMap<i64, Vec<Item>> = BTreeMap::new();
            for (item, value) in items.into_iter().zip(constants) {
                if let Some(v) = value {
                    groups.entry(v).or_default().push(item.fixed_at(depth, v));
                }
            }
            let single = groups.len() == 1;
            let mut out = Vec::new();
            for (value, group) in groups {
                env.push(AstExpr::Int(value));
                let body = self.scan(group, depth + 1, width, env, in_parallel)?;
                env.pop();
                if single {
                    out.extend(body);
                } else if !body.is_empty() {
                    out.push(AstNode::Block { statements: body });
                }
            }
            return Ok(out);
        }

        let clusters = if self.separate_loops {
            separate(items, depth)?
        } else {
            vec![items]
        };
        let mut out = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            out.push(self.build_loop(cluster, depth, width, env, in_parallel)?);
        }
        Ok(out)
    }

    fn build_loop(
        &mut self,
        mut items: Vec<Item>,
        depth: usize,
        width: usize,
        env: &mut Vec<AstExpr>,
        in_parallel: bool,
    ) -> PolyResult<AstNode> {
        let iterator = format!("c{}", depth);
        let mut own = Vec::with_capacity(items.len());
        for item in &items {
            own.push(self.bounds_at(item, depth, env)?);
        }
        let lower = AstExpr::min_of(own.iter().map(|b| b.0.clone()));
        let upper = AstExpr::max_of(own.iter().map(|b| b.1.clone()));
        let var = AstExpr::var(&iterator);
        for (item, (lo, hi)) in items.iter_mut().zip(own) {
            if lo != lower {
                item.guards.push(var.clone().ge(lo));
            }
            if hi != upper {
                item.guards.push(var.clone().le(hi));
            }
        }

        let stmts: Vec<StmtId> = items.iter().map(|item| item.stmt).collect();
        let parallelizable = !self.carried(&stmts, depth)?;
        let parallel = parallelizable && self.parallel && !in_parallel;
        if parallel {
            self.harvest(&items, depth)?;
        }
        trace!("loop {} over {:?}: parallelizable {}, parallel {}", iterator, stmts, parallelizable, parallel);

        env.push(var);
        let body = self.scan(items, depth + 1, width, env, in_parallel || parallel)?;
        env.pop();

        let vectorizable = parallelizable && !body.iter().any(has_parallelizable_loop);
        Ok(AstNode::For {
            iterator,
            lower,
            upper,
            step: 1,
            body,
            marks: LoopMarks { parallelizable, parallel, vectorizable },
        })
    }

    /// Lower and upper bound of time dimension `depth` over an item's image.
    fn bounds_at(&self, item: &Item, depth: usize, env: &[AstExpr]) -> PolyResult<(AstExpr, AstExpr)> {
        let params = self.model.context.param_names(item.image.space());
        let mut lowers = Vec::new();
        let mut uppers = Vec::new();
        for piece in item.image.pieces() {
            if piece.is_empty()? {
                continue;
            }
            let mut p = piece.project_out_outputs(depth + 1);
            while p.n_local() > 0 {
                p = p.eliminate_local(p.n_cols() - 1);
            }
            let mut lo = Vec::new();
            let mut hi = Vec::new();
            for c in p.constraints() {
                let a = c.expr.coeff(depth);
                if a == 0 {
                    continue;
                }
                let mut rest = c.expr.clone();
                rest.set_coeff(depth, 0);
                // a*t + rest >= 0 (or == 0)
                let (num, d) = if a > 0 {
                    (to_ast(&rest.scale(-1), env, &params), a)
                } else {
                    (to_ast(&rest, env, &params), -a)
                };
                if c.is_equality() {
                    lo.push(num.clone().divided(d, true));
                    hi.push(num.divided(d, false));
                } else if a > 0 {
                    lo.push(num.divided(d, true));
                } else {
                    hi.push(num.divided(d, false));
                }
            }
            if lo.is_empty() || hi.is_empty() {
                let name = &self.model.statement(item.stmt).name;
                let which = if lo.is_empty() { "lower" } else { "upper" };
                return Err(CodegenError::new(
                    CodegenErrorKind::BoundGeneration,
                    format!("Time dimension {} of statement {} has no {} bound.", depth, name, which),
                )
                .into());
            }
            lowers.push(AstExpr::max_of(lo));
            uppers.push(AstExpr::min_of(hi));
        }
        Ok((AstExpr::min_of(lowers), AstExpr::max_of(uppers)))
    }

    fn carried(&self, stmts: &[StmtId], depth: usize) -> PolyResult<bool> {
        let deps: Vec<TimeDependence> = self
            .time_deps
            .iter()
            .filter(|d| stmts.contains(&d.source) && stmts.contains(&d.target))
            .cloned()
            .collect();
        is_carried_at(&deps, depth)
    }

    /// Record the array elements accessed by distinct iterations of a
    /// parallel loop at `depth`, for every pair of accesses to the same
    /// array of which at least one writes.
    fn harvest(&mut self, items: &[Item], depth: usize) -> PolyResult<()> {
        let Some(first) = items.first() else {
            return Ok(());
        };
        let concurrent = concurrent_at(first.schedule.n_out(), depth);
        for a in items {
            let from = self.model.statement(a.stmt);
            for b in items {
                let to = self.model.statement(b.stmt);
                for x in &from.accesses {
                    for y in to.accesses.iter().filter(|y| y.array == x.array && (x.writing || y.writing)) {
                        let pairs = x
                            .relation
                            .reverse()
                            .apply_range(&a.schedule)
                            .apply_range(&concurrent)
                            .apply_range(&b.schedule.reverse())
                            .apply_range(&y.relation);
                        if !pairs.is_empty()? {
                            trace!("parallel accesses of {} between {} and {}", x.array, from.name, to.name);
                            self.parallel_accesses.add(pairs);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// A statement instance with its iterators expressed over the loop
    /// iterators, wrapped in its guards.
    fn leaf(&self, item: &Item, env: &[AstExpr]) -> PolyResult<Option<AstNode>> {
        let stmt = self.model.statement(item.stmt);
        let Some(piece) = item.schedule.pieces().iter().find(|p| !p.is_obviously_empty()) else {
            return Ok(None);
        };
        let params = self.model.context.param_names(piece.space());
        let n_stmt = stmt.dims();
        let mut guards = item.guards.clone();
        let iterators = if n_stmt == 0 {
            Vec::new()
        } else {
            self.invert(stmt.name.as_str(), piece, n_stmt, env, &params, &mut guards)?
        };

        let node = AstNode::Stmt { id: item.stmt, name: stmt.name.clone(), iterators };
        if guards.is_empty() {
            return Ok(Some(node));
        }
        let mut guards = guards.into_iter();
        let Some(first) = guards.next() else {
            return Ok(Some(node));
        };
        let condition = guards.fold(first, AstExpr::and);
        Ok(Some(AstNode::If { condition, then_body: vec![node] }))
    }

    fn invert(
        &self,
        name: &str,
        piece: &Polyhedron,
        n_stmt: usize,
        env: &[AstExpr],
        params: &[String],
        guards: &mut Vec<AstExpr>,
    ) -> PolyResult<Vec<AstExpr>> {
        let n_cols = piece.n_cols();
        let cols = n_cols + piece.n_param() + 1;
        let rows: Vec<Vec<i64>> = piece
            .constraints()
            .iter()
            .filter(|c| c.is_equality())
            .map(|c| {
                let mut row = c.expr.coeffs.clone();
                row.extend(&c.expr.param_coeffs);
                row.push(c.expr.constant);
                row
            })
            .collect();
        let unknowns: Vec<usize> = (0..n_stmt).collect();
        let non_invertible = || {
            CodegenError::new(
                CodegenErrorKind::NonInvertibleSchedule,
                format!("Schedule of {} does not determine its instances.", name),
            )
        };
        let solution = RationalMatrix::from_rows(&rows, cols)
            .solve_for(&unknowns)
            .ok_or_else(non_invertible)?;

        let time_cols = n_stmt..n_stmt + env.len();
        let mut iterators = Vec::with_capacity(n_stmt);
        for expr in solution {
            if (time_cols.end..n_cols).any(|c| expr[c] != Rational::from_integer(0)) {
                return Err(non_invertible().into());
            }
            let dens: Vec<i64> = expr.iter().map(|q| *q.denom() as i64).collect();
            let den = vector_lcm(&dens).max(1);
            let scaled = |q: &Rational| (q * Rational::from_integer(den as i128)).to_integer() as i64;
            let mut terms: Vec<(i64, AstExpr)> = time_cols
                .clone()
                .zip(env.iter())
                .map(|(c, e)| (scaled(&expr[c]), e.clone()))
                .collect();
            terms.extend(
                params
                    .iter()
                    .enumerate()
                    .map(|(k, p)| (scaled(&expr[n_cols + k]), AstExpr::var(p))),
            );
            let numerator = AstExpr::linear(terms, scaled(&expr[cols - 1]));
            if den == 1 {
                iterators.push(numerator);
            } else if let AstExpr::Int(v) = numerator {
                iterators.push(AstExpr::Int(floor_div(v, den)));
            } else {
                guards.push(numerator.clone().rem(AstExpr::Int(den)).equals(AstExpr::Int(0)));
                iterators.push(numerator.divided(den, false));
            }
        }
        Ok(iterators)
    }
}

/// Affine expression over `[t_0..t_{depth-1}, params]` with loop
/// iterators and parameter names substituted.
fn to_ast(expr: &AffineExpr, env: &[AstExpr], params: &[String]) -> AstExpr {
    let mut terms: Vec<(i64, AstExpr)> = env
        .iter()
        .enumerate()
        .map(|(j, e)| (expr.coeff(j), e.clone()))
        .collect();
    terms.extend(
        params
            .iter()
            .enumerate()
            .map(|(k, p)| (expr.param_coeff(k), AstExpr::var(p))),
    );
    AstExpr::linear(terms, expr.constant)
}

fn constant_at(image: &IntegerSet, depth: usize) -> PolyResult<Option<i64>> {
    match (image.min_dim(depth)?, image.max_dim(depth)?) {
        (Optimum::Value(lo), Optimum::Value(hi)) if lo == hi => Ok(Some(lo)),
        _ => Ok(None),
    }
}

/// Group items into runs whose ranges at `depth` are pairwise disjoint,
/// ordered by their lower ends. Unbounded ranges keep everything together.
fn separate(items: Vec<Item>, depth: usize) -> PolyResult<Vec<Vec<Item>>> {
    let mut ranged = Vec::with_capacity(items.len());
    for item in &items {
        match (item.image.min_dim(depth)?, item.image.max_dim(depth)?) {
            (Optimum::Value(lo), Optimum::Value(hi)) => ranged.push((lo, hi)),
            _ => return Ok(vec![items]),
        }
    }
    let mut order: Vec<(i64, i64, Item)> = ranged
        .into_iter()
        .zip(items)
        .map(|((lo, hi), item)| (lo, hi, item))
        .collect();
    order.sort_by_key(|(lo, _, item)| (*lo, item.stmt));

    let mut clusters: Vec<Vec<Item>> = Vec::new();
    let mut reach = i64::MIN;
    for (lo, hi, item) in order {
        match clusters.last_mut() {
            Some(last) if lo <= reach => last.push(item),
            _ => clusters.push(vec![item]),
        }
        reach = reach.max(hi);
    }
    Ok(clusters)
}

/// Time pairs that agree before `dim` and differ at `dim`.
fn concurrent_at(width: usize, dim: usize) -> IntegerMap {
    let space = Space::map(Tuple::time(width), Tuple::time(width));
    let pieces: Vec<Polyhedron> = [1i64, -1]
        .into_iter()
        .map(|sign| {
            let mut p = Polyhedron::universe(space.clone());
            for j in 0..dim {
                p.add_constraint(Constraint::eq(p.out_expr(j), p.in_expr(j)));
            }
            let mut gap = (p.out_expr(dim) - p.in_expr(dim)).scale(sign);
            gap.constant -= 1;
            p.with_constraint(Constraint::ge_zero(gap))
        })
        .collect();
    IntegerMap::from_pieces(space, pieces)
}

fn has_parallelizable_loop(node: &AstNode) -> bool {
    match node {
        AstNode::For { marks, body, .. } => marks.parallelizable || body.iter().any(has_parallelizable_loop),
        AstNode::If { then_body: body, .. } | AstNode::Block { statements: body } => {
            body.iter().any(has_parallelizable_loop)
        }
        AstNode::Stmt { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ModelSummary;
    use crate::ir::ModelBuilder;
    use crate::transform::scheduler::{AffineScheduler, SchedulingPrimitive};

    fn build(model: &Model, parallel: bool) -> (Vec<AstNode>, UnionMap) {
        let summary = ModelSummary::new(model).unwrap();
        let tree = AffineScheduler::new().schedule(model, &summary).unwrap();
        let mut builder = AstBuilder::new(model, &summary.dependencies).with_parallel(parallel);
        let ast = builder.build(&tree).unwrap();
        (ast, builder.take_parallel_accesses())
    }

    #[test]
    fn test_linear_folding() {
        let c = AstExpr::var("c1");
        assert_eq!(AstExpr::linear(vec![(1, c.clone())], 0), c);
        assert_eq!(AstExpr::linear(vec![(2, AstExpr::Int(3))], 1), AstExpr::Int(7));
        assert_eq!(
            AstExpr::linear(vec![(1, c.clone())], -2),
            c.clone().sub(AstExpr::Int(2))
        );
        assert_eq!(AstExpr::min_of(vec![AstExpr::Int(4), AstExpr::Int(2)]), AstExpr::Int(2));
        assert_eq!(AstExpr::max_of(vec![c.clone(), c.clone()]), c);
    }

    #[test]
    fn test_single_loop() {
        let mut b = ModelBuilder::new();
        b.statement("s", &[(0, Some(3))]).unwrap();
        let model = b.build().unwrap();
        let (ast, _) = build(&model, false);
        assert_eq!(ast.len(), 1);
        match &ast[0] {
            AstNode::For { iterator, lower, upper, body, marks, .. } => {
                assert_eq!(iterator, "c1");
                assert_eq!(*lower, AstExpr::Int(0));
                assert_eq!(*upper, AstExpr::Int(3));
                assert!(marks.parallelizable);
                assert!(marks.vectorizable);
                assert!(!marks.parallel);
                match &body[0] {
                    AstNode::Stmt { name, iterators, .. } => {
                        assert_eq!(name, "s");
                        assert_eq!(iterators, &vec![AstExpr::var("c1")]);
                    }
                    other => panic!("expected statement, got {:?}", other),
                }
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_carried_dependency_not_parallel() {
        let mut b = ModelBuilder::new();
        let s = b.statement("acc", &[(0, Some(5))]).unwrap();
        b.self_order(s, &[vec![1, 1]]).unwrap();
        let model = b.build().unwrap();
        let (ast, accesses) = build(&model, true);
        let loops = ast[0].loops();
        assert_eq!(loops.len(), 1);
        if let AstNode::For { marks, .. } = loops[0] {
            assert!(!marks.parallelizable);
            assert!(!marks.parallel);
        }
        assert!(accesses.is_empty().unwrap());
    }

    #[test]
    fn test_independent_statements_in_order() {
        let mut b = ModelBuilder::new();
        b.statement("s", &[(0, Some(2))]).unwrap();
        b.statement("t", &[(0, Some(2))]).unwrap();
        let model = b.build().unwrap();
        let (ast, _) = build(&model, false);
        let order: Vec<StmtId> = ast.iter().flat_map(|n| n.statements()).collect();
        assert_eq!(order, vec![StmtId(0), StmtId(1)]);
    }

    #[test]
    fn test_parallel_loop_harvests_shared_element() {
        let mut b = ModelBuilder::new();
        let x = b.array("x", &[(0, Some(0))]).unwrap();
        let s = b.statement("s", &[(0, Some(3))]).unwrap();
        b.write(s, x, &[vec![0, 0]]).unwrap();
        let model = b.build().unwrap();
        let (ast, accesses) = build(&model, true);
        if let AstNode::For { marks, .. } = &ast[0] {
            assert!(marks.parallel);
        } else {
            panic!("expected loop");
        }
        assert!(!accesses.is_empty().unwrap());
    }

    #[test]
    fn test_separated_loops() {
        let c = |lo: i64, hi: i64, s: usize| {
            let tuple = Tuple::statement(StmtId(s), 1);
            let set = IntegerSet::boxed(Space::set(Tuple::time(1)), &[(lo, Some(hi))]);
            Item {
                stmt: StmtId(s),
                schedule: IntegerMap::universe(Space::map(tuple, Tuple::time(1))),
                image: set,
                guards: Vec::new(),
            }
        };
        let clusters = separate(vec![c(5, 9, 1), c(0, 3, 0), c(2, 4, 2)], 0).unwrap();
        let ids: Vec<Vec<StmtId>> = clusters.iter().map(|k| k.iter().map(|i| i.stmt).collect()).collect();
        assert_eq!(ids, vec![vec![StmtId(0), StmtId(2)], vec![StmtId(1)]]);
    }
}
