//! Exact linear and integer linear programming.
//!
//! A dense two-phase simplex over `Ratio<i128>` with Bland's rule, and a
//! depth-first branch and bound on top of it. All variables are free
//! (unbounded in sign); constraints are `a.x + b >= 0` or `a.x + b = 0`.
//!
//! Integer problems are presolved by substituting away every variable that
//! has a unit coefficient in an equality. Affine schedules and access
//! relations are mostly equalities of this kind, so the programs that
//! reach the simplex are small.
//!
//! Branch and bound runs inside a box around an optimum of the relaxation.
//! By the proximity theorem of Cook, Gerards, Schrijver and Tardos, an
//! integer optimum (when one exists) lies within `n * D` of every rational
//! optimum in the max norm, where `D` bounds the subdeterminants of the
//! constraint matrix. Without the box, branching on an unbounded polyhedron
//! can follow a ray forever.

use crate::utils::errors::{SolverError, SolverErrorKind};
use crate::utils::matrix::{rational_ceil, rational_floor, Rational};
use log::trace;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// Default budget of branch and bound nodes per integer program.
pub const DEFAULT_NODE_LIMIT: usize = 5_000;

const PIVOT_LIMIT: usize = 20_000;

/// One constraint row over the solver variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    pub coeffs: Vec<i128>,
    pub constant: i128,
    pub equality: bool,
}

impl Row {
    pub fn ge(coeffs: Vec<i128>, constant: i128) -> Self {
        Self { coeffs, constant, equality: false }
    }

    pub fn eq(coeffs: Vec<i128>, constant: i128) -> Self {
        Self { coeffs, constant, equality: true }
    }

    fn value_at(&self, point: &[i128]) -> i128 {
        self.constant + self.coeffs.iter().zip(point).map(|(a, x)| a * x).sum::<i128>()
    }
}

/// Result of a rational linear program.
#[derive(Debug, Clone, PartialEq)]
pub enum LpResult {
    Optimal { value: Rational, point: Vec<Rational> },
    Unbounded,
    Infeasible,
}

/// Result of an integer linear program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IlpResult {
    Optimal { value: i128, point: Vec<i128> },
    Unbounded,
    Infeasible,
}

struct Tableau {
    rows: Vec<Vec<Rational>>,
    basis: Vec<usize>,
    ncols: usize,
}

impl Tableau {
    fn rhs(&self, r: usize) -> Rational {
        self.rows[r][self.ncols]
    }

    fn pivot(&mut self, r: usize, c: usize) {
        let inv = self.rows[r][c].recip();
        for v in self.rows[r].iter_mut() {
            *v *= inv;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r || row[c].is_zero() {
                continue;
            }
            let factor = row[c];
            for (v, p) in row.iter_mut().zip(&pivot_row) {
                if !p.is_zero() {
                    *v -= factor * p;
                }
            }
        }
        self.basis[r] = c;
    }

    /// Maximize `obj` over columns `< allowed`. Returns `false` when unbounded.
    fn optimize(&mut self, obj: &[Rational], allowed: usize) -> Result<bool, SolverError> {
        for _ in 0..PIVOT_LIMIT {
            let mut entering = None;
            for j in 0..allowed {
                if self.basis.contains(&j) {
                    continue;
                }
                let mut reduced = obj[j];
                for (i, &b) in self.basis.iter().enumerate() {
                    if !obj[b].is_zero() && !self.rows[i][j].is_zero() {
                        reduced -= obj[b] * self.rows[i][j];
                    }
                }
                if reduced.is_positive() {
                    entering = Some(j);
                    break;
                }
            }
            let Some(c) = entering else {
                return Ok(true);
            };
            let mut leaving: Option<(usize, Rational)> = None;
            for r in 0..self.rows.len() {
                let a = self.rows[r][c];
                if !a.is_positive() {
                    continue;
                }
                let ratio = self.rhs(r) / a;
                leaving = match leaving {
                    None => Some((r, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio
                            || (ratio == best_ratio && self.basis[r] < self.basis[best])
                        {
                            Some((r, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }
            match leaving {
                Some((r, _)) => self.pivot(r, c),
                None => return Ok(false),
            }
        }
        Err(SolverError::new(SolverErrorKind::NodeLimit, "Simplex pivot limit exceeded"))
    }
}

/// Maximize `objective . x` subject to `rows` over rational `x`.
pub fn lp_maximize(rows: &[Row], n_vars: usize, objective: &[Rational]) -> Result<LpResult, SolverError> {
    // Columns: u (n), v (n), slacks (one per inequality), artificials (one per row).
    let n_ineq = rows.iter().filter(|r| !r.equality).count();
    let m = rows.len();
    let art_start = 2 * n_vars + n_ineq;
    let ncols = art_start + m;
    let mut tableau = Tableau { rows: Vec::with_capacity(m), basis: Vec::with_capacity(m), ncols };
    let mut slack = 2 * n_vars;
    for (i, row) in rows.iter().enumerate() {
        let mut t = vec![Rational::zero(); ncols + 1];
        for (j, &a) in row.coeffs.iter().enumerate() {
            t[j] = Rational::from_integer(a);
            t[n_vars + j] = Rational::from_integer(-a);
        }
        if !row.equality {
            t[slack] = -Rational::one();
            slack += 1;
        }
        t[ncols] = Rational::from_integer(-row.constant);
        if t[ncols].is_negative() {
            for v in t.iter_mut() {
                *v = -*v;
            }
        }
        t[art_start + i] = Rational::one();
        tableau.rows.push(t);
        tableau.basis.push(art_start + i);
    }

    // Phase 1: drive the artificials to zero.
    let mut phase1 = vec![Rational::zero(); ncols];
    for v in phase1.iter_mut().skip(art_start) {
        *v = -Rational::one();
    }
    tableau.optimize(&phase1, ncols)?;
    let infeasibility: Rational = (0..m)
        .filter(|&r| tableau.basis[r] >= art_start)
        .map(|r| tableau.rhs(r))
        .fold(Rational::zero(), |a, b| a + b);
    if infeasibility.is_positive() {
        return Ok(LpResult::Infeasible);
    }
    // Pivot remaining (zero-valued) artificials out, dropping redundant rows.
    let mut r = 0;
    while r < tableau.rows.len() {
        if tableau.basis[r] >= art_start {
            match (0..art_start).find(|&c| !tableau.rows[r][c].is_zero()) {
                Some(c) => {
                    tableau.pivot(r, c);
                    r += 1;
                }
                None => {
                    tableau.rows.remove(r);
                    tableau.basis.remove(r);
                }
            }
        } else {
            r += 1;
        }
    }

    // Phase 2.
    let mut phase2 = vec![Rational::zero(); ncols];
    for j in 0..n_vars {
        phase2[j] = objective[j];
        phase2[n_vars + j] = -objective[j];
    }
    if !tableau.optimize(&phase2, art_start)? {
        return Ok(LpResult::Unbounded);
    }
    let mut values = vec![Rational::zero(); ncols];
    for (r, &b) in tableau.basis.iter().enumerate() {
        values[b] = tableau.rhs(r);
    }
    let point: Vec<Rational> = (0..n_vars).map(|j| values[j] - values[n_vars + j]).collect();
    let value = point.iter().zip(objective).fold(Rational::zero(), |acc, (x, c)| acc + x * c);
    Ok(LpResult::Optimal { value, point })
}

/// Substitutions recorded by presolve, replayed in reverse to recover a point.
struct Presolved {
    rows: Vec<Row>,
    objective: Vec<i128>,
    objective_constant: i128,
    /// Original index of each remaining variable.
    kept: Vec<usize>,
    /// `(var, coeffs over original vars, constant)`: var = coeffs . x + constant
    eliminated: Vec<(usize, Vec<i128>, i128)>,
    n_orig: usize,
}

impl Presolved {
    fn expand(&self, reduced: &[i128]) -> Vec<i128> {
        let mut x = vec![0i128; self.n_orig];
        for (k, &orig) in self.kept.iter().enumerate() {
            x[orig] = reduced[k];
        }
        for (var, coeffs, constant) in self.eliminated.iter().rev() {
            x[*var] = constant + coeffs.iter().zip(&x).map(|(a, v)| a * v).sum::<i128>();
        }
        x
    }
}

fn normalize_row(row: &Row) -> Option<Option<Row>> {
    let g = row.coeffs.iter().fold(0i128, |acc, c| acc.gcd(&c.abs()));
    if g == 0 {
        let holds = if row.equality { row.constant == 0 } else { row.constant >= 0 };
        return if holds { Some(None) } else { None };
    }
    let mut out = row.clone();
    if g > 1 {
        if row.equality {
            if row.constant % g != 0 {
                return None;
            }
            out.constant /= g;
        } else {
            out.constant = Integer::div_floor(&row.constant, &g);
        }
        for c in out.coeffs.iter_mut() {
            *c /= g;
        }
    }
    Some(Some(out))
}

/// Returns `None` if presolve proves the system infeasible.
fn presolve(rows: &[Row], n_vars: usize, objective: &[i128]) -> Option<Presolved> {
    let mut rows: Vec<Row> = rows.to_vec();
    let mut objective = objective.to_vec();
    let mut objective_constant = 0i128;
    let mut alive = vec![true; n_vars];
    let mut eliminated = Vec::new();

    loop {
        let mut normalized = Vec::with_capacity(rows.len());
        for row in &rows {
            match normalize_row(row) {
                None => return None,
                Some(None) => {}
                Some(Some(r)) => {
                    if !normalized.contains(&r) {
                        normalized.push(r);
                    }
                }
            }
        }
        rows = normalized;

        let pick = rows.iter().enumerate().find_map(|(i, r)| {
            if !r.equality {
                return None;
            }
            r.coeffs.iter().position(|c| c.abs() == 1).map(|v| (i, v))
        });
        let Some((ri, var)) = pick else { break };
        let row = rows.remove(ri);
        // a*var + rest = 0 with a = +-1  ==>  var = -a * rest
        let a = row.coeffs[var];
        let mut coeffs: Vec<i128> = row.coeffs.iter().map(|c| -a * c).collect();
        coeffs[var] = 0;
        let constant = -a * row.constant;
        for r in rows.iter_mut() {
            let k = r.coeffs[var];
            if k != 0 {
                r.coeffs[var] = 0;
                for (c, s) in r.coeffs.iter_mut().zip(&coeffs) {
                    *c += k * s;
                }
                r.constant += k * constant;
            }
        }
        let k = objective[var];
        if k != 0 {
            objective[var] = 0;
            for (c, s) in objective.iter_mut().zip(&coeffs) {
                *c += k * s;
            }
            objective_constant += k * constant;
        }
        alive[var] = false;
        eliminated.push((var, coeffs, constant));
    }

    let kept: Vec<usize> = (0..n_vars).filter(|&v| alive[v]).collect();
    let rows = rows
        .into_iter()
        .map(|r| Row {
            coeffs: kept.iter().map(|&v| r.coeffs[v]).collect(),
            constant: r.constant,
            equality: r.equality,
        })
        .collect();
    let objective = kept.iter().map(|&v| objective[v]).collect();
    Some(Presolved { rows, objective, objective_constant, kept, eliminated, n_orig: n_vars })
}

fn to_rationals(v: &[i128]) -> Vec<Rational> {
    v.iter().map(|&x| Rational::from_integer(x)).collect()
}

/// Maximize an integer objective over the integer points of `rows`.
pub fn ilp_maximize(
    rows: &[Row],
    n_vars: usize,
    objective: &[i128],
    node_limit: usize,
) -> Result<IlpResult, SolverError> {
    let Some(pre) = presolve(rows, n_vars, objective) else {
        return Ok(IlpResult::Infeasible);
    };
    let n = pre.kept.len();
    if n == 0 {
        // Everything was determined by equalities.
        let point = pre.expand(&[]);
        if rows.iter().all(|r| {
            let v = r.value_at(&point);
            if r.equality { v == 0 } else { v >= 0 }
        }) {
            return Ok(IlpResult::Optimal { value: pre.objective_constant, point });
        }
        return Ok(IlpResult::Infeasible);
    }

    let obj = to_rationals(&pre.objective);
    match lp_maximize(&pre.rows, n, &obj)? {
        LpResult::Infeasible => Ok(IlpResult::Infeasible),
        LpResult::Unbounded => {
            // The relaxation recedes along a ray that improves the objective.
            // Rational data make the integer program unbounded as well as
            // soon as it has one integer point.
            let zero = vec![Rational::zero(); n];
            let LpResult::Optimal { point, .. } = lp_maximize(&pre.rows, n, &zero)? else {
                return Ok(IlpResult::Infeasible);
            };
            let rows = within_proximity(&pre.rows, n, &point);
            match branch_and_bound(&rows, n, &zero, &vec![0; n], node_limit)? {
                Some(_) => Ok(IlpResult::Unbounded),
                None => Ok(IlpResult::Infeasible),
            }
        }
        LpResult::Optimal { point, .. } => {
            let rows = within_proximity(&pre.rows, n, &point);
            match branch_and_bound(&rows, n, &obj, &pre.objective, node_limit)? {
                Some((value, point)) => Ok(IlpResult::Optimal {
                    value: value + pre.objective_constant,
                    point: pre.expand(&point),
                }),
                None => Ok(IlpResult::Infeasible),
            }
        }
    }
}

/// Hadamard bound on the absolute subdeterminants of the constraint
/// matrix: the product of the `n` largest row norms, counting rows that
/// differ only in sign once.
fn subdeterminant_bound(rows: &[Row], n: usize) -> Option<i128> {
    let mut directions: Vec<Vec<i128>> = Vec::new();
    for row in rows {
        let Some(&lead) = row.coeffs.iter().find(|c| **c != 0) else { continue };
        let dir: Vec<i128> = if lead < 0 {
            row.coeffs.iter().map(|c| -c).collect()
        } else {
            row.coeffs.clone()
        };
        if !directions.contains(&dir) {
            directions.push(dir);
        }
    }
    let mut norms: Vec<f64> = directions
        .iter()
        .map(|d| d.iter().map(|&c| (c as f64) * (c as f64)).sum::<f64>().sqrt())
        .collect();
    norms.sort_by(|a, b| b.total_cmp(a));
    let bound: f64 = norms.iter().take(n).product();
    let bound = bound.ceil() + 1.0;
    (bound.is_finite() && bound < 1e15).then_some(bound as i128)
}

/// `rows` plus the box of proximity radius around the rational point
/// `center`. Rows are returned unchanged when the radius is out of range.
fn within_proximity(rows: &[Row], n: usize, center: &[Rational]) -> Vec<Row> {
    let mut out = rows.to_vec();
    let Some(delta) = subdeterminant_bound(rows, n) else {
        return out;
    };
    let radius = Rational::from_integer(delta * n as i128);
    trace!("branch and bound box of radius {}", radius);
    for (j, x) in center.iter().enumerate() {
        let mut unit = vec![0i128; n];
        unit[j] = 1;
        let low = rational_ceil(&(x - &radius));
        let high = rational_floor(&(x + &radius));
        out.push(Row::ge(unit.iter().map(|c| -c).collect(), high));
        out.push(Row::ge(unit, -low));
    }
    out
}

/// Find any integer point of `rows`.
pub fn integer_point(rows: &[Row], n_vars: usize, node_limit: usize) -> Result<Option<Vec<i128>>, SolverError> {
    match ilp_maximize(rows, n_vars, &vec![0; n_vars], node_limit)? {
        IlpResult::Optimal { point, .. } => Ok(Some(point)),
        // A zero objective is never unbounded.
        IlpResult::Unbounded | IlpResult::Infeasible => Ok(None),
    }
}

fn branch_and_bound(
    rows: &[Row],
    n: usize,
    obj: &[Rational],
    int_obj: &[i128],
    node_limit: usize,
) -> Result<Option<(i128, Vec<i128>)>, SolverError> {
    let mut best: Option<(i128, Vec<i128>)> = None;
    let mut stack: Vec<Vec<Row>> = vec![Vec::new()];
    let mut nodes = 0usize;
    while let Some(extra) = stack.pop() {
        nodes += 1;
        if nodes > node_limit {
            return Err(SolverError::new(
                SolverErrorKind::NodeLimit,
                format!("Integer programming node limit ({}) exceeded", node_limit),
            ));
        }
        let mut all = rows.to_vec();
        all.extend(extra.iter().cloned());
        let (value, point) = match lp_maximize(&all, n, obj)? {
            LpResult::Optimal { value, point } => (value, point),
            LpResult::Infeasible => continue,
            // The box keeps every node bounded unless its radius overflowed.
            LpResult::Unbounded => continue,
        };
        if let Some((b, _)) = &best {
            if rational_floor(&value) <= *b {
                continue;
            }
        }
        let rounded: Vec<i128> = point.iter().map(|x| x.round().to_integer()).collect();
        if rows.iter().all(|r| {
            let v = r.value_at(&rounded);
            if r.equality { v == 0 } else { v >= 0 }
        }) {
            let v: i128 = rounded.iter().zip(int_obj).map(|(a, b)| a * b).sum();
            let improves = match &best {
                Some((b, _)) => v > *b,
                None => true,
            };
            if improves {
                trace!("branch and bound: rounded point with value {}", v);
                best = Some((v, rounded));
                if rational_floor(&value) <= v {
                    continue;
                }
            }
        }
        match point.iter().position(|x| !x.is_integer()) {
            None => {
                let ip: Vec<i128> = point.iter().map(|x| x.to_integer()).collect();
                let v: i128 = ip.iter().zip(int_obj).map(|(a, b)| a * b).sum();
                trace!("branch and bound: integer point with value {}", v);
                best = Some((v, ip));
            }
            Some(j) => {
                let x = point[j];
                let mut unit = vec![0i128; n];
                unit[j] = 1;
                // x_j <= floor  <=>  -x_j + floor >= 0
                let mut down = extra.clone();
                down.push(Row::ge(unit.iter().map(|c| -c).collect(), rational_floor(&x)));
                // x_j >= ceil  <=>  x_j - ceil >= 0
                let mut up = extra;
                up.push(Row::ge(unit, -rational_ceil(&x)));
                let frac = x - Rational::from_integer(rational_floor(&x));
                if frac < Rational::new(1, 2) {
                    stack.push(up);
                    stack.push(down);
                } else {
                    stack.push(down);
                    stack.push(up);
                }
            }
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: i128) -> Rational {
        Rational::from_integer(v)
    }

    #[test]
    fn test_lp_box() {
        // 0 <= x <= 4, 0 <= y <= 3, maximize x + y
        let rows = vec![
            Row::ge(vec![1, 0], 0),
            Row::ge(vec![-1, 0], 4),
            Row::ge(vec![0, 1], 0),
            Row::ge(vec![0, -1], 3),
        ];
        match lp_maximize(&rows, 2, &[q(1), q(1)]).unwrap() {
            LpResult::Optimal { value, .. } => assert_eq!(value, q(7)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lp_unbounded_and_infeasible() {
        let rows = vec![Row::ge(vec![1], 0)];
        assert_eq!(lp_maximize(&rows, 1, &[q(1)]).unwrap(), LpResult::Unbounded);
        let rows = vec![Row::ge(vec![1], -2), Row::ge(vec![-1], 1)];
        assert_eq!(lp_maximize(&rows, 1, &[q(1)]).unwrap(), LpResult::Infeasible);
    }

    #[test]
    fn test_ilp_rounding() {
        // 2x <= 7, maximize x  ==> 3
        let rows = vec![Row::ge(vec![-2], 7), Row::ge(vec![1], 0)];
        match ilp_maximize(&rows, 1, &[1], DEFAULT_NODE_LIMIT).unwrap() {
            IlpResult::Optimal { value, .. } => assert_eq!(value, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ilp_needs_branching() {
        // 1 <= 3x - 3y <= 2 has no integer point (caught by tightening)
        let rows = vec![Row::ge(vec![3, -3], -1), Row::ge(vec![-3, 3], 2)];
        assert!(integer_point(&rows, 2, DEFAULT_NODE_LIMIT).unwrap().is_none());
        // 2x + 2y = 2z + 1 is infeasible via the equality gcd
        let rows = vec![Row::eq(vec![2, 2, -2], -1)];
        assert!(integer_point(&rows, 3, DEFAULT_NODE_LIMIT).unwrap().is_none());
        // 0 <= 4x - 6y <= 1 with 0 <= x <= 5 ; integer points exist (x = 0, y = 0)
        let rows = vec![
            Row::ge(vec![4, -6], 0),
            Row::ge(vec![-4, 6], 1),
            Row::ge(vec![1, 0], 0),
            Row::ge(vec![-1, 0], 5),
        ];
        let p = integer_point(&rows, 2, DEFAULT_NODE_LIMIT).unwrap().expect("feasible");
        let v = 4 * p[0] - 6 * p[1];
        assert!((0..=1).contains(&v));
    }

    #[test]
    fn test_ilp_presolve_recovers_point() {
        // t = 2i + 1, 0 <= i <= 4, maximize t
        let rows = vec![
            Row::eq(vec![-2, 1], -1),
            Row::ge(vec![1, 0], 0),
            Row::ge(vec![-1, 0], 4),
        ];
        match ilp_maximize(&rows, 2, &[0, 1], DEFAULT_NODE_LIMIT).unwrap() {
            IlpResult::Optimal { value, point } => {
                assert_eq!(value, 9);
                assert_eq!(point, vec![4, 9]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ilp_unbounded() {
        let rows = vec![Row::ge(vec![1, -1], 0)];
        assert_eq!(
            ilp_maximize(&rows, 2, &[1, 0], DEFAULT_NODE_LIMIT).unwrap(),
            IlpResult::Unbounded
        );
    }

    #[test]
    fn test_ilp_bounded_objective_on_unbounded_region() {
        // Two readers of x[2a + b] and x[2c + d] sharing the element a
        // writer stores at x[3i + j], after presolve removed j and d:
        // 0 <= 2a + b - 3i <= 2, 0 <= b <= 1, 0 <= 2a + b - 2c <= 1,
        // i, a, c >= 0. The relaxation peaks at c - a = 1/2 along a ray.
        let rows = vec![
            Row::ge(vec![1, 0, 0, 0], 0),
            Row::ge(vec![0, 1, 0, 0], 0),
            Row::ge(vec![0, 0, 1, 0], 0),
            Row::ge(vec![0, 0, -1, 0], 1),
            Row::ge(vec![0, 0, 0, 1], 0),
            Row::ge(vec![-3, 2, 1, 0], 0),
            Row::ge(vec![3, -2, -1, 0], 2),
            Row::ge(vec![0, 2, 1, -2], 0),
            Row::ge(vec![0, -2, -1, 2], 1),
        ];
        match lp_maximize(&rows, 4, &[q(0), q(-1), q(0), q(1)]).unwrap() {
            LpResult::Optimal { value, .. } => assert_eq!(value, Rational::new(1, 2)),
            other => panic!("unexpected {:?}", other),
        }
        match ilp_maximize(&rows, 4, &[0, -1, 0, 1], DEFAULT_NODE_LIMIT).unwrap() {
            IlpResult::Optimal { value, point } => {
                assert_eq!(value, 0);
                assert!(rows.iter().all(|r| r.value_at(&point) >= 0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ilp_unbounded_on_lattice_strip() {
        // 3x = 2y + 1 with x >= 0 has integer points (1, 1), (3, 4), ...
        let rows = vec![Row::eq(vec![3, -2], -1), Row::ge(vec![1, 0], 0)];
        assert_eq!(
            ilp_maximize(&rows, 2, &[1, 0], DEFAULT_NODE_LIMIT).unwrap(),
            IlpResult::Unbounded
        );
        let p = integer_point(&rows, 2, DEFAULT_NODE_LIMIT).unwrap().expect("feasible");
        assert_eq!(3 * p[0], 2 * p[1] + 1);
    }

    #[test]
    fn test_subdeterminant_bound_ignores_sign() {
        let rows = vec![Row::ge(vec![3, 4], 0), Row::ge(vec![-3, -4], 2), Row::ge(vec![1, 0], 0)];
        assert_eq!(subdeterminant_bound(&rows, 2), Some(6));
        assert_eq!(subdeterminant_bound(&rows, 1), Some(6));
    }
}
