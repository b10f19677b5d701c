//! Exact rational matrices.
//!
//! Used for null spaces (ray extraction), for inverting schedule
//! equalities in the loop builder, and for integer normalisation of
//! rational vectors.

use num_integer::Integer;
use num_rational::Ratio;
use num_traits::{One, Signed, Zero};
use std::fmt;

/// Exact rational scalar used throughout the integer set layer.
pub type Rational = Ratio<i128>;

/// A matrix with rational entries, used for exact arithmetic in polyhedral operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalMatrix {
    data: Vec<Vec<Rational>>,
    rows: usize,
    cols: usize,
}

impl RationalMatrix {
    /// Create a new matrix with the given dimensions, initialized to zero.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![vec![Rational::zero(); cols]; rows],
            rows,
            cols,
        }
    }

    /// Create an identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut mat = Self::zeros(n, n);
        for i in 0..n {
            mat.data[i][i] = Rational::one();
        }
        mat
    }

    /// Create a matrix from integer rows, all of length `cols`.
    pub fn from_rows(rows: &[Vec<i64>], cols: usize) -> Self {
        let data: Vec<Vec<Rational>> = rows
            .iter()
            .map(|row| {
                let mut r: Vec<Rational> =
                    row.iter().map(|&v| Rational::from_integer(v as i128)).collect();
                r.resize(cols, Rational::zero());
                r
            })
            .collect();
        Self { rows: data.len(), data, cols }
    }

    pub fn nrows(&self) -> usize {
        self.rows
    }

    pub fn ncols(&self) -> usize {
        self.cols
    }

    /// Get an element.
    pub fn get(&self, row: usize, col: usize) -> Option<&Rational> {
        self.data.get(row)?.get(col)
    }

    /// Set an element.
    pub fn set(&mut self, row: usize, col: usize, value: Rational) {
        if row < self.rows && col < self.cols {
            self.data[row][col] = value;
        }
    }

    pub fn row(&self, row: usize) -> Option<&Vec<Rational>> {
        self.data.get(row)
    }

    /// Matrix-vector multiplication.
    pub fn mul_vec(&self, vec: &[Rational]) -> Option<Vec<Rational>> {
        if self.cols != vec.len() {
            return None;
        }
        Some(
            self.data
                .iter()
                .map(|row| row.iter().zip(vec).fold(Rational::zero(), |acc, (a, b)| acc + a * b))
                .collect(),
        )
    }

    /// Reduced row echelon form. Returns the reduced matrix and its pivot
    /// columns, one per non-zero row.
    pub fn rref(&self) -> (Self, Vec<usize>) {
        let mut m = self.clone();
        let mut pivots = Vec::new();
        let mut row = 0;
        for col in 0..m.cols {
            if row == m.rows {
                break;
            }
            let Some(p) = (row..m.rows).find(|&r| !m.data[r][col].is_zero()) else {
                continue;
            };
            m.data.swap(row, p);
            let inv = m.data[row][col].recip();
            for v in m.data[row].iter_mut() {
                *v *= inv;
            }
            for r in 0..m.rows {
                if r != row && !m.data[r][col].is_zero() {
                    let factor = m.data[r][col];
                    for c in 0..m.cols {
                        let delta = factor * m.data[row][c];
                        m.data[r][c] -= delta;
                    }
                }
            }
            pivots.push(col);
            row += 1;
        }
        m.data.truncate(row);
        m.rows = row;
        (m, pivots)
    }

    pub fn rank(&self) -> usize {
        self.rref().1.len()
    }

    /// Basis of `{ x : self * x = 0 }`.
    pub fn null_space(&self) -> Vec<Vec<Rational>> {
        let (r, pivots) = self.rref();
        let free: Vec<usize> = (0..self.cols).filter(|c| !pivots.contains(c)).collect();
        free.iter()
            .map(|&f| {
                let mut v = vec![Rational::zero(); self.cols];
                v[f] = Rational::one();
                for (row, &p) in pivots.iter().enumerate() {
                    v[p] = -r.data[row][f];
                }
                v
            })
            .collect()
    }

    /// Treat each row as `row[..cols-1] . x + row[cols-1] = 0` and solve
    /// for the variables in `unknowns`.
    ///
    /// On success, entry `k` holds the coefficients (over all columns,
    /// constant last, unknown columns zero) of `x[unknowns[k]]`. Fails when
    /// some unknown is not determined by the rows.
    pub fn solve_for(&self, unknowns: &[usize]) -> Option<Vec<Vec<Rational>>> {
        // Permute unknowns to the front so elimination pivots on them first.
        let mut order: Vec<usize> = unknowns.to_vec();
        order.extend((0..self.cols).filter(|c| !unknowns.contains(c)));
        let mut permuted = Self::zeros(self.rows, self.cols);
        for r in 0..self.rows {
            for (new_c, &old_c) in order.iter().enumerate() {
                permuted.data[r][new_c] = self.data[r][old_c];
            }
        }
        let (reduced, pivots) = permuted.rref();
        let mut solution = Vec::with_capacity(unknowns.len());
        for k in 0..unknowns.len() {
            let row = pivots.iter().position(|&p| p == k)?;
            // Another unknown left in the row means x_k is not determined.
            if (0..unknowns.len()).any(|j| j != k && !reduced.data[row][j].is_zero()) {
                return None;
            }
            let mut expr = vec![Rational::zero(); self.cols];
            for (new_c, &old_c) in order.iter().enumerate().skip(unknowns.len()) {
                expr[old_c] = -reduced.data[row][new_c];
            }
            solution.push(expr);
        }
        Some(solution)
    }
}

impl fmt::Display for RationalMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            writeln!(f, "[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

/// GCD of a vector of integers (0 for the zero vector).
pub fn vector_gcd(v: &[i64]) -> i64 {
    v.iter().fold(0i64, |acc, &x| acc.gcd(&x.abs()))
}

/// LCM of a vector of positive integers (1 for the empty vector).
pub fn vector_lcm(v: &[i64]) -> i64 {
    v.iter().fold(1i64, |acc, &x| if x == 0 { acc } else { acc.lcm(&x.abs()) })
}

/// Scale a rational vector to the primitive integer vector pointing the
/// same way.
pub fn primitive_integer_vector(v: &[Rational]) -> Vec<i64> {
    let den = v.iter().fold(1i128, |acc, x| acc.lcm(x.denom()));
    let ints: Vec<i128> = v.iter().map(|x| (x * Rational::from_integer(den)).to_integer()).collect();
    let g = ints.iter().fold(0i128, |acc, x| acc.gcd(&x.abs()));
    let g = if g == 0 { 1 } else { g };
    ints.iter().map(|x| (x / g) as i64).collect()
}

/// Integer floor division (rounds toward negative infinity).
pub fn floor_div(a: i64, b: i64) -> i64 {
    Integer::div_floor(&a, &b)
}

/// Integer ceiling division.
pub fn ceil_div(a: i64, b: i64) -> i64 {
    -Integer::div_floor(&-a, &b)
}

/// Floor of a rational as i128.
pub fn rational_floor(q: &Rational) -> i128 {
    q.floor().to_integer()
}

/// Ceiling of a rational as i128.
pub fn rational_ceil(q: &Rational) -> i128 {
    q.ceil().to_integer()
}

/// True when the value is a positive rational.
pub fn is_positive(q: &Rational) -> bool {
    q.is_positive()
}
