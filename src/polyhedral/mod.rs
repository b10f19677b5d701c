//! Polyhedral data structures and operations.
//!
//! This module provides the mathematical foundation of the compiler:
//! - Affine expressions and constraints
//! - Convex polyhedra with existential columns, and their unions
//! - Relations (schedules, accesses, dependencies)
//! - An exact rational simplex with branch and bound for integer queries

pub mod space;
pub mod expr;
pub mod constraint;
pub mod solver;
pub mod polyhedron;
pub mod set;
pub mod map;
pub mod union;
pub mod context;

pub use space::{Space, SpaceKey, Tuple, TupleId};
pub use expr::AffineExpr;
pub use constraint::{Constraint, ConstraintKind};
pub use polyhedron::{Optimum, Polyhedron, RayShape};
pub use set::IntegerSet;
pub use map::{AffineMap, IntegerMap};
pub use union::{UnionMap, UnionSet};
pub use context::Context;
