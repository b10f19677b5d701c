//! The polyhedral model consumed by the back end.
//!
//! - `model`: arrays, statements and accesses in an arena
//! - `expr`: statement expressions
//! - `builder`: programmatic construction
//! - `description`: the JSON form produced by an upstream generator

pub mod expr;
pub mod model;
pub mod builder;
pub mod description;

pub use builder::ModelBuilder;
pub use description::ModelDescription;
pub use expr::{Expr, PrimitiveOp};
pub use model::{Array, ArrayAccess, ArrayId, ElementType, Model, Statement, StmtId};
