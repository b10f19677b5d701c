//! Analyses over the polyhedral model.
//!
//! - `summary`: the model flattened into union relations
//! - `dependence`: dependence graph, validity and carried dependencies
//! - `storage`: conflict analysis and buffer sizing

pub mod summary;
pub mod dependence;
pub mod storage;

pub use summary::ModelSummary;
pub use dependence::{Dependence, DependenceGraph, TimeDependence};
pub use storage::{BufferSizing, ClassicSizing, RefinedSizing};
