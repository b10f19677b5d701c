//! Utility modules shared by every phase.
//!
//! - Error types
//! - Rational matrices and integer helpers
//! - Symbol interning
//! - Loop nest rendering
//! - Polyhedral printing with model names

pub mod errors;
pub mod matrix;
pub mod intern;
pub mod pretty;
pub mod poly_print;

// Re-exports
pub use errors::*;
pub use intern::{Symbol, SymbolInterner};
pub use poly_print::{print_model, print_schedule, PolyPrinter};
