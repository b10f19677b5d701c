//! # polystream - polyhedral scheduling and storage for stream programs
//!
//! Given a polyhedral model of a stream program (arrays that may be
//! infinite in their first dimension, statements with affine domains and
//! accesses), this crate computes:
//! - a multidimensional schedule that respects every dependency, split into
//!   a one-off prelude and a steady-state period that repeats forever
//! - minimal buffer sizes for every array under that schedule
//! - statement splits that let period code index stream buffers without a
//!   modulo operation
//! - an annotated loop nest for the prelude and the period
//!
//! ## Architecture
//!
//! ```text
//! Model → Summary → Scheduler → Periodic decomposition → Storage → Modulo avoidance → Loops
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use polystream::prelude::*;
//!
//! let mut b = ModelBuilder::new();
//! let x = b.array("x", &[(0, None)])?;
//! let src = b.statement("source", &[(0, None)])?;
//! b.write(src, x, &[vec![1, 0]])?;
//! let dst = b.statement("sink", &[(0, None)])?;
//! b.read(dst, x, &[vec![1, 0]])?;
//! let mut model = b.build()?;
//!
//! let result = polystream::compile(&mut model, &CompilerOptions::default())?;
//! println!("{}", result.ast);
//! ```

#![warn(clippy::all)]

pub mod ir;
pub mod polyhedral;
pub mod analysis;
pub mod transform;
pub mod codegen;
pub mod report;
pub mod utils;

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::analysis::{BufferSizing, ClassicSizing, ModelSummary, RefinedSizing};
    pub use crate::codegen::{AstExpr, AstNode, LoopAst, LoopMarks};
    pub use crate::ir::{ArrayId, Model, ModelBuilder, ModelDescription, StmtId};
    pub use crate::polyhedral::{AffineExpr, AffineMap, Constraint, IntegerMap, IntegerSet, Space};
    pub use crate::report::CompilationReport;
    pub use crate::transform::{Schedule, ScheduleTree, Tiling};
    pub use crate::utils::errors::*;
    pub use crate::{compile, BufferSizingKind, CompilationResult, CompilerOptions};
}

use analysis::{BufferSizing, ClassicSizing, ModelSummary, RefinedSizing};
use codegen::LoopAst;
use ir::{ArrayId, Model, StmtId};
use log::info;
use serde::{Deserialize, Serialize};
use transform::Schedule;
use utils::errors::{Outcome, PolyResult};

/// Strategy for turning conflict relations into buffer sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferSizingKind {
    /// One dimension at a time, outermost first
    Classic,
    /// Lower bounds per dimension, then aliasing repair
    #[default]
    Refined,
}

impl BufferSizingKind {
    fn strategy(self) -> Box<dyn BufferSizing> {
        match self {
            BufferSizingKind::Classic => Box::new(ClassicSizing),
            BufferSizingKind::Refined => Box::new(RefinedSizing),
        }
    }
}

/// Configuration for the compilation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Pull producers towards their consumers
    pub optimize_schedule: bool,
    /// Schedule everything as one band instead of clustering the finite prefix
    pub schedule_whole_program: bool,
    /// `(statement, dimension)` pairs to run backwards
    pub reversals: Vec<(String, usize)>,
    /// Split period statements to avoid modulo addressing
    pub split_statements: bool,
    /// Separate loops over statements with disjoint ranges
    pub separate_loops: bool,
    /// Mark parallel loops
    pub parallel: bool,
    pub buffer_sizing: BufferSizingKind,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            optimize_schedule: true,
            schedule_whole_program: false,
            reversals: Vec::new(),
            split_statements: false,
            separate_loops: false,
            parallel: false,
            buffer_sizing: BufferSizingKind::Refined,
        }
    }
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optimization(mut self, enabled: bool) -> Self {
        self.optimize_schedule = enabled;
        self
    }

    pub fn with_whole_program(mut self, enabled: bool) -> Self {
        self.schedule_whole_program = enabled;
        self
    }

    pub fn with_reversal(mut self, statement: &str, dim: usize) -> Self {
        self.reversals.push((statement.to_string(), dim));
        self
    }

    pub fn with_splitting(mut self, enabled: bool) -> Self {
        self.split_statements = enabled;
        self
    }

    pub fn with_separation(mut self, enabled: bool) -> Self {
        self.separate_loops = enabled;
        self
    }

    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn with_buffer_sizing(mut self, kind: BufferSizingKind) -> Self {
        self.buffer_sizing = kind;
        self
    }
}

/// Everything a compilation produces besides the annotations it leaves on
/// the model itself.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub schedule: Schedule,
    pub ast: LoopAst,
    /// Summary of the final model, split statements included
    pub summary: ModelSummary,
    pub storage: Vec<(ArrayId, Outcome<Vec<i64>>)>,
    /// Statements created by modulo avoidance
    pub split: Outcome<Vec<StmtId>>,
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the whole pipeline on a model.
///
/// Arrays receive their buffer sizes and period layout, statements their
/// modulo flags, and split statements are appended to the model.
pub fn compile(model: &mut Model, options: &CompilerOptions) -> PolyResult<CompilationResult> {
    info!(
        "compiling {} statements over {} arrays",
        model.statements.len(),
        model.arrays.len()
    );
    let summary = ModelSummary::new(model)?;
    let mut schedule = transform::compute_schedule(model, &summary, options)?;

    if options.parallel {
        let accesses = codegen::parallel_accesses(model, &summary, &schedule, options.separate_loops)?;
        model.parallel_accesses = model.parallel_accesses.union(&accesses);
    }

    let sizing = options.buffer_sizing.strategy();
    info!("sizing buffers with the {} strategy", sizing.name());
    let storage = analysis::storage::allocate(model, &summary, &schedule, sizing.as_ref())?;

    let split = transform::modulo::avoid_modulo(model, &mut schedule, options.split_statements)?;

    let summary = ModelSummary::new(model)?;
    let ast = codegen::build_ast(model, &summary, &schedule, options.parallel, options.separate_loops)?;
    Ok(CompilationResult { schedule, ast, summary, storage, split })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ModelBuilder;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_options_builder() {
        let options = CompilerOptions::new()
            .with_reversal("s", 1)
            .with_parallel(true)
            .with_buffer_sizing(BufferSizingKind::Classic);
        assert_eq!(options.reversals, vec![("s".to_string(), 1)]);
        assert!(options.parallel);
        assert!(options.optimize_schedule);
        assert_eq!(options.buffer_sizing, BufferSizingKind::Classic);
    }

    #[test]
    fn test_compile_finite_program() {
        let mut b = ModelBuilder::new();
        let a = b.array("a", &[(0, Some(4))]).unwrap();
        let s = b.statement("s", &[(0, Some(4))]).unwrap();
        b.write(s, a, &[vec![1, 0]]).unwrap();
        let t = b.statement("t", &[(0, Some(4))]).unwrap();
        b.read(t, a, &[vec![1, 0]]).unwrap();
        let mut model = b.build().unwrap();

        let result = compile(&mut model, &CompilerOptions::default()).unwrap();
        assert!(!result.schedule.is_periodic());
        assert!(result.ast.period.is_empty());
        assert!(!model.array(a).buffer_size.is_empty());
        assert_eq!(result.ast.prelude.iter().flat_map(|n| n.statements()).count(), 2);
    }
}
