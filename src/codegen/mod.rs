//! Loop nests from the prelude and period schedules.

pub mod ast_builder;

pub use ast_builder::{AstBinOp, AstBuilder, AstExpr, AstNode, LoopMarks};

use crate::analysis::ModelSummary;
use crate::ir::Model;
use crate::polyhedral::UnionMap;
use crate::transform::Schedule;
use crate::utils::errors::PolyResult;
use crate::utils::pretty::render_ast;
use log::info;
use std::fmt;

/// Generated loops of one compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopAst {
    /// Runs once
    pub prelude: Vec<AstNode>,
    /// Runs once per period, forever
    pub period: Vec<AstNode>,
}

impl LoopAst {
    /// All loops of both parts, outermost first.
    pub fn loops(&self) -> Vec<&AstNode> {
        self.prelude
            .iter()
            .chain(self.period.iter())
            .flat_map(|n| n.loops())
            .collect()
    }
}

impl fmt::Display for LoopAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "// prelude")?;
        writeln!(f, "{}", render_ast(&self.prelude))?;
        if !self.period.is_empty() {
            writeln!(f, "// period")?;
            writeln!(f, "while (true) {{")?;
            writeln!(f, "{}", crate::utils::pretty::indent(&render_ast(&self.period), 2))?;
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

/// Build the loops of both schedule parts.
pub fn build_ast(
    model: &Model,
    summary: &ModelSummary,
    schedule: &Schedule,
    parallel: bool,
    separate_loops: bool,
) -> PolyResult<LoopAst> {
    let mut builder = AstBuilder::new(model, &summary.dependencies)
        .with_parallel(parallel)
        .with_separation(separate_loops);
    let prelude = builder.build(&schedule.prelude)?;
    let period = builder.build(&schedule.period)?;
    info!(
        "generated {} prelude and {} period top-level nodes",
        prelude.len(),
        period.len()
    );
    Ok(LoopAst { prelude, period })
}

/// Array element pairs that the parallel loops of the schedule touch from
/// concurrent iterations. Storage allocation must keep them apart.
pub fn parallel_accesses(
    model: &Model,
    summary: &ModelSummary,
    schedule: &Schedule,
    separate_loops: bool,
) -> PolyResult<UnionMap> {
    let mut builder = AstBuilder::new(model, &summary.dependencies)
        .with_parallel(true)
        .with_separation(separate_loops);
    builder.build(&schedule.prelude)?;
    builder.build(&schedule.period)?;
    Ok(builder.take_parallel_accesses())
}
