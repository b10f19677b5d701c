//! Serializable summary of a compilation, for tools downstream of the
//! compiler and for the command line.

use crate::codegen::AstNode;
use crate::ir::Model;
use crate::utils::errors::Outcome;
use crate::utils::pretty::render_ast;
use crate::CompilationResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayReport {
    pub name: String,
    pub infinite: bool,
    pub buffer_size: Vec<i64>,
    /// Why no sizing was computed, when it was not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsized_reason: Option<String>,
    pub period: i64,
    pub period_offset: i64,
    pub first_period_access: i64,
    pub last_period_access: i64,
    pub inter_period_dependency: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_of: Option<String>,
    pub infinite: bool,
    pub needs_modulo: bool,
    /// Index correction per array
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub access_offsets: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilingReport {
    pub dim: usize,
    pub offset: i64,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationReport {
    pub arrays: Vec<ArrayReport>,
    pub statements: Vec<StatementReport>,
    pub tiling: Option<TilingReport>,
    /// Statements created by splitting, in creation order
    pub split_statements: Vec<String>,
    pub parallel_loops: usize,
    pub vector_loops: usize,
    pub prelude: String,
    pub period: String,
}

impl CompilationReport {
    pub fn new(model: &Model, result: &CompilationResult) -> Self {
        let reasons: BTreeMap<_, _> = result
            .storage
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                Outcome::NotApplicable(reason) => Some((*id, reason.clone())),
                Outcome::Applied(_) => None,
            })
            .collect();
        let arrays = model
            .arrays
            .iter()
            .map(|a| ArrayReport {
                name: a.name.clone(),
                infinite: a.is_infinite,
                buffer_size: a.buffer_size.clone(),
                unsized_reason: reasons.get(&a.id).cloned(),
                period: a.period,
                period_offset: a.period_offset,
                first_period_access: a.first_period_access,
                last_period_access: a.last_period_access,
                inter_period_dependency: a.inter_period_dependency,
            })
            .collect();
        let statements = model
            .statements
            .iter()
            .map(|s| StatementReport {
                name: s.name.clone(),
                clone_of: s.clone_of.map(|c| model.statement(c).name.clone()),
                infinite: s.is_infinite,
                needs_modulo: s.streaming_needs_modulo,
                access_offsets: s
                    .array_access_offset
                    .iter()
                    .map(|(a, o)| (model.array(*a).name.clone(), *o))
                    .collect(),
            })
            .collect();
        let split_statements = match &result.split {
            Outcome::Applied(ids) => ids.iter().map(|id| model.statement(*id).name.clone()).collect(),
            Outcome::NotApplicable(_) => Vec::new(),
        };
        let loops = result.ast.loops();
        let count = |f: fn(&AstNode) -> bool| loops.iter().filter(|n| f(n)).count();
        Self {
            arrays,
            statements,
            tiling: result.schedule.tiling.map(|t| TilingReport { dim: t.dim, offset: t.offset, size: t.size }),
            split_statements,
            parallel_loops: count(|n| matches!(n, AstNode::For { marks, .. } if marks.parallel)),
            vector_loops: count(|n| matches!(n, AstNode::For { marks, .. } if marks.vectorizable)),
            prelude: render_ast(&result.ast.prelude),
            period: render_ast(&result.ast.period),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
