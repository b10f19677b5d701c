//! Scheduling and the schedule transformations built on it.
//!
//! - `schedule`: schedule trees and their flat and tiled forms
//! - `scheduler`: the affine stream scheduler
//! - `reversal`: post hoc reversal of statement dimensions
//! - `periodic`: prelude/period decomposition
//! - `modulo`: splitting of period statements to avoid modulo addressing

pub mod schedule;
pub mod scheduler;
pub mod reversal;
pub mod periodic;
pub mod modulo;

pub use schedule::{Schedule, ScheduleElement, ScheduleTree, Tiling};
pub use scheduler::{AffineScheduler, SchedulingPrimitive};

use crate::analysis::ModelSummary;
use crate::ir::Model;
use crate::utils::errors::PolyResult;
use crate::CompilerOptions;
use log::info;

/// Schedule a model and decompose the schedule into prelude and period.
pub fn compute_schedule(model: &mut Model, summary: &ModelSummary, options: &CompilerOptions) -> PolyResult<Schedule> {
    let scheduler = AffineScheduler::new()
        .with_optimization(options.optimize_schedule)
        .with_whole_program(options.schedule_whole_program);
    info!("scheduling {} statements with the {} scheduler", model.statements.len(), scheduler.name());
    let mut tree = scheduler.schedule(model, summary)?;
    reversal::apply_reversals(model, summary, &mut tree, &options.reversals)?;
    periodic::decompose(model, summary, tree)
}
