//! Reversal of statement schedule dimensions.

use crate::analysis::dependence::check_validity;
use crate::analysis::ModelSummary;
use crate::ir::Model;
use crate::polyhedral::{AffineMap, Optimum, Tuple};
use crate::transform::schedule::ScheduleTree;
use crate::utils::errors::{PolyResult, ScheduleError};
use log::{debug, info};

/// Run band dimension `dim` of statement `name` backwards:
/// `t' = min + max - t` over the statement's instances.
pub fn reverse_dimension(model: &Model, tree: &mut ScheduleTree, name: &str, dim: usize) -> PolyResult<()> {
    let stmt = model
        .find_statement(name)
        .ok_or_else(|| ScheduleError::unknown_statement(name))?;
    let element = tree
        .element_of_mut(stmt)
        .ok_or_else(|| ScheduleError::unknown_statement(name))?;
    let Some(map) = element.map_of(stmt).cloned() else {
        return Err(ScheduleError::unknown_statement(name).into());
    };
    let width = map.n_out();
    if dim >= width {
        return Err(ScheduleError::unknown_dimension(name, dim).into());
    }

    let lo = map.min_with(|p| p.out_expr(dim))?;
    let hi = map.max_with(|p| p.out_expr(dim))?;
    let (lo, hi) = match (lo, hi) {
        (Optimum::Value(lo), Optimum::Value(hi)) => (lo, hi),
        (Optimum::Empty, _) | (_, Optimum::Empty) => {
            debug!("statement {} has no instances; nothing to reverse", name);
            return Ok(());
        }
        _ => return Err(ScheduleError::infinite_dimension(name, dim).into()),
    };

    let rows: Vec<Vec<i64>> = (0..width)
        .map(|j| {
            let mut row = vec![0; width + 1];
            if j == dim {
                row[j] = -1;
                row[width] = lo + hi;
            } else {
                row[j] = 1;
            }
            row
        })
        .collect();
    let mirror = AffineMap::from_rows(Tuple::time(width), Tuple::time(width), &rows).to_map();
    element.set_map(stmt, map.apply_range(&mirror));
    info!("reversed dimension {} of {} over [{}, {}]", dim, name, lo, hi);
    Ok(())
}

/// Apply every requested reversal and re-check the schedule.
pub fn apply_reversals(
    model: &Model,
    summary: &ModelSummary,
    tree: &mut ScheduleTree,
    reversals: &[(String, usize)],
) -> PolyResult<()> {
    if reversals.is_empty() {
        return Ok(());
    }
    for (name, dim) in reversals {
        reverse_dimension(model, tree, name, *dim)?;
    }
    check_validity(model, &summary.dependencies, &tree.flatten())
}
