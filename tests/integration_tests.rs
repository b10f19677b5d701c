//! Integration tests for the scheduling and storage pipeline.

use polystream::analysis::dependence::check_validity;
use polystream::codegen::AstNode;
use polystream::polyhedral::{AffineMap, Tuple, UnionMap};
use polystream::prelude::*;
use polystream::transform::modulo::avoid_modulo;
use polystream::transform::periodic;
use polystream::transform::scheduler::{AffineScheduler, SchedulingPrimitive};
use polystream::transform::ScheduleElement;

/// `w[i] = source(i)`, `r[i] = w[i] - w[i - 1]` over an unbounded stream.
fn difference_stream() -> (Model, ArrayId) {
    let mut b = ModelBuilder::new();
    let w = b.array("w", &[(0, None)]).unwrap();
    let writer = b.statement("W", &[(0, None)]).unwrap();
    b.write(writer, w, &[vec![1, 0]]).unwrap();
    let reader = b.statement("R", &[(1, None)]).unwrap();
    b.read(reader, w, &[vec![1, 0]]).unwrap();
    b.read(reader, w, &[vec![1, -1]]).unwrap();
    (b.build().unwrap(), w)
}

fn count_loops(ast: &LoopAst, pred: fn(&AstNode) -> bool) -> usize {
    ast.loops().into_iter().filter(|n| pred(n)).count()
}

#[test]
fn test_single_finite_statement() {
    let mut b = ModelBuilder::new();
    let a = b.array("a", &[(0, Some(3))]).unwrap();
    let s = b.statement("s", &[(0, Some(3))]).unwrap();
    b.write(s, a, &[vec![1, 0]]).unwrap();
    let mut model = b.build().unwrap();

    let result = compile(&mut model, &CompilerOptions::new().with_splitting(true)).unwrap();
    assert!(!result.schedule.is_periodic());
    assert_eq!(model.array(a).buffer_size, vec![1]);
    assert!(!result.split.is_applied());
    assert_eq!(model.statements.len(), 1);
    assert_eq!(result.ast.loops().len(), 1);
}

#[test]
fn test_sliding_window_stream() {
    let (mut model, w) = difference_stream();
    let result = compile(&mut model, &CompilerOptions::default()).unwrap();

    let tiling = result.schedule.tiling.expect("stream schedule has a period");
    assert_eq!(tiling.size, 1);
    let array = model.array(w);
    assert_eq!(array.period, 1);
    assert!(array.buffer_size[0] >= 2);
    assert!(array.inter_period_dependency);
    assert!(!result.ast.period.is_empty());
}

#[test]
fn test_split_into_phase_clones() {
    // s[i, j], 0 <= j < 6, writes x[6i + j + 2]: six elements per period.
    let mut b = ModelBuilder::new();
    let x = b.array("x", &[(0, None)]).unwrap();
    let s = b.statement("s", &[(0, None), (0, Some(5))]).unwrap();
    b.write(s, x, &[vec![6, 1, 2]]).unwrap();
    let mut model = b.build().unwrap();
    let summary = ModelSummary::new(&model).unwrap();
    let tree = AffineScheduler::new().schedule(&model, &summary).unwrap();
    let mut schedule = periodic::decompose(&mut model, &summary, tree).unwrap();
    model.array_mut(x).buffer_size = vec![4];

    let clones = avoid_modulo(&mut model, &mut schedule, true).unwrap().applied().unwrap();
    assert_eq!(clones.len(), 2);
    let phase = model.context.lookup("x_offset").expect("phase parameter");
    assert_eq!(model.phase_ids.get(&phase), Some(&x));
    for value in 0..4 {
        assert!(schedule.params.contains(&[value]).unwrap());
    }
    assert!(!schedule.params.contains(&[4]).unwrap());
    assert!(!schedule.params.contains(&[-1]).unwrap());
}

#[test]
fn test_reversal_of_unknown_statement() {
    let (mut model, _) = difference_stream();
    let options = CompilerOptions::new().with_reversal("X", 0);
    let err = compile(&mut model, &options).unwrap_err();
    assert!(err.to_string().contains("No statement named X."));
}

#[test]
fn test_inconsistent_infinite_directions() {
    let mut b = ModelBuilder::new();
    let x = b.array("x", &[(0, None)]).unwrap();
    let s = b.statement("A", &[(0, None)]).unwrap();
    let t = b.statement("B", &[(0, None)]).unwrap();
    b.write(s, x, &[vec![1, 0]]).unwrap();
    b.write(t, x, &[vec![1, 0]]).unwrap();
    let mut model = b.build().unwrap();
    let summary = ModelSummary::new(&model).unwrap();

    // A advances along time dimension 0, B along dimension 1.
    let mut band = UnionMap::new();
    for (stmt, rows) in [(s, vec![vec![1, 0], vec![0, 0]]), (t, vec![vec![0, 0], vec![1, 0]])] {
        let st = model.statement(stmt);
        band.add(
            AffineMap::from_rows(st.tuple(), Tuple::time(2), &rows)
                .to_map()
                .intersect_domain(&st.domain),
        );
    }
    let mut tree = ScheduleTree::new();
    tree.push(ScheduleElement::new(vec![s, t], band, true));
    let err = periodic::decompose(&mut model, &summary, tree).unwrap_err();
    assert!(err
        .to_string()
        .contains("Inconsistent infinite directions of access schedules."));
}

#[test]
fn test_schedules_respect_dependencies() {
    let (mut model, _) = difference_stream();
    let result = compile(&mut model, &CompilerOptions::default()).unwrap();
    let deps = &result.summary.dependencies;
    check_validity(&model, deps, &result.schedule.full.flatten()).unwrap();
    check_validity(&model, deps, &result.schedule.prelude.flatten()).unwrap();
    check_validity(&model, deps, &result.schedule.period.flatten()).unwrap();
}

#[test]
fn test_summary_is_idempotent() {
    let (model, _) = difference_stream();
    let first = ModelSummary::new(&model).unwrap();
    let second = ModelSummary::new(&model).unwrap();
    assert_eq!(first, second);
}

/// `p[i, j]` writes `x[3i + j]`, `c[i, j]` reads `x[2i + j]`: three
/// elements produced for every two consumed.
fn rate_converter() -> (Model, ArrayId) {
    let mut b = ModelBuilder::new();
    let x = b.array("x", &[(0, None)]).unwrap();
    let p = b.statement("p", &[(0, None), (0, Some(2))]).unwrap();
    b.write(p, x, &[vec![3, 1, 0]]).unwrap();
    let c = b.statement("c", &[(0, None), (0, Some(1))]).unwrap();
    b.read(c, x, &[vec![2, 1, 0]]).unwrap();
    (b.build().unwrap(), x)
}

#[test]
fn test_tile_size_covers_access_periods() {
    // The producer emits two elements per instance, the consumer reads one.
    let mut b = ModelBuilder::new();
    let x = b.array("x", &[(0, None)]).unwrap();
    let p = b.statement("P", &[(0, None), (0, Some(1))]).unwrap();
    b.write(p, x, &[vec![2, 1, 0]]).unwrap();
    let c = b.statement("C", &[(0, None)]).unwrap();
    b.read(c, x, &[vec![1, 0]]).unwrap();
    let mut model = b.build().unwrap();

    let result = compile(&mut model, &CompilerOptions::default()).unwrap();
    let tiling = result.schedule.tiling.expect("stream schedule has a period");
    // P advances time by 2 per instance and C by 1; both move x by 2 per tile.
    assert_eq!(tiling.dim, 0);
    assert_eq!(tiling.size, 2);
    assert_eq!(model.array(x).period, 2);
}

#[test]
fn test_rate_conversion_stream() {
    let (mut model, x) = rate_converter();
    let result = compile(&mut model, &CompilerOptions::default()).unwrap();
    let tiling = result.schedule.tiling.expect("stream schedule has a period");
    // Rates 3 and 2: the tile holds two producer and three consumer steps.
    assert_eq!(tiling.dim, 0);
    assert_eq!(tiling.size, 6);
    assert_eq!(tiling.size % 3, 0);
    assert_eq!(tiling.size % 2, 0);
    assert_eq!(model.array(x).period, 6);
    assert!(model.array(x).buffer_size[0] >= 1);
    check_validity(&model, &result.summary.dependencies, &result.schedule.period.flatten()).unwrap();
}

#[test]
fn test_rate_conversion_with_splitting() {
    let (mut model, x) = rate_converter();
    let result = compile(&mut model, &CompilerOptions::new().with_splitting(true)).unwrap();
    assert_eq!(result.schedule.tiling.map(|t| t.size), Some(6));
    let buffer = model.array(x).buffer_size[0];
    for stmt in model.statements.iter().filter(|s| s.clone_of.is_some()) {
        let offset = stmt.array_access_offset[&x];
        assert_eq!(offset % buffer, 0, "{} has offset {}", stmt.name, offset);
        assert!(stmt.name.starts_with("p_p") || stmt.name.starts_with("c_p"));
    }
}

#[test]
fn test_parallel_marks() {
    let mut b = ModelBuilder::new();
    let a = b.array("a", &[(0, Some(7))]).unwrap();
    let s = b.statement("fill", &[(0, Some(7))]).unwrap();
    b.write(s, a, &[vec![1, 0]]).unwrap();
    let t = b.statement("use", &[(0, Some(7))]).unwrap();
    b.read(t, a, &[vec![1, 0]]).unwrap();
    let mut model = b.build().unwrap();

    let plain = compile(&mut model.clone(), &CompilerOptions::default()).unwrap();
    assert_eq!(count_loops(&plain.ast, |n| matches!(n, AstNode::For { marks, .. } if marks.parallel)), 0);

    let result = compile(&mut model, &CompilerOptions::new().with_parallel(true)).unwrap();
    assert!(count_loops(&result.ast, |n| matches!(n, AstNode::For { marks, .. } if marks.parallel)) >= 1);
    assert!(count_loops(&result.ast, |n| matches!(n, AstNode::For { marks, .. } if marks.vectorizable)) >= 1);
}

#[test]
fn test_classic_and_refined_sizing_agree_on_streams() {
    let (mut classic, w) = difference_stream();
    let (mut refined, _) = difference_stream();
    compile(&mut classic, &CompilerOptions::new().with_buffer_sizing(BufferSizingKind::Classic)).unwrap();
    compile(&mut refined, &CompilerOptions::default()).unwrap();
    assert_eq!(classic.array(w).buffer_size, refined.array(w).buffer_size);
}

#[test]
fn test_description_to_report() {
    let text = r#"{
        "arrays": [{ "name": "x", "bounds": [[0, null]] }],
        "statements": [
            { "name": "src", "bounds": [[0, null]],
              "accesses": [{ "array": "x", "kind": "write", "index": [[1, 0]] }] },
            { "name": "dst", "bounds": [[0, null]],
              "accesses": [{ "array": "x", "kind": "read", "index": [[1, 0]] }] }
        ]
    }"#;
    let mut model = ModelDescription::from_json(text).unwrap().into_model().unwrap();
    let result = compile(&mut model, &CompilerOptions::default()).unwrap();
    let report = CompilationReport::new(&model, &result);
    assert_eq!(report.arrays[0].name, "x");
    assert!(report.tiling.is_some());

    let json = report.to_json().unwrap();
    let back: CompilationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}
