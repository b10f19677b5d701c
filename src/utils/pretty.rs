//! Pretty printing of generated loop nests.
//!
//! Loops render as C-like `for` statements with their annotations on the
//! preceding line, so that the output of a compilation can be read and
//! diffed directly.

use crate::codegen::{AstBinOp, AstExpr, AstNode};
use pretty::{BoxAllocator, DocAllocator, DocBuilder};
use std::fmt;

/// Default line width for pretty printing.
pub const DEFAULT_WIDTH: usize = 80;

/// Indentation of loop and guard bodies.
const NEST: isize = 2;

/// A pretty-printable value.
pub trait PrettyPrint {
    /// Convert to a pretty document.
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D>;

    /// Pretty print to a string with the given width.
    fn pretty_print(&self, width: usize) -> String {
        let allocator = BoxAllocator;
        let doc = self.to_doc(&allocator);
        let mut output = String::new();
        if doc.render_fmt(width, &mut output).is_err() {
            output.clear();
        }
        output
    }

    /// Pretty print with default width.
    fn pretty(&self) -> String {
        self.pretty_print(DEFAULT_WIDTH)
    }
}

impl PrettyPrint for AstExpr {
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        allocator.text(self.to_string())
    }
}

impl PrettyPrint for AstNode {
    fn to_doc<'a, D: DocAllocator<'a>>(&self, allocator: &'a D) -> DocBuilder<'a, D> {
        match self {
            AstNode::For { iterator, lower, upper, step, body, marks } => {
                let mut doc = allocator.nil();
                if marks.parallel {
                    doc = doc.append(allocator.text("// parallel")).append(allocator.hardline());
                }
                if marks.vectorizable {
                    doc = doc.append(allocator.text("// vector")).append(allocator.hardline());
                }
                let increment = if *step == 1 {
                    format!("{}++", iterator)
                } else {
                    format!("{} += {}", iterator, step)
                };
                let header = format!(
                    "for (int {it} = {lo}; {it} <= {hi}; {inc}) {{",
                    it = iterator,
                    lo = lower,
                    hi = upper,
                    inc = increment
                );
                doc.append(allocator.text(header))
                    .append(allocator.hardline().append(lines(allocator, body)).nest(NEST))
                    .append(allocator.hardline())
                    .append(allocator.text("}"))
            }
            AstNode::If { condition, then_body } => allocator
                .text(format!("if ({}) {{", condition))
                .append(allocator.hardline().append(lines(allocator, then_body)).nest(NEST))
                .append(allocator.hardline())
                .append(allocator.text("}")),
            AstNode::Stmt { name, iterators, .. } => {
                let args: Vec<String> = iterators.iter().map(|e| e.to_string()).collect();
                allocator.text(format!("{}({});", name, args.join(", ")))
            }
            AstNode::Block { statements } => lines(allocator, statements),
        }
    }
}

fn lines<'a, D: DocAllocator<'a>>(allocator: &'a D, nodes: &[AstNode]) -> DocBuilder<'a, D> {
    let mut doc = allocator.nil();
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            doc = doc.append(allocator.hardline());
        }
        doc = doc.append(node.to_doc(allocator));
    }
    doc
}

/// Render a sequence of top-level nodes, one per line.
pub fn render_ast(nodes: &[AstNode]) -> String {
    let allocator = BoxAllocator;
    let doc = lines(&allocator, nodes);
    let mut output = String::new();
    if doc.render_fmt(DEFAULT_WIDTH, &mut output).is_err() {
        output.clear();
    }
    output
}

fn precedence(op: AstBinOp) -> u8 {
    match op {
        AstBinOp::And => 1,
        AstBinOp::Le | AstBinOp::Ge | AstBinOp::Eq => 2,
        AstBinOp::Add | AstBinOp::Sub => 3,
        AstBinOp::Mul | AstBinOp::Mod => 4,
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, e: &AstExpr, min: u8) -> fmt::Result {
    match e {
        AstExpr::Binary { op, .. } if precedence(*op) < min => write!(f, "({})", e),
        _ => write!(f, "{}", e),
    }
}

impl fmt::Display for AstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstExpr::Int(v) => write!(f, "{}", v),
            AstExpr::Var(name) => write!(f, "{}", name),
            AstExpr::Binary { op, left, right } => {
                let p = precedence(*op);
                write_operand(f, left, p)?;
                write!(f, " {} ", op.symbol())?;
                // Right operands of non-associative operators bind tighter.
                let right_min = match op {
                    AstBinOp::Sub | AstBinOp::Mod => p + 1,
                    _ => p,
                };
                write_operand(f, right, right_min)
            }
            AstExpr::Min(items) => write!(f, "min({})", format_list(items, ", ")),
            AstExpr::Max(items) => write!(f, "max({})", format_list(items, ", ")),
            AstExpr::FloorDiv(e, d) => write!(f, "floord({}, {})", e, d),
            AstExpr::CeilDiv(e, d) => write!(f, "ceild({}, {})", e, d),
        }
    }
}

/// Indent a block of text.
pub fn indent(s: &str, spaces: usize) -> String {
    let indent_str = " ".repeat(spaces);
    s.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{}{}", indent_str, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a list with separators.
pub fn format_list<T: fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::LoopMarks;
    use crate::ir::StmtId;

    fn stmt(name: &str, iterators: Vec<AstExpr>) -> AstNode {
        AstNode::Stmt { id: StmtId(0), name: name.to_string(), iterators }
    }

    #[test]
    fn test_expression_parentheses() {
        let c = AstExpr::var("c1");
        let e = AstExpr::Int(2).mul(c.clone().add(AstExpr::Int(1)));
        assert_eq!(e.to_string(), "2 * (c1 + 1)");
        let e = c.clone().sub(AstExpr::var("c2").sub(AstExpr::Int(1)));
        assert_eq!(e.to_string(), "c1 - (c2 - 1)");
        let e = AstExpr::FloorDiv(Box::new(c.clone().add(AstExpr::Int(3))), 4);
        assert_eq!(e.to_string(), "floord(c1 + 3, 4)");
        let e = AstExpr::Min(vec![c, AstExpr::Int(7)]);
        assert_eq!(e.to_string(), "min(c1, 7)");
    }

    #[test]
    fn test_loop_rendering() {
        let body = vec![stmt("s", vec![AstExpr::var("c1")])];
        let node = AstNode::For {
            iterator: "c1".to_string(),
            lower: AstExpr::Int(0),
            upper: AstExpr::Int(3),
            step: 1,
            body,
            marks: LoopMarks { parallelizable: true, parallel: true, vectorizable: true },
        };
        let output = node.pretty();
        assert_eq!(
            output,
            "// parallel\n// vector\nfor (int c1 = 0; c1 <= 3; c1++) {\n  s(c1);\n}"
        );
    }

    #[test]
    fn test_guard_rendering() {
        let guard = AstExpr::var("c1").ge(AstExpr::Int(2));
        let node = AstNode::If { condition: guard, then_body: vec![stmt("t", vec![])] };
        assert_eq!(render_ast(&[node]), "if (c1 >= 2) {\n  t();\n}");
    }

    #[test]
    fn test_indent_helper() {
        let text = "line1\nline2\nline3";
        let indented = indent(text, 4);
        assert!(indented.starts_with("    line1"));
    }
}
