//! Statement expressions.
//!
//! The expression of a statement computes the value it writes. It refers
//! to the statement's iteration indices and to the values delivered by its
//! read accesses; everything else is a closed set of node kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Not,
}

impl PrimitiveOp {
    pub fn arity(self) -> usize {
        match self {
            PrimitiveOp::Neg
            | PrimitiveOp::Abs
            | PrimitiveOp::Floor
            | PrimitiveOp::Ceil
            | PrimitiveOp::Not => 1,
            _ => 2,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            PrimitiveOp::Add => "+",
            PrimitiveOp::Sub | PrimitiveOp::Neg => "-",
            PrimitiveOp::Mul => "*",
            PrimitiveOp::Div => "/",
            PrimitiveOp::Mod => "%",
            PrimitiveOp::Min => "min",
            PrimitiveOp::Max => "max",
            PrimitiveOp::Abs => "abs",
            PrimitiveOp::Floor => "floor",
            PrimitiveOp::Ceil => "ceil",
            PrimitiveOp::Lt => "<",
            PrimitiveOp::Le => "<=",
            PrimitiveOp::Gt => ">",
            PrimitiveOp::Ge => ">=",
            PrimitiveOp::Eq => "==",
            PrimitiveOp::Ne => "!=",
            PrimitiveOp::And => "&&",
            PrimitiveOp::Or => "||",
            PrimitiveOp::Not => "!",
        }
    }

    fn is_infix(self) -> bool {
        !matches!(
            self,
            PrimitiveOp::Min
                | PrimitiveOp::Max
                | PrimitiveOp::Abs
                | PrimitiveOp::Floor
                | PrimitiveOp::Ceil
        )
    }
}

/// A statement expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    Int { value: i64 },
    Real { value: f64 },
    Bool { value: bool },
    /// Iteration index of the statement domain
    Iterator { dim: usize },
    /// Value delivered by the statement's access at this position
    Read { access: usize },
    Primitive { op: PrimitiveOp, operands: Vec<Expr> },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Call of a function provided by the runtime
    External { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Expr::Int { value }
    }

    pub fn iterator(dim: usize) -> Self {
        Expr::Iterator { dim }
    }

    pub fn read(access: usize) -> Self {
        Expr::Read { access }
    }

    pub fn primitive(op: PrimitiveOp, operands: Vec<Expr>) -> Self {
        Expr::Primitive { op, operands }
    }

    /// Children in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Int { .. }
            | Expr::Real { .. }
            | Expr::Bool { .. }
            | Expr::Iterator { .. }
            | Expr::Read { .. } => Vec::new(),
            Expr::Primitive { operands, .. } => operands.iter().collect(),
            Expr::Conditional { condition, then, otherwise } => {
                vec![condition.as_ref(), then.as_ref(), otherwise.as_ref()]
            }
            Expr::External { args, .. } => args.iter().collect(),
        }
    }

    /// Access positions read by the expression, in first-use order.
    pub fn reads(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_reads(&mut out);
        out
    }

    fn collect_reads(&self, out: &mut Vec<usize>) {
        if let Expr::Read { access } = self {
            if !out.contains(access) {
                out.push(*access);
            }
        }
        for c in self.children() {
            c.collect_reads(out);
        }
    }

    /// One past the largest iterator dimension used (0 if none).
    pub fn iterator_extent(&self) -> usize {
        let own = match self {
            Expr::Iterator { dim } => dim + 1,
            _ => 0,
        };
        self.children()
            .into_iter()
            .map(Expr::iterator_extent)
            .fold(own, usize::max)
    }

    /// Check operand counts of every primitive.
    pub fn well_formed(&self) -> bool {
        let own = match self {
            Expr::Primitive { op, operands } => op.arity() == operands.len(),
            _ => true,
        };
        own && self.children().into_iter().all(Expr::well_formed)
    }

    /// Render with names for iterators and reads.
    pub fn render(&self, iterator: &dyn Fn(usize) -> String, read: &dyn Fn(usize) -> String) -> String {
        match self {
            Expr::Int { value } => value.to_string(),
            Expr::Real { value } => format!("{:?}", value),
            Expr::Bool { value } => value.to_string(),
            Expr::Iterator { dim } => iterator(*dim),
            Expr::Read { access } => read(*access),
            Expr::Primitive { op, operands } => {
                let args: Vec<String> = operands.iter().map(|e| e.render(iterator, read)).collect();
                match (op.is_infix(), args.as_slice()) {
                    (true, [a]) => format!("{}{}", op.symbol(), a),
                    (true, [a, b]) => format!("({} {} {})", a, op.symbol(), b),
                    _ => format!("{}({})", op.symbol(), args.join(", ")),
                }
            }
            Expr::Conditional { condition, then, otherwise } => format!(
                "({} ? {} : {})",
                condition.render(iterator, read),
                then.render(iterator, read),
                otherwise.render(iterator, read)
            ),
            Expr::External { name, args } => {
                let args: Vec<String> = args.iter().map(|e| e.render(iterator, read)).collect();
                format!("{}({})", name, args.join(", "))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.render(&|d| format!("i{}", d), &|a| format!("r{}", a));
        write!(f, "{}", s)
    }
}
