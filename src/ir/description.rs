//! JSON description of a polyhedral model.
//!
//! The description is what an upstream model generator hands to this back
//! end when it is not linked in-process. Affine functions are written as
//! coefficient rows `[c_0, ..., c_{n-1}, constant]` over the dimensions of
//! the owning statement.
//!
//! ```json
//! {
//!   "arrays": [{ "name": "x", "bounds": [[0, null]] }],
//!   "statements": [{
//!     "name": "s",
//!     "bounds": [[0, null]],
//!     "accesses": [{ "array": "x", "kind": "write", "index": [[1, 0]] }]
//!   }]
//! }
//! ```

use crate::ir::builder::ModelBuilder;
use crate::ir::expr::Expr;
use crate::ir::model::{ElementType, Model};
use crate::utils::errors::{ModelError, ModelErrorKind, PolyResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDescription {
    #[serde(default)]
    pub arrays: Vec<ArrayDescription>,
    #[serde(default)]
    pub statements: Vec<StatementDescription>,
    /// Global ordering relations between statements
    #[serde(default)]
    pub clock: Vec<ClockDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayDescription {
    pub name: String,
    #[serde(rename = "type", default)]
    pub element_type: ElementType,
    /// `[lower, upper]` per dimension; `null` upper bound means unbounded
    pub bounds: Vec<(i64, Option<i64>)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementDescription {
    pub name: String,
    pub bounds: Vec<(i64, Option<i64>)>,
    #[serde(default)]
    pub constraints: Vec<ConstraintDescription>,
    #[serde(default)]
    pub accesses: Vec<AccessDescription>,
    #[serde(default)]
    pub expr: Option<Expr>,
    /// Rows of `i -> f(i)`: instance `i` runs before `f(i)`
    #[serde(default)]
    pub order: Option<Vec<Vec<i64>>>,
    #[serde(default)]
    pub io: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintDescription {
    pub coeffs: Vec<i64>,
    #[serde(default)]
    pub constant: i64,
    #[serde(default)]
    pub equality: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessDescription {
    pub array: String,
    pub kind: AccessKind,
    pub index: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockDescription {
    pub from: String,
    pub to: String,
    pub map: Vec<Vec<i64>>,
}

impl ModelDescription {
    pub fn from_json(text: &str) -> PolyResult<Self> {
        serde_json::from_str(text).map_err(|e| {
            ModelError::new(
                ModelErrorKind::InvalidDescription,
                format!("Invalid model description: {}", e),
            )
            .into()
        })
    }

    pub fn to_json(&self) -> PolyResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            ModelError::new(ModelErrorKind::InvalidDescription, e.to_string()).into()
        })
    }

    /// Build the model. Accesses keep their order, so `Expr::Read { access }`
    /// refers to the position in `accesses`.
    pub fn into_model(self) -> PolyResult<Model> {
        let mut b = ModelBuilder::new();
        for a in &self.arrays {
            b.typed_array(&a.name, &a.bounds, a.element_type)?;
        }
        let mut handles = Vec::new();
        for s in &self.statements {
            handles.push(b.statement(&s.name, &s.bounds)?);
        }
        for (s, &id) in self.statements.iter().zip(&handles) {
            for c in &s.constraints {
                b.constrain(id, &c.coeffs, c.constant, c.equality)?;
            }
            for access in &s.accesses {
                let array = b.find_array(&access.array).ok_or_else(|| {
                    ModelError::new(
                        ModelErrorKind::UnknownArray,
                        format!("Statement {} accesses unknown array {}.", s.name, access.array),
                    )
                })?;
                match access.kind {
                    AccessKind::Read => b.read(id, array, &access.index)?,
                    AccessKind::Write => b.write(id, array, &access.index)?,
                };
            }
            if let Some(order) = &s.order {
                b.self_order(id, order)?;
            }
            if let Some(expr) = &s.expr {
                b.expr(id, expr.clone())?;
            }
            if s.io {
                b.input_or_output(id)?;
            }
        }
        for c in &self.clock {
            let find = |name: &str| {
                b.find_statement(name).ok_or_else(|| {
                    ModelError::new(
                        ModelErrorKind::UnknownStatement,
                        format!("Clock refers to unknown statement {}.", name),
                    )
                })
            };
            let (from, to) = (find(&c.from)?, find(&c.to)?);
            b.clock(from, to, &c.map)?;
        }
        b.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPE: &str = r#"{
        "arrays": [
            { "name": "x", "bounds": [[0, null]] },
            { "name": "y", "type": "int", "bounds": [[0, null]] }
        ],
        "statements": [
            {
                "name": "src",
                "bounds": [[0, null]],
                "accesses": [{ "array": "x", "kind": "write", "index": [[1, 0]] }],
                "io": true
            },
            {
                "name": "diff",
                "bounds": [[1, null]],
                "accesses": [
                    { "array": "x", "kind": "read", "index": [[1, 0]] },
                    { "array": "x", "kind": "read", "index": [[1, -1]] },
                    { "array": "y", "kind": "write", "index": [[1, 0]] }
                ],
                "expr": {
                    "kind": "primitive", "op": "sub",
                    "operands": [{ "kind": "read", "access": 0 }, { "kind": "read", "access": 1 }]
                }
            }
        ]
    }"#;

    #[test]
    fn test_load_description() {
        let model = ModelDescription::from_json(PIPE).unwrap().into_model().unwrap();
        assert_eq!(model.arrays.len(), 2);
        assert_eq!(model.arrays[1].element_type, ElementType::Int);
        let diff = &model.statements[1];
        assert_eq!(diff.accesses.len(), 3);
        assert!(diff.is_infinite);
        assert!(model.statements[0].is_input_or_output);
        assert_eq!(diff.expr.as_ref().map(|e| e.to_string()).as_deref(), Some("(r0 - r1)"));
    }

    #[test]
    fn test_unknown_array() {
        let text = r#"{ "statements": [{ "name": "s", "bounds": [[0, 3]],
            "accesses": [{ "array": "nope", "kind": "read", "index": [[1, 0]] }] }] }"#;
        let err = ModelDescription::from_json(text).unwrap().into_model().unwrap_err();
        assert!(err.to_string().contains("unknown array nope"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(ModelDescription::from_json("{ \"arrays\": 3 }").is_err());
    }
}
