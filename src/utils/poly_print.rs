//! Printing of models and schedules with their source names.
//!
//! Sets and relations print in the usual `{ S[i, j] -> T[t0] : ... }`
//! notation, with statement, array and parameter names taken from the model
//! instead of arena handles.

use crate::ir::{Array, Model, Statement};
use crate::polyhedral::{IntegerMap, IntegerSet, Tuple};
use crate::transform::{Schedule, ScheduleTree};
use std::fmt::Write;

/// Pretty printer for polyhedral objects of one model.
pub struct PolyPrinter<'a> {
    model: &'a Model,
    /// Indentation level
    indent: usize,
    /// Output buffer
    buffer: String,
}

impl<'a> PolyPrinter<'a> {
    pub fn new(model: &'a Model) -> Self {
        Self { model, indent: 0, buffer: String::new() }
    }

    pub fn output(&self) -> &str {
        &self.buffer
    }

    pub fn take_output(self) -> String {
        self.buffer
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buffer.push_str("  ");
        }
    }

    fn line(&mut self, text: &str) {
        self.write_indent();
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    fn names(&self, tuple: Tuple, prefix: &str) -> (String, Vec<String>) {
        let dims = (0..tuple.dim).map(|i| format!("{}{}", prefix, i)).collect();
        (self.model.tuple_name(tuple.id), dims)
    }

    /// `{ name[i0, ...] : constraints; ... }`
    pub fn set_to_string(&self, set: &IntegerSet) -> String {
        let (name, dims) = self.names(set.space().output, "i");
        let params = self.model.context.param_names(set.space());
        let pieces: Vec<String> = set
            .pieces()
            .iter()
            .map(|p| format!("{}[{}] : {}", name, dims.join(", "), p.to_string_with_names(&dims, &params)))
            .collect();
        format!("{{ {} }}", pieces.join("; "))
    }

    /// `{ in[i0, ...] -> out[o0, ...] : constraints; ... }`
    pub fn map_to_string(&self, map: &IntegerMap) -> String {
        let space = map.space();
        let (in_name, in_dims) = match space.input {
            Some(t) => self.names(t, "i"),
            None => (String::new(), Vec::new()),
        };
        let (out_name, out_dims) = self.names(space.output, "o");
        let params = self.model.context.param_names(space);
        let mut all = in_dims.clone();
        all.extend(out_dims.iter().cloned());
        let pieces: Vec<String> = map
            .pieces()
            .iter()
            .map(|p| {
                format!(
                    "{}[{}] -> {}[{}] : {}",
                    in_name,
                    in_dims.join(", "),
                    out_name,
                    out_dims.join(", "),
                    p.to_string_with_names(&all, &params)
                )
            })
            .collect();
        format!("{{ {} }}", pieces.join("; "))
    }

    pub fn print_array(&mut self, array: &Array) {
        let kind = if array.is_infinite { "stream" } else { "array" };
        let header = format!("{} {} ({}, {}D):", kind, array.name, array.element_type, array.dims());
        self.line(&header);
        self.indent += 1;
        let domain = format!("domain: {}", self.set_to_string(&array.domain));
        self.line(&domain);
        if !array.buffer_size.is_empty() {
            let sizes: Vec<String> = array.buffer_size.iter().map(|s| s.to_string()).collect();
            self.line(&format!("buffer: [{}]", sizes.join(", ")));
        }
        if array.is_infinite {
            self.line(&format!(
                "period: {}, offset: {}, accesses: [{}, {}], inter-period: {}",
                array.period,
                array.period_offset,
                array.first_period_access,
                array.last_period_access,
                array.inter_period_dependency
            ));
        }
        self.indent -= 1;
    }

    pub fn print_stmt(&mut self, stmt: &Statement) {
        let mut flags = Vec::new();
        if stmt.is_infinite {
            flags.push("infinite");
        }
        if stmt.is_input_or_output {
            flags.push("io");
        }
        if stmt.streaming_needs_modulo {
            flags.push("modulo");
        }
        let mut header = format!("statement {}", stmt.name);
        if !flags.is_empty() {
            let _ = write!(header, " [{}]", flags.join(", "));
        }
        header.push(':');
        self.line(&header);
        self.indent += 1;
        let domain = format!("domain: {}", self.set_to_string(&stmt.domain));
        self.line(&domain);
        for access in &stmt.accesses {
            let kind = match (access.reading, access.writing) {
                (true, true) => "update",
                (false, true) => "write",
                _ => "read",
            };
            let text = format!("{}: {}", kind, self.map_to_string(&access.relation));
            self.line(&text);
        }
        for (array, offset) in &stmt.array_access_offset {
            let text = format!("offset {}: {}", self.model.array(*array).name, offset);
            self.line(&text);
        }
        if let Some(expr) = &stmt.expr {
            self.line(&format!("expr: {}", expr));
        }
        self.indent -= 1;
    }

    pub fn print_model(&mut self) {
        let model = self.model;
        for array in &model.arrays {
            self.print_array(array);
        }
        for stmt in &model.statements {
            self.print_stmt(stmt);
        }
    }

    pub fn print_tree(&mut self, label: &str, tree: &ScheduleTree) {
        self.line(&format!("{}:", label));
        self.indent += 1;
        for (index, element) in tree.elements.iter().enumerate() {
            let suffix = if element.infinite { " (infinite)" } else { "" };
            self.line(&format!("element {}{}:", index, suffix));
            self.indent += 1;
            for map in element.band.iter() {
                let text = self.map_to_string(map);
                self.line(&text);
            }
            self.indent -= 1;
        }
        self.indent -= 1;
    }

    pub fn print_schedule(&mut self, schedule: &Schedule) {
        match &schedule.tiling {
            Some(t) => self.line(&format!(
                "tiling: dimension {}, offset {}, period {}",
                t.dim, t.offset, t.size
            )),
            None => self.line("tiling: none"),
        }
        self.print_tree("prelude", &schedule.prelude);
        self.print_tree("period", &schedule.period);
    }
}

/// Print a whole model to a string.
pub fn print_model(model: &Model) -> String {
    let mut printer = PolyPrinter::new(model);
    printer.print_model();
    printer.take_output()
}

/// Print the prelude and period of a schedule to a string.
pub fn print_schedule(model: &Model, schedule: &Schedule) -> String {
    let mut printer = PolyPrinter::new(model);
    printer.print_schedule(schedule);
    printer.take_output()
}
