//! The per-compilation context.
//!
//! Every polyhedral object refers to its parameters by `Symbol`. The
//! context owns the interner that gives those symbols their names. It is
//! created with the model and passed by reference; there is no global one.

use crate::polyhedral::space::Space;
use crate::utils::intern::{Symbol, SymbolInterner};

#[derive(Debug, Clone, Default)]
pub struct Context {
    symbols: SymbolInterner,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol of a parameter, creating it on first use.
    pub fn param(&mut self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    /// Symbol of an existing parameter.
    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name)
    }

    pub fn name(&self, sym: Symbol) -> String {
        self.symbols
            .resolve(sym)
            .map(str::to_string)
            .unwrap_or_else(|| format!("p{}", sym.as_raw()))
    }

    /// Names of the parameters of a space, in column order.
    pub fn param_names(&self, space: &Space) -> Vec<String> {
        space.params.iter().map(|&p| self.name(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_names() {
        let mut ctx = Context::new();
        let x = ctx.param("x_offset");
        assert_eq!(ctx.param("x_offset"), x);
        assert_eq!(ctx.lookup("x_offset"), Some(x));
        assert_eq!(ctx.lookup("y_offset"), None);
        let space = Space::params_only(vec![x]);
        assert_eq!(ctx.param_names(&space), vec!["x_offset".to_string()]);
    }
}
