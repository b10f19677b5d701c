//! Symbol interning for parameter and tuple names.
//!
//! Each compilation owns one interner inside its `Context`; there is no
//! process-wide table.

use string_interner::{StringInterner, DefaultSymbol, backend::StringBackend, Symbol as SymbolTrait};
use std::fmt;
use serde::{Serialize, Deserialize};

/// Type alias for our interner backend
type Backend = StringBackend<DefaultSymbol>;

/// A symbol representing an interned string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(u32);

impl Symbol {
    pub fn as_raw(&self) -> u32 { self.0 }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0)
    }
}

/// A symbol interner for efficient string storage.
#[derive(Debug, Clone)]
pub struct SymbolInterner {
    interner: StringInterner<Backend>,
}

impl Default for SymbolInterner {
    fn default() -> Self { Self::new() }
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self { interner: StringInterner::new() }
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        let sym = self.interner.get_or_intern(s);
        Symbol(sym.to_usize() as u32)
    }

    pub fn resolve(&self, sym: Symbol) -> Option<&str> {
        let internal_sym = DefaultSymbol::try_from_usize(sym.0 as usize)?;
        self.interner.resolve(internal_sym)
    }

    pub fn get(&self, s: &str) -> Option<Symbol> {
        self.interner.get(s).map(|sym| Symbol(sym.to_usize() as u32))
    }

    pub fn len(&self) -> usize { self.interner.len() }
    pub fn is_empty(&self) -> bool { self.interner.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interner() {
        let mut interner = SymbolInterner::new();
        let sym1 = interner.intern("x_offset");
        let sym2 = interner.intern("y_offset");
        let sym3 = interner.intern("x_offset");
        assert_eq!(sym1, sym3);
        assert_ne!(sym1, sym2);
        assert_eq!(interner.resolve(sym1), Some("x_offset"));
        assert_eq!(interner.get("y_offset"), Some(sym2));
        assert_eq!(interner.get("z_offset"), None);
    }
}
