//! Interned names and the scoped table that resolves them.

mod interner;
mod table;

use std::{fmt, str::FromStr};

pub use self::table::{ScopeId, SymbolTable};

/// An interned identifier or literal text. Equal texts share one symbol.
#[derive(Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn intern(s: &str) -> Self {
        interner::with(|i| i.intern(s))
    }

    /// Placeholder carried by tokens without text, such as keywords.
    pub fn empty() -> Self {
        Self::intern("")
    }

    /// Parses the literal text, e.g. the digits of a number token.
    pub fn parse<T: FromStr>(self) -> Result<T, T::Err> {
        self.as_str_with(|s| s.parse())
    }

    pub fn as_str_with<T>(self, f: impl FnOnce(&str) -> T) -> T {
        interner::with(|i| f(i.text(self)))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str_with(|s| f.write_str(s))
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str_with(|s| s == *other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_symbol() {
        let a = Symbol::intern("count");
        assert_eq!(a, Symbol::intern("count"));
        assert_ne!(a, Symbol::intern("Count"));
        assert_eq!(a, "count");
        assert_eq!(a.to_string(), "count");
    }

    #[test]
    fn parses_literal_text() {
        assert_eq!(Symbol::intern("42").parse::<i32>(), Ok(42));
        assert_eq!(Symbol::intern("1.5e2").parse::<f64>(), Ok(150.0));
        assert!(Symbol::intern("9999999999").parse::<i32>().is_err());
    }
}
