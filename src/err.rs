use crate::lex::Pos;
use std::{cell::RefCell, fmt};

pub type Result<T> = std::result::Result<T, ()>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntax,
    Semantic,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Lexical => "Lexical",
            Category::Syntax => "Syntax",
            Category::Semantic => "Semantic",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub category: Category,
    pub message: String,
    pub pos: Pos,
}

impl Diagnostic {
    /// Renders the offending source line with a caret under the column.
    pub fn snippet(&self, src: &str) -> Option<String> {
        let line = src.lines().nth(self.pos.line.checked_sub(1)?)?;
        let line = line.trim_end_matches('\r');
        let col = self.pos.column.max(1) - 1;
        let pad: String = line
            .chars()
            .take(col)
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        Some(format!("{}\n{}^", line, pad))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.pos, self.category, self.message)
    }
}

/// Ordered collection of the diagnostics of one compilation.
#[derive(Default)]
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise<T>(&self, category: Category, pos: Pos, msg: &str) -> Result<T> {
        self.report(category, pos, msg);
        Err(())
    }

    pub fn report(&self, category: Category, pos: Pos, msg: &str) {
        log::trace!("{} {}: {}", pos, category, msg);
        self.diagnostics.borrow_mut().push(Diagnostic {
            category,
            message: msg.to_owned(),
            pos,
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.borrow().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.borrow().len()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics.into_inner()
    }
}

/// Why a compilation produced no module.
#[derive(Debug)]
pub enum CompileError {
    Diagnostics(Vec<Diagnostic>),
    Internal(anyhow::Error),
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Diagnostics(d) => d,
            CompileError::Internal(_) => &[],
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Diagnostics(diagnostics) => {
                for d in diagnostics {
                    writeln!(f, "{}", d)?;
                }
                Ok(())
            }
            CompileError::Internal(e) => write!(f, "internal compiler error: {}", e),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<anyhow::Error> for CompileError {
    fn from(e: anyhow::Error) -> Self {
        CompileError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_keep_order_and_render() {
        let handler = Handler::new();
        handler.report(Category::Lexical, Pos::new(1, 3), "Unknown token '@'");
        let r: Result<()> = handler.raise(Category::Syntax, Pos::new(2, 1), "Expected ';'");
        assert!(r.is_err());
        assert_eq!(handler.error_count(), 2);

        let diags = handler.into_diagnostics();
        assert_eq!(diags[0].to_string(), "(1,3) Lexical: Unknown token '@'");
        assert_eq!(diags[1].category, Category::Syntax);
    }

    #[test]
    fn internal_errors_carry_no_diagnostics() {
        let e = CompileError::from(anyhow!("unresolved function 'f'"));
        assert!(e.diagnostics().is_empty());
        assert_eq!(e.to_string(), "internal compiler error: unresolved function 'f'");

        let handler = Handler::new();
        handler.report(Category::Semantic, Pos::new(1, 1), "Undeclared variable 'x'");
        let e = CompileError::Diagnostics(handler.into_diagnostics());
        assert_eq!(e.diagnostics().len(), 1);
    }

    #[test]
    fn snippet_points_at_column() {
        let d = Diagnostic {
            category: Category::Semantic,
            message: String::new(),
            pos: Pos::new(2, 5),
        };
        let snippet = d.snippet("begin\nabc xyz\nend.").unwrap();
        assert_eq!(snippet, "abc xyz\n    ^");
    }
}
