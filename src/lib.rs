#[macro_use]
extern crate anyhow;

use self::{
    codegen::ModuleBuilder,
    err::{CompileError, Handler},
    parse::Parser,
};
use log::debug;

pub mod codegen;
pub mod err;
pub mod lex;
pub mod lift;
pub mod parse;
pub mod symbol;
pub mod typeck;
pub mod util;

pub use codegen::Module;
pub use util::args::Args;

/// Runs every phase over `src`. Closure conversion and code generation only
/// run when the earlier phases reported nothing.
pub fn compile(src: &str) -> Result<Module, CompileError> {
    let handler = Handler::new();
    let program = match Parser::new(src, &handler).parse() {
        Ok(program) => program,
        Err(()) => return Err(CompileError::Diagnostics(handler.into_diagnostics())),
    };

    let analysis = typeck::annotate(program, &handler);
    if handler.has_errors() {
        debug!("analysis reported {} errors", handler.error_count());
        return Err(CompileError::Diagnostics(handler.into_diagnostics()));
    }

    let analysis = lift::lift(analysis);
    let mut builder = ModuleBuilder::new();
    codegen::generate(analysis, &mut builder)?;
    Ok(builder.finish())
}

pub struct Compiler {
    listing: bool,
}

impl Compiler {
    pub fn new(listing: bool) -> Self {
        Self { listing }
    }

    /// Compiles `src` and prints either the diagnostics or the result.
    pub fn run(&self, src: String) -> Result<Module, CompileError> {
        match compile(&src) {
            Ok(module) => {
                if self.listing {
                    print!("{}", module);
                } else {
                    println!(
                        "compiled {} functions, {} statics",
                        module.functions.len(),
                        module.statics.len()
                    );
                }
                Ok(module)
            }
            Err(e) => {
                if let CompileError::Internal(_) = e {
                    eprintln!("{}", e);
                }
                for d in e.diagnostics() {
                    eprintln!("{}", d);
                    if let Some(snippet) = d.snippet(&src) {
                        eprintln!("{}", snippet);
                    }
                }
                Err(e)
            }
        }
    }
}
