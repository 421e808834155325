mod annotate;
pub mod defs;
pub mod hir;
pub mod ty;

pub use annotate::{annotate, Analysis};
