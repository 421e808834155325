mod pos;
mod reader;
mod scan;
mod token;

pub use pos::Pos;
pub use reader::SourceReader;
pub use scan::Lexer;
pub use token::{LiteralKind, Token, TokenKind};
