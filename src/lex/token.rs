use crate::lex::Pos;
use crate::symbol::Symbol;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub symbol: Symbol,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, symbol: Symbol, pos: Pos) -> Self {
        Self { kind, symbol, pos }
    }

    pub fn dummy() -> Self {
        Self {
            kind: TokenKind::Eof,
            symbol: Symbol::empty(),
            pos: Pos::DUMMY,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident => write!(f, "identifier '{}'", self.symbol),
            TokenKind::Literal {
                kind: LiteralKind::Str,
            } => write!(f, "string \"{}\"", self.symbol),
            TokenKind::Literal { .. } => write!(f, "number '{}'", self.symbol),
            kind => fmt::Display::fmt(&kind, f),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Single-character tokens.
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Comma,
    Dot,
    Minus,
    Plus,
    SemiColon,
    Colon,
    Slash,
    Star,
    Percent,

    // One or two character tokens.
    Assign,
    Eq,
    Gt,
    Lt,
    Ge,
    Le,
    Ne,

    // Literals.
    Ident,
    Literal { kind: LiteralKind },

    // Keywords
    Program,
    Var,
    Procedure,
    Function,
    Array,
    Of,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    Return,
    Assert,
    Not,
    And,
    Or,
    Eof,
}

impl TokenKind {
    pub fn is_relational(&self) -> bool {
        use TokenKind::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }

    /// Whether a token of this kind can begin an expression.
    pub fn starts_expr(&self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Minus | Plus | Ident | Literal { .. } | OpenParen | Not
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;
        let s = match self {
            OpenParen => "'('",
            CloseParen => "')'",
            OpenBracket => "'['",
            CloseBracket => "']'",
            Comma => "','",
            Dot => "'.'",
            Minus => "'-'",
            Plus => "'+'",
            SemiColon => "';'",
            Colon => "':'",
            Slash => "'/'",
            Star => "'*'",
            Percent => "'%'",
            Assign => "':='",
            Eq => "'='",
            Gt => "'>'",
            Lt => "'<'",
            Ge => "'>='",
            Le => "'<='",
            Ne => "'<>'",
            Ident => "identifier",
            Literal {
                kind: LiteralKind::Int,
            } => "integer literal",
            Literal {
                kind: LiteralKind::Real,
            } => "real literal",
            Literal {
                kind: LiteralKind::Str,
            } => "string literal",
            Program => "'program'",
            Var => "'var'",
            Procedure => "'procedure'",
            Function => "'function'",
            Array => "'array'",
            Of => "'of'",
            Begin => "'begin'",
            End => "'end'",
            If => "'if'",
            Then => "'then'",
            Else => "'else'",
            While => "'while'",
            Do => "'do'",
            Return => "'return'",
            Assert => "'assert'",
            Not => "'not'",
            And => "'and'",
            Or => "'or'",
            Eof => "end of input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    Str,
    Int,
    Real,
}
