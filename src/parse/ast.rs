use crate::{
    lex::{Pos, Token},
    symbol::Symbol,
    typeck::ty::BasicType,
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BinOp {
    // Math
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Comparisons
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        use BinOp::*;
        matches!(self, Eq | Ne | Lt | Le | Gt | Ge)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Add => f.write_str("+"),
            BinOp::Sub => f.write_str("-"),
            BinOp::Mul => f.write_str("*"),
            BinOp::Div => f.write_str("/"),
            BinOp::Rem => f.write_str("%"),
            BinOp::Eq => f.write_str("="),
            BinOp::Ne => f.write_str("<>"),
            BinOp::Lt => f.write_str("<"),
            BinOp::Le => f.write_str("<="),
            BinOp::Gt => f.write_str(">"),
            BinOp::Ge => f.write_str(">="),
            BinOp::And => f.write_str("and"),
            BinOp::Or => f.write_str("or"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnOp {
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnOp::Not => f.write_str("not"),
        }
    }
}

/// Leading sign of the first term of a simple expression.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

impl Default for Sign {
    fn default() -> Self {
        Sign::Plus
    }
}

impl Sign {
    pub fn toggle(self) -> Self {
        match self {
            Sign::Plus => Sign::Minus,
            Sign::Minus => Sign::Plus,
        }
    }

    pub fn is_minus(self) -> bool {
        self == Sign::Minus
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i32),
    Real(f64),
    Str(Symbol),
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub sign: Sign,
    pub pos: Pos,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self {
            kind,
            sign: Sign::Plus,
            pos,
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Literal(Lit),
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Call(Call),
    Member(Box<Expr>, Token),
    Variable(VarRef),
}

#[derive(Debug, PartialEq)]
pub enum VarRef {
    Ident(Token),
    Index(Token, Box<Expr>),
}

impl VarRef {
    pub fn name(&self) -> &Token {
        match self {
            VarRef::Ident(name) | VarRef::Index(name, _) => name,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Call {
    pub callee: Token,
    pub args: Vec<Expr>,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub enum Stmt {
    Var {
        names: Vec<Token>,
        ty: Ty,
        pos: Pos,
    },
    Procedure(Callable),
    Function(Callable),
    Assign {
        target: VarRef,
        value: Expr,
        pos: Pos,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        pos: Pos,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        pos: Pos,
    },
    Call(Call),
    Return(Option<Expr>, Pos),
    Assert(Expr, Pos),
    Block(Block),
}

#[derive(Default, Debug, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub struct Ty {
    pub kind: TyKind,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub enum TyKind {
    Simple(BasicType),
    /// Element type and the size expression, if one was written.
    Array(BasicType, Option<Box<Expr>>),
}

#[derive(Debug, PartialEq)]
pub struct Param {
    pub name: Token,
    pub ty: Ty,
    pub by_ref: bool,
}

#[derive(Debug, PartialEq)]
pub struct Callable {
    pub name: Token,
    pub params: Vec<Param>,
    pub ret: Option<Ty>,
    pub body: Block,
    pub pos: Pos,
}

#[derive(Debug, PartialEq)]
pub struct Program {
    pub name: Token,
    pub block: Block,
    pub pos: Pos,
}
