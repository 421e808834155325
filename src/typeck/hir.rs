use crate::{
    lex::Pos,
    parse::ast::{BinOp, Sign, UnOp},
    symbol::Symbol,
};

use super::{
    defs::DefId,
    ty::{BasicType, TypeInfo},
};

#[derive(Debug)]
pub struct Program {
    pub name: Symbol,
    pub main: DefId,
    pub body: Block,
}

#[derive(Debug, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
pub struct Callable {
    pub def: DefId,
    pub body: Block,
}

#[derive(Debug)]
pub struct Call {
    pub callee: DefId,
    pub args: Vec<Expr>,
    pub pos: Pos,
}

/// Storage an assignment writes to, or a variable expression reads from.
#[derive(Debug)]
pub enum Place {
    Var(DefId),
    Index(DefId, Box<Expr>),
}

impl Place {
    pub fn def(&self) -> DefId {
        match self {
            Place::Var(def) | Place::Index(def, _) => *def,
        }
    }
}

#[derive(Debug)]
pub enum Stmt {
    Var {
        defs: Vec<DefId>,
        ty: TypeInfo,
        size: Option<Expr>,
        pos: Pos,
    },
    Callable(Callable),
    Assign {
        target: Place,
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

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeInfo,
    pub sign: Sign,
    pub pos: Pos,
}

impl Expr {
    pub fn err(pos: Pos) -> Self {
        Self {
            kind: ExprKind::Err,
            ty: TypeInfo::VOID,
            sign: Sign::Plus,
            pos,
        }
    }

    pub fn place(&self) -> Option<&Place> {
        match &self.kind {
            ExprKind::Place(place) => Some(place),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Int(i32),
    Real(f64),
    Str(Symbol),
    Binary {
        op: BinOp,
        /// Type both operands are widened to before the operation.
        operand: BasicType,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Call(Call),
    /// Length of an array value.
    Size(Box<Expr>),
    Place(Place),
    Err,
}
