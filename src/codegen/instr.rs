use crate::{
    lex::Pos,
    parse::ast::BinOp,
    typeck::ty::{BasicType, TypeInfo},
};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Where a variable lives at run time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Storage {
    /// Module-level slot.
    Static(u32),
    /// Slot of the current activation.
    Local(u32),
    /// Argument of the current activation.
    Arg(u32),
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Static(n) => write!(f, "static[{}]", n),
            Storage::Local(n) => write!(f, "local[{}]", n),
            Storage::Arg(n) => write!(f, "arg[{}]", n),
        }
    }
}

/// Instructions of the abstract stack machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    PushInt(i32),
    PushReal(f64),
    PushStr(String),
    PushBool(bool),

    Load(Storage),
    Store(Storage),
    /// Pushes the address of a variable.
    LoadAddr(Storage),
    /// Pops an address and pushes the value stored there.
    LoadRef(TypeInfo),
    /// Pops a value and an address, and stores the value there.
    StoreRef(TypeInfo),

    /// Pops a length and pushes a new array of that many zero elements.
    NewArray(BasicType),
    LoadElem(BasicType),
    StoreElem(BasicType),
    ElemAddr(BasicType),
    ArrayLen,

    Binary(BinOp, BasicType),
    Not,
    Neg(BasicType),
    /// Converts the Int on top of the stack to Real.
    Widen,

    Call(FuncId),
    Ret,
    Pop,

    Jump(Label),
    JumpIfFalse(Label),
    JumpIfTrue(Label),
    Label(Label),

    /// Pops a Bool and fails the program with the position if it is false.
    Assert(Pos),
    ToStr(TypeInfo),
    /// Pops an array of strings and a separator, pushes the joined string.
    Join,
    WriteLine,
    ReadLine,
    Parse(BasicType),
}

fn mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Rem => "rem",
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "lt",
        BinOp::Le => "le",
        BinOp::Gt => "gt",
        BinOp::Ge => "ge",
        BinOp::And => "and",
        BinOp::Or => "or",
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instr::*;
        match self {
            PushInt(n) => write!(f, "push.int {}", n),
            PushReal(r) => write!(f, "push.real {:?}", r),
            PushStr(s) => write!(f, "push.str {:?}", s),
            PushBool(b) => write!(f, "push.bool {}", b),
            Load(s) => write!(f, "load {}", s),
            Store(s) => write!(f, "store {}", s),
            LoadAddr(s) => write!(f, "addr {}", s),
            LoadRef(ty) => write!(f, "load.ref {}", ty),
            StoreRef(ty) => write!(f, "store.ref {}", ty),
            NewArray(ty) => write!(f, "new.array {}", ty),
            LoadElem(ty) => write!(f, "load.elem {}", ty),
            StoreElem(ty) => write!(f, "store.elem {}", ty),
            ElemAddr(ty) => write!(f, "addr.elem {}", ty),
            ArrayLen => f.write_str("array.len"),
            Binary(op, ty) => write!(f, "{} {}", mnemonic(*op), ty),
            Not => f.write_str("not"),
            Neg(ty) => write!(f, "neg {}", ty),
            Widen => f.write_str("widen"),
            Call(func) => write!(f, "call {}", func),
            Ret => f.write_str("ret"),
            Pop => f.write_str("pop"),
            Jump(l) => write!(f, "jump {}", l),
            JumpIfFalse(l) => write!(f, "jump.false {}", l),
            JumpIfTrue(l) => write!(f, "jump.true {}", l),
            Label(l) => write!(f, "{}:", l),
            Assert(pos) => write!(f, "assert {}", pos),
            ToStr(ty) => write!(f, "to.str {}", ty),
            Join => f.write_str("join"),
            WriteLine => f.write_str("write.line"),
            ReadLine => f.write_str("read.line"),
            Parse(ty) => write!(f, "parse {}", ty),
        }
    }
}
