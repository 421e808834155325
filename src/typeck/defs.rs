use crate::{
    lex::Pos,
    symbol::{ScopeId, Symbol},
    typeck::ty::TypeInfo,
};
use std::{fmt, ops::Index};

/// Handle of a declared name in [`Defs`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

impl DefId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallableKind {
    Procedure,
    Function,
}

/// Built-in callables with variadic arguments.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Intrinsic {
    Print,
    Read,
}

#[derive(Debug, Clone)]
pub struct CallableInfo {
    pub kind: CallableKind,
    pub params: Vec<DefId>,
    /// Variables of enclosing callables used by this one, in first-use order.
    pub captures: Vec<DefId>,
    pub locals: Vec<DefId>,
    pub parent: Option<DefId>,
    pub intrinsic: Option<Intrinsic>,
}

impl CallableInfo {
    pub fn new(kind: CallableKind, parent: Option<DefId>) -> Self {
        Self {
            kind,
            params: vec![],
            captures: vec![],
            locals: vec![],
            parent,
            intrinsic: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DefKind {
    /// Module-level storage: variables of the program block and the
    /// predefined constants.
    Global,
    Local { owner: DefId },
    Param { owner: DefId, by_ref: bool },
    Callable(CallableInfo),
}

#[derive(Debug, Clone)]
pub struct Def {
    pub name: Symbol,
    pub ty: TypeInfo,
    pub scope: ScopeId,
    pub kind: DefKind,
    pub pos: Pos,
}

impl Def {
    pub fn is_variable(&self) -> bool {
        !matches!(self.kind, DefKind::Callable(_))
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self.kind, DefKind::Param { by_ref: true, .. })
    }

    pub fn is_predefined(&self) -> bool {
        self.scope == ScopeId::PREDEFINED
    }
}

/// Arena of every definition made during one compilation.
#[derive(Debug, Default)]
pub struct Defs {
    defs: Vec<Def>,
    main: Option<DefId>,
}

impl Defs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, def: Def) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn set_main(&mut self, main: DefId) {
        self.main = Some(main);
    }

    /// The synthetic procedure standing for the program body.
    pub fn main(&self) -> Option<DefId> {
        self.main
    }

    pub fn callable(&self, id: DefId) -> Option<&CallableInfo> {
        match &self[id].kind {
            DefKind::Callable(info) => Some(info),
            _ => None,
        }
    }

    pub fn callable_mut(&mut self, id: DefId) -> Option<&mut CallableInfo> {
        match &mut self.defs[id.index()].kind {
            DefKind::Callable(info) => Some(info),
            _ => None,
        }
    }

    /// The callable whose activation holds the storage of variable `id`.
    pub fn owner(&self, id: DefId) -> Option<DefId> {
        let def = &self[id];
        match def.kind {
            DefKind::Local { owner } | DefKind::Param { owner, .. } => Some(owner),
            DefKind::Global if !def.is_predefined() => self.main,
            DefKind::Global | DefKind::Callable(_) => None,
        }
    }

    /// Records that `callable` uses `var` from an enclosing callable.
    /// Returns false if it was already captured.
    pub fn add_capture(&mut self, callable: DefId, var: DefId) -> bool {
        match self.callable_mut(callable) {
            Some(info) if !info.captures.contains(&var) => {
                info.captures.push(var);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefId, &Def)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, def)| (DefId(i as u32), def))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Index<DefId> for Defs {
    type Output = Def;

    fn index(&self, id: DefId) -> &Def {
        &self.defs[id.index()]
    }
}
