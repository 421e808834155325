use super::{
    instr::{FuncId, Instr, Label, Storage},
    Backend, ParamSig,
};
use crate::{symbol::Symbol, typeck::ty::TypeInfo};
use log::trace;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Static {
    pub name: String,
    pub ty: TypeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeInfo,
    pub by_ref: bool,
}

/// A local declaration. Slots are reused once the block declaring them ends.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDecl {
    pub slot: u32,
    pub name: String,
    pub ty: TypeInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub id: FuncId,
    pub name: String,
    pub params: Vec<Param>,
    pub ret: TypeInfo,
    pub locals: Vec<LocalDecl>,
    /// Number of local slots the activation needs.
    pub slots: u32,
    pub code: Vec<Instr>,
}

/// The compiled program.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Module {
    pub functions: Vec<Function>,
    pub statics: Vec<Static>,
    pub entry: Option<FuncId>,
}

impl Module {
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    pub fn function_named(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn entry_function(&self) -> Option<&Function> {
        self.entry.and_then(|id| self.function(id))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.statics.iter().enumerate() {
            writeln!(f, ".static {} {}: {}", i, s.name, s.ty)?;
        }
        if let Some(entry) = self.entry {
            writeln!(f, ".entry {}", entry)?;
        }

        for func in &self.functions {
            writeln!(f)?;
            let params: Vec<String> = func
                .params
                .iter()
                .map(|p| {
                    let prefix = if p.by_ref { "var " } else { "" };
                    format!("{}{}: {}", prefix, p.name, p.ty)
                })
                .collect();
            writeln!(
                f,
                "function {} {}({}): {}",
                func.id,
                func.name,
                params.join(", "),
                func.ret
            )?;
            for local in &func.locals {
                writeln!(f, "  .local {} {}: {}", local.slot, local.name, local.ty)?;
            }
            for instr in &func.code {
                match instr {
                    Instr::Label(_) => writeln!(f, "{}", instr)?,
                    _ => writeln!(f, "    {}", instr)?,
                }
            }
        }
        Ok(())
    }
}

/// [`Backend`] that collects everything into a [`Module`].
#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
    current: Option<usize>,
    /// Saved slot counters of the enclosing blocks.
    scopes: Vec<u32>,
    next_slot: u32,
    next_label: u32,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Module {
        self.module
    }

    fn current_function(&mut self) -> Option<&mut Function> {
        match self.current {
            Some(i) => self.module.functions.get_mut(i),
            None => None,
        }
    }
}

impl Backend for ModuleBuilder {
    fn declare_static(&mut self, name: Symbol, ty: TypeInfo) -> Storage {
        let slot = self.module.statics.len() as u32;
        self.module.statics.push(Static {
            name: name.to_string(),
            ty,
        });
        Storage::Static(slot)
    }

    fn declare_function(&mut self, name: Symbol, params: &[ParamSig], ret: TypeInfo) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            id,
            name: name.to_string(),
            params: params
                .iter()
                .map(|p| Param {
                    name: p.name.to_string(),
                    ty: p.ty,
                    by_ref: p.by_ref,
                })
                .collect(),
            ret,
            locals: vec![],
            slots: 0,
            code: vec![],
        });
        id
    }

    fn begin_function(&mut self, func: FuncId) {
        self.current = Some(func.0 as usize);
        self.scopes.clear();
        self.next_slot = 0;
    }

    fn end_function(&mut self) {
        self.current = None;
    }

    fn declare_local(&mut self, name: Symbol, ty: TypeInfo) -> Storage {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(func) = self.current_function() {
            func.slots = func.slots.max(slot + 1);
            func.locals.push(LocalDecl {
                slot,
                name: name.to_string(),
                ty,
            });
        }
        Storage::Local(slot)
    }

    fn begin_scope(&mut self) {
        self.scopes.push(self.next_slot);
    }

    fn end_scope(&mut self) {
        if let Some(slot) = self.scopes.pop() {
            self.next_slot = slot;
        }
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn emit(&mut self, instr: Instr) {
        trace!("emit {}", instr);
        if let Some(func) = self.current_function() {
            func.code.push(instr);
        }
    }

    fn set_entry(&mut self, func: FuncId) {
        self.module.entry = Some(func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_slots_are_reused_after_a_block() {
        let mut b = ModuleBuilder::new();
        let f = b.declare_function(Symbol::intern("main"), &[], TypeInfo::VOID);
        b.begin_function(f);
        let x = b.declare_local(Symbol::intern("x"), TypeInfo::INT);
        b.begin_scope();
        let y = b.declare_local(Symbol::intern("y"), TypeInfo::INT);
        b.end_scope();
        let z = b.declare_local(Symbol::intern("z"), TypeInfo::REAL);
        b.end_function();

        assert_eq!(x, Storage::Local(0));
        assert_eq!(y, Storage::Local(1));
        assert_eq!(z, Storage::Local(1));
        let module = b.finish();
        assert_eq!(module.functions[0].slots, 2);
        assert_eq!(module.functions[0].locals.len(), 3);
    }

    #[test]
    fn listing() {
        let mut b = ModuleBuilder::new();
        let s = b.declare_static(Symbol::intern("true"), TypeInfo::BOOL);
        let f = b.declare_function(Symbol::intern("main"), &[], TypeInfo::VOID);
        b.set_entry(f);
        b.begin_function(f);
        let l = b.new_label();
        b.emit(Instr::PushBool(true));
        b.emit(Instr::Store(s));
        b.mark_label(l);
        b.emit(Instr::Ret);
        b.end_function();

        let listing = b.finish().to_string();
        assert_eq!(
            listing,
            ".static 0 true: Bool\n\
             .entry f0\n\
             \n\
             function f0 main(): Void\n\
             \x20   push.bool true\n\
             \x20   store static[0]\n\
             L0:\n\
             \x20   ret\n"
        );
    }
}
