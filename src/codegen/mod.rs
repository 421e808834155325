//! Lowering of the annotated, lifted program to stack machine code.

pub mod instr;
pub mod module;

pub use instr::{FuncId, Instr, Label, Storage};
pub use module::{Module, ModuleBuilder};

use crate::{
    symbol::Symbol,
    typeck::{
        defs::{DefId, DefKind, Defs, Intrinsic},
        hir::{Block, Call, Expr, ExprKind, Place, Program, Stmt},
        ty::{BasicType, TypeInfo},
        Analysis,
    },
};
use anyhow::Result;
use log::debug;
use std::collections::{HashMap, VecDeque};

/// Signature entry of a function parameter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParamSig {
    pub name: Symbol,
    pub ty: TypeInfo,
    pub by_ref: bool,
}

/// Sink for the generated code.
pub trait Backend {
    fn declare_static(&mut self, name: Symbol, ty: TypeInfo) -> Storage;
    fn declare_function(&mut self, name: Symbol, params: &[ParamSig], ret: TypeInfo) -> FuncId;
    /// Directs the following locals and instructions to `func`.
    fn begin_function(&mut self, func: FuncId);
    fn end_function(&mut self);
    fn declare_local(&mut self, name: Symbol, ty: TypeInfo) -> Storage;
    fn begin_scope(&mut self);
    /// Releases the local slots declared since the matching `begin_scope`.
    fn end_scope(&mut self);
    fn new_label(&mut self) -> Label;
    fn emit(&mut self, instr: Instr);
    fn set_entry(&mut self, func: FuncId);

    fn mark_label(&mut self, label: Label) {
        self.emit(Instr::Label(label));
    }
}

/// Generates code for an analysis that has no diagnostics and went through
/// closure conversion.
pub fn generate<B: Backend>(analysis: Analysis, backend: &mut B) -> Result<()> {
    let Analysis { program, defs } = analysis;
    let mut gen = CodeGen {
        defs: &defs,
        backend,
        funcs: HashMap::new(),
        storage: HashMap::new(),
        pending: VecDeque::new(),
        current: program.main,
    };
    gen.declare_functions();
    gen.gen_program(program)
}

struct CodeGen<'a, B> {
    defs: &'a Defs,
    backend: &'a mut B,
    funcs: HashMap<DefId, FuncId>,
    storage: HashMap<DefId, Storage>,
    /// Callables met in a body, emitted once the enclosing function ends.
    pending: VecDeque<(DefId, Block)>,
    current: DefId,
}

impl<'a, B: Backend> CodeGen<'a, B> {
    fn declare_functions(&mut self) {
        for (id, def) in self.defs.iter() {
            let info = match &def.kind {
                DefKind::Callable(info) if info.intrinsic.is_none() => info,
                _ => continue,
            };
            let params: Vec<ParamSig> = info
                .params
                .iter()
                .map(|&p| ParamSig {
                    name: self.defs[p].name,
                    ty: self.defs[p].ty,
                    by_ref: self.defs[p].is_by_ref(),
                })
                .collect();
            let func = self.backend.declare_function(def.name, &params, def.ty);
            self.funcs.insert(id, func);
        }
    }

    fn gen_program(&mut self, program: Program) -> Result<()> {
        let entry = self.func(program.main)?;
        self.backend.set_entry(entry);

        debug!("emitting program '{}' as {}", program.name, entry);
        self.backend.begin_function(entry);
        self.gen_prologue();
        self.gen_block(program.body)?;
        self.backend.emit(Instr::Ret);
        self.backend.end_function();

        while let Some((def, body)) = self.pending.pop_front() {
            self.gen_function(def, body)?;
        }
        Ok(())
    }

    /// Stores the predefined constants into their statics.
    fn gen_prologue(&mut self) {
        let predefined: Vec<(DefId, Symbol)> = self
            .defs
            .iter()
            .filter(|(_, def)| def.is_predefined() && matches!(def.kind, DefKind::Global))
            .map(|(id, def)| (id, def.name))
            .collect();
        for (id, name) in predefined {
            let storage = self.backend.declare_static(name, TypeInfo::BOOL);
            self.storage.insert(id, storage);
            self.backend.emit(Instr::PushBool(name == "true"));
            self.backend.emit(Instr::Store(storage));
        }
    }

    fn gen_function(&mut self, def: DefId, body: Block) -> Result<()> {
        let func = self.func(def)?;
        let info = match self.defs.callable(def) {
            Some(info) => info,
            None => bail!("'{}' is not a callable", self.defs[def].name),
        };
        for (i, &param) in info.params.iter().enumerate() {
            self.storage.insert(param, Storage::Arg(i as u32));
        }

        debug!("emitting '{}' as {}", self.defs[def].name, func);
        self.current = def;
        self.backend.begin_function(func);
        self.gen_block(body)?;
        self.gen_zero(self.defs[def].ty);
        self.backend.emit(Instr::Ret);
        self.backend.end_function();
        Ok(())
    }

    fn gen_block(&mut self, block: Block) -> Result<()> {
        self.backend.begin_scope();
        for stmt in block.stmts {
            self.gen_stmt(stmt)?;
        }
        self.backend.end_scope();
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: Stmt) -> Result<()> {
        match stmt {
            Stmt::Var { defs, ty, size, .. } => self.gen_var(defs, ty, size)?,
            Stmt::Callable(callable) => self.pending.push_back((callable.def, callable.body)),
            Stmt::Assign { target, value, .. } => self.gen_assign(target, value)?,
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let else_label = self.backend.new_label();
                let end_label = self.backend.new_label();
                self.gen_expr(cond)?;
                self.backend.emit(Instr::JumpIfFalse(else_label));
                self.gen_stmt(*then_branch)?;
                self.backend.emit(Instr::Jump(end_label));
                self.backend.mark_label(else_label);
                if let Some(else_branch) = else_branch {
                    self.gen_stmt(*else_branch)?;
                }
                self.backend.mark_label(end_label);
            }
            Stmt::While { cond, body, .. } => {
                let body_label = self.backend.new_label();
                let cond_label = self.backend.new_label();
                self.backend.emit(Instr::Jump(cond_label));
                self.backend.mark_label(body_label);
                self.gen_stmt(*body)?;
                self.backend.mark_label(cond_label);
                self.gen_expr(cond)?;
                self.backend.emit(Instr::JumpIfTrue(body_label));
            }
            Stmt::Call(call) => {
                let returns_value = !self.defs[call.callee].ty.is_void();
                self.gen_call(call)?;
                if returns_value {
                    self.backend.emit(Instr::Pop);
                }
            }
            Stmt::Return(value, _) => {
                if let Some(value) = value {
                    let ty = self.defs[self.current].ty;
                    self.gen_expr_as(value, ty)?;
                }
                self.backend.emit(Instr::Ret);
            }
            Stmt::Assert(cond, pos) => {
                self.gen_expr(cond)?;
                self.backend.emit(Instr::Assert(pos));
            }
            Stmt::Block(block) => self.gen_block(block)?,
        }
        Ok(())
    }

    fn gen_var(&mut self, defs: Vec<DefId>, ty: TypeInfo, size: Option<Expr>) -> Result<()> {
        if !ty.is_array {
            for def in defs {
                let storage = self.declare(def);
                self.gen_zero(ty);
                self.backend.emit(Instr::Store(storage));
            }
            return Ok(());
        }

        let size = match size {
            Some(size) => size,
            None => bail!("array declaration without a size"),
        };
        self.gen_expr(size)?;
        let tmp = self.backend.declare_local(Symbol::empty(), TypeInfo::INT);
        self.backend.emit(Instr::Store(tmp));
        for def in defs {
            let storage = self.declare(def);
            self.backend.emit(Instr::Load(tmp));
            self.backend.emit(Instr::NewArray(ty.basic));
            self.backend.emit(Instr::Store(storage));
        }
        Ok(())
    }

    fn declare(&mut self, def: DefId) -> Storage {
        let d = &self.defs[def];
        let storage = match d.kind {
            DefKind::Global => self.backend.declare_static(d.name, d.ty),
            _ => self.backend.declare_local(d.name, d.ty),
        };
        self.storage.insert(def, storage);
        storage
    }

    fn gen_assign(&mut self, target: Place, value: Expr) -> Result<()> {
        match target {
            Place::Var(def) => {
                let ty = self.defs[def].ty;
                let storage = self.storage(def)?;
                if self.defs[def].is_by_ref() {
                    self.backend.emit(Instr::Load(storage));
                    self.gen_expr_as(value, ty)?;
                    self.backend.emit(Instr::StoreRef(ty));
                } else {
                    self.gen_expr_as(value, ty)?;
                    self.backend.emit(Instr::Store(storage));
                }
            }
            Place::Index(def, index) => {
                let ty = self.defs[def].ty;
                self.gen_array(def)?;
                self.gen_expr(*index)?;
                self.gen_expr_as(value, ty.element())?;
                self.backend.emit(Instr::StoreElem(ty.basic));
            }
        }
        Ok(())
    }

    fn gen_expr(&mut self, expr: Expr) -> Result<()> {
        let Expr { kind, ty, sign, .. } = expr;
        match kind {
            ExprKind::Int(n) => self.backend.emit(Instr::PushInt(n)),
            ExprKind::Real(r) => self.backend.emit(Instr::PushReal(r)),
            ExprKind::Str(s) => self.backend.emit(Instr::PushStr(s.to_string())),
            ExprKind::Binary {
                op,
                operand,
                left,
                right,
            } => {
                self.gen_operand(*left, operand)?;
                self.gen_operand(*right, operand)?;
                self.backend.emit(Instr::Binary(op, operand));
            }
            ExprKind::Unary { expr, .. } => {
                self.gen_expr(*expr)?;
                self.backend.emit(Instr::Not);
            }
            ExprKind::Call(call) => self.gen_call(call)?,
            ExprKind::Size(array) => {
                self.gen_expr(*array)?;
                self.backend.emit(Instr::ArrayLen);
            }
            ExprKind::Place(Place::Var(def)) => {
                let storage = self.storage(def)?;
                self.backend.emit(Instr::Load(storage));
                if self.defs[def].is_by_ref() {
                    self.backend.emit(Instr::LoadRef(self.defs[def].ty));
                }
            }
            ExprKind::Place(Place::Index(def, index)) => {
                self.gen_array(def)?;
                self.gen_expr(*index)?;
                self.backend.emit(Instr::LoadElem(self.defs[def].ty.basic));
            }
            ExprKind::Err => bail!("erroneous expression reached code generation"),
        }
        if sign.is_minus() {
            self.backend.emit(Instr::Neg(ty.basic));
        }
        Ok(())
    }

    fn gen_operand(&mut self, expr: Expr, operand: BasicType) -> Result<()> {
        let widen = expr.ty.basic != operand;
        self.gen_expr(expr)?;
        if widen {
            self.backend.emit(Instr::Widen);
        }
        Ok(())
    }

    /// Evaluates `expr`, widening an Int to Real when `target` is Real.
    fn gen_expr_as(&mut self, expr: Expr, target: TypeInfo) -> Result<()> {
        let widen = expr.ty == TypeInfo::INT && target == TypeInfo::REAL;
        self.gen_expr(expr)?;
        if widen {
            self.backend.emit(Instr::Widen);
        }
        Ok(())
    }

    /// Pushes the array reference held by `def`.
    fn gen_array(&mut self, def: DefId) -> Result<()> {
        let storage = self.storage(def)?;
        self.backend.emit(Instr::Load(storage));
        if self.defs[def].is_by_ref() {
            self.backend.emit(Instr::LoadRef(self.defs[def].ty));
        }
        Ok(())
    }

    /// Pushes the address of the place `expr` denotes.
    fn gen_address(&mut self, expr: Expr) -> Result<()> {
        let place = match expr.kind {
            ExprKind::Place(place) => place,
            _ => bail!("reference argument at {} is not addressable", expr.pos),
        };
        match place {
            Place::Var(def) => {
                let storage = self.storage(def)?;
                if self.defs[def].is_by_ref() {
                    self.backend.emit(Instr::Load(storage));
                } else {
                    self.backend.emit(Instr::LoadAddr(storage));
                }
            }
            Place::Index(def, index) => {
                self.gen_array(def)?;
                self.gen_expr(*index)?;
                self.backend.emit(Instr::ElemAddr(self.defs[def].ty.basic));
            }
        }
        Ok(())
    }

    fn gen_call(&mut self, call: Call) -> Result<()> {
        let (params, intrinsic) = match self.defs.callable(call.callee) {
            Some(info) => (info.params.clone(), info.intrinsic),
            None => bail!("'{}' is not a callable", self.defs[call.callee].name),
        };
        match intrinsic {
            Some(Intrinsic::Print) => return self.gen_print(call.args),
            Some(Intrinsic::Read) => return self.gen_read(call.args),
            None => {}
        }

        let func = self.func(call.callee)?;
        if params.len() != call.args.len() {
            bail!(
                "call of '{}' with {} arguments, expected {}",
                self.defs[call.callee].name,
                call.args.len(),
                params.len()
            );
        }
        for (arg, &param) in call.args.into_iter().zip(&params) {
            if self.defs[param].is_by_ref() {
                self.gen_address(arg)?;
            } else {
                self.gen_expr_as(arg, self.defs[param].ty)?;
            }
        }
        self.backend.emit(Instr::Call(func));
        Ok(())
    }

    fn gen_print(&mut self, args: Vec<Expr>) -> Result<()> {
        self.backend.begin_scope();
        let parts = self
            .backend
            .declare_local(Symbol::empty(), TypeInfo::array(BasicType::String));
        self.backend.emit(Instr::PushInt(args.len() as i32));
        self.backend.emit(Instr::NewArray(BasicType::String));
        self.backend.emit(Instr::Store(parts));
        for (i, arg) in args.into_iter().enumerate() {
            let ty = arg.ty;
            self.backend.emit(Instr::Load(parts));
            self.backend.emit(Instr::PushInt(i as i32));
            self.gen_expr(arg)?;
            self.backend.emit(Instr::ToStr(ty));
            self.backend.emit(Instr::StoreElem(BasicType::String));
        }
        self.backend.emit(Instr::PushStr(" ".to_string()));
        self.backend.emit(Instr::Load(parts));
        self.backend.emit(Instr::Join);
        self.backend.emit(Instr::WriteLine);
        self.backend.end_scope();
        Ok(())
    }

    fn gen_read(&mut self, args: Vec<Expr>) -> Result<()> {
        for arg in args {
            let ty = arg.ty;
            self.gen_address(arg)?;
            self.backend.emit(Instr::ReadLine);
            if ty.basic != BasicType::String {
                self.backend.emit(Instr::Parse(ty.basic));
            }
            self.backend.emit(Instr::StoreRef(ty));
        }
        Ok(())
    }

    fn gen_zero(&mut self, ty: TypeInfo) {
        let instr = match ty {
            TypeInfo { is_array: true, .. } => {
                self.backend.emit(Instr::PushInt(0));
                Instr::NewArray(ty.basic)
            }
            TypeInfo { basic, .. } => match basic {
                BasicType::Int => Instr::PushInt(0),
                BasicType::Real => Instr::PushReal(0.0),
                BasicType::String => Instr::PushStr(String::new()),
                BasicType::Bool => Instr::PushBool(false),
                BasicType::Void => return,
            },
        };
        self.backend.emit(instr);
    }

    fn func(&self, def: DefId) -> Result<FuncId> {
        match self.funcs.get(&def) {
            Some(&func) => Ok(func),
            None => bail!("unresolved function '{}'", self.defs[def].name),
        }
    }

    fn storage(&self, def: DefId) -> Result<Storage> {
        match self.storage.get(&def) {
            Some(&storage) => Ok(storage),
            None => bail!("no storage for '{}' ({})", self.defs[def].name, def),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compile, lex::Pos, parse::ast::BinOp};
    use Instr::*;
    // The struct, not the instruction.
    use super::Label;

    fn code_of(src: &str, func: &str) -> Vec<Instr> {
        let module = compile(src).unwrap();
        module.function_named(func).unwrap().code.clone()
    }

    fn contains(code: &[Instr], seq: &[Instr]) -> bool {
        code.windows(seq.len()).any(|w| w == seq)
    }

    #[test]
    fn prologue_initializes_constants() {
        let module = compile("program p; begin end.").unwrap();
        let entry = module.entry_function().unwrap();
        assert_eq!(entry.name, "p");
        assert_eq!(module.statics.len(), 2);
        assert_eq!(
            entry.code,
            vec![
                PushBool(true),
                Store(Storage::Static(0)),
                PushBool(false),
                Store(Storage::Static(1)),
                Ret
            ]
        );
    }

    #[test]
    fn globals_become_statics() {
        let code = code_of("program p; begin var x: int; x := 3 end.", "p");
        assert!(contains(
            &code,
            &[
                PushInt(0),
                Store(Storage::Static(2)),
                PushInt(3),
                Store(Storage::Static(2))
            ]
        ));
    }

    #[test]
    fn if_layout() {
        let code = code_of(
            "program p; begin var x: int; if x = 1 then x := 2 else x := 3 end.",
            "p",
        );
        let x = Storage::Static(2);
        assert!(contains(
            &code,
            &[
                Load(x),
                PushInt(1),
                Binary(BinOp::Eq, BasicType::Int),
                JumpIfFalse(Label(0)),
                PushInt(2),
                Store(x),
                Jump(Label(1)),
                Instr::Label(Label(0)),
                PushInt(3),
                Store(x),
                Instr::Label(Label(1)),
            ]
        ));
    }

    #[test]
    fn while_layout() {
        let code = code_of(
            "program p; begin var i: int; while i < 3 do i := i + 1 end.",
            "p",
        );
        let i = Storage::Static(2);
        assert!(contains(
            &code,
            &[
                Jump(Label(1)),
                Instr::Label(Label(0)),
                Load(i),
                PushInt(1),
                Binary(BinOp::Add, BasicType::Int),
                Store(i),
                Instr::Label(Label(1)),
                Load(i),
                PushInt(3),
                Binary(BinOp::Lt, BasicType::Int),
                JumpIfTrue(Label(0)),
            ]
        ));
    }

    #[test]
    fn print_joins_string_array() {
        let code = code_of("program p; begin writeln(1, \"a\") end.", "p");
        let parts = Storage::Local(0);
        assert!(contains(
            &code,
            &[
                PushInt(2),
                NewArray(BasicType::String),
                Store(parts),
                Load(parts),
                PushInt(0),
                PushInt(1),
                ToStr(TypeInfo::INT),
                StoreElem(BasicType::String),
                Load(parts),
                PushInt(1),
                PushStr("a".to_string()),
                ToStr(TypeInfo::STRING),
                StoreElem(BasicType::String),
                PushStr(" ".to_string()),
                Load(parts),
                Join,
                WriteLine,
            ]
        ));
    }

    #[test]
    fn read_stores_through_address() {
        let code = code_of("program p; begin var n: int; var s: string; read(n, s) end.", "p");
        assert!(contains(
            &code,
            &[
                LoadAddr(Storage::Static(2)),
                ReadLine,
                Parse(BasicType::Int),
                StoreRef(TypeInfo::INT),
                LoadAddr(Storage::Static(3)),
                ReadLine,
                StoreRef(TypeInfo::STRING),
            ]
        ));
    }

    #[test]
    fn reference_parameters_go_through_addresses() {
        let src = "program p; begin \
                     procedure inc(var k: int) begin k := k + 1 end; \
                     var a: array[2] of int; var n: int; \
                     inc(n); inc(a[1]) \
                   end.";
        let inc = code_of(src, "inc");
        assert_eq!(
            inc,
            vec![
                Load(Storage::Arg(0)),
                Load(Storage::Arg(0)),
                LoadRef(TypeInfo::INT),
                PushInt(1),
                Binary(BinOp::Add, BasicType::Int),
                StoreRef(TypeInfo::INT),
                Ret
            ]
        );

        let main = code_of(src, "p");
        assert!(contains(&main, &[LoadAddr(Storage::Static(3)), Call(FuncId(1))]));
        assert!(contains(
            &main,
            &[
                Load(Storage::Static(2)),
                PushInt(1),
                ElemAddr(BasicType::Int),
                Call(FuncId(1))
            ]
        ));
    }

    #[test]
    fn captured_variable_is_passed_by_address() {
        let src = "program p; begin \
                     var count: int; \
                     procedure p1() begin writeln(count) end; \
                     p1() \
                   end.";
        let main = code_of(src, "p");
        assert!(contains(&main, &[LoadAddr(Storage::Static(2)), Call(FuncId(1))]));

        let p1 = code_of(src, "p1");
        assert!(contains(
            &p1,
            &[Load(Storage::Arg(0)), LoadRef(TypeInfo::INT), ToStr(TypeInfo::INT)]
        ));
    }

    #[test]
    fn widening_and_negation() {
        let code = code_of("program p; begin var r: real; r := -2 + 1.5 end.", "p");
        assert!(contains(
            &code,
            &[
                PushInt(2),
                Neg(BasicType::Int),
                Widen,
                PushReal(1.5),
                Binary(BinOp::Add, BasicType::Real),
                Store(Storage::Static(2))
            ]
        ));

        let code = code_of("program p; begin var r: real; r := 1 end.", "p");
        assert!(contains(&code, &[PushInt(1), Widen, Store(Storage::Static(2))]));
    }

    #[test]
    fn function_falls_back_to_zero() {
        let code = code_of(
            "program p; begin \
               function f(x: int): real; begin if x > 0 then return x end; \
               writeln(f(1)) \
             end.",
            "f",
        );
        assert!(contains(&code, &[Load(Storage::Arg(0)), Widen, Ret]));
        assert_eq!(&code[code.len() - 2..], &[PushReal(0.0), Ret]);
    }

    #[test]
    fn array_declaration_uses_size_once() {
        let code = code_of("program p; begin var a, b: array[3] of real end.", "p");
        let tmp = Storage::Local(0);
        assert!(contains(
            &code,
            &[
                PushInt(3),
                Store(tmp),
                Load(tmp),
                NewArray(BasicType::Real),
                Store(Storage::Static(2)),
                Load(tmp),
                NewArray(BasicType::Real),
                Store(Storage::Static(3)),
            ]
        ));
    }

    #[test]
    fn assertion_carries_position() {
        let code = code_of("program p; begin assert(1 = 1) end.", "p");
        assert!(contains(
            &code,
            &[Binary(BinOp::Eq, BasicType::Int), Assert(Pos::new(1, 18))]
        ));
    }
}
