use crate::{
    err::{Category, Handler},
    lex::{Pos, Token},
    parse::ast::{self, Sign},
    symbol::{ScopeId, Symbol, SymbolTable},
};
use log::{debug, trace};

use super::{
    defs::{CallableInfo, CallableKind, Def, DefId, DefKind, Defs, Intrinsic},
    hir,
    ty::{self, TypeInfo},
};

/// Annotated program together with every definition it makes.
#[derive(Debug)]
pub struct Analysis {
    pub program: hir::Program,
    pub defs: Defs,
}

/// Resolves names and checks types, rebuilding the AST as HIR. Problems are
/// reported to `handler`; the returned HIR is only meaningful when none were.
pub fn annotate(program: ast::Program, handler: &Handler) -> Analysis {
    let mut this = Annotate::new(&program.name, handler);
    let program = this.annotate_program(program);
    this.propagate_captures();
    Analysis {
        program,
        defs: this.defs,
    }
}

struct Annotate<'a> {
    defs: Defs,
    scopes: SymbolTable<DefId>,
    main: DefId,
    callables: Vec<DefId>,
    /// Caller and callee of every call to a user callable, in source order.
    calls: Vec<(DefId, DefId)>,
    program_scope: ScopeId,
    handler: &'a Handler,
}

impl<'a> Annotate<'a> {
    fn new(name: &Token, handler: &'a Handler) -> Self {
        let mut defs = Defs::new();
        let main = defs.push(Def {
            name: name.symbol,
            ty: TypeInfo::VOID,
            scope: ScopeId::PREDEFINED,
            kind: DefKind::Callable(CallableInfo::new(CallableKind::Procedure, None)),
            pos: name.pos,
        });
        defs.set_main(main);

        let mut this = Self {
            defs,
            scopes: SymbolTable::new(),
            main,
            callables: vec![],
            calls: vec![],
            program_scope: ScopeId::PREDEFINED,
            handler,
        };
        this.predefine();
        this
    }

    fn predefine(&mut self) {
        for name in &["true", "false"] {
            self.predefine_one(name, TypeInfo::BOOL, DefKind::Global);
        }
        for &(name, intrinsic) in &[("writeln", Intrinsic::Print), ("read", Intrinsic::Read)] {
            let mut info = CallableInfo::new(CallableKind::Procedure, None);
            info.intrinsic = Some(intrinsic);
            self.predefine_one(name, TypeInfo::VOID, DefKind::Callable(info));
        }
    }

    fn predefine_one(&mut self, name: &str, ty: TypeInfo, kind: DefKind) {
        let name = Symbol::intern(name);
        let id = self.defs.push(Def {
            name,
            ty,
            scope: ScopeId::PREDEFINED,
            kind,
            pos: Pos::DUMMY,
        });
        let _ = self.scopes.insert(name, id);
    }

    fn annotate_program(&mut self, program: ast::Program) -> hir::Program {
        self.callables.push(self.main);
        self.program_scope = self.scopes.enter_scope();
        let stmts = self.annotate_stmts(program.block.stmts);
        self.scopes.leave_scope();
        self.callables.pop();

        hir::Program {
            name: program.name.symbol,
            main: self.main,
            body: hir::Block { stmts },
        }
    }

    fn annotate_block(&mut self, block: ast::Block) -> hir::Block {
        self.enter_block_scope(|this| hir::Block {
            stmts: this.annotate_stmts(block.stmts),
        })
    }

    fn annotate_stmts(&mut self, stmts: Vec<ast::Stmt>) -> Vec<hir::Stmt> {
        stmts
            .into_iter()
            .filter_map(|s| self.annotate_stmt(s))
            .collect()
    }

    /// `None` when the statement could not be resolved; it has been reported.
    fn annotate_stmt(&mut self, stmt: ast::Stmt) -> Option<hir::Stmt> {
        match stmt {
            ast::Stmt::Var { names, ty, pos } => Some(self.annotate_var_decl(names, ty, pos)),
            ast::Stmt::Procedure(c) => self.annotate_callable(c, CallableKind::Procedure),
            ast::Stmt::Function(c) => self.annotate_callable(c, CallableKind::Function),
            ast::Stmt::Assign { target, value, pos } => {
                let name = target.name().symbol;
                let target = self.annotate_var_ref(target);
                let value = self.annotate_expr(value);
                if target.ty.is_void() || value.ty.is_void() {
                    return None;
                }
                if !ty::assignable(target.ty, value.ty) {
                    self.error(
                        pos,
                        &format!(
                            "Can't assign a value of type {} in a variable of type {}",
                            value.ty, target.ty
                        ),
                    );
                    return None;
                }
                if target.ty.is_array {
                    self.error(pos, &format!("Can't assign to array '{}' as a whole", name));
                    return None;
                }
                match target.kind {
                    hir::ExprKind::Place(target) => Some(hir::Stmt::Assign { target, value, pos }),
                    _ => None,
                }
            }
            ast::Stmt::If {
                cond,
                then_branch,
                else_branch,
                pos,
            } => {
                let cond = self.annotate_cond(cond, "If test expression");
                let then_branch = Box::new(self.annotate_branch(*then_branch));
                let else_branch = else_branch.map(|s| Box::new(self.annotate_branch(*s)));
                Some(hir::Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    pos,
                })
            }
            ast::Stmt::While { cond, body, pos } => {
                let cond = self.annotate_cond(cond, "While condition expression");
                let body = Box::new(self.annotate_branch(*body));
                Some(hir::Stmt::While { cond, body, pos })
            }
            ast::Stmt::Call(call) => self.annotate_call_stmt(call).map(hir::Stmt::Call),
            ast::Stmt::Return(value, pos) => self.annotate_return(value, pos),
            ast::Stmt::Assert(cond, pos) => {
                let cond = self.annotate_cond(cond, "Assertion expression");
                Some(hir::Stmt::Assert(cond, pos))
            }
            ast::Stmt::Block(block) => Some(hir::Stmt::Block(self.annotate_block(block))),
        }
    }

    fn annotate_branch(&mut self, stmt: ast::Stmt) -> hir::Stmt {
        self.annotate_stmt(stmt)
            .unwrap_or_else(|| hir::Stmt::Block(hir::Block::default()))
    }

    fn annotate_cond(&mut self, cond: ast::Expr, what: &str) -> hir::Expr {
        let cond = self.annotate_expr(cond);
        if !cond.ty.is_void() && cond.ty != TypeInfo::BOOL {
            self.error(cond.pos, &format!("{} has to be of type Bool", what));
        }
        cond
    }

    fn annotate_var_decl(&mut self, names: Vec<Token>, ty: ast::Ty, pos: Pos) -> hir::Stmt {
        let (ty, size) = match ty.kind {
            ast::TyKind::Simple(basic) => (TypeInfo::scalar(basic), None),
            ast::TyKind::Array(basic, size) => {
                let size = match size {
                    Some(size) => Some(self.annotate_array_size(*size)),
                    None => {
                        let name = names.first().map(|t| t.symbol).unwrap_or_else(Symbol::empty);
                        self.error(
                            ty.pos,
                            &format!("Array size missing in declaration of '{}'", name),
                        );
                        None
                    }
                };
                (TypeInfo::array(basic), size)
            }
        };

        let owner = self.current();
        let is_global = self.scopes.current() == self.program_scope;
        let mut defs = vec![];
        for name in names {
            let kind = if is_global {
                DefKind::Global
            } else {
                DefKind::Local { owner }
            };
            if let Some(id) = self.declare(&name, ty, kind) {
                if !is_global {
                    if let Some(info) = self.defs.callable_mut(owner) {
                        info.locals.push(id);
                    }
                }
                defs.push(id);
            }
        }

        hir::Stmt::Var {
            defs,
            ty,
            size,
            pos,
        }
    }

    fn annotate_array_size(&mut self, size: ast::Expr) -> hir::Expr {
        let size = self.annotate_expr(size);
        if !size.ty.is_void() && size.ty != TypeInfo::INT {
            self.error(size.pos, "Array size expression has to be of type Int");
        }
        size
    }

    /// Type of a parameter or return value. A size written there is checked
    /// and then ignored.
    fn signature_ty(&mut self, ty: ast::Ty) -> TypeInfo {
        match ty.kind {
            ast::TyKind::Simple(basic) => TypeInfo::scalar(basic),
            ast::TyKind::Array(basic, size) => {
                if let Some(size) = size {
                    self.annotate_array_size(*size);
                }
                TypeInfo::array(basic)
            }
        }
    }

    fn annotate_callable(&mut self, c: ast::Callable, kind: CallableKind) -> Option<hir::Stmt> {
        let ast::Callable {
            name,
            params,
            ret,
            body,
            ..
        } = c;
        if self.scopes.is_declared_in_current(name.symbol) {
            self.redeclared(&name);
            return None;
        }

        let ret = match ret {
            Some(ty) => self.signature_ty(ty),
            None => TypeInfo::VOID,
        };
        let info = CallableInfo::new(kind, Some(self.current()));
        let def = self.declare(&name, ret, DefKind::Callable(info))?;
        debug!("declared {:?} '{}' as {}", kind, name.symbol, def);

        self.callables.push(def);
        let body = self.enter_block_scope(|this| {
            for param in params {
                let ty = this.signature_ty(param.ty);
                let kind = DefKind::Param {
                    owner: def,
                    by_ref: param.by_ref,
                };
                if let Some(id) = this.declare(&param.name, ty, kind) {
                    if let Some(info) = this.defs.callable_mut(def) {
                        info.params.push(id);
                    }
                }
            }
            this.annotate_block(body)
        });
        self.callables.pop();

        Some(hir::Stmt::Callable(hir::Callable { def, body }))
    }

    fn annotate_return(&mut self, value: Option<ast::Expr>, pos: Pos) -> Option<hir::Stmt> {
        let current = self.current();
        let expected = self.defs[current].ty;
        let value = value.map(|v| self.annotate_expr(v));

        match &value {
            Some(_) if expected.is_void() => {
                self.error(pos, "Can't return a value in a procedure");
                return None;
            }
            None if !expected.is_void() => {
                self.error(pos, "Return statement can't be empty in a function");
                return None;
            }
            Some(v) if !v.ty.is_void() && !ty::assignable(expected, v.ty) => {
                self.error(
                    pos,
                    &format!(
                        "Can't return a value of type {} in a function of type {}",
                        v.ty, expected
                    ),
                );
                return None;
            }
            _ => {}
        }
        Some(hir::Stmt::Return(value, pos))
    }

    fn annotate_expr(&mut self, expr: ast::Expr) -> hir::Expr {
        let ast::Expr { kind, sign, pos } = expr;
        let mut expr = match kind {
            ast::ExprKind::Literal(lit) => {
                let (kind, ty) = match lit {
                    ast::Lit::Int(n) => (hir::ExprKind::Int(n), TypeInfo::INT),
                    ast::Lit::Real(r) => (hir::ExprKind::Real(r), TypeInfo::REAL),
                    ast::Lit::Str(s) => (hir::ExprKind::Str(s), TypeInfo::STRING),
                };
                hir::Expr {
                    kind,
                    ty,
                    sign: Sign::Plus,
                    pos,
                }
            }
            ast::ExprKind::Binary { op, left, right } => {
                let left = self.annotate_expr(*left);
                let right = self.annotate_expr(*right);
                if left.ty.is_void() || right.ty.is_void() {
                    return hir::Expr::err(pos);
                }
                match ty::binary_result(op, left.ty, right.ty) {
                    Some((operand, ty)) => hir::Expr {
                        kind: hir::ExprKind::Binary {
                            op,
                            operand,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                        ty,
                        sign: Sign::Plus,
                        pos,
                    },
                    None => {
                        self.error(
                            pos,
                            &format!(
                                "Can't apply operator {} on types {} and {}",
                                op, left.ty, right.ty
                            ),
                        );
                        return hir::Expr::err(pos);
                    }
                }
            }
            ast::ExprKind::Unary { op, expr } => {
                let operand = self.annotate_expr(*expr);
                if operand.ty.is_void() {
                    return hir::Expr::err(pos);
                }
                match ty::unary_result(op, operand.ty) {
                    Some(ty) => hir::Expr {
                        kind: hir::ExprKind::Unary {
                            op,
                            expr: Box::new(operand),
                        },
                        ty,
                        sign: Sign::Plus,
                        pos,
                    },
                    None => {
                        self.error(
                            pos,
                            &format!("Can't apply operator {} on type {}", op, operand.ty),
                        );
                        return hir::Expr::err(pos);
                    }
                }
            }
            ast::ExprKind::Call(call) => self.annotate_call_expr(call),
            ast::ExprKind::Member(base, member) => {
                let base = self.annotate_expr(*base);
                if base.ty.is_void() {
                    return hir::Expr::err(pos);
                }
                if base.ty.is_array && member.symbol == "size" {
                    hir::Expr {
                        kind: hir::ExprKind::Size(Box::new(base)),
                        ty: TypeInfo::INT,
                        sign: Sign::Plus,
                        pos,
                    }
                } else {
                    self.error(
                        member.pos,
                        &format!("{} has no member '{}'", base.ty, member.symbol),
                    );
                    return hir::Expr::err(pos);
                }
            }
            ast::ExprKind::Variable(var) => self.annotate_var_ref(var),
        };

        if sign.is_minus() && !expr.ty.is_void() {
            if !expr.ty.is_numeric() {
                self.error(pos, &format!("Can't apply operator - on type {}", expr.ty));
                return hir::Expr::err(pos);
            }
            expr.sign = Sign::Minus;
        }
        expr
    }

    fn annotate_var_ref(&mut self, var: ast::VarRef) -> hir::Expr {
        let name = var.name().clone();
        let def = match self.lookup_variable(&name) {
            Some(def) => def,
            None => return hir::Expr::err(name.pos),
        };
        let ty = self.defs[def].ty;

        let (place, ty) = match var {
            ast::VarRef::Ident(_) => (hir::Place::Var(def), ty),
            ast::VarRef::Index(_, index) => {
                let index = self.annotate_expr(*index);
                if !ty.is_array {
                    self.error(
                        name.pos,
                        &format!("Variable '{}' is not declared as an array", name.symbol),
                    );
                    return hir::Expr::err(name.pos);
                }
                if !index.ty.is_void() && index.ty != TypeInfo::INT {
                    self.error(index.pos, "Array subscript expression has to be of type Int");
                }
                (hir::Place::Index(def, Box::new(index)), ty.element())
            }
        };

        hir::Expr {
            kind: hir::ExprKind::Place(place),
            ty,
            sign: Sign::Plus,
            pos: name.pos,
        }
    }

    fn lookup_variable(&mut self, name: &Token) -> Option<DefId> {
        match self.scopes.get(name.symbol) {
            None => {
                self.error(name.pos, &format!("Undeclared variable '{}'", name.symbol));
                None
            }
            Some(def) if !self.defs[def].is_variable() => {
                self.error(name.pos, &format!("'{}' is not a variable", name.symbol));
                None
            }
            Some(def) => {
                self.capture(def);
                Some(def)
            }
        }
    }

    /// Records `var` as captured by the current callable if its storage
    /// belongs to another one.
    fn capture(&mut self, var: DefId) {
        let current = self.current();
        match self.defs.owner(var) {
            Some(owner) if owner != current => {
                if self.defs.add_capture(current, var) {
                    debug!(
                        "'{}' captures '{}' ({})",
                        self.defs[current].name, self.defs[var].name, var
                    );
                }
            }
            _ => {}
        }
    }

    fn annotate_call_stmt(&mut self, call: ast::Call) -> Option<hir::Call> {
        let name = call.callee.symbol;
        let (callee, kind) = match self.lookup_callable(&call.callee) {
            Some(found) => found,
            None => {
                self.error(call.pos, &format!("Undeclared procedure '{}'", name));
                return None;
            }
        };
        let kind = match kind {
            Some(kind) => kind,
            None => {
                self.error(
                    call.pos,
                    &format!("'{}' is not defined as a function or a procedure", name),
                );
                return None;
            }
        };

        let args = self.annotate_args(callee, &call.callee, call.args, call.pos);
        if kind == CallableKind::Function {
            self.error(
                call.pos,
                &format!("Return value of function '{}' is discarded", name),
            );
            return None;
        }
        Some(hir::Call {
            callee,
            args,
            pos: call.pos,
        })
    }

    fn annotate_call_expr(&mut self, call: ast::Call) -> hir::Expr {
        let name = call.callee.symbol;
        let callee = match self.lookup_callable(&call.callee) {
            None => {
                self.error(call.pos, &format!("Undeclared function '{}'", name));
                return hir::Expr::err(call.pos);
            }
            Some((callee, Some(CallableKind::Function))) => callee,
            Some(_) => {
                self.error(call.pos, &format!("'{}' is not defined as a function", name));
                return hir::Expr::err(call.pos);
            }
        };

        let args = self.annotate_args(callee, &call.callee, call.args, call.pos);
        hir::Expr {
            kind: hir::ExprKind::Call(hir::Call {
                callee,
                args,
                pos: call.pos,
            }),
            ty: self.defs[callee].ty,
            sign: Sign::Plus,
            pos: call.pos,
        }
    }

    /// The definition bound to `name`, and its callable kind if it is one.
    fn lookup_callable(&self, name: &Token) -> Option<(DefId, Option<CallableKind>)> {
        let def = self.scopes.get(name.symbol)?;
        Some((def, self.defs.callable(def).map(|info| info.kind)))
    }

    fn annotate_args(
        &mut self,
        callee: DefId,
        name: &Token,
        args: Vec<ast::Expr>,
        pos: Pos,
    ) -> Vec<hir::Expr> {
        let args: Vec<hir::Expr> = args.into_iter().map(|a| self.annotate_expr(a)).collect();
        let (params, intrinsic) = match self.defs.callable(callee) {
            Some(info) => (info.params.clone(), info.intrinsic),
            None => return args,
        };
        let name = name.symbol;

        if let Some(intrinsic) = intrinsic {
            for (i, arg) in args.iter().enumerate() {
                if arg.ty.is_void() {
                    continue;
                }
                if arg.ty.is_array {
                    self.error(
                        pos,
                        &format!("'{}' argument {} can't be of type {}", name, i + 1, arg.ty),
                    );
                } else if intrinsic == Intrinsic::Read && !is_variable(arg) {
                    self.expects_variable(pos, name, i, arg.ty);
                }
            }
            return args;
        }

        self.calls.push((self.current(), callee));
        if args.len() != params.len() {
            self.error(
                pos,
                &format!(
                    "'{}' takes {} arguments, {} given",
                    name,
                    params.len(),
                    args.len()
                ),
            );
            return args;
        }

        for (i, (arg, &param)) in args.iter().zip(&params).enumerate() {
            if arg.ty.is_void() {
                continue;
            }
            let param = &self.defs[param];
            let (param_ty, by_ref) = (param.ty, param.is_by_ref());
            let fits = if by_ref {
                arg.ty == param_ty
            } else {
                ty::assignable(param_ty, arg.ty)
            };
            if !fits {
                self.error(
                    pos,
                    &format!(
                        "'{}' argument {} expects a parameter of type {}, {} given",
                        name,
                        i + 1,
                        param_ty,
                        arg.ty
                    ),
                );
            }
            if by_ref && !is_variable(arg) {
                self.expects_variable(pos, name, i, arg.ty);
            }
        }
        args
    }

    fn expects_variable(&self, pos: Pos, name: Symbol, i: usize, ty: TypeInfo) {
        self.error(
            pos,
            &format!("'{}' argument {} expects a variable of type {}", name, i + 1, ty),
        );
    }

    /// Extends captures along call edges until every caller can supply the
    /// captured variables of the callables it calls.
    fn propagate_captures(&mut self) {
        let calls = std::mem::take(&mut self.calls);
        loop {
            let mut changed = false;
            for &(caller, callee) in &calls {
                let captures = match self.defs.callable(callee) {
                    Some(info) => info.captures.clone(),
                    None => continue,
                };
                for var in captures {
                    if self.defs.owner(var) != Some(caller) && self.defs.add_capture(caller, var) {
                        debug!(
                            "'{}' captures '{}' for its call to '{}'",
                            self.defs[caller].name, self.defs[var].name, self.defs[callee].name
                        );
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn declare(&mut self, name: &Token, ty: TypeInfo, kind: DefKind) -> Option<DefId> {
        if self.scopes.is_declared_in_current(name.symbol) {
            self.redeclared(name);
            return None;
        }
        let id = self.defs.push(Def {
            name: name.symbol,
            ty,
            scope: self.scopes.current(),
            kind,
            pos: name.pos,
        });
        trace!("bind '{}' -> {} in scope {}", name.symbol, id, self.scopes.current());
        let _ = self.scopes.insert(name.symbol, id);
        Some(id)
    }

    fn redeclared(&self, name: &Token) {
        self.error(
            name.pos,
            &format!("'{}' is already declared in current scope", name.symbol),
        );
    }

    fn current(&self) -> DefId {
        self.callables.last().copied().unwrap_or(self.main)
    }

    fn error(&self, pos: Pos, msg: &str) {
        self.handler.report(Category::Semantic, pos, msg);
    }

    fn enter_block_scope<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Annotate<'a>) -> R,
    {
        self.scopes.enter_scope();
        let result = f(self);
        self.scopes.leave_scope();
        result
    }
}

/// Whether `arg` denotes storage that can be passed by reference.
fn is_variable(arg: &hir::Expr) -> bool {
    arg.place().is_some() && !arg.sign.is_minus()
}
