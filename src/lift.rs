//! Closure conversion. Every callable that uses variables of enclosing
//! callables receives them as extra reference parameters, and every call to
//! it passes them along.

use crate::{
    parse::ast::Sign,
    typeck::{
        defs::{Def, DefId, DefKind, Defs},
        hir::{Block, Call, Callable, Expr, ExprKind, Place, Program, Stmt},
        Analysis,
    },
};
use log::debug;
use std::collections::HashMap;

/// Captured variable -> the parameter that replaces it, per callable.
type Substs = HashMap<DefId, HashMap<DefId, DefId>>;

pub fn lift(analysis: Analysis) -> Analysis {
    let Analysis { program, mut defs } = analysis;
    let substs = add_capture_params(&mut defs);
    let program = Lift {
        defs: &defs,
        substs: &substs,
        current: program.main,
    }
    .lift_program(program);
    Analysis { program, defs }
}

fn add_capture_params(defs: &mut Defs) -> Substs {
    let main = defs.main();
    let capturing: Vec<(DefId, Vec<DefId>)> = defs
        .iter()
        .filter_map(|(id, def)| match &def.kind {
            DefKind::Callable(info)
                if info.intrinsic.is_none() && !info.captures.is_empty() && Some(id) != main =>
            {
                Some((id, info.captures.clone()))
            }
            _ => None,
        })
        .collect();

    let mut substs = Substs::new();
    for (callable, captures) in capturing {
        let scope = defs[callable].scope;
        let mut subst = HashMap::new();
        for var in captures {
            let (name, ty, pos) = (defs[var].name, defs[var].ty, defs[var].pos);
            let param = defs.push(Def {
                name,
                ty,
                scope,
                kind: DefKind::Param {
                    owner: callable,
                    by_ref: true,
                },
                pos,
            });
            if let Some(info) = defs.callable_mut(callable) {
                info.params.push(param);
            }
            debug!(
                "'{}' gets reference parameter '{}' ({}) for {}",
                defs[callable].name, name, param, var
            );
            subst.insert(var, param);
        }
        substs.insert(callable, subst);
    }
    substs
}

struct Lift<'a> {
    defs: &'a Defs,
    substs: &'a Substs,
    current: DefId,
}

impl<'a> Lift<'a> {
    fn lift_program(&mut self, program: Program) -> Program {
        Program {
            body: self.lift_block(program.body),
            ..program
        }
    }

    fn lift_block(&mut self, block: Block) -> Block {
        Block {
            stmts: block.stmts.into_iter().map(|s| self.lift_stmt(s)).collect(),
        }
    }

    fn lift_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::Var {
                defs,
                ty,
                size,
                pos,
            } => Stmt::Var {
                defs,
                ty,
                size: size.map(|e| self.lift_expr(e)),
                pos,
            },
            Stmt::Callable(Callable { def, body }) => {
                let outer = std::mem::replace(&mut self.current, def);
                let body = self.lift_block(body);
                self.current = outer;
                Stmt::Callable(Callable { def, body })
            }
            Stmt::Assign { target, value, pos } => Stmt::Assign {
                target: self.lift_place(target),
                value: self.lift_expr(value),
                pos,
            },
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                pos,
            } => Stmt::If {
                cond: self.lift_expr(cond),
                then_branch: Box::new(self.lift_stmt(*then_branch)),
                else_branch: else_branch.map(|s| Box::new(self.lift_stmt(*s))),
                pos,
            },
            Stmt::While { cond, body, pos } => Stmt::While {
                cond: self.lift_expr(cond),
                body: Box::new(self.lift_stmt(*body)),
                pos,
            },
            Stmt::Call(call) => Stmt::Call(self.lift_call(call)),
            Stmt::Return(value, pos) => Stmt::Return(value.map(|e| self.lift_expr(e)), pos),
            Stmt::Assert(cond, pos) => Stmt::Assert(self.lift_expr(cond), pos),
            Stmt::Block(block) => Stmt::Block(self.lift_block(block)),
        }
    }

    fn lift_expr(&mut self, expr: Expr) -> Expr {
        let kind = match expr.kind {
            ExprKind::Binary {
                op,
                operand,
                left,
                right,
            } => ExprKind::Binary {
                op,
                operand,
                left: Box::new(self.lift_expr(*left)),
                right: Box::new(self.lift_expr(*right)),
            },
            ExprKind::Unary { op, expr: inner } => ExprKind::Unary {
                op,
                expr: Box::new(self.lift_expr(*inner)),
            },
            ExprKind::Call(call) => ExprKind::Call(self.lift_call(call)),
            ExprKind::Size(inner) => ExprKind::Size(Box::new(self.lift_expr(*inner))),
            ExprKind::Place(place) => ExprKind::Place(self.lift_place(place)),
            kind @ ExprKind::Int(_)
            | kind @ ExprKind::Real(_)
            | kind @ ExprKind::Str(_)
            | kind @ ExprKind::Err => kind,
        };
        Expr { kind, ..expr }
    }

    fn lift_place(&mut self, place: Place) -> Place {
        match place {
            Place::Var(def) => Place::Var(self.subst(def)),
            Place::Index(def, index) => {
                Place::Index(self.subst(def), Box::new(self.lift_expr(*index)))
            }
        }
    }

    fn lift_call(&mut self, call: Call) -> Call {
        let mut args: Vec<Expr> = call.args.into_iter().map(|a| self.lift_expr(a)).collect();
        if self.substs.contains_key(&call.callee) {
            if let Some(info) = self.defs.callable(call.callee) {
                for &var in &info.captures {
                    args.push(Expr {
                        kind: ExprKind::Place(Place::Var(self.subst(var))),
                        ty: self.defs[var].ty,
                        sign: Sign::Plus,
                        pos: call.pos,
                    });
                }
            }
        }
        Call { args, ..call }
    }

    /// The definition `def` stands for inside the callable being walked.
    fn subst(&self, def: DefId) -> DefId {
        self.substs
            .get(&self.current)
            .and_then(|subst| subst.get(&def))
            .copied()
            .unwrap_or(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{err::Handler, parse::Parser, typeck::annotate};

    fn lifted(src: &str) -> Analysis {
        let handler = Handler::new();
        let program = Parser::new(src, &handler).parse().unwrap();
        let analysis = annotate(program, &handler);
        assert!(!handler.has_errors());
        lift(analysis)
    }

    fn def_named(analysis: &Analysis, name: &str) -> DefId {
        analysis
            .defs
            .iter()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| id)
            .unwrap()
    }

    fn params(analysis: &Analysis, callable: DefId) -> Vec<DefId> {
        analysis.defs.callable(callable).unwrap().params.clone()
    }

    /// Calls made directly by the statements of `block`, not by nested callables.
    fn calls_in(block: &Block) -> Vec<&Call> {
        fn walk<'b>(stmt: &'b Stmt, out: &mut Vec<&'b Call>) {
            match stmt {
                Stmt::Call(call) => out.push(call),
                Stmt::Block(block) => block.stmts.iter().for_each(|s| walk(s, out)),
                Stmt::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    walk(then_branch, out);
                    if let Some(e) = else_branch {
                        walk(e, out);
                    }
                }
                Stmt::While { body, .. } => walk(body, out),
                _ => {}
            }
        }
        let mut out = vec![];
        block.stmts.iter().for_each(|s| walk(s, &mut out));
        out
    }

    fn body_of(block: &Block, def: DefId) -> Option<&Block> {
        block.stmts.iter().find_map(|stmt| match stmt {
            Stmt::Callable(c) if c.def == def => Some(&c.body),
            Stmt::Callable(c) => body_of(&c.body, def),
            Stmt::Block(b) => body_of(b, def),
            _ => None,
        })
    }

    fn arg_def(arg: &Expr) -> DefId {
        arg.place().map(Place::def).unwrap()
    }

    #[test]
    fn captured_variable_becomes_reference_parameter() {
        let analysis = lifted(
            "program p; begin \
               var count: int; \
               procedure p1() begin writeln(count) end; \
               p1() \
             end.",
        );
        let count = def_named(&analysis, "count");
        let p1 = def_named(&analysis, "p1");

        let p1_params = params(&analysis, p1);
        assert_eq!(p1_params.len(), 1);
        let param = &analysis.defs[p1_params[0]];
        assert_eq!(param.name, "count");
        assert!(param.is_by_ref());

        let calls = calls_in(&analysis.program.body);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.len(), 1);
        assert_eq!(arg_def(&calls[0].args[0]), count);
        assert_eq!(analysis.defs[arg_def(&calls[0].args[0])].name, "count");

        let body = body_of(&analysis.program.body, p1).unwrap();
        let print = calls_in(body)[0];
        assert_eq!(arg_def(&print.args[0]), p1_params[0]);
    }

    #[test]
    fn callable_without_captures_is_unchanged() {
        let analysis = lifted(
            "program p; begin \
               procedure q(k: int) begin var j: int; j := k end; \
               q(1) \
             end.",
        );
        let q = def_named(&analysis, "q");
        assert_eq!(params(&analysis, q).len(), 1);
        assert_eq!(calls_in(&analysis.program.body)[0].args.len(), 1);
    }

    #[test]
    fn intermediate_callers_forward_their_parameter() {
        let analysis = lifted(
            "program p; begin \
               procedure outer() begin \
                 var x: int; \
                 procedure middle() begin \
                   procedure inner() begin x := x + 1 end; \
                   inner() \
                 end; \
                 middle() \
               end; \
               outer() \
             end.",
        );
        let x = def_named(&analysis, "x");
        let outer = def_named(&analysis, "outer");
        let middle = def_named(&analysis, "middle");
        let inner = def_named(&analysis, "inner");

        let middle_param = params(&analysis, middle)[0];
        assert_eq!(params(&analysis, inner).len(), 1);

        let outer_body = body_of(&analysis.program.body, outer).unwrap();
        assert_eq!(arg_def(&calls_in(outer_body)[0].args[0]), x);

        let middle_body = body_of(&analysis.program.body, middle).unwrap();
        assert_eq!(arg_def(&calls_in(middle_body)[0].args[0]), middle_param);

        assert_eq!(calls_in(&analysis.program.body)[0].args.len(), 0);
    }

    #[test]
    fn recursive_call_passes_own_parameter() {
        let analysis = lifted(
            "program p; begin \
               var n: int; \
               procedure down() begin n := n - 1; if n > 0 then down() end; \
               n := 3; down() \
             end.",
        );
        let down = def_named(&analysis, "down");
        let own = params(&analysis, down)[0];
        let body = body_of(&analysis.program.body, down).unwrap();
        assert_eq!(arg_def(&calls_in(body)[0].args[0]), own);
    }
}
