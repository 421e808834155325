pub mod ast;

use crate::{
    err::{Category, Handler, Result},
    lex::{Lexer, LiteralKind, Token, TokenKind, TokenKind::*},
    typeck::ty::BasicType,
};
use ast::{
    BinOp, Block, Call, Callable, Expr, ExprKind, Lit, Param, Program, Sign, Stmt, Ty, TyKind,
    UnOp, VarRef,
};
use log::debug;
use std::collections::VecDeque;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    handler: &'a Handler,
    curr: Token,
    prev: Token,
    lookahead: VecDeque<Token>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &str, handler: &'a Handler) -> Self {
        let mut lexer = Lexer::new(src, handler);
        let curr = lexer.next_token();
        Self {
            lexer,
            handler,
            curr,
            prev: Token::dummy(),
            lookahead: VecDeque::new(),
        }
    }

    /// Parses a whole program. The first syntax error aborts the parse.
    pub fn parse(&mut self) -> Result<Program> {
        let pos = self.consume(Program)?.pos;
        let name = self.consume(Ident)?;
        self.consume(SemiColon)?;
        let block = self.block()?;
        self.consume(Dot)?;
        self.consume(Eof)?;

        debug!(
            "parsed program '{}' with {} top-level statements",
            name.symbol,
            block.stmts.len()
        );
        Ok(Program { name, block, pos })
    }

    fn block(&mut self) -> Result<Block> {
        let pos = self.consume(Begin)?.pos;
        let mut stmts = vec![];
        while !self.check(End) {
            stmts.push(self.stmt()?);
            if !self.eat(SemiColon) {
                break;
            }
        }
        self.consume(End)?;
        Ok(Block { stmts, pos })
    }

    fn stmt(&mut self) -> Result<Stmt> {
        let pos = self.peek().pos;
        let next = self.peek().kind;
        match next {
            Var => self.var_decl(),
            Procedure => Ok(Stmt::Procedure(self.callable()?)),
            Function => Ok(Stmt::Function(self.callable()?)),
            Ident if self.peek_at(1).kind == OpenParen => Ok(Stmt::Call(self.call()?)),
            Ident => {
                let target = self.variable()?;
                self.consume(Assign)?;
                let value = self.expr()?;
                Ok(Stmt::Assign { target, value, pos })
            }
            Return => {
                self.advance();
                let value = if self.peek().kind.starts_expr() {
                    Some(self.expr()?)
                } else {
                    None
                };
                Ok(Stmt::Return(value, pos))
            }
            Assert => {
                self.advance();
                Ok(Stmt::Assert(self.expr()?, pos))
            }
            If => {
                self.advance();
                let cond = self.expr()?;
                self.consume(Then)?;
                let then_branch = Box::new(self.stmt()?);
                let else_branch = if self.eat(Else) {
                    Some(Box::new(self.stmt()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                    pos,
                })
            }
            While => {
                self.advance();
                let cond = self.expr()?;
                self.consume(Do)?;
                let body = Box::new(self.stmt()?);
                Ok(Stmt::While { cond, body, pos })
            }
            Begin => Ok(Stmt::Block(self.block()?)),
            _ => self.expected("statement"),
        }
    }

    fn var_decl(&mut self) -> Result<Stmt> {
        let pos = self.consume(Var)?.pos;
        let mut names = vec![self.consume(Ident)?];
        while self.eat(Comma) {
            names.push(self.consume(Ident)?);
        }
        self.consume(Colon)?;
        let ty = self.ty()?;
        Ok(Stmt::Var { names, ty, pos })
    }

    fn callable(&mut self) -> Result<Callable> {
        let pos = self.peek().pos;
        let is_function = self.peek().kind == Function;
        self.advance();

        let name = self.consume(Ident)?;
        self.consume(OpenParen)?;
        let mut params = vec![];
        if !self.check(CloseParen) {
            params.push(self.param()?);
            while self.eat(Comma) {
                params.push(self.param()?);
            }
        }
        self.consume(CloseParen)?;

        let ret = if is_function {
            self.consume(Colon)?;
            Some(self.ty()?)
        } else {
            None
        };

        self.eat(SemiColon);
        let body = self.block()?;
        Ok(Callable {
            name,
            params,
            ret,
            body,
            pos,
        })
    }

    fn param(&mut self) -> Result<Param> {
        let by_ref = self.eat(Var);
        let name = self.consume(Ident)?;
        self.consume(Colon)?;
        let ty = self.ty()?;
        Ok(Param { name, ty, by_ref })
    }

    fn ty(&mut self) -> Result<Ty> {
        let pos = self.peek().pos;
        if self.eat(Array) {
            self.consume(OpenBracket)?;
            let size = if self.check(CloseBracket) {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            self.consume(CloseBracket)?;
            self.consume(Of)?;
            let basic = self.type_name()?;
            return Ok(Ty {
                kind: TyKind::Array(basic, size),
                pos,
            });
        }

        let basic = self.type_name()?;
        Ok(Ty {
            kind: TyKind::Simple(basic),
            pos,
        })
    }

    fn type_name(&mut self) -> Result<BasicType> {
        if !self.check(Ident) {
            return self.expected("type name");
        }
        let token = self.peek().clone();
        let basic = token.symbol.as_str_with(|s| match s {
            "int" => Some(BasicType::Int),
            "real" => Some(BasicType::Real),
            "string" => Some(BasicType::String),
            "bool" => Some(BasicType::Bool),
            _ => None,
        });
        match basic {
            Some(basic) => {
                self.advance();
                Ok(basic)
            }
            None => self.handler.raise(
                Category::Syntax,
                token.pos,
                &format!("Unknown type '{}'", token.symbol),
            ),
        }
    }

    fn variable(&mut self) -> Result<VarRef> {
        let name = self.consume(Ident)?;
        if self.eat(OpenBracket) {
            let index = self.expr()?;
            self.consume(CloseBracket)?;
            Ok(VarRef::Index(name, Box::new(index)))
        } else {
            Ok(VarRef::Ident(name))
        }
    }

    fn call(&mut self) -> Result<Call> {
        let callee = self.consume(Ident)?;
        self.consume(OpenParen)?;
        let mut args = vec![];
        if !self.check(CloseParen) {
            args.push(self.expr()?);
            while self.eat(Comma) {
                args.push(self.expr()?);
            }
        }
        self.consume(CloseParen)?;
        let pos = callee.pos;
        Ok(Call { callee, args, pos })
    }

    /// Relational operators do not chain.
    fn expr(&mut self) -> Result<Expr> {
        let left = self.simple()?;
        if !self.peek().kind.is_relational() {
            return Ok(left);
        }

        let pos = self.peek().pos;
        let op = match self.peek().kind {
            Eq => BinOp::Eq,
            Ne => BinOp::Ne,
            Lt => BinOp::Lt,
            Le => BinOp::Le,
            Gt => BinOp::Gt,
            _ => BinOp::Ge,
        };
        self.advance();
        let right = self.simple()?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        ))
    }

    fn simple(&mut self) -> Result<Expr> {
        let sign = if self.eat(Minus) {
            Sign::Minus
        } else {
            self.eat(Plus);
            Sign::Plus
        };

        let mut left = self.term()?;
        if sign.is_minus() {
            left.sign = left.sign.toggle();
        }

        loop {
            let pos = self.peek().pos;
            let op = if self.eat(Plus) {
                BinOp::Add
            } else if self.eat(Minus) {
                BinOp::Sub
            } else if self.eat(Or) {
                BinOp::Or
            } else {
                break;
            };
            let right = self.term()?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }

        Ok(left)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;

        loop {
            let pos = self.peek().pos;
            let op = if self.eat(Star) {
                BinOp::Mul
            } else if self.eat(Slash) {
                BinOp::Div
            } else if self.eat(Percent) {
                BinOp::Rem
            } else if self.eat(And) {
                BinOp::And
            } else {
                break;
            };
            let right = self.factor()?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                pos,
            );
        }

        Ok(left)
    }

    fn factor(&mut self) -> Result<Expr> {
        let pos = self.peek().pos;
        let next = self.peek().kind;
        let expr = match next {
            Literal { kind } => {
                let symbol = self.peek().symbol;
                self.advance();
                let lit = match kind {
                    LiteralKind::Int => Lit::Int(symbol.parse().unwrap_or_default()),
                    LiteralKind::Real => Lit::Real(symbol.parse().unwrap_or_default()),
                    LiteralKind::Str => Lit::Str(symbol),
                };
                Expr::new(ExprKind::Literal(lit), pos)
            }
            OpenParen => {
                self.advance();
                let expr = self.expr()?;
                self.consume(CloseParen)?;
                expr
            }
            Not => {
                self.advance();
                let expr = Box::new(self.factor()?);
                Expr::new(ExprKind::Unary { op: UnOp::Not, expr }, pos)
            }
            Ident if self.peek_at(1).kind == OpenParen => {
                Expr::new(ExprKind::Call(self.call()?), pos)
            }
            Ident => Expr::new(ExprKind::Variable(self.variable()?), pos),
            _ => return self.expected("expression"),
        };

        if self.eat(Dot) {
            let member = self.consume(Ident)?;
            return Ok(Expr::new(ExprKind::Member(Box::new(expr), member), pos));
        }
        Ok(expr)
    }

    fn expected<T>(&self, what: &str) -> Result<T> {
        let msg = format!("Expected {}, found {}", what, self.peek());
        self.handler.raise(Category::Syntax, self.peek().pos, &msg)
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            self.advance();
            return Ok(self.prev().clone());
        }

        self.expected(&kind.to_string())
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn peek(&self) -> &Token {
        &self.curr
    }

    /// Looks `dist` tokens past the current one, scanning ahead on demand.
    fn peek_at(&mut self, dist: usize) -> &Token {
        if dist == 0 {
            return &self.curr;
        }
        while self.lookahead.len() < dist {
            let t = self.lexer.next_token();
            self.lookahead.push_back(t);
        }
        &self.lookahead[dist - 1]
    }

    fn prev(&self) -> &Token {
        &self.prev
    }

    fn advance(&mut self) {
        let next = match self.lookahead.pop_front() {
            Some(t) => t,
            None => self.lexer.next_token(),
        };
        self.prev = std::mem::replace(&mut self.curr, next);
    }
}
