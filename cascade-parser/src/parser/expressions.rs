// Expression parsing: Pratt precedence climbing over the token stream

use super::operators::{self, Priority, ASSIGN_PRIORITY, USER_DEFINED_PRIORITY};
use super::Parser;
use crate::ParseError;
use cascade_ast::{Expr, ExprKind, FuncDefKind, FunctionDef, Type};
use cascade_diagnostics::error_codes;
use cascade_lexer::{Guidance, Token, TokenKind};

impl<'src> Parser<'src> {
    /// EXPR := DEF | COMMAND | UNARY (op UNARY)*
    pub fn parse_expr(&mut self, ignore_break: bool) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        let mut expr = match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Var | Token::Const | Token::Func | Token::Type) => self.parse_def()?,
            Some(Token::Extern | Token::Import | Token::Export) => self.parse_command()?,
            Some(Token::Return | Token::Continue) => self.parse_control_flow()?,
            _ => {
                let lhs = self.parse_unary()?;
                if ignore_break {
                    self.eat_breaks();
                }
                self.parse_binop_rhs(0, lhs, ignore_break)?
            }
        };
        expr.span = start..self.stream.offset().max(start);
        Ok(expr)
    }

    /// The current lexeme viewed as an infix operator, with its priority.
    /// Identifiers in operator position act as user-defined infix.
    fn current_infix(&self) -> Option<(String, Priority)> {
        match self.stream.kind() {
            TokenKind::Ident => Some((self.stream.text().to_string(), USER_DEFINED_PRIORITY)),
            TokenKind::Symbol => {
                let op = self.stream.op_text()?;
                operators::infix_priority(op).map(|priority| (op.to_string(), priority))
            }
            _ => None,
        }
    }

    fn parse_binop_rhs(
        &mut self,
        priority: Priority,
        mut lhs: Expr,
        ignore_break: bool,
    ) -> Result<Expr, ParseError> {
        loop {
            let Some((op, prec)) = self.current_infix() else {
                return Ok(lhs);
            };
            if prec < priority {
                return Ok(lhs);
            }
            self.stream.pop(Guidance::IgnoreBreak);
            let mut rhs = self.parse_unary()?;
            if ignore_break {
                self.eat_breaks();
            }
            if let Some((_, next_prec)) = self.current_infix() {
                if prec < next_prec {
                    rhs = self.parse_binop_rhs(prec + 1, rhs, ignore_break)?;
                } else if priority == ASSIGN_PRIORITY + 1 && next_prec == ASSIGN_PRIORITY {
                    return Err(self.error_code(
                        error_codes::ASSIGN_TO_ASSIGNMENT,
                        "assign to an assignment is not allowed",
                    ));
                }
            }
            let span = lhs.span.start..rhs.span.end;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
    }

    /// UNARY := prefix UNARY | PRIMARY
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        let prefix = match self.stream.kind() {
            TokenKind::Symbol => self
                .stream
                .op_text()
                .filter(|op| operators::is_prefix(op))
                .map(str::to_string),
            _ => None,
        };
        let Some(op) = prefix else {
            return self.parse_primary();
        };
        self.stream.pop(Guidance::IgnoreBreak);
        let rhs = self.parse_unary()?;
        let span = start..rhs.span.end;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    /// PRIMARY := IDENT | literal | '(' EXPR ')' | BLOCK | TYPE '{' … '}'
    ///          | 'if' | 'while' | closure, then postfix chains
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        let mut lhs = match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Ident(_)) | Some(Token::LBracket) => self.parse_ident_or_complex(start)?,
            Some(Token::Int(value)) | Some(Token::Real(value)) => {
                self.stream.pop(Guidance::None);
                Expr::num(value, start..self.stream.offset())
            }
            Some(Token::Str(value)) => {
                self.stream.pop(Guidance::None);
                Expr::str(value, start..self.stream.offset())
            }
            Some(Token::LParen) => {
                self.stream.pop(Guidance::IgnoreBreak);
                let inner = self.parse_expr(true)?;
                self.eat_breaks();
                self.consume(&Token::RParen, Guidance::None, "mismatched \")\"")?;
                inner
            }
            Some(Token::LBrace) => self.parse_block()?,
            Some(Token::If) => self.parse_branch(start)?,
            Some(Token::While) => self.parse_while(start)?,
            Some(Token::Pipe) | Some(Token::OrOr) => self.parse_closure(start)?,
            _ => {
                return Err(self.error(format!(
                    "unexpected token \"{}\" in expression",
                    self.display_current()
                )))
            }
        };

        // postfix chains: member access, call, indexing
        loop {
            match self.stream.top().map(|l| l.token.clone()) {
                Some(Token::Dot) => {
                    self.stream.pop(Guidance::IgnoreBreak);
                    let member_start = self.stream.offset();
                    let name = self.consume_member_name("expected member name after \".\"")?;
                    let member = Expr::str(name, member_start..self.stream.offset());
                    let span = start..self.stream.offset();
                    lhs = Expr::new(
                        ExprKind::Member {
                            base: Box::new(lhs),
                            member: Box::new(member),
                        },
                        span,
                    );
                }
                Some(Token::LParen) => {
                    self.stream.pop(Guidance::IgnoreBreak);
                    let mut args = Vec::new();
                    while !self.check(&Token::RParen) {
                        args.push(self.parse_expr(true)?);
                        self.eat_breaks();
                        if !self.check(&Token::Comma) {
                            break;
                        }
                        self.stream.pop(Guidance::IgnoreBreak);
                    }
                    self.consume(
                        &Token::RParen,
                        Guidance::None,
                        "expected \")\" in function call expression",
                    )?;
                    let span = start..self.stream.offset();
                    lhs = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(lhs),
                            args,
                        },
                        span,
                    );
                }
                Some(Token::LBracket) => {
                    self.stream.pop(Guidance::IgnoreBreak);
                    let index = self.parse_expr(true)?;
                    self.eat_breaks();
                    self.consume(
                        &Token::RBracket,
                        Guidance::None,
                        "expected \"]\" in array access expression",
                    )?;
                    let span = start..self.stream.offset();
                    lhs = Expr::new(
                        ExprKind::Member {
                            base: Box::new(lhs),
                            member: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        lhs.span = start..lhs.span.end.max(start);
        Ok(lhs)
    }

    /// An identifier, or a complex literal `T{…}` / `[]T{…}`
    fn parse_ident_or_complex(&mut self, start: usize) -> Result<Expr, ParseError> {
        let ty = self.parse_type()?;
        if !self.check(&Token::LBrace) {
            return match ty {
                Type::Base(name) => Ok(Expr::new(
                    ExprKind::Ident(name),
                    start..self.stream.offset(),
                )),
                other => Err(self.error(format!(
                    "type \"{other}\" cannot act as an expression alone"
                ))),
            };
        }

        self.stream.pop(Guidance::IgnoreBreak);
        let mut members = Vec::new();
        let designated = self.check(&Token::Dot);
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Dot) {
                if !designated {
                    return Err(self.error_code(
                        error_codes::BAD_DESIGNATOR,
                        "non-designated initializer must not have a designator",
                    ));
                }
                self.stream.pop(Guidance::IgnoreBreak);
                let key_start = self.stream.offset();
                let name =
                    self.consume_ident(Guidance::IgnoreBreak, "expected identifier as designator")?;
                let key = Expr::str(name, key_start..self.stream.offset());
                if self.check(&Token::Assign) || self.check(&Token::Colon) {
                    self.stream.pop(Guidance::IgnoreBreak);
                } else {
                    return Err(self.error_code(
                        error_codes::BAD_DESIGNATOR,
                        "designated initializer must have a value",
                    ));
                }
                let value = self.parse_expr(true)?;
                self.eat_breaks();
                members.push((Some(key), value));
            } else {
                if designated {
                    return Err(self.error_code(
                        error_codes::BAD_DESIGNATOR,
                        "designated initializer must have a designator",
                    ));
                }
                let value = self.parse_expr(true)?;
                self.eat_breaks();
                members.push((None, value));
            }
            if self.check(&Token::Comma) {
                self.stream.pop(Guidance::IgnoreBreak);
            } else if !self.check(&Token::RBrace) {
                return Err(self.error(format!(
                    "invalid symbol in complex literal: \"{}\"",
                    self.display_current()
                )));
            }
        }
        self.stream.pop(Guidance::None);
        Ok(Expr::new(
            ExprKind::ComplexLiteral { ty, members },
            start..self.stream.offset(),
        ))
    }

    /// BLOCK := '{' (EXPR ENDLINE)* EXPR? '}', value of the last expression
    pub(crate) fn parse_block(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        self.stream.pop(Guidance::IgnoreBreak);
        let mut exprs = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.stream.is_end() {
                return Err(self.error("mismatched \"}\" in block expression"));
            }
            exprs.push(self.parse_expr(false)?);
            if self.stream.kind() == TokenKind::Endline {
                self.stream.pop(Guidance::IgnoreBreak);
            } else if !self.check(&Token::RBrace) {
                return Err(self.error(format!(
                    "mismatched \"}}\", found: \"{}\"",
                    self.display_current()
                )));
            }
        }
        self.stream.pop(Guidance::None);
        let span = start..self.stream.offset();
        if exprs.is_empty() {
            Ok(Expr::nop(span))
        } else {
            Ok(Expr::new(ExprKind::Block(exprs), span))
        }
    }

    fn parse_branch(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);
        self.consume(&Token::LParen, Guidance::IgnoreBreak, "expected \"(\" after \"if\"")?;
        let cond = self.parse_expr(true)?;
        self.eat_breaks();
        self.consume(&Token::RParen, Guidance::IgnoreBreak, "expected \")\" after \"if\"")?;
        let then_branch = self.parse_expr(false)?;

        let saved = self.stream.state();
        self.eat_breaks();
        let else_branch = if self.check(&Token::Else) {
            self.stream.pop(Guidance::IgnoreBreak);
            self.parse_expr(false)?
        } else {
            // no else clause: back out of the eaten breaks
            self.stream.restore(saved);
            Expr::nop(self.stream.offset()..self.stream.offset())
        };
        Ok(Expr::new(
            ExprKind::Branch {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            start..self.stream.offset(),
        ))
    }

    fn parse_while(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);
        self.consume(&Token::LParen, Guidance::IgnoreBreak, "expected \"(\" after \"while\"")?;
        let cond = self.parse_expr(true)?;
        self.eat_breaks();
        self.consume(&Token::RParen, Guidance::IgnoreBreak, "expected \")\" after \"while\"")?;
        let label = if self.check(&Token::At) {
            self.stream.pop(Guidance::IgnoreBreak);
            Some(self.consume_ident(Guidance::IgnoreBreak, "expected identifier after \"@\"")?)
        } else {
            None
        };
        let body = self.parse_expr(false)?;
        let init = Expr::nop(start..start);
        Ok(Expr::new(
            ExprKind::Loop {
                label,
                init: Box::new(init),
                cond: Box::new(cond),
                body: Box::new(body),
            },
            start..self.stream.offset(),
        ))
    }

    /// Closure syntax `|params| [-> retType] body`; analysis rejects lambdas
    /// in the shipped subset but the parse is kept complete
    fn parse_closure(&mut self, start: usize) -> Result<Expr, ParseError> {
        let params = if self.check(&Token::OrOr) {
            self.stream.pop(Guidance::IgnoreBreak);
            Vec::new()
        } else {
            let params = self.parse_param_list(&Token::Pipe)?;
            self.eat_breaks();
            params
        };
        let func_ty = if self.check(&Token::Arrow) {
            self.stream.pop(Guidance::IgnoreBreak);
            let ret = self.parse_type()?;
            Type::func(params.iter().map(|p| p.ty.clone()).collect(), Some(ret))
        } else {
            Type::Auto
        };
        let body = self.parse_expr(false)?;
        Ok(Expr::new(
            ExprKind::FuncDef(FunctionDef {
                name: String::new(),
                func_ty,
                params,
                body: Box::new(body),
                kind: FuncDefKind::Lambda,
            }),
            start..self.stream.offset(),
        ))
    }

    /// Member names may be identifiers or (keyword) symbols spelled like one
    pub(crate) fn consume_member_name(&mut self, message: &str) -> Result<String, ParseError> {
        match self.stream.kind() {
            TokenKind::Ident => self.consume_ident(Guidance::None, message),
            TokenKind::Symbol
                if !self.stream.text().is_empty()
                    && self.stream.text().chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                let name = self.stream.text().to_string();
                self.stream.pop(Guidance::None);
                Ok(name)
            }
            _ => Err(self.error(format!("{message}, found: \"{}\"", self.display_current()))),
        }
    }
}
