// Definition and command parsing: var/const, func (normal, member,
// symbolic, templated), type, and the extern command

use super::operators;
use super::Parser;
use crate::ParseError;
use cascade_ast::{
    ControlFlowKind, Expr, ExprKind, FuncDefKind, FunctionDef, Param, SymbolDefKind, Type,
    TypeDefKind, VarDefKind,
};
use cascade_lexer::{Guidance, Token, TokenKind};

impl<'src> Parser<'src> {
    pub(crate) fn parse_def(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Var) | Some(Token::Const) => {
                let kind = if self.check(&Token::Var) {
                    VarDefKind::Normal
                } else {
                    VarDefKind::Constant
                };
                self.stream.pop(Guidance::IgnoreBreak);
                let name = self
                    .consume_ident(Guidance::IgnoreBreak, "expected identifier as variable name")?;
                let declared;
                if self.check(&Token::Assign) {
                    self.stream.pop(Guidance::IgnoreBreak);
                    declared = Type::Auto;
                } else {
                    if self.check(&Token::Auto) {
                        return Err(self.error(
                            "an explicit \"auto\" type is not supported, \
                             use \"=\" directly to define the variable",
                        ));
                    }
                    declared = self.parse_type()?;
                    if matches!(self.stream.kind(), TokenKind::Endline | TokenKind::End) {
                        // uninitialized variable: default-construct
                        if kind == VarDefKind::Constant {
                            return Err(
                                self.error("a constant must be explicitly initialized")
                            );
                        }
                        let span = start..self.stream.offset();
                        let value = Expr::new(
                            ExprKind::ComplexLiteral {
                                ty: declared.clone(),
                                members: Vec::new(),
                            },
                            span.clone(),
                        );
                        return Ok(Expr::new(
                            ExprKind::VarDef {
                                name,
                                declared,
                                value: Box::new(value),
                                kind,
                            },
                            span,
                        ));
                    }
                    self.consume(
                        &Token::Assign,
                        Guidance::IgnoreBreak,
                        "expected \"=\" in variable definition",
                    )?;
                }
                let value = self.parse_expr(false)?;
                Ok(Expr::new(
                    ExprKind::VarDef {
                        name,
                        declared,
                        value: Box::new(value),
                        kind,
                    },
                    start..self.stream.offset(),
                ))
            }
            Some(Token::Func) => self.parse_func_def(start),
            Some(Token::Type) => self.parse_type_def(start),
            _ => Err(self.error(format!(
                "expected a definition keyword like \"var\", \"func\" or \"type\", found: \"{}\"",
                self.display_current()
            ))),
        }
    }

    fn parse_func_def(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);

        // `func<T, U> …` is a template definition; `func <(…)` overloads "<"
        let mut type_params = Vec::new();
        let is_template = self.check(&Token::Lt)
            && self
                .stream
                .peek_at(1)
                .is_some_and(|l| l.token != Token::LParen);
        if is_template {
            while !self.check(&Token::Gt) {
                self.stream.pop(Guidance::IgnoreBreak);
                type_params.push(
                    self.consume_ident(Guidance::None, "expected identifier in template parameter list")?,
                );
                if !self.check(&Token::Comma) && !self.check(&Token::Gt) {
                    return Err(self.error(format!(
                        "expected \",\" in template parameter list, found: \"{}\"",
                        self.display_current()
                    )));
                }
            }
            self.stream.pop(Guidance::IgnoreBreak);
        }

        let (name, params, func_ty, kind) = self.parse_func_signature()?;
        self.eat_breaks();
        let body = self.parse_expr(false)?;

        let def = FunctionDef {
            name,
            func_ty,
            params,
            body: Box::new(body),
            kind,
        };
        let span = start..self.stream.offset();
        if is_template {
            Ok(Expr::new(
                ExprKind::TemplateDef {
                    type_params,
                    body: def,
                },
                span,
            ))
        } else {
            Ok(Expr::new(ExprKind::FuncDef(def), span))
        }
    }

    /// Signature forms:
    ///   `name(params)`            normal
    ///   `name infix (params)`     symbolic, identifier-named
    ///   `op(params)`              symbolic operator overload
    ///   `(recv R) name(params)`   member, receiver prepended
    /// followed by `-> type` or nothing.
    pub(crate) fn parse_func_signature(
        &mut self,
    ) -> Result<(String, Vec<Param>, Type, FuncDefKind), ParseError> {
        let mut kind = FuncDefKind::Normal;
        let name;
        let mut params;

        if self.check(&Token::LParen) {
            // member function: receiver parameter list comes first
            params = self.parse_param_list(&Token::RParen)?;
            self.eat_breaks();
            name = self.consume_ident(
                Guidance::IgnoreBreak,
                "expected identifier as member function name",
            )?;
            if !self.check(&Token::LParen) {
                return Err(self.error(format!(
                    "expected \"(\" after member function name, found: \"{}\"",
                    self.display_current()
                )));
            }
            if params.len() != 1 {
                return Err(self.error(format!(
                    "member function must have exactly 1 receiver parameter, given: {}",
                    params.len()
                )));
            }
            params.extend(self.parse_param_list(&Token::RParen)?);
            self.eat_breaks();
            kind = FuncDefKind::Member;
        } else if self.stream.kind() == TokenKind::Ident {
            name = self.consume_ident(Guidance::IgnoreBreak, "expected function name")?;
            if self.stream.text() == "infix" {
                self.stream.pop(Guidance::IgnoreBreak);
                kind = FuncDefKind::Symbolic;
            }
            params = self.parse_param_list(&Token::RParen)?;
            self.eat_breaks();
        } else if let Some(op) = self.stream.op_text() {
            name = op.to_string();
            kind = FuncDefKind::Symbolic;
            if operators::is_reserved(&name) {
                return Err(self.error(format!("unsupported operator overload: \"{name}\"")));
            }
            self.stream.pop(Guidance::IgnoreBreak);
            if self.stream.text() == "infix" {
                return Err(self.error(
                    "operator overloads are automatically infix or unary, \
                     do not use the \"infix\" keyword",
                ));
            }
            params = self.parse_param_list(&Token::RParen)?;
            self.eat_breaks();
        } else {
            return Err(self.error(format!(
                "expected identifier or operator as function name, found: \"{}\"",
                self.display_current()
            )));
        }

        let ret = if self.check(&Token::Arrow) {
            self.stream.pop(Guidance::IgnoreBreak);
            let ty = self.parse_type()?;
            self.eat_breaks();
            Some(ty)
        } else {
            None
        };

        if kind == FuncDefKind::Symbolic {
            match params.len() {
                2 => {}
                1 if operators::is_overloadable_unary(&name) => {}
                1 => {
                    return Err(
                        self.error(format!("unsupported unary operator overload: \"{name}\""))
                    )
                }
                _ => {
                    return Err(
                        self.error("only unary or infix operator overloads are allowed")
                    )
                }
            }
        }

        let func_ty = Type::func(params.iter().map(|p| p.ty.clone()).collect(), ret);
        Ok((name, params, func_ty, kind))
    }

    pub(crate) fn parse_param_list(&mut self, end: &Token) -> Result<Vec<Param>, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);
        let mut params = Vec::new();
        while !self.check(end) {
            let name =
                self.consume_ident(Guidance::IgnoreBreak, "expected identifier in parameter list")?;
            let ty = self.parse_type()?;
            self.eat_breaks();
            params.push(Param { name, ty });
            if !self.check(&Token::Comma) && !self.check(end) {
                return Err(self.error(format!(
                    "expected \",\" after parameter, found: \"{}\"",
                    self.display_current()
                )));
            }
            if self.check(&Token::Comma) {
                self.stream.pop(Guidance::IgnoreBreak);
                if self.check(end) {
                    return Err(self.error("parameter list should not end with \",\""));
                }
            }
        }
        self.stream.pop(Guidance::None);
        Ok(params)
    }

    fn parse_type_def(&mut self, start: usize) -> Result<Expr, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);
        let name = self.consume_ident(Guidance::IgnoreBreak, "expected identifier as type name")?;
        if self.check(&Token::Assign) {
            return Err(self.error("type aliases are not supported"));
        }
        if !self.check(&Token::Struct) {
            return Err(self.error(format!(
                "expected \"struct\" after type name, found: \"{}\"",
                self.display_current()
            )));
        }
        let def = self.parse_complex_type()?;
        Ok(Expr::new(
            ExprKind::TypeDef {
                name,
                def,
                kind: TypeDefKind::Normal,
            },
            start..self.stream.offset(),
        ))
    }

    /// COMMAND := 'extern' 'func' signature
    pub(crate) fn parse_command(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        if !self.check(&Token::Extern) {
            return Err(self.error("only \"extern func\" commands are supported"));
        }
        self.stream.pop(Guidance::IgnoreBreak);
        self.consume(
            &Token::Func,
            Guidance::IgnoreBreak,
            "only \"extern func\" commands are supported",
        )?;
        let (name, _, func_ty, kind) = self.parse_func_signature()?;
        if kind != FuncDefKind::Normal {
            return Err(self.error("only plain extern function declarations are supported"));
        }
        Ok(Expr::new(
            ExprKind::SymbolDef {
                name,
                kind: SymbolDefKind::Extern,
                ty: func_ty,
            },
            start..self.stream.offset(),
        ))
    }

    /// `return [expr]` and `continue`; rejected later by analysis
    pub(crate) fn parse_control_flow(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.offset();
        let kind = if self.check(&Token::Return) {
            ControlFlowKind::Return
        } else {
            ControlFlowKind::Continue
        };
        self.stream.pop(Guidance::None);
        let value = if kind == ControlFlowKind::Return
            && !matches!(self.stream.kind(), TokenKind::Endline | TokenKind::End)
        {
            Some(Box::new(self.parse_expr(false)?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::ControlFlow {
                kind,
                label: None,
                value,
            },
            start..self.stream.offset(),
        ))
    }
}
