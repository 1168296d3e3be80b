//! Semantic analysis: name resolution, type inference and checking,
//! operator and member-function dispatch, template instantiation,
//! mangled-name assignment and dependency recording.
//!
//! The analyzer is a single-pass fold that rewrites the tree in place:
//! resolved function references become typed literals, member calls gain
//! their receiver as the first argument, and overloaded operators become
//! plain calls. Function bodies are validated lazily through a worklist so
//! that definitions may call functions defined later (recursion included).

use crate::context::{ContextStack, TemplateFunction, RESERVED_PREFIX};
use crate::error::SemanticError;
use cascade_ast::{
    ControlFlowKind, Expr, ExprKind, FuncDefKind, FunctionDef, Literal, Span, Type, TypeDefKind,
    VarDefKind,
};
use cascade_diagnostics::{error_codes, fuzzy};
use cascade_parser::operators;
use std::collections::{BTreeSet, HashSet};

const BINARY_BUILTIN: &[&str] = &[
    "+", "-", "*", "/", "%", ">", "<", ">=", "<=", "==", "!=", "&&", "and", "||", "or",
];
const UNARY_BUILTIN: &[&str] = &["-", "!", "not"];
const ARRAY_MEMBER_FUNCS: &[&str] = &["length", "resize", "push"];

/// "Did you mean" help line from fuzzy-matched candidates
fn suggest(target: &str, candidates: Vec<String>) -> Option<String> {
    let similar = fuzzy::find_similar_names(target, &candidates, 0.7, 3);
    if similar.is_empty() {
        None
    } else {
        Some(format!("did you mean `{}`?", similar.join("`, `")))
    }
}

/// Turn a user-facing name into mangled-name-safe characters
pub fn legalize(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_ascii_alphabetic() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
            out.push_str(&(c as u32).to_string());
        }
    }
    out
}

pub struct Analyzer<'c> {
    ctx: &'c mut ContextStack,
    /// Real functions referenced while checking the current body
    deps: BTreeSet<String>,
    /// Enclosing nodes, outermost first, for error reports
    stack: Vec<(&'static str, Span)>,
}

impl<'c> Analyzer<'c> {
    pub fn new(ctx: &'c mut ContextStack) -> Self {
        Self {
            ctx,
            deps: BTreeSet::new(),
            stack: Vec::new(),
        }
    }

    /// Collect top-level expressions into an unnamed function, register it
    /// and validate it together with everything it calls. Returns the
    /// unnamed function's mangled name: the rule-set driver's entry point.
    pub fn add_unnamed_function(&mut self, mut exprs: Vec<Expr>) -> Result<String, SemanticError> {
        self.init();
        for expr in exprs.iter_mut() {
            self.check(expr)?;
        }
        // definitions leave no-value literals behind; keep only the last
        let len = exprs.len();
        let mut kept: Vec<Expr> = exprs
            .into_iter()
            .enumerate()
            .filter(|(i, e)| {
                i + 1 == len
                    || !(matches!(e.kind, ExprKind::Literal(_))
                        && e.type_or_nothing() == &Type::Nothing)
            })
            .map(|(_, e)| e)
            .collect();

        let body = match kept.len() {
            0 => Expr::nop(0..0),
            1 => kept.swap_remove(0),
            _ => {
                let span = kept
                    .first()
                    .map(|e| e.span.start)
                    .unwrap_or_default()
                    ..kept.last().map(|e| e.span.end).unwrap_or_default();
                let ty = kept
                    .last()
                    .map(|e| e.type_or_nothing().clone())
                    .unwrap_or(Type::Nothing);
                Expr::typed(ExprKind::Block(kept), ty, span)
            }
        };

        let ret = body.type_or_nothing().clone();
        let func_ty = Type::func(
            Vec::new(),
            if ret == Type::Nothing { None } else { Some(ret) },
        );
        let name = self.ctx.generate_unique_name(RESERVED_PREFIX, "unnamed");
        self.ctx
            .global
            .func_dependency
            .insert(name.clone(), std::mem::take(&mut self.deps));
        self.ctx.global.real_funcs.insert(
            name.clone(),
            FunctionDef {
                name: name.clone(),
                func_ty,
                params: Vec::new(),
                body: Box::new(body),
                kind: FuncDefKind::Normal,
            },
        );
        self.check_function(&name)?;
        Ok(name)
    }

    /// Validate a real function and, transitively, every unchecked real
    /// function it depends on. Recursive cycles are admitted: a function is
    /// marked checked before its dependencies are traversed deeper.
    pub fn check_function(&mut self, name: &str) -> Result<(), SemanticError> {
        self.init();
        let mut session = HashSet::new();
        let mut worklist = self.check_single(name, &mut session)?;
        while let Some(next) = worklist.pop_first() {
            let deps = self.check_single(&next, &mut session)?;
            for dep in deps {
                if !session.contains(&dep) && !self.ctx.global.checked_funcs.contains(&dep) {
                    worklist.insert(dep);
                }
            }
        }
        self.ctx.global.checked_funcs.extend(session);
        Ok(())
    }

    fn init(&mut self) {
        self.deps.clear();
        self.stack.clear();
        self.ctx.reset_scopes();
    }

    fn check_single(
        &mut self,
        name: &str,
        session: &mut HashSet<String>,
    ) -> Result<BTreeSet<String>, SemanticError> {
        if self.ctx.global.checked_funcs.contains(name) || session.contains(name) {
            return Ok(self
                .ctx
                .global
                .func_dependency
                .get(name)
                .cloned()
                .unwrap_or_default());
        }
        let (mut body, params, declared_ret, user_name) = {
            let def = self.ctx.global.real_funcs.get(name).ok_or_else(|| {
                self.err(error_codes::UNDEFINED_NAME, &(0..0), format!("cannot find function definition: {name}"))
            })?;
            (
                (*def.body).clone(),
                def.params.clone(),
                def.return_type(),
                def.name.clone(),
            )
        };

        self.ctx.push();
        for param in &params {
            self.process_type(&param.ty, &body.span)?;
            self.ctx
                .top_mut()
                .vars
                .insert(param.name.clone(), param.ty.clone());
        }
        let checked = self.check(&mut body);
        self.ctx.pop();
        checked?;

        let actual = body.type_or_nothing().clone();
        if actual != declared_ret {
            return Err(self.err(error_codes::TYPE_MISMATCH,
                &body.span,
                format!(
                    "function \"{user_name}\" declares return type \"{declared_ret}\" \
                     but returns \"{actual}\""
                ),
            ));
        }
        if let Some(def) = self.ctx.global.real_funcs.get_mut(name) {
            def.body = Box::new(body);
        }

        let deps = std::mem::take(&mut self.deps);
        self.ctx
            .global
            .func_dependency
            .insert(name.to_string(), deps.clone());
        session.insert(name.to_string());
        Ok(deps)
    }

    fn err(&self, code: &'static str, span: &Span, message: String) -> SemanticError {
        self.err_help(code, span, message, None)
    }

    fn err_help(
        &self,
        code: &'static str,
        span: &Span,
        message: String,
        help: Option<String>,
    ) -> SemanticError {
        SemanticError {
            code,
            message,
            span: span.clone(),
            stack: self.stack.clone(),
            help,
        }
    }

    pub(crate) fn check(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        self.stack.push((expr.describe(), expr.span.clone()));
        let result = self.check_inner(expr);
        self.stack.pop();
        result
    }

    fn check_inner(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        match &mut expr.kind {
            ExprKind::Ident(_) => self.check_ident(expr),
            ExprKind::Literal(_) => self.check_literal(expr),
            ExprKind::Member { .. } => self.check_member(expr),
            ExprKind::Call { .. } => self.check_call(expr),
            ExprKind::Binary { .. } => self.check_binary(expr),
            ExprKind::Unary { .. } => self.check_unary(expr),
            ExprKind::Branch {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check(cond)?;
                if !cond.type_or_nothing().is_f64() {
                    return Err(self.err(error_codes::TYPE_MISMATCH, &cond.span, "branch condition must be a boolean f64".into()));
                }
                self.check(then_branch)?;
                self.check(else_branch)?;
                let ty = if then_branch.type_or_nothing() == else_branch.type_or_nothing() {
                    then_branch.type_or_nothing().clone()
                } else {
                    Type::Nothing
                };
                self.process_type(&ty, &span)?;
                expr.ty = Some(ty);
                Ok(())
            }
            ExprKind::ComplexLiteral { .. } => self.check_complex_literal(expr),
            ExprKind::Loop {
                init, cond, body, ..
            } => {
                self.ctx.push();
                let result = (|| -> Result<Type, SemanticError> {
                    self.check(init)?;
                    self.check(cond)?;
                    if !cond.type_or_nothing().is_f64() {
                        return Err(
                            self.err(error_codes::TYPE_MISMATCH, &cond.span, "loop condition must be a boolean f64".into())
                        );
                    }
                    self.check(body)?;
                    Ok(if init.type_or_nothing() == body.type_or_nothing() {
                        body.type_or_nothing().clone()
                    } else {
                        Type::Nothing
                    })
                })();
                self.ctx.pop();
                expr.ty = Some(result?);
                Ok(())
            }
            ExprKind::Block(exprs) => {
                if exprs.is_empty() {
                    return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "a block must contain at least one expression".into()));
                }
                self.ctx.push();
                let mut result = Ok(Type::Nothing);
                for sub in exprs.iter_mut() {
                    result = self.check(sub).map(|_| sub.type_or_nothing().clone());
                    if result.is_err() {
                        break;
                    }
                }
                self.ctx.pop();
                expr.ty = Some(result?);
                Ok(())
            }
            ExprKind::ControlFlow { kind, .. } => {
                let what = match kind {
                    ControlFlowKind::Break => "break",
                    ControlFlowKind::Continue => "continue",
                    ControlFlowKind::Return => "return",
                };
                Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, format!("\"{what}\" statements are not supported")))
            }
            ExprKind::TypeDef { .. } => self.check_type_def(expr),
            ExprKind::VarDef { .. } => self.check_var_def(expr),
            ExprKind::FuncDef(_) => self.check_func_def(expr),
            ExprKind::SymbolDef { .. } => self.check_symbol_def(expr),
            ExprKind::TemplateDef { .. } => self.check_template_def(expr),
        }
    }

    fn check_ident(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::Ident(name) = &expr.kind else {
            return Ok(());
        };
        let name = name.clone();
        if name == "true" || name == "false" {
            expr.ty = Some(Type::f64());
            return Ok(());
        }

        let var_ty = self.ctx.seek_var(&name).cloned();
        let const_def = self.ctx.seek_const(&name).cloned();
        let replacement = if let Some(mangled) = self.ctx.global.func_names.get(&name).cloned() {
            let func_ty = self.ctx.real_func_type(&mangled).cloned().ok_or_else(|| {
                self.err(error_codes::UNDEFINED_NAME, &span, format!("cannot find function definition: {mangled}"))
            })?;
            self.process_type(&func_ty, &span)?;
            self.deps.insert(mangled.clone());
            Some(Expr::func_ref(mangled, func_ty, span.clone()))
        } else if let Some(ext_ty) = self.ctx.global.extern_funcs.get(&name).cloned() {
            self.process_type(&ext_ty, &span)?;
            Some(Expr::func_ref(name.clone(), ext_ty, span.clone()))
        } else {
            None
        };

        if let Some(ty) = var_ty {
            if replacement.is_some() {
                return Err(self.err(error_codes::AMBIGUOUS_DISPATCH,
                    &span,
                    format!("variable \"{name}\" has the same name as a function"),
                ));
            }
            self.process_type(&ty, &span)?;
            expr.ty = Some(ty);
        } else if let Some((ty, value)) = const_def {
            if replacement.is_some() {
                return Err(self.err(error_codes::AMBIGUOUS_DISPATCH,
                    &span,
                    format!("constant \"{name}\" has the same name as a function"),
                ));
            }
            *expr = if ty.is_string() {
                Expr::str(value, span)
            } else {
                let parsed = value.parse().map_err(|_| {
                    self.err(error_codes::TYPE_MISMATCH, &span, format!("constant \"{name}\" holds a non-numeric value"))
                })?;
                Expr::num(parsed, span)
            };
        } else if let Some(replacement) = replacement {
            *expr = replacement;
        } else {
            return Err(self.err_help(
                error_codes::UNDEFINED_NAME,
                &span,
                format!("variable \"{name}\" not defined"),
                suggest(&name, self.visible_names()),
            ));
        }
        Ok(())
    }

    /// Every name an identifier could have meant here, for suggestions
    fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for frame in &self.ctx.scopes {
            names.extend(frame.vars.keys().cloned());
            names.extend(frame.consts.keys().cloned());
        }
        names.extend(self.ctx.global.func_names.keys().cloned());
        names.extend(self.ctx.global.extern_funcs.keys().cloned());
        names.extend(self.ctx.global.template_funcs.keys().cloned());
        names
    }

    fn check_literal(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ty = expr
            .ty
            .clone()
            .ok_or_else(|| self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "literal carries no parse-assigned type".into()))?;
        if ty.is_func() {
            if let ExprKind::Literal(Literal::Func(name)) = &expr.kind {
                if self.ctx.global.real_funcs.contains_key(name) {
                    self.deps.insert(name.clone());
                } else if !self.ctx.global.extern_funcs.contains_key(name)
                    && !ARRAY_MEMBER_FUNCS.contains(&name.as_str())
                {
                    return Err(
                        self.err(error_codes::UNDEFINED_NAME, &span, format!("real function name \"{name}\" not found"))
                    );
                }
            }
        }
        self.process_type(&ty, &span)
    }

    fn check_member(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::Member { base, member } = &mut expr.kind else {
            return Ok(());
        };
        self.check(base)?;
        self.check(member)?;
        let base_ty = base.type_or_nothing().clone();

        if let ExprKind::Literal(Literal::Str(name)) = &member.kind {
            if member.type_or_nothing().is_string() && base_ty.is_base() {
                let type_name = base_ty.base_name().unwrap_or_default().to_string();
                let member_ty = self
                    .ctx
                    .global
                    .type_defs
                    .get(&type_name)
                    .ok_or_else(|| self.err(error_codes::UNDEFINED_TYPE, &span, format!("type \"{type_name}\" not defined")))?
                    .member_type(name)
                    .ok_or_else(|| {
                        self.err(error_codes::UNDEFINED_NAME,
                            &span,
                            format!("type \"{type_name}\" has no member \"{name}\""),
                        )
                    })?
                    .clone();
                self.process_type(&member_ty, &span)?;
                expr.ty = Some(member_ty);
                return Ok(());
            }
        }

        if base_ty.is_array() {
            if !member.type_or_nothing().is_f64() {
                return Err(self.err(error_codes::TYPE_MISMATCH,
                    &member.span,
                    format!(
                        "array index must be an f64, but got \"{}\"",
                        member.type_or_nothing()
                    ),
                ));
            }
            let elem = base_ty.element_type().cloned().unwrap_or(Type::Nothing);
            self.process_type(&elem, &span)?;
            expr.ty = Some(elem);
            Ok(())
        } else {
            Err(self.err(error_codes::TYPE_MISMATCH,
                &span,
                format!("unknown member access on value of type \"{base_ty}\""),
            ))
        }
    }

    fn check_call(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::Call { callee, args } = &mut expr.kind else {
            return Ok(());
        };
        for arg in args.iter_mut() {
            self.check(arg)?;
        }

        // `base.name(args…)`: member-function dispatch, or array built-ins
        let member_name = match &callee.kind {
            ExprKind::Member { member, .. } => match &member.kind {
                ExprKind::Literal(Literal::Str(name)) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        };
        if let Some(member_name) = member_name {
            let ExprKind::Member { base, .. } = &mut callee.kind else {
                return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "malformed call".into()));
            };
            self.check(base)?;
            let base_ty = base.type_or_nothing().clone();
            let is_member = match &base_ty {
                Type::Base(type_name) => self
                    .ctx
                    .global
                    .type_defs
                    .get(type_name)
                    .is_some_and(|def| def.has_member(&member_name)),
                _ => false,
            };
            let is_member_func = self.ctx.global.member_funcs.contains_key(&member_name);

            if is_member && is_member_func {
                return Err(self.err(error_codes::AMBIGUOUS_DISPATCH,
                    &span,
                    format!(
                        "member and member function have the same name: \
                         {base_ty}::{member_name}"
                    ),
                ));
            }
            if !is_member && is_member_func {
                let mut param_types = vec![base_ty.clone()];
                param_types.extend(args.iter().map(|a| a.type_or_nothing().clone()));
                let mangled = self
                    .ctx
                    .global
                    .member_funcs
                    .get(&member_name)
                    .and_then(|table| table.get(&param_types))
                    .cloned();
                let Some(mangled) = mangled else {
                    let listed = param_types
                        .iter()
                        .map(Type::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    return Err(self.err(error_codes::TYPE_MISMATCH,
                        &span,
                        format!("no member function \"{member_name}\" with parameter types ({listed})"),
                    ));
                };
                let func_ty = self.ctx.real_func_type(&mangled).cloned().ok_or_else(|| {
                    self.err(error_codes::UNDEFINED_NAME, &span, format!("cannot find function definition: {mangled}"))
                })?;
                self.deps.insert(mangled.clone());
                let receiver = std::mem::replace(base.as_mut(), Expr::nop(span.clone()));
                args.insert(0, receiver);
                **callee = Expr::func_ref(mangled, func_ty, span.clone());
            } else if !is_member && !is_member_func && base_ty.is_array() {
                // built-in operations every array has
                let elem = base_ty.element_type().cloned().unwrap_or(Type::Nothing);
                let func_ty = match member_name.as_str() {
                    "length" => Type::func(vec![base_ty.clone()], Some(Type::f64())),
                    "resize" => Type::func(vec![base_ty.clone(), Type::f64()], None),
                    "push" => Type::func(vec![base_ty.clone(), elem], None),
                    _ => {
                        return Err(self.err(error_codes::UNDEFINED_NAME,
                            &span,
                            format!("no member function: {base_ty}::{member_name}"),
                        ))
                    }
                };
                let receiver = std::mem::replace(base.as_mut(), Expr::nop(span.clone()));
                args.insert(0, receiver);
                **callee = Expr::func_ref(member_name, func_ty, span.clone());
            }
        }

        // a plain identifier naming a template triggers instantiation
        if let ExprKind::Ident(name) = &callee.kind {
            let name = name.clone();
            if self.ctx.seek_var(&name).is_none()
                && !self.ctx.global.func_names.contains_key(&name)
                && self.ctx.global.template_funcs.contains_key(&name)
            {
                let arg_types: Vec<Type> =
                    args.iter().map(|a| a.type_or_nothing().clone()).collect();
                let mangled = self.instantiate_template(&name, &arg_types, &callee.span)?;
                let func_ty = self.ctx.real_func_type(&mangled).cloned().ok_or_else(|| {
                    self.err(error_codes::UNDEFINED_NAME, &span, format!("cannot find function definition: {mangled}"))
                })?;
                self.deps.insert(mangled.clone());
                **callee = Expr::func_ref(mangled, func_ty, span.clone());
            }
        }

        self.check(callee)?;

        let callee_ty = callee.type_or_nothing().clone();
        let Some(params) = callee_ty.func_params() else {
            return Err(self.err(error_codes::TYPE_MISMATCH,
                &span,
                format!("cannot call a value of non-function type \"{callee_ty}\""),
            ));
        };
        if params.len() != args.len() {
            return Err(self.err(error_codes::ARITY_MISMATCH,
                &span,
                format!(
                    "function needs {} parameters, {} given",
                    params.len(),
                    args.len()
                ),
            ));
        }
        for (i, (param, arg)) in params.iter().zip(args.iter()).enumerate() {
            if arg.type_or_nothing() != param {
                return Err(self.err(error_codes::TYPE_MISMATCH,
                    &arg.span,
                    format!(
                        "argument {i} type mismatch in call to \"{callee_ty}\": \
                         \"{param}\" required, \"{}\" given",
                        arg.type_or_nothing()
                    ),
                ));
            }
        }
        let ret = callee_ty.func_return().unwrap_or(Type::Nothing);
        self.process_type(&ret, &span)?;
        expr.ty = Some(ret);
        Ok(())
    }

    fn check_binary(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::Binary { op, lhs, rhs } = &mut expr.kind else {
            return Ok(());
        };
        let op = op.clone();
        self.check(lhs)?;
        self.check(rhs)?;
        let lhs_ty = lhs.type_or_nothing().clone();
        let rhs_ty = rhs.type_or_nothing().clone();

        let mut builtin: Option<Type> = None;
        if lhs_ty.is_f64() && rhs_ty.is_f64() && BINARY_BUILTIN.contains(&op.as_str()) {
            builtin = Some(Type::f64());
        } else if op == "=" {
            if !Self::is_assignable(lhs) {
                return Err(self.err(error_codes::INVALID_LVALUE, &lhs.span, "assignment to a non-assignable expression".into()));
            }
            if lhs_ty != rhs_ty || lhs_ty == Type::Nothing {
                return Err(self.err(error_codes::TYPE_MISMATCH,
                    &span,
                    format!("assignment between \"{lhs_ty}\" and \"{rhs_ty}\" is not allowed"),
                ));
            }
            builtin = Some(Type::Nothing);
        }

        let overload = self
            .ctx
            .global
            .symbolic_funcs
            .get(&op)
            .and_then(|table| table.get(&[lhs_ty.clone(), rhs_ty.clone()][..]))
            .cloned();
        if let Some(mangled) = overload {
            if builtin.is_some() {
                return Err(self.err(error_codes::UNSUPPORTED_OPERATOR,
                    &span,
                    format!(
                        "cannot overload operator \"{op}\" between \"{lhs_ty}\" and \"{rhs_ty}\""
                    ),
                ));
            }
            let func_ty = self.ctx.real_func_type(&mangled).cloned().ok_or_else(|| {
                self.err(error_codes::UNDEFINED_NAME, &span, format!("cannot find function definition: {mangled}"))
            })?;
            self.deps.insert(mangled.clone());
            let lhs = std::mem::replace(lhs.as_mut(), Expr::nop(span.clone()));
            let rhs = std::mem::replace(rhs.as_mut(), Expr::nop(span.clone()));
            let ret = func_ty.func_return().unwrap_or(Type::Nothing);
            *expr = Expr::typed(
                ExprKind::Call {
                    callee: Box::new(Expr::func_ref(mangled, func_ty, span.clone())),
                    args: vec![lhs, rhs],
                },
                ret,
                span,
            );
            return Ok(());
        }

        match builtin {
            Some(ty) => {
                expr.ty = Some(ty);
                Ok(())
            }
            None => Err(self.err(error_codes::UNSUPPORTED_OPERATOR,
                &span,
                format!(
                    "operator \"{op}\" between \"{lhs_ty}\" and \"{rhs_ty}\" is not defined"
                ),
            )),
        }
    }

    fn check_unary(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::Unary { op, rhs } = &mut expr.kind else {
            return Ok(());
        };
        let op = op.clone();
        self.check(rhs)?;
        let rhs_ty = rhs.type_or_nothing().clone();

        let builtin = rhs_ty.is_f64() && UNARY_BUILTIN.contains(&op.as_str());

        let overload = self
            .ctx
            .global
            .symbolic_funcs
            .get(&op)
            .and_then(|table| table.get(&[rhs_ty.clone()][..]))
            .cloned();
        if let Some(mangled) = overload {
            if builtin {
                return Err(self.err(error_codes::UNSUPPORTED_OPERATOR,
                    &span,
                    format!("cannot overload unary operator \"{op}\" on \"{rhs_ty}\""),
                ));
            }
            let func_ty = self.ctx.real_func_type(&mangled).cloned().ok_or_else(|| {
                self.err(error_codes::UNDEFINED_NAME, &span, format!("cannot find function definition: {mangled}"))
            })?;
            self.deps.insert(mangled.clone());
            let operand = std::mem::replace(rhs.as_mut(), Expr::nop(span.clone()));
            let ret = func_ty.func_return().unwrap_or(Type::Nothing);
            *expr = Expr::typed(
                ExprKind::Call {
                    callee: Box::new(Expr::func_ref(mangled, func_ty, span.clone())),
                    args: vec![operand],
                },
                ret,
                span,
            );
            return Ok(());
        }

        if !builtin {
            return Err(self.err(error_codes::UNSUPPORTED_OPERATOR,
                &span,
                format!("operator \"{op}\" on \"{rhs_ty}\" is not defined"),
            ));
        }
        expr.ty = Some(Type::f64());
        Ok(())
    }

    fn check_complex_literal(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::ComplexLiteral { ty, members } = &mut expr.kind else {
            return Ok(());
        };
        let ty = ty.clone();
        self.process_type(&ty, &span)?;

        if ty == Type::Nothing {
            return Err(self.err(error_codes::TYPE_MISMATCH, &span, "cannot create a value of no type".into()));
        }

        if ty.is_f64() || ty.is_string() {
            // scalar "literals": T{} defaults, T{x} passes x through
            match members.len() {
                0 => {
                    *expr = if ty.is_f64() {
                        Expr::num(0.0, span)
                    } else {
                        Expr::str("", span)
                    };
                    Ok(())
                }
                1 => {
                    let (designator, mut value) = members.swap_remove(0);
                    if designator.is_some() {
                        return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                            &span,
                            format!("cannot create a \"{ty}\" with a designator"),
                        ));
                    }
                    self.check(&mut value)?;
                    if value.type_or_nothing() != &ty {
                        return Err(self.err(error_codes::TYPE_MISMATCH,
                            &span,
                            format!(
                                "cannot create a \"{ty}\" from a \"{}\"",
                                value.type_or_nothing()
                            ),
                        ));
                    }
                    *expr = value;
                    Ok(())
                }
                _ => Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                    &span,
                    format!("cannot create a \"{ty}\" with more than one member"),
                )),
            }
        } else if let Type::Base(type_name) = &ty {
            let def = self
                .ctx
                .global
                .type_defs
                .get(type_name)
                .cloned()
                .ok_or_else(|| self.err(error_codes::UNDEFINED_TYPE, &span, format!("type \"{type_name}\" not defined")))?;
            let Some(def_members) = def.members() else {
                return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                    &span,
                    format!("defined type \"{type_name}\" must be a complex type"),
                ));
            };
            if members.is_empty() {
                expr.ty = Some(ty);
                return Ok(());
            }
            let designated = members.first().is_some_and(|(d, _)| d.is_some());
            if !designated {
                if members.len() != def_members.len() {
                    return Err(self.err(error_codes::ARITY_MISMATCH,
                        &span,
                        format!(
                            "type \"{type_name}\" needs {} members, {} given",
                            def_members.len(),
                            members.len()
                        ),
                    ));
                }
                for (i, (designator, _)) in members.iter_mut().enumerate() {
                    let name = def_members
                        .get(i)
                        .map(|(n, _)| n.clone())
                        .unwrap_or_default();
                    *designator = Some(Expr::str(name, span.clone()));
                }
            }
            for (designator, value) in members.iter_mut() {
                self.check(value)?;
                let Some(designator) = designator else {
                    return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "designated initializer must have a designator".into()));
                };
                self.check(designator)?;
                let ExprKind::Literal(Literal::Str(member_name)) = &designator.kind else {
                    return Err(
                        self.err(error_codes::UNSUPPORTED_CONSTRUCT, &designator.span, "non-literal designators are not supported".into())
                    );
                };
                let member_ty = def.member_type(member_name).ok_or_else(|| {
                    self.err(error_codes::UNDEFINED_NAME,
                        &designator.span,
                        format!("type \"{type_name}\" has no member \"{member_name}\""),
                    )
                })?;
                if value.type_or_nothing() != member_ty {
                    return Err(self.err(error_codes::TYPE_MISMATCH,
                        &value.span,
                        format!(
                            "designated member type mismatch: \"{member_ty}\" expected, \
                             \"{}\" given",
                            value.type_or_nothing()
                        ),
                    ));
                }
            }
            expr.ty = Some(ty);
            Ok(())
        } else if let Some(elem) = ty.element_type().cloned() {
            if members.first().is_some_and(|(d, _)| d.is_some()) {
                return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "an array literal cannot be designated".into()));
            }
            for (_, value) in members.iter_mut() {
                self.check(value)?;
                if value.type_or_nothing() != &elem {
                    return Err(self.err(error_codes::TYPE_MISMATCH,
                        &value.span,
                        format!(
                            "array element type mismatch: \"{elem}\" expected, \"{}\" given",
                            value.type_or_nothing()
                        ),
                    ));
                }
            }
            expr.ty = Some(ty);
            Ok(())
        } else {
            Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, format!("a literal of type \"{ty}\" is not supported")))
        }
    }

    fn check_type_def(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::TypeDef { name, def, kind } = &expr.kind else {
            return Ok(());
        };
        if self.ctx.depth() != 1 {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "type definitions are only allowed at the top level".into()));
        }
        if *kind != TypeDefKind::Normal {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "type aliases are not supported".into()));
        }
        let name = name.clone();
        let def = def.clone();
        if !matches!(
            &def,
            Type::Complex {
                kind: cascade_ast::ComplexKind::Struct,
                ..
            }
        ) {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, &span, "only struct type definitions are allowed".into()));
        }
        if Type::is_builtin_base(&name) {
            return Err(self.err(error_codes::REDEFINITION, &span, format!("type \"{name}\" is a built-in type")));
        }
        if let Some(members) = def.members() {
            for (_, member_ty) in members {
                if member_ty.is_complex() {
                    return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                        &span,
                        format!("unnamed type \"{member_ty}\" is not allowed as a member"),
                    ));
                }
                self.process_type(member_ty, &span)?;
            }
        }
        if self.ctx.global.type_defs.contains_key(&name) {
            return Err(self.err(error_codes::REDEFINITION, &span, format!("type \"{name}\" redefined")));
        }
        self.ctx.global.type_defs.insert(name, def);
        *expr = Expr::nop(span);
        Ok(())
    }

    fn check_var_def(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::VarDef {
            name,
            declared,
            value,
            kind,
        } = &mut expr.kind
        else {
            return Ok(());
        };
        let name = name.clone();
        let kind = *kind;
        self.check(value)?;
        let value_ty = value.type_or_nothing().clone();
        if value_ty == Type::Nothing {
            return Err(self.err(error_codes::TYPE_MISMATCH, &span, "a variable initializer must produce a value".into()));
        }
        let final_ty = if *declared == Type::Auto {
            value_ty.clone()
        } else {
            if value_ty != *declared {
                return Err(self.err(error_codes::TYPE_MISMATCH,
                    &span,
                    format!(
                        "variable definition type mismatch: declared \"{declared}\", \
                         initialized with \"{value_ty}\""
                    ),
                ));
            }
            declared.clone()
        };
        *declared = final_ty.clone();

        if !self.ctx.is_symbol_free(&name) {
            return Err(self.err(error_codes::REDEFINITION, &span, format!("variable \"{name}\" already defined")));
        }
        if self.ctx.global.func_names.contains_key(&name)
            || self.ctx.global.extern_funcs.contains_key(&name)
        {
            return Err(self.err(error_codes::REDEFINITION,
                &span,
                format!("name \"{name}\" is already defined as a function"),
            ));
        }

        match kind {
            VarDefKind::Constant => {
                let literal = match &value.kind {
                    ExprKind::Literal(Literal::Num(v)) => v.to_string(),
                    ExprKind::Literal(Literal::Str(s)) => s.clone(),
                    _ => {
                        return Err(
                            self.err(error_codes::UNSUPPORTED_CONSTRUCT, &value.span, "a constant initializer must be a literal".into())
                        )
                    }
                };
                self.ctx.top_mut().consts.insert(name, (final_ty, literal));
                *expr = Expr::nop(span);
            }
            VarDefKind::Normal => {
                self.ctx
                    .top_mut()
                    .vars
                    .insert(name.clone(), final_ty.clone());
                if self.ctx.depth() == 1 {
                    // a global definition becomes an assignment so init
                    // blocks write through to the data store
                    let initializer =
                        std::mem::replace(value.as_mut(), Expr::nop(span.clone()));
                    let target = Expr::typed(ExprKind::Ident(name), final_ty, span.clone());
                    *expr = Expr::typed(
                        ExprKind::Binary {
                            op: "=".to_string(),
                            lhs: Box::new(target),
                            rhs: Box::new(initializer),
                        },
                        Type::Nothing,
                        span,
                    );
                } else {
                    expr.ty = Some(Type::Nothing);
                }
            }
        }
        Ok(())
    }

    fn check_func_def(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        if self.ctx.depth() != 1 {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                &span,
                "function definitions are only allowed at the top level".into(),
            ));
        }
        let ExprKind::FuncDef(def) = &expr.kind else {
            return Ok(());
        };
        let name = def.name.clone();
        let kind = def.kind;
        let param_types: Vec<Type> = def.params.iter().map(|p| p.ty.clone()).collect();
        let func_ty = def.func_ty.clone();

        let mangled = self
            .ctx
            .generate_unique_name(RESERVED_PREFIX, &legalize(&name));
        match kind {
            FuncDefKind::Symbolic => {
                let valid = param_types.len() == 2
                    || (param_types.len() == 1 && operators::is_overloadable_unary(&name));
                if !valid {
                    return Err(self.err(error_codes::UNSUPPORTED_OPERATOR,
                        &span,
                        "an infix overload takes 2 parameters, a unary overload 1".into(),
                    ));
                }
                let table = self.ctx.global.symbolic_funcs.entry(name.clone()).or_default();
                if table.contains_key(&param_types) {
                    return Err(self.err(error_codes::REDEFINITION,
                        &span,
                        format!("function \"{name}\" with type \"{func_ty}\" redefined"),
                    ));
                }
                table.insert(param_types, mangled.clone());
            }
            FuncDefKind::Member => {
                let table = self.ctx.global.member_funcs.entry(name.clone()).or_default();
                if table.contains_key(&param_types) {
                    return Err(self.err(error_codes::REDEFINITION,
                        &span,
                        format!("member function \"{name}\" with type \"{func_ty}\" redefined"),
                    ));
                }
                table.insert(param_types, mangled.clone());
            }
            FuncDefKind::Normal => {
                if self.ctx.global.func_names.contains_key(&name)
                    || self.ctx.global.extern_funcs.contains_key(&name)
                {
                    return Err(
                        self.err(error_codes::REDEFINITION, &span, format!("function name \"{name}\" already defined"))
                    );
                }
                if self.ctx.seek_var(&name).is_some() {
                    return Err(self.err(error_codes::REDEFINITION,
                        &span,
                        format!("function name \"{name}\" collides with a variable"),
                    ));
                }
                self.ctx.global.func_names.insert(name, mangled.clone());
            }
            FuncDefKind::Lambda => {
                return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                    &span,
                    "only symbolic, member and normal function definitions are allowed".into(),
                ))
            }
        }

        let ExprKind::FuncDef(owned) =
            std::mem::replace(&mut expr.kind, ExprKind::Literal(Literal::Unit))
        else {
            return Ok(());
        };
        self.ctx.global.real_funcs.insert(mangled, owned);
        *expr = Expr::nop(span);
        Ok(())
    }

    fn check_symbol_def(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        let ExprKind::SymbolDef { name, kind, ty } = &expr.kind else {
            return Ok(());
        };
        if self.ctx.depth() != 1 || *kind != cascade_ast::SymbolDefKind::Extern {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                &span,
                "only top-level extern symbol definitions are allowed".into(),
            ));
        }
        let name = name.clone();
        let ty = ty.clone();
        if self.ctx.global.func_names.contains_key(&name)
            || self.ctx.global.extern_funcs.contains_key(&name)
        {
            return Err(self.err(error_codes::REDEFINITION,
                &span,
                format!("extern function name \"{name}\" already defined"),
            ));
        }
        self.process_type(&ty, &span)?;
        self.ctx.global.extern_funcs.insert(name, ty);
        *expr = Expr::nop(span);
        Ok(())
    }

    fn check_template_def(&mut self, expr: &mut Expr) -> Result<(), SemanticError> {
        let span = expr.span.clone();
        if self.ctx.depth() != 1 {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                &span,
                "template definitions are only allowed at the top level".into(),
            ));
        }
        let ExprKind::TemplateDef { body, .. } = &expr.kind else {
            return Ok(());
        };
        if body.kind != FuncDefKind::Normal {
            return Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                &span,
                "only normal functions may be templated".into(),
            ));
        }
        let name = body.name.clone();
        if self.ctx.global.func_names.contains_key(&name)
            || self.ctx.global.template_funcs.contains_key(&name)
        {
            return Err(self.err(error_codes::REDEFINITION,
                &span,
                format!("template function name \"{name}\" already defined"),
            ));
        }
        let ExprKind::TemplateDef { type_params, body } =
            std::mem::replace(&mut expr.kind, ExprKind::Literal(Literal::Unit))
        else {
            return Ok(());
        };
        self.ctx.global.template_funcs.insert(
            name,
            TemplateFunction {
                type_params,
                def: body,
                instantiations: Default::default(),
            },
        );
        *expr = Expr::nop(span);
        Ok(())
    }

    fn instantiate_template(
        &mut self,
        name: &str,
        arg_types: &[Type],
        span: &Span,
    ) -> Result<String, SemanticError> {
        let template = self
            .ctx
            .global
            .template_funcs
            .get(name)
            .cloned()
            .ok_or_else(|| self.err(error_codes::UNDEFINED_NAME, span, format!("template function \"{name}\" not found")))?;
        let Some((instance, subst)) = template.instantiate(arg_types) else {
            let listed = arg_types
                .iter()
                .map(Type::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(self.err(error_codes::TYPE_MISMATCH,
                span,
                format!(
                    "no matching instantiation of template function \"{name}\" \
                     for argument types ({listed})"
                ),
            ));
        };
        if let Some(existing) = template.instantiations.get(&subst) {
            return Ok(existing.clone());
        }
        let mangled = self
            .ctx
            .generate_unique_name(RESERVED_PREFIX, &legalize(name));
        self.ctx.global.real_funcs.insert(mangled.clone(), instance);
        if let Some(stored) = self.ctx.global.template_funcs.get_mut(name) {
            stored.instantiations.insert(subst, mangled.clone());
        }
        Ok(mangled)
    }

    fn is_assignable(expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::Ident(_) => true,
            ExprKind::Unary { op, .. } => op == "*",
            ExprKind::Member { base, .. } => Self::is_assignable(base),
            _ => false,
        }
    }

    fn process_type(&self, ty: &Type, span: &Span) -> Result<(), SemanticError> {
        match ty {
            Type::Nothing | Type::Auto => Ok(()),
            Type::Base(name) => {
                if Type::is_builtin_base(name) || self.ctx.global.type_defs.contains_key(name) {
                    Ok(())
                } else {
                    let mut known: Vec<String> =
                        self.ctx.global.type_defs.keys().cloned().collect();
                    known.push(cascade_ast::types::F64.to_string());
                    known.push(cascade_ast::types::STRING.to_string());
                    Err(self.err_help(
                        error_codes::UNDEFINED_TYPE,
                        span,
                        format!("type \"{name}\" is not defined"),
                        suggest(name, known),
                    ))
                }
            }
            Type::Pointer(_) => Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT, span, "pointer types are not supported for now".into())),
            Type::Const(inner) => self.process_type(inner, span),
            Type::Complex { .. } => Err(self.err(error_codes::UNSUPPORTED_CONSTRUCT,
                span,
                format!("unnamed complex type \"{ty}\" is not allowed"),
            )),
            Type::Array(elem) => self.process_type(elem, span),
            Type::Func { params, ret } => {
                for param in params {
                    self.process_type(param, span)?;
                }
                if let Some(ret) = ret {
                    self.process_type(ret, span)?;
                }
                Ok(())
            }
        }
    }
}
