//! Template instantiation: copy the body, apply the substitution to every
//! embedded type, and let the analyzer register the result under a fresh
//! mangled name keyed by the substitution.

use crate::context::TemplateFunction;
use cascade_ast::{Expr, ExprKind, FunctionDef, Type};
use std::collections::{BTreeMap, BTreeSet};

impl TemplateFunction {
    /// Unify the declared parameter types against a concrete argument-type
    /// vector and produce the instantiated definition. Returns `None` when
    /// the arguments do not match or leave a type parameter unbound.
    pub fn instantiate(
        &self,
        arg_types: &[Type],
    ) -> Option<(FunctionDef, BTreeMap<String, Type>)> {
        let free: BTreeSet<String> = self.type_params.iter().cloned().collect();
        let declared = self.def.func_ty.func_params()?;
        if declared.len() != arg_types.len() {
            return None;
        }
        let mut subst = BTreeMap::new();
        for (template, concrete) in declared.iter().zip(arg_types) {
            if !template.unify(concrete, &free, &mut subst) {
                return None;
            }
        }
        if subst.len() != free.len() {
            return None;
        }

        let mut instance = self.def.clone();
        instance.func_ty = instance.func_ty.substitute(&subst);
        for param in &mut instance.params {
            param.ty = param.ty.substitute(&subst);
        }
        substitute_expr(&mut instance.body, &subst);
        Some((instance, subst))
    }
}

/// Rewrite every type embedded in an expression tree under the substitution
pub fn substitute_expr(expr: &mut Expr, subst: &BTreeMap<String, Type>) {
    if let Some(ty) = &expr.ty {
        expr.ty = Some(ty.substitute(subst));
    }
    match &mut expr.kind {
        ExprKind::Ident(_) | ExprKind::Literal(_) => {}
        ExprKind::Member { base, member } => {
            substitute_expr(base, subst);
            substitute_expr(member, subst);
        }
        ExprKind::Call { callee, args } => {
            substitute_expr(callee, subst);
            for arg in args {
                substitute_expr(arg, subst);
            }
        }
        ExprKind::Binary { lhs, rhs, .. } => {
            substitute_expr(lhs, subst);
            substitute_expr(rhs, subst);
        }
        ExprKind::Unary { rhs, .. } => substitute_expr(rhs, subst),
        ExprKind::Branch {
            cond,
            then_branch,
            else_branch,
        } => {
            substitute_expr(cond, subst);
            substitute_expr(then_branch, subst);
            substitute_expr(else_branch, subst);
        }
        ExprKind::ComplexLiteral { ty, members } => {
            *ty = ty.substitute(subst);
            for (designator, value) in members {
                if let Some(designator) = designator {
                    substitute_expr(designator, subst);
                }
                substitute_expr(value, subst);
            }
        }
        ExprKind::Loop {
            init, cond, body, ..
        } => {
            substitute_expr(init, subst);
            substitute_expr(cond, subst);
            substitute_expr(body, subst);
        }
        ExprKind::Block(exprs) => {
            for expr in exprs {
                substitute_expr(expr, subst);
            }
        }
        ExprKind::ControlFlow { value, .. } => {
            if let Some(value) = value {
                substitute_expr(value, subst);
            }
        }
        ExprKind::TypeDef { def, .. } => *def = def.substitute(subst),
        ExprKind::VarDef {
            declared, value, ..
        } => {
            *declared = declared.substitute(subst);
            substitute_expr(value, subst);
        }
        ExprKind::FuncDef(def) => {
            def.func_ty = def.func_ty.substitute(subst);
            for param in &mut def.params {
                param.ty = param.ty.substitute(subst);
            }
            substitute_expr(&mut def.body, subst);
        }
        ExprKind::SymbolDef { ty, .. } => *ty = ty.substitute(subst),
        ExprKind::TemplateDef { body, .. } => {
            substitute_expr(&mut body.body, subst);
        }
    }
}
