//! Free-variable analysis over expressions.
//!
//! Returns the identifiers an expression reads that are not bound inside
//! it. The rule-set translator intersects this set with the intermediate
//! variables to build the dependency graph for topological ordering.

use crate::{Expr, ExprKind};
use std::collections::BTreeSet;

/// Collect the free variable names of an expression
pub fn free_vars(expr: &Expr) -> BTreeSet<String> {
    let mut collector = Collector {
        escaped: BTreeSet::new(),
        scopes: vec![BTreeSet::new()],
    };
    collector.visit(expr);
    collector.escaped
}

struct Collector {
    escaped: BTreeSet<String>,
    scopes: Vec<BTreeSet<String>>,
}

impl Collector {
    fn bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn visit(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(name) => {
                if !self.bound(name) {
                    self.escaped.insert(name.clone());
                }
            }
            ExprKind::Literal(_)
            | ExprKind::TypeDef { .. }
            | ExprKind::FuncDef(_)
            | ExprKind::SymbolDef { .. }
            | ExprKind::TemplateDef { .. } => {}
            ExprKind::Member { base, member } => {
                self.visit(base);
                self.visit(member);
            }
            ExprKind::Call { callee, args } => {
                for arg in args {
                    self.visit(arg);
                }
                self.visit(callee);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit(lhs);
                self.visit(rhs);
            }
            ExprKind::Unary { rhs, .. } => self.visit(rhs),
            ExprKind::Branch {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(cond);
                self.visit(then_branch);
                self.visit(else_branch);
            }
            ExprKind::ComplexLiteral { members, .. } => {
                for (designator, value) in members {
                    if let Some(designator) = designator {
                        self.visit(designator);
                    }
                    self.visit(value);
                }
            }
            ExprKind::Loop {
                init, cond, body, ..
            } => {
                self.scopes.push(BTreeSet::new());
                self.visit(init);
                self.visit(cond);
                self.visit(body);
                self.scopes.pop();
            }
            ExprKind::Block(exprs) => {
                self.scopes.push(BTreeSet::new());
                for expr in exprs {
                    self.visit(expr);
                }
                self.scopes.pop();
            }
            ExprKind::ControlFlow { value, .. } => {
                if let Some(value) = value {
                    self.visit(value);
                }
            }
            ExprKind::VarDef { name, value, .. } => {
                self.visit(value);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Type, VarDefKind};

    fn ident(name: &str) -> Expr {
        Expr::new(ExprKind::Ident(name.to_string()), 0..0)
    }

    #[test]
    fn test_reads_are_free() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: "+".to_string(),
                lhs: Box::new(ident("a")),
                rhs: Box::new(ident("b")),
            },
            0..0,
        );
        let free = free_vars(&expr);
        assert!(free.contains("a") && free.contains("b"));
    }

    #[test]
    fn test_locals_are_bound() {
        // { var t = a; t + b } frees {a, b} but not t
        let block = Expr::new(
            ExprKind::Block(vec![
                Expr::new(
                    ExprKind::VarDef {
                        name: "t".to_string(),
                        declared: Type::Auto,
                        value: Box::new(ident("a")),
                        kind: VarDefKind::Normal,
                    },
                    0..0,
                ),
                Expr::new(
                    ExprKind::Binary {
                        op: "+".to_string(),
                        lhs: Box::new(ident("t")),
                        rhs: Box::new(ident("b")),
                    },
                    0..0,
                ),
            ]),
            0..0,
        );
        let free = free_vars(&block);
        assert!(free.contains("a") && free.contains("b"));
        assert!(!free.contains("t"));
    }
}
