//! Expression-to-Rust emission, mirroring interpreter semantics.
//!
//! Comparisons and logic produce `f64` 0/1 values; `&&`/`||` keep their
//! short-circuit behavior; cache reads inside a sub-rule-set go through the
//! snapshot's lazy `load_*` helpers.

use crate::CodegenError;
use cascade_ast::{Expr, ExprKind, Literal, Type};
use cascade_compiler::ruleset::RuleSetMetaInfo;
use cascade_compiler::RESERVED_PREFIX;

/// How rule-set variables are reachable from the code being emitted
pub struct IoAccess {
    pub input: String,
    pub output: String,
    /// `Some(path)` reads the cache directly; `None` stages through the
    /// sub-rule-set snapshot (`self.cache` plus `load_*` calls)
    pub cache_direct: Option<String>,
}

pub struct EmitEnv<'a> {
    pub meta: &'a RuleSetMetaInfo,
    /// `None` inside function bodies, which may not touch rule-set state
    pub io: Option<IoAccess>,
}

/// Rust spelling of a mangled or extern function name
pub fn rust_fn_name(name: &str) -> String {
    if name.starts_with(RESERVED_PREFIX) {
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    } else {
        match name {
            "strEqual" => "str_equal".to_string(),
            other => other.to_string(),
        }
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern", "false", "fn",
    "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "true", "type", "unsafe", "use", "where", "while",
    "async", "await", "box", "priv", "try", "union", "yield",
];

/// Escape identifiers that collide with Rust keywords
pub fn rust_ident(name: &str) -> String {
    if RUST_KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// Rust type for an expression-language type
pub fn rust_type(ty: &Type) -> Result<String, CodegenError> {
    Ok(match ty {
        Type::Nothing => "()".to_string(),
        Type::Base(name) if name == "f64" => "f64".to_string(),
        Type::Base(name) if name == "string" => "String".to_string(),
        Type::Base(name) => format!("types::{}", rust_ident(name)),
        Type::Array(elem) => format!("Vec<{}>", rust_type(elem)?),
        other => {
            return Err(CodegenError::Unsupported(format!(
                "type \"{other}\" cannot be represented in generated code"
            )))
        }
    })
}

pub struct ExprGen<'a> {
    pub env: EmitEnv<'a>,
}

impl<'a> ExprGen<'a> {
    pub fn new(env: EmitEnv<'a>) -> Self {
        Self { env }
    }

    fn is_f64(expr: &Expr) -> bool {
        expr.ty.as_ref().is_some_and(Type::is_f64)
    }

    fn is_nothing(expr: &Expr) -> bool {
        expr.type_or_nothing() == &Type::Nothing
    }

    /// A readable/writable lvalue: optional load statements plus the path
    fn place(&self, expr: &Expr) -> Result<(Vec<String>, String), CodegenError> {
        match &expr.kind {
            ExprKind::Ident(name) => self.ident_place(name),
            ExprKind::Member { base, member } => {
                let (mut pre, base_path) = self.place(base)?;
                if let ExprKind::Literal(Literal::Str(field)) = &member.kind {
                    if member.ty.as_ref().is_some_and(Type::is_string) {
                        return Ok((pre, format!("{base_path}.{}", rust_ident(field))));
                    }
                }
                let index = self.value(member)?;
                Ok((pre, format!("{base_path}[({index}) as usize]")))
            }
            _ => Err(CodegenError::Unsupported(format!(
                "{} cannot be used as an assignable place",
                expr.describe()
            ))),
        }
    }

    fn ident_place(&self, name: &str) -> Result<(Vec<String>, String), CodegenError> {
        if let Some(io) = &self.env.io {
            if self.env.meta.is_input(name) {
                return Ok((Vec::new(), format!("{}.{}", io.input, rust_ident(name))));
            }
            if self.env.meta.is_output(name) {
                return Ok((Vec::new(), format!("{}.{}", io.output, rust_ident(name))));
            }
            if self.env.meta.is_cache(name) {
                return Ok(match &io.cache_direct {
                    Some(path) => (Vec::new(), format!("{path}.{}", rust_ident(name))),
                    None => (
                        vec![format!("self.load_{name}(cache);")],
                        format!("self.cache.{}", rust_ident(name)),
                    ),
                });
            }
        } else if self.env.meta.var_types.contains_key(name) {
            return Err(CodegenError::Unsupported(format!(
                "function bodies may not reference rule-set variable \"{name}\""
            )));
        }
        Ok((Vec::new(), rust_ident(name)))
    }

    /// Emit an expression that yields an owned value: places of non-copy
    /// types get cloned
    pub fn value(&self, expr: &Expr) -> Result<String, CodegenError> {
        let is_place = matches!(
            &expr.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. }
        );
        if is_place && !Self::is_f64(expr) {
            let (pre, path) = self.place(expr)?;
            return Ok(wrap_with_loads(&pre, format!("{path}.clone()")));
        }
        self.expr(expr)
    }

    /// Emit an expression in value position
    pub fn expr(&self, expr: &Expr) -> Result<String, CodegenError> {
        match &expr.kind {
            ExprKind::Ident(name) => match name.as_str() {
                "true" => Ok("1.0".to_string()),
                "false" => Ok("0.0".to_string()),
                _ => {
                    let (pre, path) = self.ident_place(name)?;
                    Ok(wrap_with_loads(&pre, path))
                }
            },
            ExprKind::Literal(literal) => match literal {
                Literal::Num(n) => Ok(format!("{n:?}")),
                Literal::Str(s) => Ok(format!("{s:?}.to_string()")),
                Literal::Unit => Ok("()".to_string()),
                Literal::Func(name) => Err(CodegenError::Unsupported(format!(
                    "function value \"{name}\" outside a call is not supported"
                ))),
            },
            ExprKind::Member { .. } => {
                let (pre, path) = self.place(expr)?;
                Ok(wrap_with_loads(&pre, path))
            }
            ExprKind::Call { callee, args } => self.call(callee, args),
            ExprKind::Binary { op, lhs, rhs } => self.binary(op, lhs, rhs),
            ExprKind::Unary { op, rhs } => {
                let operand = self.expr(rhs)?;
                match op.as_str() {
                    "-" => Ok(format!("(-({operand}))")),
                    "!" | "not" => Ok(format!("((({operand}) == 0.0) as i64 as f64)")),
                    other => Err(CodegenError::Unsupported(format!(
                        "unary operator \"{other}\" is not supported"
                    ))),
                }
            }
            ExprKind::Branch {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.expr(cond)?;
                if Self::is_nothing(expr) {
                    let then_stmts = self.stmt(then_branch)?;
                    let else_stmts = self.stmt(else_branch)?;
                    Ok(format!(
                        "if ({cond}) != 0.0 {{ {then_stmts} }} else {{ {else_stmts} }}"
                    ))
                } else {
                    let then_value = self.expr(then_branch)?;
                    let else_value = self.expr(else_branch)?;
                    Ok(format!(
                        "(if ({cond}) != 0.0 {{ {then_value} }} else {{ {else_value} }})"
                    ))
                }
            }
            ExprKind::ComplexLiteral { ty, members } => self.complex_literal(ty, members),
            ExprKind::Loop {
                init, cond, body, ..
            } => {
                if !Self::is_nothing(expr) {
                    return Err(CodegenError::Unsupported(
                        "a loop with a value is not supported".to_string(),
                    ));
                }
                let init_stmt = if Self::is_nothing(init) && matches!(init.kind, ExprKind::Literal(_))
                {
                    String::new()
                } else {
                    self.stmt(init)?
                };
                let cond = self.expr(cond)?;
                let body = self.stmt(body)?;
                Ok(format!(
                    "{{ {init_stmt} while ({cond}) != 0.0 {{ {body} }} }}"
                ))
            }
            ExprKind::Block(exprs) => {
                let mut out = String::from("{ ");
                for (i, sub) in exprs.iter().enumerate() {
                    if i + 1 == exprs.len() && !Self::is_nothing(expr) {
                        out.push_str(&self.expr(sub)?);
                        out.push(' ');
                    } else {
                        out.push_str(&self.stmt(sub)?);
                        out.push(' ');
                    }
                }
                out.push('}');
                Ok(out)
            }
            ExprKind::VarDef {
                name,
                value,
                ..
            } => {
                let initializer = self.value(value)?;
                Ok(format!("let mut {} = {initializer};", rust_ident(name)))
            }
            _ => Err(CodegenError::Unsupported(format!(
                "{} is not supported in generated code",
                expr.describe()
            ))),
        }
    }

    /// Emit an expression in statement position
    pub fn stmt(&self, expr: &Expr) -> Result<String, CodegenError> {
        match &expr.kind {
            ExprKind::VarDef { .. } => self.expr(expr),
            ExprKind::Literal(_) if Self::is_nothing(expr) => Ok(String::new()),
            _ => {
                let emitted = self.expr(expr)?;
                if Self::is_nothing(expr) {
                    Ok(format!("{emitted};"))
                } else {
                    Ok(format!("let _ = {emitted};"))
                }
            }
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> Result<String, CodegenError> {
        let name = match &callee.kind {
            ExprKind::Literal(Literal::Func(name)) => name.clone(),
            ExprKind::Ident(name) => name.clone(),
            _ => {
                return Err(CodegenError::Unsupported(
                    "only direct function calls are supported".to_string(),
                ))
            }
        };
        match name.as_str() {
            "length" => {
                let (pre, path) = self.place(args.first().ok_or_else(|| bad_args("length"))?)?;
                Ok(wrap_with_loads(&pre, format!("({path}.len() as f64)")))
            }
            "resize" => {
                let (pre, path) = self.place(args.first().ok_or_else(|| bad_args("resize"))?)?;
                let len = self.expr(args.get(1).ok_or_else(|| bad_args("resize"))?)?;
                let loads = pre.join(" ");
                Ok(format!(
                    "{{ {loads} {path}.resize(({len}) as usize, Default::default()); }}"
                ))
            }
            "push" => {
                let (pre, path) = self.place(args.first().ok_or_else(|| bad_args("push"))?)?;
                let element = self.value(args.get(1).ok_or_else(|| bad_args("push"))?)?;
                let loads = pre.join(" ");
                Ok(format!("{{ {loads} {path}.push({element}); }}"))
            }
            "print" => {
                let value = self.value(args.first().ok_or_else(|| bad_args("print"))?)?;
                Ok(format!("{{ println!(\"{{:?}}\", {value}); }}"))
            }
            _ => {
                let mut emitted = Vec::new();
                for arg in args {
                    emitted.push(self.value(arg)?);
                }
                Ok(format!(
                    "funcs::{}({})",
                    rust_fn_name(&name),
                    emitted.join(", ")
                ))
            }
        }
    }

    fn binary(&self, op: &str, lhs: &Expr, rhs: &Expr) -> Result<String, CodegenError> {
        if op == "=" {
            let value = self.value(rhs)?;
            let (pre, path) = self.place(lhs)?;
            let loads = pre.join(" ");
            return Ok(format!("{{ let __tmp = {value}; {loads} {path} = __tmp; }}"));
        }
        let left = self.expr(lhs)?;
        let right = self.expr(rhs)?;
        Ok(match op {
            "+" | "-" | "*" | "/" | "%" => format!("(({left}) {op} ({right}))"),
            ">" | "<" | ">=" | "<=" | "==" | "!=" => {
                format!("((({left}) {op} ({right})) as i64 as f64)")
            }
            "&&" | "and" => {
                format!("(((({left}) != 0.0) && (({right}) != 0.0)) as i64 as f64)")
            }
            "||" | "or" => {
                format!("(((({left}) != 0.0) || (({right}) != 0.0)) as i64 as f64)")
            }
            other => {
                return Err(CodegenError::Unsupported(format!(
                    "binary operator \"{other}\" is not supported"
                )))
            }
        })
    }

    fn complex_literal(
        &self,
        ty: &Type,
        members: &[(Option<Expr>, Expr)],
    ) -> Result<String, CodegenError> {
        match ty {
            Type::Array(_) => {
                let mut elements = Vec::new();
                for (_, value) in members {
                    elements.push(self.value(value)?);
                }
                Ok(format!("vec![{}]", elements.join(", ")))
            }
            Type::Base(name) => {
                if members.is_empty() {
                    return Ok(format!("types::{}::default()", rust_ident(name)));
                }
                let mut fields = Vec::new();
                for (designator, value) in members {
                    let Some(designator) = designator else {
                        return Err(CodegenError::Unsupported(
                            "undesignated struct literal members are not supported".to_string(),
                        ));
                    };
                    let ExprKind::Literal(Literal::Str(field)) = &designator.kind else {
                        return Err(CodegenError::Unsupported(
                            "non-literal designators are not supported".to_string(),
                        ));
                    };
                    fields.push(format!("{}: {}", rust_ident(field), self.value(value)?));
                }
                Ok(format!(
                    "types::{} {{ {}, ..Default::default() }}",
                    rust_ident(name),
                    fields.join(", ")
                ))
            }
            other => Err(CodegenError::Unsupported(format!(
                "a literal of type \"{other}\" is not supported"
            ))),
        }
    }
}

fn wrap_with_loads(pre: &[String], path: String) -> String {
    if pre.is_empty() {
        path
    } else {
        format!("{{ {} {path} }}", pre.join(" "))
    }
}

fn bad_args(name: &str) -> CodegenError {
    CodegenError::Unsupported(format!("malformed call to built-in \"{name}\""))
}
