//! Tree-walking evaluator over checked expression ASTs.
//!
//! Values are either immediate `f64`s or tokens into the resource
//! handler's side buffer. Identifier reads read through to the handler on
//! first touch; assignments mutate handler slots or local frames. `&&` and
//! `||` short-circuit.

use crate::error::RuntimeError;
use crate::resource::{ResourceHandler, Token};
use crate::store::DataStore;
use crate::value::narrow_numeric;
use cascade_ast::{Expr, ExprKind, Literal, Type};
use cascade_compiler::ContextStack;
use std::collections::HashMap;

/// Guard against runaway recursion in user rules
pub const MAX_CALL_DEPTH: usize = 256;

/// A value passing through the evaluator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Num(f64),
    Token(Token),
    Empty,
}

pub struct Interpreter<'a> {
    ctx: &'a ContextStack,
    data: &'a DataStore,
    handler: &'a mut ResourceHandler,
    /// Call frames, each a stack of scopes
    frames: Vec<Vec<HashMap<String, Value>>>,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ctx: &'a ContextStack,
        data: &'a DataStore,
        handler: &'a mut ResourceHandler,
    ) -> Self {
        Self {
            ctx,
            data,
            handler,
            frames: vec![vec![HashMap::new()]],
            depth: 0,
        }
    }

    pub fn run(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        self.eval(expr)
    }

    /// Force a value down to a number, reading through the handler
    pub fn numeric(&self, value: Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Num(n) => Ok(n),
            Value::Token(token) => self.handler.read_value(token),
            Value::Empty => Err(RuntimeError::MissingValue),
        }
    }

    fn seek_local(&self, name: &str) -> Option<Value> {
        let frame = self.frames.last()?;
        frame.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn set_local(&mut self, name: &str, value: Value) -> bool {
        if let Some(frame) = self.frames.last_mut() {
            for scope in frame.iter_mut().rev() {
                if let Some(slot) = scope.get_mut(name) {
                    *slot = value;
                    return true;
                }
            }
        }
        false
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Ident(name) => match name.as_str() {
                "true" => Ok(Value::Num(1.0)),
                "false" => Ok(Value::Num(0.0)),
                _ => {
                    if let Some(local) = self.seek_local(name) {
                        Ok(local)
                    } else {
                        Ok(Value::Token(self.handler.read_in(self.data, name)?))
                    }
                }
            },
            ExprKind::Literal(literal) => match literal {
                Literal::Num(n) => Ok(Value::Num(*n)),
                Literal::Str(s) => Ok(Value::Token(self.handler.take_string(s))),
                Literal::Func(_) | Literal::Unit => Ok(Value::Empty),
            },
            ExprKind::Member { base, member } => {
                let base_value = self.eval(base)?;
                let Value::Token(base_token) = base_value else {
                    return Err(RuntimeError::ValueShape(
                        "a number has no members".to_string(),
                    ));
                };
                if let ExprKind::Literal(Literal::Str(name)) = &member.kind {
                    if member.ty.as_ref().is_some_and(Type::is_string) {
                        return Ok(Value::Token(self.handler.member_access(
                            self.data,
                            base_token,
                            name,
                        )?));
                    }
                }
                let index = self.eval(member)?;
                let index = self.numeric(index)?;
                Ok(Value::Token(
                    self.handler.array_access(base_token, index as usize)?,
                ))
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            ExprKind::Binary { op, lhs, rhs } => self.eval_binary(op, lhs, rhs),
            ExprKind::Unary { op, rhs } => {
                let value = self.eval(rhs)?;
                let value = self.numeric(value)?;
                match op.as_str() {
                    "-" => Ok(Value::Num(-value)),
                    "!" | "not" => Ok(Value::Num(if value == 0.0 { 1.0 } else { 0.0 })),
                    other => Err(RuntimeError::Unsupported(format!(
                        "unary operator \"{other}\" is not supported"
                    ))),
                }
            }
            ExprKind::Branch {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.eval(cond)?;
                if self.numeric(cond)? != 0.0 {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            ExprKind::ComplexLiteral { ty, members } => self.eval_complex_literal(ty, members),
            ExprKind::Loop {
                init, cond, body, ..
            } => {
                self.push_scope();
                let result = (|| {
                    self.eval(init)?;
                    loop {
                        let c = self.eval(cond)?;
                        if self.numeric(c)? == 0.0 {
                            break;
                        }
                        self.eval(body)?;
                    }
                    Ok(Value::Empty)
                })();
                self.pop_scope();
                result
            }
            ExprKind::Block(exprs) => {
                self.push_scope();
                let mut last = Ok(Value::Empty);
                for sub in exprs {
                    last = self.eval(sub);
                    if last.is_err() {
                        break;
                    }
                }
                self.pop_scope();
                last
            }
            ExprKind::VarDef { name, value, .. } => {
                if self
                    .frames
                    .last()
                    .and_then(|f| f.last())
                    .is_some_and(|scope| scope.contains_key(name))
                {
                    return Err(RuntimeError::Unsupported(format!(
                        "variable \"{name}\" redefined"
                    )));
                }
                let initializer = self.eval(value)?;
                let stored = match initializer {
                    Value::Token(src) => {
                        let copy = self.handler.make_instance_like(self.data, src)?;
                        self.handler.assign(copy, src)?;
                        Value::Token(copy)
                    }
                    Value::Num(n) => Value::Num(n),
                    Value::Empty => return Err(RuntimeError::MissingValue),
                };
                if let Some(scope) = self.frames.last_mut().and_then(|f| f.last_mut()) {
                    scope.insert(name.clone(), stored);
                }
                Ok(Value::Empty)
            }
            ExprKind::ControlFlow { .. }
            | ExprKind::TypeDef { .. }
            | ExprKind::FuncDef(_)
            | ExprKind::SymbolDef { .. }
            | ExprKind::TemplateDef { .. } => Err(RuntimeError::Unsupported(format!(
                "{} is not executable",
                expr.describe()
            ))),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, RuntimeError> {
        let name = match &callee.kind {
            ExprKind::Ident(name) => name.clone(),
            ExprKind::Literal(Literal::Func(name)) => name.clone(),
            _ => {
                return Err(RuntimeError::Unsupported(
                    "only direct function calls are supported".to_string(),
                ))
            }
        };

        match name.as_str() {
            "print" => {
                let value = self.eval_arg(args, 0)?;
                match value {
                    Value::Token(token) if self.handler.is_string(token) => {
                        println!("{}", self.handler.read_string(token)?);
                    }
                    other => println!("{}", self.numeric(other)?),
                }
                Ok(Value::Empty)
            }
            "sin" | "cos" | "tan" | "cot" | "atan" | "asin" | "acos" | "abs" | "fabs" | "exp"
            | "log" | "floor" | "sqrt" => {
                let x = self.eval_arg(args, 0)?;
                let x = self.numeric(x)?;
                let result = match name.as_str() {
                    "sin" => x.sin(),
                    "cos" => x.cos(),
                    "tan" => x.tan(),
                    "cot" => 1.0 / x.tan(),
                    "atan" => x.atan(),
                    "asin" => x.asin(),
                    "acos" => x.acos(),
                    "abs" | "fabs" => x.abs(),
                    "exp" => x.exp(),
                    "log" => x.ln(),
                    "floor" => x.floor(),
                    _ => x.sqrt(),
                };
                Ok(Value::Num(result))
            }
            "pow" | "atan2" => {
                let x = self.eval_arg(args, 0)?;
                let x = self.numeric(x)?;
                let y = self.eval_arg(args, 1)?;
                let y = self.numeric(y)?;
                Ok(Value::Num(if name == "pow" {
                    x.powf(y)
                } else {
                    x.atan2(y)
                }))
            }
            "strEqual" => {
                let lhs = self.eval_arg(args, 0)?;
                let lhs = self.string_of(lhs)?;
                let rhs = self.eval_arg(args, 1)?;
                let rhs = self.string_of(rhs)?;
                Ok(Value::Num(if lhs == rhs { 1.0 } else { 0.0 }))
            }
            "length" => {
                let array = self.token_arg(args, 0)?;
                Ok(Value::Num(self.handler.array_length(array)? as f64))
            }
            "resize" => {
                let array = self.token_arg(args, 0)?;
                let len = self.eval_arg(args, 1)?;
                let len = self.numeric(len)?;
                self.handler.array_resize(self.data, array, len as usize)?;
                Ok(Value::Empty)
            }
            "push" => {
                let array = self.token_arg(args, 0)?;
                let element = self.eval_arg(args, 1)?;
                let assembled = match element {
                    Value::Token(token) => self.handler.assemble(token)?,
                    Value::Num(n) => {
                        let elem_ty = args
                            .get(1)
                            .and_then(|a| a.ty.as_ref())
                            .map(|t| host_type_name(t))
                            .unwrap_or_else(|| "float64".to_string());
                        narrow_numeric(&elem_ty, n)
                    }
                    Value::Empty => return Err(RuntimeError::MissingValue),
                };
                self.handler.array_push(array, assembled)?;
                Ok(Value::Empty)
            }
            _ => self.eval_user_call(&name, args),
        }
    }

    fn eval_user_call(&mut self, name: &str, args: &[Expr]) -> Result<Value, RuntimeError> {
        let def = self
            .ctx
            .global
            .real_funcs
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
        if def.params.len() != args.len() {
            return Err(RuntimeError::ValueShape(format!(
                "\"{name}\" takes {} arguments, {} given",
                def.params.len(),
                args.len()
            )));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded);
        }

        let mut scope = HashMap::new();
        for (param, arg) in def.params.iter().zip(args) {
            let mut value = self.eval(arg)?;
            // numeric parameters pass by value; everything else by token
            if param.ty.is_f64() {
                value = Value::Num(self.numeric(value)?);
            }
            scope.insert(param.name.clone(), value);
        }

        self.frames.push(vec![scope]);
        self.depth += 1;
        let result = self.eval(&def.body);
        self.depth -= 1;
        self.frames.pop();
        result
    }

    fn eval_binary(&mut self, op: &str, lhs: &Expr, rhs: &Expr) -> Result<Value, RuntimeError> {
        if op == "=" {
            return self.eval_assignment(lhs, rhs);
        }
        if matches!(op, "&&" | "and" | "||" | "or") {
            let left = self.eval(lhs)?;
            let left = self.numeric(left)? != 0.0;
            let wants_and = matches!(op, "&&" | "and");
            // short-circuit
            if wants_and != left {
                return Ok(Value::Num(if left { 1.0 } else { 0.0 }));
            }
            let right = self.eval(rhs)?;
            let right = self.numeric(right)? != 0.0;
            let result = if wants_and {
                left && right
            } else {
                left || right
            };
            return Ok(Value::Num(if result { 1.0 } else { 0.0 }));
        }

        let left = self.eval(lhs)?;
        let left = self.numeric(left)?;
        let right = self.eval(rhs)?;
        let right = self.numeric(right)?;
        let result = match op {
            "+" => left + right,
            "-" => left - right,
            "*" => left * right,
            "/" => left / right,
            "%" => left % right,
            ">" => (left > right) as u8 as f64,
            "<" => (left < right) as u8 as f64,
            ">=" => (left >= right) as u8 as f64,
            "<=" => (left <= right) as u8 as f64,
            "==" => (left == right) as u8 as f64,
            "!=" => (left != right) as u8 as f64,
            other => {
                return Err(RuntimeError::Unsupported(format!(
                    "binary operator \"{other}\" is not supported"
                )))
            }
        };
        Ok(Value::Num(result))
    }

    fn eval_assignment(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Value, RuntimeError> {
        match &lhs.kind {
            ExprKind::Ident(_) | ExprKind::Member { .. } => {
                let target = self.eval(lhs)?;
                match target {
                    Value::Token(dst) => {
                        let value = self.eval(rhs)?;
                        match value {
                            Value::Token(src) => self.handler.assign(dst, src)?,
                            Value::Num(n) => self.handler.write_value(dst, n)?,
                            Value::Empty => return Err(RuntimeError::MissingValue),
                        }
                    }
                    Value::Num(_) => {
                        // a local numeric variable
                        let value = self.eval(rhs)?;
                        let value = self.numeric(value)?;
                        if let ExprKind::Ident(name) = &lhs.kind {
                            self.set_local(name, Value::Num(value));
                        }
                    }
                    Value::Empty => return Err(RuntimeError::MissingValue),
                }
                Ok(Value::Empty)
            }
            _ => Err(RuntimeError::Unsupported(
                "only direct or member variable assignment is supported".to_string(),
            )),
        }
    }

    fn eval_complex_literal(
        &mut self,
        ty: &Type,
        members: &[(Option<Expr>, Expr)],
    ) -> Result<Value, RuntimeError> {
        let type_name = host_type_name(ty);
        let instance = self.handler.make_instance(self.data, &type_name)?;
        if ty.is_array() {
            let elem_ty = ty
                .element_type()
                .map(host_type_name)
                .unwrap_or_else(|| "float64".to_string());
            for (_, value) in members {
                let element = self.eval(value)?;
                let assembled = match element {
                    Value::Token(token) => self.handler.assemble(token)?,
                    Value::Num(n) => narrow_numeric(&elem_ty, n),
                    Value::Empty => return Err(RuntimeError::MissingValue),
                };
                self.handler.array_push(instance, assembled)?;
            }
            return Ok(Value::Token(instance));
        }
        for (designator, value) in members {
            let Some(designator) = designator else {
                return Err(RuntimeError::Unsupported(
                    "only designated struct literals are executable".to_string(),
                ));
            };
            let ExprKind::Literal(Literal::Str(member_name)) = &designator.kind else {
                return Err(RuntimeError::Unsupported(
                    "only string-literal designators are supported".to_string(),
                ));
            };
            let member = self
                .handler
                .member_access(self.data, instance, member_name)?;
            let v = self.eval(value)?;
            match v {
                Value::Num(n) => self.handler.write_value(member, n)?,
                Value::Token(src) => self.handler.assign(member, src)?,
                Value::Empty => return Err(RuntimeError::MissingValue),
            }
        }
        Ok(Value::Token(instance))
    }

    fn eval_arg(&mut self, args: &[Expr], index: usize) -> Result<Value, RuntimeError> {
        let arg = args.get(index).ok_or_else(|| {
            RuntimeError::ValueShape(format!("missing argument {index} in built-in call"))
        })?;
        self.eval(arg)
    }

    fn token_arg(&mut self, args: &[Expr], index: usize) -> Result<Token, RuntimeError> {
        match self.eval_arg(args, index)? {
            Value::Token(token) => Ok(token),
            _ => Err(RuntimeError::ValueShape(
                "expected an array value".to_string(),
            )),
        }
    }

    fn string_of(&self, value: Value) -> Result<String, RuntimeError> {
        match value {
            Value::Token(token) if self.handler.is_string(token) => {
                self.handler.read_string(token)
            }
            _ => Err(RuntimeError::ValueShape(
                "cannot compare a string with a non-string".to_string(),
            )),
        }
    }

    fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(HashMap::new());
        }
    }

    fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.len() > 1 {
                frame.pop();
            }
        }
    }
}

/// Expression-language type to host-surface type name ("[]f64" -> "float64[]")
fn host_type_name(ty: &Type) -> String {
    match ty {
        Type::Base(name) if name == "f64" => "float64".to_string(),
        Type::Base(name) => name.clone(),
        Type::Array(elem) => format!("{}[]", host_type_name(elem)),
        other => other.to_string(),
    }
}
