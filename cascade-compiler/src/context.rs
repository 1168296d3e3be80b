//! Scope stack and global registries shared by the analyzer, the
//! interpreter and the code generator.
//!
//! The global context owns every checked function body, keyed by its
//! mangled name; user-facing names map into that store through the
//! normal/member/symbolic overload tables. Contexts outlive any analyzer
//! or back end built against them.

use cascade_ast::{FunctionDef, Type};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Every mangled name starts with this prefix; identifiers spelled with it
/// are reserved
pub const RESERVED_PREFIX: &str = "__cascade";

/// A registered template function together with its instantiation cache,
/// deduplicated by substitution
#[derive(Debug, Clone)]
pub struct TemplateFunction {
    pub type_params: Vec<String>,
    pub def: FunctionDef,
    pub instantiations: BTreeMap<BTreeMap<String, Type>, String>,
}

/// Global symbol and definition tables
#[derive(Debug, Default)]
pub struct ContextGlobal {
    /// mangled name -> checked (or to-be-checked) function body
    pub real_funcs: HashMap<String, FunctionDef>,
    /// mangled name -> mangled names of every real function it calls
    pub func_dependency: HashMap<String, BTreeSet<String>>,
    /// mangled names whose body has been validated
    pub checked_funcs: HashSet<String>,

    /// user name -> mangled name, for normal functions
    pub func_names: HashMap<String, String>,
    /// user name -> parameter types -> mangled name
    pub member_funcs: HashMap<String, BTreeMap<Vec<Type>, String>>,
    /// operator -> parameter types -> mangled name
    pub symbolic_funcs: HashMap<String, BTreeMap<Vec<Type>, String>>,
    /// extern name -> function type
    pub extern_funcs: HashMap<String, Type>,
    /// user name -> template function info
    pub template_funcs: HashMap<String, TemplateFunction>,

    /// type name -> defined type
    pub type_defs: HashMap<String, Type>,
}

/// One scope frame of the context stack
#[derive(Debug, Default)]
pub struct Frame {
    pub vars: HashMap<String, Type>,
    pub consts: HashMap<String, (Type, String)>,
}

/// Scope stack plus global registries. Frames are pushed on scope entry
/// and popped on exit; the bottom frame holds the rule-set variables.
#[derive(Debug)]
pub struct ContextStack {
    pub global: ContextGlobal,
    pub scopes: Vec<Frame>,
    counter: usize,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    pub fn new() -> Self {
        Self {
            global: ContextGlobal::default(),
            scopes: vec![Frame::default()],
            counter: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn top(&self) -> &Frame {
        // the bottom frame always exists
        self.scopes.last().map_or_else(
            || unreachable!("context stack is never empty"),
            |frame| frame,
        )
    }

    pub fn top_mut(&mut self) -> &mut Frame {
        if self.scopes.is_empty() {
            self.scopes.push(Frame::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub fn push(&mut self) {
        self.scopes.push(Frame::default());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Drop every frame above the bottom one
    pub fn reset_scopes(&mut self) {
        self.scopes.truncate(1);
    }

    pub fn clear(&mut self) {
        self.counter = 0;
        self.global = ContextGlobal::default();
        self.scopes = vec![Frame::default()];
    }

    /// True when `name` can still be introduced in the current frame
    pub fn is_symbol_free(&self, name: &str) -> bool {
        let top = self.top();
        if top.vars.contains_key(name) || top.consts.contains_key(name) {
            return false;
        }
        if self.depth() == 1 && self.global.template_funcs.contains_key(name) {
            return false;
        }
        true
    }

    /// Innermost-first variable lookup
    pub fn seek_var(&self, name: &str) -> Option<&Type> {
        self.scopes.iter().rev().find_map(|frame| frame.vars.get(name))
    }

    /// Innermost-first constant lookup
    pub fn seek_const(&self, name: &str) -> Option<&(Type, String)> {
        self.scopes
            .iter()
            .rev()
            .find_map(|frame| frame.consts.get(name))
    }

    /// Type of a real function
    pub fn real_func_type(&self, mangled: &str) -> Option<&Type> {
        self.global.real_funcs.get(mangled).map(|def| &def.func_ty)
    }

    /// Globally unique name: `{prefix}@{n}@{suffix}` with a monotone counter
    pub fn generate_unique_name(&mut self, prefix: &str, suffix: &str) -> String {
        let name = format!("{prefix}@{}@{suffix}", self.counter);
        self.counter += 1;
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names_differ() {
        let mut ctx = ContextStack::new();
        let a = ctx.generate_unique_name(RESERVED_PREFIX, "f");
        let b = ctx.generate_unique_name(RESERVED_PREFIX, "f");
        assert_ne!(a, b);
        assert!(a.starts_with(RESERVED_PREFIX));
    }

    #[test]
    fn test_innermost_first_lookup() {
        let mut ctx = ContextStack::new();
        ctx.top_mut().vars.insert("x".to_string(), Type::f64());
        ctx.push();
        ctx.top_mut().vars.insert("x".to_string(), Type::string());
        assert_eq!(ctx.seek_var("x"), Some(&Type::string()));
        ctx.pop();
        assert_eq!(ctx.seek_var("x"), Some(&Type::f64()));
    }
}
