use serde::{Deserialize, Serialize};

pub mod free_vars;
pub mod types;

pub use free_vars::free_vars;
pub use types::{ComplexKind, Type};

/// Byte range of a node in its source text
pub type Span = std::ops::Range<usize>;

/// An expression node. `ty` is `None` before semantic analysis and holds
/// the inferred type afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Option<Type>,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            ty: None,
            span,
        }
    }

    pub fn typed(kind: ExprKind, ty: Type, span: Span) -> Self {
        Self {
            kind,
            ty: Some(ty),
            span,
        }
    }

    /// The no-value literal, typed `Nothing` from birth
    pub fn nop(span: Span) -> Self {
        Self::typed(ExprKind::Literal(Literal::Unit), Type::Nothing, span)
    }

    /// A literal referring to a real (mangled) or extern function
    pub fn func_ref(name: impl Into<String>, ty: Type, span: Span) -> Self {
        Self::typed(ExprKind::Literal(Literal::Func(name.into())), ty, span)
    }

    pub fn num(value: f64, span: Span) -> Self {
        Self::typed(ExprKind::Literal(Literal::Num(value)), Type::f64(), span)
    }

    pub fn str(value: impl Into<String>, span: Span) -> Self {
        Self::typed(
            ExprKind::Literal(Literal::Str(value.into())),
            Type::string(),
            span,
        )
    }

    /// Inferred type, or `Nothing` when analysis has not run
    pub fn type_or_nothing(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&Type::Nothing)
    }

    /// Short description of the node shape, used in error call stacks
    pub fn describe(&self) -> &'static str {
        match &self.kind {
            ExprKind::Ident(_) => "identifier",
            ExprKind::Literal(_) => "literal",
            ExprKind::Member { .. } => "member access",
            ExprKind::Call { .. } => "function call",
            ExprKind::Binary { .. } => "binary operation",
            ExprKind::Unary { .. } => "unary operation",
            ExprKind::Branch { .. } => "branch",
            ExprKind::ComplexLiteral { .. } => "complex literal",
            ExprKind::Loop { .. } => "loop",
            ExprKind::Block(_) => "block",
            ExprKind::ControlFlow { .. } => "control flow statement",
            ExprKind::TypeDef { .. } => "type definition",
            ExprKind::VarDef { .. } => "variable definition",
            ExprKind::FuncDef(_) => "function definition",
            ExprKind::SymbolDef { .. } => "symbol definition",
            ExprKind::TemplateDef { .. } => "template definition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Num(f64),
    Str(String),
    /// Reference to a real (mangled) or extern function; the node's type is
    /// the function type
    Func(String),
    /// The no-value literal
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlFlowKind {
    Break,
    Continue,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDefKind {
    Normal,
    Alias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarDefKind {
    Normal,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FuncDefKind {
    Normal,
    Member,
    Symbolic,
    Lambda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolDefKind {
    Import,
    Export,
    Extern,
}

/// A named function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// A function definition: normal, member (receiver-first parameter),
/// symbolic (operator overload) or lambda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    /// Always a `Type::Func` covering the parameters and return
    pub func_ty: Type,
    pub params: Vec<Param>,
    pub body: Box<Expr>,
    pub kind: FuncDefKind,
}

impl FunctionDef {
    /// Declared return type; `Nothing` when the function returns no value
    pub fn return_type(&self) -> Type {
        self.func_ty.func_return().unwrap_or(Type::Nothing)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Ident(String),
    Literal(Literal),
    /// `base.member` where a string literal member is a named field and any
    /// other member expression is an array index (must be `f64`)
    Member {
        base: Box<Expr>,
        member: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: String,
        rhs: Box<Expr>,
    },
    Branch {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// `T{...}` with optional `.name =` designators; all designated or none
    ComplexLiteral {
        ty: Type,
        members: Vec<(Option<Expr>, Expr)>,
    },
    /// `while (cond) body` with an optional init clause and label
    Loop {
        label: Option<String>,
        init: Box<Expr>,
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    /// Value of the last expression
    Block(Vec<Expr>),
    ControlFlow {
        kind: ControlFlowKind,
        label: Option<String>,
        value: Option<Box<Expr>>,
    },
    TypeDef {
        name: String,
        def: Type,
        kind: TypeDefKind,
    },
    VarDef {
        name: String,
        declared: Type,
        value: Box<Expr>,
        kind: VarDefKind,
    },
    FuncDef(FunctionDef),
    SymbolDef {
        name: String,
        kind: SymbolDefKind,
        ty: Type,
    },
    TemplateDef {
        type_params: Vec<String>,
        body: FunctionDef,
    },
}
