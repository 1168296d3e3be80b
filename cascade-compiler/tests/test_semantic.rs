use cascade_ast::{ExprKind, Literal, Type};
use cascade_compiler::{Analyzer, ContextStack, SemanticError, RESERVED_PREFIX};
use cascade_diagnostics::error_codes;
use cascade_parser::Parser;

fn analyze(source: &str) -> Result<(ContextStack, String), SemanticError> {
    let mut parser = Parser::new(source).expect("lex failed");
    let exprs = parser.parse_all().expect("parse failed");
    let mut ctx = ContextStack::new();
    let name = Analyzer::new(&mut ctx).add_unnamed_function(exprs)?;
    Ok((ctx, name))
}

fn expect_error(source: &str) -> SemanticError {
    let mut parser = Parser::new(source).expect("lex failed");
    let exprs = parser.parse_all().expect("parse failed");
    let mut ctx = ContextStack::new();
    match Analyzer::new(&mut ctx).add_unnamed_function(exprs) {
        Ok(_) => panic!("expected semantic error for: {source}"),
        Err(err) => err,
    }
}

#[test]
fn test_undefined_variable() {
    let err = expect_error("missing + 1");
    assert!(err.message.contains("missing"));
    assert_eq!(err.code, error_codes::UNDEFINED_NAME);
}

#[test]
fn test_undefined_variable_suggestion() {
    let err = expect_error("var altitude f64 = 1\naltitudo + 1");
    assert_eq!(err.code, error_codes::UNDEFINED_NAME);
    assert!(
        err.help.as_deref().is_some_and(|h| h.contains("altitude")),
        "expected a suggestion, got {:?}",
        err.help
    );
}

#[test]
fn test_error_codes_by_kind() {
    let err = expect_error("func twice(a f64) -> f64 { a * 2 }\ntwice(1, 2)");
    assert_eq!(err.code, error_codes::ARITY_MISMATCH);

    let err = expect_error("var x f64 = 1\n(x + 1) = 2");
    assert_eq!(err.code, error_codes::INVALID_LVALUE);

    let err = expect_error("var x f64 = 1\nx = \"text\"");
    assert_eq!(err.code, error_codes::TYPE_MISMATCH);

    let err = expect_error("type V struct { w W }\nV{}");
    assert_eq!(err.code, error_codes::UNDEFINED_TYPE);

    let err = expect_error("type V struct { x f64 }\ntype V struct { y f64 }\nV{}");
    assert_eq!(err.code, error_codes::REDEFINITION);

    let err = expect_error("func +(a f64, b f64) -> f64 { a - b }\n1 + 2");
    assert_eq!(err.code, error_codes::UNSUPPORTED_OPERATOR);

    let err = expect_error(
        "type V struct { len f64 }\n\
         func (v V) len() -> f64 { 1 }\n\
         var v V = V{.len = 1}\n\
         v.len()",
    );
    assert_eq!(err.code, error_codes::AMBIGUOUS_DISPATCH);

    let err = expect_error("return 1");
    assert_eq!(err.code, error_codes::UNSUPPORTED_CONSTRUCT);
}

#[test]
fn test_literal_arithmetic_types() {
    let (ctx, name) = analyze("1 + 2 * 3").expect("analysis failed");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    assert_eq!(def.body.ty, Some(Type::f64()));
}

#[test]
fn test_function_registration_and_mangling() {
    let (ctx, _) = analyze(
        "func add(a f64, b f64) -> f64 { a + b }\n\
         func sub(a f64, b f64) -> f64 { a - b }\n\
         add(1, 2) + sub(3, 1)",
    )
    .expect("analysis failed");
    let add = ctx.global.func_names.get("add").expect("add missing");
    let sub = ctx.global.func_names.get("sub").expect("sub missing");
    assert_ne!(add, sub);
    assert!(add.starts_with(RESERVED_PREFIX));
    assert!(ctx.global.checked_funcs.contains(add));
}

#[test]
fn test_call_rewritten_to_mangled_literal() {
    let (ctx, name) = analyze("func twice(a f64) -> f64 { a * 2 }\ntwice(21)").expect("analysis");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    let ExprKind::Call { callee, .. } = &def.body.kind else {
        panic!("expected call body, got {:?}", def.body.kind);
    };
    let ExprKind::Literal(Literal::Func(mangled)) = &callee.kind else {
        panic!("expected mangled function literal, got {:?}", callee.kind);
    };
    assert!(mangled.starts_with(RESERVED_PREFIX));
}

#[test]
fn test_dispatch_exactness() {
    // no implicit conversion: a string argument cannot feed an f64 parameter
    let err = expect_error("func twice(a f64) -> f64 { a * 2 }\ntwice(\"nope\")");
    assert!(err.message.contains("type mismatch"), "{}", err.message);
}

#[test]
fn test_arity_mismatch() {
    let err = expect_error("func twice(a f64) -> f64 { a * 2 }\ntwice(1, 2)");
    assert!(err.message.contains("parameters"), "{}", err.message);
}

#[test]
fn test_variable_function_name_collision() {
    let err = expect_error("func f(a f64) -> f64 { a }\nvar f f64 = 1\nf(1)");
    assert!(err.message.contains("already defined"), "{}", err.message);
}

#[test]
fn test_member_access_types() {
    let (ctx, name) = analyze(
        "type V struct { x f64; y f64 }\n\
         var v V = V{.x = 1, .y = 2}\n\
         v.x + v.y",
    )
    .expect("analysis failed");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    assert_eq!(def.body.ty, Some(Type::f64()));
    assert!(ctx.global.type_defs.contains_key("V"));
}

#[test]
fn test_member_function_rewrite() {
    let (ctx, _) = analyze(
        "extern func sqrt(a f64) -> f64\n\
         type V struct { x f64; y f64 }\n\
         func (v V) len() -> f64 { sqrt(v.x * v.x + v.y * v.y) }\n\
         var v V = V{.x = 3, .y = 4}\n\
         v.len()",
    )
    .expect("analysis failed");
    let table = ctx.global.member_funcs.get("len").expect("len missing");
    assert_eq!(table.len(), 1);
    let key: Vec<Type> = vec![Type::base("V")];
    assert!(table.contains_key(&key));
}

#[test]
fn test_member_and_member_function_ambiguity() {
    let err = expect_error(
        "type V struct { len f64 }\n\
         func (v V) len() -> f64 { 1 }\n\
         var v V = V{.len = 1}\n\
         v.len()",
    );
    assert!(err.message.contains("same name"), "{}", err.message);
}

#[test]
fn test_operator_overload_dispatch() {
    let (ctx, name) = analyze(
        "type V struct { x f64 }\n\
         func +(a V, b V) -> V { V{.x = a.x + b.x} }\n\
         var v V = V{.x = 1}\n\
         v + v",
    )
    .expect("analysis failed");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    // the overloaded + is rewritten into a call
    let ExprKind::Block(exprs) = &def.body.kind else {
        panic!("expected block body");
    };
    let last = exprs.last().expect("empty body");
    assert!(matches!(&last.kind, ExprKind::Call { .. }));
    assert_eq!(last.ty, Some(Type::base("V")));
    assert!(ctx.global.symbolic_funcs.contains_key("+"));
}

#[test]
fn test_builtin_operator_overload_rejected() {
    let err = expect_error("func +(a f64, b f64) -> f64 { a - b }\n1 + 2");
    assert!(err.message.contains("overload"), "{}", err.message);
}

#[test]
fn test_assignment_needs_lvalue() {
    let err = expect_error("var x f64 = 1\n(x + 1) = 2");
    assert!(err.message.contains("non-assignable"), "{}", err.message);
}

#[test]
fn test_assignment_type_mismatch() {
    let err = expect_error("var x f64 = 1\nx = \"text\"");
    assert!(err.message.contains("not allowed"), "{}", err.message);
}

#[test]
fn test_branch_join_type() {
    let (ctx, name) = analyze("if (1) 2 else 3").expect("analysis failed");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    assert_eq!(def.body.ty, Some(Type::f64()));

    // disagreeing arms join to no value and cannot be used as an operand
    let err = expect_error("1 + if (1) 2 else \"s\"");
    assert!(err.message.contains("not defined"), "{}", err.message);
}

#[test]
fn test_template_instantiation_dedup() {
    let (ctx, _) = analyze("func<T> id(x T) -> T { x }\nid(1.0) + id(2.0)").expect("analysis");
    let template = ctx.global.template_funcs.get("id").expect("template missing");
    // both uses bind T to f64, so one shared instantiation exists
    assert_eq!(template.instantiations.len(), 1);
    let (subst, mangled) = template
        .instantiations
        .iter()
        .next()
        .expect("no instantiation");
    assert_eq!(subst.get("T"), Some(&Type::f64()));
    assert!(ctx.global.checked_funcs.contains(mangled));
}

#[test]
fn test_template_distinct_substitutions() {
    let (ctx, _) = analyze(
        "func<T> first(x []T) -> T { x[0] }\n\
         var a []f64 = []f64{1}\n\
         var b []string = []string{\"s\"}\n\
         first(a)\n\
         first(b)",
    )
    .expect("analysis failed");
    let template = ctx
        .global
        .template_funcs
        .get("first")
        .expect("template missing");
    assert_eq!(template.instantiations.len(), 2);
    let names: Vec<&String> = template.instantiations.values().collect();
    assert_ne!(names[0], names[1]);
}

#[test]
fn test_array_member_operations() {
    let (ctx, name) = analyze(
        "var xs []f64 = []f64{1, 2}\n\
         xs.push(3)\n\
         xs.resize(5)\n\
         xs.length()",
    )
    .expect("analysis failed");
    let def = ctx.global.real_funcs.get(&name).expect("unnamed missing");
    assert_eq!(def.body.ty, Some(Type::f64()));
}

#[test]
fn test_control_flow_rejected() {
    let err = expect_error("return 1");
    assert!(err.message.contains("not supported"), "{}", err.message);
}

#[test]
fn test_lambda_rejected() {
    let err = expect_error("|x f64| -> f64 x + 1");
    assert!(err.message.contains("allowed"), "{}", err.message);
}

#[test]
fn test_recursive_function_admitted() {
    let (ctx, _) = analyze(
        "func fact(n f64) -> f64 { if (n <= 1) 1 else n * fact(n - 1) }\nfact(5)",
    )
    .expect("analysis failed");
    let mangled = ctx.global.func_names.get("fact").expect("fact missing");
    assert!(ctx.global.checked_funcs.contains(mangled));
    let deps = ctx
        .global
        .func_dependency
        .get(mangled)
        .expect("deps missing");
    assert!(deps.contains(mangled));
}

#[test]
fn test_struct_member_type_must_exist() {
    let err = expect_error("type V struct { w W }\nV{}");
    assert!(err.message.contains("not defined"), "{}", err.message);
}

#[test]
fn test_type_redefinition_rejected() {
    let err = expect_error("type V struct { x f64 }\ntype V struct { y f64 }\nV{}");
    assert!(err.message.contains("redefined"), "{}", err.message);
}
