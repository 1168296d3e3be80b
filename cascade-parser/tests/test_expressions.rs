use cascade_ast::*;
use cascade_parser::Parser;

fn parse_one(source: &str) -> Expr {
    let mut parser = Parser::new(source).expect("lex failed");
    let mut exprs = parser.parse_all().expect("parse failed");
    assert_eq!(exprs.len(), 1, "expected a single expression");
    exprs.remove(0)
}

#[test]
fn test_precedence() {
    let expr = parse_one("1 + 2 * 3");
    let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
        panic!("expected binary, got {expr:?}");
    };
    assert_eq!(op, "+");
    let ExprKind::Binary { op: inner, .. } = &rhs.kind else {
        panic!("expected nested binary, got {rhs:?}");
    };
    assert_eq!(inner, "*");
}

#[test]
fn test_user_defined_infix() {
    // an identifier in operator position parses as infix
    let expr = parse_one("a isAbove b");
    let ExprKind::Binary { op, lhs, rhs } = &expr.kind else {
        panic!("expected binary, got {expr:?}");
    };
    assert_eq!(op, "isAbove");
    assert!(matches!(&lhs.kind, ExprKind::Ident(n) if n == "a"));
    assert!(matches!(&rhs.kind, ExprKind::Ident(n) if n == "b"));
}

#[test]
fn test_assignment_is_lowest_priority() {
    let expr = parse_one("x = 1 + 2");
    let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
        panic!("expected binary, got {expr:?}");
    };
    assert_eq!(op, "=");
    assert!(matches!(&rhs.kind, ExprKind::Binary { op, .. } if op == "+"));
}

#[test]
fn test_assign_to_assignment_rejected() {
    let mut parser = Parser::new("a = b + c = d").expect("lex failed");
    let err = parser.parse_all().expect_err("expected parse error");
    assert_eq!(
        err.code(),
        cascade_diagnostics::error_codes::ASSIGN_TO_ASSIGNMENT
    );
}

#[test]
fn test_type_syntax_error_code() {
    let mut parser = Parser::new("var x []struct{a f64;} = 1").expect("lex failed");
    let err = parser.parse_all().expect_err("expected parse error");
    assert_eq!(
        err.code(),
        cascade_diagnostics::error_codes::BAD_TYPE_SYNTAX
    );
}

#[test]
fn test_postfix_chain() {
    let expr = parse_one("v.items[0].weight");
    // ((v.items)[0]).weight
    let ExprKind::Member { base, member } = &expr.kind else {
        panic!("expected member access, got {expr:?}");
    };
    assert!(matches!(&member.kind, ExprKind::Literal(Literal::Str(s)) if s == "weight"));
    let ExprKind::Member { member: index, .. } = &base.kind else {
        panic!("expected index access, got {base:?}");
    };
    assert!(matches!(&index.kind, ExprKind::Literal(Literal::Num(n)) if *n == 0.0));
}

#[test]
fn test_call_with_args() {
    let expr = parse_one("pow(2, 10)");
    let ExprKind::Call { callee, args } = &expr.kind else {
        panic!("expected call, got {expr:?}");
    };
    assert!(matches!(&callee.kind, ExprKind::Ident(n) if n == "pow"));
    assert_eq!(args.len(), 2);
}

#[test]
fn test_branch_without_else() {
    let expr = parse_one("if (a) b");
    let ExprKind::Branch { else_branch, .. } = &expr.kind else {
        panic!("expected branch, got {expr:?}");
    };
    assert!(matches!(
        &else_branch.kind,
        ExprKind::Literal(Literal::Unit)
    ));
}

#[test]
fn test_labeled_while() {
    let expr = parse_one("while (x < 3) @outer { x = x + 1 }");
    let ExprKind::Loop { label, .. } = &expr.kind else {
        panic!("expected loop, got {expr:?}");
    };
    assert_eq!(label.as_deref(), Some("outer"));
}

#[test]
fn test_complex_literal_designated() {
    let expr = parse_one("Vector{.x = 1, .y = 2}");
    let ExprKind::ComplexLiteral { ty, members } = &expr.kind else {
        panic!("expected complex literal, got {expr:?}");
    };
    assert_eq!(ty, &Type::base("Vector"));
    assert_eq!(members.len(), 2);
    assert!(members.iter().all(|(d, _)| d.is_some()));
}

#[test]
fn test_complex_literal_mixed_designators_rejected() {
    let mut parser = Parser::new("Vector{.x = 1, 2}").expect("lex failed");
    assert!(parser.parse_all().is_err());
}

#[test]
fn test_array_literal() {
    let expr = parse_one("[]f64{1, 2, 3}");
    let ExprKind::ComplexLiteral { ty, members } = &expr.kind else {
        panic!("expected complex literal, got {expr:?}");
    };
    assert_eq!(ty, &Type::array(Type::f64()));
    assert_eq!(members.len(), 3);
    assert!(members.iter().all(|(d, _)| d.is_none()));
}

#[test]
fn test_func_def_normal() {
    let expr = parse_one("func add(a f64, b f64) -> f64 { a + b }");
    let ExprKind::FuncDef(def) = &expr.kind else {
        panic!("expected function definition, got {expr:?}");
    };
    assert_eq!(def.name, "add");
    assert_eq!(def.kind, FuncDefKind::Normal);
    assert_eq!(
        def.func_ty,
        Type::func(vec![Type::f64(), Type::f64()], Some(Type::f64()))
    );
}

#[test]
fn test_func_def_member() {
    let expr = parse_one("func (v Vector) len() -> f64 { v.x }");
    let ExprKind::FuncDef(def) = &expr.kind else {
        panic!("expected function definition, got {expr:?}");
    };
    assert_eq!(def.kind, FuncDefKind::Member);
    assert_eq!(def.params.len(), 1);
    assert_eq!(def.params[0].name, "v");
}

#[test]
fn test_func_def_symbolic() {
    let expr = parse_one("func ==(a string, b string) -> f64 { 1 }");
    let ExprKind::FuncDef(def) = &expr.kind else {
        panic!("expected function definition, got {expr:?}");
    };
    assert_eq!(def.kind, FuncDefKind::Symbolic);
    assert_eq!(def.name, "==");
}

#[test]
fn test_reserved_operator_overload_rejected() {
    let mut parser = Parser::new("func =(a f64, b f64) -> f64 { 1 }").expect("lex failed");
    assert!(parser.parse_all().is_err());
}

#[test]
fn test_template_prefix() {
    let expr = parse_one("func<T> id(x T) -> T { x }");
    let ExprKind::TemplateDef { type_params, body } = &expr.kind else {
        panic!("expected template definition, got {expr:?}");
    };
    assert_eq!(type_params, &vec!["T".to_string()]);
    assert_eq!(body.name, "id");
}

#[test]
fn test_template_prefix_does_not_shadow_lt_overload() {
    // `func <(…)` overloads the "<" operator, it is not a template
    let expr = parse_one("func <(a Vector, b Vector) -> f64 { 1 }");
    let ExprKind::FuncDef(def) = &expr.kind else {
        panic!("expected function definition, got {expr:?}");
    };
    assert_eq!(def.kind, FuncDefKind::Symbolic);
    assert_eq!(def.name, "<");
}

#[test]
fn test_extern_command() {
    let expr = parse_one("extern func sin(a f64) -> f64");
    let ExprKind::SymbolDef { name, kind, ty } = &expr.kind else {
        panic!("expected symbol definition, got {expr:?}");
    };
    assert_eq!(name, "sin");
    assert_eq!(*kind, SymbolDefKind::Extern);
    assert_eq!(ty, &Type::func(vec![Type::f64()], Some(Type::f64())));
}

#[test]
fn test_var_defs() {
    let expr = parse_one("var x f64 = 1");
    assert!(matches!(
        &expr.kind,
        ExprKind::VarDef {
            kind: VarDefKind::Normal,
            ..
        }
    ));

    let expr = parse_one("const pi f64 = 3.14");
    assert!(matches!(
        &expr.kind,
        ExprKind::VarDef {
            kind: VarDefKind::Constant,
            ..
        }
    ));
}

#[test]
fn test_uninitialized_const_rejected() {
    let mut parser = Parser::new("const x f64\n").expect("lex failed");
    assert!(parser.parse_all().is_err());
}

#[test]
fn test_multiple_top_level_expressions() {
    let mut parser =
        Parser::new("extern func sin(a f64) -> f64\nvar x f64 = 1\nx + 1\n").expect("lex failed");
    let exprs = parser.parse_all().expect("parse failed");
    assert_eq!(exprs.len(), 3);
}

#[test]
fn test_closure_parses_as_lambda() {
    let expr = parse_one("|x f64| -> f64 x + 1");
    let ExprKind::FuncDef(def) = &expr.kind else {
        panic!("expected lambda, got {expr:?}");
    };
    assert_eq!(def.kind, FuncDefKind::Lambda);
    assert_eq!(def.params.len(), 1);
}
