//! Lowers a rule-set document into checked expression-language functions:
//! pre-defines, the one-shot init block, the topologically ordered
//! intermediate-value block, and one function per sub-rule-set.

use super::document::{
    is_numeric_data, Consequence, ParamDoc, RuleSetDocument, RuleSetMetaInfo,
};
use crate::context::ContextStack;
use crate::error::SemanticError;
use crate::semantic::Analyzer;
use cascade_ast::free_vars;
use cascade_diagnostics::{error_codes, Diagnostic, Span as DiagSpan};
use cascade_parser::{ParseError, Parser};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Tool functions and constants processed before every rule-set document
pub const PRE_DEFINES: &str = r#"
// base
extern func sin(a f64)->f64
extern func cos(a f64)->f64
extern func tan(a f64)->f64
extern func cot(a f64)->f64
extern func atan(a f64)->f64
extern func asin(a f64)->f64
extern func acos(a f64)->f64
extern func fabs(a f64)->f64
extern func exp(a f64)->f64
extern func log(a f64)->f64
extern func floor(a f64)->f64
extern func sqrt(a f64)->f64
extern func pow(a f64, b f64)->f64
extern func atan2(a f64, b f64)->f64
extern func strEqual(a string, b string)->f64
func ==(a string, b string)->f64{strEqual(a, b)}
func abs(a f64)->f64 fabs(a)
const true f64 = 1.0
const false f64 = 0.0

func min(a f64, b f64)->f64 if(a>b) b else a
func max(a f64, b f64)->f64 if(a<b) b else a

// fuzzy logic
func trimf(x f64, a f64, b f64, c f64)->f64
    if(x < a) 0
    else if(x < b) (x - a) / (b - a)
    else if(x < c) (c - x) / (c - b)
    else 0

func trapmf(x f64, a f64, b f64, c f64, d f64)->f64
    if(x < a) 0
    else if(x < b) (x - a) / (b - a)
    else if(x < c) 1
    else if(x < d) (d - x) / (d - c)
    else 0
"#;

/// Type names the code generator keeps for its own interface structs
const RESERVED_TYPE_NAMES: &[&str] = &["Input", "Output", "Cache"];

#[derive(Debug, Error)]
pub enum TranslatorError {
    #[error("failed to parse rule-set document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("unsupported rule-set document version: \"{0}\"")]
    UnsupportedVersion(String),
    #[error("invalid type name: \"{0}\"")]
    InvalidTypeName(String),
    #[error("type name \"{0}\" is reserved")]
    ReservedTypeName(String),
    #[error("input, cache and output variables must have distinct names; \"{0}\" is duplicated")]
    DuplicateVariable(String),
    #[error(
        "InitValue of \"{var}\" must be a plain decimal literal or true/false, got \"{value}\""
    )]
    BadInitValue { var: String, value: String },
    #[error("self-dependent intermediate value is not allowed: \"{0}\"")]
    SelfDependency(String),
    #[error("cyclic dependency between intermediate values:\n{0}")]
    CyclicDependency(String),
    #[error("{stage}:\n{detail}")]
    Compile { stage: String, detail: String },
}

impl TranslatorError {
    pub fn code(&self) -> &'static str {
        match self {
            // the only enum in the schema is the consequence kind, so an
            // unknown-variant document error is an unknown consequence
            TranslatorError::Document(err) if err.to_string().contains("unknown variant") => {
                error_codes::UNKNOWN_CONSEQUENCE
            }
            TranslatorError::Document(_) => error_codes::BAD_DOCUMENT,
            TranslatorError::UnsupportedVersion(_) => error_codes::UNSUPPORTED_VERSION,
            TranslatorError::InvalidTypeName(_) | TranslatorError::ReservedTypeName(_) => {
                error_codes::RESERVED_TYPE_NAME
            }
            TranslatorError::DuplicateVariable(_) => error_codes::DUPLICATE_VARIABLE,
            TranslatorError::BadInitValue { .. } => error_codes::BAD_INIT_VALUE,
            TranslatorError::SelfDependency(_) | TranslatorError::CyclicDependency(_) => {
                error_codes::CYCLIC_INTERMEDIATES
            }
            TranslatorError::Compile { .. } => error_codes::UNEXPECTED_TOKEN,
        }
    }

    /// User-facing rendering. Compile failures already carry a formatted
    /// diagnostic from the expression pipeline; everything else renders a
    /// coded diagnostic of its own.
    pub fn report(&self) -> String {
        match self {
            TranslatorError::Compile { stage, detail } => format!("{stage}:\n{detail}"),
            other => {
                Diagnostic::error(other.code(), other.to_string(), DiagSpan::unknown())
                    .to_string()
            }
        }
    }
}

/// Mangled names of the functions a rule-set document lowers to
#[derive(Debug, Clone)]
pub struct RuleSetParseInfo {
    /// constants, tool functions and struct definitions
    pub pre_defines: String,
    /// one-shot InitValue assignment block, run at engine init
    pub init: String,
    /// per-tick intermediate-value assignment block
    pub preprocess: String,
    /// one entry per sub-rule-set, in registration order
    pub sub_rule_sets: Vec<String>,
}

pub fn read_source(
    source: &str,
    ctx: &mut ContextStack,
    meta: &mut RuleSetMetaInfo,
) -> Result<RuleSetParseInfo, TranslatorError> {
    let doc: RuleSetDocument = serde_json::from_str(source)?;
    read_document(&doc, ctx, meta)
}

pub fn read_document(
    doc: &RuleSetDocument,
    ctx: &mut ContextStack,
    meta: &mut RuleSetMetaInfo,
) -> Result<RuleSetParseInfo, TranslatorError> {
    if doc.version != "1.0" {
        return Err(TranslatorError::UnsupportedVersion(doc.version.clone()));
    }

    // struct definitions become expression-language type definitions
    let mut type_text = String::new();
    for type_define in &doc.type_defines {
        if RESERVED_TYPE_NAMES.contains(&type_define.name.as_str()) {
            return Err(TranslatorError::ReservedTypeName(type_define.name.clone()));
        }
        let mut body = String::new();
        let mut recorded = Vec::new();
        for member in &type_define.members {
            body.push_str(&format!(
                "{} {};",
                member.name,
                inner_type(&member.ty)?
            ));
            recorded.push((member.name.clone(), member.ty.clone()));
        }
        meta.type_defines
            .insert(type_define.name.clone(), recorded);
        type_text.push_str(&format!("type {} struct{{{body}}}\n", type_define.name));
    }

    // declare every variable, collect InitValue assignments and
    // intermediate-value expressions
    let mut init_text = String::from("{\n");
    let mut value_exprs: BTreeMap<String, String> = BTreeMap::new();

    let input_vars = declare_params(
        &doc.meta_info.inputs,
        ctx,
        meta,
        &mut init_text,
        &mut value_exprs,
    )?;
    meta.input_vars = input_vars;
    let cache_vars = declare_params(
        &doc.meta_info.caches,
        ctx,
        meta,
        &mut init_text,
        &mut value_exprs,
    )?;
    meta.cache_vars = cache_vars;
    let output_vars = declare_params(
        &doc.meta_info.outputs,
        ctx,
        meta,
        &mut init_text,
        &mut value_exprs,
    )?;
    meta.output_vars = output_vars;
    init_text.push('}');

    let pre_defines = compile_unit(
        &format!("{type_text}\n{PRE_DEFINES}"),
        ctx,
        "error in pre-defines",
    )?;
    let init = compile_unit(&init_text, ctx, "error in initial-value assignment")?;

    // intermediate values: extract dependencies, order them topologically
    let mut dependency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, expr_text) in &value_exprs {
        let stage = format!("error in intermediate value expression of \"{name}\"");
        let scratch = compile_unit(expr_text, ctx, &stage)?;
        let deps = ctx
            .global
            .real_funcs
            .get(&scratch)
            .map(|def| free_vars(&def.body))
            .unwrap_or_default();
        ctx.global.real_funcs.remove(&scratch);
        ctx.global.func_dependency.remove(&scratch);
        ctx.global.checked_funcs.remove(&scratch);
        if deps.contains(name) {
            return Err(TranslatorError::SelfDependency(name.clone()));
        }
        dependency.insert(name.clone(), deps);
    }
    for deps in dependency.values_mut() {
        deps.retain(|dep| value_exprs.contains_key(dep));
    }

    let sorted = topo_sort(dependency)?;
    log::debug!("intermediate evaluation order: {}", sorted.join(", "));

    let mut preprocess_text = String::from("{\n");
    for name in &sorted {
        if let Some(expr_text) = value_exprs.get(name) {
            preprocess_text.push_str(&format!("{name} = {expr_text};\n"));
        }
    }
    preprocess_text.push_str("0}");
    meta.preprocess_modified = sorted.into_iter().collect();
    let preprocess = compile_unit(
        &preprocess_text,
        ctx,
        "error in intermediate value assignment",
    )?;

    // sub-rule-sets: each becomes an if/else-if chain returning the index
    // of the winning atom, or -1
    let mut sub_rule_sets = Vec::new();
    for (id, sub) in doc.sub_rule_sets.iter().enumerate() {
        let mut modified = Vec::new();
        let mut text = String::from("{");
        for (index, rule) in sub.rules.iter().enumerate() {
            let mut atom_modified = BTreeSet::new();
            text.push_str(&format!("if({{\n{}\n}}){{\n", rule.condition.trim()));
            for consequence in &rule.consequences {
                match consequence {
                    Consequence::Assignment { target, value } => {
                        atom_modified.insert(base_name(target));
                        text.push_str(&format!(
                            "{} = {{{}}};\n",
                            target.trim(),
                            value.trim()
                        ));
                    }
                    Consequence::Operation {
                        target,
                        operation,
                        args,
                    } => {
                        atom_modified.insert(base_name(target));
                        let joined = args
                            .iter()
                            .map(|a| a.trim())
                            .collect::<Vec<_>>()
                            .join(", ");
                        text.push_str(&format!(
                            "{}.{}({joined});\n",
                            target.trim(),
                            operation.trim()
                        ));
                    }
                }
            }
            text.push_str(&format!("{index}\n}}else "));
            modified.push(atom_modified);
        }
        text.push_str("{-1}}");
        let stage = format!("error in sub-rule-set No.{id} (zero-based)");
        sub_rule_sets.push(compile_unit(&text, ctx, &stage)?);
        meta.sub_rule_modified.push(modified);
    }

    // validate every function body the document pulled in
    let unchecked: Vec<String> = ctx
        .global
        .real_funcs
        .keys()
        .filter(|name| !ctx.global.checked_funcs.contains(*name))
        .cloned()
        .collect();
    for name in unchecked {
        Analyzer::new(ctx)
            .check_function(&name)
            .map_err(|err| render_semantic("error in function definition", "", err))?;
    }

    Ok(RuleSetParseInfo {
        pre_defines,
        init,
        preprocess,
        sub_rule_sets,
    })
}

fn declare_params(
    params: &[ParamDoc],
    ctx: &mut ContextStack,
    meta: &mut RuleSetMetaInfo,
    init_text: &mut String,
    value_exprs: &mut BTreeMap<String, String>,
) -> Result<Vec<String>, TranslatorError> {
    let mut names = Vec::new();
    for param in params {
        if meta.var_types.contains_key(&param.name) {
            return Err(TranslatorError::DuplicateVariable(param.name.clone()));
        }
        meta.var_types
            .insert(param.name.clone(), param.ty.clone());
        names.push(param.name.clone());

        let inner = inner_type(&param.ty)?;
        let parsed = Parser::new(&inner)
            .and_then(|mut p| p.parse_type())
            .map_err(|err| render_parse("error in variable type", &inner, err))?;
        if let Some(frame) = ctx.scopes.first_mut() {
            frame.vars.insert(param.name.clone(), parsed);
        }

        if let Some(value) = &param.value {
            value_exprs.insert(param.name.clone(), format!("{{{}}}", value.trim()));
        }
        if let Some(init) = &param.init_value {
            let literal =
                normalize_init(init).ok_or_else(|| TranslatorError::BadInitValue {
                    var: param.name.clone(),
                    value: init.clone(),
                })?;
            init_text.push_str(&format!("{} = {{{literal}}};\n", param.name));
        }
    }
    Ok(names)
}

/// Kahn's algorithm over the intermediate dependency graph; the leftover
/// on a cycle names every participant
fn topo_sort(
    mut pending: BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, TranslatorError> {
    let mut sorted = Vec::new();
    loop {
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        if ready.is_empty() {
            break;
        }
        for name in ready {
            pending.remove(&name);
            for deps in pending.values_mut() {
                deps.remove(&name);
            }
            sorted.push(name);
        }
    }
    if !pending.is_empty() {
        let mut description = String::new();
        for (name, deps) in &pending {
            description.push_str(&format!(
                "    {name} -> {}\n",
                deps.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        return Err(TranslatorError::CyclicDependency(
            description.trim_end().to_string(),
        ));
    }
    Ok(sorted)
}

/// Run a synthesized source through the full lexer -> parser -> semantic
/// pipeline; returns the unnamed function's mangled name
fn compile_unit(
    source: &str,
    ctx: &mut ContextStack,
    stage: &str,
) -> Result<String, TranslatorError> {
    let mut parser =
        Parser::new(source).map_err(|err| render_parse(stage, source, err))?;
    let exprs = parser
        .parse_all()
        .map_err(|err| render_parse(stage, source, err))?;
    Analyzer::new(ctx)
        .add_unnamed_function(exprs)
        .map_err(|err| render_semantic(stage, source, err))
}

fn render_parse(stage: &str, source: &str, err: ParseError) -> TranslatorError {
    TranslatorError::Compile {
        stage: stage.to_string(),
        detail: err.to_diagnostic("<ruleset>", source).format(source),
    }
}

fn render_semantic(stage: &str, source: &str, err: SemanticError) -> TranslatorError {
    TranslatorError::Compile {
        stage: stage.to_string(),
        detail: err.to_diagnostic("<ruleset>", source).format(source),
    }
}

/// Translate a host-surface type name ("float64", "Vector3[]") into the
/// expression language's type syntax ("f64", "[]Vector3")
fn inner_type(doc_type: &str) -> Result<String, TranslatorError> {
    let mut base = doc_type.trim();
    let mut prefix = String::new();
    while let Some(stripped) = base.strip_suffix("[]") {
        prefix.push_str("[]");
        base = stripped;
    }
    if base == "type" || base.is_empty() || base.contains('[') || base.contains(']') {
        return Err(TranslatorError::InvalidTypeName(doc_type.to_string()));
    }
    if is_numeric_data(base) {
        Ok(format!("{prefix}f64"))
    } else {
        Ok(format!("{prefix}{base}"))
    }
}

/// Base variable written by a consequence target ("a.b[0].c" -> "a")
fn base_name(target: &str) -> String {
    let trimmed = target.trim();
    trimmed
        .split(|c| c == '.' || c == '[')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

fn normalize_init(value: &str) -> Option<String> {
    let trimmed = value.trim();
    match trimmed {
        "true" => Some("1.0".to_string()),
        "false" => Some("0.0".to_string()),
        _ => {
            if !trimmed.is_empty()
                && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
            {
                Some(trimmed.to_string())
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inner_type() {
        assert_eq!(inner_type("float64").ok().as_deref(), Some("f64"));
        assert_eq!(inner_type("bool").ok().as_deref(), Some("f64"));
        assert_eq!(inner_type("string").ok().as_deref(), Some("string"));
        assert_eq!(inner_type("Vector3[]").ok().as_deref(), Some("[]Vector3"));
        assert_eq!(inner_type("int32[][]").ok().as_deref(), Some("[][]f64"));
        assert!(inner_type("type").is_err());
        assert!(inner_type("bad]").is_err());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a.b.c"), "a");
        assert_eq!(base_name("arr[0]"), "arr");
        assert_eq!(base_name(" plain "), "plain");
    }

    #[test]
    fn test_normalize_init() {
        assert_eq!(normalize_init("true").as_deref(), Some("1.0"));
        assert_eq!(normalize_init("0.5").as_deref(), Some("0.5"));
        assert_eq!(normalize_init("1e3"), None);
        assert_eq!(normalize_init("-1"), None);
    }

    #[test]
    fn test_topo_sort_cycle_names_participants() {
        let mut graph = BTreeMap::new();
        graph.insert(
            "a".to_string(),
            ["b".to_string()].into_iter().collect::<BTreeSet<_>>(),
        );
        graph.insert(
            "b".to_string(),
            ["a".to_string()].into_iter().collect::<BTreeSet<_>>(),
        );
        graph.insert("c".to_string(), BTreeSet::new());
        match topo_sort(graph) {
            Err(TranslatorError::CyclicDependency(msg)) => {
                assert!(msg.contains('a') && msg.contains('b'));
                assert!(!msg.contains('c'));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }
}
