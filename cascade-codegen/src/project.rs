//! Assembly of the generated project: interface structs with value-map
//! (de)serialization, the function library, the rule-set driver with one
//! snapshot struct per sub-rule-set, and the crate skeleton.

use crate::expr::{rust_fn_name, rust_ident, rust_type, EmitEnv, ExprGen, IoAccess};
use crate::{CodegenError, Generator};
use cascade_ast::Expr;
use cascade_ast::ExprKind;
use cascade_compiler::ruleset::is_numeric_data;

/// Rust type for a host-surface type name
fn rust_host_type(host: &str) -> String {
    if let Some(elem) = host.strip_suffix("[]") {
        return format!("Vec<{}>", rust_host_type(elem));
    }
    if is_numeric_data(host) {
        "f64".to_string()
    } else if host == "string" {
        "String".to_string()
    } else {
        rust_ident(host)
    }
}

/// Expression reading `access` (a `&serde_json::Value`) as a host type
fn read_expr(host: &str, access: &str) -> String {
    if let Some(elem) = host.strip_suffix("[]") {
        let inner = read_expr(elem, "item");
        return format!(
            "{access}.as_array().map(|items| items.iter().map(|item| {inner}).collect()).unwrap_or_default()"
        );
    }
    if is_numeric_data(host) {
        format!("num({access})")
    } else if host == "string" {
        format!("{access}.as_str().unwrap_or_default().to_string()")
    } else {
        format!(
            "{access}.as_object().map({}::from_value_map).unwrap_or_default()",
            rust_ident(host)
        )
    }
}

/// Expression serializing `access` back to a value, narrowed to `host`
fn write_expr(host: &str, access: &str) -> String {
    if let Some(elem) = host.strip_suffix("[]") {
        let inner = write_expr(elem, "item");
        return format!(
            "serde_json::Value::Array({access}.iter().map(|item| {inner}).collect())"
        );
    }
    match host {
        "bool" => format!("serde_json::Value::Bool(({access}.clone()) != 0.0)"),
        "int8" => format!("serde_json::json!(({access}.clone()) as i8)"),
        "uint8" => format!("serde_json::json!(({access}.clone()) as u8)"),
        "int16" => format!("serde_json::json!(({access}.clone()) as i16)"),
        "uint16" => format!("serde_json::json!(({access}.clone()) as u16)"),
        "int32" => format!("serde_json::json!(({access}.clone()) as i32)"),
        "uint32" => format!("serde_json::json!(({access}.clone()) as u32)"),
        "int64" => format!("serde_json::json!(({access}.clone()) as i64)"),
        "uint64" => format!("serde_json::json!(({access}.clone()) as u64)"),
        "float32" | "float64" | "float128" => {
            format!("serde_json::json!({access}.clone())")
        }
        "string" => format!("serde_json::Value::String({access}.clone())"),
        _ => format!("{access}.to_value_map()"),
    }
}

fn emit_struct(name: &str, fields: &[(String, String)]) -> String {
    let mut out = String::new();
    out.push_str("#[derive(Debug, Clone, Default, PartialEq)]\n");
    out.push_str(&format!("pub struct {} {{\n", rust_ident(name)));
    for (field, host) in fields {
        out.push_str(&format!(
            "    pub {}: {},\n",
            rust_ident(field),
            rust_host_type(host)
        ));
    }
    out.push_str("}\n\n");

    out.push_str(&format!("impl {} {{\n", rust_ident(name)));
    out.push_str(
        "    pub fn from_value_map(map: &serde_json::Map<String, serde_json::Value>) -> Self {\n",
    );
    out.push_str("        let mut value = Self::default();\n");
    out.push_str("        value.apply_value_map(map);\n");
    out.push_str("        value\n    }\n\n");
    out.push_str(
        "    pub fn apply_value_map(&mut self, map: &serde_json::Map<String, serde_json::Value>) {\n",
    );
    for (field, host) in fields {
        out.push_str(&format!(
            "        if let Some(value) = map.get({field:?}) {{ self.{} = {}; }}\n",
            rust_ident(field),
            read_expr(host, "value")
        ));
    }
    out.push_str("    }\n\n");
    out.push_str("    pub fn to_value_map(&self) -> serde_json::Value {\n");
    out.push_str("        let mut map = serde_json::Map::new();\n");
    for (field, host) in fields {
        out.push_str(&format!(
            "        map.insert({field:?}.to_string(), {});\n",
            write_expr(host, &format!("self.{}", rust_ident(field)))
        ));
    }
    out.push_str("        map.into()\n    }\n}\n\n");
    out
}

impl Generator {
    pub(crate) fn cargo_toml(&self) -> String {
        format!(
            "[package]\nname = \"{}\"\nversion = \"0.1.0\"\nedition = \"2021\"\n\n\
             [dependencies]\nserde_json = \"1.0\"\n",
            self.package()
        )
    }

    pub(crate) fn types_rs(&self) -> Result<String, CodegenError> {
        let meta = self.meta();
        let mut out = String::new();
        out.push_str("// Generated by cascade-codegen. Do not edit.\n\n");
        out.push_str("fn num(value: &serde_json::Value) -> f64 {\n");
        out.push_str("    match value {\n");
        out.push_str("        serde_json::Value::Bool(b) => (*b) as i64 as f64,\n");
        out.push_str("        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),\n");
        out.push_str("        _ => 0.0,\n    }\n}\n\n");

        let mut type_names: Vec<&String> = meta.type_defines.keys().collect();
        type_names.sort();
        for name in type_names {
            if let Some(members) = meta.type_defines.get(name) {
                out.push_str(&emit_struct(name, members));
            }
        }

        for (name, vars) in [
            ("Input", &meta.input_vars),
            ("Output", &meta.output_vars),
            ("Cache", &meta.cache_vars),
        ] {
            let fields: Vec<(String, String)> = vars
                .iter()
                .filter_map(|v| {
                    meta.declared_type(v)
                        .map(|t| (v.clone(), t.to_string()))
                })
                .collect();
            out.push_str(&emit_struct(name, &fields));
        }
        Ok(out)
    }

    pub(crate) fn funcs_rs(&self) -> Result<String, CodegenError> {
        let mut out = String::new();
        out.push_str("// Generated by cascade-codegen. Do not edit.\n\n");
        out.push_str("#![allow(clippy::all)]\n\n");
        out.push_str("use crate::funcs;\nuse crate::types;\n\n");
        out.push_str(EXTERN_FUNCS);

        let excluded: Vec<&String> = {
            let info = self.info();
            let mut names = vec![&info.pre_defines, &info.init, &info.preprocess];
            names.extend(info.sub_rule_sets.iter());
            names
        };
        let mut mangled: Vec<&String> = self
            .ctx()
            .global
            .real_funcs
            .keys()
            .filter(|name| !excluded.contains(name))
            .collect();
        mangled.sort();

        for name in mangled {
            let Some(def) = self.ctx().global.real_funcs.get(name) else {
                continue;
            };
            let mut params = Vec::new();
            for param in &def.params {
                params.push(format!(
                    "{}: {}",
                    rust_ident(&param.name),
                    rust_type(&param.ty)?
                ));
            }
            let ret = def.return_type();
            let gen = ExprGen::new(EmitEnv {
                meta: self.meta(),
                io: None,
            });
            let (arrow, body) = if ret == cascade_ast::Type::Nothing {
                (String::new(), gen.stmt(&def.body)?)
            } else {
                (format!(" -> {}", rust_type(&ret)?), gen.expr(&def.body)?)
            };
            out.push_str(&format!(
                "pub fn {}({}){arrow} {{ {body} }}\n\n",
                rust_fn_name(name),
                params.join(", ")
            ));
        }
        Ok(out)
    }

    pub(crate) fn lib_rs(&self) -> Result<String, CodegenError> {
        let meta = self.meta();
        let mut out = String::new();
        out.push_str("// Generated by cascade-codegen. Do not edit.\n");
        out.push_str(
            "#![allow(unused_parens, unused_mut, unused_variables, unused_imports, dead_code, clippy::all)]\n\n",
        );
        out.push_str("pub mod funcs;\npub mod types;\n\n");
        out.push_str("use types::{Cache, Input, Output};\n\n");

        // the driver
        out.push_str("#[derive(Debug, Default)]\npub struct RuleSet {\n");
        out.push_str("    pub input: Input,\n    pub output: Output,\n    pub cache: Cache,\n");
        out.push_str("    out_map: serde_json::Value,\n    hit_rules: Vec<i64>,\n");
        for i in 0..self.info().sub_rule_sets.len() {
            out.push_str(&format!("    sub_rule_set_{i}: SubRuleSet{i},\n"));
        }
        out.push_str("}\n\n");

        out.push_str("impl RuleSet {\n");
        out.push_str("    pub fn new() -> Self {\n        Self::default()\n    }\n\n");

        // init: default instances are the field defaults; InitValue
        // assignments run once here
        let driver_env = || EmitEnv {
            meta,
            io: Some(IoAccess {
                input: "self.input".to_string(),
                output: "self.output".to_string(),
                cache_direct: Some("self.cache".to_string()),
            }),
        };
        out.push_str("    pub fn init(&mut self) {\n");
        out.push_str(&self.driver_statements(&self.info().init, driver_env())?);
        out.push_str("    }\n\n");

        out.push_str(
            "    pub fn set_input(&mut self, map: &serde_json::Map<String, serde_json::Value>) {\n",
        );
        out.push_str("        self.input.apply_value_map(map);\n    }\n\n");

        out.push_str("    pub fn get_output(&mut self) -> &serde_json::Value {\n");
        out.push_str("        self.out_map = self.output.to_value_map();\n");
        out.push_str("        &self.out_map\n    }\n\n");

        out.push_str("    pub fn hit_rules(&self) -> &[i64] {\n        &self.hit_rules\n    }\n\n");

        out.push_str("    pub fn tick(&mut self) {\n");
        out.push_str(&self.driver_statements(&self.info().preprocess, driver_env())?);
        out.push_str("        self.hit_rules.clear();\n");
        for i in 0..self.info().sub_rule_sets.len() {
            out.push_str(&format!(
                "        let hit_{i} = self.sub_rule_set_{i}.tick(&self.input, &mut self.output, &self.cache);\n\
                 \x20       self.hit_rules.push(hit_{i});\n"
            ));
        }
        for i in 0..self.info().sub_rule_sets.len() {
            out.push_str(&format!(
                "        self.sub_rule_set_{i}.write_back(hit_{i}, &mut self.cache);\n"
            ));
        }
        out.push_str("    }\n}\n\n");

        // one snapshot struct per sub-rule-set
        for (i, name) in self.info().sub_rule_sets.iter().enumerate() {
            out.push_str(&self.sub_rule_set_struct(i, name)?);
        }
        Ok(out)
    }

    /// Emit a driver-mode function body (init or preprocess) as statements
    fn driver_statements(&self, name: &str, env: EmitEnv) -> Result<String, CodegenError> {
        let Some(def) = self.ctx().global.real_funcs.get(name) else {
            return Ok(String::new());
        };
        let gen = ExprGen::new(env);
        let mut out = String::new();
        match &def.body.kind {
            ExprKind::Block(exprs) => {
                for sub in exprs {
                    // the synthesized trailing literal is not a statement
                    if matches!(sub.kind, ExprKind::Literal(_)) {
                        continue;
                    }
                    out.push_str("        ");
                    out.push_str(&gen.stmt(sub)?);
                    out.push('\n');
                }
            }
            ExprKind::Literal(_) => {}
            _ => {
                out.push_str("        ");
                out.push_str(&gen.stmt(&def.body)?);
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn sub_rule_set_struct(&self, index: usize, name: &str) -> Result<String, CodegenError> {
        let meta = self.meta();
        let body: &Expr = self
            .ctx()
            .global
            .real_funcs
            .get(name)
            .map(|def| def.body.as_ref())
            .ok_or_else(|| {
                CodegenError::Unsupported(format!("missing sub-rule-set function \"{name}\""))
            })?;

        let mut out = String::new();
        out.push_str(&format!(
            "#[derive(Debug, Default)]\nstruct SubRuleSet{index} {{\n    cache: Cache,\n"
        ));
        for var in &meta.cache_vars {
            out.push_str(&format!("    loaded_{var}: bool,\n"));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl SubRuleSet{index} {{\n"));
        for var in &meta.cache_vars {
            out.push_str(&format!(
                "    fn load_{var}(&mut self, base: &Cache) {{\n\
                 \x20       if !self.loaded_{var} {{\n\
                 \x20           self.cache.{} = base.{}.clone();\n\
                 \x20           self.loaded_{var} = true;\n\
                 \x20       }}\n    }}\n\n",
                rust_ident(var),
                rust_ident(var)
            ));
        }

        let gen = ExprGen::new(EmitEnv {
            meta,
            io: Some(IoAccess {
                input: "input".to_string(),
                output: "output".to_string(),
                cache_direct: None,
            }),
        });
        out.push_str(
            "    fn tick(&mut self, input: &Input, output: &mut Output, cache: &Cache) -> i64 {\n",
        );
        out.push_str(&format!("        ({}) as i64\n    }}\n\n", gen.expr(body)?));

        // write-back switches on the winning atom's modified set
        out.push_str("    fn write_back(&mut self, hit: i64, cache: &mut Cache) {\n");
        out.push_str("        match hit {\n");
        if let Some(atoms) = meta.sub_rule_modified.get(index) {
            for (atom, modified) in atoms.iter().enumerate() {
                let cached: Vec<&String> = modified
                    .iter()
                    .filter(|name| meta.is_cache(name))
                    .collect();
                if cached.is_empty() {
                    continue;
                }
                out.push_str(&format!("            {atom} => {{\n"));
                for var in cached {
                    out.push_str(&format!(
                        "                cache.{} = self.cache.{}.clone();\n",
                        rust_ident(var),
                        rust_ident(var)
                    ));
                }
                out.push_str("            }\n");
            }
        }
        out.push_str("            _ => {}\n        }\n");
        for var in &meta.cache_vars {
            out.push_str(&format!("        self.loaded_{var} = false;\n"));
        }
        out.push_str("    }\n}\n\n");
        Ok(out)
    }

    pub(crate) fn main_rs(&self) -> String {
        let lib = self.package().replace('-', "_");
        format!(
            r#"// Generated by cascade-codegen. Do not edit.
// Feeds the rule set one JSON input map per stdin line and prints the
// output map after each tick.

use {lib}::RuleSet;
use std::io::BufRead;

fn main() {{
    let mut rule_set = RuleSet::new();
    rule_set.init();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {{
        let Ok(line) = line else {{ break; }};
        if line.trim().is_empty() {{
            continue;
        }}
        match serde_json::from_str::<serde_json::Value>(&line) {{
            Ok(serde_json::Value::Object(map)) => {{
                rule_set.set_input(&map);
                rule_set.tick();
                println!("{{}}", rule_set.get_output());
            }}
            _ => eprintln!("expected a JSON object per line"),
        }}
    }}
}}
"#
        )
    }
}

const EXTERN_FUNCS: &str = r#"pub fn sin(a: f64) -> f64 { a.sin() }
pub fn cos(a: f64) -> f64 { a.cos() }
pub fn tan(a: f64) -> f64 { a.tan() }
pub fn cot(a: f64) -> f64 { 1.0 / a.tan() }
pub fn atan(a: f64) -> f64 { a.atan() }
pub fn asin(a: f64) -> f64 { a.asin() }
pub fn acos(a: f64) -> f64 { a.acos() }
pub fn fabs(a: f64) -> f64 { a.abs() }
pub fn exp(a: f64) -> f64 { a.exp() }
pub fn log(a: f64) -> f64 { a.ln() }
pub fn floor(a: f64) -> f64 { a.floor() }
pub fn sqrt(a: f64) -> f64 { a.sqrt() }
pub fn pow(a: f64, b: f64) -> f64 { a.powf(b) }
pub fn atan2(a: f64, b: f64) -> f64 { a.atan2(b) }
pub fn str_equal(a: String, b: String) -> f64 { (a == b) as i64 as f64 }

"#;
