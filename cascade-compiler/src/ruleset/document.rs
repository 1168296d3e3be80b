//! Structural rule-set document. The on-wire syntax is JSON here; any
//! equivalent structural input can be mapped onto these types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Host-surface scalar type names accepted in documents
pub const BASE_DATA: &[&str] = &[
    "bool", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float32",
    "float64", "float128", "string",
];

/// Host-surface numeric type names; these all widen to `f64`
pub const BASE_NUMERICAL_DATA: &[&str] = &[
    "bool", "int8", "uint8", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float32",
    "float64", "float128",
];

pub fn is_base_data(name: &str) -> bool {
    BASE_DATA.contains(&name)
}

pub fn is_numeric_data(name: &str) -> bool {
    BASE_NUMERICAL_DATA.contains(&name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleSetDocument {
    #[serde(default = "RuleSetDocument::default_version")]
    pub version: String,
    #[serde(default)]
    pub type_defines: Vec<TypeDefine>,
    pub meta_info: MetaInfo,
    #[serde(default)]
    pub sub_rule_sets: Vec<SubRuleSetDoc>,
}

impl RuleSetDocument {
    fn default_version() -> String {
        "1.0".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeDefine {
    pub name: String,
    #[serde(default)]
    pub members: Vec<TypeMember>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeMember {
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetaInfo {
    #[serde(default)]
    pub inputs: Vec<ParamDoc>,
    #[serde(default)]
    pub caches: Vec<ParamDoc>,
    #[serde(default)]
    pub outputs: Vec<ParamDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParamDoc {
    pub name: String,
    #[serde(rename = "Type")]
    pub ty: String,
    /// Literal initial value: a decimal literal or `true`/`false`
    #[serde(default)]
    pub init_value: Option<String>,
    /// Intermediate-value expression re-evaluated each tick
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubRuleSetDoc {
    #[serde(default)]
    pub rules: Vec<RuleDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RuleDoc {
    pub condition: String,
    #[serde(default)]
    pub consequences: Vec<Consequence>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Consequence {
    #[serde(rename_all = "PascalCase")]
    Assignment { target: String, value: String },
    #[serde(rename_all = "PascalCase")]
    Operation {
        target: String,
        operation: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Meta information collected while translating a document: variable
/// groups, declared host types, type definitions, and the per-atom sets of
/// written variable base names that drive write-back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetMetaInfo {
    pub input_vars: Vec<String>,
    pub cache_vars: Vec<String>,
    pub output_vars: Vec<String>,
    /// variable name -> declared host-surface type (e.g. "float64", "T[]")
    pub var_types: HashMap<String, String>,
    /// type name -> ordered (member name, host-surface member type)
    pub type_defines: HashMap<String, Vec<(String, String)>>,
    /// intermediate variables written by the per-tick preprocess
    pub preprocess_modified: BTreeSet<String>,
    /// per sub-rule-set, per atom: variable base names written
    pub sub_rule_modified: Vec<Vec<BTreeSet<String>>>,
}

impl RuleSetMetaInfo {
    pub fn is_array_type(type_name: &str) -> bool {
        type_name.ends_with("[]")
    }

    pub fn element_type(type_name: &str) -> &str {
        type_name.strip_suffix("[]").unwrap_or(type_name)
    }

    pub fn declared_type(&self, var: &str) -> Option<&str> {
        self.var_types.get(var).map(String::as_str)
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.input_vars.iter().any(|v| v == name)
    }

    pub fn is_cache(&self, name: &str) -> bool {
        self.cache_vars.iter().any(|v| v == name)
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.output_vars.iter().any(|v| v == name)
    }
}
