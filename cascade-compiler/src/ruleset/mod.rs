//! Rule-set front end: the structural document schema and the translator
//! that lowers a document into checked expression-language functions.

mod document;
mod translator;

pub use document::{
    is_base_data, is_numeric_data, Consequence, MetaInfo, ParamDoc, RuleDoc, RuleSetDocument,
    RuleSetMetaInfo, SubRuleSetDoc, TypeDefine, TypeMember,
};
pub use translator::{read_document, read_source, RuleSetParseInfo, TranslatorError, PRE_DEFINES};
