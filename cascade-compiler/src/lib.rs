pub mod context;
pub mod error;
pub mod ruleset;
pub mod semantic;
pub mod template;

pub use context::{ContextGlobal, ContextStack, Frame, TemplateFunction, RESERVED_PREFIX};
pub use error::SemanticError;
pub use ruleset::{
    read_document, read_source, RuleSetDocument, RuleSetMetaInfo, RuleSetParseInfo,
    TranslatorError,
};
pub use semantic::Analyzer;
