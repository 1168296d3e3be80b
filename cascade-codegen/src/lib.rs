//! Source-to-source back end: emits a standalone Rust project that mirrors
//! the interpreter's semantics, with the same value-map surface.

use cascade_compiler::ruleset::{read_source, RuleSetMetaInfo, RuleSetParseInfo, TranslatorError};
use cascade_compiler::ContextStack;
use std::path::Path;
use thiserror::Error;

mod expr;
mod project;

pub use expr::{rust_fn_name, rust_ident, rust_type, EmitEnv, ExprGen, IoAccess};

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error(transparent)]
    Translate(#[from] TranslatorError),
    #[error("{0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodegenError {
    /// User-facing rendering; translation failures keep their coded
    /// diagnostics
    pub fn report(&self) -> String {
        match self {
            CodegenError::Translate(err) => err.report(),
            other => other.to_string(),
        }
    }
}

/// Generates a Rust project from a rule-set document
pub struct Generator {
    ctx: ContextStack,
    meta: RuleSetMetaInfo,
    info: RuleSetParseInfo,
    package: String,
}

impl Generator {
    /// Translate the document and keep the checked context for emission
    pub fn build_from_source(source: &str, package: &str) -> Result<Self, CodegenError> {
        let mut ctx = ContextStack::new();
        let mut meta = RuleSetMetaInfo::default();
        let info = read_source(source, &mut ctx, &mut meta)?;
        Ok(Self {
            ctx,
            meta,
            info,
            package: package.to_string(),
        })
    }

    pub fn meta(&self) -> &RuleSetMetaInfo {
        &self.meta
    }

    /// Produce every project file as `(relative path, content)`
    pub fn generate(&self) -> Result<Vec<(String, String)>, CodegenError> {
        Ok(vec![
            ("Cargo.toml".to_string(), self.cargo_toml()),
            ("src/types.rs".to_string(), self.types_rs()?),
            ("src/funcs.rs".to_string(), self.funcs_rs()?),
            ("src/lib.rs".to_string(), self.lib_rs()?),
            ("src/main.rs".to_string(), self.main_rs()),
        ])
    }

    /// Write the generated project under a directory
    pub fn write_to(&self, dir: &Path) -> Result<(), CodegenError> {
        for (relative, content) in self.generate()? {
            let path = dir.join(&relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content)?;
            log::info!("generated {}", path.display());
        }
        Ok(())
    }

    pub(crate) fn ctx(&self) -> &ContextStack {
        &self.ctx
    }

    pub(crate) fn info(&self) -> &RuleSetParseInfo {
        &self.info
    }

    pub(crate) fn package(&self) -> &str {
        &self.package
    }
}
