use cascade_ast::Span;
use cascade_diagnostics::{Diagnostic, Span as DiagSpan};
use thiserror::Error;

/// Analyzer-level failure: an error code, the cause, the offending node's
/// span, the stack of enclosing AST nodes at the moment of failure, and an
/// optional "did you mean" suggestion
#[derive(Debug, Error)]
#[error("Semantic Check error: {message}")]
pub struct SemanticError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
    /// Outermost-first `(node description, span)` pairs
    pub stack: Vec<(&'static str, Span)>,
    pub help: Option<String>,
}

impl SemanticError {
    pub fn to_diagnostic(&self, file: &str, source: &str) -> Diagnostic {
        let mut diagnostic = Diagnostic::error(
            self.code,
            self.message.clone(),
            DiagSpan::from_source(file, source, self.span.clone()),
        );
        for (description, span) in self.stack.iter().rev() {
            let at = DiagSpan::from_source(file, source, span.clone());
            diagnostic = diagnostic.with_note(format!(
                "while checking {description} at {}:{}",
                at.line, at.column
            ));
        }
        if let Some(help) = &self.help {
            diagnostic = diagnostic.with_help(help.clone());
        }
        diagnostic
    }
}
