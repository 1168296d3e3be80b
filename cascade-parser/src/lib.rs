use cascade_diagnostics::{error_codes, Diagnostic, Span as DiagSpan};
use thiserror::Error;

mod parser;
pub use parser::operators;
pub use parser::Parser;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at offset {}: {message}", .span.start)]
    Syntax {
        span: std::ops::Range<usize>,
        message: String,
        code: &'static str,
    },
    #[error("Lex error: {0}")]
    Lexer(#[from] cascade_lexer::LexError),
}

impl ParseError {
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            ParseError::Syntax { span, .. } => span.clone(),
            ParseError::Lexer(err) => err.span(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ParseError::Syntax { code, .. } => code,
            ParseError::Lexer(err) => {
                use cascade_lexer::LexError::*;
                match err {
                    UnterminatedString { .. } => error_codes::UNTERMINATED_STRING,
                    IllegalEscape { .. } => error_codes::ILLEGAL_ESCAPE,
                    MalformedNumber { .. } => error_codes::MALFORMED_NUMBER,
                    InvalidToken { .. } => error_codes::ILLFORMED_TOKEN,
                }
            }
        }
    }

    pub fn to_diagnostic(&self, file: &str, source: &str) -> Diagnostic {
        let span = DiagSpan::from_source(file, source, self.span());
        let message = match self {
            ParseError::Syntax { message, .. } => message.clone(),
            ParseError::Lexer(err) => err.to_string(),
        };
        Diagnostic::error(self.code(), message, span)
    }
}
