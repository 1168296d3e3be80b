// Parser for the cascade expression language

use crate::ParseError;
use cascade_ast::Expr;
use cascade_diagnostics::error_codes;
use cascade_lexer::{Guidance, Token, TokenKind, TokenStream};

mod defs;
mod expressions;
pub mod operators;
mod types;

pub struct Parser<'src> {
    pub(crate) stream: TokenStream<'src>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Result<Self, ParseError> {
        Ok(Self {
            stream: TokenStream::new(source)?,
        })
    }

    /// Parse every top-level expression in the source. Definitions eat
    /// their own trailing break, so no separator is demanded between
    /// top-level expressions.
    pub fn parse_all(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();
        loop {
            self.stream.eat_breaks();
            if self.stream.is_end() {
                break;
            }
            exprs.push(self.parse_expr(false)?);
            if self.stream.kind() == TokenKind::Endline {
                self.stream.pop(Guidance::None);
            }
        }
        Ok(exprs)
    }

    /// Line-start offsets of the underlying stream, for diagnostics
    pub fn line_starts(&self) -> &[usize] {
        self.stream.line_starts()
    }

    // ==================== Helper methods ====================

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        let code = if self.stream.is_end() {
            error_codes::UNEXPECTED_EOF
        } else {
            error_codes::UNEXPECTED_TOKEN
        };
        self.error_code(code, message)
    }

    pub(crate) fn error_code(
        &self,
        code: &'static str,
        message: impl Into<String>,
    ) -> ParseError {
        let offset = self.stream.offset();
        let end = self
            .stream
            .top()
            .map_or(offset, |lexeme| lexeme.span.end);
        ParseError::Syntax {
            span: offset..end.max(offset),
            message: message.into(),
            code,
        }
    }

    pub(crate) fn check(&self, token: &Token) -> bool {
        self.stream.is(token)
    }

    /// Consume the expected token or fail with a cause
    pub(crate) fn consume(
        &mut self,
        token: &Token,
        guidance: Guidance,
        message: &str,
    ) -> Result<(), ParseError> {
        if self.stream.is(token) {
            self.stream.pop(guidance);
            Ok(())
        } else {
            Err(self.error(format!(
                "{message}, found: \"{}\"",
                self.display_current()
            )))
        }
    }

    /// Consume an identifier and return its name
    pub(crate) fn consume_ident(
        &mut self,
        guidance: Guidance,
        message: &str,
    ) -> Result<String, ParseError> {
        match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Ident(name)) => {
                self.stream.pop(guidance);
                Ok(name)
            }
            _ => Err(self.error(format!(
                "{message}, found: \"{}\"",
                self.display_current()
            ))),
        }
    }

    pub(crate) fn eat_breaks(&mut self) {
        self.stream.eat_breaks();
    }

    pub(crate) fn display_current(&self) -> String {
        match self.stream.kind() {
            TokenKind::End => "end of input".to_string(),
            TokenKind::Endline => "end of line".to_string(),
            _ => self.stream.text().to_string(),
        }
    }
}
