// Error reporting for the cascade rule-engine compiler
// Renders spans, source snippets and suggestions for every pipeline stage

use colored::Colorize;
use std::fmt;

/// Source code location (line, column) resolved from a byte span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    /// Resolve a byte range against source text
    pub fn from_source(file: &str, source: &str, span: std::ops::Range<usize>) -> Self {
        let start = span.start.min(source.len());
        let before = &source[..start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

/// Structured diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Format the diagnostic with a source snippet
    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));
        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));
        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }
        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    /// Extract the offending source line with a ^^^ indicator
    fn source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();

        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }

        let line = lines.get(self.span.line - 1)?;
        let line_num_width = self.span.line.to_string().len().max(2);

        let mut snippet = String::new();
        snippet.push_str(&format!(" {}\n", " ".repeat(line_num_width + 1).cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));

        let padding = " ".repeat(line_num_width + 3 + self.span.column.saturating_sub(1));
        let underline = "^".repeat(self.span.length.max(1));
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(line_num_width + 1).cyan(),
            padding,
            underline.red().bold()
        ));

        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// Diagnostic collection for a single compile
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Print all diagnostics to stderr
    pub fn print_all(&self, source_code: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source_code));
        }
    }

    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "\n{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }
        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
    }
}

/// Error codes, grouped by pipeline stage
pub mod error_codes {
    // Lexing (E01xx)
    pub const ILLFORMED_TOKEN: &str = "E0101";
    pub const UNTERMINATED_STRING: &str = "E0102";
    pub const ILLEGAL_ESCAPE: &str = "E0103";
    pub const MALFORMED_NUMBER: &str = "E0104";

    // Parsing (E02xx)
    pub const UNEXPECTED_TOKEN: &str = "E0201";
    pub const UNEXPECTED_EOF: &str = "E0202";
    pub const ASSIGN_TO_ASSIGNMENT: &str = "E0203";
    pub const BAD_DESIGNATOR: &str = "E0204";
    pub const BAD_TYPE_SYNTAX: &str = "E0205";

    // Semantic analysis (E03xx)
    pub const UNDEFINED_NAME: &str = "E0301";
    pub const TYPE_MISMATCH: &str = "E0302";
    pub const ARITY_MISMATCH: &str = "E0303";
    pub const AMBIGUOUS_DISPATCH: &str = "E0304";
    pub const INVALID_LVALUE: &str = "E0305";
    pub const UNSUPPORTED_OPERATOR: &str = "E0306";
    pub const REDEFINITION: &str = "E0307";
    pub const UNDEFINED_TYPE: &str = "E0308";
    pub const UNSUPPORTED_CONSTRUCT: &str = "E0309";

    // Rule-set translation (E04xx)
    pub const BAD_DOCUMENT: &str = "E0400";
    pub const BAD_INIT_VALUE: &str = "E0401";
    pub const UNKNOWN_CONSEQUENCE: &str = "E0402";
    pub const RESERVED_TYPE_NAME: &str = "E0403";
    pub const CYCLIC_INTERMEDIATES: &str = "E0404";
    pub const DUPLICATE_VARIABLE: &str = "E0405";
    pub const UNSUPPORTED_VERSION: &str = "E0406";

    // Runtime (E05xx)
    pub const VALUE_SHAPE_MISMATCH: &str = "E0501";
    pub const MISSING_INPUT: &str = "E0502";
    pub const CALL_DEPTH_EXCEEDED: &str = "E0503";
    pub const UNSUPPORTED_OPERATION: &str = "E0504";

    // Host binding (E06xx)
    pub const RULESET_NOT_FOUND: &str = "E0601";
    pub const BAD_PLUGIN_STATE: &str = "E0602";
}

/// Fuzzy matching for "did you mean?" suggestions
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Return up to `max_suggestions` candidates with similarity above threshold
    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_from_source() {
        let source = "a = 1\nb = sin(a\n";
        let span = Span::from_source("rule.csd", source, 10..13);
        assert_eq!(span.line, 2);
        assert_eq!(span.column, 5);
        assert_eq!(span.length, 3);
    }

    #[test]
    fn test_diagnostic_format() {
        let source = "y = unknwn + 1\n";
        let span = Span::from_source("rule.csd", source, 4..10);
        let diag = Diagnostic::error(
            error_codes::UNDEFINED_NAME,
            "variable `unknwn` not defined".to_string(),
            span,
        )
        .with_help("did you mean `unknown`?".to_string());

        let formatted = diag.format(source);
        assert!(formatted.contains("E0301"));
        assert!(formatted.contains("unknwn"));
        assert!(formatted.contains("rule.csd:1:5"));
    }

    #[test]
    fn test_fuzzy_suggestions() {
        let candidates = vec![
            "altitude".to_string(),
            "attitude".to_string(),
            "throttle".to_string(),
        ];
        let found = fuzzy::find_similar_names("altitudo", &candidates, 0.7, 2);
        assert_eq!(found.first().map(String::as_str), Some("altitude"));
    }
}
