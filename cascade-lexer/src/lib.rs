use logos::Logos;

/// Decode the escape sequences of a string literal body.
/// Recognized escapes: \n \r \t \0 \xHH \" \\; any other escaped
/// character passes through unchanged. A `\x` without two hex digits
/// rejects the literal.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('x') => {
                    let hi = chars.next().and_then(|c| c.to_digit(16))?;
                    let lo = chars.next().and_then(|c| c.to_digit(16))?;
                    result.push(char::from((hi * 16 + lo) as u8));
                }
                Some(c) => result.push(c),
                None => return None,
            }
        } else {
            result.push(ch);
        }
    }

    Some(result)
}

/// Parse a real literal, tolerating a bare `.` before the exponent ("1.e-3")
fn parse_real(s: &str) -> Option<f64> {
    if let Ok(v) = s.parse() {
        return Some(v);
    }
    if let Some(pos) = s.find('e') {
        let (mantissa, exponent) = s.split_at(pos);
        if mantissa.ends_with('.') {
            return format!("{mantissa}0{exponent}").parse().ok();
        }
    }
    None
}

/// Token types for the cascade expression language
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token {
    // Keywords
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("until")]
    Until,
    #[token("func")]
    Func,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("class")]
    Class,
    #[token("dynamic")]
    Dynamic,
    #[token("extern")]
    Extern,
    #[token("return")]
    Return,
    #[token("import")]
    Import,
    #[token("export")]
    Export,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,
    #[token("xor")]
    Xor,
    #[token("continue")]
    Continue,
    #[token("auto")]
    Auto,
    #[token("as")]
    As,

    // Multi-character symbols (longest match wins)
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token(">=")]
    GtEq,
    #[token("<=")]
    LtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("->")]
    Arrow,
    #[token("..")]
    DotDot,
    #[token(">>")]
    Shr,
    #[token("<<")]
    Shl,
    #[token("<<-")]
    ShlAssign,
    #[token(":=")]
    Walrus,

    // Single-character symbols
    #[token("=")]
    Assign,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("?")]
    Question,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    // Line breaks; the stream coalesces runs of these into one Endline
    #[token(";")]
    Semicolon,
    #[token("\n")]
    Newline,

    // Literals. Integers and booleans are f64 values in this language,
    // so every numeric literal decodes to f64.
    // The low-priority catch-all rejects digit runs with trailing garbage.
    #[regex(r"0x[0-9a-fA-F]+", priority = 3, callback = |lex| u64::from_str_radix(&lex.slice()[2..], 16).ok().map(|v| v as f64))]
    #[regex(r"0b[01]+", priority = 3, callback = |lex| u64::from_str_radix(&lex.slice()[2..], 2).ok().map(|v| v as f64))]
    #[regex(r"0|[1-9][0-9]*", priority = 3, callback = |lex| lex.slice().parse().ok())]
    #[regex(r"[0-9][0-9a-zA-Z_.]*", priority = 2, callback = |_| None::<f64>)]
    Int(f64),

    #[regex(r"(?:0|[1-9][0-9]*)(?:\.[0-9]*(?:e-?[1-9][0-9]*)?|e-?[1-9][0-9]*)", priority = 3, callback = |lex| parse_real(lex.slice()))]
    Real(f64),

    #[regex(r#""(?:[^"\\\n]|\\[^\n])*""#, callback = |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1])
    })]
    Str(String),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", callback = |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    /// Operator spelling for symbol tokens, used by the precedence table
    /// and the symbolic overload registry
    pub fn op_text(&self) -> Option<&'static str> {
        Some(match self {
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::GtEq => ">=",
            Token::LtEq => "<=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Arrow => "->",
            Token::DotDot => "..",
            Token::Shr => ">>",
            Token::Shl => "<<",
            Token::ShlAssign => "<<-",
            Token::Walrus => ":=",
            Token::Assign => "=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Bang => "!",
            Token::Amp => "&",
            Token::Pipe => "|",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Question => "?",
            Token::Colon => ":",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Xor => "xor",
            _ => return None,
        })
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Int(_) => TokenKind::Int,
            Token::Real(_) => TokenKind::Real,
            Token::Str(_) => TokenKind::Str,
            Token::Ident(_) => TokenKind::Ident,
            Token::Newline | Token::Semicolon => TokenKind::Endline,
            _ => TokenKind::Symbol,
        }
    }
}

/// Coarse token classification: keywords and operators are both Symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Int,
    Real,
    Str,
    Ident,
    Symbol,
    Endline,
    End,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Int => "integer literal",
            TokenKind::Real => "real literal",
            TokenKind::Str => "string literal",
            TokenKind::Ident => "identifier",
            TokenKind::Symbol => "symbol",
            TokenKind::Endline => "end of line",
            TokenKind::End => "end of input",
        };
        write!(f, "{name}")
    }
}

/// A token with its byte span in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: std::ops::Range<usize>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal at offset {}", .span.start)]
    UnterminatedString { span: std::ops::Range<usize> },
    #[error("illegal escape sequence in string literal at offset {}", .span.start)]
    IllegalEscape { span: std::ops::Range<usize> },
    #[error("malformed numeric literal at offset {}", .span.start)]
    MalformedNumber { span: std::ops::Range<usize> },
    #[error("unrecognized token at offset {}", .span.start)]
    InvalidToken { span: std::ops::Range<usize> },
}

impl LexError {
    pub fn span(&self) -> std::ops::Range<usize> {
        match self {
            LexError::UnterminatedString { span }
            | LexError::IllegalEscape { span }
            | LexError::MalformedNumber { span }
            | LexError::InvalidToken { span } => span.clone(),
        }
    }
}

/// Classify a raw logos error by inspecting the offending source text
fn classify_error(source: &str, span: std::ops::Range<usize>) -> LexError {
    let rest = &source[span.start.min(source.len())..];
    let first = rest.chars().next().unwrap_or('\0');
    if first == '"' {
        // a string literal failed to match: either it never closes on this
        // line, or an escape inside it is illegal
        let body = &rest[1..];
        let mut escaped = false;
        for c in body.chars() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => return LexError::IllegalEscape { span },
                '\n' => break,
                _ => {}
            }
        }
        LexError::UnterminatedString { span }
    } else if first.is_ascii_digit() {
        LexError::MalformedNumber { span }
    } else {
        LexError::InvalidToken { span }
    }
}

/// Controls how `TokenStream::pop` treats line breaks while advancing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// Line breaks surface as a single Endline lexeme
    None,
    /// Line breaks are silently skipped
    IgnoreBreak,
}

/// Buffered token stream with single-lexeme lookahead semantics.
///
/// `top()` peeks the current lexeme, `pop(guidance)` consumes it and
/// advances; with `Guidance::IgnoreBreak` any following line breaks are
/// skipped, otherwise adjacent breaks coalesce into one Endline. The stream
/// records every line-start offset for diagnostics.
#[derive(Debug)]
pub struct TokenStream<'src> {
    source: &'src str,
    lexemes: Vec<Lexeme>,
    pos: usize,
    line_starts: Vec<usize>,
}

impl<'src> TokenStream<'src> {
    pub fn new(source: &'src str) -> Result<Self, LexError> {
        let mut lexemes = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(item) = lexer.next() {
            let span = lexer.span();
            match item {
                Ok(token) => {
                    // coalesce adjacent breaks while tokenizing
                    if token.kind() == TokenKind::Endline
                        && lexemes
                            .last()
                            .is_some_and(|l: &Lexeme| l.token.kind() == TokenKind::Endline)
                    {
                        continue;
                    }
                    lexemes.push(Lexeme { token, span });
                }
                Err(()) => return Err(classify_error(source, span)),
            }
        }
        // a single trailing Endline so expressions always terminate
        if !lexemes
            .last()
            .is_some_and(|l| l.token.kind() == TokenKind::Endline)
        {
            lexemes.push(Lexeme {
                token: Token::Newline,
                span: source.len()..source.len(),
            });
        }

        let mut line_starts = vec![0];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }

        Ok(Self {
            source,
            lexemes,
            pos: 0,
            line_starts,
        })
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn line_starts(&self) -> &[usize] {
        &self.line_starts
    }

    /// 1-based (line, column) of a byte offset
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let col = offset - self.line_starts.get(line).copied().unwrap_or(0);
        (line + 1, col + 1)
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.lexemes.len()
    }

    /// Peek the current lexeme; None past end of input
    pub fn top(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    pub fn kind(&self) -> TokenKind {
        self.top().map_or(TokenKind::End, |l| l.token.kind())
    }

    /// Source text of the current lexeme
    pub fn text(&self) -> &'src str {
        self.top()
            .map_or("", |l| &self.source[l.span.start..l.span.end])
    }

    /// Byte offset where the current lexeme begins
    pub fn offset(&self) -> usize {
        self.top().map_or(self.source.len(), |l| l.span.start)
    }

    pub fn is(&self, token: &Token) -> bool {
        self.top().is_some_and(|l| &l.token == token)
    }

    /// Operator spelling of the current lexeme, if it can act as one
    pub fn op_text(&self) -> Option<&'static str> {
        self.top().and_then(|l| l.token.op_text())
    }

    /// Consume the current lexeme and advance per the guidance
    pub fn pop(&mut self, guidance: Guidance) -> Option<Lexeme> {
        let current = self.lexemes.get(self.pos).cloned()?;
        self.pos += 1;
        if guidance == Guidance::IgnoreBreak {
            self.eat_breaks();
        }
        Some(current)
    }

    /// Skip any Endline lexemes at the current position
    pub fn eat_breaks(&mut self) {
        while self.kind() == TokenKind::Endline {
            self.pos += 1;
        }
    }

    /// Opaque position for save/restore around speculative parses
    pub fn state(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, state: usize) {
        self.pos = state;
    }

    /// Raw lookahead without consuming; `peek_at(0)` is `top()`
    pub fn peek_at(&self, offset: usize) -> Option<&Lexeme> {
        self.lexemes.get(self.pos + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut stream = TokenStream::new(source).expect("lex failed");
        let mut out = Vec::new();
        while let Some(lexeme) = stream.pop(Guidance::None) {
            out.push(lexeme.token);
        }
        out
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("12 0x1f 0b101 1.5 2e-3 1.5e3"),
            vec![
                Token::Int(12.0),
                Token::Int(31.0),
                Token::Int(5.0),
                Token::Real(1.5),
                Token::Real(2e-3),
                Token::Real(1.5e3),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_malformed_number() {
        let err = TokenStream::new("12abc").unwrap_err();
        assert!(matches!(err, LexError::MalformedNumber { .. }));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\n\t\"\x41""#),
            vec![Token::Str("a\n\t\"A".to_string()), Token::Newline]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = TokenStream::new("\"abc\n").unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn test_illegal_escape() {
        let err = TokenStream::new(r#""bad\xZZ""#).unwrap_err();
        assert!(matches!(err, LexError::IllegalEscape { .. }));
    }

    #[test]
    fn test_longest_symbol_match() {
        assert_eq!(
            tokens("a <<- b << c"),
            vec![
                Token::Ident("a".to_string()),
                Token::ShlAssign,
                Token::Ident("b".to_string()),
                Token::Shl,
                Token::Ident("c".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_keywords_retag_as_symbol() {
        let stream = TokenStream::new("while x").expect("lex failed");
        assert_eq!(stream.kind(), TokenKind::Symbol);
        assert!(stream.is(&Token::While));
    }

    #[test]
    fn test_endline_coalescing() {
        assert_eq!(
            tokens("a\n\n;;\nb"),
            vec![
                Token::Ident("a".to_string()),
                Token::Newline,
                Token::Ident("b".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_line_continuation() {
        assert_eq!(
            tokens("a + \\\n b"),
            vec![
                Token::Ident("a".to_string()),
                Token::Plus,
                Token::Ident("b".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_ignore_break_guidance() {
        let mut stream = TokenStream::new("(\n a").expect("lex failed");
        stream.pop(Guidance::IgnoreBreak);
        assert_eq!(stream.kind(), TokenKind::Ident);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            tokens("a // trailing\nb"),
            vec![
                Token::Ident("a".to_string()),
                Token::Newline,
                Token::Ident("b".to_string()),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_line_col() {
        let stream = TokenStream::new("ab\ncd").expect("lex failed");
        assert_eq!(stream.line_col(0), (1, 1));
        assert_eq!(stream.line_col(3), (2, 1));
        assert_eq!(stream.line_col(4), (2, 2));
    }
}
