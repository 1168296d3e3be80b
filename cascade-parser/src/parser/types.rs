// Recursive-descent type parser.
//
// type := ('[' ']' | '*' | 'const')*
//         ( ident
//         | 'func' '(' typelist? ')' (':' type)?
//         | ('struct'|'class'|'dynamic') '{' (ident type ENDLINE)* '}' )

use super::Parser;
use crate::ParseError;
use cascade_ast::{ComplexKind, Type};
use cascade_diagnostics::error_codes;
use cascade_lexer::{Guidance, Token, TokenKind};

enum Modifier {
    Array,
    Pointer,
    Const,
}

impl<'src> Parser<'src> {
    pub fn parse_type(&mut self) -> Result<Type, ParseError> {
        let mut modifiers = Vec::new();
        loop {
            if self.check(&Token::LBracket) {
                self.stream.pop(Guidance::IgnoreBreak);
                self.consume(
                    &Token::RBracket,
                    Guidance::IgnoreBreak,
                    "mismatched \"[\" in slice type",
                )?;
                modifiers.push(Modifier::Array);
            } else if self.check(&Token::Star) {
                self.stream.pop(Guidance::IgnoreBreak);
                modifiers.push(Modifier::Pointer);
            } else if self.check(&Token::Const) {
                self.stream.pop(Guidance::IgnoreBreak);
                modifiers.push(Modifier::Const);
            } else {
                break;
            }
        }

        let head = match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Ident(name)) => {
                self.stream.pop(Guidance::None);
                Type::Base(name)
            }
            Some(Token::Func) => self.parse_func_type()?,
            Some(Token::Struct) | Some(Token::Class) | Some(Token::Dynamic) => {
                if !modifiers.is_empty() {
                    return Err(self.error_code(
                        error_codes::BAD_TYPE_SYNTAX,
                        "an array of or pointer to an unnamed complex type is not allowed",
                    ));
                }
                self.parse_complex_type()?
            }
            _ => {
                return Err(self.error_code(error_codes::BAD_TYPE_SYNTAX, format!(
                    "expected type identifier, found: \"{}\"",
                    self.display_current()
                )))
            }
        };

        Ok(modifiers.into_iter().rev().fold(head, |ty, m| match m {
            Modifier::Array => Type::Array(Box::new(ty)),
            Modifier::Pointer => Type::Pointer(Box::new(ty)),
            Modifier::Const => Type::Const(Box::new(ty)),
        }))
    }

    fn parse_func_type(&mut self) -> Result<Type, ParseError> {
        self.stream.pop(Guidance::IgnoreBreak);
        self.consume(
            &Token::LParen,
            Guidance::IgnoreBreak,
            "expected \"(\" in function type",
        )?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            let param = self.parse_type()?;
            if self.stream.kind() == TokenKind::Endline {
                self.stream.pop(Guidance::IgnoreBreak);
            }
            params.push(param);
            if self.check(&Token::Comma) {
                self.stream.pop(Guidance::IgnoreBreak);
            } else if !self.check(&Token::RParen) {
                return Err(self.error_code(error_codes::BAD_TYPE_SYNTAX, "mismatched \"(\" in function type"));
            }
        }
        self.stream.pop(Guidance::None);

        let ret = if self.check(&Token::Colon) {
            self.stream.pop(Guidance::IgnoreBreak);
            Some(self.parse_type()?)
        } else {
            None
        };
        Ok(Type::func(params, ret))
    }

    /// Parses `struct|class|dynamic { (member type ENDLINE)* }` with the
    /// kind keyword as the current token
    pub(crate) fn parse_complex_type(&mut self) -> Result<Type, ParseError> {
        let kind = match self.stream.top().map(|l| l.token.clone()) {
            Some(Token::Struct) => ComplexKind::Struct,
            Some(Token::Class) => ComplexKind::Class,
            _ => ComplexKind::Dynamic,
        };
        self.stream.pop(Guidance::IgnoreBreak);
        self.consume(&Token::LBrace, Guidance::IgnoreBreak, "expected \"{\"")?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            let start_kind = self.stream.kind();
            if start_kind == TokenKind::End {
                return Err(self.error_code(error_codes::BAD_TYPE_SYNTAX, "mismatched \"}\" in complex type"));
            }
            let name = self.consume_member_name("expected member name")?;
            self.eat_breaks();
            let ty = self.parse_type()?;
            members.push((name, ty));
            if self.stream.kind() != TokenKind::Endline && !self.check(&Token::RBrace) {
                return Err(self.error_code(error_codes::BAD_TYPE_SYNTAX, format!(
                    "expected end of line or \"}}\", found: \"{}\"",
                    self.display_current()
                )));
            }
            if self.stream.kind() == TokenKind::Endline {
                self.stream.pop(Guidance::IgnoreBreak);
            }
        }
        self.stream.pop(Guidance::None);
        Ok(Type::Complex { kind, members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Type {
        let mut parser = Parser::new(source).expect("lex failed");
        parser.parse_type().expect("type parse failed")
    }

    #[test]
    fn test_base_and_modifiers() {
        assert_eq!(parse("f64"), Type::f64());
        assert_eq!(parse("[]f64"), Type::array(Type::f64()));
        assert_eq!(
            parse("[]*f64"),
            Type::Array(Box::new(Type::Pointer(Box::new(Type::f64()))))
        );
        assert_eq!(
            parse("const string"),
            Type::Const(Box::new(Type::string()))
        );
    }

    #[test]
    fn test_func_type() {
        assert_eq!(
            parse("func(f64, []string):f64"),
            Type::func(
                vec![Type::f64(), Type::array(Type::string())],
                Some(Type::f64())
            )
        );
        assert_eq!(parse("func()"), Type::func(vec![], None));
    }

    #[test]
    fn test_complex_type() {
        assert_eq!(
            parse("struct{x f64; y f64;}"),
            Type::Complex {
                kind: ComplexKind::Struct,
                members: vec![
                    ("x".to_string(), Type::f64()),
                    ("y".to_string(), Type::f64()),
                ],
            }
        );
    }

    #[test]
    fn test_unnamed_complex_modifier_rejected() {
        let mut parser = Parser::new("[]struct{x f64;}").expect("lex failed");
        assert!(parser.parse_type().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for src in [
            "f64",
            "string",
            "[]f64",
            "[][]string",
            "*f64",
            "const f64",
            "func(f64,f64):f64",
            "func()",
            "func([]f64):f64",
            "struct{x f64;y []string;}",
            "dynamic{a f64;}",
            "[]func(f64):f64",
        ] {
            let ty = parse(src);
            let printed = ty.to_string();
            assert_eq!(parse(&printed), ty, "round trip failed for {src}");
        }
    }
}
