//! Lexer for the tracker query language

use std::borrow::Cow;

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// Current position in the input (byte index)
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Returns the character at the current position without advancing
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// Advances one character and returns it
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// Reads a run starting with a digit. `12`, `-` aside, and `3.5` are numbers;
    /// anything else glued to the digits (`1w`, `2nd`) is a bare word.
    fn read_number(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '.' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.input[start..self.position];
        let kind = if is_numeric_literal(text) {
            TokenKind::Number(text)
        } else {
            TokenKind::Identifier(text)
        };
        self.token(kind, start)
    }

    /// Reads a quoted string. The opening quote has already been consumed.
    fn read_string(&mut self, start: usize, quote: char) -> Token<'a> {
        let content_start = self.position;
        let mut unescaped: Option<String> = None;

        loop {
            let Some(c) = self.bump() else {
                return self.token(TokenKind::UnterminatedString, start);
            };
            if c == quote {
                break;
            }
            if c == '\\' {
                let buffer = unescaped.get_or_insert_with(|| {
                    self.input[content_start..self.position - 1].to_string()
                });
                match self.bump() {
                    Some(escaped) if escaped == quote || escaped == '\\' => buffer.push(escaped),
                    Some(other) => {
                        buffer.push('\\');
                        buffer.push(other);
                    }
                    None => return self.token(TokenKind::UnterminatedString, start),
                }
                continue;
            }
            if let Some(buffer) = unescaped.as_mut() {
                buffer.push(c);
            }
        }

        let content = match unescaped {
            Some(owned) => Cow::Owned(owned),
            None => Cow::Borrowed(&self.input[content_start..self.position - quote.len_utf8()]),
        };
        self.token(TokenKind::String(content), start)
    }

    /// Reads an identifier or reserved word.
    /// Identifiers may contain letters, digits, dashes and underscores.
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        self.token(match_keyword(literal), start)
    }
}

fn is_numeric_literal(text: &str) -> bool {
    let mut dots = 0;
    for c in text.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => {}
            _ => return false,
        }
    }
    dots <= 1 && !text.ends_with('.')
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "between" => TokenKind::Between,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.bump()?;

        let token = match c {
            '=' => self.token(TokenKind::Eq, start),
            '(' => self.token(TokenKind::LParen, start),
            ')' => self.token(TokenKind::RParen, start),
            ',' => self.token(TokenKind::Comma, start),
            '@' => self.token(TokenKind::At, start),
            '+' => self.token(TokenKind::Plus, start),
            '-' => self.token(TokenKind::Minus, start),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Lte, start)
                } else {
                    self.token(TokenKind::Lt, start)
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::Gte, start)
                } else {
                    self.token(TokenKind::Gt, start)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    self.token(TokenKind::NotEq, start)
                } else {
                    self.token(TokenKind::Illegal, start)
                }
            }
            '"' | '\'' => self.read_string(start, c),
            c if c.is_ascii_digit() => self.read_number(start),
            c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind<'_>> {
        Lexer::new(input).map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_comparison() {
        assert_eq!(
            kinds(r#"@status = OPEN()"#),
            vec![
                TokenKind::At,
                TokenKind::Identifier("status"),
                TokenKind::Eq,
                TokenKind::Identifier("OPEN"),
                TokenKind::LParen,
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("!= = > < >= <= ( ) , + -"),
            vec![
                TokenKind::NotEq,
                TokenKind::Eq,
                TokenKind::Gt,
                TokenKind::Lt,
                TokenKind::Gte,
                TokenKind::Lte,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Comma,
                TokenKind::Plus,
                TokenKind::Minus,
            ]
        );
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("AND or nOt In between story_points"),
            vec![
                TokenKind::And,
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::In,
                TokenKind::Between,
                TokenKind::Identifier("story_points"),
            ]
        );
    }

    #[test]
    fn test_numbers_and_periods() {
        assert_eq!(
            kinds("12345 3.5 1w 2024abc"),
            vec![
                TokenKind::Number("12345"),
                TokenKind::Number("3.5"),
                TokenKind::Identifier("1w"),
                TokenKind::Identifier("2024abc"),
            ]
        );
    }

    #[test]
    fn test_bare_word_characters() {
        assert_eq!(
            kinds("release-1_0 v1.2 1.2.3"),
            vec![
                TokenKind::Identifier("release-1_0"),
                TokenKind::Identifier("v1"),
                TokenKind::Illegal,
                TokenKind::Number("2"),
                TokenKind::Identifier("1.2.3"),
            ]
        );
    }

    #[test]
    fn test_strings_with_both_quotes() {
        assert_eq!(
            kinds(r#""hello world" 'single'"#),
            vec![
                TokenKind::String(Cow::Borrowed("hello world")),
                TokenKind::String(Cow::Borrowed("single")),
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\" \\ \n""#),
            vec![TokenKind::String(Cow::Owned(r#"say "hi" \ \n"#.to_string()))]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let tokens: Vec<_> = Lexer::new(r#"title = "abc"#).collect();
        assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::UnterminatedString));
        assert_eq!(tokens.last().map(|t| t.span.start), Some(8));
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let tokens: Vec<_> = Lexer::new("é = 'x'").collect();
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(3, 4));
        assert_eq!(tokens[2].span, Span::new(5, 8));
    }

    #[test]
    fn test_illegal_characters() {
        assert_eq!(
            kinds("a ! b ;"),
            vec![
                TokenKind::Identifier("a"),
                TokenKind::Illegal,
                TokenKind::Identifier("b"),
                TokenKind::Illegal,
            ]
        );
    }
}
