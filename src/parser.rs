//! Parser for the tracker query language
//!
//! ## Parsing flow
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_term()
//!        │    │    ├─ "(" → grouped expression (recursive parse_or_expression)
//!        │    │    ├─ WITH/WITHOUT/IS → parse_relationship()
//!        │    │    └─ otherwise → parse_comparison()
//!        │    │                       ├─ parse_subject()     field | @metadata
//!        │    │                       ├─ operator            = != < <= > >= BETWEEN [NOT] IN
//!        │    │                       └─ parse_value()       literal | OPEN() | CURRENT_USER() | CURRENT_DATETIME()
//!        │    └─ on AND, parse the next term
//!        └─ on OR, parse the next AND expression
//! ```
//!
//! ## Precedence (highest first)
//!
//! 1. Parentheses `(expression)`
//! 2. Comparisons and relationship conditions
//! 3. `AND`
//! 4. `OR`
//!
//! Both `AND` and `OR` are left associative: `a OR b OR c` parses as `(a OR b) OR c`.
//!
//! ## Examples
//!
//! ```text
//! @status = OPEN() AND @title = "foo"
//! story_points BETWEEN(3, 8) OR @assigned_to = CURRENT_USER()
//! category NOT IN("ui", "db") AND @submitted_on > CURRENT_DATETIME() - 1w
//! WITH PARENT TRACKER = "epics"
//! ```

use std::fmt;

use thiserror::Error;

use crate::ast::{
    Comparison, ComparisonType, Expression, Metadata, Period, PeriodDirection,
    RelationshipCondition, RelationshipKind, RelationshipTarget, Subject, ValueWrapper,
};
use crate::lexer::Lexer;
use crate::token::{Span, Token, TokenKind};

/// Malformed query text. `span` is `None` when the query ended too early.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub span: Option<Span>,
}

impl SyntaxError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }

    fn end_of_input(expected: &str) -> Self {
        Self::new(format!("Expected {expected}, but reached end of query"), None)
    }

    fn unexpected(expected: &str, found: &Token<'_>) -> Self {
        Self::at_position(
            format!("Expected {expected}, found {}", found.kind.describe()),
            found.span,
        )
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} at position {}", self.message, span.start),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// Deepest nesting of parentheses a query may use.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Most comparisons and relationship conditions a query may hold, whatever the
/// compiler settings.
pub const MAX_CONDITIONS: usize = 500;

/// Why the parser gave up on a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Parsing stops at the first condition past the limit, before the tree gets built
    #[error("the query has more than {limit} conditions")]
    TooManyConditions { limit: usize, span: Span },
}

impl From<ParseError> for SyntaxError {
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::Syntax(error) => error,
            ParseError::TooManyConditions { limit, span } => SyntaxError::at_position(
                format!("The query has more than {limit} conditions"),
                span,
            ),
        }
    }
}

/// Parses a full query text.
pub fn parse(query: &str) -> Result<Expression, SyntaxError> {
    let tokens: Vec<_> = Lexer::new(query).collect();
    Parser::new(&tokens).parse().map_err(SyntaxError::from)
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    /// Parentheses currently open
    depth: usize,
    conditions: usize,
    max_conditions: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            conditions: 0,
            max_conditions: MAX_CONDITIONS,
        }
    }

    /// Lowers the number of conditions accepted, never above [`MAX_CONDITIONS`].
    pub fn with_max_conditions(mut self, limit: usize) -> Self {
        self.max_conditions = limit.min(MAX_CONDITIONS);
        self
    }

    /// Returns the current token without advancing
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// Returns the token `offset` positions ahead without advancing
    fn peek_at(&self, offset: usize) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position + offset)
    }

    /// Returns the current token and advances
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Consumes a token of the expected kind or fails
    fn expect(&mut self, expected: TokenKind<'_>) -> Result<&'a Token<'a>, SyntaxError> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) =>
            {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(SyntaxError::unexpected(&expected.describe(), token)),
            None => Err(SyntaxError::end_of_input(&expected.describe())),
        }
    }

    fn match_token(&self, kind: &TokenKind<'_>) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    fn match_word_at(&self, offset: usize, word: &str) -> bool {
        matches!(
            self.peek_at(offset),
            Some(Token { kind: TokenKind::Identifier(name), .. }) if name.eq_ignore_ascii_case(word)
        )
    }

    pub fn parse(&mut self) -> Result<Expression, ParseError> {
        if let Some(token) = self.tokens.iter().find(|token| {
            matches!(
                token.kind,
                TokenKind::Illegal | TokenKind::UnterminatedString
            )
        }) {
            let message = match token.kind {
                TokenKind::UnterminatedString => "Unterminated string".to_string(),
                _ => "Illegal character".to_string(),
            };
            return Err(SyntaxError::at_position(message, token.span).into());
        }

        if self.tokens.is_empty() {
            return Err(SyntaxError::new("The query is empty".to_string(), None).into());
        }

        let expression = self.parse_or_expression()?;

        match self.peek() {
            None => Ok(expression),
            Some(token) => Err(SyntaxError::at_position(
                format!("Unexpected {}", token.kind.describe()),
                token.span,
            )
            .into()),
        }
    }

    /// Syntax: `and_expr (OR and_expr)*`
    fn parse_or_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            left = Expression::or(left, right);
        }

        Ok(left)
    }

    /// Syntax: `term (AND term)*`
    fn parse_and_expression(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_term()?;

        while self.match_token(&TokenKind::And) {
            self.advance();
            let right = self.parse_term()?;
            left = Expression::and(left, right);
        }

        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, ParseError> {
        if let Some(open) = self.peek().filter(|token| token.kind == TokenKind::LParen) {
            if self.depth == MAX_NESTING_DEPTH {
                return Err(SyntaxError::at_position(
                    format!("Parentheses cannot be nested more than {MAX_NESTING_DEPTH} levels deep"),
                    open.span,
                )
                .into());
            }
            self.advance();
            self.depth += 1;
            let expression = self.parse_or_expression()?;
            self.expect(TokenKind::RParen)?;
            self.depth -= 1;
            return Ok(expression);
        }

        self.count_condition()?;
        if self.is_relationship_start() {
            return Ok(Expression::Relationship(self.parse_relationship()?));
        }
        Ok(Expression::Comparison(self.parse_comparison()?))
    }

    fn count_condition(&mut self) -> Result<(), ParseError> {
        self.conditions += 1;
        if self.conditions <= self.max_conditions {
            return Ok(());
        }
        Err(ParseError::TooManyConditions {
            limit: self.max_conditions,
            span: self.peek().map(|token| token.span).unwrap_or_default(),
        })
    }

    /// `is = 1` and `is NOT IN(...)` compare a field named `is`.
    fn is_relationship_start(&self) -> bool {
        let with_family = (self.match_word_at(0, "with") || self.match_word_at(0, "without"))
            && (self.match_word_at(1, "parent") || self.match_word_at(1, "children"));
        let is_family = self.match_word_at(0, "is")
            && (self.match_word_at(1, "linked")
                || (matches!(self.peek_at(1), Some(Token { kind: TokenKind::Not, .. }))
                    && self.match_word_at(2, "linked")));
        with_family || is_family
    }

    /// `WITH PARENT`, `WITHOUT CHILDREN`, `IS [NOT] LINKED TO|FROM`, each with an optional target
    fn parse_relationship(&mut self) -> Result<RelationshipCondition, SyntaxError> {
        let (kind, negated) = if self.match_word_at(0, "is") {
            self.advance();
            let negated = self.match_token(&TokenKind::Not);
            if negated {
                self.advance();
            }
            self.expect_word("LINKED")?;
            let kind = if self.match_word_at(0, "to") {
                RelationshipKind::LinkedTo
            } else if self.match_word_at(0, "from") {
                RelationshipKind::LinkedFrom
            } else {
                return Err(self.unexpected_here("TO or FROM"));
            };
            self.advance();
            (kind, negated)
        } else {
            let negated = self.match_word_at(0, "without");
            self.advance();
            let kind = if self.match_word_at(0, "parent") {
                RelationshipKind::Parent
            } else {
                RelationshipKind::Children
            };
            self.advance();
            (kind, negated)
        };

        let target = self.parse_relationship_target()?;

        Ok(RelationshipCondition {
            kind,
            negated,
            target,
        })
    }

    fn parse_relationship_target(&mut self) -> Result<Option<RelationshipTarget>, SyntaxError> {
        let is_eq_next = matches!(self.peek_at(1), Some(Token { kind: TokenKind::Eq, .. }));

        if self.match_word_at(0, "artifact") && is_eq_next {
            self.advance();
            self.advance();
            let token = self.expect(TokenKind::Number(""))?;
            let TokenKind::Number(id) = token.kind else {
                return Err(SyntaxError::unexpected("an artifact id", token));
            };
            return Ok(Some(RelationshipTarget::Artifact(id.to_string())));
        }

        if self.match_word_at(0, "tracker") && is_eq_next {
            self.advance();
            self.advance();
            let name = self.parse_literal()?;
            return Ok(Some(RelationshipTarget::Tracker(name)));
        }

        Ok(None)
    }

    fn expect_word(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.match_word_at(0, word) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_here(word))
        }
    }

    fn unexpected_here(&self, expected: &str) -> SyntaxError {
        match self.peek() {
            Some(token) => SyntaxError::unexpected(expected, token),
            None => SyntaxError::end_of_input(expected),
        }
    }

    fn parse_comparison(&mut self) -> Result<Comparison, SyntaxError> {
        let subject = self.parse_subject()?;

        let Some(token) = self.advance() else {
            return Err(SyntaxError::end_of_input("a comparison operator"));
        };

        let (comparison_type, value) = match &token.kind {
            TokenKind::Eq => (ComparisonType::Equal, self.parse_value()?),
            TokenKind::NotEq => (ComparisonType::NotEqual, self.parse_value()?),
            TokenKind::Lt => (ComparisonType::LessThan, self.parse_value()?),
            TokenKind::Lte => (ComparisonType::LessThanOrEqual, self.parse_value()?),
            TokenKind::Gt => (ComparisonType::GreaterThan, self.parse_value()?),
            TokenKind::Gte => (ComparisonType::GreaterThanOrEqual, self.parse_value()?),
            TokenKind::Between => (ComparisonType::Between, self.parse_between()?),
            TokenKind::In => (ComparisonType::In, self.parse_in_list()?),
            TokenKind::Not => {
                self.expect(TokenKind::In)?;
                (ComparisonType::NotIn, self.parse_in_list()?)
            }
            _ => return Err(SyntaxError::unexpected("a comparison operator", token)),
        };

        Ok(Comparison::new(subject, comparison_type, value))
    }

    fn parse_subject(&mut self) -> Result<Subject, SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::end_of_input("a field name or @metadata"));
        };

        match &token.kind {
            TokenKind::Identifier(name) => Ok(Subject::Field(name.to_string())),
            TokenKind::At => {
                let keyword_token = self.expect(TokenKind::Identifier(""))?;
                let TokenKind::Identifier(keyword) = keyword_token.kind else {
                    return Err(SyntaxError::unexpected("a metadata name", keyword_token));
                };
                Metadata::from_keyword(keyword)
                    .map(Subject::Metadata)
                    .ok_or_else(|| {
                        SyntaxError::at_position(
                            format!("Unknown metadata @{keyword}"),
                            Span::new(token.span.start, keyword_token.span.end),
                        )
                    })
            }
            _ => Err(SyntaxError::unexpected("a field name or @metadata", token)),
        }
    }

    /// Right hand side of `= != < <= > >=`
    fn parse_value(&mut self) -> Result<ValueWrapper, SyntaxError> {
        if let Some(function) = self.parse_function_call()? {
            return Ok(function);
        }
        self.parse_literal().map(ValueWrapper::Simple)
    }

    /// `NAME()` value functions, `None` when the next tokens are not a call.
    fn parse_function_call(&mut self) -> Result<Option<ValueWrapper>, SyntaxError> {
        let Some(Token {
            kind: TokenKind::Identifier(name),
            span,
        }) = self.peek()
        else {
            return Ok(None);
        };
        if !matches!(self.peek_at(1), Some(Token { kind: TokenKind::LParen, .. })) {
            return Ok(None);
        }

        let value = match name.to_ascii_uppercase().as_str() {
            "OPEN" => ValueWrapper::StatusOpen,
            "CURRENT_USER" | "MYSELF" => ValueWrapper::CurrentUser,
            "CURRENT_DATETIME" | "NOW" => ValueWrapper::CurrentDateTime(None),
            _ => {
                return Err(SyntaxError::at_position(
                    format!("Unknown function {name}()"),
                    *span,
                ));
            }
        };
        self.advance();
        self.advance();
        self.expect(TokenKind::RParen)?;

        if let ValueWrapper::CurrentDateTime(_) = value {
            return Ok(Some(ValueWrapper::CurrentDateTime(self.parse_period()?)));
        }
        Ok(Some(value))
    }

    /// Optional `+ 1w` / `- 3d` following `CURRENT_DATETIME()`
    fn parse_period(&mut self) -> Result<Option<Period>, SyntaxError> {
        let direction = match self.peek().map(|token| &token.kind) {
            Some(TokenKind::Plus) => PeriodDirection::Plus,
            Some(TokenKind::Minus) => PeriodDirection::Minus,
            _ => return Ok(None),
        };
        self.advance();

        let expected = "a period such as 1d, 2w, 3m or 1y";
        let Some(token) = self.advance() else {
            return Err(SyntaxError::end_of_input(expected));
        };
        match &token.kind {
            TokenKind::Identifier(text) => Period::parse(direction, text)
                .map(Some)
                .ok_or_else(|| SyntaxError::unexpected(expected, token)),
            _ => Err(SyntaxError::unexpected(expected, token)),
        }
    }

    /// `BETWEEN(low, high)`, the keyword already consumed
    fn parse_between(&mut self) -> Result<ValueWrapper, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let low = self.parse_between_bound()?;
        self.expect(TokenKind::Comma)?;
        let high = self.parse_between_bound()?;
        self.expect(TokenKind::RParen)?;
        Ok(ValueWrapper::between(low, high))
    }

    fn parse_between_bound(&mut self) -> Result<ValueWrapper, SyntaxError> {
        match self.parse_function_call()? {
            Some(value @ ValueWrapper::CurrentDateTime(_)) => Ok(value),
            Some(_) => {
                let span = self.tokens[self.position - 1].span;
                Err(SyntaxError::at_position(
                    "Only literals and CURRENT_DATETIME() are allowed in BETWEEN()".to_string(),
                    span,
                ))
            }
            None => self.parse_literal().map(ValueWrapper::Simple),
        }
    }

    /// `IN(a, b, ...)`, the keyword already consumed
    fn parse_in_list(&mut self) -> Result<ValueWrapper, SyntaxError> {
        let open = self.expect(TokenKind::LParen)?;
        if self.match_token(&TokenKind::RParen) {
            return Err(SyntaxError::at_position(
                "IN() needs at least one value".to_string(),
                open.span,
            ));
        }

        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if self.match_token(&TokenKind::RParen) {
                break;
            }
            self.expect(TokenKind::Comma)?;
        }
        self.expect(TokenKind::RParen)?;

        Ok(ValueWrapper::In(values))
    }

    /// Quoted string, number (optionally negative) or bare word
    fn parse_literal(&mut self) -> Result<String, SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::end_of_input("a value"));
        };

        match &token.kind {
            TokenKind::String(value) => Ok(value.to_string()),
            TokenKind::Number(value) => Ok(value.to_string()),
            TokenKind::Identifier(value) => Ok(value.to_string()),
            TokenKind::Minus => {
                let number = self.expect(TokenKind::Number(""))?;
                match number.kind {
                    TokenKind::Number(value) => Ok(format!("-{value}")),
                    _ => Err(SyntaxError::unexpected("a number", number)),
                }
            }
            _ => Err(SyntaxError::unexpected("a value", token)),
        }
    }
}
