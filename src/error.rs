//! Error types
//!
//! User-triggerable conditions raised while turning a query into SQL. Contract breaches
//! between validation and SQL generation are not represented here: they panic.

use thiserror::Error;

use crate::ast::{ComparisonType, RelationshipCondition, Subject, ValueKind};
use crate::parser::ParseError;
pub use crate::parser::SyntaxError;

/// The subject matches no readable field or metadata in the trackers in scope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subject} does not exist in the selected trackers")]
pub struct FieldNotFoundFault {
    pub subject: Subject,
}

/// Failures of the field/metadata resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFault {
    #[error(transparent)]
    FieldNotFound(#[from] FieldNotFoundFault),

    /// The same name maps to fields of unrelated types across trackers
    #[error("{subject} is not of a compatible type across the selected trackers ({shapes})")]
    IncompatibleFieldTypes { subject: Subject, shapes: String },

    /// The only fields with that name cannot be queried (file, computed, links...)
    #[error("{subject} is of a type that cannot be used in a query")]
    UnsupportedFieldType { subject: Subject },

    #[error("{subject} is not a static list field")]
    NotAStaticList { subject: Subject },
}

/// Why a comparison was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidComparisonReason {
    #[error("the operator is not supported")]
    OperatorNotSupported,

    #[error("comparison to {0} is not supported")]
    ValueNotSupported(ValueKind),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a valid date, expected YYYY-MM-DD or YYYY-MM-DD HH:MM")]
    NotADate(String),

    #[error("'{0}' has a time but the field only stores dates")]
    TimeNotSupported(String),

    #[error("the date period is out of range")]
    PeriodOutOfRange,

    #[error("an empty value is not allowed here")]
    EmptyValue,

    #[error("'{0}' is not a valid artifact id")]
    InvalidArtifactId(String),

    #[error("a tracker name is required")]
    EmptyTrackerName,

    #[error("user id {0} does not fit a signed 64 bits column")]
    UserIdOutOfRange(u64),
}

/// Operator/value combination illegal for the resolved field shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{subject} {operator}: {reason}")]
pub struct InvalidComparisonFault {
    /// Rendered subject, `@status` or a field name
    pub subject: String,
    pub operator: String,
    pub reason: InvalidComparisonReason,
}

impl InvalidComparisonFault {
    pub fn new(subject: &Subject, operator: ComparisonType, reason: InvalidComparisonReason) -> Self {
        Self {
            subject: subject.to_string(),
            operator: operator.to_string(),
            reason,
        }
    }

    /// Artifact-link conditions have no subject, their head (`WITH PARENT`) stands for it.
    pub fn relationship(
        condition: &RelationshipCondition,
        target: &str,
        reason: InvalidComparisonReason,
    ) -> Self {
        let head = RelationshipCondition {
            target: None,
            ..condition.clone()
        };
        Self {
            subject: head.to_string(),
            operator: format!("{target} ="),
            reason,
        }
    }
}

/// What went wrong with one clause of the query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClauseFault {
    #[error(transparent)]
    Resolve(#[from] ResolveFault),

    #[error(transparent)]
    InvalidComparison(#[from] InvalidComparisonFault),
}

/// Query-level fault identifying the offending clause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid clause `{clause}`: {fault}")]
pub struct InvalidQueryFault {
    /// Canonical text of the clause
    pub clause: String,
    pub fault: ClauseFault,
}

/// Everything that can prevent a query from compiling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    InvalidQuery(#[from] InvalidQueryFault),

    #[error("the report does not have any tracker in scope")]
    EmptyScope,

    /// When the parser gives up on a query text, `found` is the first count past `limit`
    #[error("the query has {found} conditions, at most {limit} are allowed")]
    TooComplex { found: usize, limit: usize },
}

impl From<ParseError> for QueryError {
    fn from(error: ParseError) -> Self {
        match error {
            ParseError::Syntax(error) => QueryError::Syntax(error),
            ParseError::TooManyConditions { limit, .. } => QueryError::TooComplex {
                found: limit + 1,
                limit,
            },
        }
    }
}

/// Result type for query compilation
pub type QueryResult<T> = Result<T, QueryError>;
