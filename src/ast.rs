//! AST of the tracker query language.
//!
//! The `Display` implementations produce the canonical form of a query: literals are
//! always double quoted and parentheses only appear where they are needed to keep the
//! shape of the tree, so parsing the canonical form yields the same AST back.

use std::fmt;

/// Root of a parsed query: a boolean tree of comparisons.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Comparison(Comparison),
    Relationship(RelationshipCondition),
}

impl Expression {
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    /// Number of leaves (comparisons and relationship conditions) in the tree.
    pub fn leaf_count(&self) -> usize {
        let mut pending = vec![self];
        let mut leaves = 0;
        while let Some(expression) = pending.pop() {
            match expression {
                Expression::And(left, right) | Expression::Or(left, right) => {
                    pending.push(left);
                    pending.push(right);
                }
                Expression::Comparison(_) | Expression::Relationship(_) => leaves += 1,
            }
        }
        leaves
    }
}

/// `subject operator value`, e.g. `@status = OPEN()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub subject: Subject,
    pub comparison_type: ComparisonType,
    pub value: ValueWrapper,
}

impl Comparison {
    pub fn new(subject: Subject, comparison_type: ComparisonType, value: ValueWrapper) -> Self {
        Self {
            subject,
            comparison_type,
            value,
        }
    }
}

/// Left hand side of a comparison. Resolution against tracker fields happens later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    /// A tracker field referenced by its name
    Field(String),
    /// A metadata keyword, written `@keyword`
    Metadata(Metadata),
}

impl Subject {
    pub fn field(name: impl Into<String>) -> Self {
        Subject::Field(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metadata {
    Title,
    Description,
    Status,
    AssignedTo,
    SubmittedOn,
    LastUpdateDate,
    SubmittedBy,
    LastUpdateBy,
    Id,
}

impl Metadata {
    pub const ALL: [Metadata; 9] = [
        Metadata::Title,
        Metadata::Description,
        Metadata::Status,
        Metadata::AssignedTo,
        Metadata::SubmittedOn,
        Metadata::LastUpdateDate,
        Metadata::SubmittedBy,
        Metadata::LastUpdateBy,
        Metadata::Id,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Metadata::Title => "title",
            Metadata::Description => "description",
            Metadata::Status => "status",
            Metadata::AssignedTo => "assigned_to",
            Metadata::SubmittedOn => "submitted_on",
            Metadata::LastUpdateDate => "last_update_date",
            Metadata::SubmittedBy => "submitted_by",
            Metadata::LastUpdateBy => "last_update_by",
            Metadata::Id => "id",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|metadata| metadata.keyword().eq_ignore_ascii_case(keyword))
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonType {
    Equal,              // =
    NotEqual,           // !=
    LessThan,           // <
    GreaterThan,        // >
    LessThanOrEqual,    // <=
    GreaterThanOrEqual, // >=
    Between,            // BETWEEN(a, b)
    In,                 // IN(a, b, c)
    NotIn,              // NOT IN(a, b, c)
}

/// Right hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueWrapper {
    Simple(String),
    In(Vec<String>),
    /// Bounds are either `Simple` or `CurrentDateTime`
    Between(Box<ValueWrapper>, Box<ValueWrapper>),
    CurrentUser,
    CurrentDateTime(Option<Period>),
    StatusOpen,
}

impl ValueWrapper {
    pub fn simple(value: impl Into<String>) -> Self {
        ValueWrapper::Simple(value.into())
    }

    pub fn between(low: ValueWrapper, high: ValueWrapper) -> Self {
        ValueWrapper::Between(Box::new(low), Box::new(high))
    }

    /// Dispatches to the visitor method matching this wrapper kind.
    pub fn accept<V: ValueWrapperVisitor>(&self, visitor: &V) -> V::Output {
        match self {
            ValueWrapper::Simple(value) => visitor.visit_simple_value(value),
            ValueWrapper::In(values) => visitor.visit_in_value(values),
            ValueWrapper::Between(low, high) => visitor.visit_between_value(low, high),
            ValueWrapper::CurrentUser => visitor.visit_current_user_value(),
            ValueWrapper::CurrentDateTime(period) => {
                visitor.visit_current_date_time_value(period.as_ref())
            }
            ValueWrapper::StatusOpen => visitor.visit_status_open_value(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ValueWrapper::Simple(_) => ValueKind::Simple,
            ValueWrapper::In(_) => ValueKind::In,
            ValueWrapper::Between(..) => ValueKind::Between,
            ValueWrapper::CurrentUser => ValueKind::CurrentUser,
            ValueWrapper::CurrentDateTime(_) => ValueKind::CurrentDateTime,
            ValueWrapper::StatusOpen => ValueKind::StatusOpen,
        }
    }
}

/// Double dispatch over [`ValueWrapper`] kinds.
pub trait ValueWrapperVisitor {
    type Output;

    fn visit_simple_value(&self, value: &str) -> Self::Output;
    fn visit_in_value(&self, values: &[String]) -> Self::Output;
    fn visit_between_value(&self, low: &ValueWrapper, high: &ValueWrapper) -> Self::Output;
    fn visit_current_user_value(&self) -> Self::Output;
    fn visit_current_date_time_value(&self, period: Option<&Period>) -> Self::Output;
    fn visit_status_open_value(&self) -> Self::Output;
}

/// Fieldless mirror of [`ValueWrapper`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Simple,
    In,
    Between,
    CurrentUser,
    CurrentDateTime,
    StatusOpen,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Simple => "a simple value",
            ValueKind::In => "IN()",
            ValueKind::Between => "BETWEEN()",
            ValueKind::CurrentUser => "CURRENT_USER()",
            ValueKind::CurrentDateTime => "CURRENT_DATETIME()",
            ValueKind::StatusOpen => "OPEN()",
        };
        f.write_str(name)
    }
}

/// Offset applied to `CURRENT_DATETIME()`, e.g. `- 1w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub direction: PeriodDirection,
    pub amount: u32,
    pub unit: PeriodUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodDirection {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    /// Parses `<digits><unit>` such as `3d`, `1w`, `2m`, `1y`.
    pub fn parse(direction: PeriodDirection, text: &str) -> Option<Self> {
        let unit = match text.chars().last()?.to_ascii_lowercase() {
            'd' => PeriodUnit::Day,
            'w' => PeriodUnit::Week,
            'm' => PeriodUnit::Month,
            'y' => PeriodUnit::Year,
            _ => return None,
        };
        let digits = &text[..text.len() - 1];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let amount = digits.parse().ok()?;
        Some(Self {
            direction,
            amount,
            unit,
        })
    }
}

/// Artifact-link condition such as `WITH PARENT` or `IS NOT LINKED TO TRACKER = "bugs"`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipCondition {
    pub kind: RelationshipKind,
    /// `WITHOUT ...` / `IS NOT LINKED ...`
    pub negated: bool,
    pub target: Option<RelationshipTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Parent,
    Children,
    LinkedTo,
    LinkedFrom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipTarget {
    /// Raw artifact id as written in the query
    Artifact(String),
    /// Tracker name
    Tracker(String),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Or(left, right) => {
                write!(f, "{left} OR ")?;
                match right.as_ref() {
                    Expression::Or(..) => write!(f, "({right})"),
                    _ => write!(f, "{right}"),
                }
            }
            Expression::And(left, right) => {
                match left.as_ref() {
                    Expression::Or(..) => write!(f, "({left})")?,
                    _ => write!(f, "{left}")?,
                }
                f.write_str(" AND ")?;
                match right.as_ref() {
                    Expression::Or(..) | Expression::And(..) => write!(f, "({right})"),
                    _ => write!(f, "{right}"),
                }
            }
            Expression::Comparison(comparison) => write!(f, "{comparison}"),
            Expression::Relationship(condition) => write!(f, "{condition}"),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Field(name) => f.write_str(name),
            Subject::Metadata(metadata) => write!(f, "@{}", metadata.keyword()),
        }
    }
}

impl fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonType::Equal => "=",
            ComparisonType::NotEqual => "!=",
            ComparisonType::LessThan => "<",
            ComparisonType::GreaterThan => ">",
            ComparisonType::LessThanOrEqual => "<=",
            ComparisonType::GreaterThanOrEqual => ">=",
            ComparisonType::Between => "BETWEEN",
            ComparisonType::In => "IN",
            ComparisonType::NotIn => "NOT IN",
        };
        f.write_str(symbol)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.comparison_type {
            ComparisonType::Between | ComparisonType::In | ComparisonType::NotIn => {
                write!(f, "{} {}{}", self.subject, self.comparison_type, self.value)
            }
            _ => write!(f, "{} {} {}", self.subject, self.comparison_type, self.value),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in value.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("\"")
}

impl fmt::Display for ValueWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueWrapper::Simple(value) => write_quoted(f, value),
            ValueWrapper::In(values) => {
                f.write_str("(")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write_quoted(f, value)?;
                }
                f.write_str(")")
            }
            ValueWrapper::Between(low, high) => write!(f, "({low}, {high})"),
            ValueWrapper::CurrentUser => f.write_str("CURRENT_USER()"),
            ValueWrapper::CurrentDateTime(None) => f.write_str("CURRENT_DATETIME()"),
            ValueWrapper::CurrentDateTime(Some(period)) => {
                write!(f, "CURRENT_DATETIME() {period}")
            }
            ValueWrapper::StatusOpen => f.write_str("OPEN()"),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.direction {
            PeriodDirection::Plus => '+',
            PeriodDirection::Minus => '-',
        };
        let unit = match self.unit {
            PeriodUnit::Day => 'd',
            PeriodUnit::Week => 'w',
            PeriodUnit::Month => 'm',
            PeriodUnit::Year => 'y',
        };
        write!(f, "{sign} {}{unit}", self.amount)
    }
}

impl fmt::Display for RelationshipCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = match (self.kind, self.negated) {
            (RelationshipKind::Parent, false) => "WITH PARENT",
            (RelationshipKind::Parent, true) => "WITHOUT PARENT",
            (RelationshipKind::Children, false) => "WITH CHILDREN",
            (RelationshipKind::Children, true) => "WITHOUT CHILDREN",
            (RelationshipKind::LinkedTo, false) => "IS LINKED TO",
            (RelationshipKind::LinkedTo, true) => "IS NOT LINKED TO",
            (RelationshipKind::LinkedFrom, false) => "IS LINKED FROM",
            (RelationshipKind::LinkedFrom, true) => "IS NOT LINKED FROM",
        };
        f.write_str(head)?;
        match &self.target {
            None => Ok(()),
            Some(RelationshipTarget::Artifact(id)) => write!(f, " ARTIFACT = {id}"),
            Some(RelationshipTarget::Tracker(name)) => {
                f.write_str(" TRACKER = ")?;
                write_quoted(f, name)
            }
        }
    }
}
