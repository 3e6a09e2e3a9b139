//! Semantic validation of comparisons against the shape of the resolved field.
//!
//! Everything accepted here must be compilable by the from/where builders: they treat
//! any other combination as a programming error.

use crate::ast::{
    Comparison, ComparisonType, Period, RelationshipCondition, RelationshipTarget, ValueKind,
    ValueWrapper, ValueWrapperVisitor,
};
use crate::date_literal::DateLiteral;
use crate::duck_typed_field::{DatePrecision, DuckTypedField, FieldShape};
use crate::error::{InvalidComparisonFault, InvalidComparisonReason};
use crate::sql_compiler::CompilationContext;

pub fn validate_comparison(
    comparison: &Comparison,
    field: &DuckTypedField,
    context: &CompilationContext,
) -> Result<(), InvalidComparisonFault> {
    check_comparison(comparison, field, context).map_err(|reason| {
        InvalidComparisonFault::new(&comparison.subject, comparison.comparison_type, reason)
    })
}

fn check_comparison(
    comparison: &Comparison,
    field: &DuckTypedField,
    context: &CompilationContext,
) -> Result<(), InvalidComparisonReason> {
    if !supports_operator(field.shape, comparison.comparison_type) {
        return Err(InvalidComparisonReason::OperatorNotSupported);
    }

    let wrapper_matches_operator = match (&comparison.value, comparison.comparison_type) {
        (ValueWrapper::In(_), ComparisonType::In | ComparisonType::NotIn) => true,
        (ValueWrapper::Between(..), ComparisonType::Between) => true,
        (ValueWrapper::In(_) | ValueWrapper::Between(..), _) => false,
        (_, ComparisonType::In | ComparisonType::NotIn | ComparisonType::Between) => false,
        _ => true,
    };
    if !wrapper_matches_operator {
        return Err(InvalidComparisonReason::ValueNotSupported(
            comparison.value.kind(),
        ));
    }

    comparison.value.accept(&ValueChecker {
        field,
        comparison_type: comparison.comparison_type,
        context,
    })
}

fn supports_operator(shape: FieldShape, comparison_type: ComparisonType) -> bool {
    use ComparisonType::*;

    match shape {
        FieldShape::StatusSemantic | FieldShape::Text => {
            matches!(comparison_type, Equal | NotEqual)
        }
        FieldShape::Numeric | FieldShape::Date => !matches!(comparison_type, In | NotIn),
        FieldShape::StaticList | FieldShape::UserList => {
            matches!(comparison_type, Equal | NotEqual | In | NotIn)
        }
    }
}

/// Checks the value side once the operator is known to fit the field.
struct ValueChecker<'a> {
    field: &'a DuckTypedField,
    comparison_type: ComparisonType,
    context: &'a CompilationContext,
}

impl ValueChecker<'_> {
    fn unsupported(&self, value: &ValueWrapper) -> Result<(), InvalidComparisonReason> {
        Err(InvalidComparisonReason::ValueNotSupported(value.kind()))
    }

    fn check_empty_value(&self) -> Result<(), InvalidComparisonReason> {
        let allowed = self.field.shape != FieldShape::StatusSemantic
            && self.field.allows_empty_value()
            && matches!(
                self.comparison_type,
                ComparisonType::Equal | ComparisonType::NotEqual
            );
        if allowed {
            Ok(())
        } else {
            Err(InvalidComparisonReason::EmptyValue)
        }
    }

    fn check_date(&self, value: &str) -> Result<(), InvalidComparisonReason> {
        let literal = DateLiteral::parse(value, &self.context.timezone)
            .ok_or_else(|| InvalidComparisonReason::NotADate(value.to_string()))?;
        if literal.precision == DatePrecision::Minute
            && self.field.date_precision == DatePrecision::Day
        {
            return Err(InvalidComparisonReason::TimeNotSupported(value.to_string()));
        }
        Ok(())
    }

    fn check_current_date_time(&self, period: Option<&Period>) -> Result<(), InvalidComparisonReason> {
        DateLiteral::current(
            self.context.now,
            &self.context.timezone,
            period,
            self.field.date_precision,
        )
        .map(|_| ())
        .ok_or(InvalidComparisonReason::PeriodOutOfRange)
    }

    fn check_between_bound(&self, bound: &ValueWrapper) -> Result<(), InvalidComparisonReason> {
        match (self.field.shape, bound) {
            (_, ValueWrapper::Simple(value)) if value.is_empty() => {
                Err(InvalidComparisonReason::EmptyValue)
            }
            (FieldShape::Numeric, ValueWrapper::Simple(value)) => parse_number(value)
                .map(|_| ())
                .ok_or_else(|| InvalidComparisonReason::NotANumber(value.clone())),
            (FieldShape::Date, ValueWrapper::Simple(value)) => self.check_date(value),
            (FieldShape::Date, ValueWrapper::CurrentDateTime(period)) => {
                self.check_current_date_time(period.as_ref())
            }
            (_, other) => self.unsupported(other),
        }
    }
}

impl ValueWrapperVisitor for ValueChecker<'_> {
    type Output = Result<(), InvalidComparisonReason>;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        if value.is_empty() {
            return self.check_empty_value();
        }
        match self.field.shape {
            FieldShape::Numeric => parse_number(value)
                .map(|_| ())
                .ok_or_else(|| InvalidComparisonReason::NotANumber(value.to_string())),
            FieldShape::Date => self.check_date(value),
            FieldShape::StatusSemantic
            | FieldShape::Text
            | FieldShape::StaticList
            | FieldShape::UserList => Ok(()),
        }
    }

    fn visit_in_value(&self, values: &[String]) -> Self::Output {
        match self.field.shape {
            FieldShape::StaticList | FieldShape::UserList => {
                if values.is_empty() || values.iter().any(|value| value.is_empty()) {
                    Err(InvalidComparisonReason::EmptyValue)
                } else {
                    Ok(())
                }
            }
            _ => self.unsupported(&ValueWrapper::In(Vec::new())),
        }
    }

    fn visit_between_value(&self, low: &ValueWrapper, high: &ValueWrapper) -> Self::Output {
        match self.field.shape {
            FieldShape::Numeric | FieldShape::Date => {
                self.check_between_bound(low)?;
                self.check_between_bound(high)
            }
            _ => Err(InvalidComparisonReason::ValueNotSupported(ValueKind::Between)),
        }
    }

    fn visit_current_user_value(&self) -> Self::Output {
        let id = self.context.user.id;
        match self.field.shape {
            FieldShape::UserList => i64::try_from(id)
                .map(drop)
                .map_err(|_| InvalidComparisonReason::UserIdOutOfRange(id)),
            _ => self.unsupported(&ValueWrapper::CurrentUser),
        }
    }

    fn visit_current_date_time_value(&self, period: Option<&Period>) -> Self::Output {
        match self.field.shape {
            FieldShape::Date => self.check_current_date_time(period),
            _ => self.unsupported(&ValueWrapper::CurrentDateTime(None)),
        }
    }

    fn visit_status_open_value(&self) -> Self::Output {
        match self.field.shape {
            FieldShape::StatusSemantic => Ok(()),
            _ => self.unsupported(&ValueWrapper::StatusOpen),
        }
    }
}

pub fn validate_relationship(condition: &RelationshipCondition) -> Result<(), InvalidComparisonFault> {
    match &condition.target {
        None => Ok(()),
        Some(RelationshipTarget::Artifact(id)) => match parse_artifact_id(id) {
            Some(_) => Ok(()),
            None => Err(InvalidComparisonFault::relationship(
                condition,
                "ARTIFACT",
                InvalidComparisonReason::InvalidArtifactId(id.clone()),
            )),
        },
        Some(RelationshipTarget::Tracker(name)) if name.trim().is_empty() => {
            Err(InvalidComparisonFault::relationship(
                condition,
                "TRACKER",
                InvalidComparisonReason::EmptyTrackerName,
            ))
        }
        Some(RelationshipTarget::Tracker(_)) => Ok(()),
    }
}

/// Decimal number with an optional leading minus. Exponents, `inf` and `NaN` are refused.
pub fn parse_number(text: &str) -> Option<f64> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    text.parse().ok()
}

/// Strictly positive artifact id that fits a signed 64 bits column.
pub fn parse_artifact_id(text: &str) -> Option<i64> {
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    text.parse::<i64>().ok().filter(|id| *id > 0)
}
