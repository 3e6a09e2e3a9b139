//! Dates are unix timestamps. A literal stands for a whole day or minute, so equality and
//! the inclusive/exclusive bounds are expressed against the start of that interval with a
//! single bound parameter each.

use sea_query::{Expr, SimpleExpr, Value};

use super::{bind, column, constant, FieldComparison, JoinFragment, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::date_literal::DateLiteral;
use crate::duck_typed_field::{ArtifactColumn, ValueSource};
use crate::schema::{ColumnName, TableName, ARTIFACT, CHANGESET};

/// Date and date-time fields, `@submitted_on`, `@last_update_date`.
pub struct DateFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

/// Where the timestamps come from.
struct DateOperand {
    joins: Vec<JoinFragment>,
    value: SimpleExpr,
    /// `tf.id IS NOT NULL` when values live in a field that some trackers lack
    field_present: Option<SimpleExpr>,
}

impl<'a> DateFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }

    fn operand(&self, value: ValueKind) -> DateOperand {
        let comparison = &self.comparison;
        match &comparison.field.source {
            ValueSource::Fields(field_ids) => {
                let cvd = comparison.aliases.date_value();
                let tf = comparison.aliases.changeset_value();
                DateOperand {
                    value: column(&cvd, ColumnName::Value).into(),
                    joins: vec![
                        comparison.changeset_value_join(field_ids),
                        comparison.value_join(cvd, TableName::ChangesetValueDate),
                    ],
                    field_present: Some(column(&tf, ColumnName::Id).is_not_null()),
                }
            }
            ValueSource::Column(ArtifactColumn::SubmittedOn) => DateOperand {
                joins: Vec::new(),
                value: column(ARTIFACT, ColumnName::SubmittedOn).into(),
                field_present: None,
            },
            ValueSource::Column(ArtifactColumn::LastUpdateDate) => DateOperand {
                joins: Vec::new(),
                value: column(CHANGESET, ColumnName::SubmittedOn).into(),
                field_present: None,
            },
            ValueSource::Column(_) => comparison.unsupported(value),
        }
    }

    fn literal(&self, value: &ValueWrapper) -> DateLiteral {
        let context = self.comparison.context;
        let literal = match value {
            ValueWrapper::Simple(text) => DateLiteral::parse(text, &context.timezone),
            ValueWrapper::CurrentDateTime(period) => DateLiteral::current(
                context.now,
                &context.timezone,
                period.as_ref(),
                self.comparison.field.date_precision,
            ),
            _ => None,
        };
        literal.unwrap_or_else(|| self.comparison.unsupported(value.kind()))
    }

    fn compare(&self, value: &ValueWrapper) -> ParametrizedFromWhere {
        let literal = self.literal(value);
        let operand = self.operand(value.kind());
        let mut parameters = Vec::new();

        let condition = match self.comparison.comparison_type {
            ComparisonType::Equal => within(&operand.value, literal, &mut parameters),
            ComparisonType::NotEqual => {
                let outside = within(&operand.value, literal, &mut parameters).not();
                match operand.field_present {
                    Some(field_present) => field_present
                        .and(Expr::expr(operand.value.clone()).is_null().or(outside)),
                    None => outside,
                }
            }
            ComparisonType::LessThan => {
                Expr::expr(operand.value.clone()).lt(bind(&mut parameters, literal.timestamp))
            }
            ComparisonType::LessThanOrEqual => {
                distance(&operand.value, literal, &mut parameters).lt(constant(literal.span()))
            }
            ComparisonType::GreaterThan => {
                distance(&operand.value, literal, &mut parameters).gte(constant(literal.span()))
            }
            ComparisonType::GreaterThanOrEqual => {
                Expr::expr(operand.value.clone()).gte(bind(&mut parameters, literal.timestamp))
            }
            _ => self.comparison.unsupported(value.kind()),
        };

        ParametrizedFromWhere::new(operand.joins, condition, parameters)
    }
}

/// `value - ?`
fn distance(value: &SimpleExpr, literal: DateLiteral, parameters: &mut Vec<Value>) -> Expr {
    Expr::expr(Expr::expr(value.clone()).sub(bind(parameters, literal.timestamp)))
}

/// `value - ? BETWEEN 0 AND span - 1`
fn within(value: &SimpleExpr, literal: DateLiteral, parameters: &mut Vec<Value>) -> SimpleExpr {
    distance(value, literal, parameters).between(constant(0), constant(literal.span() - 1))
}

impl ValueWrapperVisitor for DateFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        if !value.is_empty() {
            return self.compare(&ValueWrapper::simple(value));
        }

        let operand = self.operand(ValueKind::Simple);
        let value = || Expr::expr(operand.value.clone());
        let condition = match self.comparison.comparison_type {
            ComparisonType::Equal => value().is_null(),
            ComparisonType::NotEqual => value().is_not_null(),
            _ => self.comparison.unsupported(ValueKind::Simple),
        };
        ParametrizedFromWhere::new(operand.joins, condition, Vec::new())
    }

    fn visit_in_value(&self, _values: &[String]) -> Self::Output {
        self.comparison.unsupported(ValueKind::In)
    }

    fn visit_between_value(&self, low: &ValueWrapper, high: &ValueWrapper) -> Self::Output {
        if self.comparison.comparison_type != ComparisonType::Between {
            self.comparison.unsupported(ValueKind::Between)
        }
        let low = self.literal(low);
        let high = self.literal(high);
        let operand = self.operand(ValueKind::Between);

        let mut parameters = Vec::new();
        let condition = Expr::expr(operand.value.clone())
            .gte(bind(&mut parameters, low.timestamp))
            .and(distance(&operand.value, high, &mut parameters).lt(constant(high.span())));
        ParametrizedFromWhere::new(operand.joins, condition, parameters)
    }

    fn visit_current_user_value(&self) -> Self::Output {
        self.comparison.unsupported(ValueKind::CurrentUser)
    }

    fn visit_current_date_time_value(&self, period: Option<&Period>) -> Self::Output {
        self.compare(&ValueWrapper::CurrentDateTime(period.copied()))
    }

    fn visit_status_open_value(&self) -> Self::Output {
        self.comparison.unsupported(ValueKind::StatusOpen)
    }
}
