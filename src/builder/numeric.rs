use sea_query::{Expr, Func, SimpleExpr, Value};

use super::{bind, column, FieldComparison, JoinFragment, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::duck_typed_field::{ArtifactColumn, ValueSource};
use crate::schema::{ColumnName, TableName, ARTIFACT};
use crate::validator::parse_number;

/// Int and float fields, `@id`.
pub struct NumericFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

impl<'a> NumericFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }

    /// Joins and the expression holding the compared number.
    fn operand(&self, value: ValueKind) -> (Vec<JoinFragment>, SimpleExpr) {
        let comparison = &self.comparison;
        match &comparison.field.source {
            ValueSource::Fields(field_ids) => {
                let cvi = comparison.aliases.int_value();
                let cvf = comparison.aliases.float_value();
                let values: [SimpleExpr; 2] = [
                    column(&cvi, ColumnName::Value).into(),
                    column(&cvf, ColumnName::Value).into(),
                ];
                let operand: SimpleExpr = Func::coalesce(values).into();
                let joins = vec![
                    comparison.changeset_value_join(field_ids),
                    comparison.value_join(cvi, TableName::ChangesetValueInt),
                    comparison.value_join(cvf, TableName::ChangesetValueFloat),
                ];
                (joins, operand)
            }
            ValueSource::Column(ArtifactColumn::ArtifactId) => {
                (Vec::new(), column(ARTIFACT, ColumnName::Id).into())
            }
            ValueSource::Column(_) => comparison.unsupported(value),
        }
    }

    fn number(&self, text: &str) -> Value {
        let Some(number) = parse_number(text) else {
            self.comparison.unsupported(ValueKind::Simple)
        };
        match text.parse::<i64>() {
            Ok(integer) => Value::BigInt(Some(integer)),
            Err(_) => Value::Double(Some(number)),
        }
    }

    fn bound(&self, bound: &ValueWrapper, parameters: &mut Vec<Value>) -> SimpleExpr {
        match bound {
            ValueWrapper::Simple(text) if !text.is_empty() => bind(parameters, self.number(text)),
            other => self.comparison.unsupported(other.kind()),
        }
    }
}

impl ValueWrapperVisitor for NumericFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        let (joins, operand) = self.operand(ValueKind::Simple);
        let operand = || Expr::expr(operand.clone());

        if value.is_empty() {
            let condition = match self.comparison.comparison_type {
                ComparisonType::Equal => operand().is_null(),
                ComparisonType::NotEqual => operand().is_not_null(),
                _ => self.comparison.unsupported(ValueKind::Simple),
            };
            return ParametrizedFromWhere::new(joins, condition, Vec::new());
        }

        let mut parameters = Vec::new();
        let number = bind(&mut parameters, self.number(value));
        let condition = match self.comparison.comparison_type {
            ComparisonType::Equal => operand().eq(number),
            ComparisonType::NotEqual => operand().ne(number),
            ComparisonType::LessThan => operand().lt(number),
            ComparisonType::LessThanOrEqual => operand().lte(number),
            ComparisonType::GreaterThan => operand().gt(number),
            ComparisonType::GreaterThanOrEqual => operand().gte(number),
            _ => self.comparison.unsupported(ValueKind::Simple),
        };
        ParametrizedFromWhere::new(joins, condition, parameters)
    }

    fn visit_in_value(&self, _values: &[String]) -> Self::Output {
        self.comparison.unsupported(ValueKind::In)
    }

    fn visit_between_value(&self, low: &ValueWrapper, high: &ValueWrapper) -> Self::Output {
        if self.comparison.comparison_type != ComparisonType::Between {
            self.comparison.unsupported(ValueKind::Between)
        }
        let (joins, operand) = self.operand(ValueKind::Between);
        let mut parameters = Vec::new();
        let low = self.bound(low, &mut parameters);
        let high = self.bound(high, &mut parameters);
        let condition = Expr::expr(operand).between(low, high);
        ParametrizedFromWhere::new(joins, condition, parameters)
    }

    fn visit_current_user_value(&self) -> Self::Output {
        self.comparison.unsupported(ValueKind::CurrentUser)
    }

    fn visit_current_date_time_value(&self, _period: Option<&Period>) -> Self::Output {
        self.comparison.unsupported(ValueKind::CurrentDateTime)
    }

    fn visit_status_open_value(&self) -> Self::Output {
        self.comparison.unsupported(ValueKind::StatusOpen)
    }
}
