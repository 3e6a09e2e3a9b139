//! List fields hold several values per changeset, so the compared values are looked up
//! in a sub-select of matching changeset values. `!=` and `NOT IN` then exclude every
//! artifact holding one of the values, not only the rows that differ.

use sea_query::{JoinType, Query, SelectStatement, SimpleExpr, Value};

use super::{bind, column, constant, FieldComparison, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::schema::{alias, ColumnName, TableName, NONE_BINDVALUE_ID};

const LIST_VALUE: &str = "cvl";
const STATIC_VALUE: &str = "bsv";

/// Changeset values of a list holding a static value labelled with one of `labels`.
pub fn labelled_values(labels: Vec<SimpleExpr>) -> SelectStatement {
    Query::select()
        .column((alias(LIST_VALUE), ColumnName::ChangesetValueId))
        .from_as(TableName::ChangesetValueList, alias(LIST_VALUE))
        .join_as(
            JoinType::InnerJoin,
            TableName::ListBindStaticValue,
            alias(STATIC_VALUE),
            column(STATIC_VALUE, ColumnName::Id).equals((alias(LIST_VALUE), ColumnName::BindvalueId)),
        )
        .and_where(column(STATIC_VALUE, ColumnName::Label).is_in(labels))
        .to_owned()
}

/// Changeset values of a list holding anything but the "none" value.
pub fn non_empty_values() -> SelectStatement {
    Query::select()
        .column((alias(LIST_VALUE), ColumnName::ChangesetValueId))
        .from_as(TableName::ChangesetValueList, alias(LIST_VALUE))
        .and_where(column(LIST_VALUE, ColumnName::BindvalueId).ne(constant(NONE_BINDVALUE_ID)))
        .to_owned()
}

/// Condition on the subject's changeset value row against a sub-select of list values.
pub fn list_condition(
    comparison: &FieldComparison<'_>,
    value: ValueKind,
    matching_values: SelectStatement,
) -> SimpleExpr {
    let tf = comparison.aliases.changeset_value();
    match comparison.comparison_type {
        ComparisonType::Equal | ComparisonType::In => {
            column(&tf, ColumnName::Id).in_subquery(matching_values)
        }
        ComparisonType::NotEqual | ComparisonType::NotIn => column(&tf, ColumnName::Id)
            .is_not_null()
            .and(column(&tf, ColumnName::Id).not_in_subquery(matching_values)),
        _ => comparison.unsupported(value),
    }
}

/// `= ""` is "nothing selected", `!= ""` is "something selected".
pub fn empty_list_condition(comparison: &FieldComparison<'_>) -> SimpleExpr {
    let tf = comparison.aliases.changeset_value();
    match comparison.comparison_type {
        ComparisonType::Equal => column(&tf, ColumnName::Id)
            .is_null()
            .or(column(&tf, ColumnName::Id).not_in_subquery(non_empty_values())),
        ComparisonType::NotEqual => column(&tf, ColumnName::Id).in_subquery(non_empty_values()),
        _ => comparison.unsupported(ValueKind::Simple),
    }
}

pub fn bind_all(values: &[String], parameters: &mut Vec<Value>) -> Vec<SimpleExpr> {
    values
        .iter()
        .map(|value| bind(parameters, value.as_str()))
        .collect()
}

/// Lists bound to static values.
pub struct StaticListFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

impl<'a> StaticListFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }

    fn labels(&self, value: ValueKind, labels: &[String]) -> ParametrizedFromWhere {
        let comparison = &self.comparison;
        let join = comparison.changeset_value_join(comparison.field_ids(value));
        let mut parameters = Vec::new();
        let labels = bind_all(labels, &mut parameters);
        let condition = list_condition(comparison, value, labelled_values(labels));
        ParametrizedFromWhere::new(vec![join], condition, parameters)
    }
}

impl ValueWrapperVisitor for StaticListFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        if !value.is_empty() {
            return self.labels(ValueKind::Simple, &[value.to_string()]);
        }
        let comparison = &self.comparison;
        let join = comparison.changeset_value_join(comparison.field_ids(ValueKind::Simple));
        ParametrizedFromWhere::new(vec![join], empty_list_condition(comparison), Vec::new())
    }

    fn visit_in_value(&self, values: &[String]) -> Self::Output {
        self.labels(ValueKind::In, values)
    }

    fn visit_between_value(&self, _low: &ValueWrapper, _high: &ValueWrapper) -> Self::Output {
        self.comparison.unsupported(ValueKind::Between)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::{aliases, build, fields, render};
    use crate::duck_typed_field::FieldShape;

    fn category() -> crate::duck_typed_field::DuckTypedField {
        fields("category", FieldShape::StaticList, vec![31, 41])
    }

    #[test]
    fn test_in_binds_every_label_in_order() {
        let from_where = build(
            &category(),
            ComparisonType::In,
            ValueWrapper::In(vec!["ui".into(), "db".into(), "api".into()]),
        );
        assert_eq!(aliases(&from_where), vec!["tf_category"]);
        let (sql, values) = render(&from_where);
        assert!(sql.contains("`bsv`.`label` IN (?, ?, ?)"));
        assert!(sql.contains("`tf_category`.`id` IN (SELECT"));
        assert_eq!(values, vec![Value::from("ui"), Value::from("db"), Value::from("api")]);
    }

    #[test]
    fn test_not_in_excludes_artifacts_holding_a_value() {
        let from_where = build(
            &category(),
            ComparisonType::NotIn,
            ValueWrapper::In(vec!["ui".into()]),
        );
        let (sql, _) = render(&from_where);
        assert!(sql.contains("`tf_category`.`id` IS NOT NULL"));
        assert!(sql.contains("`tf_category`.`id` NOT IN (SELECT"));
    }

    #[test]
    fn test_empty_value_looks_for_the_none_value() {
        let from_where = build(&category(), ComparisonType::Equal, ValueWrapper::simple(""));
        let (sql, values) = render(&from_where);
        assert!(sql.contains("`tf_category`.`id` IS NULL"));
        assert!(sql.contains("<> 100"));
        assert!(values.is_empty());
    }
}
