use super::{bind, column, constant, FieldComparison, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::schema::{ColumnName, TableName};

/// String and text fields, title and description semantics.
pub struct TextFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

impl<'a> TextFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }
}

impl ValueWrapperVisitor for TextFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        let comparison = &self.comparison;
        let field_ids = comparison.field_ids(ValueKind::Simple);
        let tf = comparison.aliases.changeset_value();
        let cvt = comparison.aliases.text_value();
        let joins = vec![
            comparison.changeset_value_join(field_ids),
            comparison.value_join(cvt.clone(), TableName::ChangesetValueText),
        ];

        let mut parameters = Vec::new();
        let text = || column(&cvt, ColumnName::Value);
        let condition = match (comparison.comparison_type, value.is_empty()) {
            (ComparisonType::Equal, true) => text().is_null().or(text().eq(constant(""))),
            (ComparisonType::NotEqual, true) => {
                text().is_not_null().and(text().ne(constant("")))
            }
            (ComparisonType::Equal, false) => text().eq(bind(&mut parameters, value)),
            (ComparisonType::NotEqual, false) => column(&tf, ColumnName::Id)
                .is_not_null()
                .and(text().is_null().or(text().ne(bind(&mut parameters, value)))),
            _ => comparison.unsupported(ValueKind::Simple),
        };

        ParametrizedFromWhere::new(joins, condition, parameters)
    }

    fn visit_in_value(&self, _values: &[String]) -> Self::Output {
        self.comparison.unsupported(ValueKind::In)
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
    use sea_query::Value;

    #[test]
    fn test_equal_binds_the_value() {
        let field = fields("summary", FieldShape::Text, vec![11, 21]);
        let from_where = build(&field, ComparisonType::Equal, ValueWrapper::simple("foo"));
        assert_eq!(aliases(&from_where), vec!["tf_summary", "cvt_summary"]);

        let (sql, values) = render(&from_where);
        assert!(sql.contains("tf_summary.field_id IN (11, 21)"));
        assert!(sql.contains("`cvt_summary`.`value` = ?"));
        assert_eq!(values, vec![Value::from("foo")]);
        assert_eq!(from_where.parameters, values);
    }

    #[test]
    fn test_not_equal_requires_the_field() {
        let field = fields("summary", FieldShape::Text, vec![11]);
        let from_where = build(&field, ComparisonType::NotEqual, ValueWrapper::simple("foo"));
        let (sql, values) = render(&from_where);
        assert!(sql.contains("`tf_summary`.`id` IS NOT NULL"));
        assert!(sql.contains("`cvt_summary`.`value` <> ?"));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_empty_value_binds_nothing() {
        let field = fields("summary", FieldShape::Text, vec![11]);
        let from_where = build(&field, ComparisonType::Equal, ValueWrapper::simple(""));
        let (sql, values) = render(&from_where);
        assert!(sql.contains("`cvt_summary`.`value` IS NULL"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_empty_value_ignores_trackers_without_the_field() {
        let mut field = fields("details", FieldShape::Text, vec![17]);
        field.trackers_without_field = vec![2, 3];
        let from_where = build(&field, ComparisonType::Equal, ValueWrapper::simple(""));
        let (sql, values) = render(&from_where);
        assert!(sql.contains("(artifact.tracker_id NOT IN (2, 3)) AND ("));
        assert!(sql.contains("`cvt_details`.`value` IS NULL"));
        assert!(values.is_empty());
    }

    #[test]
    #[should_panic(expected = "cannot be compared")]
    fn test_unvalidated_comparison_panics() {
        let field = fields("summary", FieldShape::Text, vec![11]);
        build(&field, ComparisonType::Equal, ValueWrapper::CurrentUser);
    }
}
