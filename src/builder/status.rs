use sea_query::{Expr, JoinType, Query, SelectStatement};

use super::static_list::{bind_all, labelled_values, list_condition};
use super::{column, FieldComparison, JoinFragment, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::metadata::FieldId;
use crate::schema::{alias, id_list, ColumnName, TableName, CHANGESET};

/// Status semantic: `OPEN()` or a status label.
pub struct StatusFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

impl<'a> StatusFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }

    /// Changesets whose status field holds one of the values marked open.
    fn open_changesets(field_ids: &[FieldId]) -> SelectStatement {
        Query::select()
            .column((alias("cv"), ColumnName::ChangesetId))
            .from_as(TableName::ChangesetValue, alias("cv"))
            .join_as(
                JoinType::InnerJoin,
                TableName::ChangesetValueList,
                alias("cvl"),
                column("cvl", ColumnName::ChangesetValueId).equals((alias("cv"), ColumnName::Id)),
            )
            .join_as(
                JoinType::InnerJoin,
                TableName::SemanticStatus,
                alias("ss"),
                column("ss", ColumnName::FieldId)
                    .equals((alias("cv"), ColumnName::FieldId))
                    .and(column("ss", ColumnName::OpenValueId).equals((alias("cvl"), ColumnName::BindvalueId))),
            )
            .and_where(Expr::cust(format!(
                "cv.field_id IN ({})",
                id_list(field_ids)
            )))
            .to_owned()
    }
}

impl ValueWrapperVisitor for StatusFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        let comparison = &self.comparison;
        if value.is_empty() {
            comparison.unsupported(ValueKind::Simple)
        }
        let join = comparison.changeset_value_join(comparison.field_ids(ValueKind::Simple));
        let mut parameters = Vec::new();
        let labels = bind_all(&[value.to_string()], &mut parameters);
        let condition = list_condition(comparison, ValueKind::Simple, labelled_values(labels));
        ParametrizedFromWhere::new(vec![join], condition, parameters)
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
        let comparison = &self.comparison;
        let field_ids = comparison.field_ids(ValueKind::StatusOpen);
        let open = comparison.aliases.open_status();
        let open_join = JoinFragment::subquery(
            open.clone(),
            Self::open_changesets(field_ids),
            column(&open, ColumnName::ChangesetId).equals((alias(CHANGESET), ColumnName::Id)),
        );

        match comparison.comparison_type {
            ComparisonType::Equal => ParametrizedFromWhere::new(
                vec![open_join],
                column(&open, ColumnName::ChangesetId).is_not_null(),
                Vec::new(),
            ),
            // Artifacts of trackers without status are neither open nor closed
            ComparisonType::NotEqual => ParametrizedFromWhere::new(
                vec![comparison.changeset_value_join(field_ids), open_join],
                column(&comparison.aliases.changeset_value(), ColumnName::Id)
                    .is_not_null()
                    .and(column(&open, ColumnName::ChangesetId).is_null()),
                Vec::new(),
            ),
            _ => comparison.unsupported(ValueKind::StatusOpen),
        }
    }
}
