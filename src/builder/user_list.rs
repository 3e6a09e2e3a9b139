use sea_query::{Expr, JoinType, Query, SelectStatement, SimpleExpr, Value};

use super::static_list::{bind_all, empty_list_condition, list_condition};
use super::{bind, column, FieldComparison, JoinFragment, ParametrizedFromWhere};
use crate::ast::{ComparisonType, Period, ValueKind, ValueWrapper, ValueWrapperVisitor};
use crate::duck_typed_field::{ArtifactColumn, ValueSource};
use crate::schema::{alias, ColumnName, TableName, ARTIFACT, CHANGESET};

const LIST_VALUE: &str = "cvl";
const LIST_USER: &str = "usr";

/// Lists bound to users, the contributor semantic, `@submitted_by`, `@last_update_by`.
pub struct UserListFromWhereBuilder<'a> {
    comparison: FieldComparison<'a>,
}

impl<'a> UserListFromWhereBuilder<'a> {
    pub fn new(comparison: FieldComparison<'a>) -> Self {
        Self { comparison }
    }

    /// Column holding the user id, for subjects stored on the artifact or changeset.
    fn user_column(&self, value: ValueKind) -> Option<Expr> {
        match &self.comparison.field.source {
            ValueSource::Fields(_) => None,
            ValueSource::Column(ArtifactColumn::SubmittedBy) => {
                Some(column(ARTIFACT, ColumnName::SubmittedBy))
            }
            ValueSource::Column(ArtifactColumn::LastUpdateBy) => {
                Some(column(CHANGESET, ColumnName::SubmittedBy))
            }
            ValueSource::Column(_) => self.comparison.unsupported(value),
        }
    }

    fn user_names(&self, value: ValueKind, names: &[String]) -> ParametrizedFromWhere {
        let comparison = &self.comparison;
        let mut parameters = Vec::new();

        let Some(user_column) = self.user_column(value) else {
            let join = comparison.changeset_value_join(comparison.field_ids(value));
            let names = bind_all(names, &mut parameters);
            let condition = list_condition(comparison, value, users_named(names));
            return ParametrizedFromWhere::new(vec![join], condition, parameters);
        };

        let user = comparison.aliases.user();
        let join = JoinFragment::table(
            user.clone(),
            TableName::User,
            column(&user, ColumnName::UserId).eq(user_column),
        );
        let name = || column(&user, ColumnName::UserName);
        let condition = match comparison.comparison_type {
            ComparisonType::Equal => name().eq(bind(&mut parameters, names[0].as_str())),
            ComparisonType::NotEqual => name().ne(bind(&mut parameters, names[0].as_str())),
            ComparisonType::In => name().is_in(bind_all(names, &mut parameters)),
            ComparisonType::NotIn => name().is_not_in(bind_all(names, &mut parameters)),
            _ => comparison.unsupported(value),
        };
        ParametrizedFromWhere::new(vec![join], condition, parameters)
    }
}

/// Changeset values of a list holding one of the users named `names`.
fn users_named(names: Vec<SimpleExpr>) -> SelectStatement {
    Query::select()
        .column((alias(LIST_VALUE), ColumnName::ChangesetValueId))
        .from_as(TableName::ChangesetValueList, alias(LIST_VALUE))
        .join_as(
            JoinType::InnerJoin,
            TableName::User,
            alias(LIST_USER),
            column(LIST_USER, ColumnName::UserId).equals((alias(LIST_VALUE), ColumnName::BindvalueId)),
        )
        .and_where(column(LIST_USER, ColumnName::UserName).is_in(names))
        .to_owned()
}

/// Changeset values of a list holding the user `user_id`.
fn user_with_id(user_id: SimpleExpr) -> SelectStatement {
    Query::select()
        .column((alias(LIST_VALUE), ColumnName::ChangesetValueId))
        .from_as(TableName::ChangesetValueList, alias(LIST_VALUE))
        .and_where(column(LIST_VALUE, ColumnName::BindvalueId).eq(user_id))
        .to_owned()
}

impl ValueWrapperVisitor for UserListFromWhereBuilder<'_> {
    type Output = ParametrizedFromWhere;

    fn visit_simple_value(&self, value: &str) -> Self::Output {
        if !value.is_empty() {
            return self.user_names(ValueKind::Simple, &[value.to_string()]);
        }
        let comparison = &self.comparison;
        let join = comparison.changeset_value_join(comparison.field_ids(ValueKind::Simple));
        ParametrizedFromWhere::new(vec![join], empty_list_condition(comparison), Vec::new())
    }

    fn visit_in_value(&self, values: &[String]) -> Self::Output {
        self.user_names(ValueKind::In, values)
    }

    fn visit_between_value(&self, _low: &ValueWrapper, _high: &ValueWrapper) -> Self::Output {
        self.comparison.unsupported(ValueKind::Between)
    }

    /// Anonymous users have id 0, which matches nobody.
    fn visit_current_user_value(&self) -> Self::Output {
        let comparison = &self.comparison;
        let Ok(id) = i64::try_from(comparison.context.user.id) else {
            comparison.unsupported(ValueKind::CurrentUser)
        };
        let mut parameters = Vec::new();
        let user_id = bind(&mut parameters, Value::BigInt(Some(id)));

        let Some(user_column) = self.user_column(ValueKind::CurrentUser) else {
            let join = comparison.changeset_value_join(comparison.field_ids(ValueKind::CurrentUser));
            let condition = list_condition(comparison, ValueKind::CurrentUser, user_with_id(user_id));
            return ParametrizedFromWhere::new(vec![join], condition, parameters);
        };

        let condition = match comparison.comparison_type {
            ComparisonType::Equal => user_column.eq(user_id),
            ComparisonType::NotEqual => user_column.ne(user_id),
            _ => comparison.unsupported(ValueKind::CurrentUser),
        };
        ParametrizedFromWhere::new(Vec::new(), condition, parameters)
    }

    fn visit_current_date_time_value(&self, _period: Option<&Period>) -> Self::Output {
        self.comparison.unsupported(ValueKind::CurrentDateTime)
    }

    fn visit_status_open_value(&self) -> Self::Output {
        self.comparison.unsupported(ValueKind::StatusOpen)
    }
}
