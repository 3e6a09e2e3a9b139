//! Select builders: the columns a result row shows for a field, with the joins they read.
//!
//! Unlike the from/where builders, these joins only widen the rows. Artifacts of a tracker
//! lacking the field keep their row with NULL columns.

use sea_query::{Expr, SelectStatement, SimpleExpr};

use super::{column, JoinFragment};
use crate::duck_typed_field::DuckTypedField;
use crate::schema::{alias, id_list, ColumnName, TableName, CHANGESET, TRACKER};

/// A result column: expression and the key it is returned under.
#[derive(Debug, Clone)]
pub struct SelectColumn {
    pub expression: SimpleExpr,
    pub key: String,
}

/// Columns of one field and the joins they read from.
#[derive(Debug, Clone)]
pub struct ParametrizedSelectFrom {
    pub columns: Vec<SelectColumn>,
    pub joins: Vec<JoinFragment>,
}

impl ParametrizedSelectFrom {
    pub fn apply_to(&self, select: &mut SelectStatement) {
        for column in &self.columns {
            select.expr_as(column.expression.clone(), alias(&column.key));
        }
        for join in &self.joins {
            join.apply_to(select);
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.key.as_str()).collect()
    }
}

/// Label, open value and color of each value of a static list, one row per value.
///
/// Bound values are read through `tracker_changeset_value_list`, values typed in an open
/// list through `tracker_changeset_value_openlist`.
pub struct StaticListSelectFromBuilder<'a> {
    field: &'a DuckTypedField,
    /// Suffix shared by the result keys and the join aliases
    key: &'a str,
}

impl<'a> StaticListSelectFromBuilder<'a> {
    pub fn new(field: &'a DuckTypedField, key: &'a str) -> Self {
        Self { field, key }
    }

    pub fn build(&self) -> ParametrizedSelectFrom {
        let key = self.key;
        let tracker_field = format!("tf_sel_{key}");
        let changeset_value = format!("cv_sel_{key}");
        let openlist_value = format!("cvo_sel_{key}");
        let open_value = format!("tfov_sel_{key}");
        let list_value = format!("tcvl_sel_{key}");
        let static_value = format!("tflbsv_sel_{key}");
        let decorator = format!("tflbd_sel_{key}");

        let joins = vec![
            JoinFragment::table(
                tracker_field.clone(),
                TableName::Field,
                column(TRACKER, ColumnName::Id)
                    .equals((alias(&tracker_field), ColumnName::TrackerId))
                    .and(Expr::cust(format!(
                        "{tracker_field}.id IN ({})",
                        id_list(self.field.field_ids())
                    ))),
            ),
            JoinFragment::table(
                changeset_value.clone(),
                TableName::ChangesetValue,
                column(&tracker_field, ColumnName::Id)
                    .equals((alias(&changeset_value), ColumnName::FieldId))
                    .and(
                        column(CHANGESET, ColumnName::Id)
                            .equals((alias(&changeset_value), ColumnName::ChangesetId)),
                    ),
            ),
            JoinFragment::table(
                openlist_value.clone(),
                TableName::ChangesetValueOpenList,
                column(&openlist_value, ColumnName::ChangesetValueId)
                    .equals((alias(&changeset_value), ColumnName::Id)),
            ),
            JoinFragment::table(
                open_value.clone(),
                TableName::OpenListValue,
                column(&open_value, ColumnName::Id)
                    .equals((alias(&openlist_value), ColumnName::OpenvalueId)),
            ),
            JoinFragment::table(
                list_value.clone(),
                TableName::ChangesetValueList,
                column(&list_value, ColumnName::ChangesetValueId)
                    .equals((alias(&changeset_value), ColumnName::Id)),
            ),
            JoinFragment::table(
                static_value.clone(),
                TableName::ListBindStaticValue,
                column(&openlist_value, ColumnName::BindvalueId)
                    .equals((alias(&static_value), ColumnName::Id))
                    .or(column(&list_value, ColumnName::BindvalueId)
                        .equals((alias(&static_value), ColumnName::Id))),
            ),
            JoinFragment::table(
                decorator.clone(),
                TableName::ListBindDecorator,
                column(&static_value, ColumnName::Id)
                    .equals((alias(&decorator), ColumnName::ValueId)),
            ),
        ];

        let columns = vec![
            SelectColumn {
                expression: column(&static_value, ColumnName::Label).into(),
                key: format!("list_value_{key}"),
            },
            SelectColumn {
                expression: column(&open_value, ColumnName::Label).into(),
                key: format!("open_value_{key}"),
            },
            SelectColumn {
                expression: column(&decorator, ColumnName::TlpColorName).into(),
                key: format!("color_value_{key}"),
            },
        ];

        ParametrizedSelectFrom { columns, joins }
    }
}
