//! From/where builders: one value visitor per field shape.
//!
//! A builder turns a validated comparison into the joins it needs and a boolean
//! condition on them. User supplied values only ever enter the condition as bound
//! [`Value`]s; field ids, tracker ids and constants are trusted and inlined.

pub mod alias;
pub mod date;
pub mod numeric;
pub mod relationship;
pub mod select;
pub mod static_list;
pub mod status;
pub mod text;
pub mod user_list;

use sea_query::{Expr, JoinType, SelectStatement, SimpleExpr, Value};

use crate::ast::{Comparison, ComparisonType, RelationshipCondition, ValueKind};
use crate::duck_typed_field::{DuckTypedField, FieldShape, ValueSource};
use crate::metadata::FieldId;
use crate::schema::{alias, id_list, ColumnName, TableName, ARTIFACT, CHANGESET};
use crate::sql_compiler::CompilationContext;

pub use alias::{AliasRegistry, SubjectAliases};

/// What a join reads from.
#[derive(Debug, Clone)]
pub enum JoinSource {
    Table(TableName),
    Subquery(SelectStatement),
}

/// `LEFT JOIN <source> AS <alias> ON <on>`
#[derive(Debug, Clone)]
pub struct JoinFragment {
    pub alias: String,
    pub source: JoinSource,
    pub on: SimpleExpr,
}

impl JoinFragment {
    pub fn table(alias: String, table: TableName, on: SimpleExpr) -> Self {
        Self {
            alias,
            source: JoinSource::Table(table),
            on,
        }
    }

    pub fn subquery(alias: String, query: SelectStatement, on: SimpleExpr) -> Self {
        Self {
            alias,
            source: JoinSource::Subquery(query),
            on,
        }
    }

    /// Fields may be missing from some trackers, so every fragment is a left join.
    pub fn apply_to(&self, select: &mut SelectStatement) {
        match &self.source {
            JoinSource::Table(table) => {
                select.join_as(JoinType::LeftJoin, *table, alias(&self.alias), self.on.clone());
            }
            JoinSource::Subquery(query) => {
                select.join_subquery(
                    JoinType::LeftJoin,
                    query.clone(),
                    alias(&self.alias),
                    self.on.clone(),
                );
            }
        }
    }
}

/// Joins, condition and the values bound in the condition, in placeholder order.
#[derive(Debug, Clone)]
pub struct ParametrizedFromWhere {
    pub joins: Vec<JoinFragment>,
    pub condition: SimpleExpr,
    pub parameters: Vec<Value>,
}

impl ParametrizedFromWhere {
    pub fn new(joins: Vec<JoinFragment>, condition: SimpleExpr, parameters: Vec<Value>) -> Self {
        Self {
            joins,
            condition,
            parameters,
        }
    }

    /// Artifacts of a tracker lacking the field never match the comparison, even when
    /// the condition tests for missing values.
    fn within_trackers_having(mut self, field: &DuckTypedField) -> Self {
        if field.trackers_without_field.is_empty() {
            return self;
        }
        let guard = Expr::cust(format!(
            "{ARTIFACT}.tracker_id NOT IN ({})",
            id_list(&field.trackers_without_field)
        ));
        self.condition = guard.and(self.condition);
        self
    }
}

/// A validated comparison together with everything a builder needs to compile it.
#[derive(Debug, Clone, Copy)]
pub struct FieldComparison<'a> {
    pub field: &'a DuckTypedField,
    pub comparison_type: ComparisonType,
    pub aliases: &'a SubjectAliases,
    pub context: &'a CompilationContext,
}

impl FieldComparison<'_> {
    /// Validation lets through only what builders can compile.
    pub fn unsupported(&self, value: ValueKind) -> ! {
        panic!(
            "{} field {} cannot be compared with {} to {}, validation should have rejected it",
            self.field.shape, self.field.subject, self.comparison_type, value
        )
    }

    pub fn field_ids(&self, value: ValueKind) -> &[FieldId] {
        match &self.field.source {
            ValueSource::Fields(ids) => ids,
            ValueSource::Column(_) => self.unsupported(value),
        }
    }

    /// Value row of the subject's fields in the last changeset of the artifact.
    pub fn changeset_value_join(&self, field_ids: &[FieldId]) -> JoinFragment {
        let tf = self.aliases.changeset_value();
        let on = column(&tf, ColumnName::ChangesetId)
            .equals((alias(CHANGESET), ColumnName::Id))
            .and(Expr::cust(format!(
                "{tf}.field_id IN ({})",
                id_list(field_ids)
            )));
        JoinFragment::table(tf, TableName::ChangesetValue, on)
    }

    /// Join of a value table hanging off the changeset value row.
    pub fn value_join(&self, alias_name: String, table: TableName) -> JoinFragment {
        let on = column(&alias_name, ColumnName::ChangesetValueId)
            .equals((alias(&self.aliases.changeset_value()), ColumnName::Id));
        JoinFragment::table(alias_name, table, on)
    }
}

/// `table.column`
pub fn column(table: &str, column: ColumnName) -> Expr {
    Expr::col((alias(table), column))
}

/// Records `value` as a parameter and returns its placeholder expression.
pub fn bind(parameters: &mut Vec<Value>, value: impl Into<Value>) -> SimpleExpr {
    let value = value.into();
    parameters.push(value.clone());
    SimpleExpr::Value(value)
}

/// Trusted constant inlined in the SQL text.
pub fn constant(value: impl Into<Value>) -> SimpleExpr {
    SimpleExpr::Constant(value.into())
}

/// Compiles a validated artifact-link condition.
pub fn build_relationship(condition: &RelationshipCondition) -> ParametrizedFromWhere {
    relationship::RelationshipFromWhereBuilder::new(condition).build()
}

/// Compiles a validated comparison with the builder matching the field shape.
pub fn build_comparison(
    comparison: &Comparison,
    field: &DuckTypedField,
    aliases: &SubjectAliases,
    context: &CompilationContext,
) -> ParametrizedFromWhere {
    let target = FieldComparison {
        field,
        comparison_type: comparison.comparison_type,
        aliases,
        context,
    };
    let from_where = match field.shape {
        FieldShape::StatusSemantic => comparison
            .value
            .accept(&status::StatusFromWhereBuilder::new(target)),
        FieldShape::Text => comparison.value.accept(&text::TextFromWhereBuilder::new(target)),
        FieldShape::Numeric => comparison
            .value
            .accept(&numeric::NumericFromWhereBuilder::new(target)),
        FieldShape::Date => comparison.value.accept(&date::DateFromWhereBuilder::new(target)),
        FieldShape::StaticList => comparison
            .value
            .accept(&static_list::StaticListFromWhereBuilder::new(target)),
        FieldShape::UserList => comparison
            .value
            .accept(&user_list::UserListFromWhereBuilder::new(target)),
    };
    from_where.within_trackers_having(field)
}

#[cfg(test)]
pub(crate) mod test_support {
    use sea_query::{Alias, Asterisk, MysqlQueryBuilder, Query};

    use super::*;
    use crate::ast::{Subject, ValueWrapper};
    use crate::duck_typed_field::{ArtifactColumn, DatePrecision};
    use crate::metadata::User;
    use chrono::{TimeZone, Utc};

    pub fn context() -> CompilationContext {
        CompilationContext::new(User::new(42, "alice"))
            .with_now(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
    }

    pub fn fields(name: &str, shape: FieldShape, ids: Vec<FieldId>) -> DuckTypedField {
        DuckTypedField {
            subject: Subject::field(name),
            shape,
            source: ValueSource::Fields(ids),
            date_precision: DatePrecision::Day,
            trackers_without_field: Vec::new(),
        }
    }

    pub fn column_field(subject: Subject, shape: FieldShape, column: ArtifactColumn) -> DuckTypedField {
        DuckTypedField::from_column(subject, shape, column)
    }

    pub fn build(
        field: &DuckTypedField,
        comparison_type: ComparisonType,
        value: ValueWrapper,
    ) -> ParametrizedFromWhere {
        let mut registry = AliasRegistry::new();
        let aliases = registry.aliases_for(&field.subject);
        let comparison = Comparison::new(field.subject.clone(), comparison_type, value);
        build_comparison(&comparison, field, &aliases, &context())
    }

    /// Renders the fragment in a throwaway statement: joins and condition only.
    pub fn render(from_where: &ParametrizedFromWhere) -> (String, Vec<Value>) {
        let mut select = Query::select();
        select.column(Asterisk).from_as(Alias::new("t"), Alias::new("changeset"));
        for join in &from_where.joins {
            join.apply_to(&mut select);
        }
        select.and_where(from_where.condition.clone());
        let (sql, values) = select.build(MysqlQueryBuilder);
        (sql, values.0)
    }

    pub fn aliases(from_where: &ParametrizedFromWhere) -> Vec<&str> {
        from_where.joins.iter().map(|join| join.alias.as_str()).collect()
    }
}
