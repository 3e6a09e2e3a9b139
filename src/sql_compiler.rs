//! SQL compiler that folds a parsed query into one parametrized statement using sea-query.
//!
//! Every comparison leaf is resolved against the trackers in scope, validated, then handed
//! to the builder of its field shape. The joins of all leaves are merged by alias and the
//! conditions are combined following the boolean structure of the query.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use sea_query::{
    Expr, JoinType, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, SqliteQueryBuilder, Value, Values,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Comparison, Expression, RelationshipCondition, Subject};
use crate::builder::select::StaticListSelectFromBuilder;
use crate::builder::{self, AliasRegistry, JoinFragment, ParametrizedFromWhere};
use crate::config::CompilerConfig;
use crate::duck_typed_field::{DuckTypedField, FieldShape};
use crate::error::{ClauseFault, InvalidQueryFault, QueryError, QueryResult, ResolveFault};
use crate::lexer::Lexer;
use crate::metadata::{
    CrossTrackerReport, FieldMetadataProvider, PermissionChecker, TrackerId, User,
};
use crate::parser::Parser;
use crate::resolver::FieldResolver;
use crate::schema::{alias, id_list, ColumnName, TableName, ARTIFACT, CHANGESET, TRACKER};
use crate::validator::{validate_comparison, validate_relationship};

/// SQL flavour of the rendered statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    MySql,
    Postgres,
    Sqlite,
}

impl SqlDialect {
    fn build(self, statement: &SelectStatement) -> ParametrizedSql {
        let (sql, Values(parameters)) = match self {
            SqlDialect::MySql => statement.build(MysqlQueryBuilder),
            SqlDialect::Postgres => statement.build(PostgresQueryBuilder),
            SqlDialect::Sqlite => statement.build(SqliteQueryBuilder),
        };
        ParametrizedSql { sql, parameters }
    }
}

/// Who runs the query and when. Compilation reads the clock only through this.
#[derive(Debug, Clone)]
pub struct CompilationContext {
    pub user: User,
    /// Instant `CURRENT_DATETIME()` stands for
    pub now: DateTime<Utc>,
    /// Timezone date literals are written in
    pub timezone: FixedOffset,
}

impl CompilationContext {
    pub fn new(user: User) -> Self {
        Self {
            user,
            now: Utc::now(),
            timezone: Utc.fix(),
        }
    }

    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_timezone(mut self, timezone: FixedOffset) -> Self {
        self.timezone = timezone;
        self
    }
}

/// SQL text and the values of its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParametrizedSql {
    pub sql: String,
    pub parameters: Vec<Value>,
}

/// A compiled query, ready to be rendered as a search, a count or a page of results.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    joins: Vec<JoinFragment>,
    condition: SimpleExpr,
    trackers: Vec<TrackerId>,
    dialect: SqlDialect,
}

impl CompiledQuery {
    /// Distinct ids of the matching artifacts.
    pub fn to_sql(&self) -> ParametrizedSql {
        self.dialect.build(&self.select_ids())
    }

    /// Number of matching artifacts.
    pub fn count_sql(&self) -> ParametrizedSql {
        let mut select = Query::select();
        select.expr(Expr::cust(format!("COUNT(DISTINCT {ARTIFACT}.id)")));
        self.from_where(&mut select);
        self.dialect.build(&select)
    }

    /// Most recent artifacts first. Limit and offset come after the query parameters.
    pub fn paginated_sql(&self, limit: u64, offset: u64) -> ParametrizedSql {
        let mut select = self.select_ids();
        select
            .order_by((alias(ARTIFACT), ColumnName::Id), Order::Desc)
            .limit(limit)
            .offset(offset);
        self.dialect.build(&select)
    }

    /// Aliases of the joins, in the order they appear in the statement.
    pub fn join_aliases(&self) -> Vec<&str> {
        self.joins.iter().map(|join| join.alias.as_str()).collect()
    }

    pub fn trackers(&self) -> &[TrackerId] {
        &self.trackers
    }

    fn select_ids(&self) -> SelectStatement {
        let mut select = Query::select();
        select.distinct().column((alias(ARTIFACT), ColumnName::Id));
        self.from_where(&mut select);
        select
    }

    fn from_where(&self, select: &mut SelectStatement) {
        from_live_artifacts(select);
        for join in &self.joins {
            join.apply_to(select);
        }
        select
            .and_where(in_trackers(&self.trackers))
            .and_where(self.condition.clone());
    }
}

/// Artifacts of trackers that are not deleted, with their last changeset.
fn from_live_artifacts(select: &mut SelectStatement) {
    select
        .from_as(TableName::Artifact, alias(ARTIFACT))
        .join(
            JoinType::InnerJoin,
            TableName::Tracker,
            builder::column(TRACKER, ColumnName::Id)
                .equals((alias(ARTIFACT), ColumnName::TrackerId))
                .and(builder::column(TRACKER, ColumnName::DeletionDate).is_null()),
        )
        .join_as(
            JoinType::InnerJoin,
            TableName::Changeset,
            alias(CHANGESET),
            builder::column(CHANGESET, ColumnName::Id)
                .equals((alias(ARTIFACT), ColumnName::LastChangesetId)),
        );
}

fn in_trackers(trackers: &[TrackerId]) -> SimpleExpr {
    Expr::cust(format!("{ARTIFACT}.tracker_id IN ({})", id_list(trackers)))
}

/// Compiles cross tracker queries against the trackers known to `provider`.
pub struct SqlCompiler<P> {
    provider: P,
    config: CompilerConfig,
}

impl<P> SqlCompiler<P>
where
    P: FieldMetadataProvider + PermissionChecker,
{
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, CompilerConfig::default())
    }

    pub fn with_config(provider: P, config: CompilerConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Parses the query of `report` and compiles it for the trackers of the report that
    /// still exist.
    pub fn compile_report(
        &self,
        report: &CrossTrackerReport,
        context: &CompilationContext,
    ) -> QueryResult<CompiledQuery> {
        let expression = self.parse(&report.query)?;
        let trackers = self.provider.list_trackers_in_scope(report);
        self.compile(&expression, &trackers, context)
    }

    /// Parses and compiles `query` for `trackers`.
    pub fn compile_query(
        &self,
        query: &str,
        trackers: &[TrackerId],
        context: &CompilationContext,
    ) -> QueryResult<CompiledQuery> {
        let expression = self.parse(query)?;
        self.compile(&expression, trackers, context)
    }

    /// Label, open value and color of the static list `field` for each of `artifacts`,
    /// one row per artifact and value, most recent artifacts first.
    pub fn compile_static_list_selection(
        &self,
        field: &str,
        artifacts: &[i64],
        trackers: &[TrackerId],
        context: &CompilationContext,
    ) -> QueryResult<ParametrizedSql> {
        if trackers.is_empty() {
            return Err(QueryError::EmptyScope);
        }

        let subject = Subject::field(field);
        let invalid = |fault: ResolveFault| InvalidQueryFault {
            clause: subject.to_string(),
            fault: fault.into(),
        };
        let resolved = FieldResolver::new(&self.provider, &context.user, trackers)
            .resolve(&subject)
            .map_err(invalid)?;
        if resolved.shape != FieldShape::StaticList {
            let fault = ResolveFault::NotAStaticList {
                subject: subject.clone(),
            };
            return Err(invalid(fault).into());
        }

        let key = AliasRegistry::new().aliases_for(&subject).slug().to_string();
        let select_from = StaticListSelectFromBuilder::new(&resolved, &key).build();

        let mut select = Query::select();
        select.column((alias(ARTIFACT), ColumnName::Id));
        from_live_artifacts(&mut select);
        select_from.apply_to(&mut select);
        select
            .and_where(in_trackers(trackers))
            .and_where(builder::column(ARTIFACT, ColumnName::Id).is_in(artifacts.iter().copied()))
            .order_by((alias(ARTIFACT), ColumnName::Id), Order::Desc);

        debug!(
            field,
            artifacts = artifacts.len(),
            columns = ?select_from.keys(),
            "compiled static list selection"
        );
        Ok(self.config.dialect.build(&select))
    }

    /// Queries above `max_comparisons` are refused before their tree is built.
    fn parse(&self, query: &str) -> QueryResult<Expression> {
        let tokens: Vec<_> = Lexer::new(query).collect();
        let expression = Parser::new(&tokens)
            .with_max_conditions(self.config.max_comparisons)
            .parse()?;
        Ok(expression)
    }

    pub fn compile(
        &self,
        expression: &Expression,
        trackers: &[TrackerId],
        context: &CompilationContext,
    ) -> QueryResult<CompiledQuery> {
        if trackers.is_empty() {
            return Err(QueryError::EmptyScope);
        }

        let comparisons = expression.leaf_count();
        if comparisons > self.config.max_comparisons {
            return Err(QueryError::TooComplex {
                found: comparisons,
                limit: self.config.max_comparisons,
            });
        }

        let mut compilation = Compilation {
            resolver: FieldResolver::new(&self.provider, &context.user, trackers),
            context,
            aliases: AliasRegistry::new(),
            resolved: HashMap::new(),
            joins: Vec::new(),
            join_aliases: HashSet::new(),
            parameters: Vec::new(),
        };
        let condition = compilation.condition(expression)?;

        let compiled = CompiledQuery {
            joins: compilation.joins,
            condition,
            trackers: trackers.to_vec(),
            dialect: self.config.dialect,
        };

        debug!(
            query = %expression,
            trackers = ?trackers,
            joins = compiled.joins.len(),
            parameters = compilation.parameters.len(),
            "compiled cross tracker query"
        );
        Ok(compiled)
    }
}

/// State of one compilation: aliases, merged joins and resolved subjects.
struct Compilation<'a, P> {
    resolver: FieldResolver<'a, P>,
    context: &'a CompilationContext,
    aliases: AliasRegistry,
    /// Subjects are resolved once, however often the query mentions them
    resolved: HashMap<Subject, Result<DuckTypedField, ResolveFault>>,
    joins: Vec<JoinFragment>,
    join_aliases: HashSet<String>,
    parameters: Vec<Value>,
}

impl<P> Compilation<'_, P>
where
    P: FieldMetadataProvider + PermissionChecker,
{
    fn condition(&mut self, expression: &Expression) -> Result<SimpleExpr, InvalidQueryFault> {
        match expression {
            Expression::And(left, right) => {
                let left = self.condition(left)?;
                Ok(left.and(self.condition(right)?))
            }
            Expression::Or(left, right) => {
                let left = self.condition(left)?;
                Ok(left.or(self.condition(right)?))
            }
            Expression::Comparison(comparison) => {
                let from_where = self.comparison(comparison).map_err(|fault| InvalidQueryFault {
                    clause: comparison.to_string(),
                    fault,
                })?;
                Ok(self.merge(from_where))
            }
            Expression::Relationship(condition) => {
                let from_where = self.relationship(condition).map_err(|fault| InvalidQueryFault {
                    clause: condition.to_string(),
                    fault,
                })?;
                Ok(self.merge(from_where))
            }
        }
    }

    fn comparison(&mut self, comparison: &Comparison) -> Result<ParametrizedFromWhere, ClauseFault> {
        let field = self.resolve(&comparison.subject)?;
        validate_comparison(comparison, &field, self.context)?;
        // Metadata reached through a bare name shares the joins of `@metadata`
        let aliases = self.aliases.aliases_for(&field.subject);
        Ok(builder::build_comparison(
            comparison,
            &field,
            &aliases,
            self.context,
        ))
    }

    fn relationship(
        &mut self,
        condition: &RelationshipCondition,
    ) -> Result<ParametrizedFromWhere, ClauseFault> {
        validate_relationship(condition)?;
        Ok(builder::build_relationship(condition))
    }

    fn resolve(&mut self, subject: &Subject) -> Result<DuckTypedField, ResolveFault> {
        if let Some(resolved) = self.resolved.get(subject) {
            return resolved.clone();
        }
        let resolved = self.resolver.resolve(subject);
        self.resolved.insert(subject.clone(), resolved.clone());
        resolved
    }

    /// Keeps the first join of every alias and returns the condition of the fragment.
    fn merge(&mut self, from_where: ParametrizedFromWhere) -> SimpleExpr {
        for join in from_where.joins {
            if self.join_aliases.insert(join.alias.clone()) {
                self.joins.push(join);
            }
        }
        self.parameters.extend(from_where.parameters);
        from_where.condition
    }
}
