//! Artifact-link conditions.
//!
//! Links are read from the last changeset of the linking artifact. A link whose type is
//! `_is_child` makes its target a child of the linking artifact.

use sea_query::{Expr, JoinType, Query, SelectStatement, Value};

use super::{bind, column, ParametrizedFromWhere};
use crate::ast::{RelationshipCondition, RelationshipKind, RelationshipTarget};
use crate::schema::{alias, ColumnName, TableName, ARTIFACT, CHILD_NATURE};
use crate::validator::parse_artifact_id;

const LINKING: &str = "linking";
const LINK_VALUE: &str = "link_cv";
const LINK: &str = "link";
const LINKED: &str = "linked";
const LINKED_TRACKER: &str = "linked_tracker";

pub struct RelationshipFromWhereBuilder<'a> {
    condition: &'a RelationshipCondition,
}

impl<'a> RelationshipFromWhereBuilder<'a> {
    pub fn new(condition: &'a RelationshipCondition) -> Self {
        Self { condition }
    }

    /// The artifact under test is the source of the link for children and `LINKED TO`.
    fn artifact_is_link_source(&self) -> bool {
        matches!(
            self.condition.kind,
            RelationshipKind::Children | RelationshipKind::LinkedTo
        )
    }

    pub fn build(&self) -> ParametrizedFromWhere {
        let mut parameters = Vec::new();
        let linked_artifacts = self.linked_artifacts(&mut parameters);
        let artifact_id = column(ARTIFACT, ColumnName::Id);
        let condition = if self.condition.negated {
            artifact_id.not_in_subquery(linked_artifacts)
        } else {
            artifact_id.in_subquery(linked_artifacts)
        };
        ParametrizedFromWhere::new(Vec::new(), condition, parameters)
    }

    /// Ids of the artifacts at the requested end of a matching link.
    fn linked_artifacts(&self, parameters: &mut Vec<Value>) -> SelectStatement {
        let (selected, other_end) = if self.artifact_is_link_source() {
            ((alias(LINKING), ColumnName::Id), (LINK, ColumnName::ArtifactId))
        } else {
            ((alias(LINK), ColumnName::ArtifactId), (LINKING, ColumnName::Id))
        };

        let mut query = Query::select();
        query
            .column(selected)
            .from_as(TableName::Artifact, alias(LINKING))
            .join_as(
                JoinType::InnerJoin,
                TableName::ChangesetValue,
                alias(LINK_VALUE),
                column(LINK_VALUE, ColumnName::ChangesetId)
                    .equals((alias(LINKING), ColumnName::LastChangesetId)),
            )
            .join_as(
                JoinType::InnerJoin,
                TableName::ChangesetValueArtifactLink,
                alias(LINK),
                column(LINK, ColumnName::ChangesetValueId).equals((alias(LINK_VALUE), ColumnName::Id)),
            );

        if matches!(
            self.condition.kind,
            RelationshipKind::Parent | RelationshipKind::Children
        ) {
            query.and_where(column(LINK, ColumnName::Nature).eq(Expr::cust(format!("'{CHILD_NATURE}'"))));
        }

        match &self.condition.target {
            None => {}
            Some(RelationshipTarget::Artifact(id)) => {
                let Some(id) = parse_artifact_id(id) else {
                    panic!("artifact id {id} of `{}` should have been rejected by validation", self.condition)
                };
                query.and_where(column(other_end.0, other_end.1).eq(bind(parameters, id)));
            }
            Some(RelationshipTarget::Tracker(name)) => {
                // The tracker of the linking artifact is at hand, the linked one needs a join
                let tracker_of = if self.artifact_is_link_source() {
                    query.join_as(
                        JoinType::InnerJoin,
                        TableName::Artifact,
                        alias(LINKED),
                        column(LINKED, ColumnName::Id).equals((alias(LINK), ColumnName::ArtifactId)),
                    );
                    LINKED
                } else {
                    LINKING
                };
                query
                    .join_as(
                        JoinType::InnerJoin,
                        TableName::Tracker,
                        alias(LINKED_TRACKER),
                        column(LINKED_TRACKER, ColumnName::Id)
                            .equals((alias(tracker_of), ColumnName::TrackerId)),
                    )
                    .and_where(column(LINKED_TRACKER, ColumnName::DeletionDate).is_null())
                    .and_where(column(LINKED_TRACKER, ColumnName::ItemName).eq(bind(parameters, name.as_str())));
            }
        }

        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::{Asterisk, MysqlQueryBuilder};

    fn render(condition: RelationshipCondition) -> (String, Vec<Value>) {
        let from_where = RelationshipFromWhereBuilder::new(&condition).build();
        assert!(from_where.joins.is_empty());
        let (sql, values) = Query::select()
            .column(Asterisk)
            .from_as(TableName::Artifact, alias(ARTIFACT))
            .and_where(from_where.condition)
            .build(MysqlQueryBuilder);
        assert_eq!(values.0, from_where.parameters);
        (sql, values.0)
    }

    fn condition(kind: RelationshipKind, negated: bool, target: Option<RelationshipTarget>) -> RelationshipCondition {
        RelationshipCondition { kind, negated, target }
    }

    #[test]
    fn test_with_parent_selects_link_targets() {
        let (sql, values) = render(condition(RelationshipKind::Parent, false, None));
        assert!(sql.contains("`artifact`.`id` IN (SELECT `link`.`artifact_id`"));
        assert!(sql.contains("`link`.`nature` = '_is_child'"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_without_children_of_artifact() {
        let (sql, values) = render(condition(
            RelationshipKind::Children,
            true,
            Some(RelationshipTarget::Artifact("12".into())),
        ));
        assert!(sql.contains("`artifact`.`id` NOT IN (SELECT `linking`.`id`"));
        assert!(sql.contains("`link`.`artifact_id` = ?"));
        assert_eq!(values, vec![Value::BigInt(Some(12))]);
    }

    #[test]
    fn test_linked_to_tracker_joins_the_linked_artifact() {
        let (sql, values) = render(condition(
            RelationshipKind::LinkedTo,
            false,
            Some(RelationshipTarget::Tracker("bugs".into())),
        ));
        assert!(!sql.contains("_is_child"));
        assert!(sql.contains("`linked_tracker`.`id` = `linked`.`tracker_id`"));
        assert!(sql.contains("`linked_tracker`.`item_name` = ?"));
        assert_eq!(values, vec![Value::from("bugs")]);
    }

    #[test]
    fn test_linked_from_tracker_uses_the_linking_artifact() {
        let (sql, _) = render(condition(
            RelationshipKind::LinkedFrom,
            false,
            Some(RelationshipTarget::Tracker("bugs".into())),
        ));
        assert!(sql.contains("`linked_tracker`.`id` = `linking`.`tracker_id`"));
        assert!(!sql.contains("AS `linked` "));
    }
}
