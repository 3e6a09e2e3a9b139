//! Tables and columns of the tracker storage schema, as sea-query identifiers.

use sea_query::{Alias, Iden};

/// Aliases of the tables every compiled statement starts from.
pub const ARTIFACT: &str = "artifact";
pub const CHANGESET: &str = "changeset";
pub const TRACKER: &str = "tracker";

/// Bind value id a list field stores when nothing is selected.
pub const NONE_BINDVALUE_ID: u64 = 100;

/// Link type marking the target of an artifact link as a child of its source.
pub const CHILD_NATURE: &str = "_is_child";

#[derive(Debug, Clone, Copy)]
pub enum TableName {
    Artifact,
    Changeset,
    Tracker,
    ChangesetValue,
    ChangesetValueText,
    ChangesetValueInt,
    ChangesetValueFloat,
    ChangesetValueDate,
    ChangesetValueList,
    ChangesetValueArtifactLink,
    ListBindStaticValue,
    User,
    SemanticStatus,
    Field,
    ChangesetValueOpenList,
    OpenListValue,
    ListBindDecorator,
}

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            TableName::Artifact => "tracker_artifact",
            TableName::Changeset => "tracker_changeset",
            TableName::Tracker => "tracker",
            TableName::ChangesetValue => "tracker_changeset_value",
            TableName::ChangesetValueText => "tracker_changeset_value_text",
            TableName::ChangesetValueInt => "tracker_changeset_value_int",
            TableName::ChangesetValueFloat => "tracker_changeset_value_float",
            TableName::ChangesetValueDate => "tracker_changeset_value_date",
            TableName::ChangesetValueList => "tracker_changeset_value_list",
            TableName::ChangesetValueArtifactLink => "tracker_changeset_value_artifactlink",
            TableName::ListBindStaticValue => "tracker_field_list_bind_static_value",
            TableName::User => "user",
            TableName::SemanticStatus => "tracker_semantic_status",
            TableName::Field => "tracker_field",
            TableName::ChangesetValueOpenList => "tracker_changeset_value_openlist",
            TableName::OpenListValue => "tracker_field_openlist_value",
            TableName::ListBindDecorator => "tracker_field_list_bind_decorator",
        };
        write!(s, "{}", name).unwrap();
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ColumnName {
    Id,
    TrackerId,
    LastChangesetId,
    SubmittedBy,
    SubmittedOn,
    ChangesetId,
    FieldId,
    ChangesetValueId,
    Value,
    BindvalueId,
    Label,
    UserId,
    UserName,
    OpenValueId,
    ArtifactId,
    Nature,
    ItemName,
    DeletionDate,
    /// Open value of an open list changeset value
    OpenvalueId,
    ValueId,
    TlpColorName,
}

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let name = match self {
            ColumnName::Id => "id",
            ColumnName::TrackerId => "tracker_id",
            ColumnName::LastChangesetId => "last_changeset_id",
            ColumnName::SubmittedBy => "submitted_by",
            ColumnName::SubmittedOn => "submitted_on",
            ColumnName::ChangesetId => "changeset_id",
            ColumnName::FieldId => "field_id",
            ColumnName::ChangesetValueId => "changeset_value_id",
            ColumnName::Value => "value",
            ColumnName::BindvalueId => "bindvalue_id",
            ColumnName::Label => "label",
            ColumnName::UserId => "user_id",
            ColumnName::UserName => "user_name",
            ColumnName::OpenValueId => "open_value_id",
            ColumnName::ArtifactId => "artifact_id",
            ColumnName::Nature => "nature",
            ColumnName::ItemName => "item_name",
            ColumnName::DeletionDate => "deletion_date",
            ColumnName::OpenvalueId => "openvalue_id",
            ColumnName::ValueId => "value_id",
            ColumnName::TlpColorName => "tlp_color_name",
        };
        write!(s, "{}", name).unwrap();
    }
}

/// Shorthand for `Alias::new`, used for every table alias of a statement.
pub fn alias(name: &str) -> Alias {
    Alias::new(name)
}

/// Comma separated list of trusted integer ids, for inlining into SQL text.
pub fn id_list(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
