//! Per-subject aggregate of the fields matching a query name across trackers.
//!
//! The same name can map to different fields (and different field types) in each
//! tracker of a report. The resolver folds them into one [`DuckTypedField`] with a
//! single [`FieldShape`], which drives both validation and SQL generation.

use std::fmt;

use crate::ast::Subject;
use crate::metadata::{FieldId, FieldType, TrackerId};

/// Query-time family of a field, independent of its exact storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldShape {
    /// int and float fields, `@id`
    Numeric,
    /// string and text fields, title and description semantics
    Text,
    /// date fields, `@submitted_on`, `@last_update_date`
    Date,
    /// lists bound to static values
    StaticList,
    /// lists bound to users, contributor semantic, `@submitted_by`, `@last_update_by`
    UserList,
    /// status semantic
    StatusSemantic,
}

impl FieldShape {
    /// Shape of a plain tracker field, `None` when the type cannot be queried.
    pub fn from_field_type(field_type: FieldType) -> Option<Self> {
        match field_type {
            FieldType::Int | FieldType::Float => Some(FieldShape::Numeric),
            FieldType::String | FieldType::Text => Some(FieldShape::Text),
            FieldType::Date | FieldType::DateTime => Some(FieldShape::Date),
            FieldType::StaticList => Some(FieldShape::StaticList),
            FieldType::UserList => Some(FieldShape::UserList),
            FieldType::File | FieldType::ArtifactLink | FieldType::Computed => None,
        }
    }
}

impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldShape::Numeric => "numeric",
            FieldShape::Text => "text",
            FieldShape::Date => "date",
            FieldShape::StaticList => "static list",
            FieldShape::UserList => "user list",
            FieldShape::StatusSemantic => "status",
        };
        f.write_str(name)
    }
}

/// Granularity used when comparing date values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Day,
    Minute,
}

/// Artifact properties every artifact carries, whatever its tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactColumn {
    ArtifactId,
    SubmittedOn,
    SubmittedBy,
    LastUpdateDate,
    LastUpdateBy,
}

/// Where the compared values are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Changeset values of these fields, a tracker in scope may own several of them
    Fields(Vec<FieldId>),
    /// A column of the artifact or of its last changeset
    Column(ArtifactColumn),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuckTypedField {
    /// Subject the SQL aliases are derived from
    pub subject: Subject,
    pub shape: FieldShape,
    pub source: ValueSource,
    /// Meaningful for [`FieldShape::Date`] only
    pub date_precision: DatePrecision,
    pub trackers_without_field: Vec<TrackerId>,
}

impl DuckTypedField {
    pub fn from_column(subject: Subject, shape: FieldShape, column: ArtifactColumn) -> Self {
        Self {
            subject,
            shape,
            source: ValueSource::Column(column),
            date_precision: DatePrecision::Minute,
            trackers_without_field: Vec::new(),
        }
    }

    /// Columns always hold a value; fields may be left empty.
    pub fn allows_empty_value(&self) -> bool {
        matches!(self.source, ValueSource::Fields(_))
    }

    pub fn field_ids(&self) -> &[FieldId] {
        match &self.source {
            ValueSource::Fields(ids) => ids,
            ValueSource::Column(_) => &[],
        }
    }
}
