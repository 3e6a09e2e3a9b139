//! Contracts of the collaborators the compiler reads tracker configuration from.
//!
//! The compiler never loads trackers itself: a [`FieldMetadataProvider`] answers field
//! lookups and a [`PermissionChecker`] tells which of those fields the current user may
//! read. [`crate::config::Workspace`] implements both from a JSON description.

use serde::{Deserialize, Serialize};

pub type TrackerId = u64;
pub type FieldId = u64;
pub type UserId = u64;

/// The user a query is compiled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Anonymous visitors have id 0, which no artifact references.
    pub fn anonymous() -> Self {
        Self::new(0, "anonymous")
    }

    pub fn is_anonymous(&self) -> bool {
        self.id == 0
    }
}

/// Storage type of a tracker field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Float,
    String,
    Text,
    Date,
    DateTime,
    /// Select box, multi select box, radio buttons and checkboxes bound to static values
    StaticList,
    /// List bound to users
    UserList,
    File,
    ArtifactLink,
    Computed,
}

/// Logical roles a tracker maps onto one of its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Semantic {
    Title,
    Description,
    Status,
    Contributor,
}

/// A field of one tracker, as seen by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub tracker_id: TrackerId,
    pub name: String,
    pub field_type: FieldType,
}

/// Identifies the trackers in scope and owns the raw query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossTrackerReport {
    pub id: u64,
    pub query: String,
    pub trackers: Vec<TrackerId>,
}

impl CrossTrackerReport {
    pub fn new(id: u64, query: impl Into<String>, trackers: Vec<TrackerId>) -> Self {
        Self {
            id,
            query: query.into(),
            trackers,
        }
    }
}

/// Read-only access to tracker configuration.
pub trait FieldMetadataProvider {
    /// Trackers the report searches in. Deleted or unknown trackers are left out.
    fn list_trackers_in_scope(&self, report: &CrossTrackerReport) -> Vec<TrackerId>;

    /// Fields of `tracker_id` named `name`. Field names are case sensitive.
    fn find_fields_by_name(&self, name: &str, tracker_id: TrackerId) -> Vec<FieldDescriptor>;

    /// Field bound to `semantic` in `tracker_id`, if the tracker defines that semantic.
    fn find_semantic_field(&self, semantic: Semantic, tracker_id: TrackerId)
        -> Option<FieldDescriptor>;
}

pub trait PermissionChecker {
    fn can_user_read_field(&self, user: &User, field: &FieldDescriptor) -> bool;
}

impl<T: FieldMetadataProvider + ?Sized> FieldMetadataProvider for &T {
    fn list_trackers_in_scope(&self, report: &CrossTrackerReport) -> Vec<TrackerId> {
        (**self).list_trackers_in_scope(report)
    }

    fn find_fields_by_name(&self, name: &str, tracker_id: TrackerId) -> Vec<FieldDescriptor> {
        (**self).find_fields_by_name(name, tracker_id)
    }

    fn find_semantic_field(
        &self,
        semantic: Semantic,
        tracker_id: TrackerId,
    ) -> Option<FieldDescriptor> {
        (**self).find_semantic_field(semantic, tracker_id)
    }
}

impl<T: PermissionChecker + ?Sized> PermissionChecker for &T {
    fn can_user_read_field(&self, user: &User, field: &FieldDescriptor) -> bool {
        (**self).can_user_read_field(user, field)
    }
}
