//! Configuration module: loads the workspace description and compiler settings from JSON.
//!
//! A workspace file describes the trackers a report can search in:
//!
//! ```json
//! {
//!   "trackers": [
//!     {
//!       "id": 1,
//!       "name": "bugs",
//!       "fields": [
//!         { "id": 101, "name": "title", "type": "string" },
//!         { "id": 102, "name": "status", "type": "static_list" },
//!         { "id": 103, "name": "cost", "type": "int", "readable_by": [7] }
//!       ],
//!       "semantics": { "title": 101, "status": 102 }
//!     }
//!   ]
//! }
//! ```
//!
//! Fields without `readable_by` can be read by everybody.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::{
    CrossTrackerReport, FieldDescriptor, FieldId, FieldMetadataProvider, FieldType,
    PermissionChecker, Semantic, TrackerId, User, UserId,
};
use crate::parser::MAX_CONDITIONS;
use crate::sql_compiler::SqlDialect;

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file does not exist: {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Compiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// SQL flavour of the rendered statements
    pub dialect: SqlDialect,
    /// Maximum number of conditions a single query may contain, at most [`MAX_CONDITIONS`]
    pub max_comparisons: usize,
    /// Offset from UTC used to interpret date literals
    pub timezone_offset_minutes: i32,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::MySql,
            max_comparisons: 50,
            timezone_offset_minutes: 0,
        }
    }
}

impl CompilerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = read_json_file(path.as_ref())?;
        config.timezone()?;
        if !(1..=MAX_CONDITIONS).contains(&config.max_comparisons) {
            return Err(ConfigError::Invalid(format!(
                "max_comparisons must be between 1 and {MAX_CONDITIONS}"
            )));
        }
        Ok(config)
    }

    pub fn timezone(&self) -> Result<FixedOffset, ConfigError> {
        self.timezone_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "timezone offset of {} minutes is out of range",
                    self.timezone_offset_minutes
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Users allowed to read the field, everybody when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable_by: Option<Vec<UserId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub id: TrackerId,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub semantics: HashMap<Semantic, FieldId>,
    #[serde(default)]
    pub deleted: bool,
}

impl TrackerConfig {
    fn descriptor(&self, field: &FieldConfig) -> FieldDescriptor {
        FieldDescriptor {
            id: field.id,
            tracker_id: self.id,
            name: field.name.clone(),
            field_type: field.field_type,
        }
    }
}

/// In-memory trackers, fields, semantics and read permissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workspace {
    pub trackers: Vec<TrackerConfig>,
}

impl Workspace {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let workspace: Self = read_json_file(path.as_ref())?;
        workspace.check()?;
        Ok(workspace)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let workspace: Self = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        workspace.check()?;
        Ok(workspace)
    }

    /// Tracker and field ids must be unique, semantics must point to existing fields.
    fn check(&self) -> Result<(), ConfigError> {
        let mut tracker_ids = HashSet::new();
        let mut field_ids = HashSet::new();
        for tracker in &self.trackers {
            if !tracker_ids.insert(tracker.id) {
                return Err(ConfigError::Invalid(format!(
                    "tracker #{} is declared twice",
                    tracker.id
                )));
            }
            for field in &tracker.fields {
                if !field_ids.insert(field.id) {
                    return Err(ConfigError::Invalid(format!(
                        "field #{} is declared twice",
                        field.id
                    )));
                }
            }
            for (semantic, field_id) in &tracker.semantics {
                if !tracker.fields.iter().any(|field| field.id == *field_id) {
                    return Err(ConfigError::Invalid(format!(
                        "semantic {semantic:?} of tracker #{} points to unknown field #{field_id}",
                        tracker.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn tracker(&self, tracker_id: TrackerId) -> Option<&TrackerConfig> {
        self.trackers
            .iter()
            .find(|tracker| tracker.id == tracker_id && !tracker.deleted)
    }
}

impl FieldMetadataProvider for Workspace {
    fn list_trackers_in_scope(&self, report: &CrossTrackerReport) -> Vec<TrackerId> {
        let mut seen = HashSet::new();
        report
            .trackers
            .iter()
            .copied()
            .filter(|id| self.tracker(*id).is_some() && seen.insert(*id))
            .collect()
    }

    fn find_fields_by_name(&self, name: &str, tracker_id: TrackerId) -> Vec<FieldDescriptor> {
        let Some(tracker) = self.tracker(tracker_id) else {
            return Vec::new();
        };
        tracker
            .fields
            .iter()
            .filter(|field| field.name == name)
            .map(|field| tracker.descriptor(field))
            .collect()
    }

    fn find_semantic_field(
        &self,
        semantic: Semantic,
        tracker_id: TrackerId,
    ) -> Option<FieldDescriptor> {
        let tracker = self.tracker(tracker_id)?;
        let field_id = tracker.semantics.get(&semantic)?;
        tracker
            .fields
            .iter()
            .find(|field| field.id == *field_id)
            .map(|field| tracker.descriptor(field))
    }
}

impl PermissionChecker for Workspace {
    fn can_user_read_field(&self, user: &User, field: &FieldDescriptor) -> bool {
        let Some(tracker) = self.tracker(field.tracker_id) else {
            return false;
        };
        tracker
            .fields
            .iter()
            .find(|candidate| candidate.id == field.id)
            .is_some_and(|candidate| match &candidate.readable_by {
                None => true,
                Some(users) => !user.is_anonymous() && users.contains(&user.id),
            })
    }
}
