//! Field/metadata resolver: turns a query subject into a [`DuckTypedField`].

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::ast::{Metadata, Subject};
use crate::duck_typed_field::{
    ArtifactColumn, DatePrecision, DuckTypedField, FieldShape, ValueSource,
};
use crate::error::{FieldNotFoundFault, ResolveFault};
use crate::metadata::{
    FieldDescriptor, FieldId, FieldMetadataProvider, FieldType, PermissionChecker, Semantic,
    TrackerId, User,
};

/// Resolves subjects for one user against a fixed set of trackers.
pub struct FieldResolver<'a, P> {
    provider: &'a P,
    user: &'a User,
    trackers: &'a [TrackerId],
}

/// Readable matches of one subject, grouped by shape.
#[derive(Default)]
struct Matches {
    by_shape: BTreeMap<FieldShape, Vec<FieldDescriptor>>,
    unsupported: usize,
    trackers_without_field: Vec<TrackerId>,
}

impl<'a, P> FieldResolver<'a, P>
where
    P: FieldMetadataProvider + PermissionChecker,
{
    pub fn new(provider: &'a P, user: &'a User, trackers: &'a [TrackerId]) -> Self {
        Self {
            provider,
            user,
            trackers,
        }
    }

    pub fn resolve(&self, subject: &Subject) -> Result<DuckTypedField, ResolveFault> {
        let resolved = match subject {
            Subject::Metadata(metadata) => self.resolve_metadata(*metadata),
            Subject::Field(name) => match self.resolve_field(subject, name) {
                // A bare name matching no readable field may still spell a metadata
                Err(ResolveFault::FieldNotFound(_)) if Metadata::from_keyword(name).is_some() => {
                    Metadata::from_keyword(name)
                        .map(|metadata| self.resolve_metadata(metadata))
                        .unwrap_or_else(|| Err(not_found(subject)))
                }
                other => other,
            },
        };

        match resolved {
            Ok(field) => {
                trace!(
                    subject = %subject,
                    shape = %field.shape,
                    source = ?field.source,
                    "resolved query subject"
                );
                Ok(field)
            }
            // Report the subject as the user wrote it
            Err(ResolveFault::FieldNotFound(_)) => Err(not_found(subject)),
            Err(fault) => Err(fault),
        }
    }

    fn resolve_field(&self, subject: &Subject, name: &str) -> Result<DuckTypedField, ResolveFault> {
        let mut matches = Matches::default();

        for &tracker_id in self.trackers {
            let readable: Vec<_> = self
                .provider
                .find_fields_by_name(name, tracker_id)
                .into_iter()
                .filter(|field| self.is_readable(field))
                .collect();

            let mut queryable = false;
            for field in readable {
                match FieldShape::from_field_type(field.field_type) {
                    Some(shape) => {
                        matches.by_shape.entry(shape).or_default().push(field);
                        queryable = true;
                    }
                    None => matches.unsupported += 1,
                }
            }
            // A tracker whose only matches are unqueryable lacks the field
            if !queryable {
                matches.trackers_without_field.push(tracker_id);
            }
        }

        if matches.by_shape.is_empty() {
            return Err(if matches.unsupported > 0 {
                ResolveFault::UnsupportedFieldType {
                    subject: subject.clone(),
                }
            } else {
                not_found(subject)
            });
        }

        self.single_shape(subject.clone(), matches)
    }

    fn resolve_metadata(&self, metadata: Metadata) -> Result<DuckTypedField, ResolveFault> {
        let subject = Subject::Metadata(metadata);
        let (semantic, shape) = match metadata {
            Metadata::Title => (Semantic::Title, FieldShape::Text),
            Metadata::Description => (Semantic::Description, FieldShape::Text),
            Metadata::Status => (Semantic::Status, FieldShape::StatusSemantic),
            Metadata::AssignedTo => (Semantic::Contributor, FieldShape::UserList),
            Metadata::SubmittedOn => {
                return Ok(DuckTypedField::from_column(
                    subject,
                    FieldShape::Date,
                    ArtifactColumn::SubmittedOn,
                ))
            }
            Metadata::LastUpdateDate => {
                return Ok(DuckTypedField::from_column(
                    subject,
                    FieldShape::Date,
                    ArtifactColumn::LastUpdateDate,
                ))
            }
            Metadata::SubmittedBy => {
                return Ok(DuckTypedField::from_column(
                    subject,
                    FieldShape::UserList,
                    ArtifactColumn::SubmittedBy,
                ))
            }
            Metadata::LastUpdateBy => {
                return Ok(DuckTypedField::from_column(
                    subject,
                    FieldShape::UserList,
                    ArtifactColumn::LastUpdateBy,
                ))
            }
            Metadata::Id => {
                return Ok(DuckTypedField::from_column(
                    subject,
                    FieldShape::Numeric,
                    ArtifactColumn::ArtifactId,
                ))
            }
        };

        let mut matches = Matches::default();
        for &tracker_id in self.trackers {
            let field = self
                .provider
                .find_semantic_field(semantic, tracker_id)
                .filter(|field| is_compatible_with_semantic(semantic, field.field_type))
                .filter(|field| self.is_readable(field));

            match field {
                Some(field) => matches.by_shape.entry(shape).or_default().push(field),
                None => matches.trackers_without_field.push(tracker_id),
            }
        }

        if matches.by_shape.is_empty() {
            return Err(not_found(&subject));
        }

        self.single_shape(subject, matches)
    }

    fn single_shape(&self, subject: Subject, matches: Matches) -> Result<DuckTypedField, ResolveFault> {
        if matches.by_shape.len() > 1 {
            let shapes = matches
                .by_shape
                .keys()
                .map(|shape| shape.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ResolveFault::IncompatibleFieldTypes { subject, shapes });
        }

        let Some((shape, fields)) = matches.by_shape.into_iter().next() else {
            return Err(not_found(&subject));
        };

        let date_precision = if fields
            .iter()
            .all(|field| field.field_type == FieldType::DateTime)
        {
            DatePrecision::Minute
        } else {
            DatePrecision::Day
        };

        let mut field_ids: Vec<FieldId> = fields.iter().map(|field| field.id).collect();
        field_ids.sort_unstable();
        field_ids.dedup();

        Ok(DuckTypedField {
            subject,
            shape,
            source: ValueSource::Fields(field_ids),
            date_precision,
            trackers_without_field: matches.trackers_without_field,
        })
    }

    fn is_readable(&self, field: &FieldDescriptor) -> bool {
        let readable = self.provider.can_user_read_field(self.user, field);
        if !readable {
            debug!(
                field_id = field.id,
                tracker_id = field.tracker_id,
                user_id = self.user.id,
                "field is not readable, treating it as absent"
            );
        }
        readable
    }
}

fn not_found(subject: &Subject) -> ResolveFault {
    ResolveFault::FieldNotFound(FieldNotFoundFault {
        subject: subject.clone(),
    })
}

fn is_compatible_with_semantic(semantic: Semantic, field_type: FieldType) -> bool {
    match semantic {
        Semantic::Title | Semantic::Description => {
            matches!(field_type, FieldType::String | FieldType::Text)
        }
        Semantic::Status => field_type == FieldType::StaticList,
        Semantic::Contributor => field_type == FieldType::UserList,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Workspace;

    fn workspace() -> Workspace {
        Workspace::from_json_str(
            r#"{"trackers": [
                {
                    "id": 1, "name": "bugs",
                    "fields": [
                        {"id": 11, "name": "summary", "type": "string"},
                        {"id": 12, "name": "status", "type": "static_list"},
                        {"id": 13, "name": "effort", "type": "int"},
                        {"id": 14, "name": "due", "type": "date"},
                        {"id": 15, "name": "secret", "type": "string", "readable_by": [1]},
                        {"id": 16, "name": "attachment", "type": "file"},
                        {"id": 17, "name": "mixed", "type": "int"},
                        {"id": 18, "name": "notes", "type": "text"}
                    ],
                    "semantics": {"title": 11, "status": 12}
                },
                {
                    "id": 2, "name": "tasks",
                    "fields": [
                        {"id": 21, "name": "summary", "type": "text"},
                        {"id": 23, "name": "effort", "type": "float"},
                        {"id": 24, "name": "due", "type": "date_time"},
                        {"id": 27, "name": "mixed", "type": "string"},
                        {"id": 28, "name": "notes", "type": "file"}
                    ],
                    "semantics": {"title": 21}
                },
                {"id": 3, "name": "empty"}
            ]}"#,
        )
        .unwrap()
    }

    fn resolve(subject: Subject, user: &User) -> Result<DuckTypedField, ResolveFault> {
        let workspace = workspace();
        FieldResolver::new(&workspace, user, &[1, 2, 3]).resolve(&subject)
    }

    #[test]
    fn test_int_and_float_fields_are_numeric() {
        let field = resolve(Subject::field("effort"), &User::new(2, "bob")).unwrap();
        assert_eq!(field.shape, FieldShape::Numeric);
        assert_eq!(field.source, ValueSource::Fields(vec![13, 23]));
        assert_eq!(field.trackers_without_field, vec![3]);
    }

    #[test]
    fn test_mixed_date_precision_falls_back_to_day() {
        let field = resolve(Subject::field("due"), &User::new(2, "bob")).unwrap();
        assert_eq!(field.shape, FieldShape::Date);
        assert_eq!(field.date_precision, DatePrecision::Day);
    }

    #[test]
    fn test_incompatible_types_across_trackers() {
        let fault = resolve(Subject::field("mixed"), &User::new(2, "bob")).unwrap_err();
        assert_eq!(
            fault,
            ResolveFault::IncompatibleFieldTypes {
                subject: Subject::field("mixed"),
                shapes: "numeric, text".to_string(),
            }
        );
    }

    #[test]
    fn test_unsupported_field_type() {
        let fault = resolve(Subject::field("attachment"), &User::new(2, "bob")).unwrap_err();
        assert!(matches!(fault, ResolveFault::UnsupportedFieldType { .. }));
    }

    #[test]
    fn test_tracker_with_only_unqueryable_match_lacks_the_field() {
        let field = resolve(Subject::field("notes"), &User::new(2, "bob")).unwrap();
        assert_eq!(field.shape, FieldShape::Text);
        assert_eq!(field.source, ValueSource::Fields(vec![18]));
        assert_eq!(field.trackers_without_field, vec![2, 3]);
    }

    #[test]
    fn test_unknown_field() {
        let fault = resolve(Subject::field("nope"), &User::new(2, "bob")).unwrap_err();
        assert_eq!(
            fault,
            ResolveFault::FieldNotFound(FieldNotFoundFault {
                subject: Subject::field("nope")
            })
        );
    }

    #[test]
    fn test_unreadable_field_is_identical_to_missing_field() {
        let allowed = resolve(Subject::field("secret"), &User::new(1, "alice")).unwrap();
        assert_eq!(allowed.source, ValueSource::Fields(vec![15]));

        let denied = resolve(Subject::field("secret"), &User::new(2, "bob")).unwrap_err();
        let missing = resolve(Subject::field("nope"), &User::new(2, "bob")).unwrap_err();
        assert!(matches!(denied, ResolveFault::FieldNotFound(_)));
        assert_eq!(denied.to_string().replace("secret", "nope"), missing.to_string());
    }

    #[test]
    fn test_semantic_metadata() {
        let title = resolve(Subject::Metadata(Metadata::Title), &User::new(2, "bob")).unwrap();
        assert_eq!(title.shape, FieldShape::Text);
        assert_eq!(title.source, ValueSource::Fields(vec![11, 21]));

        let status = resolve(Subject::Metadata(Metadata::Status), &User::new(2, "bob")).unwrap();
        assert_eq!(status.shape, FieldShape::StatusSemantic);
        assert_eq!(status.trackers_without_field, vec![2, 3]);
    }

    #[test]
    fn test_undefined_semantic_is_not_found() {
        let fault =
            resolve(Subject::Metadata(Metadata::Description), &User::new(2, "bob")).unwrap_err();
        assert!(matches!(fault, ResolveFault::FieldNotFound(_)));
    }

    #[test]
    fn test_artifact_metadata_always_resolves() {
        let field = resolve(Subject::Metadata(Metadata::SubmittedOn), &User::anonymous()).unwrap();
        assert_eq!(field.source, ValueSource::Column(ArtifactColumn::SubmittedOn));
        assert!(!field.allows_empty_value());
    }

    #[test]
    fn test_field_takes_precedence_over_metadata_keyword() {
        let field = resolve(Subject::field("status"), &User::new(2, "bob")).unwrap();
        assert_eq!(field.shape, FieldShape::StaticList);
        assert_eq!(field.subject, Subject::field("status"));
    }

    #[test]
    fn test_bare_metadata_keyword_falls_back_to_metadata() {
        let field = resolve(Subject::field("title"), &User::new(2, "bob")).unwrap();
        assert_eq!(field.subject, Subject::Metadata(Metadata::Title));
        assert_eq!(field.shape, FieldShape::Text);
    }
}
