//! Join aliases derived from query subjects.
//!
//! Every subject gets one slug per compilation. Joins that do not depend on the compared
//! value are keyed by that slug, so a field referenced twice is joined once.

use std::collections::{HashMap, HashSet};

use crate::ast::Subject;

/// Longest slug kept before the collision suffix, well under identifier length limits.
const MAX_SLUG_LENGTH: usize = 40;

/// Allocates alias slugs for one compilation.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    by_subject: HashMap<Subject, String>,
    used: HashSet<String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aliases_for(&mut self, subject: &Subject) -> SubjectAliases {
        if let Some(slug) = self.by_subject.get(subject) {
            return SubjectAliases { slug: slug.clone() };
        }

        let base = slug(subject);
        let mut candidate = base.clone();
        let mut counter = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{base}_{counter}");
            counter += 1;
        }

        self.used.insert(candidate.clone());
        self.by_subject.insert(subject.clone(), candidate.clone());
        SubjectAliases { slug: candidate }
    }
}

/// Lowercase ASCII letters, digits and underscores only. Metadata slugs are prefixed so
/// that a field named like a metadata keyword does not share its joins.
fn slug(subject: &Subject) -> String {
    let raw = match subject {
        Subject::Field(name) => name.clone(),
        Subject::Metadata(metadata) => format!("meta_{}", metadata.keyword()),
    };
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .take(MAX_SLUG_LENGTH)
        .collect()
}

/// Aliases of the joins one subject can need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAliases {
    slug: String,
}

impl SubjectAliases {
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `tracker_changeset_value` row of the field in the last changeset
    pub fn changeset_value(&self) -> String {
        format!("tf_{}", self.slug)
    }

    pub fn text_value(&self) -> String {
        format!("cvt_{}", self.slug)
    }

    pub fn int_value(&self) -> String {
        format!("cvi_{}", self.slug)
    }

    pub fn float_value(&self) -> String {
        format!("cvf_{}", self.slug)
    }

    pub fn date_value(&self) -> String {
        format!("cvd_{}", self.slug)
    }

    /// Sub-select of the changesets whose status is an open value
    pub fn open_status(&self) -> String {
        format!("open_{}", self.slug)
    }

    pub fn user(&self) -> String {
        format!("u_{}", self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Metadata;

    #[test]
    fn test_same_subject_same_aliases() {
        let mut registry = AliasRegistry::new();
        let first = registry.aliases_for(&Subject::field("Due Date"));
        let second = registry.aliases_for(&Subject::field("Due Date"));
        assert_eq!(first, second);
        assert_eq!(first.changeset_value(), "tf_due_date");
    }

    #[test]
    fn test_colliding_slugs_get_a_counter() {
        let mut registry = AliasRegistry::new();
        let spaced = registry.aliases_for(&Subject::field("due date"));
        let dashed = registry.aliases_for(&Subject::field("due-date"));
        let upper = registry.aliases_for(&Subject::field("DUE_DATE"));
        assert_eq!(spaced.slug(), "due_date");
        assert_eq!(dashed.slug(), "due_date_2");
        assert_eq!(upper.slug(), "due_date_3");
        assert_eq!(registry.aliases_for(&Subject::field("due-date")).slug(), "due_date_2");
    }

    #[test]
    fn test_metadata_and_field_with_the_same_name_do_not_collide() {
        let mut registry = AliasRegistry::new();
        let field = registry.aliases_for(&Subject::field("title"));
        let metadata = registry.aliases_for(&Subject::Metadata(Metadata::Title));
        assert_ne!(field.changeset_value(), metadata.changeset_value());
        assert_eq!(metadata.text_value(), "cvt_meta_title");
    }

    #[test]
    fn test_slug_is_sql_safe() {
        let mut registry = AliasRegistry::new();
        let aliases = registry.aliases_for(&Subject::field("é`; DROP"));
        assert!(aliases
            .slug()
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }
}
