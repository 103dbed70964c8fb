//! Tagline knowledge base
//!
//! Describes the tags, filters and objects of a Liquid dialect so that the
//! scanner in `tagline-lexer` can validate what it reads. A dialect is plain
//! data: build one in code, start from [`Spec::standard`] or
//! [`Spec::shopify`], or load it from JSON.
//!
//! # Example
//!
//! ```
//! use tagline_spec::{Expect, Spec};
//!
//! let spec = Spec::standard();
//! let mut cursor = spec.cursor();
//! cursor.set_expect(Expect::Filter);
//! assert!(cursor.cursor("upcase"));
//! ```

pub mod cursor;
pub mod filter;
pub mod object;
pub mod standard;
pub mod tag;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use cursor::{Cursor, Expect};
pub use filter::{Argument, ArgumentKind, Filter, ValueType};
pub use object::Object;
pub use tag::{Language, Tag, TagKind, TagParameter};

/// Error raised while loading a dialect.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("Invalid spec JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Tag '{name}' lists unknown parent '{parent}'")]
    UnknownParent { name: String, parent: String },
}

/// A complete dialect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spec {
    pub tags: BTreeMap<String, Tag>,
    pub filters: BTreeMap<String, Filter>,
    pub objects: BTreeMap<String, Object>,
    /// HTML tag names tracked by the scanner's HTML sub-grammar.
    pub associates: Vec<String>,
}

impl Spec {
    /// An empty dialect: every name is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a dialect from JSON and check that placement parents exist.
    pub fn from_json(source: &str) -> Result<Self, SpecError> {
        let spec: Spec = serde_json::from_str(source)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn to_json(&self) -> Result<String, SpecError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overlay `other` on top of this dialect. Entries in `other` win.
    pub fn merge(mut self, other: Spec) -> Self {
        self.tags.extend(other.tags);
        self.filters.extend(other.filters);
        self.objects.extend(other.objects);
        for associate in other.associates {
            if !self.associates.contains(&associate) {
                self.associates.push(associate);
            }
        }
        self
    }

    pub fn tag(mut self, name: &str, tag: Tag) -> Self {
        self.tags.insert(name.to_string(), tag);
        self
    }

    pub fn filter(mut self, name: &str, filter: Filter) -> Self {
        self.filters.insert(name.to_string(), filter);
        self
    }

    pub fn object(mut self, name: &str, object: Object) -> Self {
        self.objects.insert(name.to_string(), object);
        self
    }

    pub fn associate(mut self, name: &str) -> Self {
        self.associates.push(name.to_string());
        self
    }

    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(self)
    }

    fn validate(&self) -> Result<(), SpecError> {
        for (name, tag) in &self.tags {
            if let Some(parent) = tag.parents.iter().find(|p| !self.tags.contains_key(*p)) {
                return Err(SpecError::UnknownParent {
                    name: name.clone(),
                    parent: parent.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json() {
        let spec = Spec::from_json(
            r#"{
                "tags": {
                    "if": { "kind": "control", "block": true, "arguments": true },
                    "else": { "kind": "control", "parents": ["if"] }
                },
                "filters": {
                    "append": { "arguments": [{ "accepts": ["string"], "required": true }] }
                },
                "objects": { "page": { "properties": { "title": {} } } }
            }"#,
        )
        .unwrap();
        assert_eq!(spec.tags.len(), 2);
        assert_eq!(spec.tags["else"].parents, vec!["if".to_string()]);
        assert!(spec.filters["append"].requires_arguments());
        assert!(spec.objects["page"].lookup("title").is_some());
    }

    #[test]
    fn test_from_json_rejects_unknown_parent() {
        let err = Spec::from_json(r#"{ "tags": { "else": { "kind": "control", "parents": ["if"] } } }"#)
            .unwrap_err();
        assert!(matches!(err, SpecError::UnknownParent { .. }));
        assert!(err.to_string().contains("unknown parent 'if'"));
    }

    #[test]
    fn test_from_json_syntax_error() {
        let err = Spec::from_json("{ tags").unwrap_err();
        assert!(matches!(err, SpecError::Json(_)));
    }

    #[test]
    fn test_json_round_trip_of_standard() {
        let spec = Spec::standard();
        let json = spec.to_json().unwrap();
        assert_eq!(Spec::from_json(&json).unwrap(), spec);
    }

    #[test]
    fn test_merge_overrides() {
        let custom = Spec::new()
            .tag("if", Tag::new(TagKind::Other))
            .associate("script");
        let spec = Spec::standard().merge(custom);
        assert_eq!(spec.tags["if"].kind, TagKind::Other);
        assert!(spec.tags.contains_key("for"));
        assert_eq!(spec.associates, vec!["script".to_string()]);
    }
}
