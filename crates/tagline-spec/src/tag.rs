use serde::{Deserialize, Serialize};

/// Category of a `{% ... %}` tag. Decides which sub-grammar scans its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Block whose body is skipped verbatim (`comment`).
    Comment,
    /// Block whose body is emitted untokenized (`raw`).
    Raw,
    /// Conditional (`if`, `unless`, `case`, `when`, `else`).
    Control,
    /// Loop (`for`, `tablerow`).
    Iteration,
    /// Assignment (`assign`, `capture`, `increment`).
    Variable,
    /// Block holding another language (`schema`, `javascript`).
    Embedded,
    /// Outputs an expression (`echo`).
    Output,
    /// Pulls in another template (`render`, `include`, `section`).
    Import,
    Other,
}

impl Default for TagKind {
    fn default() -> Self {
        Self::Other
    }
}

/// Language held in the body of an embedded tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Json,
    Css,
    Javascript,
}

/// A modifier accepted after the collection of an iteration tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagParameter {
    pub name: String,
    /// `limit: 2` takes a value, `reversed` does not.
    #[serde(default)]
    pub value: bool,
}

/// Grammar rules for a single tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub kind: TagKind,
    /// Opens a scope closed by `end<name>`.
    pub block: bool,
    /// Takes no arguments and no body (`break`, `continue`).
    pub singular: bool,
    /// Accepts arguments after its name. For variable tags this means an
    /// `= value` assignment is required.
    pub arguments: bool,
    /// Tags this one must be placed directly inside. Empty means anywhere.
    pub parents: Vec<String>,
    pub parameters: Vec<TagParameter>,
    pub language: Option<Language>,
    pub description: Option<String>,
}

impl Tag {
    pub fn new(kind: TagKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn block(mut self) -> Self {
        self.block = true;
        self
    }

    pub fn singular(mut self) -> Self {
        self.singular = true;
        self
    }

    pub fn arguments(mut self) -> Self {
        self.arguments = true;
        self
    }

    pub fn parents(mut self, parents: &[&str]) -> Self {
        self.parents = parents.iter().map(|p| (*p).to_string()).collect();
        self
    }

    pub fn parameter(mut self, name: &str, value: bool) -> Self {
        self.parameters.push(TagParameter {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Whether placement must be validated against the enclosing tag.
    pub fn has_placement(&self) -> bool {
        !self.parents.is_empty()
    }

    /// Look up an iteration parameter. `Some(true)` when it takes a value.
    pub fn parameter_value(&self, name: &str) -> Option<bool> {
        self.parameters.iter().find(|p| p.name == name).map(|p| p.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builder_sets_flags() {
        let tag = Tag::new(TagKind::Control).block().arguments();
        assert_eq!(tag.kind, TagKind::Control);
        assert!(tag.block);
        assert!(tag.arguments);
        assert!(!tag.singular);
        assert!(!tag.has_placement());
    }

    #[test]
    fn test_parameter_lookup() {
        let tag = Tag::new(TagKind::Iteration)
            .parameter("limit", true)
            .parameter("reversed", false);
        assert_eq!(tag.parameter_value("limit"), Some(true));
        assert_eq!(tag.parameter_value("reversed"), Some(false));
        assert_eq!(tag.parameter_value("cols"), None);
    }

    #[test]
    fn test_deserialize_defaults() {
        let tag: Tag = serde_json::from_str(r#"{ "kind": "control", "parents": ["if"] }"#).unwrap();
        assert_eq!(tag.kind, TagKind::Control);
        assert!(tag.has_placement());
        assert!(!tag.block);
        assert_eq!(tag.language, None);
    }
}
