use serde::{Deserialize, Serialize};

/// How a filter argument is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgumentKind {
    /// Positional value: `| append: "x"`.
    #[default]
    Argument,
    /// Named value: `| default: x, allow_false: true`.
    Parameter,
    /// Any number of trailing positional values.
    Spread,
}

/// Value literal categories an argument can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Float,
    Boolean,
    /// A variable or object path.
    Reference,
}

/// One declared argument of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Argument {
    pub kind: ArgumentKind,
    /// Empty accepts every value type.
    pub accepts: Vec<ValueType>,
    pub required: bool,
}

impl Argument {
    pub fn new(accepts: &[ValueType]) -> Self {
        Self {
            accepts: accepts.to_vec(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(mut self, kind: ArgumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn accepts(&self, value: ValueType) -> bool {
        self.accepts.is_empty() || self.accepts.contains(&value)
    }
}

/// Grammar rules for a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub arguments: Vec<Argument>,
    pub description: Option<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn argument(mut self, argument: Argument) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty()
    }

    /// Whether the first argument must be supplied, making the `:` mandatory.
    pub fn requires_arguments(&self) -> bool {
        self.arguments.first().is_some_and(|a| a.required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accepts_everything() {
        let arg = Argument::default();
        assert!(arg.accepts(ValueType::String));
        assert!(arg.accepts(ValueType::Reference));
    }

    #[test]
    fn test_restricted_accepts() {
        let arg = Argument::new(&[ValueType::Integer, ValueType::Float]);
        assert!(arg.accepts(ValueType::Integer));
        assert!(!arg.accepts(ValueType::String));
    }

    #[test]
    fn test_requires_arguments() {
        assert!(!Filter::new().requires_arguments());
        let filter = Filter::new().argument(Argument::new(&[ValueType::String]).required());
        assert!(filter.has_arguments());
        assert!(filter.requires_arguments());
    }
}
