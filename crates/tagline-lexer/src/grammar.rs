//! The scanner's read-only view of a dialect.
//!
//! The scanner never looks names up itself. It resolves them through a
//! [`Grammar`] and then asks about the entry that was resolved. The
//! knowledge base in `tagline-spec` is the production implementation; tests
//! can supply a hand-written one.

use tagline_spec::{ArgumentKind, Cursor, Expect, Language, TagKind, ValueType};

pub trait Grammar {
    /// Set the namespace the next [`Grammar::cursor`] call resolves against.
    fn set_expect(&mut self, expect: Expect);

    fn expect(&self) -> Expect;

    /// Resolve a name in the expected namespace. Returns whether it is known.
    fn cursor(&mut self, name: &str) -> bool;

    /// Category of the active tag.
    fn kind(&self) -> Option<TagKind>;

    /// The active tag takes no arguments and has no body.
    fn is_singular(&self) -> bool {
        false
    }

    /// The active tag opens a scope closed by an end tag.
    fn is_block(&self) -> bool {
        false
    }

    /// The active tag may only appear inside certain parents.
    fn has_placement(&self) -> bool {
        false
    }

    /// Whether the active tag may appear inside `parent`.
    fn in_parent(&self, parent: Option<&str>) -> bool {
        let _ = parent;
        true
    }

    /// The active tag accepts arguments.
    fn has_arguments(&self) -> bool {
        true
    }

    /// Body language of the active embedded tag.
    fn language(&self) -> Option<Language> {
        None
    }

    /// Iteration parameter lookup on the active tag. `Some(true)` when it takes a value.
    fn parameter(&self, name: &str) -> Option<bool> {
        let _ = name;
        None
    }

    /// Step the resolved object's property path. `None` when unchecked.
    fn property(&mut self, name: &str) -> Option<bool> {
        let _ = name;
        None
    }

    /// Stop validating the current object path.
    fn release_object(&mut self) {}

    /// The active filter declares arguments.
    fn filter_has_arguments(&self) -> bool {
        false
    }

    /// The active filter's first argument is mandatory.
    fn filter_requires_arguments(&self) -> bool {
        false
    }

    /// Kind of the filter argument under the cursor.
    fn argument(&self) -> Option<ArgumentKind> {
        None
    }

    /// The filter argument under the cursor is mandatory.
    fn is_required(&self) -> bool {
        false
    }

    /// The filter argument under the cursor accepts `value`.
    fn accepts(&self, value: ValueType) -> bool {
        let _ = value;
        true
    }

    /// The filter argument under the cursor is the last declared one.
    fn is_last(&self) -> bool {
        true
    }

    /// Move to the next declared filter argument.
    fn next_argument(&mut self) -> bool {
        false
    }

    fn reset_filter(&mut self) {}

    /// Any HTML tags take part in the HTML sub-grammar.
    fn has_associates(&self) -> bool {
        false
    }

    fn is_associate(&self, name: &str) -> bool {
        let _ = name;
        false
    }
}

impl Grammar for Cursor<'_> {
    fn set_expect(&mut self, expect: Expect) {
        Cursor::set_expect(self, expect);
    }

    fn expect(&self) -> Expect {
        Cursor::expect(self)
    }

    fn cursor(&mut self, name: &str) -> bool {
        Cursor::cursor(self, name)
    }

    fn kind(&self) -> Option<TagKind> {
        self.tag().map(|tag| tag.kind)
    }

    fn is_singular(&self) -> bool {
        self.tag().is_some_and(|tag| tag.singular)
    }

    fn is_block(&self) -> bool {
        self.tag().is_some_and(|tag| tag.block)
    }

    fn has_placement(&self) -> bool {
        self.tag().is_some_and(|tag| tag.has_placement())
    }

    fn in_parent(&self, parent: Option<&str>) -> bool {
        match (self.tag(), parent) {
            (Some(tag), _) if !tag.has_placement() => true,
            (Some(tag), Some(parent)) => tag.parents.iter().any(|p| p == parent),
            _ => false,
        }
    }

    fn has_arguments(&self) -> bool {
        self.tag().is_some_and(|tag| tag.arguments)
    }

    fn language(&self) -> Option<Language> {
        self.tag().and_then(|tag| tag.language)
    }

    fn parameter(&self, name: &str) -> Option<bool> {
        self.tag().and_then(|tag| tag.parameter_value(name))
    }

    fn property(&mut self, name: &str) -> Option<bool> {
        Cursor::property(self, name)
    }

    fn release_object(&mut self) {
        Cursor::release_object(self);
    }

    fn filter_has_arguments(&self) -> bool {
        self.filter().is_some_and(|filter| filter.has_arguments())
    }

    fn filter_requires_arguments(&self) -> bool {
        self.filter().is_some_and(|filter| filter.requires_arguments())
    }

    fn argument(&self) -> Option<ArgumentKind> {
        Cursor::argument(self).map(|argument| argument.kind)
    }

    fn is_required(&self) -> bool {
        Cursor::argument(self).is_some_and(|argument| argument.required)
    }

    fn accepts(&self, value: ValueType) -> bool {
        Cursor::argument(self).is_some_and(|argument| argument.accepts(value))
    }

    fn is_last(&self) -> bool {
        self.is_last_argument()
    }

    fn next_argument(&mut self) -> bool {
        Cursor::next_argument(self)
    }

    fn reset_filter(&mut self) {
        Cursor::reset_filter(self);
    }

    fn has_associates(&self) -> bool {
        Cursor::has_associates(self)
    }

    fn is_associate(&self, name: &str) -> bool {
        Cursor::is_associate(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagline_spec::Spec;

    #[test]
    fn test_placement_through_adapter() {
        let spec = Spec::standard();
        let mut grammar = spec.cursor();
        Grammar::set_expect(&mut grammar, Expect::Tag);
        assert!(Grammar::cursor(&mut grammar, "else"));
        assert!(grammar.has_placement());
        assert!(grammar.in_parent(Some("if")));
        assert!(grammar.in_parent(Some("for")));
        assert!(!grammar.in_parent(Some("capture")));
        assert!(!grammar.in_parent(None));

        assert!(Grammar::cursor(&mut grammar, "if"));
        assert!(grammar.in_parent(None));
        assert!(grammar.is_block());
        assert!(grammar.has_arguments());
    }

    #[test]
    fn test_filter_arguments_through_adapter() {
        let spec = Spec::standard();
        let mut grammar = spec.cursor();
        Grammar::set_expect(&mut grammar, Expect::Filter);
        assert!(Grammar::cursor(&mut grammar, "truncate"));
        assert!(grammar.filter_has_arguments());
        assert!(grammar.filter_requires_arguments());
        assert_eq!(Grammar::argument(&grammar), Some(ArgumentKind::Argument));
        assert!(grammar.accepts(ValueType::Integer));
        assert!(!grammar.accepts(ValueType::Boolean));
        assert!(!grammar.is_last());
        assert!(Grammar::next_argument(&mut grammar));
        assert!(!grammar.is_required());
        assert!(grammar.accepts(ValueType::String));
        assert!(grammar.is_last());
    }
}
