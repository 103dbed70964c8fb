//! Stateful lookups into a [`Spec`].
//!
//! A scanner resolves names one at a time and then asks questions about the
//! entry it just resolved, so the cursor remembers the active tag, the active
//! filter with its argument position, and the object reached by the property
//! path walked so far. The three slots are independent: resolving a filter
//! does not forget which tag the filter appears in.

use crate::filter::{Argument, Filter};
use crate::object::Object;
use crate::tag::Tag;
use crate::Spec;

const ARRAY_PROPERTIES: &[&str] = &["size", "first", "last"];

/// Namespace a name is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expect {
    #[default]
    Tag,
    Object,
    Filter,
}

/// Cursor over a borrowed [`Spec`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    spec: &'a Spec,
    expect: Expect,
    tag: Option<(&'a str, &'a Tag)>,
    filter: Option<&'a Filter>,
    argument: usize,
    object: Option<&'a Object>,
}

impl<'a> Cursor<'a> {
    pub fn new(spec: &'a Spec) -> Self {
        Self {
            spec,
            expect: Expect::Tag,
            tag: None,
            filter: None,
            argument: 0,
            object: None,
        }
    }

    pub fn set_expect(&mut self, expect: Expect) {
        self.expect = expect;
    }

    pub fn expect(&self) -> Expect {
        self.expect
    }

    /// Resolve `name` in the expected namespace. Returns whether it is known.
    ///
    /// Resolving an unknown name clears the slot for that namespace.
    pub fn cursor(&mut self, name: &str) -> bool {
        match self.expect {
            Expect::Tag => {
                self.tag = self
                    .spec
                    .tags
                    .get_key_value(name)
                    .map(|(key, tag)| (key.as_str(), tag));
                self.tag.is_some()
            }
            Expect::Object => {
                self.object = self.spec.objects.get(name);
                self.object.is_some()
            }
            Expect::Filter => {
                self.filter = self.spec.filters.get(name);
                self.argument = 0;
                self.filter.is_some()
            }
        }
    }

    pub fn tag(&self) -> Option<&'a Tag> {
        self.tag.map(|(_, tag)| tag)
    }

    pub fn tag_name(&self) -> Option<&'a str> {
        self.tag.map(|(name, _)| name)
    }

    pub fn filter(&self) -> Option<&'a Filter> {
        self.filter
    }

    /// The declared argument the filter cursor currently points at.
    pub fn argument(&self) -> Option<&'a Argument> {
        self.filter?.arguments.get(self.argument)
    }

    pub fn argument_index(&self) -> usize {
        self.argument
    }

    pub fn is_last_argument(&self) -> bool {
        self.filter
            .map_or(true, |filter| self.argument + 1 >= filter.arguments.len())
    }

    /// Move to the next declared argument. Returns `false` at the last one.
    pub fn next_argument(&mut self) -> bool {
        if self.is_last_argument() {
            return false;
        }
        self.argument += 1;
        true
    }

    pub fn reset_filter(&mut self) {
        self.filter = None;
        self.argument = 0;
    }

    /// Step the object path into `name`.
    ///
    /// `None` when the path is not being checked, `Some(false)` when the
    /// current object declares its properties and `name` is not one of them.
    /// Any answer other than `Some(true)` stops checking for the rest of the path.
    /// Array helpers (`size`, `first`, `last`) are never checked.
    pub fn property(&mut self, name: &str) -> Option<bool> {
        let object = self.object?;
        if ARRAY_PROPERTIES.contains(&name) {
            self.object = None;
            return None;
        }
        match object.lookup(name) {
            Some(Some(next)) => {
                self.object = Some(next);
                Some(true)
            }
            Some(None) => {
                self.object = None;
                Some(false)
            }
            None => {
                self.object = None;
                None
            }
        }
    }

    pub fn release_object(&mut self) {
        self.object = None;
    }

    pub fn is_associate(&self, name: &str) -> bool {
        self.spec
            .associates
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(name))
    }

    pub fn has_associates(&self) -> bool {
        !self.spec.associates.is_empty()
    }
}
