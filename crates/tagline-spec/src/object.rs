use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema of a known object or one of its properties.
///
/// `properties: None` leaves the object unchecked: any property name is
/// accepted. A map restricts access to the listed names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Object {
    pub properties: Option<BTreeMap<String, Object>>,
    pub description: Option<String>,
}

impl Object {
    /// An object whose properties are not validated.
    pub fn any() -> Self {
        Self::default()
    }

    /// An object restricted to the given unchecked properties.
    pub fn with(names: &[&str]) -> Self {
        let properties = names
            .iter()
            .map(|name| ((*name).to_string(), Object::any()))
            .collect();
        Self {
            properties: Some(properties),
            description: None,
        }
    }

    /// Add or replace a nested property schema.
    pub fn property(mut self, name: &str, object: Object) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), object);
        self
    }

    /// `None` when this object is unchecked, otherwise whether `name` exists.
    pub fn lookup(&self, name: &str) -> Option<Option<&Object>> {
        self.properties.as_ref().map(|props| props.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unchecked_lookup() {
        assert_eq!(Object::any().lookup("anything"), None);
    }

    #[test]
    fn test_checked_lookup() {
        let product = Object::with(&["title"]).property("featured_image", Object::with(&["src"]));
        assert!(matches!(product.lookup("title"), Some(Some(_))));
        assert!(matches!(product.lookup("nope"), Some(None)));
        let image = product.lookup("featured_image").flatten().unwrap();
        assert!(matches!(image.lookup("src"), Some(Some(_))));
    }
}
