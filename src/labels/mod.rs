//! Route labels
//!
//! A [`LabelSet`] is the key/value metadata attached to every registered
//! prefix. It renders deterministically (sorted by key) as `k1=v1,k2=v2`.

pub mod selector;

pub use selector::{Requirement, Selector};

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Key/value labels attached to a route
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Create an empty label set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Union of both sets; `overlay` wins where both define a key.
    ///
    /// Neither input is modified.
    pub fn merge(base: &LabelSet, overlay: &LabelSet) -> LabelSet {
        let mut merged = base.clone();
        for (k, v) in &overlay.0 {
            merged.0.insert(k.clone(), v.clone());
        }
        merged
    }

    /// `self` merged under `overlay`
    pub fn merged(&self, overlay: &LabelSet) -> LabelSet {
        LabelSet::merge(self, overlay)
    }

    /// Value of a label
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a label is present
    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a label, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a label
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no labels
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Labels in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for LabelSet {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<HashMap<String, String>> for LabelSet {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for LabelSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering_is_sorted() {
        let labels =
            LabelSet::from([("type", "prefix"), ("description", "hans1"), ("env", "prod")]);
        assert_eq!(labels.to_string(), "description=hans1,env=prod,type=prefix");
        assert_eq!(LabelSet::new().to_string(), "");
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base = LabelSet::from([("type", "aggregate"), ("rir", "RIPE")]);
        let overlay = LabelSet::from([("type", "prefix"), ("env", "prod")]);

        let merged = LabelSet::merge(&base, &overlay);
        assert_eq!(merged.get("type"), Some("prefix"));
        assert_eq!(merged.get("rir"), Some("RIPE"));
        assert_eq!(merged.get("env"), Some("prod"));
        assert_eq!(merged.len(), 3);

        // Inputs untouched
        assert_eq!(base.get("type"), Some("aggregate"));
        assert!(!base.has("env"));
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn test_empty_set_is_valid() {
        let labels = LabelSet::new();
        assert!(labels.is_empty());
        assert_eq!(labels.merged(&LabelSet::new()), LabelSet::new());
    }

    #[test]
    fn test_insert_remove() {
        let mut labels = LabelSet::new();
        assert_eq!(labels.insert("foo", "bar"), None);
        assert_eq!(labels.insert("foo", "baz"), Some("bar".to_string()));
        assert!(labels.has("foo"));
        assert_eq!(labels.remove("foo"), Some("baz".to_string()));
        assert!(!labels.has("foo"));
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_serialize_as_object() {
        let labels = LabelSet::from([("b", "2"), ("a", "1")]);
        let json = serde_json::to_string(&labels).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);
    }
}
