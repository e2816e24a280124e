//! Registered routes
//!
//! A [`Route`] pairs a masked prefix with its labels. Routes handed out by the
//! table are copies; changing one never changes the table.

use std::fmt;

use crate::Result;
use crate::labels::LabelSet;
use crate::prefix::Prefix;
use crate::rib::Rib;

/// A prefix and its labels
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    prefix: Prefix,
    labels: LabelSet,
}

impl Route {
    /// Create a route
    pub fn new(prefix: Prefix, labels: LabelSet) -> Self {
        Self { prefix, labels }
    }

    /// The route's prefix
    pub fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// The route's labels
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Split into prefix and labels
    pub fn into_parts(self) -> (Prefix, LabelSet) {
        (self.prefix, self.labels)
    }

    /// Value of a label
    pub fn get(&self, key: &str) -> Option<&str> {
        self.labels.get(key)
    }

    /// Whether a label is present
    pub fn has(&self, key: &str) -> bool {
        self.labels.has(key)
    }

    /// The same route with `overlay` merged over its labels
    pub fn update_label(mut self, overlay: &LabelSet) -> Self {
        self.labels = LabelSet::merge(&self.labels, overlay);
        self
    }

    /// Registered routes more specific than this one
    pub fn children(&self, rib: &Rib) -> Vec<Route> {
        rib.children(&self.prefix)
    }

    /// Registered routes less specific than this one
    pub fn parents(&self, rib: &Rib) -> Vec<Route> {
        rib.parents(&self.prefix)
    }

    /// Lowest free block of length `len` inside this route's prefix
    pub fn find_free_prefix(&self, rib: &Rib, len: u8) -> Result<Prefix> {
        rib.find_free_prefix(&self.prefix, len)
    }
}

impl From<Prefix> for Route {
    fn from(prefix: Prefix) -> Self {
        Route::new(prefix, LabelSet::new())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.prefix, self.labels)
    }
}

/// Serializes as `{ "<prefix>": "<rendered labels>" }`
#[cfg(feature = "serialization")]
impl serde::Serialize for Route {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.prefix.to_string(), &self.labels.to_string())?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(prefix: &str, labels: &[(&str, &str)]) -> Route {
        Route::new(prefix.parse().unwrap(), labels.iter().copied().collect())
    }

    #[test]
    fn test_display() {
        let r = route("192.168.0.0/25", &[("type", "prefix"), ("description", "hans1")]);
        assert_eq!(r.to_string(), "192.168.0.0/25 description=hans1,type=prefix");
    }

    #[test]
    fn test_update_label_merges() {
        let r = route("10.0.0.0/8", &[("description", "rfc1918")]);
        let updated = r.clone().update_label(&LabelSet::from([("env", "prod")]));
        assert_eq!(updated.get("description"), Some("rfc1918"));
        assert_eq!(updated.get("env"), Some("prod"));
        assert!(!r.has("env"));
    }

    #[test]
    fn test_route_queries_through_rib() {
        let rib = Rib::new();
        rib.add(route("10.0.0.0/16", &[])).unwrap();
        rib.add(route("10.0.0.0/24", &[])).unwrap();

        let parent = rib.get(&"10.0.0.0/16".parse().unwrap()).unwrap();
        assert_eq!(parent.children(&rib), vec![route("10.0.0.0/24", &[])]);
        assert_eq!(parent.find_free_prefix(&rib, 24).unwrap().to_string(), "10.0.1.0/24");

        let child = route("10.0.0.0/24", &[]);
        assert_eq!(child.parents(&rib), vec![parent]);
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_serialize_shape() {
        let r = route("10.0.0.0/8", &[("env", "prod"), ("description", "rfc1918")]);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"10.0.0.0/8":"description=rfc1918,env=prod"}"#);

        let list = serde_json::to_value(vec![r.clone(), route("::/0", &[])]).unwrap();
        assert_eq!(
            list,
            serde_json::json!([{"10.0.0.0/8": "description=rfc1918,env=prod"}, {"::/0": ""}])
        );
    }
}
