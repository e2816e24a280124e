//! Ordered prefix index
//!
//! [`PrefixStore`] maps [`AddressKey`]s to values in a `BTreeMap`. Because keys
//! order by address and then by length, every descendant of a prefix sits in
//! one contiguous key range after it, and every ancestor is one of at most 129
//! truncations of it. Both containment walks are built on those two facts.

use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::Error;
use crate::encoding::{AddressKey, KEY_BITS};

/// Ordered map from prefix keys to values
#[derive(Debug, Clone)]
pub struct PrefixStore<V> {
    entries: BTreeMap<AddressKey, V>,
}

impl<V> PrefixStore<V> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored prefixes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a new entry; an existing identical key is a conflict
    pub fn insert(&mut self, key: AddressKey, value: V) -> Result<(), Error> {
        match self.entries.entry(key) {
            btree_map::Entry::Occupied(_) => Err(Error::DuplicateKey(key.decode())),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// Insert or overwrite, returning the previous value
    pub fn replace(&mut self, key: AddressKey, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &AddressKey) -> Option<V> {
        self.entries.remove(key)
    }

    /// Exact lookup
    pub fn get(&self, key: &AddressKey) -> Option<&V> {
        self.entries.get(key)
    }

    /// Exact lookup for modification
    pub fn get_mut(&mut self, key: &AddressKey) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Whether the exact key is stored
    pub fn contains_key(&self, key: &AddressKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Most specific entry containing the key's network address.
    ///
    /// The query length is ignored; only entries of the query's family are
    /// candidates.
    pub fn longest_match(&self, key: &AddressKey) -> Option<(AddressKey, &V)> {
        let host = AddressKey::new(key.bits(), KEY_BITS);
        (key.min_len()..=KEY_BITS)
            .rev()
            .find_map(|len| self.entries.get_key_value(&host.truncate(len)))
            .map(|(k, v)| (*k, v))
    }

    /// All entries in ascending key order
    pub fn iter(&self) -> btree_map::Iter<'_, AddressKey, V> {
        self.entries.iter()
    }

    /// Entries of the query's family whose range overlaps `query`.
    ///
    /// Shorter entries (ancestors) come first in ascending length, then longer
    /// entries (descendants) in ascending key order. An entry equal to the
    /// query is never yielded.
    pub fn walk_overlap<'a>(
        &'a self,
        query: AddressKey,
        include_shorter: bool,
        include_longer: bool,
    ) -> impl Iterator<Item = (AddressKey, &'a V)> + 'a {
        let is_ipv4 = query.is_ipv4();

        let shorter_lens = if include_shorter {
            query.min_len()..query.len()
        } else {
            0..0
        };
        let ancestors = shorter_lens.filter_map(move |len| {
            self.entries
                .get_key_value(&query.truncate(len))
                .map(|(k, v)| (*k, v))
        });

        let descendants = if include_longer && query.len() < KEY_BITS {
            let lower = AddressKey::new(query.bits(), query.len() + 1);
            let upper = AddressKey::new(query.last(), KEY_BITS);
            Some(self.entries.range(lower..=upper))
        } else {
            None
        };
        let descendants = descendants
            .into_iter()
            .flatten()
            .filter(move |(k, _)| k.is_ipv4() == is_ipv4)
            .map(|(k, v)| (*k, v));

        ancestors.chain(descendants)
    }
}

impl<V> Default for PrefixStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, V> IntoIterator for &'a PrefixStore<V> {
    type Item = (&'a AddressKey, &'a V);
    type IntoIter = btree_map::Iter<'a, AddressKey, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> AddressKey {
        AddressKey::encode(&s.parse().unwrap())
    }

    fn store(prefixes: &[&str]) -> PrefixStore<String> {
        let mut store = PrefixStore::new();
        for p in prefixes {
            store.insert(key(p), p.to_string()).unwrap();
        }
        store
    }

    fn names<'a>(iter: impl Iterator<Item = (AddressKey, &'a String)>) -> Vec<String> {
        iter.map(|(_, v)| v.clone()).collect()
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut store = PrefixStore::new();
        store.insert(key("10.0.0.0/8"), 1).unwrap();

        // Host bits are masked away before comparison
        let err = store.insert(key("10.1.2.3/8"), 2).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(p) if p.to_string() == "10.0.0.0/8"));
        assert_eq!(store.get(&key("10.0.0.0/8")), Some(&1));

        assert_eq!(store.replace(key("10.0.0.0/8"), 3), Some(1));
        assert_eq!(store.get(&key("10.0.0.0/8")), Some(&3));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_is_exact() {
        let store = store(&["10.0.0.0/8"]);
        assert!(store.get(&key("10.0.0.0/16")).is_none());
        assert!(store.get(&key("10.0.0.0/8")).is_some());
    }

    #[test]
    fn test_longest_match() {
        let store = store(&["0.0.0.0/0", "10.0.0.0/8", "10.0.0.0/16", "10.0.0.0/24", "::/0"]);

        let (k, v) = store.longest_match(&key("10.0.0.77/32")).unwrap();
        assert_eq!(v, "10.0.0.0/24");
        assert_eq!(k, key("10.0.0.0/24"));

        // Query length is irrelevant
        let (_, v) = store.longest_match(&key("10.0.0.0/8")).unwrap();
        assert_eq!(v, "10.0.0.0/24");

        let (_, v) = store.longest_match(&key("10.0.1.1/32")).unwrap();
        assert_eq!(v, "10.0.0.0/16");

        let (_, v) = store.longest_match(&key("11.0.0.1/32")).unwrap();
        assert_eq!(v, "0.0.0.0/0");

        // IPv6 queries never land on IPv4 entries and vice versa
        let (_, v) = store.longest_match(&key("2001:db8::1/128")).unwrap();
        assert_eq!(v, "::/0");
    }

    #[test]
    fn test_longest_match_miss() {
        let store = store(&["10.0.0.0/8"]);
        assert!(store.longest_match(&key("11.0.0.0/32")).is_none());
        assert!(store.longest_match(&key("::ffff:0:0/95")).is_none());
    }

    #[test]
    fn test_iteration_order() {
        let store = store(&[
            "192.168.0.0/16",
            "10.0.0.0/24",
            "10.0.0.0/8",
            "10.1.0.0/16",
            "10.0.0.0/16",
        ]);
        let order: Vec<String> = store.iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            order,
            vec!["10.0.0.0/8", "10.0.0.0/16", "10.0.0.0/24", "10.1.0.0/16", "192.168.0.0/16"]
        );

        // A second traversal starts over
        assert_eq!(store.iter().count(), 5);
    }

    #[test]
    fn test_walk_overlap_ancestors() {
        let store = store(&["10.0.0.0/8", "10.0.0.0/16", "10.0.0.0/24", "10.1.0.0/16", "::/0"]);
        let ancestors = names(store.walk_overlap(key("10.0.0.128/25"), true, false));
        assert_eq!(ancestors, vec!["10.0.0.0/8", "10.0.0.0/16", "10.0.0.0/24"]);
    }

    #[test]
    fn test_walk_overlap_descendants() {
        let store = store(&[
            "10.0.0.0/8",
            "10.0.0.0/16",
            "10.0.0.0/24",
            "10.0.1.0/24",
            "10.1.0.0/16",
            "11.0.0.0/8",
        ]);
        let descendants = names(store.walk_overlap(key("10.0.0.0/16"), false, true));
        assert_eq!(descendants, vec!["10.0.0.0/24", "10.0.1.0/24"]);

        let both = names(store.walk_overlap(key("10.0.0.0/16"), true, true));
        assert_eq!(both, vec!["10.0.0.0/8", "10.0.0.0/24", "10.0.1.0/24"]);

        assert_eq!(store.walk_overlap(key("10.0.0.0/16"), false, false).count(), 0);
    }

    #[test]
    fn test_walk_overlap_separates_families() {
        let store = store(&["10.0.0.0/8", "2001:db8::/32", "2001:db8:1::/48"]);
        let under_v6_default = names(store.walk_overlap(key("::/0"), false, true));
        assert_eq!(under_v6_default, vec!["2001:db8::/32", "2001:db8:1::/48"]);

        let under_v4_default = names(store.walk_overlap(key("0.0.0.0/0"), false, true));
        assert_eq!(under_v4_default, vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_walk_overlap_host_route() {
        let store = store(&["10.0.0.1/32", "10.0.0.0/24"]);
        let walk = names(store.walk_overlap(key("10.0.0.1/32"), true, true));
        assert_eq!(walk, vec!["10.0.0.0/24"]);
    }
}
