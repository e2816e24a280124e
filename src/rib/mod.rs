//! The IPAM table
//!
//! [`Rib`] owns one [`PrefixStore`] behind a single reader/writer lock. Every
//! public call takes that lock exactly once, so each call is atomic with
//! respect to other callers. Queries return owned [`Route`] copies.

pub mod allocator;
pub mod route;

pub use route::Route;

use std::net::IpAddr;

use log::{debug, trace, warn};
use parking_lot::RwLock;

use crate::config::RibConfig;
use crate::encoding::AddressKey;
use crate::interval::decompose;
use crate::labels::{LabelSet, Selector};
use crate::prefix::Prefix;
use crate::store::PrefixStore;
use crate::{Error, Result};

/// In-memory IPAM table
pub struct Rib {
    store: RwLock<PrefixStore<LabelSet>>,
    config: RibConfig,
}

impl Rib {
    /// Create an empty table with the default configuration
    pub fn new() -> Self {
        Self::with_config(RibConfig::default())
    }

    /// Create an empty table
    pub fn with_config(config: RibConfig) -> Self {
        Self {
            store: RwLock::new(PrefixStore::new()),
            config,
        }
    }

    /// The table's configuration
    pub fn config(&self) -> &RibConfig {
        &self.config
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    fn with_defaults(&self, labels: LabelSet) -> LabelSet {
        if self.config.default_labels.is_empty() {
            labels
        } else {
            LabelSet::merge(&self.config.default_labels, &labels)
        }
    }

    fn check_capacity(&self, store: &PrefixStore<LabelSet>, extra: usize) -> Result<()> {
        match self.config.max_routes {
            Some(max) if store.len() + extra > max => {
                warn!("rejecting {} new route(s): table holds {} of {}", extra, store.len(), max);
                Err(Error::CapacityExceeded(max))
            }
            _ => Ok(()),
        }
    }

    /// Register a route. An existing route with the same masked prefix is a
    /// conflict and is left untouched.
    pub fn add(&self, route: Route) -> Result<()> {
        let (prefix, labels) = route.into_parts();
        let key = AddressKey::encode(&prefix);
        let labels = self.with_defaults(labels);

        let mut store = self.store.write();
        if store.contains_key(&key) {
            return Err(Error::DuplicateKey(prefix));
        }
        self.check_capacity(&store, 1)?;
        store.insert(key, labels)?;
        debug!("added {}", prefix);
        Ok(())
    }

    /// Register a route, replacing any existing route with the same prefix.
    ///
    /// Returns the replaced route.
    pub fn upsert(&self, route: Route) -> Result<Option<Route>> {
        let (prefix, labels) = route.into_parts();
        let key = AddressKey::encode(&prefix);
        let labels = self.with_defaults(labels);

        let mut store = self.store.write();
        if !store.contains_key(&key) {
            self.check_capacity(&store, 1)?;
        }
        let previous = store.replace(key, labels).map(|old| Route::new(prefix, old));
        debug!("upserted {} (replaced: {})", prefix, previous.is_some());
        Ok(previous)
    }

    /// Exact lookup
    pub fn get(&self, prefix: &Prefix) -> Result<Route> {
        let store = self.store.read();
        store
            .get(&AddressKey::encode(prefix))
            .map(|labels| Route::new(*prefix, labels.clone()))
            .ok_or(Error::NotFound(*prefix))
    }

    /// Longest-prefix match on the prefix's network address
    pub fn match_prefix(&self, prefix: &Prefix) -> Result<Route> {
        let store = self.store.read();
        let found = store
            .longest_match(&AddressKey::encode(prefix))
            .map(|(key, labels)| Route::new(key.decode(), labels.clone()));
        trace!("match {} -> {:?}", prefix, found.as_ref().map(Route::prefix));
        found.ok_or(Error::NotFound(*prefix))
    }

    /// All registered ancestors, least specific first
    pub fn parents(&self, prefix: &Prefix) -> Vec<Route> {
        self.walk(prefix, true, false)
    }

    /// All registered routes inside the prefix that are more specific than
    /// it, in ascending address order
    pub fn children(&self, prefix: &Prefix) -> Vec<Route> {
        self.walk(prefix, false, true)
    }

    fn walk(&self, prefix: &Prefix, shorter: bool, longer: bool) -> Vec<Route> {
        let store = self.store.read();
        let routes: Vec<Route> = store
            .walk_overlap(AddressKey::encode(prefix), shorter, longer)
            .map(|(key, labels)| Route::new(key.decode(), labels.clone()))
            .collect();
        trace!(
            "walk {} (shorter: {}, longer: {}) -> {} routes",
            prefix,
            shorter,
            longer,
            routes.len()
        );
        routes
    }

    /// Routes whose labels match the selector, in address order
    pub fn select(&self, selector: &Selector) -> Vec<Route> {
        let store = self.store.read();
        store
            .iter()
            .filter(|(_, labels)| selector.matches(labels))
            .map(|(key, labels)| Route::new(key.decode(), labels.clone()))
            .collect()
    }

    /// Parse a selector expression and select with it
    pub fn select_str(&self, selector: &str) -> Result<Vec<Route>> {
        let selector = Selector::parse(selector)?;
        Ok(self.select(&selector))
    }

    /// Merge `overlay` over a route's labels; new keys win
    pub fn update_label(&self, prefix: &Prefix, overlay: &LabelSet) -> Result<Route> {
        let mut store = self.store.write();
        let labels = store
            .get_mut(&AddressKey::encode(prefix))
            .ok_or(Error::NotFound(*prefix))?;
        *labels = LabelSet::merge(labels, overlay);
        debug!("updated labels of {}", prefix);
        Ok(Route::new(*prefix, labels.clone()))
    }

    /// Replace a route's labels entirely
    pub fn update(&self, prefix: &Prefix, labels: LabelSet) -> Result<Route> {
        let mut store = self.store.write();
        let current = store
            .get_mut(&AddressKey::encode(prefix))
            .ok_or(Error::NotFound(*prefix))?;
        *current = labels;
        debug!("replaced labels of {}", prefix);
        Ok(Route::new(*prefix, current.clone()))
    }

    /// Remove a route
    pub fn delete(&self, prefix: &Prefix) -> Result<Route> {
        let mut store = self.store.write();
        let labels = store
            .remove(&AddressKey::encode(prefix))
            .ok_or(Error::NotFound(*prefix))?;
        debug!("deleted {}", prefix);
        Ok(Route::new(*prefix, labels))
    }

    /// Register every block of the minimal CIDR cover of `[start, end]`.
    ///
    /// All or nothing: if any block is already registered, nothing is added.
    pub fn add_range(&self, start: IpAddr, end: IpAddr, labels: LabelSet) -> Result<Vec<Route>> {
        let prefixes = decompose(start, end)?;
        let labels = self.with_defaults(labels);

        let mut store = self.store.write();
        if let Some(taken) = prefixes
            .iter()
            .find(|p| store.contains_key(&AddressKey::encode(p)))
        {
            return Err(Error::DuplicateKey(*taken));
        }
        self.check_capacity(&store, prefixes.len())?;

        let mut routes = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            store.insert(AddressKey::encode(&prefix), labels.clone())?;
            routes.push(Route::new(prefix, labels.clone()));
        }
        debug!("added range {}-{} as {} prefixes", start, end, routes.len());
        Ok(routes)
    }

    /// Snapshot of every route in address order.
    ///
    /// The copy is taken under one read lock; later mutations do not affect it.
    pub fn routes(&self) -> Vec<Route> {
        let store = self.store.read();
        store
            .iter()
            .map(|(key, labels)| Route::new(key.decode(), labels.clone()))
            .collect()
    }

    /// Iterate over a snapshot of the table (see [`Rib::routes`])
    pub fn iter(&self) -> std::vec::IntoIter<Route> {
        self.routes().into_iter()
    }
}

impl Default for Rib {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Rib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rib")
            .field("routes", &self.len())
            .field("config", &self.config)
            .finish()
    }
}
