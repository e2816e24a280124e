//! ipam-rib: an in-memory IP address management table
//!
//! This crate provides a registry of IPv4/IPv6 CIDR blocks, each carrying a
//! set of key/value labels, with hierarchical queries (parents and children of
//! a block), label selectors, and free-space allocation inside a block.
//!
//! ```
//! use ipam_rib::{LabelSet, Rib, Route};
//!
//! let rib = Rib::new();
//! rib.add(Route::new("10.0.0.0/16".parse()?, LabelSet::from([("type", "aggregate")])))?;
//! rib.add(Route::new("10.0.0.0/17".parse()?, LabelSet::new()))?;
//!
//! let free = rib.find_free_prefix(&"10.0.0.0/16".parse()?, 17)?;
//! assert_eq!(free.to_string(), "10.0.128.0/17");
//! # Ok::<(), ipam_rib::Error>(())
//! ```

#![warn(missing_docs)]

/// Prefix keys shared by both address families
pub mod encoding;

/// Address ranges, interval sets and range decomposition
pub mod interval;

/// Label sets and selectors
pub mod labels;

/// Masked CIDR prefixes
pub mod prefix;

/// The IPAM table
pub mod rib;

/// Ordered prefix index
pub mod store;


// Re-exports
pub use config::RibConfig;
pub use encoding::AddressKey;
pub use error::{Error, Result};
pub use interval::{IntervalSet, decompose};
pub use labels::{LabelSet, Requirement, Selector};
pub use prefix::{Family, Prefix};
pub use rib::{Rib, Route};
pub use store::PrefixStore;

/// Error types for table operations
pub mod error {
    use std::net::IpAddr;

    use thiserror::Error;

    use crate::Prefix;

    /// Result type for table operations
    pub type Result<T> = std::result::Result<T, Error>;

    /// Errors that can occur in table operations
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum Error {
        /// The masked prefix is already registered
        #[error("prefix {0} already exists")]
        DuplicateKey(Prefix),

        /// The prefix is not registered
        #[error("prefix {0} not found")]
        NotFound(Prefix),

        /// End before start, or mixed address families
        #[error("invalid range {start}-{end}")]
        InvalidRange {
            /// First address of the range
            start: IpAddr,
            /// Last address of the range
            end: IpAddr,
        },

        /// Malformed selector text
        #[error("invalid selector syntax in '{clause}': {reason}")]
        InvalidSelectorSyntax {
            /// The offending clause
            clause: String,
            /// What was wrong with it
            reason: String,
        },

        /// No free block of the requested size inside the container
        #[error("no free /{requested} in {block}")]
        NoFreeSpace {
            /// Container block
            block: Prefix,
            /// Requested prefix length
            requested: u8,
        },

        /// Requested length is shorter than the container or longer than the family allows
        #[error("cannot allocate a /{requested} inside {block}")]
        InvalidRequest {
            /// Container block
            block: Prefix,
            /// Requested prefix length
            requested: u8,
        },

        /// Textual prefix could not be parsed
        #[error("invalid prefix '{0}'")]
        InvalidPrefix(String),

        /// The table reached its configured size limit
        #[error("table capacity of {0} routes exceeded")]
        CapacityExceeded(usize),
    }
}

/// Configuration options for the table
pub mod config {
    use crate::LabelSet;

    /// Configuration for a [`Rib`](crate::Rib) instance
    #[derive(Debug, Clone, Default)]
    pub struct RibConfig {
        /// Maximum number of routes; `None` means unbounded
        pub max_routes: Option<usize>,
        /// Labels merged under every newly registered route.
        /// The route's own labels win on conflict.
        pub default_labels: LabelSet,
    }

    impl RibConfig {
        /// Set the route limit
        pub fn with_max_routes(mut self, max_routes: usize) -> Self {
            self.max_routes = Some(max_routes);
            self
        }

        /// Set the default labels
        pub fn with_default_labels(mut self, labels: LabelSet) -> Self {
            self.default_labels = labels;
            self
        }
    }
}
