//! Encoding module for prefix keys
//!
//! This module maps prefixes of both address families onto one ordered
//! 128-bit key space, so a single index serves IPv4 and IPv6.

pub mod key;

// Re-export key types and functions for convenience
pub use key::{AddressKey, IPV4_EMBED_BASE, IPV4_EMBED_LEN, KEY_BITS};
