//! Interval module for address-space arithmetic
//!
//! This module provides the coalesced interval set used by the free-space
//! allocator, and the range decomposer that turns an arbitrary start-end
//! address range into aligned CIDR blocks.

pub mod range;
pub mod set;

// Re-export key types and functions
pub use range::decompose;
pub use set::{AddrRange, IntervalSet};
