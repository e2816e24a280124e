//! Coalesced address sets
//!
//! An [`IntervalSet`] holds a union of address ranges of one family as a
//! sorted list of disjoint, non-adjacent inclusive ranges. The CIDR view
//! ([`IntervalSet::prefixes`]) is the minimal cover of each range, which is
//! exactly the buddy decomposition when blocks are subtracted from an aligned
//! superset.

use std::fmt;
use std::net::IpAddr;

use smallvec::SmallVec;

use crate::Error;
use crate::interval::range::cover;
use crate::prefix::{Family, Prefix, addr_bits};

/// Inline capacity before the range list spills to the heap
const INLINE_RANGES: usize = 8;

/// An inclusive numeric address range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AddrRange {
    /// First address (inclusive)
    pub start: u128,
    /// Last address (inclusive)
    pub end: u128,
}

impl AddrRange {
    /// Create a new range
    pub fn new(start: u128, end: u128) -> Self {
        Self { start, end }
    }

    /// Range covered by a prefix
    pub fn of(prefix: &Prefix) -> Self {
        Self::new(prefix.first(), prefix.last())
    }

    /// Whether the address lies in the range
    pub fn contains(&self, addr: u128) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Whether the two ranges share an address
    pub fn overlaps(&self, other: &AddrRange) -> bool {
        !(other.end < self.start || other.start > self.end)
    }
}

/// Canonical set of addresses of one family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSet {
    family: Family,
    ranges: SmallVec<[AddrRange; INLINE_RANGES]>,
}

impl IntervalSet {
    /// Empty set
    pub fn new(family: Family) -> Self {
        Self {
            family,
            ranges: SmallVec::new(),
        }
    }

    /// Set containing exactly one prefix
    pub fn from_prefix(prefix: &Prefix) -> Self {
        let mut set = Self::new(prefix.family());
        set.ranges.push(AddrRange::of(prefix));
        set
    }

    /// Set containing the inclusive range `[start, end]`
    pub fn from_range(start: IpAddr, end: IpAddr) -> Result<Self, Error> {
        let family = Family::of(start);
        let (first, last) = (addr_bits(start), addr_bits(end));
        if family != Family::of(end) || last < first {
            return Err(Error::InvalidRange { start, end });
        }
        let mut set = Self::new(family);
        set.ranges.push(AddrRange::new(first, last));
        Ok(set)
    }

    /// Address family of the set
    pub fn family(&self) -> Family {
        self.family
    }

    /// Whether the set has no addresses
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The underlying ranges, ascending
    pub fn ranges(&self) -> &[AddrRange] {
        &self.ranges
    }

    /// Ranges as address pairs, ascending
    pub fn addr_ranges(&self) -> impl Iterator<Item = (IpAddr, IpAddr)> + '_ {
        self.ranges
            .iter()
            .map(|r| (self.family.addr(r.start), self.family.addr(r.end)))
    }

    /// Add a prefix. Prefixes of another family lie outside the set's
    /// address space and are ignored.
    pub fn insert(&mut self, prefix: &Prefix) {
        if prefix.family() != self.family {
            return;
        }
        self.insert_range(AddrRange::of(prefix));
    }

    fn insert_range(&mut self, range: AddrRange) {
        let pos = self.ranges.partition_point(|r| r.start < range.start);
        self.ranges.insert(pos, range);

        let mut merged: SmallVec<[AddrRange; INLINE_RANGES]> =
            SmallVec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if last.end == u128::MAX || r.start <= last.end + 1 => {
                    last.end = last.end.max(r.end);
                }
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }

    /// Append a range above every range already in the set.
    ///
    /// The caller guarantees `range` starts past the current last range and
    /// is not adjacent to it.
    pub(crate) fn push_range(&mut self, range: AddrRange) {
        debug_assert!(
            self.ranges
                .last()
                .is_none_or(|last| last.end < u128::MAX && last.end + 1 < range.start)
        );
        self.ranges.push(range);
    }

    /// Remove a prefix. Prefixes of another family are ignored.
    pub fn subtract(&mut self, prefix: &Prefix) {
        if prefix.family() != self.family {
            return;
        }
        let cut = AddrRange::of(prefix);
        // Only ranges in [lo, hi) overlap the cut
        let lo = self.ranges.partition_point(|r| r.end < cut.start);
        let hi = self.ranges.partition_point(|r| r.start <= cut.end);
        if lo >= hi {
            return;
        }

        let (first, last) = (self.ranges[lo], self.ranges[hi - 1]);
        let mut pieces: SmallVec<[AddrRange; 2]> = SmallVec::new();
        if first.start < cut.start {
            pieces.push(AddrRange::new(first.start, cut.start - 1));
        }
        if last.end > cut.end {
            pieces.push(AddrRange::new(cut.end + 1, last.end));
        }
        self.ranges.drain(lo..hi);
        self.ranges.insert_many(lo, pieces);
    }

    /// Whether every address of `prefix` is in the set
    pub fn contains(&self, prefix: &Prefix) -> bool {
        if prefix.family() != self.family {
            return false;
        }
        let want = AddrRange::of(prefix);
        self.ranges
            .iter()
            .any(|r| r.start <= want.start && want.end <= r.end)
    }

    /// Canonical CIDR view: ascending, pairwise disjoint, and no two elements
    /// mergeable into a larger aligned block.
    pub fn prefixes(&self) -> Vec<Prefix> {
        let mut out = Vec::new();
        for r in &self.ranges {
            cover(self.family, r.start, r.end, &mut out);
        }
        out
    }

    /// Lowest-addressed free block of length `len`, without removing it.
    ///
    /// Scans the CIDR view in ascending order and truncates the first element
    /// that is at least as large as requested.
    pub fn first_fit(&self, len: u8) -> Option<Prefix> {
        if len > self.family.max_len() {
            return None;
        }
        self.prefixes()
            .into_iter()
            .find(|p| p.len() <= len)
            .and_then(|p| p.with_len(len))
    }

    /// Remove and return the lowest-addressed block of length `len`
    pub fn take_prefix(&mut self, len: u8) -> Option<Prefix> {
        let prefix = self.first_fit(len)?;
        self.subtract(&prefix);
        Some(prefix)
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, p) in self.prefixes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", p)?;
        }
        f.write_str("]")
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for IntervalSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.prefixes())
    }
}
