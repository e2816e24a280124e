//! Fixed-width prefix keys
//!
//! An [`AddressKey`] is a 128-bit big-endian address plus a length. IPv4
//! prefixes are embedded under `::ffff:0:0/96` with their length shifted by
//! 96, so a v4 key is never confused with a v6 key once prefixes are
//! normalized (see [`Prefix::new`]).

use std::fmt;

use crate::prefix::{Family, Prefix, host_mask};

/// Width of every key in bits
pub const KEY_BITS: u8 = 128;

/// Base of the IPv4 embedding (`::ffff:0:0`)
pub const IPV4_EMBED_BASE: u128 = 0xffff << 32;

/// Length of the IPv4 embedding block
pub const IPV4_EMBED_LEN: u8 = 96;

/// A prefix encoded into the shared 128-bit key space.
///
/// Ordering is by address then length, i.e. numeric address order with the
/// shorter prefix first when two keys share a network address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressKey {
    bits: u128,
    len: u8,
}

impl AddressKey {
    /// Build a key from raw bits, masking everything past `len`
    pub fn new(bits: u128, len: u8) -> Self {
        let len = len.min(KEY_BITS);
        let host = (KEY_BITS - len) as u32;
        Self {
            bits: bits & !host_mask(host),
            len,
        }
    }

    /// Encode a prefix
    pub fn encode(prefix: &Prefix) -> Self {
        match prefix.family() {
            Family::Ipv4 => Self::new(
                IPV4_EMBED_BASE | prefix.first(),
                IPV4_EMBED_LEN + prefix.len(),
            ),
            Family::Ipv6 => Self::new(prefix.first(), prefix.len()),
        }
    }

    /// Decode back into a prefix
    pub fn decode(&self) -> Prefix {
        if self.is_ipv4() {
            Prefix::from_bits(Family::Ipv4, self.bits & 0xffff_ffff, self.len - IPV4_EMBED_LEN)
        } else {
            Prefix::from_bits(Family::Ipv6, self.bits, self.len)
        }
    }

    /// Raw key bits
    pub fn bits(&self) -> u128 {
        self.bits
    }

    /// Key length in the 128-bit space
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether the key encodes an IPv4 prefix
    pub fn is_ipv4(&self) -> bool {
        self.len >= IPV4_EMBED_LEN && self.bits >> 32 == 0xffff
    }

    /// Address family of the encoded prefix
    pub fn family(&self) -> Family {
        if self.is_ipv4() {
            Family::Ipv4
        } else {
            Family::Ipv6
        }
    }

    /// Shortest key length that still belongs to this key's family
    pub fn min_len(&self) -> u8 {
        if self.is_ipv4() { IPV4_EMBED_LEN } else { 0 }
    }

    /// Highest address covered by the key
    pub fn last(&self) -> u128 {
        self.bits | host_mask((KEY_BITS - self.len) as u32)
    }

    /// The same address masked to a shorter (or equal) length
    pub fn truncate(&self, len: u8) -> Self {
        Self::new(self.bits, len.min(self.len))
    }

    /// Whether `other` lies within this key's range
    pub fn contains(&self, other: &AddressKey) -> bool {
        self.len <= other.len && other.truncate(self.len).bits == self.bits
    }
}

impl From<&Prefix> for AddressKey {
    fn from(prefix: &Prefix) -> Self {
        AddressKey::encode(prefix)
    }
}

impl From<Prefix> for AddressKey {
    fn from(prefix: Prefix) -> Self {
        AddressKey::encode(&prefix)
    }
}

impl fmt::Debug for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddressKey({:032x}/{})", self.bits, self.len)
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}
