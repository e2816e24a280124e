//! Masked CIDR prefixes
//!
//! A [`Prefix`] is always held in canonical form: host bits beyond the prefix
//! length are zero, and IPv4-mapped IPv6 prefixes are folded back into IPv4.
//! Everything downstream (keys, interval sets, the table) relies on that.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use ipnet::{IpNet, Ipv4Net};

use crate::Error;

/// Address family of a prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    /// 32-bit addresses
    Ipv4,
    /// 128-bit addresses
    Ipv6,
}

impl Family {
    /// Number of address bits in this family
    pub fn max_len(self) -> u8 {
        match self {
            Family::Ipv4 => 32,
            Family::Ipv6 => 128,
        }
    }

    /// Family of an address, after unmapping IPv4-mapped IPv6
    pub fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(v6) if v6.to_ipv4_mapped().is_some() => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }

    /// Build an address of this family from its numeric value
    pub(crate) fn addr(self, bits: u128) -> IpAddr {
        match self {
            Family::Ipv4 => IpAddr::V4(Ipv4Addr::from(bits as u32)),
            Family::Ipv6 => IpAddr::V6(Ipv6Addr::from(bits)),
        }
    }
}

/// Mask with the lowest `host_bits` bits set
pub(crate) fn host_mask(host_bits: u32) -> u128 {
    if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

/// Numeric value of an address in its own family's width
pub(crate) fn addr_bits(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => u32::from(v4) as u128,
            None => u128::from(v6),
        },
    }
}

/// A CIDR block in masked form
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(IpNet);

impl Prefix {
    /// Normalize and mask a network
    pub fn new(net: IpNet) -> Self {
        let net = match net {
            IpNet::V6(v6) if v6.prefix_len() >= 96 => match v6.network().to_ipv4_mapped() {
                Some(v4) => Ipv4Net::new(v4, v6.prefix_len() - 96)
                    .map(IpNet::V4)
                    .unwrap_or(net),
                None => net,
            },
            _ => net,
        };
        Prefix(net.trunc())
    }

    /// Build a prefix from an address and a length, masking host bits
    pub fn from_addr(addr: IpAddr, len: u8) -> Result<Self, Error> {
        IpNet::new(addr, len)
            .map(Self::new)
            .map_err(|_| Error::InvalidPrefix(format!("{}/{}", addr, len)))
    }

    /// Build a prefix from a numeric address of the given family.
    ///
    /// `len` must not exceed the family's width.
    pub(crate) fn from_bits(family: Family, bits: u128, len: u8) -> Self {
        let host = (family.max_len() - len) as u32;
        let masked = bits & !host_mask(host);
        let net = match family.addr(masked) {
            IpAddr::V4(v4) => Ipv4Net::new(v4, len).map(IpNet::V4),
            IpAddr::V6(v6) => ipnet::Ipv6Net::new(v6, len).map(IpNet::V6),
        };
        // len is always within the family width at the call sites
        Prefix(net.unwrap_or_else(|_| IpNet::from(family.addr(masked))))
    }

    /// The underlying network
    pub fn net(&self) -> IpNet {
        self.0
    }

    /// Network address
    pub fn addr(&self) -> IpAddr {
        self.0.network()
    }

    /// Prefix length
    pub fn len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Address family
    pub fn family(&self) -> Family {
        match self.0 {
            IpNet::V4(_) => Family::Ipv4,
            IpNet::V6(_) => Family::Ipv6,
        }
    }

    /// Whether this is an IPv4 prefix
    pub fn is_ipv4(&self) -> bool {
        self.family() == Family::Ipv4
    }

    /// Width of the address family
    pub fn max_len(&self) -> u8 {
        self.family().max_len()
    }

    /// Number of host bits
    pub fn host_bits(&self) -> u32 {
        (self.max_len() - self.len()) as u32
    }

    /// Lowest address as a number in the family's width
    pub fn first(&self) -> u128 {
        addr_bits(self.addr())
    }

    /// Highest address as a number in the family's width
    pub fn last(&self) -> u128 {
        self.first() | host_mask(self.host_bits())
    }

    /// Re-mask this prefix's network address to another length
    pub fn with_len(&self, len: u8) -> Option<Prefix> {
        if len > self.max_len() {
            return None;
        }
        Some(Prefix::from_bits(self.family(), self.first(), len))
    }

    /// Whether `other` lies entirely within this prefix
    pub fn contains(&self, other: &Prefix) -> bool {
        self.family() == other.family()
            && self.len() <= other.len()
            && self.first() <= other.first()
            && other.last() <= self.last()
    }

    /// Whether the two prefixes share at least one address
    pub fn overlaps(&self, other: &Prefix) -> bool {
        self.family() == other.family()
            && self.first() <= other.last()
            && other.first() <= self.last()
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        Prefix::new(net)
    }
}

impl From<IpAddr> for Prefix {
    fn from(addr: IpAddr) -> Self {
        Prefix::new(IpNet::from(addr))
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(net) = s.parse::<IpNet>() {
            return Ok(Prefix::new(net));
        }
        // A bare address is a host route
        s.parse::<IpAddr>()
            .map(Prefix::from)
            .map_err(|_| Error::InvalidPrefix(s.to_string()))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({})", self.0)
    }
}

#[cfg(feature = "serialization")]
impl serde::Serialize for Prefix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_masks_host_bits() {
        let prefix = p("192.168.0.255/24");
        assert_eq!(prefix.to_string(), "192.168.0.0/24");
        assert_eq!(prefix, p("192.168.0.0/24"));
        assert_eq!(prefix.len(), 24);
        assert!(prefix.is_ipv4());
    }

    #[test]
    fn test_bare_address_is_host_route() {
        assert_eq!(p("10.1.2.3"), p("10.1.2.3/32"));
        assert_eq!(p("2001:db8::1"), p("2001:db8::1/128"));
    }

    #[test]
    fn test_invalid_prefix() {
        assert!(matches!("10.0.0.0/33".parse::<Prefix>(), Err(Error::InvalidPrefix(_))));
        assert!(matches!("not-a-prefix".parse::<Prefix>(), Err(Error::InvalidPrefix(_))));
    }

    #[test]
    fn test_ipv4_mapped_is_unmapped() {
        let mapped = p("::ffff:10.0.0.0/104");
        assert_eq!(mapped, p("10.0.0.0/8"));
        assert!(mapped.is_ipv4());

        // Shorter than /96 stays IPv6
        let wide = p("::ffff:0:0/95");
        assert_eq!(wide.family(), Family::Ipv6);
    }

    #[test]
    fn test_first_last() {
        let prefix = p("10.0.0.0/16");
        assert_eq!(prefix.first(), 0x0a00_0000);
        assert_eq!(prefix.last(), 0x0a00_ffff);

        let all = p("::/0");
        assert_eq!(all.first(), 0);
        assert_eq!(all.last(), u128::MAX);
    }

    #[test]
    fn test_contains_and_overlaps() {
        let parent = p("10.0.0.0/16");
        let child = p("10.0.1.0/24");
        let other = p("10.1.0.0/16");

        assert!(parent.contains(&child));
        assert!(!child.contains(&parent));
        assert!(parent.overlaps(&child));
        assert!(child.overlaps(&parent));
        assert!(!parent.overlaps(&other));

        // Families never overlap
        assert!(!p("::/0").overlaps(&p("0.0.0.0/0")));
    }

    #[test]
    fn test_with_len() {
        let prefix = p("10.0.128.0/17");
        assert_eq!(prefix.with_len(19), Some(p("10.0.128.0/19")));
        assert_eq!(prefix.with_len(8), Some(p("10.0.0.0/8")));
        assert_eq!(prefix.with_len(33), None);
    }

    #[cfg(feature = "serialization")]
    #[test]
    fn test_serialize_as_string() {
        assert_eq!(serde_json::to_string(&p("10.1.2.3/8")).unwrap(), r#""10.0.0.0/8""#);
        assert_eq!(
            serde_json::to_value([p("2001:db8::1/32"), p("::ffff:192.168.0.1/120")]).unwrap(),
            serde_json::json!(["2001:db8::/32", "192.168.0.0/24"])
        );
    }
}
