//! Range decomposition
//!
//! Converts an arbitrary inclusive address range into the minimal set of
//! CIDR-aligned prefixes that exactly cover it.

use std::net::IpAddr;

use crate::Error;
use crate::prefix::{Family, Prefix, addr_bits, host_mask};

/// Minimal CIDR cover of `[start, end]`.
///
/// Fails with [`Error::InvalidRange`] when `end < start` or the two addresses
/// belong to different families.
pub fn decompose(start: IpAddr, end: IpAddr) -> Result<Vec<Prefix>, Error> {
    let family = Family::of(start);
    let (first, last) = (addr_bits(start), addr_bits(end));
    if family != Family::of(end) || last < first {
        return Err(Error::InvalidRange { start, end });
    }
    let mut out = Vec::new();
    cover(family, first, last, &mut out);
    Ok(out)
}

/// Greedy cover of a numeric range: at each step take the largest block that
/// is aligned at the current address and does not run past `last`.
pub(crate) fn cover(family: Family, first: u128, last: u128, out: &mut Vec<Prefix>) {
    let width = family.max_len() as u32;
    let mut cur = first;

    loop {
        let align = if cur == 0 {
            width
        } else {
            cur.trailing_zeros().min(width)
        };
        let span = last - cur;
        let fit = if span == u128::MAX {
            128
        } else {
            127 - (span + 1).leading_zeros()
        };
        let host = align.min(fit);

        out.push(Prefix::from_bits(family, cur, (width - host) as u8));

        let block_end = cur + host_mask(host);
        if block_end >= last {
            break;
        }
        cur = block_end + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn strings(prefixes: &[Prefix]) -> Vec<String> {
        prefixes.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_decompose_minimal_cover() {
        let prefixes = decompose(ip("192.168.0.0"), ip("192.168.0.132")).unwrap();
        assert_eq!(
            strings(&prefixes),
            vec!["192.168.0.0/25", "192.168.0.128/30", "192.168.0.132/32"]
        );
    }

    #[test]
    fn test_decompose_unaligned_start() {
        let prefixes = decompose(ip("10.0.0.1"), ip("10.0.0.6")).unwrap();
        assert_eq!(
            strings(&prefixes),
            vec!["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/31", "10.0.0.6/32"]
        );
    }

    #[test]
    fn test_decompose_single_address() {
        let prefixes = decompose(ip("10.0.0.7"), ip("10.0.0.7")).unwrap();
        assert_eq!(strings(&prefixes), vec!["10.0.0.7/32"]);
    }

    #[test]
    fn test_decompose_whole_spaces() {
        let v4 = decompose(ip("0.0.0.0"), ip("255.255.255.255")).unwrap();
        assert_eq!(strings(&v4), vec!["0.0.0.0/0"]);

        let v6 = decompose(ip("::"), ip("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff")).unwrap();
        assert_eq!(strings(&v6), vec!["::/0"]);
    }

    #[test]
    fn test_decompose_ipv6() {
        let prefixes = decompose(ip("2001:db8::"), ip("2001:db8::2")).unwrap();
        assert_eq!(strings(&prefixes), vec!["2001:db8::/127", "2001:db8::2/128"]);
    }

    #[test]
    fn test_decompose_top_of_space() {
        let prefixes = decompose(ip("255.255.255.254"), ip("255.255.255.255")).unwrap();
        assert_eq!(strings(&prefixes), vec!["255.255.255.254/31"]);
    }

    #[test]
    fn test_decompose_invalid() {
        assert!(matches!(
            decompose(ip("10.0.0.2"), ip("10.0.0.1")),
            Err(Error::InvalidRange { .. })
        ));
        assert!(matches!(
            decompose(ip("10.0.0.1"), ip("2001:db8::1")),
            Err(Error::InvalidRange { .. })
        ));
    }
}
