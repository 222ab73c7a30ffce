//! IPv4 CIDR range matching for the IP filter.
//!
//! Ranges are written as `a.b.c.d/n`; a bare address is a single host
//! (`/32`). IPv6 ranges are rejected at configuration time.

use std::fmt;
use std::net::Ipv4Addr;

/// Parsed IPv4 network range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrRange {
    /// Network address as a big-endian integer
    subnet: u32,
    /// Mask derived from the prefix length
    netmask: u32,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "127.0.0.1").
    ///
    /// Returns `None` if the format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let (addr, prefix_len) = match cidr.trim().split_once('/') {
            Some((addr, prefix)) => (addr, prefix.trim().parse::<u8>().ok()?),
            None => (cidr.trim(), 32),
        };

        if prefix_len > 32 {
            return None;
        }

        let subnet: Ipv4Addr = addr.trim().parse().ok()?;
        Some(Self {
            subnet: u32::from(subnet),
            netmask: netmask(prefix_len),
        })
    }

    /// Check if an address falls inside this range.
    #[inline]
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (u32::from(ip) & self.netmask) == (self.subnet & self.netmask)
    }

    pub fn prefix_len(&self) -> u32 {
        self.netmask.count_ones()
    }
}

impl fmt::Display for CidrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.subnet), self.prefix_len())
    }
}

/// `!((1 << (32 - prefix_len)) - 1)`, with `/0` selecting every address.
fn netmask(prefix_len: u8) -> u32 {
    u32::MAX
        .checked_shl(32 - u32::from(prefix_len))
        .unwrap_or(0)
}

/// Check whether `ip` is inside any of `ranges`.
///
/// Stops at the first matching range. An empty list contains nothing.
pub fn contains(ip: Ipv4Addr, ranges: &[CidrRange]) -> bool {
    ranges.iter().any(|range| range.contains(ip))
}
