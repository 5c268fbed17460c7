use std::net::Ipv4Addr;
use std::ops::RangeInclusive;

use crate::error::{InvalidAddress, ScanError};

/// Parse a dotted-quad IPv4 string into its numeric form.
///
/// Surrounding whitespace is ignored; anything else that is not a plain
/// IPv4 literal is rejected.
pub fn encode(addr: &str) -> Result<u32, InvalidAddress> {
    addr.trim()
        .parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| InvalidAddress(addr.to_string()))
}

/// Render a numeric IPv4 address as a dotted quad.
pub fn decode(n: u32) -> String {
    Ipv4Addr::from(n).to_string()
}

/// A validated, inclusive IPv4 range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    /// Validate a start/end pair the way a scan request is validated:
    /// both present, both parseable, start not after end.
    pub fn parse(start: &str, end: &str) -> Result<Self, ScanError> {
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(ScanError::MissingAddress);
        }
        let start = encode(start)?;
        let end = encode(end)?;
        Self::new(start, end)
    }

    pub fn new(start: u32, end: u32) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn end(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Number of addresses in the range. A full /0 does not fit in `u32`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.numeric().contains(&u32::from(ip))
    }

    fn numeric(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    /// Every address in the range, in ascending order, exactly once.
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        self.numeric().map(Ipv4Addr::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_normalizes() {
        for s in ["0.0.0.0", "10.0.0.5", "192.168.1.254", "255.255.255.255"] {
            assert_eq!(decode(encode(s).unwrap()), s);
        }
        assert_eq!(decode(encode(" 172.16.0.1 ").unwrap()), "172.16.0.1");
    }

    #[test]
    fn encode_is_big_endian_numeric() {
        assert_eq!(encode("0.0.1.0").unwrap(), 256);
        assert_eq!(encode("192.168.1.1").unwrap(), 0xC0A8_0101);
    }

    #[test]
    fn encode_rejects_non_ipv4() {
        for s in ["", "10.0.0", "10.0.0.256", "::1", "host.local", "1.2.3.4.5"] {
            assert!(encode(s).is_err(), "{s} should be rejected");
        }
    }

    #[test]
    fn range_rejects_reversed_bounds() {
        let err = AddressRange::parse("10.0.0.5", "10.0.0.2").unwrap_err();
        assert_eq!(err, ScanError::InvalidRange);
        assert_eq!(err.to_string(), "Start IP cannot be greater than End IP");
    }

    #[test]
    fn range_rejects_missing_and_garbage() {
        assert_eq!(
            AddressRange::parse("", "10.0.0.1").unwrap_err(),
            ScanError::MissingAddress
        );
        assert!(matches!(
            AddressRange::parse("10.0.0.1", "nope").unwrap_err(),
            ScanError::InvalidAddress(_)
        ));
    }

    #[test]
    fn range_iterates_inclusive_across_octet_boundary() {
        let r = AddressRange::parse("10.0.0.254", "10.0.1.1").unwrap();
        let ips: Vec<String> = r.iter().map(|ip| ip.to_string()).collect();
        assert_eq!(ips, vec!["10.0.0.254", "10.0.0.255", "10.0.1.0", "10.0.1.1"]);
        assert_eq!(r.len(), 4);
        assert!(r.contains(Ipv4Addr::new(10, 0, 0, 255)));
        assert!(!r.contains(Ipv4Addr::new(10, 0, 1, 2)));
    }

    #[test]
    fn range_at_top_of_address_space_terminates() {
        let r = AddressRange::parse("255.255.255.254", "255.255.255.255").unwrap();
        assert_eq!(r.iter().count(), 2);
    }
}
