//! Source address ranges for rule allow/deny lists

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single address, a CIDR block, or an inclusive range.
///
/// Parsed from the textual forms `1.2.3.4`, `10.0.0.0/8` and
/// `192.0.2.10-192.0.2.20`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IpRange {
    Single(IpAddr),
    Cidr(IpAddr, u8),
    Range(IpAddr, IpAddr),
}

impl IpRange {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpRange::Single(single) => *single == ip,
            IpRange::Cidr(net, prefix) => match (net, ip) {
                (IpAddr::V4(net), IpAddr::V4(check)) => {
                    // /0 must not shift by the full bit width.
                    let mask = if *prefix == 0 {
                        0
                    } else if *prefix >= 32 {
                        u32::MAX
                    } else {
                        u32::MAX << (32 - prefix)
                    };
                    (u32::from(*net) & mask) == (u32::from(check) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(check)) => {
                    let net_bits: u128 = (*net).into();
                    let check_bits: u128 = check.into();
                    let mask = if *prefix == 0 {
                        0
                    } else if *prefix >= 128 {
                        u128::MAX
                    } else {
                        u128::MAX << (128 - prefix)
                    };
                    (net_bits & mask) == (check_bits & mask)
                }
                _ => false,
            },
            IpRange::Range(start, end) => ip >= *start && ip <= *end,
        }
    }
}

impl FromStr for IpRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((net, prefix)) = s.split_once('/') {
            let net: IpAddr = net
                .parse()
                .map_err(|_| format!("invalid network address: {net}"))?;
            let prefix: u8 = prefix
                .parse()
                .map_err(|_| format!("invalid prefix length: {prefix}"))?;
            let max = if net.is_ipv4() { 32 } else { 128 };
            if prefix > max {
                return Err(format!("prefix /{prefix} out of range for {net}"));
            }
            return Ok(IpRange::Cidr(net, prefix));
        }
        if let Some((start, end)) = s.split_once('-') {
            let start: IpAddr = start
                .trim()
                .parse()
                .map_err(|_| format!("invalid range start: {start}"))?;
            let end: IpAddr = end
                .trim()
                .parse()
                .map_err(|_| format!("invalid range end: {end}"))?;
            if start > end {
                return Err(format!("range start {start} after end {end}"));
            }
            return Ok(IpRange::Range(start, end));
        }
        let single: IpAddr = s.parse().map_err(|_| format!("invalid address: {s}"))?;
        Ok(IpRange::Single(single))
    }
}

impl TryFrom<String> for IpRange {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<IpRange> for String {
    fn from(range: IpRange) -> Self {
        match range {
            IpRange::Single(ip) => ip.to_string(),
            IpRange::Cidr(net, prefix) => format!("{net}/{prefix}"),
            IpRange::Range(start, end) => format!("{start}-{end}"),
        }
    }
}
