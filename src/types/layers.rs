//! Transport layer views carried by events
//!
//! Already decoded by the capture collaborator; the matcher reads these
//! fields, nothing in the pipeline mutates them.

use serde::{Deserialize, Serialize};

/// TCP flag bits as they appear in byte 13 of the header.
pub mod tcp_flags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;
    pub const ECE: u8 = 0x40;
    pub const CWR: u8 = 0x80;
}

/// Decoded TCP header plus payload bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TcpHeader {
    pub seq: u32,
    pub ack: u32,
    pub window: u16,
    pub data_offset: u8,
    pub urgent: u16,
    /// Raw flag byte; compared whole, never as a subset mask.
    pub flags: u8,
    #[serde(default, with = "super::logdata::bytes_as_string")]
    pub payload: Vec<u8>,
}

impl TcpHeader {
    /// Compact "SA"-style flag string for log output.
    pub fn flags_string(&self) -> String {
        let mut out = String::new();
        for (bit, ch) in [
            (tcp_flags::FIN, 'F'),
            (tcp_flags::SYN, 'S'),
            (tcp_flags::RST, 'R'),
            (tcp_flags::PSH, 'P'),
            (tcp_flags::ACK, 'A'),
            (tcp_flags::URG, 'U'),
            (tcp_flags::ECE, 'E'),
            (tcp_flags::CWR, 'C'),
        ] {
            if self.flags & bit != 0 {
                out.push(ch);
            }
        }
        out
    }
}

/// Decoded UDP header plus payload bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UdpHeader {
    pub length: u16,
    pub checksum: u16,
    #[serde(default, with = "super::logdata::bytes_as_string")]
    pub payload: Vec<u8>,
}

/// Decoded ICMPv4 header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Icmpv4Header {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub checksum: u16,
    pub id: u16,
    pub seq: u16,
}
