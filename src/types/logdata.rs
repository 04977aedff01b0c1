//! Output records for the persistence collaborator
//!
//! One JSON object per qualified event: the common envelope plus a
//! protocol-specific nested object. Shapes here are the wire contract
//! with downstream log consumers, so field names are stable.

use std::collections::HashMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::event::{Envelope, Event, EventKind};
use super::layers::Icmpv4Header;
use crate::config::EventsConfig;

/// Serde helper: payload bytes carried as text in replay records.
pub mod bytes_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(de)?.into_bytes())
    }
}

/// Captured payload, truncated to the configured maximum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payload {
    pub content: String,
    pub base64: String,
    pub truncated: bool,
}

impl Payload {
    pub fn new(data: &[u8], max_len: usize) -> Self {
        let truncated = data.len() > max_len;
        let data = if truncated { &data[..max_len] } else { data };
        Self {
            content: String::from_utf8_lossy(data).into_owned(),
            base64: base64::engine::general_purpose::STANDARD.encode(data),
            truncated,
        }
    }
}

/// Envelope fields common to every output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseLogData {
    pub timestamp: String,
    pub session: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub src_ip: String,
    pub dst_port: u16,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub references: HashMap<String, Vec<String>>,
    pub statements: Vec<String>,
}

impl BaseLogData {
    fn new(envelope: &Envelope, kind: EventKind) -> Self {
        Self {
            timestamp: envelope.timestamp.to_rfc3339(),
            session: envelope.session.clone(),
            kind,
            src_ip: envelope.source_ip.to_string(),
            dst_port: envelope.dest_port,
            // BTreeSet ordering makes the output deterministic and
            // deduplicated.
            tags: envelope.tags.iter().cloned().collect(),
            metadata: envelope.metadata.clone(),
            references: envelope.references.clone(),
            statements: envelope.statements.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpLogData {
    pub window: u16,
    pub seq: u32,
    pub ack: u32,
    pub data_offset: u8,
    pub flags: String,
    pub urgent: u16,
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpLogData {
    pub length: u16,
    pub checksum: u16,
    pub payload: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLogData {
    pub verb: String,
    pub proto: String,
    pub uri: String,
    pub headers: HashMap<String, String>,
    pub body: Payload,
    pub is_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpEventLog {
    #[serde(flatten)]
    pub base: BaseLogData,
    pub tcp: TcpLogData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpEventLog {
    #[serde(flatten)]
    pub base: BaseLogData,
    pub udp: UdpLogData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Icmpv4EventLog {
    #[serde(flatten)]
    pub base: BaseLogData,
    pub icmpv4: Icmpv4Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEventLog {
    #[serde(flatten)]
    pub base: BaseLogData,
    pub http: HttpLogData,
}

/// One output record per qualified event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventLog {
    Icmpv4(Icmpv4EventLog),
    Tcp(TcpEventLog),
    Udp(UdpEventLog),
    Http(HttpEventLog),
}

impl Event {
    /// Build the output record, truncating payloads to the configured
    /// capture sizes.
    pub fn to_log(&self, limits: &EventsConfig) -> EventLog {
        match self {
            Event::Icmpv4(ev) => EventLog::Icmpv4(Icmpv4EventLog {
                base: BaseLogData::new(&ev.envelope, EventKind::Icmpv4),
                icmpv4: ev.icmpv4.clone(),
            }),
            Event::Tcp(ev) => EventLog::Tcp(TcpEventLog {
                base: BaseLogData::new(&ev.envelope, EventKind::Tcp),
                tcp: TcpLogData {
                    window: ev.tcp.window,
                    seq: ev.tcp.seq,
                    ack: ev.tcp.ack,
                    data_offset: ev.tcp.data_offset,
                    flags: ev.tcp.flags_string(),
                    urgent: ev.tcp.urgent,
                    payload: Payload::new(&ev.tcp.payload, limits.max_tcp_data_size),
                },
            }),
            Event::Udp(ev) => EventLog::Udp(UdpEventLog {
                base: BaseLogData::new(&ev.envelope, EventKind::Udp),
                udp: UdpLogData {
                    length: ev.udp.length,
                    checksum: ev.udp.checksum,
                    payload: Payload::new(&ev.udp.payload, limits.max_udp_data_size),
                },
            }),
            Event::Http(ev) => EventLog::Http(HttpEventLog {
                base: BaseLogData::new(&ev.envelope, EventKind::Http),
                http: HttpLogData {
                    verb: ev.http.verb.clone(),
                    proto: ev.http.proto.clone(),
                    uri: ev.http.uri.clone(),
                    headers: ev.http.headers.clone(),
                    body: Payload::new(ev.http.body.as_bytes(), limits.max_http_body_size),
                    is_tls: ev.http.is_tls,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_truncates_and_flags() {
        let payload = Payload::new(b"GET / HTTP/1.1", 5);
        assert!(payload.truncated);
        assert_eq!(payload.content, "GET /");
        assert_eq!(payload.base64, "R0VUIC8=");
    }

    #[test]
    fn payload_short_data_untouched() {
        let payload = Payload::new(b"ping", 1024);
        assert!(!payload.truncated);
        assert_eq!(payload.content, "ping");
    }
}
