//! Protocol-tagged events
//!
//! `Event` is a closed sum type over the four protocol kinds. Dispatch
//! on the variant happens in exactly one place (the qualification entry
//! points); everything else goes through the envelope accessors.

use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::http::HttpRequest;
use super::layers::{Icmpv4Header, TcpHeader, UdpHeader};
use crate::sessions::{flow_key, SessionRegistry};

/// Protocol kind, set at construction and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Icmpv4,
    Tcp,
    Udp,
    Http,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Icmpv4 => write!(f, "icmpv4"),
            EventKind::Tcp => write!(f, "tcp"),
            EventKind::Udp => write!(f, "udp"),
            EventKind::Http => write!(f, "http"),
        }
    }
}

/// Common envelope shared by every event kind.
///
/// Enrichment fields only ever grow during qualification: tags are a
/// set union, metadata is last-writer-wins, references and statements
/// are appended.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub timestamp: DateTime<Utc>,
    pub source_ip: IpAddr,
    /// Destination port; 0 for ICMP.
    pub dest_port: u16,
    /// Session identifier resolved at construction; `"n/a"` for ICMP.
    pub session: String,
    pub tags: BTreeSet<String>,
    pub metadata: HashMap<String, String>,
    pub references: HashMap<String, Vec<String>>,
    pub statements: Vec<String>,
}

impl Envelope {
    fn new(timestamp: DateTime<Utc>, source_ip: IpAddr, dest_port: u16, session: String) -> Self {
        Self {
            timestamp,
            source_ip,
            dest_port,
            session,
            tags: BTreeSet::new(),
            metadata: HashMap::new(),
            references: HashMap::new(),
            statements: Vec::new(),
        }
    }

    /// Union rule tags into the event's tag set.
    pub fn add_tags(&mut self, tags: &[String]) {
        for tag in tags {
            self.tags.insert(tag.clone());
        }
    }

    /// Merge rule metadata; colliding keys take the newest value.
    pub fn merge_metadata(&mut self, metadata: &HashMap<String, String>) {
        for (key, value) in metadata {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    /// Append rule references under their keys, never overwriting.
    pub fn append_references(&mut self, references: &HashMap<String, Vec<String>>) {
        for (key, values) in references {
            self.references
                .entry(key.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Append rule statements; duplicates are allowed.
    pub fn append_statements(&mut self, statements: &[String]) {
        self.statements.extend(statements.iter().cloned());
    }
}

/// ICMPv4 observation. Stateless protocol, no session.
#[derive(Debug, Clone)]
pub struct Icmpv4Event {
    pub envelope: Envelope,
    pub icmpv4: Icmpv4Header,
}

impl Icmpv4Event {
    pub fn new(timestamp: DateTime<Utc>, source_ip: IpAddr, icmpv4: Icmpv4Header) -> Self {
        Self {
            envelope: Envelope::new(timestamp, source_ip, 0, "n/a".to_string()),
            icmpv4,
        }
    }
}

/// Single TCP packet observation.
#[derive(Debug, Clone)]
pub struct TcpEvent {
    pub envelope: Envelope,
    pub tcp: TcpHeader,
}

impl TcpEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        source_ip: IpAddr,
        source_port: u16,
        dest_ip: IpAddr,
        dest_port: u16,
        tcp: TcpHeader,
        sessions: &SessionRegistry,
    ) -> Self {
        let key = flow_key("tcp", source_ip, source_port, dest_ip, dest_port);
        let session = sessions.get_uid(&key);
        Self {
            envelope: Envelope::new(timestamp, source_ip, dest_port, session),
            tcp,
        }
    }
}

/// Single UDP datagram observation.
#[derive(Debug, Clone)]
pub struct UdpEvent {
    pub envelope: Envelope,
    pub udp: UdpHeader,
}

impl UdpEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        source_ip: IpAddr,
        source_port: u16,
        dest_ip: IpAddr,
        dest_port: u16,
        udp: UdpHeader,
        sessions: &SessionRegistry,
    ) -> Self {
        let key = flow_key("udp", source_ip, source_port, dest_ip, dest_port);
        let session = sessions.get_uid(&key);
        Self {
            envelope: Envelope::new(timestamp, source_ip, dest_port, session),
            udp,
        }
    }
}

/// One reassembled HTTP request, produced by the capture collaborator.
#[derive(Debug, Clone)]
pub struct HttpEvent {
    pub envelope: Envelope,
    pub http: HttpRequest,
}

impl HttpEvent {
    pub fn new(
        timestamp: DateTime<Utc>,
        source_ip: IpAddr,
        source_port: u16,
        dest_ip: IpAddr,
        dest_port: u16,
        http: HttpRequest,
        sessions: &SessionRegistry,
    ) -> Self {
        let key = flow_key("tcp", source_ip, source_port, dest_ip, dest_port);
        let session = sessions.get_uid(&key);
        Self {
            envelope: Envelope::new(timestamp, source_ip, dest_port, session),
            http,
        }
    }
}

/// Closed variant over the protocol kinds the sensor decodes.
#[derive(Debug, Clone)]
pub enum Event {
    Icmpv4(Icmpv4Event),
    Tcp(TcpEvent),
    Udp(UdpEvent),
    Http(HttpEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Icmpv4(_) => EventKind::Icmpv4,
            Event::Tcp(_) => EventKind::Tcp,
            Event::Udp(_) => EventKind::Udp,
            Event::Http(_) => EventKind::Http,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        match self {
            Event::Icmpv4(ev) => &ev.envelope,
            Event::Tcp(ev) => &ev.envelope,
            Event::Udp(ev) => &ev.envelope,
            Event::Http(ev) => &ev.envelope,
        }
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        match self {
            Event::Icmpv4(ev) => &mut ev.envelope,
            Event::Tcp(ev) => &mut ev.envelope,
            Event::Udp(ev) => &mut ev.envelope,
            Event::Http(ev) => &mut ev.envelope,
        }
    }

    pub fn source_ip(&self) -> IpAddr {
        self.envelope().source_ip
    }

    pub fn dest_port(&self) -> u16 {
        self.envelope().dest_port
    }

    pub fn session(&self) -> &str {
        &self.envelope().session
    }
}
