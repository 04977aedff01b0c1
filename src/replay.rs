//! NDJSON replay producer
//!
//! Reads pre-decoded observations (one JSON object per line, the same
//! shape the capture collaborator hands over) and feeds them into the
//! per-protocol channels. Stands in for live capture in tests and
//! offline runs; malformed lines are logged and dropped, they never
//! stop the pipeline.

use std::io::{BufRead, BufReader, Read};
use std::net::IpAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::engine::EventSenders;
use crate::sessions::SessionRegistry;
use crate::types::{
    Event, EventError, EventKind, HttpEvent, HttpRequest, Icmpv4Event, Icmpv4Header, TcpEvent,
    TcpHeader, UdpEvent, UdpHeader,
};

/// One replay line: flow identity plus exactly one protocol layer.
#[derive(Debug, Deserialize)]
pub struct ReplayRecord {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub src_ip: IpAddr,
    #[serde(default)]
    pub src_port: u16,
    pub dst_ip: IpAddr,
    #[serde(default)]
    pub dst_port: u16,
    #[serde(default)]
    pub icmpv4: Option<Icmpv4Header>,
    #[serde(default)]
    pub tcp: Option<TcpHeader>,
    #[serde(default)]
    pub udp: Option<UdpHeader>,
    #[serde(default)]
    pub http: Option<HttpRequest>,
}

impl ReplayRecord {
    /// Build the typed event, resolving the flow's session uid.
    pub fn into_event(self, sessions: &SessionRegistry) -> Result<Event, EventError> {
        let event = match self.kind {
            EventKind::Icmpv4 => {
                let header = self
                    .icmpv4
                    .ok_or(EventError::MissingLayer(EventKind::Icmpv4))?;
                Event::Icmpv4(Icmpv4Event::new(self.timestamp, self.src_ip, header))
            }
            EventKind::Tcp => {
                let header = self.tcp.ok_or(EventError::MissingLayer(EventKind::Tcp))?;
                Event::Tcp(TcpEvent::new(
                    self.timestamp,
                    self.src_ip,
                    self.src_port,
                    self.dst_ip,
                    self.dst_port,
                    header,
                    sessions,
                ))
            }
            EventKind::Udp => {
                let header = self.udp.ok_or(EventError::MissingLayer(EventKind::Udp))?;
                Event::Udp(UdpEvent::new(
                    self.timestamp,
                    self.src_ip,
                    self.src_port,
                    self.dst_ip,
                    self.dst_port,
                    header,
                    sessions,
                ))
            }
            EventKind::Http => {
                let request = self.http.ok_or(EventError::MissingLayer(EventKind::Http))?;
                Event::Http(HttpEvent::new(
                    self.timestamp,
                    self.src_ip,
                    self.src_port,
                    self.dst_ip,
                    self.dst_port,
                    request,
                    sessions,
                ))
            }
        };
        Ok(event)
    }
}

/// Parse one NDJSON line into an event.
pub fn parse_line(line: &str, sessions: &SessionRegistry) -> Result<Event, EventError> {
    let record: ReplayRecord = serde_json::from_str(line)?;
    record.into_event(sessions)
}

/// Spawn the producer thread. The senders are dropped when the reader
/// is exhausted, which lets the dispatcher drain and stop on its own.
pub fn spawn_producer<R: Read + Send + 'static>(
    reader: R,
    sessions: Arc<SessionRegistry>,
    senders: EventSenders,
) -> JoinHandle<usize> {
    std::thread::spawn(move || {
        let mut produced = 0usize;
        for (lineno, line) in BufReader::new(reader).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    error!(%err, "stopping replay on read error");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line, &sessions) {
                Ok(event) => {
                    debug!(kind = %event.kind(), session = event.session(), "replaying event");
                    if senders.route(event).is_err() {
                        error!("event channel closed, stopping replay");
                        break;
                    }
                    produced += 1;
                }
                Err(err) => {
                    error!(line = lineno + 1, %err, "dropping malformed replay record");
                }
            }
        }
        info!(produced, "replay finished");
        produced
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_line() {
        let sessions = SessionRegistry::new();
        let line = r#"{"type":"tcp","src_ip":"203.0.113.9","src_port":44211,"dst_ip":"198.51.100.2","dst_port":22,"tcp":{"seq":1,"ack":0,"window":1024,"data_offset":5,"urgent":0,"flags":2,"payload":""}}"#;
        let event = parse_line(line, &sessions).unwrap();
        assert_eq!(event.kind(), EventKind::Tcp);
        assert_eq!(event.dest_port(), 22);
        assert_ne!(event.session(), "n/a");
    }

    #[test]
    fn same_flow_reuses_session() {
        let sessions = SessionRegistry::new();
        let fwd = r#"{"type":"udp","src_ip":"203.0.113.9","src_port":5000,"dst_ip":"198.51.100.2","dst_port":53,"udp":{"length":8,"checksum":0,"payload":""}}"#;
        let rev = r#"{"type":"udp","src_ip":"198.51.100.2","src_port":53,"dst_ip":"203.0.113.9","dst_port":5000,"udp":{"length":8,"checksum":0,"payload":""}}"#;
        let a = parse_line(fwd, &sessions).unwrap();
        let b = parse_line(rev, &sessions).unwrap();
        assert_eq!(a.session(), b.session());
    }

    #[test]
    fn missing_layer_is_rejected() {
        let sessions = SessionRegistry::new();
        let line = r#"{"type":"tcp","src_ip":"203.0.113.9","dst_ip":"198.51.100.2","dst_port":22}"#;
        let err = parse_line(line, &sessions).unwrap_err();
        assert!(matches!(err, EventError::MissingLayer(EventKind::Tcp)));
    }

    #[test]
    fn garbage_line_is_rejected() {
        let sessions = SessionRegistry::new();
        assert!(parse_line("not json", &sessions).is_err());
    }
}
