//! Event model for the qualification pipeline
//!
//! One decoded observation per packet/request, tagged with a protocol
//! kind and carrying a common envelope (identity, timing, enrichment)
//! plus a protocol-specific payload view. Pure data; the matcher only
//! reads these, the qualifier only grows the enrichment fields.

pub mod event;
pub mod http;
pub mod layers;
pub mod logdata;

pub use event::{Envelope, Event, EventKind, HttpEvent, Icmpv4Event, TcpEvent, UdpEvent};
pub use http::HttpRequest;
pub use layers::{Icmpv4Header, TcpHeader, UdpHeader};
pub use logdata::{EventLog, Payload};

use thiserror::Error;

/// Errors raised while turning a decoded record into an event.
///
/// These are per-event failures: the offending record is dropped and
/// the pipeline keeps running. Nothing downstream of event
/// construction returns an error.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("malformed event record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("event record is missing its {0} payload")]
    MissingLayer(EventKind),
}
