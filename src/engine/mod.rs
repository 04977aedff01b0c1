//! Concurrent event qualification pipeline
//!
//! Producers push decoded events onto per-protocol inbound channels.
//! The dispatcher selects the next ready event from any of them, runs
//! it through the active rule set, merges the enrichment of every
//! matching rule into the event, and forwards it to the per-protocol
//! outbound sink.

pub mod dispatcher;
pub mod qualify;

pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use qualify::{qualify_http, qualify_icmpv4, qualify_tcp, qualify_udp};

use crossbeam_channel::{bounded, Receiver, SendError, Sender};

use crate::types::{Event, EventKind};

/// Sender side of a per-protocol channel bundle.
#[derive(Clone)]
pub struct EventSenders {
    pub icmpv4: Sender<Event>,
    pub tcp: Sender<Event>,
    pub udp: Sender<Event>,
    pub http: Sender<Event>,
}

impl EventSenders {
    /// Send an event on the channel for its kind.
    pub fn route(&self, ev: Event) -> Result<(), SendError<Event>> {
        match ev.kind() {
            EventKind::Icmpv4 => self.icmpv4.send(ev),
            EventKind::Tcp => self.tcp.send(ev),
            EventKind::Udp => self.udp.send(ev),
            EventKind::Http => self.http.send(ev),
        }
    }
}

/// Receiver side of a per-protocol channel bundle.
pub struct EventReceivers {
    pub icmpv4: Receiver<Event>,
    pub tcp: Receiver<Event>,
    pub udp: Receiver<Event>,
    pub http: Receiver<Event>,
}

/// Build the four bounded per-protocol channels.
pub fn event_channels(capacity: usize) -> (EventSenders, EventReceivers) {
    let (icmpv4_tx, icmpv4_rx) = bounded(capacity);
    let (tcp_tx, tcp_rx) = bounded(capacity);
    let (udp_tx, udp_rx) = bounded(capacity);
    let (http_tx, http_rx) = bounded(capacity);
    (
        EventSenders {
            icmpv4: icmpv4_tx,
            tcp: tcp_tx,
            udp: udp_tx,
            http: http_tx,
        },
        EventReceivers {
            icmpv4: icmpv4_rx,
            tcp: tcp_rx,
            udp: udp_rx,
            http: http_rx,
        },
    )
}
