//! Event dispatcher
//!
//! A single thread owns the four inbound receivers and blocks in a
//! multi-way select until an event or the shutdown signal arrives.
//! There is no default branch, so the thread consumes no CPU while
//! idle. Completion is signalled by dropping the `stopped` sender,
//! which disconnects the handle's receiver.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{never, unbounded, Receiver};
use tracing::{debug, info, trace};

use super::{qualify, EventReceivers, EventSenders};
use crate::rules::ActiveRules;
use crate::types::{Event, EventKind};

/// Handle on a running dispatcher.
pub struct DispatcherHandle {
    join: JoinHandle<()>,
    stopped_rx: Receiver<()>,
}

impl DispatcherHandle {
    /// Block until the dispatcher has fully stopped.
    pub fn wait(self) {
        // Disconnection of the stopped channel is the completion
        // signal; join reaps the thread afterwards.
        let _ = self.stopped_rx.recv();
        let _ = self.join.join();
    }

    /// Receiver that disconnects once the dispatcher has stopped, for
    /// use in coordinated teardown selects.
    pub fn stopped(&self) -> Receiver<()> {
        self.stopped_rx.clone()
    }
}

/// The event qualifier.
pub struct Dispatcher {
    inbound: EventReceivers,
    outbound: EventSenders,
    rules: Arc<ActiveRules>,
    shutdown_rx: Receiver<()>,
}

impl Dispatcher {
    pub fn new(
        inbound: EventReceivers,
        outbound: EventSenders,
        rules: Arc<ActiveRules>,
        shutdown_rx: Receiver<()>,
    ) -> Self {
        Self {
            inbound,
            outbound,
            rules,
            shutdown_rx,
        }
    }

    /// Start the dispatcher on its own thread.
    pub fn spawn(self) -> DispatcherHandle {
        let (stopped_tx, stopped_rx) = unbounded::<()>();
        let join = std::thread::spawn(move || {
            // Moved in so it drops, and disconnects the handle, when
            // the loop returns for any reason.
            let _stopped = stopped_tx;
            self.run();
        });
        DispatcherHandle { join, stopped_rx }
    }

    fn run(self) {
        info!(rules = self.rules.len(), "event dispatcher started");

        let mut icmpv4 = self.inbound.icmpv4.clone();
        let mut tcp = self.inbound.tcp.clone();
        let mut udp = self.inbound.udp.clone();
        let mut http = self.inbound.http.clone();
        let mut open = 4usize;

        loop {
            // Blocking multi-way wait; a drained and disconnected
            // inbound channel is replaced by `never()` so it stops
            // waking the select.
            crossbeam_channel::select! {
                recv(self.shutdown_rx) -> _ => {
                    info!("event dispatcher shutting down");
                    return;
                }
                recv(icmpv4) -> msg => match msg {
                    Ok(ev) => {
                        if !self.qualify_and_forward(ev) {
                            return;
                        }
                    }
                    Err(_) => {
                        icmpv4 = never();
                        open -= 1;
                    }
                },
                recv(tcp) -> msg => match msg {
                    Ok(ev) => {
                        if !self.qualify_and_forward(ev) {
                            return;
                        }
                    }
                    Err(_) => {
                        tcp = never();
                        open -= 1;
                    }
                },
                recv(udp) -> msg => match msg {
                    Ok(ev) => {
                        if !self.qualify_and_forward(ev) {
                            return;
                        }
                    }
                    Err(_) => {
                        udp = never();
                        open -= 1;
                    }
                },
                recv(http) -> msg => match msg {
                    Ok(ev) => {
                        if !self.qualify_and_forward(ev) {
                            return;
                        }
                    }
                    Err(_) => {
                        http = never();
                        open -= 1;
                    }
                },
            }

            if open == 0 {
                info!("all inbound channels drained, dispatcher stopping");
                return;
            }
        }
    }

    /// Qualify one event against a rule snapshot and forward it.
    /// Returns false when the outbound sink is gone.
    fn qualify_and_forward(&self, mut ev: Event) -> bool {
        let rules = self.rules.snapshot();
        let matched = match ev.kind() {
            EventKind::Icmpv4 => qualify::qualify_icmpv4(&rules, &mut ev),
            EventKind::Tcp => qualify::qualify_tcp(&rules, &mut ev),
            EventKind::Udp => qualify::qualify_udp(&rules, &mut ev),
            EventKind::Http => qualify::qualify_http(&rules, &mut ev),
        };
        if matched > 0 {
            trace!(kind = %ev.kind(), matched, session = ev.session(), "event qualified");
        }

        if self.outbound.route(ev).is_err() {
            debug!("outbound sink disconnected, dispatcher stopping");
            return false;
        }
        true
    }
}
