//! Session registry
//!
//! Maps a canonical flow key to a stable session identifier for as
//! long as the flow stays active. Shared by every producer task;
//! lookups refresh the entry so the periodic sweeper never evicts a
//! flow that produced an event since the last tick.

use std::collections::HashMap;
use std::net::IpAddr;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{tick, Receiver};
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// Canonical direction-insensitive flow key.
///
/// Both directions of a connection order their endpoints the same way,
/// so request and response packets resolve to one session.
pub fn flow_key(proto: &str, a_ip: IpAddr, a_port: u16, b_ip: IpAddr, b_port: u16) -> String {
    if (a_ip, a_port) <= (b_ip, b_port) {
        format!("{}:{}:{}-{}:{}", proto, a_ip, a_port, b_ip, b_port)
    } else {
        format!("{}:{}:{}-{}:{}", proto, b_ip, b_port, a_ip, a_port)
    }
}

struct SessionEntry {
    uid: String,
    last_seen: Instant,
}

/// Flow-to-session index, safe for concurrent producers.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session uid for a flow key, allocating a fresh one
    /// on first observation. Refreshes the idle clock either way.
    pub fn get_uid(&self, key: &str) -> String {
        let mut map = self.inner.write();
        let entry = map.entry(key.to_string()).or_insert_with(|| SessionEntry {
            uid: Uuid::new_v4().simple().to_string(),
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        entry.uid.clone()
    }

    /// Drop every flow idle since before `cutoff`.
    pub fn flush_older_than(&self, cutoff: Instant) -> usize {
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, entry| entry.last_seen >= cutoff);
        before - map.len()
    }

    /// Drop every flow. Used at shutdown.
    pub fn flush_all(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Periodic eviction of idle flows.
///
/// Runs until the shutdown channel signals or disconnects, then
/// flushes the whole registry and exits.
pub fn spawn_sweeper(
    registry: std::sync::Arc<SessionRegistry>,
    interval: Duration,
    idle_timeout: Duration,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let ticker = tick(interval);
        loop {
            crossbeam_channel::select! {
                recv(ticker) -> _ => {
                    // No cutoff yet if the monotonic clock is younger
                    // than the idle timeout.
                    let Some(cutoff) = Instant::now().checked_sub(idle_timeout) else {
                        continue;
                    };
                    let evicted = registry.flush_older_than(cutoff);
                    if evicted > 0 {
                        debug!(evicted, active = registry.len(), "evicted idle sessions");
                    }
                }
                recv(shutdown_rx) -> _ => {
                    registry.flush_all();
                    info!("session registry flushed");
                    return;
                }
            }
        }
    })
}
