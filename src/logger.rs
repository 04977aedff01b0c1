//! Event log writer
//!
//! The outbound side of the pipeline: consumes qualified events from
//! the per-protocol sink channels and writes one JSON record per line.
//! Exits once every sink channel has disconnected, flushing first.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::never;
use tracing::{error, info};

use crate::config::EventsConfig;
use crate::engine::EventReceivers;
use crate::types::Event;

/// NDJSON writer over any `Write` target.
pub struct EventWriter<W: Write> {
    out: BufWriter<W>,
    limits: EventsConfig,
    written: u64,
}

impl EventWriter<std::fs::File> {
    /// Append to (or create) a log file.
    pub fn open(path: &Path, limits: EventsConfig) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log: {}", path.display()))?;
        Ok(Self::new(file, limits))
    }
}

impl<W: Write> EventWriter<W> {
    pub fn new(out: W, limits: EventsConfig) -> Self {
        Self {
            out: BufWriter::new(out),
            limits,
            written: 0,
        }
    }

    pub fn write_event(&mut self, ev: &Event) -> Result<()> {
        let record = ev.to_log(&self.limits);
        serde_json::to_writer(&mut self.out, &record).context("failed to serialize event")?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().context("failed to flush event log")
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

/// Consume the sink channels on a dedicated thread until they all
/// disconnect.
pub fn spawn_writer<W: Write + Send + 'static>(
    sinks: EventReceivers,
    mut writer: EventWriter<W>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut icmpv4 = sinks.icmpv4;
        let mut tcp = sinks.tcp;
        let mut udp = sinks.udp;
        let mut http = sinks.http;
        let mut open = 4usize;

        let mut write = |writer: &mut EventWriter<W>, ev: Event| {
            if let Err(err) = writer.write_event(&ev) {
                error!(%err, "dropping event log record");
            }
        };

        while open > 0 {
            crossbeam_channel::select! {
                recv(icmpv4) -> msg => match msg {
                    Ok(ev) => write(&mut writer, ev),
                    Err(_) => {
                        icmpv4 = never();
                        open -= 1;
                    }
                },
                recv(tcp) -> msg => match msg {
                    Ok(ev) => write(&mut writer, ev),
                    Err(_) => {
                        tcp = never();
                        open -= 1;
                    }
                },
                recv(udp) -> msg => match msg {
                    Ok(ev) => write(&mut writer, ev),
                    Err(_) => {
                        udp = never();
                        open -= 1;
                    }
                },
                recv(http) -> msg => match msg {
                    Ok(ev) => write(&mut writer, ev),
                    Err(_) => {
                        http = never();
                        open -= 1;
                    }
                },
            }
        }

        if let Err(err) = writer.flush() {
            error!(%err, "failed to flush event log");
        }
        info!(events = writer.written(), "event log writer stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::event_channels;
    use crate::types::{Icmpv4Event, Icmpv4Header};
    use chrono::Utc;

    fn icmp_event() -> Event {
        Event::Icmpv4(Icmpv4Event::new(
            Utc::now(),
            "198.51.100.7".parse().unwrap(),
            Icmpv4Header {
                icmp_type: 8,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn writes_one_line_per_event() {
        let mut writer = EventWriter::new(Vec::new(), EventsConfig::default());
        writer.write_event(&icmp_event()).unwrap();
        writer.write_event(&icmp_event()).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.written(), 2);

        let bytes = writer.out.into_inner().unwrap();
        let lines: Vec<_> = std::str::from_utf8(&bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(lines.len(), 2);

        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["type"], "icmpv4");
        assert_eq!(record["src_ip"], "198.51.100.7");
        assert_eq!(record["dst_port"], 0);
        assert_eq!(record["session"], "n/a");
        assert_eq!(record["icmpv4"]["icmp_type"], 8);
    }

    #[test]
    fn writer_thread_drains_and_exits() {
        let (tx, rx) = event_channels(4);
        let writer = EventWriter::new(Vec::new(), EventsConfig::default());
        let handle = spawn_writer(rx, writer);

        tx.route(icmp_event()).unwrap();
        drop(tx);
        handle.join().unwrap();
    }
}
