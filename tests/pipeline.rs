//! End-to-end pipeline test: replay NDJSON through the dispatcher and
//! check the qualified records that come out the other side.

use std::io::Cursor;
use std::sync::Arc;

use crossbeam_channel::unbounded;
use serde_json::Value;

use nightjar::config::EventsConfig;
use nightjar::engine::{event_channels, Dispatcher};
use nightjar::logger::{spawn_writer, EventWriter};
use nightjar::replay::spawn_producer;
use nightjar::rules::{load_dir, ActiveRules};
use nightjar::sessions::SessionRegistry;

const RULES: &str = r#"
admin probe:
  layer: http
  uri:
    value: "/admin"
  tags: [admin-probe]
  metadata:
    author: nightjar
attack header:
  layer: http
  headers:
    value: "X-Attack"
  tags: [attack-header]
  references:
    url:
      - "https://example.test/attack-header"
syn probe:
  layer: tcp
  options:
    match_all: true
  flags: [2]
  tags: [syn]
"#;

const EVENTS: &str = r#"
{"type":"http","src_ip":"203.0.113.9","src_port":41000,"dst_ip":"198.51.100.2","dst_port":80,"http":{"verb":"GET","proto":"HTTP/1.1","uri":"/admin/login","inline_headers":["Host: target","X-Attack: 1"],"body":""}}
{"type":"tcp","src_ip":"203.0.113.9","src_port":41001,"dst_ip":"198.51.100.2","dst_port":22,"tcp":{"seq":7,"ack":0,"window":1024,"data_offset":5,"urgent":0,"flags":2,"payload":""}}
{"type":"udp","src_ip":"203.0.113.9","src_port":41002,"dst_ip":"198.51.100.2","dst_port":53,"udp":{"length":8,"checksum":0,"payload":""}}
"#;

#[test]
fn replay_through_dispatcher_to_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.yml"), RULES).unwrap();
    let rules = Arc::new(ActiveRules::new(load_dir(dir.path()).unwrap()));
    assert_eq!(rules.len(), 3);

    let sessions = Arc::new(SessionRegistry::new());
    let out_path = dir.path().join("events.ndjson");
    let writer = EventWriter::open(&out_path, EventsConfig::default()).unwrap();

    let (_shutdown_tx, shutdown_rx) = unbounded::<()>();
    let (inbound_tx, inbound_rx) = event_channels(16);
    let (outbound_tx, outbound_rx) = event_channels(16);

    let dispatcher = Dispatcher::new(inbound_rx, outbound_tx, rules, shutdown_rx).spawn();
    let writer_thread = spawn_writer(outbound_rx, writer);
    let producer = spawn_producer(Cursor::new(EVENTS), sessions, inbound_tx);

    assert_eq!(producer.join().unwrap(), 3);
    dispatcher.wait();
    writer_thread.join().unwrap();

    let output = std::fs::read_to_string(&out_path).unwrap();
    let records: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 3);

    let http = records
        .iter()
        .find(|r| r["type"] == "http")
        .expect("http record missing");
    let tags: Vec<&str> = http["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t.as_str().unwrap())
        .collect();
    assert!(tags.contains(&"admin-probe"));
    assert!(tags.contains(&"attack-header"));
    assert_eq!(http["metadata"]["author"], "nightjar");
    assert_eq!(
        http["references"]["url"][0],
        "https://example.test/attack-header"
    );

    let tcp = records
        .iter()
        .find(|r| r["type"] == "tcp")
        .expect("tcp record missing");
    assert_eq!(tcp["tags"].as_array().unwrap().len(), 1);
    assert_eq!(tcp["tags"][0], "syn");
    assert_eq!(tcp["dst_port"], 22);

    let udp = records
        .iter()
        .find(|r| r["type"] == "udp")
        .expect("udp record missing");
    assert!(udp["tags"].as_array().unwrap().is_empty());
}

/// Reader that never produces data and never reaches EOF, like an idle
/// stdin.
struct PendingReader(crossbeam_channel::Receiver<u8>);

impl std::io::Read for PendingReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        let _ = self.0.recv();
        Ok(0)
    }
}

#[test]
fn shutdown_completes_while_producer_is_blocked_on_input() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.yml"), RULES).unwrap();
    let rules = Arc::new(ActiveRules::new(load_dir(dir.path()).unwrap()));

    let sessions = Arc::new(SessionRegistry::new());
    let writer = EventWriter::open(&dir.path().join("events.ndjson"), EventsConfig::default())
        .unwrap();

    let (shutdown_tx, shutdown_rx) = unbounded::<()>();
    let (inbound_tx, inbound_rx) = event_channels(16);
    let (outbound_tx, outbound_rx) = event_channels(16);

    let dispatcher = Dispatcher::new(inbound_rx, outbound_tx, rules, shutdown_rx).spawn();
    let writer_thread = spawn_writer(outbound_rx, writer);

    // Keep the sender alive so the producer stays parked in its read.
    let (_input_tx, input_rx) = unbounded::<u8>();
    let _producer = spawn_producer(PendingReader(input_rx), sessions, inbound_tx);

    drop(shutdown_tx);

    // The dispatcher and writer must stop without the producer ever
    // returning from its blocking read.
    let stopped = dispatcher.stopped();
    assert!(matches!(
        stopped.recv_timeout(std::time::Duration::from_secs(5)),
        Err(crossbeam_channel::RecvTimeoutError::Disconnected)
    ));
    dispatcher.wait();
    writer_thread.join().unwrap();
}

#[test]
fn rule_swap_takes_effect_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rules.yml"), RULES).unwrap();
    let rules = Arc::new(ActiveRules::new(load_dir(dir.path()).unwrap()));

    let line = r#"{"type":"tcp","src_ip":"203.0.113.9","src_port":41001,"dst_ip":"198.51.100.2","dst_port":22,"tcp":{"seq":7,"ack":0,"window":1024,"data_offset":5,"urgent":0,"flags":2,"payload":""}}"#;

    let run_once = |rules: Arc<ActiveRules>, out_path: &std::path::Path| {
        let sessions = Arc::new(SessionRegistry::new());
        let writer = EventWriter::open(out_path, EventsConfig::default()).unwrap();

        let (_shutdown_tx, shutdown_rx) = unbounded::<()>();
        let (inbound_tx, inbound_rx) = event_channels(16);
        let (outbound_tx, outbound_rx) = event_channels(16);

        let dispatcher = Dispatcher::new(inbound_rx, outbound_tx, rules, shutdown_rx).spawn();
        let writer_thread = spawn_writer(outbound_rx, writer);
        let producer = spawn_producer(Cursor::new(line.to_string()), sessions, inbound_tx);

        assert_eq!(producer.join().unwrap(), 1);
        dispatcher.wait();
        writer_thread.join().unwrap();

        let output = std::fs::read_to_string(out_path).unwrap();
        serde_json::from_str::<Value>(output.lines().next().unwrap()).unwrap()
    };

    let tagged = run_once(Arc::clone(&rules), &dir.path().join("first.ndjson"));
    assert_eq!(tagged["tags"][0], "syn");

    rules.swap(Default::default());

    let untagged = run_once(rules, &dir.path().join("second.ndjson"));
    assert!(untagged["tags"].as_array().unwrap().is_empty());
}
