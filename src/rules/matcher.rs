//! Rule matching
//!
//! `Rule::matches` is a pure predicate: it never errors and never
//! mutates anything. The caller (the qualification entry points) has
//! already restricted candidates to rules whose layer equals the
//! event's kind; the variant dispatch here is the only protocol branch
//! in the crate.
//!
//! Composition semantics:
//! - deny list short-circuits to false regardless of mode;
//! - a non-empty allow list must contain the source;
//! - a non-empty port list must contain the destination port, for
//!   every protocol;
//! - then the configured criteria combine as a conjunction
//!   (`match_all`) or disjunction. A rule with zero configured
//!   criteria passes trivially under conjunction and fails under
//!   disjunction, except HTTP: its disjunction path returns true
//!   when no configured criterion succeeds. That asymmetry is kept
//!   for compatibility with existing rule sets and is pinned by tests.

use std::net::IpAddr;

use super::Rule;
use crate::types::{Event, HttpEvent, Icmpv4Event, TcpEvent, UdpEvent};

impl Rule {
    /// Does this rule match the event?
    pub fn matches(&self, ev: &Event) -> bool {
        if !self.source_allowed(ev.source_ip()) {
            return false;
        }
        if !self.port_allowed(ev.dest_port()) {
            return false;
        }

        match ev {
            Event::Icmpv4(ev) => self.match_icmpv4(ev),
            Event::Tcp(ev) => self.match_tcp(ev),
            Event::Udp(ev) => self.match_udp(ev),
            Event::Http(ev) => self.match_http(ev),
        }
    }

    /// Deny list first, unconditionally; then the allow list when one
    /// is configured.
    fn source_allowed(&self, source: IpAddr) -> bool {
        if self.blacklisted_ips.iter().any(|r| r.contains(source)) {
            return false;
        }
        if !self.whitelisted_ips.is_empty()
            && !self.whitelisted_ips.iter().any(|r| r.contains(source))
        {
            return false;
        }
        true
    }

    /// Port membership gates the verdict for every protocol. An empty
    /// list matches any port.
    fn port_allowed(&self, dest_port: u16) -> bool {
        self.ports.is_empty() || self.ports.contains(&dest_port)
    }

    /// ICMPv4 criteria are reserved: no comparisons are defined yet,
    /// so no ICMPv4 rule can currently match.
    fn match_icmpv4(&self, _ev: &Icmpv4Event) -> bool {
        false
    }

    fn match_tcp(&self, ev: &TcpEvent) -> bool {
        let tcp = &ev.tcp;

        // A flag byte matches on exact equality of the whole byte
        // (XOR == 0), not a subset test; any listed alternative is
        // sufficient for the criterion.
        let flags_ok = || self.flags.iter().any(|&flags| tcp.flags ^ flags == 0);

        if self.options.match_all {
            if !self.flags.is_empty() && !flags_ok() {
                return false;
            }
            if let Some(seq) = self.seq {
                if tcp.seq != seq {
                    return false;
                }
            }
            if let Some(ack) = self.ack {
                if tcp.ack != ack {
                    return false;
                }
            }
            if let Some(window) = self.window {
                if tcp.window != window {
                    return false;
                }
            }
            if let Some(ref payload) = self.payload {
                if !payload.matches(&tcp.payload) {
                    return false;
                }
            }
            if let Some(dsize) = self.dsize {
                if tcp.payload.len() != dsize {
                    return false;
                }
            }
            return true;
        }

        if !self.flags.is_empty() && flags_ok() {
            return true;
        }
        if self.seq.is_some_and(|seq| tcp.seq == seq) {
            return true;
        }
        if self.ack.is_some_and(|ack| tcp.ack == ack) {
            return true;
        }
        if self.window.is_some_and(|window| tcp.window == window) {
            return true;
        }
        if self
            .payload
            .as_ref()
            .is_some_and(|payload| payload.matches(&tcp.payload))
        {
            return true;
        }
        if self.dsize.is_some_and(|dsize| tcp.payload.len() == dsize) {
            return true;
        }
        false
    }

    fn match_udp(&self, ev: &UdpEvent) -> bool {
        let udp = &ev.udp;

        if self.options.match_all {
            if let Some(length) = self.length {
                if udp.length != length {
                    return false;
                }
            }
            if let Some(checksum) = self.checksum {
                if udp.checksum != checksum {
                    return false;
                }
            }
            if let Some(ref payload) = self.payload {
                if !payload.matches(&udp.payload) {
                    return false;
                }
            }
            return true;
        }

        if self.length.is_some_and(|length| udp.length == length) {
            return true;
        }
        if self.checksum.is_some_and(|checksum| udp.checksum == checksum) {
            return true;
        }
        if self
            .payload
            .as_ref()
            .is_some_and(|payload| payload.matches(&udp.payload))
        {
            return true;
        }
        false
    }

    fn match_http(&self, ev: &HttpEvent) -> bool {
        let http = &ev.http;

        // The headers criterion is satisfied by any single inline
        // header line, regardless of the rule's own match mode.
        let headers_ok = |pattern: &super::PatternSpec| {
            http.inline_headers
                .iter()
                .any(|line| pattern.matches(line.as_bytes()))
        };

        if self.options.match_all {
            if let Some(ref uri) = self.uri {
                if !uri.matches(http.uri.as_bytes()) {
                    return false;
                }
            }
            if let Some(ref body) = self.body {
                if !body.matches(http.body.as_bytes()) {
                    return false;
                }
            }
            if let Some(ref headers) = self.headers {
                if !headers_ok(headers) {
                    return false;
                }
            }
            if let Some(ref verb) = self.verb {
                if !verb.matches(http.verb.as_bytes()) {
                    return false;
                }
            }
            if let Some(ref proto) = self.proto {
                if !proto.matches(http.proto.as_bytes()) {
                    return false;
                }
            }
            return true;
        }

        if self
            .uri
            .as_ref()
            .is_some_and(|uri| uri.matches(http.uri.as_bytes()))
        {
            return true;
        }
        if self
            .body
            .as_ref()
            .is_some_and(|body| body.matches(http.body.as_bytes()))
        {
            return true;
        }
        // A configured headers criterion gates even in disjunction
        // mode: no matching header line fails the rule outright.
        if let Some(ref headers) = self.headers {
            if !headers_ok(headers) {
                return false;
            }
        }
        if self
            .verb
            .as_ref()
            .is_some_and(|verb| verb.matches(http.verb.as_bytes()))
        {
            return true;
        }
        if self
            .proto
            .as_ref()
            .is_some_and(|proto| proto.matches(http.proto.as_bytes()))
        {
            return true;
        }

        // Compatibility fallthrough: the HTTP disjunction path passes
        // when every configured criterion failed.
        true
    }
}
