//! Protocol qualification entry points
//!
//! One entry function per protocol kind. This is the only place rules
//! are filtered by layer; the matcher assumes its candidates already
//! belong to the event's kind. Enrichment merging is commutative and
//! associative (tag union, last-writer-wins metadata, appends), so
//! rule evaluation order does not matter; the merge into one event is
//! serialized here.

use crate::rules::{Rule, RuleSet};
use crate::types::{Envelope, Event, EventKind};

fn apply(rule: &Rule, envelope: &mut Envelope) {
    envelope.add_tags(&rule.tags);
    envelope.merge_metadata(&rule.metadata);
    envelope.append_references(&rule.references);
    envelope.append_statements(&rule.statements);
}

/// Run every rule of `layer` against the event, merging enrichment
/// from each match. Returns the number of matching rules.
fn qualify_layer(rules: &RuleSet, layer: EventKind, ev: &mut Event) -> usize {
    let mut matched = 0;
    for rule in rules.values().filter(|rule| rule.layer == layer) {
        if rule.matches(ev) {
            apply(rule, ev.envelope_mut());
            matched += 1;
        }
    }
    matched
}

pub fn qualify_icmpv4(rules: &RuleSet, ev: &mut Event) -> usize {
    qualify_layer(rules, EventKind::Icmpv4, ev)
}

pub fn qualify_tcp(rules: &RuleSet, ev: &mut Event) -> usize {
    qualify_layer(rules, EventKind::Tcp, ev)
}

pub fn qualify_udp(rules: &RuleSet, ev: &mut Event) -> usize {
    qualify_layer(rules, EventKind::Udp, ev)
}

pub fn qualify_http(rules: &RuleSet, ev: &mut Event) -> usize {
    qualify_layer(rules, EventKind::Http, ev)
}
