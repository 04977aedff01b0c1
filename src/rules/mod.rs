//! Declarative qualification rules
//!
//! A rule names the protocol layer it applies to, a set of match
//! criteria, and the enrichment payload (tags, metadata, references,
//! statements) applied verbatim to every event it matches. Rules are
//! immutable once loaded; the active set is an atomically swappable
//! snapshot so reloads never expose a partially-updated set.

pub mod ip;
pub mod loader;
pub mod matcher;
pub mod pattern;

pub use ip::IpRange;
pub use loader::load_dir;
pub use pattern::PatternSpec;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::EventKind;

/// Boolean composition mode for a rule's configured criteria.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RuleOptions {
    /// `true`: every configured criterion must hold (conjunction).
    /// `false`: at least one configured criterion must hold
    /// (disjunction).
    #[serde(default)]
    pub match_all: bool,
}

/// One qualification rule.
///
/// Every optional criterion is an explicit `Option` (or possibly-empty
/// list): absent means "not configured, skip", which is never confused
/// with a criterion configured to a zero value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Protocol this rule applies to; it never matches other kinds.
    pub layer: EventKind,
    #[serde(default)]
    pub options: RuleOptions,

    /// Deny list, checked first regardless of match mode.
    #[serde(default)]
    pub blacklisted_ips: Vec<IpRange>,
    /// Allow list; when non-empty the source must fall in one range.
    #[serde(default)]
    pub whitelisted_ips: Vec<IpRange>,
    /// Destination ports; empty matches any port.
    #[serde(default)]
    pub ports: Vec<u16>,

    // TCP criteria. `flags` lists alternative exact flag bytes; any
    // one matching satisfies the criterion.
    #[serde(default)]
    pub flags: Vec<u8>,
    pub seq: Option<u32>,
    pub ack: Option<u32>,
    pub window: Option<u16>,
    pub dsize: Option<usize>,

    // Shared by TCP and UDP.
    pub payload: Option<PatternSpec>,

    // UDP criteria.
    pub length: Option<u16>,
    pub checksum: Option<u16>,

    // HTTP criteria.
    pub uri: Option<PatternSpec>,
    pub body: Option<PatternSpec>,
    pub headers: Option<PatternSpec>,
    pub verb: Option<PatternSpec>,
    pub proto: Option<PatternSpec>,

    // Enrichment payload.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub references: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub statements: Vec<String>,
}

/// Rule set keyed by rule name.
pub type RuleSet = HashMap<String, Rule>;

/// Atomically swappable handle on the active rule set.
///
/// Qualification takes an `Arc` snapshot per event, so a `swap` during
/// a reload never exposes a half-updated set and holds no lock while
/// rules are being evaluated.
#[derive(Default)]
pub struct ActiveRules {
    inner: RwLock<Arc<RuleSet>>,
}

impl ActiveRules {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(rules)),
        }
    }

    /// Immutable snapshot of the current set.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the whole active set in one step.
    pub fn swap(&self, rules: RuleSet) {
        *self.inner.write() = Arc::new(rules);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare rule for a layer, no criteria configured.
    pub fn empty_rule(layer: EventKind) -> Rule {
        Rule {
            layer,
            options: RuleOptions::default(),
            blacklisted_ips: Vec::new(),
            whitelisted_ips: Vec::new(),
            ports: Vec::new(),
            flags: Vec::new(),
            seq: None,
            ack: None,
            window: None,
            dsize: None,
            payload: None,
            length: None,
            checksum: None,
            uri: None,
            body: None,
            headers: None,
            verb: None,
            proto: None,
            tags: Vec::new(),
            metadata: HashMap::new(),
            references: HashMap::new(),
            statements: Vec::new(),
        }
    }
}
