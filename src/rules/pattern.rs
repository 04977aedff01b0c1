//! Byte pattern criteria
//!
//! Every string-ish rule criterion (payload, URI, body, headers, verb,
//! proto) is a `PatternSpec`: substring or full comparison, case
//! sensitive or not. Searches are allocation-free byte scans.

use serde::{Deserialize, Deserializer, Serialize};

use base64::Engine as _;

/// One configured pattern criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSpec {
    /// Pattern bytes. In rule files a plain string, or `base64:...`
    /// for binary content.
    #[serde(deserialize_with = "pattern_value", serialize_with = "pattern_value_out")]
    pub value: Vec<u8>,
    /// Ignore ASCII case when comparing.
    #[serde(default)]
    pub nocase: bool,
    /// Full comparison instead of substring search.
    #[serde(default)]
    pub exact: bool,
}

impl PatternSpec {
    pub fn matches(&self, data: &[u8]) -> bool {
        if self.exact {
            if data.len() != self.value.len() {
                return false;
            }
            if self.nocase {
                data.iter()
                    .zip(self.value.iter())
                    .all(|(&d, &p)| d.to_ascii_lowercase() == p.to_ascii_lowercase())
            } else {
                data == self.value.as_slice()
            }
        } else if self.nocase {
            find_nocase(data, &self.value).is_some()
        } else {
            find_bytes(data, &self.value).is_some()
        }
    }
}

fn pattern_value<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
    let raw = String::deserialize(de)?;
    if let Some(encoded) = raw.strip_prefix("base64:") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    } else {
        Ok(raw.into_bytes())
    }
}

fn pattern_value_out<S: serde::Serializer>(value: &[u8], ser: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(value) {
        Ok(s) => ser.serialize_str(s),
        Err(_) => ser.serialize_str(&format!(
            "base64:{}",
            base64::engine::general_purpose::STANDARD.encode(value)
        )),
    }
}

/// Case-sensitive substring search.
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Case-insensitive substring search without allocating.
fn find_nocase(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| {
        window
            .iter()
            .zip(needle.iter())
            .all(|(&h, &n)| h.to_ascii_lowercase() == n.to_ascii_lowercase())
    })
}
