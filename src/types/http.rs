//! Decoded HTTP request view
//!
//! Produced by the capture collaborator's stream reassembly. The
//! matcher compares against the raw inline header lines so that rules
//! can target any part of a header, name or value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpRequest {
    pub verb: String,
    pub proto: String,
    pub uri: String,
    /// Parsed header map, kept for log output.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw `Name: value` lines in arrival order, used by the matcher.
    #[serde(default)]
    pub inline_headers: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub is_tls: bool,
    #[serde(default)]
    pub dest_host: String,
    #[serde(default)]
    pub source_port: u16,
}
