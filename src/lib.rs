//! nightjar: passive network sensor core
//!
//! Decoded protocol observations flow through per-protocol channels
//! into a dispatcher that qualifies each one against a declarative
//! rule set, merges the enrichment of every matching rule, and writes
//! the tagged events out as NDJSON. Flows are tracked in a session
//! registry with idle eviction so related packets share an identifier.

pub mod config;
pub mod engine;
pub mod logger;
pub mod replay;
pub mod rules;
pub mod sessions;
pub mod types;
