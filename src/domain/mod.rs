//! Domain modules organized as vertical slices.
//!
//! Each sub-module contains:
//! - `mod.rs` — Rich domain types (validated, ready for output)
//! - `wire.rs` — Raw serde structs matching the timeline payloads
//! - `convert.rs` — `TryFrom`/`From` conversions with validation
//! - `strategy.rs` — Decode strategies and the domain's type registry
//! - `client.rs` — Sub-client issuing the domain's WS requests

pub mod activity;
pub mod detail;
pub mod document;
pub mod instrument;
pub mod transaction;
