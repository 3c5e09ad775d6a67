//! Core logic for the deleted-message watchdog.
//!
//! This crate is transport-agnostic. The inbound event stream, media
//! downloads, name lookups and outbound notices live behind ports (traits)
//! implemented in adapter crates.

pub mod cache;
pub mod capture;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod errors;
pub mod forwarder;
pub mod logging;
pub mod media;
pub mod messaging;
pub mod peers;
pub mod ports;
pub mod protocol;
pub mod read_positions;
pub mod tracker;

pub use errors::{Error, Result};
