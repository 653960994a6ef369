//! Backends module - source discovery and environment checks
//!
//! Provides:
//! - scan: source scanning, reading and measurement
//! - doctor: tokenizer availability checks

pub mod doctor;
pub mod scan;
