//! Flows module - commands that combine scanning, measurement and packing
//!
//! Provides:
//! - pack: pack scanned sources into capacity-bounded chunks

pub mod pack;
