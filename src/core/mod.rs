//! Core module - data structures and utilities shared by every command
//!
//! - Output record model (ResultItem)
//! - Rendering to jsonl, json, markdown and raw text
//! - Source reading (markdown, notebooks, python, text)
//! - Cost oracles for token measurement
//! - Path normalization and hashing

pub mod file_reader;
pub mod model;
pub mod paths;
pub mod render;
pub mod tokenizer;
pub mod util;
