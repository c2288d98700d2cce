//! Output contracts for LLM-backed stages.
//!
//! This module provides:
//! - JSON extraction from raw model text
//! - Typed validation of the extracted payload

mod json;

pub use json::{extract_json, invoke_and_parse, parse_typed};
