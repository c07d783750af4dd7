//! Deterministic JSON serialization for the session file.
//!
//! - Sorting object keys alphabetically (via `BTreeMap`)
//! - Using 2-space indentation
//! - Adding trailing newline

mod json;

pub use json::*;
