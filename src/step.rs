//! Step trait and the execution context threaded between steps.

use std::fmt;

use anyhow::Result;
use serde_json::Value;

/// Mutable key/value space shared by every step of one pipeline run.
///
/// Keys are an open, step-defined namespace (counts, output paths, flags).
/// The engine never enumerates or validates them; it only passes the map
/// through. Last writer wins.
pub type Context = serde_json::Map<String, Value>;

/// A named, independently constructible unit of work.
///
/// A step receives the current data value, may read and write the shared
/// context, and returns the next data value. The payload stays an opaque
/// [`Value`] at this boundary; concrete steps impose whatever shape they
/// need on their own side of it.
pub trait Step {
    /// Transform `data`, optionally recording side-channel values in `context`.
    fn run(&self, data: Value, context: &mut Context) -> Result<Value>;

    /// Registered identifier, used in diagnostics and cache keys.
    fn name(&self) -> &'static str;

    /// One-line description surfaced by CLI listings.
    fn description(&self) -> &'static str {
        ""
    }
}

impl fmt::Debug for dyn Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name()).finish()
    }
}
