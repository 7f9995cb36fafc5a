//! Declarative linear pipeline runner.
//!
//! Pipelines are ordered step sequences described in YAML: each entry names
//! a registered step type and its constructor arguments. A [`StepRegistry`]
//! maps those names to concrete [`Step`] implementations, the config loader
//! builds a [`Pipeline`], and the engine runs it step by step, threading a
//! JSON data value through and sharing a mutable context map.
//!
//! ```no_run
//! use stepline::{config, registry::StepRegistry};
//! use serde_json::Value;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = StepRegistry::with_builtins()?;
//! let document = config::parse_document(
//!     "pipeline:\n  steps:\n    - type: to_uppercase\n",
//! )?;
//! let pipeline = config::build_pipeline(document, &registry)?;
//! let (value, context) = pipeline.run(Value::String("quiet".into()))?;
//! assert_eq!(value, Value::String("QUIET".into()));
//! # let _ = context;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod step;
pub mod steps;
pub mod summarize;

// Re-export commonly used types
pub use crate::cache::{CacheLocation, CacheStore, CachedStep};
pub use crate::config::{build_pipeline, load_document, parse_document};
pub use crate::error::{CacheError, ConfigError, PipelineError, RegistryError};
pub use crate::pipeline::Pipeline;
pub use crate::registry::StepRegistry;
pub use crate::step::{Context, Step};
