//! Structured errors for registration, configuration, execution, and the
//! cache store.
//!
//! Every failure mode keeps enough structure (position, identifier, cause)
//! for callers to inspect programmatically; the Display strings are the
//! human-facing form the CLI prints.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure while registering a step type.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Duplicate identifier. Silent overwrite of step behavior is worse
    /// than a hard failure at registration time.
    #[error("Step type '{id}' is already registered by {existing}; refusing to replace it with {incoming}")]
    Duplicate {
        id: String,
        existing: &'static str,
        incoming: &'static str,
    },
}

/// Failure while loading a config document or building a pipeline from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse pipeline config: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
    },

    /// A required top-level key (`pipeline`, `steps`) is absent.
    #[error("Pipeline config is missing required '{key}' key")]
    MissingKey { key: &'static str },

    /// A step entry has no `type` field. Positions are 1-based and
    /// human-facing.
    #[error("Step {position} is missing required 'type' field")]
    MissingStepType { position: usize },

    #[error(
        "Unknown step type '{step_type}' at position {position}. Available types: {}",
        fmt_available(available)
    )]
    UnknownStepType {
        position: usize,
        step_type: String,
        available: Vec<String>,
    },

    /// Constructor-argument mismatch between the config entry and the step
    /// type, with the underlying serde failure preserved.
    #[error("Failed to instantiate step '{step_type}' at position {position}: {source}")]
    StepConstruction {
        position: usize,
        step_type: String,
        #[source]
        source: anyhow::Error,
    },

    /// Structurally malformed document (non-mapping step entry, non-list
    /// `steps`, and similar shape mismatches).
    #[error("Invalid pipeline config: {detail}")]
    Invalid { detail: String },
}

impl ConfigError {
    pub fn construction(
        position: usize,
        step_type: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        ConfigError::StepConstruction {
            position,
            step_type: step_type.into(),
            source: source.into(),
        }
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        ConfigError::Invalid {
            detail: detail.into(),
        }
    }
}

fn fmt_available(available: &[String]) -> String {
    if available.is_empty() {
        "(none registered)".to_string()
    } else {
        available.join(", ")
    }
}

/// Failure raised by the pipeline engine.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A step's `run` failed. The engine stops there; later steps are
    /// never invoked.
    #[error("Pipeline '{pipeline}' failed at step {position}/{total} ({step_type}): {source}")]
    StepFailed {
        pipeline: String,
        position: usize,
        total: usize,
        step_type: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// 1-based index of the failing step.
    pub fn position(&self) -> usize {
        match self {
            PipelineError::StepFailed { position, .. } => *position,
        }
    }

    /// Registered identifier of the failing step.
    pub fn step_type(&self) -> &str {
        match self {
            PipelineError::StepFailed { step_type, .. } => step_type,
        }
    }
}

/// Failure in the cache store utilities (stats/clear). Cache reads and
/// writes on the hot path fail open instead of surfacing these.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize cache entry: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn duplicate_registration_names_both_types() {
        let err = RegistryError::Duplicate {
            id: "read_file".to_string(),
            existing: "stepline::steps::file::ReadFile",
            incoming: "stepline::steps::text::Grep",
        };
        let msg = err.to_string();
        assert!(msg.contains("read_file"));
        assert!(msg.contains("ReadFile"));
        assert!(msg.contains("Grep"));
    }

    #[test]
    fn unknown_step_type_lists_available() {
        let err = ConfigError::UnknownStepType {
            position: 2,
            step_type: "frobnicate".to_string(),
            available: vec!["grep".to_string(), "read_file".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Unknown step type 'frobnicate' at position 2"));
        assert!(msg.contains("grep, read_file"));
    }

    #[test]
    fn unknown_step_type_with_empty_registry() {
        let err = ConfigError::UnknownStepType {
            position: 1,
            step_type: "grep".to_string(),
            available: vec![],
        };
        assert!(err.to_string().contains("(none registered)"));
    }

    #[test]
    fn missing_steps_key_message_contains_key() {
        let err = ConfigError::MissingKey { key: "steps" };
        assert!(err.to_string().contains("steps"));
    }

    #[test]
    fn step_failed_display_and_source_chain() {
        let cause = anyhow::anyhow!("boom");
        let err = PipelineError::StepFailed {
            pipeline: "nightly".to_string(),
            position: 2,
            total: 3,
            step_type: "grep".to_string(),
            source: cause,
        };
        assert_eq!(
            err.to_string(),
            "Pipeline 'nightly' failed at step 2/3 (grep): boom"
        );
        assert!(err.source().is_some());
        assert_eq!(err.position(), 2);
        assert_eq!(err.step_type(), "grep");
    }
}
