//! Pipeline config documents: loading, parsing, and pipeline construction.
//!
//! Document shape:
//!
//! ```yaml
//! pipeline:
//!   name: nightly_report
//!   steps:
//!     - type: read_file
//!       path: input.txt
//!     - type: grep
//!       pattern: ERROR
//!       cache:
//!         ttl_secs: 600
//! ```
//!
//! `type` selects a registered step; `cache` opts the step into the caching
//! wrapper; every other key is passed to the step's constructor. Errors
//! carry 1-based step positions so a broken document is debuggable without
//! stepping through code.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Value as Yaml;

use crate::cache::{CacheLocation, CacheStore, CachedStep};
use crate::error::ConfigError;
use crate::pipeline::{Pipeline, DEFAULT_PIPELINE_NAME};
use crate::registry::StepRegistry;
use crate::step::Step;

/// Per-step cache opt-in, declared under the reserved `cache` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSpec {
    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheSpec {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheSpec {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// A parsed config document. Consumed when a pipeline is built from it and
/// never retained afterwards.
#[derive(Debug)]
pub struct ConfigDocument {
    root: Yaml,
}

/// One entry of [`ConfigDocument::outline`]: what the document declares at
/// a given position, resolved against nothing.
#[derive(Debug)]
pub struct StepOutline {
    pub position: usize,
    pub step_type: Option<String>,
    pub args: Vec<String>,
    pub cache_ttl_secs: Option<u64>,
}

impl ConfigDocument {
    /// Pipeline name, when the document sets one.
    pub fn pipeline_name(&self) -> Option<&str> {
        self.root.get("pipeline")?.get("name")?.as_str()
    }

    /// Positional outline of the step list without constructing any step.
    /// Used by `inspect` to show a plan even when steps cannot be built.
    pub fn outline(&self) -> Result<Vec<StepOutline>, ConfigError> {
        let pipeline = self
            .root
            .get("pipeline")
            .ok_or(ConfigError::MissingKey { key: "pipeline" })?
            .as_mapping()
            .ok_or_else(|| ConfigError::invalid("'pipeline' must be a mapping"))?;
        let entries = pipeline
            .get("steps")
            .ok_or(ConfigError::MissingKey { key: "steps" })?
            .as_sequence()
            .ok_or_else(|| ConfigError::invalid("'steps' must be a list"))?;

        let mut outline = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let position = index + 1;
            let map = entry.as_mapping().ok_or_else(|| {
                ConfigError::invalid(format!("step {position} must be a mapping"))
            })?;
            let step_type = map.get("type").and_then(Yaml::as_str).map(str::to_string);
            let cache_ttl_secs = match map.get("cache") {
                None => None,
                Some(Yaml::Null) => Some(CacheSpec::default().ttl_secs),
                Some(value) => serde_yaml::from_value::<CacheSpec>(value.clone())
                    .ok()
                    .map(|spec| spec.ttl_secs),
            };
            let args = map
                .iter()
                .filter_map(|(key, _)| key.as_str())
                .filter(|key| *key != "type" && *key != "cache")
                .map(str::to_string)
                .collect();
            outline.push(StepOutline {
                position,
                step_type,
                args,
                cache_ttl_secs,
            });
        }
        Ok(outline)
    }
}

/// Read and parse a document from disk.
pub fn load_document(path: &Path) -> Result<ConfigDocument, ConfigError> {
    let contents = read_document_file(path)?;
    parse_document(&contents)
}

fn read_document_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Parse document text. Path-free core of [`load_document`].
pub fn parse_document(contents: &str) -> Result<ConfigDocument, ConfigError> {
    let root = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse { source })?;
    log::debug!("Parsed pipeline config document");
    Ok(ConfigDocument { root })
}

/// Build a pipeline from `document`, resolving step identifiers against
/// `registry`. Cache-wrapped steps use the location from the environment.
pub fn build_pipeline(
    document: ConfigDocument,
    registry: &StepRegistry,
) -> Result<Pipeline, ConfigError> {
    let store = CacheStore::new(CacheLocation::from_env().resolve());
    build_pipeline_with_cache(document, registry, &store)
}

/// [`build_pipeline`] with an explicit cache store, for callers (and tests)
/// that place cache entries somewhere specific.
pub fn build_pipeline_with_cache(
    document: ConfigDocument,
    registry: &StepRegistry,
    cache: &CacheStore,
) -> Result<Pipeline, ConfigError> {
    let mut root = match document.root {
        Yaml::Mapping(map) => map,
        Yaml::Null => return Err(ConfigError::MissingKey { key: "pipeline" }),
        _ => return Err(ConfigError::invalid("config root must be a mapping")),
    };

    let mut pipeline_map = match root.remove("pipeline") {
        Some(Yaml::Mapping(map)) => map,
        Some(_) => return Err(ConfigError::invalid("'pipeline' must be a mapping")),
        None => return Err(ConfigError::MissingKey { key: "pipeline" }),
    };

    let name = match pipeline_map.remove("name") {
        Some(Yaml::String(name)) => name,
        Some(_) => return Err(ConfigError::invalid("'name' must be a string")),
        None => DEFAULT_PIPELINE_NAME.to_string(),
    };

    let entries = match pipeline_map.remove("steps") {
        Some(Yaml::Sequence(entries)) => entries,
        Some(_) => return Err(ConfigError::invalid("'steps' must be a list")),
        None => return Err(ConfigError::MissingKey { key: "steps" }),
    };

    let mut steps: Vec<Box<dyn Step>> = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        steps.push(build_step(entry, index + 1, registry, cache)?);
    }

    log::debug!("Built pipeline '{}' with {} steps", name, steps.len());
    Ok(Pipeline::new(name, steps))
}

fn build_step(
    entry: Yaml,
    position: usize,
    registry: &StepRegistry,
    cache: &CacheStore,
) -> Result<Box<dyn Step>, ConfigError> {
    let entry = match entry {
        Yaml::Mapping(map) => map,
        _ => {
            return Err(ConfigError::invalid(format!(
                "step {position} must be a mapping"
            )))
        }
    };

    let mut step_type: Option<String> = None;
    let mut cache_value: Option<Yaml> = None;
    let mut args = serde_yaml::Mapping::new();
    for (key, value) in entry {
        match key.as_str() {
            Some("type") => match value {
                Yaml::String(declared) => step_type = Some(declared),
                _ => {
                    return Err(ConfigError::invalid(format!(
                        "step {position} 'type' must be a string"
                    )))
                }
            },
            Some("cache") => cache_value = Some(value),
            _ => {
                args.insert(key, value);
            }
        }
    }

    let step_type = step_type.ok_or(ConfigError::MissingStepType { position })?;

    let registration = registry
        .get(&step_type)
        .ok_or_else(|| ConfigError::UnknownStepType {
            position,
            step_type: step_type.clone(),
            available: registry
                .identifiers()
                .iter()
                .map(|id| id.to_string())
                .collect(),
        })?;

    let fingerprint = argument_fingerprint(&args);

    let step =
        registration
            .build(Yaml::Mapping(args))
            .map_err(|source| ConfigError::StepConstruction {
                position,
                step_type: step_type.clone(),
                source,
            })?;

    match parse_cache_spec(cache_value, position, &step_type)? {
        Some(spec) => Ok(Box::new(CachedStep::new(
            step,
            spec.ttl(),
            fingerprint,
            cache.clone(),
        ))),
        None => Ok(step),
    }
}

fn parse_cache_spec(
    value: Option<Yaml>,
    position: usize,
    step_type: &str,
) -> Result<Option<CacheSpec>, ConfigError> {
    match value {
        None => Ok(None),
        // A bare `cache:` key opts in with the default TTL.
        Some(Yaml::Null) => Ok(Some(CacheSpec::default())),
        Some(value) => serde_yaml::from_value(value)
            .map(Some)
            .map_err(|source| ConfigError::construction(position, step_type, source)),
    }
}

/// Canonical (sorted-key JSON) form of a step's declared constructor
/// arguments. This is the configuration part of cache keys, so it must not
/// depend on declaration order.
fn argument_fingerprint(args: &serde_yaml::Mapping) -> String {
    let canonical: BTreeMap<String, serde_json::Value> = args
        .iter()
        .map(|(key, value)| {
            let key = key
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{key:?}"));
            let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            (key, value)
        })
        .collect();
    serde_json::to_string(&canonical).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::Context;
    use anyhow::Result;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct AddN {
        n: i64,
    }

    impl Step for AddN {
        fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
            Ok(json!(data.as_i64().unwrap_or(0) + self.n))
        }

        fn name(&self) -> &'static str {
            "add_n"
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Stringify {}

    impl Step for Stringify {
        fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
            Ok(json!(data.to_string()))
        }

        fn name(&self) -> &'static str {
            "stringify"
        }
    }

    fn test_registry() -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry.register::<AddN>("add_n", "Add a constant").unwrap();
        registry
            .register::<Stringify>("stringify", "Render as JSON text")
            .unwrap();
        registry
    }

    #[test]
    fn builds_and_runs_a_configured_pipeline() {
        let doc = parse_document(indoc! {"
            pipeline:
              name: arithmetic
              steps:
                - type: add_n
                  n: 1
                - type: stringify
        "})
        .unwrap();

        let pipeline = build_pipeline(doc, &test_registry()).unwrap();
        assert_eq!(pipeline.name(), "arithmetic");
        assert_eq!(pipeline.step_names(), vec!["add_n", "stringify"]);

        let (value, _) = pipeline.run(json!(41)).unwrap();
        assert_eq!(value, json!("42"));
    }

    #[test]
    fn name_defaults_when_unset() {
        let doc = parse_document("pipeline:\n  steps: []\n").unwrap();
        let pipeline = build_pipeline(doc, &test_registry()).unwrap();
        assert_eq!(pipeline.name(), DEFAULT_PIPELINE_NAME);
        assert!(pipeline.is_empty());
    }

    #[test]
    fn missing_pipeline_key() {
        let doc = parse_document("other: 1\n").unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "pipeline" }));
        assert!(err.to_string().contains("pipeline"));
    }

    #[test]
    fn missing_steps_key() {
        let doc = parse_document("pipeline:\n  name: x\n").unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "steps" }));
        assert!(err.to_string().contains("steps"));
    }

    #[test]
    fn step_without_type_reports_position() {
        let doc = parse_document(indoc! {"
            pipeline:
              steps:
                - type: add_n
                  n: 1
                - n: 2
        "})
        .unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        assert_eq!(err.to_string(), "Step 2 is missing required 'type' field");
    }

    #[test]
    fn unknown_step_type_lists_known_identifiers() {
        let doc = parse_document(indoc! {"
            pipeline:
              steps:
                - type: this_step_does_not_exist
        "})
        .unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Unknown step type 'this_step_does_not_exist' at position 1"));
        assert!(msg.contains("add_n, stringify"));
    }

    #[test]
    fn unknown_step_type_against_empty_registry() {
        let doc = parse_document("pipeline:\n  steps:\n    - type: anything\n").unwrap();
        let err = build_pipeline(doc, &StepRegistry::new()).unwrap_err();
        assert!(err.to_string().contains("(none registered)"));
    }

    #[test]
    fn construction_failure_names_step_and_position() {
        let doc = parse_document(indoc! {"
            pipeline:
              steps:
                - type: add_n
                  n: 1
                  unexpected: true
        "})
        .unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to instantiate step 'add_n' at position 1:"));
        assert!(msg.contains("unexpected"));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let err = parse_document("pipeline: [unclosed\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_document_missing_file() {
        let err = load_document(Path::new("/nonexistent/steps.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn cache_key_wraps_step_without_changing_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let doc = parse_document(indoc! {"
            pipeline:
              steps:
                - type: add_n
                  n: 2
                  cache:
                    ttl_secs: 60
        "})
        .unwrap();

        let pipeline = build_pipeline_with_cache(doc, &test_registry(), &store).unwrap();
        // The wrapper is transparent in naming.
        assert_eq!(pipeline.step_names(), vec!["add_n"]);

        let (first, ctx_first) = pipeline.run(json!(5)).unwrap();
        assert_eq!(first, json!(7));
        assert_eq!(ctx_first.get("cache_hit"), Some(&json!(false)));

        let (second, ctx_second) = pipeline.run(json!(5)).unwrap();
        assert_eq!(second, json!(7));
        assert_eq!(ctx_second.get("cache_hit"), Some(&json!(true)));
    }

    #[test]
    fn bad_cache_spec_is_a_construction_error() {
        let doc = parse_document(indoc! {"
            pipeline:
              steps:
                - type: add_n
                  n: 1
                  cache:
                    ttl_secs: sometimes
        "})
        .unwrap();
        let err = build_pipeline(doc, &test_registry()).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Failed to instantiate step 'add_n' at position 1:"));
    }

    #[test]
    fn outline_reports_declared_steps() {
        let doc = parse_document(indoc! {"
            pipeline:
              name: outlined
              steps:
                - type: add_n
                  n: 3
                  cache:
                - missing_type: true
        "})
        .unwrap();

        assert_eq!(doc.pipeline_name(), Some("outlined"));
        let outline = doc.outline().unwrap();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].step_type.as_deref(), Some("add_n"));
        assert_eq!(outline[0].args, vec!["n".to_string()]);
        assert_eq!(outline[0].cache_ttl_secs, Some(3600));
        assert_eq!(outline[1].position, 2);
        assert!(outline[1].step_type.is_none());
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a: serde_yaml::Mapping = serde_yaml::from_str("x: 1\ny: two\n").unwrap();
        let b: serde_yaml::Mapping = serde_yaml::from_str("y: two\nx: 1\n").unwrap();
        assert_eq!(argument_fingerprint(&a), argument_fingerprint(&b));
    }
}
