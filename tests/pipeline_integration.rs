//! End-to-end pipeline tests: registration, config loading, construction,
//! and execution through the public crate surface.

use anyhow::{bail, Result};
use indoc::{formatdoc, indoc};
use proptest::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

use stepline::config::{build_pipeline, load_document, parse_document};
use stepline::error::ConfigError;
use stepline::registry::StepRegistry;
use stepline::step::{Context, Step};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddOne {}

impl Step for AddOne {
    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        Ok(json!(data.as_i64().unwrap_or(0) + 1))
    }

    fn name(&self) -> &'static str {
        "add_one"
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MultiplyByTwo {}

impl Step for MultiplyByTwo {
    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        context.insert("doubled".to_string(), json!(true));
        Ok(json!(data.as_i64().unwrap_or(0) * 2))
    }

    fn name(&self) -> &'static str {
        "multiply_by_two"
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Explode {}

impl Step for Explode {
    fn run(&self, _data: Value, _context: &mut Context) -> Result<Value> {
        bail!("intentional failure")
    }

    fn name(&self) -> &'static str {
        "explode"
    }
}

fn arithmetic_registry() -> StepRegistry {
    let mut registry = StepRegistry::new();
    registry
        .register::<AddOne>("add_one", "Add one to the payload")
        .unwrap();
    registry
        .register::<MultiplyByTwo>("multiply_by_two", "Double the payload")
        .unwrap();
    registry
        .register::<Explode>("explode", "Always fails")
        .unwrap();
    registry
}

#[test]
fn configured_pipeline_composes_left_to_right() {
    let document = parse_document(indoc! {"
        pipeline:
          name: arithmetic
          steps:
            - type: add_one
            - type: multiply_by_two
    "})
    .unwrap();

    let pipeline = build_pipeline(document, &arithmetic_registry()).unwrap();
    let (value, context) = pipeline.run(json!(3)).unwrap();

    assert_eq!(value, json!(8));
    assert_eq!(context.get("doubled"), Some(&json!(true)));
}

#[test]
fn failure_reports_pipeline_step_position_and_cause() {
    let document = parse_document(indoc! {"
        pipeline:
          name: doomed
          steps:
            - type: add_one
            - type: explode
            - type: add_one
    "})
    .unwrap();

    let pipeline = build_pipeline(document, &arithmetic_registry()).unwrap();
    let err = pipeline.run(json!(1)).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Pipeline 'doomed' failed at step 2/3 (explode): intentional failure"
    );
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = arithmetic_registry();
    let err = registry
        .register::<AddOne>("add_one", "again")
        .unwrap_err();
    assert!(err.to_string().contains("add_one"));
    assert!(err.to_string().contains("already registered"));
}

#[test]
fn unknown_identifier_names_the_known_ones() {
    let document = parse_document(indoc! {"
        pipeline:
          steps:
            - type: transmogrify
    "})
    .unwrap();

    let err = build_pipeline(document, &arithmetic_registry()).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("Unknown step type 'transmogrify' at position 1"));
    assert!(msg.contains("add_one, explode, multiply_by_two"));
}

#[test]
fn missing_steps_key_is_reported() {
    let document = parse_document("pipeline:\n  name: empty\n").unwrap();
    let err = build_pipeline(document, &arithmetic_registry()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey { key: "steps" }));
}

#[test]
fn builtin_catalog_runs_a_file_pipeline_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.txt");
    let output = dir.path().join("report.txt");
    fs::write(&input, "alpha ERROR one\nbeta ok\ngamma ERROR two\n").unwrap();

    let config = formatdoc! {"
        pipeline:
          name: error_digest
          steps:
            - type: read_file
              path: {input}
            - type: grep
              pattern: ERROR
            - type: join_lines
            - type: write_file
              path: {output}
        ",
        input = input.display(),
        output = output.display(),
    };
    let config_path = dir.path().join("pipeline.yml");
    fs::write(&config_path, config).unwrap();

    let registry = StepRegistry::with_builtins().unwrap();
    let document = load_document(&config_path).unwrap();
    let pipeline = build_pipeline(document, &registry).unwrap();

    let (value, context) = pipeline.run(Value::Null).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written, "alpha ERROR one\ngamma ERROR two");
    assert_eq!(context.get("match_count"), Some(&json!(2)));
    // write_file returns the resolved output path.
    assert_eq!(
        value.as_str().map(|p| p.ends_with("report.txt")),
        Some(true)
    );
}

#[test]
fn builtin_catalog_handles_structured_data() {
    let config = indoc! {r#"
        pipeline:
          name: people
          steps:
            - type: parse_json
            - type: filter_data
              field: age
              condition: gt
              value: 30
            - type: to_csv
    "#};

    let registry = StepRegistry::with_builtins().unwrap();
    let document = parse_document(config).unwrap();
    let pipeline = build_pipeline(document, &registry).unwrap();

    let payload = r#"[{"name": "ada", "age": 36}, {"name": "joan", "age": 24}]"#;
    let (value, context) = pipeline.run(json!(payload)).unwrap();

    assert_eq!(value, json!("age,name\n36,ada\n"));
    assert_eq!(context.get("output_count"), Some(&json!(1)));
}

proptest! {
    /// A chain of k add_one steps is exactly +k, whatever the start value.
    #[test]
    fn prop_chained_increments_sum(start in -1000i64..1000, count in 1usize..20) {
        let mut config = String::from("pipeline:\n  steps:\n");
        for _ in 0..count {
            config.push_str("    - type: add_one\n");
        }

        let document = parse_document(&config).unwrap();
        let pipeline = build_pipeline(document, &arithmetic_registry()).unwrap();
        let (value, _) = pipeline.run(json!(start)).unwrap();
        prop_assert_eq!(value, json!(start + count as i64));
    }
}
