//! The `run` command: build a pipeline from a config file and execute it.

use std::path::PathBuf;

use anyhow::{anyhow, Context as _, Result};
use colored::Colorize;
use serde_json::Value;

use crate::cache::{CacheLocation, CacheStore};
use crate::config::{self, ConfigDocument};
use crate::pipeline::DEFAULT_PIPELINE_NAME;
use crate::registry::StepRegistry;
use crate::step::Context;
use crate::summarize::SummarySettings;

/// Everything the `run` command needs, mirroring its CLI flags.
#[derive(Debug)]
pub struct RunConfig {
    pub config: PathBuf,
    pub input_json: Option<String>,
    pub context: Vec<String>,
    pub use_llm: bool,
    pub dry_run: bool,
    pub cache_dir: Option<PathBuf>,
    pub shared_cache: bool,
}

pub fn run_pipeline(config: RunConfig) -> Result<()> {
    let registry = StepRegistry::with_builtins()?;
    let location = CacheLocation::from_cli(config.cache_dir.clone(), config.shared_cache);
    let store = CacheStore::new(location.resolve());

    let document = config::load_document(&config.config)?;

    if config.dry_run {
        return dry_run(document, &registry, &store);
    }

    let initial = parse_initial_data(config.input_json.as_deref())?;
    let mut context = seed_context(&config.context, config.use_llm)?;
    if config.use_llm {
        report_llm_configuration(&context);
    }

    let pipeline = config::build_pipeline_with_cache(document, &registry, &store)?;

    println!("Running pipeline '{}'...", pipeline.name());
    println!();

    let result = pipeline.run_with_context(initial, &mut context)?;

    println!();
    println!("{}", "Pipeline completed successfully!".green());
    if let Some(rendered) = render_simple_result(&result) {
        println!("Final result: {rendered}");
    }
    Ok(())
}

/// Construct every step (so argument errors surface) and describe the plan
/// without running anything.
fn dry_run(document: ConfigDocument, registry: &StepRegistry, store: &CacheStore) -> Result<()> {
    let name = document
        .pipeline_name()
        .unwrap_or(DEFAULT_PIPELINE_NAME)
        .to_string();
    let outline = document.outline()?;
    config::build_pipeline_with_cache(document, registry, store)?;

    println!(
        "{}",
        "NOTE: This is a dry run; no step will be executed.".yellow()
    );
    println!();
    println!("Dry run: {}", name.bold());
    println!();
    for entry in &outline {
        let step_type = entry.step_type.as_deref().unwrap_or("?");
        let description = registry
            .get(step_type)
            .map(|reg| reg.description())
            .unwrap_or_default();
        println!("Step {}: {}", entry.position, step_type.cyan());
        println!("  - Description: {description}");
        if !entry.args.is_empty() {
            println!("  - Arguments: {}", entry.args.join(", "));
        }
        if let Some(ttl) = entry.cache_ttl_secs {
            println!("  - Cached: {ttl}s TTL");
        }
        println!();
    }
    println!("Total steps: {}", outline.len());
    println!();
    println!("Dry run complete. Use 'run' without --dry-run to execute.");
    Ok(())
}

fn parse_initial_data(input_json: Option<&str>) -> Result<Value> {
    match input_json {
        None => Ok(Value::Null),
        Some(text) => serde_json::from_str(text)
            .with_context(|| format!("Invalid --input-json value: {text}")),
    }
}

/// Seed the context from `KEY=VALUE` flags. Values parse as JSON so
/// `retries=3` lands as a number; anything unparsable stays a string.
fn seed_context(pairs: &[String], use_llm: bool) -> Result<Context> {
    let mut context = Context::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --context entry '{pair}', expected KEY=VALUE"))?;
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    if use_llm {
        context.insert("use_llm".to_string(), Value::Bool(true));
    }
    Ok(context)
}

fn report_llm_configuration(context: &Context) {
    let settings = SummarySettings::from_env(context);
    if settings.enabled() {
        log::info!(
            "LLM summaries enabled with provider '{}'",
            settings.provider.as_deref().unwrap_or("unknown")
        );
    } else {
        let missing = settings.missing_vars().join(", ");
        eprintln!(
            "{}",
            format!("--use-llm specified but {missing} not set").yellow()
        );
        eprintln!("{}", "Falling back to deterministic summaries".yellow());
    }
}

/// Scalars are worth echoing; objects and arrays usually went to a file or
/// are too large for a one-line footer.
fn render_simple_result(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Object(_) | Value::Array(_) => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
