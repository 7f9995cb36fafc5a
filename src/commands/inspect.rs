//! The `inspect` command: print a pipeline's resolved plan.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::config::{self, ConfigDocument};
use crate::error::ConfigError;
use crate::pipeline::DEFAULT_PIPELINE_NAME;
use crate::registry::StepRegistry;

/// Parse the config at `path` and print each declared step with its
/// registry description, without constructing or running anything.
pub fn inspect_config(path: &Path) -> Result<()> {
    let registry = StepRegistry::with_builtins()?;
    let document = config::load_document(path)?;
    for line in render_plan(&document, &registry)? {
        println!("{line}");
    }
    Ok(())
}

/// The plan as printable lines. Unknown or missing step types fail with the
/// same errors the loader would raise, so `inspect` predicts `run`.
fn render_plan(
    document: &ConfigDocument,
    registry: &StepRegistry,
) -> Result<Vec<String>, ConfigError> {
    let name = document.pipeline_name().unwrap_or(DEFAULT_PIPELINE_NAME);
    let outline = document.outline()?;

    let mut lines = vec![format!("Pipeline: {}", name.bold()), String::new()];
    for entry in &outline {
        let step_type = entry.step_type.as_deref().ok_or(ConfigError::MissingStepType {
            position: entry.position,
        })?;
        let registration =
            registry
                .get(step_type)
                .ok_or_else(|| ConfigError::UnknownStepType {
                    position: entry.position,
                    step_type: step_type.to_string(),
                    available: registry
                        .identifiers()
                        .iter()
                        .map(|id| id.to_string())
                        .collect(),
                })?;

        let mut line = format!(
            "{}. {}  -> {}",
            entry.position,
            step_type.cyan(),
            registration.description()
        );
        if let Some(ttl) = entry.cache_ttl_secs {
            line.push_str(&format!(" [cached {ttl}s]"));
        }
        lines.push(line);
    }
    lines.push(String::new());
    lines.push(format!("Total steps: {}", outline.len()));
    Ok(lines)
}
