//! Sequential pipeline engine.
//!
//! Executes an ordered step sequence single-threaded and synchronously:
//! no skipping, no retry, no concurrency. The first failing step stops the
//! run and is reported with its position, type, and preserved cause.

use serde_json::Value;

use crate::error::PipelineError;
use crate::step::{Context, Step};

/// Name used when the config document does not set one.
pub const DEFAULT_PIPELINE_NAME: &str = "unnamed_pipeline";

/// An ordered, immutable sequence of steps executed left to right under one
/// shared context.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registered identifiers of the steps, in execution order.
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name()).collect()
    }

    /// The steps themselves, in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &dyn Step> {
        self.steps.iter().map(|step| step.as_ref())
    }

    /// Run with a fresh empty context, returning the final value together
    /// with the context the steps populated.
    pub fn run(&self, initial: Value) -> Result<(Value, Context), PipelineError> {
        let mut context = Context::new();
        let value = self.run_with_context(initial, &mut context)?;
        Ok((value, context))
    }

    /// Execute every step strictly in order, threading the data value
    /// through and sharing `context` by reference.
    ///
    /// The first step receives `initial`; the last step's return value is
    /// the pipeline's result. Blocks until all steps complete or one fails.
    pub fn run_with_context(
        &self,
        initial: Value,
        context: &mut Context,
    ) -> Result<Value, PipelineError> {
        let total = self.steps.len();
        log::info!("Running pipeline '{}' ({} steps)", self.name, total);

        let mut data = initial;
        for (index, step) in self.steps.iter().enumerate() {
            log::info!("Step {}/{}: {}", index + 1, total, step.name());
            data = step
                .run(data, context)
                .map_err(|source| PipelineError::StepFailed {
                    pipeline: self.name.clone(),
                    position: index + 1,
                    total,
                    step_type: step.name().to_string(),
                    source,
                })?;
        }

        log::info!("Pipeline '{}' completed", self.name);
        Ok(data)
    }
}
