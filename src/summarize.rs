//! Deterministic log summaries with optional LLM enhancement.
//!
//! The template summary is always produced from the aggregated statistics.
//! When the `use_llm` context flag is set and the provider environment is
//! complete, an LLM section is appended; every failure mode on that path
//! degrades to a simulated response, never to a pipeline error.

use std::env;
use std::time::Duration;

use serde_json::Value;

use crate::step::Context;

pub const PROVIDER_ENV: &str = "STEPLINE_LLM_PROVIDER";
pub const MODEL_ENV: &str = "STEPLINE_LLM_MODEL";
pub const API_KEY_ENV: &str = "STEPLINE_LLM_API_KEY";

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const LLM_TIMEOUT: Duration = Duration::from_secs(15);
const PROMPT_SNIPPET_LIMIT: usize = 2000;

/// Provider configuration resolved from the environment plus the
/// pipeline context's `use_llm` flag.
#[derive(Debug, Clone, Default)]
pub struct SummarySettings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub use_llm: bool,
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.is_empty())
}

impl SummarySettings {
    pub fn from_env(context: &Context) -> Self {
        Self {
            provider: non_empty(PROVIDER_ENV),
            model: non_empty(MODEL_ENV),
            api_key: non_empty(API_KEY_ENV),
            use_llm: matches!(context.get("use_llm"), Some(Value::Bool(true))),
        }
    }

    /// LLM output is produced only when the flag is set and the provider,
    /// model, and API key are all configured.
    pub fn enabled(&self) -> bool {
        self.use_llm && self.provider.is_some() && self.model.is_some() && self.api_key.is_some()
    }

    /// Names of the provider environment variables that are unset.
    pub fn missing_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.provider.is_none() {
            missing.push(PROVIDER_ENV);
        }
        if self.model.is_none() {
            missing.push(MODEL_ENV);
        }
        if self.api_key.is_none() {
            missing.push(API_KEY_ENV);
        }
        missing
    }
}

/// Summarize aggregated log statistics. The result is the deterministic
/// template summary, with an LLM section appended when enabled.
pub fn summarize_logs(stats: &Value, context: &Context) -> String {
    let settings = SummarySettings::from_env(context);
    let base = template_log_summary(stats);

    if !settings.enabled() {
        if settings.use_llm {
            let missing = settings.missing_vars();
            if !missing.is_empty() {
                log::warn!(
                    "LLM summary requested but missing configuration: {}. \
                     Falling back to the deterministic summary.",
                    missing.join(", ")
                );
            }
        } else {
            log::debug!("LLM summarization not enabled");
        }
        return base;
    }

    let rendered = serde_json::to_string(stats).unwrap_or_default();
    let snippet: String = rendered.chars().take(PROMPT_SNIPPET_LIMIT).collect();
    let prompt = format!(
        "You are summarizing system logs. Here are the aggregated stats as JSON:\n\
         {snippet}\n\nWrite a brief 2-3 sentence summary."
    );

    let llm_text = call_llm(
        settings.provider.as_deref().unwrap_or("unknown"),
        settings.api_key.as_deref().unwrap_or(""),
        settings.model.as_deref().unwrap_or("unknown"),
        &prompt,
    );
    format!("{base}\n\n---\n\n{llm_text}")
}

/// Data-driven summary: totals, dominant level, ERROR count when present,
/// and up to three sample entries.
pub fn template_log_summary(stats: &Value) -> String {
    let total = stats.get("total").and_then(Value::as_u64).unwrap_or(0);
    let empty = serde_json::Map::new();
    let by_level = stats
        .get("by_level")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut levels: Vec<(&String, u64)> = by_level
        .iter()
        .filter_map(|(name, count)| count.as_u64().map(|count| (name, count)))
        .collect();
    levels.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let dominant = levels
        .first()
        .map(|(name, _)| name.as_str())
        .unwrap_or("UNKNOWN");

    let mut lines = vec![
        format!(
            "The system emitted {total} log entries across {} levels.",
            by_level.len()
        ),
        format!("The dominant level appears to be {dominant}."),
    ];

    if let Some(errors) = by_level.get("ERROR").and_then(Value::as_u64) {
        lines.push(format!(
            "There are {errors} ERROR-level events that may need attention."
        ));
    }

    let samples: Vec<String> = stats
        .get("logs")
        .and_then(Value::as_array)
        .map(|logs| {
            logs.iter()
                .take(3)
                .map(|entry| {
                    let timestamp = entry.get("timestamp").and_then(Value::as_str).unwrap_or("?");
                    let level = entry.get("level").and_then(Value::as_str).unwrap_or("?");
                    let message: String = entry
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .chars()
                        .take(120)
                        .collect();
                    format!("- [{level}] {timestamp}: {message}")
                })
                .collect()
        })
        .unwrap_or_default();

    if !samples.is_empty() {
        lines.push("Recent notable entries:".to_string());
        lines.extend(samples);
    }

    lines.join("\n")
}

/// Call the configured provider. Only OpenRouter talks to the network;
/// other providers and every failure mode yield a simulated response.
/// Never fails.
fn call_llm(provider: &str, api_key: &str, model: &str, prompt: &str) -> String {
    if provider != "openrouter" {
        log::info!("LLM provider '{provider}' not implemented; returning simulated summary");
        return simulated_response(provider, model, prompt);
    }

    log::info!("Calling OpenRouter with model={model}");
    let result = reqwest::blocking::Client::builder()
        .timeout(LLM_TIMEOUT)
        .build()
        .and_then(|client| {
            client
                .post(OPENROUTER_URL)
                .header("Authorization", format!("Bearer {api_key}"))
                .header("X-Title", "stepline")
                .json(&serde_json::json!({
                    "model": model,
                    "messages": [{"role": "user", "content": prompt}],
                }))
                .send()
        });

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            log::warn!("OpenRouter call failed ({e}); falling back to simulated summary");
            return simulated_response(provider, model, prompt);
        }
    };

    if !response.status().is_success() {
        log::warn!(
            "OpenRouter call failed with status {}; falling back to simulated summary",
            response.status()
        );
        return simulated_response(provider, model, prompt);
    }

    let body: Value = match response.json() {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Failed to parse OpenRouter response ({e}); falling back to simulated summary");
            return simulated_response(provider, model, prompt);
        }
    };

    match body
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => content.to_string(),
        _ => {
            log::warn!("OpenRouter response missing content; using simulated summary");
            simulated_response(provider, model, prompt)
        }
    }
}

fn simulated_response(provider: &str, model: &str, prompt: &str) -> String {
    let model = if model.is_empty() { "unknown" } else { model };
    format!(
        "[Simulated LLM summary via {provider}:{model} based on: {}]",
        shorten(prompt, 400)
    )
}

/// Collapse whitespace and cut at a word boundary so the result, including
/// the ` ...` placeholder, fits in `width` characters.
fn shorten(text: &str, width: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let placeholder = " ...";
    let budget = width.saturating_sub(placeholder.len());
    let mut taken = 0usize;
    let mut out = String::new();
    for word in collapsed.split(' ') {
        let cost = word.chars().count() + usize::from(!out.is_empty());
        if taken + cost > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        taken += cost;
    }
    out.push_str(placeholder);
    out
}
