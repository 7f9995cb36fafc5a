//! Built-in step catalog.
//!
//! Every step here is a plain deserializable struct whose fields are its
//! named constructor arguments; `deny_unknown_fields` turns misspelled
//! config keys into construction errors. [`register_builtins`] wires the
//! whole catalog into a registry.

pub mod data;
pub mod file;
pub mod http;
pub mod logs;
pub mod text;

use anyhow::{bail, Result};
use serde_json::Value;

use crate::error::RegistryError;
use crate::registry::StepRegistry;

/// Register the full built-in catalog into `registry`.
pub fn register_builtins(registry: &mut StepRegistry) -> Result<(), RegistryError> {
    registry.register::<file::ReadFile>("read_file", "Read a file and return its contents")?;
    registry.register::<file::WriteFile>("write_file", "Write data to a file")?;
    registry.register::<file::CopyFile>("copy_file", "Copy a file to a new location")?;
    registry.register::<file::MoveFile>("move_file", "Move or rename a file")?;
    registry.register::<file::DeleteFile>("delete_file", "Delete a file")?;
    registry.register::<file::ListFiles>(
        "list_files",
        "List files in a directory matching a glob pattern",
    )?;

    registry.register::<text::Grep>("grep", "Keep lines matching a regex pattern")?;
    registry.register::<text::Replace>("replace", "Replace text using a regex")?;
    registry.register::<text::SplitLines>("split_lines", "Split text into lines")?;
    registry.register::<text::JoinLines>("join_lines", "Join lines into a single string")?;
    registry.register::<text::Template>(
        "template",
        "Render a template with {placeholder} substitution",
    )?;
    registry.register::<text::ToUppercase>("to_uppercase", "Convert text to uppercase")?;
    registry.register::<text::ToLowercase>("to_lowercase", "Convert text to lowercase")?;

    registry.register::<data::ParseJson>("parse_json", "Parse a JSON string into structured data")?;
    registry.register::<data::ToJson>("to_json", "Serialize data to a JSON string")?;
    registry.register::<data::ParseYaml>("parse_yaml", "Parse a YAML string into structured data")?;
    registry.register::<data::ToYaml>("to_yaml", "Serialize data to a YAML string")?;
    registry.register::<data::ParseCsv>("parse_csv", "Parse CSV text into a list of rows")?;
    registry.register::<data::ToCsv>("to_csv", "Serialize a list of records to CSV text")?;
    registry.register::<data::FilterData>(
        "filter_data",
        "Filter a list of records by a field condition",
    )?;

    registry.register::<http::HttpGet>("http_get", "Make an HTTP GET request")?;
    registry.register::<http::HttpPost>("http_post", "Make an HTTP POST request with a JSON body")?;
    registry.register::<http::DownloadFile>("download_file", "Download a file from a URL")?;
    registry.register::<http::Webhook>("webhook", "Send a JSON payload to a webhook URL")?;

    registry.register::<logs::ParseLogs>(
        "parse_logs",
        "Parse timestamped log lines into structured entries",
    )?;
    registry.register::<logs::AnonymizeLogs>(
        "anonymize_logs",
        "Redact emails and IPv4 addresses in log messages",
    )?;
    registry.register::<logs::AggregateErrors>(
        "aggregate_errors",
        "Aggregate log entries into per-level statistics",
    )?;
    registry.register::<logs::WriteMarkdownReport>(
        "write_markdown_report",
        "Write a markdown report from log statistics",
    )?;
    registry.register::<logs::LogSummary>(
        "log_summary",
        "Append a generated summary to a log report",
    )?;

    Ok(())
}

/// Text form of a payload: strings pass through, everything else is
/// rendered as compact JSON.
pub(crate) fn render_text(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Payload as a list of lines: text is split, a list of strings is taken
/// as-is, anything else is an error.
pub(crate) fn text_lines(data: &Value) -> Result<Vec<String>> {
    match data {
        Value::String(s) => Ok(s.lines().map(str::to_string).collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => bail!("expected a list of strings, found {other}"),
            })
            .collect(),
        other => bail!("expected text or a list of strings, found {other}"),
    }
}

/// A value from step config, falling back to a string payload.
pub(crate) fn configured_or_input<'a>(
    configured: Option<&'a str>,
    data: &'a Value,
    what: &str,
) -> Result<&'a str> {
    if let Some(value) = configured {
        return Ok(value);
    }
    match data.as_str() {
        Some(value) => Ok(value),
        None => bail!("No {what} provided via config or input data"),
    }
}
