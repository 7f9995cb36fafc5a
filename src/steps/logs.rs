//! Log-processing steps: parse timestamped lines, redact sensitive data,
//! aggregate per-level statistics, and render markdown reports.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::paths::validate_file_path;
use crate::step::{Context, Step};
use crate::steps::file::ensure_parent_dir;
use crate::steps::text_lines;
use crate::summarize;

// Matches `YYYY-MM-DD HH:MM:SS [LEVEL] message`.
static LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})\s+\[(\w+)\]\s+(.+)$").unwrap()
});
static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+").unwrap());
static IPV4: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap());

/// Parse raw log lines into `{timestamp, level, message}` entries.
/// Unparseable lines are skipped with a debug log. Context:
/// `parsed_count`, `skipped_count`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseLogs {}

impl Step for ParseLogs {
    fn name(&self) -> &'static str {
        "parse_logs"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let lines = text_lines(&data)?;

        let mut parsed = Vec::new();
        let mut skipped = 0usize;
        for line in &lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match LOG_LINE.captures(line) {
                Some(caps) => parsed.push(json!({
                    "timestamp": &caps[1],
                    "level": &caps[2],
                    "message": &caps[3],
                })),
                None => {
                    skipped += 1;
                    log::debug!(
                        "Skipped unparseable line: {}",
                        line.chars().take(50).collect::<String>()
                    );
                }
            }
        }

        context.insert("parsed_count".to_string(), json!(parsed.len()));
        context.insert("skipped_count".to_string(), json!(skipped));
        log::info!("Parsed {} log entries, skipped {}", parsed.len(), skipped);

        Ok(Value::Array(parsed))
    }
}

/// Redact email addresses and IPv4 addresses in entry messages. Context:
/// `anonymized_count` (entries that changed).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnonymizeLogs {}

fn redact(message: &str) -> String {
    let without_emails = EMAIL.replace_all(message, "[REDACTED]");
    IPV4.replace_all(&without_emails, "[REDACTED]").into_owned()
}

impl Step for AnonymizeLogs {
    fn name(&self) -> &'static str {
        "anonymize_logs"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let entries = match data {
            Value::Array(entries) => entries,
            other => bail!("anonymize_logs expects a list of log entries, found {other}"),
        };

        let mut anonymized = 0usize;
        let mut out = Vec::with_capacity(entries.len());
        for mut entry in entries {
            let record = entry
                .as_object_mut()
                .ok_or_else(|| anyhow!("anonymize_logs expects object entries"))?;
            let message = record
                .get("message")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("log entry is missing a 'message' field"))?
                .to_string();

            let redacted = redact(&message);
            if redacted != message {
                anonymized += 1;
            }
            record.insert("message".to_string(), Value::String(redacted));
            out.push(entry);
        }

        context.insert("anonymized_count".to_string(), json!(anonymized));
        log::info!("Anonymized {anonymized} log entries");

        Ok(Value::Array(out))
    }
}

/// Fold entries into `{total, by_level, logs}` statistics. Context:
/// `error_count` (ERROR-level entries).
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateErrors {}

impl Step for AggregateErrors {
    fn name(&self) -> &'static str {
        "aggregate_errors"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let entries = match data {
            Value::Array(entries) => entries,
            other => bail!("aggregate_errors expects a list of log entries, found {other}"),
        };

        let mut by_level: BTreeMap<String, u64> = BTreeMap::new();
        for entry in &entries {
            let level = entry
                .get("level")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("log entry is missing a 'level' field"))?;
            *by_level.entry(level.to_string()).or_insert(0) += 1;
        }

        let error_count = by_level.get("ERROR").copied().unwrap_or(0);
        context.insert("error_count".to_string(), json!(error_count));
        log::info!(
            "Aggregated {} entries across {} levels",
            entries.len(),
            by_level.len()
        );

        Ok(json!({
            "total": entries.len(),
            "by_level": by_level,
            "logs": entries,
        }))
    }
}

/// Render the aggregated statistics as a markdown report file and pass the
/// statistics through. Context: `report_path`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteMarkdownReport {
    pub output_path: String,
}

fn render_report(stats: &serde_json::Map<String, Value>) -> String {
    let total = stats.get("total").and_then(Value::as_u64).unwrap_or(0);

    let mut lines = vec![
        "# Log Report".to_string(),
        String::new(),
        format!("Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        format!("**Total log entries:** {total}"),
        String::new(),
        "## Counts by Level".to_string(),
        String::new(),
        "| Level | Count |".to_string(),
        "|-------|-------|".to_string(),
    ];

    if let Some(by_level) = stats.get("by_level").and_then(Value::as_object) {
        let mut levels: Vec<_> = by_level.iter().collect();
        levels.sort_by_key(|(level, _)| level.as_str());
        for (level, count) in levels {
            lines.push(format!("| {level} | {count} |"));
        }
    }

    lines.push(String::new());
    lines.push("## Sample Messages".to_string());
    lines.push(String::new());
    if let Some(logs) = stats.get("logs").and_then(Value::as_array) {
        for entry in logs.iter().take(5) {
            let level = entry.get("level").and_then(Value::as_str).unwrap_or("?");
            let timestamp = entry.get("timestamp").and_then(Value::as_str).unwrap_or("?");
            let message = entry.get("message").and_then(Value::as_str).unwrap_or("");
            lines.push(format!("- **[{level}]** {timestamp}: {message}"));
        }
    }
    lines.push(String::new());

    lines.join("\n")
}

impl Step for WriteMarkdownReport {
    fn name(&self) -> &'static str {
        "write_markdown_report"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let stats = data
            .as_object()
            .ok_or_else(|| anyhow!("write_markdown_report expects aggregated statistics"))?;

        let report = render_report(stats);
        let path = validate_file_path(&self.output_path, false)?;
        ensure_parent_dir(&path)?;
        fs::write(&path, report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        context.insert("report_path".to_string(), json!(path.display().to_string()));
        log::info!("Report written to {}", path.display());

        Ok(data)
    }
}

/// Append a generated summary section to an existing report and pass the
/// statistics through. Context: `llm_summary`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSummary {
    pub output_path: String,
}

impl Step for LogSummary {
    fn name(&self) -> &'static str {
        "log_summary"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        if !data.is_object() {
            bail!("log_summary expects aggregated statistics");
        }

        let summary = summarize::summarize_logs(&data, context);

        let path = validate_file_path(&self.output_path, false)?;
        ensure_parent_dir(&path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {} for append", path.display()))?;
        write!(file, "\n## AI Summary\n\n{summary}\n")
            .with_context(|| format!("Failed to append summary to {}", path.display()))?;

        context.insert("llm_summary".to_string(), json!(summary));
        log::info!("Summary appended to {}", path.display());

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn raw_lines() -> Value {
        json!([
            "2025-01-01 10:00:00 [INFO] Service started",
            "2025-01-01 10:00:05 [ERROR] Login failed for admin@example.com",
            "not a log line at all",
            "",
            "2025-01-01 10:00:09 [ERROR] Connection from 10.0.0.5 dropped",
        ])
    }

    fn parsed_entries() -> Value {
        ParseLogs::default().run(raw_lines(), &mut Context::new()).unwrap()
    }

    #[test]
    fn parse_logs_extracts_structured_entries() {
        let mut ctx = Context::new();
        let out = ParseLogs::default().run(raw_lines(), &mut ctx).unwrap();

        let entries = out.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            json!({
                "timestamp": "2025-01-01 10:00:00",
                "level": "INFO",
                "message": "Service started",
            })
        );
        assert_eq!(ctx.get("parsed_count"), Some(&json!(3)));
        // Blank lines are ignored, not counted as skipped.
        assert_eq!(ctx.get("skipped_count"), Some(&json!(1)));
    }

    #[test]
    fn parse_logs_accepts_raw_text_too() {
        let text = json!("2025-02-02 09:00:00 [WARN] Disk almost full");
        let out = ParseLogs::default().run(text, &mut Context::new()).unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);
    }

    #[test]
    fn anonymize_redacts_emails_and_ips() {
        let mut ctx = Context::new();
        let out = AnonymizeLogs::default()
            .run(parsed_entries(), &mut ctx)
            .unwrap();

        let entries = out.as_array().unwrap();
        assert_eq!(
            entries[1].get("message"),
            Some(&json!("Login failed for [REDACTED]"))
        );
        assert_eq!(
            entries[2].get("message"),
            Some(&json!("Connection from [REDACTED] dropped"))
        );
        // The first entry had nothing to redact.
        assert_eq!(ctx.get("anonymized_count"), Some(&json!(2)));
    }

    #[test]
    fn anonymize_requires_message_fields() {
        let err = AnonymizeLogs::default()
            .run(json!([{"level": "INFO"}]), &mut Context::new())
            .unwrap_err();
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn aggregate_counts_by_level() {
        let mut ctx = Context::new();
        let out = AggregateErrors::default()
            .run(parsed_entries(), &mut ctx)
            .unwrap();

        assert_eq!(out.get("total"), Some(&json!(3)));
        assert_eq!(
            out.get("by_level"),
            Some(&json!({"ERROR": 2, "INFO": 1}))
        );
        assert_eq!(out.get("logs").unwrap().as_array().unwrap().len(), 3);
        assert_eq!(ctx.get("error_count"), Some(&json!(2)));
    }

    fn stats() -> Value {
        AggregateErrors::default()
            .run(parsed_entries(), &mut Context::new())
            .unwrap()
    }

    #[test]
    fn markdown_report_contains_table_and_samples() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        let step = WriteMarkdownReport {
            output_path: path.to_string_lossy().into_owned(),
        };

        let mut ctx = Context::new();
        let input = stats();
        let out = step.run(input.clone(), &mut ctx).unwrap();

        // Statistics pass through unchanged.
        assert_eq!(out, input);

        let report = fs::read_to_string(&path).unwrap();
        assert!(report.starts_with("# Log Report"));
        assert!(report.contains("**Total log entries:** 3"));
        assert!(report.contains("| ERROR | 2 |"));
        assert!(report.contains("| INFO | 1 |"));
        assert!(report.contains("- **[INFO]** 2025-01-01 10:00:00: Service started"));
        assert!(report.contains("Generated: "));
        assert!(ctx.get("report_path").unwrap().as_str().unwrap().ends_with("report.md"));
    }

    #[test]
    fn report_rejects_non_object_input() {
        let step = WriteMarkdownReport {
            output_path: "unused.md".to_string(),
        };
        assert!(step.run(json!([1, 2]), &mut Context::new()).is_err());
    }

    #[test]
    fn log_summary_appends_section_and_records_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        fs::write(&path, "# Log Report\n").unwrap();

        let step = LogSummary {
            output_path: path.to_string_lossy().into_owned(),
        };
        let mut ctx = Context::new();
        let out = step.run(stats(), &mut ctx).unwrap();

        assert!(out.is_object());
        let report = fs::read_to_string(&path).unwrap();
        assert!(report.starts_with("# Log Report\n"));
        assert!(report.contains("\n## AI Summary\n"));
        assert!(report.contains("log entries across"));

        let summary = ctx.get("llm_summary").unwrap().as_str().unwrap();
        assert!(summary.contains("2 ERROR-level events"));
    }
}
