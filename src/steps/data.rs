//! Structured-data steps: JSON, YAML, CSV, and record filtering.

use std::cmp::Ordering;

use anyhow::{anyhow, bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{json, Value};

use crate::step::{Context, Step};
use crate::steps::render_text;

/// Parse a JSON string into structured data.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseJson {}

impl Step for ParseJson {
    fn name(&self) -> &'static str {
        "parse_json"
    }

    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        let text = data
            .as_str()
            .ok_or_else(|| anyhow!("parse_json expects a JSON string as input"))?;
        let parsed = serde_json::from_str(text).context("Failed to parse JSON input")?;
        Ok(parsed)
    }
}

/// Serialize the payload to JSON text. `indent: 0` produces the compact
/// form. Context: `output_size`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToJson {
    #[serde(default = "default_indent")]
    pub indent: usize,
}

fn default_indent() -> usize {
    2
}

impl Step for ToJson {
    fn name(&self) -> &'static str {
        "to_json"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let result = if self.indent == 0 {
            serde_json::to_string(&data)?
        } else {
            let indent = " ".repeat(self.indent);
            let mut buf = Vec::new();
            let mut ser =
                Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
            data.serialize(&mut ser)?;
            String::from_utf8(buf)?
        };

        context.insert("output_size".to_string(), json!(result.len()));
        Ok(json!(result))
    }
}

/// Parse a YAML string into structured data.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseYaml {}

impl Step for ParseYaml {
    fn name(&self) -> &'static str {
        "parse_yaml"
    }

    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        let text = data
            .as_str()
            .ok_or_else(|| anyhow!("parse_yaml expects a YAML string as input"))?;
        let parsed = serde_yaml::from_str(text).context("Failed to parse YAML input")?;
        Ok(parsed)
    }
}

/// Serialize the payload to YAML text. Context: `output_size`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToYaml {}

impl Step for ToYaml {
    fn name(&self) -> &'static str {
        "to_yaml"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let result = serde_yaml::to_string(&data)?;
        context.insert("output_size".to_string(), json!(result.len()));
        Ok(json!(result))
    }
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn delimiter_byte(delimiter: &str) -> Result<u8> {
    match delimiter.as_bytes() {
        [byte] => Ok(*byte),
        _ => bail!("Delimiter must be a single character, got '{delimiter}'"),
    }
}

/// Parse CSV text. With a header row the output is a list of objects,
/// without one a list of string arrays. Context: `row_count`,
/// `column_count`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseCsv {
    #[serde(default = "default_has_header")]
    pub has_header: bool,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_has_header() -> bool {
    true
}

impl Step for ParseCsv {
    fn name(&self) -> &'static str {
        "parse_csv"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let text = data
            .as_str()
            .ok_or_else(|| anyhow!("parse_csv expects CSV text as input"))?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(self.has_header)
            .delimiter(delimiter_byte(&self.delimiter)?)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        if self.has_header {
            let headers = reader.headers().context("Failed to read CSV header")?.clone();
            for record in reader.records() {
                let record = record.context("Failed to parse CSV row")?;
                let row: serde_json::Map<String, Value> = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(name, field)| (name.to_string(), json!(field)))
                    .collect();
                rows.push(Value::Object(row));
            }
            if !rows.is_empty() {
                context.insert("column_count".to_string(), json!(headers.len()));
            }
        } else {
            for record in reader.records() {
                let record = record.context("Failed to parse CSV row")?;
                rows.push(json!(record.iter().collect::<Vec<_>>()));
            }
        }

        context.insert("row_count".to_string(), json!(rows.len()));
        log::info!("Parsed {} CSV rows", rows.len());
        Ok(Value::Array(rows))
    }
}

/// Serialize a list of records to CSV text with a header row taken from the
/// first record's fields. Context: `row_count`, `output_size`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToCsv {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Step for ToCsv {
    fn name(&self) -> &'static str {
        "to_csv"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let rows = match &data {
            Value::Array(rows) => rows,
            other => bail!("to_csv expects a list of records, found {other}"),
        };

        if rows.is_empty() {
            context.insert("row_count".to_string(), json!(0));
            context.insert("output_size".to_string(), json!(0));
            return Ok(json!(""));
        }

        let headers: Vec<String> = rows[0]
            .as_object()
            .ok_or_else(|| anyhow!("to_csv expects object records"))?
            .keys()
            .cloned()
            .collect();

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter_byte(&self.delimiter)?)
            .from_writer(Vec::new());
        writer.write_record(&headers)?;
        for row in rows {
            let record = row
                .as_object()
                .ok_or_else(|| anyhow!("to_csv expects object records"))?;
            let fields: Vec<String> = headers
                .iter()
                .map(|name| match record.get(name) {
                    None | Some(Value::Null) => String::new(),
                    Some(value) => render_text(value),
                })
                .collect();
            writer.write_record(&fields)?;
        }

        let result = String::from_utf8(
            writer
                .into_inner()
                .map_err(|e| anyhow!("Failed to finalize CSV output: {e}"))?,
        )?;

        context.insert("row_count".to_string(), json!(rows.len()));
        context.insert("output_size".to_string(), json!(result.len()));
        Ok(json!(result))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCondition {
    #[default]
    Equals,
    Contains,
    Gt,
    Lt,
    Exists,
}

/// Keep records whose `field` satisfies the condition. Context:
/// `input_count`, `output_count`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterData {
    pub field: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub condition: FilterCondition,
}

impl Step for FilterData {
    fn name(&self) -> &'static str {
        "filter_data"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let items = match data {
            Value::Array(items) => items,
            other => bail!("filter_data expects a list of records, found {other}"),
        };
        let input_count = items.len();

        let mut kept = Vec::new();
        for item in items {
            let record = item
                .as_object()
                .ok_or_else(|| anyhow!("filter_data expects object records"))?;
            let field_value = record.get(&self.field);
            let wanted = self.value.as_ref();

            let keep = match self.condition {
                FilterCondition::Equals => {
                    field_value.unwrap_or(&Value::Null) == wanted.unwrap_or(&Value::Null)
                }
                FilterCondition::Contains => {
                    let needle = wanted.map(render_text).unwrap_or_default();
                    field_value
                        .map(render_text)
                        .unwrap_or_default()
                        .contains(&needle)
                }
                FilterCondition::Gt => {
                    compare_values(field_value, wanted) == Some(Ordering::Greater)
                }
                FilterCondition::Lt => compare_values(field_value, wanted) == Some(Ordering::Less),
                FilterCondition::Exists => field_value.is_some(),
            };
            if keep {
                kept.push(item);
            }
        }

        context.insert("input_count".to_string(), json!(input_count));
        context.insert("output_count".to_string(), json!(kept.len()));
        log::info!("Kept {} of {} records", kept.len(), input_count);

        Ok(Value::Array(kept))
    }
}

/// Numbers compare numerically, strings lexically; mixed or missing
/// operands do not compare at all.
fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Option<Ordering> {
    let (left, right) = (left?, right?);
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return l.partial_cmp(&r);
    }
    if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
        return Some(l.cmp(r));
    }
    None
}
