//! Text steps: grep, replace, split, join, templating, case mapping.

use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::step::{Context, Step};
use crate::steps::{render_text, text_lines};

fn default_true() -> bool {
    true
}

/// Keep (or with `invert`, drop) lines matching a regex. Accepts text or a
/// list of lines. Context: `match_count`, `total_lines`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Grep {
    pub pattern: String,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub invert: bool,
}

impl Step for Grep {
    fn name(&self) -> &'static str {
        "grep"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let lines = text_lines(&data)?;
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(!self.case_sensitive)
            .build()
            .with_context(|| format!("Invalid pattern '{}'", self.pattern))?;

        let matches: Vec<&String> = lines
            .iter()
            .filter(|line| regex.is_match(line) != self.invert)
            .collect();

        context.insert("match_count".to_string(), json!(matches.len()));
        context.insert("total_lines".to_string(), json!(lines.len()));
        log::info!(
            "Matched {} of {} lines against '{}'",
            matches.len(),
            lines.len(),
            self.pattern
        );

        Ok(json!(matches))
    }
}

/// Regex substitution over the stringified payload. `count` caps the number
/// of replacements; 0 means all. Context: `replacement_count`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Replace {
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub count: usize,
}

impl Step for Replace {
    fn name(&self) -> &'static str {
        "replace"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let text = render_text(&data);
        let regex = Regex::new(&self.pattern)
            .with_context(|| format!("Invalid pattern '{}'", self.pattern))?;

        let matches = regex.find_iter(&text).count();
        let replaced = if self.count == 0 {
            matches
        } else {
            matches.min(self.count)
        };
        let result = regex.replacen(&text, self.count, self.replacement.as_str());

        context.insert("replacement_count".to_string(), json!(replaced));
        log::info!("Made {replaced} replacements of '{}'", self.pattern);

        Ok(json!(result.into_owned()))
    }
}

/// Split text into lines. Context: `line_count`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitLines {
    #[serde(default = "default_true")]
    pub strip: bool,
    #[serde(default)]
    pub skip_empty: bool,
}

impl Step for SplitLines {
    fn name(&self) -> &'static str {
        "split_lines"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let text = render_text(&data);
        let lines: Vec<String> = text
            .lines()
            .map(|line| {
                if self.strip {
                    line.trim().to_string()
                } else {
                    line.to_string()
                }
            })
            .filter(|line| !self.skip_empty || !line.is_empty())
            .collect();

        context.insert("line_count".to_string(), json!(lines.len()));
        Ok(json!(lines))
    }
}

/// Join a list of lines with a separator. Context: `line_count`,
/// `output_length`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinLines {
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "\n".to_string()
}

impl Step for JoinLines {
    fn name(&self) -> &'static str {
        "join_lines"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let lines = text_lines(&data)?;
        let result = lines.join(&self.separator);

        context.insert("line_count".to_string(), json!(lines.len()));
        context.insert("output_length".to_string(), json!(result.len()));

        Ok(json!(result))
    }
}

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());

/// Render a `{placeholder}` template from an object payload. A non-object
/// payload is bound to the single name `data`. Placeholders without a
/// matching field are left intact.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    pub template: String,
}

impl Step for Template {
    fn name(&self) -> &'static str {
        "template"
    }

    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        let variables = match data {
            Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };

        let rendered = PLACEHOLDER.replace_all(&self.template, |caps: &regex::Captures| {
            match variables.get(&caps[1]) {
                Some(value) => render_text(value),
                None => caps[0].to_string(),
            }
        });

        Ok(json!(rendered.into_owned()))
    }
}

/// Uppercase the stringified payload.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToUppercase {}

impl Step for ToUppercase {
    fn name(&self) -> &'static str {
        "to_uppercase"
    }

    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        Ok(json!(render_text(&data).to_uppercase()))
    }
}

/// Lowercase the stringified payload.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToLowercase {}

impl Step for ToLowercase {
    fn name(&self) -> &'static str {
        "to_lowercase"
    }

    fn run(&self, data: Value, _context: &mut Context) -> Result<Value> {
        Ok(json!(render_text(&data).to_lowercase()))
    }
}
