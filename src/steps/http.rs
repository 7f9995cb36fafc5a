//! HTTP steps over a blocking client. The engine is synchronous, so steps
//! block for the duration of the request; every step carries its own
//! timeout.

use std::collections::BTreeMap;
use std::fs::File;
use std::time::Duration;

use anyhow::{Context as _, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::paths::validate_file_path;
use crate::step::{Context, Step};
use crate::steps::configured_or_input;
use crate::steps::file::ensure_parent_dir;

fn default_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    60
}

fn client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// GET a URL and return the response body. The URL comes from config or a
/// string payload. Context: `status_code`, `response_size`, `url`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpGet {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Step for HttpGet {
    fn name(&self) -> &'static str {
        "http_get"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let url = configured_or_input(self.url.as_deref(), &data, "URL")?;
        log::info!("GET {url}");

        let mut request = client(self.timeout_secs)?.get(url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .with_context(|| format!("GET {url} failed"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned an error status"))?;

        let status = response.status().as_u16();
        let body = response.text().context("Failed to read response body")?;

        context.insert("status_code".to_string(), json!(status));
        context.insert("response_size".to_string(), json!(body.len()));
        context.insert("url".to_string(), json!(url));
        log::info!("Response: {status} ({} bytes)", body.len());

        Ok(json!(body))
    }
}

/// POST a JSON body. The body comes from config or, when unset, from the
/// payload. Context: `status_code`, `response_size`, `url`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpPost {
    pub url: String,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Step for HttpPost {
    fn name(&self) -> &'static str {
        "http_post"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let body = self.body.clone().unwrap_or(data);
        log::info!("POST {}", self.url);

        let mut request = client(self.timeout_secs)?.post(&self.url).json(&body);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .with_context(|| format!("POST {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("POST {} returned an error status", self.url))?;

        let status = response.status().as_u16();
        let text = response.text().context("Failed to read response body")?;

        context.insert("status_code".to_string(), json!(status));
        context.insert("response_size".to_string(), json!(text.len()));
        context.insert("url".to_string(), json!(self.url));
        log::info!("Response: {status} ({} bytes)", text.len());

        Ok(json!(text))
    }
}

/// Download a URL to disk and return the file path. When `output_path` is
/// unset the filename comes from the last URL segment. Context:
/// `file_size`, `download_url`, `download_path`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadFile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
}

fn filename_from_url(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("download")
}

impl Step for DownloadFile {
    fn name(&self) -> &'static str {
        "download_file"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let url = configured_or_input(self.url.as_deref(), &data, "URL")?;
        let output_path = match &self.output_path {
            Some(path) => validate_file_path(path, false)?,
            None => validate_file_path(filename_from_url(url), false)?,
        };
        ensure_parent_dir(&output_path)?;

        log::info!("Downloading {url} -> {}", output_path.display());
        let mut response = client(self.timeout_secs)?
            .get(url)
            .send()
            .with_context(|| format!("Download of {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Download of {url} returned an error status"))?;

        let mut file = File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        let file_size = response
            .copy_to(&mut file)
            .context("Failed to write download to disk")?;

        context.insert("file_size".to_string(), json!(file_size));
        context.insert("download_url".to_string(), json!(url));
        context.insert(
            "download_path".to_string(),
            json!(output_path.display().to_string()),
        );
        log::info!("Downloaded {} bytes to {}", file_size, output_path.display());

        Ok(json!(output_path.display().to_string()))
    }
}

/// POST a payload to a webhook URL. Context: `status_code`, `webhook_url`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Webhook {
    pub url: String,
    #[serde(default)]
    pub payload: Option<Value>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Step for Webhook {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn run(&self, data: Value, context: &mut Context) -> Result<Value> {
        let payload = self.payload.clone().unwrap_or(data);
        log::info!("Sending webhook to {}", self.url);

        let response = client(self.timeout_secs)?
            .post(&self.url)
            .json(&payload)
            .send()
            .with_context(|| format!("Webhook to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("Webhook to {} returned an error status", self.url))?;

        let status = response.status().as_u16();
        context.insert("status_code".to_string(), json!(status));
        context.insert("webhook_url".to_string(), json!(self.url));
        log::info!("Webhook sent: {status}");

        response.text().map(|text| json!(text)).context("Failed to read response body")
    }
}
