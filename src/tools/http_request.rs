//! HTTP request tool: lets the agent call web pages and REST APIs.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::utils::string::truncate_with_total;

use super::{parse_args, Tool};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_BUDGET: usize = 2000;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Deserialize)]
struct HttpRequestArgs {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    headers: Option<HashMap<String, String>>,
}

/// Tool that performs one HTTP request and returns the status and body.
///
/// HTML responses are reduced to their text; bodies over 2000 characters are
/// truncated.
pub struct HttpRequestTool {
    client: Client,
}

impl HttpRequestTool {
    /// Create a new `HttpRequestTool`.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpRequestTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    WHITESPACE_RE
        .replace_all(&without_tags, " ")
        .trim()
        .to_string()
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request. Returns status code and response body (truncated if long)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "URL to request."},
                "method": {
                    "type": "string",
                    "description": "HTTP method. Default: GET.",
                    "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"]
                },
                "body": {"type": "string", "description": "Request body (for POST/PUT/PATCH). Optional."},
                "headers": {"type": "object", "description": "Extra headers. Optional."}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let args: HttpRequestArgs = parse_args(self.name(), args)?;
        let method_name = args
            .method
            .as_deref()
            .unwrap_or("GET")
            .trim()
            .to_uppercase();
        let method = match Method::from_bytes(method_name.as_bytes()) {
            Ok(m) => m,
            Err(e) => return Ok(format!("❌ HTTP Error: {}", e)),
        };

        debug!(method = %method, url = %args.url, "HTTP request");
        let mut request = self.client.request(method, &args.url);
        if let Some(headers) = &args.headers {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
        }
        if let Some(body) = args.body {
            request = request.body(body);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Ok(format!("⏰ TIMEOUT requesting {}", args.url)),
            Err(e) => return Ok(format!("❌ HTTP Error: {}", e)),
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) if e.is_timeout() => return Ok(format!("⏰ TIMEOUT requesting {}", args.url)),
            Err(e) => return Ok(format!("❌ HTTP Error: {}", e)),
        };
        let text = if !content_type.contains("json") && content_type.contains("html") {
            strip_html(&body)
        } else {
            body
        };

        Ok(format!("HTTP {}\n{}", status, truncate_with_total(&text, BODY_BUDGET)))
    }
}
