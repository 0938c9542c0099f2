//! Shared HTTP client, SSE line splitting and status mapping.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::error::ChatError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout is set; streaming responses are bounded by the
/// orchestrator's response timeout instead.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// JSON headers, plus a bearer token when a key is configured.
pub fn bearer_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> ChatError {
    let message = error_message(body);
    match status {
        401 | 403 => ChatError::Authentication(message),
        404 if message.to_ascii_lowercase().contains("model") => ChatError::ModelNotFound(message),
        429 => ChatError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => ChatError::api(status, message),
    }
}

/// Prefer `error.message` from a JSON error body; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}

/// Default ceiling on one buffered SSE line.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into lines, holding partial lines across chunks.
///
/// A partial line longer than `max_line_bytes` is a stream error.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Bytes of `pending` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn with_limit(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    /// Append a chunk and return every completed, non-blank line.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ChatError> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(offset) = self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.pending[..end]).trim().to_string();
            self.pending.drain(..=end);
            self.scanned = 0;
            if !line.is_empty() {
                lines.push(line);
            }
        }
        self.scanned = self.pending.len();
        if self.pending.len() > self.max_line_bytes {
            return Err(ChatError::Stream(format!(
                "SSE line exceeds {} bytes",
                self.max_line_bytes
            )));
        }
        Ok(lines)
    }

    /// Whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        self.scanned = 0;
        let line = String::from_utf8_lossy(&rest).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Whether an SSE line carries a data payload.
pub fn is_data_line(line: &str) -> bool {
    line.starts_with("data:")
}
