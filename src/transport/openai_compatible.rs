//! Streaming transport for any OpenAI-compatible chat-completions API.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::debug;

use super::http::{
    bearer_headers, is_data_line, shared_client, status_to_error, LineBuffer, DEFAULT_MAX_LINE_BYTES,
};
use super::{ChatTransport, FrameStream};
use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::tools::ToolDefinition;
use crate::types::{ChatMessage, Role};

/// POSTs to `<base_url>/chat/completions` with `stream: true` and yields the
/// raw `data:` lines of the response.
#[derive(Clone)]
pub struct OpenAiCompatibleTransport {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
    max_line_bytes: usize,
}

impl std::fmt::Debug for OpenAiCompatibleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("max_line_bytes", &self.max_line_bytes)
            .finish()
    }
}

impl OpenAiCompatibleTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: shared_client().clone(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(config.base_url.clone(), config.api_key.clone())
            .with_max_line_bytes(config.max_line_bytes)
    }

    /// Longest SSE line accepted before the stream fails.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn build_request_body(messages: &[ChatMessage], tools: &[ToolDefinition], model: &str) -> Value {
        let mut body = json!({
            "model": model,
            "messages": messages.iter().map(message_to_wire).collect::<Vec<_>>(),
            "stream": true,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }
        body
    }
}

#[async_trait]
impl ChatTransport for OpenAiCompatibleTransport {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<FrameStream> {
        let body = Self::build_request_body(messages, tools, model);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model, messages = messages.len(), tools = tools.len(), "stream_chat");

        let resp = self
            .client
            .post(&url)
            .headers(bearer_headers(self.api_key.as_deref()))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status.as_u16(), &body_text));
        }

        let byte_stream = resp.bytes_stream();
        let max_line_bytes = self.max_line_bytes;

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::with_limit(max_line_bytes);
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ChatError::Network(e));
                        return;
                    }
                };
                let completed = match lines.push(&chunk) {
                    Ok(completed) => completed,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for line in completed {
                    if is_data_line(&line) {
                        yield Ok(line);
                    }
                }
            }
            if let Some(line) = lines.finish() {
                if is_data_line(&line) {
                    yield Ok(line);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn message_to_wire(msg: &ChatMessage) -> Value {
    match msg.role {
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.content,
        }),
        Role::Assistant if !msg.tool_calls().is_empty() => {
            let calls: Vec<Value> = msg
                .tool_calls()
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": tc.arguments_json },
                    })
                })
                .collect();
            let content = if msg.content.is_empty() {
                Value::Null
            } else {
                Value::String(msg.content.clone())
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
        role => json!({ "role": role.to_string(), "content": msg.content }),
    }
}
