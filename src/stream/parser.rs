//! Decoder for OpenAI-compatible chat-completions stream chunks.

use serde::Deserialize;

use crate::types::{ToolCallDelta, TurnEvent};

const DONE_SENTINEL: &str = "[DONE]";

/// Running state for one model turn.
#[derive(Debug, Default, Clone)]
pub struct TurnAccumulator {
    thinking: String,
    content: String,
    saw_tool_calls: bool,
    finish_reason: Option<String>,
    done: bool,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn thinking(&self) -> &str {
        &self.thinking
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn saw_tool_calls(&self) -> bool {
        self.saw_tool_calls
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self, reason: Option<String>) -> TurnEvent {
        if reason.as_deref() == Some("tool_calls") {
            self.saw_tool_calls = true;
        }
        self.finish_reason = reason;
        self.done = true;
        TurnEvent::Done {
            had_tool_calls: self.saw_tool_calls,
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    reasoning: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    index: Option<u32>,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

/// Decode one raw frame into turn events.
///
/// Malformed frames are logged and produce nothing. Frames arriving after the
/// turn finished are ignored.
pub fn parse(raw: &str, acc: &mut TurnAccumulator) -> Vec<TurnEvent> {
    if acc.done {
        return Vec::new();
    }

    let line = raw.trim();
    if line.is_empty() || line.starts_with(':') {
        return Vec::new();
    }
    let data = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => line,
    };
    if data == DONE_SENTINEL {
        return vec![acc.finish(None)];
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!(error = %e, frame = %truncate(data, 200), "skipping malformed stream frame");
            return Vec::new();
        }
    };

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut events = Vec::new();
    let delta = choice.delta.unwrap_or_default();

    if let Some(text) = delta.reasoning_content.or(delta.reasoning) {
        if !text.is_empty() {
            acc.thinking.push_str(&text);
            events.push(TurnEvent::Thinking(text));
        }
    }
    if let Some(text) = delta.content {
        if !text.is_empty() {
            acc.content.push_str(&text);
            events.push(TurnEvent::Content(text));
        }
    }
    for (position, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
        acc.saw_tool_calls = true;
        let (name, arguments) = match call.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        events.push(TurnEvent::ToolCallDelta(ToolCallDelta {
            index: call.index.unwrap_or(position as u32),
            id: call.id,
            name,
            arguments,
        }));
    }

    if let Some(reason) = choice.finish_reason {
        events.push(acc.finish(Some(reason)));
    }

    events
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
