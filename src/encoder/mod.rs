//! Client wire frames.
//!
//! Every frame carries `sessionId`, `type`, `text` and `isFinal`. Tool frames
//! add a `toolCall` or `toolResult` object and error frames an `errorCode`.
//! A `tool_call` frame's text is the tool name; a `tool_result` frame's text is
//! the result as the model sees it, error prefix included.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::error::ClientErrorCode;
use crate::orchestrator::OrchestratorEvent;

/// Frame discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FrameType {
    Thinking,
    Content,
    ToolCall,
    ToolResult,
    Done,
    Error,
}

/// One frame of the client stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFrame {
    pub session_id: String,
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    pub text: String,
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ClientErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallFrame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResultFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFrame {
    pub id: String,
    pub name: String,
    /// Parsed arguments, or the raw text when it is not valid JSON.
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultFrame {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireFrame {
    fn new(session_id: &str, frame_type: FrameType, text: String) -> Self {
        Self {
            session_id: session_id.to_string(),
            frame_type,
            text,
            is_final: matches!(frame_type, FrameType::Done | FrameType::Error),
            error_code: None,
            tool_call: None,
            tool_result: None,
        }
    }

    pub fn done(session_id: &str) -> Self {
        Self::new(session_id, FrameType::Done, String::new())
    }

    pub fn error(session_id: &str, code: ClientErrorCode, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code),
            ..Self::new(session_id, FrameType::Error, message.into())
        }
    }

    pub fn to_json(&self) -> String {
        // Every field is a plain string, bool, enum or JSON value.
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "frame serialization failed");
            String::from("{}")
        })
    }

    /// Newline-delimited JSON.
    pub fn to_ndjson_line(&self) -> String {
        let mut line = self.to_json();
        line.push('\n');
        line
    }

    /// A server-sent event.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.frame_type, self.to_json())
    }
}

fn json_or_text(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Map an orchestrator event to its frame.
pub fn encode(session_id: &str, event: &OrchestratorEvent) -> WireFrame {
    match event {
        OrchestratorEvent::Thinking { text } => {
            WireFrame::new(session_id, FrameType::Thinking, text.clone())
        }
        OrchestratorEvent::Content { text } => {
            WireFrame::new(session_id, FrameType::Content, text.clone())
        }
        OrchestratorEvent::ToolCall { call } => WireFrame {
            tool_call: Some(ToolCallFrame {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: json_or_text(&call.arguments_json),
            }),
            ..WireFrame::new(session_id, FrameType::ToolCall, call.name.clone())
        },
        OrchestratorEvent::ToolResult { call, outcome } => WireFrame {
            tool_result: Some(ToolResultFrame {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: json_or_text(&outcome.result),
                success: outcome.success,
                error: outcome.error.clone(),
            }),
            ..WireFrame::new(session_id, FrameType::ToolResult, outcome.result.clone())
        },
        OrchestratorEvent::Done => WireFrame::done(session_id),
        OrchestratorEvent::Error { code, message } => WireFrame::error(session_id, *code, message.clone()),
    }
}

/// Encodes one request's events, dropping anything after the final frame.
#[derive(Debug)]
pub struct FrameSequence {
    session_id: String,
    finished: bool,
}

impl FrameSequence {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            finished: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `None` once a final frame has been produced.
    pub fn encode(&mut self, event: &OrchestratorEvent) -> Option<WireFrame> {
        if self.finished {
            tracing::debug!(session_id = %self.session_id, ?event, "dropping event after final frame");
            return None;
        }
        let frame = encode(&self.session_id, event);
        self.finished = frame.is_final;
        Some(frame)
    }
}
