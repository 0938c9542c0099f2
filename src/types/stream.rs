//! Streaming types produced while a model turn is decoded.

use serde::{Deserialize, Serialize};

use super::message::ToolCallRef;

/// One event decoded from a model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Incremental reasoning text.
    Thinking(String),
    /// Incremental answer text.
    Content(String),
    /// A fragment of a tool invocation.
    ToolCallDelta(ToolCallDelta),
    /// The turn finished.
    Done { had_tool_calls: bool },
}

/// A partial tool invocation, keyed by its position in the turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A complete tool invocation, available once its turn has finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub index: u32,
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

impl ToolCall {
    pub fn to_ref(&self) -> ToolCallRef {
        ToolCallRef {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments_json: self.arguments_json.clone(),
        }
    }
}
