//! Per-request working state.

use crate::tools::ToolDefinition;
use crate::types::ChatMessage;

/// Working context of one chat request. Never persisted.
#[derive(Debug, Clone)]
pub struct OrchestrationContext {
    pub session_id: String,
    /// Prompt, history and this request's tool exchange.
    pub messages: Vec<ChatMessage>,
    /// Completed tool rounds.
    pub iteration: u32,
    /// Advertised tool schema; empty when tools are disabled.
    pub tools: Vec<ToolDefinition>,
}

impl OrchestrationContext {
    pub fn new(
        session_id: impl Into<String>,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            messages,
            iteration: 0,
            tools,
        }
    }
}
