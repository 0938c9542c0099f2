//! Assembles tool-call fragments into complete calls.

use std::collections::BTreeMap;

use crate::error::{ChatError, Result};
use crate::types::{ToolCall, ToolCallDelta};

/// Default ceiling on distinct tool calls in one turn.
pub const DEFAULT_MAX_TOOL_CALLS: usize = 32;
/// Default ceiling on argument bytes for one call.
pub const DEFAULT_MAX_ARGUMENTS_BYTES: usize = 256 * 1024;

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

/// Per-turn accumulator keyed by call index.
#[derive(Debug)]
pub struct ToolCallAggregator {
    builders: BTreeMap<u32, ToolCallBuilder>,
    max_tool_calls: usize,
    max_arguments_bytes: usize,
}

impl Default for ToolCallAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOOL_CALLS, DEFAULT_MAX_ARGUMENTS_BYTES)
    }
}

impl ToolCallAggregator {
    pub fn new(max_tool_calls: usize, max_arguments_bytes: usize) -> Self {
        Self {
            builders: BTreeMap::new(),
            max_tool_calls,
            max_arguments_bytes,
        }
    }

    /// Merge one fragment into the builder for its index.
    pub fn add_delta(&mut self, delta: ToolCallDelta) -> Result<()> {
        if !self.builders.contains_key(&delta.index) && self.builders.len() >= self.max_tool_calls
        {
            return Err(ChatError::Stream(format!(
                "turn exceeded {} tool calls",
                self.max_tool_calls
            )));
        }
        let builder = self.builders.entry(delta.index).or_default();
        if let Some(id) = delta.id {
            builder.id.push_str(&id);
        }
        if let Some(name) = delta.name {
            builder.name.push_str(&name);
        }
        if let Some(args) = delta.arguments {
            if builder.arguments.len() + args.len() > self.max_arguments_bytes {
                return Err(ChatError::Stream(format!(
                    "tool call {} arguments exceeded {} bytes",
                    delta.index, self.max_arguments_bytes
                )));
            }
            builder.arguments.push_str(&args);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Drain every builder into complete calls, ordered by index.
    pub fn finalize(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.builders)
            .into_iter()
            .map(|(index, builder)| {
                let id = if builder.id.is_empty() {
                    format!("call_{index}")
                } else {
                    builder.id
                };
                if builder.name.is_empty() {
                    tracing::warn!(index, id = %id, "tool call finalized without a name");
                }
                let arguments_json = if builder.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    builder.arguments
                };
                ToolCall {
                    index,
                    id,
                    name: builder.name,
                    arguments_json,
                }
            })
            .collect()
    }
}
