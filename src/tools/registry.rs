//! Name-keyed tool dispatch.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::arguments::ToolArguments;
use super::tool::Tool;
use super::types::ToolDefinition;
use super::validation::validate_arguments;
use crate::error::ChatError;
use crate::types::ToolCall;

pub const DEFAULT_ERROR_PREFIX: &str = "Error: ";

/// Result of one tool invocation, already rendered as text for the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub result: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    fn ok(result: String) -> Self {
        Self {
            result,
            success: true,
            error: None,
        }
    }
}

/// Registry of tools, built once at startup.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    error_prefix: String,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("error_prefix", &self.error_prefix)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            error_prefix: DEFAULT_ERROR_PREFIX.to_string(),
        }
    }

    pub fn with_error_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.error_prefix = prefix.into();
        self
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        match self.by_name.get(&name) {
            Some(&slot) => {
                tracing::warn!(tool_name = %name, "replacing registered tool");
                self.tools[slot] = tool;
            }
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
        self
    }

    pub fn error_prefix(&self) -> &str {
        &self.error_prefix
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Schemas of every registered tool, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Parse a finalized call's arguments and dispatch it.
    pub fn execute_call(&self, call: &ToolCall) -> ToolOutcome {
        match ToolArguments::parse(&call.arguments_json) {
            Ok(args) => self.execute(&call.name, &args),
            Err(err) => self.failure(&call.name, &err),
        }
    }

    /// Dispatch by name. Never fails: every error becomes error text.
    pub fn execute(&self, name: &str, args: &ToolArguments) -> ToolOutcome {
        let Some(tool) = self.by_name.get(name).map(|&slot| &self.tools[slot]) else {
            let message = format!("Unknown tool: {name}");
            return ToolOutcome {
                result: format!("{}{message}", self.error_prefix),
                success: false,
                error: Some(message),
            };
        };

        if let Err(err) = validate_arguments(args.raw(), &tool.parameters().schema) {
            return self.failure(name, &err);
        }

        match catch_unwind(AssertUnwindSafe(|| tool.execute(args))) {
            Ok(Ok(value)) => ToolOutcome::ok(render(value)),
            Ok(Err(err)) => self.failure(name, &err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(tool_name = %name, panic = %message, "tool panicked");
                self.failure(name, &ChatError::tool(name, message))
            }
        }
    }

    fn failure(&self, name: &str, err: &ChatError) -> ToolOutcome {
        let message = match err {
            ChatError::ToolExecution { message, .. } => message.clone(),
            ChatError::InvalidArgument(message) => message.clone(),
            other => other.to_string(),
        };
        tracing::warn!(tool_name = %name, error = %message, "tool execution failed");
        ToolOutcome {
            result: format!("{}{message}", self.error_prefix),
            success: false,
            error: Some(message),
        }
    }
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}
