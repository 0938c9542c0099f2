//! Bounded blocking pool for tool execution.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::tools::{ToolOutcome, ToolRegistry};
use crate::types::ToolCall;

/// Runs tools on blocking threads, at most `workers` at a time across all
/// requests sharing the executor.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    permits: Arc<Semaphore>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, workers: usize) -> Self {
        Self {
            registry,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one call off the async runtime.
    ///
    /// Dropping the returned future does not stop a tool that already started;
    /// it runs to completion and its result is discarded.
    pub async fn run(&self, call: ToolCall) -> ToolOutcome {
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::error!(tool_name = %call.name, "tool pool is closed");
                return self.failed("tool pool is closed");
            }
        };
        let registry = Arc::clone(&self.registry);
        let name = call.name.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            registry.execute_call(&call)
        });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(tool_name = %name, error = %e, "tool worker failed");
                self.failed(&e.to_string())
            }
        }
    }

    fn failed(&self, message: &str) -> ToolOutcome {
        ToolOutcome {
            result: format!("{}{message}", self.registry.error_prefix()),
            success: false,
            error: Some(message.to_string()),
        }
    }

    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }
}
