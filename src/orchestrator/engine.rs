//! The bounded model/tool loop.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use super::context::OrchestrationContext;
use super::events::{EventSink, OrchestratorEvent};
use super::executor::ToolExecutor;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::session::SessionStore;
use crate::stream::{parse, ToolCallAggregator, TurnAccumulator};
use crate::transport::ChatTransport;
use crate::types::{ChatMessage, ToolCall, TurnEvent};
use crate::util::timeout::with_timeout;

/// Limits applied to every request.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_iterations: u32,
    /// Bound on opening the model stream and on the gap between frames.
    pub response_timeout: Duration,
    pub max_tool_calls_per_turn: usize,
    pub max_tool_arguments_bytes: usize,
}

impl LoopSettings {
    pub fn from_config(config: &ChatConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            response_timeout: config.response_timeout(),
            max_tool_calls_per_turn: config.max_tool_calls_per_turn,
            max_tool_arguments_bytes: config.max_tool_arguments_bytes,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&ChatConfig::default())
    }
}

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model answered without requesting tools.
    Completed,
    /// The tool-round ceiling was reached.
    IterationsExhausted,
    /// A transport failure ended the request.
    Failed,
    /// The consumer went away or cancelled.
    Cancelled,
}

enum TurnFailure {
    Cancelled,
    Transport(ChatError),
}

impl From<ChatError> for TurnFailure {
    fn from(err: ChatError) -> Self {
        Self::Transport(err)
    }
}

struct Turn {
    content: String,
    calls: Vec<ToolCall>,
}

/// Drives model calls and tool execution for chat requests.
pub struct Orchestrator {
    transport: Arc<dyn ChatTransport>,
    executor: ToolExecutor,
    store: Arc<SessionStore>,
    settings: LoopSettings,
}

impl Orchestrator {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        executor: ToolExecutor,
        store: Arc<SessionStore>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            transport,
            executor,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one request to its terminal event.
    ///
    /// Exactly one `Done` or `Error` is emitted unless the request is
    /// cancelled. Only the final answer is written to the session store.
    pub async fn run(&self, mut ctx: OrchestrationContext, model: &str, sink: &EventSink) -> RunOutcome {
        loop {
            debug!(session_id = %ctx.session_id, iteration = ctx.iteration, "calling model");

            let turn = match self.stream_turn(&ctx, model, sink).await {
                Ok(turn) => turn,
                Err(TurnFailure::Cancelled) => return cancelled(&ctx),
                Err(TurnFailure::Transport(err)) => {
                    warn!(session_id = %ctx.session_id, iteration = ctx.iteration, error = %err, "model call failed");
                    let event = OrchestratorEvent::Error {
                        code: err.client_error_code(),
                        message: err.client_message(),
                    };
                    sink.emit(event).await;
                    return RunOutcome::Failed;
                }
            };

            if turn.calls.is_empty() {
                return self.finish(&ctx, turn.content, sink).await;
            }

            let refs = turn.calls.iter().map(ToolCall::to_ref).collect();
            ctx.messages
                .push(ChatMessage::assistant_with_tool_calls(turn.content, refs));

            for call in turn.calls {
                if !sink.emit(OrchestratorEvent::ToolCall { call: call.clone() }).await {
                    return cancelled(&ctx);
                }
                let outcome = tokio::select! {
                    biased;
                    _ = sink.cancelled() => return cancelled(&ctx),
                    outcome = self.executor.run(call.clone()) => outcome,
                };
                debug!(
                    session_id = %ctx.session_id,
                    tool_name = %call.name,
                    success = outcome.success,
                    "tool finished"
                );
                ctx.messages
                    .push(ChatMessage::tool_result(call.id.clone(), outcome.result.clone()));
                if !sink.emit(OrchestratorEvent::ToolResult { call, outcome }).await {
                    return cancelled(&ctx);
                }
            }

            ctx.iteration += 1;
            if ctx.iteration >= self.settings.max_iterations {
                warn!(session_id = %ctx.session_id, iterations = ctx.iteration, "max tool iterations reached");
                sink.emit(OrchestratorEvent::Done).await;
                return RunOutcome::IterationsExhausted;
            }
        }
    }

    async fn finish(&self, ctx: &OrchestrationContext, content: String, sink: &EventSink) -> RunOutcome {
        if sink.is_cancelled() {
            return cancelled(ctx);
        }
        if !content.trim().is_empty() {
            if let Err(e) = self
                .store
                .append(&ctx.session_id, ChatMessage::assistant(content))
                .await
            {
                warn!(session_id = %ctx.session_id, error = %e, "failed to store assistant message");
            }
        }
        info!(session_id = %ctx.session_id, iterations = ctx.iteration, "chat completed");
        sink.emit(OrchestratorEvent::Done).await;
        RunOutcome::Completed
    }

    /// Stream one model turn, emitting text as it arrives.
    async fn stream_turn(
        &self,
        ctx: &OrchestrationContext,
        model: &str,
        sink: &EventSink,
    ) -> Result<Turn, TurnFailure> {
        let timeout = self.settings.response_timeout;
        let open = self.transport.stream_chat(&ctx.messages, &ctx.tools, model);
        let mut frames = tokio::select! {
            biased;
            _ = sink.cancelled() => return Err(TurnFailure::Cancelled),
            opened = with_timeout(timeout, open) => opened?,
        };

        let mut acc = TurnAccumulator::new();
        let mut aggregator = ToolCallAggregator::new(
            self.settings.max_tool_calls_per_turn,
            self.settings.max_tool_arguments_bytes,
        );

        while !acc.is_done() {
            let next = tokio::select! {
                biased;
                _ = sink.cancelled() => return Err(TurnFailure::Cancelled),
                next = with_timeout(timeout, async { Ok(frames.next().await) }) => next?,
            };
            let Some(frame) = next else {
                debug!(session_id = %ctx.session_id, "stream ended without a finish signal");
                break;
            };
            for event in parse(&frame?, &mut acc) {
                let emitted = match event {
                    TurnEvent::Thinking(text) => sink.emit(OrchestratorEvent::Thinking { text }).await,
                    TurnEvent::Content(text) => sink.emit(OrchestratorEvent::Content { text }).await,
                    TurnEvent::ToolCallDelta(delta) => {
                        aggregator.add_delta(delta)?;
                        true
                    }
                    TurnEvent::Done { had_tool_calls } => {
                        debug!(session_id = %ctx.session_id, had_tool_calls, "turn finished");
                        true
                    }
                };
                if !emitted {
                    return Err(TurnFailure::Cancelled);
                }
            }
        }

        Ok(Turn {
            content: acc.into_content(),
            calls: aggregator.finalize(),
        })
    }
}

fn cancelled(ctx: &OrchestrationContext) -> RunOutcome {
    info!(session_id = %ctx.session_id, iteration = ctx.iteration, "chat cancelled");
    RunOutcome::Cancelled
}
