//! Events emitted by the orchestration loop.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ClientErrorCode;
use crate::tools::ToolOutcome;
use crate::types::ToolCall;

/// One client-visible step of a chat request, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    Thinking {
        text: String,
    },
    Content {
        text: String,
    },
    ToolCall {
        call: ToolCall,
    },
    ToolResult {
        call: ToolCall,
        outcome: ToolOutcome,
    },
    Done,
    Error {
        code: ClientErrorCode,
        message: String,
    },
}

impl OrchestratorEvent {
    /// `Done` and `Error` end a request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

/// Sending half of a request's event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<OrchestratorEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<OrchestratorEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// A sink with a fresh receiver and token, sized for one request.
    pub fn channel(
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx, cancel), rx)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the request was cancelled or its consumer went away.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves once the request is cancelled or the receiver is dropped.
    pub async fn cancelled(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.tx.closed() => {}
        }
    }

    /// Deliver an event. Returns `false` once the request is cancelled or the
    /// receiver is gone; the loop must stop then.
    pub async fn emit(&self, event: OrchestratorEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }
}
