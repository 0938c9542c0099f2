use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::encoder::{FrameSequence, WireFrame};
use crate::error::ClientErrorCode;
use crate::orchestrator::OrchestratorEvent;

/// Client side of one chat request: a stream of wire frames.
///
/// The stream ends after the final `done` or `error` frame. Dropping the
/// handle cancels the request.
pub struct ChatHandle {
    events: ReceiverStream<OrchestratorEvent>,
    sequence: FrameSequence,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ChatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHandle")
            .field("session_id", &self.sequence.session_id())
            .field("finished", &self.sequence.is_finished())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ChatHandle {
    pub(crate) fn new(
        session_id: String,
        rx: mpsc::Receiver<OrchestratorEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            events: ReceiverStream::new(rx),
            sequence: FrameSequence::new(session_id),
            cancel,
        }
    }

    pub fn session_id(&self) -> &str {
        self.sequence.session_id()
    }

    /// Stop the request. No further frames are yielded and nothing more is
    /// persisted for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for ChatHandle {
    type Item = WireFrame;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<WireFrame>> {
        let this = self.get_mut();
        loop {
            if this.cancel.is_cancelled() || this.sequence.is_finished() {
                return Poll::Ready(None);
            }
            match ready!(Pin::new(&mut this.events).poll_next(cx)) {
                Some(event) => {
                    if let Some(frame) = this.sequence.encode(&event) {
                        return Poll::Ready(Some(frame));
                    }
                }
                None => {
                    // The task went away without a terminal event (panic).
                    tracing::error!(
                        session_id = %this.sequence.session_id(),
                        "chat task ended without a final frame"
                    );
                    let code = ClientErrorCode::LlmProviderError;
                    let event = OrchestratorEvent::Error {
                        code,
                        message: code.default_message().to_string(),
                    };
                    return Poll::Ready(this.sequence.encode(&event));
                }
            }
        }
    }
}

impl Drop for ChatHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
