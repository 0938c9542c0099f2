//! Model transport abstraction.

pub mod http;
pub mod openai_compatible;

pub use openai_compatible::OpenAiCompatibleTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::tools::ToolDefinition;
use crate::types::ChatMessage;

/// Raw wire frames of one streamed model turn.
pub type FrameStream = BoxStream<'static, Result<String>>;

/// Starts a streamed model turn.
///
/// Errors returned here, or yielded by the stream, are transport failures and
/// end the request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<FrameStream>;
}
