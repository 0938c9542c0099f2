//! roci-chat: a streaming tool-orchestration engine for chat sessions.
//!
//! A chat request appends the user's message to its session, then alternates
//! between streamed model turns and tool rounds until the model answers
//! without requesting a tool or the round ceiling is reached. Every step is
//! delivered to the client as a [`WireFrame`](encoder::WireFrame).
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::StreamExt;
//! use roci_chat::prelude::*;
//!
//! # async fn example() -> roci_chat::error::Result<()> {
//! let mut tools = ToolRegistry::new();
//! tools.register(roci_chat::tools::builtin::current_time_tool());
//!
//! let service = ChatService::from_config(ChatConfig::from_env()?, tools)?;
//! let request = ChatRequest::builder()
//!     .user_id(1)
//!     .message("What time is it in UTC?")
//!     .enable_tools(true)
//!     .build();
//!
//! let mut frames = service.chat(request).await?;
//! while let Some(frame) = frames.next().await {
//!     print!("{}", frame.to_ndjson_line());
//! }
//! service.flush().await;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod encoder;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
