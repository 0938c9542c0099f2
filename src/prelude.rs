//! Convenience re-exports for common use.

pub use crate::chat::{ChatHandle, ChatRequest, ChatService};
pub use crate::config::{ChatConfig, SessionConfig};
pub use crate::encoder::{FrameType, WireFrame};
pub use crate::error::{ChatError, ClientErrorCode, Result};
pub use crate::session::{FileSessionRepository, InMemorySessionRepository, SessionRepository};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolParameters, ToolRegistry};
pub use crate::transport::ChatTransport;
pub use crate::types::{ChatMessage, Role, SessionSummary};
