//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::{ToolOutcome, ToolRegistry};
pub use tool::{FnTool, Tool};
pub use types::{ToolDefinition, ToolParameters};
