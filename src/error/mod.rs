//! Error types for roci-chat.

pub mod unified;

pub use unified::{ClientErrorCode, ErrorCategory};

use thiserror::Error;

/// Primary error type for all chat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Create an API error from a status code and body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(err) if err.is_timeout() => ErrorCategory::Timeout,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Io(_) | Self::Storage(_) => ErrorCategory::Storage,
            Self::InvalidArgument(_) | Self::SessionNotFound(_) => ErrorCategory::InvalidInput,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable by the caller.
    ///
    /// The orchestration loop itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Code reported to the client in a terminal `error` frame.
    pub fn client_error_code(&self) -> ClientErrorCode {
        if let Self::ModelNotFound(_) = self {
            return ClientErrorCode::ModelNotFound;
        }
        if let Self::Api { status: 404, message } = self {
            if message.to_ascii_lowercase().contains("model") {
                return ClientErrorCode::ModelNotFound;
            }
        }
        match self.category() {
            ErrorCategory::Timeout => ClientErrorCode::ResponseTimeout,
            ErrorCategory::Network => ClientErrorCode::ServiceUnavailable,
            ErrorCategory::Authentication => ClientErrorCode::ApiKeyInvalid,
            _ => ClientErrorCode::LlmProviderError,
        }
    }

    /// Text for the client's `error` frame. Only model-not-found details and
    /// input errors are passed through verbatim.
    pub fn client_message(&self) -> String {
        match self {
            Self::ModelNotFound(_) | Self::InvalidArgument(_) => self.to_string(),
            _ => self.client_error_code().default_message().to_string(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChatError>;
