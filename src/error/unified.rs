//! Unified error classification and client-facing error codes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    Storage,
    InvalidInput,
    Unknown,
}

/// Machine-readable code attached to terminal `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientErrorCode {
    EmptyMessage,
    InvalidSessionId,
    ResponseTimeout,
    ServiceUnavailable,
    ApiKeyInvalid,
    ModelNotFound,
    LlmProviderError,
}

impl ClientErrorCode {
    /// Human-readable message shown when the underlying error text should not
    /// reach the client verbatim.
    pub fn default_message(self) -> &'static str {
        match self {
            Self::EmptyMessage => "message must not be empty",
            Self::InvalidSessionId => "session id is not a valid UUID",
            Self::ResponseTimeout => "the model did not respond in time",
            Self::ServiceUnavailable => "the model service is unavailable",
            Self::ApiKeyInvalid => "the model service rejected the API key",
            Self::ModelNotFound => "the requested model does not exist",
            Self::LlmProviderError => "the model service returned an error",
        }
    }
}
