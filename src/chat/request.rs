use bon::Builder;
use serde::{Deserialize, Serialize};

/// One user turn submitted to [`ChatService::chat`](super::ChatService::chat).
///
/// ```
/// use roci_chat::chat::ChatRequest;
///
/// let request = ChatRequest::builder()
///     .user_id(7)
///     .message("What's the weather in NYC?")
///     .enable_tools(true)
///     .build();
/// assert!(request.session_id.is_none());
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Existing session to continue. A new session is created when absent
    /// or unknown.
    #[builder(into)]
    pub session_id: Option<String>,
    pub user_id: i64,
    #[builder(into)]
    pub message: String,
    /// Overrides the configured model.
    #[builder(into)]
    pub model: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub enable_tools: bool,
}

impl ChatRequest {
    /// The model override, ignoring blank values.
    pub fn model_override(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}
