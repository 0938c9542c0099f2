//! Chat entry point: validates a request, prepares the session and spawns the
//! orchestration task.

mod handle;
mod request;

pub use handle::ChatHandle;
pub use request::ChatRequest;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::error::{ChatError, ClientErrorCode, Result};
use crate::orchestrator::{EventSink, LoopSettings, OrchestrationContext, Orchestrator, ToolExecutor};
use crate::session::{FileSessionRepository, SessionRepository, SessionStore};
use crate::tools::ToolRegistry;
use crate::transport::openai_compatible::OpenAiCompatibleTransport;
use crate::transport::ChatTransport;
use crate::types::{ChatMessage, SessionSummary};

/// Buffered events per request before the orchestration task waits on the
/// consumer.
const EVENT_BUFFER: usize = 64;

/// Shared chat engine. Cheap to share behind an `Arc`; every request runs on
/// its own task.
pub struct ChatService {
    config: ChatConfig,
    store: Arc<SessionStore>,
    registry: Arc<ToolRegistry>,
    orchestrator: Arc<Orchestrator>,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("config", &self.config)
            .field("tools", &self.registry.len())
            .finish()
    }
}

impl ChatService {
    /// Wire the engine from its parts. The registry's error prefix is taken
    /// from `config.tool_error_prefix`.
    pub fn new(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        repository: Arc<dyn SessionRepository>,
        registry: ToolRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let registry = Arc::new(registry.with_error_prefix(config.tool_error_prefix.clone()));
        let store = Arc::new(SessionStore::new(repository, config.session.clone()));
        let executor = ToolExecutor::new(Arc::clone(&registry), config.tool_workers);
        let orchestrator = Arc::new(Orchestrator::new(
            transport,
            executor,
            Arc::clone(&store),
            LoopSettings::from_config(&config),
        ));
        Ok(Self {
            config,
            store,
            registry,
            orchestrator,
        })
    }

    /// HTTP transport and file-backed sessions, both taken from `config`.
    pub fn from_config(config: ChatConfig, registry: ToolRegistry) -> Result<Self> {
        let transport = Arc::new(OpenAiCompatibleTransport::from_config(&config));
        let repository = Arc::new(FileSessionRepository::new(config.session.data_dir.clone()));
        Self::new(config, transport, repository, registry)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Start a chat request.
    ///
    /// Invalid input is rejected here, before any frame exists. Everything
    /// after that, including transport failures, arrives on the handle.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatHandle> {
        validate(&request)?;

        let session_id = self.resolve_session(&request).await?;
        self.store
            .append(&session_id, ChatMessage::user(request.message.clone()))
            .await?;
        let session = self
            .store
            .get(&session_id)
            .await?
            .ok_or_else(|| ChatError::SessionNotFound(session_id.clone()))?;

        let mut messages = Vec::with_capacity(session.messages.len() + 1);
        if let Some(prompt) = self.config.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage::system(prompt));
        }
        messages.extend(session.messages);

        let tools = if request.enable_tools && !self.registry.is_empty() {
            self.registry.definitions()
        } else {
            Vec::new()
        };
        let model = request
            .model_override()
            .unwrap_or(&self.config.model)
            .to_string();

        info!(
            session_id = %session_id,
            user_id = request.user_id,
            model = %model,
            tools = tools.len(),
            "chat request started"
        );

        let cancel = CancellationToken::new();
        let (sink, rx) = EventSink::channel(EVENT_BUFFER, cancel.clone());
        let ctx = OrchestrationContext::new(session_id.clone(), messages, tools);
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let session_id = ctx.session_id.clone();
            let outcome = orchestrator.run(ctx, &model, &sink).await;
            debug!(session_id = %session_id, ?outcome, "chat request finished");
        });

        Ok(ChatHandle::new(session_id, rx, cancel))
    }

    async fn resolve_session(&self, request: &ChatRequest) -> Result<String> {
        if let Some(id) = &request.session_id {
            if self.store.exists(id).await {
                return Ok(id.clone());
            }
            debug!(session_id = %id, "unknown session, starting a new one");
        }
        self.store.create(request.user_id)
    }

    /// Create an empty session.
    pub fn create_session(&self, user_id: i64) -> Result<String> {
        self.store.create(user_id)
    }

    /// Stored messages of a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.store
            .get(session_id)
            .await?
            .map(|session| session.messages)
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    pub async fn clear_session(&self, session_id: &str) {
        self.store.clear(session_id).await;
    }

    /// A user's sessions with their titles, most recently updated first.
    pub async fn sessions(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>> {
        self.store.list_by_user(user_id, limit).await
    }

    /// Replace a session's title. Long titles are truncated.
    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<()> {
        if title.trim().is_empty() {
            return Err(ChatError::InvalidArgument("title must not be blank".into()));
        }
        self.store.rename(session_id, title).await
    }

    /// Whether `session_id` exists and belongs to `user_id`.
    pub async fn owns_session(&self, session_id: &str, user_id: i64) -> bool {
        self.store.is_owned_by(session_id, user_id).await
    }

    /// Wait for pending repository writes.
    pub async fn flush(&self) {
        self.store.flush().await;
    }
}

fn validate(request: &ChatRequest) -> Result<()> {
    if request.message.trim().is_empty() {
        return Err(ChatError::InvalidArgument(
            ClientErrorCode::EmptyMessage.default_message().to_string(),
        ));
    }
    if let Some(id) = &request.session_id {
        if uuid::Uuid::parse_str(id).is_err() {
            return Err(ChatError::InvalidArgument(format!(
                "{}: {id}",
                ClientErrorCode::InvalidSessionId.default_message()
            )));
        }
    }
    Ok(())
}
