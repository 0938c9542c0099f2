//! Shared test helpers: scripted transport, tracked tools and a failing
//! repository.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use roci_chat::chat::ChatService;
use roci_chat::config::{ChatConfig, SessionConfig};
use roci_chat::encoder::{FrameType, WireFrame};
use roci_chat::error::{ChatError, Result};
use roci_chat::session::{InMemorySessionRepository, SessionRepository};
use roci_chat::tools::{FnTool, Tool, ToolDefinition, ToolParameters, ToolRegistry};
use roci_chat::transport::{ChatTransport, FrameStream};
use roci_chat::types::{ChatMessage, SessionRecord, SessionSummary};

/// One step of a scripted model turn.
pub enum Step {
    Frame(String),
    /// Yield a transport error and end the stream.
    Fail(ChatError),
    /// Never yield again.
    Stall,
}

/// What one `stream_chat` call does.
pub enum Turn {
    Stream(Vec<Step>),
    /// Fail before any frame.
    Reject(ChatError),
    /// Never open the stream.
    Hang,
}

/// A call the transport received.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
}

/// A transport that replays queued turns in order.
#[derive(Default)]
pub struct ScriptedTransport {
    turns: Mutex<VecDeque<Turn>>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl ScriptedTransport {
    pub fn new(turns: impl IntoIterator<Item = Turn>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into_iter().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        model: &str,
    ) -> Result<FrameStream> {
        self.seen.lock().unwrap().push(SeenRequest {
            messages: messages.to_vec(),
            tools: tools.to_vec(),
            model: model.to_string(),
        });
        let turn = self.turns.lock().unwrap().pop_front();
        let steps = match turn {
            Some(Turn::Stream(steps)) => steps,
            Some(Turn::Reject(err)) => return Err(err),
            Some(Turn::Hang) => std::future::pending().await,
            None => return Err(ChatError::Stream("no scripted turn left".into())),
        };

        let stream = async_stream::stream! {
            for step in steps {
                match step {
                    Step::Frame(frame) => yield Ok(frame),
                    Step::Fail(err) => {
                        yield Err(err);
                        return;
                    }
                    Step::Stall => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        Ok(stream.boxed())
    }
}

fn chunk(delta: Value, finish_reason: Option<&str>) -> Step {
    let body = json!({ "choices": [{ "delta": delta, "finish_reason": finish_reason }] });
    Step::Frame(format!("data: {body}"))
}

pub fn content(text: &str) -> Step {
    chunk(json!({ "content": text }), None)
}

pub fn thinking(text: &str) -> Step {
    chunk(json!({ "reasoning_content": text }), None)
}

pub fn tool_delta(index: u32, id: Option<&str>, name: Option<&str>, arguments: Option<&str>) -> Step {
    let mut function = serde_json::Map::new();
    if let Some(name) = name {
        function.insert("name".into(), json!(name));
    }
    if let Some(arguments) = arguments {
        function.insert("arguments".into(), json!(arguments));
    }
    let mut call = json!({ "index": index, "function": function });
    if let Some(id) = id {
        call["id"] = json!(id);
    }
    chunk(json!({ "tool_calls": [call] }), None)
}

pub fn finish(reason: &str) -> Step {
    chunk(json!({}), Some(reason))
}

pub fn done_sentinel() -> Step {
    Step::Frame("data: [DONE]".into())
}

/// A plain answer streamed in pieces.
pub fn text_turn(pieces: &[&str]) -> Turn {
    let mut steps: Vec<Step> = pieces.iter().map(|p| content(p)).collect();
    steps.push(finish("stop"));
    steps.push(done_sentinel());
    Turn::Stream(steps)
}

/// A turn requesting the given `(id, name, arguments)` calls.
pub fn tool_turn(calls: &[(&str, &str, &str)]) -> Turn {
    let mut steps: Vec<Step> = calls
        .iter()
        .enumerate()
        .map(|(i, (id, name, args))| tool_delta(i as u32, Some(id), Some(name), Some(args)))
        .collect();
    steps.push(finish("tool_calls"));
    steps.push(done_sentinel());
    Turn::Stream(steps)
}

/// Counts invocations of a tool.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// `getWeather(city)` returning a fixed forecast.
pub fn weather_tool(counter: CallCounter) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "getWeather",
        "Current weather for a city",
        ToolParameters::object().string("city", "City name", true).build(),
        move |args| {
            counter.bump();
            let city = args.get_str("city")?;
            Ok(json!({ "city": city, "forecast": "sunny", "tempF": 72 }))
        },
    ))
}

/// A tool whose handler always fails.
pub fn failing_tool(counter: CallCounter) -> Arc<dyn Tool> {
    Arc::new(FnTool::new(
        "flaky",
        "Always fails",
        ToolParameters::empty(),
        move |_| {
            counter.bump();
            Err(ChatError::tool("flaky", "backend unavailable"))
        },
    ))
}

/// A repository where every operation fails.
#[derive(Debug, Default)]
pub struct FailingRepository;

#[async_trait]
impl SessionRepository for FailingRepository {
    async fn load(&self, _session_id: &str) -> Result<Option<SessionRecord>> {
        Err(ChatError::Storage("repository offline".into()))
    }

    async fn upsert(&self, _record: SessionRecord) -> Result<()> {
        Err(ChatError::Storage("repository offline".into()))
    }

    async fn delete(&self, _session_id: &str) -> Result<()> {
        Err(ChatError::Storage("repository offline".into()))
    }

    async fn list_by_user(&self, _user_id: i64, _limit: usize) -> Result<Vec<SessionSummary>> {
        Err(ChatError::Storage("repository offline".into()))
    }
}

/// An in-memory repository whose upsert stalls when the record's newest
/// message matches `trigger`.
pub struct SlowRepository {
    pub inner: InMemorySessionRepository,
    trigger: String,
    delay: std::time::Duration,
}

impl SlowRepository {
    pub fn new(trigger: &str, delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemorySessionRepository::new(),
            trigger: trigger.to_string(),
            delay,
        })
    }
}

#[async_trait]
impl SessionRepository for SlowRepository {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        self.inner.load(session_id).await
    }

    async fn upsert(&self, record: SessionRecord) -> Result<()> {
        if record.messages.last().is_some_and(|m| m.content == self.trigger) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.upsert(record).await
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.inner.delete(session_id).await
    }

    async fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>> {
        self.inner.list_by_user(user_id, limit).await
    }
}

pub fn test_config() -> ChatConfig {
    ChatConfig {
        session: SessionConfig {
            data_dir: std::env::temp_dir().join("roci-chat-tests"),
            ..SessionConfig::default()
        },
        ..ChatConfig::default()
    }
}

pub fn registry_with(tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

/// A service over a scripted transport and an in-memory repository.
pub fn service(
    config: ChatConfig,
    transport: Arc<ScriptedTransport>,
    registry: ToolRegistry,
) -> (ChatService, Arc<InMemorySessionRepository>) {
    let repository = Arc::new(InMemorySessionRepository::new());
    let service = ChatService::new(config, transport, repository.clone(), registry)
        .expect("valid test config");
    (service, repository)
}

pub fn frame_types(frames: &[WireFrame]) -> Vec<FrameType> {
    frames.iter().map(|f| f.frame_type).collect()
}

pub fn concatenated(frames: &[WireFrame], frame_type: FrameType) -> String {
    frames
        .iter()
        .filter(|f| f.frame_type == frame_type)
        .map(|f| f.text.as_str())
        .collect()
}
