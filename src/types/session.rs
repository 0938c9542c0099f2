//! Session and durable record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, Role};

const TITLE_MAX_CHARS: usize = 50;
pub const DEFAULT_TITLE: &str = "New conversation";

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

/// A conversation session, identified by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: i64,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>, user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            user_id,
            title: default_title(),
            messages: Vec::new(),
            created_at: now,
            last_access_time: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_access_time = Utc::now();
    }

    /// Derive the title from the first user message while it is still the
    /// default. A title set by `rename` is kept.
    pub fn refresh_title(&mut self) {
        if self.title == DEFAULT_TITLE {
            self.title = session_title(&self.messages);
        }
    }

    pub fn rename(&mut self, title: &str) {
        self.title = truncate_title(title.trim());
    }

    /// Drop messages until at most `max_messages` remain.
    ///
    /// The oldest non-system message goes first; system messages are only
    /// dropped (oldest first) once nothing else is left.
    pub fn trim_to(&mut self, max_messages: usize) {
        while self.messages.len() > max_messages {
            let victim = self
                .messages
                .iter()
                .position(|m| !m.is_system())
                .unwrap_or(0);
            self.messages.remove(victim);
        }
    }
}

/// Durable representation of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn into_session(self) -> Session {
        Session {
            session_id: self.session_id,
            user_id: self.user_id,
            title: self.title,
            messages: self.messages,
            created_at: self.created_at,
            last_access_time: self.updated_at,
        }
    }
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            title: session.title.clone(),
            messages: session.messages.clone(),
            created_at: session.created_at,
            updated_at: session.last_access_time,
        }
    }
}

/// Lightweight listing entry: a record without its messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: i64,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            user_id: record.user_id,
            title: record.title.clone(),
            message_count: record.messages.len(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Derive a title from the first user message.
pub fn session_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|m| m.role == Role::User && !m.content.trim().is_empty())
        .map(|first| truncate_title(first.content.trim()))
        .unwrap_or_else(default_title)
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() > TITLE_MAX_CHARS {
        let truncated: String = title.chars().take(TITLE_MAX_CHARS).collect();
        format!("{truncated}...")
    } else {
        title.to_string()
    }
}
