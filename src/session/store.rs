//! Dual-tier session store: a TTL cache in front of a durable repository.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use mini_moka::sync::Cache;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::repository::SessionRepository;
use crate::config::SessionConfig;
use crate::error::{ChatError, Result};
use crate::types::{ChatMessage, Session, SessionRecord, SessionSummary};

/// Per-session coordination state.
#[derive(Debug, Default)]
struct SessionSlot {
    /// Serializes read-modify-write on the cached session.
    lock: tokio::sync::Mutex<()>,
    /// Sequence number of the latest scheduled snapshot.
    scheduled: AtomicU64,
    /// Snapshots numbered at or below this are never written. Held across
    /// each repository write so writes for one session never overlap.
    floor: tokio::sync::Mutex<u64>,
}

type Slots = DashMap<String, Arc<SessionSlot>>;

/// Drop a slot once nothing but the table refers to it.
fn release_slot(slots: &Slots, session_id: &str, slot: Arc<SessionSlot>) {
    drop(slot);
    slots.remove_if(session_id, |_, slot| Arc::strong_count(slot) == 1);
}

/// Session persistence shared by every chat request.
///
/// The cache is authoritative. Repository writes happen on detached tasks and
/// their failures are only logged. Writes for one session land in the order
/// they were scheduled; a snapshot overtaken by a newer one, or by `clear`, is
/// skipped.
pub struct SessionStore {
    cache: Cache<String, String>,
    repository: Arc<dyn SessionRepository>,
    config: SessionConfig,
    slots: Arc<Slots>,
    persist_tasks: TaskTracker,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("cached", &self.cache.entry_count())
            .field("config", &self.config)
            .finish()
    }
}

impl SessionStore {
    pub fn new(repository: Arc<dyn SessionRepository>, config: SessionConfig) -> Self {
        let idle = config.timeout();
        Self::with_cache_idle(repository, config, idle)
    }

    /// Like [`SessionStore::new`] with an explicit cache idle timeout, for
    /// expiries shorter than the minute granularity of `SessionConfig`.
    pub fn with_cache_idle(
        repository: Arc<dyn SessionRepository>,
        config: SessionConfig,
        idle: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity as u64)
            .time_to_idle(idle)
            .build();
        Self {
            cache,
            repository,
            config,
            slots: Arc::new(DashMap::new()),
            persist_tasks: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn cache_key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, session_id)
    }

    fn slot(&self, session_id: &str) -> Arc<SessionSlot> {
        Arc::clone(self.slots.entry(session_id.to_string()).or_default().value())
    }

    fn cache_put(&self, session: &Session) -> Result<()> {
        let value = serde_json::to_string(session)?;
        self.cache.insert(self.cache_key(&session.session_id), value);
        Ok(())
    }

    fn cache_take(&self, session_id: &str) -> Option<Session> {
        let key = self.cache_key(session_id);
        let raw = self.cache.get(&key)?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(session_id, error = %e, "dropping unreadable cached session");
                self.cache.invalidate(&key);
                None
            }
        }
    }

    /// Schedule a repository write of `session`.
    fn persist(&self, session: &Session, slot: Arc<SessionSlot>) {
        let seq = slot.scheduled.fetch_add(1, Ordering::SeqCst) + 1;
        let record = SessionRecord::from(session);
        let repository = Arc::clone(&self.repository);
        let slots = Arc::clone(&self.slots);
        self.persist_tasks.spawn(async move {
            let session_id = record.session_id.clone();
            {
                let mut floor = slot.floor.lock().await;
                if seq <= *floor {
                    debug!(session_id = %session_id, seq, "skipping superseded snapshot");
                } else {
                    match repository.upsert(record).await {
                        Ok(()) => debug!(session_id = %session_id, seq, "session persisted"),
                        Err(e) => warn!(session_id = %session_id, error = %e, "session persistence failed"),
                    }
                    *floor = seq;
                }
            }
            release_slot(&slots, &session_id, slot);
        });
    }

    /// Create an empty session and return its id.
    pub fn create(&self, user_id: i64) -> Result<String> {
        let session = Session::new(uuid::Uuid::new_v4().to_string(), user_id);
        self.cache_put(&session)?;
        self.persist(&session, self.slot(&session.session_id));
        debug!(session_id = %session.session_id, user_id, "session created");
        Ok(session.session_id)
    }

    /// Load a session, cache first, falling back to the repository.
    ///
    /// A hit refreshes the cache TTL and `last_access_time`.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let slot = self.slot(session_id);
        let result = {
            let _guard = slot.lock.lock().await;
            self.get_locked(session_id).await
        };
        release_slot(&self.slots, session_id, slot);
        result
    }

    async fn get_locked(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(mut session) = self.load(session_id).await else {
            return Ok(None);
        };
        session.touch();
        self.cache_put(&session)?;
        Ok(Some(session))
    }

    async fn load(&self, session_id: &str) -> Option<Session> {
        if let Some(session) = self.cache_take(session_id) {
            return Some(session);
        }
        match self.repository.load(session_id).await {
            Ok(Some(record)) => {
                debug!(session_id, "session loaded from repository");
                Some(record.into_session())
            }
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, error = %e, "repository read failed");
                None
            }
        }
    }

    /// Append a message, trimming to the ceiling.
    ///
    /// Appending to an unknown session is logged and ignored.
    pub async fn append(&self, session_id: &str, message: ChatMessage) -> Result<()> {
        let slot = self.slot(session_id);
        let result = {
            let _guard = slot.lock.lock().await;
            self.append_locked(session_id, message, &slot).await
        };
        release_slot(&self.slots, session_id, slot);
        result
    }

    async fn append_locked(
        &self,
        session_id: &str,
        message: ChatMessage,
        slot: &Arc<SessionSlot>,
    ) -> Result<()> {
        let Some(mut session) = self.load(session_id).await else {
            warn!(session_id, "append to unknown session ignored");
            return Ok(());
        };
        session.messages.push(message);
        session.refresh_title();
        session.trim_to(self.config.max_messages);
        session.touch();
        self.cache_put(&session)?;
        self.persist(&session, Arc::clone(slot));
        Ok(())
    }

    /// Replace a session's title.
    pub async fn rename(&self, session_id: &str, title: &str) -> Result<()> {
        let slot = self.slot(session_id);
        let result = {
            let _guard = slot.lock.lock().await;
            self.rename_locked(session_id, title, &slot).await
        };
        release_slot(&self.slots, session_id, slot);
        result
    }

    async fn rename_locked(&self, session_id: &str, title: &str, slot: &Arc<SessionSlot>) -> Result<()> {
        let mut session = self
            .load(session_id)
            .await
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))?;
        session.rename(title);
        session.touch();
        self.cache_put(&session)?;
        self.persist(&session, Arc::clone(slot));
        debug!(session_id, title = %session.title, "session renamed");
        Ok(())
    }

    /// True if either tier holds the session.
    pub async fn exists(&self, session_id: &str) -> bool {
        if self.cache.contains_key(&self.cache_key(session_id)) {
            return true;
        }
        match self.repository.load(session_id).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!(session_id, error = %e, "repository read failed");
                false
            }
        }
    }

    /// True if the session exists and belongs to `user_id`.
    pub async fn is_owned_by(&self, session_id: &str, user_id: i64) -> bool {
        self.load(session_id)
            .await
            .is_some_and(|session| session.user_id == user_id)
    }

    /// A user's durable sessions, most recently updated first.
    ///
    /// Writes still in flight are not visible until they land; `flush` first
    /// when that matters.
    pub async fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.repository.list_by_user(user_id, limit).await
    }

    /// Delete from both tiers. Repository failures are logged.
    ///
    /// Waits for a repository write already under way; snapshots scheduled
    /// before the clear are discarded.
    pub async fn clear(&self, session_id: &str) {
        let slot = self.slot(session_id);
        {
            let _guard = slot.lock.lock().await;
            let mut floor = slot.floor.lock().await;
            *floor = (*floor).max(slot.scheduled.load(Ordering::SeqCst));
            if let Err(e) = self.repository.delete(session_id).await {
                warn!(session_id, error = %e, "repository delete failed");
            }
            self.cache.invalidate(&self.cache_key(session_id));
        }
        release_slot(&self.slots, session_id, slot);
        debug!(session_id, "session cleared");
    }

    /// Wait for every scheduled repository write to finish.
    pub async fn flush(&self) {
        self.persist_tasks.close();
        self.persist_tasks.wait().await;
        self.persist_tasks.reopen();
    }
}
