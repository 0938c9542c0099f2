//! Durable session repositories.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ChatError, Result};
use crate::types::{SessionRecord, SessionSummary};

/// Storage abstraction for durable session records.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Insert or update a record. An existing record holding more messages
    /// than `record` is kept.
    async fn upsert(&self, record: SessionRecord) -> Result<()>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// A user's sessions, most recently updated first, at most `limit`.
    async fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>>;
}

fn keeps_existing(existing: &SessionRecord, incoming: &SessionRecord) -> bool {
    incoming.messages.len() < existing.messages.len()
}

fn newest_first(mut summaries: Vec<SessionSummary>, limit: usize) -> Vec<SessionSummary> {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    summaries.truncate(limit);
    summaries
}

/// Repository held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionRepository {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.records().get(session_id).cloned())
    }

    async fn upsert(&self, record: SessionRecord) -> Result<()> {
        let mut records = self.records();
        if let Some(existing) = records.get(&record.session_id) {
            if keeps_existing(existing, &record) {
                tracing::debug!(session_id = %record.session_id, "keeping more complete stored record");
                return Ok(());
            }
        }
        records.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.records().remove(session_id);
        Ok(())
    }

    async fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>> {
        let summaries = self
            .records()
            .values()
            .filter(|record| record.user_id == user_id)
            .map(SessionSummary::from)
            .collect();
        Ok(newest_first(summaries, limit))
    }
}

/// One JSON file per session under a base directory.
#[derive(Debug)]
pub struct FileSessionRepository {
    base_dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileSessionRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", file_stem(session_id)))
    }

    async fn read_record(path: &Path) -> Result<Option<SessionRecord>> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ChatError::Storage(format!("{}: {err}", path.display()))),
        };
        let record = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }
}

#[async_trait]
impl SessionRepository for FileSessionRepository {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Self::read_record(&self.record_path(session_id)).await
    }

    async fn upsert(&self, record: SessionRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.record_path(&record.session_id);
        if let Some(existing) = Self::read_record(&path).await? {
            if keeps_existing(&existing, &record) {
                tracing::debug!(session_id = %record.session_id, "keeping more complete stored record");
                return Ok(());
            }
        }

        tokio::fs::create_dir_all(&self.base_dir).await?;
        let serialized = serde_json::to_vec_pretty(&record)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.record_path(session_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ChatError::Storage(err.to_string())),
        }
    }

    /// Scans every record file. Unreadable files are logged and skipped.
    async fn list_by_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ChatError::Storage(format!("{}: {err}", self.base_dir.display()))),
        };
        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) if record.user_id == user_id => {
                    summaries.push(SessionSummary::from(&record));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable session file"),
            }
        }
        Ok(newest_first(summaries, limit))
    }
}

/// Session ids are UUIDs in practice; anything else is reduced to a safe stem.
fn file_stem(session_id: &str) -> String {
    let stem: String = session_id
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, Session};
    use tempfile::TempDir;

    fn record(id: &str, messages: &[&str]) -> SessionRecord {
        record_for(id, 1, messages)
    }

    fn record_for(id: &str, user_id: i64, messages: &[&str]) -> SessionRecord {
        let mut session = Session::new(id, user_id);
        session.messages = messages.iter().map(|m| ChatMessage::user(*m)).collect();
        session.refresh_title();
        SessionRecord::from(&session)
    }

    fn updated(mut record: SessionRecord, minutes_ago: i64) -> SessionRecord {
        record.updated_at = chrono::Utc::now() - chrono::Duration::minutes(minutes_ago);
        record
    }

    #[tokio::test]
    async fn file_repository_lists_a_users_sessions_newest_first() {
        let dir = TempDir::new().unwrap();
        let repo = FileSessionRepository::new(dir.path());
        repo.upsert(updated(record_for("old", 7, &["first trip"]), 30)).await.unwrap();
        repo.upsert(updated(record_for("new", 7, &["second trip"]), 1)).await.unwrap();
        repo.upsert(updated(record_for("mid", 7, &["third trip"]), 10)).await.unwrap();
        repo.upsert(record_for("other", 8, &["not mine"])).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), "{oops").unwrap();

        let listed = repo.list_by_user(7, 2).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);
        assert_eq!(listed[0].title, "second trip");
        assert_eq!(listed[0].message_count, 1);
        assert!(repo.list_by_user(7, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_a_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let repo = FileSessionRepository::new(dir.path().join("never-created"));
        assert!(repo.list_by_user(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_repository_lists_by_user() {
        let repo = InMemorySessionRepository::new();
        repo.upsert(updated(record_for("a", 1, &["x"]), 5)).await.unwrap();
        repo.upsert(updated(record_for("b", 1, &["y"]), 1)).await.unwrap();
        repo.upsert(record_for("c", 2, &["z"])).await.unwrap();

        let ids: Vec<_> = repo
            .list_by_user(1, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn file_repository_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = FileSessionRepository::new(dir.path());
        repo.upsert(record("s1", &["hello"])).await.unwrap();

        let loaded = repo.load("s1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "hello");
        assert_eq!(loaded.messages.len(), 1);
        assert!(repo.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_repository_keeps_more_complete_record() {
        let dir = TempDir::new().unwrap();
        let repo = FileSessionRepository::new(dir.path());
        repo.upsert(record("s1", &["a", "b"])).await.unwrap();
        repo.upsert(record("s1", &["a"])).await.unwrap();
        assert_eq!(repo.load("s1").await.unwrap().unwrap().messages.len(), 2);

        repo.upsert(record("s1", &["a", "b", "c"])).await.unwrap();
        assert_eq!(repo.load("s1").await.unwrap().unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn file_repository_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let repo = FileSessionRepository::new(dir.path());
        repo.upsert(record("s1", &["a"])).await.unwrap();
        repo.delete("s1").await.unwrap();
        repo.delete("s1").await.unwrap();
        assert!(repo.load("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{oops").unwrap();
        let repo = FileSessionRepository::new(dir.path());
        assert!(repo.load("bad").await.is_err());
    }

    #[tokio::test]
    async fn in_memory_repository_applies_same_rule() {
        let repo = InMemorySessionRepository::new();
        repo.upsert(record("s1", &["a", "b"])).await.unwrap();
        repo.upsert(record("s1", &["a"])).await.unwrap();
        assert_eq!(repo.load("s1").await.unwrap().unwrap().messages.len(), 2);
        repo.delete("s1").await.unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn file_stem_neutralizes_path_characters() {
        assert_eq!(file_stem("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_stem("3f2b-11"), "3f2b-11");
        assert_eq!(file_stem(""), "_");
    }
}
