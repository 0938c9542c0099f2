//! Configuration system (layered: code > env > TOML file > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Engine configuration.
///
/// Resolution order, lowest to highest:
/// 1. Built-in defaults
/// 2. A TOML file (`ChatConfig::load`)
/// 3. `ROCI_CHAT_*` environment variables (a `.env` file is honored)
/// 4. Explicit `with_*` setters
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub max_iterations: u32,
    pub response_timeout_secs: u64,
    pub tool_workers: usize,
    pub tool_error_prefix: String,
    pub max_tool_calls_per_turn: usize,
    pub max_tool_arguments_bytes: usize,
    /// Longest SSE line the transport buffers before failing the stream.
    pub max_line_bytes: usize,
    pub session: SessionConfig,
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("system_prompt", &self.system_prompt)
            .field("max_iterations", &self.max_iterations)
            .field("response_timeout_secs", &self.response_timeout_secs)
            .field("tool_workers", &self.tool_workers)
            .field("tool_error_prefix", &self.tool_error_prefix)
            .field("max_tool_calls_per_turn", &self.max_tool_calls_per_turn)
            .field("max_tool_arguments_bytes", &self.max_tool_arguments_bytes)
            .field("max_line_bytes", &self.max_line_bytes)
            .field("session", &self.session)
            .finish()
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            system_prompt: None,
            max_iterations: 5,
            response_timeout_secs: 30,
            tool_workers: 4,
            tool_error_prefix: "Error: ".to_string(),
            max_tool_calls_per_turn: 32,
            max_tool_arguments_bytes: 256 * 1024,
            max_line_bytes: 1024 * 1024,
            session: SessionConfig::default(),
        }
    }
}

/// Session store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ceiling on stored messages per session.
    pub max_messages: usize,
    /// Cache TTL, refreshed on every read and append.
    pub timeout_minutes: u64,
    pub cache_capacity: usize,
    pub key_prefix: String,
    /// Where the file repository keeps session records.
    pub data_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_messages: 20,
            timeout_minutes: 30,
            cache_capacity: 10_000,
            key_prefix: "chat:session:".to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes * 60)
    }
}

impl ChatConfig {
    /// Defaults overlaid with the environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the TOML file at `path` (if given), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| ChatError::Configuration(format!("Invalid config file: {e}")))
    }

    fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Overlay values from an environment lookup.
    ///
    /// `OPENAI_API_KEY` is used when `ROCI_CHAT_API_KEY` is absent.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(model) = lookup("ROCI_CHAT_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("ROCI_CHAT_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = lookup("ROCI_CHAT_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(prompt) = lookup("ROCI_CHAT_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }
        if let Some(dir) = lookup("ROCI_CHAT_DATA_DIR") {
            self.session.data_dir = PathBuf::from(dir);
        }
        parse_env(&lookup, "ROCI_CHAT_MAX_ITERATIONS", &mut self.max_iterations)?;
        parse_env(
            &lookup,
            "ROCI_CHAT_RESPONSE_TIMEOUT_SECS",
            &mut self.response_timeout_secs,
        )?;
        parse_env(&lookup, "ROCI_CHAT_TOOL_WORKERS", &mut self.tool_workers)?;
        parse_env(
            &lookup,
            "ROCI_CHAT_MAX_MESSAGES",
            &mut self.session.max_messages,
        )?;
        parse_env(
            &lookup,
            "ROCI_CHAT_SESSION_TIMEOUT_MINUTES",
            &mut self.session.timeout_minutes,
        )?;
        Ok(())
    }

    /// Check every bounded setting.
    pub fn validate(&self) -> Result<()> {
        check_range("session.max_messages", self.session.max_messages, 5, 100)?;
        check_range(
            "session.timeout_minutes",
            self.session.timeout_minutes,
            5,
            1440,
        )?;
        check_range("response_timeout_secs", self.response_timeout_secs, 5, 120)?;
        if self.max_iterations == 0 {
            return Err(ChatError::Configuration(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(ChatError::Configuration(
                "max_line_bytes must be at least 1".into(),
            ));
        }
        if self.tool_workers == 0 {
            return Err(ChatError::Configuration(
                "tool_workers must be at least 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ChatError::Configuration("model must not be empty".into()));
        }
        Ok(())
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_response_timeout_secs(mut self, secs: u64) -> Self {
        self.response_timeout_secs = secs;
        self
    }

    pub fn with_tool_workers(mut self, workers: usize) -> Self {
        self.tool_workers = workers;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) -> Result<()>
where
    T::Err: fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| ChatError::Configuration(format!("{key}={raw:?}: {e}")))?;
    }
    Ok(())
}

fn check_range<T>(name: &str, value: T, min: T, max: T) -> Result<()>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ChatError::Configuration(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

fn default_data_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".roci").join("sessions"))
        .unwrap_or_else(|| PathBuf::from(".roci").join("sessions"))
}
