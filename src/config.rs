use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::{ChatId, UserId};

use crate::completion::{DEFAULT_COMPLETION_URL, DEFAULT_MODEL};
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::purge::executor::DEFAULT_SCAN_MULTIPLIER;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    owner_ids: Vec<u64>,
    telegram_bot_token: String,
    /// Paste service endpoint for purge transcripts.
    archive_url: String,
    completion_url: Option<String>,
    completion_model: Option<String>,
    /// Used until a key is set with /setkey.
    #[serde(default)]
    completion_api_key: String,
    #[serde(default = "default_max_tokens")]
    completion_max_tokens: u32,
    /// Purges scan `amount × scan_multiplier` recent messages.
    #[serde(default = "default_scan_multiplier")]
    scan_multiplier: usize,
    /// Observed messages kept per chat topic.
    #[serde(default = "default_history_capacity")]
    history_capacity: usize,
    /// Empty = every group.
    #[serde(default)]
    allowed_groups: Vec<i64>,
    log_chat_id: Option<i64>,
    /// Directory for state files (logs, stored API key). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_max_tokens() -> u32 {
    500
}

fn default_scan_multiplier() -> usize {
    DEFAULT_SCAN_MULTIPLIER
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

pub struct Config {
    pub owner_ids: Vec<UserId>,
    pub telegram_bot_token: String,
    pub archive_url: String,
    pub completion_url: String,
    pub completion_model: String,
    pub completion_api_key: Option<String>,
    pub completion_max_tokens: u32,
    pub scan_multiplier: usize,
    pub history_capacity: usize,
    pub allowed_groups: HashSet<ChatId>,
    pub log_chat_id: Option<ChatId>,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.owner_ids.is_empty() {
            return Err(ConfigError::Validation("owner_ids must contain at least one owner ID".into()));
        }
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if !file.archive_url.starts_with("http://") && !file.archive_url.starts_with("https://") {
            return Err(ConfigError::Validation("archive_url must be an http(s) URL".into()));
        }
        if file.scan_multiplier == 0 {
            return Err(ConfigError::Validation("scan_multiplier must be at least 1".into()));
        }
        if file.history_capacity == 0 {
            return Err(ConfigError::Validation("history_capacity must be at least 1".into()));
        }

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            owner_ids: file.owner_ids.into_iter().map(UserId).collect(),
            telegram_bot_token: file.telegram_bot_token,
            archive_url: file.archive_url,
            completion_url: file.completion_url.unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
            completion_model: file.completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            completion_api_key: Some(file.completion_api_key).filter(|k| !k.is_empty()),
            completion_max_tokens: file.completion_max_tokens,
            scan_multiplier: file.scan_multiplier,
            history_capacity: file.history_capacity,
            allowed_groups: file.allowed_groups.into_iter().map(ChatId).collect(),
            log_chat_id: file.log_chat_id.map(ChatId),
            data_dir,
        })
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id)
    }

    pub fn is_allowed_group(&self, chat_id: ChatId) -> bool {
        self.allowed_groups.is_empty() || self.allowed_groups.contains(&chat_id)
    }
}
