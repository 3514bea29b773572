//! Purge plugin: delete a user's recent messages, archive them, keep a log.

pub mod archive;
pub mod executor;
pub mod log_store;
pub mod query;


use std::fmt;

use async_trait::async_trait;
use tracing::info;

use crate::log_chat::AUDIT_TARGET;
use crate::platform::ChatPlatform;

pub use archive::ArchiveUploader;
pub use executor::{Deletion, DeletionExecutor, PurgeRequest, transcript};
pub use log_store::{LogEntry, LogStore, ScopeKey};

/// Errors reported back to the moderator who issued the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeError {
    /// Bad command input; nothing was touched.
    InvalidArgument(String),
    /// The chat platform refused or failed.
    Platform(String),
}

impl fmt::Display for PurgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Platform(msg) => write!(f, "platform error: {msg}"),
        }
    }
}

impl std::error::Error for PurgeError {}

/// Where transcripts go. Always yields a string: a URL or an error description.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn upload(&self, transcript: &str) -> String;
}

#[async_trait]
impl Archive for ArchiveUploader {
    async fn upload(&self, transcript: &str) -> String {
        ArchiveUploader::upload(self, transcript).await
    }
}

/// Result of a purge command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub deleted: usize,
    /// `None` when nothing matched and nothing was archived.
    pub archive_url: Option<String>,
    /// Why some selected messages are still in the chat.
    pub delete_error: Option<String>,
}

impl PurgeOutcome {
    pub fn reply(&self, user_name: &str) -> String {
        let Some(url) = &self.archive_url else {
            return "No messages matched.".to_string();
        };
        let mut reply = format!("Deleted {} message(s) from {user_name}. Archive: {url}", self.deleted);
        if let Some(e) = &self.delete_error {
            reply.push_str(&format!("\nSome messages could not be deleted: {e}"));
        }
        reply
    }
}

/// The purge plugin's state: one log store shared by the purge and query paths.
pub struct PurgePlugin {
    store: LogStore,
    executor: DeletionExecutor,
    archive: Box<dyn Archive>,
}

impl PurgePlugin {
    pub fn new(executor: DeletionExecutor, archive: Box<dyn Archive>) -> Self {
        Self {
            store: LogStore::new(),
            executor,
            archive,
        }
    }

    /// Delete, archive, then log. The log entry is written only once the
    /// upload has finished, with its URL or error text. When the platform
    /// stops partway, whatever it did delete is still archived and logged.
    pub async fn purge(
        &self,
        platform: &dyn ChatPlatform,
        request: &PurgeRequest,
        user_name: &str,
        timestamp: &str,
    ) -> Result<PurgeOutcome, PurgeError> {
        let Deletion { messages: deleted, error } = self.executor.run(platform, request).await?;
        if deleted.is_empty() {
            return Ok(PurgeOutcome {
                deleted: 0,
                archive_url: None,
                delete_error: None,
            });
        }

        let archive_url = self.archive.upload(&transcript(&deleted)).await;
        let entry = LogEntry::new(request.target_user_id, user_name, deleted.len(), timestamp, archive_url.clone());
        self.store.append(&request.scope, entry);
        info!(
            target: AUDIT_TARGET,
            "Purge logged in {}: {} message(s) from {} ({}) → {}",
            request.scope,
            deleted.len(),
            user_name,
            request.target_user_id,
            archive_url
        );

        Ok(PurgeOutcome {
            deleted: deleted.len(),
            archive_url: Some(archive_url),
            delete_error: error,
        })
    }

    /// Formatted purge logs for a scope.
    pub fn logs(&self, scope: &ScopeKey, user_id: Option<i64>, limit: usize) -> Result<String, PurgeError> {
        let entries = query::query(&self.store, scope, user_id, limit)?;
        Ok(query::format_entries(&entries))
    }

    #[cfg(test)]
    pub fn store(&self) -> &LogStore {
        &self.store
    }
}
