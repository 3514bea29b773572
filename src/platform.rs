//! Chat platform port used by the purge plugin.
//!
//! Telegram is the only real implementation; tests use an in-memory fake.

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::history::HistoryMessage;
use crate::purge::ScopeKey;

/// What a batch delete actually removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Ids confirmed deleted, in request order.
    pub deleted: Vec<i32>,
    /// Why the remaining ids were not deleted.
    pub error: Option<String>,
}

impl DeleteReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            deleted: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Up to `limit` most recent messages in the scope, newest first.
    async fn recent_messages(&self, scope: &ScopeKey, limit: usize) -> Result<Vec<HistoryMessage>, String>;

    /// Delete the given messages as one batch. Ids deleted before a failure
    /// are still reported.
    async fn delete_messages(&self, scope: &ScopeKey, message_ids: &[i32]) -> DeleteReport;

    /// Whether the user administers the chat.
    async fn is_moderator(&self, guild_id: &str, user_id: i64) -> Result<bool, String>;

    /// Age past which messages can no longer be deleted, if the platform has one.
    fn delete_window(&self) -> Option<TimeDelta> {
        None
    }
}
