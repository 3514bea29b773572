//! Telegram client using teloxide.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use teloxide::prelude::*;
use teloxide::types::{ChatMemberKind, MessageId, ReplyParameters, ThreadId};
use tracing::{info, warn};

use crate::history::{HistoryMessage, MessageHistory};
use crate::platform::{ChatPlatform, DeleteReport};
use crate::purge::ScopeKey;

/// Bot API limit for one deleteMessages call.
const DELETE_BATCH_LIMIT: usize = 100;

/// Messages older than this cannot be deleted through the Bot API.
const DELETE_WINDOW_HOURS: i64 = 48;

/// Telegram's maximum message length.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Topic id used for messages outside any forum topic.
pub const GENERAL_TOPIC: i32 = 0;

/// Scope key for a chat and topic.
pub fn scope_for(chat_id: ChatId, topic: i32) -> ScopeKey {
    ScopeKey::new(chat_id.0.to_string(), topic.to_string())
}

/// The forum topic a message belongs to, or the general stream.
pub fn topic_of(msg: &Message) -> i32 {
    if msg.is_topic_message {
        msg.thread_id.map(|t| t.0.0).unwrap_or(GENERAL_TOPIC)
    } else {
        GENERAL_TOPIC
    }
}

/// Username if set, otherwise first name.
pub fn display_name(user: &teloxide::types::User) -> String {
    user.username.clone().unwrap_or_else(|| user.first_name.clone())
}

/// Cut text to Telegram's limit at a char boundary.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{truncated}...")
}

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
    history: Arc<MessageHistory>,
}

impl TelegramClient {
    pub fn new(bot: Bot, history: Arc<MessageHistory>) -> Self {
        Self { bot, history }
    }

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub async fn send_message(
        &self,
        chat_id: ChatId,
        topic: i32,
        text: &str,
        reply_to_message_id: Option<MessageId>,
    ) -> Result<MessageId, String> {
        let mut request = self.bot.send_message(chat_id, truncate_message(text));

        if topic != GENERAL_TOPIC {
            request = request.message_thread_id(ThreadId(MessageId(topic)));
        }
        if let Some(msg_id) = reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(msg_id));
        }

        request.await.map(|msg| msg.id).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    async fn recent_messages(&self, scope: &ScopeKey, limit: usize) -> Result<Vec<HistoryMessage>, String> {
        Ok(self.history.recent(scope, limit))
    }

    async fn delete_messages(&self, scope: &ScopeKey, message_ids: &[i32]) -> DeleteReport {
        let Ok(chat_id) = scope.guild_id.parse::<i64>() else {
            return DeleteReport::failed(format!("Invalid chat id '{}'", scope.guild_id));
        };
        info!("🗑️ Deleting {} message(s) in {}", message_ids.len(), scope);

        let mut report = DeleteReport::default();
        for chunk in message_ids.chunks(DELETE_BATCH_LIMIT) {
            if let Err(e) = self
                .bot
                .delete_messages(ChatId(chat_id), chunk.iter().map(|id| MessageId(*id)))
                .await
            {
                let msg = format!("Failed to delete messages: {e}");
                warn!("{} ({} of {} already deleted)", msg, report.deleted.len(), message_ids.len());
                report.error = Some(msg);
                break;
            }
            self.history.forget(scope, chunk);
            report.deleted.extend_from_slice(chunk);
        }

        report
    }

    async fn is_moderator(&self, guild_id: &str, user_id: i64) -> Result<bool, String> {
        let chat_id: i64 = guild_id.parse().map_err(|_| format!("Invalid chat id '{guild_id}'"))?;

        let member = self
            .bot
            .get_chat_member(ChatId(chat_id), UserId(user_id as u64))
            .await
            .map_err(|e| {
                let msg = format!("Failed to get chat member: {e}");
                warn!("{}", msg);
                msg
            })?;

        Ok(matches!(member.kind, ChatMemberKind::Owner(_) | ChatMemberKind::Administrator(_)))
    }

    // deleteMessages succeeds without deleting anything it is not allowed
    // to touch, so older messages must be left out of the batch.
    fn delete_window(&self) -> Option<TimeDelta> {
        Some(TimeDelta::hours(DELETE_WINDOW_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_for() {
        assert_eq!(scope_for(ChatId(-100123), 0), ScopeKey::new("-100123", "0"));
        assert_eq!(scope_for(ChatId(-100123), 42), ScopeKey::new("-100123", "42"));
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short"), "short");

        let long = "é".repeat(MAX_MESSAGE_CHARS + 10);
        let cut = truncate_message(&long);
        assert_eq!(cut.chars().count(), MAX_MESSAGE_CHARS);
        assert!(cut.ends_with("..."));
    }

    fn client() -> TelegramClient {
        TelegramClient::new(Bot::new("123456:TEST"), Arc::new(MessageHistory::default()))
    }

    #[test]
    fn test_delete_window_is_two_days() {
        assert_eq!(client().delete_window(), Some(TimeDelta::hours(48)));
    }

    #[tokio::test]
    async fn test_delete_with_bad_chat_id_reports_nothing_deleted() {
        let report = client().delete_messages(&ScopeKey::new("not-a-chat", "0"), &[1, 2]).await;
        assert!(report.deleted.is_empty());
        assert!(report.error.unwrap().contains("Invalid chat id"));
    }
}
