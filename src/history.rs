//! Recently observed messages, per (chat, topic).
//!
//! The Bot API cannot read chat history, so purges scan what the bot has
//! seen since it started. Oldest messages fall off once a scope is full.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::purge::ScopeKey;

/// Messages kept per scope unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// A message the bot observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryMessage {
    pub message_id: i32,
    pub user_id: i64,
    /// Display name: the username if set, otherwise the first name.
    pub user_name: String,
    /// Telegram `@username`, if the user has one.
    pub username: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded buffer of observed messages.
pub struct MessageHistory {
    capacity: usize,
    scopes: Mutex<HashMap<ScopeKey, VecDeque<HistoryMessage>>>,
}

impl MessageHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, scope: &ScopeKey, msg: HistoryMessage) {
        let mut scopes = self.scopes.lock().expect("history lock poisoned");
        let messages = scopes.entry(scope.clone()).or_default();
        messages.push_back(msg);
        while messages.len() > self.capacity {
            messages.pop_front();
        }
    }

    /// Apply an edit so keyword matching sees the current text.
    pub fn edit(&self, scope: &ScopeKey, message_id: i32, new_text: &str) {
        let mut scopes = self.scopes.lock().expect("history lock poisoned");
        if let Some(msg) = scopes
            .get_mut(scope)
            .and_then(|messages| messages.iter_mut().find(|m| m.message_id == message_id))
        {
            msg.text = new_text.to_string();
        }
    }

    /// Up to `limit` most recent messages, newest first.
    pub fn recent(&self, scope: &ScopeKey, limit: usize) -> Vec<HistoryMessage> {
        let scopes = self.scopes.lock().expect("history lock poisoned");
        scopes
            .get(scope)
            .map(|messages| messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Drop messages that no longer exist on the platform.
    pub fn forget(&self, scope: &ScopeKey, message_ids: &[i32]) {
        let mut scopes = self.scopes.lock().expect("history lock poisoned");
        if let Some(messages) = scopes.get_mut(scope) {
            messages.retain(|m| !message_ids.contains(&m.message_id));
        }
    }

    /// Resolve `@username` to a user ID from messages seen in the chat.
    /// Case-insensitive; the most recent sighting wins. Only real usernames
    /// match, never first names.
    pub fn resolve_username(&self, guild_id: &str, username: &str) -> Option<(i64, String)> {
        let wanted = username.trim_start_matches('@');
        let scopes = self.scopes.lock().expect("history lock poisoned");
        scopes
            .iter()
            .filter(|(scope, _)| scope.guild_id == guild_id)
            .flat_map(|(_, messages)| messages.iter())
            .filter(|m| m.username.as_deref().is_some_and(|u| u.eq_ignore_ascii_case(wanted)))
            .max_by_key(|m| m.timestamp)
            .map(|m| (m.user_id, m.user_name.clone()))
    }

    /// Last known display name for a user in a chat.
    pub fn user_name(&self, guild_id: &str, user_id: i64) -> Option<String> {
        let scopes = self.scopes.lock().expect("history lock poisoned");
        scopes
            .iter()
            .filter(|(scope, _)| scope.guild_id == guild_id)
            .flat_map(|(_, messages)| messages.iter())
            .filter(|m| m.user_id == user_id)
            .max_by_key(|m| m.timestamp)
            .map(|m| m.user_name.clone())
    }
}

impl Default for MessageHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
