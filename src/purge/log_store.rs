//! Rolling purge log, partitioned by (chat, topic).
//!
//! Lives for the process lifetime only. Each scope keeps the most recent
//! entries in insertion order; appending past capacity drops the oldest.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Mutex;

/// Entries kept per scope.
pub const DEFAULT_CAPACITY: usize = 10;

/// Identifies one partition of the log: a chat and a topic within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub guild_id: String,
    pub channel_id: String,
}

impl ScopeKey {
    pub fn new(guild_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.guild_id, self.channel_id)
    }
}

/// One recorded purge. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    user_id: i64,
    user_name: String,
    deleted_count: usize,
    timestamp: String,
    archive_url: String,
}

impl LogEntry {
    /// `timestamp` is the already-rendered creation time of the triggering command.
    pub fn new(
        user_id: i64,
        user_name: impl Into<String>,
        deleted_count: usize,
        timestamp: impl Into<String>,
        archive_url: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            deleted_count,
            timestamp: timestamp.into(),
            archive_url: archive_url.into(),
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted_count
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn archive_url(&self) -> &str {
        &self.archive_url
    }

    /// `[timestamp] userName: N messages - archiveUrl`
    pub fn format(&self) -> String {
        format!(
            "[{}] {}: {} messages - {}",
            self.timestamp(),
            self.user_name(),
            self.deleted_count(),
            self.archive_url()
        )
    }
}

/// Bounded per-scope FIFO of purge log entries.
pub struct LogStore {
    capacity: usize,
    scopes: Mutex<HashMap<ScopeKey, VecDeque<LogEntry>>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scopes: Mutex::new(HashMap::new()),
        }
    }

    /// Append an entry, evicting from the front while over capacity.
    pub fn append(&self, scope: &ScopeKey, entry: LogEntry) {
        let mut scopes = self.scopes.lock().expect("log store lock poisoned");
        let entries = scopes.entry(scope.clone()).or_default();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Snapshot of the entries for `scope`, oldest first. Empty if never populated.
    pub fn lookup(&self, scope: &ScopeKey) -> Vec<LogEntry> {
        let scopes = self.scopes.lock().expect("log store lock poisoned");
        scopes
            .get(scope)
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}
