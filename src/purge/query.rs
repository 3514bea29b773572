//! Filtering and formatting of stored purge logs.

use crate::purge::{LogEntry, LogStore, PurgeError, ScopeKey};

pub const DEFAULT_QUERY_LIMIT: usize = 5;
pub const MAX_QUERY_LIMIT: usize = 20;

/// Most recent `limit` entries for the scope, optionally for one user,
/// in stored order.
pub fn query(
    store: &LogStore,
    scope: &ScopeKey,
    user_id: Option<i64>,
    limit: usize,
) -> Result<Vec<LogEntry>, PurgeError> {
    if limit > MAX_QUERY_LIMIT {
        return Err(PurgeError::InvalidArgument(format!(
            "limit cannot exceed {MAX_QUERY_LIMIT}, got {limit}"
        )));
    }
    if limit == 0 {
        return Err(PurgeError::InvalidArgument("limit must be at least 1".to_string()));
    }

    let mut entries: Vec<LogEntry> = store
        .lookup(scope)
        .into_iter()
        .filter(|e| user_id.is_none_or(|id| e.user_id() == id))
        .collect();
    let skip = entries.len().saturating_sub(limit);
    entries.drain(..skip);
    Ok(entries)
}

/// One line per entry, or a "nothing found" note.
pub fn format_entries(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "No purge logs found.".to_string();
    }
    entries.iter().map(LogEntry::format).collect::<Vec<_>>().join("\n")
}
