//! Selects, deletes and transcribes a user's recent messages.

use chrono::{Local, Utc};
use regex::{Regex, RegexBuilder};
use tracing::info;

use crate::history::HistoryMessage;
use crate::platform::ChatPlatform;
use crate::purge::{PurgeError, ScopeKey};

/// Default scan window, as a multiple of the requested amount.
pub const DEFAULT_SCAN_MULTIPLIER: usize = 2;

/// What to delete.
#[derive(Debug, Clone)]
pub struct PurgeRequest {
    pub scope: ScopeKey,
    pub target_user_id: i64,
    pub amount: i64,
    pub keyword: Option<String>,
    /// The command message itself; never deleted by the purge.
    pub trigger_message_id: i32,
}

/// Messages actually removed by one run, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deletion {
    pub messages: Vec<HistoryMessage>,
    /// Set when the platform stopped partway; `messages` holds what went before.
    pub error: Option<String>,
}

pub struct DeletionExecutor {
    scan_multiplier: usize,
}

impl DeletionExecutor {
    pub fn new(scan_multiplier: usize) -> Self {
        Self {
            scan_multiplier: scan_multiplier.max(1),
        }
    }

    /// Delete matching messages and return the ones that are gone, oldest first.
    ///
    /// Only `amount × scan_multiplier` recent messages are scanned, so fewer
    /// than `amount` deletions (including none) is a normal outcome. A delete
    /// that fails partway is not an error as long as something was deleted.
    pub async fn run(&self, platform: &dyn ChatPlatform, request: &PurgeRequest) -> Result<Deletion, PurgeError> {
        if request.amount <= 0 {
            return Err(PurgeError::InvalidArgument(format!(
                "amount must be a positive number, got {}",
                request.amount
            )));
        }
        let amount = request.amount as usize;
        let keyword = request
            .keyword
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(keyword_matcher)
            .transpose()?;

        let scan = amount.saturating_mul(self.scan_multiplier);
        let recent = platform
            .recent_messages(&request.scope, scan)
            .await
            .map_err(PurgeError::Platform)?;

        // Messages past the platform's delete window would be silently
        // skipped yet still land in the transcript.
        let cutoff = platform.delete_window().map(|window| Utc::now() - window);

        let mut selected: Vec<HistoryMessage> = recent
            .into_iter()
            .filter(|m| m.message_id != request.trigger_message_id)
            .filter(|m| m.user_id == request.target_user_id)
            .filter(|m| cutoff.is_none_or(|cutoff| m.timestamp >= cutoff))
            .filter(|m| keyword.as_ref().is_none_or(|re| re.is_match(&m.text)))
            .take(amount)
            .collect();

        if selected.is_empty() {
            info!(
                "Purge in {} for user {} matched nothing (scanned {scan})",
                request.scope, request.target_user_id
            );
            return Ok(Deletion::default());
        }

        // Scanned newest first; report in chat order.
        selected.reverse();
        let ids: Vec<i32> = selected.iter().map(|m| m.message_id).collect();
        let report = platform.delete_messages(&request.scope, &ids).await;

        if report.deleted.is_empty()
            && let Some(e) = report.error
        {
            return Err(PurgeError::Platform(e));
        }
        selected.retain(|m| report.deleted.contains(&m.message_id));

        info!(
            "🗑️ Purged {} of {} message(s) from user {} in {}",
            selected.len(),
            ids.len(),
            request.target_user_id,
            request.scope
        );
        Ok(Deletion {
            messages: selected,
            error: report.error,
        })
    }
}

impl Default for DeletionExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_SCAN_MULTIPLIER)
    }
}

fn keyword_matcher(keyword: &str) -> Result<Regex, PurgeError> {
    RegexBuilder::new(&regex::escape(keyword))
        .case_insensitive(true)
        .build()
        .map_err(|e| PurgeError::InvalidArgument(format!("bad keyword '{keyword}': {e}")))
}

/// One `[timestamp] author: content` line per message, in the given order.
pub fn transcript(messages: &[HistoryMessage]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                m.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                m.user_name,
                m.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    use crate::purge::tests::{FakePlatform, msg};

    fn request(amount: i64, keyword: Option<&str>) -> PurgeRequest {
        PurgeRequest {
            scope: ScopeKey::new("-100", "0"),
            target_user_id: 1,
            amount,
            keyword: keyword.map(str::to_string),
            trigger_message_id: 99,
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let platform = FakePlatform::with_messages(vec![msg(1, 1, "spam")]);
        let executor = DeletionExecutor::default();

        for amount in [0, -3] {
            let err = executor.run(&platform, &request(amount, None)).await.unwrap_err();
            assert!(matches!(err, PurgeError::InvalidArgument(_)));
        }
        assert!(platform.deleted().is_empty());
        assert_eq!(platform.scans(), 0);
    }

    #[tokio::test]
    async fn test_deletes_only_target_user_oldest_first() {
        let platform = FakePlatform::with_messages(vec![
            msg(1, 1, "a"),
            msg(2, 2, "b"),
            msg(3, 1, "c"),
            msg(4, 1, "d"),
        ]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(2, None)).await.unwrap();
        let ids: Vec<i32> = deleted.messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(deleted.error, None);
        assert_eq!(platform.deleted(), vec![vec![3, 4]]);
    }

    #[tokio::test]
    async fn test_keyword_is_case_insensitive_substring() {
        let platform = FakePlatform::with_messages(vec![
            msg(1, 1, "Buy CHEAP pills"),
            msg(2, 1, "hello"),
            msg(3, 1, "so cheap!"),
        ]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(5, Some("cheap"))).await.unwrap();
        let ids: Vec<i32> = deleted.messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_keyword_with_regex_metacharacters() {
        let platform = FakePlatform::with_messages(vec![msg(1, 1, "price is $5.00 (cheap)"), msg(2, 1, "price is 5x00")]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(5, Some("5.00 ("))).await.unwrap();
        assert_eq!(deleted.messages.len(), 1);
        assert_eq!(deleted.messages[0].message_id, 1);
    }

    #[tokio::test]
    async fn test_excludes_trigger_message() {
        let platform = FakePlatform::with_messages(vec![msg(98, 1, "hi"), msg(99, 1, "/purge 1 5")]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(5, None)).await.unwrap();
        let ids: Vec<i32> = deleted.messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![98]);
    }

    #[tokio::test]
    async fn test_scan_window_can_under_match() {
        // Target's older messages sit outside the 2 × amount window.
        let platform = FakePlatform::with_messages(vec![
            msg(1, 1, "old"),
            msg(2, 1, "old"),
            msg(3, 2, "x"),
            msg(4, 2, "x"),
            msg(5, 2, "x"),
            msg(6, 1, "new"),
        ]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(2, None)).await.unwrap();
        assert_eq!(deleted.messages.len(), 1);
        assert_eq!(platform.last_scan_limit(), Some(4));
    }

    #[tokio::test]
    async fn test_larger_multiplier_widens_scan() {
        let platform = FakePlatform::with_messages(vec![
            msg(1, 1, "old"),
            msg(2, 2, "x"),
            msg(3, 2, "x"),
            msg(4, 1, "new"),
        ]);
        let executor = DeletionExecutor::new(4);

        let deleted = executor.run(&platform, &request(2, None)).await.unwrap();
        assert_eq!(deleted.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_no_match_skips_delete_call() {
        let platform = FakePlatform::with_messages(vec![msg(1, 2, "not target")]);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(3, None)).await.unwrap();
        assert_eq!(deleted, Deletion::default());
        assert!(platform.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_platform_failure_is_reported() {
        let platform = FakePlatform::with_messages(vec![msg(1, 1, "a")]).failing_deletes();
        let executor = DeletionExecutor::default();

        let err = executor.run(&platform, &request(1, None)).await.unwrap_err();
        assert!(matches!(err, PurgeError::Platform(_)));
    }

    #[tokio::test]
    async fn test_partial_delete_keeps_what_was_deleted() {
        let platform = FakePlatform::with_messages(vec![msg(1, 1, "a"), msg(2, 1, "b"), msg(3, 1, "c")]).failing_after(2);
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(3, None)).await.unwrap();
        let ids: Vec<i32> = deleted.messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(deleted.error.unwrap().contains("can't be deleted"));
    }

    #[tokio::test]
    async fn test_skips_messages_outside_delete_window() {
        let fresh = HistoryMessage {
            timestamp: Utc::now() - TimeDelta::minutes(5),
            ..msg(2, 1, "fresh")
        };
        // msg(1, ..) is dated 2023.
        let platform =
            FakePlatform::with_messages(vec![msg(1, 1, "stale"), fresh]).with_delete_window(TimeDelta::hours(48));
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(5, None)).await.unwrap();
        let ids: Vec<i32> = deleted.messages.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![2]);
        assert_eq!(platform.deleted(), vec![vec![2]]);
    }

    #[tokio::test]
    async fn test_nothing_inside_delete_window_skips_delete_call() {
        let platform = FakePlatform::with_messages(vec![msg(1, 1, "stale")]).with_delete_window(TimeDelta::hours(48));
        let executor = DeletionExecutor::default();

        let deleted = executor.run(&platform, &request(5, None)).await.unwrap();
        assert!(deleted.messages.is_empty());
        assert!(platform.deleted().is_empty());
    }

    #[test]
    fn test_transcript_lines() {
        let messages = vec![msg(1, 1, "first"), msg(2, 1, "second")];
        let text = transcript(&messages);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] alice: first"));
        assert!(lines[1].ends_with("] alice: second"));
    }

    #[test]
    fn test_transcript_empty() {
        assert_eq!(transcript(&[]), "");
    }
}
