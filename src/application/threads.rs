//! Thread reply resolution.

use std::cmp::Ordering;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{
    compare_slack_ts, settle, CallOutcome, FailurePolicy, Message, ThreadedMessage,
};
use crate::infrastructure::SlackApi;

/// Messages with their replies attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadResolution {
    pub messages: Vec<ThreadedMessage>,
    /// One entry per thread whose replies could not be fetched.
    pub warnings: Vec<String>,
    /// Threads whose replies were fetched successfully.
    pub threads_resolved: usize,
}

/// Attach replies to every message that starts a thread.
///
/// Threads are fetched one at a time with `thread_delay` between calls. A
/// failed thread keeps an empty reply list and produces a warning.
/// `on_thread` receives `(done, total)` after each attempt.
pub fn resolve_threads<A: SlackApi + ?Sized>(
    api: &A,
    channel_id: &str,
    messages: Vec<Message>,
    thread_delay: Duration,
    mut on_thread: impl FnMut(usize, usize),
) -> ThreadResolution {
    let total = messages.iter().filter(|m| m.has_unresolved_thread()).count();
    let mut resolution = ThreadResolution {
        messages: Vec::with_capacity(messages.len()),
        ..ThreadResolution::default()
    };
    let mut attempted = 0usize;

    for message in messages {
        if !message.has_unresolved_thread() {
            resolution.messages.push(ThreadedMessage::standalone(message));
            continue;
        }

        if attempted > 0 && !thread_delay.is_zero() {
            thread::sleep(thread_delay);
        }
        attempted += 1;

        let replies = match settle(
            api.thread_replies(channel_id, &message.thread_ts),
            FailurePolicy::Tolerate,
        ) {
            CallOutcome::Done(raw) => {
                resolution.threads_resolved += 1;
                let replies = strip_parent(&message, raw);
                debug!(thread_ts = %message.thread_ts, replies = replies.len(), "Resolved thread");
                replies
            }
            CallOutcome::Degraded(err) | CallOutcome::Failed(err) => {
                warn!(thread_ts = %message.thread_ts, error = %err, "Failed to fetch thread replies");
                resolution
                    .warnings
                    .push(format!("Failed to fetch replies for thread {}: {err}", message.thread_ts));
                Vec::new()
            }
        };

        resolution.messages.push(ThreadedMessage { message, replies });
        on_thread(attempted, total);
    }

    info!(
        threads = total,
        resolved = resolution.threads_resolved,
        failed = resolution.warnings.len(),
        "Resolved thread replies"
    );

    resolution
}

/// Wrap messages without fetching any replies.
#[must_use]
pub fn without_threads(messages: Vec<Message>) -> Vec<ThreadedMessage> {
    messages.into_iter().map(ThreadedMessage::standalone).collect()
}

/// Remove the echoed parent and order replies oldest first.
fn strip_parent(parent: &Message, mut replies: Vec<Message>) -> Vec<Message> {
    replies.retain(|reply| compare_slack_ts(&reply.ts, &parent.ts) != Ordering::Equal);
    replies.sort_by(|a, b| compare_slack_ts(&a.ts, &b.ts));
    replies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{message, reply, thread_parent, MockSlackApi};

    #[test]
    fn test_echoed_parent_is_removed() {
        let api = MockSlackApi::new().with_thread(
            "100.1",
            vec![
                thread_parent("100.1", "U1", 2),
                reply("100.2", "100.1", "U2"),
                reply("100.3", "100.1", "U3"),
            ],
        );

        let resolution = resolve_threads(
            &api,
            "C1",
            vec![thread_parent("100.1", "U1", 2)],
            Duration::ZERO,
            |_, _| {},
        );

        let replies: Vec<&str> = resolution.messages[0]
            .replies
            .iter()
            .map(|m| m.ts.as_str())
            .collect();
        assert_eq!(replies, vec!["100.2", "100.3"]);
        assert_eq!(resolution.threads_resolved, 1);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_replies_are_sorted_numerically() {
        let api = MockSlackApi::new().with_thread(
            "90.0",
            vec![
                reply("100.2", "90.0", "U2"),
                thread_parent("90.0", "U1", 3),
                reply("99.5", "90.0", "U3"),
                reply("100.10", "90.0", "U4"),
            ],
        );

        let resolution = resolve_threads(
            &api,
            "C1",
            vec![thread_parent("90.0", "U1", 3)],
            Duration::ZERO,
            |_, _| {},
        );

        let replies: Vec<&str> = resolution.messages[0]
            .replies
            .iter()
            .map(|m| m.ts.as_str())
            .collect();
        assert_eq!(replies, vec!["99.5", "100.10", "100.2"]);
    }

    #[test]
    fn test_echoed_parent_matches_on_value() {
        let api = MockSlackApi::new().with_thread(
            "100.1",
            vec![
                thread_parent("100.100000", "U1", 1),
                reply("100.2", "100.1", "U2"),
            ],
        );

        let resolution = resolve_threads(
            &api,
            "C1",
            vec![thread_parent("100.1", "U1", 1)],
            Duration::ZERO,
            |_, _| {},
        );

        let replies: Vec<&str> = resolution.messages[0]
            .replies
            .iter()
            .map(|m| m.ts.as_str())
            .collect();
        assert_eq!(replies, vec!["100.2"]);
    }

    #[test]
    fn test_only_thread_parents_are_fetched() {
        let api = MockSlackApi::new()
            .with_thread("2.0", vec![reply("2.5", "2.0", "U2")])
            .with_thread("3.0", vec![reply("3.5", "3.0", "U2")]);

        let mut progress = Vec::new();
        let resolution = resolve_threads(
            &api,
            "C1",
            vec![
                message("1.0", "U1", "plain"),
                thread_parent("2.0", "U1", 1),
                thread_parent("3.0", "U1", 1),
            ],
            Duration::ZERO,
            |done, total| progress.push((done, total)),
        );

        assert_eq!(resolution.messages.len(), 3);
        assert!(resolution.messages[0].replies.is_empty());
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
        assert_eq!(
            api.calls(),
            vec!["conversations.replies C1 ts=2.0", "conversations.replies C1 ts=3.0"]
        );
    }

    #[test]
    fn test_failed_thread_is_degraded() {
        let api = MockSlackApi::new()
            .with_thread("3.0", vec![reply("3.5", "3.0", "U2")])
            .fail_thread("2.0");

        let resolution = resolve_threads(
            &api,
            "C1",
            vec![thread_parent("2.0", "U1", 4), thread_parent("3.0", "U1", 1)],
            Duration::ZERO,
            |_, _| {},
        );

        assert_eq!(resolution.messages.len(), 2);
        assert!(resolution.messages[0].replies.is_empty());
        assert_eq!(resolution.messages[1].replies.len(), 1);
        assert_eq!(resolution.threads_resolved, 1);
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0].contains("2.0"));
        assert!(resolution.warnings[0].contains("thread_not_found"));
    }

    #[test]
    fn test_without_threads_keeps_order() {
        let wrapped = without_threads(vec![message("1.0", "U1", "a"), thread_parent("2.0", "U1", 3)]);
        assert_eq!(wrapped.len(), 2);
        assert!(wrapped.iter().all(|t| t.replies.is_empty()));
        assert_eq!(wrapped[1].message.reply_count, 3);
    }
}
