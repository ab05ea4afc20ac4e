//! Export statistics aggregation.

use std::collections::HashMap;

use crate::domain::{parse_slack_ts, ExportStatistics, Message, ReactionStat, ThreadedMessage};

/// Number of entries kept in `top_reactions`.
pub const TOP_REACTIONS: usize = 10;

/// Compute statistics over messages and their replies in a single pass.
///
/// Timing fields are left at zero.
#[must_use]
pub fn calculate_statistics(messages: &[ThreadedMessage], total_users: usize) -> ExportStatistics {
    let mut stats = ExportStatistics {
        total_users,
        ..ExportStatistics::default()
    };
    let mut reactions = ReactionTally::default();

    for threaded in messages {
        if !threaded.replies.is_empty() {
            stats.total_threads += 1;
            stats.total_replies += threaded.replies.len();
        }

        for msg in threaded.iter_all() {
            count_message(&mut stats, &mut reactions, msg);
        }
    }

    stats.top_reactions = reactions.top(TOP_REACTIONS);
    stats
}

fn count_message(stats: &mut ExportStatistics, reactions: &mut ReactionTally, msg: &Message) {
    stats.total_messages += 1;

    if !msg.user.is_empty() {
        *stats.messages_by_user.entry(msg.user.clone()).or_default() += 1;
    }

    if let Ok(at) = parse_slack_ts(&msg.ts) {
        let day = at.format("%Y-%m-%d").to_string();
        *stats.messages_by_date.entry(day).or_default() += 1;
    }

    stats.total_attachments += msg.attachments.len();
    stats.total_files += msg.files.len();

    for reaction in &msg.reactions {
        stats.total_reactions += reaction.count;
        reactions.add(&reaction.name, reaction.count);
    }
}

/// Per-emoji totals in first-seen order.
#[derive(Default)]
struct ReactionTally {
    totals: Vec<ReactionStat>,
    index: HashMap<String, usize>,
}

impl ReactionTally {
    fn add(&mut self, name: &str, count: u64) {
        if let Some(&i) = self.index.get(name) {
            self.totals[i].count += count;
        } else {
            self.index.insert(name.to_string(), self.totals.len());
            self.totals.push(ReactionStat {
                name: name.to_string(),
                count,
            });
        }
    }

    /// Highest totals first; ties keep first-seen order.
    fn top(mut self, limit: usize) -> Vec<ReactionStat> {
        self.totals.sort_by(|a, b| b.count.cmp(&a.count));
        self.totals.truncate(limit);
        self.totals
    }
}
