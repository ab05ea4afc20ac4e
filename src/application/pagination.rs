//! Cursor-paginated channel history retrieval.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::domain::{
    compare_slack_ts, parse_slack_ts, settle, CallOutcome, DateRange, ExportStage, FailurePolicy,
    Message, Result,
};
use crate::infrastructure::SlackApi;

/// Largest page Slack accepts for `conversations.history`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Parameters of a history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub page_size: u32,
    pub date_range: DateRange,
    /// Sleep between consecutive page requests.
    pub page_delay: Duration,
}

impl FetchOptions {
    /// Page size actually requested, within `1..=1000`.
    #[must_use]
    pub const fn effective_page_size(&self) -> u32 {
        if self.page_size == 0 {
            1
        } else if self.page_size > MAX_PAGE_SIZE {
            MAX_PAGE_SIZE
        } else {
            self.page_size
        }
    }
}

/// Fetch every top-level message of a channel, oldest first.
///
/// `on_page` receives the running message and page counts after each page.
///
/// # Errors
/// Any page failure aborts the fetch with a `message_fetch` stage error.
pub fn fetch_all_messages<A: SlackApi + ?Sized>(
    api: &A,
    channel_id: &str,
    options: &FetchOptions,
    mut on_page: impl FnMut(usize, usize),
) -> Result<Vec<Message>> {
    let limit = options.effective_page_size();
    let mut messages = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page_number = pages + 1;
        let page = match settle(
            api.channel_history(channel_id, limit, cursor.as_deref()),
            FailurePolicy::Abort,
        ) {
            CallOutcome::Done(page) => page,
            CallOutcome::Degraded(err) | CallOutcome::Failed(err) => {
                return Err(err.at_stage(ExportStage::MessageFetch, format!("page {page_number}")));
            }
        };

        pages = page_number;
        let received = page.messages.len();
        let kept = filter_by_date(page.messages, &options.date_range);
        debug!(page = pages, received, kept = kept.len(), "Fetched history page");
        messages.extend(kept);

        on_page(messages.len(), pages);

        match page.next_cursor {
            Some(next) => {
                cursor = Some(next);
                if !options.page_delay.is_zero() {
                    thread::sleep(options.page_delay);
                }
            }
            None => break,
        }
    }

    messages.sort_by(|a, b| compare_slack_ts(&a.ts, &b.ts));
    info!(pages, messages = messages.len(), "Fetched channel history");

    Ok(messages)
}

/// Keep messages whose timestamp falls inside `range`.
///
/// An unbounded range keeps everything, including unparseable timestamps.
#[must_use]
pub fn filter_by_date(messages: Vec<Message>, range: &DateRange) -> Vec<Message> {
    if range.is_unbounded() {
        return messages;
    }

    messages
        .into_iter()
        .filter(|msg| parse_slack_ts(&msg.ts).is_ok_and(|at| range.contains(at)))
        .collect()
}
