//! Author directory resolution.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::domain::{
    settle, CallOutcome, ExportStage, FailurePolicy, Result, ThreadedMessage, User,
};
use crate::infrastructure::SlackApi;

/// Every distinct non-empty author id over parents and replies.
#[must_use]
pub fn collect_user_ids(messages: &[ThreadedMessage]) -> BTreeSet<String> {
    messages
        .iter()
        .flat_map(ThreadedMessage::iter_all)
        .filter(|msg| !msg.user.is_empty())
        .map(|msg| msg.user.clone())
        .collect()
}

/// Look up every referenced author in the workspace directory.
///
/// Ids missing from the directory get a placeholder user.
///
/// # Errors
/// A directory failure aborts with a `user_fetch` stage error.
pub fn resolve_users<A: SlackApi + ?Sized>(
    api: &A,
    messages: &[ThreadedMessage],
) -> Result<BTreeMap<String, User>> {
    let ids = collect_user_ids(messages);
    if ids.is_empty() {
        debug!("No message authors to resolve");
        return Ok(BTreeMap::new());
    }

    let directory = match settle(api.list_users(), FailurePolicy::Abort) {
        CallOutcome::Done(users) => users,
        CallOutcome::Degraded(err) | CallOutcome::Failed(err) => {
            return Err(err.at_stage(ExportStage::UserFetch, "users.list"));
        }
    };

    let mut by_id: BTreeMap<String, User> = directory
        .into_iter()
        .filter(|user| ids.contains(&user.id))
        .map(|user| (user.id.clone(), user))
        .collect();

    let mut placeholders = 0usize;
    for id in &ids {
        if !by_id.contains_key(id) {
            debug!(user_id = %id, "User missing from directory, using placeholder");
            by_id.insert(id.clone(), User::placeholder(id));
            placeholders += 1;
        }
    }

    info!(users = by_id.len(), placeholders, "Resolved message authors");
    Ok(by_id)
}
