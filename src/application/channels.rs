//! Member channel lookup.

use crate::domain::{AppError, Channel, Result};
use crate::infrastructure::SlackApi;

/// Find a member channel by name, with or without a leading `#`.
///
/// # Errors
/// Returns `ChannelNotFound` if no member channel has that name.
pub fn find_channel_by_name<A: SlackApi + ?Sized>(api: &A, name: &str) -> Result<Channel> {
    let wanted = name.trim().trim_start_matches('#');
    find_channel(api, name, |c| c.name == wanted)
}

/// Find a member channel by id.
///
/// # Errors
/// Returns `ChannelNotFound` if no member channel has that id.
pub fn find_channel_by_id<A: SlackApi + ?Sized>(api: &A, id: &str) -> Result<Channel> {
    let wanted = id.trim();
    find_channel(api, id, |c| c.id == wanted)
}

fn find_channel<A: SlackApi + ?Sized>(
    api: &A,
    requested: &str,
    matches: impl Fn(&Channel) -> bool,
) -> Result<Channel> {
    api.list_channels()?
        .into_iter()
        .find(|c| matches(c))
        .ok_or_else(|| AppError::ChannelNotFound {
            channel_id: requested.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{channel, MockSlackApi};

    fn api() -> MockSlackApi {
        MockSlackApi::new()
            .with_channel(channel("C1", "general"))
            .with_channel(channel("C2", "random"))
    }

    #[test]
    fn test_find_by_name_accepts_hash_prefix() {
        assert_eq!(find_channel_by_name(&api(), "#random").unwrap().id, "C2");
        assert_eq!(find_channel_by_name(&api(), " general ").unwrap().id, "C1");
    }

    #[test]
    fn test_find_by_id() {
        assert_eq!(find_channel_by_id(&api(), "C2").unwrap().name, "random");
        assert!(matches!(
            find_channel_by_id(&api(), "C9"),
            Err(AppError::ChannelNotFound { channel_id }) if channel_id == "C9"
        ));
    }

    #[test]
    fn test_list_failure_is_propagated() {
        let api = api().fail_channels();
        assert!(matches!(
            find_channel_by_name(&api, "general"),
            Err(AppError::SlackApi { .. })
        ));
    }
}
