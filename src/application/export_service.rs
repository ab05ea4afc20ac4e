//! Channel export pipeline.
//!
//! Runs the stages of an export in order: channel lookup, history
//! pagination, thread resolution, user resolution, data processing and file
//! generation. Any fatal error aborts the export before a file is written.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, info_span};

use crate::domain::{
    settle, AppError, CallOutcome, Channel, Compression, ExportOptions, ExportResult, ExportStage,
    FailurePolicy, ProcessingTimes, ProgressCallback, ProgressReporter, Result,
};
use crate::infrastructure::SlackApi;

use super::channels::find_channel_by_name;
use super::pagination::{fetch_all_messages, FetchOptions};
use super::serializer::{
    apply_content_filters, build_document, default_output_path, render, write_output,
};
use super::statistics::calculate_statistics;
use super::threads::{resolve_threads, without_threads};
use super::users::resolve_users;

/// Fixed delays between consecutive Slack calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub page_delay: Duration,
    pub thread_delay: Duration,
}

impl RateLimit {
    /// The same delay for pages and threads.
    #[must_use]
    pub const fn uniform(delay: Duration) -> Self {
        Self {
            page_delay: delay,
            thread_delay: delay,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::uniform(Duration::from_millis(100))
    }
}

/// Exports a single channel through a [`SlackApi`].
pub struct ExportService<A: SlackApi> {
    api: A,
    rate_limit: RateLimit,
}

impl<A: SlackApi> ExportService<A> {
    #[must_use]
    pub const fn new(api: A, rate_limit: RateLimit) -> Self {
        Self { api, rate_limit }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Find a member channel by name, with or without a leading `#`.
    ///
    /// # Errors
    /// Returns `ChannelNotFound` if no member channel has that name.
    pub fn find_channel_by_name(&self, name: &str) -> Result<Channel> {
        find_channel_by_name(&self.api, name)
    }

    /// Export one channel to a file.
    ///
    /// `on_progress` receives a snapshot at every stage transition and
    /// intra-stage update.
    ///
    /// # Errors
    /// Returns an error if the options are invalid or any fatal stage fails.
    pub fn export_channel(
        &self,
        options: &ExportOptions,
        on_progress: Option<ProgressCallback<'_>>,
    ) -> Result<ExportResult> {
        validate(options)?;

        let started = Instant::now();
        let exported_at = Utc::now();
        let mut reporter = ProgressReporter::new(started, on_progress);
        let mut times = ProcessingTimes::default();

        info!(channel_id = %options.channel_id, "Starting export");
        reporter.start();

        // Channel lookup
        reporter.enter(ExportStage::ChannelFetch, ExportStage::ChannelFetch.description());
        let (channel, elapsed) = run_stage(ExportStage::ChannelFetch, || {
            self.lookup_channel(&options.channel_id)
        })?;
        times.channel_fetch = elapsed;

        // History
        reporter.enter(ExportStage::MessageFetch, ExportStage::MessageFetch.description());
        let fetch = FetchOptions {
            page_size: options.page_size,
            date_range: options.date_range,
            page_delay: self.rate_limit.page_delay,
        };
        let (messages, elapsed) = run_stage(ExportStage::MessageFetch, || {
            fetch_all_messages(&self.api, &channel.id, &fetch, |fetched, pages| {
                reporter.messages(fetched, pages);
            })
        })?;
        times.message_fetch = elapsed;

        // Threads
        let (mut threaded, warnings) = if options.include_threads {
            reporter.enter(ExportStage::ThreadFetch, ExportStage::ThreadFetch.description());
            let (resolution, elapsed) = run_stage(ExportStage::ThreadFetch, || {
                Ok(resolve_threads(
                    &self.api,
                    &channel.id,
                    messages,
                    self.rate_limit.thread_delay,
                    |done, total| reporter.threads(done, total),
                ))
            })?;
            times.thread_fetch = elapsed;
            (resolution.messages, resolution.warnings)
        } else {
            (without_threads(messages), Vec::new())
        };

        // Users
        reporter.enter(ExportStage::UserFetch, ExportStage::UserFetch.description());
        let (users, elapsed) =
            run_stage(ExportStage::UserFetch, || resolve_users(&self.api, &threaded))?;
        times.user_fetch = elapsed;

        // Processing
        reporter.enter(ExportStage::DataProcessing, ExportStage::DataProcessing.description());
        let processing_started = Instant::now();
        let (document, elapsed) = run_stage(ExportStage::DataProcessing, || {
            apply_content_filters(&mut threaded, options);
            let mut statistics = calculate_statistics(&threaded, users.len());
            statistics.processing_time = ProcessingTimes {
                data_processing: processing_started.elapsed(),
                ..times
            };
            statistics.export_duration = started.elapsed();
            Ok(build_document(
                &channel,
                &threaded,
                &users,
                statistics,
                options,
                exported_at,
            ))
        })?;
        times.data_processing = elapsed;

        // Output
        reporter.enter(ExportStage::FileGeneration, ExportStage::FileGeneration.description());
        let path = options.output_file.clone().unwrap_or_else(|| {
            default_output_path(&options.output_dir, &channel.name, exported_at)
        });
        let (written, elapsed) = run_stage(ExportStage::FileGeneration, || {
            let bytes = render(&document, options.format)?;
            write_output(&path, &bytes, options.compression)
        })
        .map_err(|e| e.at_stage(ExportStage::FileGeneration, path.display().to_string()))?;
        times.file_generation = elapsed;

        let duration = started.elapsed();
        let mut statistics = document.statistics;
        statistics.export_duration = duration;
        statistics.processing_time = times;

        reporter.enter(ExportStage::Complete, "Export completed successfully");
        info!(
            path = %written.path.display(),
            size = written.size,
            messages = statistics.total_messages,
            warnings = warnings.len(),
            duration_ms = duration.as_millis(),
            "Export completed"
        );

        Ok(ExportResult {
            output_file: written.path,
            file_size: written.size,
            statistics,
            duration,
            warnings,
        })
    }

    fn lookup_channel(&self, channel_id: &str) -> Result<Channel> {
        let channels = match settle(self.api.list_channels(), FailurePolicy::Abort) {
            CallOutcome::Done(channels) => channels,
            CallOutcome::Degraded(err) | CallOutcome::Failed(err) => {
                return Err(err.at_stage(ExportStage::ChannelFetch, "conversations.list"));
            }
        };

        channels
            .into_iter()
            .find(|c| c.id == channel_id)
            .ok_or_else(|| AppError::ChannelNotFound {
                channel_id: channel_id.to_string(),
            })
    }
}

fn validate(options: &ExportOptions) -> Result<()> {
    if options.channel_id.trim().is_empty() {
        return Err(AppError::Config {
            message: "Channel id is required".to_string(),
        });
    }
    validate_options(options)
}

/// Reject options that can never produce an export.
///
/// # Errors
/// Returns `Unsupported` for zip compression and a configuration error for
/// an inverted date range.
pub fn validate_options(options: &ExportOptions) -> Result<()> {
    if options.compression == Compression::Zip {
        return Err(AppError::Unsupported {
            feature: "zip compression".to_string(),
        });
    }

    if options.date_range.is_inverted() {
        return Err(AppError::Config {
            message: "Invalid date range: 'from' is after 'to'".to_string(),
        });
    }

    Ok(())
}

/// Run one stage inside its tracing span and measure it.
fn run_stage<T>(stage: ExportStage, f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
    let span = info_span!("stage", name = stage.as_str());
    let _guard = span.enter();

    let started = Instant::now();
    let value = f()?;
    let elapsed = started.elapsed();

    info!(duration_ms = elapsed.as_millis(), "{}", stage.description());
    Ok((value, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        channel, message, reaction, reply, thread_parent, user, MockSlackApi,
    };
    use crate::domain::{DateRange, Message, ProgressSnapshot};
    use flate2::read::GzDecoder;
    use std::fs::File;
    use std::io::Read;
    use std::path::Path;
    use tempfile::tempdir;

    fn workspace() -> MockSlackApi {
        let parent = Message {
            reactions: vec![reaction("thumbsup", 3)],
            ..thread_parent("1704110400.000100", "U1", 2)
        };
        let answer = Message {
            reactions: vec![reaction("thumbsup", 1)],
            ..reply("1704110500.000200", "1704110400.000100", "U2")
        };

        MockSlackApi::new()
            .with_channel(channel("C1", "general"))
            .with_channel(channel("C2", "random"))
            .with_page(vec![
                message("1704196800.000000", "U999999", "who am i"),
                parent.clone(),
            ])
            .with_page(vec![message("1704067200.000000", "U2", "first")])
            .with_thread(
                "1704110400.000100",
                vec![
                    parent,
                    answer,
                    reply("1704110600.000300", "1704110400.000100", "U1"),
                ],
            )
            .with_users(vec![user("U1", "alice"), user("U2", "bob")])
    }

    fn service(api: MockSlackApi) -> ExportService<MockSlackApi> {
        ExportService::new(api, RateLimit::uniform(Duration::ZERO))
    }

    fn options_in(dir: &Path) -> ExportOptions {
        ExportOptions {
            output_file: Some(dir.join("export.json")),
            ..ExportOptions::new("C1")
        }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_full_export() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let mut snapshots: Vec<ProgressSnapshot> = Vec::new();
        let mut on_progress = |s: ProgressSnapshot| snapshots.push(s);

        let result = service
            .export_channel(&options_in(dir.path()), Some(&mut on_progress))
            .unwrap();

        assert_eq!(result.output_file, dir.path().join("export.json"));
        assert!(result.warnings.is_empty());
        assert_eq!(result.statistics.total_messages, 5);
        assert_eq!(result.statistics.total_threads, 1);
        assert_eq!(result.statistics.total_replies, 2);
        assert_eq!(result.statistics.total_users, 3);
        assert_eq!(result.statistics.top_reactions[0].name, "thumbsup");
        assert_eq!(result.statistics.top_reactions[0].count, 4);
        assert_eq!(result.statistics.export_duration, result.duration);

        let doc = read_json(&result.output_file);
        assert_eq!(doc["channel"]["id"], "C1");
        assert_eq!(result.file_size, std::fs::metadata(&result.output_file).unwrap().len());

        let ids: Vec<&str> = doc["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec!["1704067200.000000", "1704110400.000100", "1704196800.000000"]
        );

        let replies = doc["messages"][1]["replies"].as_array().unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], "1704110500.000200");

        assert_eq!(doc["users"]["U999999"]["deleted"], true);
        assert_eq!(doc["users"]["U999999"]["name"], "user_U999999");

        let stages: Vec<ExportStage> = snapshots.iter().map(|s| s.stage).collect();
        assert_eq!(stages.first(), Some(&ExportStage::Initializing));
        assert_eq!(stages.last(), Some(&ExportStage::Complete));
        assert!(stages.contains(&ExportStage::ThreadFetch));
        assert!(snapshots.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert!((snapshots[snapshots.len() - 1].progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calls_are_sequential_in_stage_order() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        service.export_channel(&options_in(dir.path()), None).unwrap();

        assert_eq!(
            service.api().calls(),
            vec![
                "conversations.list",
                "conversations.history C1 limit=1000 cursor=",
                "conversations.history C1 limit=1000 cursor=page-1",
                "conversations.replies C1 ts=1704110400.000100",
                "users.list",
            ]
        );
    }

    #[test]
    fn test_thread_failure_is_a_warning() {
        let dir = tempdir().unwrap();
        let service = service(workspace().fail_thread("1704110400.000100"));

        let result = service.export_channel(&options_in(dir.path()), None).unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.statistics.total_replies, 0);
        assert_eq!(result.statistics.total_messages, 3);
        assert!(result.output_file.exists());
    }

    #[test]
    fn test_page_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let service = service(workspace().fail_page(2));
        let options = ExportOptions {
            output_file: Some(dir.path().join("out").join("export.json")),
            ..ExportOptions::new("C1")
        };

        let err = service.export_channel(&options, None).unwrap_err();

        assert_eq!(err.stage(), Some(ExportStage::MessageFetch));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_missing_channel() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            channel_id: "C404".into(),
            ..options_in(dir.path())
        };

        let err = service.export_channel(&options, None).unwrap_err();
        assert!(matches!(err, AppError::ChannelNotFound { channel_id } if channel_id == "C404"));
    }

    #[test]
    fn test_zip_rejected_before_any_call() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            compression: Compression::Zip,
            ..options_in(dir.path())
        };

        let err = service.export_channel(&options, None).unwrap_err();
        assert!(matches!(err, AppError::Unsupported { .. }));
        assert!(service.api().calls().is_empty());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            date_range: DateRange::new(
                chrono::DateTime::from_timestamp(1_704_240_000, 0),
                chrono::DateTime::from_timestamp(1_704_153_600, 0),
            ),
            ..options_in(dir.path())
        };

        assert!(matches!(
            service.export_channel(&options, None),
            Err(AppError::Config { .. })
        ));
        assert!(service.api().calls().is_empty());
    }

    #[test]
    fn test_without_threads() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            include_threads: false,
            ..options_in(dir.path())
        };
        let mut stages = Vec::new();
        let mut on_progress = |s: ProgressSnapshot| stages.push(s.stage);

        let result = service
            .export_channel(&options, Some(&mut on_progress))
            .unwrap();

        assert_eq!(result.statistics.total_messages, 3);
        assert!(!stages.contains(&ExportStage::ThreadFetch));
        assert!(!service
            .api()
            .calls()
            .iter()
            .any(|c| c.starts_with("conversations.replies")));
        assert_eq!(read_json(&result.output_file)["export_info"]["include_threads"], false);
    }

    #[test]
    fn test_excluded_reactions_are_not_counted() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            include_reactions: false,
            ..options_in(dir.path())
        };

        let result = service.export_channel(&options, None).unwrap();
        assert_eq!(result.statistics.total_reactions, 0);
        assert!(result.statistics.top_reactions.is_empty());
    }

    #[test]
    fn test_gzip_export_with_default_path() {
        let dir = tempdir().unwrap();
        let service = service(workspace());
        let options = ExportOptions {
            output_dir: dir.path().join("exports"),
            compression: Compression::Gzip,
            ..ExportOptions::new("C1")
        };

        let result = service.export_channel(&options, None).unwrap();

        let name = result.output_file.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("general-export-"));
        assert!(name.ends_with(".json.gz"));

        let mut json = String::new();
        GzDecoder::new(File::open(&result.output_file).unwrap())
            .read_to_string(&mut json)
            .unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["statistics"]["total_messages"], 5);
    }

    #[test]
    fn test_find_channel_by_name() {
        let service = service(workspace());
        assert_eq!(service.find_channel_by_name("#random").unwrap().id, "C2");
        assert!(matches!(
            service.find_channel_by_name("nope"),
            Err(AppError::ChannelNotFound { .. })
        ));
    }
}
