//! Export progress model.
//!
//! The pipeline advances through a fixed sequence of [`ExportStage`]s. Every
//! transition and every intra-stage update produces a new immutable
//! [`ProgressSnapshot`] that is handed to the caller's callback.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Ordered pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Initializing,
    ChannelFetch,
    MessageFetch,
    /// Only entered when threads are included.
    ThreadFetch,
    UserFetch,
    DataProcessing,
    FileGeneration,
    Complete,
}

impl ExportStage {
    /// Machine-readable stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::ChannelFetch => "channel_fetch",
            Self::MessageFetch => "message_fetch",
            Self::ThreadFetch => "thread_fetch",
            Self::UserFetch => "user_fetch",
            Self::DataProcessing => "data_processing",
            Self::FileGeneration => "file_generation",
            Self::Complete => "complete",
        }
    }

    /// Overall progress fraction when the stage is entered.
    #[must_use]
    pub const fn checkpoint(self) -> f64 {
        match self {
            Self::Initializing => 0.0,
            Self::ChannelFetch => 0.1,
            Self::MessageFetch => 0.2,
            Self::ThreadFetch => 0.6,
            Self::UserFetch => 0.8,
            Self::DataProcessing => 0.9,
            Self::FileGeneration => 0.95,
            Self::Complete => 1.0,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing export",
            Self::ChannelFetch => "Fetching channel information",
            Self::MessageFetch => "Fetching messages",
            Self::ThreadFetch => "Fetching thread replies",
            Self::UserFetch => "Fetching user information",
            Self::DataProcessing => "Processing data",
            Self::FileGeneration => "Generating output file",
            Self::Complete => "Export complete",
        }
    }

    /// Checkpoint of the stage that follows this one.
    const fn ceiling(self) -> f64 {
        match self {
            Self::Initializing => Self::ChannelFetch.checkpoint(),
            Self::ChannelFetch => Self::MessageFetch.checkpoint(),
            Self::MessageFetch => Self::ThreadFetch.checkpoint(),
            Self::ThreadFetch => Self::UserFetch.checkpoint(),
            Self::UserFetch => Self::DataProcessing.checkpoint(),
            Self::DataProcessing => Self::FileGeneration.checkpoint(),
            Self::FileGeneration | Self::Complete => Self::Complete.checkpoint(),
        }
    }

    /// Progress for `done` of `total` units of work inside this stage.
    #[must_use]
    pub fn interpolate(self, done: usize, total: usize) -> f64 {
        if total == 0 {
            return self.checkpoint();
        }
        let ratio = (done.min(total) as f64) / (total as f64);
        self.checkpoint() + (self.ceiling() - self.checkpoint()) * ratio
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of an export.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub stage: ExportStage,
    /// What the pipeline is doing right now.
    pub step: String,
    /// Overall fraction in `[0.0, 1.0]`, never decreasing within a run.
    pub progress: f64,
    pub messages_fetched: usize,
    pub pages_fetched: usize,
    pub threads_total: usize,
    pub threads_done: usize,
    /// Wall-clock time since the export started.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// The snapshot every export starts from.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            stage: ExportStage::Initializing,
            step: "Starting export".to_string(),
            progress: 0.0,
            messages_fetched: 0,
            pages_fetched: 0,
            threads_total: 0,
            threads_done: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Callback receiving snapshots on the pipeline's own thread.
///
/// It must return quickly: the export does not advance while it runs.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(ProgressSnapshot);

/// Produces snapshots and forwards them to the optional callback.
pub struct ProgressReporter<'a> {
    started: Instant,
    callback: Option<ProgressCallback<'a>>,
    last: ProgressSnapshot,
}

impl<'a> ProgressReporter<'a> {
    /// Create a reporter for an export that started at `started`.
    pub fn new(started: Instant, callback: Option<ProgressCallback<'a>>) -> Self {
        Self {
            started,
            callback,
            last: ProgressSnapshot::initial(),
        }
    }

    /// Emit the initial snapshot.
    pub fn start(&mut self) {
        self.emit(ProgressSnapshot::initial());
    }

    /// Transition to `stage`.
    pub fn enter(&mut self, stage: ExportStage, step: impl Into<String>) {
        let next = ProgressSnapshot {
            stage,
            step: step.into(),
            progress: stage.checkpoint(),
            ..self.last.clone()
        };
        self.emit(next);
    }

    /// Report history pagination progress.
    pub fn messages(&mut self, fetched: usize, pages: usize) {
        let next = ProgressSnapshot {
            step: format!("Fetched {fetched} messages ({pages} pages)"),
            messages_fetched: fetched,
            pages_fetched: pages,
            ..self.last.clone()
        };
        self.emit(next);
    }

    /// Report thread resolution progress.
    pub fn threads(&mut self, done: usize, total: usize) {
        let next = ProgressSnapshot {
            step: format!("Fetched replies for {done}/{total} threads"),
            progress: ExportStage::ThreadFetch.interpolate(done, total),
            threads_total: total,
            threads_done: done,
            ..self.last.clone()
        };
        self.emit(next);
    }

    /// Most recently emitted snapshot.
    #[must_use]
    pub const fn last(&self) -> &ProgressSnapshot {
        &self.last
    }

    fn emit(&mut self, mut next: ProgressSnapshot) {
        next.progress = next.progress.clamp(self.last.progress, 1.0);
        next.elapsed = self.started.elapsed();
        self.last = next.clone();

        if let Some(callback) = self.callback.as_mut() {
            callback(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoints_increase_with_stage_order() {
        let stages = [
            ExportStage::Initializing,
            ExportStage::ChannelFetch,
            ExportStage::MessageFetch,
            ExportStage::ThreadFetch,
            ExportStage::UserFetch,
            ExportStage::DataProcessing,
            ExportStage::FileGeneration,
            ExportStage::Complete,
        ];

        for pair in stages.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].checkpoint() < pair[1].checkpoint());
        }
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ExportStage::ThreadFetch.as_str(), "thread_fetch");
        assert_eq!(ExportStage::FileGeneration.to_string(), "file_generation");
        assert_eq!(
            serde_json::to_string(&ExportStage::UserFetch).unwrap(),
            "\"user_fetch\""
        );
    }

    #[test]
    fn test_thread_interpolation_stays_inside_stage() {
        assert!((ExportStage::ThreadFetch.interpolate(0, 4) - 0.6).abs() < 1e-9);
        assert!((ExportStage::ThreadFetch.interpolate(2, 4) - 0.7).abs() < 1e-9);
        assert!((ExportStage::ThreadFetch.interpolate(4, 4) - 0.8).abs() < 1e-9);
        assert!((ExportStage::ThreadFetch.interpolate(9, 4) - 0.8).abs() < 1e-9);
        assert!((ExportStage::ThreadFetch.interpolate(0, 0) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_reporter_is_monotonic() {
        let mut seen = Vec::new();
        let mut callback = |snapshot: ProgressSnapshot| seen.push(snapshot);

        {
            let mut reporter = ProgressReporter::new(Instant::now(), Some(&mut callback));
            reporter.start();
            reporter.enter(ExportStage::UserFetch, "users");
            // Entering an earlier stage must not move progress backwards.
            reporter.enter(ExportStage::MessageFetch, "late");
            reporter.messages(10, 1);
        }

        let fractions: Vec<f64> = seen.iter().map(|s| s.progress).collect();
        assert_eq!(fractions.len(), 4);
        for pair in fractions.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(seen[3].messages_fetched, 10);
        assert_eq!(seen[3].stage, ExportStage::MessageFetch);
    }

    #[test]
    fn test_reporter_without_callback_tracks_last() {
        let mut reporter = ProgressReporter::new(Instant::now(), None);
        reporter.enter(ExportStage::ThreadFetch, "threads");
        reporter.threads(1, 2);

        let last = reporter.last();
        assert_eq!(last.threads_done, 1);
        assert_eq!(last.threads_total, 2);
        assert!((last.progress - 0.7).abs() < 1e-9);
    }
}
