//! Stage-by-stage progress for an analysis run.
//!
//! Updates can arrive from parallel extraction workers, so the reporter
//! serializes them and never lets the stage or percentage move backwards.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetching,
    Parsing,
    Analyzing,
    Generating,
    Complete,
}

impl Stage {
    /// Percentage window each stage occupies.
    pub fn range(&self) -> (u8, u8) {
        match self {
            Stage::Fetching => (0, 10),
            Stage::Parsing => (10, 60),
            Stage::Analyzing => (60, 85),
            Stage::Generating => (85, 99),
            Stage::Complete => (100, 100),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Parsing => "parsing",
            Stage::Analyzing => "analyzing",
            Stage::Generating => "generating",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// Discards every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _update: &ProgressUpdate) {}
}

/// Logs updates through `tracing`; per-file updates go to debug.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, update: &ProgressUpdate) {
        match &update.current_file {
            Some(file) => debug!(stage = %update.stage, progress = update.progress, file = %file, "{}", update.message),
            None => info!(stage = %update.stage, progress = update.progress, "{}", update.message),
        }
    }
}

struct Watermark {
    stage: Stage,
    progress: u8,
}

pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    last: Mutex<Watermark>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: Mutex::new(Watermark {
                stage: Stage::Fetching,
                progress: 0,
            }),
        }
    }

    /// Report entering `stage`.
    pub fn stage(&self, stage: Stage, message: impl Into<String>) {
        let (start, _) = stage.range();
        self.emit(stage, start, message.into(), None);
    }

    /// Report `done` of `total` items within the current stage's window.
    pub fn step(&self, stage: Stage, done: usize, total: usize, message: impl Into<String>, current_file: Option<&str>) {
        let (start, end) = stage.range();
        let fraction = if total == 0 { 1.0 } else { done.min(total) as f64 / total as f64 };
        let progress = start as f64 + (end - start) as f64 * fraction;
        self.emit(stage, progress.floor() as u8, message.into(), current_file.map(str::to_string));
    }

    pub fn complete(&self, message: impl Into<String>) {
        self.emit(Stage::Complete, 100, message.into(), None);
    }

    fn emit(&self, stage: Stage, progress: u8, message: String, current_file: Option<String>) {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let stage = stage.max(last.stage);
        let progress = progress.min(100).max(last.progress);
        last.stage = stage;
        last.progress = progress;

        let update = ProgressUpdate {
            stage,
            progress,
            message,
            current_file,
        };
        self.sink.report(&update);
    }
}
