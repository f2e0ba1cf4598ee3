//! Core data model for sort runs.
//!
//! This module defines the main data structures of a run:
//! - SortConfiguration: what to sort and where the results go
//! - DirectoryPlan / PlanSet: per-directory progress bookkeeping
//! - SortEvent: one outcome reported by a worker
//! - SortSummary: totals returned when a run finishes

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::error::SortError;

/// Default template for the output subdirectory of a dated file.
pub const DEFAULT_GROUP_FORMAT: &str = "%Y/%B/%d";

/// Name of the output directory used when none is given.
pub const DEFAULT_OUTPUT_DIR_NAME: &str = "sort_output";

/// How long the event loop waits for an event before reporting a stall.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings for one sort run.
///
/// Treated as immutable once a [`Sorter`](crate::Sorter) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfiguration {
    /// Directory whose files are sorted
    pub input_dir: PathBuf,

    /// Root of the generated directory tree
    pub output_dir: PathBuf,

    /// Also sort files in every subdirectory of the input
    pub recursive: bool,

    /// strftime template for the subdirectory of a dated file
    pub group_format: String,

    /// strftime template replacing the file name (extension is kept)
    pub rename_format: Option<String>,

    /// Move files without a timestamp into the output root instead of skipping them
    pub sort_unknown: bool,

    /// Number of directories processed in parallel
    pub workers: usize,

    /// Silence window after which the observer gets a stall warning
    pub stall_timeout: Duration,
}

impl SortConfiguration {
    /// Configuration with default settings and output in `<input>/sort_output`.
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        let input_dir = input_dir.into();
        let output_dir = input_dir.join(DEFAULT_OUTPUT_DIR_NAME);
        SortConfiguration {
            input_dir,
            output_dir,
            recursive: false,
            group_format: DEFAULT_GROUP_FORMAT.to_string(),
            rename_format: None,
            sort_unknown: false,
            workers: default_workers(),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Progress bookkeeping for one directory.
///
/// `processed` only grows and never exceeds `total_files`. It is written by
/// the worker that owns the directory and read from any thread.
#[derive(Debug)]
pub struct DirectoryPlan {
    /// Directory whose direct file children are sorted
    pub directory: PathBuf,

    /// Files counted during preparation
    pub total_files: u64,

    processed: AtomicU64,

    /// False when preparation already failed to list the directory
    listed: bool,
}

impl DirectoryPlan {
    /// A plan for a directory with `total_files` files to process.
    pub fn new(directory: impl Into<PathBuf>, total_files: u64) -> Self {
        DirectoryPlan {
            directory: directory.into(),
            total_files,
            processed: AtomicU64::new(0),
            listed: true,
        }
    }

    /// A plan for a directory that could not be listed during preparation.
    ///
    /// It has no files, so it never holds back progress, and workers skip it.
    pub fn unreadable(directory: impl Into<PathBuf>) -> Self {
        DirectoryPlan {
            listed: false,
            ..DirectoryPlan::new(directory, 0)
        }
    }

    /// Files processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Whether preparation managed to list this directory.
    pub fn is_listed(&self) -> bool {
        self.listed
    }

    /// True once every counted file has been accounted for.
    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total_files
    }

    /// Count one more processed file. Saturates at `total_files`.
    pub(crate) fn advance(&self) {
        let total = self.total_files;
        let _ = self
            .processed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < total).then_some(current + 1)
            });
    }

    /// Mark the whole directory as processed.
    pub(crate) fn complete(&self) {
        self.processed.fetch_max(self.total_files, Ordering::AcqRel);
    }
}

/// The ordered collection of plans for one run.
#[derive(Debug, Default)]
pub struct PlanSet {
    plans: Vec<DirectoryPlan>,
}

impl PlanSet {
    pub fn new(plans: Vec<DirectoryPlan>) -> Self {
        PlanSet { plans }
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DirectoryPlan> {
        self.plans.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirectoryPlan> {
        self.plans.iter()
    }

    /// Total number of files counted across all plans.
    pub fn total_files(&self) -> u64 {
        self.plans.iter().map(|p| p.total_files).sum()
    }

    /// Overall progress in `[0, 1]`.
    ///
    /// Sum of processed files over sum of counted files at the time of the
    /// call. An empty run is trivially complete and reports 1.
    pub fn progress(&self) -> f64 {
        let (processed, total) = self
            .plans
            .iter()
            .fold((0u64, 0u64), |(processed, total), plan| {
                (processed + plan.processed(), total + plan.total_files)
            });

        if total == 0 {
            return 1.0;
        }

        processed as f64 / total as f64
    }

    /// Reverse the scheduling order.
    pub(crate) fn reverse(&mut self) {
        self.plans.reverse();
    }
}

/// One outcome reported by a sorting task.
///
/// Every variant carries the overall progress computed when it was emitted.
#[derive(Debug)]
pub enum SortEvent {
    /// File moved to `to`
    Moved {
        from: PathBuf,
        to: PathBuf,
        progress: f64,
    },
    /// File left in place because it has no timestamp
    Skipped { path: PathBuf, progress: f64 },
    /// A file or directory could not be processed
    Failed { error: SortError, progress: f64 },
    /// The task for `directory` has ended
    DirectoryDone { directory: PathBuf, progress: f64 },
}

impl SortEvent {
    /// Progress at the time the event was emitted.
    pub fn progress(&self) -> f64 {
        match self {
            SortEvent::Moved { progress, .. }
            | SortEvent::Skipped { progress, .. }
            | SortEvent::Failed { progress, .. }
            | SortEvent::DirectoryDone { progress, .. } => *progress,
        }
    }

    /// Source path for per-file events.
    pub fn path(&self) -> Option<&Path> {
        match self {
            SortEvent::Moved { from, .. } => Some(from),
            SortEvent::Skipped { path, .. } => Some(path),
            SortEvent::Failed { error, .. } => error.path(),
            SortEvent::DirectoryDone { directory, .. } => Some(directory),
        }
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone)]
pub struct SortSummary {
    /// Identifier of the run, used in log output
    pub run_id: Uuid,

    /// Directories scheduled for sorting
    pub directories: usize,

    /// Files counted during preparation
    pub total_files: u64,

    pub moved: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Stall warnings raised while waiting for events
    pub stalls: usize,

    /// Whether cancellation was requested before the run ended
    pub cancelled: bool,

    pub start_time: SystemTime,
    pub end_time: SystemTime,
}

impl SortSummary {
    /// Files that produced a moved, skipped or failed outcome.
    pub fn handled(&self) -> usize {
        self.moved + self.skipped + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan_set_is_complete() {
        let plans = PlanSet::default();
        assert_eq!(plans.progress(), 1.0);

        let plans = PlanSet::new(vec![DirectoryPlan::new("a", 0), DirectoryPlan::new("b", 0)]);
        assert_eq!(plans.progress(), 1.0);
    }

    #[test]
    fn test_progress_sums_across_plans() {
        let plans = PlanSet::new(vec![DirectoryPlan::new("a", 2), DirectoryPlan::new("b", 2)]);
        assert_eq!(plans.progress(), 0.0);

        plans.get(0).unwrap().advance();
        assert_eq!(plans.progress(), 0.25);

        plans.get(1).unwrap().complete();
        assert_eq!(plans.progress(), 0.75);

        plans.get(0).unwrap().advance();
        assert_eq!(plans.progress(), 1.0);
    }

    #[test]
    fn test_advance_saturates_at_total() {
        let plan = DirectoryPlan::new("a", 1);
        plan.advance();
        plan.advance();
        assert_eq!(plan.processed(), 1);
        assert!(plan.is_complete());
    }

    #[test]
    fn test_complete_never_decreases() {
        let plan = DirectoryPlan::new("a", 3);
        plan.complete();
        plan.complete();
        assert_eq!(plan.processed(), 3);
    }

    #[test]
    fn test_unreadable_plan_is_empty_and_unlisted() {
        let plan = DirectoryPlan::unreadable("locked");
        assert_eq!(plan.total_files, 0);
        assert!(!plan.is_listed());
        assert!(plan.is_complete());
    }

    #[test]
    fn test_default_configuration() {
        let config = SortConfiguration::new("/photos");
        assert_eq!(config.output_dir, PathBuf::from("/photos").join("sort_output"));
        assert_eq!(config.group_format, "%Y/%B/%d");
        assert!(!config.recursive);
        assert!(!config.sort_unknown);
        assert!(config.rename_format.is_none());
        assert!(config.workers >= 1);
        assert_eq!(config.stall_timeout, Duration::from_secs(60));
    }
}
