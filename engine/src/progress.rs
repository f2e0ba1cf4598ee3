//! Progress reporting trait.
//!
//! This module defines the SortObserver trait, which decouples the sort
//! engine from any specific front end (CLI, GUI, etc.).
//!
//! All methods are called synchronously from the thread that called
//! [`Sorter::run`](crate::Sorter::run), never from a worker.

use std::path::Path;

use crate::error::SortError;

/// Receives the outcome of every file handled during a run.
///
/// `progress` is the overall completion in `[0, 1]` at the moment the
/// outcome was produced.
pub trait SortObserver {
    /// A file was moved from `from` to `to`.
    fn on_moved(&self, from: &Path, to: &Path, progress: f64);

    /// A file without a timestamp was left in place.
    fn on_skipped(&self, path: &Path, progress: f64);

    /// A file or directory could not be processed.
    fn on_error(&self, error: &SortError, progress: f64);

    /// No event arrived within the stall window. Informational only.
    fn on_stall(&self, _progress: f64) {}

    /// Every file of `directory` has been handled (or abandoned).
    fn on_directory_done(&self, _directory: &Path, _progress: f64) {}

    /// The run is over. Called exactly once.
    fn on_finished(&self);
}
