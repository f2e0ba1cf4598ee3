//! Per-directory sorting tasks.
//!
//! Each task owns exactly one [`DirectoryPlan`]: it is the only writer of
//! that plan's counter and the only producer of that directory's events.

use std::ffi::OsString;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;

use crate::cancel::CancelHandle;
use crate::classify::{PathClassifier, Timestamp};
use crate::error::SortError;
use crate::fs_ops::Relocator;
use crate::model::{DirectoryPlan, PlanSet, SortConfiguration, SortEvent};
use crate::prepare::is_dir;
use crate::template::format_timestamp;

/// What happened to a single file.
#[derive(Debug)]
pub(crate) enum FileOutcome {
    Moved { from: PathBuf, to: PathBuf },
    Skipped { path: PathBuf },
    Failed(SortError),
}

impl FileOutcome {
    fn into_event(self, progress: f64) -> SortEvent {
        match self {
            FileOutcome::Moved { from, to } => SortEvent::Moved { from, to, progress },
            FileOutcome::Skipped { path } => SortEvent::Skipped { path, progress },
            FileOutcome::Failed(error) => SortEvent::Failed { error, progress },
        }
    }
}

/// Producer side of the event channel, shared by all workers.
///
/// Counter update, progress snapshot and send happen under one gate, so the
/// channel order matches the order in which progress values were computed
/// and the consumer sees a non-decreasing progress sequence.
pub(crate) struct EventSink<'a> {
    plans: &'a PlanSet,
    sender: Sender<SortEvent>,
    gate: Mutex<()>,
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(plans: &'a PlanSet, sender: Sender<SortEvent>) -> Self {
        EventSink {
            plans,
            sender,
            gate: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: SortEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!("event loop is gone, dropping event");
        }
    }

    /// Count a handled file of plan `index` and report it.
    pub(crate) fn file_handled(&self, index: usize, outcome: FileOutcome) {
        let _gate = self.lock();
        if let Some(plan) = self.plans.get(index) {
            plan.advance();
        }
        self.send(outcome.into_event(self.plans.progress()));
    }

    /// Abandon plan `index`: its remaining files no longer count as pending.
    pub(crate) fn fail_directory(&self, index: usize, error: SortError) {
        let _gate = self.lock();
        if let Some(plan) = self.plans.get(index) {
            plan.complete();
        }
        self.send(SortEvent::Failed {
            error,
            progress: self.plans.progress(),
        });
    }

    /// Report an error that belongs to no scheduled task.
    pub(crate) fn report(&self, error: SortError) {
        let _gate = self.lock();
        self.send(SortEvent::Failed {
            error,
            progress: self.plans.progress(),
        });
    }

    pub(crate) fn directory_done(&self, index: usize) {
        let _gate = self.lock();
        let directory = match self.plans.get(index) {
            Some(plan) => {
                if !plan.is_complete() {
                    // Cancelled, or files vanished after preparation
                    tracing::debug!(
                        path = %plan.directory.display(),
                        processed = plan.processed(),
                        total = plan.total_files,
                        "directory finished with files unaccounted for"
                    );
                }
                plan.directory.clone()
            }
            None => PathBuf::new(),
        };
        self.send(SortEvent::DirectoryDone {
            directory,
            progress: self.plans.progress(),
        });
    }
}

/// Everything a worker thread needs; borrowed from the running sorter.
pub(crate) struct Worker<'a> {
    pub(crate) config: &'a SortConfiguration,
    pub(crate) classifier: &'a dyn PathClassifier,
    pub(crate) relocator: &'a dyn Relocator,
    pub(crate) cancel: &'a CancelHandle,
    pub(crate) plans: &'a PlanSet,
    pub(crate) sink: &'a EventSink<'a>,
}

impl Worker<'_> {
    /// Sort one planned directory. Always ends with `DirectoryDone`.
    pub(crate) fn run_task(&self, index: usize) {
        let Some(plan) = self.plans.get(index) else {
            return;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.sort_directory(index, plan)));
        if result.is_err() {
            tracing::error!(path = %plan.directory.display(), "sorting task panicked");
            self.sink.fail_directory(
                index,
                SortError::TaskPanicked {
                    path: plan.directory.clone(),
                },
            );
        }

        self.sink.directory_done(index);
    }

    fn sort_directory(&self, index: usize, plan: &DirectoryPlan) {
        // Already reported during preparation
        if !plan.is_listed() {
            return;
        }

        let entries = match fs::read_dir(&plan.directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %plan.directory.display(), error = %e, "cannot list directory");
                self.sink.fail_directory(
                    index,
                    SortError::DirectoryReadFailed {
                        path: plan.directory.clone(),
                        source: e,
                    },
                );
                return;
            }
        };

        for entry in entries {
            if self.cancel.is_cancelled() {
                tracing::debug!(path = %plan.directory.display(), "stopping, sort cancelled");
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %plan.directory.display(), error = %e, "directory listing interrupted");
                    self.sink.fail_directory(
                        index,
                        SortError::DirectoryReadFailed {
                            path: plan.directory.clone(),
                            source: e,
                        },
                    );
                    return;
                }
            };

            if is_dir(&entry) {
                continue;
            }

            let outcome = self.route_file(&entry.path());
            self.sink.file_handled(index, outcome);
        }
    }

    /// Decide where a file belongs and move it there.
    pub(crate) fn route_file(&self, path: &Path) -> FileOutcome {
        let taken = match self.classifier.classify(path) {
            Ok(taken) => taken,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no readable metadata");
                None
            }
        };

        let Some(file_name) = path.file_name() else {
            return FileOutcome::Skipped {
                path: path.to_path_buf(),
            };
        };

        let destination = match taken {
            Some(timestamp) => match self.dated_destination(path, &timestamp) {
                Ok(destination) => destination,
                Err(e) => return FileOutcome::Failed(e),
            },
            None if self.config.sort_unknown => self.config.output_dir.join(file_name),
            None => {
                tracing::debug!(path = %path.display(), "skipped, no date");
                return FileOutcome::Skipped {
                    path: path.to_path_buf(),
                };
            }
        };

        match self.relocator.relocate(path, &destination) {
            Ok(to) => {
                tracing::debug!(src = %path.display(), dest = %to.display(), "moved file");
                FileOutcome::Moved {
                    from: path.to_path_buf(),
                    to,
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    os_error = ?e.raw_os_error(),
                    "move failed"
                );
                FileOutcome::Failed(e)
            }
        }
    }

    fn dated_destination(&self, path: &Path, timestamp: &Timestamp) -> Result<PathBuf, SortError> {
        let dir = self
            .config
            .output_dir
            .join(format_timestamp(timestamp, &self.config.group_format)?);

        let file_name = match &self.config.rename_format {
            Some(template) => {
                let mut name = OsString::from(format_timestamp(timestamp, template)?);
                if let Some(ext) = path.extension() {
                    name.push(".");
                    name.push(ext);
                }
                name
            }
            None => path.file_name().unwrap_or_default().to_os_string(),
        };

        Ok(dir.join(file_name))
    }
}
