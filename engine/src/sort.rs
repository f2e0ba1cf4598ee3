//! Sort orchestration module.
//!
//! This module provides the run lifecycle:
//! - Creating a sorter from a validated configuration
//! - Preparing a run (flattening the input tree into directory plans)
//! - Running it (one task per directory on a worker pool, events drained
//!   on the calling thread)

use std::thread;
use std::time::SystemTime;

use uuid::Uuid;

use crate::cancel::CancelHandle;
use crate::classify::{ExifClassifier, PathClassifier};
use crate::error::SortError;
use crate::event_loop::EventLoop;
use crate::fs_ops::{FsRelocator, Relocator};
use crate::model::{SortConfiguration, SortSummary};
use crate::prepare::{prepare, Preparation};
use crate::progress::SortObserver;
use crate::template::validate_template;
use crate::worker::{EventSink, Worker};

/// A configured sort, ready to run.
pub struct Sorter {
    config: SortConfiguration,
    classifier: Box<dyn PathClassifier>,
    relocator: Box<dyn Relocator>,
    cancel: CancelHandle,
}

/// Create a new sorter.
///
/// Validates that the input path exists and is a directory and that both
/// date templates can be formatted. The output directory may not exist yet
/// (it is created on the first move).
///
/// # Errors
/// Returns SortError if the configuration cannot be used
pub fn create_sorter(config: SortConfiguration) -> Result<Sorter, SortError> {
    let input = &config.input_dir;

    match std::fs::metadata(input) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(SortError::InvalidInput {
                    path: input.clone(),
                    reason: "input must be a directory".to_string(),
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SortError::InputNotFound {
                path: input.clone(),
            });
        }
        Err(e) => {
            return Err(SortError::DirectoryReadFailed {
                path: input.clone(),
                source: e,
            });
        }
    }

    if config.output_dir.as_os_str().is_empty() {
        return Err(SortError::InvalidInput {
            path: config.output_dir.clone(),
            reason: "output path is empty".to_string(),
        });
    }

    if config.workers == 0 {
        return Err(SortError::InvalidInput {
            path: input.clone(),
            reason: "at least one worker is required".to_string(),
        });
    }

    if config.stall_timeout.is_zero() {
        return Err(SortError::InvalidInput {
            path: input.clone(),
            reason: "stall timeout must be positive".to_string(),
        });
    }

    validate_template(&config.group_format)?;
    if let Some(rename) = &config.rename_format {
        validate_template(rename)?;
    }

    Ok(Sorter {
        config,
        classifier: Box::new(ExifClassifier),
        relocator: Box::new(FsRelocator),
        cancel: CancelHandle::new(),
    })
}

impl Sorter {
    /// Replace the EXIF reader with another timestamp source.
    pub fn with_classifier(mut self, classifier: impl PathClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    /// Replace the filesystem mover.
    pub fn with_relocator(mut self, relocator: impl Relocator + 'static) -> Self {
        self.relocator = Box::new(relocator);
        self
    }

    pub fn config(&self) -> &SortConfiguration {
        &self.config
    }

    /// Handle for cancelling from another thread or from an observer.
    ///
    /// Cancellation is sticky: once requested, later runs of this sorter stop
    /// before their first file.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request a best-effort cooperative stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Walk the input tree and count the files of every directory to sort.
    pub fn prepare(&self) -> Preparation {
        prepare(&self.config, &self.cancel)
    }

    /// Prepare and run a sort, reporting every outcome to `observer`.
    ///
    /// Never fails: per-file and per-directory errors are reported through
    /// `on_error` and counted in the summary. `on_finished` is called exactly
    /// once before this returns.
    pub fn run(&self, observer: Option<&dyn SortObserver>) -> SortSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sort", %run_id);
        let _enter = span.enter();

        let start_time = SystemTime::now();
        let preparation = self.prepare();
        self.execute(run_id, start_time, preparation, observer)
    }

    /// Run a sort over plans produced elsewhere (usually by [`Sorter::prepare`]).
    pub fn run_with_plans(
        &self,
        preparation: Preparation,
        observer: Option<&dyn SortObserver>,
    ) -> SortSummary {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sort", %run_id);
        let _enter = span.enter();

        self.execute(run_id, SystemTime::now(), preparation, observer)
    }

    fn execute(
        &self,
        run_id: Uuid,
        start_time: SystemTime,
        preparation: Preparation,
        observer: Option<&dyn SortObserver>,
    ) -> SortSummary {
        let Preparation { plans, errors } = preparation;
        let directories = plans.len();
        let total_files = plans.total_files();

        tracing::info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            directories,
            files = total_files,
            "sorting"
        );

        let (sender, receiver) = crossbeam_channel::unbounded();
        let sink = EventSink::new(&plans, sender);
        for error in errors {
            sink.report(error);
        }

        let (task_tx, task_rx) = crossbeam_channel::unbounded::<usize>();
        for index in 0..directories {
            let _ = task_tx.send(index);
        }
        drop(task_tx);

        let worker = Worker {
            config: &self.config,
            classifier: self.classifier.as_ref(),
            relocator: self.relocator.as_ref(),
            cancel: &self.cancel,
            plans: &plans,
            sink: &sink,
        };
        let pool_size = self.config.workers.min(directories);

        let tally = thread::scope(|scope| {
            for _ in 0..pool_size {
                let tasks = task_rx.clone();
                let worker = &worker;
                scope.spawn(move || {
                    for index in tasks.iter() {
                        worker.run_task(index);
                    }
                });
            }

            EventLoop::new(receiver, observer, self.config.stall_timeout, directories).run(&plans)
        });

        let summary = SortSummary {
            run_id,
            directories,
            total_files,
            moved: tally.moved,
            skipped: tally.skipped,
            failed: tally.failed,
            stalls: tally.stalls,
            cancelled: self.cancel.is_cancelled(),
            start_time,
            end_time: SystemTime::now(),
        };

        tracing::info!(
            moved = summary.moved,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "sort finished"
        );

        summary
    }
}

impl std::fmt::Debug for Sorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sorter")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
