//! Preparation pass.
//!
//! Walks the input tree once, depth-first, and flattens it into one
//! [`DirectoryPlan`] per directory that will be sorted. Workers never
//! recurse; everything they need is decided here.

use std::fs;
use std::path::{Path, PathBuf};

use crate::cancel::CancelHandle;
use crate::error::SortError;
use crate::model::{DirectoryPlan, PlanSet, SortConfiguration};

/// Result of the preparation pass.
#[derive(Debug, Default)]
pub struct Preparation {
    /// Plans in scheduling order
    pub plans: PlanSet,

    /// Directories that could not be listed; reported before sorting starts
    pub errors: Vec<SortError>,
}

/// Count the files of every directory to sort.
///
/// A directory that cannot be listed yields an error and an empty plan so
/// the walk continues. When cancellation is requested the walk stops early
/// with the plans gathered so far.
///
/// The plans are returned in reverse visiting order so the input root, which
/// is visited first, is scheduled first.
pub fn prepare(config: &SortConfiguration, cancel: &CancelHandle) -> Preparation {
    let mut walk = Walk {
        recursive: config.recursive,
        output: OutputRoot::new(&config.output_dir),
        cancel,
        plans: Vec::new(),
        errors: Vec::new(),
    };

    walk.visit(&config.input_dir);

    let Walk { plans, errors, .. } = walk;
    let mut plans = PlanSet::new(plans);
    plans.reverse();

    tracing::debug!(
        directories = plans.len(),
        files = plans.total_files(),
        errors = errors.len(),
        "preparation finished"
    );

    Preparation { plans, errors }
}

/// The output directory, matched by identity rather than by spelling.
struct OutputRoot {
    given: PathBuf,
    canonical: Option<PathBuf>,
}

impl OutputRoot {
    fn new(output_dir: &Path) -> Self {
        // The output may not exist yet; then nothing inside the input can be it
        OutputRoot {
            given: output_dir.to_path_buf(),
            canonical: fs::canonicalize(output_dir).ok(),
        }
    }

    fn is(&self, dir: &Path) -> bool {
        if dir == self.given {
            return true;
        }
        match &self.canonical {
            Some(canonical) => fs::canonicalize(dir).is_ok_and(|dir| dir == *canonical),
            None => false,
        }
    }
}

struct Walk<'a> {
    recursive: bool,
    output: OutputRoot,
    cancel: &'a CancelHandle,
    plans: Vec<DirectoryPlan>,
    errors: Vec<SortError>,
}

impl Walk<'_> {
    fn visit(&mut self, dir: &Path) {
        let unreadable = |source: std::io::Error| SortError::DirectoryReadFailed {
            path: dir.to_path_buf(),
            source,
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "cannot list directory");
                self.errors.push(unreadable(e));
                self.plans.push(DirectoryPlan::unreadable(dir));
                return;
            }
        };

        let mut files = 0u64;
        for entry in entries {
            if self.cancel.is_cancelled() {
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "directory listing interrupted");
                    self.errors.push(unreadable(e));
                    self.plans.push(DirectoryPlan::unreadable(dir));
                    return;
                }
            };

            let path = entry.path();
            if is_dir(&entry) {
                if !self.recursive {
                    continue;
                }
                // Never re-sort the output tree when it lives inside the input
                if self.output.is(&path) {
                    tracing::debug!(path = %path.display(), "skipping output directory");
                    continue;
                }
                self.visit(&path);
            } else {
                files += 1;
            }
        }

        self.plans.push(DirectoryPlan::new(dir, files));
    }
}

/// Directory check that follows symlinks, like `Path::is_dir`.
pub(crate) fn is_dir(entry: &fs::DirEntry) -> bool {
    match entry.file_type() {
        Ok(file_type) if file_type.is_symlink() => entry.path().is_dir(),
        Ok(file_type) => file_type.is_dir(),
        Err(_) => entry.path().is_dir(),
    }
}
